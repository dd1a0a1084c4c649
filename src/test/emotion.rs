#[cfg(test)]
mod tests {
    use crate::db::get_video_tags;
    use crate::emotion::{
        FrameRecord, NO_EMOTION, apply_score_thresholds, classify_frames, detect_shift_frames,
        load_frames, persist_shift_tags,
    };
    use crate::error::AppError;
    use crate::test::utils::test_utils::TestDbBuilder;
    use std::collections::BTreeSet;

    fn frame(scene_id: i64, frame: i64, emotion: &str, score: f64) -> FrameRecord {
        FrameRecord {
            scene_id,
            frame,
            timestamp: frame as f64 / 25.0,
            emotion: emotion.to_string(),
            score: Some(score),
        }
    }

    #[test]
    fn test_low_scores_are_discarded() {
        let mut frames = vec![
            frame(1, 0, "joy", 0.85),
            frame(1, 1, "sadness", 0.79),
            frame(1, 2, "anger", 0.80),
        ];

        apply_score_thresholds(&mut frames);

        assert_eq!(frames[0].emotion, "joy");
        assert_eq!(frames[1].emotion, NO_EMOTION);
        assert_eq!(frames[2].emotion, "anger");
    }

    #[test]
    fn test_missing_score_counts_as_zero() {
        let mut frames = vec![FrameRecord {
            scene_id: 1,
            frame: 0,
            timestamp: 0.0,
            emotion: "joy".to_string(),
            score: None,
        }];

        apply_score_thresholds(&mut frames);

        assert_eq!(frames[0].emotion, NO_EMOTION);
        assert_eq!(frames[0].score, Some(0.0));
    }

    #[test]
    fn test_neutral_needs_a_stricter_score() {
        let mut frames = vec![
            frame(1, 0, "neutral", 0.90),
            frame(1, 1, "neutral", 0.97),
            frame(1, 2, "joy", 0.90),
        ];

        apply_score_thresholds(&mut frames);

        assert_eq!(frames[0].emotion, NO_EMOTION);
        assert_eq!(frames[1].emotion, "neutral");
        assert_eq!(frames[2].emotion, "joy");
    }

    #[test]
    fn test_steady_emotion_yields_single_shift_at_first_frame() {
        let frames: Vec<FrameRecord> =
            (0..6).map(|n| frame(1, n, "joy", 0.9)).collect();

        let shifts = detect_shift_frames(&frames);
        assert_eq!(shifts, BTreeSet::from([0]));
    }

    #[test]
    fn test_shift_between_emotions() {
        let frames = vec![
            frame(1, 0, "joy", 0.9),
            frame(1, 1, "joy", 0.9),
            frame(1, 2, "sadness", 0.9),
            frame(1, 3, "sadness", 0.9),
            frame(1, 4, "sadness", 0.9),
        ];

        // Window [0,1,2] votes joy with frame 0 as representative, then
        // window [1,2,3] flips to sadness first carried by frame 2.
        let shifts = detect_shift_frames(&frames);
        assert_eq!(shifts, BTreeSet::from([0, 2]));
    }

    #[test]
    fn test_tied_window_abstains() {
        let frames = vec![frame(1, 0, "joy", 0.9), frame(1, 1, "sadness", 0.9)];

        let shifts = detect_shift_frames(&frames);
        assert!(shifts.is_empty());
    }

    #[test]
    fn test_short_scene_votes_once() {
        let frames = vec![frame(1, 0, "joy", 0.9), frame(1, 1, "joy", 0.9)];

        let shifts = detect_shift_frames(&frames);
        assert_eq!(shifts, BTreeSet::from([0]));
    }

    #[test]
    fn test_all_no_emotion_yields_nothing() {
        let frames: Vec<FrameRecord> =
            (0..5).map(|n| frame(1, n, NO_EMOTION, 0.0)).collect();

        let shifts = detect_shift_frames(&frames);
        assert!(shifts.is_empty());
    }

    #[test]
    fn test_scenes_are_independent() {
        let frames = vec![
            frame(1, 0, "joy", 0.9),
            frame(1, 1, "joy", 0.9),
            frame(1, 2, "joy", 0.9),
            frame(2, 10, "sadness", 0.9),
            frame(2, 11, "sadness", 0.9),
            frame(2, 12, "sadness", 0.9),
        ];

        let shifts = detect_shift_frames(&frames);
        assert_eq!(shifts, BTreeSet::from([0, 10]));
    }

    #[test]
    fn test_unordered_frames_are_sorted_before_windowing() {
        let frames = vec![
            frame(1, 4, "sadness", 0.9),
            frame(1, 2, "sadness", 0.9),
            frame(1, 0, "joy", 0.9),
            frame(1, 3, "sadness", 0.9),
            frame(1, 1, "joy", 0.9),
        ];

        let shifts = detect_shift_frames(&frames);
        assert_eq!(shifts, BTreeSet::from([0, 2]));
    }

    #[test]
    fn test_classify_frames_marks_shift_rows() {
        let frames = vec![
            frame(1, 0, "joy", 0.9),
            frame(1, 1, "joy", 0.9),
            frame(1, 2, "joy", 0.9),
            frame(1, 3, "joy", 0.75),
        ];

        let classified = classify_frames(frames);

        assert!(classified[0].emotion_shift);
        assert!(!classified[1].emotion_shift);
        assert!(!classified[2].emotion_shift);
        assert!(!classified[3].emotion_shift);
        assert_eq!(classified[3].emotion, NO_EMOTION);
    }

    #[test]
    fn test_load_frames_reads_csv() {
        let path = std::env::temp_dir().join("emotion_frames_ok.csv");
        std::fs::write(
            &path,
            "scene_id,frame,timestamp,emotion,score\n\
             1,0,0.0,joy,0.91\n\
             1,1,0.04,neutral,\n",
        )
        .unwrap();

        let frames = load_frames(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].emotion, "joy");
        assert_eq!(frames[0].score, Some(0.91));
        assert_eq!(frames[1].score, None);
    }

    #[test]
    fn test_load_frames_rejects_malformed_row() {
        let path = std::env::temp_dir().join("emotion_frames_bad.csv");
        std::fs::write(
            &path,
            "scene_id,frame,timestamp,emotion,score\n\
             1,not_a_frame,0.0,joy,0.91\n",
        )
        .unwrap();

        let result = load_frames(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[rocket::async_test]
    async fn test_persist_shift_tags() {
        let test_db = TestDbBuilder::new()
            .user("alice")
            .tag_list("emotions", "", "alice")
            .video("abc")
            .build()
            .await
            .expect("Failed to build test database");

        let frames = vec![
            frame(1, 0, "joy", 0.9),
            frame(1, 1, "joy", 0.9),
            frame(1, 2, "sadness", 0.9),
            frame(1, 3, "sadness", 0.9),
            frame(1, 4, "sadness", 0.9),
        ];

        let classified = classify_frames(frames);

        let tag_list_id = test_db.tag_list_id("emotions").unwrap();
        let video_id = test_db.video_id("abc").unwrap();
        let user_id = test_db.user_id("alice").unwrap();

        let inserted = persist_shift_tags(&test_db.pool, &classified, tag_list_id, video_id, user_id)
            .await
            .expect("Failed to persist shift tags");
        assert_eq!(inserted, 2);

        let tags = get_video_tags(&test_db.pool, video_id, tag_list_id)
            .await
            .unwrap();
        let stored: Vec<(&str, f64)> = tags
            .iter()
            .map(|t| (t.tag.as_str(), t.youtube_timestamp))
            .collect();
        assert_eq!(stored, vec![("joy", 0.0), ("sadness", 2.0 / 25.0)]);
    }
}
