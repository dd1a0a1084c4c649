use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::db::add_tag;
use crate::error::AppError;

/// Frames per majority-vote window.
pub const WINDOW_SIZE: usize = 3;
/// Scores below this are not trusted for any label.
pub const MIN_EMOTION_SCORE: f64 = 0.80;
/// "neutral" is over-predicted by the upstream model and needs a stricter cut.
pub const MIN_NEUTRAL_SCORE: f64 = 0.96;

pub const NO_EMOTION: &str = "no_emotion";
pub const NEUTRAL: &str = "neutral";

/// One row of the labeled-frame dataset produced by the emotion model.
#[derive(Debug, Clone, Deserialize)]
pub struct FrameRecord {
    pub scene_id: i64,
    pub frame: i64,
    pub timestamp: f64,
    pub emotion: String,
    /// Empty cells mean the model produced no score; treated as 0.0.
    #[serde(default)]
    pub score: Option<f64>,
}

/// A frame after thresholding and shift detection.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ClassifiedFrame {
    pub scene_id: i64,
    pub frame: i64,
    pub timestamp: f64,
    pub emotion: String,
    pub score: f64,
    pub emotion_shift: bool,
}

/// Reads the whole dataset up front. Any row missing a required field is a
/// fatal error for the batch; there is no partial-row tolerance.
pub fn load_frames(path: &Path) -> Result<Vec<FrameRecord>, AppError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::Validation(format!("Cannot open dataset {}: {}", path.display(), e)))?;

    let mut frames = Vec::new();
    for row in reader.deserialize::<FrameRecord>() {
        frames.push(row?);
    }

    Ok(frames)
}

/// Global preprocessing: two sequential relabeling passes over the whole
/// frame set, before any per-scene windowing.
pub fn apply_score_thresholds(frames: &mut [FrameRecord]) {
    for frame in frames.iter_mut() {
        let score = frame.score.unwrap_or(0.0);
        frame.score = Some(score);
        if score < MIN_EMOTION_SCORE {
            frame.emotion = NO_EMOTION.to_string();
        }
    }

    for frame in frames.iter_mut() {
        if frame.emotion == NEUTRAL && frame.score.unwrap_or(0.0) < MIN_NEUTRAL_SCORE {
            frame.emotion = NO_EMOTION.to_string();
        }
    }
}

/// Majority vote over one window. Returns the winning label and its
/// representative frame: the frame number of the first row in the window
/// carrying the winner. Abstains (None) when every label is "no_emotion" or
/// when more than one label ties for the highest frequency.
fn window_vote(window: &[FrameRecord]) -> Option<(&str, i64)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for frame in window {
        if frame.emotion != NO_EMOTION {
            *counts.entry(frame.emotion.as_str()).or_insert(0) += 1;
        }
    }

    let best = counts.values().copied().max()?;
    let mut winners = counts.iter().filter(|(_, count)| **count == best);
    let (&label, _) = winners.next()?;
    if winners.next().is_some() {
        // Ambiguous window: tie-breaking by abstention.
        return None;
    }

    let representative = window.iter().find(|frame| frame.emotion == label)?.frame;
    Some((label, representative))
}

/// Shift frames for one scene. Frames are ordered by frame number; winners of
/// consecutive windows are walked in window-start order and a shift is
/// emitted whenever the winner differs from the previously emitted label.
/// Scenes shorter than the window get a single whole-scene vote.
fn scene_shift_frames(scene: &mut [FrameRecord]) -> Vec<i64> {
    scene.sort_by_key(|frame| frame.frame);

    if scene.len() < WINDOW_SIZE {
        return match window_vote(scene) {
            Some((_, representative)) => vec![representative],
            None => Vec::new(),
        };
    }

    let mut shifts = Vec::new();
    let mut previous: Option<String> = None;
    for window in scene.windows(WINDOW_SIZE) {
        if let Some((label, representative)) = window_vote(window) {
            if previous.as_deref() != Some(label) {
                shifts.push(representative);
            }
            previous = Some(label.to_string());
        }
        // Abstaining windows neither emit nor update the previous label.
    }

    shifts
}

/// The set of emitted frame numbers across all scenes. Scenes are independent;
/// their processing order does not affect the result.
pub fn detect_shift_frames(frames: &[FrameRecord]) -> BTreeSet<i64> {
    let mut scenes: BTreeMap<i64, Vec<FrameRecord>> = BTreeMap::new();
    for frame in frames {
        scenes.entry(frame.scene_id).or_default().push(frame.clone());
    }

    let mut shift_frames = BTreeSet::new();
    for (_, mut scene) in scenes {
        shift_frames.extend(scene_shift_frames(&mut scene));
    }

    shift_frames
}

/// Full pipeline: threshold, detect shifts, mark each row.
pub fn classify_frames(mut frames: Vec<FrameRecord>) -> Vec<ClassifiedFrame> {
    apply_score_thresholds(&mut frames);
    let shift_frames = detect_shift_frames(&frames);

    frames
        .into_iter()
        .map(|frame| ClassifiedFrame {
            emotion_shift: shift_frames.contains(&frame.frame),
            scene_id: frame.scene_id,
            frame: frame.frame,
            timestamp: frame.timestamp,
            score: frame.score.unwrap_or(0.0),
            emotion: frame.emotion,
        })
        .collect()
}

/// Bridge into the tag storage: every shift frame that still carries a real
/// emotion becomes one tag. Inserts are sequential and individually
/// committed; the first failure aborts the rest and already-written tags are
/// not undone.
#[instrument(skip(pool, frames))]
pub async fn persist_shift_tags(
    pool: &Pool<Sqlite>,
    frames: &[ClassifiedFrame],
    tag_list_id: i64,
    video_id: i64,
    user_id: i64,
) -> Result<u64, AppError> {
    let mut inserted = 0;
    for frame in frames {
        if frame.emotion_shift && frame.emotion != NO_EMOTION {
            add_tag(
                pool,
                &frame.emotion,
                frame.timestamp,
                tag_list_id,
                video_id,
                user_id,
            )
            .await?;
            inserted += 1;
        }
    }

    info!(inserted, "Persisted emotion shift tags");
    Ok(inserted)
}
