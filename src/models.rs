use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

/// A named, owned collection of timestamped tags spanning many videos.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TagList {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub user_id: i64,
    pub username: String, // Denormalized for convenience
    pub created_at: DateTime<Utc>,
    pub deleted: bool,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTagList {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub user_id: Option<i64>,
    pub username: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub deleted: Option<bool>,
}

impl From<DbTagList> for TagList {
    fn from(db: DbTagList) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            name: db.name.unwrap_or_default(),
            description: db.description.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            username: db.username.unwrap_or_default(),
            created_at: db
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
            deleted: db.deleted.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Video {
    pub id: i64,
    pub link: String,
    pub thumbnail: String,
    pub title: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbVideo {
    pub id: Option<i64>,
    pub link: Option<String>,
    pub thumbnail: Option<String>,
    pub title: Option<String>,
}

impl From<DbVideo> for Video {
    fn from(db: DbVideo) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            link: db.link.unwrap_or_default(),
            thumbnail: db.thumbnail.unwrap_or_default(),
            title: db.title.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub user_id: i64,
    pub tag_list_id: i64,
    pub video_id: i64,
    pub tag: String,
    pub youtube_timestamp: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTag {
    pub id: Option<i64>,
    pub user_id: Option<i64>,
    pub tag_list_id: Option<i64>,
    pub video_id: Option<i64>,
    pub tag: Option<String>,
    pub youtube_timestamp: Option<f64>,
    pub created_at: Option<NaiveDateTime>,
}

impl From<DbTag> for Tag {
    fn from(db: DbTag) -> Self {
        Self {
            id: db.id.unwrap_or_default(),
            user_id: db.user_id.unwrap_or_default(),
            tag_list_id: db.tag_list_id.unwrap_or_default(),
            video_id: db.video_id.unwrap_or_default(),
            tag: db.tag.unwrap_or_default(),
            youtube_timestamp: db.youtube_timestamp.unwrap_or_default(),
            created_at: db
                .created_at
                .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
                .unwrap_or_else(Utc::now),
        }
    }
}

/// Summary of how often one tag text appears within one tag list and on
/// which videos. Derived by aggregation, never persisted.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GroupedTag {
    pub tag: String,
    pub count: i64,
    /// Distinct video links carrying this tag, ordered by first-tagged video id.
    pub links: Vec<String>,
}

/// Summary of one video's tagging activity within one tag list.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GroupedVideo {
    pub link: String,
    pub thumbnail: String,
    pub title: String,
    pub num_tags: i64,
    /// Distinct tag texts on this video, sorted ascending.
    pub tags: Vec<String>,
}
