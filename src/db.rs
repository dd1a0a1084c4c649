use std::cmp::Reverse;

use chrono::{NaiveDateTime, Utc};
use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::auth::{DbUser, DbUserSession, User, UserSession};
use crate::error::AppError;
use crate::metadata::MetadataSource;
use crate::models::{
    DbTag, DbTagList, DbVideo, GroupedTag, GroupedVideo, Tag, TagList, Video,
};

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[instrument(skip_all, fields(username))]
pub async fn create_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<i64, AppError> {
    info!("Creating new user");

    let existing = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(format!(
            "Username '{}' already exists",
            username
        )));
    }

    let hashed_password = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    let res = sqlx::query("INSERT INTO users (username, password) VALUES (?, ?)")
        .bind(username)
        .bind(&hashed_password)
        .execute(pool)
        .await
        .map_err(|e| {
            // Two concurrent registrations can both pass the pre-check; the
            // UNIQUE constraint decides the loser.
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                AppError::Database(e)
            }
        })?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool))]
pub async fn get_user(pool: &Pool<Sqlite>, id: i64) -> Result<User, AppError> {
    info!("Fetching user by ID");
    let row = sqlx::query_as::<_, DbUser>("SELECT id, username FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(user) => Ok(User::from(user)),
        _ => Err(AppError::NotFound(format!(
            "User with id {} not found in database",
            id
        ))),
    }
}

#[instrument(skip(pool))]
pub async fn find_user_by_username(
    pool: &Pool<Sqlite>,
    username: &str,
) -> Result<Option<User>, AppError> {
    let row = sqlx::query_as::<_, DbUser>("SELECT id, username FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(User::from))
}

#[instrument(skip(pool))]
pub async fn get_user_by_username(pool: &Pool<Sqlite>, username: &str) -> Result<User, AppError> {
    info!("Getting user by username");
    find_user_by_username(pool, username).await?.ok_or_else(|| {
        AppError::NotFound(format!(
            "User with username {} not found in database",
            username
        ))
    })
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    username: String,
    password: String,
}

/// Returns the user when the password verifies, `None` otherwise. The bcrypt
/// comparison is constant-time; a missing user and a wrong password are
/// indistinguishable to the caller.
#[instrument(skip_all, fields(username))]
pub async fn authenticate_user(
    pool: &Pool<Sqlite>,
    username: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    info!("Authenticating user");
    let row =
        sqlx::query_as::<_, CredentialRow>("SELECT id, username, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(pool)
            .await?;

    match row {
        Some(row) => match bcrypt::verify(password, &row.password) {
            Ok(true) => Ok(Some(User {
                id: row.id,
                username: row.username,
            })),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

#[instrument(skip(pool, token))]
pub async fn create_user_session(
    pool: &Pool<Sqlite>,
    user_id: i64,
    token: &str,
    expires_at: NaiveDateTime,
) -> Result<i64, AppError> {
    info!("Creating user session");

    let res = sqlx::query("INSERT INTO user_sessions (user_id, token, expires_at) VALUES (?, ?, ?)")
        .bind(user_id)
        .bind(token)
        .bind(expires_at)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

#[instrument(skip(pool, token))]
pub async fn get_session_by_token(
    pool: &Pool<Sqlite>,
    token: &str,
) -> Result<UserSession, AppError> {
    let session = sqlx::query_as::<_, DbUserSession>(
        "SELECT id, user_id, token, created_at, expires_at FROM user_sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match session {
        Some(session) => Ok(UserSession::from(session)),
        _ => Err(AppError::Authentication(
            "Invalid session token".to_string(),
        )),
    }
}

#[instrument(skip(pool, token))]
pub async fn invalidate_session(pool: &Pool<Sqlite>, token: &str) -> Result<(), AppError> {
    info!("Invalidating session");

    sqlx::query("DELETE FROM user_sessions WHERE token = ?")
        .bind(token)
        .execute(pool)
        .await?;

    Ok(())
}

#[instrument(skip(pool))]
pub async fn clean_expired_sessions(pool: &Pool<Sqlite>) -> Result<u64, AppError> {
    info!("Cleaning expired sessions");

    let now = Utc::now().naive_utc();

    let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < ?")
        .bind(now)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// ---------------------------------------------------------------------------
// Tag lists
// ---------------------------------------------------------------------------

#[instrument(skip(pool))]
pub async fn create_tag_list(
    pool: &Pool<Sqlite>,
    name: &str,
    description: &str,
    user_id: i64,
) -> Result<i64, AppError> {
    info!("Creating tag list");

    if name.is_empty() {
        return Err(AppError::Validation("Name is required".to_string()));
    }

    let res = sqlx::query("INSERT INTO tag_list (name, description, user_id) VALUES (?, ?, ?)")
        .bind(name)
        .bind(description)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(res.last_insert_rowid())
}

/// Raw fetch: returns the list whether or not it has been soft-deleted.
/// Callers wanting visible-only semantics check `deleted` or use
/// [`get_tag_lists`].
#[instrument(skip(pool))]
pub async fn get_tag_list(pool: &Pool<Sqlite>, id: i64) -> Result<TagList, AppError> {
    info!("Fetching tag list");
    let row = sqlx::query_as::<_, DbTagList>(
        "SELECT tl.id, tl.name, tl.description, tl.user_id, u.username, tl.created_at, tl.deleted
         FROM tag_list tl
         JOIN users u ON tl.user_id = u.id
         WHERE tl.id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(tag_list) => Ok(TagList::from(tag_list)),
        _ => Err(AppError::NotFound(format!(
            "Tag list with id {} not found in database",
            id
        ))),
    }
}

/// All non-deleted tag lists, most recently created first. CURRENT_TIMESTAMP
/// has second resolution, so id descending breaks creation-time ties.
#[instrument(skip(pool))]
pub async fn get_tag_lists(pool: &Pool<Sqlite>) -> Result<Vec<TagList>, AppError> {
    info!("Fetching all visible tag lists");
    let rows = sqlx::query_as::<_, DbTagList>(
        "SELECT tl.id, tl.name, tl.description, tl.user_id, u.username, tl.created_at, tl.deleted
         FROM tag_list tl
         JOIN users u ON tl.user_id = u.id
         WHERE tl.deleted = FALSE
         ORDER BY tl.created_at DESC, tl.id DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TagList::from).collect())
}

#[derive(sqlx::FromRow)]
struct DeletedFlagRow {
    deleted: bool,
}

/// One-way transition. Rows are never physically removed; a second delete of
/// the same list fails, as does the loser of a concurrent double delete.
#[instrument(skip(pool))]
pub async fn delete_tag_list(pool: &Pool<Sqlite>, id: i64) -> Result<i64, AppError> {
    info!("Soft-deleting tag list");

    let row = sqlx::query_as::<_, DeletedFlagRow>("SELECT deleted FROM tag_list WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        None => Err(AppError::NotFound(format!(
            "Tag list with id {} not found in database",
            id
        ))),
        Some(row) if row.deleted => Err(AppError::AlreadyDeleted(format!(
            "Tag list with id {} is already deleted",
            id
        ))),
        Some(_) => {
            let res = sqlx::query("UPDATE tag_list SET deleted = TRUE WHERE id = ? AND deleted = FALSE")
                .bind(id)
                .execute(pool)
                .await?;

            if res.rows_affected() == 0 {
                // Lost the race with a concurrent delete.
                return Err(AppError::AlreadyDeleted(format!(
                    "Tag list with id {} is already deleted",
                    id
                )));
            }

            Ok(id)
        }
    }
}

// ---------------------------------------------------------------------------
// Videos
// ---------------------------------------------------------------------------

#[instrument(skip(pool))]
pub async fn load_video_id(pool: &Pool<Sqlite>, link: &str) -> Result<Option<i64>, AppError> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM video WHERE link = ?")
        .bind(link)
        .fetch_optional(pool)
        .await?;

    Ok(id)
}

#[instrument(skip(pool))]
pub async fn create_video_id(
    pool: &Pool<Sqlite>,
    link: &str,
    thumbnail: &str,
    title: &str,
) -> Result<i64, AppError> {
    info!("Creating video record");

    let res = sqlx::query(
        "INSERT INTO video (link, thumbnail, title) VALUES (?, ?, ?)
         ON CONFLICT(link) DO NOTHING",
    )
    .bind(link)
    .bind(thumbnail)
    .bind(title)
    .execute(pool)
    .await?;

    if res.rows_affected() > 0 {
        return Ok(res.last_insert_rowid());
    }

    // A concurrent tagger inserted the same link first; its row wins.
    load_video_id(pool, link)
        .await?
        .ok_or_else(|| AppError::Internal(format!("Video row for link {} vanished", link)))
}

/// Single logical load-or-create. Metadata is only fetched for links never
/// seen before, and a video row is never created without both a title and a
/// thumbnail.
#[instrument(skip(pool, source))]
pub async fn load_or_create_video(
    pool: &Pool<Sqlite>,
    link: &str,
    source: &dyn MetadataSource,
) -> Result<i64, AppError> {
    if let Some(id) = load_video_id(pool, link).await? {
        return Ok(id);
    }

    let metadata = source.fetch(link).await?;
    create_video_id(pool, link, &metadata.thumbnail_url, &metadata.title).await
}

#[instrument(skip(pool))]
pub async fn get_video(pool: &Pool<Sqlite>, id: i64) -> Result<Video, AppError> {
    let row = sqlx::query_as::<_, DbVideo>("SELECT id, link, thumbnail, title FROM video WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(video) => Ok(Video::from(video)),
        _ => Err(AppError::NotFound(format!(
            "Video with id {} not found in database",
            id
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tags and aggregation
// ---------------------------------------------------------------------------

#[instrument(skip(pool))]
pub async fn add_tag(
    pool: &Pool<Sqlite>,
    tag: &str,
    timestamp: f64,
    tag_list_id: i64,
    video_id: i64,
    user_id: i64,
) -> Result<i64, AppError> {
    info!("Adding tag");

    if tag.is_empty() {
        return Err(AppError::Validation("Tag is required".to_string()));
    }

    let res = sqlx::query(
        "INSERT INTO tag (tag_list_id, video_id, user_id, tag, youtube_timestamp)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(tag_list_id)
    .bind(video_id)
    .bind(user_id)
    .bind(tag)
    .bind(timestamp)
    .execute(pool)
    .await?;

    Ok(res.last_insert_rowid())
}

#[derive(sqlx::FromRow)]
struct TagLinkRow {
    tag: String,
    link: String,
}

/// Groups the list's tags by exact text match, ascending by tag text. The
/// links of each group are distinct, ordered by first-tagged video id.
#[instrument(skip(pool))]
pub async fn get_tag_list_tags(
    pool: &Pool<Sqlite>,
    tag_list_id: i64,
) -> Result<Vec<GroupedTag>, AppError> {
    info!("Grouping tags for tag list");

    let rows = sqlx::query_as::<_, TagLinkRow>(
        "SELECT t.tag, v.link
         FROM tag t
         JOIN video v ON v.id = t.video_id
         WHERE t.tag_list_id = ?
         ORDER BY t.tag ASC, v.id ASC",
    )
    .bind(tag_list_id)
    .fetch_all(pool)
    .await?;

    let mut grouped: Vec<GroupedTag> = Vec::new();
    for row in rows {
        match grouped.last_mut() {
            Some(group) if group.tag == row.tag => {
                group.count += 1;
                if !group.links.contains(&row.link) {
                    group.links.push(row.link);
                }
            }
            _ => grouped.push(GroupedTag {
                tag: row.tag,
                count: 1,
                links: vec![row.link],
            }),
        }
    }

    Ok(grouped)
}

#[derive(sqlx::FromRow)]
struct VideoTagRow {
    video_id: i64,
    link: String,
    thumbnail: String,
    title: String,
    tag: String,
}

/// Groups the list's tags by video, most-tagged first. Ties on tag count are
/// broken by video id ascending; the tag texts of each video are distinct and
/// sorted ascending.
#[instrument(skip(pool))]
pub async fn get_tag_list_videos(
    pool: &Pool<Sqlite>,
    tag_list_id: i64,
) -> Result<Vec<GroupedVideo>, AppError> {
    info!("Grouping videos for tag list");

    let rows = sqlx::query_as::<_, VideoTagRow>(
        "SELECT v.id AS video_id, v.link, v.thumbnail, v.title, t.tag
         FROM tag t
         JOIN video v ON v.id = t.video_id
         WHERE t.tag_list_id = ?
         ORDER BY v.id ASC, t.id ASC",
    )
    .bind(tag_list_id)
    .fetch_all(pool)
    .await?;

    let mut grouped: Vec<(i64, GroupedVideo)> = Vec::new();
    for row in rows {
        match grouped.last_mut() {
            Some((video_id, group)) if *video_id == row.video_id => {
                group.num_tags += 1;
                if !group.tags.contains(&row.tag) {
                    group.tags.push(row.tag);
                }
            }
            _ => grouped.push((
                row.video_id,
                GroupedVideo {
                    link: row.link,
                    thumbnail: row.thumbnail,
                    title: row.title,
                    num_tags: 1,
                    tags: vec![row.tag],
                },
            )),
        }
    }

    for (_, group) in grouped.iter_mut() {
        group.tags.sort();
    }

    grouped.sort_by_key(|(video_id, group)| (Reverse(group.num_tags), *video_id));

    Ok(grouped.into_iter().map(|(_, group)| group).collect())
}

/// All tags for one video within one list, ascending by timestamp.
#[instrument(skip(pool))]
pub async fn get_video_tags(
    pool: &Pool<Sqlite>,
    video_id: i64,
    tag_list_id: i64,
) -> Result<Vec<Tag>, AppError> {
    info!("Fetching video tags");

    let rows = sqlx::query_as::<_, DbTag>(
        "SELECT t.id, t.user_id, t.tag_list_id, t.video_id, t.tag, t.youtube_timestamp, t.created_at
         FROM tag t
         WHERE t.tag_list_id = ? AND t.video_id = ?
         ORDER BY t.youtube_timestamp ASC",
    )
    .bind(tag_list_id)
    .bind(video_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Tag::from).collect())
}
