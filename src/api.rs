use std::sync::Arc;

use rocket::State;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{delete, get, post};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use validator::Validate;

use crate::auth::{User, UserSession, authorize_tag_list_mutation};
use crate::db::{
    add_tag, authenticate_user, create_tag_list, create_user, create_user_session,
    delete_tag_list, get_tag_list, get_tag_list_tags, get_tag_list_videos, get_tag_lists,
    get_video_tags, invalidate_session, load_or_create_video,
};
use crate::error::AppError;
use crate::metadata::MetadataSource;
use crate::models::{GroupedTag, GroupedVideo, TagList};
use crate::validation::{AppErrorExt, JsonValidateExt, ToValidationResponse, ValidationResponse};

#[derive(Deserialize, Validate, Clone)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[post("/register", data = "<registration>")]
pub async fn api_register_user(
    registration: Json<RegisterRequest>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, Custom<Json<ValidationResponse>>> {
    let validated = registration.validate_custom()?;

    match create_user(db, &validated.username, &validated.password).await {
        Ok(_) => Ok(Status::Created),
        Err(AppError::Conflict(_)) => Err(Custom(
            Status::Conflict,
            Json(ValidationResponse::with_error(
                "username",
                &format!("User {} is already registered", validated.username),
            )),
        )),
        Err(e) => Err(e.to_validation_response()),
    }
}

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: Option<UserData>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct UserData {
    pub id: i64,
    pub username: String,
}

impl From<User> for UserData {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
        }
    }
}

#[post("/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    use chrono::Utc;
    use rocket::http::{Cookie, SameSite};

    match authenticate_user(db, &login.username, &login.password)
        .await
        .validate_custom()?
    {
        Some(user) => {
            let token = UserSession::generate_token();
            let expires_at = Utc::now() + chrono::Duration::hours(1);

            create_user_session(db, user.id, &token, expires_at.naive_utc())
                .await
                .validate_custom()?;

            let cookie = Cookie::build(("session_token", token))
                .same_site(SameSite::Lax)
                .http_only(true)
                .max_age(rocket::time::Duration::hours(1));
            cookies.add_private(cookie);

            cookies.add_private(
                Cookie::build(("logged_in", login.username.clone()))
                    .same_site(SameSite::Lax)
                    .max_age(rocket::time::Duration::hours(1)),
            );

            Ok(Json(LoginResponse {
                success: true,
                user: Some(UserData::from(user)),
                error: None,
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            user: None,
            error: Some("Invalid username or password".to_string()),
        })),
    }
}

#[post("/logout")]
pub async fn api_logout(
    cookies: &rocket::http::CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Status {
    let token = cookies
        .get_private("session_token")
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        let _ = invalidate_session(db, &token).await;
    }

    cookies.remove_private(rocket::http::Cookie::build("session_token"));
    cookies.remove_private(rocket::http::Cookie::build("logged_in"));

    Status::Ok
}

#[get("/me")]
pub async fn api_me(user: User) -> Json<UserData> {
    Json(UserData::from(user))
}

#[get("/me", rank = 2)]
pub async fn api_me_unauthorized() -> Status {
    Status::Unauthorized
}

#[get("/tag_lists")]
pub async fn api_get_tag_lists(db: &State<Pool<Sqlite>>) -> Result<Json<Vec<TagList>>, AppError> {
    let tag_lists = get_tag_lists(db).await?;
    Ok(Json(tag_lists))
}

#[derive(Deserialize, Validate, Clone)]
pub struct CreateTagListRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[post("/tag_lists", data = "<request>")]
pub async fn api_create_tag_list(
    request: Json<CreateTagListRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CreatedResponse>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    let id = create_tag_list(db, &validated.name, &validated.description, user.id)
        .await
        .validate_custom()?;

    Ok(Json(CreatedResponse { id }))
}

#[get("/tag_lists/<id>")]
pub async fn api_get_tag_list(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<TagList>, AppError> {
    let tag_list = get_tag_list(db, id).await?;
    Ok(Json(tag_list))
}

#[delete("/tag_lists/<id>")]
pub async fn api_delete_tag_list(
    id: i64,
    user: User,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<CreatedResponse>, AppError> {
    let tag_list = get_tag_list(db, id).await?;
    authorize_tag_list_mutation(&tag_list, user.id)?;

    let id = delete_tag_list(db, id).await?;
    Ok(Json(CreatedResponse { id }))
}

#[get("/tag_lists/<id>/tags")]
pub async fn api_get_tag_list_tags(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<GroupedTag>>, AppError> {
    get_tag_list(db, id).await?;
    let tags = get_tag_list_tags(db, id).await?;
    Ok(Json(tags))
}

#[get("/tag_lists/<id>/videos")]
pub async fn api_get_tag_list_videos(
    id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<GroupedVideo>>, AppError> {
    get_tag_list(db, id).await?;
    let videos = get_tag_list_videos(db, id).await?;
    Ok(Json(videos))
}

#[derive(Serialize, Deserialize)]
pub struct VideoTagResponse {
    pub tag: String,
    pub timestamp: f64,
}

#[get("/tag_lists/<tag_list_id>/videos/<video_id>/tags")]
pub async fn api_get_video_tags(
    tag_list_id: i64,
    video_id: i64,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<VideoTagResponse>>, AppError> {
    let tags = get_video_tags(db, video_id, tag_list_id).await?;

    Ok(Json(
        tags.into_iter()
            .map(|t| VideoTagResponse {
                tag: t.tag,
                timestamp: t.youtube_timestamp,
            })
            .collect(),
    ))
}

#[derive(Deserialize, Validate, Clone)]
pub struct AddTagRequest {
    #[validate(length(min = 1, message = "Tag is required"))]
    pub tag: String,
    #[validate(range(min = 0.0, message = "Timestamp must be non-negative"))]
    pub timestamp: f64,
    #[validate(length(min = 1, message = "Video link is required"))]
    pub video_link: String,
}

#[post("/tag_lists/<id>/tags", data = "<request>")]
pub async fn api_add_tag(
    id: i64,
    request: Json<AddTagRequest>,
    user: User,
    db: &State<Pool<Sqlite>>,
    metadata: &State<Arc<dyn MetadataSource>>,
) -> Result<Json<CreatedResponse>, Custom<Json<ValidationResponse>>> {
    let validated = request.validate_custom()?;

    let tag_list = get_tag_list(db, id).await.validate_custom()?;
    if tag_list.deleted {
        // A retired list is indistinguishable from an absent one.
        return Err(AppError::NotFound(format!(
            "Tag list with id {} not found in database",
            id
        ))
        .to_validation_response());
    }

    let video_id = load_or_create_video(db, &validated.video_link, metadata.inner().as_ref())
        .await
        .validate_custom()?;

    let tag_id = add_tag(db, &validated.tag, validated.timestamp, id, video_id, user.id)
        .await
        .validate_custom()?;

    Ok(Json(CreatedResponse { id: tag_id }))
}

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
