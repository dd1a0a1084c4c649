use std::sync::Arc;

use rocket::{Build, Rocket, catchers, routes};
use sqlx::SqlitePool;

pub mod api;
pub mod auth;
pub mod database;
pub mod db;
pub mod emotion;
pub mod error;
pub mod metadata;
pub mod models;
pub mod telemetry;
pub mod validation;

#[cfg(test)]
mod test;

use api::{
    api_add_tag, api_create_tag_list, api_delete_tag_list, api_get_tag_list,
    api_get_tag_list_tags, api_get_tag_list_videos, api_get_tag_lists, api_get_video_tags,
    api_login, api_logout, api_me, api_me_unauthorized, api_register_user, health,
};
use auth::unauthorized_api;
use metadata::MetadataSource;

pub fn build_rocket(pool: SqlitePool, metadata: Arc<dyn MetadataSource>) -> Rocket<Build> {
    rocket::build()
        .manage(pool)
        .manage(metadata)
        .mount(
            "/api",
            routes![
                api_register_user,
                api_login,
                api_logout,
                api_me,
                api_me_unauthorized,
                api_get_tag_lists,
                api_create_tag_list,
                api_get_tag_list,
                api_delete_tag_list,
                api_get_tag_list_tags,
                api_get_tag_list_videos,
                api_get_video_tags,
                api_add_tag,
                health,
            ],
        )
        .register("/api", catchers![unauthorized_api])
}
