#[cfg(test)]
pub mod test_utils {
    use crate::database::apply_schema;
    use crate::db::{add_tag, create_tag_list, create_user, create_video_id};
    use crate::error::AppError;
    use crate::metadata::{MetadataSource, VideoMetadata};
    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::{Pool, Sqlite, SqlitePool};
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::Once;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    pub static FAKE_TITLE: &str = "fake youtube title";
    pub static FAKE_THUMBNAIL: &str = "fakethumbnailurl.com";

    /// Canned metadata source: answers every known link with fixed metadata,
    /// or every link at all when built with `with_default`.
    pub struct StaticMetadataSource {
        entries: HashMap<String, VideoMetadata>,
        default: Option<VideoMetadata>,
    }

    impl StaticMetadataSource {
        pub fn with_default() -> Self {
            Self {
                entries: HashMap::new(),
                default: Some(VideoMetadata {
                    title: FAKE_TITLE.to_string(),
                    thumbnail_url: FAKE_THUMBNAIL.to_string(),
                }),
            }
        }

        pub fn empty() -> Self {
            Self {
                entries: HashMap::new(),
                default: None,
            }
        }

        pub fn with_entry(mut self, link: &str, title: &str, thumbnail_url: &str) -> Self {
            self.entries.insert(
                link.to_string(),
                VideoMetadata {
                    title: title.to_string(),
                    thumbnail_url: thumbnail_url.to_string(),
                },
            );
            self
        }
    }

    #[rocket::async_trait]
    impl MetadataSource for StaticMetadataSource {
        async fn fetch(&self, link: &str) -> Result<VideoMetadata, AppError> {
            self.entries
                .get(link)
                .cloned()
                .or_else(|| self.default.clone())
                .ok_or_else(|| {
                    AppError::ExternalService(format!("No metadata found for video {}", link))
                })
        }
    }

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        tag_lists: Vec<TestTagList>,
        videos: Vec<TestVideo>,
        tags: Vec<TestTag>,
    }

    pub struct TestUser {
        pub username: String,
        pub password: String,
    }

    pub struct TestTagList {
        pub name: String,
        pub description: String,
        pub owner_username: String,
    }

    pub struct TestVideo {
        pub link: String,
        pub thumbnail: String,
        pub title: String,
    }

    pub struct TestTag {
        pub tag: String,
        pub timestamp: f64,
        pub tag_list_name: String,
        pub video_link: String,
        pub username: String,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn user(mut self, username: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                password: STANDARD_PASSWORD.to_string(),
            });
            self
        }

        pub fn user_with_password(mut self, username: &str, password: &str) -> Self {
            self.users.push(TestUser {
                username: username.to_string(),
                password: password.to_string(),
            });
            self
        }

        pub fn tag_list(mut self, name: &str, description: &str, owner_username: &str) -> Self {
            self.tag_lists.push(TestTagList {
                name: name.to_string(),
                description: description.to_string(),
                owner_username: owner_username.to_string(),
            });
            self
        }

        pub fn video(mut self, link: &str) -> Self {
            self.videos.push(TestVideo {
                link: link.to_string(),
                thumbnail: FAKE_THUMBNAIL.to_string(),
                title: FAKE_TITLE.to_string(),
            });
            self
        }

        pub fn tag(
            mut self,
            tag: &str,
            timestamp: f64,
            tag_list_name: &str,
            video_link: &str,
            username: &str,
        ) -> Self {
            self.tags.push(TestTag {
                tag: tag.to_string(),
                timestamp,
                tag_list_name: tag_list_name.to_string(),
                video_link: video_link.to_string(),
                username: username.to_string(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder().is_test(true).try_init();
            });

            let pool = SqlitePool::connect("sqlite::memory:").await?;

            apply_schema(&pool).await?;

            let mut user_id_map: HashMap<String, i64> = HashMap::new();
            let mut tag_list_id_map: HashMap<String, i64> = HashMap::new();
            let mut video_id_map: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let user_id = create_user(&pool, &user.username, &user.password).await?;
                user_id_map.insert(user.username.clone(), user_id);
            }

            for tag_list in &self.tag_lists {
                let owner_id = user_id_map
                    .get(&tag_list.owner_username)
                    .copied()
                    .ok_or_else(|| {
                        AppError::Internal(format!(
                            "Test fixture references unknown user {}",
                            tag_list.owner_username
                        ))
                    })?;

                let tag_list_id =
                    create_tag_list(&pool, &tag_list.name, &tag_list.description, owner_id)
                        .await?;
                tag_list_id_map.insert(tag_list.name.clone(), tag_list_id);
            }

            for video in &self.videos {
                let video_id =
                    create_video_id(&pool, &video.link, &video.thumbnail, &video.title).await?;
                video_id_map.insert(video.link.clone(), video_id);
            }

            for tag in &self.tags {
                let tag_list_id = tag_list_id_map.get(&tag.tag_list_name).copied().ok_or_else(
                    || {
                        AppError::Internal(format!(
                            "Test fixture references unknown tag list {}",
                            tag.tag_list_name
                        ))
                    },
                )?;
                let video_id = video_id_map.get(&tag.video_link).copied().ok_or_else(|| {
                    AppError::Internal(format!(
                        "Test fixture references unknown video {}",
                        tag.video_link
                    ))
                })?;
                let user_id = user_id_map.get(&tag.username).copied().ok_or_else(|| {
                    AppError::Internal(format!(
                        "Test fixture references unknown user {}",
                        tag.username
                    ))
                })?;

                add_tag(&pool, &tag.tag, tag.timestamp, tag_list_id, video_id, user_id).await?;
            }

            Ok(TestDb {
                pool,
                user_id_map,
                tag_list_id_map,
                video_id_map,
            })
        }
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub user_id_map: HashMap<String, i64>,
        pub tag_list_id_map: HashMap<String, i64>,
        pub video_id_map: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn user_id(&self, username: &str) -> Option<i64> {
            self.user_id_map.get(username).copied()
        }

        pub fn tag_list_id(&self, name: &str) -> Option<i64> {
            self.tag_list_id_map.get(name).copied()
        }

        pub fn video_id(&self, link: &str) -> Option<i64> {
            self.video_id_map.get(link).copied()
        }
    }

    pub async fn setup_test_client(test_db: &TestDb) -> Client {
        let rocket = crate::build_rocket(
            test_db.pool.clone(),
            Arc::new(StaticMetadataSource::with_default()),
        );

        Client::tracked(rocket)
            .await
            .expect("Failed to build test client")
    }

    pub async fn login_test_user(
        client: &Client,
        username: &str,
        password: &str,
    ) -> Vec<Cookie<'static>> {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": password
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);

        response
            .cookies()
            .iter()
            .map(|c| c.clone().into_owned())
            .collect()
    }
}
