use std::sync::Arc;

use rocket::{Build, Rocket, launch, tokio};
use sqlx::SqlitePool;
use tracing::{error, info};

use videobookmarks::database::apply_schema;
use videobookmarks::db::clean_expired_sessions;
use videobookmarks::metadata::{MetadataSource, YouTubeMetadataSource};
use videobookmarks::telemetry::init_tracing;

#[launch]
async fn rocket() -> Rocket<Build> {
    init_tracing();

    let database_url = std::env::var("DATABASE_URL").unwrap_or_default();

    let pool = SqlitePool::connect(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    info!("Applying database schema...");
    if let Err(e) = apply_schema(&pool).await {
        error!("Failed to apply schema: {}", e);
        panic!("Database schema setup failed: {}", e);
    }

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    let api_key = std::env::var("YT_API_KEY").expect("YT_API_KEY not set");
    let metadata: Arc<dyn MetadataSource> = Arc::new(YouTubeMetadataSource::new(api_key));

    info!("Starting videobookmarks");
    videobookmarks::build_rocket(pool, metadata)
}
