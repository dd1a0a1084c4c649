use sqlx::{Pool, Sqlite};
use tracing::{info, instrument};

use crate::error::AppError;

use super::schema::CURRENT_SCHEMA;

/// Applies the declarative schema. Every statement is `IF NOT EXISTS`, so
/// this is safe to run on every startup against new or existing databases.
#[instrument(skip(pool))]
pub async fn apply_schema(pool: &Pool<Sqlite>) -> Result<(), AppError> {
    info!("Applying database schema");

    sqlx::raw_sql(CURRENT_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to apply schema: {}", e)))?;

    Ok(())
}
