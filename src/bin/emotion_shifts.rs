use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use sqlx::SqlitePool;
use tracing::info;

use videobookmarks::emotion::{classify_frames, load_frames, persist_shift_tags};
use videobookmarks::telemetry::init_tracing;

/// Detects emotion shifts in a labeled-frame dataset and writes one tag per
/// shift into an existing tag list.
#[derive(Parser)]
#[command(name = "emotion_shifts")]
struct Args {
    /// CSV dataset of per-frame emotion predictions
    #[arg(long)]
    dataset: PathBuf,

    /// Tag list receiving the shift tags
    #[arg(long)]
    tag_list_id: i64,

    /// Video the dataset frames belong to
    #[arg(long)]
    video_id: i64,

    /// User the tags are attributed to
    #[arg(long)]
    user_id: i64,

    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args = Args::parse();

    let frames = load_frames(&args.dataset)
        .with_context(|| format!("Failed to load dataset {}", args.dataset.display()))?;
    info!(frames = frames.len(), "Loaded emotion dataset");

    let classified = classify_frames(frames);
    let shifts = classified.iter().filter(|f| f.emotion_shift).count();
    info!(shifts, "Detected emotion shifts");

    let pool = SqlitePool::connect(&args.database_url)
        .await
        .context("Failed to connect to database")?;

    let inserted = persist_shift_tags(
        &pool,
        &classified,
        args.tag_list_id,
        args.video_id,
        args.user_id,
    )
    .await
    .context("Failed to persist shift tags")?;

    info!(inserted, "Batch run complete");
    Ok(())
}
