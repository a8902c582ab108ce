//! Database initialization
//!
//! Creates the database file on first run and the three tables the service
//! uses. Every statement is idempotent so startup can run it unconditionally.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long a connection waits on SQLite's writer lock before failing
pub const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Options are applied to every pooled connection
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(8)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_entries_table(pool).await?;
    create_spark_entries_table(pool).await?;
    create_spark_scores_table(pool).await?;
    Ok(())
}

/// Create the entries table
///
/// `image_urls` holds `||`-joined paths relative to the data root.
pub async fn create_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            created_at TEXT NOT NULL,
            student_name TEXT NOT NULL,
            email TEXT NOT NULL,
            grp TEXT NOT NULL,
            artifact_title TEXT NOT NULL,
            artifact_desc TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '',
            reflection_q1 TEXT NOT NULL DEFAULT '',
            reflection_q2 TEXT NOT NULL DEFAULT '',
            reflection_q3 TEXT NOT NULL DEFAULT '',
            image_urls TEXT NOT NULL DEFAULT '',
            audio_url TEXT NOT NULL DEFAULT '',
            suno_link TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_entries_created_at ON entries(created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the SPARK checkpoint table
///
/// Section columns are NULL until that section is first saved. List and
/// object sub-fields are stored as JSON text.
pub async fn create_spark_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS spark_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            team TEXT,
            sensing_snapshot TEXT,
            sensing_valence TEXT,
            sensing_evidence_url TEXT,
            probing_hypothesis TEXT,
            probing_data_plan TEXT,
            acting_decisions TEXT,
            acting_learnings TEXT,
            acting_changes TEXT,
            reflecting_tension TEXT,
            reflecting_assumption TEXT,
            knowing_insights TEXT,
            knowing_sdg TEXT,
            knowing_next_action TEXT,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_spark_entries_email ON spark_entries(email)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the rubric scores table (one row per email)
pub async fn create_spark_scores_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS spark_scores (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL UNIQUE,
            rubric TEXT NOT NULL,
            comments TEXT NOT NULL DEFAULT '',
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
