//! Database access shared by SchoolDoor services
//!
//! Opens the SQLite database and creates the tables used by the discovery
//! pipeline if they do not exist yet.

use crate::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;

    init_tables(&pool).await?;

    Ok(pool)
}

/// Create discovery tables if they don't exist
async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discovery_jobs (
            job_id TEXT PRIMARY KEY,
            region TEXT NOT NULL,
            status TEXT NOT NULL,
            schools_found INTEGER NOT NULL DEFAULT 0,
            schools_processed INTEGER NOT NULL DEFAULT 0,
            message TEXT,
            created_at TEXT NOT NULL,
            completed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schools (
            school_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            address TEXT,
            city TEXT,
            state TEXT,
            postal_code TEXT,
            country TEXT,
            phone TEXT,
            email TEXT,
            website TEXT,
            school_type TEXT,
            board TEXT,
            grade_levels TEXT,
            enrollment REAL,
            student_teacher_ratio REAL,
            medium_of_instruction TEXT,
            principal_name TEXT,
            programs TEXT,
            facilities TEXT,
            board_exam_results TEXT,
            competitive_exam_results TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT,
            last_synced_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_schools_city ON schools (city)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_schools_name ON schools (name)")
        .execute(pool)
        .await?;

    tracing::info!("Database tables initialized (discovery_jobs, schools)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_tables() {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database_pool(&dir.path().join("test.db"))
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
             AND name IN ('discovery_jobs', 'schools')",
        )
        .fetch_one(&pool)
        .await
        .unwrap();

        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let pool = init_database_pool(&path).await.unwrap();
        drop(pool);
        // Second open against the same file must not fail
        init_database_pool(&path).await.unwrap();
    }
}
