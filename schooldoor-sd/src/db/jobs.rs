//! Discovery job persistence

use crate::models::{DiscoveryJob, JobStatus};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;
use schooldoor_common::{Error, Result};

fn status_to_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> Result<JobStatus> {
    match s {
        "pending" => Ok(JobStatus::Pending),
        "running" => Ok(JobStatus::Running),
        "completed" => Ok(JobStatus::Completed),
        "failed" => Ok(JobStatus::Failed),
        other => Err(Error::Internal(format!("Unknown job status: {}", other))),
    }
}

fn job_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<DiscoveryJob> {
    let job_id: String = row.get("job_id");
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|e| Error::Internal(format!("Failed to parse job_id: {}", e)))?;

    let status: String = row.get("status");
    let status = status_from_str(&status)?;

    let created_at: String = row.get("created_at");
    let created_at = chrono::DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| Error::Internal(format!("Failed to parse created_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let completed_at: Option<String> = row.get("completed_at");
    let completed_at = completed_at
        .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse completed_at: {}", e)))?
        .map(|dt| dt.with_timezone(&chrono::Utc));

    Ok(DiscoveryJob {
        job_id,
        region: row.get("region"),
        status,
        schools_found: row.get::<i64, _>("schools_found") as u32,
        schools_processed: row.get::<i64, _>("schools_processed") as u32,
        message: row.get("message"),
        created_at,
        completed_at,
    })
}

/// Save job to database (insert or update)
pub async fn save_job(pool: &SqlitePool, job: &DiscoveryJob) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO discovery_jobs (
            job_id, region, status, schools_found, schools_processed,
            message, created_at, completed_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(job_id) DO UPDATE SET
            status = excluded.status,
            schools_found = excluded.schools_found,
            schools_processed = excluded.schools_processed,
            message = excluded.message,
            completed_at = excluded.completed_at
        "#,
    )
    .bind(job.job_id.to_string())
    .bind(&job.region)
    .bind(status_to_str(job.status))
    .bind(job.schools_found as i64)
    .bind(job.schools_processed as i64)
    .bind(&job.message)
    .bind(job.created_at.to_rfc3339())
    .bind(job.completed_at.map(|dt| dt.to_rfc3339()))
    .execute(pool)
    .await?;

    Ok(())
}

/// Load job by id
pub async fn load_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<DiscoveryJob>> {
    let row = sqlx::query(
        r#"
        SELECT job_id, region, status, schools_found, schools_processed,
               message, created_at, completed_at
        FROM discovery_jobs
        WHERE job_id = ?
        "#,
    )
    .bind(job_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(job_from_row).transpose()
}

/// List jobs, most recent first
pub async fn list_jobs(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<DiscoveryJob>> {
    let rows = sqlx::query(
        r#"
        SELECT job_id, region, status, schools_found, schools_processed,
               message, created_at, completed_at
        FROM discovery_jobs
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(job_from_row).collect()
}

/// Delete job by id; returns whether a row was removed
pub async fn delete_job(pool: &SqlitePool, job_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM discovery_jobs WHERE job_id = ?")
        .bind(job_id.to_string())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Aggregate view across all jobs
#[derive(Debug, Serialize)]
pub struct JobOverview {
    pub total_jobs: i64,
    pub jobs_by_status: HashMap<String, i64>,
    pub total_schools_found: i64,
    pub total_schools_processed: i64,
    pub recent_jobs: Vec<DiscoveryJob>,
}

/// Compute counts by status and discovery totals across all jobs
pub async fn overview(pool: &SqlitePool) -> Result<JobOverview> {
    let total_jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discovery_jobs")
        .fetch_one(pool)
        .await?;

    let status_rows = sqlx::query(
        "SELECT status, COUNT(*) AS count FROM discovery_jobs GROUP BY status",
    )
    .fetch_all(pool)
    .await?;

    let mut jobs_by_status = HashMap::new();
    for row in &status_rows {
        jobs_by_status.insert(row.get::<String, _>("status"), row.get::<i64, _>("count"));
    }

    let (total_schools_found, total_schools_processed): (Option<i64>, Option<i64>) =
        sqlx::query_as(
            "SELECT SUM(schools_found), SUM(schools_processed) FROM discovery_jobs",
        )
        .fetch_one(pool)
        .await?;

    let recent_jobs = list_jobs(pool, 5, 0).await?;

    Ok(JobOverview {
        total_jobs,
        jobs_by_status,
        total_schools_found: total_schools_found.unwrap_or(0),
        total_schools_processed: total_schools_processed.unwrap_or(0),
        recent_jobs,
    })
}
