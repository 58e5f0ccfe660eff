//! Discovery job execution
//!
//! Runs one discovery job end to end: query the upstream search service,
//! parse and clean the response, reconcile each candidate into the school
//! store. The job row is persisted after every candidate so API polls see
//! live progress. A candidate that fails to reconcile is recorded and
//! skipped; the job keeps going. Any error that escapes the pipeline is
//! caught at the top level and marks the job Failed.

use crate::db::{jobs, schools};
use crate::models::{DiscoveryJob, JobStatus, MergeOutcome};
use crate::services::record_cleaner::clean_candidates;
use crate::services::response_parser::extract_candidates;
use crate::services::search_client::SearchClient;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;
use schooldoor_common::{Error, Result};

/// How many per-candidate error details are included in the final
/// job message.
const ERROR_DETAIL_LIMIT: usize = 5;

/// Drives discovery jobs against the school store.
pub struct JobRunner {
    db: SqlitePool,
    search_client: Arc<SearchClient>,
}

impl JobRunner {
    pub fn new(db: SqlitePool, search_client: Arc<SearchClient>) -> Self {
        Self { db, search_client }
    }

    /// Run a job to completion. Never returns an error to the caller;
    /// failures are recorded on the job row itself.
    pub async fn run(&self, job_id: Uuid) {
        let mut job = match jobs::load_job(&self.db, job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::error!(job_id = %job_id, "Discovery job vanished before execution");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, error = %e, "Failed to load discovery job");
                return;
            }
        };

        if let Err(e) = self.execute(&mut job).await {
            tracing::error!(job_id = %job_id, region = %job.region, error = %e,
                "Discovery job failed");
            job.transition_to(JobStatus::Failed);
            job.set_message(&format!("Discovery failed: {}", e));
            if let Err(save_err) = jobs::save_job(&self.db, &job).await {
                tracing::error!(job_id = %job_id, error = %save_err,
                    "Failed to persist failed job state");
            }
        }
    }

    async fn execute(&self, job: &mut DiscoveryJob) -> Result<()> {
        job.transition_to(JobStatus::Running);
        job.message = None;
        jobs::save_job(&self.db, job).await?;

        tracing::info!(job_id = %job.job_id, region = %job.region, "Starting school discovery");

        let known_names = schools::school_names_in_region(&self.db, &job.region).await?;
        let content = self
            .search_client
            .search_region(&job.region, &known_names)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        let candidates = clean_candidates(extract_candidates(&content), &job.region);

        if candidates.is_empty() {
            job.transition_to(JobStatus::Failed);
            job.set_message(&format!(
                "No schools found in {}. Please try a different region or check the spelling.",
                job.region
            ));
            jobs::save_job(&self.db, job).await?;
            return Ok(());
        }

        job.schools_found = candidates.len() as u32;
        job.set_message(&format!(
            "Found {} schools. Processing data...",
            candidates.len()
        ));
        jobs::save_job(&self.db, job).await?;

        let mut created = 0u32;
        let mut updated = 0u32;
        let mut unchanged = 0u32;
        let mut errors: Vec<String> = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            job.set_message(&format!(
                "Processing school {}/{}: {}",
                index + 1,
                candidates.len(),
                candidate.name
            ));

            match crate::services::reconciler::reconcile(&self.db, candidate).await {
                Ok(MergeOutcome::Created) => created += 1,
                Ok(MergeOutcome::Updated) => updated += 1,
                Ok(MergeOutcome::Unchanged) => unchanged += 1,
                Err(e) => {
                    tracing::warn!(job_id = %job.job_id, school = %candidate.name, error = %e,
                        "Failed to reconcile school, skipping");
                    errors.push(format!("{}: {}", candidate.name, e));
                }
            }

            // Progress is visible to pollers after every candidate
            job.schools_processed += 1;
            jobs::save_job(&self.db, job).await?;
        }

        job.transition_to(JobStatus::Completed);
        job.set_message(&summary_message(created, updated, &errors));
        jobs::save_job(&self.db, job).await?;

        tracing::info!(job_id = %job.job_id, region = %job.region,
            created, updated, unchanged, errors = errors.len(),
            "Discovery job completed");

        Ok(())
    }
}

fn summary_message(created: u32, updated: u32, errors: &[String]) -> String {
    if errors.is_empty() {
        format!("Successfully completed! Created: {}, Updated: {}", created, updated)
    } else {
        let shown: Vec<&str> = errors
            .iter()
            .take(ERROR_DETAIL_LIMIT)
            .map(String::as_str)
            .collect();
        format!(
            "Completed with {} errors. Created: {}, Updated: {}, Errors: {}. First errors: {}",
            errors.len(),
            created,
            updated,
            errors.len(),
            shown.join("; ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::search_client::{
        ChatChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, SearchClient,
        SearchError, SearchTransport,
    };
    use async_trait::async_trait;
    use schooldoor_common::config::SearchConfig;
    use schooldoor_common::db::init_database_pool;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CannedTransport {
        content: String,
        calls: AtomicU32,
    }

    impl CannedTransport {
        fn new(content: &str) -> Self {
            Self {
                content: content.to_string(),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SearchTransport for CannedTransport {
        async fn complete(
            &self,
            _request: &ChatCompletionRequest,
        ) -> std::result::Result<ChatCompletionResponse, SearchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ChatCompletionResponse {
                choices: vec![ChatChoice {
                    message: ChatMessage {
                        role: "assistant".to_string(),
                        content: self.content.clone(),
                    },
                }],
            })
        }
    }

    async fn runner_with(content: &str) -> (tempfile::TempDir, SqlitePool, JobRunner) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_database_pool(&dir.path().join("test.db")).await.unwrap();
        let transport = Arc::new(CannedTransport::new(content));
        let client = Arc::new(SearchClient::new(transport, &SearchConfig::default()));
        let runner = JobRunner::new(pool.clone(), client);
        (dir, pool, runner)
    }

    #[tokio::test]
    async fn run_completes_and_records_progress() {
        let content = r#"[
            {"name": "DPS", "city": "Pune", "phone": "+91 20 5550 0000"},
            {"name": "Symbiosis School", "city": "Pune"}
        ]"#;
        let (_dir, pool, runner) = runner_with(content).await;

        let job = DiscoveryJob::new("Pune".to_string());
        jobs::save_job(&pool, &job).await.unwrap();
        runner.run(job.job_id).await;

        let done = jobs::load_job(&pool, job.job_id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.schools_found, 2);
        assert_eq!(done.schools_processed, 2);
        assert!(done.completed_at.is_some());
        assert_eq!(
            done.message.as_deref(),
            Some("Successfully completed! Created: 2, Updated: 0")
        );

        assert!(schools::find_by_name_city(&pool, "DPS", "Pune")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn empty_result_fails_with_guidance() {
        let (_dir, pool, runner) = runner_with("[]").await;

        let job = DiscoveryJob::new("Atlantis".to_string());
        jobs::save_job(&pool, &job).await.unwrap();
        runner.run(job.job_id).await;

        let done = jobs::load_job(&pool, job.job_id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.schools_found, 0);
        assert!(done
            .message
            .as_deref()
            .unwrap()
            .starts_with("No schools found in Atlantis."));
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn rerun_merges_instead_of_duplicating() {
        let content = r#"[{"name": "DPS", "city": "Pune", "phone": "+91 20 5550 0000"}]"#;
        let (_dir, pool, runner) = runner_with(content).await;

        let first = DiscoveryJob::new("Pune".to_string());
        jobs::save_job(&pool, &first).await.unwrap();
        runner.run(first.job_id).await;

        let second = DiscoveryJob::new("Pune".to_string());
        jobs::save_job(&pool, &second).await.unwrap();
        runner.run(second.job_id).await;

        let done = jobs::load_job(&pool, second.job_id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        // Identical data the second time: no create, no update
        assert_eq!(
            done.message.as_deref(),
            Some("Successfully completed! Created: 0, Updated: 0")
        );
    }

    #[tokio::test]
    async fn fatal_search_error_marks_job_failed() {
        struct FailingTransport;

        #[async_trait]
        impl SearchTransport for FailingTransport {
            async fn complete(
                &self,
                _request: &ChatCompletionRequest,
            ) -> std::result::Result<ChatCompletionResponse, SearchError> {
                Err(SearchError::InvalidApiKey)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let pool = init_database_pool(&dir.path().join("test.db")).await.unwrap();
        let client = Arc::new(SearchClient::new(
            Arc::new(FailingTransport),
            &SearchConfig::default(),
        ));
        let runner = JobRunner::new(pool.clone(), client);

        let job = DiscoveryJob::new("Pune".to_string());
        jobs::save_job(&pool, &job).await.unwrap();
        runner.run(job.job_id).await;

        let done = jobs::load_job(&pool, job.job_id).await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Failed);
        assert!(done.message.as_deref().unwrap().starts_with("Discovery failed:"));
    }
}
