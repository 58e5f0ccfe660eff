//! Discovery job state machine
//!
//! A job progresses Pending → Running → {Completed, Failed}. Terminal
//! states are only left via an explicit reset back to Pending.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discovery job status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, not yet started (or reset for retry)
    Pending,
    /// Background task is executing the pipeline
    Running,
    /// Run finished; individual candidates may still have failed
    Completed,
    /// Search produced nothing, upstream failed fatally, or an
    /// internal error escaped the run
    Failed,
}

impl JobStatus {
    /// Completed and Failed are terminal; no automatic transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Persisted discovery job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryJob {
    /// Unique job identifier
    pub job_id: Uuid,

    /// Geographic region driving the search
    pub region: String,

    /// Current lifecycle status
    pub status: JobStatus,

    /// Candidate count, set once after the search call returns
    pub schools_found: u32,

    /// Candidates handled so far, incremented per candidate
    pub schools_processed: u32,

    /// Live progress text while Running; terminal summary or failure
    /// reason once Completed/Failed
    pub message: Option<String>,

    /// Job creation time
    pub created_at: DateTime<Utc>,

    /// Set only on reaching a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl DiscoveryJob {
    /// Create new pending job for a region
    pub fn new(region: String) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            region,
            status: JobStatus::Pending,
            schools_found: 0,
            schools_processed: 0,
            message: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Transition to a new status, stamping `completed_at` on terminal states.
    pub fn transition_to(&mut self, new_status: JobStatus) {
        self.status = new_status;
        if new_status.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
    }

    /// Reset a terminal job back to Pending for a retry run.
    ///
    /// Clears counts, message and completion time. Only valid from a
    /// terminal state; callers must check `is_terminal` first.
    pub fn reset_for_retry(&mut self) {
        debug_assert!(self.status.is_terminal());
        self.status = JobStatus::Pending;
        self.schools_found = 0;
        self.schools_processed = 0;
        self.message = None;
        self.completed_at = None;
    }

    /// Update the live progress message.
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = Some(message.into());
    }

    /// Check if job is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_is_pending_with_zero_counts() {
        let job = DiscoveryJob::new("Pune".to_string());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.schools_found, 0);
        assert_eq!(job.schools_processed, 0);
        assert!(job.message.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn terminal_transition_sets_completed_at() {
        let mut job = DiscoveryJob::new("Pune".to_string());
        job.transition_to(JobStatus::Running);
        assert!(job.completed_at.is_none());

        job.transition_to(JobStatus::Completed);
        assert!(job.completed_at.is_some());
        assert!(job.is_terminal());
    }

    #[test]
    fn failed_is_terminal() {
        let mut job = DiscoveryJob::new("Pune".to_string());
        job.transition_to(JobStatus::Running);
        job.transition_to(JobStatus::Failed);
        assert!(job.is_terminal());
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn reset_clears_counts_message_and_completion() {
        let mut job = DiscoveryJob::new("Pune".to_string());
        job.transition_to(JobStatus::Running);
        job.schools_found = 7;
        job.schools_processed = 7;
        job.set_message("Successfully completed! Created: 5, Updated: 2");
        job.transition_to(JobStatus::Completed);

        job.reset_for_retry();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.schools_found, 0);
        assert_eq!(job.schools_processed, 0);
        assert!(job.message.is_none());
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(
            serde_json::to_string(&JobStatus::Failed).unwrap(),
            "\"failed\""
        );
    }
}
