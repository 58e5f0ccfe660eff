//! Domain models for the discovery service

pub mod job;
pub mod school;

pub use job::{DiscoveryJob, JobStatus};
pub use school::{CleanSchool, MergeOutcome, School};
