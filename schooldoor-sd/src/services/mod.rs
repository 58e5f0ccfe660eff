//! Discovery pipeline services
//!
//! `job_runner` drives the pipeline: search, parse, clean, reconcile.
//! The remaining modules are its stages.

pub mod job_runner;
pub mod reconciler;
pub mod record_cleaner;
pub mod response_parser;
pub mod retry;
pub mod search_client;

pub use job_runner::JobRunner;
pub use search_client::{HttpSearchTransport, SearchClient, SearchTransport};
