//! SchoolDoor School Discovery service
//!
//! Background data-acquisition pipeline: jobs query an upstream search
//! service for schools in a region, parse the response into candidate
//! records, clean and validate them, and reconcile each one into the
//! school store. An axum API starts jobs and exposes their progress.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

use axum::routing::{delete, get, post};
use axum::Router;
use services::JobRunner;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub runner: Arc<JobRunner>,
}

/// Build the service router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api::health::health))
        .route("/discovery/start", post(api::jobs::start_job))
        .route("/discovery/jobs", get(api::jobs::list_jobs))
        .route("/discovery/jobs/:job_id", get(api::jobs::get_job))
        .route("/discovery/jobs/:job_id", delete(api::jobs::delete_job))
        .route("/discovery/jobs/:job_id/retry", post(api::jobs::retry_job))
        .route("/discovery/status/overview", get(api::jobs::overview))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
