//! Database access for the discovery service
//!
//! Tables are created by `schooldoor_common::db::init_database_pool`.

pub mod jobs;
pub mod schools;
