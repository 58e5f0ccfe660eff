//! Shared types for the SchoolDoor discovery services

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
