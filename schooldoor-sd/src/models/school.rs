//! School records
//!
//! `CleanSchool` is the ephemeral, validated candidate produced by the
//! response parser and record cleaner. `School` is the persisted entity
//! it reconciles against, matched by exact (name, city).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Fixed default country applied when the upstream omits it
pub const DEFAULT_COUNTRY: &str = "India";

/// Parsed-and-cleaned candidate, never persisted as-is
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanSchool {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub school_type: Option<String>,
    pub board: Option<String>,
    pub grade_levels: Option<String>,
    pub enrollment: Option<f64>,
    pub student_teacher_ratio: Option<f64>,
    pub medium_of_instruction: Option<String>,
    pub principal_name: Option<String>,
    pub programs: Option<Vec<String>>,
    pub facilities: Option<Map<String, Value>>,
    pub board_exam_results: Option<Map<String, Value>>,
    pub competitive_exam_results: Option<Map<String, Value>>,
}

/// Persisted school record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct School {
    pub school_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub website: Option<String>,
    pub school_type: Option<String>,
    pub board: Option<String>,
    pub grade_levels: Option<String>,
    pub enrollment: Option<f64>,
    pub student_teacher_ratio: Option<f64>,
    pub medium_of_instruction: Option<String>,
    pub principal_name: Option<String>,
    pub programs: Option<Vec<String>>,
    pub facilities: Option<Map<String, Value>>,
    pub board_exam_results: Option<Map<String, Value>>,
    pub competitive_exam_results: Option<Map<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl School {
    /// Build a new stored record from a clean candidate
    pub fn from_candidate(candidate: &CleanSchool) -> Self {
        let now = Utc::now();
        Self {
            school_id: Uuid::new_v4(),
            name: candidate.name.clone(),
            address: candidate.address.clone(),
            city: candidate.city.clone(),
            state: candidate.state.clone(),
            postal_code: candidate.postal_code.clone(),
            country: candidate.country.clone(),
            phone: candidate.phone.clone(),
            email: candidate.email.clone(),
            website: candidate.website.clone(),
            school_type: candidate.school_type.clone(),
            board: candidate.board.clone(),
            grade_levels: candidate.grade_levels.clone(),
            enrollment: candidate.enrollment,
            student_teacher_ratio: candidate.student_teacher_ratio,
            medium_of_instruction: candidate.medium_of_instruction.clone(),
            principal_name: candidate.principal_name.clone(),
            programs: candidate.programs.clone(),
            facilities: candidate.facilities.clone(),
            board_exam_results: candidate.board_exam_results.clone(),
            competitive_exam_results: candidate.competitive_exam_results.clone(),
            created_at: now,
            updated_at: None,
            last_synced_at: Some(now),
        }
    }
}

/// Reconciliation accounting per candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// No (name, city) match existed; a new record was inserted
    Created,
    /// A match existed and at least one field changed
    Updated,
    /// A match existed; only the sync timestamp was refreshed
    Unchanged,
}
