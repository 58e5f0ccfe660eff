//! Create-or-merge reconciliation against stored school records
//!
//! Lookup key is the exact (name, city) pair. Merges are conservative: a
//! candidate field only overwrites when it carries a value that differs
//! from what is stored, so a sparse upstream result can never erase data
//! we already have. The sync timestamp is refreshed on every match, even
//! when nothing visible changed.

use crate::db::schools;
use crate::models::{CleanSchool, MergeOutcome, School};
use serde_json::Map;
use sqlx::SqlitePool;
use schooldoor_common::Result;

/// Reconcile one clean candidate against the school store.
pub async fn reconcile(pool: &SqlitePool, candidate: &CleanSchool) -> Result<MergeOutcome> {
    let existing = match candidate.city.as_deref() {
        Some(city) => schools::find_by_name_city(pool, &candidate.name, city).await?,
        // No city on the candidate means no (name, city) key to match on
        None => None,
    };

    match existing {
        None => {
            let school = School::from_candidate(candidate);
            schools::insert_school(pool, &school).await?;
            tracing::info!(school = %school.name, "Created new school record");
            Ok(MergeOutcome::Created)
        }
        Some(mut school) => {
            let changed = merge_candidate(&mut school, candidate);
            school.last_synced_at = Some(chrono::Utc::now());
            if changed {
                school.updated_at = Some(chrono::Utc::now());
            }
            schools::update_school(pool, &school).await?;

            if changed {
                tracing::info!(school = %school.name, "Updated existing school record");
                Ok(MergeOutcome::Updated)
            } else {
                tracing::debug!(school = %school.name, "No updates needed for school");
                Ok(MergeOutcome::Unchanged)
            }
        }
    }
}

/// Merge candidate fields into an existing record.
///
/// Returns whether any visible field changed. Does not touch timestamps;
/// the caller owns those.
pub fn merge_candidate(existing: &mut School, candidate: &CleanSchool) -> bool {
    let mut changed = false;

    // Scalar string fields: overwrite only with a differing non-empty value
    let string_merges: [(&mut Option<String>, &Option<String>); 12] = [
        (&mut existing.address, &candidate.address),
        (&mut existing.state, &candidate.state),
        (&mut existing.postal_code, &candidate.postal_code),
        (&mut existing.country, &candidate.country),
        (&mut existing.phone, &candidate.phone),
        (&mut existing.email, &candidate.email),
        (&mut existing.website, &candidate.website),
        (&mut existing.school_type, &candidate.school_type),
        (&mut existing.board, &candidate.board),
        (&mut existing.grade_levels, &candidate.grade_levels),
        (
            &mut existing.medium_of_instruction,
            &candidate.medium_of_instruction,
        ),
        (&mut existing.principal_name, &candidate.principal_name),
    ];
    for (current, incoming) in string_merges {
        changed |= merge_string(current, incoming);
    }

    changed |= merge_numeric(&mut existing.enrollment, candidate.enrollment);
    changed |= merge_numeric(
        &mut existing.student_teacher_ratio,
        candidate.student_teacher_ratio,
    );

    // Programs: a candidate list replaces a differing stored list
    if let Some(programs) = &candidate.programs {
        if existing.programs.as_ref() != Some(programs) {
            existing.programs = Some(programs.clone());
            changed = true;
        }
    }

    changed |= merge_map(&mut existing.facilities, &candidate.facilities);
    changed |= merge_map(&mut existing.board_exam_results, &candidate.board_exam_results);
    changed |= merge_map(
        &mut existing.competitive_exam_results,
        &candidate.competitive_exam_results,
    );

    changed
}

fn merge_string(current: &mut Option<String>, incoming: &Option<String>) -> bool {
    match incoming {
        Some(value) if !value.is_empty() && current.as_deref() != Some(value.as_str()) => {
            *current = Some(value.clone());
            true
        }
        _ => false,
    }
}

fn merge_numeric(current: &mut Option<f64>, incoming: Option<f64>) -> bool {
    match incoming {
        Some(value) if *current != Some(value) => {
            *current = Some(value);
            true
        }
        _ => false,
    }
}

/// Shallow union: candidate keys win on conflict, existing keys absent
/// from the candidate are preserved.
fn merge_map(
    current: &mut Option<Map<String, serde_json::Value>>,
    incoming: &Option<Map<String, serde_json::Value>>,
) -> bool {
    let Some(incoming) = incoming else {
        return false;
    };

    let mut merged = current.clone().unwrap_or_default();
    for (key, value) in incoming {
        merged.insert(key.clone(), value.clone());
    }

    if current.as_ref() == Some(&merged) {
        return false;
    }
    *current = Some(merged);
    true
}
