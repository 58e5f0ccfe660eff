//! Candidate validation and normalization
//!
//! Takes the raw JSON mappings recovered by the response parser and turns
//! them into typed `CleanSchool` candidates. Bad input is dropped or
//! nulled, never an error: the upstream text is untrusted and a single
//! malformed candidate must not cost the batch.

use crate::models::school::{CleanSchool, DEFAULT_COUNTRY};
use serde_json::{Map, Value};

/// Clean a batch of raw candidates, dropping rejects.
pub fn clean_candidates(raw: Vec<Value>, region: &str) -> Vec<CleanSchool> {
    raw.iter()
        .filter_map(|candidate| clean_candidate(candidate, region))
        .collect()
}

/// Validate and normalize one raw candidate mapping.
///
/// Returns `None` when the candidate has no usable name or does not
/// mention the requested region in its city or address (the upstream
/// regularly returns results from neighboring areas).
pub fn clean_candidate(raw: &Value, region: &str) -> Option<CleanSchool> {
    let name = string_field(raw, "name")?;

    let city = string_field(raw, "city");
    let address = string_field(raw, "address");

    if !in_region(city.as_deref(), address.as_deref(), region) {
        tracing::warn!(
            school = %name,
            city = %city.as_deref().unwrap_or(""),
            region = %region,
            "Filtering out school from wrong region"
        );
        return None;
    }

    Some(CleanSchool {
        name,
        address,
        city,
        state: string_field(raw, "state"),
        postal_code: string_field(raw, "postal_code")
            .or_else(|| string_field(raw, "pincode"))
            .or_else(|| string_field(raw, "zip_code")),
        country: string_field(raw, "country").or_else(|| Some(DEFAULT_COUNTRY.to_string())),
        phone: string_field(raw, "phone"),
        email: string_field(raw, "email"),
        website: string_field(raw, "website"),
        school_type: string_field(raw, "school_type"),
        board: string_field(raw, "board"),
        grade_levels: string_field(raw, "grade_levels"),
        enrollment: numeric_field(raw, "enrollment"),
        student_teacher_ratio: numeric_field(raw, "student_teacher_ratio"),
        medium_of_instruction: string_field(raw, "medium_of_instruction"),
        principal_name: string_field(raw, "principal_name"),
        programs: list_field(raw, "programs"),
        facilities: facilities_field(raw),
        board_exam_results: map_field(raw, "board_exam_results"),
        competitive_exam_results: map_field(raw, "competitive_exam_results"),
    })
}

/// Case-insensitive region check against city and address.
fn in_region(city: Option<&str>, address: Option<&str>, region: &str) -> bool {
    let region = region.trim().to_lowercase();
    if region.is_empty() {
        return true;
    }
    let mentions = |value: Option<&str>| {
        value
            .map(|v| v.to_lowercase().contains(&region))
            .unwrap_or(false)
    };
    mentions(city) || mentions(address)
}

/// Trimmed string, empty becomes None. Non-string values become None.
fn string_field(raw: &Value, key: &str) -> Option<String> {
    let trimmed = raw.get(key)?.as_str()?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Numeric coercion: accepts JSON numbers and numeric strings.
/// Coercion failure becomes None, never an error.
fn numeric_field(raw: &Value, key: &str) -> Option<f64> {
    match raw.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Kept only if the source value is itself a list; each element
/// stringified and trimmed, empties dropped.
fn list_field(raw: &Value, key: &str) -> Option<Vec<String>> {
    let items = raw.get(key)?.as_array()?;
    let cleaned: Vec<String> = items
        .iter()
        .filter_map(|item| {
            let text = match item {
                Value::String(s) => s.trim().to_string(),
                Value::Null => return None,
                other => other.to_string(),
            };
            if text.is_empty() {
                None
            } else {
                Some(text)
            }
        })
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

/// Kept only if the source value is already a mapping.
fn map_field(raw: &Value, key: &str) -> Option<Map<String, Value>> {
    let map = raw.get(key)?.as_object()?;
    if map.is_empty() {
        None
    } else {
        Some(map.clone())
    }
}

/// Facilities: a map of category to list; categories whose value is not
/// a list are dropped, list elements are stringified and trimmed.
fn facilities_field(raw: &Value) -> Option<Map<String, Value>> {
    let source = raw.get("facilities")?.as_object()?;
    let mut cleaned = Map::new();
    for (category, items) in source {
        let Some(list) = items.as_array() else {
            continue;
        };
        let entries: Vec<Value> = list
            .iter()
            .filter_map(|item| {
                let text = match item {
                    Value::String(s) => s.trim().to_string(),
                    Value::Null => return None,
                    other => other.to_string(),
                };
                if text.is_empty() {
                    None
                } else {
                    Some(Value::String(text))
                }
            })
            .collect();
        if !entries.is_empty() {
            cleaned.insert(category.clone(), Value::Array(entries));
        }
    }
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_without_name_is_dropped() {
        assert!(clean_candidate(&json!({"city": "Pune"}), "Pune").is_none());
        assert!(clean_candidate(&json!({"name": "  ", "city": "Pune"}), "Pune").is_none());
    }

    #[test]
    fn wrong_region_candidate_is_dropped() {
        let raw = json!({"name": "Shelbyville Elementary", "city": "Shelbyville"});
        assert!(clean_candidate(&raw, "Springfield").is_none());
    }

    #[test]
    fn region_match_is_case_insensitive_on_city_or_address() {
        let by_city = json!({"name": "A", "city": "SPRINGFIELD"});
        assert!(clean_candidate(&by_city, "springfield").is_some());

        let by_address = json!({"name": "B", "city": null, "address": "12 Main St, Springfield"});
        assert!(clean_candidate(&by_address, "Springfield").is_some());
    }

    #[test]
    fn strings_are_trimmed_and_empties_become_none() {
        let raw = json!({
            "name": "  DPS Pune  ",
            "city": "Pune",
            "phone": "   ",
            "website": " https://dpspune.example "
        });
        let clean = clean_candidate(&raw, "Pune").unwrap();
        assert_eq!(clean.name, "DPS Pune");
        assert!(clean.phone.is_none());
        assert_eq!(clean.website.as_deref(), Some("https://dpspune.example"));
    }

    #[test]
    fn numeric_coercion_failure_becomes_none() {
        let raw = json!({
            "name": "DPS",
            "city": "Pune",
            "enrollment": "1200",
            "student_teacher_ratio": "20:1"
        });
        let clean = clean_candidate(&raw, "Pune").unwrap();
        assert_eq!(clean.enrollment, Some(1200.0));
        assert!(clean.student_teacher_ratio.is_none());
    }

    #[test]
    fn non_list_programs_become_none() {
        let raw = json!({"name": "DPS", "city": "Pune", "programs": "STEM, Robotics"});
        let clean = clean_candidate(&raw, "Pune").unwrap();
        assert!(clean.programs.is_none());

        let raw = json!({"name": "DPS", "city": "Pune", "programs": [" STEM ", "Robotics", ""]});
        let clean = clean_candidate(&raw, "Pune").unwrap();
        assert_eq!(
            clean.programs,
            Some(vec!["STEM".to_string(), "Robotics".to_string()])
        );
    }

    #[test]
    fn facilities_keep_only_list_valued_categories() {
        let raw = json!({
            "name": "DPS",
            "city": "Pune",
            "facilities": {
                "sports": ["pool", " track "],
                "note": "large campus"
            }
        });
        let clean = clean_candidate(&raw, "Pune").unwrap();
        let facilities = clean.facilities.unwrap();
        assert_eq!(facilities["sports"], json!(["pool", "track"]));
        assert!(!facilities.contains_key("note"));
    }

    #[test]
    fn exam_results_require_a_mapping() {
        let raw = json!({
            "name": "DPS",
            "city": "Pune",
            "board_exam_results": {"class_10_pass_pct": 98},
            "competitive_exam_results": "JEE: 40 selections"
        });
        let clean = clean_candidate(&raw, "Pune").unwrap();
        assert!(clean.board_exam_results.is_some());
        assert!(clean.competitive_exam_results.is_none());
    }

    #[test]
    fn country_defaults_when_absent() {
        let raw = json!({"name": "DPS", "city": "Pune"});
        let clean = clean_candidate(&raw, "Pune").unwrap();
        assert_eq!(clean.country.as_deref(), Some(DEFAULT_COUNTRY));

        let raw = json!({"name": "DPS", "city": "Pune", "country": "Bharat"});
        let clean = clean_candidate(&raw, "Pune").unwrap();
        assert_eq!(clean.country.as_deref(), Some("Bharat"));
    }

    #[test]
    fn batch_clean_drops_non_object_entries() {
        let raw = vec![
            json!({"name": "DPS", "city": "Pune"}),
            json!(42),
            json!({"name": "Out of Town High", "city": "Mumbai"}),
        ];
        let cleaned = clean_candidates(raw, "Pune");
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].name, "DPS");
    }
}
