//! Candidate extraction from upstream response text
//!
//! The upstream service is asked for a bare JSON array but routinely wraps
//! it in prose, markdown code fences, or emits loose objects. Each
//! extraction strategy is an independent pure function returning
//! `Option<Vec<Value>>`; they are tried in a fixed priority order and the
//! first non-empty result wins. No strategy succeeding yields an empty
//! list, which the orchestrator treats as "no schools found" rather than
//! an error.

use serde_json::Value;

/// Introductory markers the upstream tends to emit before the array
const ARRAY_MARKERS: &[&str] = &[
    "here are the schools:",
    "schools in",
    "the schools are:",
    "json:",
    "```json",
    "```",
];

/// Extract a list of candidate mappings from raw response text.
///
/// Strategies in priority order:
/// 1. Parse the whole text as JSON
/// 2. Slice from the first `[` to the last `]`
/// 3. Scan for balanced bracket-delimited array substrings
/// 4. Assemble brace-delimited objects carrying a `name` key
/// 5. Parse the array following a known introductory marker
pub fn extract_candidates(content: &str) -> Vec<Value> {
    let content = content.trim();

    parse_whole(content)
        .or_else(|| parse_outer_slice(content))
        .or_else(|| parse_balanced_arrays(content))
        .or_else(|| parse_bare_objects(content))
        .or_else(|| parse_after_marker(content))
        .unwrap_or_default()
}

/// Strategy 1: the entire text is already a JSON array.
fn parse_whole(content: &str) -> Option<Vec<Value>> {
    as_nonempty_array(serde_json::from_str(content).ok()?)
}

/// Strategy 2: slice from the first `[` to the last `]` and parse that.
fn parse_outer_slice(content: &str) -> Option<Vec<Value>> {
    let start = content.find('[')?;
    let end = content.rfind(']')?;
    if end <= start {
        return None;
    }
    as_nonempty_array(serde_json::from_str(&content[start..=end]).ok()?)
}

/// Strategy 3: scan every `[` for a balanced closing `]` (tolerating
/// nested objects and arrays, and quoted strings) and parse each
/// delimited substring until one yields a non-empty array.
fn parse_balanced_arrays(content: &str) -> Option<Vec<Value>> {
    let bytes = content.as_bytes();
    for (idx, &b) in bytes.iter().enumerate() {
        if b != b'[' {
            continue;
        }
        if let Some(end) = find_balanced(bytes, idx, b'[', b']') {
            if let Ok(value) = serde_json::from_str::<Value>(&content[idx..=end]) {
                if let Some(list) = as_nonempty_array(value) {
                    return Some(list);
                }
            }
        }
    }
    None
}

/// Strategy 4: collect brace-delimited objects that carry a non-empty
/// `name` key and assemble them into a list.
fn parse_bare_objects(content: &str) -> Option<Vec<Value>> {
    let bytes = content.as_bytes();
    let mut found = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx] != b'{' {
            idx += 1;
            continue;
        }
        match find_balanced(bytes, idx, b'{', b'}') {
            Some(end) => {
                if let Ok(value) = serde_json::from_str::<Value>(&content[idx..=end]) {
                    let has_name = value
                        .get("name")
                        .and_then(Value::as_str)
                        .is_some_and(|name| !name.trim().is_empty());
                    if has_name {
                        found.push(value);
                    }
                }
                idx = end + 1;
            }
            None => idx += 1,
        }
    }

    if found.is_empty() {
        None
    } else {
        Some(found)
    }
}

/// Strategy 5: look for known introductory markers and parse the array
/// immediately following the first one found.
fn parse_after_marker(content: &str) -> Option<Vec<Value>> {
    let lowered = content.to_lowercase();
    for marker in ARRAY_MARKERS {
        let Some(pos) = lowered.find(marker) else {
            continue;
        };
        let remaining = content[pos + marker.len()..].trim_start();
        if !remaining.starts_with('[') {
            continue;
        }
        let bytes = remaining.as_bytes();
        if let Some(end) = find_balanced(bytes, 0, b'[', b']') {
            if let Ok(value) = serde_json::from_str::<Value>(&remaining[..=end]) {
                if let Some(list) = as_nonempty_array(value) {
                    return Some(list);
                }
            }
        }
    }
    None
}

/// Find the index of the delimiter balancing `open` at `start`.
///
/// Tracks both bracket and brace nesting and skips over quoted strings
/// (including escape sequences) so delimiters inside field values do not
/// confuse the scan.
fn find_balanced(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    debug_assert_eq!(bytes.get(start), Some(&open));

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == open => depth += 1,
            _ if b == close => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn as_nonempty_array(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) if !items.is_empty() => Some(items),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BARE_ARRAY: &str =
        r#"[{"name": "Delhi Public School", "city": "Pune"}, {"name": "St. Mary's", "city": "Pune"}]"#;

    fn names(candidates: &[Value]) -> Vec<&str> {
        candidates
            .iter()
            .filter_map(|c| c.get("name").and_then(Value::as_str))
            .collect()
    }

    #[test]
    fn bare_array_parses_directly() {
        let candidates = extract_candidates(BARE_ARRAY);
        assert_eq!(names(&candidates), ["Delhi Public School", "St. Mary's"]);
    }

    #[test]
    fn array_wrapped_in_prose_is_recovered() {
        let wrapped = format!(
            "Based on my search, I found the following schools.\n{}\nLet me know if you need more.",
            BARE_ARRAY
        );
        assert_eq!(
            extract_candidates(&wrapped),
            extract_candidates(BARE_ARRAY)
        );
    }

    #[test]
    fn code_fenced_array_matches_bare_input() {
        let fenced = format!("Sure! ```json\n{}\n``` Those are all current.", BARE_ARRAY);
        assert_eq!(extract_candidates(&fenced), extract_candidates(BARE_ARRAY));
    }

    #[test]
    fn nested_objects_inside_array_do_not_break_the_scan() {
        let text = r#"Results: [{"name": "DPS", "facilities": {"sports": ["pool"]}}] done"#;
        let candidates = extract_candidates(text);
        assert_eq!(names(&candidates), ["DPS"]);
    }

    #[test]
    fn loose_objects_with_name_are_assembled() {
        let text = r#"
            First school: {"name": "DPS", "city": "Pune"}
            Second school: {"name": "St. Mary's", "city": "Pune"}
            Unrelated: {"count": 2}
        "#;
        let candidates = extract_candidates(text);
        assert_eq!(names(&candidates), ["DPS", "St. Mary's"]);
    }

    #[test]
    fn marker_strategy_recovers_array_in_isolation() {
        let text = format!("Here are the schools:\n{}\nEnd of list.", BARE_ARRAY);
        let candidates = parse_after_marker(&text).unwrap();
        assert_eq!(names(&candidates), ["Delhi Public School", "St. Mary's"]);
    }

    #[test]
    fn marker_without_following_array_is_rejected() {
        assert!(parse_after_marker("Here are the schools: none found.").is_none());
    }

    #[test]
    fn empty_array_yields_no_candidates() {
        assert!(extract_candidates("[]").is_empty());
    }

    #[test]
    fn garbage_yields_no_candidates() {
        assert!(extract_candidates("I could not find any schools, sorry.").is_empty());
    }

    #[test]
    fn brackets_inside_string_values_are_ignored() {
        let text = r#"[{"name": "St. Joseph's [Main Campus]", "city": "Pune"}]"#;
        let candidates = extract_candidates(text);
        assert_eq!(names(&candidates), ["St. Joseph's [Main Campus]"]);
    }

    #[test]
    fn truncated_array_falls_back_to_loose_objects() {
        // Upstream ran out of tokens mid-array; the complete leading
        // objects are still recoverable via strategy 4.
        let text = r#"[{"name": "DPS", "city": "Pune"}, {"name": "St. Ma"#;
        let candidates = extract_candidates(text);
        assert_eq!(names(&candidates), ["DPS"]);
    }
}
