//! Canonical header mapping for the project-status sheet. Kept as plain
//! configuration data so rule changes are reviewable and testable on their
//! own.

/// Ordered (source pattern, canonical field) rules. Evaluation order
/// matters: for each source column the first unclaimed matching target
/// wins.
pub const COLUMN_MAPPING: &[(&str, &str)] = &[
    ("project", "plant_id"),
    ("oem", "oem"),
    ("managed by", "sqe"),
    ("1st ppap milestone", "milestone_date"),
    ("total part numbers", "total_parts"),
    ("psw available", "psw_available"),
    ("% psw", "psw_completion_pct"),
    ("drawing available", "drawing_available"),
    ("%.1 drawing", "drawing_completion_pct"),
    ("imds", "imds_total"),
    ("% imds", "imds_completion_pct"),
    ("m2 parts", "m2_parts"),
    ("m2 parts psw ok", "m2_parts_psw_ok"),
    ("project status", "completion_status"),
    ("bom file date", "bom_file_date"),
];

/// The canonical output schema, in final column order.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "plant_id",
    "oem",
    "sqe",
    "milestone_date",
    "total_parts",
    "psw_available",
    "psw_completion_pct",
    "drawing_available",
    "drawing_completion_pct",
    "imds_total",
    "imds_completion_pct",
    "m2_parts",
    "m2_parts_psw_ok",
    "ppap_completion_pct",
    "overall_completion_pct",
    "completion_status",
    "bom_file_date",
];

pub const COUNT_COLUMNS: &[&str] = &[
    "total_parts",
    "psw_available",
    "drawing_available",
    "imds_total",
    "m2_parts",
    "m2_parts_psw_ok",
];

/// Percentage columns coming straight off the sheet.
pub const SOURCE_PCT_COLUMNS: &[&str] = &[
    "psw_completion_pct",
    "drawing_completion_pct",
    "imds_completion_pct",
];

/// All percentage columns in the final schema, derived ones included.
pub const ALL_PCT_COLUMNS: &[&str] = &[
    "psw_completion_pct",
    "drawing_completion_pct",
    "imds_completion_pct",
    "ppap_completion_pct",
    "overall_completion_pct",
];

pub const DATE_COLUMNS: &[&str] = &["milestone_date", "bom_file_date"];

/// Match a normalized (lowercased, whitespace-collapsed) header against a
/// source pattern. Percentage targets need the topic token plus a percent
/// marker; everything else matches exactly or by containing every word of
/// the pattern.
pub fn header_matches(normalized: &str, pattern: &str) -> bool {
    let pct_topic = match pattern {
        "% psw" => Some("psw"),
        "%.1 drawing" => Some("drawing"),
        "% imds" => Some("imds"),
        _ => None,
    };
    if let Some(topic) = pct_topic {
        return normalized.contains(topic)
            && (normalized.contains('%') || normalized.contains("percent"));
    }

    if normalized == pattern {
        return true;
    }
    pattern
        .split_whitespace()
        .all(|word| normalized.contains(word))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_word_containment() {
        assert!(header_matches("project", "project"));
        assert!(header_matches("managed by sqe team", "managed by"));
        assert!(!header_matches("managed", "managed by"));
    }

    #[test]
    fn percentage_patterns_need_topic_and_marker() {
        assert!(header_matches("% psw", "% psw"));
        assert!(header_matches("psw percent complete", "% psw"));
        assert!(header_matches("%.1 drawing", "%.1 drawing"));
        assert!(header_matches("drawing %", "%.1 drawing"));
        assert!(!header_matches("psw available", "% psw"));
        assert!(!header_matches("% total", "% imds"));
    }

    #[test]
    fn schema_is_consistent() {
        assert_eq!(REQUIRED_COLUMNS.len(), 17);
        for (_, target) in COLUMN_MAPPING {
            assert!(
                REQUIRED_COLUMNS.contains(target),
                "unmapped target {target}"
            );
        }
        for col in COUNT_COLUMNS.iter().chain(ALL_PCT_COLUMNS).chain(DATE_COLUMNS) {
            assert!(REQUIRED_COLUMNS.contains(col));
        }
    }
}
