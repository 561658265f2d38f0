use crate::collect::Collector;
use crate::table::RawTable;

/// Identifier-column labels that mark a row as the real header row.
const ID_PATTERNS: &[&str] = &["yazaki pn", "part number", "part_number", "id"];

/// Tokens that mark a cell value as header-ish rather than data.
const HEADER_INDICATORS: &[&str] = &[
    "(", ")", "remarks", "status", "date", "details", "deviation", "under", "available",
    "promised", "ok/nok", "yes/no",
];

const HEADER_SCAN_ROWS: usize = 10;
const CONTINUATION_SCAN_ROWS: usize = 5;

fn non_empty_lower(row: &[String]) -> Vec<String> {
    row.iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

fn looks_numeric(value: &str) -> bool {
    let stripped: String = value.chars().filter(|c| *c != '.' && *c != '-').collect();
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

/// Scan the first rows of the body for the real header row: mostly
/// non-numeric cells plus at least one identifier-column label.
fn find_header_row(raw: &RawTable) -> Option<usize> {
    for (i, row) in raw.rows.iter().take(HEADER_SCAN_ROWS).enumerate() {
        let values = non_empty_lower(row);
        if values.is_empty() {
            continue;
        }

        let has_id_pattern = ID_PATTERNS
            .iter()
            .any(|p| values.iter().any(|v| v.contains(p)));
        if !has_id_pattern {
            continue;
        }

        let non_numeric = values.iter().filter(|v| !looks_numeric(v)).count();
        if non_numeric as f64 > values.len() as f64 * 0.7 {
            return Some(i);
        }
    }
    None
}

/// A row is a header continuation when enough of its values carry
/// header-ish tokens and almost none look like numeric part codes.
fn is_continuation_row(row: &[String]) -> bool {
    let values = non_empty_lower(row);
    if values.is_empty() {
        return false;
    }

    let indicator_hits: usize = values
        .iter()
        .map(|v| HEADER_INDICATORS.iter().filter(|ind| v.contains(*ind)).count())
        .sum();
    if indicator_hits as f64 / values.len() as f64 <= 0.3 {
        return false;
    }

    let numeric_like = values
        .iter()
        .filter(|v| looks_numeric(v) && v.len() > 3)
        .count();
    (numeric_like as f64 / values.len() as f64) < 0.2
}

/// Repair a raw sheet whose real header row is buried under spurious
/// leading rows, then drop any multi-row header continuations from the
/// body. A table with no such rows passes through unchanged.
pub fn repair_headers(raw: RawTable, collector: &mut Collector) -> RawTable {
    let mut table = raw;

    // a hit at row 0 means the sheet already leads with its header
    if let Some(k) = find_header_row(&table).filter(|&k| k > 0) {
        let header_row = table.rows[k].clone();
        let headers: Vec<String> = header_row
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    format!("Column_{i}")
                } else {
                    trimmed.to_string()
                }
            })
            .collect();

        collector.info(format!(
            "found buried header at row {k}, dropped {} leading rows",
            k + 1
        ));

        let rows = table.rows.split_off(k + 1);
        table = RawTable::new(headers, rows);
    }

    let mut dropped = Vec::new();
    let mut kept = Vec::with_capacity(table.rows.len());
    for (i, row) in table.rows.into_iter().enumerate() {
        if i < CONTINUATION_SCAN_ROWS && is_continuation_row(&row) {
            dropped.push(i);
        } else {
            kept.push(row);
        }
    }
    if !dropped.is_empty() {
        collector.info(format!(
            "removed {} header continuation rows: {:?}",
            dropped.len(),
            dropped
        ));
    }
    table.rows = kept;

    table
}
