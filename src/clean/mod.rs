pub mod dates;

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::table::{Cell, Table};

pub use dates::{detect_date_columns, parse_date_cell, parse_date_column, parse_date_value};

static ID_STRIP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9\s\-_]").expect("valid pattern"));
static ID_COLLAPSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s_]+").expect("valid pattern"));
static WS_COLLAPSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid pattern"));

/// Standardize a part identifier: keep alphanumerics, spaces, hyphens, and
/// underscores; collapse space/underscore runs to one space; uppercase.
/// Total over any cell: null or blank input yields the empty string, and
/// the function is idempotent.
pub fn clean_id(value: &Cell) -> String {
    if value.is_null() {
        return String::new();
    }
    clean_id_str(&value.render())
}

pub fn clean_id_str(raw: &str) -> String {
    let s = raw.trim();
    let s = ID_STRIP.replace_all(s, "");
    let s = ID_COLLAPSE.replace_all(&s, " ");
    s.to_uppercase().trim().to_string()
}

/// Title-case in the spreadsheet sense: any letter that follows a
/// non-letter starts a new word.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Standardize one text value: unescape literal `\n`, collapse whitespace
/// runs, title-case. Nulls and non-text cells pass through untouched.
pub fn standardize_text_value(value: &Cell) -> Cell {
    let text = match value {
        Cell::Text(s) => s,
        _ => return value.clone(),
    };
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return value.clone();
    }
    let unescaped = trimmed.replace("\\n", "\n");
    let collapsed = WS_COLLAPSE.replace_all(&unescaped, " ");
    Cell::Text(title_case(collapsed.trim()))
}

/// Column-wise text standardization. A value that cannot be standardized is
/// left as-is; the rest of the column is still processed.
pub fn standardize_text(values: &[Cell]) -> Vec<Cell> {
    values.iter().map(standardize_text_value).collect()
}

/// Deterministic per-row content hash over the given columns (all columns
/// when unspecified): hex SHA-256 of the `|`-joined stringified cells.
pub fn create_row_hash(table: &Table, columns: Option<&[String]>) -> Vec<String> {
    let picks: Vec<usize> = match columns {
        Some(names) => names.iter().filter_map(|n| table.col(n)).collect(),
        None => (0..table.n_cols()).collect(),
    };

    table
        .rows
        .iter()
        .map(|row| {
            let joined = picks
                .iter()
                .map(|&i| row[i].render())
                .collect::<Vec<_>>()
                .join("|");
            hex::encode(Sha256::digest(joined.as_bytes()))
        })
        .collect()
}

fn duplicate_mask(table: &Table, subset: Option<&[String]>) -> Vec<bool> {
    let picks: Vec<usize> = match subset {
        Some(names) => names.iter().filter_map(|n| table.col(n)).collect(),
        None => (0..table.n_cols()).collect(),
    };

    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(table.n_rows());
    table
        .rows
        .iter()
        .map(|row| {
            let key: Vec<String> = picks.iter().map(|&i| row[i].render()).collect();
            !seen.insert(key)
        })
        .collect()
}

/// Mark every row after the first occurrence of a key combination with a
/// boolean `is_duplicate_entry` column. Rows are never removed.
pub fn flag_duplicate_rows(mut table: Table, subset: Option<&[String]>) -> (Table, usize) {
    let mask = duplicate_mask(&table, subset);
    let count = mask.iter().filter(|&&m| m).count();
    let cells = mask.into_iter().map(Cell::Bool).collect();
    table.set_column("is_duplicate_entry", cells);
    if count > 0 {
        tracing::info!(flagged = count, rows = table.n_rows(), "flagged duplicate rows");
    }
    (table, count)
}

/// Same detection as [`flag_duplicate_rows`], but drops the flagged rows.
pub fn remove_duplicate_rows(table: Table, subset: Option<&[String]>) -> (Table, usize) {
    let mask = duplicate_mask(&table, subset);
    let keep: Vec<usize> = mask
        .iter()
        .enumerate()
        .filter(|(_, &dup)| !dup)
        .map(|(i, _)| i)
        .collect();
    let removed = table.n_rows() - keep.len();
    let cleaned = table.keep_rows(&keep);
    if removed > 0 {
        tracing::info!(removed, rows = cleaned.n_rows(), "removed duplicate rows");
    }
    (cleaned, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::RawTable;

    #[test]
    fn clean_id_strips_and_uppercases() {
        assert_eq!(clean_id_str("7009@6933#"), "70096933");
        assert_eq!(clean_id_str("  ABC 123  "), "ABC 123");
        assert_eq!(clean_id_str("a_b__c"), "A B C");
        assert_eq!(clean_id(&Cell::Null), "");
        assert_eq!(clean_id(&Cell::Text("  ".into())), "");
    }

    #[test]
    fn clean_id_is_idempotent() {
        for raw in ["7009@6933#", "  a_b--c  ", "x  y", "", "Ü+ö", "123-456_789"] {
            let once = clean_id_str(raw);
            assert_eq!(clean_id_str(&once), once, "not idempotent for {raw:?}");
        }
    }

    #[test]
    fn clean_id_output_alphabet() {
        let cleaned = clean_id_str("  mixed: Case/42_x — done  ");
        assert!(cleaned
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == ' ' || c == '-'));
        assert!(!cleaned.contains("  "));
    }

    #[test]
    fn standardize_text_unescapes_and_title_cases() {
        let cell = Cell::Text("ACME\\nWIRE   co".into());
        assert_eq!(
            standardize_text_value(&cell),
            Cell::Text("Acme Wire Co".into())
        );
        assert_eq!(standardize_text_value(&Cell::Null), Cell::Null);
        assert_eq!(standardize_text_value(&Cell::Int(5)), Cell::Int(5));
    }

    fn two_col_table(rows: Vec<(&str, &str)>) -> Table {
        let raw = RawTable::new(
            vec!["a".into(), "b".into()],
            rows.into_iter()
                .map(|(a, b)| vec![a.to_string(), b.to_string()])
                .collect(),
        );
        Table::from_raw("t", &raw)
    }

    #[test]
    fn row_hash_is_deterministic_and_column_sensitive() {
        let table = two_col_table(vec![("x", "1"), ("x", "2"), ("x", "1")]);
        let all = create_row_hash(&table, None);
        assert_eq!(all.len(), 3);
        assert_eq!(all[0], all[2]);
        assert_ne!(all[0], all[1]);

        let only_a = create_row_hash(&table, Some(&["a".to_string()]));
        assert_eq!(only_a[0], only_a[1]);
    }

    #[test]
    fn flag_duplicates_keeps_rows() {
        let table = two_col_table(vec![("x", "1"), ("x", "1"), ("y", "1")]);
        let (flagged, count) = flag_duplicate_rows(table, None);
        assert_eq!(count, 1);
        assert_eq!(flagged.n_rows(), 3);
        let idx = flagged.col("is_duplicate_entry").unwrap();
        assert_eq!(flagged.cell(0, idx), &Cell::Bool(false));
        assert_eq!(flagged.cell(1, idx), &Cell::Bool(true));
        assert_eq!(flagged.cell(2, idx), &Cell::Bool(false));
    }

    #[test]
    fn remove_duplicates_on_subset() {
        let table = two_col_table(vec![("x", "1"), ("x", "2"), ("y", "3")]);
        let (cleaned, removed) = remove_duplicate_rows(table, Some(&["a".to_string()]));
        assert_eq!(removed, 1);
        assert_eq!(cleaned.n_rows(), 2);
        assert_eq!(cleaned.cell(0, 1), &Cell::Text("1".into()));
        assert_eq!(cleaned.cell(1, 0), &Cell::Text("y".into()));
    }
}
