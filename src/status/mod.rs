pub mod mapping;

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::clean::parse_date_cell;
use crate::collect::Collector;
use crate::table::{Cell, RawTable, Table};

static WS_COLLAPSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid pattern"));

/// Output of a status-sheet transform. `project_completion_by_plant` is a
/// copy of `status_clean` under a second name, kept for downstream report
/// compatibility.
#[derive(Debug)]
pub struct StatusOutput {
    pub status_clean: Table,
    pub project_completion_by_plant: Table,
}

/// Transformer for the project-status sheet. Unlike the MasterBOM side,
/// a failure anywhere in here is fatal for the whole transform request.
#[derive(Debug, Default)]
pub struct StatusTransform;

impl StatusTransform {
    pub fn new() -> Self {
        StatusTransform
    }

    pub fn process(&self, raw: RawTable, collector: &mut Collector) -> Result<StatusOutput> {
        collector.info(format!(
            "starting status processing: {} rows x {} cols",
            raw.n_rows(),
            raw.n_cols()
        ));

        let table = clean_and_prepare(raw, collector);
        let table = map_headers(table, collector);
        let table = coerce_types(table, collector);
        let table = derive_fields(table);
        let table = finalize(table)?;

        collector.info(format!(
            "status processing complete: {} rows x {} cols",
            table.n_rows(),
            table.n_cols()
        ));

        let alias = table.clone().renamed("project_completion_by_plant");
        Ok(StatusOutput {
            status_clean: table,
            project_completion_by_plant: alias,
        })
    }
}

/// Drop blank columns, truncate at the first fully-empty row, and drop any
/// remaining fully-empty rows.
fn clean_and_prepare(raw: RawTable, collector: &mut Collector) -> Table {
    let keep_cols: Vec<usize> = (0..raw.n_cols())
        .filter(|&i| {
            if raw.headers[i].trim().is_empty() {
                return false;
            }
            raw.rows.iter().any(|row| !row[i].trim().is_empty())
        })
        .collect();
    let dropped_cols = raw.n_cols() - keep_cols.len();
    if dropped_cols > 0 {
        collector.info(format!("dropped {dropped_cols} blank columns"));
    }

    let headers: Vec<String> = keep_cols.iter().map(|&i| raw.headers[i].clone()).collect();
    let mut rows: Vec<Vec<String>> = raw
        .rows
        .iter()
        .map(|row| keep_cols.iter().map(|&i| row[i].clone()).collect())
        .collect();

    let is_blank_row = |row: &Vec<String>| row.iter().all(|v| v.trim().is_empty());

    if let Some(first_empty) = rows.iter().position(is_blank_row) {
        if first_empty > 0 {
            rows.truncate(first_empty);
            collector.info(format!("truncated at first empty row: {first_empty}"));
        }
    }
    rows.retain(|row| !is_blank_row(row));

    Table::from_raw("status_clean", &RawTable::new(headers, rows))
}

/// Normalize each header and rename it to its canonical field. Each target
/// can be claimed by one source column only; duplicates after mapping are
/// collapsed keep-first.
fn map_headers(table: Table, collector: &mut Collector) -> Table {
    let mut used: HashSet<&str> = HashSet::new();
    let mut mapped = 0usize;

    let new_names: Vec<String> = table
        .columns
        .iter()
        .map(|name| {
            let normalized = WS_COLLAPSE
                .replace_all(name.to_lowercase().trim(), " ")
                .to_string();
            for &(pattern, target) in mapping::COLUMN_MAPPING {
                if !used.contains(target) && mapping::header_matches(&normalized, pattern) {
                    used.insert(target);
                    mapped += 1;
                    return target.to_string();
                }
            }
            name.clone()
        })
        .collect();

    collector.info(format!("mapped {mapped} status columns to canonical names"));

    let mut renamed = table;
    renamed.columns = new_names;

    // collapse duplicate names, keeping the first occurrence
    let mut seen: HashSet<String> = HashSet::new();
    let keep: Vec<usize> = renamed
        .columns
        .iter()
        .enumerate()
        .filter(|(_, name)| seen.insert((*name).clone()))
        .map(|(i, _)| i)
        .collect();
    if keep.len() < renamed.n_cols() {
        collector.info("removed duplicate columns after mapping".to_string());
        let names: Vec<&str> = keep.iter().map(|&i| renamed.columns[i].as_str()).collect();
        renamed = renamed.select(&names);
    }

    renamed
}

/// Parse a raw percentage value into a fraction in [0, 1]. Accepts comma
/// decimal separators and a trailing percent sign; whole-number percentages
/// in (1, 100] are divided down. Unparseable input yields `None`.
pub fn parse_percentage(cell: &Cell) -> Option<f64> {
    if cell.is_blank() {
        return None;
    }
    let s = cell.render();
    let s = s.trim().replace(',', ".").replace('%', "");
    let mut value: f64 = s.trim().parse().ok()?;
    if value > 1.0 && value <= 100.0 {
        value /= 100.0;
    }
    Some(value.clamp(0.0, 1.0))
}

fn coerce_count(cell: &Cell) -> Cell {
    match cell {
        Cell::Int(v) => Cell::Int(*v),
        Cell::Float(v) if v.fract() == 0.0 => Cell::Int(*v as i64),
        Cell::Text(s) => match s.trim().parse::<f64>() {
            Ok(v) if v.fract() == 0.0 => Cell::Int(v as i64),
            _ => Cell::Null,
        },
        _ => Cell::Null,
    }
}

fn coerce_types(mut table: Table, collector: &mut Collector) -> Table {
    for col in mapping::DATE_COLUMNS {
        if let Some(cells) = table.column_cells_by_name(col) {
            let parsed = cells
                .iter()
                .map(|c| match parse_date_cell(c) {
                    Some(d) => Cell::Date(d),
                    None => Cell::Null,
                })
                .collect();
            table.set_column(col, parsed);
        }
    }

    for col in mapping::COUNT_COLUMNS {
        if let Some(cells) = table.column_cells_by_name(col) {
            table.set_column(col, cells.iter().map(coerce_count).collect());
        }
    }

    for col in mapping::SOURCE_PCT_COLUMNS {
        if let Some(cells) = table.column_cells_by_name(col) {
            let parsed = cells
                .iter()
                .map(|c| match parse_percentage(c) {
                    Some(v) => Cell::Float(v),
                    None => Cell::Null,
                })
                .collect();
            table.set_column(col, parsed);
        }
    }

    collector.info("type coercion complete".to_string());
    table
}

/// Recompute the completion ratios from their count columns where both
/// sides are present, then the row-wise overall mean.
fn derive_fields(mut table: Table) -> Table {
    let ratio_specs = [
        ("psw_available", "total_parts", "psw_completion_pct"),
        ("drawing_available", "total_parts", "drawing_completion_pct"),
        ("imds_total", "total_parts", "imds_completion_pct"),
    ];
    for (num, den, target) in ratio_specs {
        if let (Some(num_idx), Some(den_idx)) = (table.col(num), table.col(den)) {
            let cells: Vec<Cell> = table
                .rows
                .iter()
                .map(|row| match (row[num_idx].as_f64(), row[den_idx].as_f64()) {
                    (Some(n), Some(d)) if d > 0.0 => Cell::Float(n / d),
                    _ => Cell::Null,
                })
                .collect();
            table.set_column(target, cells);
        }
    }

    match (table.col("m2_parts_psw_ok"), table.col("m2_parts")) {
        (Some(num_idx), Some(den_idx)) => {
            let cells: Vec<Cell> = table
                .rows
                .iter()
                .map(|row| match (row[num_idx].as_f64(), row[den_idx].as_f64()) {
                    (Some(n), Some(d)) if d > 0.0 => Cell::Float(n / d),
                    _ => Cell::Null,
                })
                .collect();
            table.set_column("ppap_completion_pct", cells);
        }
        _ => {
            let nulls = vec![Cell::Null; table.n_rows()];
            table.set_column("ppap_completion_pct", nulls);
        }
    }

    let components: Vec<usize> = [
        "psw_completion_pct",
        "drawing_completion_pct",
        "imds_completion_pct",
        "ppap_completion_pct",
    ]
    .iter()
    .filter_map(|c| table.col(c))
    .collect();

    let overall: Vec<Cell> = table
        .rows
        .iter()
        .map(|row| {
            let present: Vec<f64> = components
                .iter()
                .filter_map(|&i| row[i].as_f64())
                .collect();
            if present.is_empty() {
                Cell::Null
            } else {
                Cell::Float(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect();
    table.set_column("overall_completion_pct", overall);

    table
}

/// Guarantee exactly the canonical schema: synthesize nulls for missing
/// fields, order columns canonically, and force percentage fields to float.
fn finalize(mut table: Table) -> Result<Table> {
    for col in mapping::REQUIRED_COLUMNS {
        if !table.has_column(col) {
            let nulls = vec![Cell::Null; table.n_rows()];
            table.add_column(*col, nulls);
        }
    }

    let mut out = table.select(mapping::REQUIRED_COLUMNS);

    for col in mapping::ALL_PCT_COLUMNS {
        let idx = out.col(col).expect("canonical column present");
        for row in &mut out.rows {
            row[idx] = match &row[idx] {
                Cell::Float(v) => Cell::Float(*v),
                Cell::Int(v) => Cell::Float(*v as f64),
                Cell::Null => Cell::Null,
                other => bail!("non-numeric value {other:?} in percentage column {col}"),
            };
        }
    }

    Ok(out)
}
