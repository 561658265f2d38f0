use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::clean::{
    clean_id, detect_date_columns, flag_duplicate_rows, parse_date_column, standardize_text,
};
use crate::collect::Collector;
use crate::repair;
use crate::table::{Cell, RawTable, Table};

pub const DEFAULT_ID_COLUMN: &str = "YAZAKI PN";

/// Date columns used when present; auto-detection kicks in otherwise.
pub const PREFERRED_DATE_COLUMNS: &[&str] = &["Approved Date", "PSW Date", "FAR Date"];

/// Extra date columns parsed on demand so the fact aggregation has real
/// dates for its min targets.
const PROMISED_DATE_COLUMNS: &[&str] = &["Promised Date", "FAR Promised date"];

const TEXT_COLUMNS: &[&str] = &[
    "Supplier Name",
    "Original Supplier Name",
    "Item Description",
    "Part Specification",
];

/// Supplier substrings that win duplicate resolution for a part.
const SUPPLIER_LOCALE_PATTERNS: &[&str] = &["MA", "MAROC", "MOROCCO"];

/// Identity and quality fields carried into the fact table by
/// first-non-null aggregation, when present.
const FACT_FIRST_COLUMNS: &[&str] = &[
    "part_id_raw",
    "Item Description",
    "Supplier Name",
    "Supplier PN",
    "PSW",
    "PSW Type",
    "PSW Sub Type",
    "YPN Status",
    "Handling Manual",
    "IMDS STATUS (Yes, No, N/A)",
    "FAR Status",
    "PPAP Details",
];

#[derive(Debug, Clone, Copy)]
enum DateAgg {
    First,
    Max,
    Min,
}

/// (source derived column, aggregation, fact column name)
const FACT_DATE_AGGS: &[(&str, DateAgg, &str)] = &[
    ("Approved Date_date", DateAgg::Max, "latest_approved_date"),
    ("PSW Date_date", DateAgg::First, "psw_date"),
    ("FAR Date_date", DateAgg::Max, "far_date"),
    ("Promised Date_date", DateAgg::Min, "earliest_promised_date"),
    (
        "FAR Promised date_date",
        DateAgg::Min,
        "earliest_far_promised_date",
    ),
];

/// Three-state classification of a raw project-plant status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Active,
    Discontinued,
    NotInProject,
}

impl StatusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Active => "active",
            StatusClass::Discontinued => "discontinued",
            StatusClass::NotInProject => "not_in_project",
        }
    }

    /// Total over every string: `X` is active, `D` is discontinued, and
    /// anything else, including the legacy `0` marker and null spellings,
    /// is not in the project.
    pub fn classify(raw: &str) -> StatusClass {
        match raw.trim().to_uppercase().as_str() {
            "X" => StatusClass::Active,
            "D" => StatusClass::Discontinued,
            _ => StatusClass::NotInProject,
        }
    }

    pub fn classify_cell(cell: &Cell) -> StatusClass {
        StatusClass::classify(&cell.render())
    }
}

/// Where the identifier and project/plant columns live in the sheet.
#[derive(Debug, Clone)]
struct Layout {
    id_idx: usize,
    id_name: String,
    project_columns: Vec<String>,
}

#[derive(Debug)]
pub struct MasterBomOutput {
    pub masterbom_clean: Table,
    pub plant_item_status: Table,
    pub fact_parts: Table,
}

/// Transformer for the parts-master sheet. Stages run strictly in order,
/// each producing the working table the next one consumes; recoverable
/// problems downgrade to logged fallbacks instead of failing the batch.
#[derive(Debug, Clone)]
pub struct MasterBomTransform {
    id_column: String,
    date_columns: Vec<String>,
}

impl Default for MasterBomTransform {
    fn default() -> Self {
        MasterBomTransform {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            date_columns: Vec::new(),
        }
    }
}

impl MasterBomTransform {
    pub fn new(id_column: impl Into<String>, date_columns: Vec<String>) -> Self {
        MasterBomTransform {
            id_column: id_column.into(),
            date_columns,
        }
    }

    pub fn process(&self, raw: RawTable, collector: &mut Collector) -> Result<MasterBomOutput> {
        if raw.headers.is_empty() {
            bail!("master sheet is not tabular: no columns");
        }
        collector.info(format!(
            "starting masterbom processing: {} rows x {} cols",
            raw.n_rows(),
            raw.n_cols()
        ));

        let raw = repair::repair_headers(raw, collector);
        let mut table = Table::from_raw("masterbom_clean", &raw);

        let layout = identify_columns(&table, &self.id_column, collector);
        clean_id_columns(&mut table, &layout, collector);

        let date_columns = self.choose_date_columns(&table);
        process_date_columns(&mut table, &date_columns, collector);
        prepare_promised_date_columns(&mut table, collector);
        standardize_text_columns(&mut table, collector);

        let plant_item_status = build_plant_item_status(&table, &layout, collector);
        let fact_parts = build_fact_parts(&table, collector);
        let masterbom_clean = finalize_masterbom(table, collector);

        collector.info(format!(
            "masterbom processing complete: {} clean rows, {} plant status rows, {} fact rows",
            masterbom_clean.n_rows(),
            plant_item_status.n_rows(),
            fact_parts.n_rows()
        ));

        Ok(MasterBomOutput {
            masterbom_clean,
            plant_item_status,
            fact_parts,
        })
    }

    fn choose_date_columns(&self, table: &Table) -> Vec<String> {
        let explicit: Vec<&str> = if self.date_columns.is_empty() {
            PREFERRED_DATE_COLUMNS.to_vec()
        } else {
            self.date_columns.iter().map(String::as_str).collect()
        };
        let present: Vec<String> = explicit
            .iter()
            .filter(|c| table.has_column(c))
            .map(|c| c.to_string())
            .collect();
        if !present.is_empty() {
            present
        } else {
            detect_date_columns(table)
        }
    }
}

/// Locate the identifier column (exact case-insensitive name match, first
/// column as fallback), the description column, and the project/plant
/// columns strictly between them.
fn identify_columns(table: &Table, id_column: &str, collector: &mut Collector) -> Layout {
    let wanted = id_column.trim().to_uppercase();
    let id_idx = match table
        .columns
        .iter()
        .position(|c| c.trim().to_uppercase() == wanted)
    {
        Some(idx) => idx,
        None => {
            collector.warn(format!(
                "id column '{id_column}' not found, using first column"
            ));
            0
        }
    };

    let desc_idx = table
        .columns
        .iter()
        .enumerate()
        .skip(id_idx + 1)
        .find(|(_, c)| {
            let lower = c.to_lowercase();
            lower.contains("item") && lower.contains("desc")
        })
        .map(|(i, _)| i);
    let project_end = match desc_idx {
        Some(i) => i,
        None => {
            collector.warn("description column not found, assuming all remaining columns are projects".to_string());
            table.n_cols()
        }
    };

    let project_columns: Vec<String> = table.columns[id_idx + 1..project_end].to_vec();
    collector.info(format!(
        "identified columns: id='{}', {} project columns",
        table.columns[id_idx],
        project_columns.len()
    ));

    Layout {
        id_idx,
        id_name: table.columns[id_idx].clone(),
        project_columns,
    }
}

/// Append `part_id_raw` (stringified original) and `part_id_std`
/// (standardized) identifier columns.
fn clean_id_columns(table: &mut Table, layout: &Layout, collector: &mut Collector) {
    let raw_cells: Vec<Cell> = table
        .rows
        .iter()
        .map(|row| Cell::Text(row[layout.id_idx].render()))
        .collect();
    let std_cells: Vec<Cell> = table
        .rows
        .iter()
        .map(|row| Cell::Text(clean_id(&row[layout.id_idx])))
        .collect();

    let valid = std_cells
        .iter()
        .filter(|c| c.as_text().is_some_and(|s| !s.is_empty()))
        .count();
    collector.info(format!(
        "cleaned id column: {} parts, {} valid ids, {} empty",
        table.n_rows(),
        valid,
        table.n_rows() - valid
    ));

    table.add_column("part_id_raw", raw_cells);
    table.add_column("part_id_std", std_cells);
}

/// Expand each date column into its derived field set. A column that fails
/// to expand is logged and skipped; the rest still process.
fn process_date_columns(table: &mut Table, columns: &[String], collector: &mut Collector) {
    let mut processed = Vec::new();
    for col in columns {
        let Some(values) = table.column_cells_by_name(col) else {
            collector.warn(format!("date column '{col}' not found, skipping"));
            continue;
        };
        let derived = parse_date_column(&values, col);
        for idx in 1..derived.n_cols() {
            table.set_column(&derived.columns[idx].clone(), derived.column_cells(idx));
        }
        processed.push(col.clone());
    }
    collector.info(format!(
        "processed date columns: {processed:?} ({} of {})",
        processed.len(),
        columns.len()
    ));
}

/// Make sure the promised-date columns have derived `_date` fields before
/// fact aggregation.
fn prepare_promised_date_columns(table: &mut Table, collector: &mut Collector) {
    for col in PROMISED_DATE_COLUMNS {
        if table.has_column(col) && !table.has_column(&format!("{col}_date")) {
            let values = table
                .column_cells_by_name(col)
                .expect("column presence checked");
            let derived = parse_date_column(&values, col);
            for idx in 1..derived.n_cols() {
                table.set_column(&derived.columns[idx].clone(), derived.column_cells(idx));
            }
            collector.info(format!("processed additional date column: {col}"));
        }
    }
}

fn standardize_text_columns(table: &mut Table, collector: &mut Collector) {
    let mut standardized = 0;
    for col in TEXT_COLUMNS {
        if let Some(cells) = table.column_cells_by_name(col) {
            table.set_column(col, standardize_text(&cells));
            standardized += 1;
        }
    }
    collector.info(format!("standardized {standardized} text columns"));
}

/// Resolve duplicated part ids before reshaping: within each group of rows
/// sharing a `part_id_std`, a single supplier matching the locale patterns
/// wins; otherwise the first row of the group survives. Survivors keep
/// their original relative order.
fn resolve_source_duplicates(table: &Table, collector: &mut Collector) -> Table {
    let std_idx = table.col("part_id_std").expect("id cleaning ran");
    let supplier_idx = table.col("Supplier Name");

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in table.rows.iter().enumerate() {
        let key = row[std_idx].render();
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(i);
    }

    let duplicated_parts = groups.values().filter(|g| g.len() > 1).count();
    if duplicated_parts == 0 {
        collector.info("no duplicates found in source data".to_string());
        return table.clone();
    }
    collector.info(format!(
        "resolving source duplicates: {duplicated_parts} duplicated part ids"
    ));

    let mut keep: Vec<usize> = Vec::with_capacity(groups.len());
    for key in &order {
        let members = &groups[key];
        if members.len() == 1 {
            keep.push(members[0]);
            continue;
        }

        let chosen = match supplier_idx {
            None => {
                collector.warn(format!(
                    "no supplier column for duplicate resolution of '{key}', keeping first"
                ));
                members[0]
            }
            Some(sup_idx) => {
                let candidates: Vec<usize> = members
                    .iter()
                    .copied()
                    .filter(|&i| {
                        let supplier = table.rows[i][sup_idx].render().to_uppercase();
                        SUPPLIER_LOCALE_PATTERNS.iter().any(|p| supplier.contains(p))
                    })
                    .collect();
                match candidates.len() {
                    1 => candidates[0],
                    0 => members[0],
                    _ => candidates[0],
                }
            }
        };
        keep.push(chosen);
    }

    keep.sort_unstable();
    let resolved = table.keep_rows(&keep);
    collector.info(format!(
        "source duplicate resolution complete: {} rows in, {} rows out",
        table.n_rows(),
        resolved.n_rows()
    ));
    resolved
}

const PLANT_STATUS_COUNT_COLUMNS: &[&str] = &["n_active", "n_inactive", "n_new", "n_duplicate"];

/// Unpivot the project/plant columns into the long plant-item-status table
/// with status classification, duplicate fallbacks, and per-part counts.
fn build_plant_item_status(table: &Table, layout: &Layout, collector: &mut Collector) -> Table {
    let mut columns: Vec<String> = vec![
        "part_id_std".into(),
        "part_id_raw".into(),
        layout.id_name.clone(),
        "project_plant".into(),
        "raw_status".into(),
        "status_class".into(),
        "is_duplicate".into(),
        "is_new".into(),
    ];
    columns.extend(PLANT_STATUS_COUNT_COLUMNS.iter().map(|c| c.to_string()));
    let mut out = Table::new("plant_item_status", columns);

    if layout.project_columns.is_empty() {
        collector.warn("no project columns found for normalization".to_string());
        return out;
    }

    let deduplicated = resolve_source_duplicates(table, collector);

    let std_idx = deduplicated.col("part_id_std").expect("id cleaning ran");
    let raw_idx = deduplicated.col("part_id_raw").expect("id cleaning ran");
    let id_idx = layout.id_idx;
    let project_idxs: Vec<(usize, &String)> = layout
        .project_columns
        .iter()
        .filter_map(|c| deduplicated.col(c).map(|i| (i, c)))
        .collect();

    // melt, dropping any residual (part, plant) duplicate after the first
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut melted_duplicates = 0usize;
    let mut records: Vec<(Vec<Cell>, StatusClass)> = Vec::new();

    for row in &deduplicated.rows {
        for &(col_idx, plant) in &project_idxs {
            let part_key = row[std_idx].render();
            if !seen.insert((part_key, plant.clone())) {
                melted_duplicates += 1;
                continue;
            }
            let raw_status = row[col_idx].clone();
            let class = StatusClass::classify_cell(&raw_status);
            let cells = vec![
                row[std_idx].clone(),
                row[raw_idx].clone(),
                row[id_idx].clone(),
                Cell::Text(plant.clone()),
                raw_status,
                Cell::Text(class.as_str().to_string()),
                Cell::Bool(false),
                Cell::Bool(class == StatusClass::NotInProject),
            ];
            records.push((cells, class));
        }
    }
    if melted_duplicates > 0 {
        collector.info(format!(
            "removed {melted_duplicates} duplicate records from melted data"
        ));
    }

    // per-part counts by status class
    let mut counts: HashMap<String, (i64, i64, i64)> = HashMap::new();
    for (cells, class) in &records {
        let entry = counts.entry(cells[0].render()).or_insert((0, 0, 0));
        match class {
            StatusClass::Active => entry.0 += 1,
            StatusClass::Discontinued => entry.1 += 1,
            StatusClass::NotInProject => entry.2 += 1,
        }
    }

    let mut active_total = 0usize;
    for (mut cells, class) in records {
        let (n_active, n_inactive, n_new) = counts[&cells[0].render()];
        cells.push(Cell::Int(n_active));
        cells.push(Cell::Int(n_inactive));
        cells.push(Cell::Int(n_new));
        cells.push(Cell::Int(0));
        if class == StatusClass::Active {
            active_total += 1;
        }
        out.push_row(cells);
    }

    collector.info(format!(
        "plant-item-status complete: {} records, {} active",
        out.n_rows(),
        active_total
    ));
    out
}

fn first_non_null(cells: impl Iterator<Item = Cell>) -> Cell {
    for cell in cells {
        if !cell.is_null() {
            return cell;
        }
    }
    Cell::Null
}

fn aggregate_dates(cells: impl Iterator<Item = Cell>, agg: DateAgg) -> Cell {
    let dates: Vec<_> = cells.filter_map(|c| c.as_date()).collect();
    let picked = match agg {
        DateAgg::First => dates.first().copied(),
        DateAgg::Max => dates.iter().max().copied(),
        DateAgg::Min => dates.iter().min().copied(),
    };
    picked.map_or(Cell::Null, Cell::Date)
}

/// One row per unique standardized part id, with first/max/min column-wise
/// aggregation and the derived quality flags.
fn build_fact_parts(table: &Table, collector: &mut Collector) -> Table {
    let Some(std_idx) = table.col("part_id_std") else {
        collector.warn("no part_id_std column, skipping fact table".to_string());
        return Table::new("fact_parts", vec!["item_id".into()]);
    };

    let first_cols: Vec<(usize, &str)> = FACT_FIRST_COLUMNS
        .iter()
        .filter_map(|c| table.col(c).map(|i| (i, *c)))
        .collect();
    let date_cols: Vec<(usize, DateAgg, &str)> = FACT_DATE_AGGS
        .iter()
        .filter_map(|(src, agg, dst)| table.col(src).map(|i| (i, *agg, *dst)))
        .collect();

    let mut columns: Vec<String> = vec!["item_id".into()];
    columns.extend(first_cols.iter().map(|(_, name)| name.to_string()));
    columns.extend(date_cols.iter().map(|(_, _, dst)| dst.to_string()));
    let mut out = Table::new("fact_parts", columns);

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in table.rows.iter().enumerate() {
        let key = row[std_idx].render();
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(i);
    }

    for key in &order {
        let members = &groups[key];
        let mut cells: Vec<Cell> = Vec::with_capacity(out.n_cols());
        cells.push(Cell::Text(key.clone()));
        for &(idx, _) in &first_cols {
            cells.push(first_non_null(
                members.iter().map(|&r| table.rows[r][idx].clone()),
            ));
        }
        for &(idx, agg, _) in &date_cols {
            cells.push(aggregate_dates(
                members.iter().map(|&r| table.rows[r][idx].clone()),
                agg,
            ));
        }
        out.push_row(cells);
    }

    // derived quality flags, each tied to its source column being present
    if let Some(idx) = out.col("PSW") {
        let flags = out
            .rows
            .iter()
            .map(|row| Cell::Bool(!row[idx].is_blank()))
            .collect();
        out.add_column("psw_ok", flags);
    }
    if let Some(idx) = out.col("Handling Manual") {
        let flags = out
            .rows
            .iter()
            .map(|row| Cell::Bool(!row[idx].is_null()))
            .collect();
        out.add_column("has_handling_manual", flags);
    }
    if let Some(idx) = out.col("FAR Status") {
        let flags = out
            .rows
            .iter()
            .map(|row| Cell::Bool(row[idx].render().to_uppercase().contains("OK")))
            .collect();
        out.add_column("far_ok", flags);
    }
    if let Some(idx) = out.col("IMDS STATUS (Yes, No, N/A)") {
        let flags = out
            .rows
            .iter()
            .map(|row| Cell::Bool(row[idx].render().to_uppercase().contains("YES")))
            .collect();
        out.add_column("imds_ok", flags);
    }

    collector.info(format!("fact_parts complete: {} parts", out.n_rows()));
    out
}

/// Flag full-row duplicates on the fully processed working table; the flag
/// column rides along into the clean output, rows are never dropped.
fn finalize_masterbom(table: Table, collector: &mut Collector) -> Table {
    let (flagged, count) = flag_duplicate_rows(table, None);
    if count > 0 {
        collector.info(format!(
            "flagged {count} duplicate rows (preserved in dataset)"
        ));
    } else {
        collector.info("no duplicate rows found".to_string());
    }
    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn master_raw(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    fn process(raw: RawTable) -> MasterBomOutput {
        let mut collector = Collector::new();
        MasterBomTransform::default()
            .process(raw, &mut collector)
            .unwrap()
    }

    fn text_at(table: &Table, row: usize, col: &str) -> String {
        table.cell(row, table.col(col).unwrap()).render()
    }

    #[test]
    fn classification_is_total() {
        assert_eq!(StatusClass::classify("X"), StatusClass::Active);
        assert_eq!(StatusClass::classify(" x "), StatusClass::Active);
        assert_eq!(StatusClass::classify("D"), StatusClass::Discontinued);
        assert_eq!(StatusClass::classify(""), StatusClass::NotInProject);
        assert_eq!(StatusClass::classify("nan"), StatusClass::NotInProject);
        assert_eq!(StatusClass::classify("NONE"), StatusClass::NotInProject);
        assert_eq!(StatusClass::classify("null"), StatusClass::NotInProject);
        assert_eq!(StatusClass::classify("0"), StatusClass::NotInProject);
        assert_eq!(StatusClass::classify("whatever"), StatusClass::NotInProject);
        assert_eq!(
            StatusClass::classify_cell(&Cell::Null),
            StatusClass::NotInProject
        );
    }

    #[test]
    fn melts_two_parts_across_two_plants() {
        let raw = master_raw(
            &["YAZAKI PN", "Proj A", "Proj B", "Item Description"],
            &[
                &["7009-6933", "X", "", "Harness"],
                &["7009-6934", "D", "X", "Clip"],
            ],
        );
        let output = process(raw);
        let plant = &output.plant_item_status;

        // 2 surviving parts x 2 project columns
        assert_eq!(plant.n_rows(), 4);

        let class_idx = plant.col("status_class").unwrap();
        let plant_idx = plant.col("project_plant").unwrap();
        let id_idx = plant.col("part_id_std").unwrap();

        let mut seen = Vec::new();
        for row in &plant.rows {
            seen.push((
                row[id_idx].render(),
                row[plant_idx].render(),
                row[class_idx].render(),
            ));
        }
        assert!(seen.contains(&("7009-6933".into(), "Proj A".into(), "active".into())));
        assert!(seen.contains(&("7009-6933".into(), "Proj B".into(), "not_in_project".into())));
        assert!(seen.contains(&("7009-6934".into(), "Proj A".into(), "discontinued".into())));
        assert!(seen.contains(&("7009-6934".into(), "Proj B".into(), "active".into())));
    }

    #[test]
    fn per_part_counts_accumulate() {
        let raw = master_raw(
            &["YAZAKI PN", "Proj A", "Proj B", "Proj C", "Item Description"],
            &[&["P1", "X", "X", "D", "Widget"]],
        );
        let output = process(raw);
        let plant = &output.plant_item_status;
        assert_eq!(plant.n_rows(), 3);
        assert_eq!(text_at(plant, 0, "n_active"), "2");
        assert_eq!(text_at(plant, 0, "n_inactive"), "1");
        assert_eq!(text_at(plant, 0, "n_new"), "0");
        assert_eq!(text_at(plant, 0, "n_duplicate"), "0");
    }

    #[test]
    fn locale_supplier_wins_duplicate_resolution() {
        let raw = master_raw(
            &["YAZAKI PN", "Proj A", "Item Description", "Supplier Name"],
            &[
                &["P1", "X", "Widget", "ACME GmbH"],
                &["P1", "D", "Widget", "Cables Maroc SARL"],
                &["P2", "X", "Clip", "Other Co"],
            ],
        );
        let output = process(raw);
        let plant = &output.plant_item_status;

        // 2 surviving parts x 1 project column
        assert_eq!(plant.n_rows(), 2);
        let p1_row = plant
            .rows
            .iter()
            .position(|r| r[plant.col("part_id_std").unwrap()].render() == "P1")
            .unwrap();
        // the Maroc supplier's row survived, so P1 reads discontinued
        assert_eq!(text_at(plant, p1_row, "status_class"), "discontinued");
    }

    #[test]
    fn without_locale_match_first_row_survives() {
        let raw = master_raw(
            &["YAZAKI PN", "Proj A", "Item Description", "Supplier Name"],
            &[
                &["P1", "X", "Widget", "First Co"],
                &["P1", "D", "Widget", "Second Co"],
            ],
        );
        let output = process(raw);
        let plant = &output.plant_item_status;
        assert_eq!(plant.n_rows(), 1);
        assert_eq!(text_at(plant, 0, "status_class"), "active");
    }

    #[test]
    fn missing_id_column_falls_back_to_first() {
        let raw = master_raw(
            &["Some PN", "Proj A", "Item Description"],
            &[&["P1", "X", "Widget"]],
        );
        let mut collector = Collector::new();
        let output = MasterBomTransform::default()
            .process(raw, &mut collector)
            .unwrap();
        assert_eq!(output.plant_item_status.n_rows(), 1);
        assert!(collector
            .messages()
            .iter()
            .any(|m| m.message.contains("using first column")));
    }

    #[test]
    fn missing_description_treats_rest_as_projects() {
        let raw = master_raw(
            &["YAZAKI PN", "Proj A", "Proj B"],
            &[&["P1", "X", "D"]],
        );
        let output = process(raw);
        assert_eq!(output.plant_item_status.n_rows(), 2);
    }

    #[test]
    fn fact_parts_aggregates_dates_and_flags() {
        let raw = master_raw(
            &[
                "YAZAKI PN",
                "Proj A",
                "Item Description",
                "Supplier Name",
                "PSW",
                "FAR Status",
                "IMDS STATUS (Yes, No, N/A)",
                "Handling Manual",
                "Approved Date",
                "Promised Date",
            ],
            &[
                &["P1", "X", "Widget", "ACME", "ok", "OK closed", "Yes", "HM-1", "2024-01-10", "2024-03-01"],
                &["P1", "X", "Widget", "ACME", "", "", "", "", "2024-02-15", "2024-02-01"],
                &["P2", "D", "Clip", "Other", "", "nok", "No", "", "2023-06-01", ""],
            ],
        );
        let output = process(raw);
        let fact = &output.fact_parts;

        assert_eq!(fact.n_rows(), 2);
        let p1 = fact
            .rows
            .iter()
            .position(|r| r[fact.col("item_id").unwrap()].render() == "P1")
            .unwrap();
        let p2 = fact
            .rows
            .iter()
            .position(|r| r[fact.col("item_id").unwrap()].render() == "P2")
            .unwrap();

        // max of the approved dates, min of the promised dates
        assert_eq!(
            fact.cell(p1, fact.col("latest_approved_date").unwrap()).as_date(),
            NaiveDate::from_ymd_opt(2024, 2, 15)
        );
        assert_eq!(
            fact.cell(p1, fact.col("earliest_promised_date").unwrap()).as_date(),
            NaiveDate::from_ymd_opt(2024, 2, 1)
        );

        let flag = |row: usize, col: &str| fact.cell(row, fact.col(col).unwrap()).clone();
        assert_eq!(flag(p1, "psw_ok"), Cell::Bool(true));
        assert_eq!(flag(p2, "psw_ok"), Cell::Bool(false));
        assert_eq!(flag(p1, "far_ok"), Cell::Bool(true));
        // "nok" contains "ok", matching the substring rule
        assert_eq!(flag(p2, "far_ok"), Cell::Bool(true));
        assert_eq!(flag(p1, "imds_ok"), Cell::Bool(true));
        assert_eq!(flag(p2, "imds_ok"), Cell::Bool(false));
        assert_eq!(flag(p1, "has_handling_manual"), Cell::Bool(true));
        assert_eq!(flag(p2, "has_handling_manual"), Cell::Bool(false));

        // title-cased supplier from text standardization
        assert_eq!(text_at(fact, p1, "Supplier Name"), "Acme");
    }

    #[test]
    fn clean_output_carries_duplicate_flag() {
        let raw = master_raw(
            &["YAZAKI PN", "Proj A", "Item Description"],
            &[
                &["P1", "X", "Widget"],
                &["P1", "X", "Widget"],
            ],
        );
        let output = process(raw);
        let clean = &output.masterbom_clean;
        let idx = clean.col("is_duplicate_entry").unwrap();
        assert_eq!(clean.n_rows(), 2);
        assert_eq!(clean.cell(0, idx), &Cell::Bool(false));
        assert_eq!(clean.cell(1, idx), &Cell::Bool(true));
    }

    #[test]
    fn buried_header_is_repaired_before_processing() {
        let raw = master_raw(
            &["A", "B", "C"],
            &[
                &["Report Title", "", ""],
                &["YAZAKI PN", "Proj A", "Item Description"],
                &["P1", "X", "Widget"],
            ],
        );
        let output = process(raw);
        assert_eq!(output.plant_item_status.n_rows(), 1);
        assert_eq!(
            text_at(&output.plant_item_status, 0, "project_plant"),
            "Proj A"
        );
    }

    #[test]
    fn empty_sheet_is_fatal() {
        let raw = RawTable::new(vec![], vec![]);
        let mut collector = Collector::new();
        assert!(MasterBomTransform::default()
            .process(raw, &mut collector)
            .is_err());
    }
}
