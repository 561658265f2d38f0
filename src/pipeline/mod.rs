use anyhow::Result;

use crate::calendar::{build_calendar, DateSeries};
use crate::clean::detect_date_columns;
use crate::collect::Collector;
use crate::masterbom::{MasterBomTransform, DEFAULT_ID_COLUMN, PREFERRED_DATE_COLUMNS};
use crate::repair;
use crate::status::StatusTransform;
use crate::table::{RawTable, Table};

/// Per-request knobs for a transform run.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Name of the part identifier column in the master sheet.
    pub id_column: String,
    /// Date columns to process explicitly; auto-detection fills the gaps.
    pub date_columns: Vec<String>,
    /// Auto-detected date columns to keep out of the calendar.
    pub excluded_date_columns: Vec<String>,
}

impl Default for TransformOptions {
    fn default() -> Self {
        TransformOptions {
            id_column: DEFAULT_ID_COLUMN.to_string(),
            date_columns: PREFERRED_DATE_COLUMNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            excluded_date_columns: Vec::new(),
        }
    }
}

/// The full set of named output tables from one transform request.
#[derive(Debug)]
pub struct TransformTables {
    pub masterbom_clean: Table,
    pub plant_item_status: Table,
    pub fact_parts: Table,
    pub status_clean: Table,
    pub project_completion_by_plant: Table,
    pub dim_dates: Table,
    pub date_role_bridge: Table,
}

impl TransformTables {
    pub fn into_vec(self) -> Vec<Table> {
        vec![
            self.masterbom_clean,
            self.plant_item_status,
            self.fact_parts,
            self.status_clean,
            self.project_completion_by_plant,
            self.dim_dates,
            self.date_role_bridge,
        ]
    }
}

/// Run the whole transform for one workbook: repair, the two independent
/// sheet pipelines, then the calendar built from both sides' date columns.
/// Master-side problems degrade to logged fallbacks; a status-sheet failure
/// aborts the request (diagnostics gathered so far stay on the collector).
pub fn run_transform(
    master: RawTable,
    status: RawTable,
    options: &TransformOptions,
    collector: &mut Collector,
) -> Result<TransformTables> {
    collector.info(format!(
        "starting transform: master {}x{}, status {}x{}",
        master.n_rows(),
        master.n_cols(),
        status.n_rows(),
        status.n_cols()
    ));

    // repaired copy for calendar gathering; the transformer repairs its own
    let repaired_master = repair::repair_headers(master.clone(), collector);

    let master_output = MasterBomTransform::new(
        options.id_column.clone(),
        options.date_columns.clone(),
    )
    .process(master, collector)?;

    let status_repaired = repair::repair_headers(status, collector);
    let status_output = StatusTransform::new().process(status_repaired, collector)?;

    let series = gather_date_series(
        &repaired_master,
        &status_output.status_clean,
        options,
        collector,
    );
    let calendar = build_calendar(&series);
    collector.info(format!(
        "calendar built: {} days, {} bridge rows",
        calendar.dim_dates.n_rows(),
        calendar.date_role_bridge.n_rows()
    ));

    Ok(TransformTables {
        masterbom_clean: master_output.masterbom_clean,
        plant_item_status: master_output.plant_item_status,
        fact_parts: master_output.fact_parts,
        status_clean: status_output.status_clean,
        project_completion_by_plant: status_output.project_completion_by_plant,
        dim_dates: calendar.dim_dates,
        date_role_bridge: calendar.date_role_bridge,
    })
}

/// Collect (values, role) pairs for the calendar: the explicit master date
/// columns, auto-detected extras minus exclusions, and the status sheet's
/// two date fields.
fn gather_date_series(
    master: &RawTable,
    status_clean: &Table,
    options: &TransformOptions,
    collector: &mut Collector,
) -> Vec<DateSeries> {
    let master_table = Table::from_raw("master", master);
    let mut roles: Vec<String> = Vec::new();
    let mut series: Vec<DateSeries> = Vec::new();

    for col in &options.date_columns {
        if roles.contains(col) {
            continue;
        }
        if let Some(values) = master_table.column_cells_by_name(col) {
            roles.push(col.clone());
            series.push(DateSeries::new(col.clone(), values));
        }
    }

    let auto = detect_date_columns(&master_table);
    for col in auto {
        if roles.contains(&col) || options.excluded_date_columns.contains(&col) {
            continue;
        }
        if let Some(values) = master_table.column_cells_by_name(&col) {
            roles.push(col.clone());
            series.push(DateSeries::new(col, values));
        }
    }

    for col in ["milestone_date", "bom_file_date"] {
        if let Some(values) = status_clean.column_cells_by_name(col) {
            if values.iter().any(|c| !c.is_null()) {
                roles.push(col.to_string());
                series.push(DateSeries::new(col, values));
            }
        }
    }

    collector.info(format!("date columns for calendar: {roles:?}"));
    series
}
