use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::info;

use crate::table::RawTable;

/// List the sheet names in a workbook.
pub fn sheet_names<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let workbook = open_workbook_auto(&path)
        .with_context(|| format!("opening workbook {}", path.as_ref().display()))?;
    Ok(workbook.sheet_names().to_vec())
}

/// Render one workbook cell to the string form the cleaners expect. Whole
/// floats lose their trailing `.0` so identifiers survive standardization;
/// date cells keep their serial value so date interpretation stays with the
/// cleaning layer.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}

/// Read a sheet as a raw string grid: first row becomes the header, the
/// rest become data rows padded to the header width.
pub fn read_sheet<P: AsRef<Path>>(path: P, sheet: &str) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(&path)
        .with_context(|| format!("opening workbook {}", path.as_ref().display()))?;
    let range = workbook
        .worksheet_range(sheet)
        .with_context(|| format!("reading sheet '{sheet}'"))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        bail!("sheet '{sheet}' is empty");
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|c| cell_to_string(c).trim().to_string())
        .collect();

    let data: Vec<Vec<String>> = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    let table = RawTable::new(headers, data);
    info!(
        sheet,
        rows = table.n_rows(),
        cols = table.n_cols(),
        "read sheet"
    );
    Ok(table)
}
