use anyhow::{Context, Result};
use arrow::array::{
    ArrayRef, BooleanArray, Date32Array, Float64Array, Int64Array, StringArray,
};
use arrow::csv;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::{
    arrow::ArrowWriter,
    basic::{BrotliLevel, Compression},
    file::properties::WriterProperties,
};
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

use crate::table::{Cell, Table};

fn days_since_epoch(date: NaiveDate) -> i32 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    date.signed_duration_since(epoch).num_days() as i32
}

/// The arrow type a column lands on, from its non-null cells. Mixed or
/// text-bearing columns fall back to strings.
fn column_type(table: &Table, idx: usize) -> DataType {
    let mut ints = false;
    let mut floats = false;
    let mut bools = false;
    let mut dates = false;
    let mut texts = false;
    for row in &table.rows {
        match &row[idx] {
            Cell::Null => {}
            Cell::Int(_) => ints = true,
            Cell::Float(_) => floats = true,
            Cell::Bool(_) => bools = true,
            Cell::Date(_) => dates = true,
            Cell::Text(_) => texts = true,
        }
    }
    match (ints, floats, bools, dates, texts) {
        (_, _, false, false, false) if floats => DataType::Float64,
        (true, false, false, false, false) => DataType::Int64,
        (false, false, true, false, false) => DataType::Boolean,
        (false, false, false, true, false) => DataType::Date32,
        _ => DataType::Utf8,
    }
}

/// Convert a finished table into an arrow batch with one column per field,
/// every field nullable.
pub fn table_to_record_batch(table: &Table) -> Result<RecordBatch> {
    let mut fields: Vec<Field> = Vec::with_capacity(table.n_cols());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.n_cols());

    for idx in 0..table.n_cols() {
        let dtype = column_type(table, idx);
        let array: ArrayRef = match dtype {
            DataType::Int64 => {
                let values: Vec<Option<i64>> = table
                    .rows
                    .iter()
                    .map(|row| match &row[idx] {
                        Cell::Int(v) => Some(*v),
                        _ => None,
                    })
                    .collect();
                Arc::new(Int64Array::from(values))
            }
            DataType::Float64 => {
                let values: Vec<Option<f64>> =
                    table.rows.iter().map(|row| row[idx].as_f64()).collect();
                Arc::new(Float64Array::from(values))
            }
            DataType::Boolean => {
                let values: Vec<Option<bool>> = table
                    .rows
                    .iter()
                    .map(|row| match &row[idx] {
                        Cell::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect();
                Arc::new(BooleanArray::from(values))
            }
            DataType::Date32 => {
                let values: Vec<Option<i32>> = table
                    .rows
                    .iter()
                    .map(|row| row[idx].as_date().map(days_since_epoch))
                    .collect();
                Arc::new(Date32Array::from(values))
            }
            _ => {
                let values: Vec<Option<String>> = table
                    .rows
                    .iter()
                    .map(|row| match &row[idx] {
                        Cell::Null => None,
                        other => Some(other.render()),
                    })
                    .collect();
                Arc::new(StringArray::from(values))
            }
        };
        fields.push(Field::new(
            table.columns[idx].clone(),
            array.data_type().clone(),
            true,
        ));
        arrays.push(array);
    }

    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .context("building record batch from table")
}

/// Persist one table as CSV, returning the written path.
pub fn write_csv(table: &Table, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir).context("creating output directory")?;
    let batch = table_to_record_batch(table)?;
    let path = out_dir.join(format!("{}.csv", table.name));

    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new().with_header(true).build(file);
    writer.write(&batch).context("writing CSV batch")?;

    info!(table = %table.name, path = %path.display(), rows = table.n_rows(), "wrote csv");
    Ok(path)
}

/// Persist one table as parquet, returning the written path.
pub fn write_parquet(table: &Table, out_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(out_dir).context("creating output directory")?;
    let batch = table_to_record_batch(table)?;
    let path = out_dir.join(format!("{}.parquet", table.name));

    let file = File::create(&path).with_context(|| format!("creating {}", path.display()))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::BROTLI(BrotliLevel::try_new(5)?))
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(&batch).context("writing batch to parquet")?;
    writer.close().context("closing parquet writer")?;

    info!(table = %table.name, path = %path.display(), rows = table.n_rows(), "wrote parquet");
    Ok(path)
}

/// Persist every table in both formats.
pub fn write_all(tables: &[Table], out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(tables.len() * 2);
    for table in tables {
        written.push(write_csv(table, out_dir)?);
        written.push(write_parquet(table, out_dir)?);
    }
    Ok(written)
}
