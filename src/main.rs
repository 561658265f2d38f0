use anyhow::{bail, Result};
use bomsmith::{
    collect::Collector,
    pipeline::{run_transform, TransformOptions},
    store, workbook,
};
use std::{env, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,bomsmith=info"));
    fmt::Subscriber::builder().with_env_filter(env_filter).init();
    info!("startup");

    // ─── 2) parse arguments ──────────────────────────────────────────
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        bail!("usage: bomsmith <workbook.xlsx> [master_sheet] [status_sheet] [out_dir]");
    }
    let workbook_path = PathBuf::from(&args[1]);
    let master_sheet = args.get(2).map(String::as_str).unwrap_or("MasterBOM");
    let status_sheet = args.get(3).map(String::as_str).unwrap_or("Status");
    let out_dir = PathBuf::from(args.get(4).map(String::as_str).unwrap_or("out"));

    // ─── 3) read both sheets ─────────────────────────────────────────
    let sheets = workbook::sheet_names(&workbook_path)?;
    info!(?sheets, "workbook opened");
    for wanted in [master_sheet, status_sheet] {
        if !sheets.iter().any(|s| s == wanted) {
            bail!("sheet '{}' not found in {}", wanted, workbook_path.display());
        }
    }
    let master = workbook::read_sheet(&workbook_path, master_sheet)?;
    let status = workbook::read_sheet(&workbook_path, status_sheet)?;

    // ─── 4) run the transform ────────────────────────────────────────
    let mut collector = Collector::new();
    let options = TransformOptions::default();
    let tables = match run_transform(master, status, &options, &mut collector) {
        Ok(tables) => tables,
        Err(err) => {
            for diagnostic in collector.messages() {
                warn!(level = ?diagnostic.level, "{}", diagnostic.message);
            }
            return Err(err);
        }
    };

    // ─── 5) persist every output table ───────────────────────────────
    let tables = tables.into_vec();
    for table in &tables {
        info!(table = %table.name, rows = table.n_rows(), cols = table.n_cols(), "output table");
    }
    let written = store::write_all(&tables, &out_dir)?;
    std::fs::write(
        out_dir.join("diagnostics.json"),
        serde_json::to_string_pretty(collector.messages())?,
    )?;
    info!(
        files = written.len(),
        diagnostics = collector.len(),
        out_dir = %out_dir.display(),
        "all done"
    );

    Ok(())
}
