use std::path::Path;

use anyhow::{Context, Result, bail};

use flux_core::models::ExportData;
use flux_core::service::TrackerService;

/// Without a file the bundle goes to stdout, so `--json` only changes the
/// confirmation printed after writing a file.
pub(crate) fn cmd_export(svc: &TrackerService, file: Option<&Path>, json: bool) -> Result<()> {
    let data = svc.export_all()?;
    let bundle = serde_json::to_string_pretty(&data)?;

    match file {
        Some(path) => {
            std::fs::write(path, bundle)
                .with_context(|| format!("Failed to write export: {}", path.display()))?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "path": path.display().to_string(),
                        "logs": data.logs.len(),
                        "body_logs": data.body_logs.len(),
                    })
                );
                return Ok(());
            }
            eprintln!(
                "Exported {} day logs and {} body logs to {}",
                data.logs.len(),
                data.body_logs.len(),
                path.display()
            );
        }
        None => println!("{bundle}"),
    }
    Ok(())
}

pub(crate) fn cmd_import(svc: &TrackerService, file: &Path, json: bool) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let data: ExportData = serde_json::from_str(&contents)
        .with_context(|| format!("Not a flux export bundle: {}", file.display()))?;

    let summary = svc.import_all(&data)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Import complete.\n");
        println!(
            "  Settings:  {}",
            if summary.settings_imported { "imported" } else { "unchanged" }
        );
        println!("  Day logs:  {}", summary.logs_imported);
        println!("  Body logs: {}", summary.body_logs_imported);
    }
    Ok(())
}

pub(crate) fn cmd_import_csv(
    svc: &TrackerService,
    file: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let contents = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to open file: {}", file.display()))?;

    let summary = svc.import_csv(&contents, dry_run)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "dry_run": dry_run,
                "rows_parsed": summary.rows_parsed,
                "logs_created": summary.logs_created,
                "logs_updated": summary.logs_updated,
                "dates_spanned": summary.dates_spanned,
            })
        );
    } else if summary.rows_parsed == 0 {
        eprintln!("No rows found in CSV file.");
    } else {
        if dry_run {
            println!("Dry run: no changes made.\n");
        } else {
            println!("Import complete.\n");
        }
        println!("  Rows parsed:   {}", summary.rows_parsed);
        println!("  Logs created:  {}", summary.logs_created);
        println!("  Logs updated:  {}", summary.logs_updated);
        println!("  Dates spanned: {}", summary.dates_spanned);
    }
    Ok(())
}

pub(crate) fn cmd_reset(svc: &TrackerService, yes: bool, json: bool) -> Result<()> {
    if !yes {
        bail!("This deletes all settings and logs. Re-run with --yes to confirm");
    }
    svc.clear_all()?;

    if json {
        println!("{}", serde_json::json!({ "reset": true }));
    } else {
        println!("All data deleted.");
    }
    Ok(())
}
