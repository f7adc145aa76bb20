use std::collections::BTreeMap;
use std::io::Read;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::info;

use crate::models::{DayLog, validate_day_log};
use crate::store::DataStore;

/// A single row parsed from a daily log CSV.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub date: NaiveDate,
    pub weight: Option<f64>,
    pub calories: Option<f64>,
}

/// Summary of what a CSV import would do / did.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CsvImportSummary {
    pub rows_parsed: usize,
    pub logs_created: usize,
    pub logs_updated: usize,
    pub dates_spanned: usize,
}

/// Parse a daily log CSV from any reader.
///
/// Expected header: `Date,Weight,Calories`. Either value column may be
/// omitted, and header names are matched case-insensitively.
pub fn parse_log_csv<R: Read>(reader: R) -> Result<Vec<LogRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let idx_date = col("Date").context("Missing required column: Date")?;
    let idx_weight = col("Weight");
    let idx_cal = col("Calories");
    if idx_weight.is_none() && idx_cal.is_none() {
        bail!("CSV needs a Weight or Calories column");
    }

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let line = line_num + 2;
        let record = result.with_context(|| format!("Failed to parse CSV row {line}"))?;

        let date = record.get(idx_date).unwrap_or("").trim();
        if date.is_empty() {
            continue;
        }
        let date = normalize_date(date).with_context(|| format!("Row {line}"))?;

        let parse_opt_f64 = |idx: Option<usize>, name: &str| -> Result<Option<f64>> {
            let Some(raw) = idx.and_then(|i| record.get(i)).map(str::trim) else {
                return Ok(None);
            };
            if raw.is_empty() {
                return Ok(None);
            }
            let value = raw
                .replace(',', "")
                .parse::<f64>()
                .with_context(|| format!("Row {line}: invalid {name} '{raw}'"))?;
            Ok(Some(value))
        };

        let weight = parse_opt_f64(idx_weight, "weight")?;
        let calories = parse_opt_f64(idx_cal, "calories")?;
        if weight.is_none() && calories.is_none() {
            continue;
        }

        rows.push(LogRow {
            date,
            weight,
            calories,
        });
    }

    Ok(rows)
}

/// Accepts `YYYY-MM-DD`, then `M/D/YYYY`, then `D/M/YYYY`.
fn normalize_date(raw: &str) -> Result<NaiveDate> {
    ["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .with_context(|| format!("Cannot parse date: '{raw}'"))
}

/// Merge parsed rows into the store.
///
/// A blank cell keeps whatever is already stored for that day. Every merged
/// log is validated before anything is written. When `dry_run` is true,
/// nothing is written but the summary is computed the same way.
pub fn import_logs<S: DataStore + ?Sized>(
    store: &S,
    rows: &[LogRow],
    dry_run: bool,
) -> Result<CsvImportSummary> {
    let mut logs_created: usize = 0;
    let mut logs_updated: usize = 0;

    // Merged logs keyed by date, so repeated dates stack correctly.
    let mut merged_logs: BTreeMap<NaiveDate, DayLog> = BTreeMap::new();

    for row in rows {
        let existing = match merged_logs.get(&row.date) {
            Some(log) => Some(log.clone()),
            None => {
                let stored = store.get_log(row.date)?;
                if stored.is_some() {
                    logs_updated += 1;
                } else {
                    logs_created += 1;
                }
                stored
            }
        };

        let merged = DayLog {
            date: row.date,
            weight: row.weight.or(existing.as_ref().and_then(|l| l.weight)),
            calories: row.calories.or(existing.as_ref().and_then(|l| l.calories)),
        };
        validate_day_log(&merged).with_context(|| format!("Invalid values for {}", row.date))?;
        merged_logs.insert(row.date, merged);
    }

    if !dry_run {
        let logs: Vec<DayLog> = merged_logs.values().cloned().collect();
        store.save_logs(&logs)?;
    }

    let summary = CsvImportSummary {
        rows_parsed: rows.len(),
        logs_created,
        logs_updated,
        dates_spanned: merged_logs.len(),
    };
    info!(
        rows = summary.rows_parsed,
        created = summary.logs_created,
        updated = summary.logs_updated,
        dry_run,
        "imported CSV logs"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    const SAMPLE_CSV: &str = "\
Date,Weight,Calories
2026-01-05,180.2,2100
2026-01-06,179.8,1950
2026-01-07,,2200
2026-01-08,179.1,
";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_parse_log_csv_basic() {
        let rows = parse_log_csv(SAMPLE_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);

        assert_eq!(rows[0].date, date("2026-01-05"));
        assert_eq!(rows[0].weight, Some(180.2));
        assert_eq!(rows[0].calories, Some(2100.0));
        assert!(rows[2].weight.is_none());
        assert!(rows[3].calories.is_none());
    }

    #[test]
    fn test_parse_log_csv_case_insensitive_single_column() {
        let csv = "date,WEIGHT\n2026-01-05,80.5\n";
        let rows = parse_log_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].weight, Some(80.5));
        assert!(rows[0].calories.is_none());
    }

    #[test]
    fn test_parse_log_csv_missing_columns() {
        let err = parse_log_csv("Weight,Calories\n180,2000\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Date"));

        let err = parse_log_csv("Date,Notes\n2026-01-05,hi\n".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Weight or Calories"));
    }

    #[test]
    fn test_parse_log_csv_skips_blank_rows() {
        let csv = "\
Date,Weight,Calories
2026-01-05,180,2000
,,
2026-01-06,,
2026-01-07,179,2100
";
        let rows = parse_log_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_parse_log_csv_thousands_separator() {
        let csv = "Date,Calories\n2026-01-05,\"2,150\"\n";
        let rows = parse_log_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].calories, Some(2150.0));
    }

    #[test]
    fn test_parse_log_csv_bad_number_reports_row() {
        let csv = "Date,Weight\n2026-01-05,180\n2026-01-06,heavy\n";
        let err = parse_log_csv(csv.as_bytes()).unwrap_err();
        assert!(format!("{err:#}").contains("Row 3"));
    }

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(normalize_date("2026-01-15").unwrap(), date("2026-01-15"));
        assert_eq!(normalize_date("1/15/2026").unwrap(), date("2026-01-15"));
        assert_eq!(normalize_date("15/1/2026").unwrap(), date("2026-01-15"));
        assert!(normalize_date("not-a-date").is_err());
    }

    #[test]
    fn test_import_logs_dry_run() {
        let db = Database::open_in_memory().unwrap();
        let rows = parse_log_csv(SAMPLE_CSV.as_bytes()).unwrap();

        let summary = import_logs(&db, &rows, true).unwrap();
        assert_eq!(summary.rows_parsed, 4);
        assert_eq!(summary.logs_created, 4);
        assert_eq!(summary.logs_updated, 0);
        assert_eq!(summary.dates_spanned, 4);

        assert!(db.get_logs(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_import_logs_actual() {
        let db = Database::open_in_memory().unwrap();
        let rows = parse_log_csv(SAMPLE_CSV.as_bytes()).unwrap();

        let summary = import_logs(&db, &rows, false).unwrap();
        assert_eq!(summary.logs_created, 4);

        let logs = db.get_logs(None, None).unwrap();
        assert_eq!(logs.len(), 4);
        assert!(logs[0].is_complete());
        assert!(!logs[2].is_complete());
    }

    #[test]
    fn test_import_logs_merges_with_existing() {
        let db = Database::open_in_memory().unwrap();
        db.save_log(&DayLog {
            date: date("2026-01-07"),
            weight: Some(179.5),
            calories: None,
        })
        .unwrap();

        let rows = parse_log_csv(SAMPLE_CSV.as_bytes()).unwrap();
        let summary = import_logs(&db, &rows, false).unwrap();
        assert_eq!(summary.logs_created, 3);
        assert_eq!(summary.logs_updated, 1);

        let merged = db.get_log(date("2026-01-07")).unwrap().unwrap();
        assert_eq!(merged.weight, Some(179.5));
        assert_eq!(merged.calories, Some(2200.0));
    }

    #[test]
    fn test_import_logs_repeated_dates_stack() {
        let db = Database::open_in_memory().unwrap();
        let csv = "\
Date,Weight,Calories
2026-01-05,180,
2026-01-05,,2000
";
        let rows = parse_log_csv(csv.as_bytes()).unwrap();
        let summary = import_logs(&db, &rows, false).unwrap();
        assert_eq!(summary.rows_parsed, 2);
        assert_eq!(summary.logs_created, 1);
        assert_eq!(summary.dates_spanned, 1);

        let log = db.get_log(date("2026-01-05")).unwrap().unwrap();
        assert!(log.is_complete());
    }

    #[test]
    fn test_import_logs_rejects_negative_calories() {
        let db = Database::open_in_memory().unwrap();
        let rows = vec![LogRow {
            date: date("2026-01-05"),
            weight: None,
            calories: Some(-100.0),
        }];
        assert!(import_logs(&db, &rows, false).is_err());
        assert!(db.get_logs(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_import_logs_invalid_last_row_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let csv = "\
Date,Weight,Calories
2026-01-05,180.2,2100
2026-01-06,179.8,1950
2026-01-07,-5,2000
";
        let rows = parse_log_csv(csv.as_bytes()).unwrap();
        let err = import_logs(&db, &rows, false).unwrap_err();
        assert!(format!("{err:#}").contains("2026-01-07"));
        assert!(db.get_logs(None, None).unwrap().is_empty());
    }
}
