use anyhow::Result;

use flux_core::service::TrackerService;

use super::helpers::{fmt_kcal, fmt_weight, parse_date, print_json};

pub(crate) fn cmd_log(
    svc: &TrackerService,
    weight: Option<f64>,
    calories: Option<f64>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let date = parse_date(date)?;
    let log = svc.log_day(date, weight, calories)?;

    if json {
        print_json(&log)
    } else {
        let units = svc
            .settings()?
            .map(|s| format!(" {}", s.units))
            .unwrap_or_default();
        println!(
            "Logged {}: weight {}{units}, calories {}",
            log.date.format("%Y-%m-%d"),
            fmt_weight(log.weight),
            fmt_kcal(log.calories)
        );
        if !log.is_complete() {
            eprintln!("  Day is incomplete. Log both weight and calories to count it toward TDEE.");
        }
        Ok(())
    }
}

pub(crate) fn cmd_delete(svc: &TrackerService, date: &str, json: bool) -> Result<()> {
    let date = parse_date(Some(date.to_string()))?;
    let deleted = svc.delete_log(date)?;
    let date_str = date.format("%Y-%m-%d");

    if json {
        println!(
            "{}",
            serde_json::json!({ "date": date_str.to_string(), "deleted": deleted })
        );
    } else if deleted {
        println!("Deleted log for {date_str}");
    } else {
        eprintln!("No log found for {date_str}");
    }

    Ok(())
}
