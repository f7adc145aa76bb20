use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use flux_core::service::TrackerService;

use super::helpers::{fmt_delta, fmt_kcal, fmt_weight, print_json, today};

pub(crate) fn cmd_weeks(svc: &TrackerService, json: bool) -> Result<()> {
    let weeks = svc.week_summaries()?;

    if json {
        return print_json(&weeks);
    }
    if weeks.is_empty() {
        eprintln!("No logs yet. Use `flux log --weight <w> --calories <kcal>` to start.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct WeekRow {
        #[tabled(rename = "Week of")]
        week: String,
        #[tabled(rename = "Days")]
        days: String,
        #[tabled(rename = "Avg wt")]
        avg_weight: String,
        #[tabled(rename = "Change")]
        delta: String,
        #[tabled(rename = "Avg kcal")]
        avg_calories: String,
        #[tabled(rename = "Raw TDEE")]
        raw: String,
        #[tabled(rename = "TDEE")]
        smoothed: String,
        #[tabled(rename = "Target")]
        target: String,
    }

    let rows: Vec<WeekRow> = weeks
        .iter()
        .rev()
        .map(|w| WeekRow {
            week: w.week_start.format("%Y-%m-%d").to_string(),
            days: format!("{}/7", w.logged_days),
            avg_weight: fmt_weight((w.avg_weight > 0.0).then_some(w.avg_weight)),
            delta: fmt_delta(w.weight_delta),
            avg_calories: fmt_kcal(Some(w.avg_calories)),
            raw: fmt_kcal(w.raw_tdee),
            smoothed: fmt_kcal(w.smoothed_tdee),
            target: fmt_kcal(w.recommended_intake),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_trend(svc: &TrackerService, days: u32, json: bool) -> Result<()> {
    let points = svc.weight_trend(today(), days)?;

    if json {
        return print_json(&points);
    }
    if points.iter().all(|p| p.weight.is_none()) {
        eprintln!("No weights logged in the last {days} days.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct TrendRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "7-day avg")]
        avg: String,
    }

    let rows: Vec<TrendRow> = points
        .iter()
        .filter(|p| p.weight.is_some() || p.moving_avg.is_some())
        .map(|p| TrendRow {
            date: p.date.format("%Y-%m-%d").to_string(),
            weight: fmt_weight(p.weight),
            avg: fmt_weight(p.moving_avg),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}
