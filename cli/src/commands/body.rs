use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use flux_core::body_fat::lean_body_mass;
use flux_core::models::{BodyFatSource, BodyLog};
use flux_core::service::TrackerService;

use super::helpers::{fmt_weight, parse_date, print_json};

#[allow(clippy::too_many_arguments)]
pub(crate) fn cmd_body_log(
    svc: &TrackerService,
    weight: f64,
    neck: Option<f64>,
    waist: Option<f64>,
    hips: Option<f64>,
    bf: Option<f64>,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let entry = BodyLog {
        date: parse_date(date)?,
        weight,
        neck,
        waist,
        hips,
        bf_percent: bf,
    };
    let (saved, source) = svc.log_body(&entry)?;

    if json {
        return print_json(&saved);
    }

    println!(
        "Logged body measurements for {}",
        saved.date.format("%Y-%m-%d")
    );
    match saved.bf_percent {
        Some(pct) => {
            let how = match source {
                Some(BodyFatSource::Navy) => "Navy method",
                _ => "manual",
            };
            println!("  Body fat: {pct:.1}% ({how})");
            println!(
                "  Lean mass: {:.1}",
                lean_body_mass(saved.weight, pct)
            );
        }
        None => eprintln!(
            "  Body fat not computed. Set sex and height with `flux setup` and log neck + waist \
             (+ hips for women), or pass --bf."
        ),
    }
    Ok(())
}

pub(crate) fn cmd_body_history(svc: &TrackerService, json: bool) -> Result<()> {
    let logs = svc.body_logs()?;

    if json {
        return print_json(&logs);
    }
    if logs.is_empty() {
        eprintln!("No body logs yet. Use `flux body log --weight <w>` to add one.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct BodyRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Neck")]
        neck: String,
        #[tabled(rename = "Waist")]
        waist: String,
        #[tabled(rename = "Hips")]
        hips: String,
        #[tabled(rename = "BF%")]
        bf: String,
        #[tabled(rename = "Lean")]
        lean: String,
    }

    let rows: Vec<BodyRow> = logs
        .iter()
        .rev()
        .map(|l| BodyRow {
            date: l.date.format("%Y-%m-%d").to_string(),
            weight: fmt_weight(Some(l.weight)),
            neck: fmt_weight(l.neck),
            waist: fmt_weight(l.waist),
            hips: fmt_weight(l.hips),
            bf: fmt_weight(l.bf_percent),
            lean: fmt_weight(l.bf_percent.map(|pct| lean_body_mass(l.weight, pct))),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..7)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    Ok(())
}

pub(crate) fn cmd_body_delete(svc: &TrackerService, date: &str, json: bool) -> Result<()> {
    let date = parse_date(Some(date.to_string()))?;
    let deleted = svc.delete_body_log(date)?;
    let date_str = date.format("%Y-%m-%d");

    if json {
        println!(
            "{}",
            serde_json::json!({ "date": date_str.to_string(), "deleted": deleted })
        );
    } else if deleted {
        println!("Deleted body log for {date_str}");
    } else {
        eprintln!("No body log found for {date_str}");
    }

    Ok(())
}
