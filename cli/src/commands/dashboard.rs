use anyhow::Result;

use flux_core::models::{Dashboard, GoalDirection};
use flux_core::service::TrackerService;

use super::helpers::{fmt_kcal, fmt_weight, print_json, today};

pub(crate) fn cmd_dashboard(svc: &TrackerService, json: bool) -> Result<()> {
    let dashboard = svc.dashboard(today())?;

    if json {
        print_json(&dashboard)
    } else {
        print_dashboard(&dashboard);
        Ok(())
    }
}

fn print_dashboard(d: &Dashboard) {
    let u = d.units;
    println!("{}\n", d.date.format("%A, %B %-d"));

    let source = d.tdee_source.map_or("no data yet", |s| s.label());
    println!("  TDEE:               {} kcal ({source})", fmt_kcal(d.effective_tdee));
    println!("  Recommended intake: {} kcal", fmt_kcal(d.recommended_intake));
    println!("  Target deficit:     {:+.0} kcal/day", d.target_deficit);
    println!(
        "  Weeks of data:      {} of {} logged",
        d.weeks_of_data, d.weeks_logged
    );
    println!();
    println!("  Current weight:     {} {u}", fmt_weight(d.current_weight));
    println!("  Goal weight:        {:.1} {u}", d.goal_weight);

    match d.projection {
        Some(p) => println!(
            "  Goal date:          {} ({:.0} days)",
            p.date.format("%b %-d, %Y"),
            p.days_to_goal.ceil()
        ),
        None => println!("  Goal date:          -"),
    }

    if let Some(p) = d.progress {
        let verb = match p.direction {
            GoalDirection::Lose => "Lost",
            GoalDirection::Gain => "Gained",
        };
        println!(
            "  Progress:           {verb} {:.1} of {:.1} {u} ({:.0}%)",
            p.achieved, p.total, p.percent
        );
    }

    if d.logging_streak > 0 {
        let plural = if d.logging_streak == 1 { "" } else { "s" };
        println!("  Streak:             {} day{plural}", d.logging_streak);
    }
}
