use anyhow::Result;
use clap::Args;

use flux_core::models::{DEFAULT_TDEE_WINDOW, Sex, Units, UserSettings};
use flux_core::service::TrackerService;
use flux_core::tdee::formula_tdee;

use super::helpers::{fmt_kcal, json_error, parse_date, print_json};

#[derive(Args)]
pub(crate) struct SetupArgs {
    /// Starting body weight
    #[arg(long)]
    pub start_weight: f64,
    /// Goal body weight
    #[arg(long)]
    pub goal_weight: f64,
    /// Weight unit: kg or lbs
    #[arg(short, long, default_value = "lbs")]
    pub units: Units,
    /// TDEE smoothing window in weeks: 2, 4 or 8
    #[arg(short, long, default_value_t = DEFAULT_TDEE_WINDOW)]
    pub window: u32,
    /// Daily calories relative to TDEE (negative for a deficit)
    #[arg(long, default_value = "-500", allow_hyphen_values = true)]
    pub deficit: f64,
    /// Start date (YYYY-MM-DD or today/yesterday, default: today)
    #[arg(long)]
    pub start_date: Option<String>,
    /// Sex for the formula estimate: male or female
    #[arg(long)]
    pub sex: Option<Sex>,
    /// Height in cm
    #[arg(long)]
    pub height: Option<f64>,
    /// Age in years
    #[arg(long)]
    pub age: Option<u32>,
    /// Activity multiplier (1.2 sedentary .. 1.9 very active)
    #[arg(long)]
    pub activity: Option<f64>,
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub(crate) fn cmd_setup(svc: &TrackerService, args: SetupArgs) -> Result<()> {
    let settings = UserSettings {
        start_date: parse_date(args.start_date)?,
        start_weight: args.start_weight,
        goal_weight: args.goal_weight,
        units: args.units,
        tdee_window: args.window,
        target_deficit: args.deficit,
        sex: args.sex,
        height: args.height,
        age: args.age,
        activity_multiplier: args.activity,
    };
    svc.save_settings(&settings)?;

    if args.json {
        print_json(&settings)
    } else {
        println!("Settings saved.\n");
        print_settings(&settings);
        Ok(())
    }
}

pub(crate) fn cmd_settings(svc: &TrackerService, json: bool) -> Result<()> {
    let Some(settings) = svc.settings()? else {
        if json {
            println!("{}", json_error("No settings found. Run `flux setup` first"));
        } else {
            eprintln!("No settings found. Run `flux setup` first.");
        }
        return Ok(());
    };

    if json {
        print_json(&settings)
    } else {
        print_settings(&settings);
        Ok(())
    }
}

fn print_settings(s: &UserSettings) {
    let u = s.units;
    println!("  Start date:     {}", s.start_date.format("%Y-%m-%d"));
    println!("  Start weight:   {:.1} {u}", s.start_weight);
    println!("  Goal weight:    {:.1} {u}", s.goal_weight);
    println!("  TDEE window:    {} weeks", s.tdee_window);
    println!("  Target deficit: {:+.0} kcal/day", s.target_deficit);
    if let Some(sex) = s.sex {
        println!("  Sex:            {sex}");
    }
    if let Some(h) = s.height {
        println!("  Height:         {h:.0} cm");
    }
    if let Some(a) = s.age {
        println!("  Age:            {a}");
    }
    if let Some(m) = s.activity_multiplier {
        println!("  Activity:       {m}");
    }
    if let Some(f) = formula_tdee(s) {
        println!("  Formula TDEE:   {} kcal", fmt_kcal(Some(f)));
    }
}
