use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::body_fat::navy_body_fat;
use crate::csv_import::{self, CsvImportSummary};
use crate::db::Database;
use crate::models::{
    BodyFatSource, BodyLog, Dashboard, DayLog, ExportData, ImportSummary, TrendPoint,
    UserSettings, WeekSummary, validate_body_log, validate_day_log, validate_settings,
};
use crate::projection::{
    MAX_TREND_DAYS, current_weight, goal_progress, logging_streak, project_goal, weight_trend,
};
use crate::store::DataStore;
use crate::tdee::{
    adaptive_tdee, build_week_summaries, effective_tdee, formula_tdee, recommended_intake,
    tdee_source, weeks_of_data,
};

/// Application facade: validates writes and recomputes derived values on read.
pub struct TrackerService<S: DataStore = Database> {
    store: S,
}

impl TrackerService<Database> {
    pub fn new(db_path: &str) -> Result<Self> {
        let db = Database::open(Path::new(db_path))?;
        Ok(Self { store: db })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self { store: db })
    }
}

impl<S: DataStore> TrackerService<S> {
    pub fn with_store(store: S) -> Self {
        Self { store }
    }


    // --- Settings ---

    pub fn settings(&self) -> Result<Option<UserSettings>> {
        self.store.get_settings()
    }

    fn require_settings(&self) -> Result<UserSettings> {
        self.store
            .get_settings()?
            .context("No settings found. Run `flux setup` first")
    }

    pub fn save_settings(&self, settings: &UserSettings) -> Result<()> {
        validate_settings(settings)?;
        self.store.save_settings(settings)
    }

    // --- Day logs ---

    /// Record weight and/or calories for a day, keeping any value not given.
    pub fn log_day(
        &self,
        date: NaiveDate,
        weight: Option<f64>,
        calories: Option<f64>,
    ) -> Result<DayLog> {
        if weight.is_none() && calories.is_none() {
            bail!("Nothing to log: give a weight, calories, or both");
        }
        let existing = self.store.get_log(date)?;
        let log = DayLog {
            date,
            weight: weight.or(existing.as_ref().and_then(|l| l.weight)),
            calories: calories.or(existing.as_ref().and_then(|l| l.calories)),
        };
        validate_day_log(&log)?;
        self.store.save_log(&log)?;
        Ok(log)
    }

    /// Replace a day's log as given, without merging.
    pub fn put_log(&self, log: &DayLog) -> Result<()> {
        validate_day_log(log)?;
        self.store.save_log(log)
    }

    pub fn delete_log(&self, date: NaiveDate) -> Result<bool> {
        self.store.delete_log(date)
    }

    pub fn logs(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Vec<DayLog>> {
        self.store.get_logs(from, to)
    }

    // --- Body logs ---

    /// Save a body log, computing body fat with the Navy method when the
    /// profile and measurements allow it. `entry.bf_percent` is the manual
    /// fallback when they don't. Returns the saved log and where its body-fat
    /// value came from.
    pub fn log_body(&self, entry: &BodyLog) -> Result<(BodyLog, Option<BodyFatSource>)> {
        let settings = self.store.get_settings()?;
        let profile = settings.as_ref().and_then(|s| Some((s.sex?, s.height?)));

        let computed = match (profile, entry.neck, entry.waist) {
            (Some((sex, height)), Some(neck), Some(waist)) => {
                match navy_body_fat(neck, waist, height, sex, entry.hips) {
                    Ok(bf) => Some(bf),
                    Err(e) => {
                        warn!(date = %entry.date, error = %e, "navy body fat not computable");
                        None
                    }
                }
            }
            _ => None,
        };

        let (bf_percent, source) = match computed {
            Some(bf) => (Some((bf * 10.0).round() / 10.0), Some(BodyFatSource::Navy)),
            None => (
                entry.bf_percent,
                entry.bf_percent.map(|_| BodyFatSource::Manual),
            ),
        };
        let log = BodyLog {
            bf_percent,
            ..entry.clone()
        };
        validate_body_log(&log)?;
        self.store.save_body_log(&log)?;
        Ok((log, source))
    }

    pub fn body_logs(&self) -> Result<Vec<BodyLog>> {
        self.store.get_body_logs()
    }

    pub fn delete_body_log(&self, date: NaiveDate) -> Result<bool> {
        self.store.delete_body_log(date)
    }

    // --- Derived views ---

    pub fn week_summaries(&self) -> Result<Vec<WeekSummary>> {
        let settings = self.require_settings()?;
        let logs = self.store.get_logs(None, None)?;
        Ok(build_week_summaries(&logs, &settings))
    }

    pub fn dashboard(&self, today: NaiveDate) -> Result<Dashboard> {
        let settings = self.require_settings()?;
        let logs = self.store.get_logs(None, None)?;
        let summaries = build_week_summaries(&logs, &settings);

        let weeks = weeks_of_data(&summaries);
        let adaptive = adaptive_tdee(&summaries);
        let formula = formula_tdee(&settings);
        let effective = effective_tdee(adaptive, formula, weeks);
        let intake = effective.map(|t| recommended_intake(t, settings.target_deficit));
        let current = current_weight(&logs);

        let projection = match (current, effective, intake) {
            (Some(c), Some(t), Some(i)) => {
                project_goal(c, settings.goal_weight, t, i, settings.units, today)
            }
            _ => None,
        };
        let progress = current.map(|c| goal_progress(settings.start_weight, c, settings.goal_weight));

        debug!(
            weeks,
            ?adaptive,
            ?formula,
            ?effective,
            "computed dashboard"
        );

        Ok(Dashboard {
            date: today,
            units: settings.units,
            weeks_logged: summaries.len(),
            weeks_of_data: weeks,
            adaptive_tdee: adaptive,
            formula_tdee: formula,
            effective_tdee: effective,
            tdee_source: tdee_source(adaptive, formula, weeks),
            target_deficit: settings.target_deficit,
            recommended_intake: intake,
            current_weight: current,
            goal_weight: settings.goal_weight,
            projection,
            progress,
            logging_streak: logging_streak(&logs, today),
        })
    }

    pub fn weight_trend(&self, end: NaiveDate, days: u32) -> Result<Vec<TrendPoint>> {
        if days == 0 || days > MAX_TREND_DAYS {
            bail!("days must be between 1 and {MAX_TREND_DAYS} (got {days})");
        }
        let from = end.checked_sub_days(chrono::Days::new(u64::from(days)));
        let logs = self.store.get_logs(from, Some(end))?;
        Ok(weight_trend(&logs, end, days))
    }

    // --- Bulk ---

    pub fn export_all(&self) -> Result<ExportData> {
        self.store.export_all()
    }

    pub fn import_all(&self, data: &ExportData) -> Result<ImportSummary> {
        self.store.import_all(data)
    }

    pub fn import_csv(&self, csv_data: &str, dry_run: bool) -> Result<CsvImportSummary> {
        let rows = csv_import::parse_log_csv(csv_data.as_bytes())?;
        csv_import::import_logs(&self.store, &rows, dry_run)
    }

    pub fn clear_all(&self) -> Result<()> {
        self.store.clear_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Sex, TdeeSource, Units};
    use crate::store::MemoryStore;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_settings() -> UserSettings {
        UserSettings {
            start_date: date("2026-01-05"),
            start_weight: 180.0,
            goal_weight: 170.0,
            units: Units::Lbs,
            tdee_window: 4,
            target_deficit: -500.0,
            sex: None,
            height: None,
            age: None,
            activity_multiplier: None,
        }
    }

    fn service() -> TrackerService<MemoryStore> {
        let svc = TrackerService::with_store(MemoryStore::new());
        svc.save_settings(&sample_settings()).unwrap();
        svc
    }

    fn body(neck: Option<f64>, waist: Option<f64>, hips: Option<f64>, bf: Option<f64>) -> BodyLog {
        BodyLog {
            date: date("2026-01-05"),
            weight: 180.0,
            neck,
            waist,
            hips,
            bf_percent: bf,
        }
    }

    #[test]
    fn test_save_settings_validates() {
        let svc = TrackerService::with_store(MemoryStore::new());
        let bad = UserSettings {
            tdee_window: 5,
            ..sample_settings()
        };
        assert!(svc.save_settings(&bad).is_err());
        assert!(svc.settings().unwrap().is_none());
    }

    #[test]
    fn test_derived_views_need_settings() {
        let svc = TrackerService::with_store(MemoryStore::new());
        let err = svc.dashboard(date("2026-01-10")).unwrap_err();
        assert!(err.to_string().contains("flux setup"));
        assert!(svc.week_summaries().is_err());
    }

    #[test]
    fn test_log_day_merges_fields() {
        let svc = service();
        svc.log_day(date("2026-01-05"), Some(180.0), None).unwrap();
        let log = svc.log_day(date("2026-01-05"), None, Some(2100.0)).unwrap();
        assert_eq!(log.weight, Some(180.0));
        assert_eq!(log.calories, Some(2100.0));
        assert!(log.is_complete());
    }

    #[test]
    fn test_log_day_rejects_empty_and_invalid() {
        let svc = service();
        assert!(svc.log_day(date("2026-01-05"), None, None).is_err());
        assert!(svc.log_day(date("2026-01-05"), Some(-1.0), None).is_err());
        assert!(svc.logs(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_dashboard_empty_logs() {
        let svc = service();
        let d = svc.dashboard(date("2026-01-10")).unwrap();
        assert_eq!(d.weeks_logged, 0);
        assert!(d.effective_tdee.is_none());
        assert!(d.tdee_source.is_none());
        assert!(d.recommended_intake.is_none());
        assert!(d.current_weight.is_none());
        assert!(d.projection.is_none());
        assert!(d.progress.is_none());
        assert_eq!(d.logging_streak, 0);
    }

    #[test]
    fn test_dashboard_with_adaptive_data() {
        let svc = service();
        // Two weeks losing 1 lb/week on 2000 kcal: raw TDEE = 2500.
        for (d, w) in [
            ("2026-01-05", 180.0),
            ("2026-01-11", 179.0),
            ("2026-01-12", 179.0),
            ("2026-01-18", 178.0),
        ] {
            svc.log_day(date(d), Some(w), Some(2000.0)).unwrap();
        }

        let d = svc.dashboard(date("2026-01-18")).unwrap();
        assert_eq!(d.weeks_logged, 2);
        assert_eq!(d.weeks_of_data, 2);
        assert!((d.adaptive_tdee.unwrap() - 2500.0).abs() < 1e-6);
        assert!(d.formula_tdee.is_none());
        assert_eq!(d.tdee_source, Some(TdeeSource::Adaptive));
        assert!((d.recommended_intake.unwrap() - 2000.0).abs() < 1e-6);
        assert!((d.current_weight.unwrap() - 179.0).abs() < 1e-9);
        // 9 lb at 500 kcal/day = 63 days
        let p = d.projection.unwrap();
        assert!((p.days_to_goal - 63.0).abs() < 1e-6);
        assert_eq!(p.date, date("2026-03-22"));
        assert!((d.progress.unwrap().percent - 10.0).abs() < 1e-6);
        // Only the 18th itself; the 17th was never logged.
        assert_eq!(d.logging_streak, 1);
    }

    #[test]
    fn test_dashboard_formula_only() {
        let svc = TrackerService::with_store(MemoryStore::new());
        svc.save_settings(&UserSettings {
            units: Units::Kg,
            start_weight: 80.0,
            goal_weight: 75.0,
            sex: Some(Sex::Male),
            height: Some(180.0),
            age: Some(30),
            activity_multiplier: Some(1.5),
            ..sample_settings()
        })
        .unwrap();
        svc.log_day(date("2026-01-05"), Some(80.0), Some(2100.0))
            .unwrap();

        let d = svc.dashboard(date("2026-01-05")).unwrap();
        assert_eq!(d.effective_tdee, Some(2670.0));
        assert_eq!(d.tdee_source, Some(TdeeSource::Formula));
        assert_eq!(d.recommended_intake, Some(2170.0));
        assert!(d.projection.is_some());
    }

    #[test]
    fn test_log_body_computes_navy_when_profile_allows() {
        let svc = TrackerService::with_store(MemoryStore::new());
        svc.save_settings(&UserSettings {
            sex: Some(Sex::Male),
            height: Some(177.0),
            ..sample_settings()
        })
        .unwrap();

        let (saved, source) = svc
            .log_body(&body(Some(37.0), Some(85.0), None, Some(30.0)))
            .unwrap();
        let bf = saved.bf_percent.unwrap();
        assert!(bf > 15.0 && bf < 25.0);
        assert_eq!(source, Some(BodyFatSource::Navy));
        assert_eq!(svc.body_logs().unwrap(), vec![saved]);
    }

    #[test]
    fn test_log_body_source_is_navy_when_manual_matches() {
        let svc = TrackerService::with_store(MemoryStore::new());
        svc.save_settings(&UserSettings {
            sex: Some(Sex::Male),
            height: Some(177.0),
            ..sample_settings()
        })
        .unwrap();

        let computed = navy_body_fat(37.0, 85.0, 177.0, Sex::Male, None).unwrap();
        let rounded = (computed * 10.0).round() / 10.0;
        let (saved, source) = svc
            .log_body(&body(Some(37.0), Some(85.0), None, Some(rounded)))
            .unwrap();
        assert_eq!(saved.bf_percent, Some(rounded));
        assert_eq!(source, Some(BodyFatSource::Navy));
    }

    #[test]
    fn test_log_body_falls_back_to_manual() {
        let svc = TrackerService::with_store(MemoryStore::new());
        svc.save_settings(&UserSettings {
            sex: Some(Sex::Female),
            height: Some(165.0),
            ..sample_settings()
        })
        .unwrap();

        // Female formula needs hips
        let (saved, source) = svc
            .log_body(&body(Some(33.0), Some(72.0), None, Some(27.0)))
            .unwrap();
        assert_eq!(saved.bf_percent, Some(27.0));
        assert_eq!(source, Some(BodyFatSource::Manual));

        // No profile at all
        let svc = service();
        let (saved, source) = svc
            .log_body(&body(Some(33.0), Some(72.0), Some(96.0), None))
            .unwrap();
        assert!(saved.bf_percent.is_none());
        assert!(source.is_none());
    }

    #[test]
    fn test_weight_trend_reads_window() {
        let svc = service();
        for d in 1..=10 {
            svc.log_day(date(&format!("2026-01-{d:02}")), Some(180.0), None)
                .unwrap();
        }
        let trend = svc.weight_trend(date("2026-01-10"), 6).unwrap();
        assert_eq!(trend.len(), 7);
        assert_eq!(trend[6].moving_avg, Some(180.0));
    }

    #[test]
    fn test_weight_trend_rejects_out_of_range_days() {
        let svc = service();
        let err = svc.weight_trend(date("2026-10-18"), 97_000_000).unwrap_err();
        assert!(err.to_string().contains("between 1 and"));
        assert!(svc.weight_trend(date("2026-10-18"), 0).is_err());
        assert_eq!(
            svc.weight_trend(date("2026-10-18"), MAX_TREND_DAYS).unwrap().len(),
            MAX_TREND_DAYS as usize + 1
        );
    }

    #[test]
    fn test_import_csv_and_export() {
        let svc = service();
        let summary = svc
            .import_csv("Date,Weight,Calories\n2026-01-05,180,2000\n", false)
            .unwrap();
        assert_eq!(summary.logs_created, 1);

        let bundle = svc.export_all().unwrap();
        assert_eq!(bundle.logs.len(), 1);
        assert!(bundle.settings.is_some());

        svc.clear_all().unwrap();
        assert!(svc.settings().unwrap().is_none());
        let summary = svc.import_all(&bundle).unwrap();
        assert_eq!(summary.logs_imported, 1);
        assert_eq!(svc.logs(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_import_csv_invalid_row_writes_nothing() {
        let svc = service();
        let csv = "Date,Weight,Calories\n2026-01-05,180,2000\n2026-01-06,179.6,2000\n2026-01-07,-5,2000\n";
        let err = svc.import_csv(csv, false).unwrap_err();
        assert!(format!("{err:#}").contains("2026-01-07"));
        assert!(svc.logs(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_new_in_memory_database() {
        let svc = TrackerService::new_in_memory().unwrap();
        svc.save_settings(&sample_settings()).unwrap();
        svc.log_day(date("2026-01-05"), Some(180.0), Some(2000.0))
            .unwrap();
        assert_eq!(svc.week_summaries().unwrap().len(), 1);
    }
}
