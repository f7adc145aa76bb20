use std::cell::RefCell;
use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use tracing::info;

use crate::models::{
    BodyLog, DayLog, EXPORT_VERSION, ExportData, ImportSummary, UserSettings, validate_body_log,
    validate_day_log, validate_settings,
};

/// Persistence for settings and logs.
///
/// Log listings are ascending by date. Writes are upserts keyed by date.
pub trait DataStore {
    fn get_settings(&self) -> Result<Option<UserSettings>>;
    fn save_settings(&self, settings: &UserSettings) -> Result<()>;

    /// Day logs within the inclusive range; open ends are unbounded.
    fn get_logs(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Vec<DayLog>>;
    fn get_log(&self, date: NaiveDate) -> Result<Option<DayLog>>;
    fn save_log(&self, log: &DayLog) -> Result<()>;

    /// Upsert a batch of day logs; stores that can should apply it atomically.
    fn save_logs(&self, logs: &[DayLog]) -> Result<()> {
        for log in logs {
            self.save_log(log)?;
        }
        Ok(())
    }
    fn delete_log(&self, date: NaiveDate) -> Result<bool>;

    fn get_body_logs(&self) -> Result<Vec<BodyLog>>;
    fn save_body_log(&self, log: &BodyLog) -> Result<()>;
    fn delete_body_log(&self, date: NaiveDate) -> Result<bool>;

    fn clear_all(&self) -> Result<()>;

    fn export_all(&self) -> Result<ExportData> {
        Ok(ExportData {
            version: EXPORT_VERSION,
            exported_at: Local::now().to_rfc3339(),
            settings: self.get_settings()?,
            logs: self.get_logs(None, None)?,
            body_logs: self.get_body_logs()?,
        })
    }

    fn import_all(&self, data: &ExportData) -> Result<ImportSummary> {
        import_bundle(self, data)
    }
}

/// Check every record in a bundle without writing anything.
pub fn validate_bundle(data: &ExportData) -> Result<()> {
    if data.version > EXPORT_VERSION {
        bail!(
            "Unsupported export version {} (this build reads up to {EXPORT_VERSION})",
            data.version
        );
    }
    if let Some(settings) = &data.settings {
        validate_settings(settings).context("Invalid settings in import")?;
    }
    for log in &data.logs {
        validate_day_log(log).with_context(|| format!("Invalid day log for {}", log.date))?;
    }
    for log in &data.body_logs {
        validate_body_log(log).with_context(|| format!("Invalid body log for {}", log.date))?;
    }
    Ok(())
}

/// Validate a bundle, then upsert everything it contains.
///
/// Nothing is written if any record fails validation.
pub fn import_bundle<S: DataStore + ?Sized>(store: &S, data: &ExportData) -> Result<ImportSummary> {
    validate_bundle(data)?;

    if let Some(settings) = &data.settings {
        store.save_settings(settings)?;
    }
    for log in &data.logs {
        store.save_log(log)?;
    }
    for log in &data.body_logs {
        store.save_body_log(log)?;
    }

    #[allow(clippy::cast_possible_wrap)]
    let summary = ImportSummary {
        settings_imported: data.settings.is_some(),
        logs_imported: data.logs.len() as i64,
        body_logs_imported: data.body_logs.len() as i64,
    };
    info!(
        logs = summary.logs_imported,
        body_logs = summary.body_logs_imported,
        settings = summary.settings_imported,
        "imported bundle"
    );
    Ok(summary)
}

/// Non-persistent store, handy for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    settings: RefCell<Option<UserSettings>>,
    logs: RefCell<BTreeMap<NaiveDate, DayLog>>,
    body_logs: RefCell<BTreeMap<NaiveDate, BodyLog>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl DataStore for MemoryStore {
    fn get_settings(&self) -> Result<Option<UserSettings>> {
        Ok(self.settings.borrow().clone())
    }

    fn save_settings(&self, settings: &UserSettings) -> Result<()> {
        *self.settings.borrow_mut() = Some(settings.clone());
        Ok(())
    }

    fn get_logs(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Vec<DayLog>> {
        Ok(self
            .logs
            .borrow()
            .values()
            .filter(|l| from.is_none_or(|f| l.date >= f) && to.is_none_or(|t| l.date <= t))
            .cloned()
            .collect())
    }

    fn get_log(&self, date: NaiveDate) -> Result<Option<DayLog>> {
        Ok(self.logs.borrow().get(&date).cloned())
    }

    fn save_log(&self, log: &DayLog) -> Result<()> {
        self.logs.borrow_mut().insert(log.date, log.clone());
        Ok(())
    }

    fn delete_log(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.logs.borrow_mut().remove(&date).is_some())
    }

    fn get_body_logs(&self) -> Result<Vec<BodyLog>> {
        Ok(self.body_logs.borrow().values().cloned().collect())
    }

    fn save_body_log(&self, log: &BodyLog) -> Result<()> {
        self.body_logs.borrow_mut().insert(log.date, log.clone());
        Ok(())
    }

    fn delete_body_log(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.body_logs.borrow_mut().remove(&date).is_some())
    }

    fn clear_all(&self) -> Result<()> {
        self.settings.borrow_mut().take();
        self.logs.borrow_mut().clear();
        self.body_logs.borrow_mut().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Units;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn sample_settings() -> UserSettings {
        UserSettings {
            start_date: date("2026-01-05"),
            start_weight: 80.0,
            goal_weight: 75.0,
            units: Units::Kg,
            tdee_window: 4,
            target_deficit: -400.0,
            sex: None,
            height: None,
            age: None,
            activity_multiplier: None,
        }
    }

    fn day(d: &str, weight: f64, calories: f64) -> DayLog {
        DayLog {
            date: date(d),
            weight: Some(weight),
            calories: Some(calories),
        }
    }

    #[test]
    fn test_memory_store_logs_sorted_and_filtered() {
        let store = MemoryStore::new();
        store.save_log(&day("2026-01-07", 79.5, 2100.0)).unwrap();
        store.save_log(&day("2026-01-05", 80.0, 2000.0)).unwrap();
        store.save_log(&day("2026-01-06", 79.8, 1900.0)).unwrap();

        let all = store.get_logs(None, None).unwrap();
        let dates: Vec<_> = all.iter().map(|l| l.date).collect();
        assert_eq!(
            dates,
            vec![date("2026-01-05"), date("2026-01-06"), date("2026-01-07")]
        );

        let ranged = store
            .get_logs(Some(date("2026-01-06")), Some(date("2026-01-06")))
            .unwrap();
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].date, date("2026-01-06"));
    }

    #[test]
    fn test_memory_store_upsert_and_delete() {
        let store = MemoryStore::new();
        store.save_log(&day("2026-01-05", 80.0, 2000.0)).unwrap();
        store.save_log(&day("2026-01-05", 79.0, 1800.0)).unwrap();
        let log = store.get_log(date("2026-01-05")).unwrap().unwrap();
        assert_eq!(log.weight, Some(79.0));

        assert!(store.delete_log(date("2026-01-05")).unwrap());
        assert!(!store.delete_log(date("2026-01-05")).unwrap());
    }

    #[test]
    fn test_export_then_import_into_empty_store() {
        let source = MemoryStore::new();
        source.save_settings(&sample_settings()).unwrap();
        source.save_log(&day("2026-01-05", 80.0, 2000.0)).unwrap();
        source
            .save_body_log(&BodyLog {
                date: date("2026-01-05"),
                weight: 80.0,
                neck: Some(37.0),
                waist: Some(85.0),
                hips: None,
                bf_percent: Some(18.0),
            })
            .unwrap();

        let bundle = source.export_all().unwrap();
        assert_eq!(bundle.version, EXPORT_VERSION);

        let target = MemoryStore::new();
        let summary = target.import_all(&bundle).unwrap();
        assert!(summary.settings_imported);
        assert_eq!(summary.logs_imported, 1);
        assert_eq!(summary.body_logs_imported, 1);
        assert_eq!(target.get_settings().unwrap(), Some(sample_settings()));
    }

    #[test]
    fn test_import_rejects_invalid_without_writing() {
        let store = MemoryStore::new();
        let bundle = ExportData {
            version: EXPORT_VERSION,
            exported_at: String::new(),
            settings: Some(sample_settings()),
            logs: vec![
                day("2026-01-05", 80.0, 2000.0),
                DayLog {
                    date: date("2026-01-06"),
                    weight: Some(-80.0),
                    calories: None,
                },
            ],
            body_logs: vec![],
        };
        let err = store.import_all(&bundle).unwrap_err();
        assert!(format!("{err:#}").contains("2026-01-06"));
        assert!(store.get_settings().unwrap().is_none());
        assert!(store.get_logs(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_import_rejects_newer_version() {
        let store = MemoryStore::new();
        let bundle = ExportData {
            version: EXPORT_VERSION + 1,
            exported_at: String::new(),
            settings: None,
            logs: vec![],
            body_logs: vec![],
        };
        assert!(store.import_all(&bundle).is_err());
    }

    #[test]
    fn test_import_camel_case_bundle_without_version() {
        let json = r#"{
            "settings": {
                "startDate": "2026-01-05", "startWeight": 180, "goalWeight": 170,
                "units": "lbs", "tdeeWindow": 4, "targetDeficit": -500
            },
            "logs": [{"date": "2026-01-05", "weight": 180, "calories": 2000}],
            "bodyLogs": [{"date": "2026-01-05", "weight": 180, "bfPercent": 22.5}]
        }"#;
        let bundle: ExportData = serde_json::from_str(json).unwrap();
        let store = MemoryStore::new();
        let summary = store.import_all(&bundle).unwrap();
        assert_eq!(summary.logs_imported, 1);
        let body = store.get_body_logs().unwrap();
        assert_eq!(body[0].bf_percent, Some(22.5));
    }

    #[test]
    fn test_clear_all() {
        let store = MemoryStore::new();
        store.save_settings(&sample_settings()).unwrap();
        store.save_log(&day("2026-01-05", 80.0, 2000.0)).unwrap();
        store.clear_all().unwrap();
        assert!(store.get_settings().unwrap().is_none());
        assert!(store.get_logs(None, None).unwrap().is_empty());
        assert!(store.get_body_logs().unwrap().is_empty());
    }
}
