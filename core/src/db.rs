use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use tracing::{debug, info};

use crate::models::{BodyLog, DayLog, ExportData, ImportSummary, UserSettings};
use crate::store::{DataStore, import_bundle};

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        debug!(path = %path.display(), "opened database");
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS settings (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    start_date TEXT NOT NULL,
                    start_weight REAL NOT NULL,
                    goal_weight REAL NOT NULL,
                    units TEXT NOT NULL,
                    tdee_window INTEGER NOT NULL,
                    target_deficit REAL NOT NULL,
                    sex TEXT,
                    height REAL,
                    age INTEGER,
                    activity_multiplier REAL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS day_logs (
                    date TEXT PRIMARY KEY,
                    weight REAL,
                    calories REAL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS body_logs (
                    date TEXT PRIMARY KEY,
                    weight REAL NOT NULL,
                    neck REAL,
                    waist REAL,
                    hips REAL,
                    bf_percent REAL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
            info!("migrated database to schema version 1");
        }

        Ok(())
    }

    fn parse_column<T>(idx: usize, value: &str) -> rusqlite::Result<T>
    where
        T: FromStr,
        T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        value
            .parse()
            .map_err(|e: T::Err| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
    }

    fn parse_date(idx: usize, value: &str) -> rusqlite::Result<NaiveDate> {
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    }

    fn date_key(date: NaiveDate) -> String {
        date.format("%Y-%m-%d").to_string()
    }

    fn settings_from_row(row: &rusqlite::Row) -> rusqlite::Result<UserSettings> {
        let start_date: String = row.get(0)?;
        let units: String = row.get(3)?;
        let sex: Option<String> = row.get(6)?;
        Ok(UserSettings {
            start_date: Self::parse_date(0, &start_date)?,
            start_weight: row.get(1)?,
            goal_weight: row.get(2)?,
            units: Self::parse_column(3, &units)?,
            tdee_window: row.get(4)?,
            target_deficit: row.get(5)?,
            sex: sex.map(|s| Self::parse_column(6, &s)).transpose()?,
            height: row.get(7)?,
            age: row.get(8)?,
            activity_multiplier: row.get(9)?,
        })
    }

    fn day_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<DayLog> {
        let date: String = row.get(0)?;
        Ok(DayLog {
            date: Self::parse_date(0, &date)?,
            weight: row.get(1)?,
            calories: row.get(2)?,
        })
    }

    fn body_log_from_row(row: &rusqlite::Row) -> rusqlite::Result<BodyLog> {
        let date: String = row.get(0)?;
        Ok(BodyLog {
            date: Self::parse_date(0, &date)?,
            weight: row.get(1)?,
            neck: row.get(2)?,
            waist: row.get(3)?,
            hips: row.get(4)?,
            bf_percent: row.get(5)?,
        })
    }
}

impl DataStore for Database {
    // --- Settings ---

    fn get_settings(&self) -> Result<Option<UserSettings>> {
        let mut stmt = self.conn.prepare(
            "SELECT start_date, start_weight, goal_weight, units, tdee_window, target_deficit,
                    sex, height, age, activity_multiplier
             FROM settings WHERE id = 1",
        )?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            let settings = Self::settings_from_row(row).context("Stored settings are malformed")?;
            Ok(Some(settings))
        } else {
            Ok(None)
        }
    }

    fn save_settings(&self, settings: &UserSettings) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO settings (id, start_date, start_weight, goal_weight, units, tdee_window,
                                   target_deficit, sex, height, age, activity_multiplier, updated_at)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(id) DO UPDATE SET
                start_date = excluded.start_date,
                start_weight = excluded.start_weight,
                goal_weight = excluded.goal_weight,
                units = excluded.units,
                tdee_window = excluded.tdee_window,
                target_deficit = excluded.target_deficit,
                sex = excluded.sex,
                height = excluded.height,
                age = excluded.age,
                activity_multiplier = excluded.activity_multiplier,
                updated_at = excluded.updated_at",
            params![
                Self::date_key(settings.start_date),
                settings.start_weight,
                settings.goal_weight,
                settings.units.as_str(),
                settings.tdee_window,
                settings.target_deficit,
                settings.sex.map(|s| s.as_str()),
                settings.height,
                settings.age,
                settings.activity_multiplier,
                now,
            ],
        )?;
        info!("saved settings");
        Ok(())
    }

    // --- Day Logs ---

    fn get_logs(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<Vec<DayLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, weight, calories FROM day_logs
             WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2)
             ORDER BY date ASC",
        )?;
        let logs = stmt
            .query_map(
                params![from.map(Self::date_key), to.map(Self::date_key)],
                Self::day_log_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Stored day logs are malformed")?;
        Ok(logs)
    }

    fn get_log(&self, date: NaiveDate) -> Result<Option<DayLog>> {
        let mut stmt = self
            .conn
            .prepare("SELECT date, weight, calories FROM day_logs WHERE date = ?1")?;
        let mut rows = stmt.query(params![Self::date_key(date)])?;
        if let Some(row) = rows.next()? {
            Ok(Some(Self::day_log_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    fn save_log(&self, log: &DayLog) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO day_logs (date, weight, calories, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(date) DO UPDATE SET
                weight = excluded.weight,
                calories = excluded.calories,
                updated_at = excluded.updated_at",
            params![Self::date_key(log.date), log.weight, log.calories, now],
        )?;
        debug!(date = %log.date, "saved day log");
        Ok(())
    }

    fn delete_log(&self, date: NaiveDate) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM day_logs WHERE date = ?1",
            params![Self::date_key(date)],
        )?;
        Ok(rows > 0)
    }

    // --- Body Logs ---

    fn get_body_logs(&self) -> Result<Vec<BodyLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT date, weight, neck, waist, hips, bf_percent FROM body_logs ORDER BY date ASC",
        )?;
        let logs = stmt
            .query_map([], Self::body_log_from_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Stored body logs are malformed")?;
        Ok(logs)
    }

    fn save_body_log(&self, log: &BodyLog) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO body_logs (date, weight, neck, waist, hips, bf_percent, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(date) DO UPDATE SET
                weight = excluded.weight,
                neck = excluded.neck,
                waist = excluded.waist,
                hips = excluded.hips,
                bf_percent = excluded.bf_percent,
                updated_at = excluded.updated_at",
            params![
                Self::date_key(log.date),
                log.weight,
                log.neck,
                log.waist,
                log.hips,
                log.bf_percent,
                now
            ],
        )?;
        debug!(date = %log.date, "saved body log");
        Ok(())
    }

    fn delete_body_log(&self, date: NaiveDate) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM body_logs WHERE date = ?1",
            params![Self::date_key(date)],
        )?;
        Ok(rows > 0)
    }

    // --- Bulk ---

    fn save_logs(&self, logs: &[DayLog]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        for log in logs {
            self.save_log(log)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn import_all(&self, data: &ExportData) -> Result<ImportSummary> {
        let tx = self.conn.unchecked_transaction()?;
        let summary = import_bundle(self, data)?;
        tx.commit()?;
        Ok(summary)
    }

    fn clear_all(&self) -> Result<()> {
        self.conn.execute_batch(
            "BEGIN;
             DELETE FROM settings;
             DELETE FROM day_logs;
             DELETE FROM body_logs;
             COMMIT;",
        )?;
        info!("cleared all data");
        Ok(())
    }
}
