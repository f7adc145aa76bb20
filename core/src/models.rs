use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Energy stored in one pound of body mass (kcal).
pub const KCAL_PER_LB: f64 = 3500.0;
/// Energy stored in one kilogram of body mass (kcal).
pub const KCAL_PER_KG: f64 = 7700.0;
/// Conversion factor used by the formula estimator.
pub const LBS_PER_KG: f64 = 2.205;

/// Allowed TDEE smoothing windows, in weeks.
pub const TDEE_WINDOWS: &[u32] = &[2, 4, 8];

pub const DEFAULT_TDEE_WINDOW: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    Lbs,
    Kg,
}

impl Units {
    #[must_use]
    pub fn kcal_per_unit(self) -> f64 {
        match self {
            Self::Lbs => KCAL_PER_LB,
            Self::Kg => KCAL_PER_KG,
        }
    }

    #[must_use]
    pub fn to_kg(self, weight: f64) -> f64 {
        match self {
            Self::Lbs => weight / LBS_PER_KG,
            Self::Kg => weight,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lbs => "lbs",
            Self::Kg => "kg",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Units {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lbs" | "lb" | "pounds" => Ok(Self::Lbs),
            "kg" | "kgs" | "kilograms" => Ok(Self::Kg),
            _ => bail!("Invalid unit '{s}'. Use 'kg' or 'lbs'"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sex {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "male" | "m" => Ok(Self::Male),
            "female" | "f" => Ok(Self::Female),
            _ => bail!("Invalid sex '{s}'. Use 'male' or 'female'"),
        }
    }
}

// --- Logged data ---

/// One calendar day of logging. Complete only when both values are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayLog {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,
}

impl DayLog {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.weight.is_some() && self.calories.is_some()
    }
}

/// Body measurements for one day. Circumferences are always in cm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyLog {
    pub date: NaiveDate,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neck: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hips: Option<f64>,
    #[serde(
        default,
        alias = "bfPercent",
        skip_serializing_if = "Option::is_none"
    )]
    pub bf_percent: Option<f64>,
}

fn default_tdee_window() -> u32 {
    DEFAULT_TDEE_WINDOW
}

/// User profile. Weights are in `units`; height is always cm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(alias = "startDate")]
    pub start_date: NaiveDate,
    #[serde(alias = "startWeight")]
    pub start_weight: f64,
    #[serde(alias = "goalWeight")]
    pub goal_weight: f64,
    pub units: Units,
    #[serde(alias = "tdeeWindow", default = "default_tdee_window")]
    pub tdee_window: u32,
    /// kcal/day relative to TDEE; negative is a deficit.
    #[serde(alias = "targetDeficit")]
    pub target_deficit: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sex: Option<Sex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(
        default,
        alias = "activityMultiplier",
        skip_serializing_if = "Option::is_none"
    )]
    pub activity_multiplier: Option<f64>,
}

// --- Derived types ---

#[derive(Debug, Clone, Serialize)]
pub struct WeekSummary {
    /// Monday of the ISO week.
    pub week_start: NaiveDate,
    pub days: Vec<DayLog>,
    /// Days with both weight and calories.
    pub logged_days: usize,
    pub avg_weight: f64,
    pub avg_calories: f64,
    pub start_weight: f64,
    pub end_weight: f64,
    pub weight_delta: f64,
    pub raw_tdee: Option<f64>,
    pub smoothed_tdee: Option<f64>,
    pub recommended_intake: Option<f64>,
}

/// Where a saved body-fat value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyFatSource {
    Navy,
    Manual,
}

/// Where the effective TDEE came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TdeeSource {
    Formula,
    Blended,
    Adaptive,
}

impl TdeeSource {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Formula => "Formula estimate",
            Self::Blended => "Calibrating",
            Self::Adaptive => "From your data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProjection {
    pub days_to_goal: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalDirection {
    Lose,
    Gain,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoalProgress {
    pub direction: GoalDirection,
    /// Total change needed from start to goal (absolute).
    pub total: f64,
    /// Change achieved toward the goal; negative when moving away from it.
    pub achieved: f64,
    /// Clamped to 0..=100.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub weight: Option<f64>,
    pub moving_avg: Option<f64>,
}

/// Everything the dashboard shows, recomputed on every read.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub date: NaiveDate,
    pub units: Units,
    pub weeks_logged: usize,
    pub weeks_of_data: usize,
    pub adaptive_tdee: Option<f64>,
    pub formula_tdee: Option<f64>,
    pub effective_tdee: Option<f64>,
    pub tdee_source: Option<TdeeSource>,
    pub target_deficit: f64,
    pub recommended_intake: Option<f64>,
    pub current_weight: Option<f64>,
    pub goal_weight: f64,
    pub projection: Option<GoalProjection>,
    pub progress: Option<GoalProgress>,
    pub logging_streak: i64,
}

// --- Export / Import types ---

pub const EXPORT_VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportData {
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub exported_at: String,
    #[serde(default)]
    pub settings: Option<UserSettings>,
    #[serde(default)]
    pub logs: Vec<DayLog>,
    #[serde(default, alias = "bodyLogs")]
    pub body_logs: Vec<BodyLog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportSummary {
    pub settings_imported: bool,
    pub logs_imported: i64,
    pub body_logs_imported: i64,
}

// --- Validation ---

fn require_positive(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{name} must be a positive number (got {value})");
    }
    Ok(())
}

pub fn validate_tdee_window(window: u32) -> Result<()> {
    if !TDEE_WINDOWS.contains(&window) {
        bail!("TDEE window must be 2, 4, or 8 weeks (got {window})");
    }
    Ok(())
}

/// Validate settings at the storage/API boundary. The engine never validates.
pub fn validate_settings(settings: &UserSettings) -> Result<()> {
    require_positive("start_weight", settings.start_weight)?;
    require_positive("goal_weight", settings.goal_weight)?;
    if !settings.target_deficit.is_finite() {
        bail!("target_deficit must be a finite number");
    }
    validate_tdee_window(settings.tdee_window)?;
    if let Some(h) = settings.height {
        require_positive("height", h)?;
    }
    if settings.age == Some(0) {
        bail!("age must be greater than 0");
    }
    if let Some(m) = settings.activity_multiplier {
        require_positive("activity_multiplier", m)?;
    }
    Ok(())
}

pub fn validate_day_log(log: &DayLog) -> Result<()> {
    if let Some(w) = log.weight {
        require_positive("weight", w)?;
    }
    if let Some(c) = log.calories {
        if !c.is_finite() || c < 0.0 {
            bail!("calories must not be negative (got {c})");
        }
    }
    Ok(())
}

/// Body-fat percentages are valid within [0, 100].
#[must_use]
pub fn is_valid_bf_percent(bf: f64) -> bool {
    bf.is_finite() && (0.0..=100.0).contains(&bf)
}

pub fn validate_body_log(log: &BodyLog) -> Result<()> {
    require_positive("weight", log.weight)?;
    for (name, value) in [("neck", log.neck), ("waist", log.waist), ("hips", log.hips)] {
        if let Some(v) = value {
            require_positive(name, v)?;
        }
    }
    if let Some(bf) = log.bf_percent {
        if !is_valid_bf_percent(bf) {
            bail!("bf_percent must be between 0 and 100 (got {bf})");
        }
    }
    Ok(())
}
