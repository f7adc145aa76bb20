//! Adaptive TDEE estimation from daily weight and calorie logs.
//!
//! Logs are grouped into ISO weeks. Each week with at least two complete days
//! yields a raw energy-balance estimate; raw estimates are smoothed with a
//! trailing moving average and blended with a Mifflin-St Jeor estimate until
//! enough weeks have been logged to trust the data on its own.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate};
use tracing::debug;

use crate::models::{DayLog, Sex, TdeeSource, Units, UserSettings, WeekSummary};

/// Complete days a week needs before it produces an estimate.
pub const MIN_COMPLETE_DAYS: usize = 2;

/// Below this many weeks of data the formula estimate is used as-is.
pub const BLEND_START_WEEKS: usize = 2;

/// From this many weeks of data on the adaptive estimate is used as-is.
pub const BLEND_FULL_WEEKS: usize = 8;

/// Monday of the ISO week containing `date`.
#[must_use]
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Single-week TDEE from average intake and weight change over the week.
///
/// `weight_delta` is positive for a gain. A loss of one unit over seven days
/// means intake fell short of expenditure by `kcal_per_unit / 7` per day.
#[must_use]
pub fn raw_tdee(avg_calories: f64, weight_delta: f64, units: Units) -> f64 {
    avg_calories + (-weight_delta / 7.0) * units.kcal_per_unit()
}

/// Mean of the trailing `window` values, or of all values when fewer exist.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn smoothed_tdee(values: &[f64], window: usize) -> Option<f64> {
    if values.is_empty() || window == 0 {
        return None;
    }
    let recent = &values[values.len().saturating_sub(window)..];
    Some(recent.iter().sum::<f64>() / recent.len() as f64)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0_usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Group logs into weekly summaries, ascending by week start.
///
/// Every week containing at least one log is returned. Weeks with fewer than
/// [`MIN_COMPLETE_DAYS`] complete days carry no estimate and do not take part
/// in smoothing.
#[must_use]
pub fn build_week_summaries(logs: &[DayLog], settings: &UserSettings) -> Vec<WeekSummary> {
    let mut by_week: BTreeMap<NaiveDate, Vec<DayLog>> = BTreeMap::new();
    for log in logs {
        by_week
            .entry(week_start(log.date))
            .or_default()
            .push(log.clone());
    }

    let window = settings.tdee_window as usize;
    let mut raw_values: Vec<f64> = Vec::new();

    let summaries: Vec<WeekSummary> = by_week
        .into_iter()
        .map(|(week_start, mut days)| {
            days.sort_by_key(|d| d.date);

            let weights: Vec<f64> = days.iter().filter_map(|d| d.weight).collect();
            let avg_weight = mean(weights.iter().copied());
            let avg_calories = mean(days.iter().filter_map(|d| d.calories));
            let start_weight = weights.first().copied().unwrap_or(0.0);
            let end_weight = weights.last().copied().unwrap_or(0.0);
            let weight_delta = end_weight - start_weight;
            let logged_days = days.iter().filter(|d| d.is_complete()).count();

            let raw = (logged_days >= MIN_COMPLETE_DAYS)
                .then(|| raw_tdee(avg_calories, weight_delta, settings.units));
            let smoothed = raw.and_then(|r| {
                raw_values.push(r);
                smoothed_tdee(&raw_values, window)
            });
            let recommended = smoothed.map(|s| recommended_intake(s, settings.target_deficit));

            WeekSummary {
                week_start,
                days,
                logged_days,
                avg_weight,
                avg_calories,
                start_weight,
                end_weight,
                weight_delta,
                raw_tdee: raw,
                smoothed_tdee: smoothed,
                recommended_intake: recommended,
            }
        })
        .collect();

    debug!(
        logs = logs.len(),
        weeks = summaries.len(),
        estimates = raw_values.len(),
        "built week summaries"
    );
    summaries
}

/// Number of weeks that produced a raw estimate.
#[must_use]
pub fn weeks_of_data(summaries: &[WeekSummary]) -> usize {
    summaries.iter().filter(|w| w.raw_tdee.is_some()).count()
}

/// Latest smoothed estimate, if any week produced one.
#[must_use]
pub fn adaptive_tdee(summaries: &[WeekSummary]) -> Option<f64> {
    summaries.iter().rev().find_map(|w| w.smoothed_tdee)
}

/// Mifflin-St Jeor BMR times the activity multiplier, rounded to whole kcal.
///
/// Returns `None` unless sex, height, age and activity multiplier are all set.
#[must_use]
pub fn formula_tdee(settings: &UserSettings) -> Option<f64> {
    let sex = settings.sex?;
    let height = settings.height.filter(|h| *h > 0.0)?;
    let age = settings.age.filter(|a| *a > 0)?;
    let activity = settings.activity_multiplier.filter(|m| *m > 0.0)?;

    let weight_kg = settings.units.to_kg(settings.start_weight);
    let base = 10.0 * weight_kg + 6.25 * height - 5.0 * f64::from(age);
    let bmr = match sex {
        Sex::Male => base + 5.0,
        Sex::Female => base - 161.0,
    };
    Some((bmr * activity).round())
}

/// Share of the adaptive estimate in the blend: 0 before two weeks, 1 from eight.
#[allow(clippy::cast_precision_loss)]
fn adaptive_weight(weeks_of_data: usize) -> f64 {
    if weeks_of_data < BLEND_START_WEEKS {
        0.0
    } else if weeks_of_data >= BLEND_FULL_WEEKS {
        1.0
    } else {
        (weeks_of_data - BLEND_START_WEEKS) as f64
            / (BLEND_FULL_WEEKS - BLEND_START_WEEKS) as f64
    }
}

/// Blend the adaptive and formula estimates by how much data exists.
#[must_use]
pub fn effective_tdee(
    adaptive: Option<f64>,
    formula: Option<f64>,
    weeks_of_data: usize,
) -> Option<f64> {
    match (adaptive, formula) {
        (None, None) => None,
        (None, Some(f)) => Some(f),
        (Some(a), None) => Some(a),
        (Some(_), Some(f)) if weeks_of_data < BLEND_START_WEEKS => Some(f),
        (Some(a), Some(_)) if weeks_of_data >= BLEND_FULL_WEEKS => Some(a),
        (Some(a), Some(f)) => {
            let t = adaptive_weight(weeks_of_data);
            Some((f * (1.0 - t) + a * t).round())
        }
    }
}

/// Which estimate [`effective_tdee`] relied on for the same inputs.
#[must_use]
pub fn tdee_source(
    adaptive: Option<f64>,
    formula: Option<f64>,
    weeks_of_data: usize,
) -> Option<TdeeSource> {
    match (adaptive, formula) {
        (None, None) => None,
        (None, Some(_)) => Some(TdeeSource::Formula),
        (Some(_), None) => Some(TdeeSource::Adaptive),
        (Some(_), Some(_)) if weeks_of_data < BLEND_START_WEEKS => Some(TdeeSource::Formula),
        (Some(_), Some(_)) if weeks_of_data >= BLEND_FULL_WEEKS => Some(TdeeSource::Adaptive),
        (Some(_), Some(_)) => Some(TdeeSource::Blended),
    }
}

/// Daily intake target; a negative `target_deficit` lowers it.
#[must_use]
pub fn recommended_intake(tdee: f64, target_deficit: f64) -> f64 {
    tdee + target_deficit
}
