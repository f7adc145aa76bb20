//! Goal-date projection and progress analytics built on top of the estimates.

use std::collections::{BTreeMap, HashSet};

use chrono::{Days, Duration, NaiveDate};

use crate::models::{DayLog, GoalDirection, GoalProgress, GoalProjection, TrendPoint, Units};

/// Logged weights averaged for the current weight.
pub const CURRENT_WEIGHT_SAMPLES: usize = 7;

/// Trailing days in the trend moving average.
pub const TREND_WINDOW: usize = 7;

/// Weights needed inside the trend window before an average is shown.
pub const TREND_MIN_POINTS: usize = 3;

/// Longest trend the service and API will build.
pub const MAX_TREND_DAYS: u32 = 366;

/// Project when `current` reaches `goal` at the given daily intake.
///
/// Returns `None` when the projection is meaningless: a zero or non-finite
/// daily deficit, or an energy balance pointing away from the goal.
#[must_use]
pub fn project_goal(
    current: f64,
    goal: f64,
    tdee: f64,
    intake: f64,
    units: Units,
    today: NaiveDate,
) -> Option<GoalProjection> {
    let to_lose = current - goal;
    if !to_lose.is_finite() {
        return None;
    }
    if to_lose == 0.0 {
        return Some(GoalProjection {
            days_to_goal: 0.0,
            date: today,
        });
    }

    let daily_deficit = tdee - intake;
    if !daily_deficit.is_finite() || daily_deficit == 0.0 {
        return None;
    }
    if to_lose.signum() != daily_deficit.signum() {
        return None;
    }

    let days = to_lose * units.kcal_per_unit() / daily_deficit;
    if !days.is_finite() {
        return None;
    }

    #[allow(clippy::cast_possible_truncation)]
    let whole_days = Duration::try_days(days.ceil() as i64)?;
    let date = today.checked_add_signed(whole_days)?;
    Some(GoalProjection {
        days_to_goal: days,
        date,
    })
}

/// Mean of the most recent logged weights, by date.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn current_weight(logs: &[DayLog]) -> Option<f64> {
    let mut weighed: Vec<(NaiveDate, f64)> = logs
        .iter()
        .filter_map(|l| l.weight.map(|w| (l.date, w)))
        .collect();
    if weighed.is_empty() {
        return None;
    }
    weighed.sort_by_key(|(d, _)| *d);
    let recent = &weighed[weighed.len().saturating_sub(CURRENT_WEIGHT_SAMPLES)..];
    Some(recent.iter().map(|(_, w)| w).sum::<f64>() / recent.len() as f64)
}

/// How far `current` has moved from `start` toward `goal`.
#[must_use]
pub fn goal_progress(start: f64, current: f64, goal: f64) -> GoalProgress {
    let direction = if goal > start {
        GoalDirection::Gain
    } else {
        GoalDirection::Lose
    };
    let total = (start - goal).abs();
    let achieved = match direction {
        GoalDirection::Lose => start - current,
        GoalDirection::Gain => current - start,
    };
    let percent = if total > 0.0 {
        (achieved / total * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    GoalProgress {
        direction,
        total,
        achieved,
        percent,
    }
}

/// One point per day for `days + 1` days ending at `end`, with a trailing
/// seven-day moving average of the logged weights.
///
/// The series stops at the earliest representable date.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn weight_trend(logs: &[DayLog], end: NaiveDate, days: u32) -> Vec<TrendPoint> {
    let by_date: BTreeMap<NaiveDate, Option<f64>> =
        logs.iter().map(|l| (l.date, l.weight)).collect();

    let reachable = u64::try_from((end - NaiveDate::MIN).num_days()).unwrap_or(0);
    let span = u64::from(days).min(reachable);
    let mut points: Vec<TrendPoint> = (0..=span)
        .rev()
        .filter_map(|offset| end.checked_sub_days(Days::new(offset)))
        .map(|date| TrendPoint {
            date,
            weight: by_date.get(&date).copied().flatten(),
            moving_avg: None,
        })
        .collect();

    for i in (TREND_WINDOW - 1)..points.len() {
        let window: Vec<f64> = points[i + 1 - TREND_WINDOW..=i]
            .iter()
            .filter_map(|p| p.weight)
            .collect();
        if window.len() >= TREND_MIN_POINTS {
            let avg = window.iter().sum::<f64>() / window.len() as f64;
            points[i].moving_avg = Some((avg * 10.0).round() / 10.0);
        }
    }
    points
}

/// Consecutive complete days ending at `today`; zero if today is incomplete.
#[must_use]
pub fn logging_streak(logs: &[DayLog], today: NaiveDate) -> i64 {
    let complete: HashSet<NaiveDate> = logs
        .iter()
        .filter(|l| l.is_complete())
        .map(|l| l.date)
        .collect();

    let mut streak = 0;
    let mut day = today;
    while complete.contains(&day) {
        streak += 1;
        match day.pred_opt() {
            Some(prev) => day = prev,
            None => break,
        }
    }
    streak
}
