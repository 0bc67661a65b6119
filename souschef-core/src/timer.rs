//! Countdown timers and the periodic tick that expires them.
//!
//! Remaining time is always derived from a timer's absolute end time and the
//! current clock reading, so missed or late ticks never accumulate drift.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ValidationError;

/// How long an expired timer stays visible before it is retired.
pub const DEFAULT_GRACE_MS: i64 = 1_000;

/// Latest accepted `endTime`: the last millisecond of year 9999.
pub const MAX_END_TIME_MS: i64 = 253_402_300_799_999;

/// A countdown owned by a cooking session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: Uuid,
    pub duration_seconds: u32,
    /// Epoch milliseconds at which the timer runs out
    #[serde(rename = "endTime", alias = "endTimeEpochMs")]
    pub end_time_ms: i64,
    pub label: String,
}

impl Timer {
    pub fn remaining_ms(&self, now_ms: i64) -> i64 {
        self.end_time_ms.saturating_sub(now_ms)
    }

    /// Reject timers restored from outside that no clock could produce.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_seconds == 0 {
            return Err(ValidationError::NonPositiveDuration);
        }
        if !(0..=MAX_END_TIME_MS).contains(&self.end_time_ms) {
            return Err(ValidationError::InvalidEndTime);
        }
        Ok(())
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.remaining_ms(now_ms) <= 0
    }
}

/// Create a timer ending `duration_seconds` after `now_ms`.
///
/// Without a label (or with a blank one) the label reads `Timer (N min)`, N
/// being the duration rounded to the nearest minute.
pub fn create_timer(
    duration_seconds: i64,
    label: Option<&str>,
    now_ms: i64,
) -> Result<Timer, ValidationError> {
    if duration_seconds <= 0 {
        return Err(ValidationError::NonPositiveDuration);
    }
    let duration = u32::try_from(duration_seconds)
        .map_err(|_| ValidationError::Malformed("durationSeconds is too large".to_string()))?;

    let label = match label.map(str::trim) {
        Some(l) if !l.is_empty() => l.to_string(),
        _ => default_label(duration),
    };

    Ok(Timer {
        id: Uuid::new_v4(),
        duration_seconds: duration,
        end_time_ms: now_ms.saturating_add(i64::from(duration) * 1000),
        label,
    })
}

/// Seconds rounded to the nearest minute, halves rounding up.
pub fn rounded_minutes(duration_seconds: u32) -> u32 {
    duration_seconds / 60 + u32::from(duration_seconds % 60 >= 30)
}

fn default_label(duration_seconds: u32) -> String {
    format!("Timer ({} min)", rounded_minutes(duration_seconds))
}

/// Display projection of a timer at a given instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    #[serde(flatten)]
    pub timer: Timer,
    /// Never negative
    pub remaining_ms: i64,
    pub remaining_seconds: i64,
    /// `MM:SS`, `00:00` once expired
    pub remaining_label: String,
    /// Fraction elapsed, in `[0, 1]`
    pub progress: f64,
    pub is_expired: bool,
}

impl TimerView {
    pub fn at(timer: &Timer, now_ms: i64) -> Self {
        let remaining = timer.remaining_ms(now_ms);
        let total = i64::from(timer.duration_seconds) * 1000;
        let progress = if total > 0 {
            (1.0 - remaining as f64 / total as f64).clamp(0.0, 1.0)
        } else {
            1.0
        };

        Self {
            timer: timer.clone(),
            remaining_ms: remaining.max(0),
            remaining_seconds: ceil_seconds(remaining.max(0)),
            remaining_label: format_remaining(remaining),
            progress,
            is_expired: remaining <= 0,
        }
    }
}

fn ceil_seconds(ms: i64) -> i64 {
    ms / 1000 + i64::from(ms % 1000 > 0)
}

/// Format remaining milliseconds as `MM:SS`, rounding partial seconds up.
pub fn format_remaining(remaining_ms: i64) -> String {
    if remaining_ms <= 0 {
        return "00:00".to_string();
    }
    let total_seconds = ceil_seconds(remaining_ms);
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default)]
pub struct Tick {
    /// Every timer passed in, projected for display
    pub views: Vec<TimerView>,
    /// Timers that expired since the previous tick; each id appears once ever
    pub expired: Vec<Timer>,
    /// Expired timers past the grace window, to be dropped from the session
    pub retired: Vec<Uuid>,
}

/// Tracks which timers have already fired so expiry is reported once.
#[derive(Debug)]
pub struct TimerEngine {
    grace_ms: i64,
    notified: HashSet<Uuid>,
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_MS)
    }
}

impl TimerEngine {
    pub fn new(grace_ms: i64) -> Self {
        Self {
            grace_ms: grace_ms.max(0),
            notified: HashSet::new(),
        }
    }

    pub fn tick(&mut self, now_ms: i64, timers: &[Timer]) -> Tick {
        let views = timers.iter().map(|t| TimerView::at(t, now_ms)).collect();

        let mut expired = Vec::new();
        for timer in timers.iter().filter(|t| t.is_expired_at(now_ms)) {
            if self.notified.insert(timer.id) {
                expired.push(timer.clone());
            }
        }

        let retired = timers
            .iter()
            .filter(|t| now_ms.saturating_sub(t.end_time_ms) >= self.grace_ms)
            .map(|t| t.id)
            .collect();

        // Forget timers that have left the session
        self.notified
            .retain(|id| timers.iter().any(|timer| timer.id == *id));

        Tick {
            views,
            expired,
            retired,
        }
    }

    /// Drop all expiry memory, e.g. when a new recipe replaces the session.
    pub fn reset(&mut self) {
        self.notified.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_create_timer_rejects_non_positive() {
        assert_eq!(
            create_timer(0, None, NOW),
            Err(ValidationError::NonPositiveDuration)
        );
        assert_eq!(
            create_timer(-5, None, NOW),
            Err(ValidationError::NonPositiveDuration)
        );
    }

    #[test]
    fn test_create_timer_end_time_and_label() {
        for d in [1, 29, 30, 90, 300, 3600] {
            let timer = create_timer(d, None, NOW).unwrap();
            assert_eq!(timer.end_time_ms - NOW, d * 1000);
            assert_eq!(i64::from(timer.duration_seconds), d);
        }
        assert_eq!(create_timer(29, None, NOW).unwrap().label, "Timer (0 min)");
        assert_eq!(create_timer(30, None, NOW).unwrap().label, "Timer (1 min)");
        assert_eq!(create_timer(300, None, NOW).unwrap().label, "Timer (5 min)");
        assert_eq!(create_timer(60, Some("Pasta"), NOW).unwrap().label, "Pasta");
        assert_eq!(create_timer(60, Some("  "), NOW).unwrap().label, "Timer (1 min)");
    }

    #[test]
    fn test_timer_ids_are_unique() {
        let a = create_timer(60, None, NOW).unwrap();
        let b = create_timer(60, None, NOW).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(0), "00:00");
        assert_eq!(format_remaining(-10), "00:00");
        assert_eq!(format_remaining(1), "00:01");
        assert_eq!(format_remaining(61_000), "01:01");
        assert_eq!(format_remaining(300_000), "05:00");
    }

    #[test]
    fn test_view_progress_and_remaining() {
        let timer = create_timer(100, None, NOW).unwrap();
        let view = TimerView::at(&timer, NOW + 25_000);
        assert_eq!(view.remaining_ms, 75_000);
        assert_eq!(view.remaining_seconds, 75);
        assert!((view.progress - 0.25).abs() < 1e-9);
        assert!(!view.is_expired);

        let late = TimerView::at(&timer, NOW + 500_000);
        assert_eq!(late.remaining_ms, 0);
        assert_eq!(late.progress, 1.0);
        assert!(late.is_expired);
    }

    #[test]
    fn test_expiry_reported_exactly_once() {
        let mut timer = create_timer(60, None, NOW).unwrap();
        timer.end_time_ms = NOW - 1;
        let timers = vec![timer.clone()];
        let mut engine = TimerEngine::new(10_000);

        let first = engine.tick(NOW, &timers);
        assert_eq!(first.expired, vec![timer.clone()]);
        assert!(first.views[0].is_expired);

        for offset in 1..5 {
            let again = engine.tick(NOW + offset * 1000, &timers);
            assert!(again.expired.is_empty());
            assert!(again.views[0].is_expired);
        }
    }

    #[test]
    fn test_grace_window_before_retirement() {
        let timer = create_timer(10, None, NOW).unwrap();
        let timers = vec![timer.clone()];
        let mut engine = TimerEngine::default();

        let running = engine.tick(NOW + 5_000, &timers);
        assert!(running.expired.is_empty());
        assert!(running.retired.is_empty());

        let just_expired = engine.tick(NOW + 10_000, &timers);
        assert_eq!(just_expired.expired.len(), 1);
        assert!(just_expired.retired.is_empty());

        let past_grace = engine.tick(NOW + 11_000, &timers);
        assert!(past_grace.expired.is_empty());
        assert_eq!(past_grace.retired, vec![timer.id]);
    }

    #[test]
    fn test_forgets_removed_timers() {
        let timer = create_timer(1, None, NOW).unwrap();
        let mut engine = TimerEngine::new(0);
        engine.tick(NOW + 2_000, std::slice::from_ref(&timer));
        engine.tick(NOW + 3_000, &[]);
        assert!(engine.notified.is_empty());
    }

    #[test]
    fn test_wire_format() {
        let timer = create_timer(90, None, NOW).unwrap();
        let json = serde_json::to_value(&timer).unwrap();
        assert_eq!(json["durationSeconds"], 90);
        assert_eq!(json["endTime"], NOW + 90_000);

        let aliased: Timer = serde_json::from_value(serde_json::json!({
            "id": timer.id,
            "durationSeconds": 90,
            "endTimeEpochMs": NOW + 90_000,
            "label": "x"
        }))
        .unwrap();
        assert_eq!(aliased.end_time_ms, NOW + 90_000);
    }

    #[test]
    fn test_longest_timer_label_does_not_overflow() {
        let timer = create_timer(i64::from(u32::MAX), None, NOW).unwrap();
        assert_eq!(timer.label, "Timer (71582788 min)");
        assert_eq!(rounded_minutes(89), 1);
        assert_eq!(rounded_minutes(90), 2);
        assert_eq!(rounded_minutes(u32::MAX - 29), 71582788);
    }

    #[test]
    fn test_extreme_end_times_saturate() {
        let mut timer = create_timer(60, None, NOW).unwrap();

        timer.end_time_ms = i64::MIN;
        let view = TimerView::at(&timer, NOW);
        assert!(view.is_expired);
        assert_eq!(view.remaining_ms, 0);
        assert_eq!(timer.validate(), Err(ValidationError::InvalidEndTime));
        let mut engine = TimerEngine::new(DEFAULT_GRACE_MS);
        assert_eq!(engine.tick(NOW, std::slice::from_ref(&timer)).retired, vec![timer.id]);

        timer.end_time_ms = i64::MAX;
        let view = TimerView::at(&timer, i64::MIN);
        assert!(!view.is_expired);
        assert_eq!(view.remaining_ms, i64::MAX);
        assert_eq!(timer.validate(), Err(ValidationError::InvalidEndTime));

        timer.end_time_ms = NOW;
        assert_eq!(timer.validate(), Ok(()));
    }
}
