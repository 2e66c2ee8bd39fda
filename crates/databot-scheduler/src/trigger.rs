use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// When a job should fire.
///
/// Evaluation is a pure function of the trigger's own parameters and the
/// timestamps passed in; the tick loop never needs wall-clock side effects
/// to decide what is due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    /// Repeat every fixed wall-clock period. The first fire is due at
    /// registration; later fires advance from the previous *scheduled* fire
    /// time, so detection jitter never accumulates as drift.
    Interval { every_ms: u64 },

    /// Fire once per day at the given UTC time.
    DailyAt { hour: u8, minute: u8 },

    /// Fire once per week on the given weekday (0 = Monday … 6 = Sunday,
    /// matching chrono's `num_days_from_monday`) at the given UTC time.
    WeeklyAt { weekday: u8, hour: u8, minute: u8 },

    /// Fire exactly once, as soon as the driver observes the job, then
    /// report exhausted.
    Immediate,
}

impl Trigger {
    /// Convenience constructor for second-granularity intervals.
    pub fn interval_secs(secs: u64) -> Self {
        Trigger::Interval {
            every_ms: secs.saturating_mul(1000),
        }
    }

    pub fn interval_ms(ms: u64) -> Self {
        Trigger::Interval { every_ms: ms }
    }

    /// Check the trigger's parameters for range errors.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidTrigger`] for a zero interval, an
    /// hour ≥ 24, a minute ≥ 60, or a weekday ≥ 7.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        match self {
            Trigger::Interval { every_ms } => {
                if *every_ms == 0 {
                    return Err(SchedulerError::InvalidTrigger(
                        "interval period must be non-zero".to_string(),
                    ));
                }
            }
            Trigger::DailyAt { hour, minute } => validate_time(*hour, *minute)?,
            Trigger::WeeklyAt {
                weekday,
                hour,
                minute,
            } => {
                if *weekday > 6 {
                    return Err(SchedulerError::InvalidTrigger(format!(
                        "weekday must be 0-6 (0 = Monday), got {weekday}"
                    )));
                }
                validate_time(*hour, *minute)?;
            }
            Trigger::Immediate => {}
        }
        Ok(())
    }

    /// The instant the trigger is first due after registration at `now`.
    ///
    /// `Interval` and `Immediate` are due immediately; the calendar variants
    /// wait for their next occurrence.
    pub fn first_fire(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Interval { .. } | Trigger::Immediate => Some(now),
            Trigger::DailyAt { hour, minute } => next_daily(*hour, *minute, now),
            Trigger::WeeklyAt {
                weekday,
                hour,
                minute,
            } => next_weekly(*weekday, *hour, *minute, now),
        }
    }

    /// The next fire strictly after a fire scheduled at `fired_at`, observed
    /// at wall-clock `now`. Returns `None` when the trigger is exhausted.
    ///
    /// For `Interval` the next fire advances from `fired_at` (the scheduled
    /// time, not the detection time); if the process stalled past one or
    /// more whole periods the result is clamped to a single catch-up fire
    /// rather than a backlog.
    pub fn next_fire_after(
        &self,
        fired_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self {
            Trigger::Interval { every_ms } => {
                let every = Duration::milliseconds(*every_ms as i64);
                let next = fired_at + every;
                if next <= now {
                    Some(now + every)
                } else {
                    Some(next)
                }
            }
            Trigger::DailyAt { hour, minute } => next_daily(*hour, *minute, now),
            Trigger::WeeklyAt {
                weekday,
                hour,
                minute,
            } => next_weekly(*weekday, *hour, *minute, now),
            Trigger::Immediate => None,
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Interval { every_ms } => write!(f, "every {every_ms}ms"),
            Trigger::DailyAt { hour, minute } => write!(f, "daily at {hour:02}:{minute:02} UTC"),
            Trigger::WeeklyAt {
                weekday,
                hour,
                minute,
            } => write!(f, "weekly on day {weekday} at {hour:02}:{minute:02} UTC"),
            Trigger::Immediate => write!(f, "immediately, once"),
        }
    }
}

fn validate_time(hour: u8, minute: u8) -> Result<(), SchedulerError> {
    if hour > 23 {
        return Err(SchedulerError::InvalidTrigger(format!(
            "hour must be 0-23, got {hour}"
        )));
    }
    if minute > 59 {
        return Err(SchedulerError::InvalidTrigger(format!(
            "minute must be 0-59, got {minute}"
        )));
    }
    Ok(())
}

/// Next occurrence of HH:MM UTC strictly after `after`.
fn next_daily(hour: u8, minute: u8, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), 0)?;
    let candidate = after.date_naive().and_time(time).and_utc();
    if candidate > after {
        Some(candidate)
    } else {
        // Today's occurrence has passed; roll to tomorrow.
        Some(candidate + Duration::days(1))
    }
}

/// Next occurrence of the weekday (0 = Monday) at HH:MM UTC strictly after `after`.
fn next_weekly(weekday: u8, hour: u8, minute: u8, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(u32::from(hour), u32::from(minute), 0)?;
    let today = i64::from(after.weekday().num_days_from_monday());
    let ahead = (i64::from(weekday) - today).rem_euclid(7);
    let candidate = (after.date_naive() + Duration::days(ahead))
        .and_time(time)
        .and_utc();
    if candidate > after {
        Some(candidate)
    } else {
        // The time on the target weekday has already passed; push a week.
        Some(candidate + Duration::days(7))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn interval_first_fire_is_due_at_registration() {
        let now = at(2026, 8, 6, 12, 0, 0);
        assert_eq!(Trigger::interval_secs(2).first_fire(now), Some(now));
    }

    #[test]
    fn interval_fires_spaced_exactly_with_no_drift_over_1000_fires() {
        let trigger = Trigger::interval_ms(2000);
        let start = at(2026, 8, 6, 12, 0, 0);
        let mut fire = start;
        for _ in 0..1000 {
            let next = trigger
                .next_fire_after(fire, fire)
                .expect("interval trigger never exhausts");
            assert_eq!(next - fire, Duration::milliseconds(2000));
            fire = next;
        }
        assert_eq!(fire - start, Duration::milliseconds(2_000_000));
    }

    #[test]
    fn interval_stall_produces_single_catch_up_fire() {
        let trigger = Trigger::interval_secs(2);
        let fired_at = at(2026, 8, 6, 12, 0, 0);
        // The process slept through three whole periods.
        let now = fired_at + Duration::seconds(7);
        let next = trigger.next_fire_after(fired_at, now).unwrap();
        assert_eq!(next, now + Duration::seconds(2));
    }

    #[test]
    fn interval_on_time_fire_advances_from_schedule_not_detection() {
        let trigger = Trigger::interval_secs(10);
        let fired_at = at(2026, 8, 6, 12, 0, 0);
        // Detected 300ms late; the next fire must not inherit the lag.
        let now = fired_at + Duration::milliseconds(300);
        let next = trigger.next_fire_after(fired_at, now).unwrap();
        assert_eq!(next, fired_at + Duration::seconds(10));
    }

    #[test]
    fn daily_before_todays_occurrence_fires_today() {
        let now = at(2026, 8, 6, 8, 30, 0);
        let trigger = Trigger::DailyAt { hour: 9, minute: 0 };
        assert_eq!(trigger.first_fire(now), Some(at(2026, 8, 6, 9, 0, 0)));
    }

    #[test]
    fn daily_past_todays_occurrence_rolls_to_tomorrow() {
        // 09:05 with a 09:00 trigger: tomorrow 09:00, not today.
        let now = at(2026, 8, 6, 9, 5, 0);
        let trigger = Trigger::DailyAt { hour: 9, minute: 0 };
        assert_eq!(
            trigger.next_fire_after(now, now),
            Some(at(2026, 8, 7, 9, 0, 0))
        );
    }

    #[test]
    fn daily_exactly_at_occurrence_rolls_forward() {
        let now = at(2026, 8, 6, 9, 0, 0);
        let trigger = Trigger::DailyAt { hour: 9, minute: 0 };
        assert_eq!(
            trigger.next_fire_after(now, now),
            Some(at(2026, 8, 7, 9, 0, 0))
        );
    }

    #[test]
    fn weekly_later_same_day_fires_this_week() {
        // 2026-08-06 is a Thursday (weekday 3).
        let now = at(2026, 8, 6, 8, 0, 0);
        let trigger = Trigger::WeeklyAt {
            weekday: 3,
            hour: 9,
            minute: 30,
        };
        assert_eq!(trigger.first_fire(now), Some(at(2026, 8, 6, 9, 30, 0)));
    }

    #[test]
    fn weekly_past_time_on_target_day_rolls_a_week() {
        let now = at(2026, 8, 6, 10, 0, 0);
        let trigger = Trigger::WeeklyAt {
            weekday: 3,
            hour: 9,
            minute: 30,
        };
        assert_eq!(
            trigger.next_fire_after(now, now),
            Some(at(2026, 8, 13, 9, 30, 0))
        );
    }

    #[test]
    fn weekly_earlier_weekday_rolls_to_next_week() {
        // Monday (0) from a Thursday: four days ahead, next week's Monday.
        let now = at(2026, 8, 6, 10, 0, 0);
        let trigger = Trigger::WeeklyAt {
            weekday: 0,
            hour: 9,
            minute: 0,
        };
        assert_eq!(
            trigger.next_fire_after(now, now),
            Some(at(2026, 8, 10, 9, 0, 0))
        );
    }

    #[test]
    fn immediate_is_due_at_registration_then_exhausted() {
        let now = at(2026, 8, 6, 12, 0, 0);
        let trigger = Trigger::Immediate;
        assert_eq!(trigger.first_fire(now), Some(now));
        assert_eq!(trigger.next_fire_after(now, now), None);
    }

    #[test]
    fn validate_rejects_zero_interval() {
        let result = Trigger::interval_ms(0).validate();
        assert!(
            matches!(result, Err(SchedulerError::InvalidTrigger(_))),
            "expected InvalidTrigger, got: {result:?}"
        );
    }

    #[test]
    fn validate_rejects_out_of_range_hour() {
        let result = Trigger::DailyAt {
            hour: 24,
            minute: 0,
        }
        .validate();
        assert!(matches!(result, Err(SchedulerError::InvalidTrigger(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_minute() {
        let result = Trigger::DailyAt {
            hour: 9,
            minute: 60,
        }
        .validate();
        assert!(matches!(result, Err(SchedulerError::InvalidTrigger(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_weekday() {
        let result = Trigger::WeeklyAt {
            weekday: 7,
            hour: 9,
            minute: 0,
        }
        .validate();
        assert!(matches!(result, Err(SchedulerError::InvalidTrigger(_))));
    }

    #[test]
    fn validate_accepts_boundary_values() {
        assert!(Trigger::DailyAt {
            hour: 23,
            minute: 59,
        }
        .validate()
        .is_ok());
        assert!(Trigger::WeeklyAt {
            weekday: 6,
            hour: 0,
            minute: 0,
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn trigger_serializes_tagged() {
        let json = serde_json::to_value(Trigger::interval_secs(30)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "interval", "every_ms": 30000})
        );
        let json = serde_json::to_value(Trigger::DailyAt { hour: 9, minute: 0 }).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "daily_at", "hour": 9, "minute": 0})
        );
    }
}
