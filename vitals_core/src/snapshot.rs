//! Health snapshot derivation.
//!
//! A snapshot is computed fresh from already-materialized inputs every time
//! it is requested. Missing inputs surface as `None`/`0.0` fields, never as
//! errors, so the advisory rules can treat absence as its own case.

use crate::bucket::{sum_for_day, today_span};
use crate::config::HydrationConfig;
use crate::types::round2;
use crate::{BiometricProfile, HealthSnapshot, SleepSession, TimestampedValue};
use chrono::{DateTime, TimeZone};

/// Build a snapshot using the default hydration parameters
pub fn build_snapshot<Tz: TimeZone>(
    profile: &BiometricProfile,
    sleep_sessions: &[SleepSession],
    calorie_entries: &[TimestampedValue],
    fluid_entries: &[TimestampedValue],
    nutrition_total_kcal: Option<f64>,
    now: &DateTime<Tz>,
) -> HealthSnapshot {
    build_snapshot_with(
        &HydrationConfig::default(),
        profile,
        sleep_sessions,
        calorie_entries,
        fluid_entries,
        nutrition_total_kcal,
        now,
    )
}

/// Build a snapshot with explicit hydration parameters
pub fn build_snapshot_with<Tz: TimeZone>(
    hydration: &HydrationConfig,
    profile: &BiometricProfile,
    sleep_sessions: &[SleepSession],
    calorie_entries: &[TimestampedValue],
    fluid_entries: &[TimestampedValue],
    nutrition_total_kcal: Option<f64>,
    now: &DateTime<Tz>,
) -> HealthSnapshot {
    let snapshot = HealthSnapshot {
        bmi: compute_bmi(profile),
        sleep_hours: latest_sleep_hours(sleep_sessions),
        burned_calories: round2(sum_for_day(calorie_entries, now)),
        nutrition_total_kcal: nutrition_total_kcal
            .filter(|kcal| kcal.is_finite() && *kcal >= 0.0),
        hydration_actual_l: round2(sum_for_day(fluid_entries, now)),
        hydration_target_l: hydration_target(profile, hydration),
    };

    tracing::debug!("Built snapshot: {:?}", snapshot);
    snapshot
}

/// BMI rounded to 2 decimals, or None without usable height and weight
pub fn compute_bmi(profile: &BiometricProfile) -> Option<f64> {
    let weight = profile.valid_weight_kg()?;
    let height_m = profile.valid_height_cm()? / 100.0;
    Some(round2(weight / (height_m * height_m)))
}

/// Daily hydration target in litres
pub fn hydration_target(profile: &BiometricProfile, hydration: &HydrationConfig) -> f64 {
    match profile.valid_weight_kg() {
        Some(weight) => round2(weight * hydration.litres_per_kg),
        None => hydration.fallback_target_l,
    }
}

/// Today's nutrition total, or None when nothing was logged today
pub fn nutrition_total_for_day<Tz: TimeZone>(
    entries: &[TimestampedValue],
    now: &DateTime<Tz>,
) -> Option<f64> {
    let (day_start, now_utc) = today_span(now);
    let logged_today = entries
        .iter()
        .any(|e| e.timestamp >= day_start && e.timestamp <= now_utc);
    logged_today.then(|| round2(sum_for_day(entries, now)))
}

/// Duration of the most recently ended session, in hours
fn latest_sleep_hours(sessions: &[SleepSession]) -> Option<f64> {
    sessions
        .iter()
        .filter(|s| s.duration_ms > 0)
        .max_by_key(|s| s.end)
        .map(|s| round2(s.hours()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Gender;
    use chrono::{Duration, Utc};

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn profile(height_cm: Option<f64>, weight_kg: Option<f64>) -> BiometricProfile {
        BiometricProfile {
            height_cm,
            weight_kg,
            gender: Gender::Unspecified,
        }
    }

    #[test]
    fn test_hydration_from_weight_and_today_entries() {
        let now = at("2024-03-10T14:00:00Z");
        let fluids = vec![
            TimestampedValue::new(0.5, now - Duration::hours(1)),
            TimestampedValue::new(0.3, now - Duration::hours(3)),
        ];

        let snapshot = build_snapshot(&profile(None, Some(70.0)), &[], &[], &fluids, None, &now);

        assert_eq!(snapshot.hydration_target_l, 2.31);
        assert_eq!(snapshot.hydration_actual_l, 0.8);
    }

    #[test]
    fn test_hydration_fallback_without_weight() {
        let now = Utc::now();
        let snapshot = build_snapshot(&profile(None, None), &[], &[], &[], None, &now);
        assert_eq!(snapshot.hydration_target_l, 2.5);
        assert_eq!(snapshot.hydration_actual_l, 0.0);
    }

    #[test]
    fn test_bmi_rounding_and_absence() {
        assert_eq!(compute_bmi(&profile(Some(175.0), Some(70.0))), Some(22.86));
        assert_eq!(compute_bmi(&profile(None, Some(70.0))), None);
        assert_eq!(compute_bmi(&profile(Some(175.0), None)), None);
        assert_eq!(compute_bmi(&profile(Some(0.0), Some(70.0))), None);
        assert_eq!(compute_bmi(&profile(Some(175.0), Some(-1.0))), None);
    }

    #[test]
    fn test_sleep_hours_uses_most_recent_session() {
        let now = at("2024-03-10T14:00:00Z");
        let older = SleepSession::from_bounds(
            at("2024-03-08T22:00:00Z"),
            at("2024-03-09T08:00:00Z"),
        )
        .unwrap();
        let latest = SleepSession::from_bounds(
            at("2024-03-09T23:30:00Z"),
            at("2024-03-10T05:15:00Z"),
        )
        .unwrap();

        let snapshot = build_snapshot(
            &profile(None, None),
            &[latest, older],
            &[],
            &[],
            None,
            &now,
        );
        assert_eq!(snapshot.sleep_hours, Some(5.75));
    }

    #[test]
    fn test_no_sleep_sessions_is_none() {
        let now = Utc::now();
        let snapshot = build_snapshot(&profile(None, None), &[], &[], &[], None, &now);
        assert_eq!(snapshot.sleep_hours, None);
    }

    #[test]
    fn test_burned_calories_only_counts_today() {
        let now = at("2024-03-10T14:00:00Z");
        let calories = vec![
            TimestampedValue::new(250.0, at("2024-03-10T07:00:00Z")),
            TimestampedValue::new(120.0, at("2024-03-10T12:30:00Z")),
            TimestampedValue::new(900.0, at("2024-03-09T18:00:00Z")),
            TimestampedValue::new(-40.0, at("2024-03-10T13:00:00Z")),
        ];

        let snapshot = build_snapshot(&profile(None, None), &[], &calories, &[], None, &now);
        assert_eq!(snapshot.burned_calories, 370.0);
    }

    #[test]
    fn test_nutrition_total_for_day() {
        let now = at("2024-03-10T14:00:00Z");
        assert_eq!(nutrition_total_for_day(&[], &now), None);

        let yesterday = vec![TimestampedValue::new(800.0, at("2024-03-09T19:00:00Z"))];
        assert_eq!(nutrition_total_for_day(&yesterday, &now), None);

        let meals = vec![
            TimestampedValue::new(450.0, at("2024-03-10T08:00:00Z")),
            TimestampedValue::new(720.5, at("2024-03-10T12:30:00Z")),
        ];
        assert_eq!(nutrition_total_for_day(&meals, &now), Some(1170.5));
    }

    #[test]
    fn test_invalid_nutrition_total_is_absent() {
        let now = Utc::now();
        let snapshot =
            build_snapshot(&profile(None, None), &[], &[], &[], Some(f64::NAN), &now);
        assert_eq!(snapshot.nutrition_total_kcal, None);
    }
}
