//! Core domain types for the Vitals system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Timestamped entries and sleep sessions
//! - Biometric profile
//! - Aggregation windows and buckets
//! - Health snapshots and advisories

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Event Types
// ============================================================================

/// A single numeric observation (fluid litres, burned kcal, eaten kcal)
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TimestampedValue {
    pub id: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl TimestampedValue {
    /// Create a new entry with a freshly generated id
    pub fn new(value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            value,
            timestamp,
        }
    }

    /// Value usable for aggregation.
    ///
    /// Negative, NaN and infinite values contribute nothing.
    pub fn contribution(&self) -> f64 {
        if self.value.is_finite() && self.value >= 0.0 {
            self.value
        } else {
            0.0
        }
    }
}

/// A completed sleep session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SleepSession {
    pub id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: i64,
}

impl SleepSession {
    /// Build a session from its bounds; returns None unless `end > start`
    pub fn from_bounds(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        let duration_ms = (end - start).num_milliseconds();
        if duration_ms <= 0 {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4().to_string(),
            start,
            end,
            duration_ms,
        })
    }

    pub fn hours(&self) -> f64 {
        self.duration_ms as f64 / 3_600_000.0
    }
}

// ============================================================================
// Biometrics
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Female,
    Male,
    Other,
    #[default]
    Unspecified,
}

/// Static biometric record supplied by the profile store
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct BiometricProfile {
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub gender: Gender,
}

impl BiometricProfile {
    /// Weight, if known and physically meaningful
    pub fn valid_weight_kg(&self) -> Option<f64> {
        self.weight_kg.filter(|w| w.is_finite() && *w > 0.0)
    }

    /// Height, if known and physically meaningful
    pub fn valid_height_cm(&self) -> Option<f64> {
        self.height_cm.filter(|h| h.is_finite() && *h > 0.0)
    }
}

// ============================================================================
// Aggregation Types
// ============================================================================

/// Aggregation granularity for trend charts
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Window {
    /// 7 buckets of 2 hours ending at now
    Today,
    /// 7 calendar days ending today
    Weekly,
    /// 7 buckets covering the trailing 30 days
    Monthly,
}

impl Window {
    /// Reducer conventionally paired with this window
    pub fn default_reducer(self) -> Reducer {
        match self {
            Window::Today | Window::Weekly => Reducer::Sum,
            Window::Monthly => Reducer::Mean,
        }
    }
}

impl std::str::FromStr for Window {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "today" | "day" => Ok(Window::Today),
            "weekly" | "week" => Ok(Window::Weekly),
            "monthly" | "month" => Ok(Window::Monthly),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown window: {}",
                other
            ))),
        }
    }
}

/// How entries inside one bucket are combined
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    /// Plain sum of contributions
    Sum,
    /// Sum divided by the bucket width in days (per-day rate)
    Mean,
}

/// Aggregate over one sub-interval of a window
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Bucket {
    pub label: String,
    pub aggregate: f64,
    pub entries: usize,
}

// ============================================================================
// Snapshot and Advisory Types
// ============================================================================

/// Point-in-time derived view of the user's health metrics
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthSnapshot {
    pub bmi: Option<f64>,
    pub sleep_hours: Option<f64>,
    pub burned_calories: f64,
    pub nutrition_total_kcal: Option<f64>,
    pub hydration_actual_l: f64,
    pub hydration_target_l: f64,
}

/// Advisory urgency; declaration order is the sort order
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

/// Health dimension covered by one rule family, in evaluation order
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RuleFamily {
    Hydration,
    Sleep,
    Activity,
    Bmi,
    Nutrition,
    Balance,
    /// Synthetic family for the engine's failure advisory
    Fallback,
}

/// A single prioritized recommendation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Advisory {
    pub id: String,
    pub family: RuleFamily,
    pub text: String,
    pub icon: String,
    pub priority: Priority,
}

impl Advisory {
    pub fn new(
        id: impl Into<String>,
        family: RuleFamily,
        priority: Priority,
        icon: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            family,
            text: text.into(),
            icon: icon.into(),
            priority,
        }
    }
}

/// Round to two decimal places
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
