//! Time-bucketed aggregation for trend charts.
//!
//! Every window produces exactly 7 buckets, oldest first. Boundaries are
//! derived from `now` alone, in the time zone `now` carries, so the same
//! `now` always yields the same buckets. Membership is half-open
//! (`start <= t < end`) except for the final bucket, which also admits
//! entries stamped exactly at `now`. Entries outside the covered span are
//! dropped, never folded into an edge bucket.

use crate::{Bucket, Reducer, TimestampedValue, Window};
use chrono::{DateTime, Duration, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// Number of buckets produced for every window
pub const BUCKET_COUNT: usize = 7;

/// Length of the trailing span covered by the monthly window
const MONTHLY_SPAN_DAYS: i64 = 30;

/// Width of one bucket in the today window
const TODAY_BUCKET_HOURS: i64 = 2;

/// Step and step count used to walk out of a DST gap
const GAP_STEP_MINUTES: i64 = 15;
const MAX_GAP_STEPS: usize = 8;

/// Bounds of one bucket as absolute instants
#[derive(Clone, Debug, PartialEq)]
pub struct BucketBounds {
    pub start: DateTime<Utc>,
    /// Exclusive, except for the final bucket where it equals `now` and is inclusive
    pub end: DateTime<Utc>,
    /// Nominal width used by the mean reducer
    pub width_days: f64,
}

/// Compute the 7 bucket bounds for a window
///
/// Today buckets are fixed spans of elapsed time. Weekly and monthly
/// buckets start at local midnights in `now`'s time zone, so a bucket that
/// contains a DST change is an hour shorter or longer than its nominal width.
pub fn bucket_bounds<Tz: TimeZone>(window: Window, now: &DateTime<Tz>) -> Vec<BucketBounds> {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);
    let midnight = now.naive_local().date().and_time(NaiveTime::MIN);
    let n = BUCKET_COUNT as i64;

    let mut bounds: Vec<BucketBounds> = match window {
        Window::Today => (0..n)
            .map(|i| {
                let start = now_utc - Duration::hours(TODAY_BUCKET_HOURS * (n - i));
                BucketBounds {
                    start,
                    end: start + Duration::hours(TODAY_BUCKET_HOURS),
                    width_days: TODAY_BUCKET_HOURS as f64 / 24.0,
                }
            })
            .collect(),

        Window::Weekly => (0..n)
            .map(|i| {
                let day = midnight - Duration::days(n - 1 - i);
                BucketBounds {
                    start: resolve_local(&tz, day),
                    end: resolve_local(&tz, day + Duration::days(1)),
                    width_days: 1.0,
                }
            })
            .collect(),

        Window::Monthly => {
            // Day offsets ceil(i * 30 / 7): 0, 5, 9, 13, 18, 22, 26, 30
            let first_day = midnight - Duration::days(MONTHLY_SPAN_DAYS - 1);
            let offset = |i: i64| (i * MONTHLY_SPAN_DAYS + n - 1) / n;
            (0..n)
                .map(|i| {
                    let (from, to) = (offset(i), offset(i + 1));
                    BucketBounds {
                        start: resolve_local(&tz, first_day + Duration::days(from)),
                        end: resolve_local(&tz, first_day + Duration::days(to)),
                        width_days: (to - from) as f64,
                    }
                })
                .collect()
        }
    };

    if let Some(last) = bounds.last_mut() {
        last.end = now_utc;
    }
    bounds
}

/// Aggregate entries into the 7 buckets of `window`
///
/// Invalid values (negative, NaN, infinite) are counted as entries but
/// contribute zero. An empty entry list yields 7 zero buckets.
pub fn bucketize<Tz: TimeZone>(
    entries: &[TimestampedValue],
    window: Window,
    now: &DateTime<Tz>,
    reducer: Reducer,
) -> Vec<Bucket> {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);
    let bounds = bucket_bounds(window, now);

    let mut sums = [0.0_f64; BUCKET_COUNT];
    let mut counts = [0_usize; BUCKET_COUNT];

    for entry in entries {
        let ts = entry.timestamp;
        if ts < bounds[0].start || ts > now_utc {
            continue;
        }
        // Bounds are contiguous, so the owning bucket is the last one starting at or before `ts`
        let Some(idx) = bounds.iter().rposition(|b| b.start <= ts) else {
            continue;
        };

        let contribution = entry.contribution();
        if contribution != entry.value {
            tracing::debug!(
                "Entry {} has invalid value {}; counting as zero",
                entry.id,
                entry.value
            );
        }
        sums[idx] += contribution;
        counts[idx] += 1;
    }

    bounds
        .iter()
        .enumerate()
        .map(|(idx, b)| {
            let aggregate = match reducer {
                Reducer::Sum => sums[idx],
                Reducer::Mean if b.width_days > 0.0 => sums[idx] / b.width_days,
                Reducer::Mean => 0.0,
            };
            Bucket {
                label: label_for(window, b.start.with_timezone(&tz).naive_local()),
                aggregate,
                entries: counts[idx],
            }
        })
        .collect()
}

/// Sum of entries on `now`'s local calendar day, up to and including `now`
pub fn sum_for_day<Tz: TimeZone>(entries: &[TimestampedValue], now: &DateTime<Tz>) -> f64 {
    let (day_start, now_utc) = today_span(now);

    entries
        .iter()
        .filter(|e| e.timestamp >= day_start && e.timestamp <= now_utc)
        .map(TimestampedValue::contribution)
        .sum()
}

/// Instants of local midnight and `now` for `now`'s calendar day
pub(crate) fn today_span<Tz: TimeZone>(now: &DateTime<Tz>) -> (DateTime<Utc>, DateTime<Utc>) {
    let midnight = now.naive_local().date().and_time(NaiveTime::MIN);
    (
        resolve_local(&now.timezone(), midnight),
        now.with_timezone(&Utc),
    )
}

/// Map a local wall-clock time to an instant
///
/// Ambiguous times take the earlier instant. Times skipped by a DST gap
/// move forward to the first wall-clock time that exists.
fn resolve_local<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> DateTime<Utc> {
    let mut candidate = local;
    for _ in 0..=MAX_GAP_STEPS {
        if let Some(instant) = tz.from_local_datetime(&candidate).earliest() {
            return instant.with_timezone(&Utc);
        }
        candidate += Duration::minutes(GAP_STEP_MINUTES);
    }
    local.and_utc()
}

fn label_for(window: Window, start: NaiveDateTime) -> String {
    match window {
        Window::Today => start.format("%H:%M").to_string(),
        Window::Weekly => start.format("%a").to_string(),
        Window::Monthly => start.format("%b %d").to_string(),
    }
}
