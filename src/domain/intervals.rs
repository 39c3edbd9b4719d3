// Date-range partitioning for the weather API's temporal block
use crate::error::{DashboardError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};

/// Timestamp format the weather API expects in interval descriptors.
pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub const DEFAULT_MAX_POINTS: u32 = 30;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Either one contiguous pull or a list of point-in-time snapshots, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntervalSet {
    Continuous {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    Snapshots(Vec<DateTime<Utc>>),
}

/// One entry of the `temporal.intervals` list as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum IntervalDescriptor {
    Range {
        #[serde(serialize_with = "serialize_wire")]
        start: DateTime<Utc>,
        #[serde(serialize_with = "serialize_wire")]
        end: DateTime<Utc>,
    },
    Snapshot {
        #[serde(serialize_with = "serialize_wire")]
        snapshot: DateTime<Utc>,
    },
}

fn serialize_wire<S: Serializer>(
    ts: &DateTime<Utc>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(&ts.format(WIRE_FORMAT))
}

impl IntervalSet {
    pub fn len(&self) -> usize {
        match self {
            IntervalSet::Continuous { .. } => 1,
            IntervalSet::Snapshots(snapshots) => snapshots.len(),
        }
    }

    pub fn to_wire(&self) -> Vec<IntervalDescriptor> {
        match self {
            IntervalSet::Continuous { start, end } => vec![IntervalDescriptor::Range {
                start: *start,
                end: *end,
            }],
            IntervalSet::Snapshots(snapshots) => snapshots
                .iter()
                .map(|&snapshot| IntervalDescriptor::Snapshot { snapshot })
                .collect(),
        }
    }
}

impl Serialize for IntervalSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_wire().serialize(serializer)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IntervalPartitioner {
    max_points: u32,
}

impl IntervalPartitioner {
    pub fn new(max_points: u32) -> Result<Self> {
        if max_points == 0 {
            return Err(DashboardError::InvalidBudget);
        }
        Ok(Self { max_points })
    }

    pub fn max_points(&self) -> u32 {
        self.max_points
    }

    /// Split `[start, end]` so that at most roughly `max_points` snapshots are
    /// requested. Windows shorter than `max_points` days become one range.
    ///
    /// In snapshot mode `end` is always the last element, even when it falls
    /// closer than one stride to the previous snapshot.
    pub fn partition(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<IntervalSet> {
        if end < start {
            return Err(DashboardError::InvalidRange { start, end });
        }

        let span_days = (end - start).num_milliseconds() as f64 / 1000.0 / SECONDS_PER_DAY;
        let delta = span_days / self.max_points as f64;

        if delta < 1.0 {
            return Ok(IntervalSet::Continuous { start, end });
        }

        let stride = Duration::days(delta.ceil() as i64);
        let mut snapshots = Vec::new();
        let mut cur = start;
        while cur < end {
            snapshots.push(cur);
            cur += stride;
        }
        snapshots.push(end);

        tracing::debug!(
            "Partitioned {} days into {} snapshots ({} day stride)",
            span_days,
            snapshots.len(),
            stride.num_days()
        );

        Ok(IntervalSet::Snapshots(snapshots))
    }
}

impl Default for IntervalPartitioner {
    fn default() -> Self {
        Self {
            max_points: DEFAULT_MAX_POINTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_short_window_is_one_range() {
        let set = IntervalPartitioner::default()
            .partition(day(2020, 1, 1), day(2020, 1, 10))
            .unwrap();

        assert_eq!(
            set,
            IntervalSet::Continuous {
                start: day(2020, 1, 1),
                end: day(2020, 1, 10)
            }
        );
        assert_eq!(
            serde_json::to_value(&set).unwrap(),
            serde_json::json!([{ "start": "2020-01-01T00:00:00Z", "end": "2020-01-10T00:00:00Z" }])
        );
    }

    #[test]
    fn test_year_window_uses_13_day_stride() {
        let set = IntervalPartitioner::default()
            .partition(day(2020, 1, 1), day(2021, 1, 1))
            .unwrap();

        let IntervalSet::Snapshots(snapshots) = &set else {
            panic!("expected snapshots, got {:?}", set);
        };

        // 366 / 30 = 12.2 → 13 days; 2020-01-01 + 28 * 13 days = 2020-12-30
        assert_eq!(snapshots.len(), 30);
        assert_eq!(snapshots[0], day(2020, 1, 1));
        assert_eq!(snapshots[1], day(2020, 1, 14));
        assert_eq!(snapshots[28], day(2020, 12, 30));
        assert_eq!(snapshots[29], day(2021, 1, 1));
        assert!(
            snapshots[..29]
                .windows(2)
                .all(|w| w[1] - w[0] == Duration::days(13))
        );
    }

    #[test]
    fn test_snapshot_wire_format() {
        let set = IntervalPartitioner::default()
            .partition(day(2020, 1, 1), day(2021, 1, 1))
            .unwrap();
        let wire = serde_json::to_value(&set).unwrap();

        assert_eq!(wire[0], serde_json::json!({ "snapshot": "2020-01-01T00:00:00Z" }));
        assert_eq!(wire[29], serde_json::json!({ "snapshot": "2021-01-01T00:00:00Z" }));
    }

    #[test]
    fn test_end_appended_when_stride_lands_on_it() {
        // 60 days, budget 30 → stride of exactly 2 days
        let set = IntervalPartitioner::new(30)
            .unwrap()
            .partition(day(2020, 1, 1), day(2020, 3, 1))
            .unwrap();

        let IntervalSet::Snapshots(snapshots) = set else {
            panic!("expected snapshots");
        };
        assert_eq!(snapshots.len(), 31);
        assert_eq!(snapshots.last(), Some(&day(2020, 3, 1)));
        assert_eq!(snapshots[29], day(2020, 2, 28));
    }

    #[test]
    fn test_empty_window_is_one_range() {
        let set = IntervalPartitioner::default()
            .partition(day(2020, 6, 1), day(2020, 6, 1))
            .unwrap();
        assert_eq!(set.len(), 1);
        assert!(matches!(set, IntervalSet::Continuous { .. }));
    }

    #[test]
    fn test_inverted_range_fails() {
        let err = IntervalPartitioner::default()
            .partition(day(2021, 1, 1), day(2020, 1, 1))
            .unwrap_err();
        assert!(matches!(err, DashboardError::InvalidRange { .. }));
    }

    #[test]
    fn test_zero_budget_rejected() {
        assert!(matches!(
            IntervalPartitioner::new(0),
            Err(DashboardError::InvalidBudget)
        ));
    }

    #[test]
    fn test_custom_budget() {
        let partitioner = IntervalPartitioner::new(5).unwrap();
        assert_eq!(partitioner.max_points(), 5);

        // 9 days / 5 = 1.8 → 2 day stride: 1, 3, 5, 7, 9 + end(10)
        let set = partitioner.partition(day(2020, 1, 1), day(2020, 1, 10)).unwrap();
        assert_eq!(set.len(), 6);
    }
}
