// Active-user statistics over fixed-size day windows
use super::measurement::UserActivity;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageBucket {
    pub window_start: DateTime<Utc>,
    pub active_users: usize,
}

/// Count distinct users per `window_days` window.
///
/// Windows are anchored at midnight of the earliest timestamp. Every window
/// between the first and the last one is reported, empty ones with zero.
pub fn active_users_per_window(rows: &[UserActivity], window_days: u32) -> Vec<UsageBucket> {
    let Some(earliest) = rows.iter().map(|r| r.timestamp).min() else {
        return Vec::new();
    };
    let window_days = window_days.max(1) as i64;
    let origin = earliest.date_naive().and_time(NaiveTime::MIN).and_utc();
    let window = Duration::days(window_days);

    let mut users: BTreeMap<i64, HashSet<i64>> = BTreeMap::new();
    for row in rows {
        let idx = (row.timestamp - origin).num_seconds() / window.num_seconds();
        users.entry(idx).or_default().insert(row.user_id);
    }

    let last = users.keys().next_back().copied().unwrap_or(0);
    (0..=last)
        .map(|idx| UsageBucket {
            window_start: origin + Duration::days(idx * window_days),
            active_users: users.get(&idx).map_or(0, HashSet::len),
        })
        .collect()
}
