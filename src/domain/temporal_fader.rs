// Timestamp → opacity fade for map points
use chrono::{DateTime, Utc};

const FADE_EXPONENT: f64 = 0.25;

/// Opacity in `0..=255` per timestamp, relative to the collection's range.
///
/// The fractional age is eased with a fourth root, so only the earliest
/// points in the window fade strongly. A degenerate range gets full opacity.
pub fn opacity(timestamps: &[DateTime<Utc>]) -> Vec<u8> {
    let (Some(t_min), Some(t_max)) = (timestamps.iter().min(), timestamps.iter().max()) else {
        return Vec::new();
    };

    let range = micros_between(*t_min, *t_max);
    if range <= 0 {
        return vec![255; timestamps.len()];
    }

    timestamps
        .iter()
        .map(|t| {
            let f = micros_between(*t_min, *t) as f64 / range as f64;
            (f.powf(FADE_EXPONENT) * 255.0) as u8
        })
        .collect()
}

fn micros_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_microseconds().unwrap_or(i64::MAX)
}
