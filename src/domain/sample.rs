// Collection-relative encoding of timestamped samples
use super::color_scale::Rgba;
use super::temporal_fader::opacity;
use super::value_encoder::ValueEncoder;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A row with a timestamp and a measured value.
pub trait Sample {
    fn timestamp(&self) -> DateTime<Utc>;
    fn value(&self) -> f64;
}

/// A row plus the color it is drawn with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Encoded<T> {
    #[serde(flatten)]
    pub row: T,
    pub color: Rgba,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fade {
    Opaque,
    ByAge,
}

/// Color every row from its value; with `Fade::ByAge` the alpha channel is
/// then replaced by the row's opacity within the collection's time range.
pub fn encode_samples<T: Sample>(
    rows: Vec<T>,
    encoder: &ValueEncoder,
    fade: Fade,
) -> Result<Vec<Encoded<T>>> {
    let values: Vec<f64> = rows.iter().map(Sample::value).collect();
    let mut colors = encoder.encode(&values)?;

    if fade == Fade::ByAge {
        let timestamps: Vec<DateTime<Utc>> = rows.iter().map(Sample::timestamp).collect();
        for (color, alpha) in colors.iter_mut().zip(opacity(&timestamps)) {
            *color = color.with_alpha(alpha);
        }
    }

    Ok(rows
        .into_iter()
        .zip(colors)
        .map(|(row, color)| Encoded { row, color })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DashboardError;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Point {
        at: DateTime<Utc>,
        v: f64,
    }

    impl Sample for Point {
        fn timestamp(&self) -> DateTime<Utc> {
            self.at
        }
        fn value(&self) -> f64 {
            self.v
        }
    }

    fn point(day: u32, v: f64) -> Point {
        Point {
            at: Utc.with_ymd_and_hms(2021, 4, day, 12, 0, 0).unwrap(),
            v,
        }
    }

    #[test]
    fn test_opaque_keeps_full_alpha() {
        let rows = vec![point(1, 5.0), point(20, 30.0)];
        let encoded = encode_samples(rows, &ValueEncoder::default(), Fade::Opaque).unwrap();

        assert!(encoded.iter().all(|e| e.color.alpha() == 255));
    }

    #[test]
    fn test_fade_only_touches_alpha() {
        let encoder = ValueEncoder::default();
        let rows = vec![point(1, 5.0), point(11, 30.0), point(21, 12.0)];

        let opaque = encode_samples(rows.clone(), &encoder, Fade::Opaque).unwrap();
        let faded = encode_samples(rows, &encoder, Fade::ByAge).unwrap();

        for (o, f) in opaque.iter().zip(&faded) {
            assert_eq!(o.color.0[..3], f.color.0[..3]);
        }
        assert_eq!(faded[0].color.alpha(), 0);
        assert_eq!(faded[2].color.alpha(), 255);
    }

    #[test]
    fn test_same_value_differs_across_collections_only_in_alpha() {
        let encoder = ValueEncoder::default();
        let a = encode_samples(vec![point(1, 9.0), point(5, 9.0)], &encoder, Fade::ByAge).unwrap();
        let b = encode_samples(vec![point(5, 9.0), point(9, 9.0)], &encoder, Fade::ByAge).unwrap();

        // the 5th is newest in `a` but oldest in `b`
        assert_eq!(a[1].color.alpha(), 255);
        assert_eq!(b[0].color.alpha(), 0);
    }

    #[test]
    fn test_flattened_serialization() {
        let encoded = encode_samples(vec![point(3, 1.0)], &ValueEncoder::default(), Fade::ByAge)
            .unwrap();
        let json = serde_json::to_value(&encoded[0]).unwrap();

        assert_eq!(json["v"], 1.0);
        assert_eq!(json["color"].as_array().map(Vec::len), Some(4));
        assert_eq!(json["color"][3], 255);
    }

    #[test]
    fn test_propagates_domain_error() {
        let err = encode_samples(vec![point(1, -1.0)], &ValueEncoder::default(), Fade::Opaque)
            .unwrap_err();
        assert!(matches!(err, DashboardError::Domain { .. }));
    }
}
