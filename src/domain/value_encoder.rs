// Value → color encoding for map rendering
use super::color_scale::{ColorScale, Rgba};
use crate::error::{DashboardError, Result};
use serde::Deserialize;

/// Calibration of the normalization step.
///
/// `(boxcox(value, lambda) + offset) / scale` is clamped to `[0, 1]` before
/// the color scale is sampled. The defaults put typical nitrate
/// concentrations in the middle of the diverging scale.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct EncodingParams {
    #[serde(default = "default_lambda")]
    pub lambda: f64,
    #[serde(default = "default_offset")]
    pub offset: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_lambda() -> f64 {
    0.3
}

fn default_offset() -> f64 {
    2.0
}

fn default_scale() -> f64 {
    8.0
}

impl Default for EncodingParams {
    fn default() -> Self {
        Self {
            lambda: default_lambda(),
            offset: default_offset(),
            scale: default_scale(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ValueEncoder {
    params: EncodingParams,
    scale: ColorScale,
}

impl ValueEncoder {
    pub fn new(params: EncodingParams) -> Self {
        Self {
            params,
            scale: ColorScale::coolwarm(),
        }
    }

    pub fn params(&self) -> EncodingParams {
        self.params
    }

    pub fn scale(&self) -> &ColorScale {
        &self.scale
    }

    /// One opaque color per value. Fails if any value is not strictly positive.
    pub fn encode(&self, values: &[f64]) -> Result<Vec<Rgba>> {
        if values.is_empty() {
            return Ok(Vec::new());
        }

        values
            .iter()
            .map(|&v| {
                let transformed = boxcox(v, self.params.lambda)?;
                let fraction =
                    ((transformed + self.params.offset) / self.params.scale).clamp(0.0, 1.0);
                Ok(self.scale.sample(fraction))
            })
            .collect()
    }
}

impl Default for ValueEncoder {
    fn default() -> Self {
        Self::new(EncodingParams::default())
    }
}

/// Box–Cox power transform with a fixed shape parameter.
pub fn boxcox(value: f64, lambda: f64) -> Result<f64> {
    // also rejects NaN
    if !(value > 0.0) {
        return Err(DashboardError::Domain { value });
    }

    if lambda == 0.0 {
        Ok(value.ln())
    } else {
        Ok((value.powf(lambda) - 1.0) / lambda)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boxcox() {
        assert!((boxcox(1.0, 0.3).unwrap()).abs() < 1e-12);
        assert!((boxcox(std::f64::consts::E, 0.0).unwrap() - 1.0).abs() < 1e-12);
        // (16^0.5 - 1) / 0.5
        assert!((boxcox(16.0, 0.5).unwrap() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input() {
        let encoder = ValueEncoder::default();
        assert!(encoder.encode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_one_color_per_value() {
        let encoder = ValueEncoder::default();
        let values = [0.5, 1.0, 12.0, 25.0, 50.0, 250.0];
        let colors = encoder.encode(&values).unwrap();

        assert_eq!(colors.len(), values.len());
        assert!(colors.iter().all(|c| c.alpha() == 255));
    }

    #[test]
    fn test_rejects_non_positive() {
        let encoder = ValueEncoder::default();

        for bad in [0.0, -4.2, f64::NAN] {
            let err = encoder.encode(&[10.0, bad]).unwrap_err();
            assert!(matches!(err, DashboardError::Domain { .. }));
        }
    }

    #[test]
    fn test_deterministic() {
        let encoder = ValueEncoder::default();
        let values = [3.3, 18.0, 41.7];

        assert_eq!(encoder.encode(&values).unwrap(), encoder.encode(&values).unwrap());
    }

    #[test]
    fn test_calibration_endpoints() {
        let encoder = ValueEncoder::default();
        let scale = ColorScale::coolwarm();

        // boxcox(1.0) = 0 → (0 + 2) / 8 = 0.25
        assert_eq!(encoder.encode(&[1.0]).unwrap()[0], scale.sample(0.25));
        // tiny values clamp to the cold end, huge ones to the warm end
        assert_eq!(encoder.encode(&[1e-6]).unwrap()[0], scale.sample(0.0));
        assert_eq!(encoder.encode(&[1e6]).unwrap()[0], scale.sample(1.0));
    }

    #[test]
    fn test_higher_concentration_is_warmer() {
        let encoder = ValueEncoder::default();
        let colors = encoder.encode(&[2.0, 20.0]).unwrap();

        assert!(colors[1].0[0] > colors[0].0[0]);
        assert!(colors[1].0[2] < colors[0].0[2]);
    }
}
