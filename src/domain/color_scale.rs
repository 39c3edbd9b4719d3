// Diverging color scale used for value encoding
use serde::Serialize;

/// An RGBA color with every channel in `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgba(pub [u8; 4]);

impl Rgba {
    #[cfg(test)]
    pub fn alpha(&self) -> u8 {
        self.0[3]
    }

    pub fn with_alpha(self, alpha: u8) -> Self {
        let [r, g, b, _] = self.0;
        Rgba([r, g, b, alpha])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ColorStop {
    pub position: f64,
    pub rgb: [f64; 3],
}

const fn stop(position: f64, r: f64, g: f64, b: f64) -> ColorStop {
    ColorStop {
        position,
        rgb: [r, g, b],
    }
}

/// Moreland's blue→red "coolwarm" map, 33 ordered stops.
const COOLWARM_STOPS: [ColorStop; 33] = [
    stop(0.0, 0.2298057, 0.298717966, 0.753683153),
    stop(0.03125, 0.26623388, 0.353094838, 0.801466763),
    stop(0.0625, 0.30386891, 0.406535296, 0.84495867),
    stop(0.09375, 0.342804478, 0.458757618, 0.883725899),
    stop(0.125, 0.38301334, 0.50941904, 0.917387822),
    stop(0.15625, 0.424369608, 0.558148092, 0.945619588),
    stop(0.1875, 0.46666708, 0.604562568, 0.968154911),
    stop(0.21875, 0.509635204, 0.648280772, 0.98478814),
    stop(0.25, 0.552953156, 0.688929332, 0.995375608),
    stop(0.28125, 0.596262162, 0.726149107, 0.999836203),
    stop(0.3125, 0.639176211, 0.759599947, 0.998151185),
    stop(0.34375, 0.681291281, 0.788964712, 0.990363227),
    stop(0.375, 0.722193294, 0.813952739, 0.976574709),
    stop(0.40625, 0.761464949, 0.834302879, 0.956945269),
    stop(0.4375, 0.798691636, 0.849786142, 0.931688648),
    stop(0.46875, 0.833466556, 0.860207984, 0.901068838),
    stop(0.5, 0.865395197, 0.86541021, 0.865395561),
    stop(0.53125, 0.897787179, 0.848937047, 0.820880546),
    stop(0.5625, 0.924127593, 0.827384882, 0.774508472),
    stop(0.59375, 0.944468518, 0.800927443, 0.726736146),
    stop(0.625, 0.958852946, 0.769767752, 0.678007945),
    stop(0.65625, 0.96732803, 0.734132809, 0.628751763),
    stop(0.6875, 0.969954137, 0.694266682, 0.579375448),
    stop(0.71875, 0.966811177, 0.650421156, 0.530263762),
    stop(0.75, 0.958003065, 0.602842431, 0.481775914),
    stop(0.78125, 0.943660866, 0.551750968, 0.434243684),
    stop(0.8125, 0.923944917, 0.49730856, 0.387970225),
    stop(0.84375, 0.89904617, 0.439559467, 0.343229596),
    stop(0.875, 0.869186849, 0.378313092, 0.300267182),
    stop(0.90625, 0.834620542, 0.312874446, 0.259301199),
    stop(0.9375, 0.795631745, 0.24128379, 0.220525627),
    stop(0.96875, 0.752534934, 0.157246067, 0.184115123),
    stop(1.0, 0.705673158, 0.01555616, 0.150232812),
];

const LUT_SIZE: usize = 256;

/// A named, versioned color scale resolved into a fixed lookup table.
///
/// Sampling quantizes the fraction into one of 256 bins and truncates each
/// channel to a byte, so identical fractions always produce identical colors.
#[derive(Debug, Clone)]
pub struct ColorScale {
    name: &'static str,
    version: u32,
    lut: Vec<[u8; 3]>,
}

impl ColorScale {
    pub fn coolwarm() -> Self {
        Self::from_stops("coolwarm", 1, &COOLWARM_STOPS)
    }

    /// Build a scale from stops ordered by position, spanning `0.0..=1.0`.
    pub fn from_stops(name: &'static str, version: u32, stops: &[ColorStop]) -> Self {
        let lut = (0..LUT_SIZE)
            .map(|i| {
                let x = i as f64 / (LUT_SIZE - 1) as f64;
                let rgb = interpolate(stops, x);
                rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0) as u8)
            })
            .collect();

        Self { name, version, lut }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Color at `fraction`; out-of-range and NaN fractions clamp to the ends.
    pub fn sample(&self, fraction: f64) -> Rgba {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let idx = ((fraction * LUT_SIZE as f64) as usize).min(LUT_SIZE - 1);
        let [r, g, b] = self.lut[idx];
        Rgba([r, g, b, 255])
    }
}

fn interpolate(stops: &[ColorStop], x: f64) -> [f64; 3] {
    let Some(first) = stops.first() else {
        return [0.0; 3];
    };
    if x <= first.position {
        return first.rgb;
    }

    for pair in stops.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        if x <= hi.position {
            let width = hi.position - lo.position;
            let t = if width > 0.0 {
                (x - lo.position) / width
            } else {
                1.0
            };
            return [0, 1, 2].map(|c| lo.rgb[c] + t * (hi.rgb[c] - lo.rgb[c]));
        }
    }

    stops[stops.len() - 1].rgb
}
