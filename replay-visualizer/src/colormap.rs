use palette::{FromColor, Hsv, LinSrgb, Mix, Srgb};
use std::str::FromStr;

/// Colour used for cells without a defined value (NaN).
pub const BAD_COLOR: [u8; 3] = [200, 200, 200];

// Viridis, sampled at nine evenly spaced points
const VIRIDIS_STOPS: [[f32; 3]; 9] = [
    [0.267, 0.005, 0.329],
    [0.283, 0.141, 0.458],
    [0.254, 0.265, 0.530],
    [0.207, 0.372, 0.553],
    [0.164, 0.471, 0.558],
    [0.128, 0.567, 0.551],
    [0.135, 0.659, 0.518],
    [0.478, 0.821, 0.318],
    [0.993, 0.906, 0.144],
];

/// Colour maps available for the order-parameter and density panels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMap {
    Viridis,
    /// Blue through green to red.
    Jet,
    Gray,
}

impl ColorMap {
    /// Default order-parameter map for a run with `species_count` species.
    pub fn for_species(species_count: usize) -> Self {
        if species_count >= 3 {
            ColorMap::Jet
        } else {
            ColorMap::Viridis
        }
    }

    /// Colour of `t`, with `t` in `[0, 1]`. Values outside saturate at the ends; NaN maps to [`BAD_COLOR`].
    pub fn sample(&self, t: f64) -> [u8; 3] {
        if t.is_nan() {
            return BAD_COLOR;
        }
        let t = t.clamp(0.0, 1.0) as f32;
        let rgb: Srgb<u8> = match self {
            ColorMap::Viridis => {
                let scaled = t * (VIRIDIS_STOPS.len() - 1) as f32;
                let lower = (scaled.floor() as usize).min(VIRIDIS_STOPS.len() - 2);
                let frac = scaled - lower as f32;
                let [r0, g0, b0] = VIRIDIS_STOPS[lower];
                let [r1, g1, b1] = VIRIDIS_STOPS[lower + 1];
                let a: LinSrgb = Srgb::new(r0, g0, b0).into_linear();
                let b: LinSrgb = Srgb::new(r1, g1, b1).into_linear();
                Srgb::<f32>::from_linear(a.mix(b, frac)).into_format()
            }
            ColorMap::Jet => Srgb::from_color(Hsv::new(240.0 * (1.0 - t), 1.0, 1.0)).into_format(),
            ColorMap::Gray => Srgb::new(t, t, t).into_format(),
        };
        [rgb.red, rgb.green, rgb.blue]
    }

    /// Colour of `value` on the range `[lo, hi]`.
    pub fn sample_range(&self, value: f64, lo: f64, hi: f64) -> [u8; 3] {
        let span = hi - lo;
        if span.abs() < f64::EPSILON {
            return self.sample(if value.is_nan() { f64::NAN } else { 0.5 });
        }
        self.sample((value - lo) / span)
    }
}

impl FromStr for ColorMap {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "viridis" => Ok(ColorMap::Viridis),
            "jet" => Ok(ColorMap::Jet),
            "gray" | "grey" => Ok(ColorMap::Gray),
            other => Err(format!("unknown colour map '{}' (expected viridis, jet or gray)", other)),
        }
    }
}
