//! Continuous color mapping for treemap tiles.

/// Diverging red-to-blue scale (ColorBrewer RdBu), low values red.
pub const RD_BU: [[u8; 3]; 11] = [
    [103, 0, 31],
    [178, 24, 43],
    [214, 96, 77],
    [244, 165, 130],
    [253, 219, 199],
    [247, 247, 247],
    [209, 229, 240],
    [146, 197, 222],
    [67, 147, 195],
    [33, 102, 172],
    [5, 48, 97],
];

/// Fill of the constant root tile.
pub const ROOT_FILL: [u8; 3] = [211, 211, 211]; // lightgray

/// Figure background.
pub const PAPER_FILL: [u8; 3] = [211, 211, 211];

/// Maps color values onto [`RD_BU`], clamped to a display range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorMap {
    pub min: f64,
    pub max: f64,
}

impl ColorMap {
    pub fn new((min, max): (f64, f64)) -> Self {
        Self { min, max }
    }

    /// Position of `value` in the range, clamped to [0, 1]. A flat range maps to the middle.
    pub fn normalize(&self, value: f64) -> f64 {
        let span = self.max - self.min;
        if !value.is_finite() || span <= 0.0 || !span.is_finite() {
            return 0.5;
        }
        ((value - self.min) / span).clamp(0.0, 1.0)
    }

    pub fn rgb(&self, value: f64) -> [u8; 3] {
        Self::sample(self.normalize(value))
    }

    /// Linear interpolation between the neighbouring stops at `t` in [0, 1].
    pub fn sample(t: f64) -> [u8; 3] {
        let t = t.clamp(0.0, 1.0);
        let scaled = t * (RD_BU.len() - 1) as f64;
        let lower = scaled.floor() as usize;
        let upper = (lower + 1).min(RD_BU.len() - 1);
        let frac = scaled - lower as f64;

        let mut out = [0u8; 3];
        for (channel, slot) in out.iter_mut().enumerate() {
            let a = RD_BU[lower][channel] as f64;
            let b = RD_BU[upper][channel] as f64;
            *slot = (a + (b - a) * frac).round() as u8;
        }
        out
    }

    /// Evenly spaced tick values across the display range.
    pub fn ticks(&self, count: usize) -> Vec<f64> {
        if count < 2 {
            return vec![self.min];
        }
        (0..count)
            .map(|i| self.min + (self.max - self.min) * i as f64 / (count - 1) as f64)
            .collect()
    }
}

/// Black on light fills, white on dark ones.
pub fn text_on(fill: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = fill;
    let luminance = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    if luminance > 140.0 {
        [0, 0, 0]
    } else {
        [255, 255, 255]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_and_midpoint() {
        let map = ColorMap::new((0.0, 100.0));
        assert_eq!(map.rgb(0.0), RD_BU[0]);
        assert_eq!(map.rgb(100.0), RD_BU[10]);
        assert_eq!(map.rgb(50.0), RD_BU[5]);
    }

    #[test]
    fn test_values_outside_range_are_clamped() {
        let map = ColorMap::new((6.0, 11.0));
        assert_eq!(map.rgb(2.0), RD_BU[0]);
        assert_eq!(map.rgb(12.5), RD_BU[10]);
        assert_eq!(map.normalize(8.5), 0.5);
    }

    #[test]
    fn test_flat_range_maps_to_middle() {
        let map = ColorMap::new((5.0, 5.0));
        assert_eq!(map.normalize(5.0), 0.5);
        assert_eq!(map.normalize(f64::NAN), 0.5);
    }

    #[test]
    fn test_interpolates_between_stops() {
        // halfway between the first two stops
        let c = ColorMap::sample(0.05);
        assert!((c[0] as i32 - 141).abs() <= 1);
        assert_eq!(c[1], 12);
        assert!((c[2] as i32 - 37).abs() <= 1);
    }

    #[test]
    fn test_text_contrast() {
        assert_eq!(text_on(RD_BU[0]), [255, 255, 255]);
        assert_eq!(text_on(RD_BU[5]), [0, 0, 0]);
        assert_eq!(text_on(ROOT_FILL), [0, 0, 0]);
    }

    #[test]
    fn test_ticks_span_range() {
        let ticks = ColorMap::new((6.0, 11.0)).ticks(6);
        assert_eq!(ticks, vec![6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }
}
