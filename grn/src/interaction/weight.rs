use polars::prelude::*;

use crate::config::NetworkConfig;
use crate::error::Result;

/// Weight of an enhancer by its distance to the TSS: 0 up to `remove`, 1 up to
/// `keep1`, then a logistic-like decay (half weight `alpha` bp past `keep1`)
/// until `padding`. Distances of 0 or beyond `padding` weigh 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceWeight {
    pub alpha: f64,
    pub padding: u64,
    pub keep1: u64,
    pub remove: u64,
}

impl DistanceWeight {
    pub fn from_config(cfg: &NetworkConfig) -> Self {
        Self {
            alpha: cfg.alpha,
            padding: cfg.padding,
            keep1: cfg.keep1,
            remove: cfg.remove,
        }
    }

    fn decay(&self, z: u64) -> f64 {
        let u = -(1.0f64 / 3.0).ln() * 1e5 / self.alpha;
        let e = (-u * z as f64 / 1e5).exp();
        2.0 * e / (1.0 + e)
    }

    pub fn weight(&self, dist: u64) -> f64 {
        if dist == 0 || dist > self.padding || dist <= self.remove {
            0.0
        } else if dist <= self.keep1 {
            1.0
        } else {
            self.decay(dist - self.keep1)
        }
    }

    /// `dist, weight` for every distance in `1..=padding`.
    pub fn table(&self) -> Result<DataFrame> {
        let dist: Vec<i64> = (1..=self.padding as i64).collect();
        let weight: Vec<f64> = (1..=self.padding).map(|d| self.weight(d)).collect();
        Ok(df!("dist" => dist, "weight" => weight)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn default_weight() -> DistanceWeight {
        DistanceWeight::from_config(&NetworkConfig::default())
    }

    #[test]
    fn three_piece_shape() {
        let w = default_weight();
        for d in [0, 1, 1_000, 2_000] {
            assert_eq!(w.weight(d), 0.0, "d = {d}");
        }
        for d in [2_001, 3_500, 5_000] {
            assert_eq!(w.weight(d), 1.0, "d = {d}");
        }
        let mut last = w.weight(5_000);
        for d in (5_001..=100_000).step_by(997) {
            let cur = w.weight(d);
            assert!(cur < last, "weight not decreasing at {d}");
            last = cur;
        }
        assert!(w.weight(100_000) < 1e-4);
        assert_eq!(w.weight(100_001), 0.0);
    }

    #[test]
    fn alpha_is_the_half_weight_distance() {
        let w = default_weight();
        assert_abs_diff_eq!(w.weight(w.keep1 + 10_000), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(w.weight(w.keep1 + 1), 1.0, epsilon = 1e-3);
    }

    #[test]
    fn table_covers_padding() {
        let w = DistanceWeight {
            alpha: 1e4,
            padding: 10,
            keep1: 5,
            remove: 2,
        };
        let t = w.table().unwrap();
        assert_eq!(t.height(), 10);
        let weights: Vec<f64> = t.column("weight").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(&weights[..5], &[0.0, 0.0, 1.0, 1.0, 1.0]);
        assert!(weights[5] < 1.0 && weights[9] < weights[5]);
    }
}
