//! Quantile normalization against a fixed target distribution.

use rand::rngs::StdRng;
use rand::Rng;

use crate::error::{GrnError, Result};

/// Draws `n` values from `target` with replacement. A target that already has
/// `n` values is returned as is.
pub fn resample_target(target: &[f64], n: usize, rng: &mut StdRng) -> Result<Vec<f64>> {
    if target.is_empty() {
        return Err(GrnError::MissingData(
            "quantile normalization target is empty".to_string(),
        ));
    }
    if target.len() == n {
        return Ok(target.to_vec());
    }
    Ok((0..n).map(|_| target[rng.gen_range(0..target.len())]).collect())
}

/// Gives every value the target value of the same rank. Tied values share the
/// mean of the target values spanning their ranks.
pub fn quantile_normalize(columns: &[Vec<f64>], target: &[f64]) -> Result<Vec<Vec<f64>>> {
    let mut sorted = target.to_vec();
    sorted.sort_by(f64::total_cmp);

    columns
        .iter()
        .map(|values| {
            if values.len() != sorted.len() {
                return Err(GrnError::InvalidInput(format!(
                    "quantile normalization of {} values against a target of {}",
                    values.len(),
                    sorted.len()
                )));
            }
            let mut order: Vec<usize> = (0..values.len()).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

            let mut out = vec![0.0; values.len()];
            let mut i = 0;
            while i < order.len() {
                let mut j = i;
                while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
                    j += 1;
                }
                let mean = sorted[i..=j].iter().sum::<f64>() / (j - i + 1) as f64;
                for &idx in &order[i..=j] {
                    out[idx] = mean;
                }
                i = j + 1;
            }
            Ok(out)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn maps_ranks_onto_target() {
        let cols = vec![vec![5.0, 1.0, 3.0], vec![2.0, 2.0, 9.0]];
        let out = quantile_normalize(&cols, &[30.0, 10.0, 20.0]).unwrap();
        assert_eq!(out[0], vec![30.0, 10.0, 20.0]);
        assert_eq!(out[1], vec![15.0, 15.0, 30.0]);
        assert!(quantile_normalize(&cols, &[1.0]).is_err());
    }

    #[test]
    fn resampling_is_seeded() {
        let target = vec![1.0, 2.0, 3.0, 4.0];
        let a = resample_target(&target, 10, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = resample_target(&target, 10, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert!(a.iter().all(|v| target.contains(v)));
        assert_eq!(resample_target(&target, 4, &mut StdRng::seed_from_u64(1)).unwrap(), target);
    }
}
