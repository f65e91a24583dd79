//! TF activity: how well motif scores explain the genome-wide signal.

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use ndarray_linalg::{Eigh, UPLO};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

use crate::data_handling::motif2factors::FactorMotifs;
use crate::error::{GrnError, Result};
use crate::helper_functions::{column_f64, minmax_scale, rank_average, zscore};
use crate::predictor::BindingSession;

/// Bayesian ridge regression with Gamma priors on the noise and weight
/// precisions, fitted by evidence maximization.
#[derive(Debug, Clone)]
pub struct BayesianRidge {
    pub max_iter: usize,
    pub tol: f64,
    pub alpha_1: f64,
    pub alpha_2: f64,
    pub lambda_1: f64,
    pub lambda_2: f64,
}

impl Default for BayesianRidge {
    fn default() -> Self {
        Self {
            max_iter: 300,
            tol: 1e-3,
            alpha_1: 1e-6,
            alpha_2: 1e-6,
            lambda_1: 1e-6,
            lambda_2: 1e-6,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FittedBayesianRidge {
    pub coef: Array1<f64>,
    pub intercept: f64,
    /// Noise precision.
    pub alpha: f64,
    /// Weight precision.
    pub lambda: f64,
}

impl BayesianRidge {
    pub fn fit(&self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<FittedBayesianRidge> {
        let (n, p) = x.dim();
        if n < 2 || p == 0 || y.len() != n {
            return Err(GrnError::Regression(format!(
                "cannot fit {} targets on a {}x{} design",
                y.len(),
                n,
                p
            )));
        }
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| GrnError::Regression("empty design".to_string()))?;
        let y_mean = y.sum() / n as f64;
        let xc = &x - &x_mean;
        let yc = &y - y_mean;

        let xtx = xc.t().dot(&xc);
        let (eig, v) = xtx
            .eigh(UPLO::Lower)
            .map_err(|e| GrnError::Regression(e.to_string()))?;
        let eig = eig.mapv(|e| e.max(0.0));
        let vt_xty = v.t().dot(&xc.t().dot(&yc));

        // posterior mean for the current precisions
        let coef_for = |alpha: f64, lambda: f64| -> Array1<f64> {
            let scaled = &vt_xty / &eig.mapv(|e| e + lambda / alpha);
            v.dot(&scaled)
        };

        let var_y = yc.dot(&yc) / n as f64;
        let mut alpha = 1.0 / (var_y + f64::EPSILON);
        let mut lambda = 1.0;
        let mut coef_old: Option<Array1<f64>> = None;

        for iter in 0..self.max_iter {
            let coef = coef_for(alpha, lambda);
            let resid = &yc - &xc.dot(&coef);
            let rmse = resid.dot(&resid);

            let gamma: f64 = eig.iter().map(|&e| alpha * e / (lambda + alpha * e)).sum();
            lambda = (gamma + 2.0 * self.lambda_1) / (coef.dot(&coef) + 2.0 * self.lambda_2);
            alpha = (n as f64 - gamma + 2.0 * self.alpha_1) / (rmse + 2.0 * self.alpha_2);

            if let Some(old) = &coef_old {
                if (old - &coef).mapv(f64::abs).sum() < self.tol {
                    debug!("Bayesian ridge converged after {} iterations", iter);
                    break;
                }
            }
            coef_old = Some(coef);
        }
        if !alpha.is_finite() || !lambda.is_finite() {
            return Err(GrnError::Regression("precision estimates diverged".to_string()));
        }

        let coef = coef_for(alpha, lambda);
        let intercept = y_mean - x_mean.dot(&coef);
        Ok(FittedBayesianRidge {
            coef,
            intercept,
            alpha,
            lambda,
        })
    }
}

/// Regresses each signal on the motif columns of `design` and combines the
/// per-motif coefficients of all signals by average rank, scaled to [0, 1].
/// A signal whose regression fails is skipped.
pub fn motif_activity(
    design: &DataFrame,
    signals: &[(String, Vec<f64>)],
    nregions: usize,
    seed: u64,
) -> Result<HashMap<String, f64>> {
    let motifs: Vec<String> = design
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .filter(|c| c != "region")
        .collect();
    let columns = motifs
        .iter()
        .map(|m| column_f64(design, m))
        .collect::<PolarsResult<Vec<_>>>()?;
    let n = design.height();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut ranked: Vec<Vec<f64>> = Vec::new();
    for (name, values) in signals {
        match fit_signal(&columns, values, n, nregions, &mut rng) {
            Ok(fit) => {
                debug!(
                    "Motif activity for {} (alpha {:.3e}, lambda {:.3e}, intercept {:.3})",
                    name, fit.alpha, fit.lambda, fit.intercept
                );
                ranked.push(rank_average(&fit.coef.to_vec()));
            }
            Err(e) => warn!("Skipping activity for {}: {}", name, e),
        }
    }
    if ranked.is_empty() {
        return Ok(HashMap::new());
    }

    let mean_rank: Vec<f64> = (0..motifs.len())
        .map(|j| ranked.iter().map(|r| r[j]).sum::<f64>() / ranked.len() as f64)
        .collect();
    Ok(motifs.into_iter().zip(minmax_scale(&mean_rank)).collect())
}

fn fit_signal(
    columns: &[Vec<Option<f64>>],
    signal: &[f64],
    n: usize,
    nregions: usize,
    rng: &mut StdRng,
) -> Result<FittedBayesianRidge> {
    if signal.len() != n {
        return Err(GrnError::InvalidInput(format!(
            "{} signal values for {} regions",
            signal.len(),
            n
        )));
    }
    let signal = zscore(signal);
    let mut rows: Vec<usize> = if n < nregions {
        (0..n).collect()
    } else {
        rand::seq::index::sample(rng, n, nregions).into_vec()
    };
    rows.sort_unstable();
    rows.retain(|&i| signal[i].is_finite() && columns.iter().all(|c| c[i].is_some()));

    let mut x = Array2::<f64>::zeros((rows.len(), columns.len()));
    for (j, col) in columns.iter().enumerate() {
        let raw: Vec<f64> = rows.iter().map(|&i| col[i].unwrap_or_default()).collect();
        for (r, v) in zscore(&raw).into_iter().enumerate() {
            x[[r, j]] = v;
        }
    }
    let y: Array1<f64> = rows.iter().map(|&i| signal[i]).collect();
    BayesianRidge::default().fit(x.view(), y.view())
}

/// Activity of a factor: the highest activity among its motifs (or of the
/// factor itself when the design holds factor scores).
pub fn factor_activity(f2m: &FactorMotifs, activity: &HashMap<String, f64>) -> Vec<(String, f64)> {
    f2m.iter()
        .filter_map(|(factor, motifs)| {
            motifs
                .iter()
                .chain(std::iter::once(factor))
                .filter_map(|m| activity.get(m).copied())
                .reduce(f64::max)
                .map(|act| (factor.clone(), act))
        })
        .collect()
}

pub fn predict_factor_activity(
    session: &BindingSession,
    nregions: usize,
    seed: u64,
) -> Result<Vec<(String, f64)>> {
    let features = session.features();
    let design = features
        .motif_scores
        .as_ref()
        .unwrap_or(&features.factor_scores);

    let signals: Vec<(String, Vec<f64>)> = session
        .atac()
        .into_iter()
        .chain(session.histone())
        .flat_map(|t| t.columns.iter())
        .map(|(name, values)| (name.clone(), values.iter().map(|&v| v as f64).collect()))
        .collect();

    let activity = motif_activity(design, &signals, nregions, seed)?;
    if activity.is_empty() {
        warn!("No TF activity could be estimated");
    }
    let factors = factor_activity(session.f2m(), &activity);
    info!("Activity for {} factors", factors.len());
    Ok(factors)
}
