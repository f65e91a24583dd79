//! Logistic binding models stored as JSON (`betas`, `means`, `stds`, `intercept`).

use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{GrnError, Result};
use crate::models::BindingClassifier;

/// Logistic regression over standardized features. Features without a stored
/// mean/std are used as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub betas: HashMap<String, f64>,
    #[serde(default)]
    pub means: HashMap<String, f64>,
    #[serde(default)]
    pub stds: HashMap<String, f64>,
    #[serde(default)]
    pub intercept: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl LogisticModel {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GrnError::io(e, path))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl BindingClassifier for LogisticModel {
    fn predict_proba(&self, columns: &[String], x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if columns.len() != x.ncols() || columns.len() != self.betas.len() {
            return Err(GrnError::InvalidInput(format!(
                "model expects {} features, got {} columns",
                self.betas.len(),
                columns.len()
            )));
        }
        // (beta, mean, std) in column order
        let coef: Vec<(f64, f64, f64)> = columns
            .iter()
            .map(|c| {
                let beta = *self.betas.get(c).ok_or_else(|| {
                    GrnError::InvalidInput(format!("model has no coefficient for '{c}'"))
                })?;
                let mean = self.means.get(c).copied().unwrap_or(0.0);
                let std = self.stds.get(c).copied().unwrap_or(1.0).max(1e-9);
                Ok((beta, mean, std))
            })
            .collect::<Result<_>>()?;

        Ok(x
            .rows()
            .into_iter()
            .map(|row| {
                let z = row
                    .iter()
                    .zip(&coef)
                    .map(|(v, (beta, mean, std))| beta * (v - mean) / std)
                    .sum::<f64>();
                sigmoid(self.intercept + z)
            })
            .collect())
    }
}
