//! Binding prediction session: owns the motif mapping, the motif graph, the
//! region features, the loaded signal and the active model set.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use ndarray::Array2;
use tracing::{debug, info};

use crate::data_handling::motif2factors::FactorMotifs;
use crate::data_handling::reference::ReferenceDir;
use crate::error::{GrnError, Result};
use crate::features::signal::{load_signal, SignalKind, SignalTable};
use crate::features::source::RegionMode;
use crate::features::RegionFeatures;
use crate::helper_functions::column_f64;
use crate::models::{BindingClassifier, ModelSet, ModelStore, Region, SignalReader, GENERAL_MODEL};
use crate::motif_graph::MotifGraph;
use crate::species::NamingPolicy;

/// Feature columns a model set is trained on. The key (sorted column names
/// joined by `_`) names the model directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelType {
    columns: Vec<String>,
}

impl ModelType {
    pub fn resolve(atac: bool, histone: bool, mode: RegionMode) -> Self {
        let reference = mode == RegionMode::Reference;
        let mut columns = vec!["motif".to_string()];
        if atac {
            columns.push(SignalKind::Atac.title().to_string());
            if reference {
                columns.push(SignalKind::Atac.relative_title());
            }
        }
        if histone {
            columns.push(SignalKind::H3K27ac.title().to_string());
        }
        if reference {
            columns.push("average".to_string());
            columns.push("dist".to_string());
        }
        columns.sort();
        Self { columns }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn key(&self) -> String {
        self.columns.join("_")
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Which model scores a factor.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelChoice {
    /// Trained on the factor itself.
    Own,
    /// Trained on a factor sharing motifs with it.
    Related { factor: String, jaccard: f64 },
    General,
}

/// Binding probabilities of one factor. `rows` index into the session regions;
/// regions with incomplete features are absent.
#[derive(Debug, Clone)]
pub struct BindingPrediction {
    pub factor: String,
    pub choice: ModelChoice,
    pub rows: Vec<usize>,
    pub proba: Vec<f64>,
}

pub struct BindingSession {
    policy: NamingPolicy,
    allowlist: Option<HashSet<String>>,
    f2m: FactorMotifs,
    graph: MotifGraph,
    features: RegionFeatures,
    reference: ReferenceDir,
    store: Arc<dyn ModelStore>,
    atac: Option<SignalTable>,
    histone: Option<SignalTable>,
    model_type: ModelType,
    models: ModelSet,
}

impl BindingSession {
    pub fn new(
        policy: NamingPolicy,
        allowlist: Option<HashSet<String>>,
        f2m: FactorMotifs,
        graph: MotifGraph,
        features: RegionFeatures,
        reference: ReferenceDir,
        store: Arc<dyn ModelStore>,
    ) -> Self {
        let model_type = ModelType::resolve(false, false, features.mode);
        Self {
            policy,
            allowlist,
            f2m,
            graph,
            features,
            reference,
            store,
            atac: None,
            histone: None,
            model_type,
            models: ModelSet::new(),
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.features.regions
    }

    pub fn features(&self) -> &RegionFeatures {
        &self.features
    }

    pub fn f2m(&self) -> &FactorMotifs {
        &self.f2m
    }

    pub fn atac(&self) -> Option<&SignalTable> {
        self.atac.as_ref()
    }

    pub fn histone(&self) -> Option<&SignalTable> {
        self.histone.as_ref()
    }

    pub fn model_type(&self) -> &ModelType {
        &self.model_type
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    pub fn load_atac(
        &mut self,
        files: &[PathBuf],
        reader: &dyn SignalReader,
        seed: u64,
        update_models: bool,
    ) -> Result<()> {
        self.atac = Some(self.read_signal(SignalKind::Atac, files, reader, seed)?);
        if update_models {
            self.refresh_models()?;
        }
        Ok(())
    }

    pub fn load_histone(
        &mut self,
        files: &[PathBuf],
        reader: &dyn SignalReader,
        seed: u64,
        update_models: bool,
    ) -> Result<()> {
        self.histone = Some(self.read_signal(SignalKind::H3K27ac, files, reader, seed)?);
        if update_models {
            self.refresh_models()?;
        }
        Ok(())
    }

    fn read_signal(
        &self,
        kind: SignalKind,
        files: &[PathBuf],
        reader: &dyn SignalReader,
        seed: u64,
    ) -> Result<SignalTable> {
        load_signal(
            kind,
            files,
            &self.features.regions,
            self.features.mode,
            reader,
            &self.reference,
            seed,
        )
    }

    /// Recomputes the model type from the loaded data and replaces the model
    /// set with the models of that type.
    pub fn refresh_models(&mut self) -> Result<()> {
        self.model_type = ModelType::resolve(
            self.atac.is_some(),
            self.histone.is_some(),
            self.features.mode,
        );
        info!("Loading models");
        let models = self.store.load(&self.model_type.key())?;
        if !models.contains_key(GENERAL_MODEL) {
            return Err(GrnError::MissingModel(format!(
                "no '{}' model for model type {}",
                GENERAL_MODEL, self.model_type
            )));
        }
        info!("  Using {} models", models.len());
        self.models = models;
        Ok(())
    }

    /// Factors reported for this species.
    pub fn factors(&self) -> Vec<String> {
        self.f2m
            .keys()
            .filter(|f| self.policy.lists_factor(f, self.allowlist.as_ref()))
            .cloned()
            .collect()
    }

    /// Own model, else the model of the closest related factor within
    /// `1 - jaccard_cutoff` on the motif graph, else the general model.
    pub fn select_model(
        &self,
        factor: &str,
        jaccard_cutoff: f64,
    ) -> Result<(ModelChoice, Arc<dyn BindingClassifier>)> {
        if let Some(model) = self.models.get(factor) {
            info!("Using {} model", factor);
            return Ok((ModelChoice::Own, Arc::clone(model)));
        }

        if self.graph.contains(factor) {
            for (tf, distance) in self.graph.neighbours_within(factor, 1.0 - jaccard_cutoff) {
                if let Some(model) = self.models.get(&tf) {
                    let jaccard = 1.0 - distance;
                    info!(
                        "Using {} model for {} (jaccard index {:.2})",
                        tf, factor, jaccard
                    );
                    return Ok((ModelChoice::Related { factor: tf, jaccard }, Arc::clone(model)));
                }
            }
        }

        info!("Using general model for {} (no related TF found)", factor);
        let model = self.models.get(GENERAL_MODEL).ok_or_else(|| {
            GrnError::MissingModel(format!("no '{}' model loaded", GENERAL_MODEL))
        })?;
        Ok((ModelChoice::General, Arc::clone(model)))
    }

    fn feature_column(&self, name: &str, factor: &str) -> Result<Vec<Option<f64>>> {
        let missing = || GrnError::MissingData(format!("feature '{name}' is not loaded"));
        match name {
            "motif" => column_f64(&self.features.factor_scores, factor).map_err(|_| {
                GrnError::MissingData(format!("no motif scores for factor '{factor}'"))
            }),
            "average" => self.features.average.clone().ok_or_else(missing),
            "dist" => self.features.dist.clone().ok_or_else(missing),
            _ => {
                let values = self
                    .atac
                    .iter()
                    .chain(self.histone.iter())
                    .find_map(|t| t.column(name))
                    .ok_or_else(missing)?;
                Ok(values
                    .iter()
                    .map(|&v| if v.is_finite() { Some(v as f64) } else { None })
                    .collect())
            }
        }
    }

    /// Feature matrix of `factor` in model-type column order, without the
    /// regions that miss any feature.
    fn feature_matrix(&self, factor: &str) -> Result<(Vec<usize>, Array2<f64>)> {
        let columns = self
            .model_type
            .columns()
            .iter()
            .map(|c| self.feature_column(c, factor))
            .collect::<Result<Vec<_>>>()?;

        let n = self.features.regions.len();
        let rows: Vec<usize> = (0..n)
            .filter(|&i| {
                columns
                    .iter()
                    .all(|c| c.get(i).copied().flatten().map_or(false, f64::is_finite))
            })
            .collect();
        if rows.len() < n {
            debug!("{}: {} regions with missing features dropped", factor, n - rows.len());
        }

        let mut x = Array2::<f64>::zeros((rows.len(), columns.len()));
        for (j, col) in columns.iter().enumerate() {
            for (r, &i) in rows.iter().enumerate() {
                x[[r, j]] = col[i].unwrap_or_default();
            }
        }
        Ok((rows, x))
    }

    /// Binding probability of `factor` for every region with complete features.
    pub fn predict_proba(
        &self,
        factor: Option<&str>,
        motifs: Option<&[String]>,
        jaccard_cutoff: f64,
    ) -> Result<BindingPrediction> {
        let factor = match (factor, motifs) {
            (None, None) => {
                return Err(GrnError::InvalidInput(
                    "need either a TF name or one or more motifs".to_string(),
                ))
            }
            (_, Some(_)) => {
                return Err(GrnError::NotImplemented("custom motifs".to_string()))
            }
            (Some(factor), None) => factor,
        };
        if !self.f2m.contains_key(factor) {
            return Err(GrnError::InvalidInput(format!("motif not known for {factor}")));
        }

        let (choice, model) = self.select_model(factor, jaccard_cutoff)?;
        let (rows, x) = self.feature_matrix(factor)?;
        let proba = model.predict_proba(self.model_type.columns(), x.view())?;
        Ok(BindingPrediction {
            factor: factor.to_string(),
            choice,
            rows,
            proba: proba.to_vec(),
        })
    }
}
