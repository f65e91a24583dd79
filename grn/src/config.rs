//! JSON run configuration. Every field has a default so a config file only
//! needs to name its inputs.

use std::io::BufRead;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GrnError, Result};
use crate::helper_functions::open_text;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GrnConfig {
    pub binding: BindingConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    pub outdir: PathBuf,
    /// Explicit reference directory. Cannot be combined with `regions` or `pfmscorefile`.
    pub reference: Option<PathBuf>,
    /// Directory with models and normalization targets used when `reference` is unset.
    pub default_reference: PathBuf,
    pub atac_files: Vec<PathBuf>,
    pub histone_files: Vec<PathBuf>,
    /// Region files (BED/narrowPeak or one `chrom:start-end` per line).
    pub regions: Vec<PathBuf>,
    pub pfmscorefile: Option<PathBuf>,
    /// Chromosome sizes file of the genome.
    pub genome: PathBuf,
    pub tax_id: Option<u32>,
    /// Motif-to-factor table matching a custom motif database.
    pub motif2factors: Option<PathBuf>,
    /// Motif-to-factor table of the reference motif database.
    pub reference_motif2factors: PathBuf,
    /// Text or xlsx list of valid human TFs.
    pub valid_factors: Option<PathBuf>,
    /// Restrict prediction to these factors.
    pub factors: Option<FactorSelection>,
    pub indirect: bool,
    pub jaccard_cutoff: f64,
    pub activity_regions: usize,
    pub seed: u64,
    pub ncore: usize,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("./binding"),
            reference: None,
            default_reference: PathBuf::from("./db/default_reference"),
            atac_files: Vec::new(),
            histone_files: Vec::new(),
            regions: Vec::new(),
            pfmscorefile: None,
            genome: PathBuf::from("hg38.sizes"),
            tax_id: None,
            motif2factors: None,
            reference_motif2factors: PathBuf::from("./db/motif2factors.txt"),
            valid_factors: None,
            factors: None,
            indirect: true,
            jaccard_cutoff: 0.0,
            activity_regions: 20_000,
            seed: 42,
            ncore: 4,
        }
    }
}

/// Factor names given inline (`["SOX2", "POU5F1"]`) or as a file with one
/// name per line (`"tfs.txt"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FactorSelection {
    Names(Vec<String>),
    File(PathBuf),
}

impl FactorSelection {
    pub fn names(&self) -> Result<Vec<String>> {
        match self {
            FactorSelection::Names(names) => Ok(names.clone()),
            FactorSelection::File(path) => {
                let mut names = Vec::new();
                for line in open_text(path)?.lines() {
                    let line = line.map_err(|e| GrnError::io(e, path))?;
                    let name = line.trim();
                    if !name.is_empty() && !name.starts_with('#') {
                        names.push(name.to_string());
                    }
                }
                if names.is_empty() {
                    return Err(GrnError::InvalidInput(format!(
                        "{} does not list any factor",
                        path.display()
                    )));
                }
                Ok(names)
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub outdir: PathBuf,
    /// Directory written by the binding step.
    pub binding: PathBuf,
    /// Gene annotation in BED6/BED12 format.
    pub annotation: PathBuf,
    pub genome: PathBuf,
    pub tax_id: Option<u32>,
    pub promoter_up: u64,
    pub promoter_down: u64,
    pub window_up: u64,
    pub window_down: u64,
    /// Pairs at or beyond this distance are dropped before weighting.
    pub long_range_cutoff: u64,
    pub alpha: f64,
    pub padding: u64,
    pub keep1: u64,
    pub remove: u64,
    pub expression: Vec<PathBuf>,
    pub expression_column: String,
    pub correlation: Vec<PathBuf>,
    /// Factors listed in `factor_expression.tsv`; the factors of the binding
    /// table when unset.
    pub motif2factors: Option<PathBuf>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("./network"),
            binding: PathBuf::from("./binding"),
            annotation: PathBuf::from("genes.bed"),
            genome: PathBuf::from("hg38.sizes"),
            tax_id: None,
            promoter_up: 2_000,
            promoter_down: 2_000,
            window_up: 100_000,
            window_down: 100_000,
            long_range_cutoff: 99_999,
            alpha: 1e4,
            padding: 100_000,
            keep1: 5_000,
            remove: 2_000,
            expression: Vec::new(),
            expression_column: "tpm".to_string(),
            correlation: Vec::new(),
            motif2factors: None,
        }
    }
}

impl NetworkConfig {
    /// Checks the distance-weight parameters and warns when the window and the
    /// distance bounds disagree.
    pub fn validate(&self) -> Result<()> {
        if !(self.remove < self.keep1 && self.keep1 < self.padding) {
            return Err(GrnError::InvalidInput(format!(
                "distance weight needs remove < keep1 < padding (got {} / {} / {})",
                self.remove, self.keep1, self.padding
            )));
        }
        if self.alpha <= 0.0 {
            return Err(GrnError::InvalidInput("alpha must be positive".to_string()));
        }
        let window = self.window_up.max(self.window_down);
        if window >= self.long_range_cutoff {
            warn!(
                "Long-range window ({} bp) reaches past the distance cutoff ({} bp); \
                 pairs beyond the cutoff are dropped",
                window, self.long_range_cutoff
            );
        }
        if self.long_range_cutoff > self.padding + 1 {
            warn!(
                "Distance cutoff ({} bp) exceeds the weight padding ({} bp); \
                 pairs beyond the padding get weight 0",
                self.long_range_cutoff, self.padding
            );
        }
        Ok(())
    }
}

impl GrnConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path).map_err(|e| GrnError::io(e, path))?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let cfg: GrnConfig = serde_json::from_str(
            r#"{"binding": {"atac_files": ["a.bedgraph"], "jaccard_cutoff": 0.1},
                "network": {"window_up": 50000, "window_down": 50000}}"#,
        )
        .unwrap();
        assert_eq!(cfg.binding.atac_files, vec![PathBuf::from("a.bedgraph")]);
        assert_eq!(cfg.binding.activity_regions, 20_000);
        assert_eq!(cfg.binding.seed, 42);
        assert_eq!(cfg.network.window_up, 50_000);
        assert_eq!(cfg.network.long_range_cutoff, 99_999);
        assert!(cfg.network.validate().is_ok());
    }

    #[test]
    fn factors_inline_or_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tfs.txt");
        std::fs::write(&path, "SOX2\n\n# comment\nPOU5F1 \n").unwrap();

        let inline: BindingConfig = serde_json::from_str(r#"{"factors": ["SOX2", "GATA1"]}"#).unwrap();
        assert_eq!(
            inline.factors,
            Some(FactorSelection::Names(vec!["SOX2".into(), "GATA1".into()]))
        );

        let json = format!(r#"{{"factors": {}}}"#, serde_json::to_string(&path).unwrap());
        let from_file: BindingConfig = serde_json::from_str(&json).unwrap();
        let names = from_file.factors.unwrap().names().unwrap();
        assert_eq!(names, vec!["SOX2", "POU5F1"]);

        std::fs::write(&path, "\n").unwrap();
        assert!(FactorSelection::File(path).names().is_err());
    }

    #[test]
    fn weight_bounds_are_checked() {
        let cfg = NetworkConfig {
            keep1: 1_000,
            ..NetworkConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
