//! Files of a reference directory.
//!
//! ```text
//! <dir>/reference.factor.tsv        region × factor motif scores
//! <dir>/reference.coverage.txt      average coverage per region
//! <dir>/reference.dist_to_tss.txt   distance to the nearest TSS per region
//! <dir>/<title>.qnorm.ref.txt[.gz]  quantile normalization target
//! <dir>/<title>.mean.ref.txt[.gz]   mean signal per reference region
//! <dir>/<model_type>/*.json         trained models
//! ```

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::{GrnError, Result};
use crate::helper_functions::{read_keyed_values, read_tsv};

const FACTOR_TABLE: &str = "reference.factor.tsv";
const COVERAGE_TABLE: &str = "reference.coverage.txt";
const DIST_TABLE: &str = "reference.dist_to_tss.txt";

#[derive(Debug, Clone)]
pub struct ReferenceDir {
    root: PathBuf,
}

/// Everything needed to use the reference regions.
#[derive(Debug, Clone)]
pub struct ReferenceRegions {
    /// Region × factor scores, first column `region`.
    pub factor_scores: DataFrame,
    /// Coverage rescaled to a maximum of 1, in region order.
    pub average: Vec<(String, f64)>,
    pub dist: Vec<(String, f64)>,
}

impl ReferenceDir {
    pub fn open(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(GrnError::MissingReference(format!(
                "could not find reference directory {}",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn required(&self, name: &str) -> Result<PathBuf> {
        let path = self.root.join(name);
        if path.exists() {
            Ok(path)
        } else {
            Err(GrnError::MissingReference(format!(
                "{} not found. For hg38, download the REMAP reference dataset \
                 (https://doi.org/10.5281/zenodo.4768075) and point `reference` at it, \
                 or (for any species) specify regions or a pfmscorefile",
                path.display()
            )))
        }
    }

    fn optional(&self, stem: &str) -> Option<PathBuf> {
        [stem.to_string(), format!("{stem}.gz")]
            .into_iter()
            .map(|name| self.root.join(name))
            .find(|p| p.exists())
    }

    pub fn load_regions(&self) -> Result<ReferenceRegions> {
        info!("Loading motifs for reference");
        let factor_path = self.required(FACTOR_TABLE)?;
        let mut factor_scores = read_tsv(&factor_path)?;
        let first = factor_scores
            .get_column_names()
            .first()
            .map(|c| c.to_string())
            .ok_or_else(|| GrnError::MissingReference(format!("{} is empty", factor_path.display())))?;
        if first != "region" {
            factor_scores.rename(&first, "region".into())?;
        }

        info!("Loading average peak coverage for reference");
        let mut average = read_keyed_values(&self.required(COVERAGE_TABLE)?)?;
        let max = average.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
        if max > 0.0 {
            for (_, v) in average.iter_mut() {
                *v /= max;
            }
        }

        info!("Loading distance for reference");
        let dist = read_keyed_values(&self.required(DIST_TABLE)?)?;

        Ok(ReferenceRegions {
            factor_scores,
            average,
            dist,
        })
    }

    /// Quantile normalization target for a signal title, if the reference ships one.
    pub fn qnorm_target(&self, title: &str) -> Result<Option<Vec<f64>>> {
        let Some(path) = self.optional(&format!("{title}.qnorm.ref.txt")) else {
            return Ok(None);
        };
        debug!("Quantile normalization target {}", path.display());
        Ok(Some(read_keyed_values(&path)?.into_iter().map(|(_, v)| v).collect()))
    }

    /// Mean reference signal per region, if the reference ships one.
    pub fn mean_signal(&self, title: &str) -> Result<Option<Vec<f64>>> {
        let Some(path) = self.optional(&format!("{title}.mean.ref.txt")) else {
            return Ok(None);
        };
        Ok(Some(read_keyed_values(&path)?.into_iter().map(|(_, v)| v).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_reference_files_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let reference = ReferenceDir::open(dir.path()).unwrap();
        assert!(matches!(
            reference.load_regions(),
            Err(GrnError::MissingReference(_))
        ));
        assert!(ReferenceDir::open(&dir.path().join("nope")).is_err());
        assert!(reference.qnorm_target("ATAC").unwrap().is_none());
    }

    #[test]
    fn loads_reference_regions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(FACTOR_TABLE),
            "loc\tSOX2\nchr1:0-100\t1.5\nchr1:200-300\t0.5\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(COVERAGE_TABLE),
            "region\taverage\nchr1:0-100\t2\nchr1:200-300\t4\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join(DIST_TABLE),
            "region\tdist\nchr1:0-100\t10\nchr1:200-300\t20000\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("ATAC.qnorm.ref.txt"), "i\tqnorm_ref\n0\t1\n1\t2\n").unwrap();

        let reference = ReferenceDir::open(dir.path()).unwrap();
        let regions = reference.load_regions().unwrap();
        let names: Vec<String> = regions
            .factor_scores
            .get_column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(names, vec!["region", "SOX2"]);
        assert_eq!(regions.average[0], ("chr1:0-100".to_string(), 0.5));
        assert_eq!(regions.dist[1].1, 20_000.0);
        assert_eq!(reference.qnorm_target("ATAC").unwrap(), Some(vec![1.0, 2.0]));
    }
}
