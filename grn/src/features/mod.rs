//! Per-region features: motif scores per factor, signal, and for reference
//! regions the average coverage and TSS distance.

pub mod motif_scores;
pub mod qnorm;
pub mod signal;
pub mod source;

use std::collections::HashMap;

use polars::prelude::*;
use tracing::info;

use crate::data_handling::motif2factors::FactorMotifs;
use crate::data_handling::prescanned::load_prescanned;
use crate::data_handling::reference::ReferenceDir;
use crate::error::{GrnError, Result};
use crate::helper_functions::column_str;
use crate::models::{GenomeProvider, MotifScanner, Region};

use self::motif_scores::{factor_motif_scores, filter_prescanned};
use self::source::{RegionMode, RegionSource};

/// Region universe of a prediction session and the features that do not
/// depend on signal.
#[derive(Debug, Clone)]
pub struct RegionFeatures {
    pub mode: RegionMode,
    pub regions: Vec<Region>,
    /// `region` plus one column per factor, rows in `regions` order.
    pub factor_scores: DataFrame,
    /// `region` plus one column per motif, rows in `regions` order. Reference
    /// regions only ship factor scores.
    pub motif_scores: Option<DataFrame>,
    pub average: Option<Vec<Option<f64>>>,
    pub dist: Option<Vec<Option<f64>>>,
}

fn align_keyed(regions: &[Region], values: Vec<(String, f64)>) -> Vec<Option<f64>> {
    let by_key: HashMap<String, f64> = values.into_iter().collect();
    regions
        .iter()
        .map(|r| by_key.get(&r.to_string()).copied())
        .collect()
}

fn parse_regions(df: &DataFrame) -> Result<Vec<Region>> {
    column_str(df, "region")?
        .iter()
        .map(|s| s.parse::<Region>())
        .collect()
}

fn ensure_region_column(mut df: DataFrame) -> Result<DataFrame> {
    let first = df
        .get_column_names()
        .first()
        .map(|c| c.to_string())
        .ok_or_else(|| GrnError::MissingData("motif scanner returned no columns".to_string()))?;
    if first != "region" && df.column("region").is_err() {
        df.rename(&first, "region".into())?;
    }
    Ok(df)
}

pub fn assemble_regions(
    source: &RegionSource,
    f2m: &FactorMotifs,
    reference: &ReferenceDir,
    scanner: Option<&dyn MotifScanner>,
    genome: &dyn GenomeProvider,
) -> Result<RegionFeatures> {
    let features = match source {
        RegionSource::PrescannedTable { table, filter } => {
            let mut motifs = load_prescanned(table)?;
            if let Some(filter) = filter {
                motifs = filter_prescanned(motifs, filter)?;
            }
            let factor_scores = factor_motif_scores(&motifs, f2m)?;
            RegionFeatures {
                mode: source.mode(),
                regions: parse_regions(&factor_scores)?,
                factor_scores,
                motif_scores: Some(motifs),
                average: None,
                dist: None,
            }
        }
        RegionSource::RawRegions(regions) => {
            let scanner = scanner.ok_or_else(|| {
                GrnError::InvalidInput(
                    "custom regions need a motif scanner; supply a pfmscorefile with \
                     pre-scanned motif scores instead"
                        .to_string(),
                )
            })?;
            info!("Scanning regions for motifs");
            let mut motif_ids: Vec<String> = f2m.values().flatten().cloned().collect();
            motif_ids.sort();
            motif_ids.dedup();
            let motifs = ensure_region_column(scanner.scan(regions, genome, &motif_ids)?)?;
            let factor_scores = factor_motif_scores(&motifs, f2m)?;
            RegionFeatures {
                mode: source.mode(),
                regions: parse_regions(&factor_scores)?,
                factor_scores,
                motif_scores: Some(motifs),
                average: None,
                dist: None,
            }
        }
        RegionSource::ReferenceDefault => {
            let loaded = reference.load_regions()?;
            let regions = parse_regions(&loaded.factor_scores)?;
            let average = align_keyed(&regions, loaded.average);
            let dist = align_keyed(&regions, loaded.dist);
            RegionFeatures {
                mode: source.mode(),
                regions,
                factor_scores: loaded.factor_scores,
                motif_scores: None,
                average: Some(average),
                dist: Some(dist),
            }
        }
    };
    info!("  Using {} regions", features.regions.len());
    Ok(features)
}
