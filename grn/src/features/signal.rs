//! Accessibility and histone signal per region.

use std::collections::HashMap;
use std::path::PathBuf;

use polars::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::data_handling::reference::ReferenceDir;
use crate::error::Result;
use crate::features::qnorm::{quantile_normalize, resample_target};
use crate::features::source::RegionMode;
use crate::helper_functions::zscore;
use crate::models::{Region, SignalReader, WindowedSignal};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Atac,
    H3K27ac,
}

impl SignalKind {
    /// Column name, also the prefix of the reference normalization files.
    pub fn title(self) -> &'static str {
        match self {
            SignalKind::Atac => "ATAC",
            SignalKind::H3K27ac => "H3K27ac",
        }
    }

    /// Coverage window centred on the region midpoint.
    pub fn window(self) -> u64 {
        match self {
            SignalKind::Atac => 200,
            SignalKind::H3K27ac => 2000,
        }
    }

    pub fn store_key(self) -> &'static str {
        match self {
            SignalKind::Atac => "_atac",
            SignalKind::H3K27ac => "_h3k27ac",
        }
    }

    pub fn relative_title(self) -> String {
        format!("{}.relative", self.title())
    }
}

/// Signal columns aligned with the session regions. Always holds the scaled
/// signal under the kind's title; reference regions may add a relative column.
#[derive(Debug, Clone)]
pub struct SignalTable {
    pub kind: SignalKind,
    pub columns: Vec<(String, Vec<f32>)>,
}

impl SignalTable {
    pub fn column(&self, name: &str) -> Option<&[f32]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn to_frame(&self, regions: &[Region]) -> PolarsResult<DataFrame> {
        let mut cols: Vec<Column> = vec![Column::new(
            "region".into(),
            regions.iter().map(|r| r.to_string()).collect::<Vec<_>>(),
        )];
        for (name, values) in &self.columns {
            cols.push(Column::new(name.as_str().into(), values.as_slice()));
        }
        DataFrame::new(cols)
    }
}

/// Puts reader output back in the order of `regions`. Readers may merge or split
/// intervals; rows are then matched on their coordinates and regions without a
/// match get 0.
pub fn realign_signal(regions: &[Region], signal: WindowedSignal) -> Vec<f64> {
    if signal.regions.as_slice() == regions {
        return signal.values;
    }
    debug!(
        "Signal returned {} rows for {} regions, realigning",
        signal.values.len(),
        regions.len()
    );
    let mut by_region: HashMap<Region, f64> = HashMap::with_capacity(signal.values.len());
    for (region, value) in signal.regions.into_iter().zip(signal.values) {
        by_region.entry(region).or_insert(value);
    }
    regions
        .iter()
        .map(|r| by_region.get(r).copied().unwrap_or(0.0))
        .collect()
}

/// Reads every file, normalizes (quantile normalization against the reference
/// target when one exists, log1p otherwise), averages across files and scales
/// the result to a maximum of 1.
pub fn load_signal(
    kind: SignalKind,
    files: &[PathBuf],
    regions: &[Region],
    mode: RegionMode,
    reader: &dyn SignalReader,
    reference: &ReferenceDir,
    seed: u64,
) -> Result<SignalTable> {
    info!("Loading {} data", kind.title());
    let mut per_file: Vec<Vec<f64>> = Vec::with_capacity(files.len());
    for file in files {
        let signal = reader.read(regions, file, kind.window())?;
        per_file.push(realign_signal(regions, signal));
    }

    let normalized = match reference.qnorm_target(kind.title())? {
        Some(target) => {
            debug!("Quantile normalization for {}", kind.title());
            let mut rng = StdRng::seed_from_u64(seed);
            let target = resample_target(&target, regions.len(), &mut rng)?;
            quantile_normalize(&per_file, &target)?
        }
        None => per_file
            .into_iter()
            .map(|col| col.into_iter().map(f64::ln_1p).collect())
            .collect(),
    };

    let n_files = normalized.len().max(1) as f64;
    let mut signal: Vec<f32> = (0..regions.len())
        .map(|i| (normalized.iter().map(|col| col[i]).sum::<f64>() / n_files) as f32)
        .collect();

    let mut columns = Vec::with_capacity(2);
    if mode == RegionMode::Reference {
        match reference.mean_signal(kind.title())? {
            Some(mean_ref) if mean_ref.len() == signal.len() => {
                let diff: Vec<f64> = signal
                    .iter()
                    .zip(&mean_ref)
                    .map(|(&s, m)| s as f64 - m)
                    .collect();
                let relative = zscore(&diff).into_iter().map(|v| v as f32).collect();
                columns.push((kind.relative_title(), relative));
            }
            Some(_) => {
                debug!("Reference mean {} does not match the regions", kind.title());
                debug!("Skipping calculation of relative values.");
            }
            None => {}
        }
    }

    let max = signal.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max > 0.0 {
        signal.iter_mut().for_each(|v| *v /= max);
    }
    columns.insert(0, (kind.title().to_string(), signal));

    Ok(SignalTable { kind, columns })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GrnError;
    use approx::assert_abs_diff_eq;
    use std::path::Path;

    struct FixedReader(HashMap<PathBuf, WindowedSignal>);

    impl SignalReader for FixedReader {
        fn read(&self, _regions: &[Region], file: &Path, _window: u64) -> Result<WindowedSignal> {
            self.0
                .get(file)
                .cloned()
                .ok_or_else(|| GrnError::MissingData(file.display().to_string()))
        }
    }

    fn regions() -> Vec<Region> {
        vec![
            Region::new("chr1", 0, 100),
            Region::new("chr1", 200, 300),
            Region::new("chr1", 400, 500),
        ]
    }

    #[test]
    fn realigns_merged_rows() {
        let regions = regions();
        let signal = WindowedSignal {
            regions: vec![regions[2].clone(), regions[0].clone()],
            values: vec![5.0, 1.0],
        };
        assert_eq!(realign_signal(&regions, signal), vec![1.0, 0.0, 5.0]);
    }

    #[test]
    fn log1p_mean_scaled_to_one() {
        let dir = tempfile::tempdir().unwrap();
        let reference = ReferenceDir::open(dir.path()).unwrap();
        let regions = regions();
        let reader = FixedReader(HashMap::from([
            (
                PathBuf::from("a"),
                WindowedSignal { regions: regions.clone(), values: vec![0.0, 1.0, 3.0] },
            ),
            (
                PathBuf::from("b"),
                WindowedSignal { regions: regions.clone(), values: vec![0.0, 1.0, 3.0] },
            ),
        ]));
        let table = load_signal(
            SignalKind::Atac,
            &[PathBuf::from("a"), PathBuf::from("b")],
            &regions,
            RegionMode::Custom,
            &reader,
            &reference,
            42,
        )
        .unwrap();
        assert_eq!(table.columns.len(), 1);
        let atac = table.column("ATAC").unwrap();
        assert_abs_diff_eq!(atac[0], 0.0);
        assert_abs_diff_eq!(atac[1], 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(atac[2], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn quantile_normalized_with_relative_signal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("H3K27ac.qnorm.ref.txt"),
            "i\tqnorm_ref\n0\t10\n1\t20\n2\t30\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("H3K27ac.mean.ref.txt"),
            "region\tmean_ref\nchr1:0-100\t10\nchr1:200-300\t10\nchr1:400-500\t10\n",
        )
        .unwrap();
        let reference = ReferenceDir::open(dir.path()).unwrap();
        let regions = regions();
        let reader = FixedReader(HashMap::from([(
            PathBuf::from("h"),
            WindowedSignal { regions: regions.clone(), values: vec![3.0, 1.0, 2.0] },
        )]));
        let table = load_signal(
            SignalKind::H3K27ac,
            &[PathBuf::from("h")],
            &regions,
            RegionMode::Reference,
            &reader,
            &reference,
            42,
        )
        .unwrap();

        let h = table.column("H3K27ac").unwrap();
        assert_abs_diff_eq!(h[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(h[1], 1.0 / 3.0, epsilon = 1e-6);
        let rel = table.column("H3K27ac.relative").unwrap();
        assert_abs_diff_eq!(rel[0], 1.224_744_9, epsilon = 1e-5);
        assert_abs_diff_eq!(rel[1], -1.224_744_9, epsilon = 1e-5);
        assert_abs_diff_eq!(rel[2], 0.0, epsilon = 1e-6);

        let frame = table.to_frame(&regions).unwrap();
        assert_eq!(frame.width(), 3);
        assert_eq!(frame.height(), 3);
    }
}
