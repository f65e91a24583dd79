use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use crate::error::{GrnError, Result};
use crate::helper_functions::open_text;
use crate::models::{Region, SignalReader, WindowedSignal};

/// Reads windowed signal from bedGraph coverage tracks
/// (`chrom start end value`, one file per replicate).
///
/// The signal of a region is the coverage summed over every base of the
/// window centred on the region midpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct BedGraphSignalReader;

struct Track {
    /// Per chromosome, sorted by start: (start, end, value).
    blocks: HashMap<String, Vec<(u64, u64, f64)>>,
}

impl Track {
    fn load(path: &Path) -> Result<Self> {
        let mut blocks: HashMap<String, Vec<(u64, u64, f64)>> = HashMap::new();
        for line in open_text(path)?.lines() {
            let line = line.map_err(|e| GrnError::io(e, path))?;
            if line.starts_with('#') || line.starts_with("track") || line.starts_with("browser") {
                continue;
            }
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.len() < 4 {
                continue;
            }
            let parsed = (f[1].parse::<u64>(), f[2].parse::<u64>(), f[3].parse::<f64>());
            let (Ok(start), Ok(end), Ok(value)) = parsed else {
                return Err(GrnError::InvalidInput(format!(
                    "{}: malformed bedGraph line '{}'",
                    path.display(),
                    line
                )));
            };
            blocks.entry(f[0].to_string()).or_default().push((start, end, value));
        }
        for v in blocks.values_mut() {
            v.sort_by_key(|b| b.0);
        }
        Ok(Self { blocks })
    }

    fn window_sum(&self, chrom: &str, start: u64, end: u64) -> f64 {
        let Some(blocks) = self.blocks.get(chrom) else {
            return 0.0;
        };
        // bedGraph blocks do not overlap, so the first candidate is the last
        // block starting before the window.
        let first = blocks.partition_point(|b| b.0 < start).saturating_sub(1);
        blocks[first..]
            .iter()
            .take_while(|b| b.0 < end)
            .filter(|b| b.1 > start)
            .map(|&(s, e, v)| (e.min(end) - s.max(start)) as f64 * v)
            .sum()
    }
}

impl SignalReader for BedGraphSignalReader {
    fn read(&self, regions: &[Region], file: &Path, window: u64) -> Result<WindowedSignal> {
        let track = Track::load(file)?;
        debug!("Read {} chromosomes from {}", track.blocks.len(), file.display());
        let values = regions
            .iter()
            .map(|r| {
                let (start, end) = r.centered_window(window);
                track.window_sum(&r.chrom, start, end)
            })
            .collect();
        Ok(WindowedSignal {
            regions: regions.to_vec(),
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sums_centred_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atac.bedgraph");
        std::fs::write(&path, "track type=bedGraph\nchr1\t0\t150\t1\nchr1\t150\t1000\t2\n").unwrap();
        let regions = vec![Region::new("chr1", 100, 300), Region::new("chr2", 0, 10)];
        let signal = BedGraphSignalReader.read(&regions, &path, 200).unwrap();
        // window 100..300: 50 bp at 1 + 150 bp at 2
        assert_eq!(signal.values, vec![350.0, 0.0]);
        assert_eq!(signal.regions, regions);
    }
}
