use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{GrnError, Result};
use crate::helper_functions::open_text;
use crate::models::Region;

/// Read regions from BED/narrowPeak files or plain `chrom:start-end` lists.
/// Duplicates are removed, first occurrence wins.
pub fn load_regions(paths: &[impl AsRef<Path>]) -> Result<Vec<Region>> {
    let mut seen = HashSet::new();
    let mut regions = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let mut n = 0usize;
        for line in open_text(path)?.lines() {
            let line = line.map_err(|e| GrnError::io(e, path))?;
            let Some(region) = parse_region_line(&line)? else {
                continue;
            };
            n += 1;
            if seen.insert(region.clone()) {
                regions.push(region);
            }
        }
        debug!("{} regions in {}", n, path.display());
    }
    info!("Loaded {} unique regions", regions.len());
    Ok(regions)
}

fn parse_region_line(line: &str) -> Result<Option<Region>> {
    let line = line.trim();
    if line.is_empty()
        || line.starts_with('#')
        || line.starts_with("track")
        || line.starts_with("browser")
        || line == "region"
    {
        return Ok(None);
    }
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() >= 3 {
        let (Ok(start), Ok(end)) = (fields[1].parse::<u64>(), fields[2].parse::<u64>()) else {
            // header line of a BED-like table
            return Ok(None);
        };
        return Ok(Some(Region::new(fields[0], start, end)));
    }
    fields[0].parse::<Region>().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixed_region_files() {
        let dir = tempfile::tempdir().unwrap();
        let bed = dir.path().join("peaks.narrowPeak");
        std::fs::write(
            &bed,
            "chrom\tstart\tend\nchr1\t100\t300\tpeak1\t0\t.\nchr1\t500\t700\tpeak2\t0\t.\n",
        )
        .unwrap();
        let list = dir.path().join("regions.txt");
        std::fs::write(&list, "region\nchr1:100-300\nchr2:10-20\n").unwrap();

        let regions = load_regions(&[bed, list]).unwrap();
        let names: Vec<String> = regions.iter().map(|r| r.to_string()).collect();
        assert_eq!(names, vec!["chr1:100-300", "chr1:500-700", "chr2:10-20"]);
    }
}
