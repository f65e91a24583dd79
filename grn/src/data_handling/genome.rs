use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use crate::error::{GrnError, Result};
use crate::helper_functions::open_text;
use crate::models::GenomeProvider;

/// Genome backed by a `chrom <tab> size` file.
#[derive(Debug, Clone)]
pub struct ChromSizesGenome {
    name: String,
    sizes: HashMap<String, u64>,
    tax_id: Option<u32>,
}

impl ChromSizesGenome {
    pub fn from_path(path: &Path, tax_id: Option<u32>) -> Result<Self> {
        let mut sizes = HashMap::new();
        for line in open_text(path)?.lines() {
            let line = line.map_err(|e| GrnError::io(e, path))?;
            let mut fields = line.split_whitespace();
            let (Some(chrom), Some(size)) = (fields.next(), fields.next()) else {
                continue;
            };
            let size = size.parse::<u64>().map_err(|_| {
                GrnError::InvalidInput(format!("{}: bad size for {}", path.display(), chrom))
            })?;
            sizes.insert(chrom.to_string(), size);
        }
        if sizes.is_empty() {
            return Err(GrnError::InvalidInput(format!(
                "{} does not list any chromosome sizes",
                path.display()
            )));
        }
        Ok(Self {
            name: path.to_string_lossy().into_owned(),
            sizes,
            tax_id,
        })
    }

    pub fn from_sizes(name: &str, sizes: HashMap<String, u64>, tax_id: Option<u32>) -> Self {
        Self {
            name: name.to_string(),
            sizes,
            tax_id,
        }
    }
}

impl GenomeProvider for ChromSizesGenome {
    fn name(&self) -> &str {
        &self.name
    }

    fn chrom_sizes(&self) -> &HashMap<String, u64> {
        &self.sizes
    }

    fn tax_id(&self) -> Option<u32> {
        self.tax_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hg38.sizes");
        std::fs::write(&path, "chr1\t248956422\nchrM 16569\n").unwrap();
        let g = ChromSizesGenome::from_path(&path, None).unwrap();
        assert_eq!(g.chrom_sizes()["chrM"], 16_569);
        assert!(g.name().ends_with("hg38.sizes"));
    }
}
