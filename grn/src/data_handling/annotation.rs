use std::io::BufRead;
use std::path::Path;

use tracing::info;

use crate::error::{GrnError, Result};
use crate::helper_functions::open_text;
use crate::models::{GeneRecord, Strand};

/// Genes from a BED6 or BED12 annotation. Lines with fewer than four columns
/// or non-numeric coordinates are skipped.
pub fn load_genes(path: &Path) -> Result<Vec<GeneRecord>> {
    let mut genes = Vec::new();
    for line in open_text(path)?.lines() {
        let line = line.map_err(|e| GrnError::io(e, path))?;
        if line.starts_with('#') || line.starts_with("track") {
            continue;
        }
        let f: Vec<&str> = line.split('\t').collect();
        if f.len() < 4 {
            continue;
        }
        let (Ok(start), Ok(end)) = (f[1].parse::<u64>(), f[2].parse::<u64>()) else {
            continue;
        };
        genes.push(GeneRecord {
            chrom: f[0].to_string(),
            start,
            end,
            name: f[3].to_string(),
            strand: f.get(5).map_or(Strand::Unknown, |s| Strand::parse(s)),
        });
    }
    if genes.is_empty() {
        return Err(GrnError::InvalidInput(format!(
            "no genes found in annotation {}",
            path.display()
        )));
    }
    info!("Loaded {} genes from {}", genes.len(), path.display());
    Ok(genes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bed12_genes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("genes.bed");
        std::fs::write(
            &path,
            "chr1\t1000\t5000\tGENE1\t0\t+\t1000\t5000\t0\t1\t4000,\t0,\nchr1\t9000\t12000\tGENE2\t0\t-\n",
        )
        .unwrap();
        let genes = load_genes(&path).unwrap();
        assert_eq!(genes.len(), 2);
        assert_eq!(genes[0].strand, Strand::Plus);
        assert_eq!(genes[0].tss(), 999);
        assert_eq!(genes[1].tss(), 12_000);
    }
}
