use std::collections::HashSet;
use std::path::Path;

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{GrnError, Result};
use crate::helper_functions::read_tsv;
use crate::models::Region;

/// Pre-scanned motif scores: regions in the first column, one column per motif.
/// The region column is renamed to `region`.
pub fn load_prescanned(path: &Path) -> Result<DataFrame> {
    info!("Loading pre-scanned motif scores from {}", path.display());
    if !path.exists() {
        return Err(GrnError::InvalidInput(format!("{} does not exist", path.display())));
    }
    let mut df = read_tsv(path)?;
    let first = df
        .get_column_names()
        .first()
        .map(|c| c.to_string())
        .ok_or_else(|| GrnError::InvalidInput(format!("{} has no columns", path.display())))?;
    if first != "region" {
        df.rename(&first, "region".into())?;
    }
    Ok(df)
}

/// Keep the rows of `motifs` listed in `regions`. Requested regions missing
/// from the table are reported and ignored.
pub fn filter_prescanned(motifs: DataFrame, regions: &[Region]) -> Result<DataFrame> {
    let present: HashSet<String> = motifs
        .column("region")?
        .str()?
        .into_iter()
        .flatten()
        .map(|s| s.to_string())
        .collect();
    let wanted: HashSet<String> = regions.iter().map(|r| r.to_string()).collect();

    let missing: Vec<&String> = wanted.iter().filter(|r| !present.contains(*r)).collect();
    if !missing.is_empty() {
        warn!("{} regions not found in the pfmscorefile:", missing.len());
        warn!(
            "{}",
            missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
        );
        warn!("These regions are ignored. Create a new pfmscorefile with these regions to include them!");
    }

    let keep = wanted.len() - missing.len();
    if keep == present.len() {
        return Ok(motifs);
    }
    debug!("Subsetting pfmscorefile to requested {} regions", keep);
    let mask: BooleanChunked = motifs
        .column("region")?
        .str()?
        .into_iter()
        .map(|r| r.map_or(false, |r| wanted.contains(r)))
        .collect();
    Ok(motifs.filter(&mask)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_and_filter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.tsv");
        std::fs::write(
            &path,
            "# gimme scan\nloc\tM1\tM2\nchr1:0-100\t1.0\t2.0\nchr1:200-300\t3.0\t4.0\n",
        )
        .unwrap();
        let df = load_prescanned(&path).unwrap();
        let names: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["region", "M1", "M2"]);

        let subset = filter_prescanned(
            df,
            &[Region::new("chr1", 200, 300), Region::new("chr9", 1, 2)],
        )
        .unwrap();
        assert_eq!(subset.height(), 1);
        assert_eq!(subset.column("M2").unwrap().f64().unwrap().get(0), Some(4.0));
    }
}
