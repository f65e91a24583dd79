//! Motif → factor association tables (`Motif Factor Evidence Curated`).

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::io::BufRead;
use std::path::Path;

use calamine::{open_workbook_auto, DataType, Reader};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{GrnError, Result};
use crate::helper_functions::open_text;
use crate::species::{FactorListing, NamingPolicy};

/// Factor → motif ids. Ordered so that everything derived from it is deterministic.
pub type FactorMotifs = BTreeMap<String, BTreeSet<String>>;

/// Artifacts of motif database conversions, never real factors.
const BLACKLIST_TFS: [&str; 1] = ["NO ORTHOLOGS FOUND"];

/// Pseudo-TFs removed from the human allowlist.
const EXCLUDED_HUMAN_TFS: [&str; 1] = ["EP300"];

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Association {
    #[serde(rename = "Motif")]
    pub motif: String,
    #[serde(rename = "Factor")]
    pub factor: String,
    #[serde(rename = "Evidence", default)]
    pub evidence: String,
    #[serde(rename = "Curated", default)]
    pub curated: String,
}

impl Association {
    /// Curated associations are direct; everything else (ChIP-seq motif
    /// inference, orthology) is indirect.
    pub fn is_direct(&self) -> bool {
        self.curated.trim().eq_ignore_ascii_case("Y")
    }
}

pub fn read_associations(path: &Path) -> Result<Vec<Association>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(open_text(path)?);

    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        let row: Association = row.map_err(|e| GrnError::csv(e, path))?;
        if row.factor.trim().is_empty() {
            continue;
        }
        rows.push(row);
    }
    debug!("Read {} motif associations from {}", rows.len(), path.display());
    Ok(rows)
}

/// Which associations make it into a factor → motifs mapping.
#[derive(Debug, Clone, Copy)]
pub struct AssociationFilter<'a> {
    pub indirect: bool,
    /// Restrict to these factors (names as given by the user).
    pub factors: Option<&'a HashSet<String>>,
    pub policy: NamingPolicy,
    pub allowlist: Option<&'a HashSet<String>>,
}

impl<'a> AssociationFilter<'a> {
    /// Every association, named by the species policy; used for the motif graph.
    pub fn unfiltered(policy: NamingPolicy) -> Self {
        Self {
            indirect: true,
            factors: None,
            policy,
            allowlist: None,
        }
    }
}

pub fn factor_motifs(associations: &[Association], filter: AssociationFilter) -> Result<FactorMotifs> {
    let mut f2m = FactorMotifs::new();
    for assoc in associations {
        if !filter.indirect && !assoc.is_direct() {
            continue;
        }
        if let Some(wanted) = filter.factors {
            if !wanted.contains(&assoc.factor) {
                continue;
            }
        }
        let factor = filter.policy.factor_name(assoc.factor.trim());
        if filter.policy.listing == FactorListing::Allowlist {
            if let Some(allow) = filter.allowlist {
                if !allow.contains(&factor) {
                    continue;
                }
            }
        }
        f2m.entry(factor).or_default().insert(assoc.motif.clone());
    }

    for tf in BLACKLIST_TFS {
        f2m.remove(tf);
    }

    if f2m.is_empty() {
        return Err(GrnError::InvalidInput(
            "zero factors remain after filtering the motif2factors table".to_string(),
        ));
    }
    Ok(f2m)
}

pub fn load_factor_motifs(path: &Path, filter: AssociationFilter) -> Result<FactorMotifs> {
    factor_motifs(&read_associations(path)?, filter)
}

/// Union `other` into `base`, factor by factor.
pub fn merge_factor_motifs(base: &mut FactorMotifs, other: &FactorMotifs) {
    for (factor, motifs) in other {
        base.entry(factor.clone()).or_default().extend(motifs.iter().cloned());
    }
}

/// Human TF allowlist, either one symbol per line or the curated xlsx table
/// (second sheet, `HGNC approved gene symbol`, pseudogenes skipped).
pub fn load_valid_factors(path: &Path) -> Result<HashSet<String>> {
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("xlsx"));

    let mut valid = if is_xlsx {
        read_allowlist_xlsx(path)?
    } else {
        let mut names = HashSet::new();
        for line in open_text(path)?.lines() {
            let line = line.map_err(|e| GrnError::io(e, path))?;
            let name = line.trim();
            if !name.is_empty() && !name.starts_with('#') {
                names.insert(name.to_string());
            }
        }
        names
    };
    for tf in EXCLUDED_HUMAN_TFS {
        valid.remove(tf);
    }
    info!("Loaded {} valid factors from {}", valid.len(), path.display());
    Ok(valid)
}

fn read_allowlist_xlsx(path: &Path) -> Result<HashSet<String>> {
    let mut wb = open_workbook_auto(path)
        .map_err(|e| GrnError::InvalidInput(format!("{}: {}", path.display(), e)))?;
    let range = wb
        .worksheet_range_at(1)
        .ok_or_else(|| GrnError::InvalidInput(format!("{}: second sheet missing", path.display())))?
        .map_err(|e| GrnError::InvalidInput(format!("{}: {}", path.display(), e)))?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or_else(|| GrnError::InvalidInput(format!("{}: empty sheet", path.display())))?
        .iter()
        .map(|c| c.to_string())
        .collect();
    let find = |name: &str| header.iter().position(|h| h.trim() == name);
    let symbol_idx = find("HGNC approved gene symbol").ok_or_else(|| {
        GrnError::InvalidInput(format!("{}: no 'HGNC approved gene symbol' column", path.display()))
    })?;
    let pseudo_idx = find("Pseudogene");

    let mut names = HashSet::new();
    for row in rows {
        let is_pseudogene = pseudo_idx
            .and_then(|i| row.get(i))
            .map_or(false, |c| !matches!(c, DataType::Empty));
        if is_pseudogene {
            continue;
        }
        if let Some(cell) = row.get(symbol_idx) {
            let symbol = cell.to_string();
            if !symbol.trim().is_empty() {
                names.insert(symbol.trim().to_string());
            }
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::Species;

    fn assoc(motif: &str, factor: &str, curated: &str) -> Association {
        Association {
            motif: motif.into(),
            factor: factor.into(),
            evidence: "JASPAR".into(),
            curated: curated.into(),
        }
    }

    #[test]
    fn reads_gimme_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m2f.txt");
        std::fs::write(
            &path,
            "Motif\tFactor\tEvidence\tCurated\nM1\tSox2\tJASPAR\tY\nM1\tSox3\tInferred\tN\nM2\t\tx\tN\n",
        )
        .unwrap();
        let rows = read_associations(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_direct());
        assert!(!rows[1].is_direct());
    }

    #[test]
    fn filters_and_names() {
        let rows = vec![
            assoc("M1", "Sox2", "Y"),
            assoc("M2", "Sox2", "N"),
            assoc("M2", "Gata1", "N"),
            assoc("M3", "NO ORTHOLOGS FOUND", "N"),
        ];
        let human = NamingPolicy::for_species(Some(Species::Human));
        let allow: HashSet<String> = ["SOX2".to_string()].into_iter().collect();

        let all = factor_motifs(&rows, AssociationFilter::unfiltered(human)).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains_key("GATA1"));
        assert!(!all.contains_key("NO ORTHOLOGS FOUND"));

        let direct = factor_motifs(
            &rows,
            AssociationFilter {
                indirect: false,
                factors: None,
                policy: human,
                allowlist: Some(&allow),
            },
        )
        .unwrap();
        assert_eq!(direct.len(), 1);
        assert_eq!(direct["SOX2"].iter().collect::<Vec<_>>(), vec!["M1"]);

        let wanted: HashSet<String> = ["Nanog".to_string()].into_iter().collect();
        let none = factor_motifs(
            &rows,
            AssociationFilter {
                factors: Some(&wanted),
                ..AssociationFilter::unfiltered(human)
            },
        );
        assert!(matches!(none, Err(GrnError::InvalidInput(_))));
    }

    #[test]
    fn text_allowlist_drops_ep300() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tfs.txt");
        std::fs::write(&path, "SOX2\nEP300\n\nGATA1\n").unwrap();
        let valid = load_valid_factors(&path).unwrap();
        assert_eq!(valid.len(), 2);
        assert!(!valid.contains("EP300"));
    }
}
