//! Species detection and the naming rules that depend on it.

use std::path::Path;

use tracing::warn;

use crate::models::GenomeProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Species {
    Human,
    Mouse,
}

const HUMAN_TAX_ID: u32 = 9606;
const MOUSE_TAX_ID: u32 = 10090;

/// Genome name fragments used when no taxonomy id is available.
const GENOME_NAME_HINTS: [(&str, Species); 6] = [
    ("hg38", Species::Human),
    ("hg19", Species::Human),
    ("GRCh3", Species::Human),
    ("mm10", Species::Mouse),
    ("mm9", Species::Mouse),
    ("GRCm3", Species::Mouse),
];

impl Species {
    /// Taxonomy id first; a known id that is neither human nor mouse yields `None`
    /// without looking at the genome name.
    pub fn infer(genome: &dyn GenomeProvider) -> Option<Species> {
        if let Some(tax_id) = genome.tax_id() {
            return match tax_id {
                HUMAN_TAX_ID => Some(Species::Human),
                MOUSE_TAX_ID => Some(Species::Mouse),
                _ => None,
            };
        }
        Self::from_genome_name(genome.name())
    }

    pub fn from_genome_name(name: &str) -> Option<Species> {
        let trimmed = name.trim_end_matches('/');
        let base = Path::new(trimmed)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or(trimmed);
        GENOME_NAME_HINTS
            .iter()
            .find(|(hint, _)| base.contains(hint))
            .map(|&(_, species)| species)
    }
}

/// How the factor list of a motif database is narrowed down for a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactorListing {
    /// Only factors on the curated allowlist.
    Allowlist,
    /// Mouse symbols: first letter free, remainder lowercase.
    MouseSymbols,
    All,
}

/// Gene and factor naming rules for one species.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingPolicy {
    pub uppercase_factors: bool,
    pub uppercase_genes: bool,
    pub listing: FactorListing,
}

pub const SPECIES_POLICIES: [(Option<Species>, NamingPolicy); 3] = [
    (
        Some(Species::Human),
        NamingPolicy {
            uppercase_factors: true,
            uppercase_genes: true,
            listing: FactorListing::Allowlist,
        },
    ),
    (
        Some(Species::Mouse),
        NamingPolicy {
            uppercase_factors: false,
            uppercase_genes: false,
            listing: FactorListing::MouseSymbols,
        },
    ),
    (
        None,
        NamingPolicy {
            uppercase_factors: false,
            uppercase_genes: false,
            listing: FactorListing::All,
        },
    ),
];

impl NamingPolicy {
    pub fn for_species(species: Option<Species>) -> NamingPolicy {
        SPECIES_POLICIES
            .iter()
            .find(|(s, _)| *s == species)
            .map(|(_, p)| *p)
            .unwrap_or(SPECIES_POLICIES[2].1)
    }

    pub fn factor_name(&self, name: &str) -> String {
        if self.uppercase_factors {
            name.to_uppercase()
        } else {
            name.to_string()
        }
    }

    pub fn gene_name(&self, name: &str) -> String {
        if self.uppercase_genes {
            name.to_uppercase()
        } else {
            name.to_string()
        }
    }

    /// Whether `factor` is reported by this species' listing rule. The allowlist
    /// rule accepts everything when no allowlist was loaded.
    pub fn lists_factor(&self, factor: &str, allowlist: Option<&std::collections::HashSet<String>>) -> bool {
        match self.listing {
            FactorListing::Allowlist => allowlist.map_or(true, |a| a.contains(factor)),
            FactorListing::MouseSymbols => {
                let tail: String = factor.chars().skip(1).collect();
                tail.chars().any(|c| c.is_alphabetic()) && tail == tail.to_lowercase()
            }
            FactorListing::All => true,
        }
    }
}

/// Motif-to-factor links are only curated for human and mouse symbols.
pub fn warn_unsupported_species(genome: &str, species: Option<Species>, custom_motifs: bool) {
    if species.is_none() && !custom_motifs {
        warn!("The genome '{}' is not recognized as human or mouse.", genome);
        warn!("If you do have another species, the motif file likely needs to be adapted.");
        warn!("Currently mouse and human gene names are used to link motifs to TFs.");
        warn!("Provide a motif2factors table with your own gene symbols to fix this.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    struct Named(&'static str, Option<u32>, HashMap<String, u64>);

    impl GenomeProvider for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn chrom_sizes(&self) -> &HashMap<String, u64> {
            &self.2
        }
        fn tax_id(&self) -> Option<u32> {
            self.1
        }
    }

    #[test]
    fn species_from_tax_id_wins() {
        let g = Named("/data/mm10/mm10.fa", Some(9606), HashMap::new());
        assert_eq!(Species::infer(&g), Some(Species::Human));
        let zebrafish = Named("danRer11", Some(7955), HashMap::new());
        assert_eq!(Species::infer(&zebrafish), None);
    }

    #[test]
    fn species_from_name() {
        assert_eq!(Species::from_genome_name("/genomes/hg38/"), Some(Species::Human));
        assert_eq!(Species::from_genome_name("GRCm39"), Some(Species::Mouse));
        assert_eq!(Species::from_genome_name("GRCz11"), None);
    }

    #[test]
    fn policies() {
        let human = NamingPolicy::for_species(Some(Species::Human));
        assert_eq!(human.gene_name("Sox2"), "SOX2");
        let allow: HashSet<String> = ["SOX2".to_string()].into_iter().collect();
        assert!(human.lists_factor("SOX2", Some(&allow)));
        assert!(!human.lists_factor("GATA1", Some(&allow)));

        let mouse = NamingPolicy::for_species(Some(Species::Mouse));
        assert_eq!(mouse.gene_name("Sox2"), "Sox2");
        assert!(mouse.lists_factor("Sox2", None));
        assert!(!mouse.lists_factor("SOX2", None));

        let other = NamingPolicy::for_species(None);
        assert!(other.lists_factor("anything", None));
    }
}
