use std::path::PathBuf;

use crate::error::{GrnError, Result};
use crate::models::Region;

/// Where the regions and their motif scores come from.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionSource {
    /// Pre-scanned region × motif table, optionally restricted to some regions.
    PrescannedTable {
        table: PathBuf,
        filter: Option<Vec<Region>>,
    },
    /// Regions that still have to be scanned for motifs.
    RawRegions(Vec<Region>),
    /// Regions, motif scores, coverage and TSS distance of the reference directory.
    ReferenceDefault,
}

/// Custom regions carry motif scores only; reference regions also carry
/// average coverage, distance to TSS and relative signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionMode {
    Custom,
    Reference,
}

impl RegionSource {
    /// Picks the source from the supplied inputs. An explicitly requested
    /// reference directory only provides regions on its own; combining it with
    /// regions or a pfmscorefile is ambiguous.
    pub fn resolve(
        explicit_reference: bool,
        regions: Option<Vec<Region>>,
        pfmscorefile: Option<PathBuf>,
    ) -> Result<Self> {
        if explicit_reference && (regions.is_some() || pfmscorefile.is_some()) {
            return Err(GrnError::InvalidInput(
                "a reference directory cannot be combined with regions or a pfmscorefile; \
                 drop `reference` to use custom regions (models and normalization targets \
                 are then read from `default_reference`)"
                    .to_string(),
            ));
        }
        Ok(match (pfmscorefile, regions) {
            (Some(table), filter) => RegionSource::PrescannedTable { table, filter },
            (None, Some(regions)) => {
                if regions.is_empty() {
                    return Err(GrnError::InvalidInput("the region list is empty".to_string()));
                }
                RegionSource::RawRegions(regions)
            }
            (None, None) => RegionSource::ReferenceDefault,
        })
    }

    pub fn mode(&self) -> RegionMode {
        match self {
            RegionSource::ReferenceDefault => RegionMode::Reference,
            _ => RegionMode::Custom,
        }
    }
}
