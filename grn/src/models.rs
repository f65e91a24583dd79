use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use ndarray::{Array1, ArrayView2};
use polars::frame::DataFrame;
use regex::Regex;

use crate::error::{GrnError, Result};

/// Name of the model every model set has to provide.
pub const GENERAL_MODEL: &str = "general";

// ─────────────────────────────────────────────────────────────────────────────
// Genomic coordinates
// ─────────────────────────────────────────────────────────────────────────────

/// A genomic interval, written as `chrom:start-end`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
}

fn region_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+):(\d+)-(\d+)$").expect("static region pattern"))
}

impl Region {
    pub fn new(chrom: impl Into<String>, start: u64, end: u64) -> Self {
        Self {
            chrom: chrom.into(),
            start,
            end,
        }
    }

    pub fn midpoint(&self) -> u64 {
        (self.start + self.end) / 2
    }

    /// `width` bp centred on the midpoint, clipped at 0.
    pub fn centered_window(&self, width: u64) -> (u64, u64) {
        let mid = self.midpoint();
        (mid.saturating_sub(width / 2), mid + width / 2)
    }
}

impl FromStr for Region {
    type Err = GrnError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = region_pattern()
            .captures(s.trim())
            .ok_or_else(|| GrnError::InvalidInput(format!("'{s}' is not a chrom:start-end region")))?;
        let start: u64 = caps[2]
            .parse()
            .map_err(|_| GrnError::InvalidInput(format!("bad start in region '{s}'")))?;
        let end: u64 = caps[3]
            .parse()
            .map_err(|_| GrnError::InvalidInput(format!("bad end in region '{s}'")))?;
        if end <= start {
            return Err(GrnError::InvalidInput(format!("region '{s}' has end <= start")));
        }
        Ok(Region::new(&caps[1], start, end))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chrom, self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strand {
    Plus,
    Minus,
    Unknown,
}

impl Strand {
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            "+" => Strand::Plus,
            "-" => Strand::Minus,
            _ => Strand::Unknown,
        }
    }
}

/// One gene of the annotation, as read from a BED file.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub strand: Strand,
}

impl GeneRecord {
    /// 0-based position of the base just upstream of the gene: `start - 1` on
    /// `+`, `end` on `-`. Genes without strand are treated as `+`.
    pub fn tss(&self) -> u64 {
        match self.strand {
            Strand::Minus => self.end,
            _ => self.start.saturating_sub(1),
        }
    }

    /// Window of `up` bp upstream and `down` bp downstream of the TSS, following
    /// the gene's orientation. `chrom_size` clips the right edge when known.
    pub fn flank_tss(&self, up: u64, down: u64, chrom_size: Option<u64>) -> (u64, u64) {
        let tss = self.tss();
        let (left, right) = match self.strand {
            Strand::Minus => (down, up),
            _ => (up, down),
        };
        let start = tss.saturating_sub(left);
        let mut end = tss + 1 + right;
        if let Some(size) = chrom_size {
            end = end.min(size);
        }
        (start, end)
    }
}

/// Interval handed to an [`IntervalIntersector`]; `name` is a free-form key.
#[derive(Debug, Clone, PartialEq)]
pub struct Interval {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
}

/// Overlapping pair, as indices into the two interval slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlap {
    pub a: usize,
    pub b: usize,
    pub length: u64,
}

/// Per-region signal returned by a [`SignalReader`]. `regions` may differ from
/// the requested regions when the reader merged or split intervals.
#[derive(Debug, Clone, Default)]
pub struct WindowedSignal {
    pub regions: Vec<Region>,
    pub values: Vec<f64>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Collaborators
// ─────────────────────────────────────────────────────────────────────────────

pub trait GenomeProvider: Send + Sync {
    fn name(&self) -> &str;

    fn chrom_sizes(&self) -> &HashMap<String, u64>;

    fn tax_id(&self) -> Option<u32> {
        None
    }
}

pub trait MotifScanner: Send + Sync {
    /// Region × motif score table. The first column is `region`.
    fn scan(
        &self,
        regions: &[Region],
        genome: &dyn GenomeProvider,
        motifs: &[String],
    ) -> Result<DataFrame>;
}

pub trait IntervalIntersector: Send + Sync {
    fn intersect(&self, a: &[Interval], b: &[Interval]) -> Vec<Overlap>;
}

pub trait SignalReader: Send + Sync {
    fn read(&self, regions: &[Region], file: &Path, window: u64) -> Result<WindowedSignal>;
}

/// A trained binary classifier. `columns` names the columns of `x`.
pub trait BindingClassifier: Send + Sync + fmt::Debug {
    /// Probability of the positive (bound) class for every row of `x`.
    fn predict_proba(&self, columns: &[String], x: ArrayView2<f64>) -> Result<Array1<f64>>;
}

pub type ModelSet = HashMap<String, Arc<dyn BindingClassifier>>;

pub trait ModelStore: Send + Sync {
    /// All models trained for `model_type`, keyed by factor name.
    fn load(&self, model_type: &str) -> Result<ModelSet>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_round_trip() {
        let r: Region = "chr1:100-300".parse().unwrap();
        assert_eq!(r, Region::new("chr1", 100, 300));
        assert_eq!(r.to_string(), "chr1:100-300");
        assert_eq!(r.midpoint(), 200);
        assert_eq!(r.centered_window(200), (100, 300));
    }

    #[test]
    fn region_rejects_garbage() {
        assert!("chr1:300-100".parse::<Region>().is_err());
        assert!("chr1_100_300".parse::<Region>().is_err());
        // contig names may contain colons
        let r: Region = "HLA-A*01:01:1-50".parse().unwrap();
        assert_eq!(r.chrom, "HLA-A*01:01");
    }

    #[test]
    fn tss_windows_follow_strand() {
        let plus = GeneRecord {
            chrom: "chr1".into(),
            start: 10_000,
            end: 20_000,
            name: "A".into(),
            strand: Strand::Plus,
        };
        assert_eq!(plus.tss(), 9_999);
        assert_eq!(plus.flank_tss(2_000, 500, None), (7_999, 10_500));

        let minus = GeneRecord {
            strand: Strand::Minus,
            ..plus.clone()
        };
        assert_eq!(minus.tss(), 20_000);
        assert_eq!(minus.flank_tss(2_000, 500, Some(21_000)), (19_500, 21_000));
        assert_eq!(minus.flank_tss(200, 500, None), (19_500, 20_201));
    }
}
