use std::collections::HashMap;

use crate::models::{Interval, IntervalIntersector, Overlap};

/// In-memory intersection: `b` is sorted per chromosome and searched for every
/// interval of `a`. Half-open coordinates; touching intervals do not overlap.
#[derive(Debug, Default, Clone, Copy)]
pub struct SortedIntersector;

struct ChromIndex {
    /// (start, end, index into b), sorted by start.
    blocks: Vec<(u64, u64, usize)>,
    max_len: u64,
}

impl IntervalIntersector for SortedIntersector {
    fn intersect(&self, a: &[Interval], b: &[Interval]) -> Vec<Overlap> {
        let mut index: HashMap<&str, ChromIndex> = HashMap::new();
        for (i, iv) in b.iter().enumerate() {
            let entry = index.entry(iv.chrom.as_str()).or_insert_with(|| ChromIndex {
                blocks: Vec::new(),
                max_len: 0,
            });
            entry.blocks.push((iv.start, iv.end, i));
            entry.max_len = entry.max_len.max(iv.end.saturating_sub(iv.start));
        }
        for chrom in index.values_mut() {
            chrom.blocks.sort_unstable();
        }

        let mut hits = Vec::new();
        for (ai, iv) in a.iter().enumerate() {
            let Some(chrom) = index.get(iv.chrom.as_str()) else {
                continue;
            };
            // nothing starting before this can reach iv.start
            let first = chrom
                .blocks
                .partition_point(|&(start, _, _)| start + chrom.max_len <= iv.start);
            for &(start, end, bi) in chrom.blocks[first..].iter().take_while(|b| b.0 < iv.end) {
                if end > iv.start {
                    hits.push(Overlap {
                        a: ai,
                        b: bi,
                        length: end.min(iv.end) - start.max(iv.start),
                    });
                }
            }
        }
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(chrom: &str, start: u64, end: u64) -> Interval {
        Interval {
            chrom: chrom.to_string(),
            start,
            end,
            name: String::new(),
        }
    }

    #[test]
    fn finds_nested_and_partial_overlaps() {
        let a = vec![iv("chr1", 100, 200), iv("chr2", 0, 10), iv("chr1", 1_000, 1_100)];
        let b = vec![
            iv("chr1", 0, 5_000),
            iv("chr1", 150, 160),
            iv("chr1", 190, 300),
            iv("chr1", 200, 250),
            iv("chr3", 0, 10),
        ];
        let hits = SortedIntersector.intersect(&a, &b);
        let found: Vec<(usize, usize, u64)> = hits.iter().map(|o| (o.a, o.b, o.length)).collect();
        assert_eq!(found, vec![(0, 0, 100), (0, 1, 10), (0, 2, 10), (2, 0, 100)]);
    }
}
