use std::collections::HashSet;

use polars::prelude::*;
use tracing::{info, warn};

use crate::data_handling::motif2factors::FactorMotifs;
use crate::error::Result;
use crate::helper_functions::column_f64;

pub use crate::data_handling::prescanned::filter_prescanned;

/// Collapses a region × motif table into a region × factor table. The score of
/// a factor is the mean of its motif scores, skipping missing values; factors
/// without any motif in the table are dropped with a warning.
pub fn factor_motif_scores(motifs: &DataFrame, f2m: &FactorMotifs) -> Result<DataFrame> {
    let available: HashSet<String> = motifs
        .get_column_names()
        .iter()
        .map(|c| c.to_string())
        .collect();

    let mut columns: Vec<Column> = vec![motifs.column("region")?.clone()];
    let mut dropped = 0usize;
    for (factor, motif_ids) in f2m {
        let present: Vec<&String> = motif_ids.iter().filter(|m| available.contains(*m)).collect();
        if present.is_empty() {
            warn!("No motifs for factor '{}' were found in the motif scores", factor);
            dropped += 1;
            continue;
        }

        // per region: sum and count of the motif scores that are present
        let mut acc = vec![(0.0f64, 0usize); motifs.height()];
        for motif in &present {
            for (slot, value) in acc.iter_mut().zip(column_f64(motifs, motif)?) {
                if let Some(v) = value.filter(|v| !v.is_nan()) {
                    slot.0 += v;
                    slot.1 += 1;
                }
            }
        }
        let mean: Vec<Option<f64>> = acc
            .into_iter()
            .map(|(sum, n)| (n > 0).then(|| sum / n as f64))
            .collect();
        columns.push(Column::new(factor.as_str().into(), mean));
    }
    info!(
        "Motif scores for {} factors ({} without motifs)",
        columns.len() - 1,
        dropped
    );
    Ok(DataFrame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::BTreeSet;

    #[test]
    fn factor_score_is_motif_mean() {
        let motifs = df!(
            "region" => ["chr1:0-100", "chr1:200-300", "chr2:0-50"],
            "m1" => [1.0, 4.0, -2.0],
            "m2" => [3.0, 0.0, 2.5],
            "m3" => [7.0, 7.0, 7.0]
        )
        .unwrap();
        let mut f2m = FactorMotifs::new();
        f2m.insert("ONE".into(), BTreeSet::from(["m3".to_string()]));
        f2m.insert("TWO".into(), BTreeSet::from(["m1".to_string(), "m2".to_string()]));
        f2m.insert("NONE".into(), BTreeSet::from(["m9".to_string()]));
        // only the motifs present count towards the mean
        f2m.insert("PART".into(), BTreeSet::from(["m1".to_string(), "m9".to_string()]));

        let scores = factor_motif_scores(&motifs, &f2m).unwrap();
        let names: Vec<String> = scores.get_column_names().iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["region", "ONE", "PART", "TWO"]);

        let two: Vec<f64> = scores.column("TWO").unwrap().f64().unwrap().into_no_null_iter().collect();
        for (got, want) in two.iter().zip([2.0, 2.0, 0.25]) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-12);
        }
        let one: Vec<f64> = scores.column("ONE").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(one, vec![7.0, 7.0, 7.0]);
        let part: Vec<f64> = scores.column("PART").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(part, vec![1.0, 4.0, -2.0]);
    }

    #[test]
    fn missing_motif_scores_are_skipped() {
        let motifs = df!(
            "region" => ["chr1:0-100", "chr1:200-300"],
            "m1" => [Some(1.0), None],
            "m2" => [Some(3.0), None],
            "m3" => [Some(5.0), Some(6.0)]
        )
        .unwrap();
        let mut f2m = FactorMotifs::new();
        f2m.insert("ALL".into(), BTreeSet::from(["m1".to_string(), "m2".to_string(), "m3".to_string()]));
        f2m.insert("GAP".into(), BTreeSet::from(["m1".to_string(), "m2".to_string()]));

        let scores = factor_motif_scores(&motifs, &f2m).unwrap();
        let all = scores.column("ALL").unwrap().f64().unwrap();
        assert_abs_diff_eq!(all.get(0).unwrap(), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(all.get(1).unwrap(), 6.0, epsilon = 1e-12);
        let gap = scores.column("GAP").unwrap().f64().unwrap();
        assert_eq!(gap.get(0), Some(2.0));
        assert_eq!(gap.get(1), None);
    }
}
