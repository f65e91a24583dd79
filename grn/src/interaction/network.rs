//! Expression and correlation features joined onto the aggregated binding.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::{GrnError, Result};
use crate::helper_functions::{column_f64, column_str, minmax_scale, rank_average, read_tsv};

const EXPRESSION_PSEUDOCOUNT: f64 = 1e-5;
/// Floor applied before taking log10 of a factor's TPM.
const MIN_FACTOR_TPM: f64 = 1e-10;

/// Every value of `column` per upper-case gene name (first column) across `files`.
fn expression_values(files: &[PathBuf], column: &str) -> Result<HashMap<String, Vec<f64>>> {
    let mut values: HashMap<String, Vec<f64>> = HashMap::new();
    for file in files {
        let df = read_tsv(file)?;
        let id_col = df
            .get_column_names()
            .first()
            .map(|c| c.to_string())
            .ok_or_else(|| GrnError::InvalidInput(format!("{} has no columns", file.display())))?;
        let genes = column_str(&df, &id_col)?;
        let tpm = column_f64(&df, column).map_err(|_| {
            GrnError::InvalidInput(format!("{} has no '{}' column", file.display(), column))
        })?;
        for (gene, value) in genes.into_iter().zip(tpm) {
            if let Some(value) = value {
                values.entry(gene.to_uppercase()).or_default().push(value);
            }
        }
    }
    Ok(values)
}

fn mean_expression(files: &[PathBuf], column: &str) -> Result<HashMap<String, f64>> {
    Ok(expression_values(files, column)?
        .into_iter()
        .map(|(gene, v)| (gene, v.iter().sum::<f64>() / v.len() as f64))
        .collect())
}

/// Expression level of every factor: the mean of `log10(max(tpm, 1e-10))`
/// over all its rows in `files`, -10 for factors without expression, and the
/// min-max scaled average rank of that level.
pub fn factor_expression_table(factors: &[String], files: &[PathBuf], column: &str) -> Result<DataFrame> {
    let values = expression_values(files, column)?;
    let names: Vec<String> = factors
        .iter()
        .map(|f| f.to_uppercase())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let level: Vec<f64> = names
        .iter()
        .map(|name| match values.get(name) {
            Some(v) if !v.is_empty() => {
                v.iter().map(|tpm| tpm.max(MIN_FACTOR_TPM).log10()).sum::<f64>() / v.len() as f64
            }
            _ => MIN_FACTOR_TPM.log10(),
        })
        .collect();
    let expressed = names.iter().filter(|n| values.contains_key(*n)).count();
    info!("Expression for {} of {} factors", expressed, names.len());

    let rank = minmax_scale(&rank_average(&level));
    Ok(df!(
        "factor" => names,
        "factor_expression" => level,
        "factor_expression_rank" => rank
    )?)
}

/// `log2(tpm + 1e-5)` of the factor and of the target gene for every
/// factor/gene pair with both expressed, plus min-max and rank min-max scaled
/// versions.
pub fn expression_table(features: &DataFrame, files: &[PathBuf], column: &str) -> Result<DataFrame> {
    let expression: HashMap<String, f64> = mean_expression(files, column)?
        .into_iter()
        .map(|(gene, tpm)| (gene, (tpm + EXPRESSION_PSEUDOCOUNT).log2()))
        .collect();

    let keys = column_str(features, "source_target")?;
    let factors = column_str(features, "factor")?;
    let genes = column_str(features, "gene")?;

    let (mut kept, mut factor_expr, mut target_expr) = (Vec::new(), Vec::new(), Vec::new());
    for ((key, factor), gene) in keys.into_iter().zip(factors).zip(genes) {
        let f = expression.get(&factor.to_uppercase());
        let t = expression.get(&gene.to_uppercase());
        if let (Some(&f), Some(&t)) = (f, t) {
            kept.push(key);
            factor_expr.push(f);
            target_expr.push(t);
        }
    }
    info!("Expression for {} factor-gene pairs", kept.len());

    let factor_scale = minmax_scale(&factor_expr);
    let target_scale = minmax_scale(&target_expr);
    let factor_rank = minmax_scale(&rank_average(&factor_expr));
    let target_rank = minmax_scale(&rank_average(&target_expr));
    Ok(df!(
        "source_target" => kept,
        "factor_expression" => factor_expr,
        "target_expression" => target_expr,
        "factor_expression.scale" => factor_scale,
        "target_expression.scale" => target_scale,
        "factor_expression.rank.scale" => factor_rank,
        "target_expression.rank.scale" => target_rank
    )?)
}

/// One `corr_fileN` column per file (first column key, second column value),
/// matched case-insensitively on `source_target`. Pairs missing from a file
/// get null.
pub fn correlation_table(features: &DataFrame, files: &[PathBuf]) -> Result<DataFrame> {
    let keys = column_str(features, "source_target")?;
    let mut columns: Vec<Column> = vec![Column::new("source_target".into(), keys.clone())];
    for (i, file) in files.iter().enumerate() {
        let df = read_tsv(file)?;
        let names: Vec<String> = df.get_column_names().iter().map(|c| c.to_string()).collect();
        if names.len() < 2 {
            return Err(GrnError::InvalidInput(format!(
                "{} needs a key and a value column",
                file.display()
            )));
        }
        let corr: HashMap<String, f64> = column_str(&df, &names[0])?
            .into_iter()
            .zip(column_f64(&df, &names[1])?)
            .filter_map(|(k, v)| v.map(|v| (k.to_uppercase(), v)))
            .collect();
        let values: Vec<Option<f64>> = keys
            .iter()
            .map(|k| corr.get(&k.to_uppercase()).copied())
            .collect();
        let found = values.iter().flatten().count();
        if found == 0 {
            warn!("No factor-gene pairs of {} match the features", file.display());
        }
        columns.push(Column::new(format!("corr_file{}", i + 1).into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

/// Inner join of `features` with every table in `others` on `source_target`.
pub fn join_features(features: DataFrame, others: &[DataFrame]) -> Result<DataFrame> {
    let mut joined = features.lazy();
    for other in others {
        let other = other.clone().lazy().select([col("*").exclude(["factor", "gene"])]);
        joined = joined.join(
            other,
            [col("source_target")],
            [col("source_target")],
            JoinArgs::new(JoinType::Inner),
        );
    }
    Ok(joined
        .sort(["source_target"], SortMultipleOptions::default())
        .collect()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn features() -> DataFrame {
        df!(
            "source_target" => ["SOX2_NANOG", "SOX2_GATA1", "OCT4_NANOG"],
            "factor" => ["SOX2", "SOX2", "OCT4"],
            "gene" => ["NANOG", "GATA1", "NANOG"],
            "sum_binding" => [1.0, 2.0, 3.0]
        )
        .unwrap()
    }

    #[test]
    fn expression_needs_factor_and_target() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tsv");
        let b = dir.path().join("b.tsv");
        std::fs::write(&a, "gene\ttpm\nsox2\t3\nNANOG\t7\nOCT4\t0\n").unwrap();
        std::fs::write(&b, "gene\ttpm\nSOX2\t5\nNANOG\t9\n").unwrap();

        let table = expression_table(&features(), &[a, b], "tpm").unwrap();
        // GATA1 has no expression
        assert_eq!(table.height(), 2);
        let f = table.column("factor_expression").unwrap().f64().unwrap().get(0).unwrap();
        assert_abs_diff_eq!(f, (4.0f64 + 1e-5).log2(), epsilon = 1e-12);
        let t = table.column("target_expression").unwrap().f64().unwrap().get(1).unwrap();
        assert_abs_diff_eq!(t, (8.0f64 + 1e-5).log2(), epsilon = 1e-12);
        let rank = table.column("factor_expression.rank.scale").unwrap().f64().unwrap();
        assert_eq!(rank.get(0), Some(1.0));
        assert_eq!(rank.get(1), Some(0.0));
    }

    #[test]
    fn factor_expression_levels_and_rank() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.tsv");
        let b = dir.path().join("b.tsv");
        std::fs::write(&a, "target_id\ttpm\nsox2\t10\nOCT4\t0\n").unwrap();
        std::fs::write(&b, "target_id\ttpm\nSOX2\t1000\nNANOG\t5\n").unwrap();

        let factors = vec!["Sox2".to_string(), "OCT4".to_string(), "GATA1".to_string()];
        let table = factor_expression_table(&factors, &[a, b], "tpm").unwrap();
        assert_eq!(
            column_str(&table, "factor").unwrap(),
            vec!["GATA1", "OCT4", "SOX2"]
        );
        let level = table.column("factor_expression").unwrap().f64().unwrap();
        // no rows at all and a TPM of 0 both end up at the floor
        assert_abs_diff_eq!(level.get(0).unwrap(), -10.0, epsilon = 1e-12);
        assert_abs_diff_eq!(level.get(1).unwrap(), -10.0, epsilon = 1e-12);
        // mean of log10(10) and log10(1000)
        assert_abs_diff_eq!(level.get(2).unwrap(), 2.0, epsilon = 1e-12);

        let rank = table.column("factor_expression_rank").unwrap().f64().unwrap();
        assert_eq!(rank.get(0), Some(0.0));
        assert_eq!(rank.get(1), Some(0.0));
        assert_eq!(rank.get(2), Some(1.0));
    }

    #[test]
    fn correlation_and_inner_join() {
        let dir = tempfile::tempdir().unwrap();
        let c = dir.path().join("corr.tsv");
        std::fs::write(&c, "source_target\tcorr\nsox2_nanog\t0.8\nOCT4_NANOG\t-0.2\n").unwrap();
        let corr = correlation_table(&features(), &[c]).unwrap();
        let values = corr.column("corr_file1").unwrap().f64().unwrap();
        assert_eq!(values.get(0), Some(0.8));
        assert_eq!(values.get(1), None);

        let expression = df!("source_target" => ["OCT4_NANOG", "SOX2_NANOG"], "x" => [1.0, 2.0]).unwrap();
        let joined = join_features(features(), &[expression, corr]).unwrap();
        assert_eq!(joined.height(), 2);
        assert_eq!(joined.width(), 6);
        assert_eq!(
            joined.column("source_target").unwrap().str().unwrap().get(0),
            Some("OCT4_NANOG")
        );
    }
}
