use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use ndarray::ArrayView1;
use ndarray_stats::QuantileExt;
use polars::prelude::*;
use statrs::statistics::Statistics;

use crate::error::{GrnError, Result};

/// Tab-separated table with a header line; `#` lines are comments.
pub fn read_tsv(file_path: &Path) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .map_parse_options(|opts| opts.with_separator(b'\t').with_comment_prefix(Some("#")))
        .try_into_reader_with_file_path(Some(PathBuf::from(file_path)))?
        .finish()
}

pub fn write_tsv(df: &mut DataFrame, path: &Path) -> PolarsResult<()> {
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b'\t')
        .finish(df)
}

/// Buffered reader that transparently decompresses `.gz` files.
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| GrnError::io(e, path))?;
    let is_gz = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case("gz"));
    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// `key <tab> value` table with a header line, e.g. the reference coverage or
/// normalization targets. Non-numeric values are an error.
pub fn read_keyed_values(path: &Path) -> Result<Vec<(String, f64)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .has_headers(true)
        .flexible(true)
        .from_reader(open_text(path)?);

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| GrnError::csv(e, path))?;
        let key = record.get(0).unwrap_or_default().to_string();
        let raw = record.get(1).unwrap_or_default();
        let value = raw.trim().parse::<f64>().map_err(|_| {
            GrnError::InvalidInput(format!("{}: '{}' is not a number", path.display(), raw))
        })?;
        rows.push((key, value));
    }
    Ok(rows)
}

/// Nullable f64 values of `name`, casting integer or f32 columns.
pub fn column_f64(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let col = df.column(name)?.cast(&DataType::Float64)?;
    Ok(col.f64()?.into_iter().collect())
}

pub fn column_str(df: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    Ok(df
        .column(name)?
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_string())
        .collect())
}

/// Standard score with the population standard deviation; constant input maps to 0.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let mean = values.iter().mean();
    let std = values.iter().population_std_dev();
    if !std.is_finite() || std < 1e-12 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - mean) / std).collect()
}

/// Rescale to [0, 1]; constant input maps to 0.
pub fn minmax_scale(values: &[f64]) -> Vec<f64> {
    let view = ArrayView1::from(values);
    let (min, max) = (*view.min_skipnan(), *view.max_skipnan());
    let range = max - min;
    if !range.is_finite() || range <= 0.0 {
        return vec![0.0; values.len()];
    }
    values.iter().map(|v| (v - min) / range).collect()
}

/// 1-based ranks, ties get the average of the ranks they span.
pub fn rank_average(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // positions i..=j share the average of ranks i+1..=j+1
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}
