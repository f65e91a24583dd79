//! Keyed tables written by the binding step.
//!
//! ```text
//! _index.tsv            region order of the session
//! _atac.tsv, _h3k27ac.tsv   signal used for prediction
//! _factor_activity.tsv  factor, activity
//! <factor>.tsv          region, binding
//! binding.tsv           factor, enhancer, binding (all factors, long format)
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use polars::prelude::*;
use tracing::info;

use crate::error::{GrnError, Result};
use crate::helper_functions::{read_tsv, write_tsv};
use crate::models::Region;
use crate::predictor::BindingPrediction;

pub const INDEX_KEY: &str = "_index";
pub const ACTIVITY_KEY: &str = "_factor_activity";
pub const LONG_TABLE: &str = "binding.tsv";

#[derive(Debug, Default, Clone)]
pub struct BindingStore {
    tables: BTreeMap<String, DataFrame>,
}

impl BindingStore {
    pub fn put(&mut self, key: &str, df: DataFrame) {
        self.tables.insert(key.to_string(), df);
    }

    pub fn get(&self, key: &str) -> Option<&DataFrame> {
        self.tables.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Keys holding binding predictions; auxiliary tables start with `_`.
    pub fn factors(&self) -> Vec<&str> {
        self.keys().filter(|k| !k.starts_with('_')).collect()
    }

    pub fn put_index(&mut self, regions: &[Region]) -> Result<()> {
        let names: Vec<String> = regions.iter().map(|r| r.to_string()).collect();
        self.put(INDEX_KEY, df!("region" => names)?);
        Ok(())
    }

    pub fn put_activity(&mut self, activity: &[(String, f64)]) -> Result<()> {
        let factors: Vec<&str> = activity.iter().map(|(f, _)| f.as_str()).collect();
        let values: Vec<f64> = activity.iter().map(|(_, a)| *a).collect();
        self.put(ACTIVITY_KEY, df!("factor" => factors, "activity" => values)?);
        Ok(())
    }

    /// Stores the probabilities of one factor at reduced precision.
    pub fn put_prediction(&mut self, pred: &BindingPrediction, regions: &[Region]) -> Result<()> {
        let names = pred
            .rows
            .iter()
            .map(|&i| {
                regions.get(i).map(|r| r.to_string()).ok_or_else(|| {
                    GrnError::InvalidInput(format!("{}: row {} outside the regions", pred.factor, i))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let binding: Vec<f32> = pred.proba.iter().map(|&p| p as f32).collect();
        self.put(&pred.factor, df!("region" => names, "binding" => binding)?);
        Ok(())
    }

    /// All factor tables stacked as `factor, enhancer, binding`.
    pub fn to_long(&self) -> Result<DataFrame> {
        let mut factors: Vec<String> = Vec::new();
        let mut enhancers: Vec<String> = Vec::new();
        let mut binding: Vec<f64> = Vec::new();
        for factor in self.factors() {
            let Some(df) = self.tables.get(factor) else {
                continue;
            };
            let regions = df.column("region")?.str()?;
            let values = df.column("binding")?.cast(&DataType::Float64)?;
            for (region, value) in regions.into_iter().zip(values.f64()?.into_iter()) {
                if let (Some(region), Some(value)) = (region, value) {
                    factors.push(factor.to_string());
                    enhancers.push(region.to_string());
                    binding.push(value);
                }
            }
        }
        Ok(df!("factor" => factors, "enhancer" => enhancers, "binding" => binding)?)
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|e| GrnError::io(e, dir))?;
        for (key, df) in &self.tables {
            let mut df = df.clone();
            write_tsv(&mut df, &dir.join(format!("{key}.tsv")))?;
        }
        let mut long = self.to_long()?;
        write_tsv(&mut long, &dir.join(LONG_TABLE))?;
        info!("Wrote {} tables to {}", self.tables.len(), dir.display());
        Ok(())
    }

    /// The long binding table of a binding output directory.
    pub fn read_long(dir: &Path) -> Result<DataFrame> {
        let path = dir.join(LONG_TABLE);
        if !path.exists() {
            return Err(GrnError::MissingData(format!(
                "{} not found; run the binding step first",
                path.display()
            )));
        }
        let df = read_tsv(&path)?;
        Ok(df
            .lazy()
            .select([
                col("factor").cast(DataType::String),
                col("enhancer").cast(DataType::String),
                col("binding").cast(DataType::Float64),
            ])
            .collect()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::ModelChoice;

    fn regions() -> Vec<Region> {
        vec![Region::new("chr1", 0, 100), Region::new("chr1", 200, 300)]
    }

    fn prediction(factor: &str, rows: Vec<usize>, proba: Vec<f64>) -> BindingPrediction {
        BindingPrediction {
            factor: factor.to_string(),
            choice: ModelChoice::General,
            rows,
            proba,
        }
    }

    #[test]
    fn long_table_stacks_factors() {
        let mut store = BindingStore::default();
        store.put_index(&regions()).unwrap();
        store.put_prediction(&prediction("SOX2", vec![0, 1], vec![0.25, 0.5]), &regions()).unwrap();
        store.put_prediction(&prediction("OCT4", vec![1], vec![0.75]), &regions()).unwrap();
        assert!(store
            .put_prediction(&prediction("BAD", vec![5], vec![0.1]), &regions())
            .is_err());

        assert_eq!(store.factors(), vec!["OCT4", "SOX2"]);
        let long = store.to_long().unwrap();
        assert_eq!(long.height(), 3);
        let enhancer = long.column("enhancer").unwrap().str().unwrap().get(0);
        assert_eq!(enhancer, Some("chr1:200-300"));
        assert_eq!(long.column("binding").unwrap().f64().unwrap().get(0), Some(0.75));
    }

    #[test]
    fn written_store_reads_back_long() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BindingStore::default();
        store.put_index(&regions()).unwrap();
        store.put_activity(&[("SOX2".to_string(), 0.4)]).unwrap();
        store.put_prediction(&prediction("SOX2", vec![0, 1], vec![0.25, 0.5]), &regions()).unwrap();
        store.write(dir.path()).unwrap();

        for table in ["SOX2.tsv", "_factor_activity.tsv", "_index.tsv", LONG_TABLE] {
            assert!(dir.path().join(table).exists(), "{table} missing");
        }

        let long = BindingStore::read_long(dir.path()).unwrap();
        assert_eq!(long.height(), 2);
        assert_eq!(long.column("binding").unwrap().f64().unwrap().get(1), Some(0.5));
    }
}
