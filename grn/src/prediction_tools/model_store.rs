use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{GrnError, Result};
use crate::models::{BindingClassifier, ModelSet, ModelStore};
use crate::prediction_tools::logistic::LogisticModel;

/// Models under `<root>/<model_type>/<factor>.json`.
#[derive(Debug, Clone)]
pub struct JsonModelStore {
    root: PathBuf,
}

impl JsonModelStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }
}

impl ModelStore for JsonModelStore {
    fn load(&self, model_type: &str) -> Result<ModelSet> {
        let dir = self.root.join(model_type);
        let mut models = ModelSet::new();
        if !dir.is_dir() {
            warn!("No models found for model type {} in {}", model_type, self.root.display());
            return Ok(models);
        }
        for entry in fs::read_dir(&dir).map_err(|e| GrnError::io(e, &dir))? {
            let path = entry.map_err(|e| GrnError::io(e, &dir))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(factor) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            let model = LogisticModel::from_path(&path)?;
            models.insert(factor, Arc::new(model) as Arc<dyn BindingClassifier>);
        }
        debug!("Read {} models from {}", models.len(), dir.display());
        Ok(models)
    }
}

/// Model sets held in memory, keyed by model type.
#[derive(Debug, Default, Clone)]
pub struct InMemoryModelStore {
    sets: HashMap<String, HashMap<String, Arc<dyn BindingClassifier>>>,
}

impl InMemoryModelStore {
    pub fn insert(&mut self, model_type: &str, factor: &str, model: Arc<dyn BindingClassifier>) {
        self.sets
            .entry(model_type.to_string())
            .or_default()
            .insert(factor.to_string(), model);
    }
}

impl ModelStore for InMemoryModelStore {
    fn load(&self, model_type: &str) -> Result<ModelSet> {
        Ok(self.sets.get(model_type).cloned().unwrap_or_default())
    }
}
