//! Trained binding classifiers and where they are read from.

pub mod logistic;
pub mod model_store;

pub use logistic::LogisticModel;
pub use model_store::{InMemoryModelStore, JsonModelStore};
