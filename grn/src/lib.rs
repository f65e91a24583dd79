//! Transcription factor binding prediction and regulatory-potential features
//! for gene regulatory network inference.

pub mod activity;
pub mod binding_store;
pub mod config;
pub mod data_handling;
pub mod error;
pub mod features;
pub mod helper_functions;
pub mod interaction;
pub mod models;
pub mod motif_graph;
pub mod pipeline;
pub mod prediction_tools;
pub mod predictor;
pub mod species;

pub use error::{GrnError, Result};
