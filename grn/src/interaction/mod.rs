//! Regulatory potential: predicted binding mapped onto genes.

pub mod aggregate;
pub mod intersect;
pub mod network;
pub mod weight;

pub use aggregate::{aggregate_binding, long_range_table, promoter_table, GeneWindows};
pub use intersect::SortedIntersector;
pub use weight::DistanceWeight;
