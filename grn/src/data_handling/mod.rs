pub mod annotation;
pub mod bedgraph;
pub mod genome;
pub mod motif2factors;
pub mod prescanned;
pub mod reference;
pub mod regions;
