//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules:
//! - `config`: pipeline configuration, encodings and filesystem layout.
//! - `runner`: external tool invocation behind the `ToolRunner` capability.
//! - `inference`: ensures inference jobs have run over the dataset grid.
//! - `distances`: GQD (external quartet tool) and normalized RF metrics.
//! - `snapshot`: bipartition snapshots over a shared leaf set.
//! - `bitset`: compact bitset representation for tree partitions.
//! - `evaluate`: dataset discovery and per-dataset distance series.
//! - `report`: summary table, aggregates, histogram/scatter artifacts.

pub mod bitset;
pub mod config;
pub mod distances;
pub mod evaluate;
pub mod inference;
pub mod report;
pub mod runner;
pub mod snapshot;

// Re-export frequently used types & functions
pub use bitset::Bitset;
pub use config::{Encoding, PipelineConfig, best_tree_path};
pub use distances::{QuartetCalc, rf_distance};
pub use evaluate::{DatasetEval, Evaluator, discover_datasets};
pub use inference::InferenceOrchestrator;
pub use runner::{SystemRunner, ToolRunner};
pub use snapshot::TreeSnapshot;
