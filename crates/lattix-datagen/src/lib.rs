#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

//! Evaluation datasets for knowledge graph link prediction.
//!
//! Link-prediction models are scored on held-out triples they never saw
//! during training, against negatives they should rank below the truth.
//! This crate turns a raw triple file into such a dataset:
//!
//! ```text
//! raw triples ─► KnowledgeGraph ─► filter ─► inverses ─► split ─► negatives ─► files
//! ```
//!
//! | Stage | Module | What it guarantees |
//! |-------|--------|--------------------|
//! | Graph model | [`KnowledgeGraph`] | indices always agree with the triple set |
//! | Relation filter | [`filter`] | no relation below `min_num_rel` survives |
//! | Inverse detector | [`inverse`] | no detected inverse pair survives removal |
//! | Splitter | [`split`] | disjoint splits; evaluation entities also appear in train |
//! | Negatives | [`negatives`] | no negative restates a known fact |
//!
//! # Why inverses matter
//!
//! If `parentOf(a, b)` is in test and `childOf(b, a)` is in train, a model
//! can score the test triple by looking up its mirror image. Benchmarks such
//! as FB15k and WN18 were later found to leak this way (Toutanova & Chen,
//! 2015; Dettmers et al., 2018), which is why FB15k-237 and WN18RR exist.
//! [`inverse::detect_and_remove`] drops one relation of every pair whose
//! reversed-pair overlap exceeds a threshold.
//!
//! # Why reachability matters
//!
//! An entity that only appears in test has no learned embedding, so every
//! triple mentioning it is a guess. [`SplitTechnique::Reachability`] skips
//! candidates that would leave an endpoint without a training edge.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use lattix_datagen::{generate_datasets, DatasetConfig};
//!
//! let config = DatasetConfig::builder()
//!     .with_input_file("kg.tsv")
//!     .with_output_folder("out")
//!     .with_min_num_rel(10)
//!     .with_remove_inverses(true)
//!     .with_testing_fraction(0.1)
//!     .with_validation_fraction(0.1)
//!     .with_strategy("change_target", 5)
//!     .build()?;
//!
//! let summary = generate_datasets(config)?;
//! println!("{} test triples", summary.splits[&lattix_datagen::SplitKind::Test].positives);
//! # Ok::<(), lattix_datagen::Error>(())
//! ```
//!
//! # Custom negatives
//!
//! Implement [`negatives::NegativesGenerator`] and add it with
//! [`DatasetConfigBuilder::with_generator`]. The framework calls
//! `initialize` once, then `generate_negatives` per positive, possibly from
//! several threads.

mod entity;
mod error;
mod graph;
mod relation;
mod triple;

pub mod config;
pub mod filter;
pub mod formats;
pub mod inverse;
pub mod negatives;
pub mod pipeline;
pub mod report;
pub mod sampling;
pub mod split;

pub use config::{DatasetConfig, DatasetConfigBuilder};
pub use entity::EntityId;
pub use error::{Error, Result};
pub use formats::InputFormat;
pub use graph::{KnowledgeGraph, KnowledgeGraphStats, TripleId};
pub use inverse::{InversePair, InverseReport};
pub use negatives::{NegativeCount, NegativesGenerator, NegativesPlan};
pub use pipeline::{build_dataset, generate_datasets, write_dataset, Dataset, RunSummary, SplitCounts};
pub use relation::RelationType;
pub use report::Warning;
pub use split::{ColdStartPolicy, SplitKind, SplitOptions, SplitSet, SplitTechnique, Splits, Splitter};
pub use triple::{Triple, DATA_PROPERTY_TAG};

// Re-export petgraph for users who want graph algorithms on `to_petgraph`.
pub use petgraph;
