//! Run configuration.
//!
//! [`DatasetConfig`] is immutable once built. All validation happens in
//! [`DatasetConfigBuilder::build`], so a pipeline run never starts with
//! contradictory settings.
//!
//! The builder also deserializes from JSON, with every field optional:
//!
//! ```rust
//! use lattix_datagen::DatasetConfigBuilder;
//!
//! let config = DatasetConfigBuilder::from_json(r#"{
//!     "input_file": "kg.tsv",
//!     "output_folder": "out",
//!     "testing_fraction": 0.1,
//!     "strategies": [{ "name": "change_target_random", "count": 1.5 }]
//! }"#)
//! .unwrap()
//! .build()
//! .unwrap();
//!
//! assert_eq!(config.testing_fraction(), 0.1);
//! assert_eq!(config.negatives().names(), vec!["change_target_random"]);
//! ```

use crate::formats::InputFormat;
use crate::negatives::{NegativeCount, NegativesGenerator, NegativesPlan, RandomCorruption, StrategySpec};
use crate::split::{ColdStartPolicy, SplitOptions, SplitTechnique};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Validated settings for one pipeline run.
#[derive(Debug)]
pub struct DatasetConfig {
    input_file: PathBuf,
    input_format: InputFormat,
    output_folder: PathBuf,
    seed: u64,
    min_num_rel: usize,
    relation_coverage: f64,
    remove_inverses: bool,
    inverse_threshold: f64,
    generate_negatives_training: bool,
    split: SplitOptions,
    pvalue_threshold: Option<f64>,
    export_gexf: bool,
    create_summary: bool,
    include_data_prop: bool,
    separate_types: bool,
    equal_probabilities: bool,
    negatives: NegativesPlan,
}

impl DatasetConfig {
    pub fn builder() -> DatasetConfigBuilder {
        DatasetConfigBuilder::default()
    }

    pub fn input_file(&self) -> &Path {
        &self.input_file
    }

    pub fn input_format(&self) -> InputFormat {
        self.input_format
    }

    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Relations with fewer triples are dropped.
    pub fn min_num_rel(&self) -> usize {
        self.min_num_rel
    }

    /// Share of all triples the kept relations must cover.
    pub fn relation_coverage(&self) -> f64 {
        self.relation_coverage
    }

    pub fn remove_inverses(&self) -> bool {
        self.remove_inverses
    }

    pub fn inverse_threshold(&self) -> f64 {
        self.inverse_threshold
    }

    pub fn generate_negatives_training(&self) -> bool {
        self.generate_negatives_training
    }

    pub fn graph_fraction(&self) -> f64 {
        self.split.graph_fraction
    }

    pub fn reach_fraction(&self) -> f64 {
        self.split.reach_fraction
    }

    pub fn testing_fraction(&self) -> f64 {
        self.split.test_fraction
    }

    pub fn validation_fraction(&self) -> f64 {
        self.split.validation_fraction
    }

    pub fn splitting_technique(&self) -> SplitTechnique {
        self.split.technique
    }

    pub fn cold_start(&self) -> ColdStartPolicy {
        self.split.cold_start
    }

    pub fn max_split_retries(&self) -> usize {
        self.split.max_retries
    }

    /// Rotated train/test splits to produce.
    pub fn number_splits(&self) -> usize {
        self.split.number_splits
    }

    /// Splitter settings derived from this configuration.
    pub fn split_options(&self) -> &SplitOptions {
        &self.split
    }

    pub fn pvalue_threshold(&self) -> Option<f64> {
        self.pvalue_threshold
    }

    pub fn export_gexf(&self) -> bool {
        self.export_gexf
    }

    pub fn create_summary(&self) -> bool {
        self.create_summary
    }

    pub fn include_data_prop(&self) -> bool {
        self.include_data_prop
    }

    pub fn separate_types(&self) -> bool {
        self.separate_types
    }

    /// Whether named domain/range strategies ignore entity frequency.
    pub fn equal_probabilities(&self) -> bool {
        self.equal_probabilities
    }

    pub fn reject_rel_after_failure(&self) -> bool {
        self.negatives.rejects_relation_after_failure()
    }

    pub fn negatives(&self) -> &NegativesPlan {
        &self.negatives
    }

    pub(crate) fn take_negatives(&mut self) -> NegativesPlan {
        std::mem::take(&mut self.negatives)
    }
}

/// Builder for [`DatasetConfig`].
#[derive(Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfigBuilder {
    input_file: PathBuf,
    input_format: InputFormat,
    output_folder: PathBuf,
    seed: u64,
    min_num_rel: usize,
    relation_coverage: f64,
    remove_inverses: bool,
    inverse_threshold: f64,
    graph_fraction: f64,
    generate_negatives_training: bool,
    reach_fraction: f64,
    testing_fraction: f64,
    validation_fraction: f64,
    splitting_technique: SplitTechnique,
    cold_start: ColdStartPolicy,
    max_split_retries: usize,
    number_splits: usize,
    pvalue_threshold: Option<f64>,
    export_gexf: bool,
    create_summary: bool,
    include_data_prop: bool,
    separate_types: bool,
    /// Draw domain/range replacements uniformly instead of by frequency.
    equal_probabilities: bool,
    reject_rel_after_failure: bool,
    /// Named built-in strategies, run after any generator added in code.
    strategies: Vec<StrategySpec>,
    #[serde(skip)]
    negatives: NegativesPlan,
}

impl Default for DatasetConfigBuilder {
    fn default() -> Self {
        let split = SplitOptions::default();
        Self {
            input_file: PathBuf::new(),
            input_format: InputFormat::default(),
            output_folder: PathBuf::new(),
            seed: 0,
            min_num_rel: 0,
            relation_coverage: 1.0,
            remove_inverses: false,
            inverse_threshold: 0.9,
            graph_fraction: split.graph_fraction,
            generate_negatives_training: false,
            reach_fraction: split.reach_fraction,
            testing_fraction: split.test_fraction,
            validation_fraction: split.validation_fraction,
            splitting_technique: split.technique,
            cold_start: split.cold_start,
            max_split_retries: split.max_retries,
            number_splits: split.number_splits,
            pvalue_threshold: None,
            export_gexf: false,
            create_summary: false,
            include_data_prop: false,
            separate_types: false,
            equal_probabilities: false,
            reject_rel_after_failure: false,
            strategies: Vec::new(),
            negatives: NegativesPlan::new(),
        }
    }
}

macro_rules! setter {
    ($(#[$doc:meta])* $name:ident, $field:ident: $ty:ty) => {
        $(#[$doc])*
        pub fn $name(mut self, $field: $ty) -> Self {
            self.$field = $field;
            self
        }
    };
}

impl DatasetConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON config file body.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn with_input_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_file = path.into();
        self
    }

    pub fn with_output_folder(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_folder = path.into();
        self
    }

    setter!(with_input_format, input_format: InputFormat);
    setter!(with_seed, seed: u64);
    setter!(with_min_num_rel, min_num_rel: usize);
    setter!(with_relation_coverage, relation_coverage: f64);
    setter!(with_remove_inverses, remove_inverses: bool);
    setter!(with_inverse_threshold, inverse_threshold: f64);
    setter!(with_graph_fraction, graph_fraction: f64);
    setter!(with_generate_negatives_training, generate_negatives_training: bool);
    setter!(with_reach_fraction, reach_fraction: f64);
    setter!(with_testing_fraction, testing_fraction: f64);
    setter!(with_validation_fraction, validation_fraction: f64);
    setter!(with_splitting_technique, splitting_technique: SplitTechnique);
    setter!(with_cold_start, cold_start: ColdStartPolicy);
    setter!(with_max_split_retries, max_split_retries: usize);
    setter!(
        /// Produce this many rotated splits; the extra ones are written to
        /// `split_<k>` subfolders.
        with_number_splits, number_splits: usize
    );
    setter!(with_export_gexf, export_gexf: bool);
    setter!(with_create_summary, create_summary: bool);
    setter!(with_include_data_prop, include_data_prop: bool);
    setter!(with_separate_types, separate_types: bool);
    setter!(with_equal_probabilities, equal_probabilities: bool);
    setter!(
        /// Skip the rest of a relation once a positive gets no negatives.
        with_reject_rel_after_failure, reject_rel_after_failure: bool
    );

    pub fn with_pvalue_threshold(mut self, threshold: f64) -> Self {
        self.pvalue_threshold = Some(threshold);
        self
    }

    /// Add a generator instance. Generators run in the order added.
    pub fn with_generator(
        mut self,
        generator: impl NegativesGenerator + 'static,
        count: impl Into<NegativeCount>,
    ) -> Self {
        self.negatives.push(generator, count);
        self
    }

    /// Add a built-in strategy by name, e.g. `change_target_random`.
    ///
    /// `count` may be fractional; see [`NegativeCount`].
    pub fn with_strategy(mut self, name: impl Into<String>, count: impl Into<f64>) -> Self {
        self.strategies.push(StrategySpec::new(name, count));
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<DatasetConfig> {
        if self.input_file.as_os_str().is_empty() {
            return Err(Error::config("input_file must be set"));
        }
        if self.output_folder.as_os_str().is_empty() {
            return Err(Error::config("output_folder must be set"));
        }
        unit_interval("graph_fraction", self.graph_fraction)?;
        unit_interval("reach_fraction", self.reach_fraction)?;
        unit_interval("relation_coverage", self.relation_coverage)?;

        let (test, valid) = (self.testing_fraction, self.validation_fraction);
        if !(test >= 0.0 && valid >= 0.0) {
            return Err(Error::config(format!(
                "testing_fraction ({test}) and validation_fraction ({valid}) must be non-negative"
            )));
        }
        if test + valid >= 1.0 {
            return Err(Error::config(format!(
                "testing_fraction + validation_fraction must be below 1, got {}",
                test + valid
            )));
        }
        if !(0.0..=1.0).contains(&self.inverse_threshold) {
            return Err(Error::config(format!(
                "inverse_threshold must be in [0, 1], got {}",
                self.inverse_threshold
            )));
        }
        if let Some(p) = self.pvalue_threshold {
            if !(p > 0.0 && p < 1.0) {
                return Err(Error::config(format!(
                    "pvalue_threshold must be in (0, 1), got {p}"
                )));
            }
        }
        if self.max_split_retries == 0 {
            return Err(Error::config("max_split_retries must be at least 1"));
        }
        if self.number_splits == 0 {
            return Err(Error::config("number_splits must be at least 1"));
        }

        let mut negatives = self.negatives;
        for spec in &self.strategies {
            let generator: RandomCorruption = spec.name.parse()?;
            let count = NegativeCount::new(spec.count);
            if !count.is_valid() {
                return Err(Error::config(format!(
                    "strategy {} needs a finite, non-negative count, got {}",
                    spec.name, spec.count
                )));
            }
            negatives.push(generator.with_equal_probabilities(self.equal_probabilities), count);
        }
        negatives.set_reject_relation_after_failure(self.reject_rel_after_failure);

        Ok(DatasetConfig {
            input_file: self.input_file,
            input_format: self.input_format,
            output_folder: self.output_folder,
            seed: self.seed,
            min_num_rel: self.min_num_rel,
            relation_coverage: self.relation_coverage,
            remove_inverses: self.remove_inverses,
            inverse_threshold: self.inverse_threshold,
            generate_negatives_training: self.generate_negatives_training,
            split: SplitOptions {
                test_fraction: test,
                validation_fraction: valid,
                graph_fraction: self.graph_fraction,
                reach_fraction: self.reach_fraction,
                technique: self.splitting_technique,
                max_retries: self.max_split_retries,
                cold_start: self.cold_start,
                number_splits: self.number_splits,
            },
            pvalue_threshold: self.pvalue_threshold,
            export_gexf: self.export_gexf,
            create_summary: self.create_summary,
            include_data_prop: self.include_data_prop,
            separate_types: self.separate_types,
            equal_probabilities: self.equal_probabilities,
            negatives,
        })
    }
}

/// `value` must lie in (0, 1].
fn unit_interval(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(Error::config(format!("{name} must be in (0, 1], got {value}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> DatasetConfigBuilder {
        DatasetConfigBuilder::new()
            .with_input_file("in.tsv")
            .with_output_folder("out")
    }

    fn config_err(b: DatasetConfigBuilder) -> String {
        match b.build() {
            Err(Error::Config(msg)) => msg,
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_build() {
        let c = base().build().unwrap();
        assert_eq!(c.testing_fraction(), 0.2);
        assert_eq!(c.validation_fraction(), 0.0);
        assert_eq!(c.splitting_technique(), SplitTechnique::Reachability);
        assert_eq!(c.cold_start(), ColdStartPolicy::Forbid);
        assert!(c.negatives().is_empty());
    }

    #[test]
    fn test_fractions_must_leave_room_for_train() {
        let msg = config_err(base().with_testing_fraction(0.6).with_validation_fraction(0.5));
        assert!(msg.contains("below 1"));
        config_err(base().with_testing_fraction(-0.1));
    }

    #[test]
    fn test_interval_checks() {
        config_err(base().with_graph_fraction(0.0));
        config_err(base().with_graph_fraction(1.5));
        config_err(base().with_reach_fraction(0.0));
        config_err(base().with_relation_coverage(0.0));
        config_err(base().with_inverse_threshold(1.1));
        config_err(base().with_pvalue_threshold(1.0));
        config_err(base().with_max_split_retries(0));
        config_err(DatasetConfigBuilder::new().with_output_folder("out"));
        base().with_graph_fraction(1.0).build().unwrap();
    }

    #[test]
    fn test_nan_rejected() {
        config_err(base().with_testing_fraction(f64::NAN));
        config_err(base().with_reach_fraction(f64::NAN));
    }

    #[test]
    fn test_unknown_strategy() {
        let err = base().with_strategy("change_everything", 1).build().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_json_config() {
        let builder = DatasetConfigBuilder::from_json(
            r#"{
                "input_file": "kg.nt",
                "input_format": "ntriples",
                "output_folder": "out",
                "splitting_technique": "random",
                "cold_start": "allow",
                "strategies": [
                    { "name": "change_source", "count": 1 },
                    { "name": "change_target_random", "count": 3 }
                ]
            }"#,
        )
        .unwrap();
        let c = builder.build().unwrap();
        assert_eq!(c.input_format(), InputFormat::NTriples);
        assert_eq!(c.splitting_technique(), SplitTechnique::Random);
        assert_eq!(c.cold_start(), ColdStartPolicy::Allow);
        assert_eq!(
            c.negatives().names(),
            vec!["change_source", "change_target_random"]
        );
    }

    #[test]
    fn test_strategy_counts() {
        let c = base()
            .with_strategy("change_target", 0.5)
            .with_equal_probabilities(true)
            .with_reject_rel_after_failure(true)
            .build()
            .unwrap();
        assert!(c.equal_probabilities());
        assert!(c.reject_rel_after_failure());
        assert_eq!(c.negatives().names(), vec!["change_target"]);

        config_err(base().with_strategy("change_target", -1.0));
        config_err(base().with_strategy("change_target", f64::NAN));
    }

    #[test]
    fn test_number_splits() {
        assert_eq!(base().build().unwrap().number_splits(), 1);
        let c = DatasetConfigBuilder::from_json(
            r#"{ "input_file": "in.tsv", "output_folder": "out", "number_splits": 4 }"#,
        )
        .unwrap()
        .build()
        .unwrap();
        assert_eq!(c.number_splits(), 4);
        assert_eq!(c.split_options().number_splits, 4);
        let msg = config_err(base().with_number_splits(0));
        assert!(msg.contains("number_splits"));
    }

    #[test]
    fn test_json_rejects_unknown_fields() {
        assert!(DatasetConfigBuilder::from_json(r#"{ "tesing_fraction": 0.1 }"#).is_err());
    }
}
