//! datagen - build link-prediction datasets from a triple file.
//!
//! # Usage
//!
//! ```bash
//! # 10% test, 5 target corruptions per test triple
//! datagen --inF kg.tsv --outF out --testFraction 0.1 --change_target 5
//!
//! # Drop sparse and inverse relations, add validation, write summaries
//! datagen --inF kg.nt --format ntriples --outF out --minNumRel 50 --removeInv \
//!     --validationFraction 0.1 --change_source_random 2 --createSummary
//!
//! # Five rotated splits, 1.5 negatives per positive on average
//! datagen --inF kg.tsv --outF out --numberSplits 5 --change_target 1.5
//!
//! # Start from a JSON config and override the seed
//! datagen --config run.json --seed 7
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use lattix_datagen::{
    generate_datasets, ColdStartPolicy, DatasetConfigBuilder, InputFormat, RunSummary,
    SplitKind, SplitTechnique,
};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "datagen")]
#[command(about = "Generate link-prediction datasets from a knowledge graph", long_about = None)]
struct Cli {
    /// Input triple file
    #[arg(long = "inF")]
    input: Option<PathBuf>,

    /// Input format: tsv, csv or ntriples
    #[arg(long)]
    format: Option<InputFormat>,

    /// Output folder
    #[arg(long = "outF")]
    output: Option<PathBuf>,

    /// JSON config file; flags given on the command line override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Minimum number of triples a relation needs to be kept
    #[arg(long = "minNumRel")]
    min_num_rel: Option<usize>,

    /// Share of all triples the kept relations must cover
    #[arg(long = "relCoverage")]
    relation_coverage: Option<f64>,

    /// Remove one relation of each detected inverse pair
    #[arg(long = "removeInv")]
    remove_inverses: bool,

    /// Overlap score at which two relations count as inverses
    #[arg(long = "inverseThreshold")]
    inverse_threshold: Option<f64>,

    /// Fraction of the graph kept before splitting
    #[arg(long = "graphFraction")]
    graph_fraction: Option<f64>,

    /// Largest share of an entity's edges that may leave train
    #[arg(long = "reachFraction")]
    reach_fraction: Option<f64>,

    /// Fraction of each relation placed in test
    #[arg(long = "testFraction")]
    test_fraction: Option<f64>,

    /// Fraction of each relation placed in validation
    #[arg(long = "validationFraction")]
    validation_fraction: Option<f64>,

    /// Splitting technique: random or reachability
    #[arg(long)]
    technique: Option<SplitTechnique>,

    /// Number of rotated train/test splits; extra ones go to split_<k>/
    #[arg(long = "numberSplits")]
    number_splits: Option<usize>,

    /// Keep entities that appear only in test or validation
    #[arg(long = "allowColdStart")]
    allow_cold_start: bool,

    /// Also generate negatives for the training split
    #[arg(long = "negTrain")]
    negatives_training: bool,

    /// Keep triples whose target is a literal
    #[arg(long = "includeDataProp")]
    include_data_prop: bool,

    /// Only replace entities with entities of the same type
    #[arg(long = "separateTypes")]
    separate_types: bool,

    /// Draw domain/range replacements uniformly instead of by frequency
    #[arg(long = "equalProbabilities")]
    equal_probabilities: bool,

    /// Skip the rest of a relation once one of its positives gets no negatives
    #[arg(long = "rejectRelAfterFailure")]
    reject_rel_after_failure: bool,

    /// Write dataset.gexf
    #[arg(long = "exportGexf")]
    export_gexf: bool,

    /// Write relations.txt, entities.txt, inverses.txt and summary.json
    #[arg(long = "createSummary")]
    create_summary: bool,

    /// Negatives per positive by replacing the source within the relation's domain
    #[arg(long = "change_source", value_name = "N")]
    change_source: Option<f64>,

    /// Negatives per positive by replacing the target within the relation's range
    #[arg(long = "change_target", value_name = "N")]
    change_target: Option<f64>,

    /// Negatives per positive by replacing both ends within domain and range
    #[arg(long = "change_both", value_name = "N")]
    change_both: Option<f64>,

    /// Negatives per positive by replacing the source with any entity
    #[arg(long = "change_source_random", value_name = "N")]
    change_source_random: Option<f64>,

    /// Negatives per positive by replacing the target with any entity
    #[arg(long = "change_target_random", value_name = "N")]
    change_target_random: Option<f64>,

    /// Negatives per positive by replacing both ends with any entities
    #[arg(long = "change_both_random", value_name = "N")]
    change_both_random: Option<f64>,

    /// Log progress to stderr (RUST_LOG takes precedence)
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Print nothing but errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn builder(&self) -> Result<DatasetConfigBuilder> {
        let mut b = match &self.config {
            Some(path) => DatasetConfigBuilder::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => DatasetConfigBuilder::new(),
        };

        if let Some(input) = &self.input {
            b = b.with_input_file(input);
        }
        if let Some(output) = &self.output {
            b = b.with_output_folder(output);
        }
        if let Some(format) = self.format {
            b = b.with_input_format(format);
        }
        if let Some(seed) = self.seed {
            b = b.with_seed(seed);
        }
        if let Some(n) = self.min_num_rel {
            b = b.with_min_num_rel(n);
        }
        if let Some(c) = self.relation_coverage {
            b = b.with_relation_coverage(c);
        }
        if let Some(t) = self.inverse_threshold {
            b = b.with_inverse_threshold(t);
        }
        if let Some(f) = self.graph_fraction {
            b = b.with_graph_fraction(f);
        }
        if let Some(f) = self.reach_fraction {
            b = b.with_reach_fraction(f);
        }
        if let Some(f) = self.test_fraction {
            b = b.with_testing_fraction(f);
        }
        if let Some(f) = self.validation_fraction {
            b = b.with_validation_fraction(f);
        }
        if let Some(t) = self.technique {
            b = b.with_splitting_technique(t);
        }
        if let Some(n) = self.number_splits {
            b = b.with_number_splits(n);
        }

        // Boolean flags can only switch a setting on.
        if self.remove_inverses {
            b = b.with_remove_inverses(true);
        }
        if self.allow_cold_start {
            b = b.with_cold_start(ColdStartPolicy::Allow);
        }
        if self.negatives_training {
            b = b.with_generate_negatives_training(true);
        }
        if self.include_data_prop {
            b = b.with_include_data_prop(true);
        }
        if self.separate_types {
            b = b.with_separate_types(true);
        }
        if self.equal_probabilities {
            b = b.with_equal_probabilities(true);
        }
        if self.reject_rel_after_failure {
            b = b.with_reject_rel_after_failure(true);
        }
        if self.export_gexf {
            b = b.with_export_gexf(true);
        }
        if self.create_summary {
            b = b.with_create_summary(true);
        }

        for (name, count) in [
            ("change_source", self.change_source),
            ("change_target", self.change_target),
            ("change_both", self.change_both),
            ("change_source_random", self.change_source_random),
            ("change_target_random", self.change_target_random),
            ("change_both_random", self.change_both_random),
        ] {
            if let Some(n) = count {
                b = b.with_strategy(name, n);
            }
        }
        Ok(b)
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let filter = if quiet {
        tracing_subscriber::EnvFilter::new("off")
    } else if verbose {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    } else {
        tracing_subscriber::EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn print_summary(summary: &RunSummary) {
    println!("Input triples:  {}", summary.input_triples);
    println!("Entities:       {}", summary.graph.entity_count);
    println!("Relations:      {}", summary.graph.relation_type_count);
    println!("Triples:        {}", summary.graph.triple_count);
    if !summary.inverses.removed.is_empty() {
        let removed: Vec<&str> = summary.inverses.removed.iter().map(|r| r.as_str()).collect();
        println!("Inverses:       {} removed ({})", removed.len(), removed.join(", "));
    }
    for kind in [SplitKind::Train, SplitKind::Test, SplitKind::Validation] {
        if let Some(c) = summary.splits.get(&kind) {
            println!(
                "{:<15} {} positives, {} negatives",
                format!("{}:", kind.file_stem()),
                c.positives,
                c.negatives
            );
        }
    }
    if !summary.rotations.is_empty() {
        println!("Extra splits:   {}", summary.rotations.len());
    }
    if !summary.warnings.is_empty() {
        println!("Warnings:       {}", summary.warnings.len());
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);
    debug!(?cli, "parsed arguments");

    let config = cli
        .builder()?
        .build()
        .context("Invalid configuration")?;
    let out = config.output_folder().to_path_buf();

    let start = Instant::now();
    let pb = spinner(cli.quiet);
    pb.set_message(format!("Generating datasets from {}", config.input_file().display()));

    let result = generate_datasets(config);
    pb.finish_and_clear();
    let summary = result.with_context(|| format!("Failed to generate datasets into {}", out.display()))?;

    if !cli.quiet {
        print_summary(&summary);
        println!("Wrote {} in {:.2?}", out.display(), start.elapsed());
    }
    Ok(())
}
