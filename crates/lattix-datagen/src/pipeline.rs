//! End-to-end dataset generation.
//!
//! Stages run in a fixed order, each wrapping its fatal errors with its
//! name ([`Error::Stage`]):
//!
//! | Stage | Work |
//! |-------|------|
//! | `read` | parse the input file |
//! | `load` | build the graph, dropping data properties unless asked not to |
//! | `filter` | prune infrequent relations, then relations outside the coverage |
//! | `inverses` | detect inverse pairs, removing one of each if configured |
//! | `split` | partition into train / test / validation |
//! | `negatives` | run the negatives plan on the evaluation splits (and train) |
//! | `write` | write splits, negatives and optional summaries |
//!
//! One RNG seeded from the configuration feeds the splitter and the
//! negatives plan, so a seed fully determines the output.
//!
//! With `number_splits = n > 1` the first split is written to the output
//! folder as usual and split `k` (for `1 <= k < n`) to `split_<k>/` inside
//! it, with the same file names.

use crate::config::DatasetConfig;
use crate::filter::{filter, filter_by_coverage};
use crate::formats::{write_entities, write_inverses, write_relations, Gexf};
use crate::inverse::{detect_and_remove, find_inverses, InverseReport};
use crate::negatives::GenerationContext;
use crate::report::Warning;
use crate::sampling::seeded_rng;
use crate::split::{SplitKind, Splits, Splitter};
use crate::{Error, KnowledgeGraph, KnowledgeGraphStats, RelationType, Result, Triple};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Sizes of one output split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub positives: usize,
    pub negatives: usize,
    pub entities: usize,
}

/// What a run did, written to `summary.json` when summaries are enabled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub seed: u64,
    /// Lines parsed from the input file.
    pub input_triples: usize,
    pub duplicate_triples: usize,
    pub data_properties_dropped: usize,
    /// Relations removed for having fewer than `min_num_rel` triples.
    pub filtered_relations: Vec<RelationType>,
    /// Relations removed by the coverage filter.
    pub uncovered_relations: Vec<RelationType>,
    pub inverses: InverseReport,
    /// The graph after filtering and inverse removal.
    pub graph: KnowledgeGraphStats,
    /// Triples left out by graph subsampling.
    pub subsampled_out: usize,
    /// Counts of the first split.
    pub splits: BTreeMap<SplitKind, SplitCounts>,
    /// Counts of the extra rotated splits, `split_1` onwards.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rotations: Vec<BTreeMap<SplitKind, SplitCounts>>,
    /// Generators, in run order.
    pub generators: Vec<String>,
    pub warnings: Vec<Warning>,
}

/// A generated dataset that has not been written yet.
#[derive(Debug)]
pub struct Dataset {
    pub config: DatasetConfig,
    /// The filtered graph the splits were drawn from.
    pub graph: KnowledgeGraph,
    pub splits: Splits,
    /// Extra rotated splits when `number_splits > 1`; entry `k - 1` is
    /// written to `split_<k>/`.
    pub rotations: Vec<Splits>,
    /// Splits that went through negative generation.
    pub negative_splits: Vec<SplitKind>,
    pub summary: RunSummary,
}

/// Run every stage and write the outputs to the configured folder.
pub fn generate_datasets(config: DatasetConfig) -> Result<RunSummary> {
    let dataset = build_dataset(config)?;
    write_dataset(&dataset).map_err(|e| e.in_stage("write"))?;
    Ok(dataset.summary)
}

/// Run every stage except `write`.
pub fn build_dataset(mut config: DatasetConfig) -> Result<Dataset> {
    let mut rng = seeded_rng(config.seed());
    info!(
        input = %config.input_file().display(),
        format = %config.input_format(),
        seed = config.seed(),
        "generating datasets"
    );

    let triples = config
        .input_format()
        .read_path(config.input_file())
        .map_err(|e| e.in_stage("read"))?;
    let input_triples = triples.len();

    let (mut graph, duplicate_triples, data_properties_dropped) =
        load(triples, config.include_data_prop()).map_err(|e| e.in_stage("load"))?;
    info!(
        triples = graph.triple_count(),
        entities = graph.entity_count(),
        relations = graph.relation_type_count(),
        duplicate_triples,
        data_properties_dropped,
        "loaded graph"
    );

    let filtered_relations = filter(&mut graph, config.min_num_rel());
    let uncovered_relations = filter_by_coverage(&mut graph, config.relation_coverage());

    let inverses = if config.remove_inverses() {
        detect_and_remove(&mut graph, config.inverse_threshold())
    } else if config.create_summary() {
        InverseReport {
            pairs: find_inverses(&graph, config.inverse_threshold()),
            removed: Vec::new(),
        }
    } else {
        InverseReport::default()
    };

    let mut folds = Splitter::new(config.split_options().clone())
        .split_folds(&graph, &mut rng)
        .map_err(|e| e.in_stage("split"))?
        .into_iter();
    let Some(first) = folds.next() else {
        return Err(Error::config("number_splits must be at least 1").in_stage("split"));
    };
    let subsampled_out = first.dropped;
    let mut warnings = first.warnings;
    let mut splits = first.splits;
    let mut rotations = Vec::new();
    for fold in folds {
        warnings.extend(fold.warnings);
        rotations.push(fold.splits);
    }

    let mut plan = config.take_negatives();
    let mut negative_splits = Vec::new();
    if !plan.is_empty() {
        let ctx = GenerationContext::new(&graph, &splits).with_separate_types(config.separate_types());
        plan.initialize(&ctx).map_err(|e| e.in_stage("negatives"))?;

        if config.generate_negatives_training() {
            negative_splits.push(SplitKind::Train);
        }
        negative_splits.extend([SplitKind::Test, SplitKind::Validation]);

        for fold in std::iter::once(&mut splits).chain(rotations.iter_mut()) {
            for &kind in &negative_splits {
                let generated = plan
                    .generate(&graph, kind, &fold.get(kind).positives, &mut rng)
                    .map_err(|e| e.in_stage("negatives"))?;
                fold.get_mut(kind).negatives = generated.negatives;
                warnings.extend(generated.warnings);
            }
        }
    }

    let summary = RunSummary {
        seed: config.seed(),
        input_triples,
        duplicate_triples,
        data_properties_dropped,
        filtered_relations,
        uncovered_relations,
        inverses,
        graph: graph.stats(),
        subsampled_out,
        splits: split_counts(&splits),
        rotations: rotations.iter().map(split_counts).collect(),
        generators: plan.names().into_iter().map(String::from).collect(),
        warnings,
    };

    Ok(Dataset {
        config,
        graph,
        splits,
        rotations,
        negative_splits,
        summary,
    })
}

fn split_counts(splits: &Splits) -> BTreeMap<SplitKind, SplitCounts> {
    [SplitKind::Train, SplitKind::Test, SplitKind::Validation]
        .into_iter()
        .map(|kind| {
            let set = splits.get(kind);
            let counts = SplitCounts {
                positives: set.positives.len(),
                negatives: set.negatives.len(),
                entities: set.entities().len(),
            };
            (kind, counts)
        })
        .collect()
}

/// Returns the graph plus the number of duplicate and data-property triples
/// that were left out.
fn load(triples: Vec<Triple>, include_data_prop: bool) -> Result<(KnowledgeGraph, usize, usize)> {
    let mut graph = KnowledgeGraph::new();
    let mut duplicates = 0;
    let mut data_props = 0;
    for triple in triples {
        if !include_data_prop && triple.is_data_property() {
            data_props += 1;
            continue;
        }
        if !graph.add_triple(triple)? {
            duplicates += 1;
        }
    }
    Ok((graph, duplicates, data_props))
}

/// Write every output file of `dataset` into its output folder.
///
/// Triple files use the input format. The folder is created if missing.
pub fn write_dataset(dataset: &Dataset) -> Result<()> {
    let config = &dataset.config;
    let out = config.output_folder();
    fs::create_dir_all(out)?;

    write_splits(dataset, &dataset.splits, out)?;
    for (i, rotation) in dataset.rotations.iter().enumerate() {
        let folder = out.join(format!("split_{}", i + 1));
        fs::create_dir_all(&folder)?;
        write_splits(dataset, rotation, &folder)?;
    }

    if config.create_summary() {
        with_file(&out.join("relations.txt"), |w| write_relations(&dataset.graph, w))?;
        with_file(&out.join("entities.txt"), |w| write_entities(&dataset.graph, w))?;
        with_file(&out.join("inverses.txt"), |w| {
            write_inverses(&dataset.summary.inverses.pairs, w)
        })?;
        with_file(&out.join("summary.json"), |w| {
            serde_json::to_writer_pretty(&mut *w, &dataset.summary)?;
            writeln!(w)?;
            Ok(())
        })?;
    }
    if config.export_gexf() {
        with_file(&out.join("dataset.gexf"), |w| Gexf::write(&dataset.splits, w))?;
    }

    info!(folder = %out.display(), "wrote datasets");
    Ok(())
}

/// Positive and negative triple files of one split, in the input format.
fn write_splits(dataset: &Dataset, splits: &Splits, folder: &Path) -> Result<()> {
    let format = dataset.config.input_format();
    for kind in [SplitKind::Train, SplitKind::Test, SplitKind::Validation] {
        let path = folder.join(format!("{}.txt", kind.file_stem()));
        format.write_path(&splits.get(kind).positives, &path)?;
    }
    for &kind in &dataset.negative_splits {
        let path = folder.join(format!("{}_negatives.txt", kind.file_stem()));
        format.write_path(&splits.get(kind).negatives, &path)?;
    }
    Ok(())
}

fn with_file(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<()>,
) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    write(&mut w)?;
    w.flush().map_err(Error::from)
}
