//! End-to-end runs of the dataset pipeline.

use lattix_datagen::negatives::GenerationContext;
use lattix_datagen::sampling::DatasetRng;
use lattix_datagen::{
    build_dataset, generate_datasets, write_dataset, ColdStartPolicy, DatasetConfig,
    DatasetConfigBuilder, Error, InputFormat, NegativeCount, NegativesGenerator, RelationType,
    Result, SplitKind, SplitTechnique, Triple, Warning,
};
use std::fs;
use std::path::PathBuf;

fn get_test_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from("target/tmp/tests/pipeline").join(name);
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_tsv(dir: &PathBuf, triples: &[Triple]) -> PathBuf {
    let path = dir.join("input.tsv");
    let mut out = Vec::new();
    InputFormat::Tsv.write(triples, &mut out).unwrap();
    fs::write(&path, out).unwrap();
    path
}

fn builder(dir: &PathBuf, triples: &[Triple]) -> DatasetConfigBuilder {
    DatasetConfig::builder()
        .with_input_file(write_tsv(dir, triples))
        .with_output_folder(dir.join("out"))
}

/// Two relations over a ring of `n` entities.
fn ring(n: usize) -> Vec<Triple> {
    (0..n)
        .flat_map(|i| {
            [
                Triple::new("knows", format!("e{i}"), format!("e{}", (i + 1) % n)),
                Triple::new("likes", format!("e{i}"), format!("e{}", (i + 2) % n)),
            ]
        })
        .collect()
}

#[test]
fn test_sparse_relation_removed() {
    let dir = get_test_dir("sparse");
    let mut triples = Vec::new();
    for (k, count) in [40, 30, 15, 10, 5].into_iter().enumerate() {
        for i in 0..count {
            triples.push(Triple::new(format!("r{k}"), format!("s{k}_{i}"), format!("t{}", i % 7)));
        }
    }
    assert_eq!(triples.len(), 100);

    let config = builder(&dir, &triples)
        .with_min_num_rel(10)
        .with_splitting_technique(SplitTechnique::Random)
        .with_cold_start(ColdStartPolicy::Allow)
        .build()
        .unwrap();
    let dataset = build_dataset(config).unwrap();

    assert_eq!(dataset.summary.filtered_relations, vec![RelationType::from("r4")]);
    assert_eq!(dataset.summary.graph.triple_count, 95);
    assert_eq!(dataset.summary.graph.relation_type_count, 4);
    assert_eq!(dataset.splits.positive_count(), 95);
    assert!(dataset
        .splits
        .train
        .positives
        .iter()
        .chain(&dataset.splits.test.positives)
        .all(|t| t.relation.as_str() != "r4"));
}

#[test]
fn test_inverse_relation_removed() {
    let dir = get_test_dir("inverse");
    let mut triples = ring(10);
    for i in 0..10 {
        triples.push(Triple::new("parentOf", format!("p{i}"), format!("e{i}")));
        triples.push(Triple::new("childOf", format!("e{i}"), format!("p{i}")));
    }
    triples.push(Triple::new("childOf", "e0", "p5"));

    let config = builder(&dir, &triples)
        .with_remove_inverses(true)
        .with_inverse_threshold(0.9)
        .with_cold_start(ColdStartPolicy::Allow)
        .build()
        .unwrap();
    let dataset = build_dataset(config).unwrap();

    let report = &dataset.summary.inverses;
    assert_eq!(report.pairs.len(), 1);
    assert_eq!(report.removed, vec![RelationType::from("parentOf")]);
    assert_eq!(dataset.graph.relation_count(&"parentOf".into()), 0);
    assert_eq!(dataset.graph.relation_count(&"childOf".into()), 11);
}

#[test]
fn test_split_proportions() {
    let dir = get_test_dir("proportions");
    let triples: Vec<Triple> = (0..100)
        .map(|i| Triple::new("r", format!("s{i}"), format!("o{i}")))
        .collect();
    let config = builder(&dir, &triples)
        .with_testing_fraction(0.2)
        .with_validation_fraction(0.0)
        .with_splitting_technique(SplitTechnique::Random)
        .with_cold_start(ColdStartPolicy::Allow)
        .build()
        .unwrap();
    let dataset = build_dataset(config).unwrap();

    let counts = &dataset.summary.splits;
    assert_eq!(counts[&SplitKind::Test].positives, 20);
    assert_eq!(counts[&SplitKind::Train].positives, 80);
    assert_eq!(counts[&SplitKind::Validation].positives, 0);
    assert!(dataset
        .summary
        .warnings
        .iter()
        .any(|w| matches!(w, Warning::ColdStartEntities { .. })));
}

#[test]
fn test_cold_start_forbidden_aborts_split() {
    let dir = get_test_dir("cold_start");
    let triples: Vec<Triple> = (0..20)
        .map(|i| Triple::new("r", format!("s{i}"), format!("o{i}")))
        .collect();
    let config = builder(&dir, &triples)
        .with_splitting_technique(SplitTechnique::Random)
        .build()
        .unwrap();
    match build_dataset(config) {
        Err(Error::Stage { stage, source }) => {
            assert_eq!(stage, "split");
            assert!(matches!(*source, Error::ColdStartEntity { .. }));
        }
        other => panic!("expected split failure, got {other:?}"),
    }
}

/// Proposes `(marriedTo, foo, bar)` for every positive.
struct FooBar;

impl NegativesGenerator for FooBar {
    fn name(&self) -> &str {
        "foo_bar"
    }

    fn generate_negatives(
        &self,
        positive: &Triple,
        count: usize,
        _rng: &mut DatasetRng,
    ) -> Result<Vec<Triple>> {
        Ok(vec![Triple::new(positive.relation.clone(), "foo", "bar"); count])
    }

    fn keeps_duplicates(&self) -> bool {
        true
    }
}

#[test]
fn test_custom_generator_fixed_pair() {
    let dir = get_test_dir("custom");
    let mut triples = ring(20);
    for i in 0..20 {
        triples.push(Triple::new("marriedTo", format!("e{i}"), format!("e{}", (i + 3) % 20)));
    }
    let config = builder(&dir, &triples)
        .with_testing_fraction(0.2)
        .with_generator(FooBar, NegativeCount::new(0).with_relation("marriedTo", 2))
        .build()
        .unwrap();
    let dataset = build_dataset(config).unwrap();

    let test = &dataset.splits.test;
    let married = test
        .positives
        .iter()
        .filter(|t| t.relation.as_str() == "marriedTo")
        .count();
    assert_eq!(married, 4);
    assert_eq!(test.negatives.len(), 2 * married);
    assert!(test
        .negatives
        .iter()
        .all(|n| *n == Triple::new("marriedTo", "foo", "bar")));
    assert_eq!(dataset.summary.generators, vec!["foo_bar".to_string()]);
}

struct Exploding;

impl NegativesGenerator for Exploding {
    fn name(&self) -> &str {
        "exploding"
    }

    fn initialize(&mut self, ctx: &GenerationContext<'_>) -> Result<()> {
        assert!(!ctx.splits.test.positives.is_empty());
        Ok(())
    }

    fn generate_negatives(&self, p: &Triple, _: usize, _: &mut DatasetRng) -> Result<Vec<Triple>> {
        Err(Error::InvalidTriple(format!("cannot corrupt {p}")))
    }
}

#[test]
fn test_generator_failure_is_fatal() {
    let dir = get_test_dir("exploding");
    let config = builder(&dir, &ring(20))
        .with_generator(Exploding, NegativeCount::new(1))
        .build()
        .unwrap();
    match generate_datasets(config) {
        Err(Error::Stage { stage, source }) => {
            assert_eq!(stage, "negatives");
            match *source {
                Error::Generator { generator, .. } => assert_eq!(generator, "exploding"),
                other => panic!("unexpected source: {other:?}"),
            }
        }
        other => panic!("expected negatives failure, got {other:?}"),
    }
    assert!(!dir.join("out").join("train.txt").exists());
}

#[test]
fn test_same_seed_byte_identical() {
    let dir = get_test_dir("determinism");
    let input = write_tsv(&dir, &ring(30));
    let run = |name: &str| {
        let config = DatasetConfig::builder()
            .with_input_file(&input)
            .with_output_folder(dir.join(name))
            .with_seed(1234)
            .with_graph_fraction(0.9)
            .with_testing_fraction(0.15)
            .with_validation_fraction(0.1)
            .with_generate_negatives_training(true)
            .with_strategy("change_target", 2)
            .with_strategy("change_source_random", 2)
            .with_create_summary(true)
            .build()
            .unwrap();
        generate_datasets(config).unwrap()
    };
    let a = run("a");
    let b = run("b");
    assert_eq!(a, b);

    for file in [
        "train.txt",
        "test.txt",
        "valid.txt",
        "train_negatives.txt",
        "test_negatives.txt",
        "valid_negatives.txt",
        "summary.json",
    ] {
        let left = fs::read(dir.join("a").join(file)).unwrap();
        let right = fs::read(dir.join("b").join(file)).unwrap();
        assert_eq!(left, right, "{file} differs");
    }
}

#[test]
fn test_malformed_input_reports_line() {
    let dir = get_test_dir("malformed");
    let path = dir.join("input.tsv");
    fs::write(&path, "a\tr\tb\nb\tr\n").unwrap();
    let config = DatasetConfig::builder()
        .with_input_file(&path)
        .with_output_folder(dir.join("out"))
        .build()
        .unwrap();
    let err = generate_datasets(config).unwrap_err();
    assert!(err.to_string().starts_with("read failed"));
    match err {
        Error::Stage { source, .. } => {
            assert!(matches!(*source, Error::Parse { line: 2, .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_ntriples_data_properties() {
    const EX: &str = "http://ex.org/";
    let dir = get_test_dir("ntriples");
    let mut text = String::new();
    for i in 0..10 {
        text.push_str(&format!("<{EX}e{i}> <{EX}knows> <{EX}e{}> .\n", (i + 1) % 10));
        text.push_str(&format!("<{EX}e{i}> <{EX}likes> <{EX}e{}> .\n", (i + 2) % 10));
        text.push_str(&format!("<{EX}e{i}> <{EX}age> \"{}\" .\n", 20 + i));
    }
    let path = dir.join("input.nt");
    fs::write(&path, text).unwrap();

    let run = |include: bool, out: &str| {
        let config = DatasetConfig::builder()
            .with_input_file(&path)
            .with_input_format(InputFormat::NTriples)
            .with_output_folder(dir.join(out))
            .with_include_data_prop(include)
            .with_splitting_technique(SplitTechnique::Random)
            .with_cold_start(ColdStartPolicy::Allow)
            .build()
            .unwrap();
        generate_datasets(config).unwrap()
    };

    let without = run(false, "without");
    assert_eq!(without.data_properties_dropped, 10);
    assert_eq!(without.graph.triple_count, 20);

    let with = run(true, "with");
    assert_eq!(with.data_properties_dropped, 0);
    assert_eq!(with.graph.triple_count, 30);

    let train = fs::read_to_string(dir.join("with").join("train.txt")).unwrap();
    assert!(train.lines().all(|l| l.starts_with('<') && l.ends_with(" .")));
}

#[test]
fn test_ntriples_negatives_read_back() {
    const EX: &str = "http://ex.org/";
    let dir = get_test_dir("ntriples_negatives");
    let mut text = String::new();
    for i in 0..12 {
        text.push_str(&format!("<{EX}e{i}> <{EX}knows> <{EX}e{}> .\n", (i + 1) % 12));
        text.push_str(&format!("<{EX}e{i}> <{EX}name> \"n{i}\"@en .\n"));
    }
    let path = dir.join("input.nt");
    fs::write(&path, text).unwrap();

    let config = DatasetConfig::builder()
        .with_input_file(&path)
        .with_input_format(InputFormat::NTriples)
        .with_output_folder(dir.join("out"))
        .with_include_data_prop(true)
        .with_generate_negatives_training(true)
        .with_splitting_technique(SplitTechnique::Random)
        .with_cold_start(ColdStartPolicy::Allow)
        .with_strategy("change_target_random", 2)
        .with_strategy("change_both_random", 1)
        .build()
        .unwrap();
    let summary = generate_datasets(config).unwrap();

    for kind in [SplitKind::Train, SplitKind::Test] {
        let file = dir.join("out").join(format!("{}_negatives.txt", kind.file_stem()));
        let negatives = InputFormat::NTriples.read_path(&file).unwrap();
        assert_eq!(negatives.len(), summary.splits[&kind].negatives);
        assert!(negatives.iter().all(|n| !n.source.as_str().starts_with('"')));
        assert!(negatives
            .iter()
            .all(|n| n.is_data_property() == n.target.as_str().starts_with('"')));
    }
}

#[test]
fn test_number_splits_writes_rotations() {
    let dir = get_test_dir("rotations");
    let config = builder(&dir, &ring(20))
        .with_splitting_technique(SplitTechnique::Random)
        .with_cold_start(ColdStartPolicy::Allow)
        .with_number_splits(3)
        .with_strategy("change_target_random", 1)
        .build()
        .unwrap();
    let dataset = build_dataset(config).unwrap();
    assert_eq!(dataset.rotations.len(), 2);
    assert_eq!(dataset.summary.rotations.len(), 2);
    for rotation in &dataset.rotations {
        assert_eq!(rotation.positive_count(), 40);
        assert_eq!(rotation.test.positives.len(), dataset.splits.test.positives.len());
        assert_ne!(rotation.test.positives, dataset.splits.test.positives);
        assert_eq!(rotation.test.negatives.len(), rotation.test.positives.len());
    }

    write_dataset(&dataset).unwrap();
    let out = dir.join("out");
    assert!(out.join("test.txt").exists());
    for k in 1..3 {
        let folder = out.join(format!("split_{k}"));
        let test = InputFormat::Tsv.read_path(&folder.join("test.txt")).unwrap();
        assert_eq!(test, dataset.rotations[k - 1].test.positives);
        assert!(folder.join("test_negatives.txt").exists());
    }
    assert!(!out.join("split_3").exists());
}

#[test]
fn test_json_config_file() {
    let dir = get_test_dir("json");
    let input = write_tsv(&dir, &ring(20));
    let config_path = dir.join("run.json");
    let json = format!(
        r#"{{
            "input_file": {:?},
            "output_folder": {:?},
            "seed": 5,
            "testing_fraction": 0.1,
            "strategies": [{{ "name": "change_both_random", "count": 1 }}]
        }}"#,
        input.display().to_string(),
        dir.join("out").display().to_string()
    );
    fs::write(&config_path, json).unwrap();

    let config = DatasetConfigBuilder::from_file(&config_path).unwrap().build().unwrap();
    let summary = generate_datasets(config).unwrap();
    assert_eq!(summary.seed, 5);
    assert_eq!(summary.splits[&SplitKind::Test].positives, 4);
    assert_eq!(summary.splits[&SplitKind::Test].negatives, 4);
}
