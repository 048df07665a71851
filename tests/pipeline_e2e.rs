//! End-to-end pipeline tests over gzipped JSONL corpora.

use std::io::Write;
use std::sync::atomic::Ordering;

use corpus_search::config::SearchConfig;
use corpus_search::corpus::{CorpusError, JsonlSource, MemorySource, RawEntry};
use corpus_search::model::types::ContentType;
use corpus_search::search::embedding_cache::{
    CacheOutcome, CacheValidation, Quantization, RebuildReason, read_cache,
};
use corpus_search::search::pipeline::{Pipeline, PipelineError, PipelineOptions};
use flate2::Compression;
use flate2::write::GzEncoder;
use tempfile::tempdir;

mod util;
use util::{TestTracing, counting_provider, notes_fixture, write_config, write_corpus};

fn setup_notes(
    dir: &std::path::Path,
    options: &PipelineOptions,
    provider: corpus_search::search::model_manager::ModelProvider,
) -> Pipeline {
    let source = JsonlSource::new(dir.join("notes.jsonl.gz"));
    Pipeline::setup(ContentType::Notes, &source, provider, options, None).unwrap()
}

#[test]
fn query_ranks_matching_entry_first() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path(), "notes", &notes_fixture());
    let (provider, _, _) = counting_provider(128);
    let options = PipelineOptions::new(dir.path().join("notes.cemb"));
    let pipeline = setup_notes(dir.path(), &options, provider);

    let results = pipeline.search("budget meeting", 3).unwrap();
    assert!(!results.is_empty());
    assert!(results[0].entry.contains("budget meeting"));
    assert_eq!(results[0].score, "1.000");
}

#[test]
fn second_setup_reuses_cache_without_embedding() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path(), "notes", &notes_fixture());
    let options = PipelineOptions::new(dir.path().join("notes.cemb"));

    let (provider, embeds, _) = counting_provider(128);
    let first = setup_notes(dir.path(), &options, provider);
    assert_eq!(embeds.load(Ordering::SeqCst), notes_fixture().len());
    assert!(matches!(
        first.cache_outcome(),
        CacheOutcome::Built {
            reason: RebuildReason::Missing,
            persisted: true
        }
    ));

    let (provider, embeds, _) = counting_provider(128);
    let second = setup_notes(dir.path(), &options, provider);
    assert_eq!(embeds.load(Ordering::SeqCst), 0);
    assert_eq!(*second.cache_outcome(), CacheOutcome::Loaded);

    second.query("garden").unwrap();
    assert_eq!(embeds.load(Ordering::SeqCst), 1);
}

#[test]
fn regenerate_recomputes_every_embedding() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path(), "notes", &notes_fixture());
    let mut options = PipelineOptions::new(dir.path().join("notes.cemb"));

    let (provider, _, _) = counting_provider(128);
    setup_notes(dir.path(), &options, provider);

    options.regenerate = true;
    let (provider, embeds, _) = counting_provider(128);
    let pipeline = setup_notes(dir.path(), &options, provider);
    assert_eq!(embeds.load(Ordering::SeqCst), notes_fixture().len());
    assert!(matches!(
        pipeline.cache_outcome(),
        CacheOutcome::Built {
            reason: RebuildReason::Regenerate,
            ..
        }
    ));
}

#[test]
fn required_term_limits_results_and_reranker_input() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path(), "notes", &notes_fixture());
    let (provider, _, pairs) = counting_provider(128);
    let options = PipelineOptions::new(dir.path().join("notes.cemb"));
    let pipeline = setup_notes(dir.path(), &options, provider);

    let hits = pipeline.query("things to do +garden").unwrap();
    assert_eq!(hits.len(), 1);
    assert!(pipeline.entries()[hits[0].corpus_id].text().contains("tomatoes"));
    assert_eq!(pairs.load(Ordering::SeqCst), 1);
}

#[test]
fn blocked_term_removes_entries() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path(), "notes", &notes_fixture());
    let (provider, _, _) = counting_provider(128);
    let options = PipelineOptions::new(dir.path().join("notes.cemb"));
    let pipeline = setup_notes(dir.path(), &options, provider);

    let hits = pipeline.query("weekend plans -milk").unwrap();
    assert_eq!(hits.len(), notes_fixture().len() - 1);
    assert!(
        hits.iter()
            .all(|h| !pipeline.entries()[h.corpus_id].text().contains("milk"))
    );
}

#[test]
fn filter_only_query_returns_nothing() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path(), "notes", &notes_fixture());
    let (provider, embeds, pairs) = counting_provider(128);
    let options = PipelineOptions::new(dir.path().join("notes.cemb"));
    let pipeline = setup_notes(dir.path(), &options, provider);
    let before = embeds.load(Ordering::SeqCst);

    assert!(pipeline.query("+garden -milk").unwrap().is_empty());
    assert_eq!(embeds.load(Ordering::SeqCst), before);
    assert_eq!(pairs.load(Ordering::SeqCst), 0);
}

#[test]
fn small_top_k_caps_candidates() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path(), "notes", &notes_fixture());
    let (provider, _, pairs) = counting_provider(128);
    let mut options = PipelineOptions::new(dir.path().join("notes.cemb"));
    options.top_k = 2;
    let pipeline = setup_notes(dir.path(), &options, provider);

    let hits = pipeline.query("train tickets").unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(pairs.load(Ordering::SeqCst), 2);
}

#[test]
fn malformed_lines_are_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("notes.jsonl.gz");
    let mut gz = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
    writeln!(gz, r#"{{"Title": "First", "Body": "kept entry one"}}"#).unwrap();
    writeln!(gz, "not json at all").unwrap();
    writeln!(gz, r#"{{"Body": "no title here"}}"#).unwrap();
    writeln!(gz).unwrap();
    writeln!(gz, r#"{{"Title": "Second", "Tags": ["a", "b"], "Body": "kept entry two"}}"#).unwrap();
    gz.finish().unwrap();

    let tracing = TestTracing::new();
    let _guard = tracing.install();
    let (provider, _, _) = counting_provider(64);
    let options = PipelineOptions::new(dir.path().join("notes.cemb"));
    let pipeline = setup_notes(dir.path(), &options, provider);

    assert_eq!(pipeline.entries().len(), 2);
    assert!(pipeline.entries()[1].text().contains("a b"));
    tracing.assert_contains("corpus_record_skipped");
    tracing.assert_contains("cache_miss");
}

#[test]
fn missing_corpus_is_unreadable() {
    let dir = tempdir().unwrap();
    let (provider, _, _) = counting_provider(64);
    let options = PipelineOptions::new(dir.path().join("notes.cemb"));
    let source = JsonlSource::new(dir.path().join("absent.jsonl.gz"));
    let err = Pipeline::setup(ContentType::Notes, &source, provider, &options, None).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Corpus(CorpusError::Unreadable { .. })
    ));
    assert!(!dir.path().join("notes.cemb").exists());
}

#[test]
fn fingerprint_mode_detects_edited_entries() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("notes.cemb");
    let original = MemorySource::new(vec![
        RawEntry::new("a", None, "first body"),
        RawEntry::new("b", None, "second body"),
    ]);
    let edited = MemorySource::new(vec![
        RawEntry::new("a", None, "first body"),
        RawEntry::new("b", None, "second body, revised"),
    ]);

    let (provider, _, _) = counting_provider(64);
    let mut options = PipelineOptions::new(&cache);
    Pipeline::setup(ContentType::Notes, &original, provider, &options, None).unwrap();

    // Existence mode trusts the cache while the entry count matches.
    let (provider, embeds, _) = counting_provider(64);
    let p = Pipeline::setup(ContentType::Notes, &edited, provider, &options, None).unwrap();
    assert_eq!(*p.cache_outcome(), CacheOutcome::Loaded);
    assert_eq!(embeds.load(Ordering::SeqCst), 0);

    options.cache.validation = CacheValidation::Fingerprint;
    let (provider, embeds, _) = counting_provider(64);
    let p = Pipeline::setup(ContentType::Notes, &edited, provider, &options, None).unwrap();
    assert!(matches!(
        p.cache_outcome(),
        CacheOutcome::Built {
            reason: RebuildReason::Stale(_),
            ..
        }
    ));
    assert_eq!(embeds.load(Ordering::SeqCst), 2);
}

#[test]
fn entry_count_change_forces_rebuild() {
    let dir = tempdir().unwrap();
    let cache = dir.path().join("notes.cemb");
    let options = PipelineOptions::new(&cache);
    let (provider, _, _) = counting_provider(64);
    let one = MemorySource::new(vec![RawEntry::new("a", None, "only entry")]);
    Pipeline::setup(ContentType::Notes, &one, provider, &options, None).unwrap();

    let (provider, _, _) = counting_provider(64);
    let two = MemorySource::new(vec![
        RawEntry::new("a", None, "only entry"),
        RawEntry::new("b", None, "new entry"),
    ]);
    let p = Pipeline::setup(ContentType::Notes, &two, provider, &options, None).unwrap();
    assert_eq!(p.embeddings().len(), 2);
    assert_eq!(read_cache(&cache).unwrap().len(), 2);
}

#[test]
fn f16_cache_round_trips_through_search() {
    let dir = tempdir().unwrap();
    write_corpus(dir.path(), "notes", &notes_fixture());
    let mut options = PipelineOptions::new(dir.path().join("notes.cemb"));
    options.cache.quantization = Quantization::F16;

    let (provider, _, _) = counting_provider(128);
    setup_notes(dir.path(), &options, provider);
    let (provider, _, _) = counting_provider(128);
    let pipeline = setup_notes(dir.path(), &options, provider);

    assert_eq!(*pipeline.cache_outcome(), CacheOutcome::Loaded);
    assert_eq!(pipeline.embeddings().quantization(), Quantization::F16);
    let results = pipeline.search("lighthouse novel", 1).unwrap();
    assert!(results[0].entry.contains("lighthouse"));
}

#[test]
fn pipeline_from_config_file() {
    let dir = tempdir().unwrap();
    let fixture = notes_fixture();
    let config_path = write_config(dir.path(), &[(ContentType::Notes, fixture.as_slice())]);
    let config = SearchConfig::from_file(&config_path).unwrap();
    let content = config.content(ContentType::Notes).unwrap();
    assert_eq!(content.embeddings_file, dir.path().join("notes.cemb"));

    let (provider, _, _) = counting_provider(64);
    let pipeline =
        Pipeline::from_config(ContentType::Notes, content, provider, 100, false, None).unwrap();
    assert_eq!(pipeline.entries().len(), fixture.len());
    assert!(dir.path().join("notes.cemb").exists());
}
