//! CLI flows for the `csearch` binary.

use assert_cmd::cargo::cargo_bin_cmd;
use corpus_search::model::types::ContentType;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

mod util;
use util::{notes_fixture, write_config};

fn csearch(dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("csearch");
    cmd.env("CSEARCH_DATA_DIR", dir)
        .env_remove("CSEARCH_CONFIG")
        .env_remove("CSEARCH_EMBEDDER")
        .env_remove("CSEARCH_RERANKER")
        .env_remove("CSEARCH_TOP_K")
        .env("RUST_LOG", "warn");
    cmd
}

fn notes_config(dir: &Path) -> std::path::PathBuf {
    let notes = notes_fixture();
    write_config(dir, &[(ContentType::Notes, notes.as_slice())])
}

#[test]
fn index_builds_then_reuses_cache() {
    let dir = tempdir().unwrap();
    let config = notes_config(dir.path());

    csearch(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("index")
        .assert()
        .success()
        .stdout(predicate::str::contains("notes: 5 entries (embeddings computed)"));
    assert!(dir.path().join("notes.cemb").exists());

    csearch(dir.path())
        .arg("--config")
        .arg(&config)
        .arg("index")
        .assert()
        .success()
        .stdout(predicate::str::contains("notes: 5 entries (cache reused)"));

    csearch(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["index", "--regenerate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("embeddings computed"));
}

#[test]
fn search_renders_reranked_section() {
    let dir = tempdir().unwrap();
    let config = notes_config(dir.path());

    csearch(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["search", "budget meeting", "-n", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Top-1 Cross-Encoder Re-ranker hits"))
        .stdout(predicate::str::contains("CrossScore: 1.000"))
        .stdout(predicate::str::contains("budget meeting with finance team"))
        .stdout(predicate::str::contains("Bi-Encoder").not());
}

#[test]
fn search_show_coarse_adds_retrieval_section() {
    let dir = tempdir().unwrap();
    let config = notes_config(dir.path());

    csearch(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["search", "train tickets", "--show-coarse", "-n", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Top-2 Bi-Encoder Retrieval hits"))
        .stdout(predicate::str::contains("Top-2 Cross-Encoder Re-ranker hits"));
}

#[test]
fn search_json_emits_collated_results() {
    let dir = tempdir().unwrap();
    let config = notes_config(dir.path());

    let output = csearch(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["search", "water the garden -milk", "--json", "-n", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0]["Entry"].as_str().unwrap().contains("tomatoes"));
    assert_eq!(results[0]["Score"], "1.000");
    assert!(
        results
            .iter()
            .all(|r| !r["Entry"].as_str().unwrap().contains("milk"))
    );
}

#[test]
fn interactive_reads_until_exit() {
    let dir = tempdir().unwrap();
    let config = notes_config(dir.path());

    csearch(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["interactive", "-n", "1"])
        .write_stdin("lighthouse novel\nexit\nbudget meeting\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Enter your query: "))
        .stdout(predicate::str::contains("lighthouse keeper"))
        .stdout(predicate::str::contains("finance team").not());
}

#[test]
fn unconfigured_type_is_an_error() {
    let dir = tempdir().unwrap();
    let config = notes_config(dir.path());

    csearch(dir.path())
        .arg("--config")
        .arg(&config)
        .args(["search", "rent", "--type", "ledger"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("content type 'ledger' is not configured"));
}

#[test]
fn unknown_type_is_rejected_by_parser() {
    let dir = tempdir().unwrap();
    csearch(dir.path())
        .args(["search", "x", "--type", "image"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown content type"));
}

#[test]
fn missing_explicit_config_fails() {
    let dir = tempdir().unwrap();
    csearch(dir.path())
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .arg("index")
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading configuration"));
}

#[test]
fn models_lists_fallbacks_as_installed() {
    let dir = tempdir().unwrap();
    let output = csearch(dir.path())
        .args(["models", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let models: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let models = models.as_array().unwrap();
    let hash = models.iter().find(|m| m["name"] == "hash").unwrap();
    assert_eq!(hash["kind"], "embedder");
    assert_eq!(hash["installed"], true);
    assert!(models.iter().any(|m| m["name"] == "overlap"));
}
