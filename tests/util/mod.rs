use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use corpus_search::corpus::{RawEntry, write_jsonl_gz};
use corpus_search::model::types::ContentType;
use corpus_search::search::embedder::{Embedder, EmbedderResult};
use corpus_search::search::hash_embedder::HashEmbedder;
use corpus_search::search::model_manager::ModelProvider;
use corpus_search::search::overlap_reranker::OverlapReranker;
use corpus_search::search::reranker::{Reranker, RerankerResult};

/// Captures tracing output for tests.
#[allow(dead_code)]
pub struct TestTracing {
    buffer: Arc<std::sync::Mutex<Vec<u8>>>,
}

#[allow(dead_code)]
impl TestTracing {
    pub fn new() -> Self {
        Self {
            buffer: Arc::new(std::sync::Mutex::new(Vec::new())),
        }
    }

    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.buffer.clone();
        let make_writer = move || TestWriter(writer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .without_time()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(make_writer)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn output(&self) -> String {
        let buf = self.buffer.lock().unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    pub fn assert_contains(&self, needle: &str) {
        let out = self.output();
        assert!(
            out.contains(needle),
            "expected logs to contain `{needle}`, got:\n{out}"
        );
    }

    pub fn lines(&self) -> Vec<String> {
        self.output()
            .lines()
            .map(std::string::ToString::to_string)
            .collect()
    }
}

struct TestWriter(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for TestWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Hash embedder that counts how many texts it embedded.
#[allow(dead_code)]
pub struct CountingEmbedder {
    inner: HashEmbedder,
    pub calls: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl CountingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            inner: HashEmbedder::new(dimension),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Embedder for CountingEmbedder {
    fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn id(&self) -> &str {
        self.inner.id()
    }

    fn is_semantic(&self) -> bool {
        false
    }
}

/// Overlap reranker that counts scored pairs.
#[allow(dead_code)]
pub struct CountingReranker {
    inner: OverlapReranker,
    pub pairs: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl CountingReranker {
    pub fn new() -> Self {
        Self {
            inner: OverlapReranker::new(),
            pairs: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Reranker for CountingReranker {
    fn score_pairs(&self, query: &str, documents: &[&str]) -> RerankerResult<Vec<f32>> {
        self.pairs.fetch_add(documents.len(), Ordering::SeqCst);
        self.inner.score_pairs(query, documents)
    }

    fn id(&self) -> &str {
        self.inner.id()
    }
}

/// Provider plus handles on its embed and rerank counters.
#[allow(dead_code)]
pub fn counting_provider(dimension: usize) -> (ModelProvider, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let embedder = CountingEmbedder::new(dimension);
    let reranker = CountingReranker::new();
    let embeds = embedder.calls.clone();
    let pairs = reranker.pairs.clone();
    (
        ModelProvider::new(Arc::new(embedder), Arc::new(reranker)),
        embeds,
        pairs,
    )
}

#[allow(dead_code)]
pub fn notes_fixture() -> Vec<RawEntry> {
    vec![
        RawEntry::new("Groceries", Some(":home:"), "buy milk and bread on friday"),
        RawEntry::new("Quarterly review", Some(":work:"), "budget meeting with finance team"),
        RawEntry::new("Garden", None, "plant tomatoes and water the garden beds"),
        RawEntry::new("Reading list", None, "finish the novel about the lighthouse keeper"),
        RawEntry::new("Travel", Some(":trip:"), "book train tickets to the coast"),
    ]
}

#[allow(dead_code)]
pub fn music_fixture() -> Vec<RawEntry> {
    vec![
        RawEntry::new("Blue in Green", Some("jazz"), "Miles Davis, Kind of Blue, 1959"),
        RawEntry::new("Clair de Lune", Some("classical"), "Debussy, Suite bergamasque piano"),
    ]
}

#[allow(dead_code)]
pub fn ledger_fixture() -> Vec<RawEntry> {
    vec![
        RawEntry::new("2024-03-01 Rent", None, "Expenses:Housing 1200 USD"),
        RawEntry::new("2024-03-02 Coffee", None, "Expenses:Food:Coffee 4.50 USD"),
    ]
}

/// Write `records` as `<dir>/<name>.jsonl.gz` and return the path.
#[allow(dead_code)]
pub fn write_corpus(dir: &Path, name: &str, records: &[RawEntry]) -> PathBuf {
    let path = dir.join(format!("{name}.jsonl.gz"));
    write_jsonl_gz(&path, records).expect("write corpus fixture");
    path
}

/// Write a config.toml using the always-available models.
///
/// Corpus and cache paths are relative so they resolve against `dir`.
#[allow(dead_code)]
pub fn write_config(dir: &Path, types: &[(ContentType, &[RawEntry])]) -> PathBuf {
    let mut toml = format!(
        "data_dir = '{}'\n\n\
         [search_type.asymmetric]\nembedder = \"hash\"\nreranker = \"overlap\"\n\n\
         [search_type.symmetric]\nembedder = \"hash\"\nreranker = \"overlap\"\n",
        dir.display()
    );
    for (content_type, records) in types {
        write_corpus(dir, content_type.as_str(), records);
        toml.push_str(&format!(
            "\n[content_type.{t}]\ncompressed_jsonl = \"{t}.jsonl.gz\"\nembeddings_file = \"{t}.cemb\"\n",
            t = content_type.as_str()
        ));
    }
    let path = dir.join("config.toml");
    std::fs::write(&path, toml).expect("write config fixture");
    path
}
