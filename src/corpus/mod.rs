//! Entry store: loads corpus entries into an ordered, indexable sequence.
//!
//! Entries arrive from a [`CorpusSource`] as raw `(title, tags, body)`
//! records. The store drops records without body text, joins the rest into
//! retrieval units (see [`crate::search::canonicalize::entry_text`]) and
//! assigns each a stable corpus-local index.
//!
//! The on-disk source is compressed JSONL, one object per line:
//!
//! ```text
//! {"Title": "Groceries", "Tags": ":home:", "Body": "buy milk\n"}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::model::types::Entry;
use crate::search::canonicalize::entry_text;

/// Errors raised while loading a corpus.
#[derive(Error, Debug)]
pub enum CorpusError {
    /// The source as a whole cannot be read.
    #[error("corpus source {path} is unreadable: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single record is malformed; it is skipped, not fatal.
    #[error("malformed corpus record at line {line}: {reason}")]
    Format { line: usize, reason: String },
}

/// One raw record as produced by an ingestion format converter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Tags", default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Tags>,
    #[serde(rename = "Body", default, skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Tag annotation, either a preformatted string or a list of tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Tags {
    Text(String),
    List(Vec<String>),
}

impl Tags {
    pub fn render(&self) -> String {
        match self {
            Tags::Text(text) => text.clone(),
            Tags::List(list) => list.join(" "),
        }
    }
}

impl RawEntry {
    pub fn new(title: impl Into<String>, tags: Option<&str>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            tags: tags.map(|t| Tags::Text(t.to_string())),
            body: Some(body.into()),
        }
    }

    /// Retrieval unit for this record, or `None` when it has no body text.
    pub fn unit_text(&self) -> Option<String> {
        let body = self.body.as_deref()?;
        if body.trim().is_empty() {
            return None;
        }
        let tags = self.tags.as_ref().map(Tags::render);
        Some(entry_text(&self.title, tags.as_deref(), body))
    }
}

/// Producer of raw corpus records.
///
/// Per-record failures are returned inline so the store can skip them;
/// an outer error means the source could not be read at all.
pub trait CorpusSource: Send + Sync {
    fn records(&self) -> Result<Vec<Result<RawEntry, CorpusError>>, CorpusError>;

    /// Human-readable name for logs.
    fn describe(&self) -> String;
}

/// Compressed (gzip) or plain JSONL file.
#[derive(Debug, Clone)]
pub struct JsonlSource {
    path: PathBuf,
}

impl JsonlSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn is_gzip(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
    }

    fn unreadable(&self, source: std::io::Error) -> CorpusError {
        CorpusError::Unreadable {
            path: self.path.clone(),
            source,
        }
    }
}

impl CorpusSource for JsonlSource {
    fn records(&self) -> Result<Vec<Result<RawEntry, CorpusError>>, CorpusError> {
        let file = File::open(&self.path).map_err(|e| self.unreadable(e))?;
        let reader: Box<dyn Read> = if self.is_gzip() {
            Box::new(MultiGzDecoder::new(file))
        } else {
            Box::new(file)
        };

        let mut records = Vec::new();
        for (idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.map_err(|e| self.unreadable(e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            records.push(
                serde_json::from_str::<RawEntry>(trimmed).map_err(|e| CorpusError::Format {
                    line: idx + 1,
                    reason: e.to_string(),
                }),
            );
        }
        Ok(records)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// In-memory records; used by tests and by callers that ingest elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    records: Vec<RawEntry>,
}

impl MemorySource {
    pub fn new(records: Vec<RawEntry>) -> Self {
        Self { records }
    }
}

impl CorpusSource for MemorySource {
    fn records(&self) -> Result<Vec<Result<RawEntry, CorpusError>>, CorpusError> {
        Ok(self.records.iter().cloned().map(Ok).collect())
    }

    fn describe(&self) -> String {
        format!("memory ({} records)", self.records.len())
    }
}

/// Loaded, immutable corpus.
#[derive(Debug, Clone, Default)]
pub struct EntryStore {
    entries: Vec<Entry>,
    skipped_malformed: usize,
    skipped_empty: usize,
}

impl EntryStore {
    /// Load and normalize every record from `source`.
    pub fn load(source: &dyn CorpusSource) -> Result<Self, CorpusError> {
        let records = source.records()?;
        let mut entries = Vec::with_capacity(records.len());
        let mut skipped_malformed = 0;
        let mut skipped_empty = 0;

        for record in records {
            match record {
                Ok(raw) => match raw.unit_text() {
                    Some(text) => entries.push(Entry::new(entries.len(), text)),
                    None => skipped_empty += 1,
                },
                Err(err) => {
                    warn!(source = %source.describe(), error = %err, "corpus_record_skipped");
                    skipped_malformed += 1;
                }
            }
        }

        info!(
            source = %source.describe(),
            entries = entries.len(),
            skipped_malformed,
            skipped_empty,
            "corpus_loaded"
        );
        Ok(Self {
            entries,
            skipped_malformed,
            skipped_empty,
        })
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn get(&self, idx: usize) -> Option<&Entry> {
        self.entries.get(idx)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Unit texts in index order.
    pub fn texts(&self) -> Vec<&str> {
        self.entries.iter().map(Entry::text).collect()
    }

    pub fn skipped_malformed(&self) -> usize {
        self.skipped_malformed
    }

    pub fn skipped_empty(&self) -> usize {
        self.skipped_empty
    }
}

/// Write records as gzip-compressed JSONL.
pub fn write_jsonl_gz(path: &Path, records: &[RawEntry]) -> std::io::Result<()> {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    for record in records {
        let line = serde_json::to_string(record)?;
        encoder.write_all(line.as_bytes())?;
        encoder.write_all(b"\n")?;
    }
    encoder.finish()?.sync_all()
}
