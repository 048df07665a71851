//! Embedding cache: persisted per-corpus vectors and the reuse-or-rebuild decision.
//!
//! Format overview (little-endian):
//!
//! Header (variable size):
//!   Magic: "CEMB" (4 bytes)
//!   Version: u16
//!   EmbedderID length: u16
//!   EmbedderID: bytes
//!   Dimension: u32
//!   Quantization: u8 (0=f32, 1=f16)
//!   Count: u32
//!   HeaderCRC32: u32 (CRC32 of header bytes before this field)
//!
//! Content hashes:
//!   Count × 32 bytes (SHA256 of each entry's unit text)
//!
//! Vector slab:
//!   Count × Dimension × bytes_per_quant, contiguous, 32-byte aligned.

use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use half::f16;
use indicatif::ProgressBar;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::canonicalize::{canonicalize_for_embedding, content_hash};
use super::embedder::{Embedder, EmbedderError, EmbedderResult, l2_normalize};
use crate::model::types::Entry;

pub const CEMB_MAGIC: [u8; 4] = *b"CEMB";
pub const CEMB_VERSION: u16 = 1;
pub const VECTOR_ALIGN_BYTES: usize = 32;
pub const CONTENT_HASH_BYTES: usize = 32;

/// Entries embedded per provider call while building.
const EMBED_CHUNK_SIZE: usize = 256;

/// Errors at the cache file boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    /// Cache exists but cannot be decoded; callers treat it as a miss.
    #[error("failed to read embedding cache {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// Cache could not be persisted; callers keep the in-memory vectors.
    #[error("failed to write embedding cache {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// Cache decoded fine but belongs to another embedder or corpus.
    #[error("embedding cache mismatch: {0}")]
    Mismatch(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quantization {
    #[default]
    F32,
    F16,
}

impl Quantization {
    pub fn to_u8(self) -> u8 {
        match self {
            Quantization::F32 => 0,
            Quantization::F16 => 1,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Quantization::F32),
            1 => Ok(Quantization::F16),
            other => bail!("unknown quantization value: {other}"),
        }
    }

    pub fn bytes_per_component(self) -> usize {
        match self {
            Quantization::F32 => 4,
            Quantization::F16 => 2,
        }
    }
}

/// How an existing cache file is judged reusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheValidation {
    /// Reuse whenever the file exists and matches the embedder.
    #[default]
    Existence,
    /// Additionally require every stored content hash to match its entry.
    Fingerprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheSettings {
    pub validation: CacheValidation,
    pub quantization: Quantization,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeader {
    pub version: u16,
    pub embedder_id: String,
    pub dimension: u32,
    pub quantization: Quantization,
    pub count: u32,
}

impl CacheHeader {
    pub fn new(
        embedder_id: impl Into<String>,
        dimension: u32,
        quantization: Quantization,
        count: u32,
    ) -> Result<Self> {
        let header = Self {
            version: CEMB_VERSION,
            embedder_id: embedder_id.into(),
            dimension,
            quantization,
            count,
        };
        header.validate()?;
        Ok(header)
    }

    pub fn validate(&self) -> Result<()> {
        let id_len = self.embedder_id.len();
        if id_len > u16::MAX as usize {
            bail!("embedder_id is too long: {id_len}");
        }
        if self.dimension == 0 {
            bail!("dimension must be non-zero");
        }
        Ok(())
    }

    pub fn header_len_bytes(&self) -> Result<usize> {
        self.validate()?;
        Ok(4 + 2 + 2 + self.embedder_id.len() + 4 + 1 + 4 + 4)
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<usize> {
        self.validate()?;
        let mut buf = Vec::new();

        buf.extend_from_slice(&CEMB_MAGIC);
        buf.extend_from_slice(&self.version.to_le_bytes());

        let id_bytes = self.embedder_id.as_bytes();
        let id_len = u16::try_from(id_bytes.len())
            .map_err(|_| anyhow!("embedder_id length out of range"))?;
        buf.extend_from_slice(&id_len.to_le_bytes());
        buf.extend_from_slice(id_bytes);

        buf.extend_from_slice(&self.dimension.to_le_bytes());
        buf.push(self.quantization.to_u8());
        buf.extend_from_slice(&self.count.to_le_bytes());

        let crc = crc32fast::hash(&buf);
        writer.write_all(&buf)?;
        writer.write_all(&crc.to_le_bytes())?;
        Ok(buf.len() + 4)
    }

    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut header_bytes = Vec::new();

        let magic =
            read_exact_array::<4, _>(&mut reader, &mut header_bytes).context("read CEMB magic")?;
        if magic != CEMB_MAGIC {
            bail!("invalid CEMB magic: {:?}", magic);
        }

        let version = read_u16_le(&mut reader, &mut header_bytes).context("read CEMB version")?;
        if version != CEMB_VERSION {
            bail!("unsupported CEMB version: {version}");
        }

        let id_len = read_u16_le(&mut reader, &mut header_bytes)
            .context("read embedder id length")? as usize;
        let id_bytes =
            read_exact_vec(&mut reader, id_len, &mut header_bytes).context("read embedder id")?;
        let embedder_id = String::from_utf8(id_bytes).context("embedder id is not valid UTF-8")?;

        let dimension = read_u32_le(&mut reader, &mut header_bytes).context("read dimension")?;
        let quantization_raw =
            read_exact_array::<1, _>(&mut reader, &mut header_bytes).context("read quantization")?;
        let quantization = Quantization::from_u8(quantization_raw[0])?;
        let count = read_u32_le(&mut reader, &mut header_bytes).context("read count")?;

        let mut crc_buf = [0u8; 4];
        reader
            .read_exact(&mut crc_buf)
            .context("read header crc")?;
        let crc_expected = u32::from_le_bytes(crc_buf);
        let crc_actual = crc32fast::hash(&header_bytes);
        if crc_actual != crc_expected {
            bail!("header CRC mismatch (expected {crc_expected:#010x}, got {crc_actual:#010x})");
        }

        let header = Self {
            version,
            embedder_id,
            dimension,
            quantization,
            count,
        };
        header.validate()?;
        Ok(header)
    }
}

/// Borrowed view of the whole vector slab, `dimension` components per entry.
#[derive(Debug, Clone, Copy)]
pub enum VectorSlab<'a> {
    F32(&'a [f32]),
    F16(&'a [f16]),
}

/// Dense vectors for one corpus, index-aligned with its entries.
#[derive(Debug)]
pub struct EmbeddingSet {
    header: CacheHeader,
    content_hashes: Vec<[u8; CONTENT_HASH_BYTES]>,
    vectors: VectorStorage,
}

#[derive(Debug)]
enum VectorStorage {
    F32(Vec<f32>),
    F16(Vec<f16>),
    Mmap {
        mmap: Mmap,
        offset: usize,
        len: usize,
    },
}

impl EmbeddingSet {
    /// Build a set from freshly computed vectors.
    pub fn from_vectors(
        embedder_id: &str,
        dimension: usize,
        quantization: Quantization,
        vectors: Vec<Vec<f32>>,
        content_hashes: Vec<[u8; CONTENT_HASH_BYTES]>,
    ) -> Result<Self> {
        if vectors.len() != content_hashes.len() {
            bail!(
                "vector/hash count mismatch: {} vectors, {} hashes",
                vectors.len(),
                content_hashes.len()
            );
        }
        let dimension_u32 =
            u32::try_from(dimension).map_err(|_| anyhow!("dimension out of range"))?;
        let count_u32 =
            u32::try_from(vectors.len()).map_err(|_| anyhow!("entry count out of range"))?;

        let mut slab = Vec::with_capacity(vectors.len() * dimension);
        for (idx, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                bail!(
                    "vector {idx} dimension mismatch: expected {dimension}, got {}",
                    vector.len()
                );
            }
            slab.extend_from_slice(vector);
        }
        let vectors = match quantization {
            Quantization::F32 => VectorStorage::F32(slab),
            Quantization::F16 => {
                VectorStorage::F16(slab.into_iter().map(f16::from_f32).collect())
            }
        };

        let set = Self {
            header: CacheHeader::new(embedder_id, dimension_u32, quantization, count_u32)?,
            content_hashes,
            vectors,
        };
        set.validate()?;
        Ok(set)
    }

    pub fn load(path: &Path) -> Result<Self> {
        if cfg!(target_endian = "big") {
            bail!("CEMB load is only supported on little-endian targets");
        }

        let file = File::open(path).with_context(|| format!("open CEMB file {path:?}"))?;
        let file_len = file.metadata().context("read CEMB metadata")?.len();
        if file_len == 0 {
            bail!("CEMB file is empty");
        }

        let mmap = unsafe { Mmap::map(&file).context("mmap CEMB file")? };
        let header = CacheHeader::read_from(Cursor::new(&mmap[..])).context("read CEMB header")?;
        let header_len = header.header_len_bytes()?;
        let hashes_len = hashes_size_bytes(header.count)?;
        let slab_offset = vector_slab_offset_bytes(header_len, header.count)?;
        let slab_size =
            vector_slab_size_bytes(header.count, header.dimension, header.quantization)?;

        let expected_len = slab_offset
            .checked_add(slab_size)
            .ok_or_else(|| anyhow!("CEMB file size overflow"))?;
        if file_len != expected_len as u64 {
            bail!("CEMB file size mismatch (expected {expected_len}, got {file_len})");
        }

        let hashes_bytes = mmap
            .get(header_len..header_len + hashes_len)
            .ok_or_else(|| anyhow!("content hashes out of bounds"))?;
        let content_hashes = hashes_bytes
            .chunks_exact(CONTENT_HASH_BYTES)
            .map(|chunk| {
                let mut hash = [0u8; CONTENT_HASH_BYTES];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();

        let set = Self {
            header,
            content_hashes,
            vectors: VectorStorage::Mmap {
                mmap,
                offset: slab_offset,
                len: slab_size,
            },
        };
        set.validate()?;
        set.slab().context("map CEMB vector slab")?;
        Ok(set)
    }

    /// Write atomically: temp file, fsync, rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create cache directory {parent:?}"))?;
        let temp_path = path.with_extension("cemb.tmp");
        let mut file = File::create(&temp_path)
            .with_context(|| format!("create temp CEMB file {temp_path:?}"))?;
        self.write_to(&mut file)?;
        file.sync_all().context("fsync CEMB temp file")?;
        std::fs::rename(&temp_path, path)
            .with_context(|| format!("rename CEMB temp file {temp_path:?}"))?;
        sync_dir(parent).context("fsync CEMB directory post-rename")?;
        Ok(())
    }

    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        if cfg!(target_endian = "big") {
            bail!("CEMB write is only supported on little-endian targets");
        }
        self.validate()?;
        let header_len = self.header.header_len_bytes()?;
        let written = self.header.write_to(&mut writer)?;
        if written != header_len {
            bail!("header length mismatch: expected {header_len}, wrote {written}");
        }

        for hash in &self.content_hashes {
            writer.write_all(hash)?;
        }

        let hashes_len = hashes_size_bytes(self.header.count)?;
        let slab_offset = vector_slab_offset_bytes(header_len, self.header.count)?;
        let padding_len = slab_offset
            .checked_sub(header_len + hashes_len)
            .ok_or_else(|| anyhow!("padding length underflow"))?;
        if padding_len > 0 {
            writer.write_all(&vec![0u8; padding_len])?;
        }

        match &self.vectors {
            VectorStorage::F32(values) => writer.write_all(f32_as_bytes(values))?,
            VectorStorage::F16(values) => writer.write_all(f16_as_bytes(values))?,
            VectorStorage::Mmap { mmap, offset, len } => {
                let bytes = mmap
                    .get(*offset..offset + len)
                    .ok_or_else(|| anyhow!("vector slab out of bounds"))?;
                writer.write_all(bytes)?;
            }
        }
        Ok(())
    }

    pub fn slab(&self) -> Result<VectorSlab<'_>> {
        match &self.vectors {
            VectorStorage::F32(values) => Ok(VectorSlab::F32(values)),
            VectorStorage::F16(values) => Ok(VectorSlab::F16(values)),
            VectorStorage::Mmap { mmap, offset, len } => {
                let bytes = mmap
                    .get(*offset..offset + len)
                    .ok_or_else(|| anyhow!("vector slab out of bounds"))?;
                match self.header.quantization {
                    Quantization::F32 => Ok(VectorSlab::F32(bytes_as_f32(bytes)?)),
                    Quantization::F16 => Ok(VectorSlab::F16(bytes_as_f16(bytes)?)),
                }
            }
        }
    }

    /// Decoded vector for entry `idx`.
    pub fn vector(&self, idx: usize) -> Option<Vec<f32>> {
        let dim = self.dimension();
        let start = idx.checked_mul(dim)?;
        let end = start.checked_add(dim)?;
        match self.slab().ok()? {
            VectorSlab::F32(values) => values.get(start..end).map(<[f32]>::to_vec),
            VectorSlab::F16(values) => values
                .get(start..end)
                .map(|s| s.iter().map(|v| f32::from(*v)).collect()),
        }
    }

    pub fn header(&self) -> &CacheHeader {
        &self.header
    }

    pub fn embedder_id(&self) -> &str {
        &self.header.embedder_id
    }

    pub fn dimension(&self) -> usize {
        self.header.dimension as usize
    }

    pub fn quantization(&self) -> Quantization {
        self.header.quantization
    }

    pub fn len(&self) -> usize {
        self.header.count as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.count == 0
    }

    pub fn content_hashes(&self) -> &[[u8; CONTENT_HASH_BYTES]] {
        &self.content_hashes
    }

    fn validate(&self) -> Result<()> {
        self.header.validate()?;
        if self.content_hashes.len() != self.header.count as usize {
            bail!(
                "content hash count mismatch: expected {}, got {}",
                self.header.count,
                self.content_hashes.len()
            );
        }
        let expected = vector_slab_size_bytes(
            self.header.count,
            self.header.dimension,
            self.header.quantization,
        )?;
        let actual = match &self.vectors {
            VectorStorage::F32(values) => values.len() * 4,
            VectorStorage::F16(values) => values.len() * 2,
            VectorStorage::Mmap { len, .. } => *len,
        };
        if expected != actual {
            bail!("vector slab size mismatch: expected {expected}, got {actual}");
        }
        Ok(())
    }
}

/// How `get_or_build` produced its set.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheOutcome {
    /// Reused the persisted cache; the embedder was not called.
    Loaded,
    /// Computed fresh vectors. `persisted` is false when the write failed.
    Built {
        reason: RebuildReason,
        persisted: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RebuildReason {
    Regenerate,
    Missing,
    Unreadable(CacheError),
    Stale(CacheError),
}

/// Read a cache file, mapping codec failures to [`CacheError::Read`].
pub fn read_cache(path: &Path) -> Result<EmbeddingSet, CacheError> {
    EmbeddingSet::load(path).map_err(|e| CacheError::Read {
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })
}

/// Persist a set, mapping failures to [`CacheError::Write`].
pub fn write_cache(set: &EmbeddingSet, path: &Path) -> Result<(), CacheError> {
    set.save(path).map_err(|e| CacheError::Write {
        path: path.to_path_buf(),
        reason: format!("{e:#}"),
    })
}

/// Check a loaded cache against the embedder and entries it must serve.
pub fn check_compatible(
    set: &EmbeddingSet,
    entries: &[Entry],
    embedder: &dyn Embedder,
    validation: CacheValidation,
) -> Result<(), CacheError> {
    if set.embedder_id() != embedder.id() {
        return Err(CacheError::Mismatch(format!(
            "built by embedder '{}', expected '{}'",
            set.embedder_id(),
            embedder.id()
        )));
    }
    if set.dimension() != embedder.dimension() {
        return Err(CacheError::Mismatch(format!(
            "dimension {}, expected {}",
            set.dimension(),
            embedder.dimension()
        )));
    }
    if set.len() != entries.len() {
        return Err(CacheError::Mismatch(format!(
            "{} vectors for {} entries",
            set.len(),
            entries.len()
        )));
    }
    if validation == CacheValidation::Fingerprint {
        let changed = entries
            .iter()
            .zip(set.content_hashes())
            .filter(|(entry, hash)| content_hash(entry.text()) != **hash)
            .count();
        if changed > 0 {
            return Err(CacheError::Mismatch(format!(
                "{changed} entries changed since the cache was built"
            )));
        }
    }
    Ok(())
}

/// Reuse the cache at `path` or embed every entry and persist the result.
///
/// Only embedder failures are returned. An unreadable or incompatible cache
/// is rebuilt; a failed write is logged and the fresh vectors are served.
pub fn get_or_build(
    entries: &[Entry],
    embedder: &dyn Embedder,
    path: &Path,
    regenerate: bool,
    settings: CacheSettings,
    progress: Option<&ProgressBar>,
) -> EmbedderResult<(EmbeddingSet, CacheOutcome)> {
    let reason = if regenerate {
        RebuildReason::Regenerate
    } else if !path.exists() {
        RebuildReason::Missing
    } else {
        match read_cache(path) {
            Ok(set) => match check_compatible(&set, entries, embedder, settings.validation) {
                Ok(()) => {
                    info!(path = %path.display(), entries = set.len(), "cache_hit");
                    return Ok((set, CacheOutcome::Loaded));
                }
                Err(err) => RebuildReason::Stale(err),
            },
            Err(err) => RebuildReason::Unreadable(err),
        }
    };
    info!(path = %path.display(), reason = ?reason, entries = entries.len(), "cache_miss");

    let set = build(entries, embedder, settings.quantization, progress)?;
    let persisted = match write_cache(&set, path) {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "cache_write_failed");
            false
        }
    };
    Ok((set, CacheOutcome::Built { reason, persisted }))
}

/// Embed every entry in index order. Vectors are stored L2-normalized.
pub fn build(
    entries: &[Entry],
    embedder: &dyn Embedder,
    quantization: Quantization,
    progress: Option<&ProgressBar>,
) -> EmbedderResult<EmbeddingSet> {
    let started = Instant::now();
    if let Some(pb) = progress {
        pb.set_length(entries.len() as u64);
        pb.set_position(0);
    }

    let mut vectors = Vec::with_capacity(entries.len());
    let mut hashes = Vec::with_capacity(entries.len());
    for chunk in entries.chunks(EMBED_CHUNK_SIZE) {
        let texts: Vec<String> = chunk
            .iter()
            .map(|e| canonicalize_for_embedding(e.text()))
            .collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let batch = embedder.embed_batch(&refs)?;
        if batch.len() != chunk.len() {
            return Err(EmbedderError::Failed(format!(
                "expected {} vectors, got {}",
                chunk.len(),
                batch.len()
            )));
        }
        vectors.extend(batch.into_iter().map(|mut v| {
            l2_normalize(&mut v);
            v
        }));
        hashes.extend(chunk.iter().map(|e| content_hash(e.text())));
        if let Some(pb) = progress {
            pb.inc(chunk.len() as u64);
        }
    }

    let set = EmbeddingSet::from_vectors(
        embedder.id(),
        embedder.dimension(),
        quantization,
        vectors,
        hashes,
    )
    .map_err(|e| EmbedderError::Failed(format!("{e:#}")))?;

    debug!(
        embedder = embedder.id(),
        entries = set.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "embeddings_built"
    );
    Ok(set)
}

pub fn hashes_size_bytes(count: u32) -> Result<usize> {
    (count as usize)
        .checked_mul(CONTENT_HASH_BYTES)
        .ok_or_else(|| anyhow!("hash table size overflow for count {count}"))
}

pub fn vector_slab_offset_bytes(header_len: usize, count: u32) -> Result<usize> {
    let end = header_len
        .checked_add(hashes_size_bytes(count)?)
        .ok_or_else(|| anyhow!("offset overflow"))?;
    Ok(align_up(end, VECTOR_ALIGN_BYTES))
}

pub fn vector_slab_size_bytes(
    count: u32,
    dimension: u32,
    quantization: Quantization,
) -> Result<usize> {
    (count as usize)
        .checked_mul(dimension as usize)
        .and_then(|n| n.checked_mul(quantization.bytes_per_component()))
        .ok_or_else(|| anyhow!("vector slab size overflow"))
}

fn align_up(value: usize, align: usize) -> usize {
    if align == 0 {
        return value;
    }
    let rem = value % align;
    if rem == 0 { value } else { value + (align - rem) }
}

fn bytes_as_f32(bytes: &[u8]) -> Result<&[f32]> {
    if !bytes.len().is_multiple_of(4) {
        bail!("f32 byte slice length is not a multiple of 4");
    }
    // SAFETY: length and alignment are checked before the slice is used.
    let (prefix, aligned, suffix) = unsafe { bytes.align_to::<f32>() };
    if !prefix.is_empty() || !suffix.is_empty() {
        bail!("f32 byte slice is not aligned");
    }
    Ok(aligned)
}

fn bytes_as_f16(bytes: &[u8]) -> Result<&[f16]> {
    if !bytes.len().is_multiple_of(2) {
        bail!("f16 byte slice length is not a multiple of 2");
    }
    // SAFETY: length and alignment are checked before the slice is used.
    let (prefix, aligned, suffix) = unsafe { bytes.align_to::<f16>() };
    if !prefix.is_empty() || !suffix.is_empty() {
        bail!("f16 byte slice is not aligned");
    }
    Ok(aligned)
}

fn f32_as_bytes(values: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, values.len() * 4) }
}

fn f16_as_bytes(values: &[f16]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(values.as_ptr() as *const u8, values.len() * 2) }
}

fn sync_dir(path: &Path) -> Result<()> {
    File::open(path)?.sync_all()?;
    Ok(())
}

fn read_u16_le<R: Read>(reader: &mut R, header_bytes: &mut Vec<u8>) -> Result<u16> {
    Ok(u16::from_le_bytes(read_exact_array::<2, _>(
        reader,
        header_bytes,
    )?))
}

fn read_u32_le<R: Read>(reader: &mut R, header_bytes: &mut Vec<u8>) -> Result<u32> {
    Ok(u32::from_le_bytes(read_exact_array::<4, _>(
        reader,
        header_bytes,
    )?))
}

fn read_exact_vec<R: Read>(
    reader: &mut R,
    len: usize,
    header_bytes: &mut Vec<u8>,
) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    header_bytes.extend_from_slice(&buf);
    Ok(buf)
}

fn read_exact_array<const N: usize, R: Read>(
    reader: &mut R,
    header_bytes: &mut Vec<u8>,
) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    reader.read_exact(&mut buf)?;
    header_bytes.extend_from_slice(&buf);
    Ok(buf)
}
