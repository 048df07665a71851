//! Search configuration.
//!
//! Resolution order (highest priority first):
//! 1. Environment variables (`CSEARCH_*`, `.env` honored via dotenvy)
//! 2. Config file (`<data_dir>/config.toml` unless a path is given)
//! 3. Compiled defaults
//!
//! ```toml
//! [search_type.asymmetric]
//! embedder = "minilm"
//! reranker = "bge-reranker"
//! top_k = 100
//!
//! [content_type.notes]
//! compressed_jsonl = "notes.jsonl.gz"
//! embeddings_file = "notes_embeddings.cemb"
//! ```
//!
//! Relative paths resolve against the directory holding the config file;
//! a leading `~` expands to the home directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::types::{ContentType, SearchProfile};
use crate::search::embedder_registry::models_dir;
use crate::search::embedding_cache::{CacheSettings, CacheValidation, Quantization};

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_TOP_K: usize = 100;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

/// Models and candidate budget shared by every content type on a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Registered embedder name; `None` picks the best installed one.
    pub embedder: Option<String>,
    /// Registered reranker name; `None` picks the best installed one.
    pub reranker: Option<String>,
    /// Candidates retrieved before filtering and re-ranking.
    pub top_k: usize,
    /// Model cache directory; defaults to `<data_dir>/models`.
    pub model_dir: Option<PathBuf>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            embedder: None,
            reranker: None,
            top_k: DEFAULT_TOP_K,
            model_dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTypes {
    pub asymmetric: ProfileConfig,
    pub symmetric: ProfileConfig,
}

/// Corpus and cache locations for one content type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentConfig {
    pub compressed_jsonl: PathBuf,
    pub embeddings_file: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<SearchProfile>,
    #[serde(default)]
    pub cache_validation: CacheValidation,
    #[serde(default)]
    pub quantization: Quantization,
}

impl ContentConfig {
    pub fn new(compressed_jsonl: impl Into<PathBuf>, embeddings_file: impl Into<PathBuf>) -> Self {
        Self {
            compressed_jsonl: compressed_jsonl.into(),
            embeddings_file: embeddings_file.into(),
            profile: None,
            cache_validation: CacheValidation::default(),
            quantization: Quantization::default(),
        }
    }

    pub fn profile_for(&self, content_type: ContentType) -> SearchProfile {
        self.profile
            .unwrap_or_else(|| content_type.default_profile())
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            validation: self.cache_validation,
            quantization: self.quantization,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentTypes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<ContentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music: Option<ContentConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<ContentConfig>,
}

impl ContentTypes {
    pub fn get(&self, content_type: ContentType) -> Option<&ContentConfig> {
        match content_type {
            ContentType::Notes => self.notes.as_ref(),
            ContentType::Music => self.music.as_ref(),
            ContentType::Ledger => self.ledger.as_ref(),
        }
    }

    fn get_mut(&mut self, content_type: ContentType) -> Option<&mut ContentConfig> {
        match content_type {
            ContentType::Notes => self.notes.as_mut(),
            ContentType::Music => self.music.as_mut(),
            ContentType::Ledger => self.ledger.as_mut(),
        }
    }

    pub fn set(&mut self, content_type: ContentType, config: ContentConfig) {
        let slot = match content_type {
            ContentType::Notes => &mut self.notes,
            ContentType::Music => &mut self.music,
            ContentType::Ledger => &mut self.ledger,
        };
        *slot = Some(config);
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub data_dir: Option<PathBuf>,
    pub search_type: SearchTypes,
    pub content_type: ContentTypes,
}

impl SearchConfig {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// file that was asked for explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = default_config_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: SearchConfig =
            toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    /// Parse a TOML string, resolving relative paths against `base_dir`.
    pub fn from_toml(toml_str: &str, base_dir: &Path) -> Result<Self, ConfigError> {
        let mut config: SearchConfig =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse {
                path: "<string>".to_string(),
                message: e.to_string(),
            })?;
        config.resolve_paths(base_dir);
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = dotenvy::var("CSEARCH_DATA_DIR")
            && !val.trim().is_empty()
        {
            self.data_dir = Some(expand_home(Path::new(val.trim())));
        }

        if let Ok(val) = dotenvy::var("CSEARCH_TOP_K")
            && let Ok(top_k) = val.trim().parse()
        {
            self.search_type.asymmetric.top_k = top_k;
            self.search_type.symmetric.top_k = top_k;
        }

        if let Ok(val) = dotenvy::var("CSEARCH_EMBEDDER")
            && !val.trim().is_empty()
        {
            self.search_type.asymmetric.embedder = Some(val.trim().to_string());
            self.search_type.symmetric.embedder = Some(val.trim().to_string());
        }

        if let Ok(val) = dotenvy::var("CSEARCH_RERANKER")
            && !val.trim().is_empty()
        {
            self.search_type.asymmetric.reranker = Some(val.trim().to_string());
            self.search_type.symmetric.reranker = Some(val.trim().to_string());
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for content_type in ContentType::ALL {
            let Some(content) = self.content_type.get(content_type) else {
                continue;
            };
            if content.compressed_jsonl.as_os_str().is_empty() {
                return Err(ConfigError::Invalid {
                    field: format!("content_type.{content_type}.compressed_jsonl"),
                    message: "must not be empty".to_string(),
                });
            }
            if content.embeddings_file.as_os_str().is_empty() {
                return Err(ConfigError::Invalid {
                    field: format!("content_type.{content_type}.embeddings_file"),
                    message: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let Some(dir) = self.data_dir.take() {
            self.data_dir = Some(resolve_path(base, &dir));
        }
        for profile in [
            &mut self.search_type.asymmetric,
            &mut self.search_type.symmetric,
        ] {
            if let Some(dir) = profile.model_dir.take() {
                profile.model_dir = Some(resolve_path(base, &dir));
            }
        }
        for content_type in ContentType::ALL {
            if let Some(content) = self.content_type.get_mut(content_type) {
                content.compressed_jsonl = resolve_path(base, &content.compressed_jsonl);
                content.embeddings_file = resolve_path(base, &content.embeddings_file);
            }
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    pub fn profile(&self, profile: SearchProfile) -> &ProfileConfig {
        match profile {
            SearchProfile::Asymmetric => &self.search_type.asymmetric,
            SearchProfile::Symmetric => &self.search_type.symmetric,
        }
    }

    /// Model cache directory for a profile.
    pub fn models_dir(&self, profile: SearchProfile) -> PathBuf {
        self.profile(profile)
            .model_dir
            .clone()
            .unwrap_or_else(|| models_dir(&self.data_dir()))
    }

    pub fn content(&self, content_type: ContentType) -> Option<&ContentConfig> {
        self.content_type.get(content_type)
    }

    /// Configured content types in dispatch order.
    pub fn configured_types(&self) -> Vec<ContentType> {
        ContentType::ALL
            .into_iter()
            .filter(|t| self.content_type.get(*t).is_some())
            .collect()
    }
}

pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("com", "corpus-search", "corpus-search").map_or_else(
        || PathBuf::from(".corpus-search"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

/// `<data_dir>/config.toml`, honoring `CSEARCH_DATA_DIR`.
pub fn default_config_path() -> PathBuf {
    let data_dir = dotenvy::var("CSEARCH_DATA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| expand_home(Path::new(v.trim())))
        .unwrap_or_else(default_data_dir);
    data_dir.join(CONFIG_FILE_NAME)
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match directories::BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand_home(path);
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}
