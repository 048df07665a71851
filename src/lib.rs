pub mod config;
pub mod corpus;
pub mod model;
pub mod search;

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use config::SearchConfig;
use model::types::{ContentType, SearchProfile};
use search::model_manager::{ModelRegistry, list_models};
use search::pipeline::{PipelineError, collate_results, render_results};
use search::registry::{ReloadOutcome, ReloadReport, SearchRegistry};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "csearch",
    version,
    about = "Semantic search over notes, music and ledger corpora"
)]
pub struct Cli {
    /// Path to config.toml (defaults to <data dir>/config.toml)
    #[arg(long, global = true, env = "CSEARCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load corpora and build or reuse their embedding caches
    Index {
        /// Only this content type (notes, music, ledger)
        #[arg(long = "type", value_name = "TYPE")]
        content_type: Option<ContentType>,

        /// Recompute embeddings even when a cache exists
        #[arg(long)]
        regenerate: bool,
    },
    /// Run one query and print the ranked entries
    Search {
        query: String,

        /// Content type to search (first configured when omitted)
        #[arg(long = "type", value_name = "TYPE")]
        content_type: Option<ContentType>,

        /// Number of results to render
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,

        /// Also print the coarse retrieval ranking
        #[arg(long)]
        show_coarse: bool,

        /// Emit results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Read queries from stdin until `exit`
    Interactive {
        #[arg(long = "type", value_name = "TYPE")]
        content_type: Option<ContentType>,

        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
    /// List registered embedders and rerankers
    Models {
        #[arg(long)]
        json: bool,
    },
}

/// Install the fmt subscriber for the binary.
///
/// `RUST_LOG` wins when set; otherwise `-v` picks the level.
pub fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> Result<()> {
    let config = SearchConfig::load(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Index {
            content_type,
            regenerate,
        } => run_index(&config, content_type, regenerate),
        Commands::Search {
            query,
            content_type,
            count,
            show_coarse,
            json,
        } => {
            let registry = open_registry(&config, content_type)?;
            let mut out = std::io::stdout().lock();
            run_query(&registry, &query, content_type, count, show_coarse, json, &mut out)
        }
        Commands::Interactive {
            content_type,
            count,
        } => {
            let registry = open_registry(&config, content_type)?;
            let stdin = std::io::stdin().lock();
            let mut out = std::io::stdout().lock();
            run_interactive(&registry, content_type, count, stdin, &mut out)
        }
        Commands::Models { json } => {
            let models = list_models(&config.models_dir(SearchProfile::Asymmetric));
            let mut out = std::io::stdout().lock();
            if json {
                serde_json::to_writer_pretty(&mut out, &models)?;
                writeln!(out)?;
            } else {
                for m in &models {
                    writeln!(
                        out,
                        "{:<9} {:<20} {:<10} {:<10} {}",
                        m.kind,
                        m.name,
                        if m.supported { "supported" } else { "no-runtime" },
                        if m.installed { "installed" } else { "missing" },
                        m.description
                    )?;
                }
            }
            Ok(())
        }
    }
}

fn run_index(config: &SearchConfig, content_type: Option<ContentType>, regenerate: bool) -> Result<()> {
    if config.configured_types().is_empty() {
        bail!("no content types configured; add a [content_type.<notes|music|ledger>] table");
    }

    let progress = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
        progress.set_style(style.progress_chars("█░"));
    }
    let registry = SearchRegistry::new(ModelRegistry::new());
    let report = registry.rebuild(config, content_type, regenerate, Some(&progress));
    progress.finish_and_clear();

    let mut out = std::io::stdout().lock();
    for (t, outcome) in &report.outcomes {
        match outcome {
            ReloadOutcome::Installed {
                entries,
                cache_reused,
            } => writeln!(
                out,
                "{t}: {entries} entries ({})",
                if *cache_reused { "cache reused" } else { "embeddings computed" }
            )?,
            ReloadOutcome::Failed { error } => writeln!(out, "{t}: failed: {error}")?,
            ReloadOutcome::NotConfigured => writeln!(out, "{t}: not configured")?,
        }
    }
    if !report.is_success() {
        bail!("{} content type(s) failed to index", count_unsuccessful(&report));
    }
    Ok(())
}

fn count_unsuccessful(report: &ReloadReport) -> usize {
    report
        .outcomes
        .iter()
        .filter(|(_, o)| !matches!(o, ReloadOutcome::Installed { .. }))
        .count()
}

/// Registry with the requested type (or every configured type) loaded.
fn open_registry(config: &SearchConfig, content_type: Option<ContentType>) -> Result<SearchRegistry> {
    if let Some(t) = content_type
        && config.content(t).is_none()
    {
        return Err(PipelineError::NotConfigured(t).into());
    }

    let registry = SearchRegistry::new(ModelRegistry::new());
    let report = registry.reload(config, content_type);
    if let Some((t, error)) = report.failures().next()
        && registry.installed().is_empty()
    {
        bail!("failed to load {t}: {error}");
    }
    Ok(registry)
}

/// Run one query against the registry and write the rendered results.
pub fn run_query<W: Write>(
    registry: &SearchRegistry,
    query: &str,
    content_type: Option<ContentType>,
    count: usize,
    show_coarse: bool,
    json: bool,
    out: &mut W,
) -> Result<()> {
    let Some((pipeline, hits)) = registry.query(query, content_type)? else {
        bail!("no content type is loaded");
    };
    if json {
        let results = collate_results(&hits, pipeline.entries(), count);
        serde_json::to_writer_pretty(&mut *out, &results)?;
        writeln!(out)?;
    } else {
        write!(
            out,
            "{}",
            render_results(&hits, pipeline.entries(), count, show_coarse)
        )?;
    }
    Ok(())
}

/// Prompt for queries on `input` until `exit` or end of input.
pub fn run_interactive<R: BufRead, W: Write>(
    registry: &SearchRegistry,
    content_type: Option<ContentType>,
    count: usize,
    mut input: R,
    out: &mut W,
) -> Result<()> {
    let mut line = String::new();
    loop {
        write!(out, "Enter your query: ")?;
        out.flush()?;

        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Ok(());
        }
        let query = line.trim_end_matches(['\n', '\r']);
        if query == "exit" {
            return Ok(());
        }
        run_query(registry, query, content_type, count, false, false, out)?;
    }
}
