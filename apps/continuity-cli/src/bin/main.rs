use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use continuity_context::{ContinuityEngine, Startup};
use continuity_core::config::{Config, Settings};
use continuity_embed::get_default_embedder;

const PREVIEW_CHARS: usize = 300;

#[derive(Parser, Debug)]
#[command(name = "continuity", about = "Index continuity notes and assemble session context from them")]
struct Cli {
    /// Directory holding the continuity documents; overrides `corpus.root`.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the index, or load the persisted one when it is intact.
    Index {
        /// Rebuild even when a persisted index exists.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Print the chunks closest to a query.
    Query {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
        #[arg(long, default_value_t = 3)]
        top_k: usize,
    },
    /// Print (or write) the assembled session context.
    Context {
        #[arg(long)]
        project: Option<String>,
        /// Use this query instead of the default session query.
        #[arg(long)]
        query: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let mut settings = config.settings()?;
    if let Some(root) = &cli.root {
        settings.corpus.root = root.to_string_lossy().into_owned();
    }

    match cli.command {
        Commands::Index { force } => {
            let (engine, startup) = open_engine(settings, force)?;
            match startup {
                Startup::Loaded { chunks } => println!("Loaded existing index ({} chunks)", chunks),
                Startup::Built(report) => {
                    println!(
                        "Indexed {} chunks from {} of {} matched documents",
                        report.chunks, report.files_indexed, report.files_matched
                    );
                    for skipped in &report.skipped {
                        println!("  skipped {}: {}", skipped.path, skipped.reason);
                    }
                }
            }
            println!("Index file: {}", engine.index_path().display());
        }
        Commands::Query { text, top_k } => {
            let (engine, _) = open_engine(settings, false)?;
            let query = text.join(" ");
            println!("\nQuery: {}\n", query);
            let results = engine.retrieve(&query, top_k)?;
            if results.is_empty() {
                println!("Nothing indexed yet.");
            }
            for (i, result) in results.iter().enumerate() {
                println!("\n--- Result {} (relevance: {:.3}) ---", i + 1, result.relevance);
                println!("File: {}", result.chunk.meta.source_path);
                println!("Type: {}", result.chunk.category());
                let preview: String = result.chunk.text.chars().take(PREVIEW_CHARS).collect();
                println!("Content:\n{}...", preview);
            }
        }
        Commands::Context { project, query, output } => {
            let (engine, _) = open_engine(settings, false)?;
            let context = engine.assemble_session_context(query.as_deref(), project.as_deref())?;
            match output {
                Some(path) => {
                    fs::write(&path, &context).with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), bytes = context.len(), "context written");
                }
                None => println!("\n{}", context),
            }
        }
    }
    Ok(())
}

fn open_engine(settings: Settings, force: bool) -> anyhow::Result<(ContinuityEngine, Startup)> {
    settings.validate()?;
    let embedder = get_default_embedder(&settings.embedding)?;
    let engine = ContinuityEngine::new(settings, embedder)?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Preparing index under {}", engine.settings().corpus.root));
    spinner.enable_steady_tick(Duration::from_millis(120));
    let startup = engine.load_or_build(force);
    spinner.finish_and_clear();

    let startup = startup.with_context(|| format!("preparing index at {}", engine.index_path().display()))?;
    Ok((engine, startup))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
