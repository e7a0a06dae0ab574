//! codetrace CLI — thin shell over the library crate.
//!
//! Each subcommand calls straight into a `query`/`ingest` function and prints
//! its JSON result payload to stdout; this is the "host" for manually
//! exercising the engine, not a protocol implementation (see SPEC_FULL.md §1).

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use serde_json::json;

use codetrace::config::resolve_base_path;
use codetrace::ingest::ingest_repo;
use codetrace::query;
use codetrace::store::IndexStore;
use codetrace::summary::FallbackSummarizer;

/// codetrace — multi-language symbol indexer and ranked code search engine.
#[derive(Parser)]
#[command(name = "codetrace", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override the index base path (default: resolved via config/env/home)
    #[arg(long, global = true)]
    base_path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Index (or incrementally reindex) a local directory
    Index {
        /// Path to the directory to index
        path: PathBuf,

        /// Repository label as owner/name
        #[arg(long)]
        repo: String,
    },
    /// Ranked symbol search
    Search {
        /// Repository label (owner/name or unique bare name)
        repo: String,
        /// Search query
        query: String,
        /// Filter by symbol kind (function, class, method, constant, type)
        #[arg(long)]
        kind: Option<String>,
        /// Filter by file glob pattern
        #[arg(long)]
        file: Option<String>,
        /// Filter by language
        #[arg(long)]
        language: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Substring search across indexed file bodies
    Grep {
        /// Repository label (owner/name or unique bare name)
        repo: String,
        /// Search query
        query: String,
        /// Filter by file glob pattern
        #[arg(long)]
        file: Option<String>,
        /// Maximum number of results
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Repository-level outline: file/symbol counts, languages, directories
    Outline {
        /// Repository label (owner/name or unique bare name)
        repo: String,
    },
    /// All symbols declared in one file
    FileOutline {
        /// Repository label (owner/name or unique bare name)
        repo: String,
        /// File path, relative to the repo root
        file: String,
    },
    /// Fetch one symbol's metadata and exact source by id
    Symbol {
        /// Repository label (owner/name or unique bare name)
        repo: String,
        /// Stable symbol id
        id: String,
        /// Re-hash the retrieved bytes and report whether they still match
        #[arg(long)]
        verify: bool,
        /// Lines of surrounding context to include
        #[arg(long, default_value = "0")]
        context: usize,
    },
    /// List every indexed repository
    ListRepos,
    /// Delete a repository's manifest and mirrored content
    Invalidate {
        /// Repository label (owner/name or unique bare name)
        repo: String,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("codetrace=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let store = IndexStore::new(resolve_base_path(cli.base_path.as_deref()));

    let result = match cli.command {
        Commands::Index { path, repo } => {
            let Some((owner, name)) = repo.split_once('/') else {
                eprintln!("--repo must be in owner/name form");
                std::process::exit(2);
            };
            ingest_repo(&store, owner, name, &path, &FallbackSummarizer)
        }
        Commands::Search { repo, query, kind, file, language, limit } => query::search_symbols(
            &store,
            &repo,
            &query,
            kind.as_deref(),
            file.as_deref(),
            language.as_deref(),
            limit,
        ),
        Commands::Grep { repo, query, file, limit } => query::search_text(&store, &repo, &query, file.as_deref(), limit),
        Commands::Outline { repo } => query::get_repo_outline(&store, &repo),
        Commands::FileOutline { repo, file } => query::get_file_outline(&store, &repo, &file),
        Commands::Symbol { repo, id, verify, context } => query::get_symbol(&store, &repo, &id, verify, context),
        Commands::ListRepos => query::list_repos(&store),
        Commands::Invalidate { repo } => query::invalidate_cache(&store, &repo),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
            return;
        }
    };

    let is_error = result.get("error").is_some();
    match serde_json::to_string_pretty(&result) {
        Ok(s) => println!("{s}"),
        Err(e) => println!("{}", json!({ "error": format!("failed to serialize result: {e}") })),
    }
    if is_error {
        std::process::exit(1);
    }
}
