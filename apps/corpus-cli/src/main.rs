//! corpus-search: query the passage corpus from the command line.
//!
//! ```bash
//! corpus-search "god-touch" --type exact
//! corpus-search "divine love" --group CWM --top-k 5 --json
//! corpus-search --facets
//! ```
//!
//! Asset locations and defaults come from `config.toml` / `config.<env>.toml`
//! / `APP_*` variables. Logs go to stderr (`RUST_LOG` overrides the level).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use corpus_core::config::Config;
use corpus_core::{Facet, MatchResult, SearchRequest, SearchType};
use corpus_hybrid::{DiskLoader, HybridSearchEngine};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    All,
    Exact,
    AllWords,
    Semantic,
}

impl From<Mode> for SearchType {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::All => SearchType::All,
            Mode::Exact => SearchType::Exact,
            Mode::AllWords => SearchType::AllWords,
            Mode::Semantic => SearchType::Semantic,
        }
    }
}

/// Hybrid passage search: exact, all-words and semantic matching in one ranked list.
#[derive(Parser)]
#[command(name = "corpus-search", version, about)]
struct Cli {
    /// Search query
    query: Option<String>,

    /// Matching strategy
    #[arg(long = "type", value_enum, default_value = "all")]
    mode: Mode,

    /// Maximum number of results (default: search.default_top_k)
    #[arg(long)]
    top_k: Option<usize>,

    /// Drop hits whose snippet is shorter than this (default: search.min_snippet_length)
    #[arg(long)]
    min_snippet: Option<usize>,

    #[arg(long)]
    author: Option<String>,

    #[arg(long)]
    group: Option<String>,

    #[arg(long)]
    book_title: Option<String>,

    /// Directory relative asset paths resolve against
    #[arg(long, default_value = ".")]
    base_dir: PathBuf,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    /// List the distinct author, group and book title values instead of searching
    #[arg(long)]
    facets: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let settings = config.search_settings()?;
    let loader = Arc::new(DiskLoader::new(settings.index_table.clone()));
    let engine = HybridSearchEngine::from_config(&config, loader)?.with_base_dir(&cli.base_dir);

    if cli.facets {
        let catalog = engine.facets()?;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&catalog)?);
        } else {
            for facet in Facet::ALL {
                println!("{facet}:");
                for value in catalog.values(facet) {
                    println!("  {value}");
                }
            }
        }
        return Ok(());
    }

    let Some(query) = cli.query.as_deref() else { bail!("no search query provided; use --help for usage") };
    let mut request = SearchRequest::new(query)
        .search_type(cli.mode.into())
        .top_k(cli.top_k.unwrap_or(settings.default_top_k))
        .min_snippet_length(cli.min_snippet.unwrap_or(settings.min_snippet_length));
    let facets = [(Facet::Author, &cli.author), (Facet::Group, &cli.group), (Facet::BookTitle, &cli.book_title)];
    for (facet, value) in facets {
        if let Some(value) = value {
            request = request.filter(facet, value.as_str());
        }
    }

    let results = engine.search(&request)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        print_human(query, &results);
    }
    Ok(())
}

fn print_human(query: &str, results: &[MatchResult]) {
    println!("Found {} results for \"{}\"", results.len(), query);
    for (i, r) in results.iter().enumerate() {
        println!(
            "\n  {}. [{}] {} / {} / {}  p.{}  priority={} distance={:.4}",
            i + 1,
            r.category_priority(),
            r.author,
            r.book_title,
            r.chapter_name,
            r.page_number,
            r.priority,
            r.distance
        );
        println!("     {}", r.snippet.replace("<br/>", " "));
    }
}
