//! CLI entry point for the journal matcher.

use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use journal_matcher_core::{
    CandidateJournal, EngineConfig, Explanation, MatchEngine, OpenAlexSource, SearchResponse,
    SignalStatus, load_config,
};
use tracing::{debug, info};

mod cli;

use cli::{Args, Command, ExplainArgs, SearchArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let loaded = load_config(args.config.as_deref())?;
    debug!(
        path = ?loaded.path,
        from_file = loaded.loaded_from_file,
        "Engine config resolved"
    );
    let mut config = loaded.config;
    if let Some(mailto) = args.mailto.clone() {
        config.source.mailto = Some(mailto);
    }

    match &args.command {
        Command::Search(search) => run_search(config, search, args.quiet).await,
        Command::Explain(explain) => run_explain(config, explain).await,
    }
}

fn build_engine(config: EngineConfig) -> Result<MatchEngine> {
    let source = OpenAlexSource::with_base_url(
        &config.source.base_url,
        config.source.mailto.clone(),
        config.source.http_timeouts(),
    )
    .context("Failed to create OpenAlex client")?;
    MatchEngine::new(Arc::new(source), config)
}

async fn run_search(config: EngineConfig, args: &SearchArgs, quiet: bool) -> Result<()> {
    let engine = build_engine(config)?;

    // Validation happens before any network call.
    let query = engine.build_query(
        &args.title,
        &args.abstract_text,
        &args.keywords,
        args.open_access,
    )?;

    let spinner = (!quiet && !args.json && io::stderr().is_terminal()).then(start_spinner);
    let response = engine.search_with_cancel(&query, ctrl_c()).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let mut response = response?;

    // Only the shown rows get explanations.
    response.candidates.truncate(usize::from(args.limit));
    engine.annotate(&query, &mut response.candidates);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        print_search(&response);
    }
    info!(
        total_found = response.total_found,
        shown = response.candidates.len(),
        "Search finished"
    );
    Ok(())
}

async fn run_explain(config: EngineConfig, args: &ExplainArgs) -> Result<()> {
    let engine = build_engine(config)?;
    let explanation = engine
        .explain(&args.journal_id, &args.abstract_text)
        .await?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&explanation)?);
    } else {
        print_explanation(&args.journal_id, &explanation);
    }
    Ok(())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

fn start_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Searching OpenAlex...");
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

fn print_search(response: &SearchResponse) {
    match response.discipline_detections.first() {
        Some(primary) => {
            let d = primary.discipline();
            println!(
                "Discipline: {} ({}) confidence {:.0}%",
                d.subfield_name,
                d.field_name.as_deref().unwrap_or("unknown field"),
                d.confidence * 100.0
            );
            for secondary in response.discipline_detections.iter().skip(1) {
                let d = secondary.discipline();
                println!("  also: {} {:.0}%", d.subfield_name, d.confidence * 100.0);
            }
        }
        None => println!("Discipline: not detected"),
    }

    for outcome in &response.signal_report {
        if outcome.status != SignalStatus::Completed {
            println!("Note: {} search {:?}", outcome.signal, outcome.status);
        }
    }

    if response.candidates.is_empty() {
        println!("No journals found.");
        return;
    }

    println!(
        "Showing {} of {} journals",
        response.candidates.len(),
        response.total_found
    );
    for (rank, candidate) in response.candidates.iter().enumerate() {
        print_candidate(rank + 1, candidate);
    }
}

fn print_candidate(rank: usize, c: &CandidateJournal) {
    let signals: Vec<&str> = c.signals_matched.iter().map(|s| s.as_str()).collect();
    println!(
        "{rank:>3}. {:.2}  {:<20} {}",
        c.normalized_score.get(),
        c.category.label(),
        c.name
    );
    println!(
        "     h-index {}  works {}  {}  signals: {}",
        c.metrics.h_index,
        c.metrics.works_count,
        if c.is_open_access { "open access" } else { "subscription" },
        signals.join(", ")
    );
    for detail in &c.match_details {
        println!("     - {detail}");
    }
}

fn print_explanation(journal_id: &str, explanation: &Explanation) {
    println!("Why {journal_id} matches:");
    for detail in &explanation.match_details {
        println!("  - {detail}");
    }
    if !explanation.matched_topics.is_empty() {
        println!("Matched topics: {}", explanation.matched_topics.join(", "));
    }
}
