//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

/// Recommend academic journals for a manuscript.
///
/// Queries OpenAlex with three concurrent retrieval signals and ranks the
/// candidate journals by a discipline-aware relevance score.
#[derive(Parser, Debug)]
#[command(name = "journal-matcher")]
#[command(author, version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/journal-matcher/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Contact email sent to OpenAlex (overrides the config file)
    #[arg(long, global = true)]
    pub mailto: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rank journals for a manuscript
    Search(SearchArgs),
    /// Explain why one journal matches an abstract
    Explain(ExplainArgs),
}

#[derive(ClapArgs, Debug)]
pub struct SearchArgs {
    /// Manuscript title
    #[arg(long)]
    pub title: String,

    /// Manuscript abstract
    #[arg(long = "abstract")]
    pub abstract_text: String,

    /// Author keyword (repeatable)
    #[arg(short = 'k', long = "keyword")]
    pub keywords: Vec<String>,

    /// Prefer open-access journals
    #[arg(long)]
    pub open_access: bool,

    /// Maximum journals to print (1-500)
    #[arg(
        short = 'n',
        long,
        default_value_t = 20,
        value_parser = clap::value_parser!(u16).range(1..=500)
    )]
    pub limit: u16,

    /// Print the full response as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(ClapArgs, Debug)]
pub struct ExplainArgs {
    /// Journal id from a previous search (e.g. S137773608)
    pub journal_id: String,

    /// Manuscript abstract
    #[arg(long = "abstract")]
    pub abstract_text: String,

    /// Print the explanation as JSON
    #[arg(long)]
    pub json: bool,
}
