//! Command-line interface for trendarr.

use clap::{Parser, Subcommand};

/// Trendarr - TV catalog ingest service
/// Keeps a movie-catalog store in sync with TMDB trending/popular lists
#[derive(Parser)]
#[command(name = "trendarr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as background daemon with scheduler
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Run one full ingest (trending + popular cycles) and exit
    #[command(alias = "-i")]
    Ingest,

    /// Run a single trending cycle and print the outcome
    Trending,

    /// Run a single popular cycle and print the outcome
    Popular,

    /// Ingest the recommendations list for a stored show
    Recommend {
        /// TMDB show ID of the source show
        id: i64,
    },

    /// Ingest the top search results for a query
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// List stored shows
    #[command(alias = "ls")]
    List,
}
