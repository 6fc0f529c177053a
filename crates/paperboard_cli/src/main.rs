//! `paperboard` command-line client.
//!
//! # Responsibility
//! - Drive a `BoardController` against a SQLite board file from a terminal.
//! - Report failures through `anyhow` with the core error as context.

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use paperboard_core::{init_from_config, BoardConfig};
use std::path::PathBuf;

const DEFAULT_DB_FILE: &str = "paperboard.db";

/// Shared two-person note board
#[derive(Parser, Debug)]
#[command(name = "paperboard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Board database file (overrides `store.path`)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML configuration file; missing file means defaults
    #[arg(long, global = true, default_value = "paperboard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a new note on the board
    Post {
        /// Author: ziji or xu
        #[arg(long = "as")]
        author: String,

        /// Note id to reply to
        #[arg(long)]
        reply_to: Option<String>,

        /// Type the note out the way the board reveals it
        #[arg(long)]
        animate: bool,

        text: String,
    },

    /// List notes of a day (today by default)
    List {
        /// Day as YYYY-MM-DD
        #[arg(long)]
        day: Option<String>,

        /// List every day
        #[arg(long, conflicts_with = "day")]
        all: bool,
    },

    /// Days that have notes
    Days,

    /// Reply threads of a day (today by default)
    Threads {
        /// Day as YYYY-MM-DD
        #[arg(long)]
        day: Option<String>,
    },

    /// Add a reaction to a note
    React {
        id: String,
        emoji: String,

        /// Author: ziji or xu
        #[arg(long = "as")]
        author: String,
    },

    /// Move a note to world coordinates
    Move {
        id: String,
        #[arg(allow_negative_numbers = true)]
        x: f64,
        #[arg(allow_negative_numbers = true)]
        y: f64,
    },

    /// Delete a note
    Delete { id: String },

    /// Reaction palette
    Palette,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = BoardConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load config `{}`", cli.config.display()))?;
    init_from_config(&config.logging).map_err(anyhow::Error::msg)?;

    let db_path = cli
        .db
        .or_else(|| config.store.path.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));
    let board = commands::open_board(&db_path, config)?;

    let result = match cli.command {
        Command::Post {
            author,
            reply_to,
            animate,
            text,
        } => commands::post(&board, &author, reply_to.as_deref(), &text, animate).await,
        Command::List { day, all } => commands::list(&board, day.as_deref(), all).await,
        Command::Days => commands::days(&board).await,
        Command::Threads { day } => commands::threads(&board, day.as_deref()).await,
        Command::React { id, emoji, author } => {
            commands::react(&board, &id, &emoji, &author).await
        }
        Command::Move { id, x, y } => commands::move_note(&board, &id, x, y).await,
        Command::Delete { id } => commands::delete(&board, &id).await,
        Command::Palette => {
            commands::palette();
            Ok(())
        }
    };

    board.close().await;
    result
}
