// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folio — scan-to-searchable-PDF ingestion.
//
// Entry point. Initialises logging, parses the command line, opens the backend
// services, and dispatches to a command.

mod commands;
mod services;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use folio_core::human_errors::humanize_error;

use services::app_services::AppServices;

#[derive(Debug, Parser)]
#[command(
    name = "folio",
    version,
    about = "Scan and import documents into a searchable local library"
)]
struct Cli {
    /// Where the library lives. Defaults to $XDG_DATA_HOME/folio.
    #[arg(long, global = true, env = "FOLIO_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Turn page images into one searchable PDF. Pages keep the order given.
    Scan {
        #[arg(required = true)]
        images: Vec<PathBuf>,
        /// Document name. Defaults to Scanned_<timestamp>.pdf.
        #[arg(long)]
        name: Option<String>,
    },
    /// Import an existing PDF and recognize its text.
    Import { pdf: PathBuf },
    /// List stored documents, newest first.
    List,
    /// Show a document's details and recognized text.
    Show { id: String },
    /// Write a document's thumbnail as JPEG.
    Thumbnail { id: String, out: PathBuf },
    /// Check a stored file against the hash recorded at import.
    Verify { id: String },
    /// Delete a document and its file.
    Delete { id: String },
    /// Print the active configuration.
    Config {
        /// Also write it to config.json in the data directory.
        #[arg(long)]
        save: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(command = ?cli.command, "Folio starting");

    let result = match AppServices::init(cli.data_dir.as_deref()) {
        Ok(services) => commands::run(&services, cli.command).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(%err, "command failed");
            let human = humanize_error(&err);
            eprintln!("{}\n{}", human.message, human.suggestion);
            ExitCode::FAILURE
        }
    }
}
