// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command handlers. Results go to stdout, logs and errors to stderr.

use folio_core::error::{FolioError, Result};
use folio_core::types::{Document, IngestionState};
use tokio::task::JoinHandle;
use tracing::info;

use crate::Command;
use crate::services::app_services::AppServices;

pub async fn run(services: &AppServices, command: Command) -> Result<()> {
    match command {
        Command::Scan { images, name } => {
            let progress = watch_progress(services);
            let scanned = services.scan(&images, name).await;
            progress.abort();
            match scanned? {
                Some(document) => print_stored(&document),
                None => println!("Scan cancelled."),
            }
        }
        Command::Import { pdf } => {
            let progress = watch_progress(services);
            let imported = services.import(&pdf).await;
            progress.abort();
            print_stored(&imported?);
        }
        Command::List => {
            let documents = services.list()?;
            if documents.is_empty() {
                println!("No documents yet.");
            }
            for document in documents {
                println!(
                    "{}  {}  {:>9}  {}",
                    document.id,
                    document.created_at.format("%Y-%m-%d %H:%M"),
                    document.formatted_file_size(),
                    document.name,
                );
            }
        }
        Command::Show { id } => print_details(&services.document(&id)?),
        Command::Thumbnail { id, out } => {
            let document = services.document(&id)?;
            let thumbnail = document.thumbnail.ok_or_else(|| {
                FolioError::Thumbnail(format!("{} has no thumbnail", document.name))
            })?;
            std::fs::write(&out, &thumbnail.bytes)?;
            println!(
                "Wrote {}x{} thumbnail to {}",
                thumbnail.width,
                thumbnail.height,
                out.display()
            );
        }
        Command::Verify { id } => {
            services.verify(&id)?;
            println!("{id}: file matches its recorded hash.");
        }
        Command::Delete { id } => {
            let document = services.delete(&id).await?;
            println!("Deleted {}.", document.name);
        }
        Command::Config { save } => {
            println!("{}", serde_json::to_string_pretty(services.config())?);
            if save {
                let path = services.save_config()?;
                println!("Saved to {}", path.display());
            }
        }
    }
    Ok(())
}

/// Log each pipeline stage as the assembler moves through it.
fn watch_progress(services: &AppServices) -> JoinHandle<()> {
    let mut status = services.subscribe();
    tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if current.is_loading {
                info!(state = %current.state, "working");
            } else if current.state == IngestionState::Errored {
                info!("ingestion stopped");
            }
        }
    })
}

fn print_stored(document: &Document) {
    println!("Stored {} ({})", document.name, document.id);
    println!(
        "  {} | {}",
        document.formatted_file_size(),
        match &document.recognized_text {
            Some(text) => format!("{} characters of text", text.chars().count()),
            None => "no text recognized".to_string(),
        }
    );
}

fn print_details(document: &Document) {
    println!("Name:      {}", document.name);
    println!("Id:        {}", document.id);
    println!("Created:   {}", document.created_at.to_rfc3339());
    println!("Size:      {}", document.formatted_file_size());
    if let Some(path) = document.backing_file() {
        println!("File:      {}", path.display());
    }
    match &document.thumbnail {
        Some(thumb) => println!("Thumbnail: {}x{}", thumb.width, thumb.height),
        None => println!("Thumbnail: none"),
    }
    println!();
    match &document.recognized_text {
        Some(text) => println!("{text}"),
        None => println!("(no recognized text)"),
    }
}
