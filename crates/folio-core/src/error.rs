// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Folio.
//
// Render and persistence failures are fatal for an ingestion. Per-page
// `Recognition` and `Rasterize` failures and `Thumbnail` failures are produced
// internally but degrade to empty text or no thumbnail before they reach a
// caller. `Ocr` covers loading the engine itself.

use thiserror::Error;

/// Top-level error type for all Folio operations.
#[derive(Debug, Error)]
pub enum FolioError {
    // -- Ingestion pipeline --
    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("text recognition failed: {0}")]
    Recognition(String),

    #[error("thumbnail generation failed: {0}")]
    Thumbnail(String),

    #[error("persisting document failed: {0}")]
    Persistence(String),

    #[error("document {id} has neither in-memory bytes nor a readable backing file")]
    MissingData { id: String },

    #[error("scan failed: {0}")]
    ScanFailed(String),

    // -- Document processing --
    #[error("not a PDF file: {name} (first bytes {magic:?})")]
    NotAPdf { name: String, magic: Vec<u8> },

    #[error("PDF operation failed: {0}")]
    Pdf(String),

    #[error("rasterising page {page} failed: {detail}")]
    Rasterize { page: usize, detail: String },

    #[error("image processing failed: {0}")]
    Image(String),

    #[error("OCR engine error: {0}")]
    Ocr(String),

    // -- Storage --
    #[error("database error: {0}")]
    Database(String),

    #[error("no such document: {0}")]
    UnknownDocument(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FolioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_data_names_the_document() {
        let err = FolioError::MissingData { id: "abc".into() };
        assert!(err.to_string().contains("abc"));
    }
}
