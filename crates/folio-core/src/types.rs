// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Folio ingestion pipeline.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FolioError, Result};

/// Unique identifier for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse the hyphenated form produced by `Display`.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| FolioError::UnknownDocument(format!("{s:?} is not a document id: {e}")))
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a document's PDF bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Only in memory (freshly assembled, not yet saved).
    InMemory(Vec<u8>),
    /// Only on disk (loaded from the store or wrapped from a file).
    FileBacked(PathBuf),
    /// Saved, with the bytes still held in memory.
    Both(Vec<u8>, PathBuf),
}

/// Compressed first-page preview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// JPEG bytes.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// A scanned or imported document.
///
/// `file_size_bytes` is fixed at creation from the payload length and is not
/// recomputed afterwards.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocumentId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub file_size_bytes: u64,
    pub payload: Payload,
    pub thumbnail: Option<Thumbnail>,
    pub recognized_text: Option<String>,
}

impl Document {
    /// Wrap freshly produced PDF bytes.
    pub fn from_bytes(name: impl Into<String>, pdf_bytes: Vec<u8>) -> Self {
        Self {
            id: DocumentId::new(),
            name: name.into(),
            created_at: Utc::now(),
            file_size_bytes: pdf_bytes.len() as u64,
            payload: Payload::InMemory(pdf_bytes),
            thumbnail: None,
            recognized_text: None,
        }
    }

    /// Wrap an existing file without reading it. The display name is the
    /// file's last path component.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled.pdf".to_string());

        Ok(Self {
            id: DocumentId::new(),
            name,
            created_at: Utc::now(),
            file_size_bytes: metadata.len(),
            payload: Payload::FileBacked(path.to_path_buf()),
            thumbnail: None,
            recognized_text: None,
        })
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<Thumbnail>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    /// Attach recognized text. Empty or whitespace-only text is stored as
    /// `None`.
    pub fn with_recognized_text(mut self, text: Option<String>) -> Self {
        self.recognized_text = text.filter(|t| !t.trim().is_empty());
        self
    }

    /// The PDF bytes: in-memory copy first, then the backing file.
    pub fn get_data(&self) -> Result<Vec<u8>> {
        match &self.payload {
            Payload::InMemory(bytes) | Payload::Both(bytes, _) => Ok(bytes.clone()),
            Payload::FileBacked(path) => std::fs::read(path).map_err(|err| {
                let path = path.display();
                tracing::warn!(id = %self.id, %path, %err, "backing file unreadable");
                FolioError::MissingData {
                    id: self.id.to_string(),
                }
            }),
        }
    }

    /// Borrow the in-memory bytes, if any.
    pub fn in_memory_bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::InMemory(bytes) | Payload::Both(bytes, _) => Some(bytes),
            Payload::FileBacked(_) => None,
        }
    }

    /// Location of the durable copy, once saved.
    pub fn backing_file(&self) -> Option<&Path> {
        match &self.payload {
            Payload::FileBacked(path) | Payload::Both(_, path) => Some(path),
            Payload::InMemory(_) => None,
        }
    }

    /// Record the durable copy location, keeping any in-memory bytes.
    pub fn attach_backing_file(mut self, path: PathBuf) -> Self {
        self.payload = match self.payload {
            Payload::InMemory(bytes) | Payload::Both(bytes, _) => Payload::Both(bytes, path),
            Payload::FileBacked(_) => Payload::FileBacked(path),
        };
        self
    }

    /// File name of the backing copy: `"{id}_{name}"`, with path separators
    /// and control characters in the name replaced by `_`.
    pub fn backing_file_name(&self) -> String {
        let safe: String = self
            .name
            .chars()
            .map(|c| {
                if c == '/' || c == '\\' || c.is_control() {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        format!("{}_{}", self.id, safe)
    }

    pub fn formatted_file_size(&self) -> String {
        format_file_size(self.file_size_bytes)
    }
}

/// Decimal file size in KB or MB, e.g. `"2 KB"` or `"1.5 MB"`.
pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1_000_000 {
        let kb = (bytes as f64 / 1000.0).round() as u64;
        format!("{kb} KB")
    } else {
        let mb = bytes as f64 / 1_000_000.0;
        let rounded = (mb * 10.0).round() / 10.0;
        if rounded.fract() == 0.0 {
            format!("{} MB", rounded as u64)
        } else {
            format!("{rounded:.1} MB")
        }
    }
}

/// Stages of one ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionState {
    Idle,
    RenderingPdf,
    RecognizingText,
    Persisting,
    Done,
    Errored,
}

impl std::fmt::Display for IngestionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::RenderingPdf => "rendering-pdf",
            Self::RecognizingText => "recognizing-text",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Errored => "errored",
        };
        f.write_str(label)
    }
}

/// Snapshot published to observers while an ingestion runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionStatus {
    pub state: IngestionState,
    /// True from rendering until the store has answered.
    pub is_loading: bool,
    /// True only while pages are being recognized.
    pub is_recognizing_text: bool,
}

impl IngestionStatus {
    pub fn for_state(state: IngestionState) -> Self {
        Self {
            state,
            is_loading: matches!(
                state,
                IngestionState::RenderingPdf
                    | IngestionState::RecognizingText
                    | IngestionState::Persisting
            ),
            is_recognizing_text: state == IngestionState::RecognizingText,
        }
    }
}

impl Default for IngestionStatus {
    fn default() -> Self {
        Self::for_state(IngestionState::Idle)
    }
}
