// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for the people scanning documents.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The severity drives how a front end presents it.

use crate::error::FolioError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Trying again may well work.
    Transient,
    /// The user must do something first (rescan, pick another file, free space).
    ActionRequired,
    /// Retrying the same input will fail the same way.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether re-running the same ingestion could succeed.
    pub retriable: bool,
    pub severity: Severity,
}

impl HumanError {
    fn new(
        message: &str,
        suggestion: impl Into<String>,
        retriable: bool,
        severity: Severity,
    ) -> Self {
        Self {
            message: message.into(),
            suggestion: suggestion.into(),
            retriable,
            severity,
        }
    }
}

/// Convert a `FolioError` into something a person can act on.
pub fn humanize_error(err: &FolioError) -> HumanError {
    match err {
        FolioError::Render(_) | FolioError::Image(_) => HumanError::new(
            "We couldn't turn your scan into a PDF.",
            "One of the pages looks damaged. Please scan the document again.",
            false,
            Severity::ActionRequired,
        ),

        FolioError::ScanFailed(detail) => HumanError::new(
            "The scan didn't finish.",
            format!("Please try scanning again. ({detail})"),
            true,
            Severity::Transient,
        ),

        FolioError::NotAPdf { name, .. } => HumanError::new(
            "That file isn't a PDF.",
            format!("Choose a PDF file instead of {name}."),
            false,
            Severity::Permanent,
        ),

        FolioError::Pdf(_) | FolioError::Rasterize { .. } => HumanError::new(
            "There's a problem with this PDF file.",
            "The file may be damaged. Try opening it elsewhere first, or choose a different file.",
            false,
            Severity::Permanent,
        ),

        FolioError::Recognition(_) | FolioError::Ocr(_) => HumanError::new(
            "We couldn't read the text on this document.",
            "The document is still saved. Scanning with better lighting may help.",
            true,
            Severity::Transient,
        ),

        FolioError::Thumbnail(_) => HumanError::new(
            "We couldn't make a preview for this document.",
            "The document itself is fine; only the preview picture is missing.",
            false,
            Severity::Permanent,
        ),

        FolioError::Persistence(_) | FolioError::Database(_) => HumanError::new(
            "Your document couldn't be saved.",
            "Nothing was stored. Check there is free space on this device, then try again.",
            true,
            Severity::Transient,
        ),

        FolioError::UnknownDocument(id) => HumanError::new(
            "We couldn't find that document.",
            format!("Check the id ({id}). `folio list` shows every stored document."),
            false,
            Severity::ActionRequired,
        ),

        FolioError::MissingData { .. } => HumanError::new(
            "This document's file is missing.",
            "It may have been removed outside the app. Delete the entry and import the file again.",
            false,
            Severity::ActionRequired,
        ),

        FolioError::IntegrityMismatch { .. } => HumanError::new(
            "This document has changed since it was saved.",
            "The stored copy doesn't match the original. Import the file again from its source.",
            false,
            Severity::Permanent,
        ),

        FolioError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError::new(
                "The file couldn't be found.",
                "It may have been moved or deleted. Try choosing the file again.",
                false,
                Severity::ActionRequired,
            ),
            std::io::ErrorKind::PermissionDenied => HumanError::new(
                "The app doesn't have permission to read that file.",
                "Check the file permissions, or copy the file somewhere else first.",
                false,
                Severity::ActionRequired,
            ),
            _ => HumanError::new(
                "There was a problem reading or writing a file.",
                "Try again. If this keeps happening, your device's storage may be full.",
                true,
                Severity::Transient,
            ),
        },

        FolioError::Serialization(_) | FolioError::Task(_) => HumanError::new(
            "The app had an internal problem.",
            "Try again. If this keeps happening, please report it.",
            true,
            Severity::Transient,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_is_retriable() {
        let human = humanize_error(&FolioError::Persistence("disk full".into()));
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn not_a_pdf_is_permanent() {
        let err = FolioError::NotAPdf {
            name: "photo.jpg".into(),
            magic: vec![0xFF, 0xD8, 0xFF, 0xE0],
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Permanent);
        assert!(human.suggestion.contains("photo.jpg"));
    }

    #[test]
    fn missing_file_needs_action() {
        let err = FolioError::Io(std::io::Error::from(std::io::ErrorKind::NotFound));
        assert_eq!(humanize_error(&err).severity, Severity::ActionRequired);
    }
}
