// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-store — Durable document storage for Folio.
//
// Records live in SQLite; each document's PDF lives in its own file under the
// store's documents directory.

pub mod integrity;
pub mod store;

pub use integrity::{hash_bytes, hash_file, verify_file};
pub use store::{DocumentStore, SqliteDocumentStore};
