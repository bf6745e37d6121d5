// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-ingest — Turns finished scans and imported PDFs into stored documents.

pub mod assembler;

pub use assembler::{DocumentAssembler, ScanOutcome, default_scan_name};
