// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistent document store backed by SQLite.
//
// Document metadata, thumbnails, and recognized text live in a local SQLite
// database. The PDF bytes live in one file per document under the store's
// `documents/` directory, named `{id}_{name}`. A record exists if and only if
// its file exists: inserts stage the file first and publish it inside the
// record's write transaction, and files with no record are swept on open
// under a write transaction of their own, so a sweep waits for any insert
// that is mid-publish in another process.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, SecondsFormat, Utc};
use folio_core::error::{FolioError, Result};
use folio_core::types::{Document, DocumentId, Payload, Thumbnail};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, info, instrument, warn};

use crate::integrity::{hash_bytes, verify_file};

/// Database file name inside the data directory.
pub const DATABASE_FILE: &str = "folio.db";
/// Subdirectory of the data directory holding the PDF files.
pub const DOCUMENTS_DIR: &str = "documents";

/// Prefix of in-flight files while an insert is staging its bytes.
const STAGING_PREFIX: &str = ".staging-";

/// Staged files younger than this may belong to a live insert and are left
/// alone by the sweep.
const STAGING_GRACE: Duration = Duration::from_secs(60 * 60);

/// How long a write waits for another connection's transaction.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite schema for the documents table.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        file_name TEXT NOT NULL UNIQUE,
        content_hash TEXT NOT NULL,
        thumbnail BLOB,
        thumbnail_width INTEGER,
        thumbnail_height INTEGER,
        recognized_text TEXT
    )
"#;

const SELECT_COLUMNS: &str = "SELECT id, name, created_at, file_size, file_name, content_hash,
        thumbnail, thumbnail_width, thumbnail_height, recognized_text
    FROM documents";

/// Durable storage for documents.
///
/// Implementations are synchronous; async callers run them on a blocking
/// thread. Each `insert` either fully succeeds or leaves nothing behind.
pub trait DocumentStore: Send + Sync {
    /// Save `document` and return it with its backing file attached.
    fn insert(&self, document: Document) -> Result<Document>;

    /// Remove the record and its backing file. Deleting a document that is
    /// not stored, or whose file is already gone, succeeds.
    fn delete(&self, document: &Document) -> Result<()>;

    fn get(&self, id: &DocumentId) -> Result<Option<Document>>;

    /// All stored documents, newest first.
    fn list(&self) -> Result<Vec<Document>>;
}

/// [`DocumentStore`] keeping records in SQLite and PDFs as plain files.
pub struct SqliteDocumentStore {
    /// The open SQLite connection.
    conn: Mutex<Connection>,
    documents_dir: PathBuf,
}

impl SqliteDocumentStore {
    // -- Construction ---------------------------------------------------------

    /// Open (or create) the store rooted at `data_dir`.
    ///
    /// Applies WAL journal mode, creates the schema if needed, and removes
    /// any file in `documents/` that no record refers to.
    #[instrument(skip_all, fields(data_dir = %data_dir.as_ref().display()))]
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let documents_dir = data_dir.join(DOCUMENTS_DIR);
        std::fs::create_dir_all(&documents_dir)?;

        let conn = Connection::open(data_dir.join(DATABASE_FILE))
            .map_err(|e| FolioError::Database(format!("open: {e}")))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| FolioError::Database(format!("busy timeout: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| FolioError::Database(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| FolioError::Database(format!("create table: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
            documents_dir,
        };
        let swept = store.sweep_orphans()?;
        info!(swept, "document store opened");
        Ok(store)
    }

    /// In-memory database with files under `documents_dir` (useful for tests).
    pub fn open_in_memory(documents_dir: impl Into<PathBuf>) -> Result<Self> {
        let documents_dir = documents_dir.into();
        std::fs::create_dir_all(&documents_dir)?;

        let conn = Connection::open_in_memory()
            .map_err(|e| FolioError::Database(format!("open in-memory: {e}")))?;
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| FolioError::Database(format!("create table: {e}")))?;

        debug!("in-memory document store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            documents_dir,
        })
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| FolioError::Database("connection lock poisoned".into()))
    }

    // -- Maintenance ----------------------------------------------------------

    /// Delete files in the documents directory that no record refers to,
    /// including stale leftovers from interrupted inserts. Returns how many
    /// were removed.
    ///
    /// Runs inside an immediate (write) transaction: an insert publishes its
    /// file while holding the write lock, so the sweep only ever sees files
    /// whose record is committed or will never be.
    #[instrument(skip(self))]
    pub fn sweep_orphans(&self) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| FolioError::Database(format!("begin sweep: {e}")))?;

        let known: HashSet<String> = {
            let mut stmt = tx
                .prepare("SELECT file_name FROM documents")
                .map_err(|e| FolioError::Database(format!("prepare sweep: {e}")))?;
            stmt.query_map([], |row| row.get::<_, String>(0))
                .map_err(|e| FolioError::Database(format!("query sweep: {e}")))?
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| FolioError::Database(format!("collect rows: {e}")))?
        };

        let mut removed = 0;
        for entry in std::fs::read_dir(&self.documents_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if known.contains(&name) {
                continue;
            }
            if name.starts_with(STAGING_PREFIX) && !is_stale(&entry) {
                debug!(file = %name, "leaving recent staging file");
                continue;
            }
            match std::fs::remove_file(entry.path()) {
                Ok(()) => {
                    removed += 1;
                    info!(file = %name, "removed orphaned document file");
                }
                Err(err) => warn!(file = %name, %err, "could not remove orphaned file"),
            }
        }

        tx.commit()
            .map_err(|e| FolioError::Database(format!("end sweep: {e}")))?;
        Ok(removed)
    }

    /// Check a stored document's file against the hash recorded at insert.
    #[instrument(skip(self), fields(id = %id))]
    pub fn verify(&self, id: &DocumentId) -> Result<()> {
        let conn = self.lock()?;
        let (file_name, hash): (String, String) = conn
            .query_row(
                "SELECT file_name, content_hash FROM documents WHERE id = ?1",
                params![id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| FolioError::Database(format!("query verify: {e}")))?
            .ok_or_else(|| FolioError::UnknownDocument(id.to_string()))?;
        drop(conn);

        let path = self.documents_dir.join(file_name);
        if !path.exists() {
            return Err(FolioError::MissingData { id: id.to_string() });
        }
        verify_file(&path, &hash)
    }
}

impl DocumentStore for SqliteDocumentStore {
    #[instrument(skip(self, document), fields(id = %document.id, name = %document.name))]
    fn insert(&self, document: Document) -> Result<Document> {
        let persist = |what: &str, err: &dyn std::fmt::Display| {
            FolioError::Persistence(format!("{what}: {err}"))
        };

        let owned;
        let bytes: &[u8] = match document.in_memory_bytes() {
            Some(bytes) => bytes,
            None => {
                owned = document
                    .get_data()
                    .map_err(|e| persist("read document", &e))?;
                &owned
            }
        };
        let content_hash = hash_bytes(bytes);
        let file_name = document.backing_file_name();
        let final_path = self.documents_dir.join(&file_name);

        // Stage the bytes next to their final location so publishing is a rename.
        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.documents_dir)
            .map_err(|e| persist("stage file", &e))?;
        staged.write_all(bytes).map_err(|e| persist("write file", &e))?;
        staged
            .as_file()
            .sync_all()
            .map_err(|e| persist("sync file", &e))?;

        let mut conn = self.lock().map_err(|e| persist("lock connection", &e))?;
        let tx = conn
            .transaction()
            .map_err(|e| persist("begin transaction", &e))?;

        let thumbnail = document.thumbnail.as_ref();
        tx.execute(
            "INSERT INTO documents (id, name, created_at, file_size, file_name, content_hash,
             thumbnail, thumbnail_width, thumbnail_height, recognized_text)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                document.id.to_string(),
                document.name,
                document
                    .created_at
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
                document.file_size_bytes as i64,
                file_name,
                content_hash,
                thumbnail.map(|t| t.bytes.as_slice()),
                thumbnail.map(|t| t.width),
                thumbnail.map(|t| t.height),
                document.recognized_text,
            ],
        )
        .map_err(|e| persist("insert record", &e))?;

        // Dropping `tx` on any early return rolls the record back; dropping
        // `staged` deletes the staged file.
        staged
            .persist_noclobber(&final_path)
            .map_err(|e| persist("publish file", &e.error))?;

        if let Err(e) = tx.commit() {
            if let Err(rm) = std::fs::remove_file(&final_path) {
                let path = final_path.display();
                warn!(%path, %rm, "could not remove file after failed commit");
            }
            return Err(persist("commit", &e));
        }

        info!(file = %file_name, bytes = document.file_size_bytes, "document stored");
        Ok(document.attach_backing_file(final_path))
    }

    #[instrument(skip(self, document), fields(id = %document.id))]
    fn delete(&self, document: &Document) -> Result<()> {
        let conn = self.lock()?;
        let file_name: Option<String> = conn
            .query_row(
                "SELECT file_name FROM documents WHERE id = ?1",
                params![document.id.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| FolioError::Database(format!("query delete: {e}")))?;

        let Some(file_name) = file_name else {
            debug!("document not stored; nothing to delete");
            return Ok(());
        };

        conn.execute(
            "DELETE FROM documents WHERE id = ?1",
            params![document.id.to_string()],
        )
        .map_err(|e| FolioError::Database(format!("delete document: {e}")))?;
        drop(conn);

        let path = self.documents_dir.join(&file_name);
        match std::fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(file = %file_name, "backing file already gone");
            }
            // The record is gone; the next sweep removes the file.
            Err(err) => warn!(file = %file_name, %err, "could not remove backing file"),
        }

        info!("document deleted");
        Ok(())
    }

    #[instrument(skip(self), fields(id = %id))]
    fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .map_err(|e| FolioError::Database(format!("prepare get: {e}")))?;

        stmt.query_row(params![id.to_string()], |row| {
            row_to_document(row, &self.documents_dir)
        })
        .optional()
        .map_err(|e| FolioError::Database(format!("row parse: {e}")))
    }

    #[instrument(skip(self))]
    fn list(&self) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_COLUMNS} ORDER BY created_at DESC, rowid DESC"
            ))
            .map_err(|e| FolioError::Database(format!("prepare list: {e}")))?;

        let documents = stmt
            .query_map([], |row| row_to_document(row, &self.documents_dir))
            .map_err(|e| FolioError::Database(format!("query list: {e}")))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FolioError::Database(format!("collect rows: {e}")))?;

        debug!(count = documents.len(), "listed documents");
        Ok(documents)
    }
}

/// Whether a staging file is old enough that no live insert can own it.
/// A file whose age cannot be read counts as stale; one dated in the future
/// does not.
fn is_stale(entry: &std::fs::DirEntry) -> bool {
    match entry.metadata().and_then(|meta| meta.modified()) {
        Ok(modified) => match SystemTime::now().duration_since(modified) {
            Ok(age) => age >= STAGING_GRACE,
            Err(_) => false,
        },
        Err(_) => true,
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// Map a SQLite row to a file-backed `Document`.
///
/// Column indices must match [`SELECT_COLUMNS`].
fn row_to_document(row: &rusqlite::Row<'_>, documents_dir: &Path) -> rusqlite::Result<Document> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let created_at_str: String = row.get(2)?;
    let file_size: i64 = row.get(3)?;
    let file_name: String = row.get(4)?;
    let thumbnail_bytes: Option<Vec<u8>> = row.get(6)?;
    let thumbnail_width: Option<u32> = row.get(7)?;
    let thumbnail_height: Option<u32> = row.get(8)?;
    let recognized_text: Option<String> = row.get(9)?;

    let uuid = uuid::Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let thumbnail = match (thumbnail_bytes, thumbnail_width, thumbnail_height) {
        (Some(bytes), Some(width), Some(height)) => Some(Thumbnail {
            bytes,
            width,
            height,
        }),
        _ => None,
    };

    Ok(Document {
        id: DocumentId(uuid),
        name,
        created_at,
        file_size_bytes: file_size.max(0) as u64,
        payload: Payload::FileBacked(documents_dir.join(file_name)),
        thumbnail,
        recognized_text,
    })
}
