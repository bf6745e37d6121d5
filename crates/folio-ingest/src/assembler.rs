// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document assembler — drives one ingestion from scan pages or PDF bytes to a
// stored document: render, thumbnail, recognize, persist.
//
// CPU-bound stages run on tokio's blocking pool. Ingestions on one assembler
// run one at a time, and progress is published on a watch channel.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use folio_core::config::AppConfig;
use folio_core::error::{FolioError, Result};
use folio_core::types::{Document, IngestionState, IngestionStatus, Thumbnail};
use folio_document::{
    OcrBackend, PageImage, PdfRasterizer, PdfRenderer, TextRecognizer, ThumbnailGenerator,
    join_page_texts,
};
use folio_store::DocumentStore;
use image::DynamicImage;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, instrument, warn};

/// Leading bytes every PDF file starts with.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// How a capture session ended.
#[derive(Debug, Clone)]
pub enum ScanOutcome {
    /// The user finished; pages are in capture order.
    Completed(Vec<PageImage>),
    /// The user backed out. Nothing is ingested.
    Cancelled,
    /// The capture device or session failed.
    Failed(String),
}

/// Default name for a scan, e.g. `Scanned_1767225600.pdf`.
pub fn default_scan_name() -> String {
    format!("Scanned_{}.pdf", Utc::now().timestamp())
}

/// Publishes state changes; an ingestion dropped mid-way returns to `Idle`.
///
/// Dropping during `Persisting` does not stop the blocking insert already
/// handed to the store, so the document may still be committed after the
/// state has gone back to `Idle`.
struct Progress<'a> {
    status: &'a watch::Sender<IngestionStatus>,
    settled: bool,
}

impl<'a> Progress<'a> {
    fn start(status: &'a watch::Sender<IngestionStatus>) -> Self {
        Self {
            status,
            settled: false,
        }
    }

    fn enter(&self, state: IngestionState) {
        debug!(%state, "ingestion state");
        self.status.send_replace(IngestionStatus::for_state(state));
    }

    fn settle(mut self, state: IngestionState) {
        self.enter(state);
        self.settled = true;
    }
}

impl Drop for Progress<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.status
                .send_replace(IngestionStatus::for_state(IngestionState::Idle));
        }
    }
}

fn task_err(stage: &str, err: tokio::task::JoinError) -> FolioError {
    FolioError::Task(format!("{stage} task failed: {err}"))
}

/// Turns scans and imported PDFs into stored documents.
pub struct DocumentAssembler {
    renderer: PdfRenderer,
    rasterizer: Arc<dyn PdfRasterizer>,
    recognizer: TextRecognizer,
    thumbnails: ThumbnailGenerator,
    store: Arc<dyn DocumentStore>,
    rasterize_scale: f32,
    status: watch::Sender<IngestionStatus>,
    /// Held for the whole of an ingestion.
    gate: Mutex<()>,
}

impl DocumentAssembler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        rasterizer: Arc<dyn PdfRasterizer>,
        ocr: Arc<dyn OcrBackend>,
        config: &AppConfig,
    ) -> Self {
        let (status, _) = watch::channel(IngestionStatus::default());
        Self {
            renderer: PdfRenderer::new(),
            thumbnails: ThumbnailGenerator::new(Arc::clone(&rasterizer), config.thumbnail.clone()),
            rasterizer,
            recognizer: TextRecognizer::new(ocr, config.recognition.clone()),
            store,
            rasterize_scale: config.rasterize_scale,
            status,
            gate: Mutex::new(()),
        }
    }

    /// Follow progress. The flags are informational only.
    pub fn subscribe(&self) -> watch::Receiver<IngestionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> IngestionStatus {
        *self.status.borrow()
    }

    // -- Entry points ---------------------------------------------------------

    /// Act on the end of a capture session.
    ///
    /// `Completed` ingests the pages and returns the stored document.
    /// `Cancelled` returns `None` without touching state. `Failed` surfaces
    /// as [`FolioError::ScanFailed`].
    pub async fn handle_scan(
        &self,
        outcome: ScanOutcome,
        name: Option<String>,
    ) -> Result<Option<Document>> {
        match outcome {
            ScanOutcome::Completed(pages) => self.ingest_scan(pages, name).await.map(Some),
            ScanOutcome::Cancelled => {
                info!("scan cancelled");
                Ok(None)
            }
            ScanOutcome::Failed(reason) => {
                warn!(%reason, "scan failed");
                Err(FolioError::ScanFailed(reason))
            }
        }
    }

    /// Render captured pages to a PDF, recognize their text, and store the
    /// result. `name` defaults to [`default_scan_name`].
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub async fn ingest_scan(
        &self,
        pages: Vec<PageImage>,
        name: Option<String>,
    ) -> Result<Document> {
        let _gate = self.gate.lock().await;
        let progress = Progress::start(&self.status);

        let result = match self.build_from_scan(&progress, pages, name).await {
            Ok(document) => self.persist(&progress, document).await,
            Err(err) => Err(err),
        };
        self.settle(progress, result)
    }

    /// Import a PDF from disk. The document is named after the file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn ingest_file(&self, path: impl AsRef<Path>) -> Result<Document> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Untitled.pdf".to_string());
        let bytes = tokio::fs::read(path).await?;
        self.ingest_bytes(name, bytes).await
    }

    /// Import PDF bytes supplied by the caller.
    ///
    /// Bytes that do not start with `%PDF-` are rejected with
    /// [`FolioError::NotAPdf`] before any work starts.
    #[instrument(skip_all, fields(name = %name, bytes_len = bytes.len()))]
    pub async fn ingest_bytes(&self, name: String, bytes: Vec<u8>) -> Result<Document> {
        if !bytes.starts_with(PDF_MAGIC) {
            let magic = bytes.iter().take(8).copied().collect();
            warn!("rejecting import without PDF signature");
            return Err(FolioError::NotAPdf { name, magic });
        }

        let _gate = self.gate.lock().await;
        let progress = Progress::start(&self.status);

        let result = match self.build_from_pdf(&progress, name, bytes).await {
            Ok(document) => self.persist(&progress, document).await,
            Err(err) => Err(err),
        };
        self.settle(progress, result)
    }

    /// Build a scan document without storing it.
    pub async fn assemble_scan(
        &self,
        pages: Vec<PageImage>,
        name: Option<String>,
    ) -> Result<Document> {
        let _gate = self.gate.lock().await;
        let progress = Progress::start(&self.status);
        let result = self.build_from_scan(&progress, pages, name).await;
        self.settle(progress, result)
    }

    /// Remove a stored document and its file.
    pub async fn delete(&self, document: &Document) -> Result<()> {
        let store = Arc::clone(&self.store);
        let document = document.clone();
        tokio::task::spawn_blocking(move || store.delete(&document))
            .await
            .map_err(|e| task_err("delete", e))?
    }

    // -- Stages ---------------------------------------------------------------

    async fn build_from_scan(
        &self,
        progress: &Progress<'_>,
        pages: Vec<PageImage>,
        name: Option<String>,
    ) -> Result<Document> {
        let name = name.unwrap_or_else(default_scan_name);

        progress.enter(IngestionState::RenderingPdf);
        let renderer = self.renderer.clone().with_title(name.clone());
        let render_pages = pages.clone();
        let pdf = tokio::task::spawn_blocking(move || renderer.render(&render_pages))
            .await
            .map_err(|e| task_err("render", e))??;
        info!(bytes = pdf.len(), "scan rendered");

        progress.enter(IngestionState::RecognizingText);
        // The renderer no longer needs the pages; OCR holds the last handles.
        let images: Vec<Arc<DynamicImage>> = pages.iter().map(PageImage::shared).collect();
        drop(pages);

        let (pdf, thumbnail, texts) = self.thumbnail_and_recognize(pdf, images).await?;
        Ok(Document::from_bytes(name, pdf)
            .with_thumbnail(thumbnail)
            .with_recognized_text(join_page_texts(&texts)))
    }

    async fn build_from_pdf(
        &self,
        progress: &Progress<'_>,
        name: String,
        pdf: Vec<u8>,
    ) -> Result<Document> {
        progress.enter(IngestionState::RecognizingText);

        let pdf = Arc::new(pdf);
        let thumbnails = self.thumbnails.clone();
        let source = Arc::clone(&pdf);
        let thumbnail_task = tokio::task::spawn_blocking(move || thumbnails.generate(&source));

        let recognized = self.recognizer.recognize_pdf(
            Arc::clone(&self.rasterizer),
            Arc::clone(&pdf),
            self.rasterize_scale,
        );
        let (thumbnail, recognized) = tokio::join!(thumbnail_task, recognized);
        let thumbnail = thumbnail.map_err(|e| task_err("thumbnail", e))?;
        let texts = recognized.unwrap_or_else(|err| {
            warn!(%err, "PDF could not be rasterised; importing without text");
            Vec::new()
        });

        let pdf = Arc::try_unwrap(pdf).unwrap_or_else(|shared| (*shared).clone());
        Ok(Document::from_bytes(name, pdf)
            .with_thumbnail(thumbnail)
            .with_recognized_text(join_page_texts(&texts)))
    }

    /// Thumbnail the PDF while its pages are recognized.
    async fn thumbnail_and_recognize(
        &self,
        pdf: Vec<u8>,
        images: Vec<Arc<DynamicImage>>,
    ) -> Result<(Vec<u8>, Option<Thumbnail>, Vec<String>)> {
        let thumbnails = self.thumbnails.clone();
        let thumbnail_task = tokio::task::spawn_blocking(move || {
            let thumbnail = thumbnails.generate(&pdf);
            (pdf, thumbnail)
        });

        let (thumbnailed, texts) =
            tokio::join!(thumbnail_task, self.recognizer.recognize_pages(images));
        let (pdf, thumbnail) = thumbnailed.map_err(|e| task_err("thumbnail", e))?;

        let with_text = texts.iter().filter(|t| !t.is_empty()).count();
        debug!(pages = texts.len(), with_text, "recognition finished");
        Ok((pdf, thumbnail, texts))
    }

    async fn persist(&self, progress: &Progress<'_>, document: Document) -> Result<Document> {
        progress.enter(IngestionState::Persisting);
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.insert(document))
            .await
            .map_err(|e| FolioError::Persistence(format!("store task failed: {e}")))?
    }

    fn settle(&self, progress: Progress<'_>, result: Result<Document>) -> Result<Document> {
        match &result {
            Ok(document) => {
                info!(id = %document.id, name = %document.name, "ingestion complete");
                progress.settle(IngestionState::Done);
            }
            Err(err) => {
                error!(%err, "ingestion failed");
                progress.settle(IngestionState::Errored);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::config::RecognitionConfig;
    use folio_core::types::DocumentId;
    use folio_document::ImagePageRasterizer;
    use image::{Rgb, RgbImage};
    use lopdf::{Dictionary, Object, Stream, dictionary};
    use std::sync::{Mutex as StdMutex, OnceLock, mpsc};
    use std::time::Duration;

    // -- Test doubles ---------------------------------------------------------

    /// Reads the page number from the image width; page 3 fails.
    struct PageNumberOcr {
        observe: OnceLock<watch::Receiver<IngestionStatus>>,
        seen: StdMutex<Vec<IngestionStatus>>,
    }

    impl PageNumberOcr {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                observe: OnceLock::new(),
                seen: StdMutex::new(Vec::new()),
            })
        }
    }

    impl OcrBackend for PageNumberOcr {
        fn recognize_text(&self, image: &DynamicImage) -> Result<String> {
            if let Some(rx) = self.observe.get() {
                self.seen.lock().expect("seen lock").push(*rx.borrow());
            }
            match image.width() {
                3 => Err(FolioError::Recognition("smudged".into())),
                n => Ok(format!("page {n}\n")),
            }
        }
    }

    struct ConstOcr(&'static str);

    impl OcrBackend for ConstOcr {
        fn recognize_text(&self, _image: &DynamicImage) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        documents: StdMutex<Vec<Document>>,
        fail_inserts: bool,
        /// When set, each insert waits for a message before it commits.
        hold_inserts: Option<StdMutex<mpsc::Receiver<()>>>,
    }

    impl DocumentStore for MemoryStore {
        fn insert(&self, document: Document) -> Result<Document> {
            if let Some(release) = &self.hold_inserts {
                let _ = release.lock().expect("release lock").recv();
            }
            if self.fail_inserts {
                return Err(FolioError::Persistence("disk full".into()));
            }
            self.documents.lock().expect("store lock").push(document.clone());
            Ok(document)
        }

        fn delete(&self, document: &Document) -> Result<()> {
            self.documents
                .lock()
                .expect("store lock")
                .retain(|d| d.id != document.id);
            Ok(())
        }

        fn get(&self, id: &DocumentId) -> Result<Option<Document>> {
            Ok(self
                .documents
                .lock()
                .expect("store lock")
                .iter()
                .find(|d| d.id == *id)
                .cloned())
        }

        fn list(&self) -> Result<Vec<Document>> {
            Ok(self.documents.lock().expect("store lock").clone())
        }
    }

    fn page(width: u32) -> PageImage {
        PageImage::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            width * 2,
            Rgb([255, 255, 255]),
        )))
    }

    fn config() -> AppConfig {
        AppConfig {
            recognition: RecognitionConfig {
                max_concurrency: Some(3),
                ..Default::default()
            },
            rasterize_scale: 1.0,
            ..Default::default()
        }
    }

    fn assembler(store: Arc<MemoryStore>, ocr: Arc<dyn OcrBackend>) -> DocumentAssembler {
        DocumentAssembler::new(store, Arc::new(ImagePageRasterizer::new()), ocr, &config())
    }

    /// Image-only PDF with `pages` pages of 100x50pt, each painting one gray image.
    fn image_only_pdf(pages: usize) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![128u8; 4],
        ));
        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..pages {
            let content = doc.add_object(Stream::new(
                Dictionary::new(),
                b"q 100 0 0 50 0 0 cm /Im0 Do Q".to_vec(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => [0, 0, 100, 50].map(Object::Integer).to_vec(),
                "Contents" => content,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
            });
            kids.push(page_id.into());
        }
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save pdf");
        out
    }

    // -- Scan path ------------------------------------------------------------

    #[tokio::test]
    async fn scan_with_failing_page_keeps_other_text_in_order() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(Arc::clone(&store), PageNumberOcr::new());
        let pages = (1..=5).map(page).collect();

        let doc = assembler
            .ingest_scan(pages, Some("Lease.pdf".into()))
            .await
            .expect("ingest");

        let sep = folio_document::PAGE_BREAK;
        assert_eq!(
            doc.recognized_text.as_deref(),
            Some(format!("page 1{sep}page 2{sep}page 4{sep}page 5").as_str())
        );
        assert_eq!(doc.name, "Lease.pdf");
        let bytes = doc.get_data().expect("bytes");
        assert!(bytes.starts_with(b"%PDF-"));
        assert_eq!(doc.file_size_bytes, bytes.len() as u64);
        // First page is 1x2 points, so the preview is 50x100.
        let thumb = doc.thumbnail.as_ref().expect("thumbnail");
        assert_eq!((thumb.width, thumb.height), (50, 100));

        assert_eq!(store.list().expect("list").len(), 1);
        assert_eq!(assembler.status().state, IngestionState::Done);
        assert!(!assembler.status().is_loading);
    }

    #[tokio::test]
    async fn scan_without_text_stores_none() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(Arc::clone(&store), Arc::new(ConstOcr(" \n ")));
        let doc = assembler
            .ingest_scan(vec![page(10)], None)
            .await
            .expect("ingest");
        assert_eq!(doc.recognized_text, None);
        assert!(doc.name.starts_with("Scanned_") && doc.name.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn flags_track_recognition_stage() {
        let store = Arc::new(MemoryStore::default());
        let ocr = PageNumberOcr::new();
        let assembler = assembler(store, Arc::clone(&ocr) as Arc<dyn OcrBackend>);
        ocr.observe
            .set(assembler.subscribe())
            .expect("observer set once");

        assembler
            .ingest_scan(vec![page(1), page(2)], None)
            .await
            .expect("ingest");

        let seen = ocr.seen.lock().expect("seen lock").clone();
        assert_eq!(seen.len(), 2);
        for status in seen {
            assert_eq!(status.state, IngestionState::RecognizingText);
            assert!(status.is_loading && status.is_recognizing_text);
        }
    }

    #[tokio::test]
    async fn store_failure_errors_without_artifacts() {
        let store = Arc::new(MemoryStore {
            fail_inserts: true,
            ..Default::default()
        });
        let assembler = assembler(Arc::clone(&store), Arc::new(ConstOcr("text")));

        let err = assembler.ingest_scan(vec![page(4)], None).await.unwrap_err();
        assert!(matches!(err, FolioError::Persistence(_)));
        assert_eq!(assembler.status().state, IngestionState::Errored);
        assert!(store.list().expect("list").is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropping_during_persist_returns_to_idle_while_insert_finishes() {
        let (release, held) = mpsc::channel();
        let store = Arc::new(MemoryStore {
            hold_inserts: Some(StdMutex::new(held)),
            ..Default::default()
        });
        let assembler = Arc::new(assembler(Arc::clone(&store), Arc::new(ConstOcr("text"))));
        let mut status = assembler.subscribe();

        let ingesting = {
            let assembler = Arc::clone(&assembler);
            tokio::spawn(async move { assembler.ingest_scan(vec![page(4)], None).await })
        };
        status
            .wait_for(|s| s.state == IngestionState::Persisting)
            .await
            .expect("assembler alive");
        ingesting.abort();
        assert!(ingesting.await.is_err(), "ingestion was cancelled");

        assert_eq!(assembler.status().state, IngestionState::Idle);
        assert!(!assembler.status().is_loading);

        // The blocking insert was already handed off and still commits.
        release.send(()).expect("insert waiting");
        for _ in 0..100 {
            if !store.list().expect("list").is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(store.list().expect("list").len(), 1);
        assert_eq!(assembler.status().state, IngestionState::Idle);
    }

    #[tokio::test]
    async fn empty_scan_is_a_render_error() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(Arc::clone(&store), Arc::new(ConstOcr("text")));
        let err = assembler.ingest_scan(Vec::new(), None).await.unwrap_err();
        assert!(matches!(err, FolioError::Render(_)));
        assert_eq!(assembler.status().state, IngestionState::Errored);
        assert!(store.list().expect("list").is_empty());
    }

    #[tokio::test]
    async fn assemble_does_not_store() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(Arc::clone(&store), Arc::new(ConstOcr("hello")));
        let doc = assembler
            .assemble_scan(vec![page(6)], Some("draft.pdf".into()))
            .await
            .expect("assemble");
        assert_eq!(doc.recognized_text.as_deref(), Some("hello"));
        assert!(doc.backing_file().is_none());
        assert!(store.list().expect("list").is_empty());
    }

    // -- Scan outcomes --------------------------------------------------------

    #[tokio::test]
    async fn cancelled_scan_does_nothing() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(Arc::clone(&store), Arc::new(ConstOcr("text")));
        let outcome = assembler
            .handle_scan(ScanOutcome::Cancelled, None)
            .await
            .expect("cancel is not an error");
        assert!(outcome.is_none());
        assert_eq!(assembler.status().state, IngestionState::Idle);
        assert!(store.list().expect("list").is_empty());
    }

    #[tokio::test]
    async fn failed_scan_surfaces_reason() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(store, Arc::new(ConstOcr("text")));
        let err = assembler
            .handle_scan(ScanOutcome::Failed("camera unavailable".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, FolioError::ScanFailed(reason) if reason == "camera unavailable"));
    }

    #[tokio::test]
    async fn completed_scan_is_ingested() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(Arc::clone(&store), Arc::new(ConstOcr("text")));
        let doc = assembler
            .handle_scan(ScanOutcome::Completed(vec![page(5)]), None)
            .await
            .expect("ingest")
            .expect("document");
        assert!(store.get(&doc.id).expect("get").is_some());
    }

    // -- File path ------------------------------------------------------------

    #[tokio::test]
    async fn import_recognizes_rasterised_pages() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("Contract.pdf");
        let pdf = image_only_pdf(2);
        std::fs::write(&path, &pdf).expect("write");

        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(Arc::clone(&store), Arc::new(ConstOcr("clause")));
        let doc = assembler.ingest_file(&path).await.expect("import");

        assert_eq!(doc.name, "Contract.pdf");
        assert_eq!(doc.file_size_bytes, pdf.len() as u64);
        assert_eq!(doc.get_data().expect("bytes"), pdf);
        assert_eq!(
            doc.recognized_text.as_deref(),
            Some(format!("clause{}clause", folio_document::PAGE_BREAK).as_str())
        );
        let thumb = doc.thumbnail.as_ref().expect("thumbnail");
        assert_eq!((thumb.width, thumb.height), (200, 100));
        assert_eq!(assembler.status().state, IngestionState::Done);
    }

    #[tokio::test]
    async fn import_rejects_non_pdf() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(Arc::clone(&store), Arc::new(ConstOcr("text")));
        let err = assembler
            .ingest_bytes("photo.jpg".into(), vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10])
            .await
            .unwrap_err();
        match err {
            FolioError::NotAPdf { name, magic } => {
                assert_eq!(name, "photo.jpg");
                assert_eq!(magic, vec![0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(assembler.status().state, IngestionState::Idle);
        assert!(store.list().expect("list").is_empty());
    }

    #[tokio::test]
    async fn unreadable_pdf_imports_without_text_or_thumbnail() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(Arc::clone(&store), Arc::new(ConstOcr("text")));
        let doc = assembler
            .ingest_bytes("broken.pdf".into(), b"%PDF-1.7 not really".to_vec())
            .await
            .expect("import still succeeds");
        assert_eq!(doc.recognized_text, None);
        assert!(doc.thumbnail.is_none());
        assert_eq!(store.list().expect("list").len(), 1);
    }

    // -- Serialisation --------------------------------------------------------

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_ingestions_both_complete() {
        let store = Arc::new(MemoryStore::default());
        let assembler = Arc::new(assembler(Arc::clone(&store), Arc::new(ConstOcr("x"))));

        let a = {
            let assembler = Arc::clone(&assembler);
            tokio::spawn(async move { assembler.ingest_scan(vec![page(8)], None).await })
        };
        let b = {
            let assembler = Arc::clone(&assembler);
            tokio::spawn(async move { assembler.ingest_scan(vec![page(9)], None).await })
        };
        a.await.expect("join a").expect("ingest a");
        b.await.expect("join b").expect("ingest b");
        assert_eq!(store.list().expect("list").len(), 2);
    }

    #[tokio::test]
    async fn delete_goes_through_store() {
        let store = Arc::new(MemoryStore::default());
        let assembler = assembler(Arc::clone(&store), Arc::new(ConstOcr("x")));
        let doc = assembler.ingest_scan(vec![page(3)], None).await.expect("ingest");
        assembler.delete(&doc).await.expect("delete");
        assert!(store.list().expect("list").is_empty());
    }
}
