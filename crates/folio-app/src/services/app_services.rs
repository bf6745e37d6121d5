// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — opens the document store, picks the OCR engine and
// rasteriser, and exposes the operations the commands need.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use folio_core::AppConfig;
use folio_core::error::{FolioError, Result};
use folio_core::types::{Document, DocumentId, IngestionStatus};
use folio_document::{OcrBackend, PageImage, PdfRasterizer};
use folio_ingest::{DocumentAssembler, ScanOutcome};
use folio_store::{DocumentStore, SqliteDocumentStore};
use image::DynamicImage;
use tokio::sync::watch;
use tracing::{info, warn};

use super::data_dir;

/// Everything a command needs. Cheap to clone.
#[derive(Clone)]
pub struct AppServices {
    store: Arc<SqliteDocumentStore>,
    assembler: Arc<DocumentAssembler>,
    data_dir: PathBuf,
    config: AppConfig,
}

impl AppServices {
    /// Open the data directory and build the pipeline from the saved config.
    pub fn init(override_dir: Option<&Path>) -> Result<Self> {
        let dir = data_dir::data_dir(override_dir)?;
        let config = load_config(&dir).unwrap_or_default();
        let ocr = ocr_backend(&config);
        Self::with_ocr(dir, config, ocr)
    }

    /// Build services around an explicit OCR backend.
    pub fn with_ocr(dir: PathBuf, config: AppConfig, ocr: Arc<dyn OcrBackend>) -> Result<Self> {
        info!(path = %dir.display(), "initialising app services");
        let store = Arc::new(SqliteDocumentStore::open(&dir)?);
        let assembler = Arc::new(DocumentAssembler::new(
            Arc::clone(&store) as Arc<dyn DocumentStore>,
            rasterizer(),
            ocr,
            &config,
        ));
        Ok(Self {
            store,
            assembler,
            data_dir: dir,
            config,
        })
    }

    // -- Ingestion ------------------------------------------------------------

    /// Build a document from captured page images, in the order given.
    pub async fn scan(&self, images: &[PathBuf], name: Option<String>) -> Result<Option<Document>> {
        let outcome = if images.is_empty() {
            ScanOutcome::Cancelled
        } else {
            match load_pages(images) {
                Ok(pages) => ScanOutcome::Completed(pages),
                Err(err) => ScanOutcome::Failed(err.to_string()),
            }
        };
        self.assembler.handle_scan(outcome, name).await
    }

    pub async fn import(&self, path: &Path) -> Result<Document> {
        self.assembler.ingest_file(path).await
    }

    pub fn subscribe(&self) -> watch::Receiver<IngestionStatus> {
        self.assembler.subscribe()
    }

    // -- Documents ------------------------------------------------------------

    pub fn list(&self) -> Result<Vec<Document>> {
        self.store.list()
    }

    /// Look up a document, failing when the id is unknown.
    pub fn document(&self, id: &str) -> Result<Document> {
        let id = DocumentId::parse(id)?;
        self.store
            .get(&id)?
            .ok_or_else(|| FolioError::UnknownDocument(id.to_string()))
    }

    pub async fn delete(&self, id: &str) -> Result<Document> {
        let document = self.document(id)?;
        self.assembler.delete(&document).await?;
        Ok(document)
    }

    /// Re-hash a stored document's file against its recorded digest.
    pub fn verify(&self, id: &str) -> Result<()> {
        let document = self.document(id)?;
        self.store.verify(&document.id)
    }

    // -- Config ---------------------------------------------------------------

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Persist the active config so later runs pick it up.
    pub fn save_config(&self) -> Result<PathBuf> {
        persist_config(&self.data_dir, &self.config)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

fn load_pages(images: &[PathBuf]) -> Result<Vec<PageImage>> {
    images.iter().map(PageImage::open).collect()
}

// -- Engine selection ---------------------------------------------------------

/// Stands in when no OCR models are installed. Every page yields no text.
struct UnavailableOcr {
    reason: String,
}

impl OcrBackend for UnavailableOcr {
    fn recognize_text(&self, _image: &DynamicImage) -> Result<String> {
        Err(FolioError::Recognition(self.reason.clone()))
    }
}

#[cfg(feature = "ocr")]
fn ocr_backend(config: &AppConfig) -> Arc<dyn OcrBackend> {
    use folio_document::{OcrConfig, OcrsBackend};

    let dir = config
        .ocr_model_dir
        .clone()
        .unwrap_or_else(folio_document::default_model_dir);
    let ocr_config = OcrConfig::from_dir(&dir).with_mode(config.recognition.mode);
    if !ocr_config.models_available() {
        warn!(dir = %dir.display(), "OCR models not found; documents will have no text");
        return Arc::new(UnavailableOcr {
            reason: format!("OCR models not installed in {}", dir.display()),
        });
    }
    match OcrsBackend::new(ocr_config) {
        Ok(backend) => Arc::new(backend),
        Err(err) => {
            warn!(%err, "OCR engine failed to load; documents will have no text");
            Arc::new(UnavailableOcr {
                reason: err.to_string(),
            })
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn ocr_backend(_config: &AppConfig) -> Arc<dyn OcrBackend> {
    warn!("built without OCR support; documents will have no text");
    Arc::new(UnavailableOcr {
        reason: "built without the ocr feature".into(),
    })
}

#[cfg(feature = "pdfium")]
fn rasterizer() -> Arc<dyn PdfRasterizer> {
    Arc::new(folio_document::PdfiumRasterizer::new())
}

#[cfg(not(feature = "pdfium"))]
fn rasterizer() -> Arc<dyn PdfRasterizer> {
    Arc::new(folio_document::ImagePageRasterizer::new())
}

// -- Config file persistence -------------------------------------------------

const CONFIG_FILE: &str = "config.json";

fn load_config(data_dir: &Path) -> Option<AppConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(err) => {
            warn!(path = %path.display(), %err, "ignoring unreadable config");
            None
        }
    }
}

fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<PathBuf> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    struct Echo;

    impl OcrBackend for Echo {
        fn recognize_text(&self, image: &DynamicImage) -> Result<String> {
            Ok(format!("{} wide", image.width()))
        }
    }

    fn services(dir: &Path) -> AppServices {
        AppServices::with_ocr(dir.to_path_buf(), AppConfig::default(), Arc::new(Echo))
            .expect("services")
    }

    fn write_png(dir: &Path, name: &str, width: u32) -> PathBuf {
        let path = dir.join(name);
        RgbImage::from_pixel(width, 20, Rgb([250, 250, 250]))
            .save(&path)
            .expect("save png");
        path
    }

    #[tokio::test]
    async fn scan_list_show_delete() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let svc = services(tmp.path());
        let images = vec![
            write_png(tmp.path(), "a.png", 10),
            write_png(tmp.path(), "b.png", 12),
        ];

        let doc = svc
            .scan(&images, Some("Receipt.pdf".into()))
            .await
            .expect("scan")
            .expect("document");
        assert_eq!(
            doc.recognized_text.as_deref(),
            Some(format!("10 wide{}12 wide", folio_document::PAGE_BREAK).as_str())
        );

        let listed = svc.list().expect("list");
        assert_eq!(listed.len(), 1);
        let shown = svc.document(&doc.id.to_string()).expect("show");
        assert_eq!(shown.name, "Receipt.pdf");
        svc.verify(&doc.id.to_string()).expect("verify");

        svc.delete(&doc.id.to_string()).await.expect("delete");
        assert!(svc.list().expect("list").is_empty());
    }

    #[tokio::test]
    async fn scan_without_images_is_cancelled() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let svc = services(tmp.path());
        assert!(svc.scan(&[], None).await.expect("cancel").is_none());
    }

    #[tokio::test]
    async fn unreadable_image_fails_the_scan() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let svc = services(tmp.path());
        let err = svc
            .scan(&[tmp.path().join("missing.png")], None)
            .await
            .unwrap_err();
        assert!(matches!(err, FolioError::ScanFailed(_)));
    }

    #[test]
    fn unknown_id_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let svc = services(tmp.path());
        assert!(matches!(
            svc.document("not-a-uuid"),
            Err(FolioError::UnknownDocument(_))
        ));
        assert!(matches!(
            svc.document(&DocumentId::new().to_string()),
            Err(FolioError::UnknownDocument(_))
        ));
    }

    #[tokio::test]
    async fn missing_engine_degrades_pages_to_no_text() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let unavailable = UnavailableOcr {
            reason: "OCR models not installed".into(),
        };
        let blank = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([255, 255, 255])));
        assert!(matches!(
            unavailable.recognize_text(&blank),
            Err(FolioError::Recognition(_))
        ));

        let svc = AppServices::with_ocr(
            tmp.path().to_path_buf(),
            AppConfig::default(),
            Arc::new(unavailable),
        )
        .expect("services");
        let doc = svc
            .scan(&[write_png(tmp.path(), "page.png", 8)], None)
            .await
            .expect("scan still succeeds")
            .expect("document");
        assert_eq!(doc.recognized_text, None);
    }

    #[test]
    fn config_round_trips_through_disk() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::default();
        config.rasterize_scale = 3.0;
        persist_config(tmp.path(), &config).expect("persist");
        assert_eq!(load_config(tmp.path()), Some(config));
    }

    #[test]
    fn corrupt_config_falls_back() {
        let tmp = tempfile::tempdir().expect("tempdir");
        std::fs::write(tmp.path().join(CONFIG_FILE), "{not json").expect("write");
        assert_eq!(load_config(tmp.path()), None);
    }
}
