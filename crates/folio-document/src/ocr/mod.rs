// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text recognition — run OCR over page images, clean the output, and join
// per-page text into one document string.
//
// The OCR engine itself sits behind [`OcrBackend`]. With the `ocr` feature
// the `ocrs` engine is available as [`OcrsBackend`].

#[cfg(feature = "ocr")]
pub mod engine;

#[cfg(feature = "ocr")]
pub use engine::{OcrConfig, OcrsBackend, default_model_dir};

use std::sync::Arc;

use folio_core::config::RecognitionConfig;
use folio_core::error::{FolioError, Result};
use image::DynamicImage;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::image::ImageProcessor;
use crate::pdf::PdfRasterizer;

/// Placed between the text of consecutive pages.
pub const PAGE_BREAK: &str = "\n\n--- Page Break ---\n\n";

/// An OCR engine: image in, raw recognized text out.
///
/// Implementations are shared across worker threads.
pub trait OcrBackend: Send + Sync {
    fn recognize_text(&self, image: &DynamicImage) -> Result<String>;
}

/// Recognizes text on page images, one page at a time or many in parallel.
///
/// Recognition never fails the caller: a page the backend cannot read
/// contributes empty text.
#[derive(Clone)]
pub struct TextRecognizer {
    backend: Arc<dyn OcrBackend>,
    config: RecognitionConfig,
}

impl TextRecognizer {
    pub fn new(backend: Arc<dyn OcrBackend>, config: RecognitionConfig) -> Self {
        Self { backend, config }
    }

    /// Recognize one page. Returns cleaned text, possibly empty.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn recognize(&self, image: &DynamicImage) -> String {
        recognize_with(self.backend.as_ref(), image, &self.config)
    }

    /// Recognize every page, at most `config.concurrency()` at a time.
    ///
    /// The result has one entry per input, in input order, regardless of the
    /// order pages finish in. Each image is dropped as soon as its page is
    /// done.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub async fn recognize_pages(&self, pages: Vec<Arc<DynamicImage>>) -> Vec<String> {
        let loaders = pages.into_iter().map(|image| move || Ok::<_, FolioError>(image)).collect();
        self.recognize_each(loaders).await
    }

    /// Rasterise and recognize every page of `pdf`.
    ///
    /// Each worker rasterises its own page after taking a pool slot, so no
    /// more than `config.concurrency()` page bitmaps exist at once. A page
    /// that fails to rasterise contributes empty text. Fails only when the
    /// document cannot be parsed.
    #[instrument(skip_all, fields(bytes_len = pdf.len(), scale))]
    pub async fn recognize_pdf(
        &self,
        rasterizer: Arc<dyn PdfRasterizer>,
        pdf: Arc<Vec<u8>>,
        scale: f32,
    ) -> Result<Vec<String>> {
        let count = {
            let rasterizer = Arc::clone(&rasterizer);
            let pdf = Arc::clone(&pdf);
            tokio::task::spawn_blocking(move || rasterizer.page_count(&pdf))
                .await
                .map_err(|err| FolioError::Pdf(format!("page count task failed: {err}")))??
        };

        let loaders = (0..count)
            .map(|index| {
                let rasterizer = Arc::clone(&rasterizer);
                let pdf = Arc::clone(&pdf);
                move || rasterizer.rasterize_page(&pdf, index, scale).map(Arc::new)
            })
            .collect();
        Ok(self.recognize_each(loaders).await)
    }

    /// Run `load` then recognition for each page on the bounded pool. The
    /// result has one entry per loader, in loader order.
    async fn recognize_each<L>(&self, loaders: Vec<L>) -> Vec<String>
    where
        L: FnOnce() -> Result<Arc<DynamicImage>> + Send + 'static,
    {
        let total = loaders.len();
        let limit = self.config.concurrency();
        debug!(limit, total, "Recognizing pages");

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut tasks = JoinSet::new();

        for (index, load) in loaders.into_iter().enumerate() {
            let backend = Arc::clone(&self.backend);
            let config = self.config.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                // The semaphore is never closed, so acquire only fails if it is.
                let _permit = semaphore.acquire_owned().await.ok();
                let joined = tokio::task::spawn_blocking(move || match load() {
                    Ok(image) => recognize_with(backend.as_ref(), &image, &config),
                    Err(err) => {
                        warn!(page = index + 1, %err, "Page unavailable; it has no text");
                        String::new()
                    }
                })
                .await;
                (index, joined)
            });
        }

        let mut texts = vec![String::new(); total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(text))) => texts[index] = text,
                Ok((index, Err(err))) => {
                    warn!(page = index + 1, %err, "Recognition worker died; page has no text");
                }
                Err(err) => warn!(%err, "Recognition task aborted"),
            }
        }
        texts
    }
}

fn recognize_with(
    backend: &dyn OcrBackend,
    image: &DynamicImage,
    config: &RecognitionConfig,
) -> String {
    let raw = if config.binarize {
        let prepared = ImageProcessor::from_dynamic(image.clone())
            .binarize_otsu()
            .into_dynamic();
        backend.recognize_text(&prepared)
    } else {
        backend.recognize_text(image)
    };

    match raw {
        Ok(raw) => clean_text(&raw, config.language_correction),
        Err(err) => {
            warn!(%err, "Recognition failed; page contributes no text");
            String::new()
        }
    }
}

/// Join per-page texts with [`PAGE_BREAK`], skipping pages with no text.
///
/// Returns `None` when no page has text. A single page with text comes back
/// without any separator.
pub fn join_page_texts<S: AsRef<str>>(texts: &[S]) -> Option<String> {
    let non_empty: Vec<&str> = texts
        .iter()
        .map(AsRef::as_ref)
        .filter(|text| !text.trim().is_empty())
        .collect();
    if non_empty.is_empty() {
        None
    } else {
        Some(non_empty.join(PAGE_BREAK))
    }
}

// -- Cleaning -----------------------------------------------------------------

/// Normalise raw OCR output.
///
/// Line endings become `\n`, runs of whitespace inside a line collapse to one
/// space, and blank lines are dropped. With `language_correction`, typographic
/// ligatures are expanded and words hyphenated across a line break are
/// rejoined.
pub fn clean_text(raw: &str, language_correction: bool) -> String {
    let normalised = raw.replace("\r\n", "\n").replace('\r', "\n");
    let mut lines: Vec<String> = normalised
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect();

    if language_correction {
        lines = lines.iter().map(|line| expand_ligatures(line)).collect();
        lines = dehyphenate(lines);
    }
    lines.join("\n")
}

fn expand_ligatures(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    for ch in line.chars() {
        match ch {
            '\u{FB00}' => out.push_str("ff"),
            '\u{FB01}' => out.push_str("fi"),
            '\u{FB02}' => out.push_str("fl"),
            '\u{FB03}' => out.push_str("ffi"),
            '\u{FB04}' => out.push_str("ffl"),
            '\u{FB05}' | '\u{FB06}' => out.push_str("st"),
            other => out.push(other),
        }
    }
    out
}

/// A line ending in a letter followed by `-` splits a word.
fn ends_with_split_word(line: &str) -> bool {
    let mut chars = line.chars().rev();
    chars.next() == Some('-') && chars.next().is_some_and(char::is_alphabetic)
}

fn dehyphenate(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if let Some(prev) = out.last_mut()
            && ends_with_split_word(prev)
            && line.starts_with(char::is_lowercase)
        {
            prev.pop();
            match line.split_once(' ') {
                Some((head, tail)) => {
                    prev.push_str(head);
                    let tail = tail.to_string();
                    out.push(tail);
                }
                None => prev.push_str(&line),
            }
            continue;
        }
        out.push(line);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_core::FolioError;
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Reads the page number back out of the image width.
    struct WidthBackend;

    impl OcrBackend for WidthBackend {
        fn recognize_text(&self, image: &DynamicImage) -> Result<String> {
            let page = image.width();
            // Later pages finish first.
            std::thread::sleep(Duration::from_millis(u64::from(50 - page * 5)));
            if page == 3 {
                return Err(FolioError::Recognition("unreadable".into()));
            }
            Ok(format!("  page   {page}  \r\n\r\n"))
        }
    }

    struct ConstBackend(&'static str);

    impl OcrBackend for ConstBackend {
        fn recognize_text(&self, _image: &DynamicImage) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Tracks how many calls run at once.
    struct CountingBackend {
        active: AtomicUsize,
        peak: Mutex<usize>,
    }

    impl OcrBackend for CountingBackend {
        fn recognize_text(&self, _image: &DynamicImage) -> Result<String> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            {
                let mut peak = self.peak.lock().expect("peak lock");
                *peak = (*peak).max(now);
            }
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(String::new())
        }
    }

    fn blank(width: u32) -> Arc<DynamicImage> {
        Arc::new(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            8,
            Rgb([255, 255, 255]),
        )))
    }

    fn recognizer(backend: impl OcrBackend + 'static, max: usize) -> TextRecognizer {
        TextRecognizer::new(
            Arc::new(backend),
            RecognitionConfig {
                max_concurrency: Some(max),
                ..Default::default()
            },
        )
    }

    #[test]
    fn join_skips_empty_pages() {
        let joined = join_page_texts(&["Hello", "", "World"]).expect("text");
        assert_eq!(joined, "Hello\n\n--- Page Break ---\n\nWorld");
    }

    #[test]
    fn join_single_page_has_no_separator() {
        assert_eq!(join_page_texts(&["", "Only", "  "]).as_deref(), Some("Only"));
    }

    #[test]
    fn join_all_empty_is_none() {
        assert_eq!(join_page_texts(&["", " \n "]), None);
        assert_eq!(join_page_texts::<&str>(&[]), None);
    }

    #[test]
    fn blank_output_recognizes_as_empty() {
        let text = recognizer(ConstBackend("  \n\t\n   "), 1).recognize(&blank(10));
        assert_eq!(text, "");
    }

    #[test]
    fn backend_failure_yields_empty_text() {
        let text = recognizer(WidthBackend, 1).recognize(&blank(3));
        assert_eq!(text, "");
    }

    #[tokio::test]
    async fn pages_come_back_in_input_order() {
        let pages = (1..=5).map(blank).collect();
        let texts = recognizer(WidthBackend, 4).recognize_pages(pages).await;
        assert_eq!(texts, vec!["page 1", "page 2", "", "page 4", "page 5"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrency_is_bounded() {
        let backend = Arc::new(CountingBackend {
            active: AtomicUsize::new(0),
            peak: Mutex::new(0),
        });
        let recognizer = TextRecognizer::new(
            Arc::clone(&backend) as Arc<dyn OcrBackend>,
            RecognitionConfig {
                max_concurrency: Some(2),
                ..Default::default()
            },
        );
        let pages = (1..=8).map(blank).collect();
        let texts = recognizer.recognize_pages(pages).await;
        assert_eq!(texts.len(), 8);
        assert!(*backend.peak.lock().expect("peak lock") <= 2);
    }

    /// Counts how many rasterised pages are alive at once.
    struct CountingRasterizer {
        pages: usize,
        live: Arc<AtomicUsize>,
        peak: Arc<Mutex<usize>>,
    }

    /// Pixel buffer that reports its own lifetime to a [`CountingRasterizer`].
    fn tracked_page(live: &Arc<AtomicUsize>, peak: &Arc<Mutex<usize>>, width: u32) -> DynamicImage {
        let now = live.fetch_add(1, Ordering::SeqCst) + 1;
        let mut peak = peak.lock().expect("peak lock");
        *peak = (*peak).max(now);
        blank(width).as_ref().clone()
    }

    impl PdfRasterizer for CountingRasterizer {
        fn page_count(&self, _pdf: &[u8]) -> Result<usize> {
            Ok(self.pages)
        }

        fn page_size(&self, _pdf: &[u8], _index: usize) -> Result<(f32, f32)> {
            Ok((8.0, 8.0))
        }

        fn rasterize_page(&self, _pdf: &[u8], index: usize, _scale: f32) -> Result<DynamicImage> {
            if index == 2 {
                return Err(FolioError::Rasterize {
                    page: 3,
                    detail: "injected".into(),
                });
            }
            Ok(tracked_page(&self.live, &self.peak, index as u32 + 1))
        }
    }

    /// Marks the page released once recognition is done with it.
    struct ReleasingBackend {
        live: Arc<AtomicUsize>,
    }

    impl OcrBackend for ReleasingBackend {
        fn recognize_text(&self, image: &DynamicImage) -> Result<String> {
            std::thread::sleep(Duration::from_millis(10));
            self.live.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("page {}", image.width()))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pdf_pages_are_rasterised_inside_the_pool() {
        let live = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(Mutex::new(0));
        let rasterizer = Arc::new(CountingRasterizer {
            pages: 10,
            live: Arc::clone(&live),
            peak: Arc::clone(&peak),
        });
        let recognizer = recognizer(
            ReleasingBackend {
                live: Arc::clone(&live),
            },
            2,
        );

        let texts = recognizer
            .recognize_pdf(rasterizer, Arc::new(Vec::new()), 1.0)
            .await
            .expect("recognize");
        assert_eq!(texts.len(), 10);
        assert_eq!(texts[0], "page 1");
        assert_eq!(texts[2], "", "failed page has no text");
        assert_eq!(texts[9], "page 10");
        assert!(*peak.lock().expect("peak lock") <= 2);
    }

    #[tokio::test]
    async fn unparseable_pdf_fails_recognition() {
        let recognizer = recognizer(ConstBackend("x"), 2);
        let result = recognizer
            .recognize_pdf(
                Arc::new(crate::pdf::ImagePageRasterizer::new()),
                Arc::new(b"garbage".to_vec()),
                1.0,
            )
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn cleaning_collapses_whitespace_and_blank_lines() {
        assert_eq!(clean_text("  a   b \n\n\n c\r\nd  ", false), "a b\nc\nd");
    }

    #[test]
    fn correction_expands_ligatures() {
        assert_eq!(clean_text("\u{FB01}nal o\u{FB03}ce", true), "final office");
        assert_eq!(clean_text("\u{FB01}nal", false), "\u{FB01}nal");
    }

    #[test]
    fn correction_rejoins_hyphenated_words() {
        assert_eq!(
            clean_text("the docu-\nment was signed", true),
            "the document\nwas signed"
        );
        assert_eq!(clean_text("the docu-\nment", true), "the document");
        // Capitalised continuation is a genuine dash.
        assert_eq!(clean_text("Jean-\nPaul", true), "Jean-\nPaul");
        assert_eq!(clean_text("the docu-\nment", false), "the docu-\nment");
    }

    #[test]
    fn binarize_option_still_recognizes() {
        let recognizer = TextRecognizer::new(
            Arc::new(ConstBackend("ok")),
            RecognitionConfig {
                binarize: true,
                ..Default::default()
            },
        );
        assert_eq!(recognizer.recognize(&blank(4)), "ok");
    }
}
