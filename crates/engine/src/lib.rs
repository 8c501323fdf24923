//! PDF engine wrapper.
//!
//! Documents are parsed with `pdf` to validate them and count pages; pages
//! are rasterized by pdfium on a dedicated render thread so the reader's
//! event loop keeps running while a render is in flight.

mod worker;

use std::sync::Arc;

use anyhow::Context as _;
use log::{debug, info};
use pdf::file::FileOptions;
use pdfshelf_core::{DocumentRenderer, RenderError, RenderableDocument};
use tokio::sync::oneshot;

use worker::{RenderJob, RenderWorker};

/// How far into the file the `%PDF-` marker may appear.
const HEADER_SEARCH_LEN: usize = 1024;

/// Cheap to clone; clones share one render thread and one pdfium binding.
#[derive(Debug, Clone)]
pub struct PdfEngine {
    worker: RenderWorker,
}

impl Default for PdfEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfEngine {
    pub fn new() -> Self {
        Self {
            worker: RenderWorker::spawn(),
        }
    }

    /// Binds pdfium on the render thread and reports whether it loaded.
    /// Blocks; call it outside the async runtime.
    pub fn check_pdfium(&self) -> anyhow::Result<()> {
        let (reply, answer) = oneshot::channel();
        self.worker.submit(RenderJob::Check { reply })?;
        answer
            .blocking_recv()
            .context("render thread stopped before answering")?
    }
}

impl DocumentRenderer for PdfEngine {
    type Document = PdfDocumentHandle;

    async fn open(&self, bytes: Vec<u8>) -> Result<PdfDocumentHandle, RenderError> {
        if !looks_like_pdf(&bytes) {
            return Err(RenderError::Malformed("missing %PDF- header".to_string()));
        }

        let bytes = Arc::new(bytes);
        let parse_bytes = Arc::clone(&bytes);
        let page_count = tokio::task::spawn_blocking(move || count_pages(&parse_bytes))
            .await
            .map_err(|err| RenderError::Failed(err.to_string()))?
            .map_err(|err| RenderError::Malformed(format!("{err:#}")))?;

        if page_count == 0 {
            return Err(RenderError::Malformed("document has no pages".to_string()));
        }
        info!("opened pdf: {} bytes, {page_count} pages", bytes.len());
        Ok(PdfDocumentHandle {
            bytes,
            page_count,
            worker: self.worker.clone(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct PdfDocumentHandle {
    bytes: Arc<Vec<u8>>,
    page_count: u32,
    worker: RenderWorker,
}

impl RenderableDocument for PdfDocumentHandle {
    type Surface = RgbaBitmap;

    fn page_count(&self) -> u32 {
        self.page_count
    }

    async fn render_page(&self, page: u32, scale: f32) -> Result<RgbaBitmap, RenderError> {
        if page == 0 || page > self.page_count {
            return Err(RenderError::Failed(format!(
                "page {page} out of range 1..={}",
                self.page_count
            )));
        }

        let started = std::time::Instant::now();
        let (reply, answer) = oneshot::channel();
        self.worker
            .submit(RenderJob::Page {
                bytes: Arc::clone(&self.bytes),
                page_index: page - 1,
                scale,
                reply,
            })
            .map_err(|err| RenderError::Failed(format!("{err:#}")))?;
        let bitmap = answer
            .await
            .map_err(|_| RenderError::Failed("render thread stopped".to_string()))?
            .map_err(|err| RenderError::Failed(format!("{err:#}")))?;
        debug!(
            "rendered page {page} at {scale:.2}x: {}x{} in {:?}",
            bitmap.width,
            bitmap.height,
            started.elapsed()
        );
        Ok(bitmap)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaBitmap {
    pub width: usize,
    pub height: usize,
    pub stride: usize,
    pub pixels: Vec<u8>,
}

pub fn looks_like_pdf(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(HEADER_SEARCH_LEN)];
    head.windows(5).any(|w| w == b"%PDF-")
}

fn count_pages(bytes: &[u8]) -> anyhow::Result<u32> {
    let file = FileOptions::cached()
        .load(bytes.to_vec())
        .context("parse pdf")?;
    Ok(file.num_pages())
}

/// Repacks a pdfium BGRA buffer (rows may be padded) into tight RGBA rows.
/// Missing source bytes read as opaque white.
fn bgra_to_rgba(src_pixels: &[u8], width: usize, height: usize) -> Vec<u8> {
    let src_stride = if height == 0 {
        0
    } else {
        src_pixels.len() / height
    };

    let mut pixels = Vec::with_capacity(width.saturating_mul(height).saturating_mul(4));
    for y in 0..height {
        let base = y.saturating_mul(src_stride);
        for x in 0..width {
            let idx = base.saturating_add(x.saturating_mul(4));
            let b = src_pixels.get(idx).copied().unwrap_or(255);
            let g = src_pixels.get(idx + 1).copied().unwrap_or(255);
            let r = src_pixels.get(idx + 2).copied().unwrap_or(255);
            let a = src_pixels.get(idx + 3).copied().unwrap_or(255);
            pixels.extend_from_slice(&[r, g, b, a]);
        }
    }
    pixels
}
