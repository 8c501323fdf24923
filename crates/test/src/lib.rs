//! Test helpers and fixtures.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;
use std::time::Duration;

use chrono::{TimeZone as _, Utc};
use pdfshelf_application::{Library, ReaderConfig, ReaderSession};
use pdfshelf_core::{
    BookBinary, BookId, BookMetadata, DocumentRenderer, MetadataStore, RenderError,
    RenderableDocument, StoreError, Zoom,
};
use pdfshelf_storage::{MemoryBinaryStore, MemoryMetadataStore};

pub const SAMPLE_PDF: &[u8] = b"%PDF-1.7\n% sample document body\n%%EOF\n";

pub fn sample_book(id: &str, last_page: u32, total_pages: u32) -> BookMetadata {
    let uploaded = Utc
        .with_ymd_and_hms(2024, 5, 1, 9, 30, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let mut book = BookMetadata::new(
        BookId::from(id),
        format!("{id}.pdf"),
        SAMPLE_PDF.len() as u64,
        uploaded,
    );
    book.last_page = last_page;
    book.total_pages = total_pages;
    book
}

pub fn sample_binary(id: &str) -> BookBinary {
    BookBinary {
        id: BookId::from(id),
        raw_bytes: SAMPLE_PDF.to_vec(),
    }
}

/// One page render as seen by [`ScriptedRenderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderCall {
    pub page: u32,
    pub zoom_percent: u16,
}

#[derive(Debug, Default)]
pub struct RenderLog {
    opens: Cell<usize>,
    renders: RefCell<Vec<RenderCall>>,
}

impl RenderLog {
    pub fn opens(&self) -> usize {
        self.opens.get()
    }

    pub fn renders(&self) -> Vec<RenderCall> {
        self.renders.borrow().clone()
    }

    pub fn render_count(&self) -> usize {
        self.renders.borrow().len()
    }
}

/// Stand-in for the PDF engine: any `%PDF` bytes open as a document with
/// a fixed page count, and each render takes `render_delay` of tokio time.
#[derive(Debug, Clone)]
pub struct ScriptedRenderer {
    pub pages: u32,
    pub render_delay: Duration,
    pub failing_pages: HashSet<u32>,
    pub log: Rc<RenderLog>,
}

impl ScriptedRenderer {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            render_delay: Duration::from_millis(40),
            failing_pages: HashSet::new(),
            log: Rc::new(RenderLog::default()),
        }
    }

    pub fn failing_on(mut self, page: u32) -> Self {
        self.failing_pages.insert(page);
        self
    }
}

#[derive(Debug)]
pub struct ScriptedDocument {
    pages: u32,
    render_delay: Duration,
    failing_pages: HashSet<u32>,
    log: Rc<RenderLog>,
}

/// What a scripted render "draws".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScriptedSurface {
    pub page: u32,
    pub zoom_percent: u16,
}

impl DocumentRenderer for ScriptedRenderer {
    type Document = ScriptedDocument;

    async fn open(&self, bytes: Vec<u8>) -> Result<ScriptedDocument, RenderError> {
        self.log.opens.set(self.log.opens.get() + 1);
        tokio::task::yield_now().await;
        if !bytes.starts_with(b"%PDF") {
            return Err(RenderError::Malformed("missing %PDF- header".to_string()));
        }
        Ok(ScriptedDocument {
            pages: self.pages,
            render_delay: self.render_delay,
            failing_pages: self.failing_pages.clone(),
            log: Rc::clone(&self.log),
        })
    }
}

impl RenderableDocument for ScriptedDocument {
    type Surface = ScriptedSurface;

    fn page_count(&self) -> u32 {
        self.pages
    }

    async fn render_page(&self, page: u32, scale: f32) -> Result<ScriptedSurface, RenderError> {
        let zoom_percent = (scale * 100.0).round() as u16;
        self.log
            .renders
            .borrow_mut()
            .push(RenderCall { page, zoom_percent });
        if self.render_delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.render_delay).await;
        }
        if self.failing_pages.contains(&page) {
            return Err(RenderError::Failed(format!("scripted failure on page {page}")));
        }
        Ok(ScriptedSurface { page, zoom_percent })
    }
}

/// Memory-backed metadata store that counts list writes and can be told
/// to reject them.
#[derive(Debug, Default)]
pub struct CountingMetadataStore {
    inner: MemoryMetadataStore,
    writes: Cell<usize>,
    fail_writes: Cell<bool>,
}

impl CountingMetadataStore {
    pub fn with_books(books: Vec<BookMetadata>) -> Self {
        Self {
            inner: MemoryMetadataStore::with_books(books),
            ..Self::default()
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl MetadataStore for CountingMetadataStore {
    fn load_books(&self) -> Result<Vec<BookMetadata>, StoreError> {
        self.inner.load_books()
    }

    fn save_books(&self, books: &[BookMetadata]) -> Result<(), StoreError> {
        if self.fail_writes.get() {
            return Err(StoreError::Write("quota exceeded".to_string()));
        }
        self.writes.set(self.writes.get() + 1);
        self.inner.save_books(books)
    }
}

pub type TestSession = ReaderSession<CountingMetadataStore, MemoryBinaryStore, ScriptedRenderer>;
pub type TestLibrary = Library<CountingMetadataStore, MemoryBinaryStore>;

/// Stores plus a renderer, wired the way the app wires them.
pub struct Harness {
    pub metadata: Rc<CountingMetadataStore>,
    pub binaries: Rc<MemoryBinaryStore>,
    pub renderer: ScriptedRenderer,
    pub config: ReaderConfig,
}

impl Harness {
    pub fn new(pages: u32) -> Self {
        Self {
            metadata: Rc::new(CountingMetadataStore::default()),
            binaries: Rc::new(MemoryBinaryStore::new()),
            renderer: ScriptedRenderer::new(pages),
            config: ReaderConfig {
                initial_zoom: Zoom::default(),
                finish_delay: Duration::from_millis(500),
            },
        }
    }

    /// Stores a book with the given progress and its bytes.
    pub fn with_book(self, id: &str, last_page: u32, total_pages: u32) -> Self {
        let mut books = self.metadata.load_books().unwrap_or_default();
        books.push(sample_book(id, last_page, total_pages));
        let metadata = Rc::new(CountingMetadataStore::with_books(books));
        let binaries = self.binaries;
        if let Err(err) =
            pdfshelf_core::BinaryStore::put_binary(binaries.as_ref(), &sample_binary(id))
        {
            panic!("store sample bytes for {id}: {err}");
        }
        Self {
            metadata,
            binaries,
            ..self
        }
    }

    pub fn session(&self) -> TestSession {
        ReaderSession::new(
            Rc::clone(&self.metadata),
            Rc::clone(&self.binaries),
            self.renderer.clone(),
            self.config,
        )
    }

    pub fn library(&self) -> TestLibrary {
        Library::new(Rc::clone(&self.metadata), Rc::clone(&self.binaries))
    }

    pub fn stored(&self, id: &str) -> Option<BookMetadata> {
        self.metadata.find_book(&BookId::from(id)).ok().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_sample_book() {
        let book = sample_book("a", 3, 9);
        assert_eq!(book.id, BookId::from("a"));
        assert_eq!(book.name, "a.pdf");
        assert_eq!((book.last_page, book.total_pages), (3, 9));
    }

    #[test]
    fn counting_store_can_reject_writes() {
        let store = CountingMetadataStore::default();
        store.set_fail_writes(true);
        assert!(store.prepend_book(sample_book("a", 1, 0)).is_err());
        store.set_fail_writes(false);
        assert!(store.prepend_book(sample_book("a", 1, 0)).is_ok());
        assert_eq!(store.writes(), 1);
    }

    #[test]
    fn harness_stores_book_and_bytes() {
        let harness = Harness::new(4).with_book("a", 2, 4);
        assert_eq!(harness.stored("a").map(|b| b.last_page), Some(2));
        assert_eq!(harness.binaries.len(), 1);
    }
}
