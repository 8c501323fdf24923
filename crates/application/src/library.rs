use std::rc::Rc;

use chrono::Utc;
use log::{debug, info, warn};
use pdfshelf_core::{BinaryStore, BookBinary, BookId, BookMetadata, MetadataStore, StoreError};

/// Cover backgrounds, picked by card position.
pub const COVER_GRADIENTS: [(&str, &str); 10] = [
    ("#667eea", "#764ba2"),
    ("#f093fb", "#f5576c"),
    ("#4facfe", "#00f2fe"),
    ("#43e97b", "#38f9d7"),
    ("#fa709a", "#fee140"),
    ("#a18cd1", "#fbc2eb"),
    ("#89f7fe", "#66a6ff"),
    ("#fddb92", "#d1fdff"),
    ("#a1c4fd", "#c2e9fb"),
    ("#ffecd2", "#fcb69f"),
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LibraryError {
    #[error("{name} is not a PDF document")]
    UnsupportedFile { name: String },
    #[error("{name} is empty")]
    EmptyFile { name: String },
    #[error("book not found: {0}")]
    NotFound(BookId),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// A file offered for import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub name: String,
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: None,
            bytes,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// A declared MIME type decides on its own; otherwise the extension does.
    pub fn is_document(&self) -> bool {
        if let Some(mime) = &self.mime {
            return mime.trim().eq_ignore_ascii_case("application/pdf");
        }
        std::path::Path::new(&self.name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted(BookMetadata),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverStyle {
    pub from: &'static str,
    pub to: &'static str,
    pub initial: char,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookCard {
    pub id: BookId,
    pub name: String,
    pub size_label: String,
    pub uploaded_label: String,
    pub last_page: u32,
    pub total_pages: u32,
    pub progress_pct: u8,
    pub cover: CoverStyle,
    pub action_label: String,
}

impl BookCard {
    fn from_metadata(index: usize, book: &BookMetadata) -> Self {
        let progress_pct = book.progress().percent();
        let (from, to) = COVER_GRADIENTS[index % COVER_GRADIENTS.len()];
        let initial = book
            .name
            .trim()
            .chars()
            .next()
            .map(|c| c.to_uppercase().next().unwrap_or(c))
            .unwrap_or('?');
        let action_label = if progress_pct > 0 {
            format!("Continue {progress_pct}%")
        } else {
            "Start reading".to_string()
        };

        Self {
            id: book.id.clone(),
            name: book.name.clone(),
            size_label: format_size(book.size),
            uploaded_label: book.upload_date.format("%Y-%m-%d").to_string(),
            last_page: book.last_page,
            total_pages: book.total_pages,
            progress_pct,
            cover: CoverStyle { from, to, initial },
            action_label,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LibrarySnapshot {
    pub cards: Vec<BookCard>,
}

impl LibrarySnapshot {
    pub fn count(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// The book list plus the document bytes behind it.
///
/// Every mutation is written through to both stores before it returns, so a
/// fresh [`Library::snapshot`] always reflects what is on disk.
#[derive(Debug)]
pub struct Library<M, B> {
    metadata: Rc<M>,
    binaries: Rc<B>,
}

impl<M, B> Library<M, B>
where
    M: MetadataStore,
    B: BinaryStore,
{
    pub fn new(metadata: Rc<M>, binaries: Rc<B>) -> Self {
        Self { metadata, binaries }
    }

    pub fn metadata(&self) -> &Rc<M> {
        &self.metadata
    }

    pub fn binaries(&self) -> &Rc<B> {
        &self.binaries
    }

    pub fn snapshot(&self) -> Result<LibrarySnapshot, LibraryError> {
        let books = self.metadata.load_books()?;
        let cards = books
            .iter()
            .enumerate()
            .map(|(index, book)| BookCard::from_metadata(index, book))
            .collect();
        Ok(LibrarySnapshot { cards })
    }

    /// Stores the bytes first, then prepends the record. If the record
    /// cannot be written the bytes are removed again.
    pub fn upload(&self, upload: Upload) -> Result<BookMetadata, LibraryError> {
        if !upload.is_document() {
            info!("rejected non-pdf upload: {}", upload.name);
            return Err(LibraryError::UnsupportedFile { name: upload.name });
        }
        if upload.bytes.is_empty() {
            return Err(LibraryError::EmptyFile { name: upload.name });
        }

        let id = BookId::generate();
        let size = upload.bytes.len() as u64;
        let binary = BookBinary {
            id: id.clone(),
            raw_bytes: upload.bytes,
        };
        self.binaries.put_binary(&binary)?;

        let book = BookMetadata::new(id, upload.name, size, Utc::now());
        if let Err(err) = self.metadata.prepend_book(book.clone()) {
            warn!("metadata write failed for {}, removing stored bytes: {err}", book.id);
            if let Err(rollback) = self.binaries.delete_binary(&book.id) {
                warn!("could not remove bytes for {}: {rollback}", book.id);
            }
            return Err(err.into());
        }

        info!("imported {} ({} bytes) as {}", book.name, book.size, book.id);
        Ok(book)
    }

    /// Deletes bytes then record, but only once the caller confirmed.
    pub fn delete(
        &self,
        id: &BookId,
        confirmation: Confirmation,
    ) -> Result<DeleteOutcome, LibraryError> {
        let book = self
            .metadata
            .find_book(id)?
            .ok_or_else(|| LibraryError::NotFound(id.clone()))?;

        if confirmation == Confirmation::Cancelled {
            debug!("delete of {id} cancelled");
            return Ok(DeleteOutcome::Cancelled);
        }

        if !self.binaries.delete_binary(id)? {
            debug!("no stored bytes for {id}");
        }
        self.metadata.remove_book(id)?;
        info!("deleted {} ({id})", book.name);
        Ok(DeleteOutcome::Deleted(book))
    }
}

pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let value = bytes as f64;
    if value < KB {
        format!("{bytes} B")
    } else if value < MB {
        format!("{:.1} KB", value / KB)
    } else {
        format!("{:.1} MB", value / MB)
    }
}
