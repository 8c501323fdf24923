//! Storage seams: the metadata list and the binary object store.

use crate::{BookBinary, BookId, BookMetadata};

/// Well-known key the book list is stored under.
pub const METADATA_KEY: &str = "ebook_meta";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("storage read failed: {0}")]
    Read(String),
    #[error("storage write failed: {0}")]
    Write(String),
}

/// Durable store for the whole book list.
///
/// Implementations only load and save the full list. Every mutation is a
/// read-modify-write of that list; concurrent writers are last-writer-wins.
pub trait MetadataStore {
    fn load_books(&self) -> Result<Vec<BookMetadata>, StoreError>;

    fn save_books(&self, books: &[BookMetadata]) -> Result<(), StoreError>;

    fn find_book(&self, id: &BookId) -> Result<Option<BookMetadata>, StoreError> {
        Ok(self.load_books()?.into_iter().find(|book| &book.id == id))
    }

    /// Inserts `book` at the front of the list, replacing any entry with the same id.
    fn prepend_book(&self, book: BookMetadata) -> Result<(), StoreError> {
        let mut books = self.load_books()?;
        books.retain(|existing| existing.id != book.id);
        books.insert(0, book);
        self.save_books(&books)
    }

    fn remove_book(&self, id: &BookId) -> Result<bool, StoreError> {
        let mut books = self.load_books()?;
        let before = books.len();
        books.retain(|book| &book.id != id);
        if books.len() == before {
            return Ok(false);
        }
        self.save_books(&books)?;
        Ok(true)
    }

    /// Returns `false` without writing when no entry has this id.
    fn update_progress(&self, id: &BookId, page: u32, total_pages: u32) -> Result<bool, StoreError> {
        self.modify_book(id, |book| book.record_progress(page, total_pages))
    }

    fn update_total_pages(&self, id: &BookId, total_pages: u32) -> Result<bool, StoreError> {
        self.modify_book(id, |book| book.record_total_pages(total_pages))
    }

    fn modify_book(
        &self,
        id: &BookId,
        update: impl FnOnce(&mut BookMetadata),
    ) -> Result<bool, StoreError> {
        let mut books = self.load_books()?;
        let Some(book) = books.iter_mut().find(|book| &book.id == id) else {
            return Ok(false);
        };
        update(book);
        self.save_books(&books)?;
        Ok(true)
    }
}

/// Durable store for raw document bytes, keyed by book id.
pub trait BinaryStore {
    fn put_binary(&self, binary: &BookBinary) -> Result<(), StoreError>;

    fn get_binary(&self, id: &BookId) -> Result<Option<BookBinary>, StoreError>;

    fn delete_binary(&self, id: &BookId) -> Result<bool, StoreError>;
}
