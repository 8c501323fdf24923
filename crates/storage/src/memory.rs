//! In-memory stores, useful for tests and throwaway sessions.

use std::cell::RefCell;
use std::collections::HashMap;

use pdfshelf_core::{BinaryStore, BookBinary, BookId, BookMetadata, MetadataStore, StoreError};

#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    books: RefCell<Vec<BookMetadata>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_books(books: Vec<BookMetadata>) -> Self {
        Self {
            books: RefCell::new(books),
        }
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn load_books(&self) -> Result<Vec<BookMetadata>, StoreError> {
        Ok(self.books.borrow().clone())
    }

    fn save_books(&self, books: &[BookMetadata]) -> Result<(), StoreError> {
        *self.books.borrow_mut() = books.to_vec();
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryBinaryStore {
    binaries: RefCell<HashMap<BookId, Vec<u8>>>,
}

impl MemoryBinaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.binaries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.binaries.borrow().is_empty()
    }

    /// Drops every stored document, as if the object store had been cleared
    /// independently of the book list.
    pub fn clear(&self) {
        self.binaries.borrow_mut().clear();
    }
}

impl BinaryStore for MemoryBinaryStore {
    fn put_binary(&self, binary: &BookBinary) -> Result<(), StoreError> {
        self.binaries
            .borrow_mut()
            .insert(binary.id.clone(), binary.raw_bytes.clone());
        Ok(())
    }

    fn get_binary(&self, id: &BookId) -> Result<Option<BookBinary>, StoreError> {
        Ok(self.binaries.borrow().get(id).map(|raw_bytes| BookBinary {
            id: id.clone(),
            raw_bytes: raw_bytes.clone(),
        }))
    }

    fn delete_binary(&self, id: &BookId) -> Result<bool, StoreError> {
        Ok(self.binaries.borrow_mut().remove(id).is_some())
    }
}
