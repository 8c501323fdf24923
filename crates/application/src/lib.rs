//! Application orchestration layer for pdfshelf.
//!
//! [`Library`] backs the library screen (cards, upload, delete) and
//! [`ReaderSession`] drives one open document from loading to finished.

mod command;
mod latch;
mod library;
mod reader;

pub use command::{ReaderCommand, parse_page_input, slider_page, swipe_command};
pub use latch::{RenderGuard, RenderLatch};
pub use library::{
    BookCard, COVER_GRADIENTS, Confirmation, CoverStyle, DeleteOutcome, Library, LibraryError,
    LibrarySnapshot, Upload, format_size,
};
pub use reader::{
    Disposition, ReaderConfig, ReaderError, ReaderOutcome, ReaderPhase, ReaderSession,
    ReaderSnapshot,
};
