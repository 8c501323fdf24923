use std::path::Path;

use anyhow::Context as _;
use log::debug;
use pdfshelf_core::{BinaryStore, BookBinary, BookId, StoreError};
use rusqlite::{Connection, OptionalExtension as _};

/// Document bytes keyed by book id, one row per book.
#[derive(Debug)]
pub struct BinaryDb {
    conn: Connection,
}

impl BinaryDb {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("open sqlite db at {}", path.as_ref().display()))?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                r#"
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                raw_bytes BLOB NOT NULL,
                stored_at INTEGER NOT NULL DEFAULT (unixepoch())
            );
            "#,
            )
            .context("create books table")?;
        Ok(())
    }

    fn put(&self, binary: &BookBinary) -> anyhow::Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin binary write")?;
        tx.execute(
            r#"
            INSERT INTO books (id, raw_bytes, stored_at) VALUES (?, ?, unixepoch())
            ON CONFLICT(id) DO UPDATE SET raw_bytes = excluded.raw_bytes, stored_at = excluded.stored_at
            "#,
            (binary.id.as_str(), &binary.raw_bytes),
        )
        .with_context(|| format!("store bytes for {}", binary.id))?;
        tx.commit().context("commit binary write")?;
        Ok(())
    }

    fn get(&self, id: &BookId) -> anyhow::Result<Option<BookBinary>> {
        let raw_bytes: Option<Vec<u8>> = self
            .conn
            .query_row("SELECT raw_bytes FROM books WHERE id = ?", [id.as_str()], |row| {
                row.get(0)
            })
            .optional()
            .with_context(|| format!("read bytes for {id}"))?;
        Ok(raw_bytes.map(|raw_bytes| BookBinary {
            id: id.clone(),
            raw_bytes,
        }))
    }

    fn delete(&self, id: &BookId) -> anyhow::Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM books WHERE id = ?", [id.as_str()])
            .with_context(|| format!("delete bytes for {id}"))?;
        Ok(removed > 0)
    }
}

impl BinaryStore for BinaryDb {
    fn put_binary(&self, binary: &BookBinary) -> Result<(), StoreError> {
        self.put(binary)
            .map_err(|err| StoreError::Write(format!("{err:#}")))?;
        debug!("stored {} bytes for {}", binary.raw_bytes.len(), binary.id);
        Ok(())
    }

    fn get_binary(&self, id: &BookId) -> Result<Option<BookBinary>, StoreError> {
        self.get(id).map_err(|err| StoreError::Read(format!("{err:#}")))
    }

    fn delete_binary(&self, id: &BookId) -> Result<bool, StoreError> {
        self.delete(id)
            .map_err(|err| StoreError::Write(format!("{err:#}")))
    }
}
