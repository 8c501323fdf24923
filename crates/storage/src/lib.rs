//! Sqlite-backed persistence.
//!
//! The book list and settings live in one database as key/value rows; the
//! document bytes live in a second database so the list stays small.

use std::path::Path;

use anyhow::Context as _;
use log::{debug, warn};
use pdfshelf_core::{BookMetadata, METADATA_KEY, MetadataStore, Settings, StoreError};
use rusqlite::{Connection, OptionalExtension as _};

mod binary;
mod memory;

pub use binary::BinaryDb;
pub use memory::{MemoryBinaryStore, MemoryMetadataStore};

pub const METADATA_DB_FILE: &str = "pdfshelf.db";
pub const BINARY_DB_FILE: &str = "EbookReaderDB.db";

#[derive(Debug)]
pub struct MetadataDb {
    conn: Connection,
}

impl MetadataDb {
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
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (unixepoch())
            );

            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                default_zoom_percent INTEGER NOT NULL,
                finish_delay_ms INTEGER NOT NULL
            );
            INSERT OR IGNORE INTO settings (id, default_zoom_percent, finish_delay_ms)
            VALUES (1, 120, 500);
            "#,
            )
            .context("create metadata tables")?;

        self.add_column_if_missing(
            "ALTER TABLE settings ADD COLUMN swipe_threshold_cols INTEGER NOT NULL DEFAULT 6",
            "settings.swipe_threshold_cols",
        )?;
        self.add_column_if_missing(
            "ALTER TABLE settings ADD COLUMN confirm_delete INTEGER NOT NULL DEFAULT 1",
            "settings.confirm_delete",
        )?;
        Ok(())
    }

    fn add_column_if_missing(&self, sql: &str, column: &str) -> anyhow::Result<()> {
        match self.conn.execute(sql, []) {
            Ok(_) => Ok(()),
            Err(err) => {
                let msg = err.to_string();
                if msg.contains("duplicate column name") {
                    Ok(())
                } else {
                    Err(err).with_context(|| format!("add {column} column"))
                }
            }
        }
    }

    pub fn get_value(&self, key: &str) -> anyhow::Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("read key {key}"))
    }

    pub fn set_value(&self, key: &str, value: &str) -> anyhow::Result<()> {
        self.conn
            .execute(
                r#"
                INSERT INTO kv (key, value, updated_at) VALUES (?, ?, unixepoch())
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
                (key, value),
            )
            .with_context(|| format!("write key {key}"))?;
        Ok(())
    }

    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        let row = self
            .conn
            .query_row(
                "SELECT default_zoom_percent, finish_delay_ms, swipe_threshold_cols, confirm_delete FROM settings WHERE id = 1",
                [],
                |row| {
                    let zoom: i64 = row.get(0)?;
                    let delay: i64 = row.get(1)?;
                    let swipe: i64 = row.get(2)?;
                    let confirm: i64 = row.get(3)?;
                    Ok((zoom, delay, swipe, confirm))
                },
            )
            .optional()
            .context("load settings")?;

        let defaults = Settings::default();
        let mut settings = match row {
            Some((zoom, delay, swipe, confirm)) => Settings {
                default_zoom_percent: u16::try_from(zoom).unwrap_or(defaults.default_zoom_percent),
                finish_delay_ms: u64::try_from(delay).unwrap_or(defaults.finish_delay_ms),
                swipe_threshold_cols: u16::try_from(swipe)
                    .unwrap_or(defaults.swipe_threshold_cols),
                confirm_delete: confirm != 0,
            },
            None => defaults,
        };
        settings.normalize();
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();
        self.conn
            .execute(
                "UPDATE settings SET default_zoom_percent = ?, finish_delay_ms = ?, swipe_threshold_cols = ?, confirm_delete = ? WHERE id = 1",
                (
                    i64::from(settings.default_zoom_percent),
                    settings.finish_delay_ms as i64,
                    i64::from(settings.swipe_threshold_cols),
                    i64::from(settings.confirm_delete),
                ),
            )
            .context("save settings")?;
        Ok(())
    }
}

impl MetadataStore for MetadataDb {
    fn load_books(&self) -> Result<Vec<BookMetadata>, StoreError> {
        let raw = self
            .get_value(METADATA_KEY)
            .map_err(|err| StoreError::Read(format!("{err:#}")))?;
        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<BookMetadata>>(&raw) {
            Ok(books) => Ok(books),
            Err(err) => {
                warn!("stored book list is not valid json, treating as empty: {err}");
                Ok(Vec::new())
            }
        }
    }

    fn save_books(&self, books: &[BookMetadata]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(books).map_err(|err| StoreError::Write(err.to_string()))?;
        self.set_value(METADATA_KEY, &raw)
            .map_err(|err| StoreError::Write(format!("{err:#}")))?;
        debug!("saved {} book records", books.len());
        Ok(())
    }
}
