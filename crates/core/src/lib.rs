//! Core domain types for pdfshelf.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod navigation;
pub mod render;
pub mod store;

pub use navigation::{DocumentSource, NavigationParams};
pub use render::{DocumentRenderer, RenderError, RenderableDocument};
pub use store::{BinaryStore, METADATA_KEY, MetadataStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub String);

impl BookId {
    pub fn generate() -> Self {
        Self(format!("book_{}", uuid::Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BookId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// One entry of the persisted book list.
///
/// Field names follow the stored JSON shape
/// `{id, name, size, uploadDate, lastPage, totalPages}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMetadata {
    pub id: BookId,
    pub name: String,
    pub size: u64,
    pub upload_date: DateTime<Utc>,
    #[serde(default = "first_page")]
    pub last_page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

fn first_page() -> u32 {
    1
}

impl BookMetadata {
    pub fn new(id: BookId, name: impl Into<String>, size: u64, upload_date: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            upload_date,
            last_page: 1,
            total_pages: 0,
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            current_page: self.last_page,
            total_pages: self.total_pages,
        }
    }

    /// Records a rendered page. The page is clamped so that
    /// `1 <= last_page <= total_pages` whenever the total is known.
    pub fn record_progress(&mut self, page: u32, total_pages: u32) {
        self.total_pages = total_pages;
        self.last_page = page.clamp(1, total_pages.max(1));
    }

    pub fn record_total_pages(&mut self, total_pages: u32) {
        self.record_progress(self.last_page, total_pages);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookBinary {
    pub id: BookId,
    pub raw_bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current_page: u32,
    pub total_pages: u32,
}

impl Progress {
    /// Whole-number percentage, `0` while the page count is unknown.
    pub fn percent(&self) -> u8 {
        if self.total_pages == 0 {
            return 0;
        }
        let pct = (f64::from(self.current_page) / f64::from(self.total_pages)) * 100.0;
        pct.round().clamp(0.0, 100.0) as u8
    }
}

/// Reader zoom level, stored as a whole percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Zoom(u16);

impl Zoom {
    pub const MIN_PERCENT: u16 = 50;
    pub const MAX_PERCENT: u16 = 300;
    pub const STEP_PERCENT: u16 = 20;
    pub const DEFAULT_PERCENT: u16 = 120;

    pub fn from_percent(percent: u16) -> Self {
        Self(percent.clamp(Self::MIN_PERCENT, Self::MAX_PERCENT))
    }

    pub fn percent(self) -> u16 {
        self.0
    }

    pub fn scale(self) -> f32 {
        f32::from(self.0) / 100.0
    }

    pub fn zoom_in(self) -> Self {
        Self::from_percent(self.0.saturating_add(Self::STEP_PERCENT))
    }

    pub fn zoom_out(self) -> Self {
        Self::from_percent(self.0.saturating_sub(Self::STEP_PERCENT))
    }

    pub fn label(self) -> String {
        format!("{}%", self.0)
    }
}

impl Default for Zoom {
    fn default() -> Self {
        Self(Self::DEFAULT_PERCENT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_zoom_percent: u16,
    pub finish_delay_ms: u64,
    pub swipe_threshold_cols: u16,
    pub confirm_delete: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_zoom_percent: Zoom::DEFAULT_PERCENT,
            finish_delay_ms: 500,
            swipe_threshold_cols: 6,
            confirm_delete: true,
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        self.default_zoom_percent = self
            .default_zoom_percent
            .clamp(Zoom::MIN_PERCENT, Zoom::MAX_PERCENT);
        self.finish_delay_ms = self.finish_delay_ms.min(5_000);
        self.swipe_threshold_cols = self.swipe_threshold_cols.clamp(1, 80);
    }

    pub fn default_zoom(&self) -> Zoom {
        Zoom::from_percent(self.default_zoom_percent)
    }

    pub fn finish_delay(&self) -> Duration {
        Duration::from_millis(self.finish_delay_ms)
    }
}
