//! Boundary to the external document renderer.

use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("malformed document: {0}")]
    Malformed(String),
    #[error("page render failed: {0}")]
    Failed(String),
}

/// Opens raw document bytes into a renderable handle.
pub trait DocumentRenderer {
    type Document: RenderableDocument;

    fn open(&self, bytes: Vec<u8>) -> impl Future<Output = Result<Self::Document, RenderError>>;
}

pub trait RenderableDocument {
    type Surface;

    fn page_count(&self) -> u32;

    /// Renders the 1-based `page` at `scale` into a drawable surface.
    fn render_page(
        &self,
        page: u32,
        scale: f32,
    ) -> impl Future<Output = Result<Self::Surface, RenderError>>;
}
