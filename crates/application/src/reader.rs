//! Reader session: one open document, its current page and zoom.
//!
//! ```text
//! Loading -> Rendering <-> Ready -> Finished
//!    \           \
//!     +-> Error <-+
//! ```
//!
//! All methods take `&self`; the session is meant to be shared through an
//! `Rc` by the event handlers of a single-threaded runtime. At most one
//! render is in flight. Requests that arrive meanwhile are dropped, not
//! queued.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use log::{debug, info, warn};
use pdfshelf_core::{
    BinaryStore, BookId, DocumentRenderer, DocumentSource, MetadataStore, NavigationParams,
    Progress, RenderableDocument, Settings, StoreError, Zoom,
};

use crate::command::ReaderCommand;
use crate::latch::RenderLatch;

type DocumentOf<R> = <R as DocumentRenderer>::Document;
type SurfaceOf<R> = <DocumentOf<R> as RenderableDocument>::Surface;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReaderError {
    #[error("no book was specified")]
    MissingParameter,
    #[error("book not found: {0}")]
    BookNotFound(BookId),
    #[error("document data is missing for {0}, it may have been cleared")]
    DocumentMissing(String),
    #[error("could not open document: {0}")]
    MalformedDocument(String),
    #[error("could not render page {page}: {reason}")]
    Render { page: u32, reason: String },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// How the front end should surface a [`ReaderError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Leave the reader with a message; nothing was opened.
    RedirectToLibrary,
    /// Show the message; the session stays in `Error`.
    Alert,
    /// Transient message; the operation did not take effect.
    Notice,
}

impl ReaderError {
    pub fn disposition(&self) -> Disposition {
        match self {
            ReaderError::MissingParameter
            | ReaderError::BookNotFound(_)
            | ReaderError::DocumentMissing(_) => Disposition::RedirectToLibrary,
            ReaderError::MalformedDocument(_) | ReaderError::Render { .. } => Disposition::Alert,
            ReaderError::Storage(_) => Disposition::Notice,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderPhase {
    Loading,
    Ready,
    Rendering,
    Finished,
    Error(ReaderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderOutcome {
    Rendered { page: u32 },
    /// The final page rendered and the completion panel is showing.
    Finished { page: u32 },
    /// Target equals the page already shown.
    NoOp,
    /// Another render was in flight.
    Dropped,
    /// The current phase does not accept this request.
    Ignored,
    Fullscreen(bool),
    ReturnToLibrary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    pub initial_zoom: Zoom,
    pub finish_delay: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig::from(&Settings::default())
    }
}

impl From<&Settings> for ReaderConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            initial_zoom: settings.default_zoom(),
            finish_delay: settings.finish_delay(),
        }
    }
}

/// What the reader screen draws.
#[derive(Debug, Clone)]
pub struct ReaderSnapshot<S> {
    pub phase: ReaderPhase,
    pub name: String,
    pub current_page: u32,
    pub total_pages: u32,
    pub zoom: Zoom,
    pub fullscreen: bool,
    pub notice: Option<String>,
    pub surface: Option<Rc<S>>,
    /// Bumps whenever `surface` is replaced.
    pub surface_generation: u64,
}

impl<S> ReaderSnapshot<S> {
    pub fn progress_pct(&self) -> u8 {
        Progress {
            current_page: self.current_page,
            total_pages: self.total_pages,
        }
        .percent()
    }
}

struct SessionState<D: RenderableDocument> {
    phase: ReaderPhase,
    book_id: Option<BookId>,
    name: String,
    document: Option<Rc<D>>,
    /// `0` until the first page has rendered.
    current_page: u32,
    total_pages: u32,
    zoom: Zoom,
    fullscreen: bool,
    notice: Option<String>,
    surface: Option<Rc<D::Surface>>,
    surface_generation: u64,
}

pub struct ReaderSession<M, B, R: DocumentRenderer> {
    metadata: Rc<M>,
    binaries: Rc<B>,
    renderer: R,
    config: ReaderConfig,
    latch: RenderLatch,
    state: RefCell<SessionState<DocumentOf<R>>>,
}

impl<M, B, R> ReaderSession<M, B, R>
where
    M: MetadataStore,
    B: BinaryStore,
    R: DocumentRenderer,
{
    pub fn new(metadata: Rc<M>, binaries: Rc<B>, renderer: R, config: ReaderConfig) -> Self {
        Self {
            metadata,
            binaries,
            renderer,
            config,
            latch: RenderLatch::new(),
            state: RefCell::new(SessionState {
                phase: ReaderPhase::Loading,
                book_id: None,
                name: String::new(),
                document: None,
                current_page: 0,
                total_pages: 0,
                zoom: config.initial_zoom,
                fullscreen: false,
                notice: None,
                surface: None,
                surface_generation: 0,
            }),
        }
    }

    pub fn phase(&self) -> ReaderPhase {
        self.state.borrow().phase.clone()
    }

    pub fn current_page(&self) -> u32 {
        self.state.borrow().current_page
    }

    pub fn total_pages(&self) -> u32 {
        self.state.borrow().total_pages
    }

    pub fn zoom(&self) -> Zoom {
        self.state.borrow().zoom
    }

    pub fn is_rendering(&self) -> bool {
        self.latch.is_held()
    }

    pub fn snapshot(&self) -> ReaderSnapshot<SurfaceOf<R>> {
        let state = self.state.borrow();
        ReaderSnapshot {
            phase: state.phase.clone(),
            name: state.name.clone(),
            current_page: state.current_page,
            total_pages: state.total_pages,
            zoom: state.zoom,
            fullscreen: state.fullscreen,
            notice: state.notice.clone(),
            surface: state.surface.clone(),
            surface_generation: state.surface_generation,
        }
    }

    pub fn clear_notice(&self) {
        self.state.borrow_mut().notice = None;
    }

    /// Resolves the document, opens it, and renders the page the reader
    /// left off on. Any failure leaves the session in `Error`.
    pub async fn load(&self, params: &NavigationParams) -> Result<ReaderOutcome, ReaderError> {
        if self.state.borrow().phase != ReaderPhase::Loading {
            return Ok(ReaderOutcome::Ignored);
        }

        let (book_id, name, last_page, bytes) = match self.resolve(params) {
            Ok(resolved) => resolved,
            Err(err) => return Err(self.fail(err)),
        };

        let document = match self.renderer.open(bytes).await {
            Ok(document) => document,
            Err(err) => return Err(self.fail(ReaderError::MalformedDocument(err.to_string()))),
        };
        let total_pages = document.page_count();
        info!("opened {name}: {total_pages} pages");

        if let Some(id) = &book_id
            && let Err(err) = self.metadata.update_total_pages(id, total_pages)
        {
            warn!("could not record page count for {id}: {err}");
            self.state.borrow_mut().notice = Some(err.to_string());
        }

        let initial_page = if (1..=total_pages).contains(&last_page) {
            last_page
        } else {
            1
        };

        {
            let mut state = self.state.borrow_mut();
            state.book_id = book_id;
            state.name = name;
            state.document = Some(Rc::new(document));
            state.total_pages = total_pages;
        }

        self.render(initial_page).await
    }

    fn resolve(
        &self,
        params: &NavigationParams,
    ) -> Result<(Option<BookId>, String, u32, Vec<u8>), ReaderError> {
        match params.source().ok_or(ReaderError::MissingParameter)? {
            DocumentSource::Stored(id) => {
                let book = self
                    .metadata
                    .find_book(&id)?
                    .ok_or_else(|| ReaderError::BookNotFound(id.clone()))?;
                let binary = self
                    .binaries
                    .get_binary(&id)?
                    .filter(|binary| !binary.raw_bytes.is_empty())
                    .ok_or_else(|| ReaderError::DocumentMissing(id.to_string()))?;
                Ok((Some(id), book.name, book.last_page, binary.raw_bytes))
            }
            DocumentSource::File { path, name, id } => {
                let bytes = std::fs::read(&path).map_err(|err| {
                    ReaderError::DocumentMissing(format!("{}: {err}", path.display()))
                })?;
                let last_page = match &id {
                    Some(id) => self
                        .metadata
                        .find_book(id)?
                        .map(|book| book.last_page)
                        .unwrap_or(1),
                    None => 1,
                };
                Ok((id, name, last_page, bytes))
            }
        }
    }

    fn fail(&self, err: ReaderError) -> ReaderError {
        warn!("reader failed: {err}");
        let mut state = self.state.borrow_mut();
        state.phase = ReaderPhase::Error(err.clone());
        state.notice = Some(err.to_string());
        err
    }

    fn accepts_navigation(&self) -> bool {
        let state = self.state.borrow();
        state.document.is_some()
            && matches!(state.phase, ReaderPhase::Ready | ReaderPhase::Rendering)
    }

    /// Clamps `target` into the document and renders it.
    pub async fn go_to(&self, target: u32) -> Result<ReaderOutcome, ReaderError> {
        if !self.accepts_navigation() {
            return Ok(ReaderOutcome::Ignored);
        }
        let page = {
            let state = self.state.borrow();
            let page = target.clamp(1, state.total_pages.max(1));
            if page == state.current_page {
                return Ok(ReaderOutcome::NoOp);
            }
            page
        };
        self.render(page).await
    }

    pub async fn next_page(&self) -> Result<ReaderOutcome, ReaderError> {
        let (current, total) = {
            let state = self.state.borrow();
            (state.current_page, state.total_pages)
        };
        if current >= total {
            return Ok(ReaderOutcome::NoOp);
        }
        self.go_to(current + 1).await
    }

    pub async fn previous_page(&self) -> Result<ReaderOutcome, ReaderError> {
        let current = self.current_page();
        if current <= 1 {
            return Ok(ReaderOutcome::NoOp);
        }
        self.go_to(current - 1).await
    }

    /// Applies a new zoom and re-renders the current page at that scale.
    /// When another render is in flight the zoom still sticks and the
    /// next render uses it.
    pub async fn set_zoom(&self, zoom: Zoom) -> Result<ReaderOutcome, ReaderError> {
        if !self.accepts_navigation() {
            return Ok(ReaderOutcome::Ignored);
        }
        let page = {
            let mut state = self.state.borrow_mut();
            if state.zoom == zoom {
                return Ok(ReaderOutcome::NoOp);
            }
            state.zoom = zoom;
            debug!("zoom set to {}", zoom.label());
            state.current_page
        };
        if page == 0 {
            return Ok(ReaderOutcome::NoOp);
        }
        self.render(page).await
    }

    pub async fn zoom_in(&self) -> Result<ReaderOutcome, ReaderError> {
        self.set_zoom(self.zoom().zoom_in()).await
    }

    pub async fn zoom_out(&self) -> Result<ReaderOutcome, ReaderError> {
        self.set_zoom(self.zoom().zoom_out()).await
    }

    pub fn toggle_fullscreen(&self) -> ReaderOutcome {
        let mut state = self.state.borrow_mut();
        if matches!(state.phase, ReaderPhase::Error(_)) {
            return ReaderOutcome::Ignored;
        }
        state.fullscreen = !state.fullscreen;
        ReaderOutcome::Fullscreen(state.fullscreen)
    }

    /// Leaves the completion panel and starts over from page 1.
    pub async fn restart(&self) -> Result<ReaderOutcome, ReaderError> {
        {
            let mut state = self.state.borrow_mut();
            if state.phase != ReaderPhase::Finished {
                return Ok(ReaderOutcome::Ignored);
            }
            state.phase = ReaderPhase::Ready;
        }
        self.go_to(1).await
    }

    pub async fn dispatch(&self, command: ReaderCommand) -> Result<ReaderOutcome, ReaderError> {
        if matches!(self.phase(), ReaderPhase::Error(_)) && command != ReaderCommand::BackToLibrary
        {
            return Ok(ReaderOutcome::Ignored);
        }
        match command {
            ReaderCommand::Next => self.next_page().await,
            ReaderCommand::Previous => self.previous_page().await,
            ReaderCommand::Jump(page) => self.go_to(page).await,
            ReaderCommand::ZoomIn => self.zoom_in().await,
            ReaderCommand::ZoomOut => self.zoom_out().await,
            ReaderCommand::ToggleFullscreen => Ok(self.toggle_fullscreen()),
            ReaderCommand::Restart => self.restart().await,
            ReaderCommand::BackToLibrary => Ok(ReaderOutcome::ReturnToLibrary),
        }
    }

    async fn render(&self, page: u32) -> Result<ReaderOutcome, ReaderError> {
        let Some(guard) = self.latch.try_acquire() else {
            debug!("render in flight, dropping request for page {page}");
            return Ok(ReaderOutcome::Dropped);
        };

        let (document, scale) = {
            let mut state = self.state.borrow_mut();
            let Some(document) = state.document.clone() else {
                return Ok(ReaderOutcome::Ignored);
            };
            state.phase = ReaderPhase::Rendering;
            (document, state.zoom.scale())
        };

        let surface = match document.render_page(page, scale).await {
            Ok(surface) => surface,
            Err(err) => {
                return Err(self.fail(ReaderError::Render {
                    page,
                    reason: err.to_string(),
                }));
            }
        };

        let (book_id, total_pages) = {
            let state = self.state.borrow();
            (state.book_id.clone(), state.total_pages)
        };
        if let Some(id) = &book_id {
            match self.metadata.update_progress(id, page, total_pages) {
                Ok(true) => {}
                Ok(false) => debug!("no stored record for {id}, progress not saved"),
                Err(err) => {
                    warn!("could not save progress for {id}: {err}");
                    let mut state = self.state.borrow_mut();
                    // Nothing shown yet: keep the opening page instead of
                    // leaving an empty view behind.
                    if state.current_page == 0 {
                        state.current_page = page;
                        state.surface = Some(Rc::new(surface));
                        state.surface_generation += 1;
                    }
                    state.phase = ReaderPhase::Ready;
                    state.notice = Some(err.to_string());
                    return Err(err.into());
                }
            }
        }

        {
            let mut state = self.state.borrow_mut();
            state.current_page = page;
            state.surface = Some(Rc::new(surface));
            state.surface_generation += 1;
            state.phase = ReaderPhase::Ready;
            state.notice = None;
        }
        drop(guard);

        if page == total_pages {
            return Ok(self.finish_after_delay(page).await);
        }
        Ok(ReaderOutcome::Rendered { page })
    }

    async fn finish_after_delay(&self, page: u32) -> ReaderOutcome {
        tokio::time::sleep(self.config.finish_delay).await;
        let mut state = self.state.borrow_mut();
        if state.phase == ReaderPhase::Ready && state.current_page == page {
            info!("reached the last page of {}", state.name);
            state.phase = ReaderPhase::Finished;
            return ReaderOutcome::Finished { page };
        }
        ReaderOutcome::Rendered { page }
    }
}
