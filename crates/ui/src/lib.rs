//! Terminal front end: a library screen of book cards and a page reader.
//!
//! Everything runs on one thread. Reader commands are spawned with
//! [`tokio::task::spawn_local`], so [`Ui::run`] must be driven inside a
//! [`tokio::task::LocalSet`].

mod input;
mod page_image;
mod picker;
mod view;

use std::cell::RefCell;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context as _;
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture, Event,
    EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use futures::StreamExt as _;
use log::{debug, info, warn};
use pdfshelf_application::{
    BookCard, Confirmation, DeleteOutcome, Disposition, Library, LibraryError, LibrarySnapshot,
    ReaderCommand, ReaderConfig, ReaderError, ReaderOutcome, ReaderSession, Upload,
    parse_page_input, slider_page, swipe_command,
};
use pdfshelf_core::{BinaryStore, MetadataStore, NavigationParams, Settings};
use pdfshelf_engine::PdfEngine;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui_image::picker::Picker;
use tokio::task::JoinHandle;

use page_image::PageImage;

const TICK_RATE: Duration = Duration::from_millis(50);

pub type PdfReaderSession<M, B> = ReaderSession<M, B, PdfEngine>;

type ReaderResults = Rc<RefCell<Vec<Result<ReaderOutcome, ReaderError>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

#[derive(Debug, Clone, Default)]
struct ShelfPanel {
    snapshot: LibrarySnapshot,
    selected: usize,
    notice: Option<String>,
}

impl ShelfPanel {
    fn selected_card(&self) -> Option<&BookCard> {
        self.snapshot.cards.get(self.selected)
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.snapshot.count().saturating_sub(1));
    }
}

#[derive(Debug, Clone, Default)]
struct ImportPanel {
    open: bool,
    input: String,
}

#[derive(Debug, Clone)]
struct PendingDelete {
    card: BookCard,
}

struct ReaderPanel<M, B> {
    session: Rc<PdfReaderSession<M, B>>,
    results: ReaderResults,
    tasks: Vec<JoinHandle<()>>,
    goto: Option<String>,
    page_image: PageImage,
    slider_area: Option<Rect>,
    drag_origin: Option<u16>,
}

impl<M, B> ReaderPanel<M, B>
where
    M: MetadataStore + 'static,
    B: BinaryStore + 'static,
{
    fn new(session: PdfReaderSession<M, B>) -> Self {
        Self {
            session: Rc::new(session),
            results: Rc::new(RefCell::new(Vec::new())),
            tasks: Vec::new(),
            goto: None,
            page_image: PageImage::default(),
            slider_area: None,
            drag_origin: None,
        }
    }

    fn spawn_load(&mut self, params: NavigationParams) {
        let session = Rc::clone(&self.session);
        let results = Rc::clone(&self.results);
        self.track(tokio::task::spawn_local(async move {
            let result = session.load(&params).await;
            results.borrow_mut().push(result);
        }));
    }

    fn spawn_command(&mut self, command: ReaderCommand) {
        let session = Rc::clone(&self.session);
        let results = Rc::clone(&self.results);
        self.track(tokio::task::spawn_local(async move {
            let result = session.dispatch(command).await;
            results.borrow_mut().push(result);
        }));
    }

    fn track(&mut self, task: JoinHandle<()>) {
        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(task);
    }

    fn take_results(&self) -> Vec<Result<ReaderOutcome, ReaderError>> {
        self.results.borrow_mut().drain(..).collect()
    }
}

/// Work still running for a closed reader (a render, the completion delay)
/// is cancelled, so nothing writes progress after the library redraws.
impl<M, B> Drop for ReaderPanel<M, B> {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

pub struct Ui<M, B> {
    library: Library<M, B>,
    settings: Settings,
    engine: PdfEngine,
    shelf: ShelfPanel,
    import_panel: ImportPanel,
    pending_delete: Option<PendingDelete>,
    reader: Option<ReaderPanel<M, B>>,
    image_picker: Picker,
}

impl<M, B> Ui<M, B>
where
    M: MetadataStore + 'static,
    B: BinaryStore + 'static,
{
    pub fn new(library: Library<M, B>, mut settings: Settings, engine: PdfEngine) -> Self {
        settings.normalize();
        let mut ui = Self {
            library,
            settings,
            engine,
            shelf: ShelfPanel::default(),
            import_panel: ImportPanel::default(),
            pending_delete: None,
            reader: None,
            image_picker: Picker::halfblocks(),
        };
        ui.refresh_library();
        ui
    }

    /// Runs until the user quits. `open` starts on the reader screen.
    pub async fn run(&mut self, open: Option<NavigationParams>) -> anyhow::Result<()> {
        let mut terminal = setup_terminal()?;
        self.image_picker = picker::detect_picker();
        terminal.clear().ok();

        if let Some(params) = open {
            self.open_reader(params);
        }

        let result = self.event_loop(&mut terminal).await;
        let restore_result = restore_terminal(&mut terminal);
        match (result, restore_result) {
            (Ok(()), restored) => restored,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(restore)) => Err(err.context(format!(
                "additionally failed to restore terminal: {restore:#}"
            ))),
        }
    }

    /// Imports each file and reports the outcome on the library screen.
    /// Returns how many were added.
    pub fn import_paths(&mut self, paths: &[PathBuf]) -> usize {
        let mut imported = 0usize;
        let mut failures = Vec::new();
        for path in paths {
            match self.import_file(path) {
                Ok(()) => imported += 1,
                Err(err) => {
                    warn!("import of {} failed: {err:#}", path.display());
                    failures.push(format!("{err:#}"));
                }
            }
        }

        self.refresh_library();
        if imported > 0 {
            self.shelf.selected = 0;
        }
        self.shelf.notice = match (imported, failures.first()) {
            (0, None) => None,
            (n, None) => Some(format!("Imported {n} book{}", plural(n))),
            (0, Some(first)) => Some(first.clone()),
            (n, Some(first)) => Some(format!("Imported {n}, skipped {}: {first}", failures.len())),
        };
        imported
    }

    fn import_file(&self, path: &Path) -> anyhow::Result<()> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        let upload = Upload::new(name, Vec::new());
        // Type check first so non-PDF files are never read.
        if !upload.is_document() {
            return Err(LibraryError::UnsupportedFile { name: upload.name }.into());
        }
        let bytes =
            std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        self.library.upload(Upload { bytes, ..upload })?;
        Ok(())
    }

    fn refresh_library(&mut self) {
        match self.library.snapshot() {
            Ok(snapshot) => {
                self.shelf.snapshot = snapshot;
                self.shelf.clamp_selection();
            }
            Err(err) => {
                warn!("load library failed: {err}");
                self.shelf.notice = Some(format!("Could not load library: {err}"));
            }
        }
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    ) -> anyhow::Result<()> {
        let mut events = EventStream::new();
        let mut ticker = tokio::time::interval(TICK_RATE);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            self.apply_reader_results();
            terminal.draw(|frame| self.draw(frame.area(), frame))?;

            tokio::select! {
                event = events.next() => match event {
                    Some(Ok(event)) => {
                        if self.handle_event(event) == Flow::Quit {
                            return Ok(());
                        }
                    }
                    Some(Err(err)) => return Err(err).context("read terminal event"),
                    None => return Ok(()),
                },
                _ = ticker.tick() => {}
            }
        }
    }

    fn handle_event(&mut self, event: Event) -> Flow {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key),
            Event::Mouse(mouse) => {
                self.handle_mouse(mouse);
                Flow::Continue
            }
            Event::Paste(text) => {
                self.handle_paste(&text);
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Flow {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Flow::Quit;
        }
        if self.reader.is_some() {
            self.handle_reader_key(key);
            return Flow::Continue;
        }
        if self.pending_delete.is_some() {
            self.handle_delete_key(key);
            return Flow::Continue;
        }
        if self.import_panel.open {
            self.handle_import_key(key);
            return Flow::Continue;
        }
        self.handle_library_key(key)
    }

    fn handle_library_key(&mut self, key: KeyEvent) -> Flow {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Flow::Quit,
            KeyCode::Up | KeyCode::Char('k') => {
                self.shelf.selected = self.shelf.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.shelf.selected = self.shelf.selected.saturating_add(1);
                self.shelf.clamp_selection();
            }
            KeyCode::Home => self.shelf.selected = 0,
            KeyCode::End => {
                self.shelf.selected = self.shelf.snapshot.count().saturating_sub(1);
            }
            KeyCode::Enter => {
                if let Some(card) = self.shelf.selected_card() {
                    let params = NavigationParams::for_book(card.id.clone());
                    self.open_reader(params);
                }
            }
            KeyCode::Char('i') | KeyCode::Char('o') => {
                self.import_panel = ImportPanel {
                    open: true,
                    input: String::new(),
                };
            }
            KeyCode::Char('d') | KeyCode::Delete => self.request_delete(),
            KeyCode::Char('r') => {
                self.refresh_library();
                self.shelf.notice = None;
            }
            _ => {}
        }
        Flow::Continue
    }

    fn handle_import_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.import_panel = ImportPanel::default(),
            KeyCode::Enter => {
                let paths = input::dropped_paths(&self.import_panel.input);
                self.import_panel = ImportPanel::default();
                if !paths.is_empty() {
                    self.import_paths(&paths);
                }
            }
            KeyCode::Backspace => {
                self.import_panel.input.pop();
            }
            KeyCode::Char(c) => self.import_panel.input.push(c),
            _ => {}
        }
    }

    fn handle_paste(&mut self, text: &str) {
        if self.reader.is_some() {
            return;
        }
        if self.import_panel.open {
            self.import_panel.input.push_str(text.trim_end_matches(['\r', '\n']));
            return;
        }
        let paths = input::dropped_paths(text);
        if paths.is_empty() {
            return;
        }
        info!("importing {} pasted path(s)", paths.len());
        self.import_paths(&paths);
    }

    fn request_delete(&mut self) {
        let Some(card) = self.shelf.selected_card().cloned() else {
            return;
        };
        if self.settings.confirm_delete {
            self.pending_delete = Some(PendingDelete { card });
        } else {
            self.finish_delete(card, Confirmation::Confirmed);
        }
    }

    fn handle_delete_key(&mut self, key: KeyEvent) {
        let confirmation = match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => Confirmation::Confirmed,
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => Confirmation::Cancelled,
            _ => return,
        };
        if let Some(pending) = self.pending_delete.take() {
            self.finish_delete(pending.card, confirmation);
        }
    }

    fn finish_delete(&mut self, card: BookCard, confirmation: Confirmation) {
        match self.library.delete(&card.id, confirmation) {
            Ok(DeleteOutcome::Deleted(book)) => {
                self.shelf.notice = Some(format!("Deleted {}", book.name));
            }
            Ok(DeleteOutcome::Cancelled) => {}
            Err(err) => {
                warn!("delete {} failed: {err}", card.id);
                self.shelf.notice = Some(format!("Could not delete {}: {err}", card.name));
            }
        }
        self.refresh_library();
    }

    fn open_reader(&mut self, params: NavigationParams) {
        debug!("open reader: ?{}", params.to_query());
        let session = ReaderSession::new(
            Rc::clone(self.library.metadata()),
            Rc::clone(self.library.binaries()),
            self.engine.clone(),
            ReaderConfig::from(&self.settings),
        );
        let mut panel = ReaderPanel::new(session);
        panel.spawn_load(params);
        self.shelf.notice = None;
        self.reader = Some(panel);
    }

    fn close_reader(&mut self, notice: Option<String>) {
        self.reader = None;
        self.refresh_library();
        if notice.is_some() {
            self.shelf.notice = notice;
        }
    }

    fn apply_reader_results(&mut self) {
        let Some(reader) = &self.reader else {
            return;
        };
        let mut leave = false;
        let mut redirect = None;
        for result in reader.take_results() {
            match result {
                Ok(ReaderOutcome::ReturnToLibrary) => leave = true,
                Ok(outcome) => debug!("reader: {outcome:?}"),
                Err(err) => match err.disposition() {
                    Disposition::RedirectToLibrary => {
                        warn!("reader cannot continue: {err}");
                        redirect = Some(err.to_string());
                    }
                    Disposition::Alert => warn!("reader error: {err}"),
                    Disposition::Notice => info!("reader notice: {err}"),
                },
            }
        }
        if redirect.is_some() || leave {
            self.close_reader(redirect);
        }
    }

    fn handle_reader_key(&mut self, key: KeyEvent) {
        let Some(reader) = self.reader.as_mut() else {
            return;
        };

        if let Some(goto) = reader.goto.as_mut() {
            match key.code {
                KeyCode::Esc => reader.goto = None,
                KeyCode::Enter => {
                    let page = parse_page_input(goto);
                    reader.goto = None;
                    if let Some(page) = page {
                        reader.spawn_command(ReaderCommand::Jump(page));
                    }
                }
                KeyCode::Backspace => {
                    goto.pop();
                }
                KeyCode::Char(c) if c.is_ascii_digit() => goto.push(c),
                _ => {}
            }
            return;
        }

        if key.code == KeyCode::Char('g') {
            reader.goto = Some(String::new());
            return;
        }
        if let Some(command) = input::reader_command_for_key(key.code) {
            reader.session.clear_notice();
            reader.spawn_command(command);
        }
    }

    fn handle_mouse(&mut self, mouse: MouseEvent) {
        if self.reader.is_none() {
            self.handle_library_mouse(mouse);
            return;
        }
        let threshold = self.settings.swipe_threshold_cols;
        let Some(reader) = self.reader.as_mut() else {
            return;
        };
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(area) = reader.slider_area
                    && area.contains((mouse.column, mouse.row).into())
                {
                    let total = reader.session.total_pages();
                    let page = slider_page(mouse.column - area.x, area.width, total);
                    reader.spawn_command(ReaderCommand::Jump(page));
                    reader.drag_origin = None;
                } else {
                    reader.drag_origin = Some(mouse.column);
                }
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let Some(origin) = reader.drag_origin.take() {
                    let dx = i32::from(mouse.column) - i32::from(origin);
                    if let Some(command) = swipe_command(dx, threshold) {
                        reader.spawn_command(command);
                    }
                }
            }
            MouseEventKind::ScrollDown => reader.spawn_command(ReaderCommand::Next),
            MouseEventKind::ScrollUp => reader.spawn_command(ReaderCommand::Previous),
            _ => {}
        }
    }

    fn handle_library_mouse(&mut self, mouse: MouseEvent) {
        if self.pending_delete.is_some() || self.import_panel.open {
            return;
        }
        match mouse.kind {
            MouseEventKind::ScrollDown => {
                self.shelf.selected = self.shelf.selected.saturating_add(1);
                self.shelf.clamp_selection();
            }
            MouseEventKind::ScrollUp => {
                self.shelf.selected = self.shelf.selected.saturating_sub(1);
            }
            _ => {}
        }
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    terminal::enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    crossterm::execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )
    .context("enter alt screen")?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).context("create terminal")
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    terminal::disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        DisableMouseCapture,
        LeaveAlternateScreen
    )
    .context("leave alt screen")?;
    terminal.show_cursor().context("show cursor")?;
    Ok(())
}
