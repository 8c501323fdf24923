use pdfshelf_application::{BookCard, ReaderError, ReaderPhase, ReaderSnapshot};
use pdfshelf_core::{BinaryStore, MetadataStore};
use pdfshelf_engine::RgbaBitmap;
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap};
use ratatui_image::Image as ImageWidget;
use unicode_width::UnicodeWidthStr;

use crate::input::{tail_to_width, truncate_to_width};
use crate::{ReaderPanel, Ui};

const ACCENT: Color = Color::Rgb(0x66, 0x7e, 0xea);
const PROGRESS_BAR_WIDTH: usize = 20;

impl<M, B> Ui<M, B>
where
    M: MetadataStore + 'static,
    B: BinaryStore + 'static,
{
    pub(crate) fn draw(&mut self, area: Rect, frame: &mut Frame) {
        frame.render_widget(Clear, area);
        if let Some(reader) = self.reader.as_mut() {
            draw_reader(reader, &self.image_picker, area, frame);
            return;
        }

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(2),
            ])
            .split(area);

        frame.render_widget(self.library_header(), layout[0]);
        if self.shelf.snapshot.is_empty() {
            frame.render_widget(empty_state(), layout[1]);
        } else {
            self.draw_cards(frame, layout[1]);
        }
        frame.render_widget(self.library_footer(), layout[2]);

        if self.import_panel.open {
            self.draw_import_prompt(frame, area);
        }
        if let Some(pending) = &self.pending_delete {
            draw_delete_prompt(frame, area, &pending.card);
        }
    }

    fn library_header(&self) -> Paragraph<'static> {
        let count = self.shelf.snapshot.count();
        let count_label = match count {
            1 => "1 book".to_string(),
            n => format!("{n} books"),
        };
        Paragraph::new(Line::from(vec![
            Span::styled(
                "PDF Shelf",
                Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
            ),
            Span::raw("  "),
            Span::styled(count_label, Style::default().fg(Color::DarkGray)),
        ]))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::BOTTOM))
    }

    fn library_footer(&self) -> Paragraph<'static> {
        let hints = Line::from(Span::styled(
            "↑/↓ select · Enter read · i import · d delete · r refresh · q quit",
            Style::default().fg(Color::DarkGray),
        ));
        let notice = Line::from(Span::styled(
            self.shelf.notice.clone().unwrap_or_default(),
            Style::default().fg(Color::Yellow),
        ));
        Paragraph::new(Text::from(vec![notice, hints]))
    }

    fn draw_cards(&self, frame: &mut Frame, area: Rect) {
        let width = usize::from(area.width.saturating_sub(4));
        let items: Vec<ListItem> = self
            .shelf
            .snapshot
            .cards
            .iter()
            .map(|card| ListItem::new(card_lines(card, width)))
            .collect();
        let list = List::new(items)
            .block(Block::default().borders(Borders::NONE))
            .highlight_style(Style::default().bg(Color::Rgb(0x2a, 0x2a, 0x3a)))
            .highlight_symbol("▌ ");
        let mut state = ListState::default();
        state.select(Some(self.shelf.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_import_prompt(&self, frame: &mut Frame, area: Rect) {
        let popup = popup_area(area, 70, 25);
        frame.render_widget(Clear, popup);
        let block = Block::default().borders(Borders::ALL).title("Import PDF");
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let field_width = usize::from(inner.width.saturating_sub(8));
        let input = tail_to_width(&self.import_panel.input, field_width);
        let text = Text::from(vec![
            Line::from(vec![
                Span::raw("Path: "),
                Span::styled(input, Style::default().add_modifier(Modifier::BOLD)),
                Span::styled("_", Style::default().fg(ACCENT)),
            ]),
            Line::raw(""),
            Line::from(Span::styled(
                "Enter import · Esc cancel · paste or drop files here",
                Style::default().fg(Color::DarkGray),
            )),
        ]);
        frame.render_widget(Paragraph::new(text), inner);
    }
}

fn empty_state() -> Paragraph<'static> {
    Paragraph::new(Text::from(vec![
        Line::raw(""),
        Line::from(Span::styled(
            "Your shelf is empty",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
        Line::raw("Press i to import a PDF, or drop PDF files onto this window."),
    ]))
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true })
}

fn card_lines(card: &BookCard, width: usize) -> Text<'static> {
    let cover = Style::default()
        .fg(Color::White)
        .bg(hex_color(card.cover.from))
        .add_modifier(Modifier::BOLD);
    let name_width = width.saturating_sub(5);
    let pages = if card.total_pages > 0 {
        format!("page {} of {}", card.last_page, card.total_pages)
    } else {
        "not opened yet".to_string()
    };

    let filled = usize::from(card.progress_pct) * PROGRESS_BAR_WIDTH / 100;
    let bar_filled = "█".repeat(filled);
    let bar_empty = "░".repeat(PROGRESS_BAR_WIDTH - filled);

    Text::from(vec![
        Line::from(vec![
            Span::styled(format!(" {} ", card.cover.initial), cover),
            Span::raw(" "),
            Span::styled(
                truncate_to_width(&card.name, name_width),
                Style::default().add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled("   ", Style::default().bg(hex_color(card.cover.to))),
            Span::styled(
                format!(" {} · added {} · {pages}", card.size_label, card.uploaded_label),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(vec![
            Span::raw("    "),
            Span::styled(bar_filled, Style::default().fg(hex_color(card.cover.to))),
            Span::styled(bar_empty, Style::default().fg(Color::DarkGray)),
            Span::raw(format!(" {}", card.action_label)),
        ]),
        Line::raw(""),
    ])
}

fn draw_delete_prompt(frame: &mut Frame, area: Rect, card: &BookCard) {
    let popup = popup_area(area, 60, 20);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Delete book")
        .border_style(Style::default().fg(Color::Red));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);
    let name = truncate_to_width(&card.name, usize::from(inner.width.saturating_sub(10)));
    let text = Text::from(vec![
        Line::raw(format!("Delete \"{name}\"?")),
        Line::raw("The PDF and its reading progress will be removed."),
        Line::raw(""),
        Line::from(Span::styled(
            "y delete · n keep",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
}

fn draw_reader<M, B>(
    reader: &mut ReaderPanel<M, B>,
    picker: &ratatui_image::picker::Picker,
    area: Rect,
    frame: &mut Frame,
) where
    M: MetadataStore + 'static,
    B: BinaryStore + 'static,
{
    let view = reader.session.snapshot();

    let page_area = if view.fullscreen {
        reader.slider_area = None;
        area
    } else {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(1),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);
        frame.render_widget(reader_header(&view, layout[0].width), layout[0]);
        draw_slider(frame, layout[2], &view);
        reader.slider_area = Some(layout[2]);
        frame.render_widget(reader_footer(&view), layout[3]);
        layout[1]
    };

    draw_page(frame, page_area, reader, picker, &view);

    match &view.phase {
        ReaderPhase::Finished => draw_finished(frame, area, &view.name),
        ReaderPhase::Error(err) => draw_error(frame, area, err),
        _ => {}
    }
    if let Some(goto) = &reader.goto {
        draw_goto(frame, area, goto, view.total_pages);
    }
}

fn reader_header(view: &ReaderSnapshot<RgbaBitmap>, width: u16) -> Paragraph<'static> {
    let status = match view.phase {
        ReaderPhase::Loading => "loading…",
        ReaderPhase::Rendering => "rendering…",
        _ => "",
    };
    let right = format!(
        "Page {} of {} · {} {status}",
        view.current_page.max(1),
        view.total_pages.max(1),
        view.zoom.label()
    );
    let name_width = usize::from(width).saturating_sub(right.width() + 4);
    Paragraph::new(Line::from(vec![
        Span::styled(
            truncate_to_width(&view.name, name_width),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(right, Style::default().fg(Color::DarkGray)),
    ]))
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::BOTTOM))
}

fn reader_footer(view: &ReaderSnapshot<RgbaBitmap>) -> Paragraph<'static> {
    let line = match &view.notice {
        Some(notice) => Line::from(Span::styled(
            notice.clone(),
            Style::default().fg(Color::Yellow),
        )),
        None => Line::from(Span::styled(
            "←/→ page · +/- zoom · g go to · f fullscreen · Esc library",
            Style::default().fg(Color::DarkGray),
        )),
    };
    Paragraph::new(line).alignment(Alignment::Center)
}

fn draw_slider(frame: &mut Frame, area: Rect, view: &ReaderSnapshot<RgbaBitmap>) {
    let pct = view.progress_pct();
    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(ACCENT).bg(Color::Rgb(0x30, 0x30, 0x30)))
        .ratio(f64::from(pct) / 100.0)
        .label(format!("{pct}%"));
    frame.render_widget(gauge, area);
}

fn draw_page<M, B>(
    frame: &mut Frame,
    area: Rect,
    reader: &mut ReaderPanel<M, B>,
    picker: &ratatui_image::picker::Picker,
    view: &ReaderSnapshot<RgbaBitmap>,
) where
    M: MetadataStore + 'static,
    B: BinaryStore + 'static,
{
    let block = if view.fullscreen {
        Block::default()
    } else {
        Block::default().borders(Borders::ALL)
    };
    let inner = block.inner(area);
    frame.render_widget(block, area);

    reader.page_image.ensure(
        picker,
        view.surface_generation,
        view.surface.as_deref(),
        inner,
    );

    if let Some(protocol) = reader.page_image.protocol() {
        let proto_area = protocol.area();
        let draw_width = proto_area.width.min(inner.width);
        let draw_height = proto_area.height.min(inner.height);
        let draw_area = Rect::new(
            inner.x + inner.width.saturating_sub(draw_width) / 2,
            inner.y + inner.height.saturating_sub(draw_height) / 2,
            draw_width,
            draw_height,
        );
        frame.render_widget(ImageWidget::new(protocol), draw_area);
        return;
    }

    let message = match (&view.phase, reader.page_image.error()) {
        (_, Some(err)) => err.to_string(),
        (ReaderPhase::Error(_), None) => String::new(),
        _ => "Loading…".to_string(),
    };
    let y = inner.y + inner.height / 2;
    let line_area = Rect::new(inner.x, y.min(inner.bottom().saturating_sub(1)), inner.width, 1);
    frame.render_widget(
        Paragraph::new(message)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::DarkGray)),
        line_area,
    );
}

fn draw_finished(frame: &mut Frame, area: Rect, name: &str) {
    let popup = popup_area(area, 50, 25);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Finished")
        .border_style(Style::default().fg(Color::Green));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);
    let text = Text::from(vec![
        Line::from(Span::styled(
            "🎉 You finished the book!",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::raw(truncate_to_width(name, usize::from(inner.width))),
        Line::raw(""),
        Line::from(Span::styled(
            "r read again · Esc back to library",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        inner,
    );
}

fn draw_error(frame: &mut Frame, area: Rect, err: &ReaderError) {
    let popup = popup_area(area, 60, 25);
    frame.render_widget(Clear, popup);
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Cannot show this book")
        .border_style(Style::default().fg(Color::Red));
    let inner = block.inner(popup);
    frame.render_widget(block, popup);
    let text = Text::from(vec![
        Line::raw(err.to_string()),
        Line::raw(""),
        Line::from(Span::styled(
            "Esc back to library",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    frame.render_widget(Paragraph::new(text).wrap(Wrap { trim: true }), inner);
}

fn draw_goto(frame: &mut Frame, area: Rect, input: &str, total_pages: u32) {
    let popup = popup_area(area, 40, 20);
    frame.render_widget(Clear, popup);
    let block = Block::default().borders(Borders::ALL).title("Go to page");
    let inner = block.inner(popup);
    frame.render_widget(block, popup);
    let text = Text::from(vec![
        Line::from(vec![
            Span::raw(format!("Page (1-{}): ", total_pages.max(1))),
            Span::styled(input.to_string(), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled("_", Style::default().fg(ACCENT)),
        ]),
        Line::from(Span::styled(
            "Enter go · Esc cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ]);
    frame.render_widget(Paragraph::new(text), inner);
}

/// Parses `#rrggbb`; anything else falls back to the accent color.
fn hex_color(hex: &str) -> Color {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return ACCENT;
    }
    let channel = |range: std::ops::Range<usize>| {
        digits
            .get(range)
            .and_then(|part| u8::from_str_radix(part, 16).ok())
    };
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => ACCENT,
    }
}

/// A popup of the given share of `area`, centred on both axes.
fn popup_area(area: Rect, width_pct: u16, height_pct: u16) -> Rect {
    let [row] = Layout::vertical([Constraint::Percentage(height_pct)])
        .flex(Flex::Center)
        .areas(area);
    let [popup] = Layout::horizontal([Constraint::Percentage(width_pct)])
        .flex(Flex::Center)
        .areas(row);
    popup
}
