use std::path::PathBuf;

use crossterm::event::KeyCode;
use pdfshelf_application::ReaderCommand;

/// Reader shortcuts. `g` (go to page) is handled by the caller since it
/// opens a prompt instead of issuing a command.
pub(crate) fn reader_command_for_key(code: KeyCode) -> Option<ReaderCommand> {
    match code {
        KeyCode::Right | KeyCode::Down | KeyCode::Char(' ') | KeyCode::PageDown => {
            Some(ReaderCommand::Next)
        }
        KeyCode::Left | KeyCode::Up | KeyCode::PageUp => Some(ReaderCommand::Previous),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(ReaderCommand::ZoomIn),
        KeyCode::Char('-') => Some(ReaderCommand::ZoomOut),
        KeyCode::Char('f') | KeyCode::Char('F') => Some(ReaderCommand::ToggleFullscreen),
        KeyCode::Home => Some(ReaderCommand::Jump(1)),
        KeyCode::Char('r') => Some(ReaderCommand::Restart),
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('b') => {
            Some(ReaderCommand::BackToLibrary)
        }
        _ => None,
    }
}

/// Paths from a bracketed paste. Terminals paste dropped files either one
/// per line or space separated with `\ ` escapes, sometimes quoted.
pub(crate) fn dropped_paths(text: &str) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        for token in split_escaped(line) {
            let token = strip_file_scheme(strip_quotes(&token));
            if !token.is_empty() {
                paths.push(PathBuf::from(token));
            }
        }
    }
    paths
}

fn split_escaped(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match (c, quote) {
            ('\\', None) => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ('\'' | '"', None) => {
                quote = Some(c);
                current.push(c);
            }
            (c, Some(open)) if c == open => {
                quote = None;
                current.push(c);
            }
            (' ', None) => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn strip_quotes(token: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = token
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    token
}

fn strip_file_scheme(token: &str) -> &str {
    token.strip_prefix("file://").unwrap_or(token)
}

/// Keeps the last characters of `text` that fit in `max_width` columns.
pub(crate) fn tail_to_width(text: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthChar;

    let mut width = 0usize;
    let mut kept = Vec::new();
    for c in text.chars().rev() {
        let w = c.width().unwrap_or(0);
        if width + w > max_width {
            break;
        }
        width += w;
        kept.push(c);
    }
    kept.into_iter().rev().collect()
}

/// Cuts `text` to `max_width` columns, ending with `…` when shortened.
pub(crate) fn truncate_to_width(text: &str, max_width: usize) -> String {
    use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut width = 0usize;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if width + w + 1 > max_width {
            break;
        }
        width += w;
        out.push(c);
    }
    out.push('…');
    out
}
