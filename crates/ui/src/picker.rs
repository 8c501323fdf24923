use std::time::Duration;

use ratatui_image::picker::{Picker, ProtocolType, cap_parser::QueryStdioOptions};

fn env_contains(name: &str, needle: &str) -> bool {
    std::env::var(name)
        .ok()
        .is_some_and(|value| value.contains(needle))
}

fn env_set(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .is_some_and(|value| !value.trim().is_empty())
}

/// Terminals that answer graphics queries on stdio.
fn graphics_terminal() -> bool {
    env_set("KITTY_WINDOW_ID")
        || env_contains("TERM", "kitty")
        || env_set("ITERM_SESSION_ID")
        || env_contains("TERM_PROGRAM", "iTerm")
        || env_contains("TERM_PROGRAM", "WezTerm")
}

fn in_tmux() -> bool {
    std::env::var_os("TMUX").is_some()
}

fn query_timeout() -> Duration {
    if graphics_terminal() {
        Duration::from_millis(1500)
    } else {
        // tmux without passthrough never answers.
        Duration::from_millis(300)
    }
}

fn allow_tmux_passthrough() {
    if !in_tmux() {
        return;
    }
    let status = std::process::Command::new("tmux")
        .args(["set-option", "-g", "allow-passthrough", "on"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status();
    if let Err(err) = status {
        log::debug!("tmux passthrough not enabled: {err}");
    }
}

/// Picks the richest image protocol the terminal supports, falling back to
/// half blocks. Must run after raw mode is enabled.
pub(crate) fn detect_picker() -> Picker {
    allow_tmux_passthrough();
    let mut picker = if graphics_terminal() || in_tmux() {
        let mut options = QueryStdioOptions::default();
        options.timeout = query_timeout();
        options.text_sizing_protocol = false;
        Picker::from_query_stdio_with_options(options).unwrap_or_else(|err| {
            log::info!("image protocol query failed, using half blocks: {err:?}");
            Picker::halfblocks()
        })
    } else {
        Picker::halfblocks()
    };
    picker.set_background_color(image::Rgba([255u8, 255u8, 255u8, 255u8]));
    log::info!("image protocol: {}", protocol_label(&picker));
    picker
}

pub(crate) fn protocol_label(picker: &Picker) -> &'static str {
    match picker.protocol_type() {
        ProtocolType::Halfblocks => "halfblocks",
        ProtocolType::Sixel => "sixel",
        ProtocolType::Kitty => "kitty",
        ProtocolType::Iterm2 => "iterm2",
    }
}
