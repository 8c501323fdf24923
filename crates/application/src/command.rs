/// Reader input, independent of where it came from (keys, mouse, CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderCommand {
    Next,
    Previous,
    Jump(u32),
    ZoomIn,
    ZoomOut,
    ToggleFullscreen,
    Restart,
    BackToLibrary,
}

/// Maps a horizontal drag to a page turn once it travels further than
/// `threshold`: leftward turns forward, rightward turns back.
pub fn swipe_command(dx: i32, threshold: u16) -> Option<ReaderCommand> {
    if dx.unsigned_abs() <= u32::from(threshold) {
        return None;
    }
    if dx < 0 {
        Some(ReaderCommand::Next)
    } else {
        Some(ReaderCommand::Previous)
    }
}

/// Page under a click at `offset` on a progress slider `width` cells wide.
pub fn slider_page(offset: u16, width: u16, total_pages: u32) -> u32 {
    if total_pages <= 1 || width <= 1 {
        return 1;
    }
    let offset = offset.min(width - 1);
    let ratio = f64::from(offset) / f64::from(width - 1);
    let page = 1.0 + ratio * f64::from(total_pages - 1);
    (page.round() as u32).clamp(1, total_pages)
}

/// Leading-integer parse of a page input; `None` when there is no number.
pub fn parse_page_input(input: &str) -> Option<u32> {
    let digits: String = input
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
