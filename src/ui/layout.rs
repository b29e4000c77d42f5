use ratatui::layout::{Constraint, Layout as RatatuiLayout, Rect};

/// Fixed screen regions of the wizard, top to bottom
pub struct Layout {
    pub full: Rect,
    pub header: Rect,
    pub content: Rect,
    pub message: Rect,
    pub status: Rect,
}

const HEADER_ROWS: u16 = 1;
const MIN_CONTENT_ROWS: u16 = 10;
/// Reserved even when empty so the stage list doesn't shift
const MESSAGE_ROWS: u16 = 3;
const STATUS_ROWS: u16 = 1;

impl Layout {
    pub fn new(area: Rect) -> Self {
        let [header, content, message, status] = RatatuiLayout::vertical([
            Constraint::Length(HEADER_ROWS),
            Constraint::Min(MIN_CONTENT_ROWS),
            Constraint::Length(MESSAGE_ROWS),
            Constraint::Length(STATUS_ROWS),
        ])
        .areas(area);

        Self {
            full: area,
            header,
            content,
            message,
            status,
        }
    }

    /// A `width` x `height` box centered in `area`, clipped to fit.
    pub fn centered_box(area: Rect, width: u16, height: u16) -> Rect {
        let [_, column, _] = RatatuiLayout::horizontal([
            Constraint::Fill(1),
            Constraint::Length(width.min(area.width)),
            Constraint::Fill(1),
        ])
        .areas(area);

        let [_, centered, _] = RatatuiLayout::vertical([
            Constraint::Fill(1),
            Constraint::Length(height.min(area.height)),
            Constraint::Fill(1),
        ])
        .areas(column);

        centered
    }
}
