//! Reusable TUI widgets and layout helpers.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

/// Bottom status bar.
pub(crate) fn status_bar(msg: &str) -> Paragraph<'_> {
    Paragraph::new(format!(" {msg}")).style(Style::default().bg(Color::DarkGray).fg(Color::White))
}

/// The floating button that opens and closes the chat panel.
pub(crate) fn toggle_button(open: bool) -> Paragraph<'static> {
    let (label, style) = if open {
        (" 닫기 (Esc) ", Style::default().fg(Color::White).bg(Color::Red))
    } else {
        (
            " 채팅 (Enter) ",
            Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )
    };
    Paragraph::new(label)
        .alignment(Alignment::Center)
        .style(style)
        .block(Block::default().borders(Borders::ALL).border_style(style))
}

/// A `width` x `height` rectangle in the bottom-right corner of `r`,
/// shrunk to fit when `r` is smaller.
pub(crate) fn anchored_rect(width: u16, height: u16, r: Rect) -> Rect {
    let width = width.min(r.width);
    let height = height.min(r.height);
    Rect {
        x: r.x + r.width - width,
        y: r.y + r.height - height,
        width,
        height,
    }
}

/// Rows `text` takes when wrapped at `width` columns.
///
/// Non-ASCII characters count as two columns, which holds for Hangul.
pub(crate) fn estimated_height(text: &str, width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = text
        .split('\n')
        .map(|line| {
            let cols: usize = line.chars().map(|c| if c.is_ascii() { 1 } else { 2 }).sum();
            cols.div_ceil(width).max(1)
        })
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchored_rect_sits_in_bottom_right() {
        let area = Rect::new(0, 0, 100, 40);
        let r = anchored_rect(20, 5, area);
        assert_eq!(r, Rect::new(80, 35, 20, 5));
    }

    #[test]
    fn anchored_rect_clamps_to_area() {
        let area = Rect::new(2, 1, 10, 4);
        let r = anchored_rect(64, 24, area);
        assert_eq!(r, area);
    }

    #[test]
    fn estimated_height_wraps_wide_characters() {
        assert_eq!(estimated_height("abcd", 4), 1);
        assert_eq!(estimated_height("abcde", 4), 2);
        assert_eq!(estimated_height("안녕하세요", 4), 3);
        assert_eq!(estimated_height("a\n\nb", 10), 3);
    }
}
