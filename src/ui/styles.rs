use ratatui::style::{Color, Modifier, Style};

use crate::text::ColorId;

// ── Background colors ──
pub const BG: Color = Color::Rgb(12, 12, 12);
pub const SELECTION: Color = Color::Rgb(26, 42, 58);

// ── Text colors ──
pub const TEXT: Color = Color::Rgb(200, 200, 200);
pub const BRIGHT: Color = Color::Rgb(232, 232, 232);

// ── Accent colors ──
pub const CYAN: Color = Color::Rgb(34, 211, 238);
pub const YELLOW: Color = Color::Rgb(250, 204, 21);
pub const RED: Color = Color::Rgb(248, 113, 113);

/// Resolved styles for every `ColorId`. Built once per terminal session.
#[derive(Debug, Clone)]
pub struct Palette {
    normal: Style,
    highlight: Style,
    selected_normal: Style,
    selected_highlight: Style,
    error: Style,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            normal: Style::default().fg(TEXT).bg(BG),
            highlight: Style::default().fg(YELLOW).bg(BG),
            selected_normal: Style::default().fg(BRIGHT).bg(SELECTION),
            selected_highlight: Style::default()
                .fg(YELLOW)
                .bg(SELECTION)
                .add_modifier(Modifier::BOLD),
            error: Style::default().fg(RED).bg(BG).add_modifier(Modifier::BOLD),
        }
    }
}

impl Palette {
    pub fn style(&self, color: ColorId) -> Style {
        match color {
            ColorId::Normal => self.normal,
            ColorId::Highlight => self.highlight,
            ColorId::SelectedNormal => self.selected_normal,
            ColorId::SelectedHighlight => self.selected_highlight,
            ColorId::Error => self.error,
        }
    }

    pub fn border(&self) -> Style {
        Style::default().fg(CYAN).bg(BG)
    }
}
