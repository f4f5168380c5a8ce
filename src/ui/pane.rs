use anyhow::Result;
use ratatui::buffer::Buffer;

use super::input::Input;
use super::styles::Palette;
use super::window::Window;
use crate::text::{ColorId, Line, Text};

/// Columns a content pane scrolls sideways per Left/Right press.
const H_SCROLL_STEP: usize = 4;

/// Fired by a text field after every keystroke it handles, with (old, new) value.
pub type ChangeHook = Box<dyn FnMut(&mut Window, &str, &str)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneKind {
    /// Scrollable content with a cursor row; becomes a multi-line editor when
    /// `editable` is set.
    Content,
    /// Non-interactive text.
    Static,
    /// Single-line input drawn after a label.
    TextField,
    /// Region filled with one repeated character.
    Fill(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneEvent {
    Ignored,
    Handled,
    Moved,
    Edited,
}

/// A rectangular region of a `Window`. Coordinates are relative to the window.
pub struct Pane {
    name: String,
    kind: PaneKind,
    pub height: u16,
    pub width: u16,
    pub row: u16,
    pub col: u16,
    lines: Text,
    label: String,
    /// Document position (row, col).
    cursor: (usize, usize),
    /// First visible (row, col).
    scroll: (usize, usize),
    pub selectable: bool,
    pub editable: bool,
    /// Trailing rows (e.g. a table's closing rule) that scroll into view with
    /// the last row but never hold the cursor.
    pub bottom_padding: usize,
    pub(super) on_change: Option<ChangeHook>,
}

impl Pane {
    pub(super) fn new(
        name: &str,
        kind: PaneKind,
        height: u16,
        width: u16,
        row: u16,
        col: u16,
    ) -> Self {
        Pane {
            name: name.to_string(),
            kind,
            height,
            width,
            row,
            col,
            lines: Text::new(),
            label: String::new(),
            cursor: (0, 0),
            scroll: (0, 0),
            selectable: false,
            editable: false,
            bottom_padding: 0,
            on_change: None,
        }
    }

    pub(super) fn with_label(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PaneKind {
        self.kind
    }

    pub fn lines(&self) -> &Text {
        &self.lines
    }

    pub fn value(&self) -> String {
        self.lines.to_string()
    }

    /// Swap in a whole new buffer, keeping the cursor where it still fits.
    pub fn replace(&mut self, text: Text) {
        self.lines = text;
        self.clamp_cursor();
    }

    pub fn cursor(&self) -> (usize, usize) {
        self.cursor
    }

    pub fn cursor_row(&self) -> usize {
        self.cursor.0
    }

    pub fn scroll(&self) -> (usize, usize) {
        self.scroll
    }

    pub fn move_to(&mut self, row: usize, col: usize) {
        self.cursor = (row, col);
        self.clamp_cursor();
    }

    pub fn accepts_edits(&self) -> bool {
        match self.kind {
            PaneKind::TextField => true,
            PaneKind::Content => self.editable,
            _ => false,
        }
    }

    pub(super) fn is_edit_key(&self, input: &Input) -> bool {
        match self.kind {
            PaneKind::TextField => matches!(
                input,
                Input::Char(_)
                    | Input::Backspace
                    | Input::Delete
                    | Input::Left
                    | Input::Right
                    | Input::Home
                    | Input::End
            ),
            PaneKind::Content if self.editable => {
                matches!(input, Input::Char(_) | Input::Enter | Input::Tab)
                    || matches!(input, Input::Backspace | Input::Delete)
                    || input.is_navigation()
            }
            _ => false,
        }
    }

    pub fn handle(&mut self, input: &Input) -> Result<PaneEvent> {
        if self.accepts_edits() {
            self.handle_edit(input)
        } else {
            Ok(self.handle_navigation(input))
        }
    }

    // ── Cursor bookkeeping ──

    fn last_row(&self) -> usize {
        let count = self.lines.line_count();
        if self.accepts_edits() {
            count.saturating_sub(1)
        } else {
            count.saturating_sub(self.bottom_padding).saturating_sub(1)
        }
    }

    fn line_len(&self, row: usize) -> usize {
        self.lines.line(row).map_or(0, Line::len)
    }

    fn label_width(&self) -> usize {
        if self.kind == PaneKind::TextField {
            self.label.chars().count() + 1
        } else {
            0
        }
    }

    fn text_width(&self) -> usize {
        (self.width as usize).saturating_sub(self.label_width())
    }

    fn view_height(&self) -> usize {
        match self.kind {
            PaneKind::TextField => 1,
            _ => (self.height as usize).max(1),
        }
    }

    fn clamp_cursor(&mut self) {
        let row = self.cursor.0.min(self.last_row());
        let col = if self.accepts_edits() {
            self.cursor.1.min(self.line_len(row))
        } else {
            0
        };
        self.cursor = (row, col);
        self.scroll_to_cursor();
    }

    fn scroll_to_cursor(&mut self) {
        let height = self.view_height();
        let (row, col) = self.cursor;
        let reserve = if !self.accepts_edits() && row == self.last_row() {
            self.bottom_padding
        } else {
            0
        };
        if row + 1 + reserve > self.scroll.0 + height {
            self.scroll.0 = (row + 1 + reserve).saturating_sub(height);
        }
        if row < self.scroll.0 {
            self.scroll.0 = row;
        }
        if self.accepts_edits() {
            let width = self.text_width().max(1);
            if col < self.scroll.1 {
                self.scroll.1 = col;
            } else if col >= self.scroll.1 + width {
                self.scroll.1 = col + 1 - width;
            }
        }
    }

    fn handle_navigation(&mut self, input: &Input) -> PaneEvent {
        if self.kind != PaneKind::Content {
            return PaneEvent::Ignored;
        }
        let page = self.view_height();
        let before = self.cursor;
        match input {
            Input::Up => self.cursor.0 = self.cursor.0.saturating_sub(1),
            Input::Down => self.cursor.0 += 1,
            Input::PageUp => self.cursor.0 = self.cursor.0.saturating_sub(page),
            Input::PageDown => self.cursor.0 += page,
            Input::Home => self.cursor.0 = 0,
            Input::End => self.cursor.0 = self.last_row(),
            Input::Left => {
                self.scroll.1 = self.scroll.1.saturating_sub(H_SCROLL_STEP);
                return PaneEvent::Handled;
            }
            Input::Right => {
                if self.scroll.1 + (self.width as usize) < self.lines.width() {
                    self.scroll.1 += H_SCROLL_STEP;
                }
                return PaneEvent::Handled;
            }
            _ => return PaneEvent::Ignored,
        }
        self.clamp_cursor();
        if self.cursor != before {
            PaneEvent::Moved
        } else {
            PaneEvent::Handled
        }
    }

    fn handle_edit(&mut self, input: &Input) -> Result<PaneEvent> {
        if self.kind == PaneKind::TextField
            && matches!(
                input,
                Input::Enter | Input::Tab | Input::Up | Input::Down | Input::PageUp | Input::PageDown
            )
        {
            return Ok(PaneEvent::Ignored);
        }

        let base = if self.lines.line_count() == 0 {
            Text::plain(ColorId::Normal, "")
        } else {
            self.lines.clone()
        };
        let (row, col) = self.cursor;
        let len = base.line(row).map_or(0, Line::len);
        let count = base.line_count();
        let page = self.view_height();

        let edited = match *input {
            Input::Char(c) => {
                let mut buf = [0u8; 4];
                let inserted = Text::plain(ColorId::Normal, c.encode_utf8(&mut buf));
                self.lines = base.insert(row, col, &inserted)?;
                self.cursor.1 += 1;
                true
            }
            Input::Tab => {
                self.lines = base.insert(row, col, &Text::plain(ColorId::Normal, "  "))?;
                self.cursor.1 += 2;
                true
            }
            Input::Enter => {
                self.lines = base.insert(row, col, &Text::plain(ColorId::Normal, "\n"))?;
                self.cursor = (row + 1, 0);
                true
            }
            Input::Backspace if col > 0 => {
                self.lines = base.delete(row, col - 1)?;
                self.cursor.1 -= 1;
                true
            }
            Input::Backspace if row > 0 => {
                let prev = base.line(row - 1).map_or(0, Line::len);
                self.lines = base.delete(row - 1, prev)?;
                self.cursor = (row - 1, prev);
                true
            }
            Input::Backspace => false,
            Input::Delete => {
                self.lines = base.delete(row, col)?;
                true
            }
            Input::Left if col > 0 => {
                self.cursor.1 -= 1;
                false
            }
            Input::Left if row > 0 => {
                self.cursor = (row - 1, base.line(row - 1).map_or(0, Line::len));
                false
            }
            Input::Right if col < len => {
                self.cursor.1 += 1;
                false
            }
            Input::Right if row + 1 < count => {
                self.cursor = (row + 1, 0);
                false
            }
            Input::Left | Input::Right => false,
            Input::Up => {
                self.cursor.0 = row.saturating_sub(1);
                false
            }
            Input::Down => {
                self.cursor.0 = row + 1;
                false
            }
            Input::PageUp => {
                self.cursor.0 = row.saturating_sub(page);
                false
            }
            Input::PageDown => {
                self.cursor.0 = row + page;
                false
            }
            Input::Home => {
                self.cursor.1 = 0;
                false
            }
            Input::End => {
                self.cursor.1 = len;
                false
            }
            _ => return Ok(PaneEvent::Ignored),
        };
        self.clamp_cursor();
        Ok(if edited {
            PaneEvent::Edited
        } else {
            PaneEvent::Moved
        })
    }

    // ── Rendering ──

    /// Absolute terminal position of the edit cursor, if this pane shows one.
    pub(super) fn cursor_position(&self, origin: (u16, u16)) -> Option<(u16, u16)> {
        if !self.accepts_edits() {
            return None;
        }
        let x = self.col as usize
            + self.label_width()
            + self.cursor.1.saturating_sub(self.scroll.1);
        let y = self.row as usize + self.cursor.0.saturating_sub(self.scroll.0);
        Some((origin.0 + x as u16, origin.1 + y as u16))
    }

    pub(super) fn render(&self, buf: &mut Buffer, palette: &Palette, origin: (u16, u16)) {
        let x0 = origin.0 + self.col;
        let y0 = origin.1 + self.row;
        match self.kind {
            PaneKind::Fill(ch) => {
                let line = Line::plain(ColorId::Normal, ch.to_string().repeat(self.width as usize));
                for r in 0..self.height {
                    put_line(buf, palette, (x0, y0 + r), self.width, &line, false);
                }
            }
            PaneKind::TextField => {
                let label = Line::plain(ColorId::Normal, format!("{} ", self.label));
                put_line(buf, palette, (x0, y0), self.width, &label, false);
                let value = self
                    .lines
                    .line(0)
                    .map(|l| l.slice(self.scroll.1, self.scroll.1 + self.text_width()))
                    .unwrap_or_default();
                let offset = self.label_width() as u16;
                put_line(
                    buf,
                    palette,
                    (x0 + offset, y0),
                    self.width.saturating_sub(offset),
                    &value,
                    false,
                );
            }
            PaneKind::Content | PaneKind::Static => {
                let highlight = self.kind == PaneKind::Content && self.selectable && !self.editable;
                let visible = self
                    .lines
                    .slice_lines(self.scroll.0, self.scroll.0 + self.height as usize);
                for r in 0..self.height {
                    let doc_row = self.scroll.0 + r as usize;
                    let line = visible
                        .line(r as usize)
                        .map(|l| l.slice(self.scroll.1, self.scroll.1 + self.width as usize))
                        .unwrap_or_default();
                    let selected = highlight
                        && doc_row == self.cursor.0
                        && doc_row < self.lines.line_count();
                    put_line(buf, palette, (x0, y0 + r), self.width, &line, selected);
                }
            }
        }
    }
}

/// Draw `line` at `pos`, clipped to `width` and the buffer, padding the rest of
/// the row so every cell carries a palette style.
pub(super) fn put_line(
    buf: &mut Buffer,
    palette: &Palette,
    pos: (u16, u16),
    width: u16,
    line: &Line,
    selected: bool,
) {
    let (x, y) = pos;
    let area = buf.area;
    if y < area.top() || y >= area.bottom() || x < area.left() || x >= area.right() {
        return;
    }
    let width = width.min(area.right() - x) as usize;
    let mut col = 0usize;
    for span in line.spans() {
        if col >= width {
            break;
        }
        let color = if selected {
            span.color().selected()
        } else {
            span.color()
        };
        let (next_x, _) =
            buf.set_stringn(x + col as u16, y, span.text(), width - col, palette.style(color));
        col = (next_x - x) as usize;
    }
    if col < width {
        let pad = if selected {
            ColorId::SelectedNormal
        } else {
            ColorId::Normal
        };
        let rest = width - col;
        buf.set_stringn(x + col as u16, y, " ".repeat(rest), rest, palette.style(pad));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(lines: &str, height: u16) -> Pane {
        let mut pane = Pane::new("p", PaneKind::Content, height, 20, 0, 0);
        pane.selectable = true;
        pane.replace(Text::plain(ColorId::Normal, lines));
        pane
    }

    #[test]
    fn cursor_scrolls_viewport() {
        let mut pane = content("0\n1\n2\n3\n4\n5", 3);
        for _ in 0..4 {
            pane.handle(&Input::Down).unwrap();
        }
        assert_eq!(pane.cursor_row(), 4);
        assert_eq!(pane.scroll().0, 2);
        pane.handle(&Input::Home).unwrap();
        assert_eq!(pane.scroll().0, 0);
    }

    #[test]
    fn bottom_padding_is_not_selectable_but_scrolls_into_view() {
        let mut pane = content("a\nb\nc\n---", 2);
        pane.bottom_padding = 1;
        assert_eq!(pane.handle(&Input::End).unwrap(), PaneEvent::Moved);
        assert_eq!(pane.cursor_row(), 2);
        // row 2 plus the padding row fit in a 2-row view starting at row 2
        assert_eq!(pane.scroll().0, 2);
        assert_eq!(pane.handle(&Input::Down).unwrap(), PaneEvent::Handled);
        assert_eq!(pane.cursor_row(), 2);
    }

    #[test]
    fn replace_clamps_cursor() {
        let mut pane = content("a\nb\nc", 5);
        pane.move_to(2, 0);
        pane.replace(Text::plain(ColorId::Normal, "only"));
        assert_eq!(pane.cursor_row(), 0);
    }

    #[test]
    fn editor_inserts_and_joins_lines() {
        let mut pane = content("ab", 5);
        pane.editable = true;
        pane.move_to(0, 1);
        assert_eq!(pane.handle(&Input::Enter).unwrap(), PaneEvent::Edited);
        assert_eq!(pane.value(), "a\nb");
        assert_eq!(pane.cursor(), (1, 0));
        pane.handle(&Input::Char('x')).unwrap();
        assert_eq!(pane.value(), "a\nxb");
        pane.handle(&Input::Home).unwrap();
        pane.handle(&Input::Backspace).unwrap();
        assert_eq!(pane.value(), "axb");
        assert_eq!(pane.cursor(), (0, 1));
        pane.handle(&Input::Delete).unwrap();
        assert_eq!(pane.value(), "ab");
    }

    #[test]
    fn editor_starts_from_empty_buffer() {
        let mut pane = Pane::new("e", PaneKind::Content, 3, 10, 0, 0);
        pane.editable = true;
        pane.handle(&Input::Char('k')).unwrap();
        assert_eq!(pane.value(), "k");
    }

    #[test]
    fn text_field_ignores_enter_and_tracks_cursor() {
        let mut field = Pane::new("f", PaneKind::TextField, 1, 12, 0, 0).with_label("c:");
        for c in "abc".chars() {
            field.handle(&Input::Char(c)).unwrap();
        }
        assert_eq!(field.handle(&Input::Enter).unwrap(), PaneEvent::Ignored);
        assert_eq!(field.value(), "abc");
        assert_eq!(field.cursor_position((0, 0)), Some((6, 0)));
    }
}
