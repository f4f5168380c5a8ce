use anyhow::{anyhow, Result};
use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::widgets::{Block, Clear, Widget};

use super::input::Input;
use super::pane::{put_line, ChangeHook, Pane, PaneEvent, PaneKind};
use super::session::Console;
use super::styles::Palette;
use crate::text::{ColorId, Line, Text};

/// Who receives input inside a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Focus {
    Window,
    Pane(String),
}

/// What a window did with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Ignored,
    Handled,
    CursorMoved,
    Edited,
}

/// Returned by a popup key handler.
pub enum PopupSignal<T> {
    /// Close the popup; `None` means cancelled.
    Exit(Option<T>),
    /// Key consumed, keep looping.
    Continue,
    /// Not handled here; route to the popup's focused pane.
    Pass,
}

/// Popup dimensions; unset sides default to four fifths of the parent.
#[derive(Debug, Clone, Copy, Default)]
pub struct PopupSize {
    pub width: Option<u16>,
    pub height: Option<u16>,
}

impl PopupSize {
    pub fn auto() -> Self {
        PopupSize::default()
    }

    pub fn width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: u16) -> Self {
        self.height = Some(height);
        self
    }
}

/// A rectangle of the terminal owning named child panes, a header and footer,
/// and the current focus. The root window fills the terminal; popups are
/// bordered windows centered over their parent.
pub struct Window {
    height: u16,
    width: u16,
    row: u16,
    col: u16,
    bordered: bool,
    header: Text,
    footer: Text,
    children: Vec<Pane>,
    focus: Focus,
}

impl Window {
    pub fn root(height: u16, width: u16) -> Self {
        Window {
            height,
            width,
            row: 0,
            col: 0,
            bordered: false,
            header: Text::new(),
            footer: Text::new(),
            children: Vec::new(),
            focus: Focus::Window,
        }
    }

    /// (height, width)
    pub fn size(&self) -> (u16, u16) {
        (self.height, self.width)
    }

    // ── Children ──

    fn add(&mut self, pane: Pane) -> &mut Pane {
        self.children.retain(|p| p.name() != pane.name());
        self.children.push(pane);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    pub fn pane(
        &mut self,
        name: &str,
        height: u16,
        width: u16,
        row: u16,
        col: u16,
        selectable: bool,
    ) -> &mut Pane {
        let mut pane = Pane::new(name, PaneKind::Content, height, width, row, col);
        pane.selectable = selectable;
        self.add(pane)
    }

    pub fn text(
        &mut self,
        name: &str,
        height: u16,
        width: u16,
        row: u16,
        col: u16,
        text: Text,
    ) -> &mut Pane {
        let pane = self.add(Pane::new(name, PaneKind::Static, height, width, row, col));
        pane.replace(text);
        pane
    }

    pub fn textfield(
        &mut self,
        name: &str,
        width: u16,
        row: u16,
        col: u16,
        label: &str,
        value: &str,
    ) -> &mut Pane {
        let pane = Pane::new(name, PaneKind::TextField, 1, width, row, col).with_label(label);
        let pane = self.add(pane);
        pane.replace(Text::plain(ColorId::Normal, value));
        let end = value.chars().count();
        pane.move_to(0, end);
        pane
    }

    pub fn fill(&mut self, name: &str, height: u16, width: u16, row: u16, col: u16, ch: char) -> &mut Pane {
        self.add(Pane::new(name, PaneKind::Fill(ch), height, width, row, col))
    }

    pub fn child(&self, name: &str) -> Result<&Pane> {
        self.children
            .iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| anyhow!("no pane named {}", name))
    }

    pub fn child_mut(&mut self, name: &str) -> Result<&mut Pane> {
        self.children
            .iter_mut()
            .find(|p| p.name() == name)
            .ok_or_else(|| anyhow!("no pane named {}", name))
    }

    pub fn add_change_hook(&mut self, name: &str, hook: ChangeHook) -> Result<()> {
        self.child_mut(name)?.on_change = Some(hook);
        Ok(())
    }

    /// Drop every child pane; used before rebuilding the layout.
    pub fn teardown(&mut self) {
        self.children.clear();
        self.focus = Focus::Window;
    }

    pub fn resize(&mut self, height: u16, width: u16) {
        self.teardown();
        self.height = height;
        self.width = width;
    }

    // ── Header / footer ──

    pub fn header(&self) -> &Text {
        &self.header
    }

    pub fn set_header(&mut self, header: Text) {
        self.header = header;
    }

    pub fn footer(&self) -> &Text {
        &self.footer
    }

    pub fn set_footer(&mut self, footer: Text) {
        self.footer = footer;
    }

    // ── Focus ──

    pub fn focused_name(&self) -> Option<&str> {
        match &self.focus {
            Focus::Pane(name) => Some(name),
            Focus::Window => None,
        }
    }

    /// Move focus to `name` (or the window itself). The previously focused
    /// content pane stops being editable; `edit` makes the new one editable.
    pub fn set_focus(&mut self, name: Option<&str>, edit: bool) -> Result<()> {
        if let Some(target) = name {
            self.child(target)?;
        }
        let prev = self.focused_name().map(str::to_string);
        if let Some(prev) = prev {
            if let Ok(pane) = self.child_mut(&prev) {
                if pane.kind() == PaneKind::Content {
                    pane.editable = false;
                }
            }
        }
        self.focus = match name {
            Some(target) => {
                let pane = self.child_mut(target)?;
                if pane.kind() == PaneKind::Content {
                    pane.editable = edit;
                }
                Focus::Pane(target.to_string())
            }
            None => Focus::Window,
        };
        Ok(())
    }

    // ── Input ──

    /// Route a key: text-editing keys go to the focused editable pane, movement
    /// keys to the focused selectable pane or else the first selectable one.
    pub fn on_key(&mut self, input: &Input) -> Result<Dispatch> {
        let focused = self
            .focused_name()
            .and_then(|name| self.children.iter().position(|p| p.name() == name));

        if let Some(i) = focused {
            if self.children[i].is_edit_key(input) {
                return self.edit_pane(i, input);
            }
        }

        let target = focused
            .filter(|&i| self.children[i].selectable && !self.children[i].editable)
            .or_else(|| {
                self.children
                    .iter()
                    .position(|p| p.kind() == PaneKind::Content && p.selectable && !p.editable)
            });
        let Some(i) = target else {
            return Ok(Dispatch::Ignored);
        };
        Ok(match self.children[i].handle(input)? {
            PaneEvent::Ignored => Dispatch::Ignored,
            PaneEvent::Moved => Dispatch::CursorMoved,
            PaneEvent::Handled | PaneEvent::Edited => Dispatch::Handled,
        })
    }

    fn edit_pane(&mut self, i: usize, input: &Input) -> Result<Dispatch> {
        let old = self.children[i].value();
        let event = self.children[i].handle(input)?;
        if self.children[i].kind() == PaneKind::TextField {
            let name = self.children[i].name().to_string();
            let new = self.children[i].value();
            if let Some(mut hook) = self.children[i].on_change.take() {
                hook(self, &old, &new);
                if let Ok(pane) = self.child_mut(&name) {
                    pane.on_change = Some(hook);
                }
            }
        }
        Ok(match event {
            PaneEvent::Edited => Dispatch::Edited,
            PaneEvent::Ignored => Dispatch::Ignored,
            PaneEvent::Moved | PaneEvent::Handled => Dispatch::Handled,
        })
    }

    // ── Popups ──

    /// Open a modal window centered over this one, populate it with `build`,
    /// then feed it keys until `handler` exits. This window is drawn underneath
    /// but receives no input meanwhile.
    pub fn popup<T, C, B, H>(
        &self,
        console: &mut C,
        help: Text,
        size: PopupSize,
        build: B,
        mut handler: H,
    ) -> Result<Option<T>>
    where
        C: Console + ?Sized,
        B: FnOnce(&mut Window) -> Result<()>,
        H: FnMut(&mut Window, &Input) -> Result<PopupSignal<T>>,
    {
        let default_w = (self.width as u32 * 4 / 5) as u16;
        let default_h = (self.height as u32 * 4 / 5) as u16;
        let width = size.width.unwrap_or(default_w).min(self.width);
        let height = size.height.unwrap_or(default_h).min(self.height);

        let mut popup = Window {
            height,
            width,
            row: self.row + (self.height - height) / 2,
            col: self.col + (self.width - width) / 2,
            bordered: true,
            header: Text::new(),
            footer: help,
            children: Vec::new(),
            focus: Focus::Window,
        };
        build(&mut popup)?;

        loop {
            console.present(&[self, &popup])?;
            let input = console.read_input()?;
            if let Input::Resize(..) = input {
                continue;
            }
            match handler(&mut popup, &input)? {
                PopupSignal::Exit(value) => return Ok(value),
                PopupSignal::Continue => {}
                PopupSignal::Pass => {
                    popup.on_key(&input)?;
                }
            }
        }
    }

    // ── Rendering ──

    pub fn render(&self, buf: &mut Buffer, palette: &Palette) {
        let area = Rect::new(self.col, self.row, self.width, self.height).intersection(buf.area);
        Clear.render(area, buf);
        buf.set_style(area, palette.style(ColorId::Normal));

        if self.bordered {
            Block::bordered()
                .border_style(palette.border())
                .style(palette.style(ColorId::Normal))
                .render(area, buf);
            // help text sits on the bottom border
            if let Some(help) = self.footer.line(0) {
                let help = Line::plain(ColorId::Normal, " ").concat(help).concat(&Line::plain(ColorId::Normal, " "));
                put_line(
                    buf,
                    palette,
                    (self.col + 2, self.row + self.height.saturating_sub(1)),
                    self.width.saturating_sub(4).min(help.len() as u16),
                    &help,
                    false,
                );
            }
        } else {
            if let Some(header) = self.header.line(0) {
                put_line(buf, palette, (self.col, self.row), self.width, header, false);
            }
            if let Some(footer) = self.footer.line(0) {
                put_line(
                    buf,
                    palette,
                    (self.col, self.row + self.height.saturating_sub(1)),
                    self.width,
                    footer,
                    false,
                );
            }
        }

        for pane in &self.children {
            pane.render(buf, palette, (self.col, self.row));
        }
    }

    /// Terminal cursor for the focused editable pane, if any.
    pub fn cursor_position(&self) -> Option<(u16, u16)> {
        let name = self.focused_name()?;
        let pane = self.child(name).ok()?;
        pane.cursor_position((self.col, self.row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::session::testing::ScriptedConsole;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn focus_switch_turns_off_previous_editor() {
        let mut win = Window::root(10, 40);
        win.pane("left", 4, 20, 0, 0, false);
        win.pane("right", 4, 20, 0, 20, false);
        win.set_focus(Some("left"), true).unwrap();
        assert!(win.child("left").unwrap().editable);
        win.set_focus(Some("right"), true).unwrap();
        assert!(!win.child("left").unwrap().editable);
        assert!(win.child("right").unwrap().editable);
        assert!(win.set_focus(Some("missing"), false).is_err());
    }

    #[test]
    fn only_focused_editor_receives_characters() {
        let mut win = Window::root(10, 40);
        win.pane("list", 4, 40, 0, 0, true)
            .replace(Text::plain(ColorId::Normal, "a\nb\nc"));
        win.pane("editor", 4, 40, 5, 0, false);

        assert_eq!(win.on_key(&Input::Char('x')).unwrap(), Dispatch::Ignored);
        assert_eq!(win.on_key(&Input::Down).unwrap(), Dispatch::CursorMoved);
        assert_eq!(win.child("list").unwrap().cursor_row(), 1);

        win.set_focus(Some("editor"), true).unwrap();
        assert_eq!(win.on_key(&Input::Char('x')).unwrap(), Dispatch::Edited);
        assert_eq!(win.child("editor").unwrap().value(), "x");
        assert_eq!(win.child("list").unwrap().cursor_row(), 1);
    }

    #[test]
    fn change_hook_sees_old_and_new_value() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut win = Window::root(10, 40);
        win.pane("list", 4, 40, 0, 0, true);
        win.textfield("search", 30, 6, 0, "search:", "");
        let log = Rc::clone(&seen);
        win.add_change_hook(
            "search",
            Box::new(move |w: &mut Window, old: &str, new: &str| {
                log.borrow_mut().push((old.to_string(), new.to_string()));
                if let Ok(list) = w.child_mut("list") {
                    list.replace(Text::plain(ColorId::Normal, new));
                }
            }),
        )
        .unwrap();
        win.set_focus(Some("search"), false).unwrap();

        win.on_key(&Input::Char('a')).unwrap();
        win.on_key(&Input::Char('b')).unwrap();
        win.on_key(&Input::Backspace).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![
                (String::new(), "a".to_string()),
                ("a".to_string(), "ab".to_string()),
                ("ab".to_string(), "a".to_string()),
            ]
        );
        assert_eq!(win.child("list").unwrap().value(), "a");
        // arrows still reach the list while the field has focus
        assert_eq!(win.on_key(&Input::Down).unwrap(), Dispatch::Handled);
    }

    #[test]
    fn popup_returns_handler_value_and_blocks_parent() {
        let parent = Window::root(20, 60);
        let mut console = ScriptedConsole::new(60, 20, [Input::Char('z'), Input::Enter]);
        let mut keys = Vec::new();
        let result = parent
            .popup(
                &mut console,
                Text::plain(ColorId::Normal, "ENTER confirm"),
                PopupSize::auto().width(30).height(6),
                |w| {
                    assert_eq!(w.size(), (6, 30));
                    w.textfield("field", 26, 1, 1, "c:", "");
                    w.set_focus(Some("field"), false)
                },
                |w, input| {
                    keys.push(*input);
                    Ok(match input {
                        Input::Enter => PopupSignal::Exit(Some(w.child("field")?.value())),
                        Input::Escape => PopupSignal::Exit(None),
                        _ => PopupSignal::Pass,
                    })
                },
            )
            .unwrap();
        assert_eq!(result, Some("z".to_string()));
        assert_eq!(keys, vec![Input::Char('z'), Input::Enter]);
    }

    #[test]
    fn popup_cancel_yields_none() {
        let parent = Window::root(20, 60);
        let mut console = ScriptedConsole::new(60, 20, [Input::Escape]);
        let result: Option<String> = parent
            .popup(
                &mut console,
                Text::new(),
                PopupSize::auto(),
                |_| Ok(()),
                |_, input| {
                    Ok(if *input == Input::Escape {
                        PopupSignal::Exit(None)
                    } else {
                        PopupSignal::Pass
                    })
                },
            )
            .unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn render_draws_header_footer_and_selection() {
        let mut win = Window::root(6, 20);
        win.set_header(Text::plain(ColorId::Normal, "TITLE"));
        win.set_footer(Text::plain(ColorId::Error, "boom"));
        win.pane("list", 3, 20, 1, 0, true)
            .replace(Text::plain(ColorId::Normal, "one\ntwo"));
        win.fill("split", 1, 20, 4, 0, '-');

        let mut console = ScriptedConsole::new(20, 6, []);
        console.present(&[&win]).unwrap();
        assert!(console.screen_line(0).starts_with("TITLE"));
        assert!(console.screen_line(1).starts_with("one"));
        assert_eq!(console.screen_line(4), "-".repeat(20));
        assert!(console.screen_line(5).starts_with("boom"));
        let palette = Palette::default();
        let colors = |c: ColorId| {
            let style = palette.style(c);
            (style.fg, style.bg)
        };
        assert_eq!(console.colors_at(0, 1), colors(ColorId::SelectedNormal));
        assert_eq!(console.colors_at(0, 2), colors(ColorId::Normal));
        assert_eq!(console.colors_at(0, 5), colors(ColorId::Error));
    }
}
