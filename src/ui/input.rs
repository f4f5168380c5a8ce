use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// One keyboard (or resize) event, decoupled from the terminal backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Char(char),
    Ctrl(char),
    Enter,
    Escape,
    Backspace,
    Delete,
    Tab,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Home,
    End,
    /// New terminal size as (height, width).
    Resize(u16, u16),
}

impl Input {
    pub fn from_key(key: KeyEvent) -> Option<Input> {
        let input = match key.code {
            KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
                Input::Ctrl(c.to_ascii_lowercase())
            }
            KeyCode::Char(c) => Input::Char(c),
            KeyCode::Enter => Input::Enter,
            KeyCode::Esc => Input::Escape,
            KeyCode::Backspace => Input::Backspace,
            KeyCode::Delete => Input::Delete,
            KeyCode::Tab => Input::Tab,
            KeyCode::Up => Input::Up,
            KeyCode::Down => Input::Down,
            KeyCode::Left => Input::Left,
            KeyCode::Right => Input::Right,
            KeyCode::PageUp => Input::PageUp,
            KeyCode::PageDown => Input::PageDown,
            KeyCode::Home => Input::Home,
            KeyCode::End => Input::End,
            _ => return None,
        };
        Some(input)
    }

    /// Keys that move a selection rather than edit text.
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            Input::Up
                | Input::Down
                | Input::PageUp
                | Input::PageDown
                | Input::Home
                | Input::End
                | Input::Left
                | Input::Right
        )
    }
}
