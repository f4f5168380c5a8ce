use anyhow::Result;
use crossterm::{
    cursor::Show,
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use std::io::{self, Stdout};

use super::input::Input;
use super::styles::Palette;
use super::window::Window;

/// The terminal as the compositor sees it: a size, a way to show a stack of
/// windows (bottom first), and a blocking read of the next key.
pub trait Console {
    /// (height, width)
    fn size(&self) -> Result<(u16, u16)>;
    fn present(&mut self, layers: &[&Window]) -> Result<()>;
    fn read_input(&mut self) -> Result<Input>;
}

fn paint(f: &mut Frame, palette: &Palette, layers: &[&Window]) {
    for layer in layers {
        layer.render(f.buffer_mut(), palette);
    }
    if let Some((x, y)) = layers.last().and_then(|w| w.cursor_position()) {
        f.set_cursor_position((x, y));
    }
}

/// Raw mode + alternate screen for as long as it lives.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
    }
}

/// The interactive terminal session. Created once at startup; dropping it
/// restores the terminal.
pub struct Session {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    palette: Palette,
    _guard: TerminalGuard,
}

impl Session {
    pub fn start() -> Result<Self> {
        let guard = TerminalGuard::enter()?;
        let terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
        Ok(Session {
            terminal,
            palette: Palette::default(),
            _guard: guard,
        })
    }
}

impl Console for Session {
    fn size(&self) -> Result<(u16, u16)> {
        let (cols, rows) = crossterm::terminal::size()?;
        Ok((rows, cols))
    }

    fn present(&mut self, layers: &[&Window]) -> Result<()> {
        let palette = &self.palette;
        self.terminal.draw(|f| paint(f, palette, layers))?;
        Ok(())
    }

    fn read_input(&mut self) -> Result<Input> {
        loop {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if let Some(input) = Input::from_key(key) {
                        return Ok(input);
                    }
                }
                Event::Resize(cols, rows) => {
                    self.terminal.autoresize()?;
                    return Ok(Input::Resize(rows, cols));
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use anyhow::bail;
    use ratatui::backend::TestBackend;
    use std::collections::VecDeque;

    /// Console over ratatui's `TestBackend` fed from a fixed key script.
    pub struct ScriptedConsole {
        terminal: Terminal<TestBackend>,
        palette: Palette,
        inputs: VecDeque<Input>,
        size: (u16, u16),
    }

    impl ScriptedConsole {
        pub fn new(width: u16, height: u16, inputs: impl IntoIterator<Item = Input>) -> Self {
            ScriptedConsole {
                terminal: Terminal::new(TestBackend::new(width, height))
                    .expect("test backend never fails"),
                palette: Palette::default(),
                inputs: inputs.into_iter().collect(),
                size: (height, width),
            }
        }

        pub fn type_str(&mut self, s: &str) {
            self.inputs.extend(s.chars().map(Input::Char));
        }

        pub fn push(&mut self, input: Input) {
            self.inputs.push_back(input);
        }

        pub fn screen_line(&self, y: u16) -> String {
            let buf = self.terminal.backend().buffer();
            (0..buf.area.width)
                .map(|x| buf.cell((x, y)).map_or(" ", |c| c.symbol()).to_string())
                .collect()
        }

        pub fn screen(&self) -> String {
            let height = self.terminal.backend().buffer().area.height;
            (0..height)
                .map(|y| self.screen_line(y))
                .collect::<Vec<_>>()
                .join("\n")
        }

        pub fn colors_at(&self, x: u16, y: u16) -> (Option<Color>, Option<Color>) {
            let buf = self.terminal.backend().buffer();
            buf.cell((x, y))
                .map_or((None, None), |c| (Some(c.fg), Some(c.bg)))
        }
    }

    impl Console for ScriptedConsole {
        fn size(&self) -> Result<(u16, u16)> {
            Ok(self.size)
        }

        fn present(&mut self, layers: &[&Window]) -> Result<()> {
            let palette = &self.palette;
            self.terminal.autoresize()?;
            self.terminal.draw(|f| paint(f, palette, layers))?;
            Ok(())
        }

        fn read_input(&mut self) -> Result<Input> {
            match self.inputs.pop_front() {
                Some(input) => Ok(input),
                None => bail!("input script exhausted"),
            }
        }
    }
}
