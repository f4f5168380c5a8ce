//! Key bindings, their availability per mode, and the generated help and menu.

use super::mode::ModeKind;
use crate::ui::Input;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    PrevTable,
    NextTable,
    Up,
    Down,
    PageUp,
    PageDown,
    FocusA,
    FocusB,
    DiffMode,
    UseA,
    UseB,
    CustomizeB,
    CustomizeA,
    Customize,
    Skip,
    PickA,
    PickB,
    EditA,
    EditB,
    Commit,
    ImportA,
    ImportB,
    NewRow,
    Help,
    Menu,
    Quit,
}

#[derive(Debug, Clone, Copy)]
pub struct Binding {
    pub command: Command,
    pub key: Input,
    pub key_name: &'static str,
    pub text: &'static str,
    /// Handled by pane navigation; listed in the full help only.
    pub extended: bool,
    pub in_menu: bool,
    pub in_diff: bool,
    pub in_focused: bool,
}

const fn bind(command: Command, key: Input, key_name: &'static str, text: &'static str) -> Binding {
    Binding {
        command,
        key,
        key_name,
        text,
        extended: false,
        in_menu: true,
        in_diff: true,
        in_focused: true,
    }
}

const fn diff_only(b: Binding) -> Binding {
    Binding { in_focused: false, ..b }
}

const fn navigation(b: Binding) -> Binding {
    Binding {
        extended: true,
        in_menu: false,
        ..b
    }
}

pub const BINDINGS: &[Binding] = &[
    bind(Command::PrevTable, Input::Char(','), "COMMA", "previous table"),
    bind(Command::NextTable, Input::Char('.'), "PERIOD", "next table"),
    navigation(bind(Command::Up, Input::Up, "UP", "navigate up")),
    navigation(bind(Command::Down, Input::Down, "DOWN", "navigate down")),
    navigation(bind(Command::PageUp, Input::PageUp, "PAGE UP", "navigate page up")),
    navigation(bind(Command::PageDown, Input::PageDown, "PAGE DOWN", "navigate page down")),
    bind(Command::FocusA, Input::Char('i'), "i", "focus on a"),
    bind(Command::FocusB, Input::Char('j'), "j", "focus on b"),
    bind(Command::DiffMode, Input::Char('k'), "k", "diff mode"),
    diff_only(bind(Command::UseA, Input::Char('a'), "a", "use a")),
    diff_only(bind(Command::UseB, Input::Char('b'), "b", "use b")),
    diff_only(bind(Command::CustomizeB, Input::Char('d'), "d", "customize b")),
    bind(Command::CustomizeA, Input::Char('e'), "e", "customize a"),
    diff_only(bind(Command::Customize, Input::Char('c'), "c", "customize")),
    bind(Command::Skip, Input::Char('s'), "s", "skip"),
    bind(Command::PickA, Input::Char('f'), "f", "pick candidate from a"),
    diff_only(bind(Command::PickB, Input::Char('g'), "g", "pick candidate from b")),
    bind(Command::EditA, Input::Char('l'), "l", "update a value"),
    diff_only(bind(Command::EditB, Input::Char('r'), "r", "update b value")),
    bind(Command::Commit, Input::Char('u'), "u", "update tables"),
    bind(Command::ImportA, Input::Char('v'), "v", "update a by loading codes"),
    diff_only(bind(Command::ImportB, Input::Char('w'), "w", "update b by loading codes")),
    bind(Command::NewRow, Input::Char('n'), "n", "append new row"),
    bind(Command::Help, Input::Char('h'), "h", "help"),
    Binding {
        in_menu: false,
        ..bind(Command::Menu, Input::Char('m'), "m", "menu")
    },
    bind(Command::Quit, Input::Char('q'), "q", "exit"),
];

const KEY_WIDTH: usize = 10;

const LEGEND: &str = "\
update column
  use a         rename b's variable to a's name
  use b         rename a's variable to b's name
  customize     rename both variables to the entered name
markers
  (blank)       name exists in the other file
  x             name is missing from the other file
  o             name was picked from the candidates";

impl Binding {
    pub fn available(&self, mode: ModeKind) -> bool {
        match mode {
            ModeKind::Diff => self.in_diff,
            ModeKind::Focused(_) => self.in_focused,
        }
    }

    fn line(&self) -> String {
        format!("{:<width$}{}", self.key_name, self.text, width = KEY_WIDTH)
    }
}

/// Command bound to `input` in `mode`. Navigation keys are left to the panes.
pub fn lookup(input: &Input, mode: ModeKind) -> Option<Command> {
    BINDINGS
        .iter()
        .find(|b| !b.extended && b.key == *input && b.available(mode))
        .map(|b| b.command)
}

/// Entries offered by the menu popup, in display order.
pub fn menu_entries(mode: ModeKind) -> Vec<&'static Binding> {
    BINDINGS
        .iter()
        .filter(|b| b.in_menu && b.available(mode))
        .collect()
}

pub fn menu_text(mode: ModeKind) -> String {
    menu_entries(mode)
        .iter()
        .map(|b| b.line())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two columns of bindings, then the legend.
pub fn help_text(mode: ModeKind) -> String {
    let lines: Vec<String> = BINDINGS
        .iter()
        .filter(|b| !b.extended && b.available(mode))
        .map(Binding::line)
        .collect();
    let column = lines.iter().map(String::len).max().unwrap_or(0) + 2;
    let mut out: Vec<String> = lines
        .chunks(2)
        .map(|pair| match pair {
            [left, right] => format!("{left:<column$}{right}"),
            [left] => left.clone(),
            _ => String::new(),
        })
        .collect();
    out.push(String::new());
    out.push(LEGEND.to_string());
    out.join("\n")
}

pub const SHORT_HELP: &str = "H help M menu U update tables Q exit ";
