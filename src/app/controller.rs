use anyhow::{bail, Context, Result};
use std::path::Path;

use super::commands::{self, Command, SHORT_HELP};
use super::components;
use super::mode::{source_path, Mode, ModeKind};
use crate::action::{Action, ActionError, Side};
use crate::config::Config;
use crate::file::SchemaFile;
use crate::matching::{colorize_diff, find_candidates, Marker};
use crate::text::table::{cell, format_table, Borders, FormattedTable};
use crate::text::{ColorId, Line, Text};
use crate::ui::{Console, Dispatch, Input, Window};

const TITLE: &str = "ICEES FHIR-PIT Configuration Tool";
const EDIT_HELP: &str = "ESCAPE or CTRL+S save and leave the editor";

const HEADER: &str = "header_pane";
const TOP: &str = "top_pane";
const LEFT: &str = "left_pane";
const RIGHT: &str = "right_pane";
const BOTTOM: &str = "bottom_pane";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Footer status line that is drawn immediately, for slow steps.
fn status_reporter<'a, C: Console>(
    console: &'a mut C,
    window: &'a mut Window,
) -> impl FnMut(&str) + 'a {
    move |msg| {
        window.set_footer(Text::plain(ColorId::Normal, msg));
        if let Err(e) = console.present(&[&*window]) {
            tracing::warn!("cannot draw status: {e:#}");
        }
    }
}

fn entry_text(file: &dyn SchemaFile, table: &str, name: Option<&str>) -> Text {
    let Some(name) = name else {
        return Text::new();
    };
    match file.dump_get(table, name) {
        Ok(yaml) => Text::plain(ColorId::Normal, &yaml),
        Err(e) => Text::plain(ColorId::Error, &e.to_string()),
    }
}

/// Owns the console, the root window and the current mode, and turns keys
/// into mode changes.
pub struct Controller<C: Console> {
    console: C,
    window: Window,
    config: Config,
    mode: Mode,
    /// Sides whose output file has been written; they reload from it.
    written: Vec<Side>,
    /// Row names the bottom panes currently show.
    shown: Option<(Option<String>, Option<String>)>,
    /// Side whose value is open in its editor pane.
    editing: Option<Side>,
}

impl<C: Console> Controller<C> {
    /// Load both files in diff mode and lay out the screen. A file that fails
    /// to load is fatal here.
    pub fn new(mut console: C, config: Config) -> Result<Self> {
        let (height, width) = console.size()?;
        let mut window = Window::root(height, width);
        let mode = Self::load(&mut console, &mut window, &config, &[], ModeKind::Diff)?;
        let mut controller = Controller {
            console,
            window,
            config,
            mode,
            written: Vec::new(),
            shown: None,
            editing: None,
        };
        controller.setup_window()?;
        controller.refresh_content()?;
        Ok(controller)
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn editing(&self) -> Option<Side> {
        self.editing
    }

    fn load(
        console: &mut C,
        window: &mut Window,
        config: &Config,
        written: &[Side],
        kind: ModeKind,
    ) -> Result<Mode> {
        let source = |side: Side| source_path(config, side, written.contains(&side)).to_path_buf();
        Mode::load(kind, config, &source, &mut status_reporter(console, window))
    }

    /// Draw, read a key, handle it; until quit. Failed commands end up in the
    /// footer and the log, and the loop goes on.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.console.present(&[&self.window])?;
            let input = self.console.read_input()?;
            match self.handle(input) {
                Ok(Flow::Quit) => {
                    tracing::info!("quit");
                    return Ok(());
                }
                Ok(Flow::Continue) => {}
                Err(e) => {
                    tracing::error!("{e:#}");
                    self.window
                        .set_footer(Text::plain(ColorId::Error, &format!("{e:#}")));
                }
            }
        }
    }

    pub fn handle(&mut self, input: Input) -> Result<Flow> {
        if let Input::Resize(height, width) = input {
            self.resize(height, width)?;
            return Ok(Flow::Continue);
        }
        if let Some(side) = self.editing {
            self.handle_edit(side, input)?;
            self.refresh_footer()?;
            return Ok(Flow::Continue);
        }

        let command = match commands::lookup(&input, self.mode.kind()) {
            Some(Command::Menu) => {
                match components::menu(&self.window, &mut self.console, self.mode.kind())? {
                    Some(command) => command,
                    None => return self.finish_command(),
                }
            }
            Some(command) => command,
            None => {
                if self.window.on_key(&input)? == Dispatch::CursorMoved {
                    self.refresh_bottom_panes(false)?;
                }
                self.refresh_footer()?;
                return Ok(Flow::Continue);
            }
        };
        if command == Command::Quit {
            return Ok(Flow::Quit);
        }
        self.run_command(command)?;
        self.finish_command()
    }

    /// Popups swallow resize events, so catch up with the terminal afterwards.
    fn finish_command(&mut self) -> Result<Flow> {
        let size = self.console.size()?;
        if size != self.window.size() {
            self.resize(size.0, size.1)?;
        }
        self.refresh_footer()?;
        Ok(Flow::Continue)
    }

    // ── Layout ──

    fn setup_window(&mut self) -> Result<()> {
        let (height, width) = self.window.size();
        self.window.teardown();
        self.shown = None;
        self.editing = None;

        let split_y = height / 2;
        let top_height = split_y.saturating_sub(1);
        let bottom_height = height.saturating_sub(split_y + 2);
        let w = &mut self.window;
        w.pane(HEADER, 3, width, 1, 0, false);
        w.pane(TOP, top_height.saturating_sub(3), width, 4, 0, true);
        w.fill("horizontal_splitter", 1, width, split_y, 0, '-');
        match self.mode.kind() {
            ModeKind::Diff => {
                let split_x = width / 2;
                w.pane(LEFT, bottom_height, split_x, split_y + 1, 0, false);
                w.pane(
                    RIGHT,
                    bottom_height,
                    width.saturating_sub(split_x + 1),
                    split_y + 1,
                    split_x + 1,
                    false,
                );
                w.fill("vertical_splitter", bottom_height, 1, split_y + 1, split_x, '|');
            }
            ModeKind::Focused(_) => {
                w.pane(BOTTOM, bottom_height, width, split_y + 1, 0, false);
            }
        }
        w.set_focus(Some(TOP), false)
    }

    fn resize(&mut self, height: u16, width: u16) -> Result<()> {
        let row = self.cursor_row().unwrap_or(0);
        tracing::debug!(height, width, "resize");
        self.window.resize(height, width);
        self.setup_window()?;
        self.refresh_content()?;
        self.window.child_mut(TOP)?.move_to(row, 0);
        self.refresh_bottom_panes(true)
    }

    fn editor_pane(&self, side: Side) -> &'static str {
        match (self.mode.kind(), side) {
            (ModeKind::Focused(_), _) => BOTTOM,
            (ModeKind::Diff, Side::A) => LEFT,
            (ModeKind::Diff, Side::B) => RIGHT,
        }
    }

    // ── Rendering ──

    fn nav_line(&self) -> Text {
        let current = self.mode.current_table();
        let line = self
            .mode
            .table_names()
            .iter()
            .enumerate()
            .fold(Line::plain(ColorId::Normal, format!("{TITLE} ")), |line, (i, name)| {
                let color = if i == current {
                    ColorId::Highlight
                } else {
                    ColorId::Normal
                };
                let line = if i > 0 {
                    line + Line::plain(ColorId::Normal, " ")
                } else {
                    line
                };
                line + Line::plain(color, name.clone())
            });
        Text::from_lines([line])
    }

    fn file_label(&self, side: Side) -> String {
        self.config.side(side).path.display().to_string()
    }

    fn table_view(&self) -> FormattedTable {
        let plain = |s: &str| cell(ColorId::Normal, s);
        let (columns, rows) = match &self.mode {
            Mode::Diff { tables, .. } => {
                let columns = vec![
                    plain(&self.file_label(Side::A)),
                    plain(&self.file_label(Side::B)),
                    plain("ratio"),
                    plain("a"),
                    plain("b"),
                    plain("update"),
                ];
                let mut rows: Vec<Vec<Text>> = Vec::new();
                let mut truncated = false;
                if let Some(table) = tables.current_rows() {
                    truncated = table.truncated;
                    for row in &table.rows {
                        let (a, b) = match (&row.a, &row.b) {
                            (Some(a), Some(b)) => colorize_diff(a, b),
                            (a, b) => (
                                plain(a.as_deref().unwrap_or("")),
                                plain(b.as_deref().unwrap_or("")),
                            ),
                        };
                        let ratio = row.ratio.map(|r| format!("{r:.2}")).unwrap_or_default();
                        rows.push(vec![
                            a,
                            b,
                            plain(&ratio),
                            plain(&row.a_marker.to_string()),
                            plain(&row.b_marker.to_string()),
                            plain(&row.action.to_string()),
                        ]);
                    }
                }
                if truncated {
                    let mut ellipsis = vec![plain("...")];
                    ellipsis.resize_with(columns.len(), || plain(""));
                    rows.push(ellipsis);
                }
                (columns, rows)
            }
            Mode::Focused { side, tables, .. } => {
                let columns = vec![plain(&self.file_label(*side)), plain("update")];
                let rows = tables
                    .current_rows()
                    .map(|t| {
                        t.rows
                            .iter()
                            .map(|row| {
                                vec![
                                    plain(row.name.as_deref().unwrap_or("")),
                                    plain(&row.action.to_string()),
                                ]
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                (columns, rows)
            }
        };
        format_table(ColorId::Normal, &columns, &rows, Borders::default())
    }

    fn refresh_content(&mut self) -> Result<()> {
        self.window.set_header(self.nav_line());
        let table = self.table_view();
        self.window.child_mut(HEADER)?.replace(table.header);
        let top = self.window.child_mut(TOP)?;
        top.bottom_padding = table.footer.line_count();
        top.replace(table.content + Text::plain(ColorId::Normal, "\n") + table.footer);
        self.refresh_footer()?;
        self.refresh_bottom_panes(false)
    }

    fn refresh_footer(&mut self) -> Result<()> {
        let footer = if self.editing.is_some() {
            Text::plain(ColorId::Normal, EDIT_HELP)
        } else {
            let n = self.mode.row_count();
            let i = (self.cursor_row()? + 1).min(n);
            Text::from_lines([Line::plain(ColorId::Highlight, format!("{i} / {n}"))
                + Line::plain(ColorId::Normal, format!(" {SHORT_HELP}"))])
        };
        self.window.set_footer(footer);
        Ok(())
    }

    /// Show the selected row's entries below the table. Skipped when the row
    /// names have not changed, unless `force`.
    fn refresh_bottom_panes(&mut self, force: bool) -> Result<()> {
        let names = self.current_names()?;
        if !force && self.shown.as_ref() == Some(&names) {
            return Ok(());
        }
        let table = self.mode.current_table_name().to_string();
        let panes = match &self.mode {
            Mode::Diff { a, b, .. } => vec![
                (LEFT, entry_text(&**a, &table, names.0.as_deref())),
                (RIGHT, entry_text(&**b, &table, names.1.as_deref())),
            ],
            Mode::Focused { file, .. } => {
                vec![(BOTTOM, entry_text(&**file, &table, names.0.as_deref()))]
            }
        };
        for (name, text) in panes {
            let pane = self.window.child_mut(name)?;
            pane.replace(text);
            pane.move_to(0, 0);
        }
        self.shown = Some(names);
        Ok(())
    }

    // ── Row access ──

    fn cursor_row(&self) -> Result<usize> {
        Ok(self.window.child(TOP)?.cursor_row())
    }

    /// Row under the cursor, if it is a real row (not the ellipsis or padding).
    fn selected_row(&self) -> Result<Option<usize>> {
        let row = self.cursor_row()?;
        Ok((row < self.mode.row_count()).then_some(row))
    }

    /// (a, b) names of the selected row; focused mode fills only the first.
    fn current_names(&self) -> Result<(Option<String>, Option<String>)> {
        let Some(row) = self.selected_row()? else {
            return Ok((None, None));
        };
        Ok(match &self.mode {
            Mode::Diff { tables, .. } => tables
                .current_rows()
                .and_then(|t| t.rows.get(row))
                .map_or((None, None), |r| (r.a.clone(), r.b.clone())),
            Mode::Focused { tables, .. } => (
                tables
                    .current_rows()
                    .and_then(|t| t.rows.get(row))
                    .and_then(|r| r.name.clone()),
                None,
            ),
        })
    }

    fn current_name(&self, side: Side) -> Result<Option<String>> {
        let (a, b) = self.current_names()?;
        Ok(match (self.mode.kind(), side) {
            (ModeKind::Focused(_), _) | (ModeKind::Diff, Side::A) => a,
            (ModeKind::Diff, Side::B) => b,
        })
    }

    /// The file a command's side refers to. Focused mode has only one.
    fn real_side(&self, side: Side) -> Side {
        match self.mode.kind() {
            ModeKind::Focused(focused) => focused,
            ModeKind::Diff => side,
        }
    }

    fn file(&self, side: Side) -> &dyn SchemaFile {
        match &self.mode {
            Mode::Diff { a, b, .. } => match side {
                Side::A => &**a,
                Side::B => &**b,
            },
            Mode::Focused { file, .. } => &**file,
        }
    }

    fn file_mut(&mut self, side: Side) -> &mut dyn SchemaFile {
        match &mut self.mode {
            Mode::Diff { a, b, .. } => match side {
                Side::A => &mut **a,
                Side::B => &mut **b,
            },
            Mode::Focused { file, .. } => &mut **file,
        }
    }

    fn ensure_writable(&self, side: Side) -> Result<()> {
        let side = self.real_side(side);
        if self.config.side(side).output.is_none() {
            bail!("{side} is read-only, start with --update-{side} to change it");
        }
        Ok(())
    }

    fn ensure_any_writable(&self) -> Result<()> {
        if self.mode.writable(&self.config).is_empty() {
            bail!("nothing to write, start with --update-a or --update-b");
        }
        Ok(())
    }

    // ── Commands ──

    fn run_command(&mut self, command: Command) -> Result<()> {
        tracing::debug!(?command, "command");
        match command {
            Command::PrevTable => {
                self.mode.prev_table();
                self.after_table_switch()
            }
            Command::NextTable => {
                self.mode.next_table();
                self.after_table_switch()
            }
            Command::Up => self.navigate(Input::Up),
            Command::Down => self.navigate(Input::Down),
            Command::PageUp => self.navigate(Input::PageUp),
            Command::PageDown => self.navigate(Input::PageDown),
            Command::FocusA => self.reload(ModeKind::Focused(Side::A)),
            Command::FocusB => self.reload(ModeKind::Focused(Side::B)),
            Command::DiffMode => self.reload(ModeKind::Diff),
            Command::UseA => {
                self.ensure_writable(Side::B)?;
                self.set_action(Action::UseA)
            }
            Command::UseB => {
                self.ensure_writable(Side::A)?;
                self.set_action(Action::UseB)
            }
            Command::CustomizeA => {
                self.ensure_writable(Side::A)?;
                self.customize(Action::CustomizeA)
            }
            Command::CustomizeB => {
                self.ensure_writable(Side::B)?;
                self.customize(Action::CustomizeB)
            }
            Command::Customize => {
                self.ensure_any_writable()?;
                self.customize(Action::Customize)
            }
            Command::Skip => self.set_action(Action::NoOp),
            Command::PickA => self.pick(Side::A),
            Command::PickB => self.pick(Side::B),
            Command::EditA => self.start_edit(Side::A),
            Command::EditB => self.start_edit(Side::B),
            Command::Commit => self.commit(),
            Command::ImportA => self.import_codes(Side::A),
            Command::ImportB => self.import_codes(Side::B),
            Command::NewRow => {
                let row = self.cursor_row()?;
                self.mode.insert_blank_row(row);
                self.refresh_content()?;
                self.refresh_bottom_panes(true)
            }
            Command::Help => {
                components::show_help(&self.window, &mut self.console, self.mode.kind())
            }
            Command::Menu | Command::Quit => Ok(()),
        }
    }

    fn navigate(&mut self, input: Input) -> Result<()> {
        if self.window.on_key(&input)? == Dispatch::CursorMoved {
            self.refresh_bottom_panes(false)?;
        }
        Ok(())
    }

    fn after_table_switch(&mut self) -> Result<()> {
        self.window.child_mut(TOP)?.move_to(0, 0);
        self.refresh_content()
    }

    /// Replace the mode, keeping the table on screen. On failure the old mode
    /// stays.
    fn reload(&mut self, kind: ModeKind) -> Result<()> {
        let current = self.mode.current_table();
        let mut mode = Self::load(
            &mut self.console,
            &mut self.window,
            &self.config,
            &self.written,
            kind,
        )?;
        mode.select_table(current);
        self.mode = mode;
        self.setup_window()?;
        self.refresh_content()
    }

    fn set_action(&mut self, action: Action) -> Result<()> {
        let Some(row) = self.selected_row()? else {
            return Ok(());
        };
        match &mut self.mode {
            Mode::Diff { tables, .. } => {
                if let Some(r) = tables.current_rows_mut().and_then(|t| t.rows.get_mut(row)) {
                    r.action = action;
                }
            }
            Mode::Focused { tables, .. } => {
                if let Some(r) = tables.current_rows_mut().and_then(|t| t.rows.get_mut(row)) {
                    r.action = action;
                }
            }
        }
        self.refresh_content()
    }

    fn customize(&mut self, make: fn(String) -> Action) -> Result<()> {
        if self.selected_row()?.is_none() {
            return Ok(());
        }
        let (a, b) = self.current_names()?;
        let current = match self.mode.kind() {
            ModeKind::Diff => vec![(Side::A, a.as_deref()), (Side::B, b.as_deref())],
            ModeKind::Focused(side) => vec![(side, a.as_deref())],
        };
        let name = components::enter_name(&self.window, &mut self.console, &current)?;
        match name {
            Some(name) => self.set_action(make(name)),
            None => Ok(()),
        }
    }

    /// Replace one side of the selected row with a name picked from that
    /// side's file, ranked against the other side's name when there is one.
    fn pick(&mut self, side: Side) -> Result<()> {
        let Some(row) = self.selected_row()? else {
            return Ok(());
        };
        let table = self.mode.current_table_name().to_string();
        let names = self.file(side).keys(&table);
        let (target, ranked) = match self.mode.kind() {
            ModeKind::Diff => (self.current_name(side.other())?, true),
            ModeKind::Focused(_) => (None, false),
        };
        let candidates = find_candidates(&names, target.as_deref());
        let Some(picked) =
            components::choose_candidate(&self.window, &mut self.console, candidates, ranked)?
        else {
            return Ok(());
        };
        tracing::debug!(%side, name = %picked.name, "candidate picked");

        match &mut self.mode {
            Mode::Diff { tables, .. } => {
                if let Some(r) = tables.current_rows_mut().and_then(|t| t.rows.get_mut(row)) {
                    match side {
                        Side::A => {
                            r.a = Some(picked.name);
                            r.a_marker = Marker::Picked;
                        }
                        Side::B => {
                            r.b = Some(picked.name);
                            r.b_marker = Marker::Picked;
                        }
                    }
                    r.ratio = picked.ratio;
                }
            }
            Mode::Focused { tables, .. } => {
                if let Some(r) = tables.current_rows_mut().and_then(|t| t.rows.get_mut(row)) {
                    r.name = Some(picked.name);
                }
            }
        }
        self.refresh_content()
    }

    fn commit(&mut self) -> Result<()> {
        self.ensure_any_writable()?;
        let result = {
            let mut report = status_reporter(&mut self.console, &mut self.window);
            self.mode.commit(&self.config, &mut self.written, &mut report)
        };
        match result {
            Ok(()) => self.reload(self.mode.kind()),
            // rows already applied are NoOp now; the rest keep their actions for a retry
            Err(e) => {
                self.refresh_content()?;
                Err(e)
            }
        }
    }

    // ── Editing ──

    fn start_edit(&mut self, side: Side) -> Result<()> {
        self.ensure_writable(side)?;
        if self.current_name(side)?.is_none() {
            return Err(ActionError::MissingName(self.real_side(side)).into());
        }
        self.refresh_bottom_panes(true)?;
        self.window.set_focus(Some(self.editor_pane(side)), true)?;
        self.editing = Some(side);
        Ok(())
    }

    fn handle_edit(&mut self, side: Side, input: Input) -> Result<()> {
        match input {
            Input::Escape | Input::Ctrl('s') => self.finish_edit(side),
            _ => {
                self.window.on_key(&input)?;
                Ok(())
            }
        }
    }

    /// Store the edited text. A value that does not parse keeps the editor open.
    fn finish_edit(&mut self, side: Side) -> Result<()> {
        let raw = self.window.child(self.editor_pane(side))?.value();
        let name = self
            .current_name(side)?
            .ok_or(ActionError::MissingName(self.real_side(side)))?;
        let table = self.mode.current_table_name().to_string();
        let file = self.file_mut(side);
        let value = file
            .parse_value(&raw)
            .with_context(|| format!("{name} not saved"))?;
        file.update_value(&table, &name, value)?;
        tracing::info!(%table, %name, "value edited");

        self.editing = None;
        self.window.set_focus(Some(TOP), false)?;
        self.refresh_bottom_panes(true)
    }

    fn import_codes(&mut self, side: Side) -> Result<()> {
        self.ensure_writable(side)?;
        let name = self
            .current_name(side)?
            .ok_or(ActionError::MissingName(self.real_side(side)))?;
        let Some(path) = components::pick_file(&self.window, &mut self.console, Path::new("."))?
        else {
            return Ok(());
        };
        let table = self.mode.current_table_name().to_string();
        let value = self.file(side).import_codes(&path)?;
        self.file_mut(side).update_value(&table, &name, value)?;
        tracing::info!(%table, %name, path = %path.display(), "codes imported");
        self.refresh_bottom_panes(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::mode::tests::fixture;
    use crate::ui::testing::ScriptedConsole;
    use std::fs;
    use tempfile::TempDir;

    fn run(config: Config, script: &[Input]) -> Controller<ScriptedConsole> {
        let console = ScriptedConsole::new(100, 30, script.iter().copied());
        let mut controller = Controller::new(console, config).unwrap();
        controller.run().unwrap();
        controller
    }

    fn keys(s: &str) -> Vec<Input> {
        s.chars().map(Input::Char).collect()
    }

    fn diff_rows(c: &Controller<ScriptedConsole>) -> Vec<(Option<String>, Option<String>, Action)> {
        let Mode::Diff { tables, .. } = c.mode() else {
            panic!("expected diff mode");
        };
        tables
            .current_rows()
            .unwrap()
            .rows
            .iter()
            .map(|r| (r.a.clone(), r.b.clone(), r.action.clone()))
            .collect()
    }

    #[test]
    fn start_screen_shows_title_table_and_entries() {
        let dir = TempDir::new().unwrap();
        let c = run(fixture(&dir, false), &keys("q"));
        let screen = c.console().screen();
        assert!(c.console().screen_line(0).starts_with(TITLE));
        assert_eq!(c.window().header().to_string(), format!("{TITLE} patient visit"));
        assert!(screen.contains("patient"));
        assert!(screen.contains("0.67"));
        // first row is age/Age, shown in both bottom panes
        assert!(screen.contains("type: integer"));
        assert!(c.console().screen_line(29).starts_with("1 / 3"));
    }

    #[test]
    fn new_row_is_inserted_at_cursor() {
        let dir = TempDir::new().unwrap();
        let mut script = vec![Input::Down];
        script.extend(keys("nq"));
        let c = run(fixture(&dir, false), &script);
        let rows = diff_rows(&c);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[1], (None, None, Action::NoOp));
        assert_eq!(rows[2].0.as_deref(), Some("race"));
    }

    #[test]
    fn tables_cycle_in_both_directions() {
        let dir = TempDir::new().unwrap();
        let c = run(fixture(&dir, false), &keys(".q"));
        assert_eq!(c.mode().current_table(), 1);
        assert_eq!(c.mode().row_count(), 1);
        let c = run(fixture(&dir, false), &keys(",,q"));
        assert_eq!(c.mode().current_table(), 0);
    }

    #[test]
    fn read_only_side_reports_in_footer() {
        let dir = TempDir::new().unwrap();
        let c = run(fixture(&dir, false), &keys("aq"));
        assert!(c.console().screen_line(29).contains("b is read-only"));
        assert_eq!(c.window().footer().color_at(0, 0), Some(ColorId::Error));
        assert_eq!(diff_rows(&c)[0].2, Action::NoOp);
    }

    #[test]
    fn commit_writes_outputs_and_reloads_from_them() {
        let dir = TempDir::new().unwrap();
        let c = run(fixture(&dir, true), &keys("auq"));
        let out = fs::read_to_string(dir.path().join("b.out.yaml")).unwrap();
        assert!(out.contains("age:"));
        assert!(!out.contains("Age:"));
        assert!(dir.path().join("a.out.yaml").exists());
        // age now matches exactly, leaving race and ethnicity
        let rows = diff_rows(&c);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.0.as_deref() != Some("age")));
    }

    #[test]
    fn failed_commit_keeps_pending_actions() {
        let dir = TempDir::new().unwrap();
        // visit: rename weight in b
        let mut script = keys(".d");
        script.extend(keys("mass"));
        script.push(Input::Enter);
        // patient: race has no b name, so using a fails
        script.extend(keys(","));
        script.push(Input::Down);
        script.extend(keys("au.q"));
        let c = run(fixture(&dir, true), &script);
        assert!(!dir.path().join("b.out.yaml").exists());
        assert_eq!(diff_rows(&c)[0].2, Action::CustomizeB("mass".into()));
    }

    #[test]
    fn customize_prompts_for_a_name() {
        let dir = TempDir::new().unwrap();
        let mut script = keys("c");
        script.extend(keys("years"));
        script.push(Input::Enter);
        script.extend(keys("q"));
        let c = run(fixture(&dir, true), &script);
        assert_eq!(diff_rows(&c)[0].2, Action::Customize("years".into()));
    }

    #[test]
    fn pick_replaces_name_and_marks_it() {
        let dir = TempDir::new().unwrap();
        // second row is race with no b; pick b from the ranked list
        let mut script = vec![Input::Down];
        script.extend(keys("g"));
        script.extend(keys("eth"));
        script.push(Input::Enter);
        script.extend(keys("q"));
        let c = run(fixture(&dir, false), &script);
        let Mode::Diff { tables, .. } = c.mode() else {
            panic!("expected diff mode");
        };
        let row = &tables.current_rows().unwrap().rows[1];
        assert_eq!(row.b.as_deref(), Some("ethnicity"));
        assert_eq!(row.b_marker, Marker::Picked);
        assert!(row.ratio.is_some());
    }

    #[test]
    fn edit_rejects_bad_value_then_saves() {
        let dir = TempDir::new().unwrap();
        let mut script = keys("l");
        script.push(Input::Char('x'));
        script.push(Input::Escape);
        // still editing: fix it up and change the type
        script.push(Input::Backspace);
        script.push(Input::End);
        script.extend(std::iter::repeat(Input::Backspace).take("integer".len()));
        script.extend(keys("number"));
        script.push(Input::Ctrl('s'));
        script.extend(keys("q"));
        let c = run(fixture(&dir, true), &script);
        assert_eq!(c.editing(), None);
        let Mode::Diff { a, .. } = c.mode() else {
            panic!("expected diff mode");
        };
        assert_eq!(a.dump_get("patient", "age").unwrap(), "type: number");
    }

    #[test]
    fn bad_edit_keeps_editor_open() {
        let dir = TempDir::new().unwrap();
        let console = ScriptedConsole::new(100, 30, []);
        let mut c = Controller::new(console, fixture(&dir, true)).unwrap();
        for input in keys("lx") {
            c.handle(input).unwrap();
        }
        assert!(c.handle(Input::Escape).is_err());
        assert_eq!(c.editing(), Some(Side::A));
        assert_eq!(c.window().focused_name(), Some(LEFT));
    }

    #[test]
    fn focus_mode_switch_and_back() {
        let dir = TempDir::new().unwrap();
        let c = run(fixture(&dir, false), &keys("jq"));
        assert_eq!(c.mode().kind(), ModeKind::Focused(Side::B));
        assert_eq!(c.mode().row_count(), 3);
        assert!(c.window().child(BOTTOM).is_ok());
        assert!(c.window().child(LEFT).is_err());

        let c = run(fixture(&dir, false), &keys("jkq"));
        assert_eq!(c.mode().kind(), ModeKind::Diff);
    }

    #[test]
    fn resize_rebuilds_layout() {
        let dir = TempDir::new().unwrap();
        let console = ScriptedConsole::new(100, 30, []);
        let mut c = Controller::new(console, fixture(&dir, false)).unwrap();
        c.handle(Input::Down).unwrap();
        c.handle(Input::Resize(40, 120)).unwrap();
        assert_eq!(c.window().size(), (40, 120));
        assert_eq!(c.window().child(TOP).unwrap().cursor_row(), 1);
        assert_eq!(c.window().child(LEFT).unwrap().width, 60);
    }
}
