use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::action::{Action, Entry, Side};
use crate::config::Config;
use crate::file::{self, SchemaFile};
use crate::matching::{build_rows, Marker, Suggestion};

/// Which mode is active, without the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeKind {
    Diff,
    Focused(Side),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffRow {
    pub a: Option<String>,
    pub b: Option<String>,
    pub ratio: Option<f64>,
    pub a_marker: Marker,
    pub b_marker: Marker,
    pub action: Action,
}

impl From<Suggestion> for DiffRow {
    fn from(s: Suggestion) -> Self {
        DiffRow {
            a: s.a,
            b: s.b,
            ratio: s.ratio,
            a_marker: s.a_marker,
            b_marker: s.b_marker,
            action: Action::NoOp,
        }
    }
}

impl DiffRow {
    pub fn name(&self, side: Side) -> Option<&str> {
        match side {
            Side::A => self.a.as_deref(),
            Side::B => self.b.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FocusedRow {
    pub name: Option<String>,
    pub action: Action,
}

#[derive(Debug, Clone, Default)]
pub struct TableRows<R> {
    pub rows: Vec<R>,
    /// Rows were dropped by the display cap; an ellipsis row follows.
    pub truncated: bool,
}

/// Row tables for every logical table plus the one on screen.
#[derive(Debug, Clone)]
pub struct Tables<R> {
    names: Vec<String>,
    tables: Vec<TableRows<R>>,
    current: usize,
}

impl<R> Tables<R> {
    fn new(names: Vec<String>, tables: Vec<TableRows<R>>) -> Self {
        Tables {
            names,
            tables,
            current: 0,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn current(&self) -> usize {
        self.current
    }

    pub fn select(&mut self, index: usize) {
        self.current = index.min(self.names.len().saturating_sub(1));
    }

    pub fn next(&mut self) {
        if !self.names.is_empty() {
            self.current = (self.current + 1) % self.names.len();
        }
    }

    pub fn prev(&mut self) {
        let n = self.names.len();
        if n > 0 {
            self.current = (self.current + n - 1) % n;
        }
    }

    pub fn current_name(&self) -> &str {
        self.names.get(self.current).map_or("", String::as_str)
    }

    pub fn current_rows(&self) -> Option<&TableRows<R>> {
        self.tables.get(self.current)
    }

    pub fn current_rows_mut(&mut self) -> Option<&mut TableRows<R>> {
        self.tables.get_mut(self.current)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut TableRows<R>)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.tables.iter_mut())
    }
}

impl<R: Default> Tables<R> {
    /// Insert a blank row in the current table before `index` (or at the end).
    pub fn insert_blank(&mut self, index: usize) {
        if let Some(table) = self.current_rows_mut() {
            let at = index.min(table.rows.len());
            table.rows.insert(at, R::default());
        }
    }
}

/// Application state: the open file(s) and their row tables. Replaced
/// wholesale on every mode switch and reload.
pub enum Mode {
    Diff {
        a: Box<dyn SchemaFile>,
        b: Box<dyn SchemaFile>,
        tables: Tables<DiffRow>,
    },
    Focused {
        side: Side,
        file: Box<dyn SchemaFile>,
        tables: Tables<FocusedRow>,
    },
}

impl Mode {
    /// Open the file(s) for `kind` and compute every table. `source` says
    /// where each side is read from; `progress` gets a status line before
    /// each slow step.
    pub fn load(
        kind: ModeKind,
        config: &Config,
        source: &dyn Fn(Side) -> PathBuf,
        progress: &mut dyn FnMut(&str),
    ) -> Result<Mode> {
        let open = |side: Side, progress: &mut dyn FnMut(&str)| -> Result<Box<dyn SchemaFile>> {
            let path = source(side);
            progress(&format!("loading {} ...", path.display()));
            file::open(config.side(side).kind, &path)
                .inspect_err(|e| tracing::error!(path = %path.display(), error = %e, "error loading"))
                .with_context(|| format!("error loading {}", path.display()))
        };

        let mode = match kind {
            ModeKind::Diff => {
                let a = open(Side::A, &mut *progress)?;
                let b = open(Side::B, &mut *progress)?;
                progress("comparing...");
                let tables = config
                    .tables
                    .iter()
                    .map(|table| {
                        let m = build_rows(&a.keys(table), &b.keys(table), &config.matching);
                        TableRows {
                            rows: m.rows.into_iter().map(DiffRow::from).collect(),
                            truncated: m.truncated,
                        }
                    })
                    .collect();
                Mode::Diff {
                    a,
                    b,
                    tables: Tables::new(config.tables.clone(), tables),
                }
            }
            ModeKind::Focused(side) => {
                let file = open(side, &mut *progress)?;
                let tables = config
                    .tables
                    .iter()
                    .map(|table| TableRows {
                        rows: file
                            .keys(table)
                            .into_iter()
                            .map(|name| FocusedRow {
                                name: Some(name),
                                action: Action::NoOp,
                            })
                            .collect(),
                        truncated: false,
                    })
                    .collect();
                Mode::Focused {
                    side,
                    file,
                    tables: Tables::new(config.tables.clone(), tables),
                }
            }
        };
        tracing::info!(?kind, "mode loaded");
        Ok(mode)
    }

    pub fn kind(&self) -> ModeKind {
        match self {
            Mode::Diff { .. } => ModeKind::Diff,
            Mode::Focused { side, .. } => ModeKind::Focused(*side),
        }
    }

    pub fn current_table_name(&self) -> &str {
        match self {
            Mode::Diff { tables, .. } => tables.current_name(),
            Mode::Focused { tables, .. } => tables.current_name(),
        }
    }

    pub fn current_table(&self) -> usize {
        match self {
            Mode::Diff { tables, .. } => tables.current(),
            Mode::Focused { tables, .. } => tables.current(),
        }
    }

    pub fn table_names(&self) -> &[String] {
        match self {
            Mode::Diff { tables, .. } => tables.names(),
            Mode::Focused { tables, .. } => tables.names(),
        }
    }

    pub fn select_table(&mut self, index: usize) {
        match self {
            Mode::Diff { tables, .. } => tables.select(index),
            Mode::Focused { tables, .. } => tables.select(index),
        }
    }

    pub fn next_table(&mut self) {
        match self {
            Mode::Diff { tables, .. } => tables.next(),
            Mode::Focused { tables, .. } => tables.next(),
        }
    }

    pub fn prev_table(&mut self) {
        match self {
            Mode::Diff { tables, .. } => tables.prev(),
            Mode::Focused { tables, .. } => tables.prev(),
        }
    }

    /// Rows in the current table, not counting the ellipsis.
    pub fn row_count(&self) -> usize {
        match self {
            Mode::Diff { tables, .. } => tables.current_rows().map_or(0, |t| t.rows.len()),
            Mode::Focused { tables, .. } => tables.current_rows().map_or(0, |t| t.rows.len()),
        }
    }

    pub fn insert_blank_row(&mut self, index: usize) {
        match self {
            Mode::Diff { tables, .. } => tables.insert_blank(index),
            Mode::Focused { tables, .. } => tables.insert_blank(index),
        }
    }

    /// Sides this mode can write, given the configured outputs.
    pub fn writable(&self, config: &Config) -> Vec<Side> {
        let sides: &[Side] = match self {
            Mode::Diff { .. } => &[Side::A, Side::B],
            Mode::Focused { side, .. } => std::slice::from_ref(side),
        };
        sides
            .iter()
            .copied()
            .filter(|s| config.side(*s).output.is_some())
            .collect()
    }

    /// Apply every pending action table by table and write each writable side
    /// after each table. Stops at the first failure; files already written
    /// stay written. Every side dumped is recorded in `written`, also when a
    /// later step fails.
    pub fn commit(
        &mut self,
        config: &Config,
        written: &mut Vec<Side>,
        progress: &mut dyn FnMut(&str),
    ) -> Result<()> {
        let writable = self.writable(config);
        let mut dump = |side: Side, file: &dyn SchemaFile, progress: &mut dyn FnMut(&str)| -> Result<()> {
            let Some(path) = config.side(side).output.as_deref() else {
                return Ok(());
            };
            progress(&format!("writing to file {} ...", path.display()));
            file.dump(path)?;
            if !written.contains(&side) {
                written.push(side);
            }
            Ok(())
        };

        match self {
            Mode::Diff { a, b, tables } => {
                for (name, table) in tables.iter_mut() {
                    progress(&format!("updating table {name} ..."));
                    for row in table.rows.iter_mut() {
                        row.action
                            .apply(
                                name,
                                Some(Entry::new(row.a.as_deref(), &mut **a)),
                                Some(Entry::new(row.b.as_deref(), &mut **b)),
                            )
                            .with_context(|| format!("updating table {name}"))?;
                        row.action = Action::NoOp;
                    }
                    for side in &writable {
                        let file: &dyn SchemaFile = match side {
                            Side::A => &**a,
                            Side::B => &**b,
                        };
                        dump(*side, file, &mut *progress)?;
                    }
                }
            }
            Mode::Focused { side, file, tables } => {
                for (name, table) in tables.iter_mut() {
                    progress(&format!("updating table {name} ..."));
                    for row in table.rows.iter_mut() {
                        row.action
                            .apply(name, Some(Entry::new(row.name.as_deref(), &mut **file)), None)
                            .with_context(|| format!("updating table {name}"))?;
                        row.action = Action::NoOp;
                    }
                    dump(*side, &**file, &mut *progress)?;
                }
            }
        }
        tracing::info!(?written, "commit finished");
        Ok(())
    }
}

/// Where a side is read from: its output once it has been written, else the
/// original input.
pub fn source_path(config: &Config, side: Side, written: bool) -> &Path {
    let sc = config.side(side);
    match (&sc.output, written) {
        (Some(output), true) => output,
        _ => &sc.path,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SideConfig;
    use crate::file::FileKind;
    use crate::matching::MatchSettings;
    use std::fs;
    use tempfile::TempDir;

    pub(crate) const A_YAML: &str = "\
patient:
  age:
    type: integer
  sex:
    type: string
  race:
    type: string
visit:
  bmi:
    type: number
";

    pub(crate) const B_YAML: &str = "\
patient:
  Age:
    type: integer
  sex:
    type: string
  ethnicity:
    type: string
visit:
  bmi:
    type: number
  weight:
    type: number
";

    /// Writes both fixtures and returns a config with outputs next to them.
    pub(crate) fn fixture(dir: &TempDir, outputs: bool) -> Config {
        let a = dir.path().join("a.yaml");
        let b = dir.path().join("b.yaml");
        fs::write(&a, A_YAML).unwrap();
        fs::write(&b, B_YAML).unwrap();
        Config {
            a: SideConfig {
                path: a,
                kind: FileKind::Features,
                output: outputs.then(|| dir.path().join("a.out.yaml")),
            },
            b: SideConfig {
                path: b,
                kind: FileKind::Features,
                output: outputs.then(|| dir.path().join("b.out.yaml")),
            },
            tables: vec!["patient".into(), "visit".into()],
            matching: MatchSettings {
                similarity_threshold: 0.6,
                ..MatchSettings::default()
            },
        }
    }

    fn load(config: &Config, kind: ModeKind) -> Mode {
        let source = |side: Side| config.side(side).path.clone();
        Mode::load(kind, config, &source, &mut |_| {}).unwrap()
    }

    #[test]
    fn diff_mode_builds_every_table() {
        let dir = TempDir::new().unwrap();
        let config = fixture(&dir, false);
        let mut mode = load(&config, ModeKind::Diff);
        assert_eq!(mode.kind(), ModeKind::Diff);
        assert_eq!(mode.row_count(), 3);
        mode.next_table();
        assert_eq!(mode.current_table(), 1);
        // only weight is unmatched in visit
        assert_eq!(mode.row_count(), 1);
        mode.next_table();
        assert_eq!(mode.current_table(), 0);
        mode.prev_table();
        assert_eq!(mode.current_table(), 1);
    }

    #[test]
    fn focused_mode_lists_all_names() {
        let dir = TempDir::new().unwrap();
        let config = fixture(&dir, false);
        let mode = load(&config, ModeKind::Focused(Side::B));
        let Mode::Focused { side, tables, .. } = &mode else {
            panic!("expected focused mode");
        };
        assert_eq!(*side, Side::B);
        let names: Vec<_> = tables.current_rows().unwrap().rows.iter().map(|r| r.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["Age", "sex", "ethnicity"]);
    }

    #[test]
    fn blank_row_lands_at_cursor() {
        let dir = TempDir::new().unwrap();
        let config = fixture(&dir, false);
        let mut mode = load(&config, ModeKind::Diff);
        let before = mode.row_count();
        mode.insert_blank_row(1);
        assert_eq!(mode.row_count(), before + 1);
        let Mode::Diff { tables, .. } = &mode else {
            panic!("expected diff mode");
        };
        let rows = &tables.current_rows().unwrap().rows;
        assert_eq!(rows[1], DiffRow::default());
        assert_eq!(rows[0].a.as_deref(), Some("age"));
        assert_eq!(rows[2].a.as_deref(), Some("race"));
    }

    #[test]
    fn commit_applies_actions_and_writes_outputs() {
        let dir = TempDir::new().unwrap();
        let config = fixture(&dir, true);
        let mut mode = load(&config, ModeKind::Diff);
        if let Mode::Diff { tables, .. } = &mut mode {
            let rows = &mut tables.current_rows_mut().unwrap().rows;
            assert_eq!(rows[0].b.as_deref(), Some("Age"));
            rows[0].action = Action::UseA;
        }
        let mut messages = Vec::new();
        let mut written = Vec::new();
        mode.commit(&config, &mut written, &mut |m| messages.push(m.to_string()))
            .unwrap();
        assert_eq!(written, vec![Side::A, Side::B]);
        assert!(messages.iter().any(|m| m == "updating table patient ..."));

        let out = fs::read_to_string(dir.path().join("b.out.yaml")).unwrap();
        assert!(out.contains("age:"));
        assert!(!out.contains("Age:"));
        assert_eq!(source_path(&config, Side::B, true), dir.path().join("b.out.yaml"));
        assert_eq!(source_path(&config, Side::B, false), config.b.path);

        if let Mode::Diff { tables, .. } = &mode {
            assert!(tables.current_rows().unwrap().rows.iter().all(|r| r.action == Action::NoOp));
        }
    }

    #[test]
    fn commit_stops_on_first_error() {
        let dir = TempDir::new().unwrap();
        let config = fixture(&dir, true);
        let mut mode = load(&config, ModeKind::Diff);
        if let Mode::Diff { tables, .. } = &mut mode {
            // race has no b counterpart
            let rows = &mut tables.current_rows_mut().unwrap().rows;
            rows[1].action = Action::Customize("z".into());
        }
        let mut written = Vec::new();
        assert!(mode.commit(&config, &mut written, &mut |_| {}).is_err());
        assert!(written.is_empty());
        assert!(!dir.path().join("a.out.yaml").exists());
    }

    #[test]
    fn load_error_names_the_file() {
        let dir = TempDir::new().unwrap();
        let mut config = fixture(&dir, false);
        config.a.path = dir.path().join("missing.yaml");
        let source = |side: Side| config.side(side).path.clone();
        let err = Mode::load(ModeKind::Diff, &config, &source, &mut |_| {}).err().unwrap();
        assert!(format!("{err:#}").contains("missing.yaml"));
    }
}
