//! Stock popups: file picker, text viewer, menu, name entry and candidate picker.

use anyhow::{Context, Result};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::commands::{self, Command};
use super::mode::ModeKind;
use crate::action::Side;
use crate::matching::{filter_candidates, Candidate};
use crate::text::table::{cell, format_table, Borders, FormattedTable};
use crate::text::{ColorId, Text};
use crate::ui::{Console, Input, PopupSignal, PopupSize, Window};

const NAVIGATE_HELP: &str = "UP DOWN PAGE UP PAGE DOWN navigate ENTER confirm ESCAPE exit";
const CONFIRM_HELP: &str = "ENTER confirm ESCAPE exit";
const CLOSE_HELP: &str = "ESCAPE exit";

fn help(s: &str) -> Text {
    Text::plain(ColorId::Normal, s)
}

// ── File picker ──

fn list_dir(dir: &Path) -> Result<Vec<String>> {
    let mut names = fs::read_dir(dir)
        .with_context(|| format!("cannot list {}", dir.display()))?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().into_owned()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("cannot list {}", dir.display()))?;
    names.sort();
    names.insert(0, "..".to_string());
    Ok(names)
}

fn show_dir(w: &mut Window, dir: &Path, entries: &[String]) {
    let (height, width) = w.size();
    let inner = width.saturating_sub(2);
    let header = format!("{}\n{}", dir.display(), "-".repeat(inner as usize));
    w.text("header_pane", 2, inner, 1, 1, Text::plain(ColorId::Normal, &header));
    let list = w.pane("content_pane", height.saturating_sub(4), inner, 3, 1, true);
    list.replace(Text::plain(ColorId::Normal, &entries.join("\n")));
    list.move_to(0, 0);
}

/// Browse from `start` and return the chosen file. Enter on a directory
/// (or `..`) descends into it.
pub fn pick_file<C: Console + ?Sized>(
    parent: &Window,
    console: &mut C,
    start: &Path,
) -> Result<Option<PathBuf>> {
    let mut dir = fs::canonicalize(start)
        .with_context(|| format!("cannot open {}", start.display()))?;
    let mut entries = list_dir(&dir)?;
    let (first_dir, first_entries) = (dir.clone(), entries.clone());

    parent.popup(
        console,
        help(NAVIGATE_HELP),
        PopupSize::auto(),
        move |w| {
            show_dir(w, &first_dir, &first_entries);
            Ok(())
        },
        move |w, input| {
            Ok(match input {
                Input::Escape => PopupSignal::Exit(None),
                Input::Enter => {
                    let row = w.child("content_pane")?.cursor_row();
                    let Some(name) = entries.get(row) else {
                        return Ok(PopupSignal::Continue);
                    };
                    let next = if name == ".." {
                        dir.parent().map_or_else(|| dir.clone(), Path::to_path_buf)
                    } else {
                        dir.join(name)
                    };
                    if next.is_dir() {
                        entries = list_dir(&next)?;
                        dir = next;
                        show_dir(w, &dir, &entries);
                        PopupSignal::Continue
                    } else {
                        PopupSignal::Exit(Some(next))
                    }
                }
                _ => PopupSignal::Pass,
            })
        },
    )
}

// ── Text viewer, help and menu ──

pub fn show_text<C: Console + ?Sized>(parent: &Window, console: &mut C, text: &str) -> Result<()> {
    let body = Text::plain(ColorId::Normal, text);
    parent.popup(
        console,
        help(CLOSE_HELP),
        PopupSize::auto(),
        move |w| {
            let (height, width) = w.size();
            w.text(
                "text_pane",
                height.saturating_sub(2),
                width.saturating_sub(2),
                1,
                1,
                body,
            );
            Ok(())
        },
        |_, input| {
            Ok(match input {
                Input::Escape | Input::Enter => PopupSignal::Exit(Some(())),
                _ => PopupSignal::Continue,
            })
        },
    )?;
    Ok(())
}

pub fn show_help<C: Console + ?Sized>(parent: &Window, console: &mut C, mode: ModeKind) -> Result<()> {
    show_text(parent, console, &commands::help_text(mode))
}

/// Command picked from the menu, by Enter on its row or by its own key.
pub fn menu<C: Console + ?Sized>(
    parent: &Window,
    console: &mut C,
    mode: ModeKind,
) -> Result<Option<Command>> {
    let entries = commands::menu_entries(mode);
    let text = commands::menu_text(mode);
    let width = text.lines().map(str::len).max().unwrap_or(0) as u16 + 2;

    parent.popup(
        console,
        help(CONFIRM_HELP),
        PopupSize::auto().width(width),
        move |w| {
            let (height, width) = w.size();
            w.pane(
                "menu_pane",
                height.saturating_sub(2),
                width.saturating_sub(2),
                1,
                1,
                true,
            )
            .replace(Text::plain(ColorId::Normal, &text));
            w.set_focus(Some("menu_pane"), false)
        },
        move |w, input| {
            Ok(match input {
                Input::Escape => PopupSignal::Exit(None),
                Input::Enter => {
                    let row = w.child("menu_pane")?.cursor_row();
                    PopupSignal::Exit(entries.get(row).map(|b| b.command))
                }
                key => match entries.iter().find(|b| b.key == *key) {
                    Some(b) => PopupSignal::Exit(Some(b.command)),
                    None => PopupSignal::Pass,
                },
            })
        },
    )
}

// ── Name entry ──

/// Ask for a new variable name, showing the current name on each side.
/// An empty answer counts as cancel.
pub fn enter_name<C: Console + ?Sized>(
    parent: &Window,
    console: &mut C,
    current: &[(Side, Option<&str>)],
) -> Result<Option<String>> {
    let labels: Vec<String> = current
        .iter()
        .map(|(side, name)| format!("{side}: {}", name.unwrap_or("")))
        .collect();
    let height = labels.len() as u16 + 3;

    parent.popup(
        console,
        help(CONFIRM_HELP),
        PopupSize::auto().height(height),
        move |w| {
            let inner = w.size().1.saturating_sub(2);
            for (i, label) in labels.iter().enumerate() {
                let row = 1 + i as u16;
                w.text(&format!("label_{i}"), 1, inner, row, 1, Text::plain(ColorId::Normal, label));
            }
            w.textfield("name_field", inner, 1 + labels.len() as u16, 1, "c:", "");
            w.set_focus(Some("name_field"), false)
        },
        |w, input| {
            Ok(match input {
                Input::Escape => PopupSignal::Exit(None),
                Input::Enter => {
                    let value = w.child("name_field")?.value().trim().to_string();
                    PopupSignal::Exit((!value.is_empty()).then_some(value))
                }
                _ => PopupSignal::Pass,
            })
        },
    )
}

// ── Candidate picker ──

fn candidate_table(candidates: &[Candidate], ranked: bool) -> FormattedTable {
    let mut columns = vec![cell(ColorId::Normal, "candidate")];
    if ranked {
        columns.push(cell(ColorId::Normal, "ratio"));
    }
    let rows: Vec<Vec<Text>> = candidates
        .iter()
        .map(|c| {
            let mut row = vec![cell(ColorId::Normal, &c.name)];
            if ranked {
                let ratio = c.ratio.map(|r| format!("{r:.2}")).unwrap_or_default();
                row.push(cell(ColorId::Normal, &ratio));
            }
            row
        })
        .collect();
    format_table(ColorId::Normal, &columns, &rows, Borders::inner())
}

fn show_candidates(w: &mut Window, candidates: &[Candidate], ranked: bool) -> Result<()> {
    let table = candidate_table(candidates, ranked);
    w.child_mut("header_pane")?.replace(table.header);
    let list = w.child_mut("content_pane")?;
    list.bottom_padding = table.footer.line_count();
    list.replace(table.content + Text::plain(ColorId::Normal, "\n") + table.footer);
    list.move_to(0, 0);
    Ok(())
}

/// Pick one of `candidates`, narrowing the list as the operator types into the
/// search field. `ranked` adds the ratio column.
pub fn choose_candidate<C: Console + ?Sized>(
    parent: &Window,
    console: &mut C,
    candidates: Vec<Candidate>,
    ranked: bool,
) -> Result<Option<Candidate>> {
    let (parent_h, parent_w) = parent.size();
    let natural = candidate_table(&candidates, ranked).header.width() as u16 + 2;
    let width = natural.max(30).min((parent_w as u32 * 4 / 5) as u16);
    let height = (parent_h as u32 * 4 / 5) as u16;

    let shown = Rc::new(RefCell::new(candidates.clone()));
    let hook_shown = Rc::clone(&shown);

    parent.popup(
        console,
        help(NAVIGATE_HELP),
        PopupSize::auto().width(width).height(height),
        move |w| {
            let (h, wd) = w.size();
            let inner = wd.saturating_sub(2);
            w.pane("header_pane", 2, inner, 1, 1, false);
            w.pane("content_pane", h.saturating_sub(5), inner, 3, 1, true);
            w.textfield("search_field", inner, h.saturating_sub(2), 1, "search:", "");
            show_candidates(w, &candidates, ranked)?;
            w.add_change_hook(
                "search_field",
                Box::new(move |w: &mut Window, _old: &str, new: &str| {
                    let filtered = filter_candidates(&candidates, new);
                    if let Err(e) = show_candidates(w, &filtered, ranked) {
                        tracing::warn!(error = %e, "candidate list not refreshed");
                    }
                    *hook_shown.borrow_mut() = filtered;
                }),
            )?;
            w.set_focus(Some("search_field"), false)
        },
        move |w, input| {
            Ok(match input {
                Input::Escape => PopupSignal::Exit(None),
                Input::Enter => {
                    let row = w.child("content_pane")?.cursor_row();
                    match shown.borrow().get(row) {
                        Some(c) => PopupSignal::Exit(Some(c.clone())),
                        None => PopupSignal::Continue,
                    }
                }
                _ => PopupSignal::Pass,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::testing::ScriptedConsole;
    use tempfile::TempDir;

    fn parent() -> Window {
        Window::root(24, 80)
    }

    fn candidates() -> Vec<Candidate> {
        ["race_ethnicity", "sex", "Age"]
            .iter()
            .map(|n| Candidate {
                name: n.to_string(),
                ratio: Some(0.5),
            })
            .collect()
    }

    #[test]
    fn file_picker_descends_and_returns_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub/codes.csv"), "Code,Vocab\n").unwrap();
        fs::write(dir.path().join("data.csv"), "").unwrap();

        // entries: .., data.csv, sub
        let mut console = ScriptedConsole::new(80, 24, [Input::Down, Input::Down, Input::Enter]);
        console.push(Input::Down);
        console.push(Input::Enter);
        let picked = pick_file(&parent(), &mut console, dir.path()).unwrap();
        let expected = fs::canonicalize(dir.path()).unwrap().join("sub/codes.csv");
        assert_eq!(picked, Some(expected));
    }

    #[test]
    fn file_picker_goes_up_and_cancels() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let sub = dir.path().join("sub");

        let mut console = ScriptedConsole::new(80, 24, [Input::Enter]);
        console.push(Input::Escape);
        assert_eq!(pick_file(&parent(), &mut console, &sub).unwrap(), None);
        // the listing after `..` shows the parent directory in the header
        let root = fs::canonicalize(dir.path()).unwrap();
        assert!(console.screen().contains(&root.display().to_string()));
    }

    #[test]
    fn name_entry_returns_typed_name() {
        let mut console = ScriptedConsole::new(80, 24, []);
        console.type_str("race");
        console.push(Input::Enter);
        let name = enter_name(
            &parent(),
            &mut console,
            &[(Side::A, Some("race_eth")), (Side::B, None)],
        )
        .unwrap();
        assert_eq!(name.as_deref(), Some("race"));
        assert!(console.screen().contains("a: race_eth"));
    }

    #[test]
    fn empty_name_counts_as_cancel() {
        let mut console = ScriptedConsole::new(80, 24, [Input::Char(' '), Input::Enter]);
        let name = enter_name(&parent(), &mut console, &[(Side::A, Some("x"))]).unwrap();
        assert_eq!(name, None);
    }

    #[test]
    fn candidate_search_narrows_the_list() {
        let mut console = ScriptedConsole::new(80, 24, []);
        console.type_str("AG");
        console.push(Input::Enter);
        let picked = choose_candidate(&parent(), &mut console, candidates(), true).unwrap();
        assert_eq!(picked.map(|c| c.name), Some("Age".to_string()));
    }

    #[test]
    fn candidate_picker_navigates_while_typing() {
        let mut console = ScriptedConsole::new(80, 24, [Input::Down, Input::Enter]);
        let picked = choose_candidate(&parent(), &mut console, candidates(), false).unwrap();
        assert_eq!(picked.map(|c| c.name), Some("sex".to_string()));
    }

    #[test]
    fn candidate_picker_ignores_enter_on_empty_list() {
        let mut console = ScriptedConsole::new(80, 24, []);
        console.type_str("zzz");
        console.push(Input::Enter);
        console.push(Input::Escape);
        assert_eq!(
            choose_candidate(&parent(), &mut console, candidates(), true).unwrap(),
            None
        );
    }

    #[test]
    fn menu_selects_by_key_or_row() {
        let mut console = ScriptedConsole::new(80, 24, [Input::Char('u')]);
        assert_eq!(
            menu(&parent(), &mut console, ModeKind::Diff).unwrap(),
            Some(Command::Commit)
        );
        let mut console = ScriptedConsole::new(80, 24, [Input::Down, Input::Enter]);
        assert_eq!(
            menu(&parent(), &mut console, ModeKind::Diff).unwrap(),
            Some(Command::NextTable)
        );
    }

    #[test]
    fn help_closes_on_escape() {
        let mut console = ScriptedConsole::new(80, 24, [Input::Escape]);
        show_help(&parent(), &mut console, ModeKind::Diff).unwrap();
        assert!(console.screen().contains("previous table"));
    }
}
