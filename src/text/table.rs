use super::{ColorId, Line, Text};

/// Which outer borders a table gets. Inner column separators are always drawn.
#[derive(Debug, Clone, Copy)]
pub struct Borders {
    pub upper: bool,
    pub lower: bool,
    pub left: bool,
    pub right: bool,
}

impl Default for Borders {
    fn default() -> Self {
        Borders {
            upper: true,
            lower: true,
            left: true,
            right: true,
        }
    }
}

impl Borders {
    /// Only the rule under the header, as used by the popup pickers.
    pub fn inner() -> Self {
        Borders {
            upper: false,
            lower: true,
            left: false,
            right: false,
        }
    }
}

/// A table split into its three scroll regions.
#[derive(Debug, Clone)]
pub struct FormattedTable {
    pub header: Text,
    pub content: Text,
    pub footer: Text,
}

/// Lay out `rows` under `columns`, centering every cell in a column two columns
/// wider than its widest entry.
pub fn format_table(
    color: ColorId,
    columns: &[Text],
    rows: &[Vec<Text>],
    borders: Borders,
) -> FormattedTable {
    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            rows.iter()
                .filter_map(|row| row.get(i))
                .map(Text::width)
                .chain(std::iter::once(name.width()))
                .max()
                .unwrap_or(0)
                + 2
        })
        .collect();
    let table_width = widths.iter().sum::<usize>() + widths.len().saturating_sub(1)
        + usize::from(borders.left)
        + usize::from(borders.right);

    let rule = Text::plain(color, &"-".repeat(table_width));
    let newline = Text::plain(color, "\n");
    let bar = Text::plain(color, "|");
    let edge = |on: bool| if on { bar.clone() } else { Text::new() };

    let format_row = |cells: &[Text]| {
        let centered = widths
            .iter()
            .zip(cells)
            .map(|(w, cell)| cell.center(color, *w));
        edge(borders.left) + bar.join(centered) + edge(borders.right)
    };

    let mut header = if borders.upper {
        rule.clone() + newline.clone()
    } else {
        Text::new()
    };
    header = header + format_row(columns) + newline.clone() + rule.clone();

    let content = newline.join(rows.iter().map(|row| format_row(row.as_slice())));

    let footer = if borders.lower { rule } else { Text::new() };

    FormattedTable {
        header,
        content,
        footer,
    }
}

/// Single-line cell helper.
pub fn cell(color: ColorId, s: &str) -> Text {
    Text::from_lines([Line::plain(color, s)])
}
