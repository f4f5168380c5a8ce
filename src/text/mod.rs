//! Colored, multi-line text values.
//!
//! Everything here has value semantics: operations that look like edits return a
//! new `Line`/`Text` and leave the receiver untouched. Columns are counted in
//! chars, not bytes.

pub mod table;

use std::fmt;
use std::ops::Add;
use thiserror::Error;

// ── Colors ──

/// Palette slot a span is drawn with. The UI palette resolves it to a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorId {
    Normal,
    Highlight,
    SelectedNormal,
    SelectedHighlight,
    Error,
}

impl ColorId {
    /// Slot used when the span sits on a selected row.
    pub fn selected(self) -> ColorId {
        match self {
            ColorId::Normal => ColorId::SelectedNormal,
            ColorId::Highlight => ColorId::SelectedHighlight,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TextError {
    #[error("position {row}:{col} is out of range")]
    OutOfRange { row: usize, col: usize },
}

// ── Span ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    color: ColorId,
    text: String,
}

impl Span {
    pub fn new(color: ColorId, text: impl Into<String>) -> Self {
        Span {
            color,
            text: text.into(),
        }
    }

    pub fn color(&self) -> ColorId {
        self.color
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn slice(&self, start: usize, end: usize) -> Span {
        let from = byte_offset(&self.text, start);
        let to = byte_offset(&self.text, end);
        Span::new(self.color, &self.text[from..to.max(from)])
    }
}

/// Byte offset of the `col`-th char, or the string length past the end.
fn byte_offset(s: &str, col: usize) -> usize {
    s.char_indices().nth(col).map(|(i, _)| i).unwrap_or(s.len())
}

// ── Line ──

/// A single row of spans. Adjacent spans never share a color and no span is
/// empty, so two lines with the same visible content compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Line {
    spans: Vec<Span>,
}

impl Line {
    pub fn new() -> Self {
        Line::default()
    }

    pub fn plain(color: ColorId, text: impl Into<String>) -> Self {
        Line::from_spans([Span::new(color, text)])
    }

    pub fn from_spans(spans: impl IntoIterator<Item = Span>) -> Self {
        let mut line = Line::new();
        for span in spans {
            line.push(span);
        }
        line
    }

    fn push(&mut self, span: Span) {
        if span.is_empty() {
            return;
        }
        if let Some(last) = self.spans.last_mut() {
            if last.color == span.color {
                last.text.push_str(&span.text);
                return;
            }
        }
        self.spans.push(span);
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    pub fn len(&self) -> usize {
        self.spans.iter().map(Span::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Columns `start..end`, clamped to the line. A boundary inside a span splits
    /// it and both halves keep the span's color.
    pub fn slice(&self, start: usize, end: usize) -> Line {
        let end = end.min(self.len());
        let mut out = Line::new();
        if start >= end {
            return out;
        }
        let mut offset = 0;
        for span in &self.spans {
            let span_start = offset;
            let span_end = offset + span.len();
            offset = span_end;
            if span_end <= start {
                continue;
            }
            if span_start >= end {
                break;
            }
            let from = start.saturating_sub(span_start);
            let to = end.min(span_end) - span_start;
            out.push(span.slice(from, to));
        }
        out
    }

    /// The single character at `col` as a one-column line.
    pub fn get(&self, col: usize) -> Result<Line, TextError> {
        if col >= self.len() {
            return Err(TextError::OutOfRange { row: 0, col });
        }
        Ok(self.slice(col, col + 1))
    }

    pub fn color_at(&self, col: usize) -> Option<ColorId> {
        let mut offset = 0;
        for span in &self.spans {
            offset += span.len();
            if col < offset {
                return Some(span.color);
            }
        }
        None
    }

    pub fn concat(&self, other: &Line) -> Line {
        let mut out = self.clone();
        for span in &other.spans {
            out.push(span.clone());
        }
        out
    }

    /// Pad with `color` spaces to `width`: `floor(diff / 2)` on the left, the
    /// rest on the right. Lines already at least `width` wide come back as is.
    pub fn center(&self, color: ColorId, width: usize) -> Line {
        let len = self.len();
        if len >= width {
            return self.clone();
        }
        let diff = width - len;
        let left = diff / 2;
        Line::plain(color, " ".repeat(left))
            .concat(self)
            .concat(&Line::plain(color, " ".repeat(diff - left)))
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for span in &self.spans {
            f.write_str(&span.text)?;
        }
        Ok(())
    }
}

impl Add for Line {
    type Output = Line;

    fn add(self, rhs: Line) -> Line {
        self.concat(&rhs)
    }
}

// ── Text ──

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Text {
    lines: Vec<Line>,
}

impl Text {
    /// The zero-line text, identity for concatenation.
    pub fn new() -> Self {
        Text::default()
    }

    /// One line per `\n`-separated segment, so `""` is a single empty line.
    pub fn plain(color: ColorId, s: &str) -> Self {
        Text {
            lines: s.split('\n').map(|l| Line::plain(color, l)).collect(),
        }
    }

    pub fn from_lines(lines: impl IntoIterator<Item = Line>) -> Self {
        Text {
            lines: lines.into_iter().collect(),
        }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, row: usize) -> Option<&Line> {
        self.lines.get(row)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Widest line, in columns.
    pub fn width(&self) -> usize {
        self.lines.iter().map(Line::len).max().unwrap_or(0)
    }

    pub fn slice_lines(&self, start: usize, end: usize) -> Text {
        let end = end.min(self.lines.len());
        let start = start.min(end);
        Text::from_lines(self.lines[start..end].iter().cloned())
    }

    /// Line-aware concatenation: the last line of `self` absorbs the first line
    /// of `other`.
    pub fn concat(&self, other: &Text) -> Text {
        let (Some((last, head)), Some((first, tail))) =
            (self.lines.split_last(), other.lines.split_first())
        else {
            return if self.lines.is_empty() {
                other.clone()
            } else {
                self.clone()
            };
        };
        let mut lines = head.to_vec();
        lines.push(last.concat(first));
        lines.extend(tail.iter().cloned());
        Text { lines }
    }

    /// Interleave `self` between `texts`, like `str::join`.
    pub fn join(&self, texts: impl IntoIterator<Item = Text>) -> Text {
        let mut iter = texts.into_iter();
        let Some(first) = iter.next() else {
            return Text::new();
        };
        iter.fold(first, |acc, t| acc.concat(self).concat(&t))
    }

    pub fn center(&self, color: ColorId, width: usize) -> Text {
        Text::from_lines(self.lines.iter().map(|l| l.center(color, width)))
    }

    /// Remove the character at `(row, col)`. At the end of a line that has a
    /// successor the two lines merge; at the end of the last line nothing happens.
    pub fn delete(&self, row: usize, col: usize) -> Result<Text, TextError> {
        let line = self.checked_line(row, col)?;
        let len = line.len();
        let mut lines = self.lines.clone();
        if col == len {
            if row + 1 < lines.len() {
                let next = lines.remove(row + 1);
                lines[row] = line.concat(&next);
            }
        } else {
            lines[row] = line.slice(0, col).concat(&line.slice(col + 1, len));
        }
        Ok(Text { lines })
    }

    /// Split line `row` at `col` and splice `inserted` between the halves.
    pub fn insert(&self, row: usize, col: usize, inserted: &Text) -> Result<Text, TextError> {
        let line = self.checked_line(row, col)?;
        let mut left = self.lines[..row].to_vec();
        left.push(line.slice(0, col));
        let mut right = vec![line.slice(col, line.len())];
        right.extend(self.lines[row + 1..].iter().cloned());
        Ok(Text { lines: left }
            .concat(inserted)
            .concat(&Text { lines: right }))
    }

    pub fn color_at(&self, row: usize, col: usize) -> Option<ColorId> {
        self.lines.get(row).and_then(|l| l.color_at(col))
    }

    fn checked_line(&self, row: usize, col: usize) -> Result<&Line, TextError> {
        match self.lines.get(row) {
            Some(line) if col <= line.len() => Ok(line),
            _ => Err(TextError::OutOfRange { row, col }),
        }
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", line)?;
        }
        Ok(())
    }
}

impl Add for Text {
    type Output = Text;

    fn add(self, rhs: Text) -> Text {
        self.concat(&rhs)
    }
}

impl Add<Line> for Text {
    type Output = Text;

    fn add(self, rhs: Line) -> Text {
        self.concat(&Text::from_lines([rhs]))
    }
}
