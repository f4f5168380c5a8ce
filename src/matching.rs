//! Suggest renames between two sets of variable names.
//!
//! The similarity ratio is `2 * matches / (len(a) + len(b))` over a char-level
//! diff, so 1.0 means identical and 0.0 means nothing in common.

use similar::{DiffTag, TextDiff};
use std::fmt;

use crate::text::{ColorId, Line, Span, Text};

/// Knobs for `build_rows`. Defaults match an unconfigured run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchSettings {
    pub similarity_threshold: f64,
    /// `None` shows every row.
    pub max_entries: Option<usize>,
    pub ignore_suffix: Vec<String>,
    pub a_only: bool,
    pub b_only: bool,
}

/// Per-side marker shown in the `a` and `b` columns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Marker {
    /// The name exists in the other file too.
    #[default]
    Present,
    /// The name has no counterpart in the other file.
    Missing,
    /// The name was picked by hand from the candidate list.
    Picked,
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Marker::Present => "",
            Marker::Missing => "x",
            Marker::Picked => "o",
        })
    }
}

/// One suggested pairing between the two files.
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub a: Option<String>,
    pub b: Option<String>,
    pub ratio: Option<f64>,
    pub a_marker: Marker,
    pub b_marker: Marker,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matches {
    pub rows: Vec<Suggestion>,
    /// More rows existed than `max_entries` allowed.
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub name: String,
    pub ratio: Option<f64>,
}

pub fn similarity(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    // counted here, since similar's ratio() is f32
    let matches: usize = TextDiff::from_chars(a, b)
        .ops()
        .iter()
        .filter(|op| op.tag() == DiffTag::Equal)
        .map(|op| op.old_range().len())
        .sum();
    2.0 * matches as f64 / total as f64
}

/// Equal, or equal once one of `suffixes` is appended to either side.
pub fn is_same(x: &str, y: &str, suffixes: &[String]) -> bool {
    x == y
        || suffixes.iter().any(|s| {
            x.strip_suffix(s.as_str()) == Some(y) || y.strip_suffix(s.as_str()) == Some(x)
        })
}

/// Names in `xs` with no counterpart in `ys`, in `xs` order.
pub fn difference(xs: &[String], ys: &[String], suffixes: &[String]) -> Vec<String> {
    xs.iter()
        .filter(|x| !ys.iter().any(|y| is_same(x, y, suffixes)))
        .cloned()
        .collect()
}

/// Highest-ratio name in `pool`; the first one wins ties.
pub fn find_best_match(name: &str, pool: &[String]) -> Option<(String, f64)> {
    let mut best: Option<(&String, f64)> = None;
    for candidate in pool {
        let ratio = similarity(name, candidate);
        match best {
            Some((_, r)) if ratio <= r => {}
            _ => best = Some((candidate, ratio)),
        }
    }
    best.map(|(n, r)| (n.clone(), r))
}

fn by_ratio_desc(x: Option<f64>, y: Option<f64>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (x, y) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Compute the row table for one logical table.
pub fn build_rows(a: &[String], b: &[String], settings: &MatchSettings) -> Matches {
    let suffixes = &settings.ignore_suffix;
    let diff_a = if settings.b_only {
        Vec::new()
    } else {
        difference(a, b, suffixes)
    };
    let diff_b = if settings.a_only {
        Vec::new()
    } else {
        difference(b, a, suffixes)
    };

    let accept = |name: &str, pool: &[String]| match find_best_match(name, pool) {
        Some((other, ratio)) if ratio >= settings.similarity_threshold => {
            (Some(other), Some(ratio))
        }
        _ => (None, None),
    };
    let marker = |missing: bool| {
        if missing {
            Marker::Missing
        } else {
            Marker::Present
        }
    };

    let mut rows: Vec<Suggestion> = Vec::new();
    let mut push = |row: Suggestion| {
        match rows.iter_mut().find(|r| r.a == row.a && r.b == row.b) {
            Some(existing) => {
                if row.a_marker == Marker::Missing {
                    existing.a_marker = Marker::Missing;
                }
                if row.b_marker == Marker::Missing {
                    existing.b_marker = Marker::Missing;
                }
            }
            None => rows.push(row),
        }
    };

    for name in &diff_a {
        let (other, ratio) = accept(name, b);
        let b_marker = marker(other.as_ref().is_some_and(|o| diff_b.contains(o)));
        push(Suggestion {
            a: Some(name.clone()),
            b: other,
            ratio,
            a_marker: Marker::Missing,
            b_marker,
        });
    }
    for name in &diff_b {
        let (other, ratio) = accept(name, a);
        let a_marker = marker(other.as_ref().is_some_and(|o| diff_a.contains(o)));
        push(Suggestion {
            a: other,
            b: Some(name.clone()),
            ratio,
            a_marker,
            b_marker: Marker::Missing,
        });
    }

    rows.sort_by(|x, y| by_ratio_desc(x.ratio, y.ratio));

    let truncated = match settings.max_entries {
        Some(max) if rows.len() > max => {
            rows.truncate(max);
            true
        }
        _ => false,
    };
    tracing::debug!(
        diff_a = diff_a.len(),
        diff_b = diff_b.len(),
        rows = rows.len(),
        truncated,
        "rows built"
    );
    Matches { rows, truncated }
}

/// Every name in `names` ranked against `target`. No threshold applies; without
/// a target the names come back unranked in their original order.
pub fn find_candidates(names: &[String], target: Option<&str>) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = names
        .iter()
        .map(|name| Candidate {
            name: name.clone(),
            ratio: target.map(|t| similarity(name, t)),
        })
        .collect();
    candidates.sort_by(|x, y| by_ratio_desc(x.ratio, y.ratio));
    candidates
}

/// Case-insensitive substring filter over candidate names.
pub fn filter_candidates(candidates: &[Candidate], query: &str) -> Vec<Candidate> {
    let query = query.to_lowercase();
    candidates
        .iter()
        .filter(|c| c.name.to_lowercase().contains(&query))
        .cloned()
        .collect()
}

/// Both names with the segments that differ drawn in the highlight color.
pub fn colorize_diff(a: &str, b: &str) -> (Text, Text) {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let segment = |chars: &[char], range: std::ops::Range<usize>, color: ColorId| {
        Span::new(color, chars[range].iter().collect::<String>())
    };

    let diff = TextDiff::from_chars(a, b);
    let mut a_spans = Vec::new();
    let mut b_spans = Vec::new();
    for op in diff.ops() {
        let (tag, old, new) = op.as_tag_tuple();
        match tag {
            DiffTag::Equal => {
                a_spans.push(segment(&a_chars, old, ColorId::Normal));
                b_spans.push(segment(&b_chars, new, ColorId::Normal));
            }
            DiffTag::Delete => a_spans.push(segment(&a_chars, old, ColorId::Highlight)),
            DiffTag::Insert => b_spans.push(segment(&b_chars, new, ColorId::Highlight)),
            DiffTag::Replace => {
                a_spans.push(segment(&a_chars, old, ColorId::Highlight));
                b_spans.push(segment(&b_chars, new, ColorId::Highlight));
            }
        }
    }
    (
        Text::from_lines([Line::from_spans(a_spans)]),
        Text::from_lines([Line::from_spans(b_spans)]),
    )
}
