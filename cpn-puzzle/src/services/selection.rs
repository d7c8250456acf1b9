//! Parsing a model's choice from a candidate list

use super::schema::extract_json_object;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

static BARE_INTEGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d+)\b").expect("bare integer pattern is valid"));

/// How the index was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    /// `{"selected_index": N}` object
    Structured,
    /// First bare integer in free text
    BareInteger,
    /// Nothing usable; index 0
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub index: usize,
    pub kind: SelectionKind,
}

impl Selection {
    /// True when the model actually named an in-range candidate
    pub fn is_parsed(&self) -> bool {
        self.kind != SelectionKind::Default
    }
}

#[derive(Deserialize)]
struct SelectedIndex {
    selected_index: i64,
}

/// Pick a candidate index out of model output.
///
/// Tries the structured object first, then the first bare integer, then
/// falls back to index 0. Out-of-range values never win.
pub fn parse_selection(output: &str, candidate_count: usize) -> Selection {
    let in_range = |n: i64| usize::try_from(n).ok().filter(|&i| i < candidate_count);
    let content = output.trim();

    if let Some(index) = extract_json_object(content)
        .and_then(|payload| serde_json::from_str::<SelectedIndex>(payload).ok())
        .and_then(|sel| in_range(sel.selected_index))
    {
        return Selection {
            index,
            kind: SelectionKind::Structured,
        };
    }

    if let Some(index) = BARE_INTEGER
        .captures(content)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<i64>().ok())
        .and_then(in_range)
    {
        return Selection {
            index,
            kind: SelectionKind::BareInteger,
        };
    }

    Selection {
        index: 0,
        kind: SelectionKind::Default,
    }
}
