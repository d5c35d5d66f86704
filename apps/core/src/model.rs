use std::fmt::{Display, Formatter};
use std::ops::Range;

use serde::Serialize;

pub const PALETTE: [Color; 8] = [
    Color("#ffeb3b"),
    Color("#ff9800"),
    Color("#e91e63"),
    Color("#9c27b0"),
    Color("#2196f3"),
    Color("#00bcd4"),
    Color("#4caf50"),
    Color("#8bc34a"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Color(&'static str);

impl Color {
    pub fn hex(&self) -> &'static str {
        self.0
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

pub fn color_for_index(index: usize) -> Color {
    PALETTE[index % PALETTE.len()]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    text: String,
    folded: String,
}

impl Term {
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        Some(Self {
            text: trimmed.to_string(),
            folded: fold_case(trimmed),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn folded(&self) -> &str {
        &self.folded
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermList {
    terms: Vec<Term>,
}

impl TermList {
    pub fn parse(raw: &str) -> Self {
        Self::from_pieces(raw.split(['\n', ',']))
    }

    pub fn from_pieces<I, S>(pieces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            terms: pieces
                .into_iter()
                .filter_map(|piece| Term::new(piece.as_ref()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Term> {
        self.terms.iter()
    }

    pub fn as_strings(&self) -> Vec<String> {
        self.terms.iter().map(|term| term.as_str().to_string()).collect()
    }

    pub fn joined(&self) -> String {
        self.as_strings().join("\n")
    }
}

impl<'a> IntoIterator for &'a TermList {
    type Item = &'a Term;
    type IntoIter = std::slice::Iter<'a, Term>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub matched_text: String,
    pub color: Color,
    pub origin: Range<usize>,
}

pub type MatchSet = Vec<HighlightSpan>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryEntry {
    pub term: String,
    pub color: Color,
    pub matches: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResultsSummary {
    pub entries: Vec<SummaryEntry>,
}

impl ResultsSummary {
    pub fn total_matches(&self) -> usize {
        self.entries.iter().map(|entry| entry.matches).sum()
    }
}

pub fn fold_case(input: &str) -> String {
    input.chars().flat_map(|c| c.to_lowercase()).collect()
}
