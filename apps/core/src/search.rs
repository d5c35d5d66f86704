use std::ops::Range;

use crate::model::{Color, HighlightSpan, MatchSet, Term};

struct FoldedText {
    folded: String,
    origin: Vec<usize>,
}

impl FoldedText {
    fn new(text: &str) -> Self {
        let mut folded = String::with_capacity(text.len());
        let mut origin = Vec::with_capacity(text.len());
        let mut buffer = [0_u8; 4];

        for (start, c) in text.char_indices() {
            for lower in c.to_lowercase() {
                let encoded = lower.encode_utf8(&mut buffer);
                folded.push_str(encoded);
                origin.extend(std::iter::repeat(start).take(encoded.len()));
            }
        }

        Self { folded, origin }
    }
}

pub fn find_matches(text: &str, needle: &str) -> Vec<Range<usize>> {
    if needle.is_empty() || text.is_empty() {
        return Vec::new();
    }

    let folded = FoldedText::new(text);
    let mut ranges: Vec<Range<usize>> = Vec::new();
    let mut next_start = 0;

    while let Some(offset) = folded.folded[next_start..].find(needle) {
        let folded_start = next_start + offset;
        let folded_end = folded_start + needle.len();
        next_start = folded_end;

        // A match that starts or ends inside a character's lowercase
        // expansion is widened to the whole source character.
        let start = folded.origin[folded_start];
        let last_char = folded.origin[folded_end - 1];
        let end = last_char + char_len_at(text, last_char);

        let overlaps = ranges.last().is_some_and(|previous| start < previous.end);
        if !overlaps {
            ranges.push(start..end);
        }
    }

    ranges
}

pub fn scan_text(text: &str, term: &Term, color: Color) -> MatchSet {
    find_matches(text, term.folded())
        .into_iter()
        .map(|origin| HighlightSpan {
            matched_text: text[origin.clone()].to_string(),
            color,
            origin,
        })
        .collect()
}

fn char_len_at(text: &str, index: usize) -> usize {
    text[index..].chars().next().map(char::len_utf8).unwrap_or(0)
}
