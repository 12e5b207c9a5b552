//! Case-insensitive keyword lookup over page texts.
//!
//! Only the first occurrence on each page is reported, with a window of
//! [`LOOKBACK_CHARS`] characters before it and [`LOOKAHEAD_CHARS`] after it.
//! Offsets are counted in `char`s so a window never splits a code point.

use crate::extractor::PageText;
use crate::models::Match;

pub const LOOKBACK_CHARS: usize = 40;
pub const LOOKAHEAD_CHARS: usize = 60;

/// Trimmed, case-folded keyword. Empty when the keyword is blank.
pub fn normalize_keyword(keyword: &str) -> Vec<char> {
    keyword.trim().chars().map(fold_char).collect()
}

/// Returns at most one match per page, sorted by ascending page number.
pub fn find_matches(keyword: &str, pages: &[PageText]) -> Vec<Match> {
    let needle = normalize_keyword(keyword);
    if needle.is_empty() {
        return Vec::new();
    }

    let mut matches = pages
        .iter()
        .filter_map(|page| match_page(&needle, page))
        .collect::<Vec<_>>();

    matches.sort_by_key(|found| found.page);
    matches.dedup_by_key(|found| found.page);
    matches
}

fn match_page(needle: &[char], page: &PageText) -> Option<Match> {
    let chars = page.text.chars().collect::<Vec<_>>();
    let folded = chars.iter().copied().map(fold_char).collect::<Vec<_>>();
    let start = first_occurrence(&folded, needle)?;

    Some(Match {
        page: page.number,
        snippet: snippet_around(&chars, start, needle.len()),
    })
}

fn first_occurrence(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

fn snippet_around(chars: &[char], start: usize, keyword_len: usize) -> String {
    let from = start.saturating_sub(LOOKBACK_CHARS);
    let to = start
        .saturating_add(keyword_len)
        .saturating_add(LOOKAHEAD_CHARS)
        .min(chars.len());

    chars[from..to]
        .iter()
        .map(|&c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

// Single-char lowercase mapping keeps folded and source offsets aligned.
fn fold_char(c: char) -> char {
    let mut lowered = c.to_lowercase();
    match (lowered.next(), lowered.next()) {
        (Some(single), None) => single,
        _ => c,
    }
}
