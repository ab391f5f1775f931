//! Headword normalization.
//!
//! Two forms per headword: the display form (what is persisted) and the
//! merge key (what the assembler indexes by; never written to disk).

use unicode_normalization::UnicodeNormalization;

use crate::translit::cyr_to_lat;

/// Display form: NFC, outer whitespace stripped, internal whitespace
/// collapsed to single spaces; transliterated when `serbian` is set.
pub fn display(word: &str, serbian: bool) -> String {
    let nfc: String = word.nfc().collect();
    let collapsed = collapse_whitespace(&nfc);
    if serbian { cyr_to_lat(&collapsed) } else { collapsed }
}

/// Merge key: lowercased display form with everything outside
/// `[0-9a-z]`, the Serbian Latin diacritics, spaces, and hyphens removed.
///
/// An empty key rejects the entry.
pub fn key(word: &str, serbian: bool) -> String {
    let lowered = display(word, serbian).to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| {
            c.is_ascii_digit()
                || c.is_ascii_lowercase()
                || matches!(c, 'š' | 'đ' | 'č' | 'ć' | 'ž' | ' ' | '-')
        })
        .collect();
    collapse_whitespace(&kept)
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_gap = true; // leading whitespace is dropped
    for c in text.chars() {
        if c.is_whitespace() {
            if !in_gap {
                out.push(' ');
                in_gap = true;
            }
        } else {
            out.push(c);
            in_gap = false;
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}
