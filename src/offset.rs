//! Byte/character offset handling.
//!
//! # Why character offsets
//!
//! Every span in masque is addressed in **characters** (Unicode scalar
//! values), not bytes. Detectors disagree about boundaries, and the
//! consensus rule compares overlap *lengths*. In bytes, a kanji counts three
//! times as much as an ASCII digit and "50% of the smaller span" would mean
//! something different for `田中太郎` and `Tanaka`.
//!
//! ```text
//! Text: "電話: 090"
//!
//!   BYTE  電[0-2] 話[3-5] :[6] ' '[7] 0[8] 9[9] 0[10]
//!   CHAR  電[0]   話[1]   :[2] ' '[3] 0[4] 9[5] 0[6]
//! ```
//!
//! `regex` reports byte offsets, so matches are converted exactly once, at the
//! boundary, through a [`SpanConverter`]. The anonymizer converts back when
//! it finally rewrites the string.

use std::ops::Range;

/// Build a table where `map[byte_idx]` gives the character index.
///
/// Bytes inside a multi-byte character map to that character.
#[must_use]
pub fn build_byte_to_char_map(text: &str) -> Vec<usize> {
    let mut map = vec![0usize; text.len() + 1];

    for (char_idx, (byte_idx, ch)) in text.char_indices().enumerate() {
        for slot in map.iter_mut().skip(byte_idx).take(ch.len_utf8()) {
            *slot = char_idx;
        }
    }
    map[text.len()] = text.chars().count();

    map
}

/// Build a table where `map[char_idx]` gives the byte index.
#[must_use]
pub fn build_char_to_byte_map(text: &str) -> Vec<usize> {
    let mut map: Vec<usize> = text.char_indices().map(|(byte_idx, _)| byte_idx).collect();
    map.push(text.len());
    map
}

/// Number of characters in `text`.
#[must_use]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Slice `text` by a character range, clamping out-of-range ends.
#[must_use]
pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let converter = SpanConverter::new(text);
    converter.slice(text, start..end)
}

/// Converter for many spans over the same text.
///
/// Pre-computes mapping tables so each conversion is O(1). ASCII text skips
/// the tables entirely since both coordinate systems coincide.
#[derive(Debug, Clone)]
pub struct SpanConverter {
    byte_to_char: Vec<usize>,
    char_to_byte: Vec<usize>,
    is_ascii: bool,
    byte_len: usize,
}

impl SpanConverter {
    /// Create a converter for the given text.
    #[must_use]
    pub fn new(text: &str) -> Self {
        if text.is_ascii() {
            Self {
                byte_to_char: Vec::new(),
                char_to_byte: Vec::new(),
                is_ascii: true,
                byte_len: text.len(),
            }
        } else {
            Self {
                byte_to_char: build_byte_to_char_map(text),
                char_to_byte: build_char_to_byte_map(text),
                is_ascii: false,
                byte_len: text.len(),
            }
        }
    }

    /// Convert a byte offset to a char offset (clamped to the text end).
    #[must_use]
    pub fn byte_to_char(&self, byte_idx: usize) -> usize {
        if self.is_ascii {
            byte_idx.min(self.byte_len)
        } else {
            self.byte_to_char
                .get(byte_idx)
                .copied()
                .unwrap_or_else(|| self.char_count())
        }
    }

    /// Convert a char offset to a byte offset (clamped to the text end).
    #[must_use]
    pub fn char_to_byte(&self, char_idx: usize) -> usize {
        if self.is_ascii {
            char_idx.min(self.byte_len)
        } else {
            self.char_to_byte
                .get(char_idx)
                .copied()
                .unwrap_or(self.byte_len)
        }
    }

    /// Convert a byte range (e.g. a regex match) to a char range.
    #[must_use]
    pub fn to_chars(&self, bytes: Range<usize>) -> Range<usize> {
        self.byte_to_char(bytes.start)..self.byte_to_char(bytes.end)
    }

    /// Convert a char range to a byte range.
    #[must_use]
    pub fn to_bytes(&self, chars: Range<usize>) -> Range<usize> {
        self.char_to_byte(chars.start)..self.char_to_byte(chars.end)
    }

    /// Slice `text` (the same text this converter was built from) by chars.
    #[must_use]
    pub fn slice<'a>(&self, text: &'a str, chars: Range<usize>) -> &'a str {
        let bytes = self.to_bytes(chars);
        if bytes.start >= bytes.end {
            return "";
        }
        &text[bytes]
    }

    /// Total number of characters.
    #[must_use]
    pub fn char_count(&self) -> usize {
        if self.is_ascii {
            self.byte_len
        } else {
            self.char_to_byte.len().saturating_sub(1)
        }
    }

    /// Find `needle` at or after char offset `from`, returning a char offset.
    #[must_use]
    pub fn find_from(&self, text: &str, needle: &str, from: usize) -> Option<usize> {
        let byte_from = self.char_to_byte(from);
        text[byte_from..]
            .find(needle)
            .map(|rel| self.byte_to_char(byte_from + rel))
    }

    /// Check if this text is ASCII.
    #[must_use]
    pub const fn is_ascii(&self) -> bool {
        self.is_ascii
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_identity() {
        let conv = SpanConverter::new("Hello World");
        assert!(conv.is_ascii());
        assert_eq!(conv.to_chars(0..5), 0..5);
        assert_eq!(conv.char_count(), 11);
    }

    #[test]
    fn test_japanese_conversion() {
        let text = "電話: 090";
        let conv = SpanConverter::new(text);
        let byte_start = text.find("090").unwrap();
        assert_eq!(conv.to_chars(byte_start..text.len()), 4..7);
        assert_eq!(conv.slice(text, 0..2), "電話");
        assert_eq!(conv.char_count(), 7);
    }

    #[test]
    fn test_find_from_skips_earlier_occurrences() {
        let text = "学歴\n学歴";
        let conv = SpanConverter::new(text);
        assert_eq!(conv.find_from(text, "学歴", 0), Some(0));
        assert_eq!(conv.find_from(text, "学歴", 2), Some(3));
        assert_eq!(conv.find_from(text, "学歴", 4), None);
    }

    #[test]
    fn test_out_of_range_clamps() {
        let text = "東京";
        let conv = SpanConverter::new(text);
        assert_eq!(conv.char_to_byte(10), text.len());
        assert_eq!(conv.slice(text, 1..10), "京");
        assert_eq!(char_slice(text, 5, 9), "");
    }

    #[test]
    fn test_maps_cover_every_byte() {
        let text = "a東b";
        let map = build_byte_to_char_map(text);
        assert_eq!(map, vec![0, 1, 1, 1, 2, 3]);
        assert_eq!(build_char_to_byte_map(text), vec![0, 1, 4, 5]);
        assert_eq!(char_len(text), 3);
    }
}
