//! Half-open character intervals.
//!
//! A [`TextRange`] indexes text by Unicode scalar value (`char`), not by
//! byte. Use [`TextRange::slice`] to cut a `&str` with it; that method does
//! the char-to-byte translation and never splits a UTF-8 sequence.
//!
//! Overlap is strict: `a.start < b.end && b.start < a.end`. A point range
//! (`start == end`) therefore overlaps nothing, not even itself.

use serde::{Deserialize, Serialize};

use crate::error::{ReviewError, Result};

/// A half-open interval `[start, end)` over a text buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawRange")]
pub struct TextRange {
    start: usize,
    end: usize,
}

#[derive(Deserialize)]
struct RawRange {
    start: usize,
    end: usize,
}

impl TryFrom<RawRange> for TextRange {
    type Error = ReviewError;

    fn try_from(raw: RawRange) -> Result<Self> {
        TextRange::new(raw.start, raw.end)
    }
}

impl TextRange {
    /// Build a range, rejecting `start > end`.
    pub fn new(start: usize, end: usize) -> Result<Self> {
        if start > end {
            return Err(ReviewError::InvalidRange { start, end });
        }
        Ok(Self { start, end })
    }

    /// The range `[start, start + len)`.
    pub fn with_len(start: usize, len: usize) -> Self {
        Self {
            start,
            end: start + len,
        }
    }

    /// A zero-width range at `at`.
    pub fn point(at: usize) -> Self {
        Self { start: at, end: at }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Alias of [`is_empty`](Self::is_empty) that reads better for annotations.
    pub fn is_point(&self) -> bool {
        self.is_empty()
    }

    pub fn overlaps(&self, other: &TextRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains_range(&self, other: &TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Whether the character at `offset` lies inside the range.
    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Shift both ends right by `delta` (local → global translation).
    pub fn offset_by(&self, delta: usize) -> TextRange {
        TextRange {
            start: self.start + delta,
            end: self.end + delta,
        }
    }

    /// Shift both ends left by `delta` (global → local translation).
    ///
    /// Returns `None` when the range starts before `delta`.
    pub fn relative_to(&self, delta: usize) -> Option<TextRange> {
        Some(TextRange {
            start: self.start.checked_sub(delta)?,
            end: self.end.checked_sub(delta)?,
        })
    }

    /// Clamp both ends to `len`.
    pub fn clamp_to(&self, len: usize) -> TextRange {
        TextRange {
            start: self.start.min(len),
            end: self.end.min(len),
        }
    }

    /// Slice `text` by character offsets. Ends past the text are clamped.
    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        let from = byte_offset(text, self.start);
        let to = byte_offset(text, self.end);
        &text[from..to]
    }
}

/// Byte index of the `char_offset`-th character, or `text.len()` past the end.
pub(crate) fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// Length of `text` in characters.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
