//! Line index and text edit helpers.
//!
//! Offsets throughout the crate are UTF-8 byte offsets into the host text.
//! Protocol positions count `character` in UTF-16 code units; this module is
//! the single place that converts between the two.

use std::ops::Range as Span;

use tower_lsp::lsp_types::{Position, Range, TextDocumentContentChangeEvent};

/// Pre-computed line starts for position lookups over one text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset where each line starts.
    line_starts: Vec<usize>,
    source: String,
}

impl LineIndex {
    pub fn new(source: String) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();

        Self {
            line_starts,
            source,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Convert a byte offset to a protocol position.
    ///
    /// Offsets past the end of the text clamp to the final position.
    pub fn offset_to_position(&self, offset: usize) -> Position {
        let offset = offset.min(self.source.len());
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(line) => line.saturating_sub(1),
        };

        let line_start = self.line_starts[line];
        let col: usize = self.source[line_start..]
            .char_indices()
            .take_while(|(i, _)| line_start + i < offset)
            .map(|(_, c)| c.len_utf16())
            .sum();

        Position::new(line as u32, col as u32)
    }

    /// Convert a protocol position to a byte offset.
    ///
    /// Returns `None` when the line does not exist. A character past the end
    /// of its line resolves to the end of that line.
    pub fn position_to_offset(&self, position: Position) -> Option<usize> {
        let line = position.line as usize;
        let line_start = *self.line_starts.get(line)?;
        let line_end = self
            .line_starts
            .get(line + 1)
            .map(|&next| next - 1)
            .unwrap_or(self.source.len());

        let mut utf16_col = 0u32;
        for (i, c) in self.source[line_start..line_end].char_indices() {
            if utf16_col >= position.character {
                return Some(line_start + i);
            }
            utf16_col += c.len_utf16() as u32;
        }

        Some(line_end)
    }

    /// Like [`position_to_offset`](Self::position_to_offset) but clamps
    /// positions beyond the last line to the end of the text.
    pub fn position_to_offset_clamped(&self, position: Position) -> usize {
        self.position_to_offset(position)
            .unwrap_or(self.source.len())
    }

    pub fn span_to_range(&self, span: &Span<usize>) -> Range {
        Range::new(
            self.offset_to_position(span.start),
            self.offset_to_position(span.end),
        )
    }

    pub fn range_to_span(&self, range: Range) -> Span<usize> {
        let start = self.position_to_offset_clamped(range.start);
        let end = self.position_to_offset_clamped(range.end);
        start.min(end)..end.max(start)
    }
}

/// Apply protocol content changes, in order, to `text`.
///
/// A change without a range replaces the whole text; a ranged change is
/// spliced in at offsets computed against the text produced by the previous
/// change.
pub fn apply_changes(text: &str, changes: Vec<TextDocumentContentChangeEvent>) -> String {
    let mut current = text.to_string();
    for change in changes {
        match change.range {
            None => current = change.text,
            Some(range) => {
                let span = LineIndex::new(current.clone()).range_to_span(range);
                current.replace_range(span, &change.text);
            }
        }
    }
    current
}
