//! Semantic token legend, merging and delta encoding.
//!
//! Adapters report tokens with absolute local positions. The router
//! translates them to host positions, merges every language's tokens into
//! one ordered stream and only then delta-encodes it.

use std::ops::Range;

use tower_lsp::lsp_types::{
    Position, SemanticToken, SemanticTokenModifier, SemanticTokenType, SemanticTokensLegend,
};

use crate::document::LineIndex;

/// Token type indices (must match [`legend`] order).
pub mod token_types {
    pub const NAMESPACE: u32 = 0;
    pub const TYPE: u32 = 1;
    pub const CLASS: u32 = 2;
    pub const PROPERTY: u32 = 3;
    pub const VARIABLE: u32 = 4;
    pub const FUNCTION: u32 = 5;
    pub const KEYWORD: u32 = 6;
    pub const STRING: u32 = 7;
    pub const NUMBER: u32 = 8;
    pub const COMMENT: u32 = 9;
    pub const OPERATOR: u32 = 10;
}

/// Token modifier bit flags.
pub mod token_modifiers {
    pub const DECLARATION: u32 = 1 << 0;
    pub const READONLY: u32 = 1 << 1;
    pub const DEFAULT_LIBRARY: u32 = 1 << 2;
}

/// Shared legend every adapter's token types index into.
pub fn legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: vec![
            SemanticTokenType::NAMESPACE,
            SemanticTokenType::TYPE,
            SemanticTokenType::CLASS,
            SemanticTokenType::PROPERTY,
            SemanticTokenType::VARIABLE,
            SemanticTokenType::FUNCTION,
            SemanticTokenType::KEYWORD,
            SemanticTokenType::STRING,
            SemanticTokenType::NUMBER,
            SemanticTokenType::COMMENT,
            SemanticTokenType::OPERATOR,
        ],
        token_modifiers: vec![
            SemanticTokenModifier::DECLARATION,
            SemanticTokenModifier::READONLY,
            SemanticTokenModifier::DEFAULT_LIBRARY,
        ],
    }
}

/// A single-line token at an absolute position, before delta encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsoluteToken {
    pub line: u32,
    pub start: u32,
    pub length: u32,
    pub token_type: u32,
    pub token_modifiers: u32,
}

impl AbsoluteToken {
    /// Token covering a byte span of `line_index`'s text. Spans that are
    /// empty or cross a line break yield `None`.
    pub fn from_span(
        line_index: &LineIndex,
        span: Range<usize>,
        token_type: u32,
        token_modifiers: u32,
    ) -> Option<Self> {
        let start = line_index.offset_to_position(span.start);
        let end = line_index.offset_to_position(span.end);
        (span.start < span.end && start.line == end.line).then(|| Self {
            line: start.line,
            start: start.character,
            length: end.character - start.character,
            token_type,
            token_modifiers,
        })
    }

    pub fn position(&self) -> Position {
        Position::new(self.line, self.start)
    }

    pub fn at(self, position: Position) -> Self {
        Self {
            line: position.line,
            start: position.character,
            ..self
        }
    }
}

/// Order tokens by `(line, start)` and drop duplicates at one position, so
/// the stream is strictly increasing.
pub fn merge(mut tokens: Vec<AbsoluteToken>) -> Vec<AbsoluteToken> {
    tokens.sort_by_key(|t| (t.line, t.start));
    tokens.dedup_by_key(|t| (t.line, t.start));
    tokens
}

/// Delta-encode an ordered token stream.
pub fn encode(tokens: &[AbsoluteToken]) -> Vec<SemanticToken> {
    let mut result = Vec::with_capacity(tokens.len());
    let mut prev_line = 0u32;
    let mut prev_start = 0u32;

    for token in tokens {
        let delta_line = token.line - prev_line;
        let delta_start = if delta_line == 0 {
            token.start - prev_start
        } else {
            token.start
        };

        result.push(SemanticToken {
            delta_line,
            delta_start,
            length: token.length,
            token_type: token.token_type,
            token_modifiers_bitset: token.token_modifiers,
        });

        prev_line = token.line;
        prev_start = token.start;
    }

    result
}
