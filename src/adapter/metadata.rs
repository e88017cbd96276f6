//! Built-in adapter for the YAML metadata block.

use std::sync::LazyLock;

use regex::Regex;
use serde_yaml::Value;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity, DocumentSymbol, SymbolKind};

use crate::document::{EmbeddedDocument, METADATA_LANGUAGE};
use crate::error::AdapterResult;
use crate::lsp::semantic_tokens::{token_types, token_modifiers, AbsoluteToken};

use super::LanguageAdapter;

static TOP_LEVEL_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([A-Za-z_][\w-]*)[ \t]*:(?:[ \t]|$)").expect("invalid metadata key pattern")
});

/// Adapter for the front-matter block: syntax checks, key outline and key
/// highlighting.
#[derive(Debug, Clone, Default)]
pub struct MetadataAdapter;

impl MetadataAdapter {
    pub fn new() -> Self {
        Self
    }
}

/// Byte spans of every top-level mapping key, in order.
fn top_level_keys(text: &str) -> impl Iterator<Item = std::ops::Range<usize>> + '_ {
    TOP_LEVEL_KEY
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).map(|key| key.range()))
}

#[tower_lsp::async_trait]
impl LanguageAdapter for MetadataAdapter {
    fn id(&self) -> &str {
        METADATA_LANGUAGE
    }

    async fn validate(
        &self,
        doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<Diagnostic>> {
        let index = doc.line_index();
        let diagnostic = match serde_yaml::from_str::<Value>(doc.text()) {
            Ok(Value::Mapping(_) | Value::Null) => return Ok(Vec::new()),
            Ok(_) => Diagnostic {
                range: index.span_to_range(&(0..doc.text().len())),
                severity: Some(DiagnosticSeverity::WARNING),
                source: Some(METADATA_LANGUAGE.to_string()),
                message: "metadata should be a mapping of keys to values".to_string(),
                ..Default::default()
            },
            Err(err) => {
                let offset = err.location().map_or(0, |l| l.index());
                let position = index.offset_to_position(offset);
                Diagnostic {
                    range: tower_lsp::lsp_types::Range::new(position, position),
                    severity: Some(DiagnosticSeverity::ERROR),
                    source: Some(METADATA_LANGUAGE.to_string()),
                    message: err.to_string(),
                    ..Default::default()
                }
            }
        };
        Ok(vec![diagnostic])
    }

    async fn document_symbols(
        &self,
        doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<DocumentSymbol>> {
        let index = doc.line_index();
        let text = doc.text();
        let symbols = top_level_keys(text)
            .map(|span| {
                let line_end = text[span.end..].find('\n').map_or(text.len(), |p| span.end + p);
                #[allow(deprecated)]
                DocumentSymbol {
                    name: text[span.clone()].to_string(),
                    detail: None,
                    kind: SymbolKind::KEY,
                    tags: None,
                    deprecated: None,
                    range: index.span_to_range(&(span.start..line_end)),
                    selection_range: index.span_to_range(&span),
                    children: None,
                }
            })
            .collect();
        Ok(symbols)
    }

    async fn semantic_tokens(
        &self,
        doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<AbsoluteToken>> {
        let index = doc.line_index();
        Ok(top_level_keys(doc.text())
            .filter_map(|span| {
                AbsoluteToken::from_span(
                    index,
                    span,
                    token_types::PROPERTY,
                    token_modifiers::DECLARATION,
                )
            })
            .collect())
    }
}
