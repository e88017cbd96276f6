//! Capability adapters for embedded languages.
//!
//! Each embedded language is served by one [`LanguageAdapter`]. Every method
//! has a no-op default, so an adapter only implements what its engine
//! supports. All positions and ranges crossing this boundary are local to
//! the [`EmbeddedDocument`]; the router owns host translation.

mod metadata;
mod style;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{
    CodeAction, CodeActionContext, Color, ColorInformation, ColorPresentation, CompletionList,
    Diagnostic, DocumentHighlight, DocumentSymbol, FileChangeType, FormattingOptions, Hover,
    Location, Position, Range, SignatureHelp, TextEdit, Url,
};

use crate::document::{EmbeddedDocument, DEFAULT_STYLE_LANGUAGE, STYLE_PREPROCESSORS};
use crate::error::AdapterResult;
use crate::lsp::AbsoluteToken;

pub use metadata::MetadataAdapter;
pub use style::StyleAdapter;

/// Uniform capability surface of one embedded language engine.
#[tower_lsp::async_trait]
pub trait LanguageAdapter: Send + Sync {
    /// Language id this adapter serves.
    fn id(&self) -> &str;

    async fn complete(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _position: Position,
    ) -> AdapterResult<Option<CompletionList>> {
        Ok(None)
    }

    async fn hover(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _position: Position,
    ) -> AdapterResult<Option<Hover>> {
        Ok(None)
    }

    async fn signature_help(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _position: Position,
    ) -> AdapterResult<Option<SignatureHelp>> {
        Ok(None)
    }

    /// Definitions of the symbol at `position`. Locations in the embedded
    /// document itself use its uri and local ranges.
    async fn definition(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _position: Position,
    ) -> AdapterResult<Vec<Location>> {
        Ok(Vec::new())
    }

    async fn references(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _position: Position,
    ) -> AdapterResult<Vec<Location>> {
        Ok(Vec::new())
    }

    async fn document_highlight(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _position: Position,
    ) -> AdapterResult<Vec<DocumentHighlight>> {
        Ok(Vec::new())
    }

    async fn code_actions(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _range: Range,
        _context: &CodeActionContext,
    ) -> AdapterResult<Vec<CodeAction>> {
        Ok(Vec::new())
    }

    async fn resolve_code_action(
        &self,
        _doc: &EmbeddedDocument<'_>,
        action: CodeAction,
    ) -> AdapterResult<CodeAction> {
        Ok(action)
    }

    async fn validate(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<Diagnostic>> {
        Ok(Vec::new())
    }

    async fn document_symbols(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<DocumentSymbol>> {
        Ok(Vec::new())
    }

    async fn format(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _options: &FormattingOptions,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<TextEdit>> {
        Ok(Vec::new())
    }

    async fn semantic_tokens(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<AbsoluteToken>> {
        Ok(Vec::new())
    }

    async fn document_colors(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<ColorInformation>> {
        Ok(Vec::new())
    }

    async fn color_presentations(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _color: Color,
        _range: Range,
    ) -> AdapterResult<Vec<ColorPresentation>> {
        Ok(Vec::new())
    }

    /// A document was closed; evict anything cached for it.
    fn document_removed(&self, _uri: &Url) {}

    /// A file outside the open set changed; `revision` increases per file.
    fn external_file_changed(&self, _uri: &Url, _kind: FileChangeType, _revision: u64) {}
}

/// Adapters keyed by the language id they serve.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn LanguageAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in style and metadata adapters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(StyleAdapter::new(DEFAULT_STYLE_LANGUAGE)));
        for language in STYLE_PREPROCESSORS {
            registry.register(Arc::new(StyleAdapter::new(*language)));
        }
        registry.register(Arc::new(MetadataAdapter::new()));
        registry
    }

    /// Register an adapter under its id, returning any adapter it replaces.
    pub fn register(
        &mut self,
        adapter: Arc<dyn LanguageAdapter>,
    ) -> Option<Arc<dyn LanguageAdapter>> {
        self.adapters.insert(adapter.id().to_string(), adapter)
    }

    pub fn get(&self, language_id: &str) -> Option<Arc<dyn LanguageAdapter>> {
        self.adapters.get(language_id).cloned()
    }

    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn LanguageAdapter>> {
        self.adapters.values()
    }
}

impl fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<_> = self.adapters.keys().collect();
        ids.sort();
        f.debug_struct("AdapterRegistry").field("languages", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl LanguageAdapter for Named {
        fn id(&self) -> &str {
            self.0
        }
    }

    #[test]
    fn builtins_cover_styles_and_metadata() {
        let registry = AdapterRegistry::with_builtins();
        for id in ["css", "scss", "sass", "less", "postcss", "stylus", "yml"] {
            assert!(registry.get(id).is_some(), "{id}");
        }
        assert!(registry.get("ts").is_none());
    }

    #[test]
    fn register_replaces_same_id() {
        let mut registry = AdapterRegistry::new();
        assert!(registry.register(Arc::new(Named("ts"))).is_none());
        assert!(registry.register(Arc::new(Named("ts"))).is_some());
        assert_eq!(registry.adapters().count(), 1);
    }
}
