//! Request routing between the host document and embedded-language adapters.
//!
//! Single-position requests go to the adapter of the region under the
//! cursor. Whole-document requests fan out to every language present and
//! fan the translated results back in. Adapter failures never escape: they
//! are logged and the failing language contributes nothing.

use std::cell::Cell;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{
    CodeAction, CodeActionContext, Color, ColorInformation, ColorPresentation, CompletionItem,
    CompletionList, CompletionTextEdit, Diagnostic, DocumentChangeOperation, DocumentChanges,
    DocumentHighlight, DocumentSymbol, FormattingOptions, Hover, Location, OneOf, Position, Range,
    SemanticTokens, SignatureHelp, TextDocumentEdit, TextEdit, Url, WorkspaceEdit,
};

use crate::adapter::{AdapterRegistry, LanguageAdapter};
use crate::document::{DocumentEvent, DocumentStore, EmbeddedDocument, Region, VirtualDocument};
use crate::error::{Error, Result};

use super::semantic_tokens::{self, AbsoluteToken};
use super::snippets;

/// Dispatches requests to language adapters and translates coordinates.
#[derive(Debug)]
pub struct Router {
    documents: Arc<DocumentStore>,
    adapters: AdapterRegistry,
}

impl Router {
    pub fn new(documents: Arc<DocumentStore>, adapters: AdapterRegistry) -> Self {
        Self {
            documents,
            adapters,
        }
    }

    pub fn documents(&self) -> &Arc<DocumentStore> {
        &self.documents
    }

    pub fn adapters(&self) -> &AdapterRegistry {
        &self.adapters
    }

    /// The region under a host position, or `None` when the position is in
    /// host markup.
    pub fn resolve_active_region(&self, uri: &Url, position: Position) -> Result<Option<Region>> {
        let doc = self.documents.require(uri)?;
        Ok(region_at(&doc, position))
    }

    /// Snapshot, active region and its adapter for a position request.
    fn active(
        &self,
        uri: &Url,
        position: Position,
    ) -> Result<Option<(Arc<VirtualDocument>, Region, Arc<dyn LanguageAdapter>)>> {
        let doc = self.documents.require(uri)?;
        let Some(region) = region_at(&doc, position) else {
            return Ok(None);
        };
        let Some(adapter) = self.adapters.get(&region.language_id) else {
            log::trace!(
                target: "sfcls::router",
                "no adapter for {} at {:?}",
                region.language_id,
                position
            );
            return Ok(None);
        };
        Ok(Some((doc, region, adapter)))
    }

    pub async fn completion(&self, uri: &Url, position: Position) -> Result<Option<CompletionList>> {
        let doc = self.documents.require(uri)?;
        let Some(region) = region_at(&doc, position) else {
            let options = self.documents.scan_options();
            return Ok(Some(snippets::block_snippets(&doc, &options, position)));
        };
        let Some(adapter) = self.adapters.get(&region.language_id) else {
            return Ok(None);
        };

        let embedded = EmbeddedDocument::for_request(&doc, &region);
        let Some(local) = embedded.to_local(position) else {
            return Ok(None);
        };
        let list = match adapter.complete(&embedded, local).await {
            Ok(list) => list,
            Err(err) => return Ok(isolate("completion", adapter.id(), err)),
        };
        Ok(list.map(|mut list| {
            for item in &mut list.items {
                translate_completion_item(&embedded, item);
            }
            list
        }))
    }

    pub async fn hover(&self, uri: &Url, position: Position) -> Result<Option<Hover>> {
        let Some((doc, region, adapter)) = self.active(uri, position)? else {
            return Ok(None);
        };
        let embedded = EmbeddedDocument::for_request(&doc, &region);
        let Some(local) = embedded.to_local(position) else {
            return Ok(None);
        };
        let hover = match adapter.hover(&embedded, local).await {
            Ok(hover) => hover,
            Err(err) => return Ok(isolate("hover", adapter.id(), err)),
        };
        Ok(hover.map(|mut hover| {
            hover.range = hover.range.map(|r| embedded.range_to_host(r));
            hover
        }))
    }

    pub async fn signature_help(
        &self,
        uri: &Url,
        position: Position,
    ) -> Result<Option<SignatureHelp>> {
        let Some((doc, region, adapter)) = self.active(uri, position)? else {
            return Ok(None);
        };
        let embedded = EmbeddedDocument::for_request(&doc, &region);
        let Some(local) = embedded.to_local(position) else {
            return Ok(None);
        };
        match adapter.signature_help(&embedded, local).await {
            Ok(help) => Ok(help),
            Err(err) => Ok(isolate("signature help", adapter.id(), err)),
        }
    }

    pub async fn goto_definition(&self, uri: &Url, position: Position) -> Result<Vec<Location>> {
        let Some((doc, region, adapter)) = self.active(uri, position)? else {
            return Ok(Vec::new());
        };
        let embedded = EmbeddedDocument::for_request(&doc, &region);
        let Some(local) = embedded.to_local(position) else {
            return Ok(Vec::new());
        };
        let locations = adapter
            .definition(&embedded, local)
            .await
            .unwrap_or_else(|err| isolate("definition", adapter.id(), err));
        Ok(translate_locations(&embedded, locations))
    }

    pub async fn references(&self, uri: &Url, position: Position) -> Result<Vec<Location>> {
        let Some((doc, region, adapter)) = self.active(uri, position)? else {
            return Ok(Vec::new());
        };
        let embedded = EmbeddedDocument::for_request(&doc, &region);
        let Some(local) = embedded.to_local(position) else {
            return Ok(Vec::new());
        };
        let locations = adapter
            .references(&embedded, local)
            .await
            .unwrap_or_else(|err| isolate("references", adapter.id(), err));
        Ok(translate_locations(&embedded, locations))
    }

    pub async fn document_highlight(
        &self,
        uri: &Url,
        position: Position,
    ) -> Result<Vec<DocumentHighlight>> {
        let Some((doc, region, adapter)) = self.active(uri, position)? else {
            return Ok(Vec::new());
        };
        let embedded = EmbeddedDocument::for_request(&doc, &region);
        let Some(local) = embedded.to_local(position) else {
            return Ok(Vec::new());
        };
        let highlights = adapter
            .document_highlight(&embedded, local)
            .await
            .unwrap_or_else(|err| isolate("document highlight", adapter.id(), err));
        Ok(highlights
            .into_iter()
            .map(|mut highlight| {
                highlight.range = embedded.range_to_host(highlight.range);
                highlight
            })
            .collect())
    }

    /// Code actions for a host range. Each action's `data` is wrapped with
    /// the language id and region so [`resolve_code_action`] can reach the
    /// same adapter.
    ///
    /// [`resolve_code_action`]: Self::resolve_code_action
    pub async fn code_actions(
        &self,
        uri: &Url,
        range: Range,
        context: &CodeActionContext,
    ) -> Result<Vec<CodeAction>> {
        let Some((doc, region, adapter)) = self.active(uri, range.start)? else {
            return Ok(Vec::new());
        };
        let embedded = EmbeddedDocument::for_request(&doc, &region);
        let Some(local_range) = embedded.range_to_local(range) else {
            return Ok(Vec::new());
        };

        let mut local_context = context.clone();
        local_context.diagnostics = context
            .diagnostics
            .iter()
            .filter_map(|d| {
                let range = embedded.range_to_local(d.range)?;
                Some(Diagnostic {
                    range,
                    ..d.clone()
                })
            })
            .collect();

        let actions = adapter
            .code_actions(&embedded, local_range, &local_context)
            .await
            .unwrap_or_else(|err| isolate("code actions", adapter.id(), err));

        Ok(actions
            .into_iter()
            .map(|mut action| {
                map_code_action(uri, &mut action, &|r| embedded.range_to_host(r));
                let routing = CodeActionRouting {
                    language_id: region.language_id.clone(),
                    uri: uri.clone(),
                    region_start: region.start,
                    data: action.data.take().unwrap_or(Value::Null),
                };
                action.data = serde_json::to_value(routing).ok();
                action
            })
            .collect())
    }

    /// Resolve a code action produced by [`code_actions`](Self::code_actions).
    /// Actions without routing data are returned unchanged.
    pub async fn resolve_code_action(&self, mut action: CodeAction) -> Result<CodeAction> {
        let Some(routing) = action
            .data
            .clone()
            .and_then(|data| serde_json::from_value::<CodeActionRouting>(data).ok())
        else {
            return Ok(action);
        };
        let doc = self.documents.require(&routing.uri)?;
        let Some(adapter) = self.adapters.get(&routing.language_id) else {
            return Ok(action);
        };
        let Some(region) = doc
            .regions()
            .iter()
            .find(|r| r.language_id == routing.language_id && r.start == routing.region_start)
            .cloned()
        else {
            return Ok(action);
        };

        let embedded = EmbeddedDocument::for_request(&doc, &region);
        let original = action.clone();
        action.data = Some(routing.data);
        // The action left the router in host coordinates.
        let untranslatable = Cell::new(false);
        map_code_action(doc.uri(), &mut action, &|r| {
            embedded.range_to_local(r).unwrap_or_else(|| {
                untranslatable.set(true);
                r
            })
        });
        if untranslatable.get() {
            log::debug!(
                target: "sfcls::router",
                "code action {:?} reaches outside its {} region, left unresolved",
                original.title,
                routing.language_id
            );
            return Ok(original);
        }
        match adapter.resolve_code_action(&embedded, action).await {
            Ok(mut resolved) => {
                map_code_action(doc.uri(), &mut resolved, &|r| embedded.range_to_host(r));
                resolved.data = original.data.clone();
                Ok(resolved)
            }
            Err(err) => {
                log_adapter_error("code action resolve", adapter.id(), &err);
                Ok(original)
            }
        }
    }

    pub async fn color_presentations(
        &self,
        uri: &Url,
        color: Color,
        range: Range,
    ) -> Result<Vec<ColorPresentation>> {
        let Some((doc, region, adapter)) = self.active(uri, range.start)? else {
            return Ok(Vec::new());
        };
        let embedded = EmbeddedDocument::for_request(&doc, &region);
        let Some(local_range) = embedded.range_to_local(range) else {
            return Ok(Vec::new());
        };
        let presentations = adapter
            .color_presentations(&embedded, color, local_range)
            .await
            .unwrap_or_else(|err| isolate("color presentation", adapter.id(), err));
        Ok(presentations
            .into_iter()
            .map(|mut presentation| {
                if let Some(edit) = presentation.text_edit.as_mut() {
                    edit.range = embedded.range_to_host(edit.range);
                }
                if let Some(edits) = presentation.additional_text_edits.as_mut() {
                    translate_text_edits(&embedded, edits);
                }
                presentation
            })
            .collect())
    }

    /// Embedded documents to fan whole-document requests out to: one per
    /// block language with an adapter, in order of first appearance, then
    /// one per attribute-value fragment when `fragments` is set.
    fn units<'d>(
        &self,
        doc: &'d VirtualDocument,
        fragments: bool,
    ) -> Vec<(EmbeddedDocument<'d>, Arc<dyn LanguageAdapter>)> {
        let blocks = doc.block_languages().into_iter().filter_map(|language| {
            let adapter = self.adapters.get(language)?;
            Some((EmbeddedDocument::build(doc, language), adapter))
        });
        let inline = doc
            .regions()
            .iter()
            .filter(move |r| fragments && r.attribute_value)
            .filter_map(|region| {
                let adapter = self.adapters.get(&region.language_id)?;
                Some((EmbeddedDocument::for_region(doc, region), adapter))
            });
        blocks.chain(inline).collect()
    }

    /// Diagnostics from every language in the document, in host coordinates.
    pub async fn diagnostics(
        &self,
        uri: &Url,
        token: &CancellationToken,
    ) -> Result<Vec<Diagnostic>> {
        let doc = self.documents.require(uri)?;
        let mut diagnostics = Vec::new();
        for (embedded, adapter) in self.units(&doc, true) {
            if token.is_cancelled() {
                break;
            }
            match adapter.validate(&embedded, token).await {
                Ok(items) => diagnostics.extend(
                    items
                        .into_iter()
                        .map(|d| translate_diagnostic(&embedded, d)),
                ),
                Err(err) => log_adapter_error("diagnostics", adapter.id(), &err),
            }
        }
        log::debug!(
            target: "sfcls::router",
            "{} diagnostics for {} v{}",
            diagnostics.len(),
            uri,
            doc.version()
        );
        Ok(diagnostics)
    }

    pub async fn document_symbols(
        &self,
        uri: &Url,
        token: &CancellationToken,
    ) -> Result<Vec<DocumentSymbol>> {
        let doc = self.documents.require(uri)?;
        let mut symbols = Vec::new();
        for (embedded, adapter) in self.units(&doc, false) {
            if token.is_cancelled() {
                break;
            }
            match adapter.document_symbols(&embedded, token).await {
                Ok(items) => symbols.extend(
                    items
                        .into_iter()
                        .map(|symbol| translate_symbol(&embedded, symbol)),
                ),
                Err(err) => log_adapter_error("document symbols", adapter.id(), &err),
            }
        }
        symbols.sort_by_key(|s| (s.range.start.line, s.range.start.character));
        Ok(symbols)
    }

    /// Semantic tokens of every language, merged into one ordered stream
    /// and delta-encoded.
    pub async fn semantic_tokens(
        &self,
        uri: &Url,
        token: &CancellationToken,
    ) -> Result<SemanticTokens> {
        let doc = self.documents.require(uri)?;
        let mut tokens: Vec<AbsoluteToken> = Vec::new();
        for (embedded, adapter) in self.units(&doc, true) {
            if token.is_cancelled() {
                break;
            }
            match adapter.semantic_tokens(&embedded, token).await {
                Ok(items) => tokens.extend(
                    items
                        .into_iter()
                        .map(|t| t.at(embedded.to_host(t.position()))),
                ),
                Err(err) => log_adapter_error("semantic tokens", adapter.id(), &err),
            }
        }
        Ok(SemanticTokens {
            result_id: None,
            data: semantic_tokens::encode(&semantic_tokens::merge(tokens)),
        })
    }

    pub async fn document_colors(
        &self,
        uri: &Url,
        token: &CancellationToken,
    ) -> Result<Vec<ColorInformation>> {
        let doc = self.documents.require(uri)?;
        let mut colors = Vec::new();
        for (embedded, adapter) in self.units(&doc, true) {
            if token.is_cancelled() {
                break;
            }
            match adapter.document_colors(&embedded, token).await {
                Ok(items) => colors.extend(items.into_iter().map(|mut color| {
                    color.range = embedded.range_to_host(color.range);
                    color
                })),
                Err(err) => log_adapter_error("document colors", adapter.id(), &err),
            }
        }
        Ok(colors)
    }

    pub async fn formatting(
        &self,
        uri: &Url,
        options: &FormattingOptions,
        token: &CancellationToken,
    ) -> Result<Vec<TextEdit>> {
        let doc = self.documents.require(uri)?;
        let mut edits = Vec::new();
        for (embedded, adapter) in self.units(&doc, false) {
            if token.is_cancelled() {
                break;
            }
            match adapter.format(&embedded, options, token).await {
                Ok(mut items) => {
                    translate_text_edits(&embedded, &mut items);
                    edits.extend(items);
                }
                Err(err) => log_adapter_error("formatting", adapter.id(), &err),
            }
        }
        Ok(edits)
    }

    /// Forward a lifecycle event to every adapter.
    pub fn dispatch_event(&self, event: &DocumentEvent) {
        for adapter in self.adapters.adapters() {
            match event {
                DocumentEvent::Removed { uri } => adapter.document_removed(uri),
                DocumentEvent::ExternalChanged {
                    uri,
                    kind,
                    revision,
                } => adapter.external_file_changed(uri, *kind, *revision),
            }
        }
    }
}

fn region_at(doc: &VirtualDocument, position: Position) -> Option<Region> {
    doc.region_at(doc.offset_at(position)).cloned()
}

fn log_adapter_error(operation: &str, language_id: &str, err: &Error) {
    log::warn!(
        target: "sfcls::router",
        "{} adapter failed during {}: {}",
        language_id,
        operation,
        err
    );
}

/// Log an adapter failure and substitute the empty result.
fn isolate<T: Default>(operation: &str, language_id: &str, err: Error) -> T {
    log_adapter_error(operation, language_id, &err);
    T::default()
}

/// Routing information stored in a code action's `data`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeActionRouting {
    language_id: String,
    uri: Url,
    region_start: usize,
    #[serde(default)]
    data: Value,
}

fn translate_text_edits(embedded: &EmbeddedDocument<'_>, edits: &mut [TextEdit]) {
    for edit in edits {
        edit.range = embedded.range_to_host(edit.range);
    }
}

fn translate_completion_item(embedded: &EmbeddedDocument<'_>, item: &mut CompletionItem) {
    match item.text_edit.as_mut() {
        Some(CompletionTextEdit::Edit(edit)) => edit.range = embedded.range_to_host(edit.range),
        Some(CompletionTextEdit::InsertAndReplace(edit)) => {
            edit.insert = embedded.range_to_host(edit.insert);
            edit.replace = embedded.range_to_host(edit.replace);
        }
        None => {}
    }
    if let Some(edits) = item.additional_text_edits.as_mut() {
        translate_text_edits(embedded, edits);
    }
}

/// Locations in the embedded document move to host coordinates; locations
/// in other files pass through untouched.
fn translate_locations(embedded: &EmbeddedDocument<'_>, locations: Vec<Location>) -> Vec<Location> {
    locations
        .into_iter()
        .map(|mut location| {
            if &location.uri == embedded.uri() {
                location.range = embedded.range_to_host(location.range);
            }
            location
        })
        .collect()
}

fn translate_diagnostic(embedded: &EmbeddedDocument<'_>, diagnostic: Diagnostic) -> Diagnostic {
    map_diagnostic(embedded.uri(), diagnostic, &|r| embedded.range_to_host(r))
}

fn map_diagnostic(uri: &Url, mut diagnostic: Diagnostic, map: &dyn Fn(Range) -> Range) -> Diagnostic {
    diagnostic.range = map(diagnostic.range);
    if let Some(related) = diagnostic.related_information.as_mut() {
        for info in related {
            if &info.location.uri == uri {
                info.location.range = map(info.location.range);
            }
        }
    }
    diagnostic
}

fn translate_symbol(embedded: &EmbeddedDocument<'_>, mut symbol: DocumentSymbol) -> DocumentSymbol {
    symbol.range = embedded.range_to_host(symbol.range);
    symbol.selection_range = embedded.range_to_host(symbol.selection_range);
    symbol.children = symbol.children.map(|children| {
        children
            .into_iter()
            .map(|child| translate_symbol(embedded, child))
            .collect()
    });
    symbol
}

/// Apply `map` to every range of `action` that belongs to `uri`.
fn map_code_action(uri: &Url, action: &mut CodeAction, map: &dyn Fn(Range) -> Range) {
    if let Some(diagnostics) = action.diagnostics.take() {
        action.diagnostics = Some(
            diagnostics
                .into_iter()
                .map(|d| map_diagnostic(uri, d, map))
                .collect(),
        );
    }
    if let Some(edit) = action.edit.as_mut() {
        map_workspace_edit(uri, edit, map);
    }
}

fn map_workspace_edit(uri: &Url, edit: &mut WorkspaceEdit, map: &dyn Fn(Range) -> Range) {
    if let Some(edits) = edit.changes.as_mut().and_then(|changes| changes.get_mut(uri)) {
        for edit in edits {
            edit.range = map(edit.range);
        }
    }

    let map_document_edit = |document_edit: &mut TextDocumentEdit| {
        if &document_edit.text_document.uri != uri {
            return;
        }
        for edit in &mut document_edit.edits {
            match edit {
                OneOf::Left(edit) => edit.range = map(edit.range),
                OneOf::Right(annotated) => {
                    annotated.text_edit.range = map(annotated.text_edit.range)
                }
            }
        }
    };

    match edit.document_changes.as_mut() {
        Some(DocumentChanges::Edits(edits)) => edits.iter_mut().for_each(map_document_edit),
        Some(DocumentChanges::Operations(operations)) => {
            for operation in operations {
                if let DocumentChangeOperation::Edit(document_edit) = operation {
                    map_document_edit(document_edit);
                }
            }
        }
        None => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::StyleAdapter;
    use crate::document::ScanOptions;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tower_lsp::lsp_types::{HoverContents, MarkedString};

    const SFC: &str = "<html>\n<p>hi</p>\n</html>\n<style lang=\"scss\">\n.a {\n  color: red;\n}\n</style>\n";

    fn uri() -> Url {
        Url::parse("file:///test/App.sfc").unwrap()
    }

    fn router(adapters: AdapterRegistry) -> Router {
        let documents = Arc::new(DocumentStore::new());
        documents.configure(ScanOptions::default());
        documents.open(uri(), "sfc".into(), 1, SFC.to_string());
        Router::new(documents, adapters)
    }

    /// Records what it receives and answers with local coordinates.
    #[derive(Default)]
    struct Echo {
        seen: Mutex<Vec<Position>>,
    }

    #[tower_lsp::async_trait]
    impl LanguageAdapter for Echo {
        fn id(&self) -> &str {
            "scss"
        }

        async fn hover(
            &self,
            doc: &EmbeddedDocument<'_>,
            position: Position,
        ) -> crate::error::AdapterResult<Option<Hover>> {
            self.seen.lock().unwrap().push(position);
            Ok(Some(Hover {
                contents: HoverContents::Scalar(MarkedString::String(doc.language_id().into())),
                range: Some(Range::new(position, Position::new(position.line, position.character + 5))),
            }))
        }

        async fn code_actions(
            &self,
            doc: &EmbeddedDocument<'_>,
            range: Range,
            _context: &CodeActionContext,
        ) -> crate::error::AdapterResult<Vec<CodeAction>> {
            let mut changes = HashMap::new();
            changes.insert(doc.uri().clone(), vec![TextEdit::new(range, "blue".into())]);
            Ok(vec![CodeAction {
                title: "use blue".into(),
                edit: Some(WorkspaceEdit {
                    changes: Some(changes),
                    ..Default::default()
                }),
                data: Some(json!(7)),
                ..Default::default()
            }])
        }

        async fn resolve_code_action(
            &self,
            _doc: &EmbeddedDocument<'_>,
            mut action: CodeAction,
        ) -> crate::error::AdapterResult<CodeAction> {
            assert_eq!(action.data, Some(json!(7)));
            action.title = "use blue (resolved)".into();
            Ok(action)
        }
    }

    #[tokio::test]
    async fn active_region_lookup() {
        let router = router(AdapterRegistry::new());
        let css = router.resolve_active_region(&uri(), Position::new(5, 2)).unwrap();
        assert_eq!(css.map(|r| r.language_id), Some("scss".to_string()));
        let host = router.resolve_active_region(&uri(), Position::new(3, 3)).unwrap();
        assert!(host.is_none());

        let missing = Url::parse("file:///test/Missing.sfc").unwrap();
        assert!(matches!(
            router.resolve_active_region(&missing, Position::new(0, 0)),
            Err(Error::DocumentNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn hover_is_translated_both_ways() {
        let echo = Arc::new(Echo::default());
        let mut adapters = AdapterRegistry::new();
        adapters.register(echo.clone());
        let router = router(adapters);

        let hover = router.hover(&uri(), Position::new(5, 2)).await.unwrap().unwrap();
        // `color` is on local line 2 of the scss document.
        assert_eq!(echo.seen.lock().unwrap().as_slice(), &[Position::new(2, 2)]);
        assert_eq!(
            hover.range,
            Some(Range::new(Position::new(5, 2), Position::new(5, 7)))
        );

        // Template positions have no scss adapter behind them.
        assert!(router.hover(&uri(), Position::new(1, 4)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn code_actions_round_trip_through_resolve() {
        let mut adapters = AdapterRegistry::new();
        adapters.register(Arc::new(Echo::default()));
        let router = router(adapters);

        let range = Range::new(Position::new(5, 9), Position::new(5, 12));
        let actions = router
            .code_actions(&uri(), range, &CodeActionContext::default())
            .await
            .unwrap();
        assert_eq!(actions.len(), 1);
        let edits = &actions[0].edit.as_ref().unwrap().changes.as_ref().unwrap()[&uri()];
        assert_eq!(edits[0].range, range);
        assert_eq!(actions[0].data.as_ref().unwrap()["languageId"], "scss");

        let resolved = router.resolve_code_action(actions[0].clone()).await.unwrap();
        assert_eq!(resolved.title, "use blue (resolved)");
        let edits = &resolved.edit.unwrap().changes.unwrap()[&uri()];
        assert_eq!(edits[0].range, range);
    }

    #[tokio::test]
    async fn resolve_leaves_actions_reaching_outside_the_region_alone() {
        let mut adapters = AdapterRegistry::new();
        adapters.register(Arc::new(Echo::default()));
        let router = router(adapters);

        let range = Range::new(Position::new(5, 9), Position::new(5, 12));
        let mut action = router
            .code_actions(&uri(), range, &CodeActionContext::default())
            .await
            .unwrap()
            .remove(0);
        // Retarget the edit at the template, which no scss segment covers.
        let template = Range::new(Position::new(1, 3), Position::new(1, 5));
        action.edit.as_mut().unwrap().changes.as_mut().unwrap().get_mut(&uri()).unwrap()[0]
            .range = template;

        let resolved = router.resolve_code_action(action.clone()).await.unwrap();
        assert_eq!(resolved, action);
        assert_eq!(resolved.title, "use blue");
    }

    #[tokio::test]
    async fn completion_outside_regions_offers_snippets() {
        let router = router(AdapterRegistry::with_builtins());
        let list = router
            .completion(&uri(), Position::new(8, 0))
            .await
            .unwrap()
            .unwrap();
        assert!(list.items.iter().any(|i| i.label == "script"));
        assert!(list.items.iter().all(|i| i.label != "html"));
    }

    #[tokio::test]
    async fn colors_are_in_host_coordinates() {
        let mut adapters = AdapterRegistry::new();
        adapters.register(Arc::new(StyleAdapter::new("scss")));
        let documents = Arc::new(DocumentStore::new());
        documents.open(
            uri(),
            "sfc".into(),
            1,
            "<style lang=\"scss\">\n.a { color: #fff }\n</style>".into(),
        );
        let router = Router::new(documents, adapters);
        let colors = router
            .document_colors(&uri(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(colors.len(), 1);
        assert_eq!(
            colors[0].range,
            Range::new(Position::new(1, 12), Position::new(1, 16))
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_fan_out() {
        let router = router(AdapterRegistry::with_builtins());
        let token = CancellationToken::new();
        token.cancel();
        let tokens = router.semantic_tokens(&uri(), &token).await.unwrap();
        assert!(tokens.data.is_empty());
    }
}
