//! Single-file component language server.
//!
//! A component file interleaves a markup template, style blocks, script
//! blocks and a YAML metadata block. The server carves every file into
//! language regions, serves each region through a [`LanguageAdapter`] and
//! translates positions between the file and the per-language documents.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService};

pub mod adapter;
pub mod document;
pub mod error;
pub mod lsp;
pub(crate) mod settings;

pub use adapter::{AdapterRegistry, LanguageAdapter, MetadataAdapter, StyleAdapter};
pub use document::{
    scan, DocumentEvent, DocumentStore, EmbeddedDocument, LineIndex, Region, ScanOptions,
    VirtualDocument,
};
pub use error::Error;
pub use lsp::{DiagnosticsSink, RevalidationScheduler, Router};
pub use settings::{discover_settings, load_settings, parse_settings, Settings};

pub struct Backend {
    client: Client,
    router: Arc<Router>,
    scheduler: RevalidationScheduler,
}

impl Backend {
    pub(crate) fn new(client: Client) -> Self {
        Self::with_adapters(client, AdapterRegistry::with_builtins())
    }

    /// Backend serving embedded languages through `adapters`.
    pub fn with_adapters(client: Client, adapters: AdapterRegistry) -> Self {
        let router = Arc::new(Router::new(Arc::new(DocumentStore::new()), adapters));
        let scheduler = RevalidationScheduler::new(Arc::clone(&router), Arc::new(client.clone()));
        Self {
            client,
            router,
            scheduler,
        }
    }

    fn documents(&self) -> &DocumentStore {
        self.router.documents()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        // Extract workspace root from params
        let workspace_root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .and_then(|f| f.uri.to_file_path().ok())
            .or_else(|| {
                #[allow(deprecated)]
                params.root_uri.as_ref()?.to_file_path().ok()
            });

        let settings = match workspace_root {
            Some(root) => {
                let (settings, settings_dir) = settings::discover_settings(&root);
                log::info!(
                    target: "sfcls::settings",
                    "workspace {} (settings from {})",
                    root.display(),
                    settings_dir.display()
                );
                settings
            }
            None => Settings::default(),
        };
        self.documents().configure(settings.scan_options());
        self.scheduler.set_delay(settings.debounce());

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Options(
                    TextDocumentSyncOptions {
                        open_close: Some(true),
                        change: Some(TextDocumentSyncKind::INCREMENTAL),
                        save: Some(TextDocumentSyncSaveOptions::Supported(true)),
                        ..Default::default()
                    },
                )),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                completion_provider: Some(CompletionOptions {
                    trigger_characters: Some(
                        [".", ":", "<", "\"", "-"].map(String::from).to_vec(),
                    ),
                    resolve_provider: Some(false),
                    ..Default::default()
                }),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
                    ..Default::default()
                }),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                document_highlight_provider: Some(OneOf::Left(true)),
                document_symbol_provider: Some(OneOf::Left(true)),
                document_formatting_provider: Some(OneOf::Left(true)),
                code_action_provider: Some(CodeActionProviderCapability::Options(
                    CodeActionOptions {
                        resolve_provider: Some(true),
                        ..Default::default()
                    },
                )),
                color_provider: Some(ColorProviderCapability::Simple(true)),
                semantic_tokens_provider: Some(
                    SemanticTokensServerCapabilities::SemanticTokensOptions(
                        SemanticTokensOptions {
                            legend: lsp::legend(),
                            full: Some(SemanticTokensFullOptions::Bool(true)),
                            range: None,
                            work_done_progress_options: WorkDoneProgressOptions::default(),
                        },
                    ),
                ),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .log_message(MessageType::INFO, "sfcls initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        self.scheduler.cancel_all();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.documents()
            .open(doc.uri.clone(), doc.language_id, doc.version, doc.text);
        self.scheduler.validate_now(doc.uri);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        match self.documents().change(
            &uri,
            params.text_document.version,
            params.content_changes,
        ) {
            Ok(_) => self.scheduler.schedule(uri),
            Err(e) => log::warn!(target: "sfcls::documents", "change ignored: {}", e),
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        if let Err(e) = self.documents().save(&params.text_document.uri) {
            log::warn!(target: "sfcls::documents", "save ignored: {}", e);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.scheduler.cancel(&uri);
        if let Some(event) = self.documents().close(&uri) {
            self.router.dispatch_event(&event);
        }
        // Clear diagnostics
        self.client.publish_diagnostics(uri, vec![], None).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        for change in params.changes {
            if self.documents().get(&change.uri).is_some() {
                // The editor owns open documents; their edits arrive as changes.
                continue;
            }
            let event = self.documents().external_file_changed(change.uri, change.typ);
            self.router.dispatch_event(&event);
        }
        for uri in self.documents().uris() {
            self.scheduler.schedule(uri);
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let position = params.text_document_position_params;
        Ok(self
            .router
            .hover(&position.text_document.uri, position.position)
            .await?)
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let position = params.text_document_position;
        let list = self
            .router
            .completion(&position.text_document.uri, position.position)
            .await?;
        Ok(list.map(CompletionResponse::List))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let position = params.text_document_position_params;
        Ok(self
            .router
            .signature_help(&position.text_document.uri, position.position)
            .await?)
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let position = params.text_document_position_params;
        let locations = self
            .router
            .goto_definition(&position.text_document.uri, position.position)
            .await?;
        Ok((!locations.is_empty()).then_some(GotoDefinitionResponse::Array(locations)))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let position = params.text_document_position;
        let locations = self
            .router
            .references(&position.text_document.uri, position.position)
            .await?;
        Ok(Some(locations))
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>> {
        let position = params.text_document_position_params;
        let highlights = self
            .router
            .document_highlight(&position.text_document.uri, position.position)
            .await?;
        Ok(Some(highlights))
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let actions = self
            .router
            .code_actions(&params.text_document.uri, params.range, &params.context)
            .await?;
        Ok(Some(
            actions
                .into_iter()
                .map(CodeActionOrCommand::CodeAction)
                .collect(),
        ))
    }

    async fn code_action_resolve(&self, params: CodeAction) -> Result<CodeAction> {
        Ok(self.router.resolve_code_action(params).await?)
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let symbols = self
            .router
            .document_symbols(&params.text_document.uri, &CancellationToken::new())
            .await?;
        Ok(Some(DocumentSymbolResponse::Nested(symbols)))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let edits = self
            .router
            .formatting(
                &params.text_document.uri,
                &params.options,
                &CancellationToken::new(),
            )
            .await?;
        Ok(Some(edits))
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        let tokens = self
            .router
            .semantic_tokens(&params.text_document.uri, &CancellationToken::new())
            .await?;
        Ok(Some(SemanticTokensResult::Tokens(tokens)))
    }

    async fn document_color(&self, params: DocumentColorParams) -> Result<Vec<ColorInformation>> {
        Ok(self
            .router
            .document_colors(&params.text_document.uri, &CancellationToken::new())
            .await?)
    }

    async fn color_presentation(
        &self,
        params: ColorPresentationParams,
    ) -> Result<Vec<ColorPresentation>> {
        Ok(self
            .router
            .color_presentations(&params.text_document.uri, params.color, params.range)
            .await?)
    }
}

pub fn create_service() -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(Backend::new)
}

/// Service whose embedded languages are served by `adapters`.
pub fn create_service_with(
    adapters: AdapterRegistry,
) -> (LspService<Backend>, tower_lsp::ClientSocket) {
    LspService::new(move |client| Backend::with_adapters(client, adapters.clone()))
}
