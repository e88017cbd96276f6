//! Virtual documents and the open-document store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tower_lsp::lsp_types::{FileChangeType, Position, TextDocumentContentChangeEvent, Url};

use crate::error::{Error, Result};

use super::region::{Region, ScriptLanguage};
use super::scanner::{scan, ScanOptions};
use super::text::{apply_changes, LineIndex};

/// Immutable snapshot of one open source file and its regions.
///
/// Every edit produces a new snapshot from a full re-scan; snapshots are
/// never mutated.
#[derive(Debug, Clone)]
pub struct VirtualDocument {
    uri: Url,
    language_id: String,
    version: i32,
    line_index: LineIndex,
    regions: Vec<Region>,
    script_language: ScriptLanguage,
}

impl VirtualDocument {
    pub fn new(
        uri: Url,
        language_id: String,
        version: i32,
        text: String,
        options: &ScanOptions,
    ) -> Self {
        let regions = scan(&text, options);
        let script_language = detect_script_language(&regions, options.default_script_language);

        Self {
            uri,
            language_id,
            version,
            line_index: LineIndex::new(text),
            regions,
            script_language,
        }
    }

    /// Build the next snapshot from this one plus `changes`.
    pub fn apply_changes(
        &self,
        version: i32,
        changes: Vec<TextDocumentContentChangeEvent>,
        options: &ScanOptions,
    ) -> Self {
        let text = apply_changes(self.text(), changes);
        Self::new(self.uri.clone(), self.language_id.clone(), version, text, options)
    }

    pub fn uri(&self) -> &Url {
        &self.uri
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    pub fn version(&self) -> i32 {
        self.version
    }

    pub fn text(&self) -> &str {
        self.line_index.source()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.line_index
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn script_language(&self) -> ScriptLanguage {
        self.script_language
    }

    /// Byte offset of a position; positions past the end clamp to the end.
    pub fn offset_at(&self, position: Position) -> usize {
        self.line_index.position_to_offset_clamped(position)
    }

    pub fn position_at(&self, offset: usize) -> Position {
        self.line_index.offset_to_position(offset)
    }

    /// The region containing `offset`, if any.
    pub fn region_at(&self, offset: usize) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains_host_offset(offset))
    }

    /// Distinct language ids of block regions, in order of first appearance.
    pub fn block_languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = Vec::new();
        for region in self.regions.iter().filter(|r| !r.attribute_value) {
            if !languages.contains(&region.language_id.as_str()) {
                languages.push(&region.language_id);
            }
        }
        languages
    }
}

fn detect_script_language(regions: &[Region], default: ScriptLanguage) -> ScriptLanguage {
    let scripts: Vec<&str> = regions
        .iter()
        .filter(|r| r.is_script() && !r.attribute_value)
        .map(|r| r.language_id.as_str())
        .collect();
    if scripts.iter().any(|id| matches!(*id, "ts" | "tsx")) {
        ScriptLanguage::Ts
    } else if scripts.is_empty() {
        default
    } else {
        ScriptLanguage::Js
    }
}

/// Lifecycle notifications adapters react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentEvent {
    /// A document was closed; per-document caches can be evicted.
    Removed { uri: Url },
    /// A file that is not open as a document changed on disk.
    ExternalChanged {
        uri: Url,
        kind: FileChangeType,
        revision: u64,
    },
}

/// Thread-safe storage for open documents and external file revisions.
#[derive(Debug, Default)]
pub struct DocumentStore {
    documents: DashMap<Url, Arc<VirtualDocument>>,
    saved_versions: DashMap<Url, i32>,
    external_revisions: DashMap<Url, u64>,
    project_revision: AtomicU64,
    scan_options: OnceLock<ScanOptions>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the scan options for every later snapshot. Only the first call
    /// takes effect.
    pub fn configure(&self, options: ScanOptions) {
        if self.scan_options.set(options).is_err() {
            log::warn!(target: "sfcls::documents", "scan options already configured");
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        self.scan_options.get().cloned().unwrap_or_default()
    }

    /// Open (or re-open) a document from its full text.
    pub fn open(
        &self,
        uri: Url,
        language_id: String,
        version: i32,
        text: String,
    ) -> Arc<VirtualDocument> {
        let document = Arc::new(VirtualDocument::new(
            uri.clone(),
            language_id,
            version,
            text,
            &self.scan_options(),
        ));
        log::debug!(
            target: "sfcls::documents",
            "opened {} v{} with {} regions",
            uri,
            version,
            document.regions().len()
        );
        self.documents.insert(uri, Arc::clone(&document));
        document
    }

    /// Replace a document with the snapshot produced by `changes`.
    pub fn change(
        &self,
        uri: &Url,
        version: i32,
        changes: Vec<TextDocumentContentChangeEvent>,
    ) -> Result<Arc<VirtualDocument>> {
        let previous = self.require(uri)?;
        let document = Arc::new(previous.apply_changes(version, changes, &self.scan_options()));
        self.documents.insert(uri.clone(), Arc::clone(&document));
        Ok(document)
    }

    /// Record that the editor saved the document.
    pub fn save(&self, uri: &Url) -> Result<()> {
        let document = self.require(uri)?;
        self.saved_versions.insert(uri.clone(), document.version());
        Ok(())
    }

    /// Close a document. Returns the removal event when it was open.
    pub fn close(&self, uri: &Url) -> Option<DocumentEvent> {
        self.saved_versions.remove(uri);
        self.documents
            .remove(uri)
            .map(|_| DocumentEvent::Removed { uri: uri.clone() })
    }

    /// Bump the revision of a file referenced by open documents.
    pub fn external_file_changed(&self, uri: Url, kind: FileChangeType) -> DocumentEvent {
        self.project_revision.fetch_add(1, Ordering::SeqCst);
        let revision = {
            let mut entry = self.external_revisions.entry(uri.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        log::debug!(
            target: "sfcls::documents",
            "external change {:?} for {} (revision {})",
            kind,
            uri,
            revision
        );
        DocumentEvent::ExternalChanged {
            uri,
            kind,
            revision,
        }
    }

    pub fn get(&self, uri: &Url) -> Option<Arc<VirtualDocument>> {
        self.documents.get(uri).map(|r| Arc::clone(&r))
    }

    /// Like [`get`](Self::get), but an unknown document is an error.
    pub fn require(&self, uri: &Url) -> Result<Arc<VirtualDocument>> {
        self.get(uri)
            .ok_or_else(|| Error::DocumentNotFound { uri: uri.clone() })
    }

    pub fn uris(&self) -> Vec<Url> {
        self.documents.iter().map(|r| r.key().clone()).collect()
    }

    pub fn saved_version(&self, uri: &Url) -> Option<i32> {
        self.saved_versions.get(uri).map(|v| *v)
    }

    pub fn external_revision(&self, uri: &Url) -> u64 {
        self.external_revisions.get(uri).map_or(0, |r| *r)
    }

    /// Incremented on every external file change anywhere.
    pub fn project_revision(&self) -> u64 {
        self.project_revision.load(Ordering::SeqCst)
    }
}
