//! Document model for single-file components.
//!
//! This module provides:
//! - `scan` and `ScanOptions` to carve a file into language `Region`s
//! - `LineIndex` for byte offset <-> LSP position conversion
//! - `VirtualDocument` snapshots and the `DocumentStore` that owns them
//! - `EmbeddedDocument` for per-language views and coordinate translation

mod embedded;
mod region;
mod scanner;
mod state;
mod text;

pub use embedded::{EmbeddedDocument, Segment, TranslationMode};
pub use region::{
    is_script_language, is_style_language, script_language, style_language, Region,
    ScriptLanguage, DEFAULT_STYLE_LANGUAGE, METADATA_LANGUAGE, STYLE_PREPROCESSORS,
    TEMPLATE_LANGUAGE,
};
pub use scanner::{scan, ScanOptions};
pub use state::{DocumentEvent, DocumentStore, VirtualDocument};
pub use text::{apply_changes, LineIndex};
