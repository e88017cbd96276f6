//! LSP-facing pieces of the server.
//!
//! This module provides:
//! - `Router`, dispatching requests to embedded-language adapters
//! - `RevalidationScheduler`, debouncing diagnostics publication
//! - the semantic token legend and merge/encode helpers
//! - block snippets for positions outside every region

pub mod router;
pub mod scheduler;
pub mod semantic_tokens;
mod snippets;

pub use router::Router;
pub use scheduler::{DiagnosticsSink, RevalidationScheduler, DEFAULT_DEBOUNCE};
pub use semantic_tokens::{legend, AbsoluteToken};
pub use snippets::block_snippets;
