//! Settings infrastructure for sfcls.
//!
//! Settings live in an `sfcls.toml` file near the workspace root. They pick
//! the template tag, the default script language and the validation delay.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::document::{ScanOptions, ScriptLanguage};
use crate::error::Result;
use crate::lsp::DEFAULT_DEBOUNCE;

/// File name searched for by [`discover_settings`].
pub const SETTINGS_FILE: &str = "sfcls.toml";

/// Root settings structure loaded from sfcls.toml.
#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    /// How component files are carved into regions.
    pub document: Option<DocumentSettings>,

    /// Diagnostics scheduling.
    pub validation: Option<ValidationSettings>,
}

/// Region recognition settings.
#[derive(Debug, Default, Deserialize)]
pub struct DocumentSettings {
    /// Tag name of the top-level template element (default: "html").
    pub template_tag: Option<String>,

    /// Script language of `<script>` blocks without `lang`: "js" or "ts".
    pub default_script_language: Option<ScriptLanguage>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValidationSettings {
    /// Milliseconds to wait after the last edit before validating.
    pub debounce_ms: Option<u64>,
}

impl Settings {
    /// Scan options with every unset field at its default.
    pub fn scan_options(&self) -> ScanOptions {
        let mut options = ScanOptions::default();
        if let Some(document) = &self.document {
            if let Some(tag) = document.template_tag.as_deref().map(str::trim) {
                if !tag.is_empty() {
                    options.template_tag = tag.to_ascii_lowercase();
                }
            }
            if let Some(language) = document.default_script_language {
                options.default_script_language = language;
            }
        }
        options
    }

    pub fn debounce(&self) -> Duration {
        self.validation
            .as_ref()
            .and_then(|v| v.debounce_ms)
            .map_or(DEFAULT_DEBOUNCE, Duration::from_millis)
    }
}

/// Parse settings from TOML text.
pub fn parse_settings(content: &str) -> Result<Settings> {
    Ok(toml::from_str(content)?)
}

/// Load settings from a sfcls.toml file.
///
/// Returns default settings if the file doesn't exist or can't be parsed.
pub fn load_settings(path: &Path) -> Settings {
    match std::fs::read_to_string(path) {
        Ok(content) => match parse_settings(&content) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!(target: "sfcls::settings", "{}: {}", path.display(), e);
                Settings::default()
            }
        },
        Err(_) => Settings::default(),
    }
}

/// Discover sfcls.toml by searching up the directory tree, then direct children.
///
/// Search order:
/// 1. Walk up from `start_dir` to filesystem root
/// 2. If not found, check immediate child directories of `start_dir`
///
/// Returns `(settings, settings_dir)`. If not found, returns
/// `(Settings::default(), start_dir)`.
pub fn discover_settings(start_dir: &Path) -> (Settings, PathBuf) {
    // Phase 1: Walk up from start_dir
    let mut current = Some(start_dir);
    while let Some(dir) = current {
        let candidate = dir.join(SETTINGS_FILE);
        if candidate.is_file() {
            return (load_settings(&candidate), dir.to_path_buf());
        }
        current = dir.parent();
    }

    // Phase 2: Check immediate child directories
    if let Ok(entries) = std::fs::read_dir(start_dir) {
        for entry in entries.flatten() {
            if entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
                let candidate = entry.path().join(SETTINGS_FILE);
                if candidate.is_file() {
                    return (load_settings(&candidate), entry.path());
                }
            }
        }
    }

    (Settings::default(), start_dir.to_path_buf())
}
