//! Language regions inside a host document.
//!
//! A [`Region`] tags a span of the host text with the embedded language it
//! contains. Spans are half-open byte ranges; text outside every region
//! belongs to the host markup.

use std::ops::Range;

use serde::Deserialize;

/// Language id of the single top-level template region.
pub const TEMPLATE_LANGUAGE: &str = "html";

/// Language id of the front-matter metadata block.
pub const METADATA_LANGUAGE: &str = "yml";

/// Default style language when no `lang` attribute is given.
pub const DEFAULT_STYLE_LANGUAGE: &str = "css";

/// Style preprocessors accepted through a `lang` attribute.
pub const STYLE_PREPROCESSORS: &[&str] = &["sass", "scss", "less", "postcss", "stylus"];

/// A span of the host document written in one embedded language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub language_id: String,
    pub start: usize,
    pub end: usize,
    /// The region is the value of a markup attribute (`style="…"`,
    /// `onclick="…"`) rather than a whole block. Attribute regions are
    /// always single-line.
    pub attribute_value: bool,
}

impl Region {
    pub fn new(language_id: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            language_id: language_id.into(),
            start,
            end,
            attribute_value: false,
        }
    }

    pub fn attribute(language_id: impl Into<String>, start: usize, end: usize) -> Self {
        Self {
            attribute_value: true,
            ..Self::new(language_id, start, end)
        }
    }

    pub fn span(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether the host offset falls in this region.
    ///
    /// The end bound is inclusive so a cursor sitting right after the last
    /// character (e.g. just before `</style>`) still belongs to the region.
    pub fn contains_host_offset(&self, host_offset: usize) -> bool {
        host_offset >= self.start && host_offset <= self.end
    }

    /// Region-local offset of a host offset, if it lies inside the region.
    pub fn to_local_offset(&self, host_offset: usize) -> Option<usize> {
        self.contains_host_offset(host_offset)
            .then(|| host_offset - self.start)
    }

    /// Host offset of a region-local offset. Local offsets past the end of
    /// the region clamp to the region end.
    pub fn to_host_offset(&self, local_offset: usize) -> usize {
        self.start + local_offset.min(self.len())
    }

    pub fn is_style(&self) -> bool {
        is_style_language(&self.language_id)
    }

    pub fn is_script(&self) -> bool {
        is_script_language(&self.language_id)
    }
}

/// Scripting language configured as the project default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptLanguage {
    #[default]
    Js,
    Ts,
}

impl ScriptLanguage {
    pub fn id(self) -> &'static str {
        match self {
            ScriptLanguage::Js => "js",
            ScriptLanguage::Ts => "ts",
        }
    }
}

pub fn is_style_language(language_id: &str) -> bool {
    language_id == DEFAULT_STYLE_LANGUAGE || STYLE_PREPROCESSORS.contains(&language_id)
}

pub fn is_script_language(language_id: &str) -> bool {
    matches!(language_id, "js" | "ts" | "jsx" | "tsx")
}

/// Resolve the style language id for a `lang` attribute value.
pub fn style_language(lang: Option<&str>) -> String {
    match lang {
        Some(lang) if STYLE_PREPROCESSORS.contains(&lang) => lang.to_string(),
        _ => DEFAULT_STYLE_LANGUAGE.to_string(),
    }
}

/// Resolve the script language id for a `lang` attribute value.
pub fn script_language(lang: Option<&str>, default: ScriptLanguage) -> String {
    match lang {
        Some("typescript") => "ts".to_string(),
        Some("javascript") => "js".to_string(),
        Some(lang) if !lang.is_empty() => lang.to_string(),
        _ => default.id().to_string(),
    }
}
