//! Built-in adapter for style sheets (css and its preprocessors).
//!
//! This is a lightweight structural reader, not a full CSS engine: it
//! understands rule blocks, declarations and comments well enough to report
//! colors, selector symbols, property tokens and unbalanced braces.

use std::ops::Range as Span;
use std::sync::LazyLock;

use regex::Regex;
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{
    Color, ColorInformation, ColorPresentation, Diagnostic, DiagnosticSeverity, DocumentSymbol,
    Range, SymbolKind, TextEdit,
};

use crate::document::{EmbeddedDocument, LineIndex};
use crate::error::AdapterResult;
use crate::lsp::semantic_tokens::{token_types, AbsoluteToken};

use super::LanguageAdapter;

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"#([0-9a-fA-F]{8}|[0-9a-fA-F]{6}|[0-9a-fA-F]{3,4})\b")
        .expect("invalid hex color pattern")
});

static RGB_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"rgba?\(\s*(\d{1,3})\s*,\s*(\d{1,3})\s*,\s*(\d{1,3})\s*(?:,\s*([0-9]*\.?[0-9]+)\s*)?\)")
        .expect("invalid rgb color pattern")
});

static PROPERTY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-{0,2}[A-Za-z][\w-]*$").expect("invalid property pattern"));

/// Style adapter for one style language id.
#[derive(Debug, Clone)]
pub struct StyleAdapter {
    language_id: String,
}

impl StyleAdapter {
    pub fn new(language_id: impl Into<String>) -> Self {
        Self {
            language_id: language_id.into(),
        }
    }
}

#[tower_lsp::async_trait]
impl LanguageAdapter for StyleAdapter {
    fn id(&self) -> &str {
        &self.language_id
    }

    async fn validate(
        &self,
        doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<Diagnostic>> {
        let index = doc.line_index();
        let diagnostics = parse(doc.text())
            .unbalanced
            .into_iter()
            .map(|(offset, message)| Diagnostic {
                range: index.span_to_range(&(offset..offset + 1)),
                severity: Some(DiagnosticSeverity::ERROR),
                source: Some(self.language_id.clone()),
                message: message.to_string(),
                ..Default::default()
            })
            .collect();
        Ok(diagnostics)
    }

    async fn document_symbols(
        &self,
        doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<DocumentSymbol>> {
        let index = doc.line_index();
        let parsed = parse(doc.text());
        Ok(parsed
            .rules
            .iter()
            .map(|rule| rule.to_symbol(index))
            .collect())
    }

    async fn semantic_tokens(
        &self,
        doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<AbsoluteToken>> {
        let index = doc.line_index();
        Ok(parse(doc.text())
            .declarations
            .iter()
            .filter_map(|decl| {
                AbsoluteToken::from_span(index, decl.property.clone(), token_types::PROPERTY, 0)
            })
            .collect())
    }

    async fn document_colors(
        &self,
        doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<ColorInformation>> {
        let index = doc.line_index();
        let masked = mask_comments(doc.text());
        let mut colors = Vec::new();

        for decl in parse(doc.text()).declarations {
            let value = &masked[decl.value.clone()];
            for (span, color) in find_colors(value) {
                let span = decl.value.start + span.start..decl.value.start + span.end;
                colors.push(ColorInformation {
                    range: index.span_to_range(&span),
                    color,
                });
            }
        }
        colors.sort_by_key(|c| (c.range.start.line, c.range.start.character));
        Ok(colors)
    }

    async fn color_presentations(
        &self,
        _doc: &EmbeddedDocument<'_>,
        color: Color,
        range: Range,
    ) -> AdapterResult<Vec<ColorPresentation>> {
        Ok([hex_label(color), rgb_label(color)]
            .into_iter()
            .map(|label| ColorPresentation {
                text_edit: Some(TextEdit::new(range, label.clone())),
                label,
                additional_text_edits: None,
            })
            .collect())
    }
}

/// A `property: value` declaration, as byte spans of the style text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    property: Span<usize>,
    value: Span<usize>,
}

/// A rule block: its prelude (selector or at-rule) and nested rules.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Rule {
    prelude: Span<usize>,
    name: String,
    /// From the prelude start through the closing brace.
    extent: Span<usize>,
    children: Vec<Rule>,
}

impl Rule {
    fn to_symbol(&self, index: &LineIndex) -> DocumentSymbol {
        let kind = if self.name.starts_with('@') {
            SymbolKind::MODULE
        } else {
            SymbolKind::CLASS
        };
        #[allow(deprecated)]
        DocumentSymbol {
            name: self.name.clone(),
            detail: None,
            kind,
            tags: None,
            deprecated: None,
            range: index.span_to_range(&self.extent),
            selection_range: index.span_to_range(&self.prelude),
            children: (!self.children.is_empty())
                .then(|| self.children.iter().map(|c| c.to_symbol(index)).collect()),
        }
    }
}

#[derive(Debug, Default)]
struct Parsed {
    rules: Vec<Rule>,
    declarations: Vec<Declaration>,
    unbalanced: Vec<(usize, &'static str)>,
}

/// Replace comment bytes with spaces, keeping every offset intact.
fn mask_comments(text: &str) -> String {
    let mut bytes = text.as_bytes().to_vec();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'/' && bytes[i + 1] == b'*' {
            let end = text[i + 2..]
                .find("*/")
                .map_or(bytes.len(), |p| i + 2 + p + 2);
            bytes[i..end].fill(b' ');
            i = end;
        } else {
            i += 1;
        }
    }
    // Only whole comments were blanked, and ASCII spaces keep UTF-8 valid.
    String::from_utf8(bytes).unwrap_or_else(|_| text.to_string())
}

/// Trim a span of `text` to its non-whitespace content.
fn trim_span(text: &str, span: Span<usize>) -> Span<usize> {
    let slice = &text[span.clone()];
    let start = span.start + (slice.len() - slice.trim_start().len());
    let end = span.end - (slice.len() - slice.trim_end().len());
    start..end.max(start)
}

fn parse(text: &str) -> Parsed {
    let masked = mask_comments(text);
    let mut parsed = Parsed::default();
    let mut stack: Vec<OpenRule> = Vec::new();
    let mut chunk_start = 0;

    for (offset, byte) in masked.bytes().enumerate() {
        match byte {
            b'{' => {
                let prelude = trim_span(&masked, chunk_start..offset);
                let name = masked[prelude.clone()]
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                stack.push(OpenRule {
                    prelude,
                    name,
                    brace: offset,
                    children: Vec::new(),
                });
                chunk_start = offset + 1;
            }
            b';' | b'}' => {
                if let Some(decl) = declaration(&masked, chunk_start..offset) {
                    parsed.declarations.push(decl);
                }
                if byte == b'}' {
                    match stack.pop() {
                        Some(open) => {
                            let rule = open.close(offset + 1);
                            attach(&mut stack, &mut parsed, rule);
                        }
                        None => parsed.unbalanced.push((offset, "unexpected '}'")),
                    }
                }
                chunk_start = offset + 1;
            }
            _ => {}
        }
    }

    // Trailing declaration without a terminator, as in `style="color: red"`.
    if let Some(decl) = declaration(&masked, chunk_start..masked.len()) {
        parsed.declarations.push(decl);
    }

    while let Some(open) = stack.pop() {
        parsed.unbalanced.push((open.brace, "missing '}'"));
        let rule = open.close(masked.len());
        attach(&mut stack, &mut parsed, rule);
    }

    parsed.unbalanced.sort_by_key(|(offset, _)| *offset);
    parsed
}

/// A rule whose closing brace has not been seen yet.
struct OpenRule {
    prelude: Span<usize>,
    name: String,
    brace: usize,
    children: Vec<Rule>,
}

impl OpenRule {
    fn close(self, end: usize) -> Rule {
        Rule {
            extent: self.prelude.start..end,
            prelude: self.prelude,
            name: self.name,
            children: self.children,
        }
    }
}

fn attach(stack: &mut [OpenRule], parsed: &mut Parsed, rule: Rule) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(rule),
        None => parsed.rules.push(rule),
    }
}

fn declaration(text: &str, span: Span<usize>) -> Option<Declaration> {
    let colon = span.start + text[span.clone()].find(':')?;
    let property = trim_span(text, span.start..colon);
    if !PROPERTY_NAME.is_match(&text[property.clone()]) {
        return None;
    }
    Some(Declaration {
        property,
        value: trim_span(text, colon + 1..span.end),
    })
}

fn find_colors(value: &str) -> Vec<(Span<usize>, Color)> {
    let hex = HEX_COLOR
        .captures_iter(value)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((whole.range(), parse_hex(caps.get(1)?.as_str())?))
        });
    let rgb = RGB_COLOR.captures_iter(value).filter_map(|caps| {
        let channel = |i: usize| -> Option<f32> {
            let v: u16 = caps.get(i)?.as_str().parse().ok()?;
            (v <= 255).then(|| f32::from(v) / 255.0)
        };
        let alpha = match caps.get(4) {
            Some(a) => a.as_str().parse::<f32>().ok()?.clamp(0.0, 1.0),
            None => 1.0,
        };
        Some((
            caps.get(0)?.range(),
            Color {
                red: channel(1)?,
                green: channel(2)?,
                blue: channel(3)?,
                alpha,
            },
        ))
    });
    hex.chain(rgb).collect()
}

fn parse_hex(digits: &str) -> Option<Color> {
    let nibble = |i: usize| u8::from_str_radix(&digits[i..i + 1], 16).ok().map(|n| n * 17);
    let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    let (r, g, b, a) = match digits.len() {
        3 => (nibble(0)?, nibble(1)?, nibble(2)?, 255),
        4 => (nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?),
        6 => (byte(0)?, byte(2)?, byte(4)?, 255),
        8 => (byte(0)?, byte(2)?, byte(4)?, byte(6)?),
        _ => return None,
    };
    let unit = |c: u8| f32::from(c) / 255.0;
    Some(Color {
        red: unit(r),
        green: unit(g),
        blue: unit(b),
        alpha: unit(a),
    })
}

fn to_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn hex_label(color: Color) -> String {
    let mut label = format!(
        "#{:02x}{:02x}{:02x}",
        to_byte(color.red),
        to_byte(color.green),
        to_byte(color.blue)
    );
    if color.alpha < 1.0 {
        label.push_str(&format!("{:02x}", to_byte(color.alpha)));
    }
    label
}

fn rgb_label(color: Color) -> String {
    let (r, g, b) = (to_byte(color.red), to_byte(color.green), to_byte(color.blue));
    if color.alpha < 1.0 {
        let alpha = (color.alpha * 100.0).round() / 100.0;
        format!("rgba({r}, {g}, {b}, {alpha})")
    } else {
        format!("rgb({r}, {g}, {b})")
    }
}
