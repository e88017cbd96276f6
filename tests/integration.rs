use std::sync::Arc;

use expect_test::expect;
use sfcls::error::AdapterResult;
use sfcls::{
    scan, AdapterRegistry, DocumentStore, EmbeddedDocument, LanguageAdapter, Router, ScanOptions,
};
use tokio_util::sync::CancellationToken;
use tower_lsp::lsp_types::{Diagnostic, DocumentSymbol, Position, Range, Url};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// One line per region: `<language> <start>..<end> [inline] <text>`.
fn format_regions(text: &str) -> String {
    let regions = scan(text, &ScanOptions::default());
    if regions.is_empty() {
        return "(no regions)".to_string();
    }
    regions
        .iter()
        .map(|r| {
            format!(
                "{} {}..{}{} {:?}",
                r.language_id,
                r.start,
                r.end,
                if r.attribute_value { " inline" } else { "" },
                &text[r.span()]
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_range(range: &Range) -> String {
    format!(
        "{}:{}-{}:{}",
        range.start.line, range.start.character, range.end.line, range.end.character
    )
}

/// Format diagnostics into a deterministic, human-readable string.
///
/// Each diagnostic becomes one line:
///   <start_line>:<start_col>-<end_line>:<end_col> <severity> (<source>): <message>
fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return "OK (no diagnostics)".to_string();
    }

    let mut lines: Vec<String> = diagnostics
        .iter()
        .map(|d| {
            let severity = match d.severity {
                Some(tower_lsp::lsp_types::DiagnosticSeverity::ERROR) => "error",
                Some(tower_lsp::lsp_types::DiagnosticSeverity::WARNING) => "warning",
                Some(tower_lsp::lsp_types::DiagnosticSeverity::INFORMATION) => "info",
                Some(tower_lsp::lsp_types::DiagnosticSeverity::HINT) => "hint",
                _ => "unknown",
            };
            format!(
                "{} {} ({}): {}",
                format_range(&d.range),
                severity,
                d.source.as_deref().unwrap_or("-"),
                d.message,
            )
        })
        .collect();

    lines.sort();
    lines.join("\n")
}

fn format_symbols(symbols: &[DocumentSymbol]) -> String {
    symbols
        .iter()
        .map(|s| {
            format!(
                "{} {} ({})",
                s.name,
                format_range(&s.range),
                format_range(&s.selection_range)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn uri() -> Url {
    Url::parse("file:///workspace/src/Card.sfc").unwrap()
}

fn router_with(adapters: AdapterRegistry, text: &str) -> Router {
    let documents = Arc::new(DocumentStore::new());
    documents.open(uri(), "sfc".to_string(), 1, text.to_string());
    Router::new(documents, adapters)
}

fn router(text: &str) -> Router {
    router_with(AdapterRegistry::with_builtins(), text)
}

// ---------------------------------------------------------------------------
// Region scanning
// ---------------------------------------------------------------------------

#[test]
fn scss_style_and_template() {
    let text = "<style lang=\"scss\">\n.a { color: red; }\n</style>\n<html>\n  <p>{{ x }}</p>\n</html>\n";
    let expected = expect![[r#"
        scss 19..39 "\n.a { color: red; }\n"
        html 57..71 "<p>{{ x }}</p>""#]];
    expected.assert_eq(&format_regions(text));
}

#[test]
fn metadata_and_typescript() {
    let text = "---\ntitle: Home\n---\n<script lang=\"ts\">\nexport default {}\n</script>\n";
    let expected = expect![[r#"
        yml 3..16 "\ntitle: Home\n"
        ts 38..57 "\nexport default {}\n""#]];
    expected.assert_eq(&format_regions(text));
}

#[test]
fn unterminated_template() {
    let expected = expect![[r#"(no regions)"#]];
    expected.assert_eq(&format_regions("<html>\n<p>hi</p>\n"));
}

#[test]
fn attribute_fragments() {
    let text = r#"<div style="color: red" onclick="go()"></div>"#;
    let expected = expect![[r#"
        css 12..22 inline "color: red"
        js 33..37 inline "go()""#]];
    expected.assert_eq(&format_regions(text));
}

#[test]
fn edits_rescan_the_whole_document() {
    let documents = DocumentStore::new();
    documents.open(uri(), "sfc".into(), 1, "<html><p/></html>".into());
    let change = tower_lsp::lsp_types::TextDocumentContentChangeEvent {
        range: Some(Range::new(Position::new(0, 17), Position::new(0, 17))),
        range_length: None,
        text: "\n<style lang=\"less\">a{}</style>".to_string(),
    };
    let doc = documents.change(&uri(), 2, vec![change]).unwrap();
    let languages: Vec<_> = doc.regions().iter().map(|r| r.language_id.as_str()).collect();
    assert_eq!(languages, vec!["html", "less"]);
}

// ---------------------------------------------------------------------------
// Whole-document aggregation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn diagnostics_from_every_style_block() {
    let text = "<style>\n.a { color: red;\n</style>\n<style lang=\"scss\">\n}\n</style>\n";
    let router = router(text);
    let diagnostics = router
        .diagnostics(&uri(), &CancellationToken::new())
        .await
        .unwrap();
    let expected = expect![[r#"
        1:3-1:4 error (css): missing '}'
        4:0-4:1 error (scss): unexpected '}'"#]];
    expected.assert_eq(&format_diagnostics(&diagnostics));
}

#[tokio::test]
async fn metadata_syntax_error_points_into_the_block() {
    let router = router("---\ntitle: Home\nbroken: [\n---\n<html></html>\n");
    let diagnostics = router
        .diagnostics(&uri(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].source.as_deref(), Some("yml"));
    assert!(diagnostics[0].range.start.line <= 3);
}

struct Broken;

#[tower_lsp::async_trait]
impl LanguageAdapter for Broken {
    fn id(&self) -> &str {
        "css"
    }

    async fn validate(
        &self,
        _doc: &EmbeddedDocument<'_>,
        _token: &CancellationToken,
    ) -> AdapterResult<Vec<Diagnostic>> {
        Err(sfcls::Error::adapter("css", "engine crashed"))
    }
}

#[tokio::test]
async fn failing_adapter_does_not_sink_the_others() {
    let mut adapters = AdapterRegistry::with_builtins();
    adapters.register(Arc::new(Broken));
    let router = router_with(adapters, "---\nplain\n---\n<style>a{</style>\n");
    let diagnostics = router
        .diagnostics(&uri(), &CancellationToken::new())
        .await
        .unwrap();
    let expected = expect![[r#"0:3-2:0 warning (yml): metadata should be a mapping of keys to values"#]];
    expected.assert_eq(&format_diagnostics(&diagnostics));
}

const PAGE: &str = "---\ntitle: x\n---\n<style>\n.a {\n  color: red;\n}\n</style>\n";

#[tokio::test]
async fn semantic_tokens_are_merged_across_languages() {
    let router = router(PAGE);
    let tokens = router
        .semantic_tokens(&uri(), &CancellationToken::new())
        .await
        .unwrap();
    let formatted = tokens
        .data
        .iter()
        .map(|t| {
            format!(
                "{} {} {} {} {}",
                t.delta_line, t.delta_start, t.length, t.token_type, t.token_modifiers_bitset
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let expected = expect![[r#"
        1 0 5 3 1
        4 2 5 3 0"#]];
    expected.assert_eq(&formatted);
}

#[tokio::test]
async fn document_symbols_in_host_coordinates() {
    let router = router(PAGE);
    let symbols = router
        .document_symbols(&uri(), &CancellationToken::new())
        .await
        .unwrap();
    let expected = expect![[r#"
        title 1:0-1:8 (1:0-1:5)
        .a 4:0-6:1 (4:0-4:2)"#]];
    expected.assert_eq(&format_symbols(&symbols));
}

#[tokio::test]
async fn colors_from_blocks_and_inline_styles() {
    let text = "<style>\n.a { color: #ff0000; }\n</style>\n<div style=\"background: rgb(0, 128, 255)\"></div>";
    let router = router(text);
    let colors = router
        .document_colors(&uri(), &CancellationToken::new())
        .await
        .unwrap();
    let byte = |c: f32| (c * 255.0).round() as u8;
    let formatted = colors
        .iter()
        .map(|c| {
            format!(
                "{} #{:02x}{:02x}{:02x}{:02x}",
                format_range(&c.range),
                byte(c.color.red),
                byte(c.color.green),
                byte(c.color.blue),
                byte(c.color.alpha)
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let expected = expect![[r#"
        1:12-1:19 #ff0000ff
        3:24-3:40 #0080ffff"#]];
    expected.assert_eq(&formatted);
}

#[tokio::test]
async fn unknown_document_is_an_error() {
    let router = router("");
    let missing = Url::parse("file:///workspace/src/Missing.sfc").unwrap();
    let err = router
        .diagnostics(&missing, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, sfcls::Error::DocumentNotFound { .. }));
}
