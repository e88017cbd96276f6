//! Block snippets offered when the cursor is outside every embedded region.

use tower_lsp::lsp_types::{
    CompletionItem, CompletionItemKind, CompletionList, InsertTextFormat, Position,
};

use crate::document::{ScanOptions, VirtualDocument, METADATA_LANGUAGE};

/// Host-level completions: section skeletons the file does not have yet,
/// filtered by the word before `position`.
pub fn block_snippets(
    doc: &VirtualDocument,
    options: &ScanOptions,
    position: Position,
) -> CompletionList {
    let prefix = word_before(doc, position).to_lowercase();
    let has_template = doc
        .regions()
        .iter()
        .any(|r| r.language_id == options.template_language && !r.attribute_value);
    let has_metadata = doc.regions().iter().any(|r| r.language_id == METADATA_LANGUAGE);

    let tag = &options.template_tag;
    let mut candidates: Vec<(String, String, &str)> = Vec::new();
    if !has_template {
        candidates.push((tag.clone(), format!("<{tag}>\n\t$0\n</{tag}>"), "template block"));
    }
    candidates.push(("style".into(), "<style>\n\t$0\n</style>".into(), "style block"));
    candidates.push((
        "style lang=\"scss\"".into(),
        "<style lang=\"scss\">\n\t$0\n</style>".into(),
        "scss style block",
    ));
    candidates.push(("script".into(), "<script>\n\t$0\n</script>".into(), "script block"));
    candidates.push((
        "script lang=\"ts\"".into(),
        "<script lang=\"ts\">\n\t$0\n</script>".into(),
        "typescript script block",
    ));
    if !has_metadata {
        candidates.push(("---".into(), "---\n$0\n---".into(), "metadata block"));
    }

    let items = candidates
        .into_iter()
        .enumerate()
        .filter(|(_, (label, _, _))| prefix.is_empty() || label.starts_with(&prefix))
        .map(|(i, (label, insert_text, detail))| CompletionItem {
            label,
            kind: Some(CompletionItemKind::SNIPPET),
            detail: Some(detail.to_string()),
            insert_text: Some(insert_text),
            insert_text_format: Some(InsertTextFormat::SNIPPET),
            sort_text: Some(format!("{i:02}")),
            ..Default::default()
        })
        .collect();

    CompletionList {
        is_incomplete: false,
        items,
    }
}

/// The identifier-ish word ending at `position` on its line.
fn word_before(doc: &VirtualDocument, position: Position) -> &str {
    let offset = doc.offset_at(position);
    let line_start = doc.text()[..offset].rfind('\n').map_or(0, |i| i + 1);
    let line = &doc.text()[line_start..offset];
    let start = line
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '-')
        .last()
        .map_or(line.len(), |(i, _)| i);
    &line[start..]
}
