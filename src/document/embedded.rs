//! Per-language embedded documents and host/local coordinate translation.
//!
//! An [`EmbeddedDocument`] is built on demand for one request: it
//! concatenates the text of every region of one language and remembers where
//! each slice landed, so positions can be mapped between the synthetic text
//! and the host file in both directions.

use tower_lsp::lsp_types::{Position, Range, Url};

use super::region::Region;
use super::state::VirtualDocument;
use super::text::LineIndex;

/// How local coordinates map back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationMode {
    /// Full offset arithmetic through both line indexes. Required for
    /// multi-line blocks.
    Offset,
    /// The host line stays fixed and only the character shifts. Valid only
    /// for single-line attribute values.
    Inline,
}

/// One contributing region and where its text starts in the embedded text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub region: Region,
    pub local_start: usize,
}

impl Segment {
    fn local_end(&self) -> usize {
        self.local_start + self.region.len()
    }
}

/// Synthetic document holding only one embedded language's text.
#[derive(Debug, Clone)]
pub struct EmbeddedDocument<'a> {
    host: &'a VirtualDocument,
    language_id: String,
    text: LineIndex,
    segments: Vec<Segment>,
    mode: TranslationMode,
}

impl<'a> EmbeddedDocument<'a> {
    /// Concatenate every block region of `language_id`, in host order.
    ///
    /// Attribute-value regions are excluded; they are only ever served
    /// through [`for_region`](Self::for_region). With no matching region the
    /// result is an empty document without segments.
    pub fn build(host: &'a VirtualDocument, language_id: &str) -> Self {
        let mut text = String::new();
        let mut segments = Vec::new();

        for region in host
            .regions()
            .iter()
            .filter(|r| !r.attribute_value && r.language_id == language_id)
        {
            segments.push(Segment {
                region: region.clone(),
                local_start: text.len(),
            });
            text.push_str(&host.text()[region.span()]);
        }

        Self {
            host,
            language_id: language_id.to_string(),
            text: LineIndex::new(text),
            segments,
            mode: TranslationMode::Offset,
        }
    }

    /// Document made of a single region. The translation mode follows the
    /// region kind: attribute values translate inline, blocks by offset.
    pub fn for_region(host: &'a VirtualDocument, region: &Region) -> Self {
        let mode = if region.attribute_value {
            TranslationMode::Inline
        } else {
            TranslationMode::Offset
        };
        Self {
            host,
            language_id: region.language_id.clone(),
            text: LineIndex::new(host.text()[region.span()].to_string()),
            segments: vec![Segment {
                region: region.clone(),
                local_start: 0,
            }],
            mode,
        }
    }

    /// Embedded document serving a request at `region`: the single fragment
    /// for attribute values, the whole-language document for blocks.
    pub fn for_request(host: &'a VirtualDocument, region: &Region) -> Self {
        if region.attribute_value {
            Self::for_region(host, region)
        } else {
            Self::build(host, &region.language_id)
        }
    }

    pub fn uri(&self) -> &Url {
        self.host.uri()
    }

    pub fn version(&self) -> i32 {
        self.host.version()
    }

    pub fn language_id(&self) -> &str {
        &self.language_id
    }

    pub fn text(&self) -> &str {
        self.text.source()
    }

    pub fn line_index(&self) -> &LineIndex {
        &self.text
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn mode(&self) -> TranslationMode {
        self.mode
    }

    pub fn host(&self) -> &VirtualDocument {
        self.host
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Index of the segment a local offset belongs to: the last segment
    /// starting at or before it.
    fn segment_index(&self, local_offset: usize) -> Option<usize> {
        match self
            .segments
            .partition_point(|s| s.local_start <= local_offset)
        {
            0 => None,
            n => Some(n - 1),
        }
    }

    pub fn host_offset_to_local(&self, host_offset: usize) -> Option<usize> {
        self.segments.iter().find_map(|segment| {
            segment
                .region
                .to_local_offset(host_offset)
                .map(|local| segment.local_start + local)
        })
    }

    pub fn local_offset_to_host(&self, local_offset: usize) -> usize {
        match self.segment_index(local_offset) {
            Some(i) => self.to_host_in(i, local_offset),
            None => self.segments.first().map_or(0, |s| s.region.start),
        }
    }

    fn to_host_in(&self, index: usize, local_offset: usize) -> usize {
        let segment = &self.segments[index];
        segment
            .region
            .to_host_offset(local_offset.saturating_sub(segment.local_start))
    }

    /// Host position → local position. `None` when the position lies
    /// outside every contributing region.
    pub fn to_local(&self, host_position: Position) -> Option<Position> {
        match self.mode {
            TranslationMode::Offset => {
                let host_offset = self.host.offset_at(host_position);
                let local = self.host_offset_to_local(host_offset)?;
                Some(self.text.offset_to_position(local))
            }
            TranslationMode::Inline => {
                let anchor = self.inline_anchor()?;
                if host_position.line != anchor.line {
                    return None;
                }
                let character = host_position.character.checked_sub(anchor.character)?;
                let width: u32 = self.text().chars().map(|c| c.len_utf16() as u32).sum();
                (character <= width).then_some(Position::new(0, character))
            }
        }
    }

    /// Local position → host position, always resolved against the host
    /// line index.
    pub fn to_host(&self, local_position: Position) -> Position {
        match self.mode {
            TranslationMode::Offset => {
                let local = self.text.position_to_offset_clamped(local_position);
                self.host.position_at(self.local_offset_to_host(local))
            }
            TranslationMode::Inline => match self.inline_anchor() {
                Some(anchor) => Position::new(anchor.line, anchor.character + local_position.character),
                None => local_position,
            },
        }
    }

    pub fn range_to_local(&self, host_range: Range) -> Option<Range> {
        Some(Range::new(
            self.to_local(host_range.start)?,
            self.to_local(host_range.end)?,
        ))
    }

    /// Local range → host range. An end that lands exactly on a segment
    /// boundary stays in the start's segment.
    pub fn range_to_host(&self, local_range: Range) -> Range {
        if self.mode == TranslationMode::Inline {
            return Range::new(self.to_host(local_range.start), self.to_host(local_range.end));
        }

        let start = self.text.position_to_offset_clamped(local_range.start);
        let end = self.text.position_to_offset_clamped(local_range.end).max(start);
        let Some(index) = self.segment_index(start) else {
            let anchor = self.host.position_at(self.local_offset_to_host(start));
            return Range::new(anchor, anchor);
        };

        let host_start = self.to_host_in(index, start);
        let host_end = if end <= self.segments[index].local_end() {
            self.to_host_in(index, end)
        } else {
            self.local_offset_to_host(end)
        };

        Range::new(self.host.position_at(host_start), self.host.position_at(host_end))
    }

    fn inline_anchor(&self) -> Option<Position> {
        self.segments
            .first()
            .map(|segment| self.host.position_at(segment.region.start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ScanOptions;

    fn doc(text: &str) -> VirtualDocument {
        VirtualDocument::new(
            Url::parse("file:///test/App.sfc").unwrap(),
            "sfc".to_string(),
            1,
            text.to_string(),
            &ScanOptions::default(),
        )
    }

    #[test]
    fn concatenates_blocks_in_order() {
        let host = doc("<style>a{}</style>\n<script>x</script>\n<style>\nb{}\n</style>");
        let css = EmbeddedDocument::build(&host, "css");
        assert_eq!(css.text(), "a{}\nb{}\n");
        assert_eq!(css.segments().len(), 2);
        assert_eq!(css.segments()[1].local_start, 3);
    }

    #[test]
    fn missing_language_is_empty() {
        let host = doc("<style>a{}</style>");
        let ts = EmbeddedDocument::build(&host, "ts");
        assert!(ts.is_empty());
        assert_eq!(ts.text(), "");
        assert_eq!(ts.to_local(Position::new(0, 8)), None);
    }

    #[test]
    fn multi_line_block_translation() {
        let text = "<html><p/></html>\n<style lang=\"scss\">\n.a {\n  color: red;\n}\n</style>";
        let host = doc(text);
        let scss = EmbeddedDocument::build(&host, "scss");
        // `color` sits on host line 3, local line 2.
        let local = scss.to_local(Position::new(3, 2)).unwrap();
        assert_eq!(local, Position::new(2, 2));
        assert_eq!(scss.to_host(local), Position::new(3, 2));
        assert_eq!(scss.to_local(Position::new(0, 2)), None);
    }

    #[test]
    fn second_segment_maps_into_its_own_region() {
        let text = "<style>a{}</style><style>b{}</style>";
        let host = doc(text);
        let css = EmbeddedDocument::build(&host, "css");
        // local offset 3 is `b`, which begins the second segment.
        assert_eq!(css.local_offset_to_host(3), 25);
        assert_eq!(css.host_offset_to_local(25), Some(3));

        // A range ending on the boundary stays in the first block.
        let range = css.range_to_host(Range::new(Position::new(0, 0), Position::new(0, 3)));
        assert_eq!(range, Range::new(Position::new(0, 7), Position::new(0, 10)));
    }

    #[test]
    fn inline_translation_keeps_host_line() {
        let text = "<p></p>\n<div style=\"color: red\"></div>";
        let host = doc(text);
        let region = host.regions()[0].clone();
        assert!(region.attribute_value);

        let fragment = EmbeddedDocument::for_request(&host, &region);
        assert_eq!(fragment.mode(), TranslationMode::Inline);
        assert_eq!(fragment.text(), "color: red");

        let local = fragment.to_local(Position::new(1, 15)).unwrap();
        assert_eq!(local, Position::new(0, 3));
        assert_eq!(fragment.to_host(local), Position::new(1, 15));
        assert_eq!(fragment.to_local(Position::new(0, 15)), None);
        assert_eq!(fragment.to_local(Position::new(1, 40)), None);
    }

    #[test]
    fn block_region_request_uses_offset_mode() {
        let host = doc("<style>a{}</style>");
        let region = host.regions()[0].clone();
        let embedded = EmbeddedDocument::for_request(&host, &region);
        assert_eq!(embedded.mode(), TranslationMode::Offset);
    }

    #[test]
    fn local_host_local_round_trip() {
        let text = "---\ntitle: x\n---\n<style>\n.a{}\n</style>\n<html>\n<p>ü</p>\n</html>\n<style lang=\"css\">\n.b { color: blue }\n</style>";
        let host = doc(text);
        for language in ["css", "html", "yml"] {
            let embedded = EmbeddedDocument::build(&host, language);
            assert!(!embedded.is_empty(), "{language}");
            for (offset, _) in embedded.text().char_indices() {
                let local = embedded.line_index().offset_to_position(offset);
                let host_position = embedded.to_host(local);
                assert_eq!(embedded.to_local(host_position), Some(local), "{language} @ {offset}");
            }
        }
    }
}
