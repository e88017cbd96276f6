//! Region scanner for single-file components.
//!
//! A small markup tokenizer feeds one forward pass that carves the host text
//! into language regions: the top-level template element, `<style>` and
//! `<script>` blocks, inline `style`/`on*` attribute values, and a `---`
//! delimited metadata block. The scanner never fails; malformed or partial
//! markup yields whatever regions could be recognized.

use std::ops::Range;

use super::region::{
    script_language, style_language, Region, ScriptLanguage, METADATA_LANGUAGE,
    TEMPLATE_LANGUAGE,
};

/// Options controlling how regions are recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Tag name of the top-level template element.
    pub template_tag: String,
    /// Language id given to the template region.
    pub template_language: String,
    /// Script language used when a `<script>` has no `lang` attribute.
    pub default_script_language: ScriptLanguage,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            template_tag: "html".to_string(),
            template_language: TEMPLATE_LANGUAGE.to_string(),
            default_script_language: ScriptLanguage::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    /// Tag name of a start tag.
    StartTag,
    AttributeName,
    /// Attribute value, including its quotes.
    AttributeValue,
    /// `>` ending a start tag.
    StartTagClose,
    /// `/>` ending a start tag.
    StartTagSelfClose,
    /// Tag name of an end tag (the `</` precedes the token).
    EndTag,
    EndTagClose,
    /// Raw content of a `<style>` element.
    Styles,
    /// Raw content of a `<script>` element.
    Script,
    /// Text content, comments and anything unrecognized.
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub end: usize,
}

impl Token {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawKind {
    Script,
    Style,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Content,
    AfterOpeningStartTag,
    WithinTag,
    AfterAttributeName,
    BeforeAttributeValue,
    AfterOpeningEndTag,
    WithinEndTag,
    RawText(RawKind),
}

/// Forward-only markup tokenizer.
///
/// Splits only at ASCII delimiters, so every token boundary is a valid
/// `char` boundary of the source.
pub(crate) struct Tokenizer<'a> {
    source: &'a str,
    pos: usize,
    state: State,
    last_tag: &'a str,
}

impl<'a> Tokenizer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            state: State::Content,
            last_tag: "",
        }
    }

    fn emit(&mut self, kind: TokenKind, end: usize) -> Token {
        let token = Token {
            kind,
            start: self.pos,
            end,
        };
        self.pos = end;
        token
    }

    fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.source.as_bytes().get(offset).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.byte_at(self.pos).is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn advance_while(&self, from: usize, pred: impl Fn(u8) -> bool) -> usize {
        let bytes = self.source.as_bytes();
        let mut end = from;
        while end < bytes.len() && pred(bytes[end]) {
            end += 1;
        }
        end
    }

    /// Offset of the next `<` that starts a tag, end tag or comment.
    fn next_markup_start(&self, from: usize) -> usize {
        let bytes = self.source.as_bytes();
        (from..bytes.len())
            .find(|&i| {
                bytes[i] == b'<'
                    && bytes
                        .get(i + 1)
                        .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'/' || *b == b'!')
            })
            .unwrap_or(bytes.len())
    }

    fn find_from(&self, needle: char) -> Option<usize> {
        self.rest().find(needle).map(|i| self.pos + i)
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            if self.pos >= self.source.len() {
                return None;
            }
            let len = self.source.len();

            match self.state {
                State::Content => {
                    let rest = self.rest();
                    if rest.starts_with("<!--") {
                        let end = rest.find("-->").map_or(len, |i| self.pos + i + 3);
                        return Some(self.emit(TokenKind::Other, end));
                    }
                    if rest.starts_with("</") {
                        if self.byte_at(self.pos + 2).is_some_and(|b| b.is_ascii_alphabetic()) {
                            self.pos += 2;
                            self.state = State::AfterOpeningEndTag;
                            continue;
                        }
                        // Malformed end tag, kept as unknown markup.
                        let end = self.find_from('>').map_or(len, |i| i + 1);
                        return Some(self.emit(TokenKind::Other, end));
                    }
                    if rest.starts_with('<')
                        && self.byte_at(self.pos + 1).is_some_and(|b| b.is_ascii_alphabetic())
                    {
                        self.pos += 1;
                        self.state = State::AfterOpeningStartTag;
                        continue;
                    }
                    let end = self.next_markup_start(self.pos + 1);
                    return Some(self.emit(TokenKind::Other, end));
                }
                State::AfterOpeningStartTag => {
                    let end = self.advance_while(self.pos, is_name_byte);
                    self.last_tag = &self.source[self.pos..end];
                    self.state = State::WithinTag;
                    return Some(self.emit(TokenKind::StartTag, end));
                }
                State::WithinTag | State::AfterAttributeName => {
                    self.skip_whitespace();
                    let rest = self.rest();
                    if rest.is_empty() {
                        continue;
                    }
                    if self.state == State::AfterAttributeName && rest.starts_with('=') {
                        self.pos += 1;
                        self.state = State::BeforeAttributeValue;
                        continue;
                    }
                    self.state = State::WithinTag;
                    if rest.starts_with("/>") {
                        self.state = State::Content;
                        return Some(self.emit(TokenKind::StartTagSelfClose, self.pos + 2));
                    }
                    if rest.starts_with('>') {
                        self.state = if self.last_tag.eq_ignore_ascii_case("script") {
                            State::RawText(RawKind::Script)
                        } else if self.last_tag.eq_ignore_ascii_case("style") {
                            State::RawText(RawKind::Style)
                        } else {
                            State::Content
                        };
                        return Some(self.emit(TokenKind::StartTagClose, self.pos + 1));
                    }
                    if rest.starts_with('<') {
                        // Unclosed tag followed by new markup.
                        self.state = State::Content;
                        continue;
                    }
                    let end = self.advance_while(self.pos, is_attribute_name_byte);
                    if end > self.pos {
                        self.state = State::AfterAttributeName;
                        return Some(self.emit(TokenKind::AttributeName, end));
                    }
                    // Stray ASCII punctuation inside a tag.
                    return Some(self.emit(TokenKind::Other, self.pos + 1));
                }
                State::BeforeAttributeValue => {
                    self.skip_whitespace();
                    self.state = State::WithinTag;
                    let Some(quote) = self.byte_at(self.pos) else {
                        continue;
                    };
                    if quote == b'"' || quote == b'\'' {
                        let end = self.source[self.pos + 1..]
                            .find(quote as char)
                            .map_or(len, |i| self.pos + 1 + i + 1);
                        return Some(self.emit(TokenKind::AttributeValue, end));
                    }
                    if quote == b'>' || self.rest().starts_with("/>") {
                        continue;
                    }
                    let end = self.advance_while(self.pos, |b| !b.is_ascii_whitespace() && b != b'>');
                    return Some(self.emit(TokenKind::AttributeValue, end));
                }
                State::AfterOpeningEndTag => {
                    let end = self.advance_while(self.pos, is_name_byte);
                    self.state = State::WithinEndTag;
                    return Some(self.emit(TokenKind::EndTag, end));
                }
                State::WithinEndTag => {
                    self.skip_whitespace();
                    match self.byte_at(self.pos) {
                        None => continue,
                        Some(b'>') => {
                            self.state = State::Content;
                            return Some(self.emit(TokenKind::EndTagClose, self.pos + 1));
                        }
                        Some(b'<') => {
                            self.state = State::Content;
                            continue;
                        }
                        Some(_) => {
                            let end = self
                                .advance_while(self.pos, |b| b != b'>' && b != b'<');
                            return Some(self.emit(TokenKind::Other, end));
                        }
                    }
                }
                State::RawText(kind) => {
                    let closing = match kind {
                        RawKind::Script => "</script",
                        RawKind::Style => "</style",
                    };
                    let end = find_ignore_ascii_case(self.rest(), closing).map_or(len, |i| self.pos + i);
                    self.state = State::Content;
                    if end > self.pos {
                        let kind = match kind {
                            RawKind::Script => TokenKind::Script,
                            RawKind::Style => TokenKind::Styles,
                        };
                        return Some(self.emit(kind, end));
                    }
                }
            }
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
}

fn is_attribute_name_byte(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'/' | b'>' | b'=' | b'"' | b'\'' | b'<')
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    let (hay, needle) = (haystack.as_bytes(), needle.as_bytes());
    if needle.len() > hay.len() {
        return None;
    }
    (0..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

/// Scan `text` into language regions, in ascending start order.
pub fn scan(text: &str, options: &ScanOptions) -> Vec<Region> {
    let mut regions = Vec::new();
    let mut tokens = Tokenizer::new(text);

    let mut depth = 0usize;
    let mut last_attribute_name: Option<&str> = None;
    let mut language_from_lang: Option<String> = None;
    let mut other_run: Option<Range<usize>> = None;
    let mut template_seen = false;
    let mut metadata_seen = false;

    while let Some(token) = tokens.next() {
        if token.kind == TokenKind::Other && depth == 0 {
            other_run = Some(match other_run {
                Some(run) => run.start..token.end,
                None => token.start..token.end,
            });
            continue;
        }
        if let Some(run) = other_run.take() {
            if !metadata_seen {
                if let Some(region) = metadata_region(text, run) {
                    metadata_seen = true;
                    regions.push(region);
                }
            }
        }

        match token.kind {
            TokenKind::StartTag => {
                depth += 1;
                last_attribute_name = None;
                language_from_lang = None;
                let name = token.text(text);
                if depth == 1 && !template_seen && name.eq_ignore_ascii_case(&options.template_tag) {
                    template_seen = true;
                    if let Some(region) = scan_region(&mut tokens, text, name, &options.template_language)
                    {
                        regions.push(region);
                    }
                    // The sub-scan consumed the matching end tag.
                    depth -= 1;
                }
            }
            TokenKind::AttributeName => last_attribute_name = Some(token.text(text)),
            TokenKind::AttributeValue => match last_attribute_name.take() {
                Some(name) if name.eq_ignore_ascii_case("lang") => {
                    language_from_lang = Some(unquote(token.text(text)).trim().to_ascii_lowercase());
                }
                Some(name) => {
                    if let Some(region) = attribute_region(name, token, text, options) {
                        regions.push(region);
                    }
                }
                None => {}
            },
            TokenKind::StartTagClose => last_attribute_name = None,
            TokenKind::StartTagSelfClose => {
                depth = depth.saturating_sub(1);
                last_attribute_name = None;
                language_from_lang = None;
            }
            TokenKind::EndTag => {
                depth = depth.saturating_sub(1);
                language_from_lang = None;
            }
            TokenKind::Styles => {
                let language = style_language(language_from_lang.take().as_deref());
                regions.push(Region::new(language, token.start, token.end));
            }
            TokenKind::Script => {
                let language = script_language(
                    language_from_lang.take().as_deref(),
                    options.default_script_language,
                );
                regions.push(Region::new(language, token.start, token.end));
            }
            TokenKind::EndTagClose | TokenKind::Other => {}
        }
    }

    if let Some(run) = other_run {
        if !metadata_seen {
            regions.extend(metadata_region(text, run));
        }
    }

    regions
}

/// Balanced sub-scan for the template element whose start tag name was just
/// read. Returns `None` when no matching end tag exists yet.
fn scan_region(
    tokens: &mut Tokenizer<'_>,
    text: &str,
    tag_name: &str,
    language: &str,
) -> Option<Region> {
    let content_start = loop {
        let token = tokens.next()?;
        match token.kind {
            TokenKind::StartTagClose => break token.end,
            TokenKind::StartTagSelfClose => return None,
            _ => {}
        }
    };

    let mut unclosed = 0usize;
    let mut same_tag_open = false;

    while let Some(token) = tokens.next() {
        match token.kind {
            TokenKind::StartTag => {
                same_tag_open = token.text(text).eq_ignore_ascii_case(tag_name);
                if same_tag_open {
                    unclosed += 1;
                }
            }
            TokenKind::StartTagSelfClose => {
                if same_tag_open {
                    unclosed = unclosed.saturating_sub(1);
                }
                same_tag_open = false;
            }
            TokenKind::StartTagClose => same_tag_open = false,
            TokenKind::EndTag if token.text(text).eq_ignore_ascii_case(tag_name) => {
                if unclosed == 0 {
                    // `token.start - 2` is the `<` of `</name`.
                    return Some(trimmed_region(text, language, content_start, token.start - 2));
                }
                unclosed -= 1;
            }
            TokenKind::Other | TokenKind::Script | TokenKind::Styles => {
                let raw = token.text(text);
                let unclassified = match token.kind {
                    TokenKind::Other => !raw.starts_with("<!--"),
                    // Raw text only counts when its own close tag never came.
                    _ => token.end == text.len(),
                };
                if !unclassified {
                    continue;
                }
                if let Some(idx) = find_textual_end_tag(raw, tag_name) {
                    if unclosed == 0 {
                        return Some(trimmed_region(text, language, content_start, token.start + idx));
                    }
                    unclosed -= 1;
                }
            }
            _ => {}
        }
    }

    None
}

/// Locate `</name` in text the tokenizer did not classify as an end tag.
fn find_textual_end_tag(haystack: &str, name: &str) -> Option<usize> {
    haystack.match_indices("</").find_map(|(idx, _)| {
        let rest = haystack[idx + 2..].trim_start();
        let candidate = rest.get(..name.len())?;
        let at_boundary = rest
            .as_bytes()
            .get(name.len())
            .map_or(true, |b| !is_name_byte(*b));
        (candidate.eq_ignore_ascii_case(name) && at_boundary).then_some(idx)
    })
}

fn trimmed_region(text: &str, language: &str, start: usize, end: usize) -> Region {
    let end = end.max(start);
    let slice = &text[start..end];
    let lead = slice.len() - slice.trim_start().len();
    let trail = slice.len() - slice.trim_end().len();
    let start = start + lead;
    Region::new(language, start, (end - trail).max(start))
}

/// A `---` delimited block; the region excludes the dash lines themselves.
fn metadata_region(text: &str, run: Range<usize>) -> Option<Region> {
    let raw = &text[run.clone()];
    let trimmed = raw.trim();
    if !trimmed.starts_with("---") || !trimmed.ends_with("---") {
        return None;
    }
    let open = trimmed.bytes().take_while(|b| *b == b'-').count();
    if open == trimmed.len() {
        return None;
    }
    let close = trimmed.bytes().rev().take_while(|b| *b == b'-').count();
    let lead = raw.len() - raw.trim_start().len();
    let start = run.start + lead + open;
    let end = run.start + lead + trimmed.len() - close;
    Some(Region::new(METADATA_LANGUAGE, start, end))
}

/// Inline `style="…"` and `on*="…"` values, when quoted and single-line.
fn attribute_region(
    name: &str,
    token: Token,
    text: &str,
    options: &ScanOptions,
) -> Option<Region> {
    let language = if name.eq_ignore_ascii_case("style") {
        style_language(None)
    } else if name.len() > 2 && name.as_bytes()[..2].eq_ignore_ascii_case(b"on") {
        options.default_script_language.id().to_string()
    } else {
        return None;
    };

    let raw = token.text(text);
    let inner = unquote(raw);
    if inner.len() + 2 != raw.len() || inner.is_empty() || inner.contains(['\n', '\r']) {
        return None;
    }
    Some(Region::attribute(language, token.start + 1, token.end - 1))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regions(text: &str) -> Vec<(String, String)> {
        scan(text, &ScanOptions::default())
            .into_iter()
            .map(|r| (r.language_id.clone(), text[r.span()].to_string()))
            .collect()
    }

    fn pair(language: &str, text: &str) -> (String, String) {
        (language.to_string(), text.to_string())
    }

    #[test]
    fn tokenizes_tags_and_attributes() {
        let text = r#"<a href="x">t</a><br/>"#;
        let kinds: Vec<_> = Tokenizer::new(text).map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::StartTag,
                TokenKind::AttributeName,
                TokenKind::AttributeValue,
                TokenKind::StartTagClose,
                TokenKind::Other,
                TokenKind::EndTag,
                TokenKind::EndTagClose,
                TokenKind::StartTag,
                TokenKind::StartTagSelfClose,
            ]
        );
    }

    #[test]
    fn style_then_template() {
        let text = r#"<style lang="scss">.a{color:red}</style><html><div>{{x}}</div></html>"#;
        let found = scan(text, &ScanOptions::default());
        assert_eq!(
            found,
            vec![Region::new("scss", 19, 32), Region::new("html", 46, 62)]
        );
        assert_eq!(&text[46..62], "<div>{{x}}</div>");
    }

    #[test]
    fn default_languages() {
        let text = "<script>let a = 1</script>\n<style>p{}</style>";
        assert_eq!(
            regions(text),
            vec![pair("js", "let a = 1"), pair("css", "p{}")]
        );

        let options = ScanOptions {
            default_script_language: ScriptLanguage::Ts,
            ..ScanOptions::default()
        };
        let found = scan("<script>x</script>", &options);
        assert_eq!(found[0].language_id, "ts");
    }

    #[test]
    fn lang_applies_only_to_its_own_block() {
        let text = r#"<style lang="less">a{}</style><style>b{}</style><script lang='ts'>c</script><script>d</script>"#;
        assert_eq!(
            regions(text),
            vec![
                pair("less", "a{}"),
                pair("css", "b{}"),
                pair("ts", "c"),
                pair("js", "d"),
            ]
        );
    }

    #[test]
    fn unknown_style_lang_falls_back_to_css() {
        assert_eq!(
            regions(r#"<style lang="sql">a{}</style>"#),
            vec![pair("css", "a{}")]
        );
    }

    #[test]
    fn metadata_block_excludes_delimiters() {
        let text = "---\nname: Foo\n---\n<script>export default {}</script>";
        assert_eq!(
            regions(text),
            vec![pair("yml", "\nname: Foo\n"), pair("js", "export default {}")]
        );
    }

    #[test]
    fn dashes_alone_are_not_metadata() {
        assert!(regions("------\n<p></p>").is_empty());
    }

    #[test]
    fn unterminated_template_yields_nothing() {
        assert!(regions("<html><div>").is_empty());
        assert!(regions("<html").is_empty());
    }

    #[test]
    fn template_whitespace_is_trimmed() {
        let text = "<html>\n  <p>hi</p>\n</html>";
        assert_eq!(regions(text), vec![pair("html", "<p>hi</p>")]);
    }

    #[test]
    fn empty_template() {
        let found = scan("<html>  </html>", &ScanOptions::default());
        assert_eq!(found.len(), 1);
        assert!(found[0].is_empty());
    }

    #[test]
    fn nested_same_name_tags_are_balanced() {
        let text = "<html><html>a</html><html/>b</html><style>c{}</style>";
        assert_eq!(
            regions(text),
            vec![pair("html", "<html>a</html><html/>b"), pair("css", "c{}")]
        );
    }

    #[test]
    fn malformed_end_tag_closes_template() {
        let text = "<html><p>x</p></ html>";
        assert_eq!(regions(text), vec![pair("html", "<p>x</p>")]);
    }

    #[test]
    fn unterminated_script_inside_template_still_closes() {
        let text = "<html><script>let a</html>";
        assert_eq!(regions(text), vec![pair("html", "<script>let a")]);
    }

    #[test]
    fn nested_template_tag_is_not_a_second_template() {
        let text = "<div><html>x</html></div>";
        assert!(regions(text).is_empty());
    }

    #[test]
    fn only_first_template_is_recognized() {
        let found = scan("<html>a</html><html>b</html>", &ScanOptions::default());
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn attribute_values_become_inline_regions() {
        let text = r#"<div style="color: red" onclick="go()" class="x"></div>"#;
        let found = scan(text, &ScanOptions::default());
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|r| r.attribute_value));
        assert_eq!(&text[found[0].span()], "color: red");
        assert_eq!(found[0].language_id, "css");
        assert_eq!(&text[found[1].span()], "go()");
        assert_eq!(found[1].language_id, "js");
    }

    #[test]
    fn multiline_attribute_values_are_skipped() {
        let text = "<div style=\"a: b;\nc: d\"></div>";
        assert!(regions(text).is_empty());
    }

    #[test]
    fn unterminated_style_runs_to_end() {
        assert_eq!(regions("<style>a{"), vec![pair("css", "a{")]);
    }

    #[test]
    fn tag_names_are_case_insensitive() {
        let text = "<STYLE>a{}</STYLE><Html>x</HTML>";
        assert_eq!(regions(text), vec![pair("css", "a{}"), pair("html", "x")]);
    }

    #[test]
    fn end_tag_inside_comment_does_not_close_template() {
        let text = "<html><!-- </html> --><p>x</p></html>";
        assert_eq!(regions(text), vec![pair("html", "<!-- </html> --><p>x</p>")]);
    }

    #[test]
    fn end_tag_inside_script_string_does_not_close_template() {
        let text = "<html><script>const s = \"</html>\";</script><p>x</p></html>";
        assert_eq!(
            regions(text),
            vec![pair("html", "<script>const s = \"</html>\";</script><p>x</p>")]
        );
    }

    #[test]
    fn unterminated_script_falls_back_to_textual_end_tag() {
        let text = "<html><script>let a = 1;\n</html>";
        assert_eq!(regions(text), vec![pair("html", "<script>let a = 1;")]);
    }

    #[test]
    fn non_ascii_attribute_names_scan_cleanly() {
        let text = "<div aé=\"x\" oné=\"go()\"></div>";
        let found = scan(text, &ScanOptions::default());
        assert_eq!(found.len(), 1);
        assert_eq!(&text[found[0].span()], "go()");
    }

    #[test]
    fn regions_are_ordered_and_disjoint() {
        let text = "---\na: 1\n---\n<html><p/></html>\n<script lang=\"ts\">x</script>\n<style>a{}</style>\n<style lang=\"scss\">b{}</style>";
        let found = scan(text, &ScanOptions::default());
        assert_eq!(found.len(), 5);
        for pair in found.windows(2) {
            assert!(pair[0].end <= pair[1].start, "{:?}", pair);
        }
    }

    #[test]
    fn scanning_is_idempotent() {
        let text = "<style lang=\"scss\">a{}</style><html><b>x</b></html><script>y</script>";
        let options = ScanOptions::default();
        assert_eq!(scan(text, &options), scan(text, &options));
    }

    #[test]
    fn garbage_never_panics() {
        for text in ["<", "</", "<<>>", "<a =", "<a b='", "</x", "<!--", "<style", "<script>", "--- x", "<a/", "é<ü>ö</ü>", "<div aé=\"x\"></div>", "<p €x=\"1\">", "<a oé=1>"] {
            let _ = scan(text, &ScanOptions::default());
        }
    }
}
