//! HTML parser – converts an HTML string into a simple DOM tree.
//!
//! The engines accept a controlled subset of HTML. The parser is forgiving
//! about structure (implicit closes, stray end tags) but rejects input it
//! cannot make sense of: unterminated tags, comments and raw-text elements,
//! and nesting beyond [`MAX_DEPTH`].

use std::collections::HashMap;

use crate::error::MarkupError;

/// Deepest element nesting the parser accepts.
pub const MAX_DEPTH: usize = 256;

// ---------------------------------------------------------------------------
// DOM types
// ---------------------------------------------------------------------------

/// The tag name of an element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Tag {
    Html,
    Head,
    Body,
    Title,
    Style,
    Script,
    Meta,
    Link,
    Div,
    P,
    /// `h1` … `h6`
    Heading(u8),
    Ul,
    Ol,
    Li,
    Blockquote,
    Pre,
    Table,
    Tr,
    Td,
    Th,
    Span,
    Strong,
    B,
    Em,
    I,
    U,
    A,
    Code,
    Br,
    Hr,
    Img,
    /// Catch-all for unknown tags – laid out as block containers.
    Unknown(String),
}

impl Tag {
    pub fn parse(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        match lower.as_str() {
            "html" => Tag::Html,
            "head" => Tag::Head,
            "body" => Tag::Body,
            "title" => Tag::Title,
            "style" => Tag::Style,
            "script" => Tag::Script,
            "meta" => Tag::Meta,
            "link" => Tag::Link,
            "div" => Tag::Div,
            "p" => Tag::P,
            "h1" => Tag::Heading(1),
            "h2" => Tag::Heading(2),
            "h3" => Tag::Heading(3),
            "h4" => Tag::Heading(4),
            "h5" => Tag::Heading(5),
            "h6" => Tag::Heading(6),
            "ul" => Tag::Ul,
            "ol" => Tag::Ol,
            "li" => Tag::Li,
            "blockquote" => Tag::Blockquote,
            "pre" => Tag::Pre,
            "table" => Tag::Table,
            "tr" => Tag::Tr,
            "td" => Tag::Td,
            "th" => Tag::Th,
            "span" => Tag::Span,
            "strong" => Tag::Strong,
            "b" => Tag::B,
            "em" => Tag::Em,
            "i" => Tag::I,
            "u" => Tag::U,
            "a" => Tag::A,
            "code" => Tag::Code,
            "br" => Tag::Br,
            "hr" => Tag::Hr,
            "img" => Tag::Img,
            _ => Tag::Unknown(lower),
        }
    }

    /// Lower-case tag name, used for selector matching.
    pub fn name(&self) -> String {
        match self {
            Tag::Heading(level) => format!("h{level}"),
            Tag::Unknown(name) => name.clone(),
            other => format!("{other:?}").to_ascii_lowercase(),
        }
    }

    /// Elements without content or end tag.
    pub fn is_void(&self) -> bool {
        matches!(self, Tag::Br | Tag::Hr | Tag::Img | Tag::Meta | Tag::Link)
    }

    /// Elements whose content is raw text up to the matching end tag.
    pub fn is_raw_text(&self) -> bool {
        matches!(self, Tag::Style | Tag::Script | Tag::Title)
    }

    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            Tag::Span | Tag::Strong | Tag::B | Tag::Em | Tag::I | Tag::U | Tag::A | Tag::Code | Tag::Br
        )
    }

    /// Tags never laid out as content.
    pub fn is_metadata(&self) -> bool {
        matches!(
            self,
            Tag::Head | Tag::Title | Tag::Style | Tag::Script | Tag::Meta | Tag::Link
        )
    }

    /// Whether an open `self` is implicitly closed when `incoming` starts.
    fn closed_by(&self, incoming: &Tag) -> bool {
        match self {
            Tag::P => !incoming.is_inline() && *incoming != Tag::Img,
            Tag::Li => *incoming == Tag::Li,
            Tag::Td | Tag::Th => matches!(incoming, Tag::Td | Tag::Th | Tag::Tr),
            Tag::Tr => *incoming == Tag::Tr,
            _ => false,
        }
    }
}

/// A node in the DOM tree.
#[derive(Debug, Clone)]
pub enum DomNode {
    Element(ElementNode),
    Text(String),
}

/// An element node carrying tag, attributes, and children.
#[derive(Debug, Clone)]
pub struct ElementNode {
    pub tag: Tag,
    pub attributes: HashMap<String, String>,
    pub children: Vec<DomNode>,
}

impl ElementNode {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            attributes: HashMap::new(),
            children: Vec::new(),
        }
    }

    pub fn classes(&self) -> Vec<&str> {
        self.attributes
            .get("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes.get("id").map(|s| s.as_str())
    }

    pub fn inline_style(&self) -> Option<&str> {
        self.attributes.get("style").map(|s| s.as_str())
    }

    pub fn src(&self) -> Option<&str> {
        self.attributes.get("src").map(|s| s.as_str())
    }

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }
}

fn collect_text(nodes: &[DomNode], out: &mut String) {
    for node in nodes {
        match node {
            DomNode::Text(t) => out.push_str(t),
            DomNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse an HTML string into a list of top-level DOM nodes.
pub fn parse_html(html: &str) -> Result<Vec<DomNode>, MarkupError> {
    Parser::new(html).run()
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    /// Open elements, innermost last.
    stack: Vec<ElementNode>,
    roots: Vec<DomNode>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            stack: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn run(mut self) -> Result<Vec<DomNode>, MarkupError> {
        while !self.eof() {
            if self.starts_with("<!--") {
                self.skip_comment()?;
            } else if self.starts_with("</") {
                self.parse_end_tag()?;
            } else if self.starts_with("<!") || self.starts_with("<?") {
                self.skip_declaration()?;
            } else if self.at_tag_start() {
                self.parse_start_tag()?;
            } else {
                self.parse_text();
            }
        }
        while let Some(open) = self.stack.pop() {
            self.attach(DomNode::Element(open));
        }
        Ok(self.roots)
    }

    /// `<` followed by a letter opens a tag; anything else is literal text.
    fn at_tag_start(&self) -> bool {
        let mut chars = self.rest().chars();
        chars.next() == Some('<') && chars.next().is_some_and(|c| c.is_ascii_alphabetic())
    }

    fn parse_text(&mut self) {
        let start = self.pos;
        self.advance_char();
        while !self.eof() && !self.starts_with("<") {
            self.advance_char();
        }
        let text = decode_entities(&self.input[start..self.pos]);
        self.attach(DomNode::Text(text));
    }

    fn parse_start_tag(&mut self) -> Result<(), MarkupError> {
        let tag_start = self.pos;
        self.pos += 1; // '<'
        let name = self.parse_name();
        let tag = Tag::parse(&name);
        let mut elem = ElementNode::new(tag.clone());

        let mut self_closing = false;
        loop {
            self.skip_whitespace();
            if self.eof() {
                return Err(self.error(format!("unterminated <{name}> tag"), tag_start));
            }
            if self.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if self.starts_with(">") {
                self.pos += 1;
                break;
            }
            if self.starts_with("/") {
                self.pos += 1;
                continue;
            }
            let (key, value) = self.parse_attribute(tag_start, &name)?;
            if !key.is_empty() {
                elem.attributes.entry(key).or_insert(value);
            }
        }

        while self.stack.last().is_some_and(|open| open.tag.closed_by(&tag)) {
            self.close_top();
        }

        if tag.is_void() || self_closing {
            self.attach(DomNode::Element(elem));
            return Ok(());
        }

        if tag.is_raw_text() {
            let body = self.take_raw_text(&name, tag_start)?;
            if !body.is_empty() {
                let text = if tag == Tag::Title {
                    decode_entities(&body)
                } else {
                    body
                };
                elem.children.push(DomNode::Text(text));
            }
            self.attach(DomNode::Element(elem));
            return Ok(());
        }

        if self.stack.len() >= MAX_DEPTH {
            return Err(self.error(
                format!("elements nested deeper than {MAX_DEPTH} levels"),
                tag_start,
            ));
        }
        self.stack.push(elem);
        Ok(())
    }

    fn parse_end_tag(&mut self) -> Result<(), MarkupError> {
        let tag_start = self.pos;
        self.pos += 2; // '</'
        let name = self.parse_name();
        match self.rest().find('>') {
            Some(offset) => self.pos += offset + 1,
            None => return Err(self.error(format!("unterminated </{name}> tag"), tag_start)),
        }
        let tag = Tag::parse(&name);
        // Stray end tags without a matching open element are ignored.
        if let Some(depth) = self.stack.iter().rposition(|open| open.tag == tag) {
            while self.stack.len() > depth {
                self.close_top();
            }
        }
        Ok(())
    }

    /// Consume everything up to `</name>` and return it verbatim.
    fn take_raw_text(&mut self, name: &str, tag_start: usize) -> Result<String, MarkupError> {
        let closing = format!("</{}", name.to_ascii_lowercase());
        let haystack = self.rest().to_ascii_lowercase();
        let Some(end) = haystack.find(&closing) else {
            return Err(self.error(format!("unterminated <{name}> element"), tag_start));
        };
        let body = self.rest()[..end].to_string();
        self.pos += end;
        match self.rest().find('>') {
            Some(offset) => self.pos += offset + 1,
            None => return Err(self.error(format!("unterminated </{name}> tag"), self.pos)),
        }
        Ok(body)
    }

    fn parse_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == ':' {
                self.advance_char();
            } else {
                break;
            }
        }
        self.input[start..self.pos].to_string()
    }

    fn parse_attribute(
        &mut self,
        tag_start: usize,
        tag_name: &str,
    ) -> Result<(String, String), MarkupError> {
        let key = self.parse_name().to_ascii_lowercase();
        if key.is_empty() {
            // Skip one garbage character so the attribute loop makes progress.
            self.advance_char();
            return Ok((String::new(), String::new()));
        }
        self.skip_whitespace();
        if !self.starts_with("=") {
            return Ok((key, String::new()));
        }
        self.pos += 1;
        self.skip_whitespace();
        let value = match self.current_char() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let Some(end) = self.rest().find(quote) else {
                    return Err(self.error(
                        format!("unterminated attribute value in <{tag_name}>"),
                        tag_start,
                    ));
                };
                let raw = &self.input[self.pos..self.pos + end];
                self.pos += end + 1;
                decode_entities(raw)
            }
            _ => {
                let start = self.pos;
                while let Some(c) = self.current_char() {
                    if c.is_whitespace() || c == '>' {
                        break;
                    }
                    self.advance_char();
                }
                decode_entities(&self.input[start..self.pos])
            }
        };
        Ok((key, value))
    }

    fn skip_comment(&mut self) -> Result<(), MarkupError> {
        let start = self.pos;
        match self.input[start + 4..].find("-->") {
            Some(end) => {
                self.pos = start + 4 + end + 3;
                Ok(())
            }
            None => Err(self.error("unterminated comment", start)),
        }
    }

    /// Doctype and processing instructions.
    fn skip_declaration(&mut self) -> Result<(), MarkupError> {
        let start = self.pos;
        match self.rest().find('>') {
            Some(end) => {
                self.pos += end + 1;
                Ok(())
            }
            None => Err(self.error("unterminated declaration", start)),
        }
    }

    fn close_top(&mut self) {
        if let Some(done) = self.stack.pop() {
            self.attach(DomNode::Element(done));
        }
    }

    fn attach(&mut self, node: DomNode) {
        match self.stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.roots.push(node),
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance_char();
        }
    }

    fn error(&self, message: impl Into<String>, offset: usize) -> MarkupError {
        MarkupError {
            message: message.into(),
            offset,
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn starts_with(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn current_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance_char(&mut self) {
        if let Some(c) = self.current_char() {
            self.pos += c.len_utf8();
        }
    }
}

/// Decode common named entities plus numeric references.
fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{00A0}'),
                "copy" => Some('\u{00A9}'),
                "euro" => Some('\u{20AC}'),
                "hellip" => Some('\u{2026}'),
                "mdash" => Some('\u{2014}'),
                "ndash" => Some('\u{2013}'),
                _ => numeric_entity(entity),
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn numeric_entity(entity: &str) -> Option<char> {
    let digits = entity.strip_prefix('#')?;
    let code = match digits.strip_prefix(['x', 'X']) {
        Some(hex) => u32::from_str_radix(hex, 16).ok()?,
        None => digits.parse().ok()?,
    };
    char::from_u32(code)
}

// ---------------------------------------------------------------------------
// Document view
// ---------------------------------------------------------------------------

/// A parsed HTML chunk split into the parts the engines care about.
#[derive(Debug, Clone, Default)]
pub struct HtmlDocument {
    pub title: Option<String>,
    /// Contents of every `<style>` element, in document order.
    pub stylesheets: Vec<String>,
    /// Content nodes: the children of `<body>`, or the whole fragment.
    pub body: Vec<DomNode>,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Result<Self, MarkupError> {
        let nodes = parse_html(html)?;
        let mut doc = HtmlDocument::default();
        collect_metadata(&nodes, &mut doc);
        doc.body = body_children(&nodes);
        Ok(doc)
    }
}

fn collect_metadata(nodes: &[DomNode], doc: &mut HtmlDocument) {
    for node in nodes {
        if let DomNode::Element(e) = node {
            match e.tag {
                Tag::Style => doc.stylesheets.push(e.text_content()),
                Tag::Title if doc.title.is_none() => {
                    let title = e.text_content().trim().to_string();
                    if !title.is_empty() {
                        doc.title = Some(title);
                    }
                }
                _ => collect_metadata(&e.children, doc),
            }
        }
    }
}

/// Find the `<body>` element and return its children, or return all nodes if
/// no `<body>` is present.
pub fn body_children(nodes: &[DomNode]) -> Vec<DomNode> {
    for node in nodes {
        if let DomNode::Element(e) = node {
            if e.tag == Tag::Body {
                return e.children.clone();
            }
            if e.tag == Tag::Html {
                return body_children(&e.children);
            }
        }
    }
    nodes.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(node: &DomNode) -> &ElementNode {
        match node {
            DomNode::Element(e) => e,
            DomNode::Text(t) => panic!("Expected element, got text {t:?}"),
        }
    }

    #[test]
    fn parse_simple_div() {
        let nodes = parse_html(r#"<div class="note wide"><p>Hello</p></div>"#).unwrap();
        assert_eq!(nodes.len(), 1);
        let div = element(&nodes[0]);
        assert_eq!(div.tag, Tag::Div);
        assert_eq!(div.classes(), vec!["note", "wide"]);
        assert_eq!(div.children.len(), 1);
    }

    #[test]
    fn parse_void_and_self_closing() {
        let nodes = parse_html(r#"<img src="logo.png"><br/><p>x</p>"#).unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(element(&nodes[0]).src(), Some("logo.png"));
        assert_eq!(element(&nodes[1]).tag, Tag::Br);
    }

    #[test]
    fn implicit_paragraph_and_list_closes() {
        let nodes = parse_html("<p>one<p>two<ul><li>a<li>b</ul>").unwrap();
        assert_eq!(nodes.len(), 3);
        let ul = element(&nodes[2]);
        assert_eq!(ul.children.len(), 2);
    }

    #[test]
    fn stray_end_tags_are_ignored() {
        let nodes = parse_html("<p>text</span></p>").unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(element(&nodes[0]).text_content(), "text");
    }

    #[test]
    fn entities_are_decoded() {
        let nodes = parse_html("<p>a &amp; b &#169; &#x41; &bogus;</p>").unwrap();
        assert_eq!(element(&nodes[0]).text_content(), "a & b \u{a9} A &bogus;");
    }

    #[test]
    fn raw_text_keeps_markup() {
        let nodes = parse_html("<style>p > b { color: red }</style>").unwrap();
        assert_eq!(element(&nodes[0]).text_content(), "p > b { color: red }");
    }

    #[test]
    fn malformed_markup_is_rejected() {
        assert!(parse_html("<p>open <!-- never closed").is_err());
        assert!(parse_html("<h1 class=\"x").is_err());
        assert!(parse_html("<style>p { color: red }").is_err());
        let deep = "<div>".repeat(MAX_DEPTH + 1);
        let err = parse_html(&deep).unwrap_err();
        assert!(err.message.contains("nested"));
    }

    #[test]
    fn lone_angle_bracket_is_text() {
        let nodes = parse_html("<p>1 < 2</p>").unwrap();
        assert_eq!(element(&nodes[0]).text_content(), "1 < 2");
    }

    #[test]
    fn document_view_splits_head_and_body() {
        let doc = HtmlDocument::parse(
            "<html><head><title>Report</title><style>h1{color:red}</style></head>\
             <body><h1>Hi</h1></body></html>",
        )
        .unwrap();
        assert_eq!(doc.title.as_deref(), Some("Report"));
        assert_eq!(doc.stylesheets, vec!["h1{color:red}".to_string()]);
        assert_eq!(doc.body.len(), 1);
    }
}
