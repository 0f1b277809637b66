//! Block collection – walks a styled DOM and flattens it into a sequence of
//! blocks (paragraph-like text, table rows, images, rules) separated by
//! vertical gaps. Pagination turns the blocks into positioned page items.

use crate::dom::{DomNode, ElementNode, Tag};
use crate::images;
use crate::style::{resolve_style, ComputedStyle, Stylesheet};

/// A styled piece of inline text.
#[derive(Debug, Clone)]
pub struct Run {
    pub text: String,
    pub style: ComputedStyle,
    /// A forced line break (`<br>`); `text` is empty.
    pub line_break: bool,
}

/// Inline content laid out as one wrapped paragraph.
#[derive(Debug, Clone)]
pub struct TextBlock {
    pub runs: Vec<Run>,
    /// Style of the enclosing block element (alignment, line height).
    pub style: ComputedStyle,
    /// Left indent in points, relative to the content box.
    pub indent: f32,
    /// List bullet or number drawn left of the first line.
    pub marker: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageBlock {
    pub src: String,
    pub width_px: u32,
    pub height_px: u32,
    /// Requested size in pixels from the `width`/`height` attributes.
    pub requested_width: Option<f32>,
    pub requested_height: Option<f32>,
    pub indent: f32,
}

/// A table row; every cell gets an equal share of the width.
#[derive(Debug, Clone)]
pub struct RowBlock {
    pub cells: Vec<TextBlock>,
    pub indent: f32,
}

#[derive(Debug, Clone)]
pub enum Block {
    Text(TextBlock),
    Image(ImageBlock),
    Rule { style: ComputedStyle, indent: f32 },
    Row(RowBlock),
    /// Vertical space; adjacent gaps collapse to the largest.
    Gap(f32),
}

/// Flatten `nodes` into blocks.
pub fn collect_blocks(nodes: &[DomNode], root: &ComputedStyle, sheet: &Stylesheet) -> Vec<Block> {
    let mut collector = BlockCollector {
        sheet,
        blocks: Vec::new(),
        runs: Vec::new(),
        contexts: vec![BlockContext {
            style: root.clone(),
            indent: 0.0,
            marker: None,
        }],
        lists: Vec::new(),
    };
    for node in nodes {
        collector.visit(node, root);
    }
    collector.flush();
    collector.blocks
}

struct BlockContext {
    style: ComputedStyle,
    indent: f32,
    marker: Option<String>,
}

struct ListState {
    ordered: bool,
    counter: u32,
}

struct BlockCollector<'a> {
    sheet: &'a Stylesheet,
    blocks: Vec<Block>,
    /// Inline runs waiting for the end of the current block.
    runs: Vec<Run>,
    contexts: Vec<BlockContext>,
    lists: Vec<ListState>,
}

impl BlockCollector<'_> {
    fn indent(&self) -> f32 {
        self.contexts.last().map(|c| c.indent).unwrap_or(0.0)
    }

    fn visit(&mut self, node: &DomNode, parent: &ComputedStyle) {
        let element = match node {
            DomNode::Text(text) => {
                self.runs.push(Run {
                    text: text.clone(),
                    style: parent.clone(),
                    line_break: false,
                });
                return;
            }
            DomNode::Element(e) => e,
        };

        let style = resolve_style(element, parent, self.sheet);
        if style.hidden {
            return;
        }

        match element.tag {
            Tag::Br => self.runs.push(Run {
                text: String::new(),
                style,
                line_break: true,
            }),
            Tag::Img => {
                self.flush();
                self.push_image(element);
            }
            Tag::Hr => {
                self.flush();
                let indent = self.indent() + style.margin_left;
                self.blocks.push(Block::Gap(style.margin_top));
                self.blocks.push(Block::Rule {
                    style: style.clone(),
                    indent,
                });
                self.blocks.push(Block::Gap(style.margin_bottom));
            }
            Tag::Tr => {
                self.flush();
                self.push_row(element, &style);
            }
            ref tag if tag.is_inline() => {
                for child in &element.children {
                    self.visit(child, &style);
                }
            }
            ref tag => {
                let list = match tag {
                    Tag::Ul => Some(false),
                    Tag::Ol => Some(true),
                    _ => None,
                };
                let marker = (*tag == Tag::Li).then(|| self.next_marker());
                self.visit_block(element, style, list, marker);
            }
        }
    }

    fn visit_block(
        &mut self,
        element: &ElementNode,
        style: ComputedStyle,
        list: Option<bool>,
        marker: Option<String>,
    ) {
        self.flush();
        self.blocks.push(Block::Gap(style.margin_top));
        if let Some(ordered) = list {
            self.lists.push(ListState {
                ordered,
                counter: 0,
            });
        }
        let margin_bottom = style.margin_bottom;
        self.contexts.push(BlockContext {
            indent: self.indent() + style.margin_left,
            style: style.clone(),
            marker,
        });
        for child in &element.children {
            self.visit(child, &style);
        }
        self.flush();
        self.contexts.pop();
        if list.is_some() {
            self.lists.pop();
        }
        self.blocks.push(Block::Gap(margin_bottom));
    }

    fn next_marker(&mut self) -> String {
        match self.lists.last_mut() {
            Some(list) if list.ordered => {
                list.counter += 1;
                format!("{}.", list.counter)
            }
            _ => "\u{2022}".to_string(),
        }
    }

    /// Turn the pending runs into a text block owned by the innermost
    /// block context.
    fn flush(&mut self) {
        if self.runs.is_empty() {
            return;
        }
        let runs = std::mem::take(&mut self.runs);
        let Some(context) = self.contexts.last_mut() else {
            return;
        };
        let has_content = runs
            .iter()
            .any(|r| r.line_break || r.style.preformatted || !r.text.trim().is_empty());
        if !has_content {
            return;
        }
        self.blocks.push(Block::Text(TextBlock {
            runs,
            style: context.style.clone(),
            indent: context.indent,
            marker: context.marker.take(),
        }));
    }

    fn push_image(&mut self, element: &ElementNode) {
        let src = element.src().unwrap_or_default();
        let (width_px, height_px) = match images::pixel_size(src) {
            Ok(size) => size,
            Err(e) => {
                log::warn!("Skipping image: {e}");
                return;
            }
        };
        let requested = |name: &str| {
            element
                .attributes
                .get(name)
                .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
                .filter(|v| *v > 0.0)
        };
        self.blocks.push(Block::Image(ImageBlock {
            src: src.to_string(),
            width_px,
            height_px,
            requested_width: requested("width"),
            requested_height: requested("height"),
            indent: self.indent(),
        }));
    }

    fn push_row(&mut self, row: &ElementNode, row_style: &ComputedStyle) {
        let cells: Vec<TextBlock> = row
            .children
            .iter()
            .filter_map(|child| match child {
                DomNode::Element(cell) if matches!(cell.tag, Tag::Td | Tag::Th) => {
                    let style = resolve_style(cell, row_style, self.sheet);
                    let mut runs = Vec::new();
                    self.inline_runs(&cell.children, &style, &mut runs);
                    // A trailing break would leave an empty last line.
                    if runs.last().is_some_and(|r| r.line_break) {
                        runs.pop();
                    }
                    Some(TextBlock {
                        runs,
                        style,
                        indent: 0.0,
                        marker: None,
                    })
                }
                _ => None,
            })
            .collect();
        if !cells.is_empty() {
            self.blocks.push(Block::Row(RowBlock {
                cells,
                indent: self.indent(),
            }));
        }
    }

    /// Cell content is flattened to inline runs; nested blocks end a line.
    fn inline_runs(&self, nodes: &[DomNode], parent: &ComputedStyle, out: &mut Vec<Run>) {
        for node in nodes {
            match node {
                DomNode::Text(text) => out.push(Run {
                    text: text.clone(),
                    style: parent.clone(),
                    line_break: false,
                }),
                DomNode::Element(e) => {
                    let style = resolve_style(e, parent, self.sheet);
                    if style.hidden {
                        continue;
                    }
                    let block = !e.tag.is_inline();
                    self.inline_runs(&e.children, &style, out);
                    if block || e.tag == Tag::Br {
                        out.push(Run {
                            text: String::new(),
                            style,
                            line_break: true,
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse_html;
    use crate::fonts::FontFamily;

    fn blocks(html: &str) -> Vec<Block> {
        let dom = parse_html(html).unwrap();
        collect_blocks(
            &dom,
            &ComputedStyle::root(FontFamily::Helvetica, 12.0),
            &Stylesheet::default(),
        )
    }

    fn text_blocks(blocks: &[Block]) -> Vec<&TextBlock> {
        blocks
            .iter()
            .filter_map(|b| match b {
                Block::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn paragraphs_become_text_blocks() {
        let blocks = blocks("<h1>Title</h1><p>Hello <b>world</b></p>");
        let texts = text_blocks(&blocks);
        assert_eq!(texts.len(), 2);
        assert!(texts[0].style.bold);
        assert_eq!(texts[1].runs.len(), 2);
        assert!(texts[1].runs[1].style.bold);
    }

    #[test]
    fn whitespace_between_blocks_is_dropped() {
        let blocks = blocks("<div>\n  <p>a</p>\n  <p>b</p>\n</div>");
        assert_eq!(text_blocks(&blocks).len(), 2);
    }

    #[test]
    fn list_items_get_markers() {
        let blocks = blocks("<ol><li>one</li><li>two</li></ol><ul><li>dot</li></ul>");
        let markers: Vec<Option<String>> = text_blocks(&blocks)
            .iter()
            .map(|t| t.marker.clone())
            .collect();
        assert_eq!(
            markers,
            vec![
                Some("1.".to_string()),
                Some("2.".to_string()),
                Some("\u{2022}".to_string())
            ]
        );
        assert!(text_blocks(&blocks)[0].indent > 0.0);
    }

    #[test]
    fn table_rows_collect_cells() {
        let blocks = blocks("<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>");
        let rows: Vec<&RowBlock> = blocks
            .iter()
            .filter_map(|b| match b {
                Block::Row(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells.len(), 2);
        assert!(rows[0].cells[0].style.bold);
    }

    #[test]
    fn head_content_is_not_laid_out() {
        let blocks = blocks("<html><head><title>T</title></head><p>x</p></html>");
        assert_eq!(text_blocks(&blocks).len(), 1);
    }

    #[test]
    fn non_data_images_are_skipped() {
        let blocks = blocks(r#"<img src="logo.png"><p>after</p>"#);
        assert!(!blocks.iter().any(|b| matches!(b, Block::Image(_))));
    }

    #[test]
    fn data_images_keep_pixel_size() {
        let uri = crate::images::fixtures::png_data_uri(40, 10);
        let blocks = blocks(&format!(r#"<img src="{uri}" width="80">"#));
        match blocks.iter().find(|b| matches!(b, Block::Image(_))) {
            Some(Block::Image(img)) => {
                assert_eq!((img.width_px, img.height_px), (40, 10));
                assert_eq!(img.requested_width, Some(80.0));
            }
            _ => panic!("Expected an image block"),
        }
    }
}
