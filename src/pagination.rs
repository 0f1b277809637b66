//! Pagination – wraps text blocks into lines and flows every block down the
//! page, starting a new page whenever the next line, row or image would
//! cross the bottom margin.

use crate::layout::{Block, ImageBlock, RowBlock, Run, TextBlock};
use crate::layout_config::{PageItem, PageLayout};
use crate::style::{Color, ComputedStyle, TextAlign};

/// Inner padding of a table cell in points.
pub const CELL_PADDING_PT: f32 = 4.0;
const CELL_BORDER_PT: f32 = 0.5;
const RULE_WIDTH_PT: f32 = 0.75;
const CELL_BORDER_COLOR: Color = Color {
    r: 0.6,
    g: 0.6,
    b: 0.6,
};

/// Page margins in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

/// Geometry of the pages a section is flowed into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSettings {
    pub page_width: f32,
    pub page_height: f32,
    pub margins: Margins,
    /// Points per image pixel; derived from the engine's resolution setting.
    pub image_px_to_pt: f32,
}

impl FlowSettings {
    fn content_width(&self) -> f32 {
        (self.page_width - self.margins.left - self.margins.right).max(1.0)
    }

    fn content_height(&self) -> f32 {
        (self.page_height - self.margins.top - self.margins.bottom).max(1.0)
    }

    fn bottom(&self) -> f32 {
        self.page_height - self.margins.bottom
    }
}

/// A contiguous piece of one line drawn in a single style.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Offset from the start of the line.
    pub x: f32,
    pub text: String,
    pub style: ComputedStyle,
    pub width: f32,
}

#[derive(Debug, Clone)]
pub struct Line {
    pub fragments: Vec<Fragment>,
    pub width: f32,
    pub height: f32,
    /// Largest font size on the line; positions the baseline.
    pub max_size: f32,
}

impl Line {
    fn empty(block_style: &ComputedStyle) -> Self {
        Self {
            fragments: Vec::new(),
            width: 0.0,
            height: block_style.line_height_pt(),
            max_size: block_style.font_size,
        }
    }
}

fn same_look(a: &ComputedStyle, b: &ComputedStyle) -> bool {
    a.face() == b.face() && a.font_size == b.font_size && a.color == b.color && a.underline == b.underline
}

struct LineBuilder<'a> {
    block_style: &'a ComputedStyle,
    max_width: f32,
    lines: Vec<Line>,
    current: Line,
}

impl<'a> LineBuilder<'a> {
    fn new(block_style: &'a ComputedStyle, max_width: f32) -> Self {
        Self {
            block_style,
            max_width,
            lines: Vec::new(),
            current: Line::empty(block_style),
        }
    }

    fn is_empty(&self) -> bool {
        self.current.fragments.is_empty()
    }

    fn finish_line(&mut self) {
        let line = std::mem::replace(&mut self.current, Line::empty(self.block_style));
        self.lines.push(line);
    }

    fn push(&mut self, text: &str, style: &ComputedStyle, space_before: bool) {
        let face = style.face();
        let width = face.measure(text, style.font_size);
        let mut gap = if space_before && !self.is_empty() {
            face.measure(" ", style.font_size)
        } else {
            0.0
        };
        if !self.is_empty() && self.current.width + gap + width > self.max_width {
            self.finish_line();
            gap = 0.0;
        }

        let first = self.is_empty();
        let line = &mut self.current;
        if first {
            line.height = style.line_height_pt();
            line.max_size = style.font_size;
        } else {
            line.height = line.height.max(style.line_height_pt());
            line.max_size = line.max_size.max(style.font_size);
        }

        match line.fragments.last_mut() {
            Some(last) if same_look(&last.style, style) => {
                if gap > 0.0 {
                    last.text.push(' ');
                }
                last.text.push_str(text);
                last.width += gap + width;
            }
            _ => line.fragments.push(Fragment {
                x: line.width + gap,
                text: text.to_string(),
                style: style.clone(),
                width,
            }),
        }
        line.width += gap + width;
    }

    /// Push a word, breaking it between characters when it is wider than a
    /// whole line.
    fn push_word(&mut self, word: &str, style: &ComputedStyle, space_before: bool) {
        let face = style.face();
        if face.measure(word, style.font_size) <= self.max_width {
            self.push(word, style, space_before);
            return;
        }
        let mut space_before = space_before;
        let mut start = 0;
        let mut width = 0.0;
        for (i, c) in word.char_indices() {
            let advance = face.measure(c.encode_utf8(&mut [0; 4]), style.font_size);
            if i > start && width + advance > self.max_width {
                self.push(&word[start..i], style, space_before);
                space_before = false;
                start = i;
                width = 0.0;
            }
            width += advance;
        }
        self.push(&word[start..], style, space_before);
    }
}

/// Break inline runs into lines no wider than `max_width`.
///
/// Whitespace collapses to single spaces except in preformatted runs, which
/// keep their spacing and break only at newlines.
pub fn wrap_runs(runs: &[Run], max_width: f32, block_style: &ComputedStyle) -> Vec<Line> {
    let mut builder = LineBuilder::new(block_style, max_width);
    let mut space_pending = false;

    for run in runs {
        if run.line_break {
            builder.finish_line();
            space_pending = false;
            continue;
        }
        if run.style.preformatted {
            for (i, segment) in run.text.split('\n').enumerate() {
                if i > 0 {
                    builder.finish_line();
                }
                let segment = segment.replace('\t', "    ");
                if !segment.is_empty() {
                    builder.push(&segment, &run.style, false);
                }
            }
            space_pending = false;
            continue;
        }

        if run.text.starts_with(char::is_whitespace) {
            space_pending = true;
        }
        for word in run.text.split_whitespace() {
            builder.push_word(word, &run.style, space_pending);
            space_pending = true;
        }
        space_pending = run.text.ends_with(char::is_whitespace) || (space_pending && run.text.trim().is_empty());
    }

    if !builder.is_empty() {
        builder.finish_line();
    }
    builder.lines
}

/// Flow `blocks` into pages. Always returns at least one page so an empty
/// section still produces a blank page.
pub fn paginate(blocks: &[Block], settings: &FlowSettings) -> Vec<PageLayout> {
    let mut flow = Flow {
        settings,
        pages: Vec::new(),
        page: PageLayout::new(settings.page_width, settings.page_height),
        y: settings.margins.top,
        pending_gap: 0.0,
    };
    for block in blocks {
        match block {
            Block::Gap(gap) => flow.pending_gap = flow.pending_gap.max(*gap),
            Block::Text(text) => {
                flow.apply_gap();
                flow.place_text(text);
            }
            Block::Row(row) => {
                flow.apply_gap();
                flow.place_row(row);
            }
            Block::Image(image) => {
                flow.apply_gap();
                flow.place_image(image);
            }
            Block::Rule { style, indent } => {
                flow.apply_gap();
                flow.place_rule(style, *indent);
            }
        }
    }
    flow.pages.push(flow.page);
    flow.pages
}

struct Flow<'a> {
    settings: &'a FlowSettings,
    pages: Vec<PageLayout>,
    page: PageLayout,
    /// Top of the next item, from the top edge of the page.
    y: f32,
    pending_gap: f32,
}

impl Flow<'_> {
    fn at_top(&self) -> bool {
        self.y <= self.settings.margins.top
    }

    fn new_page(&mut self) {
        let page = std::mem::replace(
            &mut self.page,
            PageLayout::new(self.settings.page_width, self.settings.page_height),
        );
        self.pages.push(page);
        self.y = self.settings.margins.top;
        log::trace!("Starting page {}", self.pages.len() + 1);
    }

    /// Make room for `height`, breaking the page unless already at the top.
    fn reserve(&mut self, height: f32) {
        if self.y + height > self.settings.bottom() && !self.at_top() {
            self.new_page();
        }
    }

    /// Collapsed margins vanish at the top of a page.
    fn apply_gap(&mut self) {
        let gap = std::mem::take(&mut self.pending_gap);
        if !self.at_top() {
            self.y += gap;
        }
    }

    fn place_text(&mut self, block: &TextBlock) {
        let x = self.settings.margins.left + block.indent;
        let width = (self.settings.content_width() - block.indent).max(1.0);
        let lines = wrap_runs(&block.runs, width, &block.style);
        for (i, line) in lines.iter().enumerate() {
            self.reserve(line.height);
            if i == 0 {
                if let Some(marker) = &block.marker {
                    self.place_marker(marker, x, line, &block.style);
                }
            }
            let y = self.y;
            emit_line(&mut self.page.items, line, x, y, width, block.style.text_align);
            self.y += line.height;
        }
    }

    fn place_marker(&mut self, marker: &str, x: f32, line: &Line, style: &ComputedStyle) {
        let face = style.face();
        let marker_width = face.measure(marker, style.font_size);
        self.page.items.push(PageItem::Text {
            x: (x - marker_width - style.font_size * 0.5).max(0.0),
            baseline: baseline(self.y, line),
            text: marker.to_string(),
            face,
            size: style.font_size,
            color: style.color,
        });
    }

    /// Place a table row. A row taller than the content area is split
    /// between cell lines, each page getting its own set of cell borders.
    fn place_row(&mut self, row: &RowBlock) {
        let x0 = self.settings.margins.left + row.indent;
        let total = (self.settings.content_width() - row.indent).max(1.0);
        let col_width = total / row.cells.len() as f32;
        let inner = (col_width - 2.0 * CELL_PADDING_PT).max(1.0);

        let wrapped: Vec<Vec<Line>> = row
            .cells
            .iter()
            .map(|cell| wrap_runs(&cell.runs, inner, &cell.style))
            .collect();
        let min_height = row
            .cells
            .iter()
            .map(|cell| cell.style.line_height_pt())
            .fold(0.0f32, f32::max);
        let row_height = wrapped
            .iter()
            .map(|lines| lines.iter().map(|l| l.height).sum::<f32>())
            .fold(min_height, f32::max)
            + 2.0 * CELL_PADDING_PT;

        if row_height <= self.settings.content_height() {
            self.reserve(row_height);
        }

        let mut starts = vec![0usize; wrapped.len()];
        let mut first = true;
        loop {
            let avail = self.settings.bottom() - self.y - 2.0 * CELL_PADDING_PT;
            let at_top = self.at_top();
            let ends: Vec<usize> = wrapped
                .iter()
                .zip(&starts)
                .map(|(lines, &start)| {
                    let mut end = start;
                    let mut used = 0.0;
                    while end < lines.len()
                        && (used + lines[end].height <= avail || (end == start && at_top))
                    {
                        used += lines[end].height;
                        end += 1;
                    }
                    end
                })
                .collect();

            let remaining = wrapped.iter().zip(&starts).any(|(l, &s)| s < l.len());
            let progressed = ends.iter().zip(&starts).any(|(e, s)| e > s);
            if remaining && !progressed && !at_top {
                self.new_page();
                continue;
            }

            let used = wrapped
                .iter()
                .zip(starts.iter().zip(&ends))
                .map(|(lines, (&s, &e))| lines[s..e].iter().map(|l| l.height).sum::<f32>())
                .fold(0.0f32, f32::max);
            let text_height = if first {
                used.max(min_height.min(avail.max(used)))
            } else {
                used
            };
            let segment_height = text_height + 2.0 * CELL_PADDING_PT;

            let top = self.y;
            for (col, (cell, lines)) in row.cells.iter().zip(&wrapped).enumerate() {
                let cell_x = x0 + col as f32 * col_width;
                self.page.items.push(PageItem::Rect {
                    x: cell_x,
                    y: top,
                    width: col_width,
                    height: segment_height,
                    line_width: CELL_BORDER_PT,
                    color: CELL_BORDER_COLOR,
                });
                let mut y = top + CELL_PADDING_PT;
                for line in &lines[starts[col]..ends[col]] {
                    emit_line(
                        &mut self.page.items,
                        line,
                        cell_x + CELL_PADDING_PT,
                        y,
                        inner,
                        cell.style.text_align,
                    );
                    y += line.height;
                }
            }
            self.y += segment_height;

            starts = ends;
            first = false;
            if wrapped.iter().zip(&starts).all(|(l, &s)| s >= l.len()) {
                break;
            }
            log::trace!("Splitting table row across pages");
            self.new_page();
        }
    }

    fn place_image(&mut self, image: &ImageBlock) {
        let (w_px, h_px) = (image.width_px as f32, image.height_px as f32);
        let (mut w_px_out, mut h_px_out) = match (image.requested_width, image.requested_height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * h_px / w_px.max(1.0)),
            (None, Some(h)) => (h * w_px / h_px.max(1.0), h),
            (None, None) => (w_px, h_px),
        };
        w_px_out *= self.settings.image_px_to_pt;
        h_px_out *= self.settings.image_px_to_pt;

        let max_w = (self.settings.content_width() - image.indent).max(1.0);
        let max_h = self.settings.content_height();
        let fit = (max_w / w_px_out).min(max_h / h_px_out).min(1.0);
        let (width, height) = (w_px_out * fit, h_px_out * fit);

        self.reserve(height);
        self.page.items.push(PageItem::Image {
            x: self.settings.margins.left + image.indent,
            y: self.y,
            width,
            height,
            src: image.src.clone(),
        });
        self.y += height;
    }

    fn place_rule(&mut self, style: &ComputedStyle, indent: f32) {
        self.reserve(RULE_WIDTH_PT);
        let y = self.y + RULE_WIDTH_PT / 2.0;
        self.page.items.push(PageItem::Line {
            x1: self.settings.margins.left + indent,
            y1: y,
            x2: self.settings.page_width - self.settings.margins.right,
            y2: y,
            width: RULE_WIDTH_PT,
            color: style.color,
        });
        self.y += RULE_WIDTH_PT;
    }
}

fn baseline(top: f32, line: &Line) -> f32 {
    top + (line.height - line.max_size) / 2.0 + line.max_size * 0.8
}

fn emit_line(items: &mut Vec<PageItem>, line: &Line, x: f32, top: f32, width: f32, align: TextAlign) {
    let offset = match align {
        TextAlign::Left => 0.0,
        TextAlign::Right => (width - line.width).max(0.0),
        TextAlign::Center => ((width - line.width) / 2.0).max(0.0),
    };
    let base = baseline(top, line);
    for frag in &line.fragments {
        let fx = x + offset + frag.x;
        items.push(PageItem::Text {
            x: fx,
            baseline: base,
            text: frag.text.clone(),
            face: frag.style.face(),
            size: frag.style.font_size,
            color: frag.style.color,
        });
        if frag.style.underline {
            let uy = base + frag.style.font_size * 0.1;
            items.push(PageItem::Line {
                x1: fx,
                y1: uy,
                x2: fx + frag.width,
                y2: uy,
                width: (frag.style.font_size * 0.05).max(0.5),
                color: frag.style.color,
            });
        }
    }
}
