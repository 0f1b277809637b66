//! Page items – the frozen representation between pagination and the PDF
//! writers. Coordinates are in points with the origin at the top-left of
//! the page; each writer flips them into PDF space.

use crate::fonts::FontFace;
use crate::style::Color;

/// A complete document layout ready for one of the writers.
#[derive(Debug, Clone, Default)]
pub struct DocumentLayout {
    /// Document title embedded in the PDF metadata.
    pub title: String,
    pub pages: Vec<PageLayout>,
}

impl DocumentLayout {
    /// Every distinct image source, in first-use order.
    pub fn image_sources(&self) -> Vec<&str> {
        let mut srcs: Vec<&str> = Vec::new();
        for page in &self.pages {
            for item in &page.items {
                if let PageItem::Image { src, .. } = item {
                    if !srcs.contains(&src.as_str()) {
                        srcs.push(src);
                    }
                }
            }
        }
        srcs
    }
}

/// One physical page.
#[derive(Debug, Clone)]
pub struct PageLayout {
    pub width: f32,
    pub height: f32,
    pub items: Vec<PageItem>,
}

impl PageLayout {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            items: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageItem {
    /// A run of text in one face, positioned by its baseline.
    Text {
        x: f32,
        baseline: f32,
        text: String,
        face: FontFace,
        size: f32,
        color: Color,
    },
    /// A stroked straight line (rules, underlines).
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        width: f32,
        color: Color,
    },
    /// A stroked rectangle (table cells). `y` is the top edge.
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        line_width: f32,
        color: Color,
    },
    /// A data-URI image. `y` is the top edge.
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        src: String,
    },
}
