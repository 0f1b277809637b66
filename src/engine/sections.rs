//! Page sections – the HTML buffered by an engine between `init_page`
//! calls, and the typesetting pass that turns it into a [`DocumentLayout`].

use crate::dom::HtmlDocument;
use crate::error::EngineError;
use crate::fonts::FontFamily;
use crate::layout::collect_blocks;
use crate::layout_config::DocumentLayout;
use crate::pagination::{paginate, FlowSettings, Margins};
use crate::style::{ComputedStyle, Stylesheet};

/// Engine-independent inputs to the typesetter.
#[derive(Debug, Clone)]
pub(crate) struct TypesetSettings {
    pub font: FontFamily,
    pub font_size: f32,
    pub margins: Margins,
    pub image_px_to_pt: f32,
    /// Configured title; the first `<title>` element is used otherwise.
    pub title: Option<String>,
}

#[derive(Debug, Clone)]
struct PageSection {
    /// Oriented page size in points.
    size_pt: (f32, f32),
    chunks: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct SectionBuffer {
    sections: Vec<PageSection>,
}

impl SectionBuffer {
    /// Start a new section; following HTML flows onto pages of `size_pt`.
    pub fn open(&mut self, size_pt: (f32, f32)) {
        self.sections.push(PageSection {
            size_pt,
            chunks: Vec::new(),
        });
        log::debug!(
            "Opened page section {} ({:.1} x {:.1} pt)",
            self.sections.len(),
            size_pt.0,
            size_pt.1
        );
    }

    /// Append HTML to the current section, opening one of `default_size_pt`
    /// when nothing has been opened yet.
    pub fn write(&mut self, html: &str, default_size_pt: (f32, f32)) {
        if self.sections.is_empty() {
            self.open(default_size_pt);
        }
        if let Some(section) = self.sections.last_mut() {
            section.chunks.push(html.to_string());
        }
    }

    /// Parse and paginate every buffered chunk. Stylesheets accumulate in
    /// document order, so a `<style>` applies to its own chunk and every
    /// later one. An empty buffer yields one blank page of `default_size_pt`.
    pub fn typeset(
        &self,
        settings: &TypesetSettings,
        default_size_pt: (f32, f32),
    ) -> Result<DocumentLayout, EngineError> {
        let root = ComputedStyle::root(settings.font, settings.font_size);
        let mut sheet = Stylesheet::default();
        let mut title = settings.title.clone();
        let mut layout = DocumentLayout::default();

        let blank = [PageSection {
            size_pt: default_size_pt,
            chunks: Vec::new(),
        }];
        let sections = if self.sections.is_empty() {
            &blank[..]
        } else {
            &self.sections[..]
        };

        for section in sections {
            let mut blocks = Vec::new();
            for chunk in &section.chunks {
                let doc = HtmlDocument::parse(chunk)?;
                for css in &doc.stylesheets {
                    sheet.extend(css);
                }
                if title.is_none() {
                    title = doc.title;
                }
                blocks.extend(collect_blocks(&doc.body, &root, &sheet));
            }
            let flow = FlowSettings {
                page_width: section.size_pt.0,
                page_height: section.size_pt.1,
                margins: settings.margins,
                image_px_to_pt: settings.image_px_to_pt,
            };
            layout.pages.extend(paginate(&blocks, &flow));
        }

        layout.title = title.unwrap_or_default();
        log::debug!(
            "Typeset {} section(s) into {} page(s)",
            sections.len(),
            layout.pages.len()
        );
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A4: (f32, f32) = (595.28, 841.89);

    fn settings() -> TypesetSettings {
        TypesetSettings {
            font: FontFamily::Helvetica,
            font_size: 11.0,
            margins: Margins {
                top: 45.0,
                right: 42.5,
                bottom: 45.0,
                left: 42.5,
            },
            image_px_to_pt: 0.75,
            title: None,
        }
    }

    #[test]
    fn empty_buffer_is_one_blank_page() {
        let layout = SectionBuffer::default().typeset(&settings(), A4).unwrap();
        assert_eq!(layout.pages.len(), 1);
        assert_eq!(layout.pages[0].width, A4.0);
    }

    #[test]
    fn each_section_keeps_its_own_size() {
        let mut buffer = SectionBuffer::default();
        buffer.write("<p>first</p>", A4);
        buffer.open((841.89, 595.28));
        buffer.write("<p>second</p>", A4);
        let layout = buffer.typeset(&settings(), A4).unwrap();
        assert_eq!(layout.pages.len(), 2);
        assert!(layout.pages[1].width > layout.pages[1].height);
    }

    #[test]
    fn an_opened_section_without_html_is_a_blank_page() {
        let mut buffer = SectionBuffer::default();
        buffer.open(A4);
        buffer.open(A4);
        buffer.write("<p>x</p>", A4);
        let layout = buffer.typeset(&settings(), A4).unwrap();
        assert_eq!(layout.pages.len(), 2);
        assert!(layout.pages[0].items.is_empty());
    }

    #[test]
    fn title_comes_from_first_title_element() {
        let mut buffer = SectionBuffer::default();
        buffer.write("<html><head><title>Report</title></head><body>x</body></html>", A4);
        buffer.write("<title>Ignored</title>", A4);
        let layout = buffer.typeset(&settings(), A4).unwrap();
        assert_eq!(layout.title, "Report");

        let mut configured = settings();
        configured.title = Some("Configured".to_string());
        assert_eq!(buffer.typeset(&configured, A4).unwrap().title, "Configured");
    }

    #[test]
    fn styles_apply_to_later_chunks() {
        let mut buffer = SectionBuffer::default();
        buffer.write("<style>p { text-align: right }</style>", A4);
        buffer.write("<p>right</p>", A4);
        let layout = buffer.typeset(&settings(), A4).unwrap();
        match layout.pages[0].items.first() {
            Some(crate::layout_config::PageItem::Text { x, .. }) => assert!(*x > 400.0),
            other => panic!("Expected text, got {other:?}"),
        }
    }

    #[test]
    fn malformed_markup_is_an_engine_error() {
        let mut buffer = SectionBuffer::default();
        buffer.write("<p>open <!-- never closed", A4);
        assert!(matches!(
            buffer.typeset(&settings(), A4),
            Err(EngineError::Markup(_))
        ));
    }
}
