//! The `printpdf` engine – typesets buffered HTML and emits it through the
//! printpdf ops API using the built-in base fonts.

use std::collections::HashMap;
use std::path::Path;

use printpdf::{
    BuiltinFont, Color, Line, LinePoint, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions,
    PdfWarnMsg, Point, Pt, RawImage, Rgb, TextItem, XObjectId, XObjectTransform,
};

use super::sections::{SectionBuffer, TypesetSettings};
use super::{orientation_from_code, EngineKind, RenderEngine, Resolution};
use crate::config::{EngineConfig, PrintpdfOptions, PrintpdfSettings};
use crate::error::{EngineError, PdfError};
use crate::fonts::{encode_winansi, FontFace, FontFamily};
use crate::images::parse_data_uri;
use crate::layout_config::{DocumentLayout, PageItem};
use crate::paper::{Orientation, PageSize, Unit};
use crate::style::Color as StyleColor;

/// Millimetres per point.
const MM_PER_PT: f32 = 25.4 / 72.0;

pub struct PrintpdfEngine {
    settings: PrintpdfSettings,
    sections: SectionBuffer,
    img_dpi: f32,
}

impl PrintpdfEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, PdfError> {
        let settings = PrintpdfOptions::from_config(config)?.settings()?;
        log::debug!(
            "printpdf engine: {:?} {:?}, {:?} {}pt, {} dpi",
            settings.page_size,
            settings.orientation,
            settings.font,
            settings.font_size,
            settings.img_dpi
        );
        Ok(Self {
            img_dpi: settings.img_dpi,
            settings,
            sections: SectionBuffer::default(),
        })
    }

    /// Current image resolution in pixels per inch.
    pub fn img_dpi(&self) -> f32 {
        self.img_dpi
    }

    fn page_size_pt(&self, size: PageSize, orientation: Orientation) -> (f32, f32) {
        size.resolve_pt(Unit::Mm, orientation)
    }

    fn default_size_pt(&self) -> (f32, f32) {
        self.page_size_pt(self.settings.page_size, self.settings.orientation)
    }

    fn typeset(&self) -> Result<DocumentLayout, EngineError> {
        let settings = TypesetSettings {
            font: self.settings.font,
            font_size: self.settings.font_size,
            margins: self.settings.margins,
            image_px_to_pt: 72.0 / self.img_dpi,
            title: self.settings.title.clone(),
        };
        self.sections.typeset(&settings, self.default_size_pt())
    }
}

impl RenderEngine for PrintpdfEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Printpdf
    }

    fn init_page(&mut self, orientation: &str, size: PageSize) {
        let orientation = orientation_from_code(self.kind(), orientation);
        let size_pt = self.page_size_pt(size, orientation);
        self.sections.open(size_pt);
    }

    fn write_html(&mut self, html: &str) {
        let default = self.default_size_pt();
        self.sections.write(html, default);
    }

    fn set_resolution(&mut self, resolution: Resolution) {
        self.img_dpi = 72.0 / resolution.px_to_pt();
        log::debug!("printpdf engine: img_dpi = {}", self.img_dpi);
    }

    fn output_bytes(&self) -> Result<Vec<u8>, EngineError> {
        let layout = self.typeset()?;
        let bytes = render_layout(&layout);
        log::debug!(
            "printpdf engine: {} page(s), {} bytes",
            layout.pages.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn output_file(&self, path: &Path) -> Result<bool, EngineError> {
        let bytes = self.output_bytes()?;
        std::fs::write(path, &bytes)?;
        log::debug!("printpdf engine: wrote {}", path.display());
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// A registered image and its pixel size.
struct ImageResource {
    xobj_id: XObjectId,
    px_width: u32,
    px_height: u32,
}

/// Emit a typeset document through printpdf.
///
/// Images that fail to decode are skipped with a warning.
fn render_layout(layout: &DocumentLayout) -> Vec<u8> {
    let mut doc = PdfDocument::new(&layout.title);
    let mut warnings: Vec<PdfWarnMsg> = Vec::new();

    let mut images: HashMap<&str, ImageResource> = HashMap::new();
    for src in layout.image_sources() {
        match register_image(&mut doc, src, &mut warnings) {
            Ok(resource) => {
                images.insert(src, resource);
            }
            Err(e) => log::warn!("Skipping image: {e}"),
        }
    }

    let pages: Vec<PdfPage> = layout
        .pages
        .iter()
        .map(|page| {
            let mut ops = Vec::new();
            for item in &page.items {
                push_item(&mut ops, item, page.height, &images);
            }
            PdfPage::new(Mm(page.width * MM_PER_PT), Mm(page.height * MM_PER_PT), ops)
        })
        .collect();

    doc.with_pages(pages);
    doc.save(&PdfSaveOptions::default(), &mut warnings)
}

fn register_image(
    doc: &mut PdfDocument,
    src: &str,
    warnings: &mut Vec<PdfWarnMsg>,
) -> Result<ImageResource, String> {
    let bytes = parse_data_uri(src)?;
    let decoded = ::image::load_from_memory(&bytes).map_err(|e| format!("decode error: {e}"))?;
    let raw = RawImage::decode_from_bytes(&bytes, warnings)
        .map_err(|e| format!("PDF encode error: {e}"))?;
    Ok(ImageResource {
        xobj_id: doc.add_image(&raw),
        px_width: decoded.width(),
        px_height: decoded.height(),
    })
}

fn builtin_font(face: FontFace) -> BuiltinFont {
    match (face.family, face.bold, face.italic) {
        (FontFamily::Helvetica, false, false) => BuiltinFont::Helvetica,
        (FontFamily::Helvetica, true, false) => BuiltinFont::HelveticaBold,
        (FontFamily::Helvetica, false, true) => BuiltinFont::HelveticaOblique,
        (FontFamily::Helvetica, true, true) => BuiltinFont::HelveticaBoldOblique,
        (FontFamily::Times, false, false) => BuiltinFont::TimesRoman,
        (FontFamily::Times, true, false) => BuiltinFont::TimesBold,
        (FontFamily::Times, false, true) => BuiltinFont::TimesItalic,
        (FontFamily::Times, true, true) => BuiltinFont::TimesBoldItalic,
        (FontFamily::Courier, false, false) => BuiltinFont::Courier,
        (FontFamily::Courier, true, false) => BuiltinFont::CourierBold,
        (FontFamily::Courier, false, true) => BuiltinFont::CourierOblique,
        (FontFamily::Courier, true, true) => BuiltinFont::CourierBoldOblique,
    }
}

fn pdf_color(color: StyleColor) -> Color {
    Color::Rgb(Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
        icc_profile: None,
    })
}

fn point(x: f32, y: f32) -> LinePoint {
    LinePoint {
        p: Point { x: Pt(x), y: Pt(y) },
        bezier: false,
    }
}

/// Builtin fonts use WinAnsiEncoding and printpdf copies the string bytes
/// into the content stream as-is, so the string carries WinAnsi bytes.
#[allow(unsafe_code)]
fn winansi_string(text: &str) -> String {
    let bytes = encode_winansi(text);
    // SAFETY: the bytes are never inspected as UTF-8; printpdf writes them
    // straight into the PDF string literal.
    unsafe { String::from_utf8_unchecked(bytes) }
}

fn push_item(
    ops: &mut Vec<Op>,
    item: &PageItem,
    page_height: f32,
    images: &HashMap<&str, ImageResource>,
) {
    match item {
        PageItem::Text {
            x,
            baseline,
            text,
            face,
            size,
            color,
        } => {
            let font = builtin_font(*face);
            ops.push(Op::StartTextSection);
            ops.push(Op::SetTextCursor {
                pos: Point {
                    x: Pt(*x),
                    y: Pt(page_height - baseline),
                },
            });
            ops.push(Op::SetFontSizeBuiltinFont {
                size: Pt(*size),
                font,
            });
            ops.push(Op::SetFillColor {
                col: pdf_color(*color),
            });
            ops.push(Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(winansi_string(text))],
                font,
            });
            ops.push(Op::EndTextSection);
        }
        PageItem::Line {
            x1,
            y1,
            x2,
            y2,
            width,
            color,
        } => {
            ops.push(Op::SetOutlineColor {
                col: pdf_color(*color),
            });
            ops.push(Op::SetOutlineThickness { pt: Pt(*width) });
            ops.push(Op::DrawLine {
                line: Line {
                    points: vec![
                        point(*x1, page_height - y1),
                        point(*x2, page_height - y2),
                    ],
                    is_closed: false,
                },
            });
        }
        PageItem::Rect {
            x,
            y,
            width,
            height,
            line_width,
            color,
        } => {
            let top = page_height - y;
            let bottom = top - height;
            ops.push(Op::SetOutlineColor {
                col: pdf_color(*color),
            });
            ops.push(Op::SetOutlineThickness {
                pt: Pt(*line_width),
            });
            ops.push(Op::DrawLine {
                line: Line {
                    points: vec![
                        point(*x, top),
                        point(x + width, top),
                        point(x + width, bottom),
                        point(*x, bottom),
                    ],
                    is_closed: true,
                },
            });
        }
        PageItem::Image {
            x,
            y,
            width,
            height,
            src,
        } => {
            let Some(res) = images.get(src.as_str()) else {
                return;
            };
            // At 72 dpi printpdf maps one pixel to one point.
            let scale = |target: f32, px: u32| if px > 0 { target / px as f32 } else { 1.0 };
            ops.push(Op::UseXobject {
                id: res.xobj_id.clone(),
                transform: XObjectTransform {
                    translate_x: Some(Pt(*x)),
                    translate_y: Some(Pt(page_height - y - height)),
                    dpi: Some(72.0),
                    scale_x: Some(scale(*width, res.px_width)),
                    scale_y: Some(scale(*height, res.px_height)),
                    rotate: None,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine(config: serde_json::Value) -> PrintpdfEngine {
        match config {
            serde_json::Value::Object(map) => PrintpdfEngine::new(&map).unwrap(),
            _ => panic!("config must be an object"),
        }
    }

    fn media_boxes(bytes: &[u8]) -> Vec<(f32, f32)> {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|id| {
                let page = doc.get_dictionary(*id).unwrap();
                let mb = page.get(b"MediaBox").unwrap().as_array().unwrap();
                (mb[2].as_float().unwrap(), mb[3].as_float().unwrap())
            })
            .collect()
    }

    #[test]
    fn empty_engine_renders_a_blank_a4_page() {
        let bytes = engine(json!({})).output_bytes().unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
        let boxes = media_boxes(&bytes);
        assert_eq!(boxes.len(), 1);
        assert!((boxes[0].0 - 595.28).abs() < 1.0);
    }

    #[test]
    fn init_page_understands_orientation_words() {
        let mut engine = engine(json!({}));
        engine.init_page("landscape", PageSize::Named(crate::paper::PaperFormat::A4));
        engine.write_html("<p>wide</p>");
        let boxes = media_boxes(&engine.output_bytes().unwrap());
        assert!(boxes[0].0 > boxes[0].1);
    }

    #[test]
    fn custom_sizes_are_millimetres() {
        let mut engine = engine(json!({}));
        engine.init_page("portrait", PageSize::Dimensions(100.0, 150.0));
        let boxes = media_boxes(&engine.output_bytes().unwrap());
        assert!((boxes[0].0 - 100.0 / MM_PER_PT).abs() < 1.0);
        assert!((boxes[0].1 - 150.0 / MM_PER_PT).abs() < 1.0);
    }

    #[test]
    fn resolution_sets_img_dpi() {
        let mut engine = engine(json!({ "img_dpi": 150 }));
        assert_eq!(engine.img_dpi(), 150.0);
        engine.set_resolution(Resolution::ImageDpi(300));
        assert!((engine.img_dpi() - 300.0).abs() < 1e-3);
    }

    #[test]
    fn renders_text_and_images() {
        let mut engine = engine(json!({ "title": "Images" }));
        let uri = crate::images::fixtures::png_data_uri(8, 8);
        engine.write_html(&format!(
            "<h1>Caf\u{e9}</h1><img src=\"{uri}\"><ul><li>item</li></ul><hr>"
        ));
        let bytes = engine.output_bytes().unwrap();
        assert_eq!(&bytes[0..5], b"%PDF-");
        assert!(bytes.len() > 500);
    }

    #[test]
    fn winansi_strings_keep_ascii_intact() {
        assert_eq!(winansi_string("plain"), "plain");
        assert_eq!(winansi_string("caf\u{e9}").len(), 4);
    }
}
