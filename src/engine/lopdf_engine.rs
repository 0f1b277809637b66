//! The `lopdf` engine – typesets buffered HTML and assembles the PDF object
//! graph directly: one Type1 font object per face, compressed content
//! streams and RGB image XObjects.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::sections::{SectionBuffer, TypesetSettings};
use super::{orientation_from_code, DisplayMode, EngineKind, RenderEngine, Resolution};
use crate::config::{EngineConfig, LopdfOptions, LopdfSettings};
use crate::error::{EngineError, PdfError};
use crate::fonts::{encode_winansi, FontFace};
use crate::images::parse_data_uri;
use crate::layout_config::{DocumentLayout, PageItem};
use crate::paper::{Orientation, PageSize};
use crate::style::Color;

/// Pixels per point used until a resolution is set.
pub const DEFAULT_IMAGE_SCALE: f32 = 1.25;

pub struct LopdfEngine {
    settings: LopdfSettings,
    sections: SectionBuffer,
    image_scale: f32,
    display_mode: DisplayMode,
}

impl LopdfEngine {
    pub fn new(config: &EngineConfig) -> Result<Self, PdfError> {
        let settings = LopdfOptions::from_config(config)?.settings()?;
        log::debug!(
            "lopdf engine: {:?} {:?} in {:?}, {:?} {}pt",
            settings.page_size,
            settings.orientation,
            settings.unit,
            settings.font,
            settings.font_size
        );
        Ok(Self {
            settings,
            sections: SectionBuffer::default(),
            image_scale: DEFAULT_IMAGE_SCALE,
            display_mode: DisplayMode::Default,
        })
    }

    /// Current image scale in pixels per point.
    pub fn image_scale(&self) -> f32 {
        self.image_scale
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    fn page_size_pt(&self, size: PageSize, orientation: Orientation) -> (f32, f32) {
        size.resolve_pt(self.settings.unit, orientation)
    }

    fn default_size_pt(&self) -> (f32, f32) {
        self.page_size_pt(self.settings.page_size, self.settings.orientation)
    }

    fn typeset(&self) -> Result<DocumentLayout, EngineError> {
        let settings = TypesetSettings {
            font: self.settings.font,
            font_size: self.settings.font_size,
            margins: self.settings.margins,
            image_px_to_pt: Resolution::ImageScale(self.image_scale).px_to_pt(),
            title: self.settings.title.clone(),
        };
        self.sections.typeset(&settings, self.default_size_pt())
    }
}

impl RenderEngine for LopdfEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Lopdf
    }

    fn set_display_mode(&mut self, mode: DisplayMode) {
        self.display_mode = mode;
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
        self.image_scale = 1.0 / resolution.px_to_pt();
        log::debug!("lopdf engine: image scale = {}", self.image_scale);
    }

    fn output_bytes(&self) -> Result<Vec<u8>, EngineError> {
        let layout = self.typeset()?;
        let meta = Metadata {
            creator: &self.settings.creator,
            author: self.settings.author.as_deref(),
            display_mode: self.display_mode,
        };
        let bytes = LopdfWriter::new().write(&layout, &meta)?;
        log::debug!(
            "lopdf engine: {} page(s), {} bytes",
            layout.pages.len(),
            bytes.len()
        );
        Ok(bytes)
    }

    fn output_file(&self, path: &Path) -> Result<bool, EngineError> {
        let bytes = self.output_bytes()?;
        fs::write(path, &bytes)?;
        let written = fs::metadata(path)?.len();
        log::debug!("lopdf engine: wrote {written} bytes to {}", path.display());
        Ok(written == bytes.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

struct Metadata<'a> {
    creator: &'a str,
    author: Option<&'a str>,
    display_mode: DisplayMode,
}

struct LopdfWriter {
    document: Document,
    pages_id: ObjectId,
    /// Resource name and object id per font face, in first-use order.
    fonts: Vec<(FontFace, String, ObjectId)>,
    /// Resource name and object id per image source.
    images: HashMap<String, (String, ObjectId)>,
}

impl LopdfWriter {
    fn new() -> Self {
        let mut document = Document::with_version("1.7");
        let pages_id = document.new_object_id();
        Self {
            document,
            pages_id,
            fonts: Vec::new(),
            images: HashMap::new(),
        }
    }

    fn write(mut self, layout: &DocumentLayout, meta: &Metadata<'_>) -> Result<Vec<u8>, EngineError> {
        for src in layout.image_sources() {
            if let Err(e) = self.register_image(src) {
                log::warn!("Skipping image: {e}");
            }
        }

        let mut page_ids = Vec::with_capacity(layout.pages.len());
        let mut contents = Vec::with_capacity(layout.pages.len());
        for page in &layout.pages {
            let mut content = Content { operations: vec![] };
            for item in &page.items {
                self.push_item(&mut content.operations, item, page.height);
            }
            contents.push((page.width, page.height, content));
        }

        // Fonts are registered while drawing, so resources come after.
        let resources = self.resources();
        let resources_id = self.document.add_object(resources);
        for (width, height, content) in contents {
            let mut stream = Stream::new(Dictionary::new(), content.encode()?);
            stream.compress()?;
            let content_id = self.document.add_object(stream);
            let page_id = self.document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => self.pages_id,
                "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            page_ids.push(page_id);
        }

        let kids: Vec<Object> = page_ids.iter().map(|id| Object::from(*id)).collect();
        self.document.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_ids.len() as i64,
            }),
        );

        let mut catalog = dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        };
        if let (Some(first), Some(fit)) = (page_ids.first(), open_action_fit(meta.display_mode)) {
            catalog.set("OpenAction", vec![Object::from(*first), fit.into()]);
        }
        let catalog_id = self.document.add_object(catalog);
        self.document.trailer.set("Root", catalog_id);

        let mut info = dictionary! {
            "Creator" => Object::string_literal(meta.creator),
            "Producer" => Object::string_literal("duopdf"),
        };
        if let Some(author) = meta.author {
            info.set("Author", Object::string_literal(author));
        }
        if !layout.title.is_empty() {
            info.set("Title", Object::string_literal(layout.title.as_str()));
        }
        let info_id = self.document.add_object(info);
        self.document.trailer.set("Info", info_id);

        let mut bytes = Vec::new();
        self.document.save_to(&mut bytes)?;
        Ok(bytes)
    }

    fn resources(&self) -> Dictionary {
        let mut fonts = Dictionary::new();
        for (_, name, id) in &self.fonts {
            fonts.set(name.as_str(), *id);
        }
        let mut xobjects = Dictionary::new();
        for (name, id) in self.images.values() {
            xobjects.set(name.as_str(), *id);
        }
        dictionary! {
            "Font" => fonts,
            "XObject" => xobjects,
        }
    }

    fn font_name(&mut self, face: FontFace) -> String {
        if let Some((_, name, _)) = self.fonts.iter().find(|(f, _, _)| *f == face) {
            return name.clone();
        }
        let id = self.document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => face.postscript_name(),
            "Encoding" => "WinAnsiEncoding",
        });
        let name = format!("F{}", self.fonts.len() + 1);
        self.fonts.push((face, name.clone(), id));
        name
    }

    fn register_image(&mut self, src: &str) -> Result<(), String> {
        let bytes = parse_data_uri(src)?;
        let rgb = ::image::load_from_memory(&bytes)
            .map_err(|e| format!("decode error: {e}"))?
            .to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            rgb.into_raw(),
        );
        stream
            .compress()
            .map_err(|e| format!("compression error: {e}"))?;
        let id = self.document.add_object(stream);
        let name = format!("Im{}", self.images.len() + 1);
        self.images.insert(src.to_string(), (name, id));
        Ok(())
    }

    fn push_item(&mut self, ops: &mut Vec<Operation>, item: &PageItem, page_height: f32) {
        match item {
            PageItem::Text {
                x,
                baseline,
                text,
                face,
                size,
                color,
            } => {
                let font = self.font_name(*face);
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new(
                    "Tf",
                    vec![Object::Name(font.into_bytes()), (*size).into()],
                ));
                ops.push(fill_color(*color));
                ops.push(Operation::new(
                    "Td",
                    vec![(*x).into(), (page_height - baseline).into()],
                ));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::String(encode_winansi(text), StringFormat::Literal)],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            PageItem::Line {
                x1,
                y1,
                x2,
                y2,
                width,
                color,
            } => {
                ops.push(Operation::new("w", vec![(*width).into()]));
                ops.push(stroke_color(*color));
                ops.push(Operation::new("m", vec![(*x1).into(), (page_height - y1).into()]));
                ops.push(Operation::new("l", vec![(*x2).into(), (page_height - y2).into()]));
                ops.push(Operation::new("S", vec![]));
            }
            PageItem::Rect {
                x,
                y,
                width,
                height,
                line_width,
                color,
            } => {
                ops.push(Operation::new("w", vec![(*line_width).into()]));
                ops.push(stroke_color(*color));
                ops.push(Operation::new(
                    "re",
                    vec![
                        (*x).into(),
                        (page_height - y - height).into(),
                        (*width).into(),
                        (*height).into(),
                    ],
                ));
                ops.push(Operation::new("S", vec![]));
            }
            PageItem::Image {
                x,
                y,
                width,
                height,
                src,
            } => {
                let Some((name, _)) = self.images.get(src) else {
                    return;
                };
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        (*width).into(),
                        0.into(),
                        0.into(),
                        (*height).into(),
                        (*x).into(),
                        (page_height - y - height).into(),
                    ],
                ));
                ops.push(Operation::new(
                    "Do",
                    vec![Object::Name(name.clone().into_bytes())],
                ));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }
}

fn open_action_fit(mode: DisplayMode) -> Option<&'static str> {
    match mode {
        DisplayMode::FullPage => Some("Fit"),
        DisplayMode::FullWidth => Some("FitH"),
        DisplayMode::Real | DisplayMode::Default => None,
    }
}

fn fill_color(c: Color) -> Operation {
    Operation::new("rg", vec![c.r.into(), c.g.into(), c.b.into()])
}

fn stroke_color(c: Color) -> Operation {
    Operation::new("RG", vec![c.r.into(), c.g.into(), c.b.into()])
}
