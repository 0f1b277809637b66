//! Rendering engines – the two interchangeable HTML → PDF backends behind
//! [`RenderEngine`].
//!
//! Each engine keeps its own conventions: `printpdf` speaks orientation
//! words and millimetres and sizes images by DPI, `lopdf` speaks
//! orientation letters and a configurable unit and sizes images by a scale
//! factor. [`DocumentBuilder`](crate::DocumentBuilder) translates between
//! the caller's vocabulary and the engine's.

pub mod lopdf_engine;
pub mod printpdf_engine;
pub(crate) mod sections;

use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::str::FromStr;

use crate::config::EngineConfig;
use crate::error::{EngineError, PdfError};
use crate::paper::{Orientation, PageSize};

pub use lopdf_engine::LopdfEngine;
pub use printpdf_engine::PrintpdfEngine;

/// The engines a builder can be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineKind {
    Printpdf,
    Lopdf,
}

impl EngineKind {
    pub const ALL: [EngineKind; 2] = [EngineKind::Printpdf, EngineKind::Lopdf];

    pub fn name(self) -> &'static str {
        match self {
            EngineKind::Printpdf => "printpdf",
            EngineKind::Lopdf => "lopdf",
        }
    }

    /// Orientation in the engine's own vocabulary.
    pub fn orientation_code(self, orientation: Orientation) -> &'static str {
        match (self, orientation) {
            (EngineKind::Printpdf, Orientation::Portrait) => "portrait",
            (EngineKind::Printpdf, Orientation::Landscape) => "landscape",
            (EngineKind::Lopdf, Orientation::Portrait) => "P",
            (EngineKind::Lopdf, Orientation::Landscape) => "L",
        }
    }

    /// Instantiate the engine with its defaults overlaid by `config`.
    pub fn create(self, config: &EngineConfig) -> Result<Box<dyn RenderEngine>, PdfError> {
        Ok(match self {
            EngineKind::Printpdf => Box::new(PrintpdfEngine::new(config)?),
            EngineKind::Lopdf => Box::new(LopdfEngine::new(config)?),
        })
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EngineKind {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EngineKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = EngineKind::ALL.iter().map(|k| k.name()).collect();
                PdfError::invalid(format!("engine must be one of: {}", names.join(", ")))
            })
    }
}

/// How a viewer should initially present the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    #[default]
    Default,
    /// Fit the whole page in the window.
    FullPage,
    /// Fit the page width.
    FullWidth,
    /// Actual size.
    Real,
}

/// Image resolution in the engine's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution {
    /// Pixels per inch; an image pixel is `72 / dpi` points.
    ImageDpi(u32),
    /// Pixels per point; an image pixel is `1 / scale` points.
    ImageScale(f32),
}

impl Resolution {
    /// Size of one image pixel in points.
    pub fn px_to_pt(self) -> f32 {
        match self {
            Resolution::ImageDpi(dpi) => 72.0 / dpi.max(1) as f32,
            Resolution::ImageScale(scale) if scale > 0.0 => 1.0 / scale,
            Resolution::ImageScale(_) => 1.0,
        }
    }
}

/// An HTML → PDF backend.
///
/// Engines buffer HTML per page section and only typeset when output is
/// requested, so output may be produced any number of times.
pub trait RenderEngine {
    fn kind(&self) -> EngineKind;

    /// Engines without viewer preferences ignore the request.
    fn set_display_mode(&mut self, mode: DisplayMode) {
        log::trace!("{} ignores display mode {mode:?}", self.kind());
    }

    /// Start a new page section. `orientation` uses the engine's own codes
    /// (see [`EngineKind::orientation_code`]); dimensions are in the
    /// engine's unit.
    fn init_page(&mut self, orientation: &str, size: PageSize);

    /// Append HTML to the current page section.
    fn write_html(&mut self, html: &str);

    fn set_resolution(&mut self, resolution: Resolution);

    /// Produce the complete document in memory.
    fn output_bytes(&self) -> Result<Vec<u8>, EngineError>;

    /// Write the document to `path`, reporting whether it was fully written.
    fn output_file(&self, path: &Path) -> Result<bool, EngineError>;

    /// Deliver the document as a download: attachment headers then the PDF.
    fn stream_to_client(&self, filename: &str, out: &mut dyn Write) -> Result<(), EngineError> {
        let pdf = self.output_bytes()?;
        write_attachment(out, filename, &pdf)?;
        log::debug!("Streamed {} bytes as {filename:?}", pdf.len());
        Ok(())
    }
}

/// Parse an engine orientation code, falling back to portrait.
pub(crate) fn orientation_from_code(kind: EngineKind, code: &str) -> Orientation {
    Orientation::from_code(code).unwrap_or_else(|| {
        log::warn!("{kind}: unknown orientation {code:?}, using portrait");
        Orientation::Portrait
    })
}

/// Write `pdf` preceded by the headers of a download response.
pub fn write_attachment(out: &mut dyn Write, filename: &str, pdf: &[u8]) -> io::Result<()> {
    let quoted = filename.replace('\\', "\\\\").replace('"', "\\\"");
    write!(out, "Content-Type: application/pdf\r\n")?;
    write!(out, "Content-Disposition: attachment; filename=\"{quoted}\"\r\n")?;
    write!(out, "Content-Length: {}\r\n", pdf.len())?;
    write!(out, "Cache-Control: private, max-age=0, must-revalidate\r\n")?;
    write!(out, "Pragma: public\r\n\r\n")?;
    out.write_all(pdf)?;
    out.flush()
}
