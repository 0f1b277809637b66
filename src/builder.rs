//! The document builder – one fluent API over both rendering engines.

use std::io::{self, Write};
use std::path::Path;

use crate::config::EngineConfig;
use crate::engine::{DisplayMode, EngineKind, RenderEngine, Resolution};
use crate::error::{PdfError, Result};
use crate::merge::merge_stylesheet;
use crate::paper::{validate_dimensions, Orientation, PageSize, PaperFormat};

/// Filename used by [`DocumentBuilder::stream`] callers that have no better name.
pub const DEFAULT_STREAM_FILENAME: &str = "document.pdf";

/// Lowest accepted image resolution.
pub const MIN_DPI: u32 = 72;
/// Highest accepted image resolution.
pub const MAX_DPI: u32 = 300;

/// Result of [`DocumentBuilder::render`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// The document, when no output path was given.
    Bytes(Vec<u8>),
    /// The engine's report of whether the file was written.
    Saved(bool),
}

impl Rendered {
    /// `true` for non-empty bytes or a successful save.
    pub fn is_success(&self) -> bool {
        match self {
            Rendered::Bytes(bytes) => !bytes.is_empty(),
            Rendered::Saved(saved) => *saved,
        }
    }

    pub fn into_bytes(self) -> Option<Vec<u8>> {
        match self {
            Rendered::Bytes(bytes) => Some(bytes),
            Rendered::Saved(_) => None,
        }
    }
}

/// Builds one PDF document on the engine chosen at construction.
///
/// ```no_run
/// use duopdf::DocumentBuilder;
///
/// let mut builder = DocumentBuilder::new("lopdf")?;
/// builder
///     .set_paper("A4", "landscape", None)?
///     .set_dpi(150)?
///     .load_html("<h1>Report</h1>", Some("h1 { color: navy }"))?;
/// let pdf = builder.render_bytes()?;
/// assert!(pdf.starts_with(b"%PDF-"));
/// # Ok::<(), duopdf::PdfError>(())
/// ```
pub struct DocumentBuilder {
    selected: EngineKind,
    engine: Box<dyn RenderEngine>,
}

impl std::fmt::Debug for DocumentBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentBuilder")
            .field("engine", &self.selected)
            .finish_non_exhaustive()
    }
}

impl DocumentBuilder {
    /// Create a builder on `engine` with its default configuration.
    pub fn new(engine: &str) -> Result<Self> {
        Self::create(engine, &EngineConfig::new())
    }

    /// Create a builder on `engine`, overlaying `config` on the engine's
    /// defaults.
    pub fn create(engine: &str, config: &EngineConfig) -> Result<Self> {
        let selected: EngineKind = engine.parse()?;
        let engine = selected.create(config)?;
        log::debug!("Created document builder on {selected}");
        Ok(Self { selected, engine })
    }

    /// Start a page section of the given format and orientation.
    ///
    /// `custom_size` is `(width, height)` in the engine's unit and must be
    /// given exactly when `format` is `CUSTOM`. Nothing is changed on error.
    pub fn set_paper(
        &mut self,
        format: &str,
        orientation: &str,
        custom_size: Option<(f32, f32)>,
    ) -> Result<&mut Self> {
        let format: PaperFormat = format.parse()?;
        let orientation: Orientation = orientation.parse()?;
        let size = match (format, custom_size) {
            (PaperFormat::Custom, Some((w, h))) => {
                validate_dimensions(w, h)?;
                PageSize::Dimensions(w, h)
            }
            (PaperFormat::Custom, None) => {
                return Err(PdfError::invalid("CUSTOM format requires a custom size"));
            }
            (named, None) => PageSize::Named(named),
            (named, Some(_)) => {
                return Err(PdfError::invalid(format!(
                    "custom size is only allowed with CUSTOM format (got {named})"
                )));
            }
        };

        let code = self.selected.orientation_code(orientation);
        self.engine.set_display_mode(DisplayMode::FullPage);
        self.engine.init_page(code, size);
        Ok(self)
    }

    /// Set the image resolution used to size embedded images.
    pub fn set_dpi(&mut self, dpi: u32) -> Result<&mut Self> {
        if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
            return Err(PdfError::invalid(format!(
                "DPI must be between {MIN_DPI} and {MAX_DPI}"
            )));
        }
        let resolution = match self.selected {
            EngineKind::Printpdf => Resolution::ImageDpi(dpi),
            EngineKind::Lopdf => Resolution::ImageScale(dpi as f32 / 72.0),
        };
        self.engine.set_resolution(resolution);
        Ok(self)
    }

    /// Append HTML to the current page section, merging `css` into it first.
    pub fn load_html(&mut self, html: &str, css: Option<&str>) -> Result<&mut Self> {
        let html = merge_stylesheet(html, css)?;
        self.engine.write_html(&html);
        Ok(self)
    }

    /// Render the document: to `path` when given, otherwise into memory.
    pub fn render(&self, output_path: Option<&Path>) -> Result<Rendered> {
        match output_path {
            Some(path) => Ok(Rendered::Saved(self.engine.output_file(path)?)),
            None => Ok(Rendered::Bytes(self.engine.output_bytes()?)),
        }
    }

    pub fn render_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.engine.output_bytes()?)
    }

    pub fn render_to_file(&self, path: impl AsRef<Path>) -> Result<bool> {
        Ok(self.engine.output_file(path.as_ref())?)
    }

    /// Send the document to standard output as a download named `filename`.
    ///
    /// Meant for CGI-style hosts where stdout is the HTTP response. Use
    /// [`DocumentBuilder::stream_to`] to write to any other sink.
    pub fn stream(&self, filename: &str) -> Result<()> {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        self.stream_to(&mut lock, filename)
    }

    /// Send the document to `out` as a download named `filename`.
    pub fn stream_to(&self, out: &mut dyn Write, filename: &str) -> Result<()> {
        self.engine.stream_to_client(filename, out)?;
        Ok(())
    }

    /// Name of the selected engine.
    pub fn engine(&self) -> &'static str {
        self.selected.name()
    }

    pub fn engine_kind(&self) -> EngineKind {
        self.selected
    }
}
