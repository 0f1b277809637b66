//! Error types shared by the builder and the engines.

use thiserror::Error;

/// Errors surfaced by [`DocumentBuilder`](crate::DocumentBuilder).
#[derive(Error, Debug)]
pub enum PdfError {
    /// Unsupported engine, paper format, orientation, DPI or engine option.
    /// Raised before the engine is touched.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The engine failed while producing the document.
    #[error("failed to render PDF: {source}")]
    RenderFailure {
        #[source]
        source: EngineError,
    },

    /// Writing the document to a file or stream failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSS passed to `load_html` could not be parsed.
    #[error("stylesheet error: {0}")]
    Css(#[from] CssError),
}

impl PdfError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        PdfError::InvalidConfiguration(message.into())
    }
}

impl From<EngineError> for PdfError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Io(io) => PdfError::Io(io),
            other => PdfError::RenderFailure { source: other },
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfError>;

/// Errors raised inside a rendering engine.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("malformed markup: {0}")]
    Markup(#[from] MarkupError),

    #[error("pdf backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<lopdf::Error> for EngineError {
    fn from(e: lopdf::Error) -> Self {
        EngineError::Backend(e.to_string())
    }
}

/// A fatal problem in the HTML handed to an engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at byte {offset}")]
pub struct MarkupError {
    pub message: String,
    pub offset: usize,
}

/// A parse failure reported by the CSS parser, detached from the input
/// buffer it borrowed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (line {line}, column {column})")]
pub struct CssError {
    pub message: String,
    pub line: u32,
    pub column: u32,
}
