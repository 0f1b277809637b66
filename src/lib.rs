//! # duopdf – one HTML → PDF builder, two engines
//!
//! [`DocumentBuilder`] wraps one of two interchangeable rendering engines,
//! chosen by name at construction:
//!
//! - `"printpdf"` emits through the printpdf ops API
//! - `"lopdf"` assembles the PDF object graph with lopdf
//!
//! The builder validates paper, orientation and DPI options, translates
//! them into the engine's conventions, merges optional CSS into the HTML
//! and renders to memory, a file or a download stream.
//!
//! Inside each engine the HTML goes through the same stages:
//!
//! 1. **Parse** – HTML string → DOM tree ([`dom`])
//! 2. **Style** – `<style>` rules and inline styles ([`style`])
//! 3. **Layout** – DOM → blocks ([`layout`])
//! 4. **Paginate** – blocks → positioned page items ([`pagination`])
//! 5. **Write** – page items → PDF bytes ([`engine`])

pub mod builder;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod fonts;
pub mod images;
pub mod layout;
pub mod layout_config;
pub mod merge;
pub mod pagination;
pub mod paper;
pub mod style;

// Re-exports for convenience
pub use builder::{DocumentBuilder, Rendered, DEFAULT_STREAM_FILENAME, MAX_DPI, MIN_DPI};
pub use config::EngineConfig;
pub use engine::{DisplayMode, EngineKind, RenderEngine, Resolution};
pub use error::{CssError, EngineError, MarkupError, PdfError, Result};
pub use paper::{Orientation, PaperFormat};
