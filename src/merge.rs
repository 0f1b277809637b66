//! Stylesheet merging – validates caller CSS with lightningcss and folds the
//! normalized rules into the HTML payload before it reaches an engine.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

use crate::error::CssError;

/// Parse and re-serialize `css`.
pub fn normalize_css(css: &str) -> Result<String, CssError> {
    let sheet = StyleSheet::parse(css, ParserOptions::default()).map_err(|e| {
        let (line, column) = e.loc.as_ref().map(|l| (l.line, l.column)).unwrap_or((0, 0));
        CssError {
            message: e.kind.to_string(),
            line,
            column,
        }
    })?;
    let printed = sheet
        .to_css(PrinterOptions::default())
        .map_err(|e| CssError {
            message: e.kind.to_string(),
            line: 0,
            column: 0,
        })?;
    Ok(printed.code)
}

/// Wrap `html` in a document whose head carries the normalized `css`.
/// Empty or whitespace-only CSS leaves the HTML untouched.
pub fn merge_stylesheet(html: &str, css: Option<&str>) -> Result<String, CssError> {
    match css {
        Some(css) if !css.trim().is_empty() => {
            let css = normalize_css(css)?;
            log::debug!("Merged {} bytes of CSS into the HTML payload", css.len());
            Ok(format!(
                "<html><head><style>{css}</style></head><body>{html}</body></html>"
            ))
        }
        _ => Ok(html.to_string()),
    }
}
