//! Base-14 font selection and text measurement.
//!
//! Both engines draw with the standard PDF base fonts, so there are no font
//! files to load. Widths use an average-advance heuristic per family, which
//! is good enough for word wrapping.

use std::str::FromStr;

use crate::error::PdfError;

/// One of the three text families of the PDF base fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FontFamily {
    #[default]
    Helvetica,
    Times,
    Courier,
}

impl FontFamily {
    /// Map a CSS `font-family` list to a base family. The first recognised
    /// name wins; unknown lists fall back to `default`.
    pub fn from_css_list(list: &str, default: FontFamily) -> FontFamily {
        list.split(',')
            .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\''))
            .find_map(|name| name.parse().ok())
            .unwrap_or(default)
    }
}

impl FromStr for FontFamily {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "helvetica" | "arial" | "sans-serif" | "sans" | "dejavusans" => {
                Ok(FontFamily::Helvetica)
            }
            "times" | "times new roman" | "serif" | "dejavuserif" => Ok(FontFamily::Times),
            "courier" | "courier new" | "monospace" | "dejavusansmono" => Ok(FontFamily::Courier),
            other => Err(PdfError::invalid(format!(
                "font must be one of: helvetica, times, courier (got {other:?})"
            ))),
        }
    }
}

/// A concrete base font: family plus weight and slant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FontFace {
    pub family: FontFamily,
    pub bold: bool,
    pub italic: bool,
}

impl FontFace {
    /// PostScript name of the base font, as written into `/BaseFont`.
    pub fn postscript_name(&self) -> &'static str {
        match (self.family, self.bold, self.italic) {
            (FontFamily::Helvetica, false, false) => "Helvetica",
            (FontFamily::Helvetica, true, false) => "Helvetica-Bold",
            (FontFamily::Helvetica, false, true) => "Helvetica-Oblique",
            (FontFamily::Helvetica, true, true) => "Helvetica-BoldOblique",
            (FontFamily::Times, false, false) => "Times-Roman",
            (FontFamily::Times, true, false) => "Times-Bold",
            (FontFamily::Times, false, true) => "Times-Italic",
            (FontFamily::Times, true, true) => "Times-BoldItalic",
            (FontFamily::Courier, false, false) => "Courier",
            (FontFamily::Courier, true, false) => "Courier-Bold",
            (FontFamily::Courier, false, true) => "Courier-Oblique",
            (FontFamily::Courier, true, true) => "Courier-BoldOblique",
        }
    }

    /// Average advance as a fraction of the font size.
    fn average_advance(&self) -> f32 {
        match (self.family, self.bold) {
            (FontFamily::Courier, _) => 0.6,
            (FontFamily::Helvetica, false) => 0.5,
            (FontFamily::Helvetica, true) => 0.55,
            (FontFamily::Times, false) => 0.45,
            (FontFamily::Times, true) => 0.5,
        }
    }

    /// Estimated width of `text` in points at `font_size`.
    pub fn measure(&self, text: &str, font_size: f32) -> f32 {
        text.chars().count() as f32 * font_size * self.average_advance()
    }
}

/// Encode text as WinAnsi bytes for the base fonts. Characters outside the
/// code page become `?`.
pub fn encode_winansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c {
            '\u{20AC}' => 0x80,
            '\u{201A}' => 0x82,
            '\u{201E}' => 0x84,
            '\u{2026}' => 0x85,
            '\u{2018}' => 0x91,
            '\u{2019}' => 0x92,
            '\u{201C}' => 0x93,
            '\u{201D}' => 0x94,
            '\u{2022}' => 0x95,
            '\u{2013}' => 0x96,
            '\u{2014}' => 0x97,
            '\u{2122}' => 0x99,
            '\u{00A0}' => 0x20,
            c if (c as u32) < 256 => c as u8,
            _ => b'?',
        })
        .collect()
}
