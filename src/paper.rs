//! Paper formats, orientations and length units.

use std::fmt;
use std::str::FromStr;

use crate::error::PdfError;

/// Points per millimetre (1 pt = 1/72 inch).
pub const PT_PER_MM: f32 = 72.0 / 25.4;

/// The supported paper formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaperFormat {
    A4,
    A3,
    Letter,
    Legal,
    /// Caller-supplied dimensions.
    Custom,
}

impl PaperFormat {
    pub const ALL: [PaperFormat; 5] = [
        PaperFormat::A4,
        PaperFormat::A3,
        PaperFormat::Letter,
        PaperFormat::Legal,
        PaperFormat::Custom,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PaperFormat::A4 => "A4",
            PaperFormat::A3 => "A3",
            PaperFormat::Letter => "LETTER",
            PaperFormat::Legal => "LEGAL",
            PaperFormat::Custom => "CUSTOM",
        }
    }

    /// Portrait dimensions in points, `None` for `Custom`.
    pub fn size_pt(self) -> Option<(f32, f32)> {
        match self {
            PaperFormat::A4 => Some((595.28, 841.89)),
            PaperFormat::A3 => Some((841.89, 1190.55)),
            PaperFormat::Letter => Some((612.0, 792.0)),
            PaperFormat::Legal => Some((612.0, 1008.0)),
            PaperFormat::Custom => None,
        }
    }
}

impl fmt::Display for PaperFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PaperFormat {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaperFormat::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| {
                let names: Vec<&str> = PaperFormat::ALL.iter().map(|f| f.name()).collect();
                PdfError::invalid(format!("format must be one of: {}", names.join(", ")))
            })
    }
}

/// Page orientation as seen by callers of the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn name(self) -> &'static str {
        match self {
            Orientation::Portrait => "portrait",
            Orientation::Landscape => "landscape",
        }
    }

    /// Lenient parse of the codes both engines understand: the words used by
    /// the builder and the single letters `P`/`L`.
    pub(crate) fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "p" | "portrait" => Some(Orientation::Portrait),
            "l" | "landscape" => Some(Orientation::Landscape),
            _ => None,
        }
    }
}

impl FromStr for Orientation {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "portrait" => Ok(Orientation::Portrait),
            "landscape" => Ok(Orientation::Landscape),
            _ => Err(PdfError::invalid(
                "orientation must be one of: portrait, landscape",
            )),
        }
    }
}

/// Length unit for user-supplied dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    Pt,
    #[default]
    Mm,
    Cm,
    In,
}

impl Unit {
    pub fn to_pt(self, value: f32) -> f32 {
        match self {
            Unit::Pt => value,
            Unit::Mm => value * PT_PER_MM,
            Unit::Cm => value * PT_PER_MM * 10.0,
            Unit::In => value * 72.0,
        }
    }
}

impl FromStr for Unit {
    type Err = PdfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pt" => Ok(Unit::Pt),
            "mm" => Ok(Unit::Mm),
            "cm" => Ok(Unit::Cm),
            "in" => Ok(Unit::In),
            other => Err(PdfError::invalid(format!(
                "unit must be one of: pt, mm, cm, in (got {other:?})"
            ))),
        }
    }
}

/// The page size argument handed to an engine: either a named format or a
/// width/height pair in the engine's own unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSize {
    Named(PaperFormat),
    Dimensions(f32, f32),
}

impl PageSize {
    /// Resolve to `(width, height)` in points with the orientation applied:
    /// portrait puts the longer side vertical, landscape horizontal.
    pub fn resolve_pt(self, unit: Unit, orientation: Orientation) -> (f32, f32) {
        let (w, h) = match self {
            PageSize::Named(format) => format
                .size_pt()
                .unwrap_or_else(|| (unit.to_pt(210.0), unit.to_pt(297.0))),
            PageSize::Dimensions(w, h) => (unit.to_pt(w), unit.to_pt(h)),
        };
        let (short, long) = if w <= h { (w, h) } else { (h, w) };
        match orientation {
            Orientation::Portrait => (short, long),
            Orientation::Landscape => (long, short),
        }
    }
}

/// Check a caller-supplied dimension pair.
pub(crate) fn validate_dimensions(width: f32, height: f32) -> Result<(), PdfError> {
    if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
        Ok(())
    } else {
        Err(PdfError::invalid(format!(
            "custom size must be two positive numbers (got {width} x {height})"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_names_are_case_sensitive() {
        assert_eq!("LETTER".parse::<PaperFormat>().unwrap(), PaperFormat::Letter);
        assert!("letter".parse::<PaperFormat>().is_err());
        assert!("A5".parse::<PaperFormat>().is_err());
    }

    #[test]
    fn landscape_swaps_named_sizes() {
        let (w, h) = PageSize::Named(PaperFormat::A4).resolve_pt(Unit::Mm, Orientation::Landscape);
        assert!(w > h);
        assert!((w - 841.89).abs() < 0.01);
    }

    #[test]
    fn custom_dimensions_use_unit() {
        let (w, h) = PageSize::Dimensions(100.0, 50.0).resolve_pt(Unit::Mm, Orientation::Portrait);
        // Portrait normalizes the longer side to the height.
        assert!((w - 50.0 * PT_PER_MM).abs() < 0.01);
        assert!((h - 100.0 * PT_PER_MM).abs() < 0.01);

        let (w, _) = PageSize::Dimensions(2.0, 3.0).resolve_pt(Unit::In, Orientation::Portrait);
        assert!((w - 144.0).abs() < 0.01);
    }

    #[test]
    fn orientation_codes() {
        assert_eq!(Orientation::from_code("L"), Some(Orientation::Landscape));
        assert_eq!(Orientation::from_code("portrait"), Some(Orientation::Portrait));
        assert_eq!(Orientation::from_code("sideways"), None);
        assert!("Portrait".parse::<Orientation>().is_err());
    }

    #[test]
    fn dimensions_must_be_positive() {
        assert!(validate_dimensions(100.0, 100.0).is_ok());
        assert!(validate_dimensions(0.0, 100.0).is_err());
        assert!(validate_dimensions(f32::NAN, 100.0).is_err());
    }
}
