//! Engine configuration – caller-supplied option maps merged over each
//! engine's defaults and deserialized into typed option structs.

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{PdfError, Result};
use crate::fonts::FontFamily;
use crate::paper::{validate_dimensions, Orientation, PageSize, PaperFormat, Unit, PT_PER_MM};
use crate::pagination::Margins;

/// Free-form engine options, keyed by option name.
pub type EngineConfig = Map<String, Value>;

/// Overlay `config` on `defaults`; caller values win.
pub(crate) fn merge_defaults(defaults: Value, config: &EngineConfig) -> EngineConfig {
    let mut merged = match defaults {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for (key, value) in config {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

fn deserialize<T: for<'de> Deserialize<'de>>(merged: EngineConfig) -> Result<T> {
    serde_json::from_value(Value::Object(merged))
        .map_err(|e| PdfError::invalid(format!("invalid engine option: {e}")))
}

/// The `format` option: a format name or a `[width, height]` pair.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FormatSetting {
    Name(String),
    Size(f32, f32),
}

impl Default for FormatSetting {
    fn default() -> Self {
        FormatSetting::Name(PaperFormat::A4.name().to_string())
    }
}

impl FormatSetting {
    fn page_size(&self) -> Result<PageSize> {
        match self {
            FormatSetting::Name(name) => {
                let format: PaperFormat = name.to_ascii_uppercase().parse()?;
                if format == PaperFormat::Custom {
                    return Err(PdfError::invalid(
                        "a CUSTOM default format needs a [width, height] pair",
                    ));
                }
                Ok(PageSize::Named(format))
            }
            FormatSetting::Size(w, h) => {
                validate_dimensions(*w, *h)?;
                Ok(PageSize::Dimensions(*w, *h))
            }
        }
    }
}

fn orientation_option(code: &str) -> Result<Orientation> {
    Orientation::from_code(code).ok_or_else(|| {
        PdfError::invalid(format!("orientation option must be P or L (got {code:?})"))
    })
}

fn positive(name: &str, value: f32) -> Result<f32> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PdfError::invalid(format!("{name} must be positive (got {value})")))
    }
}

fn margins(name: &str, values: [f32; 4], to_pt: impl Fn(f32) -> f32) -> Result<Margins> {
    if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(PdfError::invalid(format!("{name} must be non-negative")));
    }
    let [top, right, bottom, left] = values.map(to_pt);
    Ok(Margins {
        top,
        right,
        bottom,
        left,
    })
}

// ---------------------------------------------------------------------------
// printpdf
// ---------------------------------------------------------------------------

/// Options understood by the `printpdf` engine. Lengths are in millimetres.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PrintpdfOptions {
    pub mode: String,
    pub format: FormatSetting,
    pub orientation: String,
    pub default_font: String,
    pub default_font_size: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub img_dpi: f32,
    pub title: Option<String>,
}

impl Default for PrintpdfOptions {
    fn default() -> Self {
        Self {
            mode: "utf-8".to_string(),
            format: FormatSetting::default(),
            orientation: "P".to_string(),
            default_font: "helvetica".to_string(),
            default_font_size: 11.0,
            margin_left: 15.0,
            margin_right: 15.0,
            margin_top: 16.0,
            margin_bottom: 16.0,
            img_dpi: 96.0,
            title: None,
        }
    }
}

/// Validated `printpdf` settings with lengths converted to points.
#[derive(Debug, Clone, PartialEq)]
pub struct PrintpdfSettings {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub font: FontFamily,
    pub font_size: f32,
    pub margins: Margins,
    pub img_dpi: f32,
    pub title: Option<String>,
}

impl PrintpdfOptions {
    pub fn defaults() -> Value {
        json!({
            "mode": "utf-8",
            "format": "A4",
            "default_font": "helvetica"
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        deserialize(merge_defaults(Self::defaults(), config))
    }

    pub fn settings(&self) -> Result<PrintpdfSettings> {
        if !matches!(self.mode.to_ascii_lowercase().as_str(), "" | "c" | "utf-8" | "utf8") {
            return Err(PdfError::invalid(format!(
                "mode must be utf-8 or c (got {:?})",
                self.mode
            )));
        }
        Ok(PrintpdfSettings {
            page_size: self.format.page_size()?,
            orientation: orientation_option(&self.orientation)?,
            font: self.default_font.parse()?,
            font_size: positive("default_font_size", self.default_font_size)?,
            margins: margins(
                "margins",
                [
                    self.margin_top,
                    self.margin_right,
                    self.margin_bottom,
                    self.margin_left,
                ],
                |mm| mm * PT_PER_MM,
            )?,
            img_dpi: positive("img_dpi", self.img_dpi)?,
            title: self.title.clone(),
        })
    }
}

// ---------------------------------------------------------------------------
// lopdf
// ---------------------------------------------------------------------------

/// Options understood by the `lopdf` engine. Lengths are in `unit`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LopdfOptions {
    pub orientation: String,
    pub unit: String,
    pub format: FormatSetting,
    pub unicode: bool,
    pub encoding: String,
    pub creator: String,
    pub font: String,
    pub font_size: f32,
    pub margin_left: f32,
    pub margin_right: f32,
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub author: Option<String>,
    pub title: Option<String>,
}

impl Default for LopdfOptions {
    fn default() -> Self {
        Self {
            orientation: "P".to_string(),
            unit: "mm".to_string(),
            format: FormatSetting::default(),
            unicode: true,
            encoding: "UTF-8".to_string(),
            creator: "duopdf".to_string(),
            font: "helvetica".to_string(),
            font_size: 10.0,
            margin_left: 15.0,
            margin_right: 15.0,
            margin_top: 27.0,
            margin_bottom: 25.0,
            author: None,
            title: None,
        }
    }
}

/// Validated `lopdf` settings with margins converted to points.
#[derive(Debug, Clone, PartialEq)]
pub struct LopdfSettings {
    pub page_size: PageSize,
    pub orientation: Orientation,
    pub unit: Unit,
    pub font: FontFamily,
    pub font_size: f32,
    pub margins: Margins,
    pub creator: String,
    pub author: Option<String>,
    pub title: Option<String>,
}

impl LopdfOptions {
    pub fn defaults() -> Value {
        json!({
            "orientation": "P",
            "unit": "mm",
            "format": "A4",
            "unicode": true,
            "encoding": "UTF-8",
            "creator": "duopdf"
        })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        deserialize(merge_defaults(Self::defaults(), config))
    }

    pub fn settings(&self) -> Result<LopdfSettings> {
        let encoding = self.encoding.to_ascii_uppercase().replace('_', "-");
        let supported = if self.unicode {
            matches!(encoding.as_str(), "UTF-8" | "UTF8")
        } else {
            matches!(
                encoding.as_str(),
                "ISO-8859-1" | "LATIN1" | "WINDOWS-1252" | "CP1252"
            )
        };
        if !supported {
            return Err(PdfError::invalid(format!(
                "unsupported encoding {:?} (unicode = {})",
                self.encoding, self.unicode
            )));
        }

        let unit: Unit = self.unit.parse()?;
        Ok(LopdfSettings {
            page_size: self.format.page_size()?,
            orientation: orientation_option(&self.orientation)?,
            unit,
            font: self.font.parse()?,
            font_size: positive("font_size", self.font_size)?,
            margins: margins(
                "margins",
                [
                    self.margin_top,
                    self.margin_right,
                    self.margin_bottom,
                    self.margin_left,
                ],
                |v| unit.to_pt(v),
            )?,
            creator: self.creator.clone(),
            author: self.author.clone(),
            title: self.title.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(value: Value) -> EngineConfig {
        match value {
            Value::Object(map) => map,
            _ => panic!("config must be an object"),
        }
    }

    #[test]
    fn caller_values_win_over_defaults() {
        let merged = merge_defaults(
            PrintpdfOptions::defaults(),
            &config(json!({ "format": "A3", "extra": 1 })),
        );
        assert_eq!(merged["format"], json!("A3"));
        assert_eq!(merged["mode"], json!("utf-8"));
        assert_eq!(merged["extra"], json!(1));
    }

    #[test]
    fn printpdf_defaults() {
        let options = PrintpdfOptions::from_config(&EngineConfig::new()).unwrap();
        assert_eq!(options, PrintpdfOptions::default());
        let settings = options.settings().unwrap();
        assert_eq!(settings.page_size, PageSize::Named(PaperFormat::A4));
        assert_eq!(settings.font, FontFamily::Helvetica);
        assert_eq!(settings.img_dpi, 96.0);
    }

    #[test]
    fn lopdf_defaults() {
        let options = LopdfOptions::from_config(&EngineConfig::new()).unwrap();
        assert_eq!(options.creator, "duopdf");
        let settings = options.settings().unwrap();
        assert_eq!(settings.unit, Unit::Mm);
        assert_eq!(settings.orientation, Orientation::Portrait);
    }

    #[test]
    fn format_accepts_a_size_pair() {
        let options =
            LopdfOptions::from_config(&config(json!({ "format": [100, 50], "unit": "pt" })))
                .unwrap();
        let settings = options.settings().unwrap();
        assert_eq!(settings.page_size, PageSize::Dimensions(100.0, 50.0));
        assert_eq!(settings.unit, Unit::Pt);
    }

    #[test]
    fn wrong_shapes_are_invalid_configuration() {
        let err = PrintpdfOptions::from_config(&config(json!({ "img_dpi": "high" }))).unwrap_err();
        assert!(matches!(err, PdfError::InvalidConfiguration(_)));

        let options = PrintpdfOptions::from_config(&config(json!({ "format": "B5" }))).unwrap();
        assert!(options.settings().is_err());
    }

    #[test]
    fn lopdf_rejects_unsupported_encoding() {
        let options =
            LopdfOptions::from_config(&config(json!({ "encoding": "Shift_JIS" }))).unwrap();
        assert!(matches!(
            options.settings(),
            Err(PdfError::InvalidConfiguration(_))
        ));

        let latin = LopdfOptions::from_config(&config(json!({
            "unicode": false,
            "encoding": "ISO-8859-1"
        })))
        .unwrap();
        assert!(latin.settings().is_ok());
    }

    #[test]
    fn negative_margins_are_rejected() {
        let options = LopdfOptions::from_config(&config(json!({ "margin_top": -1 }))).unwrap();
        assert!(options.settings().is_err());
    }
}
