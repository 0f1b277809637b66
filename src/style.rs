//! Style resolver – maps `<style>` rules and inline `style` attributes to a
//! flat [`ComputedStyle`] consumed by the flow typesetter.
//!
//! `<style>` blocks are parsed with lightningcss; inline attributes are split
//! by hand. Only simple selectors are understood: type, class, id, universal,
//! and compounds of those (`p.note`, `h1#title`). Rules with combinators or
//! pseudo-classes are skipped. `!important` rule declarations are applied
//! after inline styles.

use lightningcss::properties::Property;
use lightningcss::rules::CssRule;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::traits::ToCss;
use lightningcss::values::color::CssColor;

use crate::dom::{ElementNode, Tag};
use crate::fonts::{FontFace, FontFamily};

/// Fully resolved style for a single element. Lengths are in points.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedStyle {
    // Inherited
    pub font_family: FontFamily,
    pub font_size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub color: Color,
    pub text_align: TextAlign,
    pub line_height: f32,
    pub preformatted: bool,

    // Not inherited
    pub margin_top: f32,
    pub margin_bottom: f32,
    pub margin_left: f32,
    pub hidden: bool,
}

impl ComputedStyle {
    /// Root style for a document body.
    pub fn root(font_family: FontFamily, font_size: f32) -> Self {
        Self {
            font_family,
            font_size,
            bold: false,
            italic: false,
            underline: false,
            color: Color::BLACK,
            text_align: TextAlign::Left,
            line_height: 1.2,
            preformatted: false,
            margin_top: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            hidden: false,
        }
    }

    /// Copy of the inherited properties with box properties reset.
    fn inherit(&self) -> Self {
        Self {
            margin_top: 0.0,
            margin_bottom: 0.0,
            margin_left: 0.0,
            hidden: false,
            ..self.clone()
        }
    }

    pub fn face(&self) -> FontFace {
        FontFace {
            family: self.font_family,
            bold: self.bold,
            italic: self.italic,
        }
    }

    pub fn line_height_pt(&self) -> f32 {
        self.font_size * self.line_height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// RGB colour (0.0 – 1.0).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Self = Self {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    fn rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim_start_matches('#');
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let digit = |i: usize, len: usize| u8::from_str_radix(&hex[i..i + len], 16).ok();
        match hex.len() {
            // #rgb and #rgba; alpha is ignored
            3 | 4 => Some(Self::rgb8(
                digit(0, 1)? * 17,
                digit(1, 1)? * 17,
                digit(2, 1)? * 17,
            )),
            6 | 8 => Some(Self::rgb8(digit(0, 2)?, digit(2, 2)?, digit(4, 2)?)),
            _ => None,
        }
    }

    /// Parse a CSS colour value: hex, `rgb()`/`rgba()` or a basic keyword.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        if value.starts_with('#') {
            return Self::from_hex(&value);
        }
        if let Some(args) = value
            .strip_prefix("rgba(")
            .or_else(|| value.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let channels: Vec<u8> = args
                .split(|c: char| c == ',' || c == '/' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .take(3)
                .map(|part| match part.strip_suffix('%') {
                    Some(pct) => pct.parse::<f32>().ok().map(|p| (p * 2.55).round() as u8),
                    None => part.parse::<f32>().ok().map(|v| v.clamp(0.0, 255.0) as u8),
                })
                .collect::<Option<_>>()?;
            return match channels[..] {
                [r, g, b] => Some(Self::rgb8(r, g, b)),
                _ => None,
            };
        }
        let (r, g, b) = match value.as_str() {
            "black" => (0, 0, 0),
            "white" => (255, 255, 255),
            "red" => (255, 0, 0),
            "green" => (0, 128, 0),
            "lime" => (0, 255, 0),
            "blue" => (0, 0, 255),
            "navy" => (0, 0, 128),
            "yellow" => (255, 255, 0),
            "orange" => (255, 165, 0),
            "purple" => (128, 0, 128),
            "maroon" => (128, 0, 0),
            "olive" => (128, 128, 0),
            "teal" => (0, 128, 128),
            "aqua" | "cyan" => (0, 255, 255),
            "fuchsia" | "magenta" => (255, 0, 255),
            "silver" => (192, 192, 192),
            "gray" | "grey" => (128, 128, 128),
            _ => return None,
        };
        Some(Self::rgb8(r, g, b))
    }
}

// ---------------------------------------------------------------------------
// Stylesheets
// ---------------------------------------------------------------------------

/// A compound selector: optional type plus any number of classes and ids.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Selector {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
}

impl Selector {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty()
            || text.contains(|c: char| c.is_whitespace() || ">+~:[".contains(c))
        {
            return None;
        }
        let mut selector = Selector {
            tag: None,
            ids: Vec::new(),
            classes: Vec::new(),
        };
        let mut rest = text;
        let head_len = rest.find(['.', '#']).unwrap_or(rest.len());
        let head = &rest[..head_len];
        match head {
            "" | "*" => {}
            name if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') => {
                selector.tag = Some(name.to_ascii_lowercase());
            }
            _ => return None,
        }
        rest = &rest[head_len..];
        while let Some(marker) = rest.chars().next() {
            let body = &rest[1..];
            let len = body.find(['.', '#']).unwrap_or(body.len());
            let name = &body[..len];
            if name.is_empty() {
                return None;
            }
            match marker {
                '.' => selector.classes.push(name.to_string()),
                _ => selector.ids.push(name.to_string()),
            }
            rest = &body[len..];
        }
        Some(selector)
    }

    fn specificity(&self) -> (usize, usize, usize) {
        (
            self.ids.len(),
            self.classes.len(),
            usize::from(self.tag.is_some()),
        )
    }

    fn matches(&self, element: &ElementNode) -> bool {
        if let Some(tag) = &self.tag {
            if *tag != element.tag.name() {
                return false;
            }
        }
        if !self.ids.iter().all(|id| element.id() == Some(id.as_str())) {
            return false;
        }
        let classes = element.classes();
        self.classes.iter().all(|c| classes.contains(&c.as_str()))
    }
}

#[derive(Debug, Clone)]
struct Rule {
    selector: Selector,
    order: usize,
    declarations: Vec<(String, String)>,
}

/// Rules collected from `<style>` elements, in source order.
#[derive(Debug, Clone, Default)]
pub struct Stylesheet {
    rules: Vec<Rule>,
    important: Vec<Rule>,
    order: usize,
}

impl Stylesheet {
    pub fn parse(css: &str) -> Self {
        let mut sheet = Stylesheet::default();
        sheet.extend(css);
        sheet
    }

    /// Append the rules of another `<style>` block. Later rules win ties.
    pub fn extend(&mut self, css: &str) {
        if css.trim().is_empty() {
            return;
        }
        let options = ParserOptions {
            error_recovery: true,
            ..ParserOptions::default()
        };
        let sheet = match StyleSheet::parse(css, options) {
            Ok(sheet) => sheet,
            Err(e) => {
                log::warn!("Ignoring unparsable <style> block: {e}");
                return;
            }
        };
        for rule in &sheet.rules.0 {
            let CssRule::Style(style) = rule else {
                log::debug!("Skipping CSS at-rule");
                continue;
            };
            let normal = declaration_pairs(&style.declarations.declarations);
            let important = declaration_pairs(&style.declarations.important_declarations);
            let selectors = style
                .selectors
                .to_css_string(PrinterOptions::default())
                .unwrap_or_default();
            for text in selectors.split(',') {
                let Some(selector) = Selector::parse(text) else {
                    log::debug!("Skipping unsupported selector {:?}", text.trim());
                    continue;
                };
                if !normal.is_empty() {
                    self.rules.push(Rule {
                        selector: selector.clone(),
                        order: self.order,
                        declarations: normal.clone(),
                    });
                }
                if !important.is_empty() {
                    self.important.push(Rule {
                        selector,
                        order: self.order,
                        declarations: important.clone(),
                    });
                }
            }
            self.order += 1;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty() && self.important.is_empty()
    }

    fn matching<'a>(rules: &'a [Rule], element: &ElementNode) -> Vec<&'a Rule> {
        let mut rules: Vec<&Rule> = rules
            .iter()
            .filter(|r| r.selector.matches(element))
            .collect();
        rules.sort_by_key(|r| (r.selector.specificity(), r.order));
        rules
    }
}

/// Property name and serialized value of each parsed declaration.
fn declaration_pairs(properties: &[Property]) -> Vec<(String, String)> {
    properties
        .iter()
        .filter_map(|property| {
            let value = match property {
                Property::Color(CssColor::RGBA(rgba)) => {
                    format!("#{:02x}{:02x}{:02x}", rgba.red, rgba.green, rgba.blue)
                }
                _ => property
                    .value_to_css_string(PrinterOptions::default())
                    .ok()?,
            };
            let name = property.property_id().name().to_ascii_lowercase();
            Some((name, value))
        })
        .collect()
}

/// Split an inline `style` attribute into declarations.
fn parse_declarations(block: &str) -> Vec<(String, String)> {
    block
        .split(';')
        .filter_map(|decl| {
            let (prop, val) = decl.split_once(':')?;
            let prop = prop.trim().to_ascii_lowercase();
            let val = val.trim().trim_end_matches("!important").trim();
            (!prop.is_empty() && !val.is_empty()).then(|| (prop, val.to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Style resolution
// ---------------------------------------------------------------------------

/// Resolve the style for an element, inheriting text properties from its parent.
pub fn resolve_style(
    element: &ElementNode,
    parent: &ComputedStyle,
    sheet: &Stylesheet,
) -> ComputedStyle {
    let mut style = base_style_for_tag(&element.tag, parent);

    for rule in Stylesheet::matching(&sheet.rules, element) {
        for (prop, val) in &rule.declarations {
            apply_css_property(&mut style, parent, prop, val);
        }
    }

    if let Some(inline) = element.inline_style() {
        for (prop, val) in parse_declarations(inline) {
            apply_css_property(&mut style, parent, &prop, &val);
        }
    }

    for rule in Stylesheet::matching(&sheet.important, element) {
        for (prop, val) in &rule.declarations {
            apply_css_property(&mut style, parent, prop, val);
        }
    }

    style
}

/// Default styles based on tag semantics.
fn base_style_for_tag(tag: &Tag, parent: &ComputedStyle) -> ComputedStyle {
    let mut s = parent.inherit();
    match tag {
        Tag::Heading(level) => {
            let scale = match level {
                1 => 2.0,
                2 => 1.5,
                3 => 1.17,
                4 => 1.0,
                5 => 0.83,
                _ => 0.67,
            };
            s.font_size = parent.font_size * scale;
            s.bold = true;
            s.margin_top = s.font_size * 0.67;
            s.margin_bottom = s.font_size * 0.67;
        }
        Tag::P => {
            s.margin_top = s.font_size;
            s.margin_bottom = s.font_size;
        }
        Tag::Ul | Tag::Ol => {
            s.margin_top = s.font_size * 0.5;
            s.margin_bottom = s.font_size * 0.5;
            s.margin_left = 18.0;
        }
        Tag::Blockquote => {
            s.margin_top = s.font_size;
            s.margin_bottom = s.font_size;
            s.margin_left = 28.0;
        }
        Tag::Pre => {
            s.font_family = FontFamily::Courier;
            s.preformatted = true;
            s.margin_top = s.font_size;
            s.margin_bottom = s.font_size;
        }
        Tag::Table => {
            s.margin_top = s.font_size * 0.5;
            s.margin_bottom = s.font_size * 0.5;
        }
        Tag::Th => {
            s.bold = true;
            s.text_align = TextAlign::Center;
        }
        Tag::Hr => {
            s.margin_top = s.font_size * 0.5;
            s.margin_bottom = s.font_size * 0.5;
            s.color = Color::rgb8(128, 128, 128);
        }
        Tag::Strong | Tag::B => s.bold = true,
        Tag::Em | Tag::I => s.italic = true,
        Tag::U => s.underline = true,
        Tag::A => {
            s.underline = true;
            s.color = Color::rgb8(0, 0, 238);
        }
        Tag::Code => s.font_family = FontFamily::Courier,
        Tag::Head | Tag::Title | Tag::Style | Tag::Script | Tag::Meta | Tag::Link => {
            s.hidden = true;
        }
        _ => {}
    }
    s
}

fn apply_css_property(s: &mut ComputedStyle, parent: &ComputedStyle, prop: &str, val: &str) {
    match prop {
        "color" => {
            if let Some(c) = Color::parse(val) {
                s.color = c;
            }
        }
        "font-family" => s.font_family = FontFamily::from_css_list(val, s.font_family),
        "font-size" => {
            if let Some(size) = parse_font_size(val, parent.font_size) {
                s.font_size = size;
            }
        }
        "font-weight" => {
            s.bold = match val {
                "bold" | "bolder" => true,
                "normal" | "lighter" => false,
                number => number.parse::<u32>().map(|w| w >= 600).unwrap_or(s.bold),
            }
        }
        "font-style" => s.italic = matches!(val, "italic" | "oblique"),
        "text-align" => {
            s.text_align = match val {
                "center" => TextAlign::Center,
                "right" | "end" => TextAlign::Right,
                _ => TextAlign::Left,
            }
        }
        "text-decoration" | "text-decoration-line" => {
            s.underline = val.split_whitespace().any(|v| v == "underline")
        }
        "line-height" => {
            if let Ok(factor) = val.parse::<f32>() {
                s.line_height = factor;
            } else if let Some(len) = parse_length(val, s.font_size, Some(s.font_size)) {
                s.line_height = len / s.font_size;
            }
        }
        "white-space" => s.preformatted = val.starts_with("pre"),
        "display" => s.hidden = val == "none",
        "margin" => {
            // Percentages need the containing block width; those sides keep
            // their current value.
            let parts: Vec<Option<f32>> = val
                .split_whitespace()
                .map(|p| parse_length(p, s.font_size, None))
                .collect();
            let (top, bottom, left) = match parts[..] {
                [all] => (all, all, all),
                [vertical, horizontal] => (vertical, vertical, horizontal),
                [top, horizontal, bottom] => (top, bottom, horizontal),
                [top, _, bottom, left] => (top, bottom, left),
                _ => return,
            };
            s.margin_top = top.unwrap_or(s.margin_top);
            s.margin_bottom = bottom.unwrap_or(s.margin_bottom);
            s.margin_left = left.unwrap_or(s.margin_left);
        }
        "margin-top" => {
            s.margin_top = parse_length(val, s.font_size, None).unwrap_or(s.margin_top)
        }
        "margin-bottom" => {
            s.margin_bottom = parse_length(val, s.font_size, None).unwrap_or(s.margin_bottom)
        }
        "margin-left" => {
            s.margin_left = parse_length(val, s.font_size, None).unwrap_or(s.margin_left)
        }
        _ => {}
    }
}

/// Parse a CSS length into points. `em` is relative to `font_size`; `%` is
/// relative to `percent_base` and rejected when there is none.
fn parse_length(val: &str, font_size: f32, percent_base: Option<f32>) -> Option<f32> {
    let val = val.trim();
    if val == "0" || val == "auto" {
        return Some(0.0);
    }
    let split = val
        .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
        .unwrap_or(val.len());
    let number: f32 = val[..split].parse().ok()?;
    let factor = match &val[split..] {
        "pt" => 1.0,
        "px" => 0.75,
        "mm" => crate::paper::PT_PER_MM,
        "cm" => crate::paper::PT_PER_MM * 10.0,
        "in" => 72.0,
        "em" | "rem" => font_size,
        "%" => percent_base? / 100.0,
        _ => return None,
    };
    Some(number * factor)
}

fn parse_font_size(val: &str, parent_size: f32) -> Option<f32> {
    let keyword = match val {
        "xx-small" => Some(7.0),
        "x-small" => Some(7.5),
        "small" => Some(10.0),
        "medium" => Some(12.0),
        "large" => Some(13.5),
        "x-large" => Some(18.0),
        "xx-large" => Some(24.0),
        "smaller" => Some(parent_size / 1.2),
        "larger" => Some(parent_size * 1.2),
        _ => None,
    };
    keyword
        .or_else(|| parse_length(val, parent_size, Some(parent_size)))
        .filter(|size| *size > 0.0)
}
