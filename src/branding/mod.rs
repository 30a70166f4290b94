//! Infer a host site's visual identity from computed styles, for the
//! "auto" tooltip theme.
//!
//! Results are not cached: every call re-scans the page. Callers that need
//! a stable look for a whole session snapshot the result themselves.

pub mod color;
pub mod theme;

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId, SelectorError};
use color::{parse_color, Rgb};

pub const DEFAULT_FONT_STACK: &str =
    r#"-apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif"#;

pub const DEFAULT_BORDER_RADIUS: f64 = 8.0;

/// Likely call-to-action elements, most specific first.
pub const CTA_SELECTORS: &[&str] = &[
    r#"button[type="submit"]"#,
    r#"input[type="submit"]"#,
    ".btn-primary",
    ".button-primary",
    ".cta",
    r#"[class*="primary"]"#,
    r#"[role="button"]"#,
    "a.btn",
    "button",
];

/// Custom properties read from the document root when no element yields a color.
pub const BRAND_VARIABLES: &[&str] = &[
    "--primary",
    "--accent",
    "--brand-color",
    "--main-color",
    "--primary-600",
    "--blue-600",
    "--indigo-600",
];

const DEFAULT_FONTS: &[&str] = &["times new roman", "times", "serif"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TextColor {
    White,
    Black,
}

impl TextColor {
    pub fn hex(self) -> &'static str {
        match self {
            Self::White => "#ffffff",
            Self::Black => "#000000",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DetectedBranding {
    /// Lower-case `#rrggbb`.
    pub primary_color: String,
    pub font_family: String,
    /// Pixels, unit stripped.
    pub border_radius: f64,
    pub text_color: TextColor,
}

/// Text color with enough contrast on `background`: YIQ below 128 gets white.
pub fn contrast_text(background: Rgb) -> TextColor {
    if background.yiq() < 128.0 {
        TextColor::White
    } else {
        TextColor::Black
    }
}

/// Detect branding, or `None` when nothing suitable is found or the scan fails.
pub fn detect_branding<D: Document + ?Sized>(doc: &D) -> Option<DetectedBranding> {
    match scan(doc) {
        Ok(Some(branding)) => {
            tracing::debug!(
                "Detected branding {} / {}",
                branding.primary_color,
                branding.font_family
            );
            Some(branding)
        }
        Ok(None) => {
            tracing::debug!("No brand color found on page");
            None
        }
        Err(e) => {
            tracing::warn!("Branding detection failed: {}", e);
            None
        }
    }
}

fn scan<D: Document + ?Sized>(doc: &D) -> Result<Option<DetectedBranding>, SelectorError> {
    let mut font = heading_font(doc)?;
    let mut radius = None;

    let mut primary = None;
    'selectors: for selector in CTA_SELECTORS {
        for node in doc.query_selector_all(selector)? {
            let Some(rgb) = brand_background(doc, node) else {
                continue;
            };
            primary = Some(rgb);
            radius = doc.computed_style(node, "border-radius").and_then(parse_radius);
            if font.is_none() {
                font = usable_font(doc.computed_style(node, "font-family"));
            }
            break 'selectors;
        }
    }

    if primary.is_none() {
        primary = BRAND_VARIABLES.iter().find_map(|name| {
            let color = parse_color(doc.root_property(name)?)?;
            (!color.is_transparent() && !color.rgb.is_neutral()).then_some(color.rgb)
        });
    }

    let Some(primary) = primary else {
        return Ok(None);
    };
    Ok(Some(DetectedBranding {
        primary_color: primary.to_hex(),
        font_family: font.unwrap_or_else(|| DEFAULT_FONT_STACK.to_string()),
        border_radius: radius.unwrap_or(DEFAULT_BORDER_RADIUS),
        text_color: contrast_text(primary),
    }))
}

fn heading_font<D: Document + ?Sized>(doc: &D) -> Result<Option<String>, SelectorError> {
    if let Some(heading) = doc.query_selector("h1, h2, h3")? {
        if let Some(font) = usable_font(doc.computed_style(heading, "font-family")) {
            return Ok(Some(font));
        }
    }
    Ok(doc
        .body()
        .and_then(|body| usable_font(doc.computed_style(body, "font-family"))))
}

fn brand_background<D: Document + ?Sized>(doc: &D, node: NodeId) -> Option<Rgb> {
    let color = parse_color(doc.computed_style(node, "background-color")?)?;
    if color.is_transparent() || color.rgb.is_neutral() {
        return None;
    }
    Some(color.rgb)
}

/// A font family worth adopting: set, and not the browser's default serif.
fn usable_font(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || matches!(value, "inherit" | "initial" | "unset") {
        return None;
    }
    let first = value
        .split(',')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_ascii_lowercase();
    if DEFAULT_FONTS.contains(&first.as_str()) {
        return None;
    }
    Some(value.to_string())
}

/// First token of a `border-radius` value with its unit stripped: `"8px 4px"` → 8.
fn parse_radius(value: &str) -> Option<f64> {
    let first = value.split_whitespace().next()?;
    let number = first.trim_end_matches(|c: char| c.is_ascii_alphabetic() || c == '%');
    number.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, Element};
    use crate::geometry::Size;

    fn page() -> DomTree {
        DomTree::new(Size::new(1280.0, 800.0))
    }

    #[test]
    fn test_contrast_threshold() {
        assert_eq!(contrast_text(Rgb::new(255, 255, 255)), TextColor::Black);
        assert_eq!(contrast_text(Rgb::new(0, 0, 0)), TextColor::White);
        assert_eq!(contrast_text(Rgb::new(37, 99, 235)), TextColor::White);
        assert_eq!(contrast_text(Rgb::new(250, 204, 21)), TextColor::Black);
    }

    #[test]
    fn test_submit_button_beats_generic_button() {
        let mut tree = page();
        let body = tree.body_id();
        tree.append(
            body,
            Element::new("button").style("background-color", "rgb(220, 38, 38)"),
        );
        tree.append(
            body,
            Element::new("button")
                .attr("type", "submit")
                .style("background-color", "rgb(37, 99, 235)")
                .style("border-radius", "12px 12px 0 0")
                .style("font-family", "Poppins, sans-serif"),
        );
        let branding = detect_branding(&tree).unwrap();
        assert_eq!(branding.primary_color, "#2563eb");
        assert_eq!(branding.border_radius, 12.0);
        assert_eq!(branding.font_family, "Poppins, sans-serif");
        assert_eq!(branding.text_color, TextColor::White);
    }

    #[test]
    fn test_neutral_and_transparent_buttons_are_skipped() {
        let mut tree = page();
        let body = tree.body_id();
        tree.append(body, Element::new("button").style("background-color", "rgba(0, 0, 0, 0)"));
        tree.append(body, Element::new("button").style("background-color", "rgb(243, 244, 246)"));
        tree.append(
            body,
            Element::new("button").style("background-color", "rgb(22, 163, 74)"),
        );
        let branding = detect_branding(&tree).unwrap();
        assert_eq!(branding.primary_color, "#16a34a");
        assert_eq!(branding.border_radius, DEFAULT_BORDER_RADIUS);
    }

    #[test]
    fn test_heading_font_preferred_over_body_and_button() {
        let mut tree = page();
        let body = tree.body_id();
        tree.element_mut(body)
            .styles
            .insert("font-family".into(), "Inter, sans-serif".into());
        tree.append(
            body,
            Element::new("h2").style("font-family", "\"Playfair Display\", serif"),
        );
        tree.append(
            body,
            Element::new("a")
                .class("btn")
                .style("background-color", "#7c3aed")
                .style("font-family", "Arial"),
        );
        let branding = detect_branding(&tree).unwrap();
        assert_eq!(branding.font_family, "\"Playfair Display\", serif");
        assert_eq!(branding.primary_color, "#7c3aed");
    }

    #[test]
    fn test_default_serif_falls_through_to_body() {
        let mut tree = page();
        let body = tree.body_id();
        tree.element_mut(body)
            .styles
            .insert("font-family".into(), "Inter".into());
        tree.append(body, Element::new("h1").style("font-family", "\"Times New Roman\""));
        tree.set_root_property("--primary", "#e11d48");
        let branding = detect_branding(&tree).unwrap();
        assert_eq!(branding.font_family, "Inter");
    }

    #[test]
    fn test_css_variable_fallback_applies_neutral_filter() {
        let mut tree = page();
        tree.set_root_property("--primary", "#111111");
        tree.set_root_property("--accent", "rgb(234, 88, 12)");
        let branding = detect_branding(&tree).unwrap();
        assert_eq!(branding.primary_color, "#ea580c");
        assert_eq!(branding.font_family, DEFAULT_FONT_STACK);
    }

    #[test]
    fn test_nothing_found_is_none() {
        let mut tree = page();
        let body = tree.body_id();
        tree.append(body, Element::new("button").style("background-color", "#ffffff"));
        assert_eq!(detect_branding(&tree), None);
    }

    #[test]
    fn test_parse_radius() {
        assert_eq!(parse_radius("8px"), Some(8.0));
        assert_eq!(parse_radius("0.5rem 0"), Some(0.5));
        assert_eq!(parse_radius("50%"), Some(50.0));
        assert_eq!(parse_radius(""), None);
    }
}
