//! Turn project theme settings (plus detected branding, for the auto style)
//! into the concrete colors the tooltip renders with.

use serde::Serialize;

use super::color::parse_color;
use super::{contrast_text, DetectedBranding, TextColor};
use crate::model::{ThemeSettings, TooltipStyle};

#[derive(Debug, Clone, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTheme {
    pub background: String,
    pub text_color: String,
    /// Buttons and progress dots.
    pub accent: String,
    pub font_family: String,
    pub border_radius: f64,
    pub padding_v: f64,
    pub padding_h: f64,
    /// Backdrop blur in pixels for the glass style.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backdrop_blur: Option<f64>,
}

pub fn resolve_theme(settings: &ThemeSettings, branding: Option<&DetectedBranding>) -> ResolvedTheme {
    let mut theme = ResolvedTheme {
        background: String::new(),
        text_color: String::new(),
        accent: settings.primary_color.clone(),
        font_family: settings.font_family.clone(),
        border_radius: settings.border_radius,
        padding_v: settings.padding_v,
        padding_h: settings.padding_h,
        backdrop_blur: None,
    };

    match (settings.tooltip_style, branding) {
        (TooltipStyle::Auto, Some(b)) => {
            theme.background = b.primary_color.clone();
            theme.text_color = b.text_color.hex().to_string();
            theme.accent = b.text_color.hex().to_string();
            theme.font_family = b.font_family.clone();
            theme.border_radius = b.border_radius;
        }
        (TooltipStyle::Color, _) => {
            theme.background = settings.tooltip_color.clone();
            theme.text_color = readable_on(&settings.tooltip_color).hex().to_string();
            theme.accent = theme.text_color.clone();
        }
        (TooltipStyle::Glass, _) => {
            theme.background = if settings.dark_mode {
                "rgba(17, 24, 39, 0.72)".to_string()
            } else {
                "rgba(255, 255, 255, 0.72)".to_string()
            };
            theme.text_color = solid_text(settings.dark_mode).to_string();
            theme.backdrop_blur = Some(12.0);
        }
        // Auto without a detection result degrades to solid.
        (TooltipStyle::Solid, _) | (TooltipStyle::Auto, None) => {
            theme.background = if settings.dark_mode { "#111827" } else { "#ffffff" }.to_string();
            theme.text_color = solid_text(settings.dark_mode).to_string();
        }
    }
    theme
}

fn solid_text(dark_mode: bool) -> &'static str {
    if dark_mode {
        "#f9fafb"
    } else {
        "#111827"
    }
}

fn readable_on(background: &str) -> TextColor {
    parse_color(background)
        .map(|c| contrast_text(c.rgb))
        .unwrap_or(TextColor::White)
}
