use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::branding::theme::{resolve_theme, ResolvedTheme};
use crate::branding::{detect_branding, DetectedBranding};
use crate::config::TourkitConfig;
use crate::dom::{Document, DomSnapshot, DomTree};
use crate::geometry::Size;
use crate::model::{ThemeSettings, TooltipStyle};

use super::authoring::{discover, DiscoveredStep};

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct OpenPageParams {
    #[schemars(description = "URL to open")]
    pub url: String,
    #[schemars(description = "Extra settle time in milliseconds after load (default: 100)")]
    pub settle_ms: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SyncViewportParams {
    #[schemars(description = "Horizontal scroll offset to apply before re-placing (default: keep)")]
    pub scroll_x: Option<f64>,
    #[schemars(description = "Vertical scroll offset to apply before re-placing (default: keep)")]
    pub scroll_y: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PageSummary {
    pub location: String,
    pub viewport: Size,
    pub elements: usize,
}

pub fn summarize(tree: &DomTree) -> PageSummary {
    PageSummary {
        location: tree.location().to_string(),
        viewport: tree.viewport(),
        elements: crate::dom::document_order(tree).len(),
    }
}

/// Offline analysis of a captured page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport {
    pub location: String,
    pub viewport: Size,
    pub branding: Option<DetectedBranding>,
    /// What the auto tooltip style would render with.
    pub auto_theme: ResolvedTheme,
    pub steps: Vec<DiscoveredStep>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandingReport {
    pub branding: Option<DetectedBranding>,
    pub theme: ResolvedTheme,
}

/// Branding on the page and the theme `settings` resolve to against it.
pub fn branding_report(tree: &DomTree, settings: &ThemeSettings) -> BrandingReport {
    let branding = detect_branding(tree);
    BrandingReport {
        theme: resolve_theme(settings, branding.as_ref()),
        branding,
    }
}

pub fn load_snapshot(path: &Path) -> Result<DomTree> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    let snapshot: DomSnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid snapshot {}", path.display()))?;
    DomTree::from_snapshot(snapshot).with_context(|| format!("Malformed snapshot {}", path.display()))
}

pub fn inspect(tree: &DomTree, config: &TourkitConfig) -> PageReport {
    let branding = detect_branding(tree);
    let settings = ThemeSettings {
        tooltip_style: TooltipStyle::Auto,
        ..Default::default()
    };
    let (steps, _) = discover(tree, None, config);
    PageReport {
        location: tree.location().to_string(),
        viewport: tree.viewport(),
        auto_theme: resolve_theme(&settings, branding.as_ref()),
        branding,
        steps,
    }
}
