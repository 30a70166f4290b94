use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::branding::theme::ResolvedTheme;
use crate::dom::{Document, DomTree};
use crate::geometry::{Rect, Size};
use crate::model::{InstallStatus, PlayBehavior};
use crate::placement::{PlacementEngine, TooltipPlacement};
use crate::player::{Mode, StepView};
use crate::selectors::r#ref::RefTable;
use crate::widget::Widget;

use super::authoring::resolve_target;

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PlaceTooltipParams {
    #[schemars(description = "Target element: a ref (e.g. e2) or CSS selector on the open page")]
    pub target: Option<String>,
    #[schemars(description = "Explicit target rectangle; used instead of `target`")]
    pub rect: Option<Rect>,
    #[schemars(description = "Viewport size for an explicit rectangle (default: the open page's)")]
    pub viewport: Option<Size>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementReport {
    pub target_found: bool,
    pub target_rect: Rect,
    pub viewport: Size,
    pub placement: TooltipPlacement,
    pub caret_rotation: i32,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct StartTourParams {
    #[schemars(description = "Id of the tour to play")]
    pub tour_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourSummary {
    pub id: String,
    pub title: String,
    pub page_url: String,
    pub is_active: bool,
    pub play_behavior: PlayBehavior,
    pub steps: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TourStatus {
    pub mode: Mode,
    pub install_status: InstallStatus,
    pub current: Option<StepView>,
    pub theme: ResolvedTheme,
    pub tours: Vec<TourSummary>,
}

/// Place a tooltip for an element on the page, or for a bare rectangle.
/// A target that does not resolve gets the centered placeholder.
pub fn place_tooltip(
    tree: Option<&DomTree>,
    refs: &RefTable,
    params: &PlaceTooltipParams,
    engine: &PlacementEngine,
) -> Result<PlacementReport> {
    let page_viewport = tree.map(|t| t.viewport());
    let (target_rect, viewport, target_found) = match (&params.rect, &params.target, tree) {
        (Some(rect), _, _) => {
            let viewport = params
                .viewport
                .or(page_viewport)
                .ok_or_else(|| anyhow::anyhow!("No page open; pass `viewport` with `rect`"))?;
            (*rect, viewport, true)
        }
        (None, Some(target), Some(tree)) => {
            let viewport = tree.viewport();
            match resolve_target(tree, refs, target)? {
                Some(node) => (tree.rect(node), viewport, true),
                None => (Rect::placeholder(viewport), viewport, false),
            }
        }
        (None, Some(_), None) => anyhow::bail!("No page open; call open_page first"),
        (None, None, _) => anyhow::bail!("Pass either `target` or `rect`"),
    };
    let placement = engine.place(target_rect, viewport);
    Ok(PlacementReport {
        target_found,
        target_rect,
        viewport,
        caret_rotation: placement.position.caret_rotation(),
        placement,
    })
}

pub fn status(widget: &Widget, now_ms: u64) -> TourStatus {
    let state = widget.state();
    TourStatus {
        mode: widget.player().mode(),
        install_status: widget.install_status(now_ms),
        current: widget.player().current(),
        theme: widget.theme(),
        tours: state
            .tours
            .iter()
            .map(|t| TourSummary {
                id: t.id.clone(),
                title: t.title.clone(),
                page_url: t.page_url.clone(),
                is_active: t.is_active,
                play_behavior: t.play_behavior,
                steps: t.steps.len(),
            })
            .collect(),
    }
}
