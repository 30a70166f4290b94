//! Tooltip placement: pick a side of the target that fits, clamp the box
//! into the viewport, and aim the caret at the target's center.
//!
//! Everything here is a pure function of its inputs.
//!
//! Containment: when a side is chosen because it fits, the tooltip box lies
//! inside `[safe_margin, viewport - safe_margin]` on both axes, provided the
//! target itself is inside that safe area and the viewport is at least
//! `tooltip + 2 * safe_margin` wide. When no side fits, placement is forced
//! to the bottom and the box may overlap the target or overflow the viewport;
//! [`TooltipPlacement::forced`] is set in that case.

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, Size};

pub const SAFE_MARGIN_RATIO: f64 = 0.01;

/// The caret never sits closer than this to the tooltip's leading edge...
pub const CARET_MIN_OFFSET: f64 = 20.0;
/// ...nor closer than this to the trailing edge.
pub const CARET_END_INSET: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Bottom,
    Left,
    Right,
}

impl Side {
    /// Rotation for a caret graphic authored pointing up.
    pub fn caret_rotation(self) -> i32 {
        match self {
            Self::Bottom => 0,
            Self::Top => 180,
            Self::Left => 90,
            Self::Right => -90,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TooltipPlacement {
    pub position: Side,
    /// Tooltip box origin, viewport coordinates.
    pub top: f64,
    pub left: f64,
    /// Caret offset inside the tooltip box.
    pub caret_top: f64,
    pub caret_left: f64,
    /// No side had room; bottom was used anyway.
    pub forced: bool,
}

/// 1% of the larger viewport dimension.
pub fn safe_margin(viewport: Size) -> f64 {
    viewport.width.max(viewport.height) * SAFE_MARGIN_RATIO
}

/// First side, in priority order bottom, top, right, left, with room for the tooltip.
pub fn choose_side(
    target: Rect,
    viewport: Size,
    tooltip: Size,
    gap: f64,
    safe_margin: f64,
) -> Option<Side> {
    let space_top = target.top - safe_margin;
    let space_bottom = viewport.height - target.bottom() - safe_margin;
    let space_left = target.left - safe_margin;
    let space_right = viewport.width - target.right() - safe_margin;

    [
        (Side::Bottom, space_bottom >= tooltip.height + gap),
        (Side::Top, space_top >= tooltip.height + gap),
        (Side::Right, space_right >= tooltip.width + gap),
        (Side::Left, space_left >= tooltip.width + gap),
    ]
    .into_iter()
    .find_map(|(side, fits)| fits.then_some(side))
}

pub fn compute_placement(
    target: Rect,
    viewport: Size,
    tooltip: Size,
    gap: f64,
    safe_margin: f64,
    caret_size: f64,
) -> TooltipPlacement {
    let chosen = choose_side(target, viewport, tooltip, gap, safe_margin);
    let position = chosen.unwrap_or(Side::Bottom);

    let max_left = viewport.width - tooltip.width - safe_margin;
    let max_top = viewport.height - tooltip.height - safe_margin;
    let (cx, cy) = (target.center_x(), target.center_y());

    let (top, left, caret_top, caret_left) = match position {
        Side::Bottom | Side::Top => {
            let top = if position == Side::Bottom {
                (target.bottom() + gap).min(max_top)
            } else {
                (target.top - gap - tooltip.height).max(safe_margin)
            };
            let left = clamp(cx - tooltip.width / 2.0, safe_margin, max_left);
            let caret_left = clamp(
                cx - left - caret_size,
                CARET_MIN_OFFSET,
                tooltip.width - CARET_END_INSET,
            );
            let caret_top = if position == Side::Bottom {
                -caret_size
            } else {
                tooltip.height - 1.0
            };
            (top, left, caret_top, caret_left)
        }
        Side::Right | Side::Left => {
            let left = if position == Side::Right {
                (target.right() + gap).min(max_left)
            } else {
                (target.left - gap - tooltip.width).max(safe_margin)
            };
            let top = clamp(cy - tooltip.height / 2.0, safe_margin, max_top);
            let caret_top = clamp(
                cy - top - caret_size,
                CARET_MIN_OFFSET,
                tooltip.height - CARET_END_INSET,
            );
            let caret_left = if position == Side::Right {
                -caret_size
            } else {
                tooltip.width - 1.0
            };
            (top, left, caret_top, caret_left)
        }
    };

    TooltipPlacement {
        position,
        top,
        left,
        caret_top,
        caret_left,
        forced: chosen.is_none(),
    }
}

/// Like `f64::clamp`, but the lower bound wins instead of panicking when the
/// range is inverted (viewport narrower than the tooltip).
fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    value.min(hi).max(lo)
}

/// Tooltip geometry settings bundled for repeated placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlacementEngine {
    pub tooltip: Size,
    pub gap: f64,
    pub caret_size: f64,
}

impl Default for PlacementEngine {
    fn default() -> Self {
        Self {
            tooltip: Size::new(320.0, 180.0),
            gap: 16.0,
            caret_size: 8.0,
        }
    }
}

impl PlacementEngine {
    pub fn place(&self, target: Rect, viewport: Size) -> TooltipPlacement {
        compute_placement(
            target,
            viewport,
            self.tooltip,
            self.gap,
            safe_margin(viewport),
            self.caret_size,
        )
    }
}
