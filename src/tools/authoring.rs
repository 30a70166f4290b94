use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::TourkitConfig;
use crate::dom::{Document, DomTree, NodeId};
use crate::geometry::Rect;
use crate::placement::TooltipPlacement;
use crate::recorder::copy::element_label;
use crate::recorder::discovery::discover_steps_with;
use crate::selectors::r#ref::RefTable;
use crate::selectors::{self, compute_selector_with, CaptureOptions, NthIndex};

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CaptureSelectorParams {
    #[schemars(description = "Element to capture: a ref from discover_steps (e.g. e3) or any CSS selector")]
    pub target: String,
    #[schemars(description = "Sibling index strategy: child (default) or of_type")]
    pub nth: Option<NthIndex>,
}

#[derive(Debug, Serialize)]
pub struct CapturedSelector {
    pub selector: String,
    pub tag: String,
    pub label: Option<String>,
    /// The captured selector resolves back to the same element.
    pub round_trip: bool,
}

#[derive(Debug, Serialize, Deserialize, schemars::JsonSchema)]
pub struct DiscoverStepsParams {
    #[schemars(description = "Maximum number of steps to propose (default from config, 8)")]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct DiscoveredStep {
    #[serde(rename = "ref")]
    pub reference: String,
    pub target: String,
    pub title: Option<String>,
    pub content: String,
    pub rect: Rect,
    pub placement: TooltipPlacement,
}

/// Find the element a tool caller means: a discovery ref or a CSS selector.
pub fn resolve_target(tree: &DomTree, refs: &RefTable, target: &str) -> Result<Option<NodeId>> {
    let selector = refs.resolve(target)?;
    selectors::resolve(tree, &selector).with_context(|| format!("Invalid selector '{}'", selector))
}

pub fn capture_selector(
    tree: &DomTree,
    refs: &RefTable,
    params: &CaptureSelectorParams,
    options: CaptureOptions,
) -> Result<CapturedSelector> {
    let node = resolve_target(tree, refs, &params.target)?
        .with_context(|| format!("Element not found: {}", params.target))?;
    let options = CaptureOptions {
        nth: params.nth.unwrap_or(options.nth),
    };
    let selector = compute_selector_with(tree, node, options);
    let round_trip = selectors::resolve(tree, &selector).ok().flatten() == Some(node);
    Ok(CapturedSelector {
        tag: tree.tag_name(node).to_string(),
        label: element_label(tree, node),
        selector,
        round_trip,
    })
}

/// Propose steps and hand out `e1..eN` refs for them.
pub fn discover(tree: &DomTree, limit: Option<usize>, config: &TourkitConfig) -> (Vec<DiscoveredStep>, RefTable) {
    let limit = limit.unwrap_or(config.discovery_limit);
    let steps = discover_steps_with(tree, limit, config.capture_options());
    let refs = RefTable::assign(steps.iter().map(|s| s.target.clone()));
    let viewport = tree.viewport();

    let discovered = steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| {
            let rect = selectors::resolve(tree, &step.target)
                .ok()
                .flatten()
                .map(|n| tree.rect(n))
                .unwrap_or_else(|| Rect::placeholder(viewport));
            DiscoveredStep {
                reference: format!("e{}", i + 1),
                target: step.target,
                title: step.title,
                content: step.content,
                rect,
                placement: config.placement.place(rect, viewport),
            }
        })
        .collect();
    (discovered, refs)
}
