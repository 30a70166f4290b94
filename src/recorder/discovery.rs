//! Heuristic auto-discovery: propose steps for the page's visible controls.

use crate::dom::{Document, NodeId};
use crate::geometry::Rect;
use crate::model::{Step, StepAction};
use crate::selectors::{compute_selector_with, CaptureOptions};

use super::copy::copy_for;
use super::is_ignored;

pub const CANDIDATE_SELECTOR: &str =
    "button, a, input, select, textarea, [role=\"button\"], [role=\"link\"]";
pub const DEFAULT_LIMIT: usize = 8;
/// Elements whose tops are this close share a reading row.
pub const ROW_TOLERANCE: f64 = 20.0;
const MIN_SIZE: f64 = 5.0;

pub fn discover_steps<D: Document + ?Sized>(doc: &D) -> Vec<Step> {
    discover_steps_with(doc, DEFAULT_LIMIT, CaptureOptions::default())
}

/// Never fails: no candidates is an empty list.
pub fn discover_steps_with<D: Document + ?Sized>(
    doc: &D,
    limit: usize,
    options: CaptureOptions,
) -> Vec<Step> {
    let candidates = match doc.query_selector_all(CANDIDATE_SELECTOR) {
        Ok(nodes) => nodes,
        Err(e) => {
            tracing::warn!("Discovery query failed: {}", e);
            return Vec::new();
        }
    };

    let visible: Vec<(NodeId, Rect)> = candidates
        .into_iter()
        .filter(|n| !is_ignored(doc, *n) && is_rendered(doc, *n))
        .map(|n| (n, doc.rect(n)))
        .filter(|(_, r)| r.width >= MIN_SIZE && r.height >= MIN_SIZE)
        .collect();

    let steps: Vec<Step> = reading_order(visible)
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, node)| {
            let copy = copy_for(doc, node);
            let mut step = Step::new(
                compute_selector_with(doc, node, options),
                copy.content,
                StepAction::Click,
            )
            .with_title(copy.title);
            step.order = i;
            step
        })
        .collect();
    tracing::debug!("Discovered {} step(s)", steps.len());
    steps
}

/// Top to bottom in rows of [`ROW_TOLERANCE`], left to right within a row.
///
/// Rows are cut greedily from the top-sorted list, so the result is a
/// proper total order even when tops drift across many elements.
pub fn reading_order(mut items: Vec<(NodeId, Rect)>) -> Vec<NodeId> {
    items.sort_by(|a, b| a.1.top.total_cmp(&b.1.top));

    let mut out = Vec::with_capacity(items.len());
    let mut row: Vec<(NodeId, Rect)> = Vec::new();
    let mut row_top = f64::NEG_INFINITY;
    for item in items {
        if item.1.top - row_top > ROW_TOLERANCE {
            flush_row(&mut row, &mut out);
            row_top = item.1.top;
        }
        row.push(item);
    }
    flush_row(&mut row, &mut out);
    out
}

fn flush_row(row: &mut Vec<(NodeId, Rect)>, out: &mut Vec<NodeId>) {
    row.sort_by(|a, b| a.1.left.total_cmp(&b.1.left));
    out.extend(row.drain(..).map(|(n, _)| n));
}

/// Not `display: none` anywhere up the tree, not `visibility: hidden`, not fully transparent.
fn is_rendered<D: Document + ?Sized>(doc: &D, node: NodeId) -> bool {
    if doc.computed_style(node, "visibility") == Some("hidden") {
        return false;
    }
    let mut current = Some(node);
    while let Some(n) = current {
        if doc.computed_style(n, "display") == Some("none") {
            return false;
        }
        let opacity = doc
            .computed_style(n, "opacity")
            .and_then(|o| o.trim().parse::<f64>().ok());
        if opacity == Some(0.0) {
            return false;
        }
        current = doc.parent(n);
    }
    true
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
    fn test_reading_order_rows() {
        let mut tree = page();
        let body = tree.body_id();
        let right = tree.append(body, Element::new("a").text("Docs").rect(600.0, 22.0, 60.0, 20.0));
        let left = tree.append(body, Element::new("a").text("Home").rect(20.0, 10.0, 60.0, 20.0));
        let below = tree.append(body, Element::new("button").text("Go").rect(10.0, 200.0, 80.0, 30.0));
        let steps = discover_steps(&tree);
        let targets: Vec<_> = steps.iter().map(|s| s.target.clone()).collect();
        let expected: Vec<_> = [left, right, below]
            .iter()
            .map(|n| crate::selectors::compute_selector(&tree, *n))
            .collect();
        assert_eq!(targets, expected);
        assert!(steps.iter().enumerate().all(|(i, s)| s.order == i));
    }

    #[test]
    fn test_filters_hidden_tiny_and_ignored() {
        let mut tree = page();
        let body = tree.body_id();
        tree.append(body, Element::new("button").text("Tiny").rect(0.0, 0.0, 4.0, 40.0));
        tree.append(
            body,
            Element::new("button").text("Hidden").style("visibility", "hidden").rect(0.0, 50.0, 80.0, 30.0),
        );
        tree.append(
            body,
            Element::new("button").text("Faded").style("opacity", "0").rect(0.0, 100.0, 80.0, 30.0),
        );
        let collapsed = tree.append(body, Element::new("div").style("display", "none"));
        tree.append(collapsed, Element::new("a").text("Inside").rect(0.0, 150.0, 80.0, 30.0));
        let chrome = tree.append(body, Element::new("div").attr("data-tour-ignore", ""));
        tree.append(chrome, Element::new("button").text("Save tour").rect(0.0, 200.0, 80.0, 30.0));
        let ok = tree.append(body, Element::new("button").id("ok").text("Export").rect(0.0, 250.0, 80.0, 30.0));

        let steps = discover_steps(&tree);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].target, crate::selectors::compute_selector(&tree, ok));
        assert_eq!(steps[0].title.as_deref(), Some("Export"));
    }

    #[test]
    fn test_truncates_to_limit() {
        let mut tree = page();
        let body = tree.body_id();
        for i in 0..12 {
            tree.append(
                body,
                Element::new("button").text("Item").rect(10.0, 40.0 * i as f64, 80.0, 30.0),
            );
        }
        assert_eq!(discover_steps(&tree).len(), DEFAULT_LIMIT);
        assert_eq!(discover_steps_with(&tree, 3, CaptureOptions::default()).len(), 3);
    }

    #[test]
    fn test_empty_page() {
        assert!(discover_steps(&page()).is_empty());
    }

    #[test]
    fn test_greedy_rows_are_total() {
        // tops 0, 15, 30: 0 and 15 share a row, 30 starts the next one
        let items = vec![
            (1, Rect::new(300.0, 30.0, 10.0, 10.0)),
            (2, Rect::new(200.0, 15.0, 10.0, 10.0)),
            (3, Rect::new(100.0, 0.0, 10.0, 10.0)),
            (4, Rect::new(0.0, 30.0, 10.0, 10.0)),
        ];
        assert_eq!(reading_order(items), vec![3, 2, 4, 1]);
    }
}
