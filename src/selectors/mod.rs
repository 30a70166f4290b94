//! Capture a stable selector for an element, and resolve it back later.

pub mod r#ref;

use serde::{Deserialize, Serialize};

use crate::dom::query::sibling_position;
use crate::dom::{css_escape, Document, NodeId, SelectorError};

/// How `:nth-*` disambiguation counts siblings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NthIndex {
    /// `:nth-child(N)` counted over all children of the parent.
    ///
    /// Breaks if siblings of a different tag are added or removed before the
    /// element between capture and playback.
    #[default]
    Child,
    /// `:nth-of-type(N)` counted over same-tag siblings only.
    OfType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureOptions {
    #[serde(default)]
    pub nth: NthIndex,
}

/// Compute a selector that identifies `node`, preferring its id.
///
/// Never fails: an element without id, classes, or same-tag siblings still
/// yields its bare tag name for that level of the path.
pub fn compute_selector<D: Document + ?Sized>(doc: &D, node: NodeId) -> String {
    compute_selector_with(doc, node, CaptureOptions::default())
}

pub fn compute_selector_with<D: Document + ?Sized>(
    doc: &D,
    node: NodeId,
    options: CaptureOptions,
) -> String {
    if let Some(id) = doc.attribute(node, "id").filter(|id| !id.is_empty()) {
        return format!("#{}", css_escape(id));
    }

    let body = doc.body();
    let mut segments = Vec::new();
    let mut current = Some(node);
    while let Some(n) = current {
        if Some(n) == body {
            break;
        }
        segments.push(segment(doc, n, options.nth));
        current = doc.parent(n);
    }

    if segments.is_empty() {
        return doc.tag_name(node).to_string();
    }
    segments.reverse();
    segments.join(" > ")
}

fn segment<D: Document + ?Sized>(doc: &D, node: NodeId, nth: NthIndex) -> String {
    let tag = doc.tag_name(node);
    let mut seg = tag.to_string();

    if let Some(class) = doc.class_list(node).into_iter().find(|c| is_structural_class(c)) {
        seg.push('.');
        seg.push_str(&css_escape(class));
    }

    let Some(parent) = doc.parent(node) else {
        return seg;
    };
    let same_tag = doc
        .children(parent)
        .into_iter()
        .filter(|c| doc.tag_name(*c) == tag)
        .count();
    if same_tag > 1 {
        let (pseudo, index) = match nth {
            NthIndex::Child => ("nth-child", sibling_position(doc, node, false)),
            NthIndex::OfType => ("nth-of-type", sibling_position(doc, node, true)),
        };
        if let Some(index) = index {
            seg.push_str(&format!(":{}({})", pseudo, index));
        }
    }
    seg
}

/// State-variant utility classes (`hover:bg-blue-600`, `md:flex`) carry a `:`.
fn is_structural_class(class: &str) -> bool {
    !class.contains(':')
}

/// Resolve a stored selector against the current page.
///
/// `Ok(None)` is the expected "page changed" outcome; only a malformed
/// selector is an error.
pub fn resolve<D: Document + ?Sized>(
    doc: &D,
    selector: &str,
) -> Result<Option<NodeId>, SelectorError> {
    doc.query_selector(selector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomTree, Element};
    use crate::geometry::Size;

    fn page() -> DomTree {
        DomTree::new(Size::new(1024.0, 768.0))
    }

    #[test]
    fn test_id_wins() {
        let mut tree = page();
        let body = tree.body_id();
        let nav = tree.append(body, Element::new("nav").class("top"));
        let button = tree.append(nav, Element::new("button").id("signup").class("btn"));
        assert_eq!(compute_selector(&tree, button), "#signup");
        assert_eq!(resolve(&tree, "#signup").unwrap(), Some(button));
    }

    #[test]
    fn test_path_skips_variant_classes() {
        let mut tree = page();
        let body = tree.body_id();
        let nav = tree.append(body, Element::new("nav").class("hover:shadow navbar"));
        let link = tree.append(nav, Element::new("a").class("focus:ring link"));
        assert_eq!(compute_selector(&tree, link), "nav.navbar > a.link");
        assert_eq!(resolve(&tree, "nav.navbar > a.link").unwrap(), Some(link));
    }

    #[test]
    fn test_nth_child_counts_all_children() {
        let mut tree = page();
        let body = tree.body_id();
        let list = tree.append(body, Element::new("div"));
        tree.append(list, Element::new("span"));
        tree.append(list, Element::new("button"));
        let second = tree.append(list, Element::new("button"));
        let sel = compute_selector(&tree, second);
        assert_eq!(sel, "div > button:nth-child(3)");
        assert_eq!(resolve(&tree, &sel).unwrap(), Some(second));
    }

    #[test]
    fn test_nth_of_type_opt_in() {
        let mut tree = page();
        let body = tree.body_id();
        let list = tree.append(body, Element::new("div"));
        tree.append(list, Element::new("span"));
        tree.append(list, Element::new("button"));
        let second = tree.append(list, Element::new("button"));
        let sel = compute_selector_with(&tree, second, CaptureOptions { nth: NthIndex::OfType });
        assert_eq!(sel, "div > button:nth-of-type(2)");

        // Survives a different-tag sibling appearing in front.
        tree.insert_child(list, 0, Element::new("p"));
        assert_eq!(resolve(&tree, &sel).unwrap(), Some(second));
    }

    #[test]
    fn test_bare_tag_segment() {
        let mut tree = page();
        let body = tree.body_id();
        let section = tree.append(body, Element::new("section"));
        let em = tree.append(section, Element::new("em"));
        assert_eq!(compute_selector(&tree, em), "section > em");
    }

    #[test]
    fn test_body_captures_as_tag() {
        let tree = page();
        assert_eq!(compute_selector(&tree, tree.body_id()), "body");
    }

    #[test]
    fn test_resolve_miss_is_none_and_malformed_is_err() {
        let tree = page();
        assert_eq!(resolve(&tree, "#gone").unwrap(), None);
        assert!(resolve(&tree, "div >").is_err());
    }
}
