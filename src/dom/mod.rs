//! Host-page DOM abstraction.
//!
//! The engines never touch a browser directly. They read the page through
//! [`Document`], which a live bridge can implement or which [`DomTree`]
//! implements over a captured or hand-built snapshot.

pub mod query;
pub mod tree;

pub use query::{css_escape, SelectorError, SelectorList};
pub use tree::{DomSnapshot, DomTree, Element, SnapshotNode};

use url::Url;

use crate::geometry::{Rect, Size};

/// Handle to an element inside a [`Document`].
pub type NodeId = usize;

/// Read access to a host page, plus the one mutation the player needs (scrolling).
pub trait Document {
    /// The document element (`<html>`).
    fn root(&self) -> NodeId;

    fn body(&self) -> Option<NodeId>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Element children in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lower-case tag name.
    fn tag_name(&self, node: NodeId) -> &str;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    /// Computed style value, with inheritance already applied.
    fn computed_style(&self, node: NodeId, property: &str) -> Option<&str>;

    /// Custom property declared on the document root (`--primary` and friends).
    fn root_property(&self, name: &str) -> Option<&str>;

    /// Rendered text of the element and its descendants.
    fn inner_text(&self, node: NodeId) -> String;

    /// Bounding rectangle in viewport coordinates.
    fn rect(&self, node: NodeId) -> Rect;

    fn viewport(&self) -> Size;

    /// Path plus query string of the current page, e.g. `/app?tour_id=42`.
    fn location(&self) -> &str;

    /// Scroll so the element sits in the vertical center of the viewport.
    fn scroll_into_view(&mut self, node: NodeId);

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        Ok(SelectorList::parse(selector)?.select_all(self))
    }

    fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, SelectorError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    fn class_list(&self, node: NodeId) -> Vec<&str> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default()
    }

    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }
}

/// Every element reachable from the root, in document (pre-)order.
pub fn document_order<D: Document + ?Sized>(doc: &D) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![doc.root()];
    while let Some(node) = stack.pop() {
        out.push(node);
        let children = doc.children(node);
        stack.extend(children.into_iter().rev());
    }
    out
}

// Relative locations (`/app?x=1`, `app/`) resolve against this.
const LOCAL_ORIGIN: &str = "http://localhost/";

/// Parse an absolute or page-relative location.
pub fn parse_location(location: &str) -> Option<Url> {
    let location = location.trim();
    Url::parse(location)
        .ok()
        .filter(|url| !url.cannot_be_a_base())
        .or_else(|| Url::parse(LOCAL_ORIGIN).ok()?.join(location).ok())
}

/// Path component of a location, without query or fragment.
pub fn location_path(location: &str) -> String {
    parse_location(location)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|| "/".to_string())
}

/// Percent-decoded value of a query parameter in a location string.
pub fn query_param(location: &str, name: &str) -> Option<String> {
    parse_location(location)?
        .query_pairs()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_path_strips_query_and_fragment() {
        assert_eq!(location_path("/app?tour_id=1"), "/app");
        assert_eq!(location_path("/app#top"), "/app");
        assert_eq!(location_path("/"), "/");
        assert_eq!(location_path("https://acme.io/billing?x=1"), "/billing");
        assert_eq!(location_path("app/"), "/app/");
    }

    #[test]
    fn test_query_param_lookup() {
        assert_eq!(query_param("/app?a=1&tour_id=abc", "tour_id").as_deref(), Some("abc"));
        assert_eq!(query_param("/app?tour_id=abc#x", "tour_id").as_deref(), Some("abc"));
        assert_eq!(query_param("/app?flag", "flag").as_deref(), Some(""));
        assert_eq!(query_param("/app", "tour_id"), None);
    }

    #[test]
    fn test_query_param_is_percent_decoded() {
        assert_eq!(query_param("/app?tour_id=abc%2D1", "tour_id").as_deref(), Some("abc-1"));
        assert_eq!(
            query_param("https://acme.io/app?q=a+b%20c&tour_id=t", "q").as_deref(),
            Some("a b c")
        );
    }

    #[test]
    fn test_document_order_is_preorder() {
        let mut tree = DomTree::new(Size::new(800.0, 600.0));
        let body = tree.body_id();
        let nav = tree.append(body, Element::new("nav"));
        let a = tree.append(nav, Element::new("a"));
        let main = tree.append(body, Element::new("main"));
        let order = document_order(&tree);
        let pos = |n| order.iter().position(|x| *x == n).unwrap();
        assert!(pos(body) < pos(nav));
        assert!(pos(nav) < pos(a));
        assert!(pos(a) < pos(main));
    }
}
