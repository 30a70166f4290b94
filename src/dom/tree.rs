use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Document, NodeId};
use crate::geometry::{Point, Rect, Size};

/// Properties that inherit from the parent when an element does not set them.
const INHERITED: &[&str] = &[
    "color",
    "cursor",
    "font-family",
    "font-size",
    "line-height",
    "visibility",
];

/// One element: tag, attributes, computed styles, and its box in document coordinates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub styles: BTreeMap<String, String>,
    #[serde(default)]
    pub rect: Rect,
    /// Text directly inside this element (not its children).
    #[serde(default)]
    pub text: String,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Default::default()
        }
    }

    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Append class tokens (space-separated) to the `class` attribute.
    pub fn class(mut self, classes: &str) -> Self {
        let entry = self.attributes.entry("class".to_string()).or_default();
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(classes);
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn style(mut self, property: &str, value: &str) -> Self {
        self.styles.insert(property.to_string(), value.to_string());
        self
    }

    pub fn rect(mut self, left: f64, top: f64, width: f64, height: f64) -> Self {
        self.rect = Rect::new(left, top, width, height);
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }
}

/// Flat, parent-indexed page capture as produced by the browser bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshot {
    #[serde(default = "default_location")]
    pub location: String,
    pub viewport: Size,
    #[serde(default)]
    pub scroll: Point,
    #[serde(default)]
    pub root_properties: BTreeMap<String, String>,
    /// Pre-order; `nodes[0]` is the document element.
    pub nodes: Vec<SnapshotNode>,
}

fn default_location() -> String {
    "/".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(flatten)]
    pub element: Element,
    #[serde(default)]
    pub parent: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("Snapshot has no nodes")]
    Empty,
    #[error("Snapshot node {index} references parent {parent}, which does not precede it")]
    BadParent { index: usize, parent: usize },
    #[error("Snapshot node {0} has no parent but is not the document element")]
    Orphan(usize),
}

#[derive(Debug, Clone)]
struct Node {
    element: Element,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory DOM implementing [`Document`], with a simulated scroll position.
#[derive(Debug, Clone)]
pub struct DomTree {
    nodes: Vec<Node>,
    root: NodeId,
    body: Option<NodeId>,
    viewport: Size,
    scroll: Point,
    root_properties: BTreeMap<String, String>,
    location: String,
}

impl DomTree {
    /// An empty `<html><body></body></html>` page filling the viewport.
    pub fn new(viewport: Size) -> Self {
        let page = Rect::new(0.0, 0.0, viewport.width, viewport.height);
        let mut tree = Self {
            nodes: vec![Node {
                element: Element::new("html").rect(page.left, page.top, page.width, page.height),
                parent: None,
                children: Vec::new(),
            }],
            root: 0,
            body: None,
            viewport,
            scroll: Point::default(),
            root_properties: BTreeMap::new(),
            location: default_location(),
        };
        let body = tree.append(0, Element::new("body").rect(0.0, 0.0, page.width, page.height));
        tree.body = Some(body);
        tree
    }

    pub fn from_snapshot(snapshot: DomSnapshot) -> Result<Self, SnapshotError> {
        if snapshot.nodes.is_empty() {
            return Err(SnapshotError::Empty);
        }
        let mut nodes: Vec<Node> = Vec::with_capacity(snapshot.nodes.len());
        for (index, sn) in snapshot.nodes.into_iter().enumerate() {
            match sn.parent {
                Some(parent) if parent >= index => {
                    return Err(SnapshotError::BadParent { index, parent });
                }
                Some(parent) => nodes[parent].children.push(index),
                None if index != 0 => return Err(SnapshotError::Orphan(index)),
                None => {}
            }
            nodes.push(Node {
                element: sn.element,
                parent: sn.parent,
                children: Vec::new(),
            });
        }
        let body = nodes[0]
            .children
            .iter()
            .copied()
            .find(|c| nodes[*c].element.tag == "body");
        Ok(Self {
            nodes,
            root: 0,
            body,
            viewport: snapshot.viewport,
            scroll: snapshot.scroll,
            root_properties: snapshot.root_properties,
            location: snapshot.location,
        })
    }

    /// The `<body>` element. Trees built with [`DomTree::new`] always have one.
    pub fn body_id(&self) -> NodeId {
        self.body.unwrap_or(self.root)
    }

    pub fn append(&mut self, parent: NodeId, element: Element) -> NodeId {
        let index = self.nodes[parent].children.len();
        self.insert_child(parent, index, element)
    }

    /// Insert at `index` among the parent's children (clamped to the end).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, element: Element) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            element,
            parent: Some(parent),
            children: Vec::new(),
        });
        let children = &mut self.nodes[parent].children;
        let index = index.min(children.len());
        children.insert(index, id);
        id
    }

    /// Detach an element (and its subtree) from the page.
    pub fn remove(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node].parent.take() {
            self.nodes[parent].children.retain(|c| *c != node);
        }
    }

    pub fn element(&self, node: NodeId) -> &Element {
        &self.nodes[node].element
    }

    pub fn element_mut(&mut self, node: NodeId) -> &mut Element {
        &mut self.nodes[node].element
    }

    pub fn set_location(&mut self, location: &str) {
        self.location = location.to_string();
    }

    pub fn set_viewport(&mut self, viewport: Size) {
        self.viewport = viewport;
        self.scroll_to(self.scroll.x, self.scroll.y);
    }

    pub fn set_root_property(&mut self, name: &str, value: &str) {
        self.root_properties
            .insert(name.to_string(), value.to_string());
    }

    pub fn scroll_offset(&self) -> Point {
        self.scroll
    }

    /// Scroll the page, clamped to the document extent.
    pub fn scroll_to(&mut self, x: f64, y: f64) {
        let extent = self.document_extent();
        self.scroll = Point {
            x: x.min(extent.width - self.viewport.width).max(0.0),
            y: y.min(extent.height - self.viewport.height).max(0.0),
        };
    }

    fn document_extent(&self) -> Size {
        let mut extent = self.viewport;
        for node in super::document_order(self) {
            let r = self.nodes[node].element.rect;
            extent.width = extent.width.max(r.right());
            extent.height = extent.height.max(r.bottom());
        }
        extent
    }
}

impl Document for DomTree {
    fn root(&self) -> NodeId {
        self.root
    }

    fn body(&self) -> Option<NodeId> {
        self.body
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node].children.clone()
    }

    fn tag_name(&self, node: NodeId) -> &str {
        &self.nodes[node].element.tag
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes[node].element.attributes.get(name).map(String::as_str)
    }

    fn computed_style(&self, node: NodeId, property: &str) -> Option<&str> {
        let inherited = INHERITED.contains(&property);
        let mut current = Some(node);
        while let Some(n) = current {
            if let Some(value) = self.nodes[n].element.styles.get(property) {
                return Some(value);
            }
            if !inherited {
                return None;
            }
            current = self.nodes[n].parent;
        }
        None
    }

    fn root_property(&self, name: &str) -> Option<&str> {
        self.root_properties.get(name).map(String::as_str)
    }

    fn inner_text(&self, node: NodeId) -> String {
        let mut parts = Vec::new();
        collect_text(self, node, &mut parts);
        parts.join(" ")
    }

    fn rect(&self, node: NodeId) -> Rect {
        self.nodes[node]
            .element
            .rect
            .translate(-self.scroll.x, -self.scroll.y)
    }

    fn viewport(&self) -> Size {
        self.viewport
    }

    fn location(&self) -> &str {
        &self.location
    }

    fn scroll_into_view(&mut self, node: NodeId) {
        let r = self.nodes[node].element.rect;
        let y = r.center_y() - self.viewport.height / 2.0;
        let mut x = self.scroll.x;
        if r.left < x {
            x = r.left;
        } else if r.right() > x + self.viewport.width {
            x = r.right() - self.viewport.width;
        }
        self.scroll_to(x, y);
    }
}

fn collect_text(tree: &DomTree, node: NodeId, parts: &mut Vec<String>) {
    if tree.computed_style(node, "display") == Some("none") {
        return;
    }
    let own = tree.nodes[node].element.text.split_whitespace().collect::<Vec<_>>();
    if !own.is_empty() {
        parts.push(own.join(" "));
    }
    for child in &tree.nodes[node].children {
        collect_text(tree, *child, parts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_round_trip_into_tree() {
        let json = r##"{
            "location": "/pricing",
            "viewport": {"width": 1280, "height": 720},
            "rootProperties": {"--primary": "#2563eb"},
            "nodes": [
                {"tag": "html"},
                {"tag": "body", "parent": 0, "styles": {"font-family": "Inter"}},
                {"tag": "button", "parent": 1, "text": "Buy",
                 "rect": {"left": 10, "top": 20, "width": 80, "height": 30}}
            ]
        }"##;
        let snapshot: DomSnapshot = serde_json::from_str(json).unwrap();
        let tree = DomTree::from_snapshot(snapshot).unwrap();
        assert_eq!(tree.body(), Some(1));
        assert_eq!(tree.location(), "/pricing");
        assert_eq!(tree.computed_style(2, "font-family"), Some("Inter"));
        assert_eq!(tree.root_property("--primary"), Some("#2563eb"));
        assert_eq!(tree.inner_text(2), "Buy");
    }

    #[test]
    fn test_snapshot_rejects_forward_parent() {
        let snapshot = DomSnapshot {
            location: "/".into(),
            viewport: Size::new(100.0, 100.0),
            scroll: Point::default(),
            root_properties: BTreeMap::new(),
            nodes: vec![
                SnapshotNode {
                    element: Element::new("html"),
                    parent: None,
                },
                SnapshotNode {
                    element: Element::new("body"),
                    parent: Some(1),
                },
            ],
        };
        assert_eq!(
            DomTree::from_snapshot(snapshot).unwrap_err(),
            SnapshotError::BadParent { index: 1, parent: 1 }
        );
    }

    #[test]
    fn test_non_inherited_style_stops_at_element() {
        let mut tree = DomTree::new(Size::new(800.0, 600.0));
        let body = tree.body_id();
        let div = tree.append(body, Element::new("div").style("background-color", "red"));
        let span = tree.append(div, Element::new("span"));
        assert_eq!(tree.computed_style(span, "background-color"), None);
        tree.element_mut(body).styles.insert("cursor".into(), "pointer".into());
        assert_eq!(tree.computed_style(span, "cursor"), Some("pointer"));
    }

    #[test]
    fn test_scroll_into_view_centers_and_clamps() {
        let mut tree = DomTree::new(Size::new(800.0, 600.0));
        let body = tree.body_id();
        let far = tree.append(body, Element::new("footer").rect(0.0, 1900.0, 800.0, 100.0));
        let near = tree.append(body, Element::new("header").rect(0.0, 0.0, 800.0, 60.0));

        tree.scroll_into_view(far);
        // document is 2000px tall, so the footer cannot be centered
        assert_eq!(tree.scroll_offset().y, 1400.0);
        assert_eq!(tree.rect(far).top, 500.0);

        tree.scroll_into_view(near);
        assert_eq!(tree.scroll_offset().y, 0.0);
    }

    #[test]
    fn test_hidden_text_is_excluded() {
        let mut tree = DomTree::new(Size::new(800.0, 600.0));
        let body = tree.body_id();
        let button = tree.append(body, Element::new("button").text("  Save  "));
        tree.append(button, Element::new("span").text("now"));
        tree.append(button, Element::new("span").text("hidden").style("display", "none"));
        assert_eq!(tree.inner_text(button), "Save now");
    }
}
