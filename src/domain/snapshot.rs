//! DOM snapshot abstraction
//!
//! The browser driver renders the page, waits for readiness and dumps the
//! document as a JSON tree. Extraction only ever sees that tree through the
//! [`DomTree`] trait, so locator and field logic can run against synthetic
//! fixtures as easily as against a real page dump.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Read-only view over a rendered document tree
pub trait DomTree {
    type Node: Copy + Eq + Hash + Debug;

    fn root(&self) -> Self::Node;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    fn children(&self, node: Self::Node) -> Vec<Self::Node>;

    /// Element tag, lowercase. `None` for text nodes.
    fn tag(&self, node: Self::Node) -> Option<&str>;

    /// Text carried directly by this node (text nodes only)
    fn own_text(&self, node: Self::Node) -> Option<&str>;

    fn attr(&self, node: Self::Node, name: &str) -> Option<&str>;

    /// Pre-order walk including `node` itself
    fn descendants(&self, node: Self::Node) -> Vec<Self::Node> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(n) = stack.pop() {
            out.push(n);
            let mut kids = self.children(n);
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    /// Flattened text of the subtree, one line per non-empty text node
    fn text(&self, node: Self::Node) -> String {
        let mut lines = Vec::new();
        for n in self.descendants(node) {
            if let Some(t) = self.own_text(n) {
                let t = t.trim();
                if !t.is_empty() {
                    lines.push(t);
                }
            }
        }
        lines.join("\n")
    }

    /// All text nodes in document order
    fn text_nodes(&self) -> Vec<Self::Node> {
        self.descendants(self.root())
            .into_iter()
            .filter(|n| self.own_text(*n).is_some())
            .collect()
    }

    /// Descendant `<img>` elements with their rendered dimensions
    fn images(&self, node: Self::Node) -> Vec<ImageRef> {
        self.descendants(node)
            .into_iter()
            .filter(|n| self.tag(*n) == Some("img"))
            .filter_map(|n| {
                let src = self.attr(n, "src")?.trim();
                if src.is_empty() {
                    return None;
                }
                Some(ImageRef {
                    src: src.to_string(),
                    alt: self.attr(n, "alt").map(str::to_string),
                    width: self.attr(n, "width").and_then(parse_px),
                    height: self.attr(n, "height").and_then(parse_px),
                })
            })
            .collect()
    }
}

/// An `<img>` found under a node
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    pub src: String,
    pub alt: Option<String>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// Parse "24", "24px", "24.5 px"
fn parse_px(raw: &str) -> Option<f64> {
    let trimmed = raw.trim().trim_end_matches("px").trim();
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Node handle into a [`DomSnapshot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

/// Serialized node as written by the browser driver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attrs: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<RawNode>,
}

impl RawNode {
    pub fn element(tag: &str, children: Vec<RawNode>) -> Self {
        Self {
            tag: Some(tag.to_ascii_lowercase()),
            children,
            ..Default::default()
        }
    }

    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    pub fn img(src: &str, width: u32, height: u32) -> Self {
        Self::element("img", Vec::new())
            .with_attr("src", src)
            .with_attr("width", &width.to_string())
            .with_attr("height", &height.to_string())
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tag: Option<String>,
    text: Option<String>,
    attrs: HashMap<String, String>,
}

/// Immutable arena-backed document snapshot
#[derive(Debug, Clone)]
pub struct DomSnapshot {
    nodes: Vec<NodeData>,
}

impl DomSnapshot {
    /// Flatten a serialized tree into the arena
    pub fn from_raw(root: RawNode) -> Self {
        let mut nodes = Vec::new();
        let mut stack = vec![(root, None::<NodeId>)];

        while let Some((raw, parent)) = stack.pop() {
            let id = NodeId(nodes.len());
            nodes.push(NodeData {
                parent,
                children: Vec::new(),
                tag: raw.tag.map(|t| t.to_ascii_lowercase()),
                text: raw.text,
                attrs: raw
                    .attrs
                    .into_iter()
                    .map(|(k, v)| (k.to_ascii_lowercase(), v))
                    .collect(),
            });
            if let Some(p) = parent {
                nodes[p.0].children.push(id);
            }
            // Reverse so the first child is popped (and numbered) first
            for child in raw.children.into_iter().rev() {
                stack.push((child, Some(id)));
            }
        }

        Self { nodes }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        let raw: RawNode = serde_json::from_str(json)?;
        Ok(Self::from_raw(raw))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl DomTree for DomSnapshot {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn tag(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).and_then(|n| n.tag.as_deref())
    }

    fn own_text(&self, node: NodeId) -> Option<&str> {
        self.nodes.get(node.0).and_then(|n| n.text.as_deref())
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.nodes
            .get(node.0)
            .and_then(|n| n.attrs.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DomSnapshot {
        DomSnapshot::from_raw(RawNode::element(
            "body",
            vec![
                RawNode::element(
                    "div",
                    vec![
                        RawNode::text("  xSOL-2511 "),
                        RawNode::element("span", vec![RawNode::text("Yield Exposure")]),
                        RawNode::img("//cdn.example.com/xsol.png", 24, 24).with_attr("alt", "xSOL"),
                    ],
                ),
                RawNode::text(""),
            ],
        ))
    }

    #[test]
    fn test_arena_numbering_is_document_order() {
        let dom = sample();
        assert_eq!(dom.tag(NodeId(0)), Some("body"));
        assert_eq!(dom.tag(NodeId(1)), Some("div"));
        assert_eq!(dom.own_text(NodeId(2)), Some("  xSOL-2511 "));
        assert_eq!(dom.parent(NodeId(2)), Some(NodeId(1)));
        assert_eq!(dom.parent(NodeId(0)), None);
    }

    #[test]
    fn test_flattened_text_skips_blank_nodes() {
        let dom = sample();
        assert_eq!(dom.text(dom.root()), "xSOL-2511\nYield Exposure");
    }

    #[test]
    fn test_images_parse_dimensions() {
        let dom = sample();
        let images = dom.images(dom.root());
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].width, Some(24.0));
        assert_eq!(images[0].alt.as_deref(), Some("xSOL"));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{"tag":"DIV","attrs":{"Style":"color: red"},"children":[{"text":"hello"}]}"#;
        let dom = DomSnapshot::from_json(json).unwrap();
        assert_eq!(dom.len(), 2);
        assert_eq!(dom.tag(dom.root()), Some("div"));
        assert_eq!(dom.attr(dom.root(), "style"), Some("color: red"));
        assert_eq!(dom.text_nodes(), vec![NodeId(1)]);
    }

    #[test]
    fn test_parse_px() {
        assert_eq!(parse_px("24px"), Some(24.0));
        assert_eq!(parse_px(" 12.5 "), Some(12.5));
        assert_eq!(parse_px("auto"), None);
    }
}
