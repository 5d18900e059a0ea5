//! `ManifestNode` backed by `roxmltree`.
//!
//! Grounded on `onvif/src/xml.rs`'s `find` helper, which walks a
//! `roxmltree::Document` by tag name the same way `hds_core::manifest`
//! walks a `ManifestNode` tree. `roxmltree::Node` borrows from the parsed
//! `Document` and is `Copy`, but `hds_core::host::ManifestNode::children`
//! must hand back `&dyn ManifestNode`, so the roxmltree tree is converted
//! once into an owned tree of [`OwnedXmlNode`] before `hds_core` ever sees it.

use hds_core::host::ManifestNode;

/// An owned copy of one XML element: name, attributes, concatenated text of
/// direct text-node children, and owned child elements.
pub struct OwnedXmlNode {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<OwnedXmlNode>,
}

impl OwnedXmlNode {
    /// Recursively copy a `roxmltree` element subtree into an owned tree.
    pub fn from_roxmltree(node: roxmltree::Node) -> Self {
        let name = node.tag_name().name().to_string();
        let attrs = node
            .attributes()
            .map(|a| (a.name().to_string(), a.value().to_string()))
            .collect();

        let mut text = String::new();
        let mut children = Vec::new();
        for child in node.children() {
            if child.is_text() {
                if let Some(t) = child.text() {
                    text.push_str(t);
                }
            } else if child.is_element() {
                children.push(OwnedXmlNode::from_roxmltree(child));
            }
        }

        Self {
            name,
            attrs,
            text,
            children,
        }
    }
}

impl ManifestNode for OwnedXmlNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn children(&self) -> Vec<&dyn ManifestNode> {
        self.children.iter().map(|c| c as &dyn ManifestNode).collect()
    }
}
