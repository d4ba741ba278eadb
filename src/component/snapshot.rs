//! Whole-subtree snapshots.
//!
//! ```text
//! <node name="Root" atype="Root" tags="basic">
//!   <map>...options...</map>
//!   <node name="mesh" atype="Group" tags="">...</node>
//! </node>
//! ```
//!
//! Snapshots are sent wholesale; there is no delta format.

use super::{validate_name, Component};
use crate::constants::{MAP_ELEMENT, NODE_ELEMENT};
use crate::error::{Error, Result};
use crate::option::OptionList;
use crate::xml::{Map, XmlNode};

impl Component {
    /// Serialize this component and its descendants.
    pub fn snapshot(&self, delimiter: &str) -> Result<XmlNode> {
        let tags: Vec<&str> = self.tags().collect();
        let mut node = XmlNode::new(NODE_ELEMENT)
            .with_attr("name", self.name())
            .with_attr("atype", self.type_name())
            .with_attr("tags", tags.join(","));
        node.children.push(self.options().to_map(delimiter)?.into_node());
        for child in self.children() {
            node.children.push(child.snapshot(delimiter)?);
        }
        Ok(node)
    }

    /// Rebuild a detached component tree from [`Component::snapshot`] output.
    ///
    /// Options are restored without triggers and every component gets the
    /// builtin signals only. Any structural error fails the whole rebuild;
    /// no partial tree is ever returned.
    pub fn from_snapshot(node: &XmlNode) -> Result<Component> {
        if node.name != NODE_ELEMENT {
            return Err(Error::malformed(format!(
                "expected <{NODE_ELEMENT}>, found <{}>",
                node.name
            )));
        }
        let name = node
            .attr("name")
            .ok_or_else(|| Error::malformed("snapshot node without name"))?;
        validate_name(name).map_err(|e| Error::malformed(e.to_string()))?;
        let atype = node
            .attr("atype")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::malformed(format!("snapshot node [{name}] without type")))?;

        let mut component = Component::new(name, atype);
        for tag in node.attr("tags").unwrap_or("").split(',').filter(|t| !t.is_empty()) {
            component.add_tag(tag.trim());
        }

        if let Some(map) = node.child(MAP_ELEMENT) {
            component.options = OptionList::from_map(&Map::from_node(map.clone())?)?;
        }

        for child_node in node.children_named(NODE_ELEMENT) {
            let child = Component::from_snapshot(child_node)?;
            component
                .add_child(child)
                .map_err(|e| Error::malformed(e.to_string()))?;
        }
        Ok(component)
    }
}
