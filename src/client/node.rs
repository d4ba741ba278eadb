//! Entries of the client shadow tree.

use crate::component::Component;
use crate::uri::Uri;

/// Origin of a shadow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Mirrors a server component; replaced wholesale on every sync.
    Standard,
    /// Created on the client; survives syncs.
    Local,
    /// Client-local node shown only in debug mode.
    Debug,
}

impl NodeKind {
    /// Returns `true` for nodes that belong to the client.
    pub fn is_local(self) -> bool {
        !matches!(self, NodeKind::Standard)
    }
}

/// Shadow of one component.
///
/// The wrapped component never has children of its own; the shadow
/// hierarchy lives in [`TreeNode::children`].
#[derive(Debug, Clone)]
pub struct TreeNode {
    component: Component,
    kind: NodeKind,
    children: Vec<TreeNode>,
    path: Uri,
}

impl TreeNode {
    /// Wrap `component` and, recursively, its children.
    pub fn from_component(mut component: Component, kind: NodeKind) -> Self {
        let children = component
            .take_children()
            .into_iter()
            .map(|c| TreeNode::from_component(c, kind))
            .collect();
        let path = Uri::root(component.name());
        let mut node = Self { component, kind, children, path };
        node.repath(node.path.clone());
        node
    }

    /// Wrapped component.
    pub fn component(&self) -> &Component {
        &self.component
    }

    pub(crate) fn component_mut(&mut self) -> &mut Component {
        &mut self.component
    }

    /// Component name.
    pub fn name(&self) -> &str {
        self.component.name()
    }

    /// Origin of this node.
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Full path in the shadow tree.
    pub fn path(&self) -> &Uri {
        &self.path
    }

    /// Shadow children in display order.
    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<TreeNode> {
        &mut self.children
    }

    /// Child by name.
    pub fn child(&self, name: &str) -> Option<&TreeNode> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Descendant reached by following `segments`.
    pub fn descendant(&self, segments: &[String]) -> Option<&TreeNode> {
        segments.iter().try_fold(self, |node, segment| node.child(segment))
    }

    pub(crate) fn descendant_mut(&mut self, segments: &[String]) -> Option<&mut TreeNode> {
        let mut node = self;
        for segment in segments {
            node = node.children.iter_mut().find(|c| c.component.name() == segment.as_str())?;
        }
        Some(node)
    }

    /// Rename the wrapped (detached) component.
    pub(crate) fn rename(&mut self, name: &str) -> crate::error::Result<()> {
        self.component.rename(name)
    }

    /// Recompute paths of this subtree with `path` as its own path.
    pub(crate) fn repath(&mut self, path: Uri) {
        for child in &mut self.children {
            let child_path = path.child(child.component.name());
            child.repath(child_path);
        }
        self.path = path;
    }

    /// Number of nodes in this subtree, including itself.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::count).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_component_flattens_children() {
        let mut root = Component::new("Root", "Root");
        let mesh = root.add_child(Component::new("mesh", "Group")).unwrap();
        mesh.add_child(Component::new("inlet", "Group")).unwrap();

        let node = TreeNode::from_component(root, NodeKind::Standard);
        assert_eq!(node.count(), 3);
        assert_eq!(node.component().count_children(), 0);
        let inlet = node.descendant(&["mesh".to_string(), "inlet".to_string()]).unwrap();
        assert_eq!(inlet.path().to_string(), "/Root/mesh/inlet");
        assert_eq!(inlet.kind(), NodeKind::Standard);
    }

    #[test]
    fn test_repath_after_rename() {
        let mut root = Component::new("Root", "Root");
        root.add_child(Component::new("mesh", "Group")).unwrap();
        let mut node = TreeNode::from_component(root, NodeKind::Standard);
        node.rename("Model").unwrap();
        node.repath(Uri::root("Model"));
        assert_eq!(node.child("mesh").unwrap().path().to_string(), "/Model/mesh");
    }
}
