//! Client-side shadow of a server tree.
//!
//! The shadow root mirrors the server root. Its children are either
//! server-origin ([`NodeKind::Standard`]), replaced wholesale by every
//! `list_tree` reply, or client-local, which no sync ever touches.
//!
//! # Sync
//!
//! A `list_tree` merge is staged on a copy of the shadow root and swapped in
//! only once every step succeeded, so readers see either the old tree or
//! the new one:
//!
//! 1. remember the selected path
//! 2. rename the shadow root after the snapshot root
//! 3. drop every server-origin child, keep local ones
//! 4. graft the snapshot's top-level children after the local nodes
//! 5. rebuild the row cache
//! 6. reselect the remembered path if it still exists
//!
//! # Model indexes
//!
//! Views address nodes through [`ModelIndex`]es: the chain of visible row
//! numbers from the root. Hidden nodes (advanced components outside
//! advanced mode, debug nodes outside debug mode) and their subtrees have
//! no index.

use std::collections::HashMap;

use crate::component::variants::ROOT_TYPE;
use crate::component::Component;
use crate::config::Config;
use crate::constants::{
    EVENT_TREE_UPDATED, SIG_CONFIGURE, SIG_LIST_CONTENT, SIG_LIST_TREE, SIG_SIGNAL_SIGNATURE,
    TAG_BASIC, TAG_DEBUG, TAG_LOCAL, TREE_KEY,
};
use crate::error::{Error, Result};
use crate::option::OptionList;
use crate::uri::Uri;
use crate::xml::{Map, SignalFrame, Value, ValueType, WireValue, XmlNode};

use super::node::{NodeKind, TreeNode};

/// Position of a visible node: row numbers from the root down.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ModelIndex {
    rows: Vec<usize>,
}

impl ModelIndex {
    /// Index of the shadow root.
    pub fn root() -> Self {
        Self::default()
    }

    /// Row among visible siblings, `None` for the root.
    pub fn row(&self) -> Option<usize> {
        self.rows.last().copied()
    }

    /// Distance from the root.
    pub fn depth(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` for the root index.
    pub fn is_root(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pending {
    ListTree,
    ListContent { path: Uri },
    Configure,
    Signature { path: Uri, name: String },
}

/// Client mirror of a server component tree.
#[derive(Debug)]
pub struct ShadowTree {
    root: TreeNode,
    selected: Option<Uri>,
    rows: HashMap<Uri, ModelIndex>,
    client_id: String,
    delimiter: String,
    advanced_mode: bool,
    debug_mode: bool,
    pending: HashMap<String, Pending>,
    signatures: HashMap<(Uri, String), Map>,
}

impl ShadowTree {
    /// Empty shadow tree named after `config.root_name`.
    pub fn new(config: &Config) -> Self {
        let root = TreeNode::from_component(
            Component::new(config.root_name.as_str(), ROOT_TYPE),
            NodeKind::Standard,
        );
        let mut tree = Self {
            root,
            selected: None,
            rows: HashMap::new(),
            client_id: config.client_id.clone(),
            delimiter: config.array_delimiter.clone(),
            advanced_mode: config.advanced_mode,
            debug_mode: config.debug_mode,
            pending: HashMap::new(),
            signatures: HashMap::new(),
        };
        tree.rebuild_rows();
        tree
    }

    /// Shadow root.
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Show advanced (non-basic) server nodes.
    pub fn set_advanced_mode(&mut self, enabled: bool) {
        self.advanced_mode = enabled;
        self.rebuild_rows();
    }

    /// Show debug nodes.
    pub fn set_debug_mode(&mut self, enabled: bool) {
        self.debug_mode = enabled;
        self.rebuild_rows();
    }

    // ========================================================================
    // Lookup and model access
    // ========================================================================

    fn segments_below_root<'a>(&self, path: &'a Uri) -> Option<&'a [String]> {
        if path.is_absolute() && path.segments().is_empty() {
            return Some(&[]);
        }
        path.strip_prefix(self.root.path())
    }

    /// Node at `path`, visible or not.
    pub fn node_by_path(&self, path: &Uri) -> Option<&TreeNode> {
        let segments = self.segments_below_root(path)?;
        self.root.descendant(segments)
    }

    fn node_by_path_mut(&mut self, path: &Uri) -> Option<&mut TreeNode> {
        let segments = self.segments_below_root(path)?.to_vec();
        self.root.descendant_mut(&segments)
    }

    /// Index of the visible node at `path`.
    pub fn index_by_path(&self, path: &Uri) -> Option<ModelIndex> {
        if path.is_absolute() && path.segments().is_empty() {
            return Some(ModelIndex::root());
        }
        self.rows.get(path).cloned()
    }

    fn node_at(&self, index: &ModelIndex) -> Option<&TreeNode> {
        let mut node = &self.root;
        for &row in &index.rows {
            node = self.visible_children(node).nth(row)?;
        }
        Some(node)
    }

    /// Path of the node at `index`.
    pub fn path_of(&self, index: &ModelIndex) -> Option<Uri> {
        self.node_at(index).map(|n| n.path().clone())
    }

    /// Number of visible children of the node at `index`.
    pub fn row_count(&self, index: &ModelIndex) -> usize {
        self.node_at(index)
            .map_or(0, |node| self.visible_children(node).count())
    }

    /// Index of the `row`-th visible child of `parent`.
    pub fn child_index(&self, parent: &ModelIndex, row: usize) -> Option<ModelIndex> {
        if row >= self.row_count(parent) {
            return None;
        }
        let mut rows = parent.rows.clone();
        rows.push(row);
        Some(ModelIndex { rows })
    }

    /// Index of the parent of `index`, `None` for the root.
    pub fn parent_index(&self, index: &ModelIndex) -> Option<ModelIndex> {
        let (_, parent) = index.rows.split_last()?;
        Some(ModelIndex { rows: parent.to_vec() })
    }

    /// Visible nodes depth first, with their depth below the root.
    pub fn visible_rows(&self) -> Vec<(usize, Uri)> {
        let mut out = vec![(0, self.root.path().clone())];
        self.collect_visible(&self.root, 1, &mut out);
        out
    }

    fn collect_visible(&self, node: &TreeNode, depth: usize, out: &mut Vec<(usize, Uri)>) {
        for child in self.visible_children(node) {
            out.push((depth, child.path().clone()));
            self.collect_visible(child, depth + 1, out);
        }
    }

    fn is_visible(&self, node: &TreeNode) -> bool {
        match node.kind() {
            NodeKind::Debug => self.debug_mode,
            NodeKind::Local => true,
            NodeKind::Standard => self.advanced_mode || node.component().has_tag(TAG_BASIC),
        }
    }

    fn visible_children<'a>(&'a self, node: &'a TreeNode) -> impl Iterator<Item = &'a TreeNode> + 'a {
        node.children().iter().filter(move |c| self.is_visible(c))
    }

    fn rebuild_rows(&mut self) {
        let mut rows = HashMap::new();
        rows.insert(self.root.path().clone(), ModelIndex::root());
        self.index_children(&self.root, &ModelIndex::root(), &mut rows);
        self.rows = rows;
    }

    fn index_children(&self, node: &TreeNode, index: &ModelIndex, rows: &mut HashMap<Uri, ModelIndex>) {
        for (row, child) in self.visible_children(node).enumerate() {
            let mut chain = index.rows.clone();
            chain.push(row);
            let child_index = ModelIndex { rows: chain };
            self.index_children(child, &child_index, rows);
            rows.insert(child.path().clone(), child_index);
        }
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select the node at `path`.
    pub fn select(&mut self, path: &Uri) -> Result<()> {
        let node = self
            .node_by_path(path)
            .ok_or_else(|| Error::not_found(path.to_string()))?;
        self.selected = Some(node.path().clone());
        Ok(())
    }

    /// Path of the selected node.
    pub fn selected(&self) -> Option<&Uri> {
        self.selected.as_ref()
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    fn reselect(&mut self, previous: Option<Uri>) {
        let root_name = self.root.name().to_string();
        self.selected = previous
            .map(|path| path.with_root(&root_name))
            .filter(|path| self.node_by_path(path).is_some());
    }

    // ========================================================================
    // Sync
    // ========================================================================

    /// Merge a server snapshot (a `node` element) into the shadow tree.
    ///
    /// Fails without touching the shadow tree if the snapshot is malformed
    /// or one of its top-level names is taken by a local node.
    pub fn list_tree(&mut self, snapshot: &XmlNode) -> Result<()> {
        let mut server_root = Component::from_snapshot(snapshot)?;
        let previous = self.selected.clone();

        let mut staged = self.root.clone();
        staged.rename(server_root.name())?;
        staged.children_mut().retain(|c| c.kind().is_local());

        for child in server_root.take_children() {
            if staged.child(child.name()).is_some() {
                log::warn!("Tree sync aborted: [{}] collides with a local node", child.name());
                return Err(Error::NameCollision {
                    parent: Uri::root(server_root.name()).to_string(),
                    name: child.name().to_string(),
                });
            }
            staged.children_mut().push(TreeNode::from_component(child, NodeKind::Standard));
        }

        let root_path = Uri::root(server_root.name());
        staged.repath(root_path);
        *staged.component_mut().options_mut() = server_root.options().clone();
        staged.component_mut().clear_tags();
        for tag in server_root.tags() {
            staged.component_mut().add_tag(tag);
        }

        self.root = staged;
        self.rebuild_rows();
        self.reselect(previous);
        log::debug!("Shadow tree synced: {} node(s)", self.root.count());
        Ok(())
    }

    /// Drop every server-origin node.
    pub fn clear_tree(&mut self) {
        let previous = self.selected.clone();
        self.root.children_mut().retain(|c| c.kind().is_local());
        self.rebuild_rows();
        self.reselect(previous);
    }

    /// Add a client-local child under the shadow root.
    ///
    /// `debug` nodes are only visible in debug mode.
    pub fn add_local_node(&mut self, mut component: Component, debug: bool) -> Result<Uri> {
        crate::component::validate_name(component.name())?;
        if self.root.child(component.name()).is_some() {
            return Err(Error::NameCollision {
                parent: self.root.path().to_string(),
                name: component.name().to_string(),
            });
        }
        component.add_tag(TAG_LOCAL);
        let kind = if debug {
            component.add_tag(TAG_DEBUG);
            NodeKind::Debug
        } else {
            NodeKind::Local
        };
        let mut node = TreeNode::from_component(component, kind);
        let path = self.root.path().child(node.name());
        node.repath(path.clone());
        self.root.children_mut().push(node);
        self.rebuild_rows();
        Ok(path)
    }

    // ========================================================================
    // Requests and replies
    // ========================================================================

    /// Build a `configure` frame from textual option values.
    ///
    /// Strings are parsed by the declared option types; array values are
    /// split on the configured delimiter. Local nodes are configured in
    /// place and yield no frame.
    pub fn modify_options(
        &mut self,
        path: &Uri,
        values: &[(&str, &str)],
    ) -> Result<Option<SignalFrame>> {
        let delimiter = self.delimiter.clone();
        let client_id = self.client_id.clone();
        let node = self
            .node_by_path_mut(path)
            .ok_or_else(|| Error::not_found(path.to_string()))?;

        let mut args = Map::new();
        for (name, text) in values {
            let option = node
                .component()
                .options()
                .get(name)
                .ok_or_else(|| Error::not_found(format!("option [{name}] of {path}")))?;
            let value = parse_option_text(option.value_type(), option.is_array(), text, name, &delimiter)?;
            args.set_wire(name, &value, &delimiter)?;
        }

        if node.kind().is_local() {
            node.component_mut().configure(&args)?;
            return Ok(None);
        }

        let frame = SignalFrame::new(SIG_CONFIGURE, node.path().clone(), client_id).with_args(args);
        self.pending.insert(frame.frame_id.clone(), Pending::Configure);
        Ok(Some(frame))
    }

    /// Request a snapshot of the whole server tree.
    pub fn request_tree(&mut self) -> SignalFrame {
        let frame = SignalFrame::new(SIG_LIST_TREE, Uri::parse("/"), self.client_id.as_str());
        self.pending.insert(frame.frame_id.clone(), Pending::ListTree);
        frame
    }

    /// Request the current options of the server node at `path`.
    ///
    /// The reply replaces that node's option list without a tree resync.
    pub fn request_content(&mut self, path: &Uri) -> Result<SignalFrame> {
        let node = self
            .node_by_path(path)
            .ok_or_else(|| Error::not_found(path.to_string()))?;
        if node.kind().is_local() {
            return Err(Error::not_found(format!("server node {path}")));
        }
        let frame = SignalFrame::new(SIG_LIST_CONTENT, path.clone(), self.client_id.as_str());
        self.pending
            .insert(frame.frame_id.clone(), Pending::ListContent { path: path.clone() });
        Ok(frame)
    }

    /// Request the argument layout of signal `name` on `path`.
    pub fn request_signature(&mut self, path: &Uri, name: &str) -> Result<SignalFrame> {
        let mut args = Map::new();
        args.set_value("name", name.to_string())?;
        let frame = SignalFrame::new(SIG_SIGNAL_SIGNATURE, path.clone(), self.client_id.as_str())
            .with_args(args);
        self.pending.insert(
            frame.frame_id.clone(),
            Pending::Signature { path: path.clone(), name: name.to_string() },
        );
        Ok(frame)
    }

    /// Number of requests awaiting a reply.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Cached signature of signal `name` on `path`.
    pub fn signature(&self, path: &Uri, name: &str) -> Option<&Map> {
        self.signatures.get(&(path.clone(), name.to_string()))
    }

    /// Apply a frame from the server.
    ///
    /// Returns a follow-up request when one is needed: a `tree_updated`
    /// broadcast yields a `list_tree` request. Error replies are returned
    /// as [`Error::DispatchFailure`].
    pub fn handle_frame(&mut self, frame: &SignalFrame) -> Result<Option<SignalFrame>> {
        if !frame.is_reply() {
            if frame.target == EVENT_TREE_UPDATED {
                return Ok(Some(self.request_tree()));
            }
            log::debug!("Ignoring '{}' frame from {}", frame.target, frame.sender);
            return Ok(None);
        }

        let Some(pending) = self.pending.remove(&frame.frame_id) else {
            log::warn!("Reply {} matches no request", frame.frame_id);
            return Ok(None);
        };

        if let Some(error) = &frame.error {
            log::warn!("'{}' on {} failed: {}", frame.target, frame.receiver, error.message);
            return Err(Error::DispatchFailure {
                signal: frame.target.clone(),
                message: format!("[{}] {}", error.kind, error.message),
            });
        }

        match pending {
            Pending::ListTree => self.list_tree(frame.args.subtree(TREE_KEY)?)?,
            Pending::ListContent { path } => {
                let options = OptionList::from_map(&frame.args)?;
                match self.node_by_path_mut(&path) {
                    Some(node) => *node.component_mut().options_mut() = options,
                    None => log::debug!("{} vanished before its content reply", path),
                }
            }
            Pending::Configure => match self.node_by_path_mut(&frame.receiver) {
                Some(node) => {
                    node.component_mut().options_mut().configure(&frame.args)?;
                }
                None => log::debug!("{} vanished before its configure reply", frame.receiver),
            },
            Pending::Signature { path, name } => {
                self.signatures.insert((path, name), frame.args.clone());
            }
        }
        Ok(None)
    }
}

fn parse_option_text(
    value_type: ValueType,
    is_array: bool,
    text: &str,
    key: &str,
    delimiter: &str,
) -> Result<WireValue> {
    if !is_array {
        return Ok(WireValue::Single(Value::parse(value_type, text, key)?));
    }
    let items = if text.is_empty() {
        Vec::new()
    } else {
        text.split(delimiter)
            .map(|token| match value_type {
                ValueType::String => Value::parse(value_type, token, key),
                _ => Value::parse(value_type, token.trim(), key),
            })
            .collect::<Result<Vec<_>>>()?
    };
    Ok(WireValue::Array { element: value_type, items })
}
