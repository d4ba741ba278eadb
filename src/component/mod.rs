//! Component ownership tree.
//!
//! Each [`Component`] owns its children exclusively in an insertion-ordered
//! map keyed by name. The parent link is a non-owning handle: the parent's
//! path, re-resolved from the root whenever a caller needs the parent
//! itself. Nothing holds a reference across a mutation.
//!
//! # Architecture
//!
//! ```text
//! BuilderRegistry ──create(type, name)──► Component
//!                                            ├── OptionList
//!                                            ├── SignalList (builtins + variant signals)
//!                                            ├── tags
//!                                            └── children: IndexMap<name, Component>
//! ```
//!
//! Structural changes raise `tree_updated` with the parent's path and option
//! changes raise `options_changed` with the component's path, through the
//! [`EventSink`] installed on the tree.

pub mod registry;
mod snapshot;
pub mod variants;

pub use registry::{Builder, BuilderRegistry};

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::constants::{EVENT_OPTIONS_CHANGED, EVENT_TREE_UPDATED, PATH_SEPARATOR, TAG_LOCAL};
use crate::error::{Error, Result};
use crate::notification::EventSink;
use crate::option::OptionList;
use crate::signal::{builtin, dispatch, SignalContext, SignalList};
use crate::uri::Uri;
use crate::xml::Map;

/// Addressable node of the ownership tree.
#[derive(Clone)]
pub struct Component {
    name: String,
    type_name: String,
    path: Uri,
    parent: Option<Uri>,
    children: IndexMap<String, Component>,
    tags: BTreeSet<String>,
    options: OptionList,
    signals: SignalList,
    events: Option<EventSink>,
}

impl std::fmt::Debug for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("path", &self.path.to_string())
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .field("options", &self.options.len())
            .finish_non_exhaustive()
    }
}

/// Component names are non-empty, separator-free and not `.`/`..`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(PATH_SEPARATOR) || name == "." || name == ".." {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Component {
    /// Detached component with the builtin signals.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        let name = name.into();
        let mut signals = SignalList::new();
        builtin::register_builtin_signals(&mut signals);
        Self {
            path: Uri::root(&name),
            name,
            type_name: type_name.into(),
            parent: None,
            children: IndexMap::new(),
            tags: BTreeSet::new(),
            options: OptionList::new(),
            signals,
            events: None,
        }
    }

    /// Name, unique among siblings.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete variant tag, as registered with the builder registry.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub(crate) fn set_type_name(&mut self, type_name: &str) {
        self.type_name = type_name.to_string();
    }

    /// Full path from the root. Detached components are at `/<name>`.
    pub fn path(&self) -> &Uri {
        &self.path
    }

    /// Path of the owning component, `None` when detached.
    pub fn parent_path(&self) -> Option<&Uri> {
        self.parent.as_ref()
    }

    /// Returns `true` if another component owns this one.
    pub fn is_attached(&self) -> bool {
        self.parent.is_some()
    }

    /// Classification tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }

    /// Returns `true` if the component carries `tag`.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Add a classification tag. Returns `false` if already present.
    ///
    /// Tags travel comma-joined in snapshots, so empty tags, tags with a
    /// comma and tags with surrounding whitespace are refused with a warning.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if tag.is_empty() || tag.contains(',') || tag.trim() != tag {
            log::warn!("Refusing tag [{}] on {}", tag, self.path);
            return false;
        }
        self.tags.insert(tag.to_string())
    }

    /// Remove a classification tag.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    /// Remove every classification tag.
    pub fn clear_tags(&mut self) {
        self.tags.clear();
    }

    /// Options.
    pub fn options(&self) -> &OptionList {
        &self.options
    }

    /// Mutable options. Changes made here raise no notification.
    pub fn options_mut(&mut self) -> &mut OptionList {
        &mut self.options
    }

    /// Signals.
    pub fn signals(&self) -> &SignalList {
        &self.signals
    }

    /// Mutable signals.
    pub fn signals_mut(&mut self) -> &mut SignalList {
        &mut self.signals
    }

    /// Install (or clear) the notification sink on this subtree.
    pub fn set_event_sink(&mut self, sink: Option<EventSink>) {
        for child in self.children.values_mut() {
            child.set_event_sink(sink.clone());
        }
        self.events = sink;
    }

    fn notify(&self, event: &str) {
        if let Some(sink) = &self.events {
            sink.raise(event, &self.path);
        }
    }

    fn attach(&mut self, parent: &Uri, events: Option<EventSink>) {
        self.parent = Some(parent.clone());
        self.path = parent.child(&self.name);
        self.events = events;
        self.refresh_children();
    }

    fn detach(&mut self) {
        self.parent = None;
        self.path = Uri::root(&self.name);
        self.events = None;
        self.refresh_children();
    }

    fn refresh_children(&mut self) {
        let path = self.path.clone();
        let events = self.events.clone();
        for child in self.children.values_mut() {
            child.attach(&path, events.clone());
        }
    }

    /// Take ownership of `child`.
    ///
    /// Fails with [`Error::NameCollision`] if a sibling already has its name.
    pub fn add_child(&mut self, mut child: Component) -> Result<&mut Component> {
        validate_name(&child.name)?;
        if self.children.contains_key(&child.name) {
            return Err(Error::NameCollision {
                parent: self.path.to_string(),
                name: child.name.clone(),
            });
        }
        child.attach(&self.path, self.events.clone());
        log::debug!("Adding {} ({})", child.path, child.type_name);
        self.notify(EVENT_TREE_UPDATED);
        let (index, _) = self.children.insert_full(child.name.clone(), child);
        Ok(&mut self.children[index])
    }

    /// Release a child and return it detached.
    pub fn remove_child(&mut self, name: &str) -> Result<Component> {
        let mut child = self
            .children
            .shift_remove(name)
            .ok_or_else(|| Error::not_found(self.path.child(name).to_string()))?;
        child.detach();
        log::debug!("Removed {} from {}", name, self.path);
        self.notify(EVENT_TREE_UPDATED);
        Ok(child)
    }

    /// Rename a child in place, keeping its position among siblings.
    pub fn rename_child(&mut self, name: &str, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        let index = self
            .children
            .get_index_of(name)
            .ok_or_else(|| Error::not_found(self.path.child(name).to_string()))?;
        if name == new_name {
            return Ok(());
        }
        if self.children.contains_key(new_name) {
            return Err(Error::NameCollision {
                parent: self.path.to_string(),
                name: new_name.to_string(),
            });
        }
        let (_, mut child) = self
            .children
            .shift_remove_index(index)
            .ok_or_else(|| Error::not_found(self.path.child(name).to_string()))?;
        child.name = new_name.to_string();
        child.attach(&self.path, self.events.clone());
        self.children.shift_insert(index, new_name.to_string(), child);
        self.notify(EVENT_TREE_UPDATED);
        Ok(())
    }

    /// Rename a detached component (a root).
    pub fn rename(&mut self, new_name: &str) -> Result<()> {
        validate_name(new_name)?;
        if let Some(parent) = &self.parent {
            return Err(Error::NameCollision {
                parent: parent.to_string(),
                name: format!("{} (rename attached components through their parent)", self.name),
            });
        }
        self.name = new_name.to_string();
        self.path = Uri::root(new_name);
        self.refresh_children();
        Ok(())
    }

    /// Child by name.
    pub fn child(&self, name: &str) -> Option<&Component> {
        self.children.get(name)
    }

    /// Mutable child by name.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.children.get_mut(name)
    }

    /// Children in insertion order.
    pub fn children(&self) -> impl Iterator<Item = &Component> {
        self.children.values()
    }

    /// Child at position `row` in insertion order.
    pub fn child_at(&self, row: usize) -> Option<&Component> {
        self.children.get_index(row).map(|(_, c)| c)
    }

    /// Number of direct children.
    pub fn count_children(&self) -> usize {
        self.children.len()
    }

    /// Detach and return every child, in order.
    pub fn take_children(&mut self) -> Vec<Component> {
        let children = std::mem::take(&mut self.children);
        if !children.is_empty() {
            self.notify(EVENT_TREE_UPDATED);
        }
        children
            .into_values()
            .map(|mut c| {
                c.detach();
                c
            })
            .collect()
    }

    /// Paths of children (and their descendants when `recursive`), depth first.
    ///
    /// Components tagged `local` are skipped unless `include_local`.
    pub fn list_child_paths(&self, recursive: bool, include_local: bool) -> Vec<Uri> {
        let mut out = Vec::new();
        self.collect_paths(recursive, include_local, &mut out);
        out
    }

    fn collect_paths(&self, recursive: bool, include_local: bool, out: &mut Vec<Uri>) {
        for child in self.children.values() {
            if !include_local && child.has_tag(TAG_LOCAL) {
                continue;
            }
            out.push(child.path.clone());
            if recursive {
                child.collect_paths(recursive, include_local, out);
            }
        }
    }

    /// Path segments below `self` that `path` designates.
    fn relative_segments(&self, path: &Uri) -> Result<Vec<String>> {
        if path.is_absolute() && path.segments().is_empty() && self.parent.is_none() {
            return Ok(Vec::new());
        }
        let target = if path.is_absolute() {
            path.normalize()?
        } else {
            self.path.join(path).normalize()?
        };
        target
            .strip_prefix(&self.path)
            .map(<[String]>::to_vec)
            .ok_or_else(|| Error::not_found(target.to_string()))
    }

    /// Look up a component by path.
    ///
    /// Absolute paths start at this component's own path (for the root:
    /// `/Root/...`); relative paths walk down from this component.
    pub fn resolve(&self, path: &Uri) -> Result<&Component> {
        let mut current = self;
        for segment in self.relative_segments(path)? {
            current = current
                .children
                .get(&segment)
                .ok_or_else(|| Error::not_found(current.path.child(&segment).to_string()))?;
        }
        Ok(current)
    }

    /// Mutable [`Component::resolve`].
    pub fn resolve_mut(&mut self, path: &Uri) -> Result<&mut Component> {
        let segments = self.relative_segments(path)?;
        let mut walked = self.path.clone();
        let mut current = self;
        for segment in segments {
            walked = walked.child(&segment);
            current = match current.children.get_mut(&segment) {
                Some(child) => child,
                None => return Err(Error::not_found(walked.to_string())),
            };
        }
        Ok(current)
    }

    /// Decode and store one option, then raise `options_changed`.
    pub fn set_option(&mut self, name: &str, encoded: &Map) -> Result<()> {
        self.options.set_value(name, encoded)?;
        self.notify(EVENT_OPTIONS_CHANGED);
        Ok(())
    }

    /// Apply a map of option values, then raise `options_changed`.
    pub fn configure(&mut self, map: &Map) -> Result<Vec<String>> {
        let changed = self.options.configure(map)?;
        if !changed.is_empty() {
            self.notify(EVENT_OPTIONS_CHANGED);
        }
        Ok(changed)
    }

    /// Run a signal on this component through the dispatch boundary.
    pub fn call_signal(
        &mut self,
        name: &str,
        args: &Map,
        ctx: &SignalContext<'_>,
    ) -> Result<Option<Map>> {
        dispatch::call(self, name, args, ctx, None).into_result()
    }

    /// Argument layout of one of this component's signals.
    pub fn request_signature(&self, name: &str, delimiter: &str) -> Result<Map> {
        match self.signals.get(name) {
            Some(signal) => signal.signature(delimiter),
            None => Err(Error::UnknownSignal {
                target: self.path.to_string(),
                signal: name.to_string(),
            }),
        }
    }
}
