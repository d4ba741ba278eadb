//! Named operations on components.
//!
//! A [`Signal`] pairs a handler with its argument layout. Handlers take the
//! receiving component, the decoded argument [`Map`] and a [`SignalContext`],
//! and return optional reply values. They return `anyhow::Result`; the
//! dispatch boundary turns any error (or panic) into a failed outcome.

pub mod builtin;
pub mod dispatch;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::component::{BuilderRegistry, Component};
use crate::constants::DEFAULT_ARRAY_DELIMITER;
use crate::error::{Error, Result};
use crate::xml::types::type_label;
use crate::xml::{Map, ValueType, WireValue};

/// Per-invocation context handed to signal handlers.
#[derive(Debug, Clone, Copy)]
pub struct SignalContext<'a> {
    /// Factories for `create_component` and friends.
    pub registry: &'a BuilderRegistry,
    /// Id of the peer that sent the request.
    pub sender: &'a str,
    /// Correlation id of the request.
    pub frame_id: &'a str,
    /// Delimiter for arrays written into replies.
    pub delimiter: &'a str,
}

impl<'a> SignalContext<'a> {
    /// Context for in-process calls.
    pub fn local(registry: &'a BuilderRegistry) -> Self {
        Self { registry, sender: "local", frame_id: "", delimiter: DEFAULT_ARRAY_DELIMITER }
    }
}

/// Signal handler.
pub type SignalHandler =
    Arc<dyn Fn(&mut Component, &Map, &SignalContext<'_>) -> anyhow::Result<Option<Map>> + Send + Sync>;

/// Declared argument of a signal.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgSpec {
    /// Argument key.
    pub name: String,
    /// Scalar or element type.
    pub value_type: ValueType,
    /// Array argument.
    pub is_array: bool,
    /// Description for generated forms.
    pub description: String,
    /// Used when the caller omits the argument.
    pub default: Option<WireValue>,
}

impl ArgSpec {
    /// Required scalar argument.
    pub fn new(name: &str, value_type: ValueType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type,
            is_array: false,
            description: description.to_string(),
            default: None,
        }
    }

    /// Required array argument.
    pub fn array(name: &str, value_type: ValueType, description: &str) -> Self {
        Self { is_array: true, ..Self::new(name, value_type, description) }
    }

    /// Builder-style default. The default also fixes type and array-ness.
    #[must_use]
    pub fn with_default(mut self, default: WireValue) -> Self {
        self.value_type = default.value_type();
        self.is_array = default.is_array();
        self.default = Some(default);
        self
    }

    /// `integer`, `array[real]`, ...
    pub fn type_label(&self) -> String {
        type_label(self.value_type, self.is_array)
    }

    /// Default, or the zero value of the declared type.
    pub fn default_or_zero(&self) -> WireValue {
        match &self.default {
            Some(v) => v.clone(),
            None if self.is_array => WireValue::Array { element: self.value_type, items: Vec::new() },
            None => WireValue::Single(self.value_type.zero()),
        }
    }
}

/// A named operation.
#[derive(Clone)]
pub struct Signal {
    name: String,
    description: String,
    handler: SignalHandler,
    args: Vec<ArgSpec>,
    hidden: bool,
    read_only: bool,
}

impl std::fmt::Debug for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("hidden", &self.hidden)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}

impl Signal {
    /// Signal name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared arguments.
    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    /// Not meant for UI listing.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Does not modify the receiver.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Shared handle to the handler.
    pub fn handler(&self) -> SignalHandler {
        Arc::clone(&self.handler)
    }

    /// Declare an argument.
    pub fn arg(&mut self, spec: ArgSpec) -> &mut Self {
        self.args.push(spec);
        self
    }

    /// Hide from UI listings.
    pub fn hidden(&mut self, hidden: bool) -> &mut Self {
        self.hidden = hidden;
        self
    }

    /// Mark as not modifying the receiver.
    pub fn read_only(&mut self, read_only: bool) -> &mut Self {
        self.read_only = read_only;
        self
    }

    /// Argument layout as a map: one entry per argument holding its default.
    pub fn signature(&self, delimiter: &str) -> Result<Map> {
        let mut map = Map::new();
        for spec in &self.args {
            let node = map.set_wire(&spec.name, &spec.default_or_zero(), delimiter)?;
            if !spec.description.is_empty() {
                node.set_attr(crate::constants::ATTR_DESCR, spec.description.as_str());
            }
        }
        Ok(map)
    }
}

/// Signals of one component, in registration order.
#[derive(Debug, Clone, Default)]
pub struct SignalList {
    signals: IndexMap<String, Signal>,
}

impl SignalList {
    /// Create an empty signal list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`.
    pub fn regist_signal<F>(&mut self, name: &str, handler: F, description: &str) -> Result<&mut Signal>
    where
        F: Fn(&mut Component, &Map, &SignalContext<'_>) -> anyhow::Result<Option<Map>>
            + Send
            + Sync
            + 'static,
    {
        if name.is_empty() {
            return Err(Error::EmptyKey);
        }
        if self.signals.contains_key(name) {
            return Err(Error::DuplicateKey(name.to_string()));
        }
        let signal = Signal {
            name: name.to_string(),
            description: description.to_string(),
            handler: Arc::new(handler),
            args: Vec::new(),
            hidden: false,
            read_only: false,
        };
        let (index, _) = self.signals.insert_full(name.to_string(), signal);
        Ok(&mut self.signals[index])
    }

    /// Remove a signal. Returns `false` if it did not exist.
    pub fn remove_signal(&mut self, name: &str) -> bool {
        self.signals.shift_remove(name).is_some()
    }

    /// Signal by name.
    pub fn get(&self, name: &str) -> Option<&Signal> {
        self.signals.get(name)
    }

    /// Returns `true` if `name` is registered.
    pub fn check_signal(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    /// Signal names, optionally including hidden ones.
    pub fn names(&self, include_hidden: bool) -> Vec<&str> {
        self.signals
            .values()
            .filter(|s| include_hidden || !s.hidden)
            .map(|s| s.name.as_str())
            .collect()
    }

    /// Signals in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.values()
    }

    /// Number of signals.
    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Returns `true` if there are no signals.
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::Value;

    fn noop(_: &mut Component, _: &Map, _: &SignalContext<'_>) -> anyhow::Result<Option<Map>> {
        Ok(None)
    }

    #[test]
    fn test_regist_signal_and_duplicates() {
        let mut signals = SignalList::new();
        signals.regist_signal("solve", noop, "Run the solver").unwrap();
        assert!(signals.check_signal("solve"));
        assert_eq!(
            signals.regist_signal("solve", noop, "again").unwrap_err(),
            Error::DuplicateKey("solve".into())
        );
    }

    #[test]
    fn test_hidden_signals_are_not_listed() {
        let mut signals = SignalList::new();
        signals.regist_signal("solve", noop, "").unwrap();
        signals.regist_signal("internal", noop, "").unwrap().hidden(true);
        assert_eq!(signals.names(false), vec!["solve"]);
        assert_eq!(signals.names(true), vec!["solve", "internal"]);
    }

    #[test]
    fn test_signature_holds_defaults() {
        let mut signals = SignalList::new();
        signals
            .regist_signal("mesh", noop, "Generate a mesh")
            .unwrap()
            .arg(ArgSpec::new("name", ValueType::String, "Mesh name"))
            .arg(
                ArgSpec::new("cells", ValueType::Unsigned, "Cells per side")
                    .with_default(WireValue::Single(Value::Unsigned(16))),
            )
            .arg(ArgSpec::array("origin", ValueType::Real, "Origin"));

        let sig = signals.get("mesh").unwrap().signature(";").unwrap();
        assert_eq!(sig.keys(), vec!["name", "cells", "origin"]);
        assert_eq!(sig.get_value::<String>("name").unwrap(), "");
        assert_eq!(sig.get_value::<u32>("cells").unwrap(), 16);
        assert!(sig.get_array::<f64>("origin").unwrap().is_empty());
        assert_eq!(sig.descr("cells"), Some("Cells per side"));
    }
}
