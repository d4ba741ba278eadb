//! Typed, triggerable component options.
//!
//! Every option has a declared type (scalar or array of one [`ValueType`]),
//! a current and a default value, a description and a basic/advanced
//! classification. Values arrive encoded in a [`Map`] and are decoded against
//! the declared type before anything is stored.
//!
//! # Triggers
//!
//! Triggers are closures run synchronously after a successful store, in
//! registration order. They receive the whole [`OptionList`], so they can
//! read sibling options that were already updated and may call
//! [`OptionList::set`] again. Nothing guards against a trigger chain that
//! keeps re-setting the same options; callers own that recursion.
//!
//! A failed store (type mismatch, value outside the restricted set) leaves
//! the value untouched and fires no trigger.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::constants::{ATTR_DESCR, ATTR_KEY, ATTR_MODE, RESTRICTED_LIST_KEY, SUBTREE_ELEMENT};
use crate::error::{Error, Result};
use crate::xml::types::type_label;
use crate::xml::{Map, Value, ValueType, WireType, WireValue};

/// Callback run after an option value changes.
pub type Trigger = Arc<dyn Fn(&mut OptionList) + Send + Sync>;

/// One named, typed option.
#[derive(Clone)]
pub struct OptionT {
    name: String,
    value: WireValue,
    default: WireValue,
    description: String,
    triggers: Vec<Trigger>,
    restricted: Vec<Value>,
    basic: bool,
}

impl std::fmt::Debug for OptionT {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptionT")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("basic", &self.basic)
            .field("triggers", &self.triggers.len())
            .finish_non_exhaustive()
    }
}

impl OptionT {
    fn new(name: &str, default: WireValue, description: &str) -> Self {
        Self {
            name: name.to_string(),
            value: default.clone(),
            default,
            description: description.to_string(),
            triggers: Vec::new(),
            restricted: Vec::new(),
            basic: false,
        }
    }

    /// Option name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current value.
    pub fn value(&self) -> &WireValue {
        &self.value
    }

    /// Value the option was declared with.
    pub fn default_value(&self) -> &WireValue {
        &self.default
    }

    /// Description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared scalar or element type.
    pub fn value_type(&self) -> ValueType {
        self.default.value_type()
    }

    /// Returns `true` for array options.
    pub fn is_array(&self) -> bool {
        self.default.is_array()
    }

    /// `integer`, `array[real]`, ...
    pub fn type_label(&self) -> String {
        type_label(self.value_type(), self.is_array())
    }

    /// Returns `true` if the option is shown in basic mode.
    pub fn is_basic(&self) -> bool {
        self.basic
    }

    /// Allowed values; empty means unrestricted.
    pub fn restricted_values(&self) -> &[Value] {
        &self.restricted
    }

    /// Number of attached triggers.
    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Builder-style: show in basic mode.
    pub fn mark_basic(&mut self) -> &mut Self {
        self.basic = true;
        self
    }

    /// Builder-style: attach a trigger.
    pub fn attach_trigger<F>(&mut self, trigger: F) -> &mut Self
    where
        F: Fn(&mut OptionList) + Send + Sync + 'static,
    {
        self.triggers.push(Arc::new(trigger));
        self
    }

    /// Type and restriction check for a candidate value.
    fn check(&self, candidate: &WireValue) -> Result<()> {
        if candidate.value_type() != self.value_type() || candidate.is_array() != self.is_array() {
            return Err(Error::TypeMismatch {
                key: self.name.clone(),
                expected: self.type_label(),
                found: candidate.type_label(),
            });
        }
        if !self.restricted.is_empty() {
            if let Some(bad) = candidate.items().iter().find(|v| !self.restricted.contains(v)) {
                return Err(Error::ValidationError {
                    option: self.name.clone(),
                    value: bad.to_wire(),
                });
            }
        }
        Ok(())
    }
}

/// Ordered set of options owned by one component.
#[derive(Debug, Clone, Default)]
pub struct OptionList {
    options: IndexMap<String, OptionT>,
}

impl OptionList {
    /// Create an empty option list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a scalar option.
    pub fn add_option<T: WireType>(
        &mut self,
        name: &str,
        default: T,
        description: &str,
    ) -> Result<&mut OptionT> {
        self.add(name, WireValue::single(default), description)
    }

    /// Declare an array option.
    pub fn add_array_option<T: WireType>(
        &mut self,
        name: &str,
        default: Vec<T>,
        description: &str,
    ) -> Result<&mut OptionT> {
        self.add(name, WireValue::array(default), description)
    }

    /// Declare an option from a runtime-typed default.
    pub fn add(&mut self, name: &str, default: WireValue, description: &str) -> Result<&mut OptionT> {
        if name.is_empty() {
            return Err(Error::EmptyKey);
        }
        if self.options.contains_key(name) {
            return Err(Error::DuplicateKey(name.to_string()));
        }
        let (index, _) = self
            .options
            .insert_full(name.to_string(), OptionT::new(name, default, description));
        Ok(&mut self.options[index])
    }

    fn option_mut(&mut self, name: &str) -> Result<&mut OptionT> {
        self.options
            .get_mut(name)
            .ok_or_else(|| Error::not_found(format!("option [{name}]")))
    }

    /// Option by name.
    pub fn get(&self, name: &str) -> Option<&OptionT> {
        self.options.get(name)
    }

    /// Returns `true` if an option with this name exists.
    pub fn check(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    /// Options in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &OptionT> {
        self.options.values()
    }

    /// Option names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.options.keys().map(String::as_str).collect()
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Returns `true` if there are no options.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Decode the entry `name` of `encoded` and store it.
    pub fn set_value(&mut self, name: &str, encoded: &Map) -> Result<()> {
        let option = self
            .options
            .get(name)
            .ok_or_else(|| Error::not_found(format!("option [{name}]")))?;
        let value = decode_for(option, encoded)?;
        self.set(name, value)
    }

    /// Store a runtime-typed value and run the option's triggers.
    pub fn set(&mut self, name: &str, value: WireValue) -> Result<()> {
        let option = self.option_mut(name)?;
        option.check(&value)?;
        self.commit(name, value)
    }

    /// Store a typed scalar.
    pub fn set_typed<T: WireType>(&mut self, name: &str, value: T) -> Result<()> {
        self.set(name, WireValue::single(value))
    }

    /// Store a typed array.
    pub fn set_array<T: WireType>(&mut self, name: &str, values: Vec<T>) -> Result<()> {
        self.set(name, WireValue::array(values))
    }

    fn commit(&mut self, name: &str, value: WireValue) -> Result<()> {
        let option = self.option_mut(name)?;
        option.value = value;
        let triggers = option.triggers.clone();
        for trigger in &triggers {
            trigger(self);
        }
        Ok(())
    }

    /// Apply every entry of `map`.
    ///
    /// All entries are decoded and validated before the first store, so a
    /// bad entry leaves every option unchanged. Stores then happen in map
    /// order, each followed by its own triggers. Returns the changed names.
    pub fn configure(&mut self, map: &Map) -> Result<Vec<String>> {
        let mut staged = Vec::with_capacity(map.len());
        for key in map.keys() {
            let option = self
                .options
                .get(key)
                .ok_or_else(|| Error::not_found(format!("option [{key}]")))?;
            let value = decode_for(option, map)?;
            option.check(&value)?;
            staged.push((key.to_string(), value));
        }

        let mut changed = Vec::with_capacity(staged.len());
        for (name, value) in staged {
            self.commit(&name, value)?;
            changed.push(name);
        }
        Ok(changed)
    }

    /// Restrict an option to a set of values.
    pub fn restrict_to(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        let option = self.option_mut(name)?;
        if let Some(bad) = values.iter().find(|v| v.value_type() != option.value_type()) {
            return Err(Error::TypeMismatch {
                key: name.to_string(),
                expected: option.value_type().tag().to_string(),
                found: bad.value_type().tag().to_string(),
            });
        }
        option.restricted = values;
        Ok(())
    }

    /// Attach a trigger to an existing option.
    pub fn attach_trigger<F>(&mut self, name: &str, trigger: F) -> Result<()>
    where
        F: Fn(&mut OptionList) + Send + Sync + 'static,
    {
        self.option_mut(name)?.attach_trigger(trigger);
        Ok(())
    }

    /// Show an option in basic mode.
    pub fn mark_basic(&mut self, name: &str) -> Result<()> {
        self.option_mut(name)?.mark_basic();
        Ok(())
    }

    /// Current value of a scalar option.
    pub fn value<T: WireType>(&self, name: &str) -> Result<T> {
        let option = self
            .get(name)
            .ok_or_else(|| Error::not_found(format!("option [{name}]")))?;
        option.value.get::<T>().ok_or_else(|| Error::TypeMismatch {
            key: name.to_string(),
            expected: T::TYPE.tag().to_string(),
            found: option.type_label(),
        })
    }

    /// Current value of an array option.
    pub fn array<T: WireType>(&self, name: &str) -> Result<Vec<T>> {
        let option = self
            .get(name)
            .ok_or_else(|| Error::not_found(format!("option [{name}]")))?;
        option.value.get_array::<T>().ok_or_else(|| Error::TypeMismatch {
            key: name.to_string(),
            expected: type_label(T::TYPE, true),
            found: option.type_label(),
        })
    }

    /// Encode current values with description, mode and restricted values.
    pub fn to_map(&self, delimiter: &str) -> Result<Map> {
        let mut map = Map::new();
        for option in self.options.values() {
            let node = map.set_wire(&option.name, &option.value, delimiter)?;
            if !option.description.is_empty() {
                node.set_attr(ATTR_DESCR, option.description.as_str());
            }
            node.set_attr(ATTR_MODE, if option.basic { "basic" } else { "adv" });
            if !option.restricted.is_empty() {
                let list = WireValue::Array {
                    element: option.value_type(),
                    items: option.restricted.clone(),
                };
                node.children.push(Map::encode_entry(RESTRICTED_LIST_KEY, &list, delimiter)?);
            }
        }
        Ok(map)
    }

    /// Rebuild an option list from [`OptionList::to_map`] output.
    ///
    /// Current values become the defaults; triggers are not carried.
    pub fn from_map(map: &Map) -> Result<OptionList> {
        let mut list = OptionList::new();
        for node in &map.node().children {
            if node.name == SUBTREE_ELEMENT {
                continue;
            }
            let key = node.attr(ATTR_KEY).unwrap_or("");
            let value = Map::decode_entry(node)?;
            let restricted = match node
                .children
                .iter()
                .find(|c| c.attr(ATTR_KEY) == Some(RESTRICTED_LIST_KEY))
            {
                Some(list_node) => Map::decode_entry(list_node)?.items().to_vec(),
                None => Vec::new(),
            };

            let option = list.add(key, value, node.attr(ATTR_DESCR).unwrap_or(""))?;
            option.basic = node.attr(ATTR_MODE) == Some("basic");
            option.restricted = restricted;
        }
        Ok(list)
    }
}

/// Decode the entry for `option` from `encoded`, reporting wire/declared
/// type disagreement before touching the payload.
fn decode_for(option: &OptionT, encoded: &Map) -> Result<WireValue> {
    let name = option.name();
    if !encoded.check_entry(name) {
        return Err(Error::not_found(format!("entry [{name}]")));
    }
    let wire_type = encoded.entry_type(name);
    if wire_type != Some(option.value_type()) || encoded.is_array(name) != option.is_array() {
        return Err(Error::TypeMismatch {
            key: name.to_string(),
            expected: option.type_label(),
            found: wire_type
                .map(|t| type_label(t, encoded.is_array(name)))
                .unwrap_or_else(|| "subtree".to_string()),
        });
    }
    encoded.get_wire(name)
}
