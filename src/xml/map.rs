//! Keyed value codec.
//!
//! A [`Map`] is a `<map>` element holding keyed entries:
//!
//! ```text
//! <map>
//!   <value key="cfl" descr="Courant number"><real>0.5</real></value>
//!   <array key="coords" type="real" size="3" delimiter=";">0;1.5;2</array>
//!   <subtree key="tree"><node name="Root" atype="Root"/></subtree>
//! </map>
//! ```
//!
//! Arrays store element count and delimiter next to a flat payload, so every
//! decode re-splits the payload and checks the count. A delimiter that also
//! occurs inside an element is caught as a [`Error::SizeMismatch`].

use super::types::{type_label, Value, ValueType, WireType, WireValue};
use super::XmlNode;
use crate::constants::{
    ARRAY_ELEMENT, ATTR_DELIMITER, ATTR_DESCR, ATTR_KEY, ATTR_SIZE, ATTR_TYPE, MAP_ELEMENT,
    SUBTREE_ELEMENT, VALUE_ELEMENT,
};
use crate::error::{Error, Result};

/// Keyed collection of typed values, arrays and nested subtrees.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    node: XmlNode,
}

impl Default for Map {
    fn default() -> Self {
        Self::new()
    }
}

impl Map {
    /// Empty map.
    pub fn new() -> Self {
        Self { node: XmlNode::new(MAP_ELEMENT) }
    }

    /// Wrap a `<map>` element, checking that every entry is keyed and unique.
    pub fn from_node(node: XmlNode) -> Result<Self> {
        if node.name != MAP_ELEMENT {
            return Err(Error::malformed(format!(
                "expected <{MAP_ELEMENT}>, found <{}>",
                node.name
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for entry in &node.children {
            if ![VALUE_ELEMENT, ARRAY_ELEMENT, SUBTREE_ELEMENT].contains(&entry.name.as_str()) {
                return Err(Error::malformed(format!("unexpected <{}> in map", entry.name)));
            }
            let key = entry.attr(ATTR_KEY).unwrap_or("");
            if key.is_empty() {
                return Err(Error::malformed(format!("<{}> without key", entry.name)));
            }
            if !seen.insert(key) {
                return Err(Error::malformed(format!("duplicate key [{key}]")));
            }
        }
        Ok(Self { node })
    }

    /// Parse the XML text of a `<map>`.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_node(XmlNode::parse(text)?)
    }

    /// Underlying element.
    pub fn node(&self) -> &XmlNode {
        &self.node
    }

    /// Consume into the underlying element.
    pub fn into_node(self) -> XmlNode {
        self.node
    }

    /// Compact XML text.
    pub fn to_xml_string(&self) -> String {
        self.node.to_xml_string()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.node.children.len()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.node.children.is_empty()
    }

    /// Entry keys in insertion order.
    pub fn keys(&self) -> Vec<&str> {
        self.node
            .children
            .iter()
            .filter_map(|c| c.attr(ATTR_KEY))
            .collect()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.node
            .children
            .iter()
            .position(|c| c.attr(ATTR_KEY) == Some(key))
    }

    /// Entry element for `key`.
    pub fn find_value(&self, key: &str) -> Option<&XmlNode> {
        self.position(key).map(|i| &self.node.children[i])
    }

    /// Mutable entry element for `key`.
    pub fn find_value_mut(&mut self, key: &str) -> Option<&mut XmlNode> {
        let pos = self.position(key)?;
        Some(&mut self.node.children[pos])
    }

    fn entry_node(&self, key: &str) -> Result<&XmlNode> {
        self.find_value(key)
            .ok_or_else(|| Error::not_found(format!("entry [{key}]")))
    }

    /// Returns `true` if an entry exists for `key`.
    pub fn check_entry(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Returns `true` if `key` holds an array.
    pub fn is_array(&self, key: &str) -> bool {
        self.find_value(key).is_some_and(|n| n.name == ARRAY_ELEMENT)
    }

    /// Scalar type, or element type for arrays. `None` for subtrees and misses.
    pub fn entry_type(&self, key: &str) -> Option<ValueType> {
        self.find_value(key).and_then(entry_value_type)
    }

    /// Description attached to an entry.
    pub fn descr(&self, key: &str) -> Option<&str> {
        self.find_value(key).and_then(|n| n.attr(ATTR_DESCR))
    }

    /// Attach a description to an existing entry.
    pub fn set_descr(&mut self, key: &str, descr: &str) -> Result<()> {
        let node = self
            .find_value_mut(key)
            .ok_or_else(|| Error::not_found(format!("entry [{key}]")))?;
        node.set_attr(ATTR_DESCR, descr);
        Ok(())
    }

    /// Remove an entry. Returns `true` if it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.position(key) {
            Some(pos) => {
                self.node.children.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Create or update a scalar entry.
    ///
    /// Updating keeps the existing element (and its attributes) and fails
    /// with [`Error::TypeConflict`] if the stored type differs.
    pub fn set_value<T: WireType>(&mut self, key: &str, value: T) -> Result<&mut XmlNode> {
        self.put_single(key, T::TYPE, value.to_wire())
    }

    /// Create or update an array entry joined with `delimiter`.
    pub fn set_array<T: WireType>(
        &mut self,
        key: &str,
        values: &[T],
        delimiter: &str,
    ) -> Result<&mut XmlNode> {
        let items: Vec<String> = values.iter().map(WireType::to_wire).collect();
        self.put_array(key, T::TYPE, &items, delimiter)
    }

    /// Decode a scalar entry.
    pub fn get_value<T: WireType>(&self, key: &str) -> Result<T> {
        let node = self.entry_node(key)?;
        if node.name != VALUE_ELEMENT || scalar_type(node) != Some(T::TYPE) {
            return Err(Error::TypeMismatch {
                key: key.to_string(),
                expected: T::TYPE.tag().to_string(),
                found: entry_label(node),
            });
        }
        let text = scalar_text(node);
        T::from_wire(text).ok_or_else(|| {
            Error::malformed(format!("[{text}] is not a valid {} for [{key}]", T::TYPE))
        })
    }

    /// Decode an array entry, validating delimiter and element count.
    pub fn get_array<T: WireType>(&self, key: &str) -> Result<Vec<T>> {
        let node = self.entry_node(key)?;
        if node.name != ARRAY_ELEMENT || array_type(node) != Some(T::TYPE) {
            return Err(Error::TypeMismatch {
                key: key.to_string(),
                expected: type_label(T::TYPE, true),
                found: entry_label(node),
            });
        }
        split_array(key, node)?
            .into_iter()
            .map(|token| {
                T::from_wire(token).ok_or_else(|| {
                    Error::malformed(format!("[{token}] is not a valid {} in [{key}]", T::TYPE))
                })
            })
            .collect()
    }

    /// Create or update an entry from a runtime-typed value.
    pub fn set_wire(
        &mut self,
        key: &str,
        value: &WireValue,
        delimiter: &str,
    ) -> Result<&mut XmlNode> {
        match value {
            WireValue::Single(v) => self.put_single(key, v.value_type(), v.to_wire()),
            WireValue::Array { element, items } => {
                let items: Vec<String> = items.iter().map(Value::to_wire).collect();
                self.put_array(key, *element, &items, delimiter)
            }
        }
    }

    /// Decode any value or array entry into a runtime-typed value.
    pub fn get_wire(&self, key: &str) -> Result<WireValue> {
        Self::decode_entry(self.entry_node(key)?)
    }

    /// Build a detached entry element.
    pub fn encode_entry(key: &str, value: &WireValue, delimiter: &str) -> Result<XmlNode> {
        let mut map = Map::new();
        map.set_wire(key, value, delimiter)?;
        map.node
            .children
            .pop()
            .ok_or_else(|| Error::malformed(format!("entry [{key}] was not written")))
    }

    /// Decode a detached entry element.
    pub fn decode_entry(node: &XmlNode) -> Result<WireValue> {
        let key = node.attr(ATTR_KEY).unwrap_or("");
        match node.name.as_str() {
            VALUE_ELEMENT => {
                let value_type = scalar_type(node)
                    .ok_or_else(|| Error::malformed(format!("value [{key}] has no type")))?;
                Ok(WireValue::Single(Value::parse(value_type, scalar_text(node), key)?))
            }
            ARRAY_ELEMENT => {
                let element = array_type(node)
                    .ok_or_else(|| Error::malformed(format!("array [{key}] has no valid type")))?;
                let items = split_array(key, node)?
                    .into_iter()
                    .map(|token| Value::parse(element, token, key))
                    .collect::<Result<Vec<_>>>()?;
                Ok(WireValue::Array { element, items })
            }
            other => Err(Error::TypeMismatch {
                key: key.to_string(),
                expected: "value".to_string(),
                found: other.to_string(),
            }),
        }
    }

    /// Create or replace a nested element under `key`.
    pub fn set_subtree(&mut self, key: &str, subtree: XmlNode) -> Result<&mut XmlNode> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if let Some(pos) = self.position(key) {
            let existing = &mut self.node.children[pos];
            if existing.name != SUBTREE_ELEMENT {
                return Err(Error::TypeConflict {
                    key: key.to_string(),
                    existing: entry_label(existing),
                    requested: SUBTREE_ELEMENT.to_string(),
                });
            }
            existing.children = vec![subtree];
            return Ok(existing);
        }
        let mut entry = XmlNode::new(SUBTREE_ELEMENT).with_attr(ATTR_KEY, key);
        entry.children.push(subtree);
        Ok(self.node.push_child(entry))
    }

    /// Nested element stored under `key`.
    pub fn subtree(&self, key: &str) -> Result<&XmlNode> {
        let node = self.entry_node(key)?;
        if node.name != SUBTREE_ELEMENT {
            return Err(Error::TypeMismatch {
                key: key.to_string(),
                expected: SUBTREE_ELEMENT.to_string(),
                found: entry_label(node),
            });
        }
        node.children
            .first()
            .ok_or_else(|| Error::malformed(format!("subtree [{key}] is empty")))
    }

    fn put_single(
        &mut self,
        key: &str,
        value_type: ValueType,
        text: String,
    ) -> Result<&mut XmlNode> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if let Some(pos) = self.position(key) {
            let existing = &mut self.node.children[pos];
            if existing.name != VALUE_ELEMENT || scalar_type(existing) != Some(value_type) {
                return Err(Error::TypeConflict {
                    key: key.to_string(),
                    existing: entry_label(existing),
                    requested: value_type.tag().to_string(),
                });
            }
            if let Some(slot) = existing.child_mut(value_type.tag()) {
                slot.text = text;
            }
            return Ok(existing);
        }
        let mut entry = XmlNode::new(VALUE_ELEMENT).with_attr(ATTR_KEY, key);
        entry.children.push(XmlNode::new(value_type.tag()).with_text(text));
        Ok(self.node.push_child(entry))
    }

    fn put_array(
        &mut self,
        key: &str,
        element: ValueType,
        items: &[String],
        delimiter: &str,
    ) -> Result<&mut XmlNode> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if delimiter.is_empty() {
            return Err(Error::EmptyDelimiter);
        }
        let payload = items.join(delimiter);
        let size = items.len().to_string();

        if let Some(pos) = self.position(key) {
            let existing = &mut self.node.children[pos];
            if existing.name != ARRAY_ELEMENT || array_type(existing) != Some(element) {
                return Err(Error::TypeConflict {
                    key: key.to_string(),
                    existing: entry_label(existing),
                    requested: type_label(element, true),
                });
            }
            existing.set_attr(ATTR_SIZE, size);
            existing.set_attr(ATTR_DELIMITER, delimiter);
            existing.text = payload;
            return Ok(existing);
        }

        let entry = XmlNode::new(ARRAY_ELEMENT)
            .with_attr(ATTR_KEY, key)
            .with_attr(ATTR_TYPE, element.tag())
            .with_attr(ATTR_SIZE, size)
            .with_attr(ATTR_DELIMITER, delimiter)
            .with_text(payload);
        Ok(self.node.push_child(entry))
    }
}

impl std::fmt::Display for Map {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

fn scalar_type(node: &XmlNode) -> Option<ValueType> {
    node.children.iter().find_map(|c| ValueType::from_tag(&c.name))
}

fn scalar_text(node: &XmlNode) -> &str {
    node.children
        .iter()
        .find(|c| ValueType::from_tag(&c.name).is_some())
        .map(|c| c.text.as_str())
        .unwrap_or("")
}

fn array_type(node: &XmlNode) -> Option<ValueType> {
    node.attr(ATTR_TYPE).and_then(ValueType::from_tag)
}

fn entry_value_type(node: &XmlNode) -> Option<ValueType> {
    match node.name.as_str() {
        VALUE_ELEMENT => scalar_type(node),
        ARRAY_ELEMENT => array_type(node),
        _ => None,
    }
}

fn entry_label(node: &XmlNode) -> String {
    match node.name.as_str() {
        VALUE_ELEMENT => scalar_type(node)
            .map(|t| t.tag().to_string())
            .unwrap_or_else(|| VALUE_ELEMENT.to_string()),
        ARRAY_ELEMENT => match array_type(node) {
            Some(t) => type_label(t, true),
            None => ARRAY_ELEMENT.to_string(),
        },
        other => other.to_string(),
    }
}

/// Split an array payload and check it against the recorded size.
///
/// An empty payload holds zero elements unless the size says one (a single
/// empty string).
fn split_array<'a>(key: &str, node: &'a XmlNode) -> Result<Vec<&'a str>> {
    let delimiter = node
        .attr(ATTR_DELIMITER)
        .filter(|d| !d.is_empty())
        .ok_or_else(|| Error::MissingDelimiter(key.to_string()))?;
    let size: usize = node
        .attr(ATTR_SIZE)
        .ok_or_else(|| Error::malformed(format!("array [{key}] has no size")))?
        .trim()
        .parse()
        .map_err(|e| Error::malformed(format!("array [{key}] has an invalid size: {e}")))?;

    let tokens: Vec<&str> = if node.text.is_empty() {
        if size == 1 {
            vec![""]
        } else {
            Vec::new()
        }
    } else {
        node.text.split(delimiter).collect()
    };

    if tokens.len() != size {
        return Err(Error::SizeMismatch { key: key.to_string(), expected: size, found: tokens.len() });
    }
    Ok(tokens)
}
