//! Typed XML wire format.
//!
//! Everything crossing a process boundary (signal arguments, replies, tree
//! snapshots) is a small XML document. This module holds the in-memory
//! element tree and its text form; the typed layers sit on top of it.
//!
//! # Architecture
//!
//! ```text
//! XmlNode        element tree, text <-> DOM (quick-xml)
//!   └── Map      keyed value / array / subtree entries (the codec)
//!         └── SignalFrame   request and reply envelopes
//! ```

pub mod frame;
pub mod map;
pub mod types;

pub use frame::{FrameError, FrameKind, SignalFrame};
pub use map::Map;
pub use types::{Value, ValueType, WireType, WireValue};

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::constants::ARRAY_ELEMENT;
use crate::error::{Error, Result};

/// One XML element: name, ordered attributes, text and child elements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    /// Element name.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Concatenated character data directly inside this element.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Empty element with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Builder-style text setter.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Attribute value by name.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set or replace an attribute, keeping its position if it exists.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key.to_string(), value)),
        }
    }

    /// Remove an attribute. Returns its previous value.
    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Mutable access to the first child element with the given name.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut XmlNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// All child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Append a child element and return a reference to it.
    pub fn push_child(&mut self, child: XmlNode) -> &mut XmlNode {
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Render as compact XML text (no declaration, no indentation).
    pub fn to_xml_string(&self) -> String {
        let mut writer = Writer::new(Vec::new());
        if let Err(e) = write_node(&mut writer, self) {
            // Writing into a Vec only fails on invalid names; keep whatever was produced.
            log::warn!("Failed to render <{}>: {e}", self.name);
        }
        String::from_utf8_lossy(&writer.into_inner()).into_owned()
    }

    /// Parse XML text into an element tree.
    ///
    /// Whitespace between child elements is dropped. Leading whitespace-only
    /// text of an element with children is dropped too, except on `array`
    /// elements, where it is the payload. Everything else is kept verbatim.
    pub fn parse(text: &str) -> Result<XmlNode> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            let position = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|e| Error::malformed(format!("at byte {position}: {e}")))?;
            match event {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let node = element_from(&start)?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(text) => {
                    let text = text.unescape().map_err(|e| Error::malformed(e.to_string()))?;
                    match stack.last_mut() {
                        Some(top) if !top.children.is_empty() && text.trim().is_empty() => {}
                        Some(top) => top.text.push_str(&text),
                        None if text.trim().is_empty() => {}
                        None => return Err(Error::malformed("text outside the root element")),
                    }
                }
                Event::CData(data) => match stack.last_mut() {
                    Some(top) => top.text.push_str(&String::from_utf8_lossy(&data)),
                    None => return Err(Error::malformed("CDATA outside the root element")),
                },
                Event::End(_) => {
                    let mut node = stack
                        .pop()
                        .ok_or_else(|| Error::malformed("unbalanced end tag"))?;
                    if !node.children.is_empty()
                        && node.text.trim().is_empty()
                        && node.name != ARRAY_ELEMENT
                    {
                        node.text.clear();
                    }
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(Error::malformed(format!("unclosed element <{}>", open.name)));
        }
        root.ok_or_else(|| Error::malformed("empty document"))
    }
}

impl std::fmt::Display for XmlNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_xml_string())
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlNode> {
    let mut node = XmlNode::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| Error::malformed(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| Error::malformed(e.to_string()))?
            .into_owned();
        node.attributes.push((key, value));
    }
    Ok(node)
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        return Ok(());
    }
    if root.is_some() {
        return Err(Error::malformed(format!("second root element <{}>", node.name)));
    }
    *root = Some(node);
    Ok(())
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> std::result::Result<(), String> {
    let mut start = BytesStart::new(node.name.as_str());
    for (key, value) in &node.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if node.text.is_empty() && node.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(|e| e.to_string());
    }

    writer.write_event(Event::Start(start)).map_err(|e| e.to_string())?;
    if !node.text.is_empty() {
        writer
            .write_event(Event::Text(BytesText::new(&node.text)))
            .map_err(|e| e.to_string())?;
    }
    for child in &node.children {
        write_node(writer, child)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(node.name.as_str())))
        .map_err(|e| e.to_string())
}
