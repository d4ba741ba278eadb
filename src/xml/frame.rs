//! Signal and reply frames.
//!
//! ```text
//! <frame type="signal" target="configure" receiver="/Root/solver"
//!        sender="3f0c..." frameid="9a1e...">
//!   <map>...</map>
//! </frame>
//!
//! <frame type="reply" target="configure" receiver="/Root/solver"
//!        sender="server" frameid="9a1e...">
//!   <map/>
//!   <error kind="dispatch_failure">signal [configure] failed: ...</error>
//! </frame>
//! ```
//!
//! A reply carries the frame id of its request. Errors travel as a kind
//! string plus text; no local error value crosses the wire.

use super::map::Map;
use super::XmlNode;
use crate::constants::{ERROR_ELEMENT, FRAME_ELEMENT, MAP_ELEMENT};
use crate::error::{Error, ErrorKind, Result};
use crate::uri::Uri;

/// Direction of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Request to run a signal on the receiver.
    Signal,
    /// Answer to a request, correlated by frame id.
    Reply,
}

impl FrameKind {
    fn as_str(self) -> &'static str {
        match self {
            FrameKind::Signal => "signal",
            FrameKind::Reply => "reply",
        }
    }
}

/// Error payload of a reply.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameError {
    /// Error family.
    pub kind: ErrorKind,
    /// Diagnostic text.
    pub message: String,
}

/// Request or reply envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalFrame {
    /// Request or reply.
    pub kind: FrameKind,
    /// Signal name.
    pub target: String,
    /// Path of the component the signal runs on.
    pub receiver: Uri,
    /// Id of the emitting peer.
    pub sender: String,
    /// Correlation id shared by a request and its reply.
    pub frame_id: String,
    /// Arguments (requests) or output values (replies).
    pub args: Map,
    /// Failure of the request, replies only.
    pub error: Option<FrameError>,
}

impl SignalFrame {
    /// New request with a fresh frame id.
    pub fn new(target: impl Into<String>, receiver: Uri, sender: impl Into<String>) -> Self {
        Self {
            kind: FrameKind::Signal,
            target: target.into(),
            receiver,
            sender: sender.into(),
            frame_id: uuid::Uuid::new_v4().to_string(),
            args: Map::new(),
            error: None,
        }
    }

    /// Builder-style argument setter.
    #[must_use]
    pub fn with_args(mut self, args: Map) -> Self {
        self.args = args;
        self
    }

    /// Empty reply to this frame, sent by `sender`.
    pub fn reply_to(&self, sender: impl Into<String>) -> SignalFrame {
        SignalFrame {
            kind: FrameKind::Reply,
            target: self.target.clone(),
            receiver: self.receiver.clone(),
            sender: sender.into(),
            frame_id: self.frame_id.clone(),
            args: Map::new(),
            error: None,
        }
    }

    /// Attach an error to a reply.
    #[must_use]
    pub fn with_error(mut self, error: &Error) -> Self {
        self.error = Some(FrameError { kind: error.kind(), message: error.to_string() });
        self
    }

    /// Returns `true` for replies.
    pub fn is_reply(&self) -> bool {
        self.kind == FrameKind::Reply
    }

    /// Returns `true` for replies carrying an error.
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Element form.
    pub fn to_node(&self) -> XmlNode {
        let mut node = XmlNode::new(FRAME_ELEMENT)
            .with_attr("type", self.kind.as_str())
            .with_attr("target", self.target.as_str())
            .with_attr("receiver", self.receiver.to_string())
            .with_attr("sender", self.sender.as_str())
            .with_attr("frameid", self.frame_id.as_str());
        node.children.push(self.args.node().clone());
        if let Some(error) = &self.error {
            node.children.push(
                XmlNode::new(ERROR_ELEMENT)
                    .with_attr("kind", error.kind.as_str())
                    .with_text(error.message.as_str()),
            );
        }
        node
    }

    /// Rebuild from element form.
    pub fn from_node(node: &XmlNode) -> Result<Self> {
        if node.name != FRAME_ELEMENT {
            return Err(Error::malformed(format!(
                "expected <{FRAME_ELEMENT}>, found <{}>",
                node.name
            )));
        }
        let attr = |key: &str| {
            node.attr(key)
                .ok_or_else(|| Error::malformed(format!("frame without [{key}]")))
        };

        let kind = match attr("type")? {
            "signal" => FrameKind::Signal,
            "reply" => FrameKind::Reply,
            other => return Err(Error::malformed(format!("unknown frame type [{other}]"))),
        };
        let target = attr("target")?;
        if target.is_empty() {
            return Err(Error::malformed("frame with empty target"));
        }

        let args = match node.child(MAP_ELEMENT) {
            Some(map) => Map::from_node(map.clone())?,
            None => Map::new(),
        };

        let error = match node.child(ERROR_ELEMENT) {
            Some(err) => {
                let kind_name = err.attr("kind").unwrap_or("dispatch_failure");
                let kind = ErrorKind::parse(kind_name)
                    .ok_or_else(|| Error::malformed(format!("unknown error kind [{kind_name}]")))?;
                Some(FrameError { kind, message: err.text.clone() })
            }
            None => None,
        };

        Ok(Self {
            kind,
            target: target.to_string(),
            receiver: Uri::parse(attr("receiver")?),
            sender: attr("sender")?.to_string(),
            frame_id: attr("frameid")?.to_string(),
            args,
            error,
        })
    }

    /// Compact XML text.
    pub fn to_xml_string(&self) -> String {
        self.to_node().to_xml_string()
    }

    /// Parse the XML text of a frame.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_node(&XmlNode::parse(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let mut args = Map::new();
        args.set_value("name", String::from("mesh")).unwrap();
        let frame = SignalFrame::new("create_component", Uri::parse("/Root"), "client-1")
            .with_args(args);

        let back = SignalFrame::parse(&frame.to_xml_string()).unwrap();
        assert_eq!(back, frame);
        assert!(!back.is_reply());
    }

    #[test]
    fn test_reply_keeps_frame_id() {
        let frame = SignalFrame::new("list_tree", Uri::parse("/Root"), "client-1");
        let reply = frame
            .reply_to("server")
            .with_error(&Error::UnknownSignal { target: "/Root".into(), signal: "x".into() });
        assert_eq!(reply.frame_id, frame.frame_id);
        assert!(reply.is_reply());
        assert!(reply.is_error());

        let back = SignalFrame::parse(&reply.to_xml_string()).unwrap();
        let error = back.error.unwrap();
        assert_eq!(error.kind, ErrorKind::NotFound);
        assert!(error.message.contains("unknown signal [x]"));
    }

    #[test]
    fn test_malformed_frames() {
        assert!(SignalFrame::parse("<map/>").is_err());
        assert!(SignalFrame::parse(r#"<frame type="push" target="a" receiver="/" sender="s" frameid="1"/>"#).is_err());
        assert!(SignalFrame::parse(r#"<frame type="signal" target="a" receiver="/"/>"#).is_err());
    }
}
