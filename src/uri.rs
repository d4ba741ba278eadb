//! Component paths.
//!
//! A [`Uri`] is a `/`-delimited sequence of component names, either absolute
//! (`/Root/mesh/inlet`) or relative to some component (`mesh/inlet`,
//! `../outlet`). The textual form may carry a `cpath:` scheme prefix, which
//! is accepted on input and never printed.
//!
//! `.` and `..` segments are kept verbatim until [`Uri::normalize`] folds them.

use serde::{Deserialize, Serialize};

use crate::constants::{PATH_SCHEME, PATH_SEPARATOR};
use crate::error::{Error, Result};

/// Path of a component in the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub struct Uri {
    absolute: bool,
    segments: Vec<String>,
}

impl Uri {
    /// Parse a textual path. Empty segments (`a//b`, trailing `/`) are dropped.
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        let text = text.strip_prefix(PATH_SCHEME).unwrap_or(text);
        let absolute = text.starts_with(PATH_SEPARATOR);
        let segments = text
            .split(PATH_SEPARATOR)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { absolute, segments }
    }

    /// The absolute path `/name`.
    pub fn root(name: &str) -> Self {
        Self { absolute: true, segments: vec![name.to_string()] }
    }

    /// Build an absolute path from segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { absolute: true, segments: segments.into_iter().map(Into::into).collect() }
    }

    /// Returns `true` for paths starting at a root.
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    /// Path segments, in order from the start of the path.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, or the empty string for `/` and the empty relative path.
    pub fn name(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// Path with the last segment removed. `None` if there is nothing to remove.
    pub fn parent(&self) -> Option<Uri> {
        if self.segments.is_empty() {
            return None;
        }
        let mut segments = self.segments.clone();
        segments.pop();
        Some(Self { absolute: self.absolute, segments })
    }

    /// Append `other` to this path. An absolute `other` replaces `self`.
    pub fn join(&self, other: &Uri) -> Uri {
        if other.absolute {
            return other.clone();
        }
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { absolute: self.absolute, segments }
    }

    /// Append a single component name.
    pub fn child(&self, name: &str) -> Uri {
        let mut segments = self.segments.clone();
        segments.push(name.to_string());
        Self { absolute: self.absolute, segments }
    }

    /// Segment-wise prefix test. Both paths must agree on absoluteness.
    pub fn starts_with(&self, prefix: &Uri) -> bool {
        self.absolute == prefix.absolute
            && self.segments.len() >= prefix.segments.len()
            && self.segments.iter().zip(&prefix.segments).all(|(a, b)| a == b)
    }

    /// Fold `.` and `..` segments.
    ///
    /// Leading `..` segments of a relative path are kept; `..` above the
    /// start of an absolute path fails with [`Error::NotFound`].
    pub fn normalize(&self) -> Result<Uri> {
        let mut out: Vec<String> = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            match segment.as_str() {
                "." => {}
                ".." => match out.last().map(String::as_str) {
                    Some(last) if last != ".." => {
                        out.pop();
                    }
                    _ if self.absolute => {
                        return Err(Error::not_found(format!("parent of {}", self)));
                    }
                    _ => out.push(segment.clone()),
                },
                _ => out.push(segment.clone()),
            }
        }
        Ok(Self { absolute: self.absolute, segments: out })
    }

    /// Replace the first segment of an absolute path.
    pub fn with_root(&self, root_name: &str) -> Uri {
        let mut segments = self.segments.clone();
        match segments.first_mut() {
            Some(first) => *first = root_name.to_string(),
            None => segments.push(root_name.to_string()),
        }
        Self { absolute: self.absolute, segments }
    }

    /// Segments of `self` after `prefix`, if `prefix` is a prefix of `self`.
    pub fn strip_prefix(&self, prefix: &Uri) -> Option<&[String]> {
        if self.starts_with(prefix) {
            Some(&self.segments[prefix.segments.len()..])
        } else {
            None
        }
    }
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.absolute {
            write!(f, "{}", PATH_SEPARATOR)?;
        }
        let mut first = true;
        for segment in &self.segments {
            if !first {
                write!(f, "{}", PATH_SEPARATOR)?;
            }
            f.write_str(segment)?;
            first = false;
        }
        Ok(())
    }
}

impl From<&str> for Uri {
    fn from(text: &str) -> Self {
        Self::parse(text)
    }
}

impl From<String> for Uri {
    fn from(text: String) -> Self {
        Self::parse(&text)
    }
}

impl From<Uri> for String {
    fn from(uri: Uri) -> Self {
        uri.to_string()
    }
}

impl std::str::FromStr for Uri {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute_and_relative() {
        let abs = Uri::parse("cpath:/Root/mesh/inlet");
        assert!(abs.is_absolute());
        assert_eq!(abs.segments(), &["Root", "mesh", "inlet"]);
        assert_eq!(abs.to_string(), "/Root/mesh/inlet");

        let rel = Uri::parse("mesh//inlet/");
        assert!(!rel.is_absolute());
        assert_eq!(rel.to_string(), "mesh/inlet");
    }

    #[test]
    fn test_parent_and_name() {
        let uri = Uri::parse("/Root/mesh");
        assert_eq!(uri.name(), "mesh");
        assert_eq!(uri.parent().unwrap().to_string(), "/Root");
        assert_eq!(Uri::parse("/").parent(), None);
    }

    #[test]
    fn test_join_relative_and_absolute() {
        let base = Uri::parse("/Root/a");
        assert_eq!(base.join(&Uri::parse("b/c")).to_string(), "/Root/a/b/c");
        assert_eq!(base.join(&Uri::parse("/Other")).to_string(), "/Other");
    }

    #[test]
    fn test_normalize() {
        let uri = Uri::parse("/Root/a/./b/../c");
        assert_eq!(uri.normalize().unwrap().to_string(), "/Root/a/c");

        let rel = Uri::parse("../../x");
        assert_eq!(rel.normalize().unwrap().to_string(), "../../x");

        let err = Uri::parse("/Root/../..").normalize().unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_starts_with_is_segment_wise() {
        let uri = Uri::parse("/Root/meshes");
        assert!(uri.starts_with(&Uri::parse("/Root")));
        assert!(!uri.starts_with(&Uri::parse("/Root/mesh")));
        assert!(!uri.starts_with(&Uri::parse("Root")));
    }

    #[test]
    fn test_with_root() {
        let uri = Uri::parse("/Old/a/b");
        assert_eq!(uri.with_root("New").to_string(), "/New/a/b");
    }

    #[test]
    fn test_serde_as_string() {
        let uri = Uri::parse("/Root/a");
        let json = serde_json::to_string(&uri).unwrap();
        assert_eq!(json, "\"/Root/a\"");
        let back: Uri = serde_json::from_str(&json).unwrap();
        assert_eq!(back, uri);
    }
}
