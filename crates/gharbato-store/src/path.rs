//! Slash-separated locations in the store tree.

use crate::error::{Result, StoreError};

/// Characters the remote tree does not allow inside a key.
const FORBIDDEN: &[char] = &['.', '#', '$', '[', ']'];

/// A normalized store location such as `conversations/u1_u2/messages`.
///
/// The root is the empty path. Segments are never empty and never contain
/// `/`, `.`, `#`, `$`, `[`, `]` or control characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StorePath(String);

impl StorePath {
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse a path, tolerating leading and trailing slashes.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Self::root());
        }
        Self::from_segments(trimmed.split('/'))
    }

    pub fn from_segments<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = Self::root();
        for segment in segments {
            path = path.child(segment.as_ref())?;
        }
        Ok(path)
    }

    /// Append one segment.
    pub fn child(&self, segment: &str) -> Result<Self> {
        validate_segment(segment).map_err(|reason| StoreError::InvalidPath {
            path: format!("{}/{}", self.0, segment),
            reason,
        })?;
        if self.is_root() {
            Ok(Self(segment.to_string()))
        } else {
            Ok(Self(format!("{}/{}", self.0, segment)))
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(idx) => Some(Self(self.0[..idx].to_string())),
            None => Some(Self::root()),
        }
    }

    /// Last segment, `None` for the root.
    pub fn key(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        Some(self.0.rsplit('/').next().unwrap_or(&self.0))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if `other` is this path or lies below it.
    pub fn contains(&self, other: &StorePath) -> bool {
        if self.is_root() || self.0 == other.0 {
            return true;
        }
        other.0.len() > self.0.len()
            && other.0.starts_with(&self.0)
            && other.0.as_bytes()[self.0.len()] == b'/'
    }

    /// `true` if a change at one path can affect a read of the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// Half-open string range `[lower, upper)` covering every strict
    /// descendant of this path. `'0'` is the byte right after `'/'`.
    pub(crate) fn descendant_range(&self) -> (String, String) {
        (format!("{}/", self.0), format!("{}0", self.0))
    }
}

impl std::fmt::Display for StorePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

fn validate_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty segment");
    }
    if segment.contains('/') {
        return Err("segment contains '/'");
    }
    if segment.contains(FORBIDDEN) {
        return Err("segment contains one of . # $ [ ]");
    }
    if segment.chars().any(char::is_control) {
        return Err("segment contains a control character");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_slashes() {
        let path = StorePath::parse("/conversations/u1_u2/messages/").unwrap();
        assert_eq!(path.as_str(), "conversations/u1_u2/messages");
        assert_eq!(path.key(), Some("messages"));
        assert!(StorePath::parse("/").unwrap().is_root());
    }

    #[test]
    fn rejects_bad_segments() {
        assert!(StorePath::parse("a//b").is_err());
        assert!(StorePath::root().child("a.b").is_err());
        assert!(StorePath::root().child("a/b").is_err());
        assert!(StorePath::root().child("").is_err());
        assert!(StorePath::root().child("x\n").is_err());
    }

    #[test]
    fn parent_walks_up_to_root() {
        let path = StorePath::parse("call_invitations/u2").unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.as_str(), "call_invitations");
        assert!(parent.parent().unwrap().is_root());
        assert!(StorePath::root().parent().is_none());
    }

    #[test]
    fn containment_respects_segment_boundaries() {
        let a = StorePath::parse("call_invitations/u2").unwrap();
        let b = StorePath::parse("call_invitations/u21").unwrap();
        let c = StorePath::parse("call_invitations").unwrap();
        assert!(!a.contains(&b));
        assert!(!a.overlaps(&b));
        assert!(c.contains(&a));
        assert!(a.overlaps(&c));
        assert!(StorePath::root().contains(&a));
    }
}
