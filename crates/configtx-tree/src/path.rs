//! Group paths for addressing within a configuration tree
//!
//! Provides [`GroupPath`] for hierarchical addressing of groups.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Path of a group within a configuration tree
///
/// Segments are group names from the tree root downwards.
///
/// # Examples
/// - `[]` → `/`
/// - `["Channel", "Application", "Org1"]` → `/Channel/Application/Org1`
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupPath(Vec<String>);

impl GroupPath {
    /// Separator between segments in the display form
    pub const SEPARATOR: char = '/';

    /// Create new path from segments
    #[inline]
    #[must_use]
    pub fn new(segments: Vec<String>) -> Self {
        Self(segments)
    }

    /// Empty path (tree root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Number of segments below the root
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Check if path is the root
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        if self.0.is_empty() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Get last segment (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Append a segment, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut new = self.clone();
        new.0.push(segment.into());
        new
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }
}

impl Display for GroupPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "{}", Self::SEPARATOR);
        }
        for segment in &self.0 {
            write!(f, "{}{segment}", Self::SEPARATOR)?;
        }
        Ok(())
    }
}

impl FromStr for GroupPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(Self::SEPARATOR)
            .ok_or_else(|| PathError::NotAbsolute(s.to_string()))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }

        let segments: Vec<String> = rest.split(Self::SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment(s.to_string()));
        }
        Ok(Self(segments))
    }
}

/// Errors parsing group paths
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// Path does not start at the root
    #[error("path must start with '/': {0}")]
    NotAbsolute(String),

    /// Path contains an empty segment
    #[error("path contains an empty segment: {0}")]
    EmptySegment(String),
}
