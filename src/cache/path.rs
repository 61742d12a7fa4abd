//! Path Normalization Module
//!
//! Turns filesystem-style paths into the canonical strings used as file cache
//! keys. Two paths share a cache entry exactly when they normalize to the same
//! string.
//!
//! # Rules
//! - Only `/` separates components; `\` is an ordinary character
//! - Empty components (`a//b`) and `.` components are dropped
//! - A trailing separator is dropped; a leading one is kept
//! - `..` removes the preceding component; climbing above the first
//!   component is an error unless [`PathPolicy::allow_parent_escape`] is set
//! - Case is preserved exactly

use std::borrow::Borrow;
use std::fmt;
use std::path::Path;

use crate::error::PathError;

// == Path Policy ==
/// Caller-controlled normalization rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathPolicy {
    /// Keep leading `..` components on relative paths instead of rejecting
    /// them. On absolute paths an escaping `..` is dropped (`/..` is `/`).
    pub allow_parent_escape: bool,
}

impl PathPolicy {
    pub fn permissive() -> Self {
        Self {
            allow_parent_escape: true,
        }
    }
}

// == Normalized Path ==
/// Canonical string form of a path, as produced by [`normalize`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    pub fn is_absolute(&self) -> bool {
        self.0.starts_with('/')
    }

    /// True if `self` equals `dir` or lies somewhere below it.
    pub fn starts_with(&self, dir: &NormalizedPath) -> bool {
        let dir = dir.as_str();
        if dir == "." {
            return !self.is_absolute();
        }
        if dir == "/" {
            return self.is_absolute();
        }
        match self.0.strip_prefix(dir) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Appends a relative path, normalizing the result.
    pub fn join(&self, rest: &str, policy: &PathPolicy) -> Result<NormalizedPath, PathError> {
        if rest.is_empty() {
            return Ok(self.clone());
        }
        normalize_str(&format!("{}/{}", self.0, rest), policy)
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets `HashMap<NormalizedPath, _>` be queried with a plain `&str`.
impl Borrow<str> for NormalizedPath {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// == Normalize ==
/// Normalizes a filesystem path into a cache key.
pub fn normalize(path: impl AsRef<Path>, policy: &PathPolicy) -> Result<NormalizedPath, PathError> {
    let path = path.as_ref();
    let text = path
        .to_str()
        .ok_or_else(|| PathError::NonUtf8(path.to_string_lossy().into_owned()))?;
    normalize_str(text, policy)
}

/// Normalizes a path given as a string.
pub fn normalize_str(path: &str, policy: &PathPolicy) -> Result<NormalizedPath, PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }

    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute && policy.allow_parent_escape => {}
                _ if policy.allow_parent_escape => parts.push(".."),
                _ => return Err(PathError::EscapesRoot(path.to_string())),
            },
            normal => parts.push(normal),
        }
    }

    let joined = parts.join("/");
    let normalized = match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    };
    Ok(NormalizedPath(normalized))
}
