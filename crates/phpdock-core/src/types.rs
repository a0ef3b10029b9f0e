//! Identifiers and naming rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque unique identifier for a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(Uuid);

impl ProjectId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Identifier of an auxiliary service, as listed in the static registry
/// (e.g. `"redis"`, `"mysql"`, `"caddy"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(String);

impl ServiceId {
    /// Wraps a registry id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServiceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Canonicalizes a user-supplied project name into a slug.
///
/// The result matches `^[a-z0-9]+(-[a-z0-9]+)*$`: lowercase, runs of
/// non-alphanumeric characters collapse into single hyphens, and leading or
/// trailing hyphens are stripped. The slug is derived once at project
/// creation and never re-derived afterwards; volume, container, and domain
/// names are deterministic functions of it.
///
/// Applying `sanitize_name` to its own output returns the input unchanged.
pub fn sanitize_name(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending_hyphen = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_collapses_punctuation() {
        assert_eq!(sanitize_name("My Site!!"), "my-site");
        assert_eq!(sanitize_name("  Hello,   World  "), "hello-world");
        assert_eq!(sanitize_name("a__b--c"), "a-b-c");
    }

    #[test]
    fn sanitize_strips_edge_hyphens() {
        assert_eq!(sanitize_name("--edge--"), "edge");
        assert_eq!(sanitize_name("!!!"), "");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for raw in ["My Site!!", "shop.example.com", "UPPER case", "a1-b2"] {
            let once = sanitize_name(raw);
            assert_eq!(sanitize_name(&once), once);
        }
    }

    #[test]
    fn sanitize_output_shape() {
        for raw in ["My Site!!", "x", "42", "Crème brûlée"] {
            let slug = sanitize_name(raw);
            if slug.is_empty() {
                continue;
            }
            assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            assert!(!slug.contains("--"));
            assert!(slug
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
        }
    }

    #[test]
    fn service_id_display() {
        let id = ServiceId::new("redis");
        assert_eq!(id.to_string(), "redis");
        assert_eq!(id.as_str(), "redis");
    }
}
