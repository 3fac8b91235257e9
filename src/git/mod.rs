//! Git integration layer.
//!
//! This module wraps the `git2` backend and re-exports the operations the
//! backup jobs need: clone/open, fetch, checkout of a [`Reference`] and
//! pruning of unreachable loose objects.

mod git2_backend;

use std::fmt;

pub use git2_backend::{checkout, fetch_origin, has_tag, open_or_clone, prune_loose_objects};

/// A named pointer into history, checked out differently per kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// Mutable; checked out as a local branch tracking `origin`.
    Branch(String),
    /// Immutable; checked out through a local `<tag>-branch`.
    Tag(String),
}

impl Reference {
    pub fn name(&self) -> &str {
        match self {
            Reference::Branch(name) | Reference::Tag(name) => name,
        }
    }

    pub fn is_tag(&self) -> bool {
        matches!(self, Reference::Tag(_))
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Branch(name) => write!(f, "branch {}", name),
            Reference::Tag(name) => write!(f, "tag {}", name),
        }
    }
}
