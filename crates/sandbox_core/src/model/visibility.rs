//! Visibility descriptors, storage labels and observer authorizations.
//!
//! # Invariants
//! - A descriptor without workspace tokens is public.
//! - A descriptor with workspace tokens is visible only to observers scoped to
//!   one of those workspaces.
//! - Labels are opaque; only a `VisibilityResolver` produces them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

/// Identifier of a private editing scope.
pub type WorkspaceId = String;

/// Source expression plus the set of workspace scope tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityDescriptor {
    /// Boolean-expression-like source string. Never evaluated by this crate.
    #[serde(default)]
    pub source: String,
    /// Workspaces the item is currently scoped to.
    #[serde(default)]
    pub workspaces: BTreeSet<WorkspaceId>,
}

impl VisibilityDescriptor {
    /// Creates a descriptor visible to everyone the source authorizes.
    pub fn public(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            workspaces: BTreeSet::new(),
        }
    }

    /// Creates a descriptor scoped to exactly one workspace.
    pub fn in_workspace(source: impl Into<String>, workspace_id: &str) -> Self {
        Self::public(source).with_workspace(workspace_id)
    }

    pub fn has_workspace_tokens(&self) -> bool {
        !self.workspaces.is_empty()
    }

    pub fn contains_workspace(&self, workspace_id: &str) -> bool {
        self.workspaces.contains(workspace_id)
    }

    /// Returns a copy carrying `workspace_id` in addition to existing tokens.
    pub fn with_workspace(&self, workspace_id: &str) -> Self {
        let mut next = self.clone();
        next.workspaces.insert(workspace_id.to_string());
        next
    }

    /// Returns a copy without `workspace_id`.
    pub fn without_workspace(&self, workspace_id: &str) -> Self {
        let mut next = self.clone();
        next.workspaces.remove(workspace_id);
        next
    }

    /// Whether an observer holding `authorizations` can read this item.
    pub fn is_visible_to(&self, authorizations: &Authorizations) -> bool {
        self.workspaces.is_empty() || authorizations.intersects(&self.workspaces)
    }
}

/// Opaque storage-level access token derived from a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VisibilityLabel(String);

impl VisibilityLabel {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for VisibilityLabel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Workspace scope tokens held by one observer.
///
/// An empty set is the public observer: it sees only items without
/// workspace tokens and is never affected by workspace hidden markers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authorizations {
    tokens: BTreeSet<WorkspaceId>,
}

impl Authorizations {
    /// Observer not scoped to any workspace.
    pub fn public() -> Self {
        Self::default()
    }

    pub fn for_workspace(workspace_id: &str) -> Self {
        let mut tokens = BTreeSet::new();
        tokens.insert(workspace_id.to_string());
        Self { tokens }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn intersects(&self, tokens: &BTreeSet<WorkspaceId>) -> bool {
        tokens.iter().any(|token| self.tokens.contains(token))
    }

    pub fn is_public(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{Authorizations, VisibilityDescriptor};

    #[test]
    fn workspace_tokens_restrict_visibility() {
        let descriptor = VisibilityDescriptor::in_workspace("analyst", "ws-1");

        assert!(descriptor.is_visible_to(&Authorizations::for_workspace("ws-1")));
        assert!(!descriptor.is_visible_to(&Authorizations::for_workspace("ws-2")));
        assert!(!descriptor.is_visible_to(&Authorizations::public()));
    }

    #[test]
    fn removing_last_token_makes_descriptor_public() {
        let descriptor = VisibilityDescriptor::in_workspace("", "ws-1").without_workspace("ws-1");

        assert!(!descriptor.has_workspace_tokens());
        assert!(descriptor.is_visible_to(&Authorizations::public()));
    }
}
