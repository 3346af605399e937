//! Derived sandbox status of an element or property revision.

use serde::{Deserialize, Serialize};

/// Relation of an item to the public graph, as seen from one workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SandboxStatus {
    /// No workspace-scoped revision shadows the item.
    Public,
    /// Only exists inside the workspace and has never been public.
    Private,
    /// A public revision exists but a workspace revision overrides it.
    PublicChanged,
}
