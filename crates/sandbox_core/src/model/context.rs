//! Explicit per-call workspace/user context.
//!
//! # Invariants
//! - Workspace ids only contain `[A-Za-z0-9_.:-]`, so they can never break
//!   the label syntax produced by the visibility resolver.
//! - Context is passed into every engine call; nothing is stored globally.

use crate::model::visibility::{Authorizations, WorkspaceId};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static WORKSPACE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.:-]+$").expect("valid workspace id regex"));

/// Invalid context construction input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    #[error("workspace id is invalid: `{0}`")]
    InvalidWorkspaceId(String),
    #[error("user id must not be blank")]
    BlankUserId,
}

/// Workspace and acting user for one publish/undo/diff call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxContext {
    workspace_id: WorkspaceId,
    user_id: String,
}

impl SandboxContext {
    pub fn new(
        workspace_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Result<Self, ContextError> {
        let workspace_id = workspace_id.into().trim().to_string();
        if !WORKSPACE_ID_RE.is_match(&workspace_id) {
            return Err(ContextError::InvalidWorkspaceId(workspace_id));
        }
        let user_id = user_id.into().trim().to_string();
        if user_id.is_empty() {
            return Err(ContextError::BlankUserId);
        }
        Ok(Self {
            workspace_id,
            user_id,
        })
    }

    pub fn workspace_id(&self) -> &str {
        self.workspace_id.as_str()
    }

    pub fn user_id(&self) -> &str {
        self.user_id.as_str()
    }

    /// Authorizations of an observer scoped to this workspace.
    pub fn authorizations(&self) -> Authorizations {
        Authorizations::for_workspace(&self.workspace_id)
    }
}
