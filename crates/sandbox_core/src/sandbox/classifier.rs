//! Sandbox status classification for elements and property slots.
//!
//! # Invariants
//! - An element or revision is `Public` iff its descriptor has no workspace
//!   tokens.
//! - A workspace revision becomes `PublicChanged` when its slot also holds a
//!   public revision it shadows.

use crate::model::element::{Element, PropertyRevision};
use crate::model::status::SandboxStatus;
use crate::model::visibility::{Authorizations, VisibilityDescriptor};

fn base_status(visibility: &VisibilityDescriptor) -> SandboxStatus {
    if visibility.has_workspace_tokens() {
        SandboxStatus::Private
    } else {
        SandboxStatus::Public
    }
}

/// Sandbox status of a vertex or edge.
pub fn classify_element(element: &Element) -> SandboxStatus {
    base_status(&element.visibility)
}

/// Whether the element is pending a public delete for this observer.
pub fn is_hidden(element: &Element, authorizations: &Authorizations) -> bool {
    element.is_hidden_for(authorizations)
}

/// Status of the slot as seen from `workspace_id`; `None` for empty slots.
pub fn classify_property(
    element: &Element,
    key: &str,
    name: &str,
    workspace_id: &str,
    authorizations: &Authorizations,
) -> Option<SandboxStatus> {
    SlotView::of(element, key, name, workspace_id, authorizations).status()
}

/// One revision with its computed status.
#[derive(Debug, Clone, Copy)]
pub struct ClassifiedRevision<'a> {
    pub revision: &'a PropertyRevision,
    pub status: SandboxStatus,
    pub hidden: bool,
    /// Carries the observer's workspace token.
    pub staged: bool,
}

/// Classified revisions of one `(key, name)` slot, oldest first.
#[derive(Debug, Clone)]
pub struct SlotView<'a> {
    element: &'a Element,
    key: &'a str,
    name: &'a str,
    revisions: Vec<ClassifiedRevision<'a>>,
}

impl<'a> SlotView<'a> {
    pub fn of(
        element: &'a Element,
        key: &'a str,
        name: &'a str,
        workspace_id: &str,
        authorizations: &Authorizations,
    ) -> Self {
        let slot = element.slot_revisions(key, name);
        let has_public = slot
            .iter()
            .any(|revision| !revision.visibility.has_workspace_tokens());
        let revisions = slot
            .into_iter()
            .map(|revision| {
                let staged = revision.visibility.contains_workspace(workspace_id);
                let status = match base_status(&revision.visibility) {
                    SandboxStatus::Private if staged && has_public => SandboxStatus::PublicChanged,
                    status => status,
                };
                ClassifiedRevision {
                    revision,
                    status,
                    hidden: revision.is_hidden_for(authorizations),
                    staged,
                }
            })
            .collect();
        Self {
            element,
            key,
            name,
            revisions,
        }
    }

    pub fn element(&self) -> &'a Element {
        self.element
    }

    pub fn key(&self) -> &'a str {
        self.key
    }

    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn revisions(&self) -> &[ClassifiedRevision<'a>] {
        &self.revisions
    }

    /// Status of the workspace revision, else `Public` for a non-empty slot.
    pub fn status(&self) -> Option<SandboxStatus> {
        match self.workspace_revision() {
            Some(staged) => Some(staged.status),
            None if self.is_empty() => None,
            None => Some(SandboxStatus::Public),
        }
    }

    /// All revisions carrying the workspace token, oldest first.
    pub fn workspace_revisions(&self) -> impl Iterator<Item = &ClassifiedRevision<'a>> {
        self.revisions.iter().filter(|revision| revision.staged)
    }

    /// Most recent revision carrying the workspace token.
    pub fn workspace_revision(&self) -> Option<&ClassifiedRevision<'a>> {
        self.workspace_revisions().last()
    }

    pub fn public_revisions(&self) -> impl Iterator<Item = &ClassifiedRevision<'a>> {
        self.revisions
            .iter()
            .filter(|revision| revision.status == SandboxStatus::Public)
    }

    /// Most recent public revision, i.e. the one a workspace edit shadows.
    pub fn shadowed_public(&self) -> Option<&ClassifiedRevision<'a>> {
        self.public_revisions().last()
    }

    /// Whether the workspace holds an edit over a public value.
    pub fn is_edited(&self) -> bool {
        self.revisions
            .iter()
            .any(|revision| revision.status == SandboxStatus::PublicChanged)
    }

    /// Public revisions hidden for the observer.
    pub fn hidden_public(&self) -> impl Iterator<Item = &ClassifiedRevision<'a>> {
        self.public_revisions().filter(|revision| revision.hidden)
    }

    /// Public revisions pending a workspace delete, i.e. hidden and not
    /// shadowed by a workspace edit.
    pub fn pending_deletes(&self) -> Vec<&ClassifiedRevision<'a>> {
        if self.is_edited() {
            return Vec::new();
        }
        self.hidden_public().collect()
    }
}
