//! Sandbox overlay engines: classification, diff, publish and undo.
//!
//! # Responsibility
//! - Classify elements and property revisions relative to one workspace.
//! - Diff a workspace against the public graph.
//! - Promote or revert workspace-private changes item by item.
//!
//! # Invariants
//! - Item-level failures are attached to their item; siblings continue.
//! - Store failures are fatal and abort the open batch.
//! - Classification is recomputed from a fresh snapshot on every step.

use crate::config::EngineConfig;
use crate::model::context::SandboxContext;
use crate::model::element::{Element, ElementKind, PropertySlot};
use crate::model::item::ItemError;
use crate::notify::{Notification, NotificationHub};
use crate::resolver::VisibilityResolver;
use crate::schema::{SchemaError, SchemaRepository};
use crate::store::{FetchHints, GraphStore, StoreError};
use thiserror::Error;

mod batch;
pub mod classifier;
mod conflict;
pub mod diff;
pub mod publish;
mod schema_cascade;
pub mod undo;

pub use classifier::{classify_element, classify_property, is_hidden, ClassifiedRevision, SlotView};
pub use diff::diff_workspace;
pub use publish::PublishEngine;
pub use undo::UndoEngine;

pub type SandboxResult<T> = Result<T, SandboxError>;

/// Infrastructure failure that terminates a whole batch.
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Collaborators shared by the publish and undo engines.
#[derive(Clone, Copy)]
pub struct SandboxEnv<'a> {
    pub store: &'a dyn GraphStore,
    pub schema: &'a dyn SchemaRepository,
    pub resolver: &'a dyn VisibilityResolver,
    pub notifications: &'a NotificationHub,
    pub config: &'a EngineConfig,
}

/// Outcome of one per-item step.
pub(crate) enum StepError {
    Item(ItemError),
    Fatal(SandboxError),
}

pub(crate) type StepResult<T> = Result<T, StepError>;

impl From<ItemError> for StepError {
    fn from(value: ItemError) -> Self {
        Self::Item(value)
    }
}

impl From<StoreError> for StepError {
    fn from(value: StoreError) -> Self {
        Self::Fatal(value.into())
    }
}

impl From<SchemaError> for StepError {
    fn from(value: SchemaError) -> Self {
        Self::Fatal(value.into())
    }
}

/// Loads an element of `kind` as seen from the workspace, hidden included.
pub(crate) fn load_element(
    store: &dyn GraphStore,
    ctx: &SandboxContext,
    kind: ElementKind,
    id: &str,
) -> StepResult<Element> {
    if id.trim().is_empty() {
        return Err(ItemError::MissingIdentifier.into());
    }
    match store.get_element(id, FetchHints::ALL_INCLUDING_HIDDEN, &ctx.authorizations())? {
        Some(element) if element.kind() == kind => Ok(element),
        _ => Err(ItemError::ElementNotFound {
            element_kind: kind.as_str().to_string(),
            element_id: id.to_string(),
        }
        .into()),
    }
}

/// One `PropertyChanged` per slot of `element`.
pub(crate) fn push_property_changes(
    notifications: &mut Vec<Notification>,
    element: &Element,
    slots: &[PropertySlot],
    workspace_id: &str,
) {
    for slot in slots {
        notifications.push(Notification::PropertyChanged {
            element_kind: element.kind(),
            element_id: element.id.clone(),
            key: slot.key.clone(),
            name: slot.name.clone(),
            workspace_id: workspace_id.to_string(),
        });
    }
}
