//! Stacked-revision planning for property publish and undo.
//!
//! Planning is pure: it reads a `SlotView` and returns the mutation ops to
//! apply, so the single-active-public-revision rule can be checked without
//! storage.
//!
//! # Invariants
//! - After a publish plan is applied, the slot holds at most one
//!   non-tombstoned public revision.
//! - An undo plan restores every public revision the workspace hid.

use super::classifier::SlotView;
use crate::model::item::ItemError;
use crate::model::status::SandboxStatus;
use crate::resolver::VisibilityResolver;
use crate::store::mutation::{MutationOp, NewPropertyRevision};
use std::collections::BTreeSet;

fn property_not_found(slot: &SlotView<'_>) -> ItemError {
    ItemError::PropertyNotFound {
        element_id: slot.element().id.clone(),
        key: slot.key().to_string(),
        name: slot.name().to_string(),
    }
}

fn property_kind(slot: &SlotView<'_>) -> String {
    format!("property {}:{}", slot.key(), slot.name())
}

/// Promotes the workspace value of a slot, or confirms a pending public
/// value the workspace hid.
pub(crate) fn plan_publish(
    slot: &SlotView<'_>,
    workspace_id: &str,
    resolver: &dyn VisibilityResolver,
) -> Result<Vec<MutationOp>, ItemError> {
    let Some(staged) = slot.workspace_revision() else {
        let ops: Vec<MutationOp> = slot
            .pending_deletes()
            .into_iter()
            .map(|pending| MutationOp::MarkPropertyVisible {
                revision_id: pending.revision.revision_id,
                workspace_id: workspace_id.to_string(),
            })
            .collect();
        if !ops.is_empty() {
            return Ok(ops);
        }
        if slot.is_empty() {
            return Err(property_not_found(slot));
        }
        return Err(ItemError::AlreadyPublic {
            element_kind: property_kind(slot),
            element_id: slot.element().id.clone(),
        });
    };

    let mut ops = Vec::new();
    // Older staged values of the same slot are superseded.
    for older in slot.workspace_revisions() {
        if older.revision.revision_id != staged.revision.revision_id {
            ops.push(MutationOp::DeleteProperty {
                revision_id: older.revision.revision_id,
            });
        }
    }
    for public in slot.public_revisions() {
        ops.push(MutationOp::SoftDeleteProperty {
            revision_id: public.revision.revision_id,
        });
    }

    let visibility = resolver.remove_workspace(&staged.revision.visibility, workspace_id);
    let label = resolver.to_visibility_label(&visibility);
    let relabels_public = staged.status == SandboxStatus::PublicChanged
        && slot
            .shadowed_public()
            .is_some_and(|public| public.revision.label != label);
    if relabels_public {
        ops.push(MutationOp::DeleteProperty {
            revision_id: staged.revision.revision_id,
        });
        ops.push(MutationOp::AddProperty(NewPropertyRevision {
            key: slot.key().to_string(),
            name: slot.name().to_string(),
            value: staged.revision.value.clone(),
            metadata: staged.revision.metadata.clone(),
            visibility,
            label,
        }));
    } else {
        ops.push(MutationOp::AlterPropertyVisibility {
            revision_id: staged.revision.revision_id,
            visibility,
            label,
        });
    }
    Ok(ops)
}

/// Accepts the workspace delete of a public value.
pub(crate) fn plan_publish_delete(
    slot: &SlotView<'_>,
    workspace_id: &str,
) -> Result<Vec<MutationOp>, ItemError> {
    let mut ops = Vec::new();
    for pending in slot.pending_deletes() {
        let revision_id = pending.revision.revision_id;
        ops.push(MutationOp::MarkPropertyVisible {
            revision_id,
            workspace_id: workspace_id.to_string(),
        });
        ops.push(MutationOp::SoftDeleteProperty { revision_id });
    }
    if ops.is_empty() {
        return Err(property_not_found(slot));
    }
    Ok(ops)
}

/// Drops the workspace value and reveals the public values it hid.
pub(crate) fn plan_undo(slot: &SlotView<'_>, workspace_id: &str) -> Result<Vec<MutationOp>, ItemError> {
    let mut ops: Vec<MutationOp> = slot
        .workspace_revisions()
        .map(|staged| MutationOp::DeleteProperty {
            revision_id: staged.revision.revision_id,
        })
        .collect();

    let mut revealed = BTreeSet::new();
    for public in slot.hidden_public() {
        if revealed.insert(public.revision.revision_id) {
            ops.push(MutationOp::MarkPropertyVisible {
                revision_id: public.revision.revision_id,
                workspace_id: workspace_id.to_string(),
            });
        }
    }

    if !ops.is_empty() {
        return Ok(ops);
    }
    if slot.is_empty() {
        return Err(property_not_found(slot));
    }
    Err(ItemError::CannotUndoPublic {
        element_kind: property_kind(slot),
        element_id: slot.element().id.clone(),
    })
}
