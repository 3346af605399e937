//! Undo engine: discards workspace changes and restores the public view.
//!
//! # Invariants
//! - Vertices are reverted first, then edges, then properties.
//! - Reverting a workspace-added vertex also removes its edges; later items
//!   that reference an already removed element count as reverted.
//! - Public state is never modified, only workspace overlays are.

use super::batch::{ItemTracker, UpdateBatch};
use super::classifier::{classify_element, is_hidden, SlotView};
use super::conflict::plan_undo;
use super::{load_element, push_property_changes, SandboxEnv, SandboxResult, StepResult};
use crate::model::context::SandboxContext;
use crate::model::element::ElementId;
use crate::model::item::{BatchResult, ItemError, ItemTarget, SandboxItem};
use crate::model::status::SandboxStatus;
use crate::notify::Notification;
use crate::store::mutation::MutationOp;
use log::{error, info};
use std::collections::HashSet;
use std::time::Instant;

/// Applies undo batches against one set of collaborators.
pub struct UndoEngine<'a> {
    env: SandboxEnv<'a>,
}

impl<'a> UndoEngine<'a> {
    pub fn new(env: SandboxEnv<'a>) -> Self {
        Self { env }
    }

    /// Reverts `items` in the context's workspace.
    pub fn undo(&self, items: Vec<SandboxItem>, ctx: &SandboxContext) -> SandboxResult<BatchResult> {
        let started_at = Instant::now();
        info!(
            "event=sandbox_undo module=sandbox status=start workspace_id={} user_id={} items={}",
            ctx.workspace_id(),
            ctx.user_id(),
            items.len()
        );
        match self.run(items, ctx) {
            Ok(result) => {
                info!(
                    "event=sandbox_undo module=sandbox status=ok workspace_id={} succeeded={} failed={} duration_ms={}",
                    ctx.workspace_id(),
                    result.succeeded,
                    result.failures.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(result)
            }
            Err(err) => {
                error!(
                    "event=sandbox_undo module=sandbox status=error workspace_id={} duration_ms={} error={}",
                    ctx.workspace_id(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn run(&self, items: Vec<SandboxItem>, ctx: &SandboxContext) -> SandboxResult<BatchResult> {
        let mut tracker = ItemTracker::new("undo", items);
        let mut vertices = Vec::new();
        let mut edges = Vec::new();
        let mut properties = Vec::new();
        for idx in tracker.pending() {
            match &tracker.item(idx).target {
                ItemTarget::Vertex { .. } => vertices.push(idx),
                ItemTarget::Edge { .. } => edges.push(idx),
                ItemTarget::Property { .. } => properties.push(idx),
            }
        }

        let batch = UpdateBatch::begin(self.env.store)?;
        let mut removed: HashSet<ElementId> = HashSet::new();
        let mut notifications = Vec::new();
        for idx in vertices.into_iter().chain(edges) {
            let item = tracker.item(idx).clone();
            let result = self.undo_element(ctx, &item, &mut removed, &mut notifications);
            tracker.settle(idx, result)?;
        }
        for idx in properties {
            let item = tracker.item(idx).clone();
            let result = self.undo_property(ctx, &item, &removed, &mut notifications);
            tracker.settle(idx, result)?;
        }

        batch.flush()?;
        self.env.notifications.emit_all(&notifications);
        Ok(tracker.into_result())
    }

    fn undo_element(
        &self,
        ctx: &SandboxContext,
        item: &SandboxItem,
        removed: &mut HashSet<ElementId>,
        notifications: &mut Vec<Notification>,
    ) -> StepResult<()> {
        let id = item.target.element_id();
        if removed.contains(id) {
            return Ok(());
        }
        let kind = item.target.element_kind();
        let element = load_element(self.env.store, ctx, kind, id)?;
        let workspace_id = ctx.workspace_id();
        let authorizations = ctx.authorizations();

        if is_hidden(&element, &authorizations) {
            self.env.store.mark_element_visible(id, workspace_id)?;
            // Property deletes staged alongside the element delete are
            // reverted with it; edited slots keep their workspace value.
            let mut mutation = element.prepare_mutation();
            let mut revealed_slots = Vec::new();
            for slot in element.slots() {
                let view = SlotView::of(&element, &slot.key, &slot.name, workspace_id, &authorizations);
                let pending_deletes = view.pending_deletes();
                if pending_deletes.is_empty() {
                    continue;
                }
                for pending in pending_deletes {
                    mutation.push(MutationOp::MarkPropertyVisible {
                        revision_id: pending.revision.revision_id,
                        workspace_id: workspace_id.to_string(),
                    });
                }
                revealed_slots.push(slot);
            }
            if !mutation.is_empty() {
                self.env.store.save(&mutation)?;
            }
            notifications.push(Notification::ElementChanged {
                element_kind: kind,
                element_id: element.id.clone(),
                workspace_id: workspace_id.to_string(),
            });
            push_property_changes(notifications, &element, &revealed_slots, workspace_id);
            return Ok(());
        }

        if classify_element(&element) == SandboxStatus::Public {
            return Err(ItemError::CannotUndoPublic {
                element_kind: kind.as_str().to_string(),
                element_id: element.id.clone(),
            }
            .into());
        }

        for (removed_kind, removed_id) in self.env.store.delete_element(id)? {
            if removed.insert(removed_id.clone()) {
                notifications.push(Notification::ElementDeleted {
                    element_kind: removed_kind,
                    element_id: removed_id,
                    workspace_id: workspace_id.to_string(),
                });
            }
        }
        Ok(())
    }

    fn undo_property(
        &self,
        ctx: &SandboxContext,
        item: &SandboxItem,
        removed: &HashSet<ElementId>,
        notifications: &mut Vec<Notification>,
    ) -> StepResult<()> {
        let ItemTarget::Property {
            element_kind,
            element_id,
            key,
            name,
        } = &item.target
        else {
            return Err(ItemError::MissingIdentifier.into());
        };
        if removed.contains(element_id) {
            return Ok(());
        }
        let element = load_element(self.env.store, ctx, *element_kind, element_id)?;
        let authorizations = ctx.authorizations();
        let view = SlotView::of(&element, key, name, ctx.workspace_id(), &authorizations);
        let ops = plan_undo(&view, ctx.workspace_id())?;

        let mut mutation = element.prepare_mutation();
        mutation.extend(ops);
        self.env.store.save(&mutation)?;
        notifications.push(Notification::PropertyChanged {
            element_kind: *element_kind,
            element_id: element_id.clone(),
            key: key.clone(),
            name: name.clone(),
            workspace_id: ctx.workspace_id().to_string(),
        });
        Ok(())
    }
}
