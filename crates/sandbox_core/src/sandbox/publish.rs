//! Publish engine: promotes workspace-private changes to the public graph.
//!
//! # Responsibility
//! - Publish the schema types the batch depends on.
//! - Promote vertices, then edges, then properties; remove deleted
//!   elements last, edges before vertices.
//! - Emit one notification per change once the batch is durable.
//!
//! # Invariants
//! - An edge is only promoted when both endpoints are public, or promoted
//!   earlier in the same batch.
//! - A property is only published on an element that is public, or promoted
//!   earlier in the same batch.
//! - Schema types published for a batch stay published when the data batch
//!   aborts; their notifications are only emitted after a successful flush.
//! - A property slot never ends with two active public revisions.

use super::batch::{ItemTracker, UpdateBatch};
use super::classifier::{classify_element, is_hidden, SlotView};
use super::conflict::{plan_publish, plan_publish_delete};
use super::schema_cascade::{publish_required_schema, SchemaKey};
use super::{load_element, push_property_changes, SandboxEnv, SandboxResult, StepResult};
use crate::model::context::SandboxContext;
use crate::model::element::{Element, ElementId, ElementKind, PropertySlot};
use crate::model::item::{BatchResult, ItemAction, ItemError, ItemTarget, SandboxItem};
use crate::model::status::SandboxStatus;
use crate::notify::Notification;
use crate::schema::SchemaKind;
use crate::store::mutation::ElementMutation;
use crate::store::FetchHints;
use log::{error, info};
use std::collections::{BTreeMap, HashSet};
use std::time::Instant;

#[derive(Debug, Default)]
struct PublishPlan {
    promote_vertices: Vec<usize>,
    promote_edges: Vec<usize>,
    remove_vertices: Vec<usize>,
    remove_edges: Vec<usize>,
    properties: Vec<usize>,
    required_schema: BTreeMap<SchemaKey, Vec<usize>>,
}

/// Applies publish batches against one set of collaborators.
pub struct PublishEngine<'a> {
    env: SandboxEnv<'a>,
}

impl<'a> PublishEngine<'a> {
    pub fn new(env: SandboxEnv<'a>) -> Self {
        Self { env }
    }

    /// Publishes `items` from the context's workspace.
    ///
    /// Per-item failures are returned in the result; an `Err` means the
    /// whole batch was rolled back.
    pub fn publish(&self, items: Vec<SandboxItem>, ctx: &SandboxContext) -> SandboxResult<BatchResult> {
        let started_at = Instant::now();
        info!(
            "event=sandbox_publish module=sandbox status=start workspace_id={} user_id={} items={}",
            ctx.workspace_id(),
            ctx.user_id(),
            items.len()
        );
        match self.run(items, ctx) {
            Ok(result) => {
                info!(
                    "event=sandbox_publish module=sandbox status=ok workspace_id={} succeeded={} failed={} duration_ms={}",
                    ctx.workspace_id(),
                    result.succeeded,
                    result.failures.len(),
                    started_at.elapsed().as_millis()
                );
                Ok(result)
            }
            Err(err) => {
                error!(
                    "event=sandbox_publish module=sandbox status=error workspace_id={} duration_ms={} error={}",
                    ctx.workspace_id(),
                    started_at.elapsed().as_millis(),
                    err
                );
                Err(err)
            }
        }
    }

    fn run(&self, items: Vec<SandboxItem>, ctx: &SandboxContext) -> SandboxResult<BatchResult> {
        let mut tracker = ItemTracker::new("publish", items);
        let plan = self.partition(&mut tracker, ctx)?;
        let mut notifications = self.publish_schema(&mut tracker, ctx, &plan);

        let batch = UpdateBatch::begin(self.env.store)?;

        let mut promoted: HashSet<ElementId> = HashSet::new();
        for idx in tracker.pending_in(&plan.promote_vertices) {
            let id = tracker.item(idx).target.element_id().to_string();
            let result = self.promote_element(ctx, ElementKind::Vertex, &id, &promoted, &mut notifications);
            if tracker.settle(idx, result)?.is_some() {
                promoted.insert(id);
            }
        }
        for idx in tracker.pending_in(&plan.promote_edges) {
            let id = tracker.item(idx).target.element_id().to_string();
            let result = self.promote_element(ctx, ElementKind::Edge, &id, &promoted, &mut notifications);
            if tracker.settle(idx, result)?.is_some() {
                promoted.insert(id);
            }
        }
        for idx in tracker.pending_in(&plan.properties) {
            let item = tracker.item(idx).clone();
            let result = self.publish_property(ctx, &item, &promoted, &mut notifications);
            tracker.settle(idx, result)?;
        }

        let mut removed: HashSet<ElementId> = HashSet::new();
        for idx in tracker.pending_in(&plan.remove_edges) {
            let item = tracker.item(idx).clone();
            let result = self.remove_element(ctx, &item, &mut removed, &mut notifications);
            tracker.settle(idx, result)?;
        }
        for idx in tracker.pending_in(&plan.remove_vertices) {
            let item = tracker.item(idx).clone();
            let result = self.remove_element(ctx, &item, &mut removed, &mut notifications);
            tracker.settle(idx, result)?;
        }

        batch.flush()?;
        self.env.notifications.emit_all(&notifications);
        Ok(tracker.into_result())
    }

    /// Splits items into promotion, removal and property work lists.
    fn partition(&self, tracker: &mut ItemTracker, ctx: &SandboxContext) -> SandboxResult<PublishPlan> {
        let mut plan = PublishPlan::default();
        let authorizations = ctx.authorizations();
        for idx in tracker.pending() {
            let item = tracker.item(idx).clone();
            if let ItemTarget::Property { name, .. } = &item.target {
                plan.properties.push(idx);
                if item.action == ItemAction::AddOrUpdate && !self.env.config.is_system_property(name) {
                    plan.required_schema
                        .entry((SchemaKind::Property, name.clone()))
                        .or_default()
                        .push(idx);
                }
                continue;
            }

            let kind = item.target.element_kind();
            let loaded = load_element(self.env.store, ctx, kind, item.target.element_id());
            let Some(element) = tracker.settle(idx, loaded)? else {
                continue;
            };
            let removal = item.action == ItemAction::Delete || is_hidden(&element, &authorizations);
            match (kind, removal) {
                (ElementKind::Vertex, false) => plan.promote_vertices.push(idx),
                (ElementKind::Edge, false) => plan.promote_edges.push(idx),
                (ElementKind::Vertex, true) => plan.remove_vertices.push(idx),
                (ElementKind::Edge, true) => plan.remove_edges.push(idx),
            }
            if !removal && classify_element(&element) != SandboxStatus::Public {
                let schema_kind = match kind {
                    ElementKind::Vertex => SchemaKind::Concept,
                    ElementKind::Edge => SchemaKind::Relationship,
                };
                plan.required_schema
                    .entry((schema_kind, element.schema_type_name().to_string()))
                    .or_default()
                    .push(idx);
            }
        }
        Ok(plan)
    }

    /// Publishes required schema and returns its pending notifications.
    fn publish_schema(
        &self,
        tracker: &mut ItemTracker,
        ctx: &SandboxContext,
        plan: &PublishPlan,
    ) -> Vec<Notification> {
        let outcome = publish_required_schema(&self.env, ctx, plan.required_schema.keys());
        for (key, err) in outcome.failures {
            if let Some(indices) = plan.required_schema.get(&key) {
                for idx in indices {
                    tracker.fail(*idx, err.clone());
                }
            }
        }
        outcome.notifications
    }

    fn promote_element(
        &self,
        ctx: &SandboxContext,
        kind: ElementKind,
        id: &str,
        promoted: &HashSet<ElementId>,
        notifications: &mut Vec<Notification>,
    ) -> StepResult<()> {
        let element = load_element(self.env.store, ctx, kind, id)?;
        if classify_element(&element) == SandboxStatus::Public {
            return Err(ItemError::AlreadyPublic {
                element_kind: kind.as_str().to_string(),
                element_id: element.id.clone(),
            }
            .into());
        }
        if let Some((out_id, in_id)) = element.endpoints() {
            for endpoint in [out_id, in_id] {
                if !promoted.contains(endpoint) && !self.is_public_vertex(ctx, endpoint)? {
                    return Err(ItemError::EndpointsNotPublic {
                        edge_id: element.id.clone(),
                    }
                    .into());
                }
            }
        }

        let workspace_id = ctx.workspace_id();
        let resolver = self.env.resolver;
        let mut mutation = element.prepare_mutation();
        let visibility = resolver.remove_workspace(&element.visibility, workspace_id);
        let label = resolver.to_visibility_label(&visibility);
        mutation.alter_element_visibility(visibility, label);

        // System properties follow their element.
        let authorizations = ctx.authorizations();
        let mut changed_slots = Vec::new();
        for slot in element.slots() {
            if !self.is_system_property(ctx, &slot.name)? {
                continue;
            }
            let view = SlotView::of(&element, &slot.key, &slot.name, workspace_id, &authorizations);
            if view.workspace_revision().is_none() {
                continue;
            }
            mutation.extend(plan_publish(&view, workspace_id, resolver)?);
            changed_slots.push(slot);
        }
        let glyph = self.plan_glyph(ctx, &element)?;

        self.env.store.save(&mutation)?;
        notifications.push(Notification::ElementChanged {
            element_kind: kind,
            element_id: element.id.clone(),
            workspace_id: workspace_id.to_string(),
        });
        push_property_changes(notifications, &element, &changed_slots, workspace_id);

        if let Some((vertex, glyph_mutation, glyph_slots)) = glyph {
            self.env.store.save(&glyph_mutation)?;
            push_property_changes(notifications, &vertex, &glyph_slots, workspace_id);
        }
        Ok(())
    }

    /// Publishing an image edge also publishes the out-vertex image pointer.
    fn plan_glyph(
        &self,
        ctx: &SandboxContext,
        edge: &Element,
    ) -> StepResult<Option<(Element, ElementMutation, Vec<PropertySlot>)>> {
        let config = self.env.config;
        if edge.schema_type_name() != config.entity_has_image_relationship {
            return Ok(None);
        }
        let Some((out_id, _)) = edge.endpoints() else {
            return Ok(None);
        };
        let vertex = load_element(self.env.store, ctx, ElementKind::Vertex, out_id)?;
        let authorizations = ctx.authorizations();
        let mut mutation = vertex.prepare_mutation();
        let mut slots = Vec::new();
        for slot in vertex.slots() {
            if slot.name != config.entity_image_property {
                continue;
            }
            let view = SlotView::of(&vertex, &slot.key, &slot.name, ctx.workspace_id(), &authorizations);
            if view.workspace_revision().is_none() {
                continue;
            }
            mutation.extend(plan_publish(&view, ctx.workspace_id(), self.env.resolver)?);
            slots.push(slot);
        }
        if mutation.is_empty() {
            return Ok(None);
        }
        Ok(Some((vertex, mutation, slots)))
    }

    fn publish_property(
        &self,
        ctx: &SandboxContext,
        item: &SandboxItem,
        promoted: &HashSet<ElementId>,
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
        let element = load_element(self.env.store, ctx, *element_kind, element_id)?;
        if classify_element(&element) != SandboxStatus::Public && !promoted.contains(element_id) {
            return Err(ItemError::ElementNotPublic {
                element_kind: element_kind.as_str().to_string(),
                element_id: element_id.clone(),
            }
            .into());
        }
        let authorizations = ctx.authorizations();
        let view = SlotView::of(&element, key, name, ctx.workspace_id(), &authorizations);
        let ops = match item.action {
            ItemAction::Delete => plan_publish_delete(&view, ctx.workspace_id())?,
            ItemAction::AddOrUpdate => plan_publish(&view, ctx.workspace_id(), self.env.resolver)?,
        };

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

    fn remove_element(
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
        if !is_hidden(&element, &ctx.authorizations()) && classify_element(&element) == SandboxStatus::Public {
            return Err(ItemError::AlreadyPublic {
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
                    workspace_id: ctx.workspace_id().to_string(),
                });
            }
        }
        Ok(())
    }

    fn is_public_vertex(&self, ctx: &SandboxContext, id: &str) -> StepResult<bool> {
        let vertex = self
            .env
            .store
            .get_element(id, FetchHints::ALL_INCLUDING_HIDDEN, &ctx.authorizations())?;
        Ok(vertex.is_some_and(|vertex| {
            vertex.kind() == ElementKind::Vertex && classify_element(&vertex) == SandboxStatus::Public
        }))
    }

    fn is_system_property(&self, ctx: &SandboxContext, name: &str) -> StepResult<bool> {
        if self.env.config.is_system_property(name) {
            return Ok(true);
        }
        let property = self.env.schema.get_property_by_name(name, ctx.workspace_id())?;
        Ok(property.is_some_and(|property| !property.user_visible))
    }
}
