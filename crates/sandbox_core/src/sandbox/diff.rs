//! Workspace diff: every pending change between a workspace and the public
//! graph.
//!
//! # Invariants
//! - Read-only; repeated calls against unchanged storage return equal lists.
//! - Output order: member vertices in membership order, then their edges by
//!   id. Each element entry is followed by its property entries.
//! - Properties of a hidden element are not listed separately.

use super::classifier::{classify_element, is_hidden, SlotView};
use super::SandboxResult;
use crate::model::context::SandboxContext;
use crate::model::element::{Element, ElementId, ElementKind, ElementShape};
use crate::model::item::DiffItem;
use crate::model::status::SandboxStatus;
use crate::model::visibility::Authorizations;
use crate::store::{FetchHints, GraphStore};
use log::info;
use std::collections::{BTreeSet, HashSet};
use std::time::Instant;

/// Computes the diff of the given workspace member vertices and their edges.
pub fn diff_workspace(
    store: &dyn GraphStore,
    ctx: &SandboxContext,
    vertex_ids: &[ElementId],
) -> SandboxResult<Vec<DiffItem>> {
    let started_at = Instant::now();
    let authorizations = ctx.authorizations();

    let mut seen = HashSet::new();
    let mut vertices = Vec::new();
    for id in vertex_ids {
        if !seen.insert(id.as_str()) {
            continue;
        }
        if let Some(element) = store.get_element(id, FetchHints::ALL_INCLUDING_HIDDEN, &authorizations)? {
            if element.kind() == ElementKind::Vertex {
                vertices.push(element);
            }
        }
    }

    let mut edge_ids = BTreeSet::new();
    for vertex in &vertices {
        edge_ids.extend(store.edge_ids_for_vertex(&vertex.id)?);
    }
    let edge_ids: Vec<ElementId> = edge_ids.into_iter().collect();
    let edges = store.get_elements(&edge_ids, FetchHints::ALL_INCLUDING_HIDDEN, &authorizations)?;

    let mut items = Vec::new();
    for element in vertices.iter().chain(edges.iter()) {
        diff_element(element, ctx.workspace_id(), &authorizations, &mut items);
    }

    info!(
        "event=sandbox_diff module=sandbox status=ok workspace_id={} vertices={} edges={} items={} duration_ms={}",
        ctx.workspace_id(),
        vertices.len(),
        edges.len(),
        items.len(),
        started_at.elapsed().as_millis()
    );
    Ok(items)
}

fn diff_element(
    element: &Element,
    workspace_id: &str,
    authorizations: &Authorizations,
    items: &mut Vec<DiffItem>,
) {
    let hidden = is_hidden(element, authorizations);
    let status = classify_element(element);
    if hidden || status != SandboxStatus::Public {
        items.push(element_item(element, status, hidden));
    }
    if hidden {
        return;
    }
    for slot in element.slots() {
        let view = SlotView::of(element, &slot.key, &slot.name, workspace_id, authorizations);
        diff_slot(&view, items);
    }
}

fn element_item(element: &Element, sandbox_status: SandboxStatus, deleted: bool) -> DiffItem {
    match &element.shape {
        ElementShape::Vertex { concept_type } => DiffItem::Vertex {
            vertex_id: element.id.clone(),
            concept_type: concept_type.clone(),
            visibility: element.visibility.clone(),
            sandbox_status,
            deleted,
        },
        ElementShape::Edge {
            label,
            out_vertex_id,
            in_vertex_id,
        } => DiffItem::Edge {
            edge_id: element.id.clone(),
            label: label.clone(),
            out_vertex_id: out_vertex_id.clone(),
            in_vertex_id: in_vertex_id.clone(),
            visibility: element.visibility.clone(),
            sandbox_status,
            deleted,
        },
    }
}

fn diff_slot(view: &SlotView<'_>, items: &mut Vec<DiffItem>) {
    let element = view.element();
    if let Some(staged) = view.workspace_revision() {
        let old_value = match staged.status {
            SandboxStatus::PublicChanged => view.shadowed_public().map(|public| public.revision.value.clone()),
            _ => None,
        };
        items.push(DiffItem::Property {
            element_kind: element.kind(),
            element_id: element.id.clone(),
            key: view.key().to_string(),
            name: view.name().to_string(),
            old_value,
            new_value: staged.revision.value.clone(),
            visibility: staged.revision.visibility.clone(),
            sandbox_status: staged.status,
            deleted: false,
        });
    }
    for pending in view.pending_deletes() {
        items.push(DiffItem::Property {
            element_kind: element.kind(),
            element_id: element.id.clone(),
            key: view.key().to_string(),
            name: view.name().to_string(),
            old_value: Some(pending.revision.value.clone()),
            new_value: pending.revision.value.clone(),
            visibility: pending.revision.visibility.clone(),
            sandbox_status: pending.status,
            deleted: true,
        });
    }
}
