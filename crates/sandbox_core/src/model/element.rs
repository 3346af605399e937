//! Vertex/edge snapshots and stacked property revisions.
//!
//! # Responsibility
//! - Represent one element as read by one observer.
//! - Group property revisions into `(key, name)` slots.
//!
//! # Invariants
//! - `properties` is ordered by ascending `revision_id`, so a later revision
//!   is always more recent than an earlier one.
//! - Tombstoned revisions never appear in a snapshot.

use crate::model::visibility::{Authorizations, VisibilityDescriptor, VisibilityLabel, WorkspaceId};
use crate::store::mutation::ElementMutation;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Stable element identifier.
pub type ElementId = String;

/// Storage-assigned identifier of one property revision.
pub type RevisionId = i64;

/// Vertex or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    Vertex,
    Edge,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vertex => "vertex",
            Self::Edge => "edge",
        }
    }
}

/// Kind-specific element data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementShape {
    Vertex {
        concept_type: String,
    },
    Edge {
        label: String,
        out_vertex_id: ElementId,
        in_vertex_id: ElementId,
    },
}

/// Identity of a property slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertySlot {
    pub key: String,
    pub name: String,
}

/// One stored revision of a `(key, name)` property slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyRevision {
    pub revision_id: RevisionId,
    pub key: String,
    pub name: String,
    pub value: Value,
    pub metadata: Map<String, Value>,
    pub visibility: VisibilityDescriptor,
    pub label: VisibilityLabel,
    /// Workspaces in which this revision is pending a public delete.
    pub hidden_in: BTreeSet<WorkspaceId>,
}

impl PropertyRevision {
    pub fn slot(&self) -> PropertySlot {
        PropertySlot {
            key: self.key.clone(),
            name: self.name.clone(),
        }
    }

    pub fn in_slot(&self, key: &str, name: &str) -> bool {
        self.key == key && self.name == name
    }

    pub fn is_hidden_for(&self, authorizations: &Authorizations) -> bool {
        authorizations.intersects(&self.hidden_in)
    }
}

/// Vertex or edge snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub id: ElementId,
    pub shape: ElementShape,
    pub visibility: VisibilityDescriptor,
    pub label: VisibilityLabel,
    /// Workspaces in which this element is pending a public delete.
    pub hidden_in: BTreeSet<WorkspaceId>,
    pub properties: Vec<PropertyRevision>,
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self.shape {
            ElementShape::Vertex { .. } => ElementKind::Vertex,
            ElementShape::Edge { .. } => ElementKind::Edge,
        }
    }

    /// Concept name for vertices, relationship name for edges.
    pub fn schema_type_name(&self) -> &str {
        match &self.shape {
            ElementShape::Vertex { concept_type } => concept_type,
            ElementShape::Edge { label, .. } => label,
        }
    }

    /// `(out, in)` endpoint ids for edges.
    pub fn endpoints(&self) -> Option<(&str, &str)> {
        match &self.shape {
            ElementShape::Vertex { .. } => None,
            ElementShape::Edge {
                out_vertex_id,
                in_vertex_id,
                ..
            } => Some((out_vertex_id, in_vertex_id)),
        }
    }

    pub fn is_hidden_for(&self, authorizations: &Authorizations) -> bool {
        authorizations.intersects(&self.hidden_in)
    }

    /// Revisions of one slot, oldest first.
    pub fn slot_revisions(&self, key: &str, name: &str) -> Vec<&PropertyRevision> {
        self.properties
            .iter()
            .filter(|revision| revision.in_slot(key, name))
            .collect()
    }

    /// Distinct slots present on this element, in sorted order.
    pub fn slots(&self) -> BTreeSet<PropertySlot> {
        self.properties.iter().map(PropertyRevision::slot).collect()
    }

    /// Starts an atomic mutation against this element.
    pub fn prepare_mutation(&self) -> ElementMutation {
        ElementMutation::new(self.id.clone())
    }
}
