//! Atomic element mutation builder.

use crate::model::element::{ElementId, RevisionId};
use crate::model::visibility::{VisibilityDescriptor, VisibilityLabel};
use serde_json::{Map, Value};

/// Property revision to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPropertyRevision {
    pub key: String,
    pub name: String,
    pub value: Value,
    pub metadata: Map<String, Value>,
    pub visibility: VisibilityDescriptor,
    pub label: VisibilityLabel,
}

/// Single step of an element mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOp {
    AlterElementVisibility {
        visibility: VisibilityDescriptor,
        label: VisibilityLabel,
    },
    AlterPropertyVisibility {
        revision_id: RevisionId,
        visibility: VisibilityDescriptor,
        label: VisibilityLabel,
    },
    AddProperty(NewPropertyRevision),
    /// Physically removes the revision.
    DeleteProperty { revision_id: RevisionId },
    /// Tombstones the revision for every observer.
    SoftDeleteProperty { revision_id: RevisionId },
    MarkPropertyHidden {
        revision_id: RevisionId,
        workspace_id: String,
    },
    MarkPropertyVisible {
        revision_id: RevisionId,
        workspace_id: String,
    },
}

/// Ordered list of operations applied to one element by `GraphStore::save`.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementMutation {
    element_id: ElementId,
    ops: Vec<MutationOp>,
}

impl ElementMutation {
    pub fn new(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            ops: Vec::new(),
        }
    }

    pub fn element_id(&self) -> &str {
        self.element_id.as_str()
    }

    pub fn ops(&self) -> &[MutationOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn push(&mut self, op: MutationOp) -> &mut Self {
        self.ops.push(op);
        self
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = MutationOp>) -> &mut Self {
        self.ops.extend(ops);
        self
    }

    pub fn alter_element_visibility(
        &mut self,
        visibility: VisibilityDescriptor,
        label: VisibilityLabel,
    ) -> &mut Self {
        self.push(MutationOp::AlterElementVisibility { visibility, label })
    }

    pub fn add_property(&mut self, revision: NewPropertyRevision) -> &mut Self {
        self.push(MutationOp::AddProperty(revision))
    }

    pub fn mark_property_hidden(&mut self, revision_id: RevisionId, workspace_id: &str) -> &mut Self {
        self.push(MutationOp::MarkPropertyHidden {
            revision_id,
            workspace_id: workspace_id.to_string(),
        })
    }

    pub fn delete_property(&mut self, revision_id: RevisionId) -> &mut Self {
        self.push(MutationOp::DeleteProperty { revision_id })
    }
}
