//! Client-facing diff records, publish/undo requests and batch results.
//!
//! # Invariants
//! - Item-level errors never abort sibling items; they are attached to the
//!   failing item and reported in `BatchResult::failures`.
//! - Every `ItemError` exposes a stable machine-readable `code()`.

use crate::model::element::{ElementId, ElementKind};
use crate::model::status::SandboxStatus;
use crate::model::visibility::VisibilityDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One entry of a workspace diff.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiffItem {
    Vertex {
        vertex_id: ElementId,
        concept_type: String,
        visibility: VisibilityDescriptor,
        sandbox_status: SandboxStatus,
        deleted: bool,
    },
    Edge {
        edge_id: ElementId,
        label: String,
        out_vertex_id: ElementId,
        in_vertex_id: ElementId,
        visibility: VisibilityDescriptor,
        sandbox_status: SandboxStatus,
        deleted: bool,
    },
    Property {
        element_kind: ElementKind,
        element_id: ElementId,
        key: String,
        name: String,
        /// Shadowed public value, if any.
        old_value: Option<Value>,
        new_value: Value,
        visibility: VisibilityDescriptor,
        sandbox_status: SandboxStatus,
        deleted: bool,
    },
}

impl DiffItem {
    pub fn sandbox_status(&self) -> SandboxStatus {
        match self {
            Self::Vertex { sandbox_status, .. }
            | Self::Edge { sandbox_status, .. }
            | Self::Property { sandbox_status, .. } => *sandbox_status,
        }
    }

    pub fn is_deleted(&self) -> bool {
        match self {
            Self::Vertex { deleted, .. }
            | Self::Edge { deleted, .. }
            | Self::Property { deleted, .. } => *deleted,
        }
    }

    /// Reference to the element or property this diff entry describes.
    pub fn target(&self) -> ItemTarget {
        match self {
            Self::Vertex { vertex_id, .. } => ItemTarget::Vertex {
                vertex_id: vertex_id.clone(),
            },
            Self::Edge { edge_id, .. } => ItemTarget::Edge {
                edge_id: edge_id.clone(),
            },
            Self::Property {
                element_kind,
                element_id,
                key,
                name,
                ..
            } => ItemTarget::Property {
                element_kind: *element_kind,
                element_id: element_id.clone(),
                key: key.clone(),
                name: name.clone(),
            },
        }
    }

    /// Request that accepts this change: deletions become `Delete`.
    pub fn to_publish_item(&self) -> SandboxItem {
        let action = if self.is_deleted() {
            ItemAction::Delete
        } else {
            ItemAction::AddOrUpdate
        };
        SandboxItem::new(self.target(), action)
    }

    /// Request that reverts this change.
    pub fn to_undo_item(&self) -> SandboxItem {
        SandboxItem::new(self.target(), ItemAction::AddOrUpdate)
    }
}

/// Element or property referenced by a publish/undo request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemTarget {
    Vertex {
        vertex_id: ElementId,
    },
    Edge {
        edge_id: ElementId,
    },
    Property {
        element_kind: ElementKind,
        element_id: ElementId,
        key: String,
        name: String,
    },
}

impl ItemTarget {
    /// Id of the element itself or of the element owning the property.
    pub fn element_id(&self) -> &str {
        match self {
            Self::Vertex { vertex_id } => vertex_id,
            Self::Edge { edge_id } => edge_id,
            Self::Property { element_id, .. } => element_id,
        }
    }

    pub fn element_kind(&self) -> ElementKind {
        match self {
            Self::Vertex { .. } => ElementKind::Vertex,
            Self::Edge { .. } => ElementKind::Edge,
            Self::Property { element_kind, .. } => *element_kind,
        }
    }
}

/// Requested transition for one item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemAction {
    #[default]
    AddOrUpdate,
    Delete,
}

/// Client-submitted publish or undo request for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxItem {
    #[serde(flatten)]
    pub target: ItemTarget,
    #[serde(default)]
    pub action: ItemAction,
}

impl SandboxItem {
    pub fn new(target: ItemTarget, action: ItemAction) -> Self {
        Self { target, action }
    }

    pub fn vertex(vertex_id: impl Into<String>, action: ItemAction) -> Self {
        Self::new(
            ItemTarget::Vertex {
                vertex_id: vertex_id.into(),
            },
            action,
        )
    }

    pub fn edge(edge_id: impl Into<String>, action: ItemAction) -> Self {
        Self::new(
            ItemTarget::Edge {
                edge_id: edge_id.into(),
            },
            action,
        )
    }

    pub fn property(
        element_kind: ElementKind,
        element_id: impl Into<String>,
        key: impl Into<String>,
        name: impl Into<String>,
        action: ItemAction,
    ) -> Self {
        Self::new(
            ItemTarget::Property {
                element_kind,
                element_id: element_id.into(),
                key: key.into(),
                name: name.into(),
            },
            action,
        )
    }
}

/// Item-level domain or precondition failure.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ItemError {
    #[error("item does not reference an element id")]
    MissingIdentifier,
    #[error("{element_kind} not found: {element_id}")]
    ElementNotFound {
        element_kind: String,
        element_id: ElementId,
    },
    #[error("{element_kind} is already public: {element_id}")]
    AlreadyPublic {
        element_kind: String,
        element_id: ElementId,
    },
    #[error("cannot undo a public {element_kind}: {element_id}")]
    CannotUndoPublic {
        element_kind: String,
        element_id: ElementId,
    },
    #[error("{element_kind} {element_id} must be public before its properties")]
    ElementNotPublic {
        element_kind: String,
        element_id: ElementId,
    },
    #[error("cannot publish edge {edge_id}: endpoints not public")]
    EndpointsNotPublic { edge_id: ElementId },
    #[error("could not find {schema_kind} `{name}`")]
    MissingSchemaType { schema_kind: String, name: String },
    #[error("could not publish {schema_kind} `{name}`: {message}")]
    SchemaPublishFailed {
        schema_kind: String,
        name: String,
        message: String,
    },
    #[error("property {key}:{name} not found for workspace on element {element_id}")]
    PropertyNotFound {
        element_id: ElementId,
        key: String,
        name: String,
    },
}

impl ItemError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingIdentifier => "missing_identifier",
            Self::ElementNotFound { .. } => "element_not_found",
            Self::AlreadyPublic { .. } => "already_public",
            Self::CannotUndoPublic { .. } => "cannot_undo_public",
            Self::ElementNotPublic { .. } => "element_not_public",
            Self::EndpointsNotPublic { .. } => "endpoints_not_public",
            Self::MissingSchemaType { .. } => "missing_schema_type",
            Self::SchemaPublishFailed { .. } => "schema_publish_failed",
            Self::PropertyNotFound { .. } => "property_not_found",
        }
    }
}

/// Failed item with its attached error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemFailure {
    pub item: SandboxItem,
    pub error: ItemError,
    pub error_message: String,
}

impl ItemFailure {
    pub fn new(item: SandboxItem, error: ItemError) -> Self {
        let error_message = error.to_string();
        Self {
            item,
            error,
            error_message,
        }
    }
}

/// Outcome of one publish or undo batch.
///
/// A batch without a fatal error may still contain per-item failures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failures: Vec<ItemFailure>,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failure attached to the item targeting `element_id`, if any.
    pub fn failure_for(&self, element_id: &str) -> Option<&ItemFailure> {
        self.failures
            .iter()
            .find(|failure| failure.item.target.element_id() == element_id)
    }
}

#[cfg(test)]
mod tests {
    use super::{ItemAction, ItemError, ItemTarget, SandboxItem};
    use crate::model::element::ElementKind;

    #[test]
    fn sandbox_item_parses_flattened_client_payload() {
        let item: SandboxItem = serde_json::from_str(
            r#"{"type":"property","element_kind":"vertex","element_id":"v1","key":"k","name":"color","action":"DELETE"}"#,
        )
        .unwrap();

        assert_eq!(
            item.target,
            ItemTarget::Property {
                element_kind: ElementKind::Vertex,
                element_id: "v1".to_string(),
                key: "k".to_string(),
                name: "color".to_string(),
            }
        );
        assert_eq!(item.action, ItemAction::Delete);
    }

    #[test]
    fn action_defaults_to_add_or_update() {
        let item: SandboxItem = serde_json::from_str(r#"{"type":"vertex","vertex_id":"v1"}"#).unwrap();
        assert_eq!(item.action, ItemAction::AddOrUpdate);
    }

    #[test]
    fn item_errors_expose_stable_codes() {
        let err = ItemError::EndpointsNotPublic {
            edge_id: "e1".to_string(),
        };
        assert_eq!(err.code(), "endpoints_not_public");
        assert!(err.to_string().contains("endpoints not public"));

        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "endpoints_not_public");
    }
}
