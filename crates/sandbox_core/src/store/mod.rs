//! Graph store contracts consumed by the sandbox engines.
//!
//! # Responsibility
//! - Define read, mutation, tombstone and batch APIs over elements and
//!   property revisions.
//! - Keep SQL details behind the `SqliteGraphStore` implementation.
//!
//! # Invariants
//! - Reads are filtered by the observer's `Authorizations`.
//! - Mutations inside `begin_batch` .. `flush` become visible together;
//!   `abort_batch` discards them.

use crate::db::DbError;
use crate::model::element::{Element, ElementId, ElementKind, RevisionId};
use crate::model::visibility::{Authorizations, VisibilityDescriptor, VisibilityLabel};
use thiserror::Error;

pub mod mutation;
pub mod sqlite_graph;

pub use mutation::{ElementMutation, MutationOp, NewPropertyRevision};
pub use sqlite_graph::SqliteGraphStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Infrastructure-level graph store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),
    #[error("property revision {revision_id} not found on element {element_id}")]
    RevisionNotFound {
        element_id: ElementId,
        revision_id: RevisionId,
    },
    #[error("element already exists: {0}")]
    DuplicateElement(ElementId),
    #[error("invalid persisted graph data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Controls which stored state a read returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchHints {
    /// Also return elements/revisions hidden for the observer.
    pub include_hidden: bool,
}

impl FetchHints {
    pub const DEFAULT: Self = Self {
        include_hidden: false,
    };
    pub const ALL_INCLUDING_HIDDEN: Self = Self {
        include_hidden: true,
    };
}

/// Element creation request issued by editing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewElement {
    pub id: ElementId,
    pub kind: ElementKind,
    /// Concept for vertices, relationship name for edges.
    pub type_name: String,
    pub endpoints: Option<(ElementId, ElementId)>,
    pub visibility: VisibilityDescriptor,
    pub label: VisibilityLabel,
}

/// Storage operations the sandbox engines depend on.
pub trait GraphStore {
    /// Loads one element visible to `authorizations`.
    fn get_element(
        &self,
        id: &str,
        hints: FetchHints,
        authorizations: &Authorizations,
    ) -> StoreResult<Option<Element>>;

    /// Loads several elements; missing or invisible ids are skipped.
    fn get_elements(
        &self,
        ids: &[ElementId],
        hints: FetchHints,
        authorizations: &Authorizations,
    ) -> StoreResult<Vec<Element>> {
        let mut elements = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(element) = self.get_element(id, hints, authorizations)? {
                elements.push(element);
            }
        }
        Ok(elements)
    }

    /// Ids of all edges touching `vertex_id`, sorted.
    fn edge_ids_for_vertex(&self, vertex_id: &str) -> StoreResult<Vec<ElementId>>;

    fn create_element(&self, element: &NewElement) -> StoreResult<()>;

    /// Applies all operations of `mutation` to one element.
    fn save(&self, mutation: &ElementMutation) -> StoreResult<()>;

    /// Physically removes an element. Removing a vertex also removes its
    /// edges; the returned list holds every removed id, edges first.
    fn delete_element(&self, id: &str) -> StoreResult<Vec<(ElementKind, ElementId)>>;

    /// Hides an element from observers scoped to `workspace_id`.
    fn soft_delete_element(&self, id: &str, workspace_id: &str) -> StoreResult<()>;

    /// Clears the workspace hidden marker of an element.
    fn mark_element_visible(&self, id: &str, workspace_id: &str) -> StoreResult<()>;

    fn begin_batch(&self) -> StoreResult<()>;

    /// Makes all batched mutations durable before the next read.
    fn flush(&self) -> StoreResult<()>;

    fn abort_batch(&self) -> StoreResult<()>;
}

/// Workspace membership list supplied by the workspace collaborator.
pub trait WorkspaceMembership {
    /// Vertices associated with the workspace, in insertion order.
    fn member_vertex_ids(&self, workspace_id: &str) -> StoreResult<Vec<ElementId>>;

    fn add_member(&self, workspace_id: &str, vertex_id: &str) -> StoreResult<()>;
}
