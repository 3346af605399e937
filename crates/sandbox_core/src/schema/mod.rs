//! Schema (ontology) repository contracts.
//!
//! # Responsibility
//! - Resolve concept, relationship and property-type definitions as seen
//!   from one workspace.
//! - Publish workspace-private definitions into the public schema.
//!
//! # Invariants
//! - A definition owned by a workspace is only visible inside that workspace.
//! - Ancestor lists are ordered nearest parent first.

use crate::db::DbError;
use crate::model::status::SandboxStatus;
use crate::model::visibility::WorkspaceId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use thiserror::Error;

pub mod sqlite_schema;

pub use sqlite_schema::SqliteSchemaRepository;

pub type SchemaResult<T> = Result<T, SchemaError>;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{kind} `{name}` not found in workspace scope")]
    NotFound { kind: SchemaKind, name: String },
    #[error("{kind} `{name}` has cyclic ancestry")]
    CyclicAncestry { kind: SchemaKind, name: String },
    #[error("invalid persisted schema data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for SchemaError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Kind of schema definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaKind {
    Concept,
    Relationship,
    Property,
}

impl SchemaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Concept => "concept",
            Self::Relationship => "relationship",
            Self::Property => "property",
        }
    }
}

impl Display for SchemaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One concept, relationship or property-type definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaType {
    pub kind: SchemaKind,
    pub name: String,
    pub parent_name: Option<String>,
    /// Owning workspace; `None` for public definitions.
    pub workspace_id: Option<WorkspaceId>,
    /// `false` marks system properties the client never diffs.
    pub user_visible: bool,
}

impl SchemaType {
    pub fn sandbox_status(&self) -> SandboxStatus {
        if self.workspace_id.is_some() {
            SandboxStatus::Private
        } else {
            SandboxStatus::Public
        }
    }
}

/// Schema operations consumed by the publish engine.
pub trait SchemaRepository {
    fn get_concept_by_name(&self, name: &str, workspace_id: &str) -> SchemaResult<Option<SchemaType>>;

    fn get_relationship_by_name(
        &self,
        name: &str,
        workspace_id: &str,
    ) -> SchemaResult<Option<SchemaType>>;

    fn get_property_by_name(&self, name: &str, workspace_id: &str) -> SchemaResult<Option<SchemaType>>;

    /// Ancestors of `schema_type`, nearest parent first.
    fn get_ancestors(&self, schema_type: &SchemaType, workspace_id: &str) -> SchemaResult<Vec<SchemaType>>;

    fn publish_concept(&self, concept: &SchemaType, user_id: &str, workspace_id: &str) -> SchemaResult<()>;

    fn publish_relationship(
        &self,
        relationship: &SchemaType,
        user_id: &str,
        workspace_id: &str,
    ) -> SchemaResult<()>;

    fn publish_property(&self, property: &SchemaType, user_id: &str, workspace_id: &str) -> SchemaResult<()>;

    fn clear_cache(&self);

    /// Kind-dispatching lookup.
    fn get_by_name(
        &self,
        kind: SchemaKind,
        name: &str,
        workspace_id: &str,
    ) -> SchemaResult<Option<SchemaType>> {
        match kind {
            SchemaKind::Concept => self.get_concept_by_name(name, workspace_id),
            SchemaKind::Relationship => self.get_relationship_by_name(name, workspace_id),
            SchemaKind::Property => self.get_property_by_name(name, workspace_id),
        }
    }

    /// Kind-dispatching publish.
    fn publish(&self, schema_type: &SchemaType, user_id: &str, workspace_id: &str) -> SchemaResult<()> {
        match schema_type.kind {
            SchemaKind::Concept => self.publish_concept(schema_type, user_id, workspace_id),
            SchemaKind::Relationship => self.publish_relationship(schema_type, user_id, workspace_id),
            SchemaKind::Property => self.publish_property(schema_type, user_id, workspace_id),
        }
    }
}
