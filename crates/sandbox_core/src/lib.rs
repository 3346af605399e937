//! Core domain logic for the workspace sandbox.
//! This crate is the single source of truth for overlay invariants.

pub mod config;
pub mod db;
pub mod edit;
pub mod logging;
pub mod model;
pub mod notify;
pub mod resolver;
pub mod sandbox;
pub mod schema;
pub mod service;
pub mod store;

pub use config::{ConfigError, EngineConfig, LoggingConfig};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use edit::{new_element_id, GraphEditor};
pub use logging::{default_log_level, init_logging, init_logging_from_config, logging_status};
pub use model::context::{ContextError, SandboxContext};
pub use model::element::{Element, ElementId, ElementKind, PropertyRevision, PropertySlot, RevisionId};
pub use model::item::{
    BatchResult, DiffItem, ItemAction, ItemError, ItemFailure, ItemTarget, SandboxItem,
};
pub use model::status::SandboxStatus;
pub use model::visibility::{Authorizations, VisibilityDescriptor, VisibilityLabel, WorkspaceId};
pub use notify::{MemoryNotificationSink, Notification, NotificationHub, NotificationSink};
pub use resolver::{DefaultVisibilityResolver, VisibilityResolver};
pub use sandbox::{SandboxError, SandboxResult};
pub use schema::{SchemaError, SchemaKind, SchemaRepository, SchemaType, SqliteSchemaRepository};
pub use service::sandbox_service::SandboxService;
pub use store::{FetchHints, GraphStore, SqliteGraphStore, StoreError, StoreResult, WorkspaceMembership};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
