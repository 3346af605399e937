//! Sandbox use-case service.
//!
//! # Responsibility
//! - Provide the diff/publish/undo entry points for one store and schema.
//! - Own the visibility resolver, notification hub and engine config the
//!   engines share.
//!
//! # Invariants
//! - Service APIs never bypass the engines' per-item validation.
//! - Service layer remains storage-agnostic.

use crate::config::EngineConfig;
use crate::model::context::SandboxContext;
use crate::model::element::{Element, ElementId};
use crate::model::item::{BatchResult, DiffItem, SandboxItem};
use crate::model::status::SandboxStatus;
use crate::notify::{NotificationError, NotificationHub, NotificationSink};
use crate::resolver::{DefaultVisibilityResolver, VisibilityResolver};
use crate::sandbox::{
    classify_element, classify_property, diff_workspace, is_hidden, PublishEngine, SandboxEnv,
    SandboxResult, UndoEngine,
};
use crate::schema::SchemaRepository;
use crate::store::{FetchHints, GraphStore, WorkspaceMembership};
use std::sync::Arc;

/// Sandbox facade over one graph store and one schema repository.
pub struct SandboxService<S, R>
where
    S: GraphStore + WorkspaceMembership,
    R: SchemaRepository,
{
    store: S,
    schema: R,
    resolver: Box<dyn VisibilityResolver>,
    notifications: NotificationHub,
    config: EngineConfig,
}

impl<S, R> SandboxService<S, R>
where
    S: GraphStore + WorkspaceMembership,
    R: SchemaRepository,
{
    /// Creates a service with the default resolver and configuration.
    pub fn new(store: S, schema: R) -> Self {
        Self {
            store,
            schema,
            resolver: Box::new(DefaultVisibilityResolver),
            notifications: NotificationHub::new(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_resolver(mut self, resolver: Box<dyn VisibilityResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn register_sink(&mut self, sink: Arc<dyn NotificationSink>) -> Result<(), NotificationError> {
        self.notifications.register(sink)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn schema(&self) -> &R {
        &self.schema
    }

    pub fn resolver(&self) -> &dyn VisibilityResolver {
        self.resolver.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn env(&self) -> SandboxEnv<'_> {
        SandboxEnv {
            store: &self.store,
            schema: &self.schema,
            resolver: self.resolver.as_ref(),
            notifications: &self.notifications,
            config: &self.config,
        }
    }

    /// Lists every pending change of the context's workspace.
    pub fn diff(&self, ctx: &SandboxContext) -> SandboxResult<Vec<DiffItem>> {
        let members = self.store.member_vertex_ids(ctx.workspace_id())?;
        self.diff_elements(ctx, &members)
    }

    /// Lists pending changes of the given vertices and their edges.
    pub fn diff_elements(&self, ctx: &SandboxContext, vertex_ids: &[ElementId]) -> SandboxResult<Vec<DiffItem>> {
        diff_workspace(&self.store, ctx, vertex_ids)
    }

    pub fn publish(&self, items: Vec<SandboxItem>, ctx: &SandboxContext) -> SandboxResult<BatchResult> {
        PublishEngine::new(self.env()).publish(items, ctx)
    }

    pub fn undo(&self, items: Vec<SandboxItem>, ctx: &SandboxContext) -> SandboxResult<BatchResult> {
        UndoEngine::new(self.env()).undo(items, ctx)
    }

    fn load(&self, ctx: &SandboxContext, element_id: &str) -> SandboxResult<Option<Element>> {
        Ok(self
            .store
            .get_element(element_id, FetchHints::ALL_INCLUDING_HIDDEN, &ctx.authorizations())?)
    }

    /// Status of an element as seen from the workspace; `None` if invisible.
    pub fn classify_element(&self, ctx: &SandboxContext, element_id: &str) -> SandboxResult<Option<SandboxStatus>> {
        Ok(self.load(ctx, element_id)?.as_ref().map(classify_element))
    }

    /// Status of a property slot; `None` if the element or slot is absent.
    pub fn classify_property(
        &self,
        ctx: &SandboxContext,
        element_id: &str,
        key: &str,
        name: &str,
    ) -> SandboxResult<Option<SandboxStatus>> {
        Ok(self.load(ctx, element_id)?.and_then(|element| {
            classify_property(&element, key, name, ctx.workspace_id(), &ctx.authorizations())
        }))
    }

    /// Whether the element is pending a delete in the workspace.
    pub fn is_hidden(&self, ctx: &SandboxContext, element_id: &str) -> SandboxResult<Option<bool>> {
        Ok(self
            .load(ctx, element_id)?
            .map(|element| is_hidden(&element, &ctx.authorizations())))
    }
}
