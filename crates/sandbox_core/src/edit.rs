//! Graph editing helpers that stage changes in a workspace or write them
//! straight to the public graph.
//!
//! # Responsibility
//! - Produce the stored shapes the sandbox engines classify: workspace
//!   tokens on new data, hidden markers on pending deletes.
//! - Keep the workspace membership list in sync with edited vertices.
//!
//! # Invariants
//! - A workspace edit never modifies a public revision's value.
//! - A public edit leaves exactly one active public revision per slot.

use crate::model::context::SandboxContext;
use crate::model::element::{Element, ElementId, ElementKind};
use crate::model::visibility::{Authorizations, VisibilityDescriptor};
use crate::resolver::VisibilityResolver;
use crate::store::mutation::{MutationOp, NewPropertyRevision};
use crate::store::{FetchHints, GraphStore, NewElement, StoreError, StoreResult, WorkspaceMembership};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Generates a fresh element id.
pub fn new_element_id() -> ElementId {
    Uuid::new_v4().to_string()
}

/// Editing facade over a graph store. `None` scopes edit the public graph.
pub struct GraphEditor<'a, S: GraphStore + WorkspaceMembership> {
    store: &'a S,
    resolver: &'a dyn VisibilityResolver,
    source: String,
}

impl<'a, S: GraphStore + WorkspaceMembership> GraphEditor<'a, S> {
    pub fn new(store: &'a S, resolver: &'a dyn VisibilityResolver) -> Self {
        Self {
            store,
            resolver,
            source: String::new(),
        }
    }

    /// Sets the visibility source attached to everything this editor writes.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    fn descriptor(&self, scope: Option<&SandboxContext>) -> VisibilityDescriptor {
        let public = VisibilityDescriptor::public(self.source.clone());
        match scope {
            Some(ctx) => self.resolver.add_workspace(&public, ctx.workspace_id()),
            None => public,
        }
    }

    fn load(&self, id: &str, scope: Option<&SandboxContext>) -> StoreResult<Element> {
        let authorizations = scope
            .map(SandboxContext::authorizations)
            .unwrap_or_else(Authorizations::public);
        self.store
            .get_element(id, FetchHints::ALL_INCLUDING_HIDDEN, &authorizations)?
            .ok_or_else(|| StoreError::ElementNotFound(id.to_string()))
    }

    fn create(
        &self,
        id: &str,
        kind: ElementKind,
        type_name: &str,
        endpoints: Option<(ElementId, ElementId)>,
        scope: Option<&SandboxContext>,
    ) -> StoreResult<()> {
        let visibility = self.descriptor(scope);
        let label = self.resolver.to_visibility_label(&visibility);
        self.store.create_element(&NewElement {
            id: id.to_string(),
            kind,
            type_name: type_name.to_string(),
            endpoints,
            visibility,
            label,
        })
    }

    pub fn create_vertex(&self, id: &str, concept_type: &str, scope: Option<&SandboxContext>) -> StoreResult<()> {
        self.create(id, ElementKind::Vertex, concept_type, None, scope)?;
        if let Some(ctx) = scope {
            self.store.add_member(ctx.workspace_id(), id)?;
        }
        Ok(())
    }

    pub fn create_edge(
        &self,
        id: &str,
        label: &str,
        out_vertex_id: &str,
        in_vertex_id: &str,
        scope: Option<&SandboxContext>,
    ) -> StoreResult<()> {
        self.create(
            id,
            ElementKind::Edge,
            label,
            Some((out_vertex_id.to_string(), in_vertex_id.to_string())),
            scope,
        )
    }

    /// Adds an existing vertex to the workspace membership list.
    pub fn add_to_workspace(&self, ctx: &SandboxContext, vertex_id: &str) -> StoreResult<()> {
        self.store.add_member(ctx.workspace_id(), vertex_id)
    }

    /// Writes a property value.
    ///
    /// A workspace edit replaces any earlier workspace value of the slot and
    /// hides the public value it shadows. A public edit tombstones the
    /// previous public values.
    pub fn set_property(
        &self,
        element_id: &str,
        key: &str,
        name: &str,
        value: Value,
        scope: Option<&SandboxContext>,
    ) -> StoreResult<()> {
        let element = self.load(element_id, scope)?;
        let mut mutation = element.prepare_mutation();
        let mut metadata = Map::new();

        for revision in element.slot_revisions(key, name) {
            let is_public = !revision.visibility.has_workspace_tokens();
            match scope {
                Some(ctx) if revision.visibility.contains_workspace(ctx.workspace_id()) => {
                    mutation.delete_property(revision.revision_id);
                }
                Some(ctx) if is_public && !revision.hidden_in.contains(ctx.workspace_id()) => {
                    mutation.mark_property_hidden(revision.revision_id, ctx.workspace_id());
                }
                None if is_public => {
                    mutation.push(MutationOp::SoftDeleteProperty {
                        revision_id: revision.revision_id,
                    });
                }
                _ => {}
            }
        }

        if let Some(ctx) = scope {
            metadata.insert("modifiedBy".to_string(), Value::String(ctx.user_id().to_string()));
        }
        let visibility = self.descriptor(scope);
        let label = self.resolver.to_visibility_label(&visibility);
        mutation.add_property(NewPropertyRevision {
            key: key.to_string(),
            name: name.to_string(),
            value,
            metadata,
            visibility,
            label,
        });
        self.store.save(&mutation)?;

        if let (Some(ctx), ElementKind::Vertex) = (scope, element.kind()) {
            self.store.add_member(ctx.workspace_id(), element_id)?;
        }
        Ok(())
    }

    /// Stages the delete of a property slot in the workspace.
    pub fn delete_property(&self, element_id: &str, key: &str, name: &str, ctx: &SandboxContext) -> StoreResult<()> {
        let element = self.load(element_id, Some(ctx))?;
        let mut mutation = element.prepare_mutation();
        for revision in element.slot_revisions(key, name) {
            if revision.visibility.contains_workspace(ctx.workspace_id()) {
                mutation.delete_property(revision.revision_id);
            } else if !revision.visibility.has_workspace_tokens()
                && !revision.hidden_in.contains(ctx.workspace_id())
            {
                mutation.mark_property_hidden(revision.revision_id, ctx.workspace_id());
            }
        }
        if mutation.is_empty() {
            return Ok(());
        }
        self.store.save(&mutation)?;
        if element.kind() == ElementKind::Vertex {
            self.store.add_member(ctx.workspace_id(), element_id)?;
        }
        Ok(())
    }

    /// Stages the delete of an element in the workspace. Elements that only
    /// exist in the workspace are removed outright.
    pub fn delete_element(&self, element_id: &str, ctx: &SandboxContext) -> StoreResult<()> {
        let element = self.load(element_id, Some(ctx))?;
        if element.visibility.contains_workspace(ctx.workspace_id()) {
            self.store.delete_element(element_id)?;
            return Ok(());
        }
        self.store.soft_delete_element(element_id, ctx.workspace_id())?;
        if element.kind() == ElementKind::Vertex {
            self.store.add_member(ctx.workspace_id(), element_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{new_element_id, GraphEditor};
    use crate::db::open_db_in_memory;
    use crate::model::context::SandboxContext;
    use crate::model::visibility::Authorizations;
    use crate::resolver::DefaultVisibilityResolver;
    use crate::store::{FetchHints, GraphStore, SqliteGraphStore, WorkspaceMembership};
    use serde_json::json;

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(new_element_id(), new_element_id());
    }

    #[test]
    fn workspace_edit_hides_public_value_for_that_workspace_only() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteGraphStore::try_new(&conn).unwrap();
        let resolver = DefaultVisibilityResolver;
        let editor = GraphEditor::new(&store, &resolver);
        let ctx = SandboxContext::new("ws-1", "alice").unwrap();

        editor.create_vertex("v1", "person", None).unwrap();
        editor.set_property("v1", "k1", "title", json!("public"), None).unwrap();
        editor.set_property("v1", "k1", "title", json!("draft"), Some(&ctx)).unwrap();

        let seen_by_ws = store
            .get_element("v1", FetchHints::DEFAULT, &ctx.authorizations())
            .unwrap()
            .unwrap();
        assert_eq!(seen_by_ws.properties.len(), 1);
        assert_eq!(seen_by_ws.properties[0].value, json!("draft"));

        let seen_publicly = store
            .get_element("v1", FetchHints::DEFAULT, &Authorizations::public())
            .unwrap()
            .unwrap();
        assert_eq!(seen_publicly.properties.len(), 1);
        assert_eq!(seen_publicly.properties[0].value, json!("public"));
        assert_eq!(store.member_vertex_ids("ws-1").unwrap(), vec!["v1".to_string()]);
    }

    #[test]
    fn deleting_a_workspace_only_vertex_removes_it() {
        let conn = open_db_in_memory().unwrap();
        let store = SqliteGraphStore::try_new(&conn).unwrap();
        let resolver = DefaultVisibilityResolver;
        let editor = GraphEditor::new(&store, &resolver);
        let ctx = SandboxContext::new("ws-1", "alice").unwrap();

        editor.create_vertex("v1", "person", Some(&ctx)).unwrap();
        editor.delete_element("v1", &ctx).unwrap();

        let found = store
            .get_element("v1", FetchHints::ALL_INCLUDING_HIDDEN, &ctx.authorizations())
            .unwrap();
        assert!(found.is_none());
        assert!(store.member_vertex_ids("ws-1").unwrap().is_empty());
    }
}
