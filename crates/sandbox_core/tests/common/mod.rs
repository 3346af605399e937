#![allow(dead_code)]

use rusqlite::Connection;
use sandbox_core::{
    Authorizations, Element, FetchHints, GraphEditor, GraphStore, MemoryNotificationSink,
    SandboxContext, SandboxService, SchemaKind, SchemaType, SqliteGraphStore,
    SqliteSchemaRepository,
};
use serde_json::{json, Value};
use std::sync::Arc;

pub const WS: &str = "ws-1";

pub type Service<'conn> = SandboxService<SqliteGraphStore<'conn>, SqliteSchemaRepository<'conn>>;

pub fn service(conn: &Connection) -> Service<'_> {
    let store = SqliteGraphStore::try_new(conn).unwrap();
    let schema = SqliteSchemaRepository::try_new(conn).unwrap();
    SandboxService::new(store, schema)
}

pub fn service_with_sink(conn: &Connection) -> (Service<'_>, Arc<MemoryNotificationSink>) {
    let mut service = service(conn);
    let sink = Arc::new(MemoryNotificationSink::new("test"));
    service.register_sink(sink.clone()).unwrap();
    (service, sink)
}

pub fn editor<'a, 'conn>(service: &'a Service<'conn>) -> GraphEditor<'a, SqliteGraphStore<'conn>> {
    GraphEditor::new(service.store(), service.resolver())
}

pub fn ctx(workspace_id: &str) -> SandboxContext {
    SandboxContext::new(workspace_id, "alice").unwrap()
}

pub fn define(
    service: &Service<'_>,
    kind: SchemaKind,
    name: &str,
    parent: Option<&str>,
    workspace_id: Option<&str>,
) {
    service
        .schema()
        .define(&SchemaType {
            kind,
            name: name.to_string(),
            parent_name: parent.map(str::to_string),
            workspace_id: workspace_id.map(str::to_string),
            user_visible: true,
        })
        .unwrap();
}

/// Public concepts, relationships and property types used across tests.
pub fn define_public_schema(service: &Service<'_>) {
    define(service, SchemaKind::Concept, "thing", None, None);
    define(service, SchemaKind::Concept, "person", Some("thing"), None);
    define(service, SchemaKind::Concept, "image", Some("thing"), None);
    define(service, SchemaKind::Relationship, "knows", None, None);
    define(service, SchemaKind::Relationship, "entityHasImage", None, None);
    define(service, SchemaKind::Property, "title", None, None);
    define(service, SchemaKind::Property, "color", None, None);
}

pub fn public_view(service: &Service<'_>, id: &str) -> Option<Element> {
    service
        .store()
        .get_element(id, FetchHints::DEFAULT, &Authorizations::public())
        .unwrap()
}

pub fn workspace_view(service: &Service<'_>, id: &str, workspace_id: &str) -> Option<Element> {
    service
        .store()
        .get_element(id, FetchHints::DEFAULT, &Authorizations::for_workspace(workspace_id))
        .unwrap()
}

/// Values of one slot as seen by the element snapshot, oldest first.
pub fn slot_values(element: &Element, key: &str, name: &str) -> Vec<Value> {
    element
        .slot_revisions(key, name)
        .into_iter()
        .map(|revision| revision.value.clone())
        .collect()
}

/// Active (non-tombstoned) public revisions of one slot, across all observers.
pub fn active_public_revisions(conn: &Connection, element_id: &str, key: &str, name: &str) -> i64 {
    conn.query_row(
        "SELECT COUNT(*)
         FROM properties
         WHERE element_id = ?1
           AND prop_key = ?2
           AND prop_name = ?3
           AND is_tombstoned = 0
           AND json_array_length(visibility_json, '$.workspaces') = 0;",
        [element_id, key, name],
        |row| row.get(0),
    )
    .unwrap()
}

/// Public `color` "red" on `v1`, edited to "blue" in the context's
/// workspace, then rewritten publicly to "green" under that edit.
pub fn public_rewrite_under_edit(service: &Service<'_>, ctx: &SandboxContext) {
    let editor = editor(service);
    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();
    editor
        .set_property("v1", "k1", "color", json!("blue"), Some(ctx))
        .unwrap();
    editor.set_property("v1", "k1", "color", json!("green"), None).unwrap();
}
