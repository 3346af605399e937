mod common;

use common::{ctx, define_public_schema, editor, service, WS};
use sandbox_core::db::open_db_in_memory;
use sandbox_core::{DiffItem, ElementKind, SandboxStatus};
use serde_json::json;

#[test]
fn private_vertex_and_its_properties_are_listed() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", Some(&ctx)).unwrap();
    editor
        .set_property("v1", "k1", "title", json!("draft"), Some(&ctx))
        .unwrap();

    let items = service.diff(&ctx).unwrap();
    assert_eq!(items.len(), 2);
    match &items[0] {
        DiffItem::Vertex {
            vertex_id,
            concept_type,
            sandbox_status,
            deleted,
            ..
        } => {
            assert_eq!(vertex_id, "v1");
            assert_eq!(concept_type, "person");
            assert_eq!(*sandbox_status, SandboxStatus::Private);
            assert!(!deleted);
        }
        other => panic!("unexpected item: {other:?}"),
    }
    match &items[1] {
        DiffItem::Property {
            element_kind,
            key,
            name,
            old_value,
            new_value,
            sandbox_status,
            ..
        } => {
            assert_eq!(*element_kind, ElementKind::Vertex);
            assert_eq!((key.as_str(), name.as_str()), ("k1", "title"));
            assert_eq!(*old_value, None);
            assert_eq!(*new_value, json!("draft"));
            assert_eq!(*sandbox_status, SandboxStatus::Private);
        }
        other => panic!("unexpected item: {other:?}"),
    }
}

#[test]
fn edit_of_public_value_reports_shadowed_value() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();
    editor
        .set_property("v1", "k1", "color", json!("blue"), Some(&ctx))
        .unwrap();

    let items = service.diff(&ctx).unwrap();
    assert_eq!(items.len(), 1, "public vertex must not be listed: {items:?}");
    match &items[0] {
        DiffItem::Property {
            old_value,
            new_value,
            sandbox_status,
            deleted,
            ..
        } => {
            assert_eq!(*old_value, Some(json!("red")));
            assert_eq!(*new_value, json!("blue"));
            assert_eq!(*sandbox_status, SandboxStatus::PublicChanged);
            assert!(!deleted);
        }
        other => panic!("unexpected item: {other:?}"),
    }
}

#[test]
fn hidden_vertex_is_listed_without_its_properties() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();
    editor.delete_element("v1", &ctx).unwrap();

    let items = service.diff(&ctx).unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0].is_deleted());
    assert_eq!(items[0].sandbox_status(), SandboxStatus::Public);
    assert_eq!(items[0].target().element_id(), "v1");
}

#[test]
fn pending_property_delete_is_listed_as_deleted() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();
    editor.delete_property("v1", "k1", "color", &ctx).unwrap();

    let items = service.diff(&ctx).unwrap();
    assert_eq!(items.len(), 1);
    match &items[0] {
        DiffItem::Property {
            old_value,
            sandbox_status,
            deleted,
            ..
        } => {
            assert_eq!(*old_value, Some(json!("red")));
            assert_eq!(*sandbox_status, SandboxStatus::Public);
            assert!(deleted);
        }
        other => panic!("unexpected item: {other:?}"),
    }
}

#[test]
fn edges_reachable_from_members_are_listed_after_vertices() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    define_public_schema(&service);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", None).unwrap();
    editor.create_vertex("v2", "person", Some(&ctx)).unwrap();
    editor.create_edge("e1", "knows", "v1", "v2", Some(&ctx)).unwrap();

    let items = service.diff(&ctx).unwrap();
    let targets: Vec<_> = items.iter().map(|item| item.target()).collect();
    let ids: Vec<&str> = targets.iter().map(|target| target.element_id()).collect();
    assert_eq!(ids, vec!["v2", "e1"]);
    match &items[1] {
        DiffItem::Edge {
            label,
            out_vertex_id,
            in_vertex_id,
            sandbox_status,
            ..
        } => {
            assert_eq!(label, "knows");
            assert_eq!((out_vertex_id.as_str(), in_vertex_id.as_str()), ("v1", "v2"));
            assert_eq!(*sandbox_status, SandboxStatus::Private);
        }
        other => panic!("unexpected item: {other:?}"),
    }
}

#[test]
fn other_workspace_changes_are_not_listed() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ours = ctx(WS);
    let theirs = ctx("ws-2");

    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();
    editor
        .set_property("v1", "k1", "color", json!("green"), Some(&theirs))
        .unwrap();
    editor.create_vertex("v2", "person", Some(&theirs)).unwrap();
    editor.add_to_workspace(&ours, "v1").unwrap();

    assert!(service.diff(&ours).unwrap().is_empty());
    assert_eq!(service.diff(&theirs).unwrap().len(), 2);
}

#[test]
fn diff_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();
    editor
        .set_property("v1", "k1", "color", json!("blue"), Some(&ctx))
        .unwrap();
    editor.create_vertex("v2", "person", Some(&ctx)).unwrap();
    editor.create_edge("e1", "knows", "v1", "v2", Some(&ctx)).unwrap();

    let first = service.diff(&ctx).unwrap();
    let second = service.diff(&ctx).unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn diff_elements_limits_the_walk_to_given_vertices() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", Some(&ctx)).unwrap();
    editor.create_vertex("v2", "person", Some(&ctx)).unwrap();

    let items = service.diff_elements(&ctx, &["v2".to_string()]).unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].target().element_id(), "v2");
}
