mod common;

use common::{
    active_public_revisions, ctx, define_public_schema, editor, public_rewrite_under_edit,
    public_view, service, service_with_sink, slot_values, workspace_view, WS,
};
use sandbox_core::db::open_db_in_memory;
use sandbox_core::{ElementKind, ItemAction, ItemError, Notification, SandboxItem, SandboxStatus};
use serde_json::json;

#[test]
fn undo_deletes_a_private_vertex() {
    let conn = open_db_in_memory().unwrap();
    let (service, sink) = service_with_sink(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", Some(&ctx)).unwrap();
    editor
        .set_property("v1", "k1", "title", json!("draft"), Some(&ctx))
        .unwrap();

    let result = service
        .undo(vec![SandboxItem::vertex("v1", ItemAction::AddOrUpdate)], &ctx)
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    assert!(workspace_view(&service, "v1", WS).is_none());
    assert!(service
        .diff(&ctx)
        .unwrap()
        .iter()
        .all(|item| item.target().element_id() != "v1"));
    assert_eq!(
        sink.drain(),
        vec![Notification::ElementDeleted {
            element_kind: ElementKind::Vertex,
            element_id: "v1".to_string(),
            workspace_id: WS.to_string(),
        }]
    );
}

#[test]
fn undo_of_private_vertex_takes_its_edges_along() {
    let conn = open_db_in_memory().unwrap();
    let (service, sink) = service_with_sink(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", Some(&ctx)).unwrap();
    editor.create_vertex("v2", "person", None).unwrap();
    editor.create_edge("e1", "knows", "v1", "v2", Some(&ctx)).unwrap();

    let result = service
        .undo(
            vec![
                SandboxItem::edge("e1", ItemAction::AddOrUpdate),
                SandboxItem::vertex("v1", ItemAction::AddOrUpdate),
            ],
            &ctx,
        )
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.succeeded, 2);
    assert!(workspace_view(&service, "e1", WS).is_none());
    assert!(public_view(&service, "v2").is_some());
    let deleted: Vec<String> = sink
        .drain()
        .into_iter()
        .filter_map(|notification| match notification {
            Notification::ElementDeleted { element_id, .. } => Some(element_id),
            _ => None,
        })
        .collect();
    assert_eq!(deleted, vec!["e1".to_string(), "v1".to_string()]);
}

#[test]
fn undo_reveals_a_hidden_vertex_and_its_hidden_properties() {
    let conn = open_db_in_memory().unwrap();
    let (service, sink) = service_with_sink(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();
    editor.delete_property("v1", "k1", "color", &ctx).unwrap();
    editor.delete_element("v1", &ctx).unwrap();
    assert!(workspace_view(&service, "v1", WS).is_none());
    assert_eq!(
        service.classify_element(&ctx, "v1").unwrap(),
        Some(SandboxStatus::Public)
    );
    assert_eq!(service.is_hidden(&ctx, "v1").unwrap(), Some(true));

    let result = service
        .undo(vec![SandboxItem::vertex("v1", ItemAction::Delete)], &ctx)
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    let seen = workspace_view(&service, "v1", WS).unwrap();
    assert_eq!(slot_values(&seen, "k1", "color"), vec![json!("red")]);
    assert_eq!(service.is_hidden(&ctx, "v1").unwrap(), Some(false));
    assert!(service.diff(&ctx).unwrap().is_empty());
    assert_eq!(
        sink.drain(),
        vec![
            Notification::ElementChanged {
                element_kind: ElementKind::Vertex,
                element_id: "v1".to_string(),
                workspace_id: WS.to_string(),
            },
            Notification::PropertyChanged {
                element_kind: ElementKind::Vertex,
                element_id: "v1".to_string(),
                key: "k1".to_string(),
                name: "color".to_string(),
                workspace_id: WS.to_string(),
            },
        ]
    );
}

#[test]
fn undo_of_an_edit_restores_the_shadowed_public_value() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();
    editor
        .set_property("v1", "k1", "color", json!("blue"), Some(&ctx))
        .unwrap();

    let result = service
        .undo(
            vec![SandboxItem::property(
                ElementKind::Vertex,
                "v1",
                "k1",
                "color",
                ItemAction::AddOrUpdate,
            )],
            &ctx,
        )
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    let seen = workspace_view(&service, "v1", WS).unwrap();
    assert_eq!(slot_values(&seen, "k1", "color"), vec![json!("red")]);
    assert_eq!(
        slot_values(&public_view(&service, "v1").unwrap(), "k1", "color"),
        vec![json!("red")]
    );
    assert_eq!(active_public_revisions(&conn, "v1", "k1", "color"), 1);
    assert_eq!(
        service.classify_property(&ctx, "v1", "k1", "color").unwrap(),
        Some(SandboxStatus::Public)
    );
}

#[test]
fn undo_of_an_edit_keeps_a_newer_public_value() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let ctx = ctx(WS);
    public_rewrite_under_edit(&service, &ctx);
    assert_eq!(
        service.classify_property(&ctx, "v1", "k1", "color").unwrap(),
        Some(SandboxStatus::PublicChanged)
    );

    let items: Vec<SandboxItem> = service
        .diff(&ctx)
        .unwrap()
        .iter()
        .map(|item| item.to_undo_item())
        .collect();
    let result = service.undo(items, &ctx).unwrap();

    assert!(result.is_success(), "{result:?}");
    let seen = workspace_view(&service, "v1", WS).unwrap();
    assert_eq!(slot_values(&seen, "k1", "color"), vec![json!("green")]);
    assert_eq!(active_public_revisions(&conn, "v1", "k1", "color"), 1);
    assert!(service.diff(&ctx).unwrap().is_empty());
}

#[test]
fn undo_of_a_pending_property_delete_reveals_the_value() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();
    editor.delete_property("v1", "k1", "color", &ctx).unwrap();

    let items: Vec<SandboxItem> = service
        .diff(&ctx)
        .unwrap()
        .iter()
        .map(|item| item.to_undo_item())
        .collect();
    let result = service.undo(items, &ctx).unwrap();

    assert!(result.is_success(), "{result:?}");
    let seen = workspace_view(&service, "v1", WS).unwrap();
    assert_eq!(slot_values(&seen, "k1", "color"), vec![json!("red")]);
    assert!(service.diff(&ctx).unwrap().is_empty());
}

#[test]
fn public_items_cannot_be_undone() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();

    let result = service
        .undo(
            vec![
                SandboxItem::vertex("v1", ItemAction::AddOrUpdate),
                SandboxItem::property(ElementKind::Vertex, "v1", "k1", "color", ItemAction::AddOrUpdate),
                SandboxItem::property(ElementKind::Vertex, "v1", "k1", "absent", ItemAction::AddOrUpdate),
            ],
            &ctx,
        )
        .unwrap();

    let codes: Vec<&str> = result.failures.iter().map(|failure| failure.error.code()).collect();
    assert_eq!(
        codes,
        vec!["cannot_undo_public", "cannot_undo_public", "property_not_found"]
    );
    assert!(public_view(&service, "v1").is_some());
}

#[test]
fn published_addition_can_no_longer_be_undone() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    define_public_schema(&service);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", Some(&ctx)).unwrap();
    let published = service
        .publish(vec![SandboxItem::vertex("v1", ItemAction::AddOrUpdate)], &ctx)
        .unwrap();
    assert!(published.is_success(), "{published:?}");

    let result = service
        .undo(vec![SandboxItem::vertex("v1", ItemAction::AddOrUpdate)], &ctx)
        .unwrap();

    assert_eq!(
        result.failure_for("v1").map(|failure| failure.error.clone()),
        Some(ItemError::CannotUndoPublic {
            element_kind: "vertex".to_string(),
            element_id: "v1".to_string(),
        })
    );
    assert!(public_view(&service, "v1").is_some());
}

#[test]
fn failing_item_does_not_stop_its_siblings() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ctx = ctx(WS);

    editor.create_vertex("v1", "person", Some(&ctx)).unwrap();

    let result = service
        .undo(
            vec![
                SandboxItem::vertex("missing", ItemAction::AddOrUpdate),
                SandboxItem::vertex("v1", ItemAction::AddOrUpdate),
            ],
            &ctx,
        )
        .unwrap();

    assert_eq!(result.succeeded, 1);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].error.code(), "element_not_found");
    assert!(workspace_view(&service, "v1", WS).is_none());
}

#[test]
fn other_workspaces_keep_their_edits() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let editor = editor(&service);
    let ours = ctx(WS);
    let theirs = ctx("ws-2");

    editor.create_vertex("v1", "person", None).unwrap();
    editor.set_property("v1", "k1", "color", json!("red"), None).unwrap();
    editor
        .set_property("v1", "k1", "color", json!("blue"), Some(&ours))
        .unwrap();
    editor
        .set_property("v1", "k1", "color", json!("green"), Some(&theirs))
        .unwrap();

    let result = service
        .undo(
            vec![SandboxItem::property(
                ElementKind::Vertex,
                "v1",
                "k1",
                "color",
                ItemAction::AddOrUpdate,
            )],
            &ours,
        )
        .unwrap();

    assert!(result.is_success(), "{result:?}");
    let seen = workspace_view(&service, "v1", "ws-2").unwrap();
    assert_eq!(slot_values(&seen, "k1", "color"), vec![json!("green")]);
    assert_eq!(
        service.classify_property(&theirs, "v1", "k1", "color").unwrap(),
        Some(SandboxStatus::PublicChanged)
    );
}
