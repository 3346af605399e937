//! SQLite-backed graph store.
//!
//! # Responsibility
//! - Persist elements, stacked property revisions and workspace hidden
//!   markers.
//! - Filter reads by observer authorizations and fetch hints.
//!
//! # Invariants
//! - Tombstoned revisions (`is_tombstoned=1`) are never returned.
//! - Every `save` is atomic: a failing operation rolls back the whole
//!   mutation via a savepoint, also when nested inside a batch.

use super::{
    ElementMutation, FetchHints, GraphStore, MutationOp, NewElement, StoreError, StoreResult,
    WorkspaceMembership,
};
use crate::db::ensure_migrated;
use crate::model::element::{
    Element, ElementId, ElementKind, ElementShape, PropertyRevision, RevisionId,
};
use crate::model::visibility::{Authorizations, VisibilityDescriptor, VisibilityLabel, WorkspaceId};
use log::error;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

const ELEMENT_SELECT_SQL: &str = "SELECT
    element_id,
    kind,
    type_name,
    out_vertex_id,
    in_vertex_id,
    visibility_json,
    visibility_label
FROM elements";

const PROPERTY_SELECT_SQL: &str = "SELECT
    revision_id,
    prop_key,
    prop_name,
    value_json,
    metadata_json,
    visibility_json,
    visibility_label
FROM properties";

struct ElementRow {
    element_id: String,
    kind: String,
    type_name: String,
    out_vertex_id: Option<String>,
    in_vertex_id: Option<String>,
    visibility_json: String,
    visibility_label: String,
}

/// Graph store over a migrated SQLite connection.
pub struct SqliteGraphStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGraphStore<'conn> {
    /// Creates a store from a connection returned by `db::open_db*`.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self { conn })
    }

    fn load_element_row(&self, id: &str) -> StoreResult<Option<ElementRow>> {
        let row = self
            .conn
            .query_row(
                &format!("{ELEMENT_SELECT_SQL} WHERE element_id = ?1;"),
                [id],
                |row| {
                    Ok(ElementRow {
                        element_id: row.get("element_id")?,
                        kind: row.get("kind")?,
                        type_name: row.get("type_name")?,
                        out_vertex_id: row.get("out_vertex_id")?,
                        in_vertex_id: row.get("in_vertex_id")?,
                        visibility_json: row.get("visibility_json")?,
                        visibility_label: row.get("visibility_label")?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    fn load_element_hidden(&self, id: &str) -> StoreResult<BTreeSet<WorkspaceId>> {
        let mut stmt = self.conn.prepare(
            "SELECT workspace_id
             FROM element_hidden
             WHERE element_id = ?1;",
        )?;
        let mut rows = stmt.query([id])?;
        let mut hidden_in = BTreeSet::new();
        while let Some(row) = rows.next()? {
            hidden_in.insert(row.get::<_, String>(0)?);
        }
        Ok(hidden_in)
    }

    fn load_property_hidden(
        &self,
        element_id: &str,
    ) -> StoreResult<BTreeMap<RevisionId, BTreeSet<WorkspaceId>>> {
        let mut stmt = self.conn.prepare(
            "SELECT h.revision_id, h.workspace_id
             FROM property_hidden h
             INNER JOIN properties p ON p.revision_id = h.revision_id
             WHERE p.element_id = ?1
               AND p.is_tombstoned = 0;",
        )?;
        let mut rows = stmt.query([element_id])?;
        let mut hidden: BTreeMap<RevisionId, BTreeSet<WorkspaceId>> = BTreeMap::new();
        while let Some(row) = rows.next()? {
            hidden
                .entry(row.get(0)?)
                .or_default()
                .insert(row.get::<_, String>(1)?);
        }
        Ok(hidden)
    }

    fn load_properties(
        &self,
        element_id: &str,
        hints: FetchHints,
        authorizations: &Authorizations,
    ) -> StoreResult<Vec<PropertyRevision>> {
        let mut hidden = self.load_property_hidden(element_id)?;
        let mut stmt = self.conn.prepare(&format!(
            "{PROPERTY_SELECT_SQL}
             WHERE element_id = ?1
               AND is_tombstoned = 0
             ORDER BY revision_id ASC;"
        ))?;
        let mut rows = stmt.query([element_id])?;
        let mut revisions = Vec::new();

        while let Some(row) = rows.next()? {
            let revision_id: RevisionId = row.get("revision_id")?;
            let visibility = parse_descriptor(
                &row.get::<_, String>("visibility_json")?,
                "properties.visibility_json",
            )?;
            if !visibility.is_visible_to(authorizations) {
                continue;
            }

            let hidden_in = hidden.remove(&revision_id).unwrap_or_default();
            if !hints.include_hidden && authorizations.intersects(&hidden_in) {
                continue;
            }

            revisions.push(PropertyRevision {
                revision_id,
                key: row.get("prop_key")?,
                name: row.get("prop_name")?,
                value: parse_value(&row.get::<_, String>("value_json")?, "properties.value_json")?,
                metadata: parse_metadata(&row.get::<_, String>("metadata_json")?)?,
                visibility,
                label: VisibilityLabel::new(row.get::<_, String>("visibility_label")?),
                hidden_in,
            });
        }

        Ok(revisions)
    }

    fn ensure_element_exists(&self, id: &str) -> StoreResult<ElementKind> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT kind FROM elements WHERE element_id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        match kind {
            Some(kind) => parse_kind(&kind),
            None => Err(StoreError::ElementNotFound(id.to_string())),
        }
    }

    fn ensure_revision_exists(&self, element_id: &str, revision_id: RevisionId) -> StoreResult<()> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM properties
                WHERE revision_id = ?1
                  AND element_id = ?2
                  AND is_tombstoned = 0
            );",
            params![revision_id, element_id],
            |row| row.get(0),
        )?;
        if exists == 1 {
            return Ok(());
        }
        Err(StoreError::RevisionNotFound {
            element_id: element_id.to_string(),
            revision_id,
        })
    }

    fn apply_op(&self, element_id: &str, op: &MutationOp) -> StoreResult<()> {
        match op {
            MutationOp::AlterElementVisibility { visibility, label } => {
                self.conn.execute(
                    "UPDATE elements
                     SET visibility_json = ?2,
                         visibility_label = ?3,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE element_id = ?1;",
                    params![element_id, descriptor_to_db(visibility)?, label.as_str()],
                )?;
            }
            MutationOp::AlterPropertyVisibility {
                revision_id,
                visibility,
                label,
            } => {
                self.ensure_revision_exists(element_id, *revision_id)?;
                self.conn.execute(
                    "UPDATE properties
                     SET visibility_json = ?2,
                         visibility_label = ?3,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE revision_id = ?1;",
                    params![revision_id, descriptor_to_db(visibility)?, label.as_str()],
                )?;
            }
            MutationOp::AddProperty(revision) => {
                self.conn.execute(
                    "INSERT INTO properties (
                        element_id,
                        prop_key,
                        prop_name,
                        value_json,
                        metadata_json,
                        visibility_json,
                        visibility_label
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                    params![
                        element_id,
                        revision.key.as_str(),
                        revision.name.as_str(),
                        json_to_db(&revision.value)?,
                        json_to_db(&revision.metadata)?,
                        descriptor_to_db(&revision.visibility)?,
                        revision.label.as_str(),
                    ],
                )?;
            }
            MutationOp::DeleteProperty { revision_id } => {
                self.ensure_revision_exists(element_id, *revision_id)?;
                self.conn
                    .execute("DELETE FROM properties WHERE revision_id = ?1;", [revision_id])?;
            }
            MutationOp::SoftDeleteProperty { revision_id } => {
                self.ensure_revision_exists(element_id, *revision_id)?;
                self.conn.execute(
                    "UPDATE properties
                     SET is_tombstoned = 1,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE revision_id = ?1;",
                    [revision_id],
                )?;
            }
            MutationOp::MarkPropertyHidden {
                revision_id,
                workspace_id,
            } => {
                self.ensure_revision_exists(element_id, *revision_id)?;
                self.conn.execute(
                    "INSERT OR IGNORE INTO property_hidden (revision_id, workspace_id)
                     VALUES (?1, ?2);",
                    params![revision_id, workspace_id],
                )?;
            }
            MutationOp::MarkPropertyVisible {
                revision_id,
                workspace_id,
            } => {
                self.ensure_revision_exists(element_id, *revision_id)?;
                self.conn.execute(
                    "DELETE FROM property_hidden
                     WHERE revision_id = ?1
                       AND workspace_id = ?2;",
                    params![revision_id, workspace_id],
                )?;
            }
        }
        Ok(())
    }

    fn apply_mutation(&self, mutation: &ElementMutation) -> StoreResult<()> {
        self.ensure_element_exists(mutation.element_id())?;
        for op in mutation.ops() {
            self.apply_op(mutation.element_id(), op)?;
        }
        self.conn.execute(
            "UPDATE elements
             SET updated_at = (strftime('%s', 'now') * 1000)
             WHERE element_id = ?1;",
            [mutation.element_id()],
        )?;
        Ok(())
    }
}

impl GraphStore for SqliteGraphStore<'_> {
    fn get_element(
        &self,
        id: &str,
        hints: FetchHints,
        authorizations: &Authorizations,
    ) -> StoreResult<Option<Element>> {
        let Some(row) = self.load_element_row(id)? else {
            return Ok(None);
        };

        let visibility = parse_descriptor(&row.visibility_json, "elements.visibility_json")?;
        if !visibility.is_visible_to(authorizations) {
            return Ok(None);
        }

        let hidden_in = self.load_element_hidden(id)?;
        if !hints.include_hidden && authorizations.intersects(&hidden_in) {
            return Ok(None);
        }

        let shape = match (parse_kind(&row.kind)?, row.out_vertex_id, row.in_vertex_id) {
            (ElementKind::Vertex, _, _) => ElementShape::Vertex {
                concept_type: row.type_name,
            },
            (ElementKind::Edge, Some(out_vertex_id), Some(in_vertex_id)) => ElementShape::Edge {
                label: row.type_name,
                out_vertex_id,
                in_vertex_id,
            },
            (ElementKind::Edge, _, _) => {
                return Err(StoreError::InvalidData(format!(
                    "edge `{}` is missing an endpoint",
                    row.element_id
                )));
            }
        };

        let properties = self.load_properties(id, hints, authorizations)?;
        Ok(Some(Element {
            id: row.element_id,
            shape,
            visibility,
            label: VisibilityLabel::new(row.visibility_label),
            hidden_in,
            properties,
        }))
    }

    fn edge_ids_for_vertex(&self, vertex_id: &str) -> StoreResult<Vec<ElementId>> {
        let mut stmt = self.conn.prepare(
            "SELECT element_id
             FROM elements
             WHERE kind = 'edge'
               AND (out_vertex_id = ?1 OR in_vertex_id = ?1)
             ORDER BY element_id ASC;",
        )?;
        let mut rows = stmt.query([vertex_id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn create_element(&self, element: &NewElement) -> StoreResult<()> {
        if self.load_element_row(&element.id)?.is_some() {
            return Err(StoreError::DuplicateElement(element.id.clone()));
        }
        let (out_vertex_id, in_vertex_id) = match &element.endpoints {
            Some((out_id, in_id)) => (Some(out_id.as_str()), Some(in_id.as_str())),
            None => (None, None),
        };
        self.conn.execute(
            "INSERT INTO elements (
                element_id,
                kind,
                type_name,
                out_vertex_id,
                in_vertex_id,
                visibility_json,
                visibility_label
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                element.id.as_str(),
                element.kind.as_str(),
                element.type_name.as_str(),
                out_vertex_id,
                in_vertex_id,
                descriptor_to_db(&element.visibility)?,
                element.label.as_str(),
            ],
        )?;
        Ok(())
    }

    fn save(&self, mutation: &ElementMutation) -> StoreResult<()> {
        self.conn.execute_batch("SAVEPOINT element_mutation;")?;
        match self.apply_mutation(mutation) {
            Ok(()) => {
                self.conn.execute_batch("RELEASE element_mutation;")?;
                Ok(())
            }
            Err(err) => {
                if let Err(rollback_err) = self
                    .conn
                    .execute_batch("ROLLBACK TO element_mutation; RELEASE element_mutation;")
                {
                    error!(
                        "event=mutation_rollback module=store status=error element_id={} error={}",
                        mutation.element_id(),
                        rollback_err
                    );
                }
                Err(err)
            }
        }
    }

    fn delete_element(&self, id: &str) -> StoreResult<Vec<(ElementKind, ElementId)>> {
        let kind = self.ensure_element_exists(id)?;
        let mut removed = Vec::new();
        if kind == ElementKind::Vertex {
            for edge_id in self.edge_ids_for_vertex(id)? {
                self.conn
                    .execute("DELETE FROM elements WHERE element_id = ?1;", [&edge_id])?;
                removed.push((ElementKind::Edge, edge_id));
            }
        }
        self.conn
            .execute("DELETE FROM elements WHERE element_id = ?1;", [id])?;
        removed.push((kind, id.to_string()));
        Ok(removed)
    }

    fn soft_delete_element(&self, id: &str, workspace_id: &str) -> StoreResult<()> {
        self.ensure_element_exists(id)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO element_hidden (element_id, workspace_id)
             VALUES (?1, ?2);",
            params![id, workspace_id],
        )?;
        Ok(())
    }

    fn mark_element_visible(&self, id: &str, workspace_id: &str) -> StoreResult<()> {
        self.ensure_element_exists(id)?;
        self.conn.execute(
            "DELETE FROM element_hidden
             WHERE element_id = ?1
               AND workspace_id = ?2;",
            params![id, workspace_id],
        )?;
        Ok(())
    }

    fn begin_batch(&self) -> StoreResult<()> {
        self.conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(())
    }

    fn flush(&self) -> StoreResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT;")?;
        }
        Ok(())
    }

    fn abort_batch(&self) -> StoreResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK;")?;
        }
        Ok(())
    }
}

impl WorkspaceMembership for SqliteGraphStore<'_> {
    fn member_vertex_ids(&self, workspace_id: &str) -> StoreResult<Vec<ElementId>> {
        let mut stmt = self.conn.prepare(
            "SELECT vertex_id
             FROM workspace_entities
             WHERE workspace_id = ?1
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([workspace_id])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            ids.push(row.get(0)?);
        }
        Ok(ids)
    }

    fn add_member(&self, workspace_id: &str, vertex_id: &str) -> StoreResult<()> {
        if self.ensure_element_exists(vertex_id)? != ElementKind::Vertex {
            return Err(StoreError::InvalidData(format!(
                "workspace members must be vertices, got edge `{vertex_id}`"
            )));
        }
        self.conn.execute(
            "INSERT OR IGNORE INTO workspace_entities (workspace_id, vertex_id)
             VALUES (?1, ?2);",
            params![workspace_id, vertex_id],
        )?;
        Ok(())
    }
}

fn parse_kind(value: &str) -> StoreResult<ElementKind> {
    match value {
        "vertex" => Ok(ElementKind::Vertex),
        "edge" => Ok(ElementKind::Edge),
        other => Err(StoreError::InvalidData(format!(
            "invalid element kind `{other}` in elements.kind"
        ))),
    }
}

fn parse_descriptor(value: &str, column: &'static str) -> StoreResult<VisibilityDescriptor> {
    serde_json::from_str(value)
        .map_err(|err| StoreError::InvalidData(format!("invalid descriptor in {column}: {err}")))
}

fn parse_value(value: &str, column: &'static str) -> StoreResult<Value> {
    serde_json::from_str(value)
        .map_err(|err| StoreError::InvalidData(format!("invalid json in {column}: {err}")))
}

fn parse_metadata(value: &str) -> StoreResult<Map<String, Value>> {
    match parse_value(value, "properties.metadata_json")? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::InvalidData(format!(
            "properties.metadata_json must be an object, got `{other}`"
        ))),
    }
}

fn descriptor_to_db(descriptor: &VisibilityDescriptor) -> StoreResult<String> {
    json_to_db(descriptor)
}

fn json_to_db(value: &impl serde::Serialize) -> StoreResult<String> {
    serde_json::to_string(value)
        .map_err(|err| StoreError::InvalidData(format!("cannot encode json: {err}")))
}
