//! SQLite-backed schema repository with a per-workspace lookup cache.

use super::{SchemaError, SchemaKind, SchemaRepository, SchemaResult, SchemaType};
use crate::db::ensure_migrated;
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

type CacheKey = (SchemaKind, String, String);

/// Schema repository over the `schema_types` table.
pub struct SqliteSchemaRepository<'conn> {
    conn: &'conn Connection,
    cache: RefCell<HashMap<CacheKey, Option<SchemaType>>>,
}

impl<'conn> SqliteSchemaRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> SchemaResult<Self> {
        ensure_migrated(conn)?;
        Ok(Self {
            conn,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// Inserts or replaces one definition. Used by schema-editing callers.
    pub fn define(&self, schema_type: &SchemaType) -> SchemaResult<()> {
        self.conn.execute(
            "INSERT INTO schema_types (kind, name, parent_name, workspace_id, user_visible)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT (kind, name) DO UPDATE SET
                parent_name = excluded.parent_name,
                workspace_id = excluded.workspace_id,
                user_visible = excluded.user_visible,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![
                schema_type.kind.as_str(),
                schema_type.name.as_str(),
                schema_type.parent_name.as_deref(),
                schema_type.workspace_id.as_deref(),
                i64::from(schema_type.user_visible),
            ],
        )?;
        self.clear_cache();
        Ok(())
    }

    fn lookup(&self, kind: SchemaKind, name: &str, workspace_id: &str) -> SchemaResult<Option<SchemaType>> {
        let key = (kind, name.to_string(), workspace_id.to_string());
        if let Some(cached) = self.cache.borrow().get(&key) {
            return Ok(cached.clone());
        }

        let row = self
            .conn
            .query_row(
                "SELECT name, parent_name, workspace_id, user_visible
                 FROM schema_types
                 WHERE kind = ?1
                   AND name = ?2
                   AND (workspace_id IS NULL OR workspace_id = ?3);",
                params![kind.as_str(), name, workspace_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                },
            )
            .optional()?;

        let found = match row {
            None => None,
            Some((name, parent_name, owner, user_visible)) => Some(SchemaType {
                kind,
                name,
                parent_name,
                workspace_id: owner,
                user_visible: parse_flag(user_visible)?,
            }),
        };
        self.cache.borrow_mut().insert(key, found.clone());
        Ok(found)
    }

    fn publish_type(&self, schema_type: &SchemaType, user_id: &str, workspace_id: &str) -> SchemaResult<()> {
        let changed = self.conn.execute(
            "UPDATE schema_types
             SET workspace_id = NULL,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE kind = ?1
               AND name = ?2
               AND workspace_id = ?3;",
            params![schema_type.kind.as_str(), schema_type.name.as_str(), workspace_id],
        )?;
        if changed == 0 {
            let already_public: i64 = self.conn.query_row(
                "SELECT EXISTS(
                    SELECT 1 FROM schema_types
                    WHERE kind = ?1 AND name = ?2 AND workspace_id IS NULL
                );",
                params![schema_type.kind.as_str(), schema_type.name.as_str()],
                |row| row.get(0),
            )?;
            if already_public == 1 {
                return Ok(());
            }
            return Err(SchemaError::NotFound {
                kind: schema_type.kind,
                name: schema_type.name.clone(),
            });
        }
        info!(
            "event=schema_publish module=schema status=ok kind={} name={} workspace_id={} user_id={}",
            schema_type.kind, schema_type.name, workspace_id, user_id
        );
        Ok(())
    }
}

impl SchemaRepository for SqliteSchemaRepository<'_> {
    fn get_concept_by_name(&self, name: &str, workspace_id: &str) -> SchemaResult<Option<SchemaType>> {
        self.lookup(SchemaKind::Concept, name, workspace_id)
    }

    fn get_relationship_by_name(
        &self,
        name: &str,
        workspace_id: &str,
    ) -> SchemaResult<Option<SchemaType>> {
        self.lookup(SchemaKind::Relationship, name, workspace_id)
    }

    fn get_property_by_name(&self, name: &str, workspace_id: &str) -> SchemaResult<Option<SchemaType>> {
        self.lookup(SchemaKind::Property, name, workspace_id)
    }

    fn get_ancestors(&self, schema_type: &SchemaType, workspace_id: &str) -> SchemaResult<Vec<SchemaType>> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(schema_type.name.clone());
        let mut cursor = schema_type.parent_name.clone();

        while let Some(parent_name) = cursor {
            if !visited.insert(parent_name.clone()) {
                return Err(SchemaError::CyclicAncestry {
                    kind: schema_type.kind,
                    name: schema_type.name.clone(),
                });
            }
            let parent = self
                .lookup(schema_type.kind, &parent_name, workspace_id)?
                .ok_or(SchemaError::NotFound {
                    kind: schema_type.kind,
                    name: parent_name,
                })?;
            cursor = parent.parent_name.clone();
            ancestors.push(parent);
        }
        Ok(ancestors)
    }

    fn publish_concept(&self, concept: &SchemaType, user_id: &str, workspace_id: &str) -> SchemaResult<()> {
        self.publish_type(concept, user_id, workspace_id)
    }

    fn publish_relationship(
        &self,
        relationship: &SchemaType,
        user_id: &str,
        workspace_id: &str,
    ) -> SchemaResult<()> {
        self.publish_type(relationship, user_id, workspace_id)
    }

    fn publish_property(&self, property: &SchemaType, user_id: &str, workspace_id: &str) -> SchemaResult<()> {
        self.publish_type(property, user_id, workspace_id)
    }

    fn clear_cache(&self) {
        self.cache.borrow_mut().clear();
    }
}

fn parse_flag(value: i64) -> SchemaResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(SchemaError::InvalidData(format!(
            "invalid user_visible value `{other}` in schema_types.user_visible"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteSchemaRepository;
    use crate::db::open_db_in_memory;
    use crate::schema::{SchemaKind, SchemaRepository, SchemaType};

    fn concept(name: &str, parent: Option<&str>, workspace: Option<&str>) -> SchemaType {
        SchemaType {
            kind: SchemaKind::Concept,
            name: name.to_string(),
            parent_name: parent.map(str::to_string),
            workspace_id: workspace.map(str::to_string),
            user_visible: true,
        }
    }

    #[test]
    fn private_types_are_scoped_to_their_workspace() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteSchemaRepository::try_new(&conn).unwrap();
        repo.define(&concept("person", None, Some("ws-1"))).unwrap();

        assert!(repo.get_concept_by_name("person", "ws-1").unwrap().is_some());
        assert!(repo.get_concept_by_name("person", "ws-2").unwrap().is_none());
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteSchemaRepository::try_new(&conn).unwrap();
        repo.define(&concept("thing", None, None)).unwrap();
        repo.define(&concept("agent", Some("thing"), Some("ws-1"))).unwrap();
        repo.define(&concept("person", Some("agent"), Some("ws-1"))).unwrap();

        let person = repo.get_concept_by_name("person", "ws-1").unwrap().unwrap();
        let names: Vec<String> = repo
            .get_ancestors(&person, "ws-1")
            .unwrap()
            .into_iter()
            .map(|ancestor| ancestor.name)
            .collect();
        assert_eq!(names, vec!["agent".to_string(), "thing".to_string()]);
    }

    #[test]
    fn cache_is_refreshed_after_clear() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteSchemaRepository::try_new(&conn).unwrap();
        repo.define(&concept("person", None, Some("ws-1"))).unwrap();

        let person = repo.get_concept_by_name("person", "ws-1").unwrap().unwrap();
        assert!(repo.get_concept_by_name("person", "ws-2").unwrap().is_none());
        repo.publish_concept(&person, "alice", "ws-1").unwrap();
        assert!(repo
            .get_concept_by_name("person", "ws-2")
            .unwrap()
            .is_none());

        repo.clear_cache();
        assert!(repo
            .get_concept_by_name("person", "ws-2")
            .unwrap()
            .is_some());
    }
}
