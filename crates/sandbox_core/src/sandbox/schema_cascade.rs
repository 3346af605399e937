//! Publishes the private schema types a publish batch depends on.
//!
//! # Invariants
//! - Ancestors are published before descendants, root first.
//! - Each private type is published at most once per batch.
//! - Failures are reported per required type; the caller maps them onto
//!   the items that needed the type.

use super::SandboxEnv;
use crate::model::context::SandboxContext;
use crate::model::item::ItemError;
use crate::model::status::SandboxStatus;
use crate::notify::Notification;
use crate::schema::{SchemaError, SchemaKind, SchemaType};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};

pub(crate) type SchemaKey = (SchemaKind, String);

#[derive(Debug, Default)]
pub(crate) struct CascadeOutcome {
    pub(crate) failures: BTreeMap<SchemaKey, ItemError>,
    pub(crate) notifications: Vec<Notification>,
}

fn lookup_error(kind: SchemaKind, name: &str, err: SchemaError) -> ItemError {
    match err {
        SchemaError::NotFound {
            kind: missing_kind,
            name: missing_name,
        } => ItemError::MissingSchemaType {
            schema_kind: missing_kind.to_string(),
            name: missing_name,
        },
        other => ItemError::SchemaPublishFailed {
            schema_kind: kind.to_string(),
            name: name.to_string(),
            message: other.to_string(),
        },
    }
}

fn chain_for(env: &SandboxEnv<'_>, ctx: &SandboxContext, key: &SchemaKey) -> Result<Vec<SchemaType>, ItemError> {
    let (kind, name) = key;
    let target = env
        .schema
        .get_by_name(*kind, name, ctx.workspace_id())
        .map_err(|err| lookup_error(*kind, name, err))?
        .ok_or_else(|| ItemError::MissingSchemaType {
            schema_kind: kind.to_string(),
            name: name.clone(),
        })?;
    let mut chain = env
        .schema
        .get_ancestors(&target, ctx.workspace_id())
        .map_err(|err| lookup_error(*kind, name, err))?;
    chain.reverse();
    chain.push(target);
    Ok(chain)
}

/// Publishes every private type in the ancestry of each required type.
pub(crate) fn publish_required_schema<'k>(
    env: &SandboxEnv<'_>,
    ctx: &SandboxContext,
    required: impl IntoIterator<Item = &'k SchemaKey>,
) -> CascadeOutcome {
    let mut outcome = CascadeOutcome::default();
    let mut published: BTreeSet<SchemaKey> = BTreeSet::new();
    let mut failed: BTreeMap<SchemaKey, ItemError> = BTreeMap::new();

    for key in required {
        let chain = match chain_for(env, ctx, key) {
            Ok(chain) => chain,
            Err(err) => {
                outcome.failures.insert(key.clone(), err);
                continue;
            }
        };
        for schema_type in chain {
            let type_key = (schema_type.kind, schema_type.name.clone());
            if let Some(err) = failed.get(&type_key) {
                outcome.failures.insert(key.clone(), err.clone());
                break;
            }
            if schema_type.sandbox_status() == SandboxStatus::Public || published.contains(&type_key) {
                continue;
            }
            match env.schema.publish(&schema_type, ctx.user_id(), ctx.workspace_id()) {
                Ok(()) => {
                    outcome.notifications.push(Notification::SchemaChanged {
                        schema_kind: schema_type.kind,
                        name: schema_type.name.clone(),
                        workspace_id: ctx.workspace_id().to_string(),
                    });
                    published.insert(type_key);
                }
                Err(err) => {
                    warn!(
                        "event=schema_cascade module=sandbox status=error schema_kind={} name={} error={}",
                        schema_type.kind, schema_type.name, err
                    );
                    let item_error = ItemError::SchemaPublishFailed {
                        schema_kind: schema_type.kind.to_string(),
                        name: schema_type.name.clone(),
                        message: err.to_string(),
                    };
                    failed.insert(type_key, item_error.clone());
                    outcome.failures.insert(key.clone(), item_error);
                    break;
                }
            }
        }
    }

    if !published.is_empty() {
        env.schema.clear_cache();
        info!(
            "event=schema_cascade module=sandbox status=ok workspace_id={} published={}",
            ctx.workspace_id(),
            published.len()
        );
    }
    outcome
}
