//! Load entity config from JSON (string or file) and resolve it into the runtime model.

use crate::config::resolved::{EntityDescriptor, IncludeDirection, OptionsSpec, PkType, RelationSpec, ResolvedModel};
use crate::config::types::*;
use crate::config::{validate, FullConfig};
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

const DEFAULT_SCHEMA: &str = "public";

/// Build resolved model from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;

    let configs_by_name: HashMap<&str, &EntityConfig> =
        config.entities.iter().map(|e| (e.name.as_str(), e)).collect();

    let mut entities = Vec::new();
    let mut entity_by_name = HashMap::new();

    for cfg in &config.entities {
        let pk_type = infer_pk_type(&cfg.key_type);
        let (created_at, updated_at, deleted_at) = cfg.timestamps.columns();

        let mut column_types = cfg.columns.clone();
        column_types
            .entry(cfg.primary_key.clone())
            .or_insert_with(|| pk_type.pg_type().to_string());
        for ts in [&created_at, &updated_at, &deleted_at].into_iter().flatten() {
            column_types.entry(ts.clone()).or_insert_with(|| "timestamptz".into());
        }

        let relations = cfg
            .relations
            .iter()
            .filter_map(|rel| {
                let related = configs_by_name.get(rel.entity.as_str())?;
                Some(build_relation(cfg, related, rel))
            })
            .collect();

        let options = cfg.options.as_ref().map(|o| OptionsSpec {
            key: o.key.clone().unwrap_or_else(|| cfg.primary_key.clone()),
            label: o.label.clone(),
        });

        let patterns = compile_patterns(cfg)?;

        let entity = EntityDescriptor {
            name: cfg.name.clone(),
            schema_name: cfg.schema.clone().unwrap_or_else(|| DEFAULT_SCHEMA.into()),
            table_name: cfg.table.clone().unwrap_or_else(|| cfg.name.clone()),
            primary_key: cfg.primary_key.clone(),
            pk_type,
            fillable: cfg.fillable.clone(),
            hidden: cfg.hidden.iter().cloned().collect::<HashSet<_>>(),
            column_types,
            created_at,
            updated_at,
            deleted_at,
            relations,
            options,
            operations: cfg.operations.iter().copied().collect(),
            validation: cfg.validation.clone(),
            patterns,
        };
        entity_by_name.insert(cfg.name.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_name,
    })
}

fn compile_patterns(cfg: &EntityConfig) -> Result<HashMap<String, Regex>, ConfigError> {
    cfg.validation
        .iter()
        .filter_map(|(col, rule)| rule.pattern.as_ref().map(|p| (col, p)))
        .map(|(col, pattern)| {
            Regex::new(pattern)
                .map(|re| (col.clone(), re))
                .map_err(|err| ConfigError::Validation(format!("entity {}: invalid pattern for {}: {}", cfg.name, col, err)))
        })
        .collect()
}

fn build_relation(ours: &EntityConfig, related: &EntityConfig, rel: &RelationConfig) -> RelationSpec {
    match rel.kind {
        RelationKind::BelongsTo => RelationSpec {
            name: rel.name.clone(),
            direction: IncludeDirection::ToOne,
            related: related.name.clone(),
            our_key_column: rel.foreign_key.clone(),
            their_key_column: rel.local_key.clone().unwrap_or_else(|| related.primary_key.clone()),
        },
        RelationKind::HasOne | RelationKind::HasMany => RelationSpec {
            name: rel.name.clone(),
            direction: if rel.kind == RelationKind::HasOne {
                IncludeDirection::ToOne
            } else {
                IncludeDirection::ToMany
            },
            related: related.name.clone(),
            our_key_column: rel.local_key.clone().unwrap_or_else(|| ours.primary_key.clone()),
            their_key_column: rel.foreign_key.clone(),
        },
    }
}

fn infer_pk_type(key_type: &str) -> PkType {
    let type_lower = key_type.to_lowercase();
    if type_lower.contains("uuid") {
        PkType::Uuid
    } else if type_lower.contains("bigserial") || type_lower.contains("bigint") || type_lower == "int8" {
        PkType::BigInt
    } else if type_lower.contains("serial") || type_lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}

pub fn load_from_str(json: &str) -> Result<FullConfig, ConfigError> {
    serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))
}

/// Read the entity definition document from disk.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading resource config");
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    load_from_str(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "entities": [
            {
                "name": "users",
                "fillable": ["name", "email"],
                "relations": [
                    {"name": "posts", "kind": "has_many", "entity": "posts", "foreign_key": "user_id"}
                ]
            },
            {
                "name": "posts",
                "table": "blog_posts",
                "key_type": "uuid",
                "fillable": ["title", "user_id"],
                "timestamps": {"deleted_at": "deleted_at"},
                "relations": [
                    {"name": "author", "kind": "belongs_to", "entity": "users", "foreign_key": "user_id"}
                ],
                "operations": ["list", "read"]
            }
        ]
    }"#;

    #[test]
    fn resolves_relations_in_both_directions() {
        let model = resolve(&load_from_str(CONFIG).unwrap()).unwrap();
        let users = model.entity("users").unwrap();
        let posts_rel = users.relation("posts").unwrap();
        assert_eq!(posts_rel.direction, IncludeDirection::ToMany);
        assert_eq!(posts_rel.our_key_column, "id");
        assert_eq!(posts_rel.their_key_column, "user_id");

        let posts = model.entity("posts").unwrap();
        let author = posts.relation("author").unwrap();
        assert_eq!(author.direction, IncludeDirection::ToOne);
        assert_eq!(author.our_key_column, "user_id");
        assert_eq!(author.their_key_column, "id");
    }

    #[test]
    fn applies_defaults() {
        let model = resolve(&load_from_str(CONFIG).unwrap()).unwrap();
        let users = model.entity("users").unwrap();
        assert_eq!(users.table_name, "users");
        assert_eq!(users.schema_name, "public");
        assert_eq!(users.pk_type, PkType::BigInt);
        assert_eq!(users.created_at.as_deref(), Some("created_at"));
        assert_eq!(users.deleted_at, None);
        assert!(users.allows(Operation::Delete));

        let posts = model.entity("posts").unwrap();
        assert_eq!(posts.table_name, "blog_posts");
        assert_eq!(posts.pk_type, PkType::Uuid);
        assert_eq!(posts.column_type("id"), Some("uuid"));
        assert_eq!(posts.deleted_at.as_deref(), Some("deleted_at"));
        assert!(!posts.allows(Operation::Delete));
    }

    #[test]
    fn timestamps_can_be_disabled() {
        let config = load_from_str(r#"{"entities":[{"name":"tags","timestamps":false}]}"#).unwrap();
        let model = resolve(&config).unwrap();
        let tags = model.entity("tags").unwrap();
        assert!(tags.created_at.is_none() && tags.updated_at.is_none());
    }
}
