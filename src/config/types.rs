//! Raw config types matching the JSON entity definition document.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Relation kinds as declared in config. Resolved into a to-one / to-many include direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// We hold the foreign key to the related entity.
    BelongsTo,
    /// The related entity holds a foreign key to us; at most one row.
    HasOne,
    /// The related entity holds a foreign key to us.
    HasMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationConfig {
    pub name: String,
    pub kind: RelationKind,
    /// Name of the related entity.
    pub entity: String,
    pub foreign_key: String,
    /// belongs_to: the related entity's key (default its primary key).
    /// has_one / has_many: our key (default our primary key).
    #[serde(default)]
    pub local_key: Option<String>,
}

fn default_created_at() -> Option<String> {
    Some("created_at".into())
}

fn default_updated_at() -> Option<String> {
    Some("updated_at".into())
}

/// `true`/`false` toggles the conventional `created_at`/`updated_at` pair.
/// An object names the columns; `null` disables one. `deleted_at` enables soft deletes.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimestampsConfig {
    Toggle(bool),
    Columns {
        #[serde(default = "default_created_at")]
        created_at: Option<String>,
        #[serde(default = "default_updated_at")]
        updated_at: Option<String>,
        #[serde(default)]
        deleted_at: Option<String>,
    },
}

impl Default for TimestampsConfig {
    fn default() -> Self {
        TimestampsConfig::Toggle(true)
    }
}

impl TimestampsConfig {
    /// (created_at, updated_at, deleted_at) column names.
    pub fn columns(&self) -> (Option<String>, Option<String>, Option<String>) {
        match self {
            TimestampsConfig::Toggle(true) => (default_created_at(), default_updated_at(), None),
            TimestampsConfig::Toggle(false) => (None, None, None),
            TimestampsConfig::Columns {
                created_at,
                updated_at,
                deleted_at,
            } => (created_at.clone(), updated_at.clone(), deleted_at.clone()),
        }
    }
}

/// Columns used by `GET /{resource}/options` to build `{value, label}` pairs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OptionsConfig {
    #[serde(default)]
    pub key: Option<String>,
    pub label: String,
}

/// Actions a resource can expose. Entities enable all of them unless `operations` says otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    Search,
    Count,
    Read,
    Create,
    Update,
    Delete,
    Options,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::List,
        Operation::Search,
        Operation::Count,
        Operation::Read,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
        Operation::Options,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Search => "search",
            Operation::Count => "count",
            Operation::Read => "read",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Options => "options",
        }
    }
}

fn default_operations() -> Vec<Operation> {
    Operation::ALL.to_vec()
}

fn default_primary_key() -> String {
    "id".into()
}

fn default_key_type() -> String {
    "bigint".into()
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityConfig {
    /// Route segment and registry key (e.g. "widgets").
    pub name: String,
    #[serde(default)]
    pub schema: Option<String>,
    /// Table name; defaults to `name`.
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    /// uuid, bigint, int or text.
    #[serde(default = "default_key_type")]
    pub key_type: String,
    /// Mass-assignable columns. Together with the key and timestamps these are the only filterable fields.
    #[serde(default)]
    pub fillable: Vec<String>,
    /// Columns that must never be exposed in API responses (e.g. password hashes, secrets).
    #[serde(default)]
    pub hidden: Vec<String>,
    /// PostgreSQL type per column (e.g. "integer", "timestamptz") for binding string values.
    #[serde(default)]
    pub columns: HashMap<String, String>,
    #[serde(default)]
    pub timestamps: TimestampsConfig,
    #[serde(default)]
    pub relations: Vec<RelationConfig>,
    #[serde(default)]
    pub options: Option<OptionsConfig>,
    #[serde(default = "default_operations")]
    pub operations: Vec<Operation>,
    #[serde(default)]
    pub validation: HashMap<String, ValidationRule>,
}

/// The whole entity definition document.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}
