//! Resolved entity model: config validated and flattened for runtime use.

use crate::config::{Operation, ValidationRule};
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Direction of a related-include: to_one (one related row or null) or to_many (array of related rows).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncludeDirection {
    ToOne,
    ToMany,
}

/// A declared relation, ready for joins.
#[derive(Clone, Debug)]
pub struct RelationSpec {
    pub name: String,
    pub direction: IncludeDirection,
    /// Name of the related entity (for lookup in model).
    pub related: String,
    /// Our column used in the join (our FK for belongs_to; our key for has_one/has_many).
    pub our_key_column: String,
    /// Their column used in the join (their key for belongs_to; their FK for has_one/has_many).
    pub their_key_column: String,
}

/// Primary key type for parsing path ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    Uuid,
    BigInt,
    Int,
    Text,
}

impl PkType {
    /// PostgreSQL cast type for bound key values.
    pub fn pg_type(&self) -> &'static str {
        match self {
            PkType::Uuid => "uuid",
            PkType::BigInt => "int8",
            PkType::Int => "int4",
            PkType::Text => "text",
        }
    }
}

#[derive(Clone, Debug)]
pub struct OptionsSpec {
    pub key: String,
    pub label: String,
}

#[derive(Clone, Debug)]
pub struct EntityDescriptor {
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub primary_key: String,
    pub pk_type: PkType,
    pub fillable: Vec<String>,
    /// Column names to strip from all API responses (sensitive data).
    pub hidden: HashSet<String>,
    /// Declared PostgreSQL types by column name.
    pub column_types: HashMap<String, String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    /// Soft deletes are on when set.
    pub deleted_at: Option<String>,
    pub relations: Vec<RelationSpec>,
    pub options: Option<OptionsSpec>,
    pub operations: HashSet<Operation>,
    pub validation: HashMap<String, ValidationRule>,
    /// `ValidationRule::pattern`s, compiled once at resolve time.
    pub patterns: HashMap<String, Regex>,
}

impl EntityDescriptor {
    pub fn relation(&self, name: &str) -> Option<&RelationSpec> {
        self.relations.iter().find(|r| r.name == name)
    }

    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }

    pub fn is_fillable(&self, column: &str) -> bool {
        self.fillable.iter().any(|f| f == column)
    }

    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.column_types.get(column).map(String::as_str)
    }

    /// Every column the config mentions: key, fillable, hidden, typed, timestamps and relation keys.
    pub fn known_columns(&self) -> HashSet<&str> {
        let mut cols: HashSet<&str> = HashSet::new();
        cols.insert(self.primary_key.as_str());
        cols.extend(self.fillable.iter().map(String::as_str));
        cols.extend(self.hidden.iter().map(String::as_str));
        cols.extend(self.column_types.keys().map(String::as_str));
        for ts in [&self.created_at, &self.updated_at, &self.deleted_at].into_iter().flatten() {
            cols.insert(ts.as_str());
        }
        for rel in &self.relations {
            if rel.direction == IncludeDirection::ToOne && rel.our_key_column != self.primary_key {
                cols.insert(rel.our_key_column.as_str());
            }
        }
        cols
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub entities: Vec<EntityDescriptor>,
    pub entity_by_name: HashMap<String, EntityDescriptor>,
}

impl ResolvedModel {
    pub fn entity(&self, name: &str) -> Option<&EntityDescriptor> {
        self.entity_by_name.get(name)
    }
}
