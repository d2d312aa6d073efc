//! In-process store evaluating `AbstractQuery` over JSON rows.

use super::{Row, Store};
use crate::config::{EntityDescriptor, IncludeDirection, PkType, ResolvedModel};
use crate::error::AppError;
use crate::query::{AbstractQuery, Comparison, FilterClause, FilterValue, IncludeNode, SortDirection};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Row>>,
    next_id: HashMap<String, i64>,
}

pub struct MemoryStore {
    model: Arc<ResolvedModel>,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new(model: Arc<ResolvedModel>) -> Self {
        MemoryStore {
            model,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Insert rows as given (no timestamps or key generation). Non-object values are skipped.
    pub fn seed(&self, entity: &str, rows: impl IntoIterator<Item = Value>) -> Result<(), AppError> {
        let descriptor = self
            .model
            .entity(entity)
            .ok_or_else(|| AppError::Store(format!("unknown entity {}", entity)))?;
        let mut tables = self.write()?;
        for row in rows {
            let Value::Object(row) = row else { continue };
            if let Some(id) = row.get(&descriptor.primary_key).and_then(Value::as_i64) {
                let next = tables.next_id.entry(entity.to_string()).or_insert(1);
                *next = (*next).max(id + 1);
            }
            tables.rows.entry(entity.to_string()).or_default().push(row);
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, AppError> {
        self.tables.read().map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, AppError> {
        self.tables.write().map_err(|_| AppError::Store("memory store lock poisoned".into()))
    }

    fn visible<'t>(tables: &'t Tables, entity: &EntityDescriptor) -> impl Iterator<Item = &'t Row> + 't {
        let deleted_at = entity.deleted_at.clone();
        tables
            .rows
            .get(&entity.name)
            .into_iter()
            .flatten()
            .filter(move |row| !is_deleted(row, deleted_at.as_deref()))
    }

    fn related_rows<'t>(
        &self,
        tables: &'t Tables,
        entity: &EntityDescriptor,
        relation: &str,
        row: &Row,
    ) -> Option<(IncludeDirection, &EntityDescriptor, Vec<&'t Row>)> {
        let rel = entity.relation(relation)?;
        let related = self.model.entity(&rel.related)?;
        let key = row.get(&rel.our_key_column).filter(|v| !v.is_null());
        let mut matches: Vec<&Row> = match key {
            Some(key) => Self::visible(tables, related)
                .filter(|r| r.get(&rel.their_key_column).is_some_and(|v| loose_eq(v, key)))
                .collect(),
            None => Vec::new(),
        };
        matches.sort_by(|a, b| compare_values(a.get(&related.primary_key), b.get(&related.primary_key)));
        Some((rel.direction, related, matches))
    }

    fn attach(
        &self,
        tables: &Tables,
        entity: &EntityDescriptor,
        row: &mut Row,
        includes: &[IncludeNode],
        counts: &[String],
    ) {
        for node in includes {
            let Some((direction, related, matches)) = self.related_rows(tables, entity, &node.relation, row) else {
                continue;
            };
            let mut loaded: Vec<Value> = matches
                .into_iter()
                .map(|r| {
                    let mut r = r.clone();
                    self.attach(tables, related, &mut r, &node.children, &[]);
                    Value::Object(r)
                })
                .collect();
            let value = match direction {
                IncludeDirection::ToMany => Value::Array(loaded),
                IncludeDirection::ToOne if loaded.is_empty() => Value::Null,
                IncludeDirection::ToOne => loaded.swap_remove(0),
            };
            row.insert(node.relation.clone(), value);
        }
        for name in counts {
            if let Some((_, _, matches)) = self.related_rows(tables, entity, name, row) {
                row.insert(format!("{}_count", name), Value::from(matches.len() as u64));
            }
        }
    }

    fn find_index(tables: &Tables, entity: &EntityDescriptor, id: &str) -> Option<usize> {
        tables.rows.get(&entity.name)?.iter().position(|row| {
            !is_deleted(row, entity.deleted_at.as_deref())
                && row.get(&entity.primary_key).is_some_and(|v| matches_scalar(v, id))
        })
    }
}

fn now() -> Value {
    Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false))
}

fn is_deleted(row: &Row, deleted_at: Option<&str>) -> bool {
    deleted_at
        .and_then(|col| row.get(col))
        .is_some_and(|v| !v.is_null())
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(s), other) | (other, Value::String(s)) => matches_scalar(other, s),
        _ => a == b,
    }
}

/// Compare a stored value against a raw request string, coercing to the stored value's type.
fn compare_scalar(v: &Value, raw: &str) -> Option<Ordering> {
    match v {
        Value::Null => None,
        Value::Number(n) => n.as_f64()?.partial_cmp(&raw.trim().parse::<f64>().ok()?),
        Value::Bool(b) => {
            let other = match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "t" => true,
                "false" | "0" | "f" => false,
                _ => return None,
            };
            Some(b.cmp(&other))
        }
        Value::String(s) => Some(s.as_str().cmp(raw)),
        other => Some(other.to_string().as_str().cmp(raw)),
    }
}

fn matches_scalar(v: &Value, raw: &str) -> bool {
    compare_scalar(v, raw) == Some(Ordering::Equal)
}

fn as_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// SQL LIKE: `%` any run, `_` any single char, case-sensitive, anchored.
fn like_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

static NULL: Value = Value::Null;

fn matches_clause(row: &Row, clause: &FilterClause) -> bool {
    let v = row.get(&clause.field).unwrap_or(&NULL);
    match (clause.comparison, &clause.value) {
        (Comparison::IsNull, _) => v.is_null(),
        (Comparison::IsNotNull, _) => !v.is_null(),
        (Comparison::Like, FilterValue::Scalar(pattern)) => match (as_text(v), like_regex(pattern)) {
            (Some(text), Some(re)) => re.is_match(&text),
            _ => false,
        },
        (Comparison::In, FilterValue::List(items)) => items.iter().any(|i| matches_scalar(v, i)),
        (Comparison::NotIn, FilterValue::List(items)) => !v.is_null() && !items.iter().any(|i| matches_scalar(v, i)),
        (cmp, FilterValue::Scalar(raw)) => {
            let Some(ord) = compare_scalar(v, raw) else { return false };
            match cmp {
                Comparison::Eq => ord == Ordering::Equal,
                Comparison::Ne => ord != Ordering::Equal,
                Comparison::Gt => ord == Ordering::Greater,
                Comparison::Lt => ord == Ordering::Less,
                Comparison::Gte => ord != Ordering::Less,
                Comparison::Lte => ord != Ordering::Greater,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Nulls sort last ascending, like PostgreSQL.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

fn generate_key(tables: &mut Tables, entity: &EntityDescriptor) -> Value {
    match entity.pk_type {
        PkType::BigInt | PkType::Int => {
            let next = tables.next_id.entry(entity.name.clone()).or_insert(1);
            let id = *next;
            *next += 1;
            Value::from(id)
        }
        PkType::Uuid | PkType::Text => Value::String(uuid::Uuid::new_v4().to_string()),
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch(&self, entity: &EntityDescriptor, query: &AbstractQuery) -> Result<Vec<Row>, AppError> {
        let tables = self.read()?;
        let includes = query.include_tree();
        let mut rows: Vec<Row> = Self::visible(&tables, entity)
            .filter(|row| query.filters.iter().all(|f| matches_clause(row, f)))
            .cloned()
            .collect();
        for row in rows.iter_mut() {
            self.attach(&tables, entity, row, &[], &query.counts);
        }
        rows.sort_by(|a, b| {
            if query.sorts.is_empty() {
                return compare_values(a.get(&entity.primary_key), b.get(&entity.primary_key));
            }
            query.sorts.iter().fold(Ordering::Equal, |acc, s| {
                acc.then_with(|| {
                    let ord = compare_values(a.get(&s.field), b.get(&s.field));
                    match s.direction {
                        SortDirection::Asc => ord,
                        SortDirection::Desc => ord.reverse(),
                    }
                })
            })
        });
        if let Some(w) = query.window {
            rows = rows
                .into_iter()
                .skip(w.offset as usize)
                .take(w.limit as usize)
                .collect();
        }
        for row in rows.iter_mut() {
            self.attach(&tables, entity, row, &includes, &[]);
        }
        Ok(rows)
    }

    async fn count(&self, entity: &EntityDescriptor, query: &AbstractQuery) -> Result<u64, AppError> {
        let tables = self.read()?;
        let n = Self::visible(&tables, entity)
            .filter(|row| query.filters.iter().all(|f| matches_clause(row, f)))
            .count();
        Ok(n as u64)
    }

    async fn insert(&self, entity: &EntityDescriptor, values: &Map<String, Value>) -> Result<Row, AppError> {
        let mut tables = self.write()?;
        let mut row = Row::new();
        let key = match values.get(&entity.primary_key) {
            Some(v) if !v.is_null() => v.clone(),
            _ => generate_key(&mut tables, entity),
        };
        row.insert(entity.primary_key.clone(), key);
        for column in &entity.fillable {
            row.insert(column.clone(), values.get(column).cloned().unwrap_or(Value::Null));
        }
        for (column, v) in values {
            row.entry(column.clone()).or_insert_with(|| v.clone());
        }
        for ts in [&entity.created_at, &entity.updated_at].into_iter().flatten() {
            if !values.contains_key(ts) {
                row.insert(ts.clone(), now());
            }
        }
        if let Some(col) = &entity.deleted_at {
            row.insert(col.clone(), Value::Null);
        }
        tables.rows.entry(entity.name.clone()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        entity: &EntityDescriptor,
        id: &str,
        values: &Map<String, Value>,
    ) -> Result<Option<Row>, AppError> {
        let mut tables = self.write()?;
        let Some(idx) = Self::find_index(&tables, entity, id) else { return Ok(None) };
        let Some(row) = tables.rows.get_mut(&entity.name).and_then(|rows| rows.get_mut(idx)) else {
            return Ok(None);
        };
        for (column, v) in values {
            if *column != entity.primary_key {
                row.insert(column.clone(), v.clone());
            }
        }
        if let Some(ts) = &entity.updated_at {
            if !values.contains_key(ts) {
                row.insert(ts.clone(), now());
            }
        }
        Ok(Some(row.clone()))
    }

    async fn delete(&self, entity: &EntityDescriptor, id: &str) -> Result<Option<Row>, AppError> {
        let mut tables = self.write()?;
        let Some(idx) = Self::find_index(&tables, entity, id) else { return Ok(None) };
        let Some(rows) = tables.rows.get_mut(&entity.name) else { return Ok(None) };
        match &entity.deleted_at {
            Some(col) => {
                rows[idx].insert(col.clone(), now());
                Ok(Some(rows[idx].clone()))
            }
            None => Ok(Some(rows.remove(idx))),
        }
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.read().map(|_| ())
    }
}
