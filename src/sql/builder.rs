//! Renders an `AbstractQuery` and write operations as parameterized PostgreSQL.
//!
//! Identifiers come only from the resolved config or the introspected catalog and are always
//! quoted. Values are always bound. Rows come back as a single jsonb column built with
//! `to_jsonb`, with included relations and counts merged in via `jsonb_build_object`.

use crate::config::{EntityDescriptor, IncludeDirection, RelationSpec, ResolvedModel};
use crate::query::{AbstractQuery, Comparison, FilterClause, FilterValue, IncludeNode};
use crate::sql::PgBindValue;
use serde_json::{Map, Value};
use std::collections::HashMap;

const MAIN_ALIAS: &str = "main";
const COUNT_SUFFIX: &str = "_count";

/// Column types read from `information_schema`, by entity name then column name.
pub type Catalog = HashMap<String, HashMap<String, String>>;

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

fn qualified_table(entity: &EntityDescriptor) -> String {
    format!("{}.{}", quoted(&entity.schema_name), quoted(&entity.table_name))
}

fn column_of(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, quoted(column))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, v: PgBindValue) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

pub struct SqlBuilder<'a> {
    model: &'a ResolvedModel,
    catalog: &'a Catalog,
}

impl<'a> SqlBuilder<'a> {
    pub fn new(model: &'a ResolvedModel, catalog: &'a Catalog) -> Self {
        SqlBuilder { model, catalog }
    }

    /// Declared type first, then the introspected one.
    fn column_type<'e>(&'e self, entity: &'e EntityDescriptor, column: &str) -> Option<&'e str> {
        entity.column_type(column).or_else(|| {
            self.catalog
                .get(&entity.name)
                .and_then(|cols| cols.get(column))
                .map(String::as_str)
        })
    }

    fn is_known_column(&self, entity: &EntityDescriptor, column: &str) -> bool {
        entity.known_columns().contains(column)
            || self.catalog.get(&entity.name).is_some_and(|cols| cols.contains_key(column))
    }

    fn placeholder(&self, q: &mut QueryBuf, entity: &EntityDescriptor, column: &str, v: PgBindValue) -> String {
        let n = q.push_param(v);
        match self.column_type(entity, column) {
            Some(t) => format!("${}::{}", n, t),
            None => format!("${}", n),
        }
    }

    fn soft_delete_guard(entity: &EntityDescriptor, alias: &str) -> Option<String> {
        entity
            .deleted_at
            .as_ref()
            .map(|col| format!("{} IS NULL", column_of(alias, col)))
    }

    /// `SELECT <row json> AS row FROM ... WHERE ... ORDER BY ... LIMIT ... OFFSET ...`
    pub fn select(&self, entity: &EntityDescriptor, query: &AbstractQuery) -> QueryBuf {
        let mut q = QueryBuf::new();
        let row = self.row_expr(entity, MAIN_ALIAS, &query.include_tree(), &query.counts, 0);
        let where_clause = self.where_clause(&mut q, entity, &query.filters);
        let order_clause = self.order_clause(entity, query);
        let window = query
            .window
            .map(|w| format!(" LIMIT {} OFFSET {}", w.limit, w.offset))
            .unwrap_or_default();
        q.sql = format!(
            "SELECT {} AS row FROM {} {}{}{}{}",
            row,
            qualified_table(entity),
            MAIN_ALIAS,
            where_clause,
            order_clause,
            window
        );
        q
    }

    /// Filters only; includes, counts, sorts and window do not affect the total.
    pub fn count(&self, entity: &EntityDescriptor, query: &AbstractQuery) -> QueryBuf {
        let mut q = QueryBuf::new();
        let where_clause = self.where_clause(&mut q, entity, &query.filters);
        q.sql = format!(
            "SELECT COUNT(*) FROM {} {}{}",
            qualified_table(entity),
            MAIN_ALIAS,
            where_clause
        );
        q
    }

    fn row_expr(
        &self,
        entity: &EntityDescriptor,
        alias: &str,
        includes: &[IncludeNode],
        counts: &[String],
        depth: usize,
    ) -> String {
        let base = format!("to_jsonb({})", alias);
        let mut extras = Vec::new();
        for (i, node) in includes.iter().enumerate() {
            let Some(rel) = entity.relation(&node.relation) else { continue };
            let Some(related) = self.model.entity(&rel.related) else { continue };
            let child = format!("r{}_{}", depth, i);
            let inner = self.row_expr(related, &child, &node.children, &[], depth + 1);
            let from = self.related_from(rel, related, alias, &child);
            let sub = match rel.direction {
                IncludeDirection::ToMany => format!(
                    "(SELECT COALESCE(jsonb_agg({} ORDER BY {}), '[]'::jsonb) FROM {})",
                    inner,
                    column_of(&child, &related.primary_key),
                    from
                ),
                IncludeDirection::ToOne => format!("(SELECT {} FROM {} LIMIT 1)", inner, from),
            };
            extras.push(format!("{}, {}", literal(&rel.name), sub));
        }
        for name in counts {
            let Some(rel) = entity.relation(name) else { continue };
            let Some(expr) = self.count_expr(rel, alias, depth) else { continue };
            extras.push(format!("{}, {}", literal(&format!("{}{}", rel.name, COUNT_SUFFIX)), expr));
        }
        if extras.is_empty() {
            base
        } else {
            format!("({} || jsonb_build_object({}))", base, extras.join(", "))
        }
    }

    fn related_from(&self, rel: &RelationSpec, related: &EntityDescriptor, parent: &str, child: &str) -> String {
        let mut conds = vec![format!(
            "{} = {}",
            column_of(child, &rel.their_key_column),
            column_of(parent, &rel.our_key_column)
        )];
        conds.extend(Self::soft_delete_guard(related, child));
        format!("{} {} WHERE {}", qualified_table(related), child, conds.join(" AND "))
    }

    fn count_expr(&self, rel: &RelationSpec, alias: &str, depth: usize) -> Option<String> {
        let related = self.model.entity(&rel.related)?;
        let child = format!("c{}", depth);
        Some(format!(
            "(SELECT COUNT(*) FROM {})",
            self.related_from(rel, related, alias, &child)
        ))
    }

    fn where_clause(&self, q: &mut QueryBuf, entity: &EntityDescriptor, filters: &[FilterClause]) -> String {
        let mut parts: Vec<String> = filters
            .iter()
            .filter_map(|f| self.predicate(q, entity, f))
            .collect();
        parts.extend(Self::soft_delete_guard(entity, MAIN_ALIAS));
        if parts.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", parts.join(" AND "))
        }
    }

    fn predicate(&self, q: &mut QueryBuf, entity: &EntityDescriptor, f: &FilterClause) -> Option<String> {
        let col = if f.qualified {
            column_of(MAIN_ALIAS, &f.field)
        } else {
            quoted(&f.field)
        };
        let sql = match (f.comparison, &f.value) {
            (Comparison::IsNull | Comparison::IsNotNull, _) => {
                format!("{} {}", col, f.comparison.sql_operator())
            }
            (Comparison::Like, FilterValue::Scalar(v)) => {
                let n = q.push_param(PgBindValue::text(v.as_str()));
                format!("{}::text LIKE ${}", col, n)
            }
            (Comparison::In | Comparison::NotIn, FilterValue::List(items)) => {
                let phs: Vec<String> = items
                    .iter()
                    .map(|v| self.placeholder(q, entity, &f.field, PgBindValue::text(v.as_str())))
                    .collect();
                format!("{} {} ({})", col, f.comparison.sql_operator(), phs.join(", "))
            }
            (cmp, FilterValue::Scalar(v)) if !matches!(cmp, Comparison::In | Comparison::NotIn) => {
                let ph = self.placeholder(q, entity, &f.field, PgBindValue::text(v.as_str()));
                format!("{} {} {}", col, cmp.sql_operator(), ph)
            }
            _ => return None,
        };
        Some(sql)
    }

    /// Only known columns and requested `{relation}_count` aliases are sortable. Default: primary key.
    fn order_clause(&self, entity: &EntityDescriptor, query: &AbstractQuery) -> String {
        let mut parts = Vec::new();
        for s in &query.sorts {
            if self.is_known_column(entity, &s.field) {
                parts.push(format!("{} {}", column_of(MAIN_ALIAS, &s.field), s.direction.as_sql()));
                continue;
            }
            let counted = s
                .field
                .strip_suffix(COUNT_SUFFIX)
                .filter(|rel| query.counts.iter().any(|c| c == rel))
                .and_then(|rel| entity.relation(rel))
                .and_then(|rel| self.count_expr(rel, MAIN_ALIAS, 0));
            match counted {
                Some(expr) => parts.push(format!("{} {}", expr, s.direction.as_sql())),
                None => tracing::debug!(entity = %entity.name, field = %s.field, "sort on unknown column dropped"),
            }
        }
        if parts.is_empty() {
            parts.push(column_of(MAIN_ALIAS, &entity.primary_key));
        }
        format!(" ORDER BY {}", parts.join(", "))
    }

    /// INSERT of the given columns; created/updated timestamps are set to NOW() unless supplied.
    pub fn insert(&self, entity: &EntityDescriptor, values: &Map<String, Value>) -> QueryBuf {
        let mut q = QueryBuf::new();
        let mut cols = Vec::new();
        let mut phs = Vec::new();
        for (name, v) in values {
            cols.push(quoted(name));
            phs.push(self.placeholder(&mut q, entity, name, PgBindValue::from_json(v)));
        }
        for ts in [&entity.created_at, &entity.updated_at].into_iter().flatten() {
            if !values.contains_key(ts) {
                cols.push(quoted(ts));
                phs.push("NOW()".into());
            }
        }
        let table = qualified_table(entity);
        q.sql = if cols.is_empty() {
            format!("INSERT INTO {} AS {} DEFAULT VALUES RETURNING to_jsonb({})", table, MAIN_ALIAS, MAIN_ALIAS)
        } else {
            format!(
                "INSERT INTO {} AS {} ({}) VALUES ({}) RETURNING to_jsonb({})",
                table,
                MAIN_ALIAS,
                cols.join(", "),
                phs.join(", "),
                MAIN_ALIAS
            )
        };
        q
    }

    /// UPDATE by primary key: SET the given columns and bump the updated timestamp.
    pub fn update(&self, entity: &EntityDescriptor, id: &str, values: &Map<String, Value>) -> QueryBuf {
        let mut q = QueryBuf::new();
        let mut sets = Vec::new();
        for (name, v) in values {
            if *name == entity.primary_key {
                continue;
            }
            let ph = self.placeholder(&mut q, entity, name, PgBindValue::from_json(v));
            sets.push(format!("{} = {}", quoted(name), ph));
        }
        if let Some(ts) = &entity.updated_at {
            if !values.contains_key(ts) {
                sets.push(format!("{} = NOW()", quoted(ts)));
            }
        }
        let key = self.key_condition(&mut q, entity, id);
        let table = qualified_table(entity);
        q.sql = if sets.is_empty() {
            format!("SELECT to_jsonb({}) FROM {} {} WHERE {}", MAIN_ALIAS, table, MAIN_ALIAS, key)
        } else {
            format!(
                "UPDATE {} AS {} SET {} WHERE {} RETURNING to_jsonb({})",
                table,
                MAIN_ALIAS,
                sets.join(", "),
                key,
                MAIN_ALIAS
            )
        };
        q
    }

    /// Soft delete (stamp `deleted_at`) when configured, otherwise DELETE.
    pub fn delete(&self, entity: &EntityDescriptor, id: &str) -> QueryBuf {
        let mut q = QueryBuf::new();
        let key = self.key_condition(&mut q, entity, id);
        let table = qualified_table(entity);
        q.sql = match &entity.deleted_at {
            Some(col) => format!(
                "UPDATE {} AS {} SET {} = NOW() WHERE {} RETURNING to_jsonb({})",
                table,
                MAIN_ALIAS,
                quoted(col),
                key,
                MAIN_ALIAS
            ),
            None => format!(
                "DELETE FROM {} AS {} WHERE {} RETURNING to_jsonb({})",
                table, MAIN_ALIAS, key, MAIN_ALIAS
            ),
        };
        q
    }

    fn key_condition(&self, q: &mut QueryBuf, entity: &EntityDescriptor, id: &str) -> String {
        let ph = self.placeholder(q, entity, &entity.primary_key, PgBindValue::text(id));
        let mut conds = vec![format!("{} = {}", column_of(MAIN_ALIAS, &entity.primary_key), ph)];
        conds.extend(Self::soft_delete_guard(entity, MAIN_ALIAS));
        conds.join(" AND ")
    }
}
