//! Translate untrusted request parameters into an `AbstractQuery`.
//!
//! Translation never fails. Anything that cannot be applied (unknown field, unknown operator,
//! unresolvable relation, empty value) is dropped and recorded in `AbstractQuery::ignored`.

use crate::case::{to_camel_case, to_snake_case};
use crate::config::{EntityDescriptor, RelationSpec, ResolvedModel};
use crate::query::operator::{self, OperatorDescriptor, EQUALS};
use crate::query::{AbstractQuery, FieldAllowlist, FilterClause, FilterValue, RequestParams, SortDirection, Window};
use std::collections::HashSet;

pub const DEFAULT_PAGE_SIZE: u64 = 30;
/// `limit=max` asks for the whole filtered set.
pub const UNBOUNDED_LIMIT: &str = "max";

const CONTAIN_KEYS: &[&str] = &["contain", "include"];
const COUNT_KEYS: &[&str] = &["count", "with_count"];
const RESERVED_KEYS: &[&str] = &["limit", "page", "sort", "contain", "include", "count", "with_count"];

/// Postgres takes LIMIT and OFFSET as bigint.
const MAX_ROWS: u64 = i64::MAX as u64;

/// Empty and non-numeric values never become predicates (`?name=` is not `name = ''`).
fn is_blank(value: &str) -> bool {
    value.is_empty()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageRequest {
    All,
    Page { page: u64, per_page: u64 },
}

impl PageRequest {
    /// `limit` (default 30, or `max` when `allow_all`) and 1-based `page`.
    pub fn from_params(params: &RequestParams, allow_all: bool) -> Self {
        let raw_limit = params.get("limit").map(str::trim);
        if allow_all && raw_limit.is_some_and(|l| l.eq_ignore_ascii_case(UNBOUNDED_LIMIT)) {
            return PageRequest::All;
        }
        let per_page = raw_limit
            .and_then(|l| l.parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_ROWS);
        let page = params
            .get("page")
            .and_then(|p| p.trim().parse::<u64>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1)
            .min(MAX_ROWS / per_page + 1);
        PageRequest::Page { page, per_page }
    }

    pub fn window(&self) -> Option<Window> {
        match *self {
            PageRequest::All => None,
            PageRequest::Page { page, per_page } => Some(Window {
                limit: per_page,
                offset: (page - 1).saturating_mul(per_page),
            }),
        }
    }
}

pub struct QueryTranslator<'a> {
    model: &'a ResolvedModel,
    entity: &'a EntityDescriptor,
    allowlist: FieldAllowlist,
}

impl<'a> QueryTranslator<'a> {
    pub fn new(model: &'a ResolvedModel, entity: &'a EntityDescriptor) -> Self {
        QueryTranslator {
            model,
            entity,
            allowlist: FieldAllowlist::for_entity(entity),
        }
    }

    pub fn allowlist(&self) -> &FieldAllowlist {
        &self.allowlist
    }

    /// Filters, includes, counts and sorts: the list/search pipeline (pagination is added by the caller).
    pub fn search(&self, params: &RequestParams) -> AbstractQuery {
        let q = self.filters(params, AbstractQuery::new());
        let q = self.includes(params, q);
        let q = self.counts(params, q);
        self.sorts(params, q)
    }

    /// Filters only; includes, sort and pagination parameters are not looked at.
    pub fn count(&self, params: &RequestParams) -> AbstractQuery {
        self.filters(params, AbstractQuery::new())
    }

    /// Primary-key lookup with includes, counts and sorts from the request.
    pub fn by_key(&self, id: &str, params: &RequestParams) -> AbstractQuery {
        let q = AbstractQuery::new().filter(FilterClause {
            field: self.entity.primary_key.clone(),
            comparison: EQUALS.comparison,
            value: FilterValue::Scalar(id.to_string()),
            qualified: false,
        });
        let q = self.includes(params, q);
        let q = self.counts(params, q);
        self.sorts(params, q)
    }

    /// Plain-name equality first, then suffix operators, then the `filters[...]` block; all AND-ed.
    pub fn filters(&self, params: &RequestParams, q: AbstractQuery) -> AbstractQuery {
        let mut used: HashSet<&str> = HashSet::new();
        let mut q = q;

        for (key, value) in params.iter() {
            if !self.allowlist.is_searchable(key) {
                continue;
            }
            used.insert(key);
            q = self.push(q, key, key, EQUALS, value);
        }

        for (key, value) in params.iter() {
            if used.contains(key) {
                continue;
            }
            let Some((field, op)) = operator::resolve_suffix(key, |f| self.allowlist.is_searchable(f)) else {
                continue;
            };
            used.insert(key);
            q = self.push(q, key, field, op, value);
        }

        q = self.named_filters(params, q);

        for (key, _) in params.iter() {
            if used.contains(key) || RESERVED_KEYS.contains(&key) || RequestParams::is_named_filter_key(key) {
                continue;
            }
            q = q.ignore(key, "not a searchable field");
        }
        q
    }

    fn named_filters(&self, params: &RequestParams, mut q: AbstractQuery) -> AbstractQuery {
        for (column, raw) in params.named_filters() {
            let param = format!("filters[{}]", column);
            if !self.allowlist.is_searchable(column) {
                q = q.ignore(param, "not a searchable field");
                continue;
            }
            let (op, value) = match raw.split_once(':') {
                Some((name, rest)) => match operator::by_name(name) {
                    Some(op) => (op, rest),
                    None => {
                        q = q.ignore(param, "unknown operator");
                        continue;
                    }
                },
                None => (EQUALS, raw),
            };
            q = self.push(q, &param, column, op, value);
        }
        q
    }

    fn push(
        &self,
        q: AbstractQuery,
        param: &str,
        field: &str,
        op: &'static OperatorDescriptor,
        value: &str,
    ) -> AbstractQuery {
        if is_blank(value) {
            return q.ignore(param, "empty value");
        }
        match self.clause(field, op, value) {
            Some(clause) => q.filter(clause),
            None => q.ignore(param, "no usable value"),
        }
    }

    fn clause(&self, field: &str, op: &'static OperatorDescriptor, value: &str) -> Option<FilterClause> {
        Some(FilterClause {
            field: field.to_string(),
            comparison: op.comparison,
            value: op.render(value)?,
            qualified: self.allowlist.is_timestamp_field(field),
        })
    }

    /// `contain` (or `include`): comma list of relation names or dotted paths.
    pub fn includes(&self, params: &RequestParams, mut q: AbstractQuery) -> AbstractQuery {
        let Some(raw) = params.first_of(CONTAIN_KEYS) else { return q };
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match self.resolve_path(name) {
                Some(path) => q = q.include(path),
                None => q = q.ignore(format!("contain={}", name), "unknown relation"),
            }
        }
        q
    }

    /// `count` (or `with_count`): comma list of relation names to count.
    pub fn counts(&self, params: &RequestParams, mut q: AbstractQuery) -> AbstractQuery {
        let Some(raw) = params.first_of(COUNT_KEYS) else { return q };
        for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match resolve_relation(self.entity, name) {
                Some(rel) => q = q.count(rel.name.clone()),
                None => q = q.ignore(format!("count={}", name), "unknown relation"),
            }
        }
        q
    }

    /// `sort=latest|oldest` or `sort=field[:asc|desc],...`. Fields are passed through unchecked.
    pub fn sorts(&self, params: &RequestParams, mut q: AbstractQuery) -> AbstractQuery {
        let Some(raw) = params.get("sort") else { return q };
        for directive in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let keyword = directive.to_lowercase();
            if keyword == "latest" || keyword == "oldest" {
                let direction = if keyword == "latest" {
                    SortDirection::Desc
                } else {
                    SortDirection::Asc
                };
                match &self.entity.created_at {
                    Some(column) => q = q.sort(column.clone(), direction),
                    None => q = q.ignore(format!("sort={}", directive), "no timestamp column"),
                }
                continue;
            }
            let (field, direction) = match directive.split_once(':') {
                Some((field, dir)) => (field.trim(), SortDirection::parse(dir)),
                None => (directive, Some(SortDirection::Asc)),
            };
            match direction {
                Some(direction) if !field.is_empty() => q = q.sort(field, direction),
                _ => q = q.ignore(format!("sort={}", directive), "invalid sort directive"),
            }
        }
        q
    }

    /// Resolve `a.b.c` segment by segment through the relation graph.
    fn resolve_path(&self, name: &str) -> Option<Vec<String>> {
        let mut entity = self.entity;
        let mut path = Vec::new();
        for segment in name.split('.') {
            let rel = resolve_relation(entity, segment)?;
            path.push(rel.name.clone());
            entity = self.model.entity(&rel.related)?;
        }
        Some(path)
    }
}

/// Relation by literal name, then camelCase, then snake_case.
pub fn resolve_relation<'e>(entity: &'e EntityDescriptor, name: &str) -> Option<&'e RelationSpec> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    entity
        .relation(name)
        .or_else(|| entity.relation(&to_camel_case(name)))
        .or_else(|| entity.relation(&to_snake_case(name)))
}
