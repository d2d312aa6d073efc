//! The resource action set: list, search, count, read, create, update, delete, options.

use super::Registry;
use crate::config::{EntityDescriptor, Operation, PkType, ResolvedModel};
use crate::error::AppError;
use crate::query::{AbstractQuery, PageRequest, QueryTranslator, RequestParams, SortDirection};
use crate::response::{
    CountBody, Deleted, Listing, MetaCount, PageMeta, Paginated, SelectOption, SuccessMany, SuccessOne,
};
use crate::store::{Row, Store};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Generic CRUD over every configured entity. Cheap to clone.
#[derive(Clone)]
pub struct ResourceService {
    store: Arc<dyn Store>,
    model: Arc<ResolvedModel>,
    registry: Arc<Registry>,
}

impl ResourceService {
    pub fn new(store: Arc<dyn Store>, model: Arc<ResolvedModel>, registry: Registry) -> Self {
        ResourceService {
            store,
            model,
            registry: Arc::new(registry),
        }
    }

    pub fn model(&self) -> &ResolvedModel {
        &self.model
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Unknown resource is 404; a configured resource with the action disabled is 405.
    fn entity(&self, resource: &str, op: Operation) -> Result<&EntityDescriptor, AppError> {
        let entity = self.model.entity(resource).ok_or(AppError::NotFound)?;
        if !entity.allows(op) {
            return Err(AppError::NotAllowed(op.as_str()));
        }
        Ok(entity)
    }

    fn translator<'a>(&'a self, entity: &'a EntityDescriptor) -> QueryTranslator<'a> {
        QueryTranslator::new(&self.model, entity)
    }

    fn shape(&self, entity: &EntityDescriptor, row: Row) -> Value {
        self.registry.transformer(&entity.name).transform(&self.model, entity, row)
    }

    fn shape_all(&self, entity: &EntityDescriptor, rows: Vec<Row>) -> Vec<Value> {
        self.registry
            .transformer(&entity.name)
            .transform_collection(&self.model, entity, rows)
    }

    pub async fn list(&self, resource: &str, params: &RequestParams) -> Result<Listing<Value>, AppError> {
        let entity = self.entity(resource, Operation::List)?;
        self.collect(entity, params, true).await
    }

    /// Same pipeline as `list`, but always paginated.
    pub async fn search(&self, resource: &str, params: &RequestParams) -> Result<Listing<Value>, AppError> {
        let entity = self.entity(resource, Operation::Search)?;
        self.collect(entity, params, false).await
    }

    async fn collect(
        &self,
        entity: &EntityDescriptor,
        params: &RequestParams,
        allow_all: bool,
    ) -> Result<Listing<Value>, AppError> {
        let query = self.translator(entity).search(params);
        match PageRequest::from_params(params, allow_all) {
            PageRequest::All => {
                let rows = self.store.fetch(entity, &query).await?;
                let count = rows.len() as u64;
                Ok(Listing::All(SuccessMany {
                    data: self.shape_all(entity, rows),
                    meta: MetaCount { count },
                }))
            }
            page @ PageRequest::Page { page: current, per_page } => {
                let total = self.store.count(entity, &query).await?;
                let rows = self.store.fetch(entity, &query.window(page.window())).await?;
                let meta = PageMeta::new(current, per_page, total, rows.len());
                Ok(Listing::Page(Paginated {
                    data: self.shape_all(entity, rows),
                    meta,
                }))
            }
        }
    }

    /// Filters only; pagination, sort and include parameters are ignored.
    pub async fn count(&self, resource: &str, params: &RequestParams) -> Result<CountBody, AppError> {
        let entity = self.entity(resource, Operation::Count)?;
        let query = self.translator(entity).count(params);
        let count = self.store.count(entity, &query).await?;
        Ok(CountBody { count })
    }

    pub async fn read(&self, resource: &str, id: &str, params: &RequestParams) -> Result<SuccessOne<Value>, AppError> {
        let entity = self.entity(resource, Operation::Read)?;
        let key = parse_key(entity, id)?;
        let row = self.find(entity, &key, params).await?.ok_or(AppError::NotFound)?;
        Ok(SuccessOne {
            data: self.shape(entity, row),
        })
    }

    pub async fn create(&self, resource: &str, body: Value, params: &RequestParams) -> Result<SuccessOne<Value>, AppError> {
        let entity = self.entity(resource, Operation::Create)?;
        let body = into_object(body)?;
        self.validate(entity, &body)?;
        let values = assignable(entity, &body);
        let inserted = self.store.insert(entity, &values).await?;
        tracing::info!(resource = %entity.name, "resource created");

        let key = inserted.get(&entity.primary_key).and_then(key_string);
        let row = match key {
            Some(key) => self.find(entity, &key, params).await?.unwrap_or(inserted),
            None => inserted,
        };
        Ok(SuccessOne {
            data: self.shape(entity, row),
        })
    }

    /// PUT and PATCH. Read-modify-write without locking; a concurrent update to the same row may be lost.
    pub async fn update(
        &self,
        resource: &str,
        id: &str,
        body: Value,
        params: &RequestParams,
    ) -> Result<SuccessOne<Value>, AppError> {
        let entity = self.entity(resource, Operation::Update)?;
        let key = parse_key(entity, id)?;
        let body = into_object(body)?;
        self.validate(entity, &body)?;
        let existing = self
            .find(entity, &key, &RequestParams::new())
            .await?
            .ok_or(AppError::NotFound)?;

        let values = assignable(entity, &body);
        let persisted = self
            .store
            .update(entity, &key, &values)
            .await?
            .ok_or(AppError::NotFound)?;
        tracing::info!(resource = %entity.name, id = %key, "resource updated");

        let row = match self.find(entity, &key, params).await? {
            Some(row) => row,
            None if !persisted.is_empty() => persisted,
            None => existing,
        };
        Ok(SuccessOne {
            data: self.shape(entity, row),
        })
    }

    pub async fn delete(&self, resource: &str, id: &str) -> Result<Deleted<Value>, AppError> {
        let entity = self.entity(resource, Operation::Delete)?;
        let key = parse_key(entity, id)?;
        let removed = self.store.delete(entity, &key).await?.ok_or(AppError::NotFound)?;
        tracing::info!(resource = %entity.name, id = %key, "resource deleted");
        Ok(Deleted::new(self.shape(entity, removed)))
    }

    /// `{value, label}` pairs ordered by label; rows with an empty label are skipped.
    pub async fn options(&self, resource: &str) -> Result<Vec<SelectOption>, AppError> {
        let entity = self.entity(resource, Operation::Options)?;
        let spec = entity.options.as_ref().ok_or(AppError::NotFound)?;
        let query = AbstractQuery::new().sort(spec.label.clone(), SortDirection::Asc);
        let rows = self.store.fetch(entity, &query).await?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                let label = row.remove(&spec.label).filter(is_present)?;
                let value = row.remove(&spec.key).unwrap_or(Value::Null);
                Some(SelectOption { value, label })
            })
            .collect())
    }

    async fn find(&self, entity: &EntityDescriptor, key: &str, params: &RequestParams) -> Result<Option<Row>, AppError> {
        let query = self.translator(entity).by_key(key, params);
        let mut rows = self.store.fetch(entity, &query).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }

    fn validate(&self, entity: &EntityDescriptor, body: &Map<String, Value>) -> Result<(), AppError> {
        self.registry
            .validator(&entity.name)
            .validate(entity, body)
            .map_err(AppError::Validation)
    }
}

fn into_object(body: Value) -> Result<Map<String, Value>, AppError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(AppError::Unprocessable("body must be a JSON object".into())),
    }
}

/// Mass assignment: only fillable columns reach the store.
fn assignable(entity: &EntityDescriptor, body: &Map<String, Value>) -> Map<String, Value> {
    body.iter()
        .filter(|(k, _)| entity.is_fillable(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// A key that cannot exist for this key type is simply not found.
fn parse_key(entity: &EntityDescriptor, id: &str) -> Result<String, AppError> {
    let id = id.trim();
    match entity.pk_type {
        PkType::Uuid => uuid::Uuid::parse_str(id)
            .map(|u| u.to_string())
            .map_err(|_| AppError::NotFound),
        PkType::BigInt => id.parse::<i64>().map(|n| n.to_string()).map_err(|_| AppError::NotFound),
        PkType::Int => id.parse::<i32>().map(|n| n.to_string()).map_err(|_| AppError::NotFound),
        PkType::Text if id.is_empty() => Err(AppError::NotFound),
        PkType::Text => Ok(id.to_string()),
    }
}

fn key_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn is_present(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Bool(b) => *b,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_from_str, resolve};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn service() -> ResourceService {
        let config = load_from_str(
            r#"{"entities":[
                {"name": "widgets", "fillable": ["name", "status"], "hidden": ["secret"],
                 "options": {"label": "name"}, "operations": ["list", "read", "create", "update", "options", "count"],
                 "validation": {"name": {"required": true}}},
                {"name": "tokens", "key_type": "uuid", "fillable": ["label"]},
                {"name": "slots", "key_type": "int", "fillable": ["label"]}
            ]}"#,
        )
        .unwrap();
        let model = Arc::new(resolve(&config).unwrap());
        let store = MemoryStore::new(model.clone());
        store
            .seed(
                "widgets",
                vec![
                    json!({"id": 1, "name": "bolt", "status": "active", "secret": "s"}),
                    json!({"id": 2, "name": "", "status": "active", "secret": "s"}),
                    json!({"id": 3, "name": "anchor", "status": "retired", "secret": "s"}),
                ],
            )
            .unwrap();
        ResourceService::new(Arc::new(store), model, Registry::new())
    }

    fn params(pairs: &[(&str, &str)]) -> RequestParams {
        pairs.iter().copied().collect()
    }

    #[tokio::test]
    async fn unknown_and_disabled_resources() {
        let svc = service();
        assert!(matches!(svc.list("gizmos", &params(&[])).await, Err(AppError::NotFound)));
        assert!(matches!(svc.delete("widgets", "1").await, Err(AppError::NotAllowed("delete"))));
    }

    #[tokio::test]
    async fn malformed_ids_are_not_found() {
        let svc = service();
        assert!(matches!(svc.read("widgets", "abc", &params(&[])).await, Err(AppError::NotFound)));
        assert!(matches!(svc.read("tokens", "42", &params(&[])).await, Err(AppError::NotFound)));
        assert!(matches!(svc.read("slots", "3000000000", &params(&[])).await, Err(AppError::NotFound)));
    }

    #[test]
    fn int_keys_must_fit_in_four_bytes() {
        let svc = service();
        let slots = svc.model().entity("slots").unwrap();
        assert_eq!(parse_key(slots, "2147483647").unwrap(), "2147483647");
        assert!(matches!(parse_key(slots, "2147483648"), Err(AppError::NotFound)));
        let widgets = svc.model().entity("widgets").unwrap();
        assert_eq!(parse_key(widgets, "2147483648").unwrap(), "2147483648");
    }

    #[tokio::test]
    async fn create_ignores_non_fillable_and_hides_secrets() {
        let svc = service();
        let created = svc
            .create("widgets", json!({"name": "nut", "secret": "x", "id": 99}), &params(&[]))
            .await
            .unwrap();
        assert_eq!(created.data["id"], json!(4));
        assert_eq!(created.data["name"], json!("nut"));
        assert!(created.data.get("secret").is_none());
    }

    #[tokio::test]
    async fn create_reports_validation_and_shape_errors() {
        let svc = service();
        match svc.create("widgets", json!({"status": "x"}), &params(&[])).await {
            Err(AppError::Validation(messages)) => assert_eq!(messages, vec!["name is required".to_string()]),
            other => panic!("unexpected {:?}", other.map(|r| r.data)),
        }
        assert!(matches!(
            svc.create("widgets", json!([1, 2]), &params(&[])).await,
            Err(AppError::Unprocessable(_))
        ));
    }

    #[tokio::test]
    async fn update_missing_row_creates_nothing() {
        let svc = service();
        let res = svc.update("widgets", "77", json!({"name": "x"}), &params(&[])).await;
        assert!(matches!(res, Err(AppError::NotFound)));
        let count = svc.count("widgets", &params(&[])).await.unwrap();
        assert_eq!(count.count, 3);
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let svc = service();
        let updated = svc
            .update("widgets", "1", json!({"name": "bolt2", "status": "retired"}), &params(&[]))
            .await
            .unwrap();
        assert_eq!(updated.data["status"], json!("retired"));
        let read = svc.read("widgets", "1", &params(&[])).await.unwrap();
        assert_eq!(read.data["name"], json!("bolt2"));
    }

    #[tokio::test]
    async fn options_sorted_by_label_without_blanks() {
        let svc = service();
        let options = svc.options("widgets").await.unwrap();
        assert_eq!(
            options,
            vec![
                SelectOption { value: json!(3), label: json!("anchor") },
                SelectOption { value: json!(1), label: json!("bolt") },
            ]
        );
    }

    #[tokio::test]
    async fn list_paginates_and_unbounded() {
        let svc = service();
        match svc.list("widgets", &params(&[("limit", "2"), ("page", "2")])).await.unwrap() {
            Listing::Page(p) => {
                assert_eq!(p.data.len(), 1);
                assert_eq!(p.meta.total, 3);
                assert_eq!(p.meta.last_page, 2);
                assert_eq!(p.meta.from, Some(3));
            }
            Listing::All(_) => panic!("expected a page"),
        }
        match svc.list("widgets", &params(&[("limit", "max"), ("status", "active")])).await.unwrap() {
            Listing::All(all) => assert_eq!(all.meta.count, 2),
            Listing::Page(_) => panic!("expected the full set"),
        }
    }
}
