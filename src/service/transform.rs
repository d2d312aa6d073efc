//! Response shaping for stored rows.

use crate::case::value_keys_to_camel_case_recursive;
use crate::config::{EntityDescriptor, ResolvedModel};
use crate::store::Row;
use serde_json::Value;

pub trait Transformer: Send + Sync {
    fn transform(&self, model: &ResolvedModel, entity: &EntityDescriptor, row: Row) -> Value;

    fn transform_collection(&self, model: &ResolvedModel, entity: &EntityDescriptor, rows: Vec<Row>) -> Vec<Value> {
        rows.into_iter().map(|row| self.transform(model, entity, row)).collect()
    }
}

/// Strips hidden columns, including on eager-loaded related rows.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTransformer;

impl Transformer for DefaultTransformer {
    fn transform(&self, model: &ResolvedModel, entity: &EntityDescriptor, row: Row) -> Value {
        Value::Object(strip_hidden(model, entity, row))
    }
}

fn strip_hidden(model: &ResolvedModel, entity: &EntityDescriptor, mut row: Row) -> Row {
    row.retain(|k, _| !entity.hidden.contains(k));
    for rel in &entity.relations {
        let Some(related) = model.entity(&rel.related) else { continue };
        let Some(v) = row.get_mut(&rel.name) else { continue };
        match v {
            Value::Object(obj) => *obj = strip_hidden(model, related, std::mem::take(obj)),
            Value::Array(items) => {
                for item in items.iter_mut() {
                    if let Value::Object(obj) = item {
                        *obj = strip_hidden(model, related, std::mem::take(obj));
                    }
                }
            }
            _ => {}
        }
    }
    row
}

/// Default shaping, then camelCase keys at every depth.
#[derive(Clone, Copy, Debug, Default)]
pub struct CamelCaseTransformer;

impl Transformer for CamelCaseTransformer {
    fn transform(&self, model: &ResolvedModel, entity: &EntityDescriptor, row: Row) -> Value {
        let mut value = DefaultTransformer.transform(model, entity, row);
        value_keys_to_camel_case_recursive(&mut value);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_from_str, resolve};
    use serde_json::json;

    fn model() -> ResolvedModel {
        let config = load_from_str(
            r#"{"entities":[
                {"name": "users", "fillable": ["name"], "hidden": ["password"],
                 "relations": [{"name": "posts", "kind": "has_many", "entity": "posts", "foreign_key": "user_id"}]},
                {"name": "posts", "fillable": ["title"], "hidden": ["secret_note"],
                 "relations": [{"name": "author", "kind": "belongs_to", "entity": "users", "foreign_key": "user_id"}]}
            ]}"#,
        )
        .unwrap();
        resolve(&config).unwrap()
    }

    fn row(v: Value) -> Row {
        match v {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn hidden_columns_are_removed_at_every_depth() {
        let model = model();
        let users = model.entity("users").unwrap();
        let out = DefaultTransformer.transform(
            &model,
            users,
            row(json!({
                "id": 1, "name": "Ann", "password": "x",
                "posts": [{"id": 9, "title": "t", "secret_note": "s", "author": {"id": 1, "password": "x"}}]
            })),
        );
        assert_eq!(
            out,
            json!({"id": 1, "name": "Ann", "posts": [{"id": 9, "title": "t", "author": {"id": 1}}]})
        );
    }

    #[test]
    fn camel_case_keys() {
        let model = model();
        let posts = model.entity("posts").unwrap();
        let out = CamelCaseTransformer.transform(&model, posts, row(json!({"user_id": 1, "created_at": "now"})));
        assert_eq!(out, json!({"userId": 1, "createdAt": "now"}));
    }
}
