//! Per-entity set of filterable fields.
//!
//! Only assignable (fillable) fields, the primary key and the created/updated timestamps are
//! searchable. A column that exists in storage but is not declared fillable is never filterable.

use crate::config::EntityDescriptor;
use std::collections::HashSet;

#[derive(Clone, Debug)]
pub struct FieldAllowlist {
    searchable: HashSet<String>,
    timestamps: HashSet<String>,
}

impl FieldAllowlist {
    pub fn for_entity(entity: &EntityDescriptor) -> Self {
        let mut searchable: HashSet<String> = entity.fillable.iter().cloned().collect();
        searchable.insert(entity.primary_key.clone());
        searchable.extend(entity.created_at.iter().cloned());
        searchable.extend(entity.updated_at.iter().cloned());

        let mut timestamps = HashSet::new();
        timestamps.insert(entity.created_at.clone().unwrap_or_else(|| "created_at".into()));
        timestamps.insert(entity.updated_at.clone().unwrap_or_else(|| "updated_at".into()));
        timestamps.extend(entity.deleted_at.iter().cloned());

        FieldAllowlist { searchable, timestamps }
    }

    pub fn is_searchable(&self, field: &str) -> bool {
        self.searchable.contains(field)
    }

    pub fn is_timestamp_field(&self, field: &str) -> bool {
        self.timestamps.contains(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.searchable.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_from_str, resolve};

    fn entity(json: &str) -> EntityDescriptor {
        let model = resolve(&load_from_str(json).unwrap()).unwrap();
        model.entities.into_iter().next().unwrap()
    }

    #[test]
    fn searchable_is_fillable_plus_key_and_timestamps() {
        let e = entity(r#"{"entities":[{"name":"users","fillable":["name","email"],"hidden":["password"]}]}"#);
        let allow = FieldAllowlist::for_entity(&e);
        for f in ["name", "email", "id", "created_at", "updated_at"] {
            assert!(allow.is_searchable(f), "{f} should be searchable");
        }
        assert!(!allow.is_searchable("password"));
        assert!(!allow.is_searchable("name_like"));
    }

    #[test]
    fn disabled_timestamps_are_not_searchable() {
        let e = entity(r#"{"entities":[{"name":"tags","fillable":["label"],"timestamps":false}]}"#);
        let allow = FieldAllowlist::for_entity(&e);
        assert!(!allow.is_searchable("created_at"));
        assert!(allow.is_timestamp_field("created_at"));
    }

    #[test]
    fn soft_delete_column_is_a_timestamp_field() {
        let e = entity(
            r#"{"entities":[{"name":"posts","fillable":["title"],"timestamps":{"deleted_at":"removed_on"}}]}"#,
        );
        let allow = FieldAllowlist::for_entity(&e);
        assert!(allow.is_timestamp_field("removed_on"));
        assert!(allow.is_timestamp_field("updated_at"));
        assert!(!allow.is_timestamp_field("title"));
    }
}
