//! Config validation: referential integrity between entities and their relations.

use crate::config::FullConfig;
use crate::error::ConfigError;
use regex::Regex;
use std::collections::{HashMap, HashSet};

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for e in &config.entities {
        if e.name.trim().is_empty() {
            return Err(ConfigError::Validation("entity name must not be empty".into()));
        }
        if !names.insert(e.name.as_str()) {
            return Err(ConfigError::DuplicateEntity(e.name.clone()));
        }
    }
    let pk_by_name: HashMap<&str, &str> = config
        .entities
        .iter()
        .map(|e| (e.name.as_str(), e.primary_key.as_str()))
        .collect();

    for e in &config.entities {
        if e.primary_key.trim().is_empty() {
            return Err(ConfigError::InvalidPrimaryKey {
                entity: e.name.clone(),
                column: e.primary_key.clone(),
            });
        }

        let mut relation_names = HashSet::new();
        for rel in &e.relations {
            if !relation_names.insert(rel.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "entity {}: duplicate relation {}",
                    e.name, rel.name
                )));
            }
            if !pk_by_name.contains_key(rel.entity.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "entity",
                    id: format!("{} (relation {}.{})", rel.entity, e.name, rel.name),
                });
            }
            if rel.foreign_key.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "entity {}: relation {} needs a foreign_key",
                    e.name, rel.name
                )));
            }
        }

        if let Some(options) = &e.options {
            let label_known = e.fillable.contains(&options.label)
                || e.columns.contains_key(&options.label)
                || options.label == e.primary_key;
            if !label_known {
                return Err(ConfigError::Validation(format!(
                    "entity {}: options label {} is not a declared column",
                    e.name, options.label
                )));
            }
        }

        for (col, rule) in &e.validation {
            if let Some(pattern) = &rule.pattern {
                Regex::new(pattern).map_err(|err| {
                    ConfigError::Validation(format!("entity {}: invalid pattern for {}: {}", e.name, col, err))
                })?;
            }
        }
    }

    Ok(())
}
