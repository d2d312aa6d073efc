//! Per-entity transformer and validator lookup.

use super::{DefaultTransformer, RuleValidator, Transformer, Validator};
use std::collections::HashMap;
use std::sync::Arc;

/// Entities without an explicit registration use `DefaultTransformer` and `RuleValidator`.
#[derive(Clone)]
pub struct Registry {
    default_transformer: Arc<dyn Transformer>,
    default_validator: Arc<dyn Validator>,
    transformers: HashMap<String, Arc<dyn Transformer>>,
    validators: HashMap<String, Arc<dyn Validator>>,
}

impl Default for Registry {
    fn default() -> Self {
        Registry {
            default_transformer: Arc::new(DefaultTransformer),
            default_validator: Arc::new(RuleValidator),
            transformers: HashMap::new(),
            validators: HashMap::new(),
        }
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_transformer(mut self, entity: impl Into<String>, transformer: impl Transformer + 'static) -> Self {
        self.transformers.insert(entity.into(), Arc::new(transformer));
        self
    }

    pub fn with_validator(mut self, entity: impl Into<String>, validator: impl Validator + 'static) -> Self {
        self.validators.insert(entity.into(), Arc::new(validator));
        self
    }

    /// Replace the fallback transformer for every unregistered entity.
    pub fn with_default_transformer(mut self, transformer: impl Transformer + 'static) -> Self {
        self.default_transformer = Arc::new(transformer);
        self
    }

    pub fn transformer(&self, entity: &str) -> &dyn Transformer {
        self.transformers
            .get(entity)
            .unwrap_or(&self.default_transformer)
            .as_ref()
    }

    pub fn validator(&self, entity: &str) -> &dyn Validator {
        self.validators.get(entity).unwrap_or(&self.default_validator).as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EntityDescriptor;
    use serde_json::{Map, Value};

    struct RejectAll;

    impl Validator for RejectAll {
        fn validate(&self, _: &EntityDescriptor, _: &Map<String, Value>) -> Result<(), Vec<String>> {
            Err(vec!["no".into()])
        }
    }

    #[test]
    fn registered_validator_wins_for_its_entity_only() {
        let registry = Registry::new().with_validator("widgets", RejectAll);
        let entity = crate::config::resolve(
            &crate::config::load_from_str(r#"{"entities":[{"name":"widgets"},{"name":"gadgets"}]}"#).unwrap(),
        )
        .unwrap();
        let widgets = entity.entity("widgets").unwrap();
        let gadgets = entity.entity("gadgets").unwrap();
        assert!(registry.validator("widgets").validate(widgets, &Map::new()).is_err());
        assert!(registry.validator("gadgets").validate(gadgets, &Map::new()).is_ok());
    }
}
