use featx_core::{Error, FeatureLookup, Result, Schema};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::config::{EngineConfig, ServingOptions};
use crate::executor::Transformation;
use crate::service::FeatureService;
use crate::source::{Entity, Source};
use crate::view::{FeatureView, FeatureViewBuilder, ViewSettings};

type NameMap<T> = RwLock<HashMap<String, Arc<T>, ahash::RandomState>>;

/// Declared entities, sources, feature views and feature services
///
/// Populated during configuration and only read while serving. Each kind
/// has its own namespace, so a passthrough view may share its source's name.
pub struct Registry {
    config: Arc<EngineConfig>,
    entities: NameMap<Entity>,
    sources: NameMap<Source>,
    views: NameMap<FeatureView>,
    services: NameMap<FeatureService>,
}

impl Registry {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
            entities: RwLock::new(HashMap::default()),
            sources: RwLock::new(HashMap::default()),
            views: RwLock::new(HashMap::default()),
            services: RwLock::new(HashMap::default()),
        })
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn serving_options(&self) -> ServingOptions {
        self.config.serving_options()
    }

    pub fn declare_entity(&self, entity: Entity) -> Result<Arc<Entity>> {
        if entity.join_keys.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "entity '{}' must declare at least one join key",
                entity.name
            )));
        }
        insert_unique(&self.entities, "entity", entity.name.clone(), entity)
    }

    pub fn declare_request_source(&self, name: impl Into<String>, schema: Schema) -> Result<Arc<Source>> {
        let name = name.into();
        insert_unique(&self.sources, "source", name.clone(), Source::request(name, schema))
    }

    /// Declare a source whose values are read from `lookup` by `join_keys`
    pub fn declare_precomputed_source(
        &self,
        name: impl Into<String>,
        schema: Schema,
        join_keys: Vec<String>,
        lookup: Arc<dyn FeatureLookup>,
    ) -> Result<Arc<Source>> {
        let name = name.into();
        if join_keys.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "precomputed source '{}' must declare at least one join key",
                name
            )));
        }
        let source = Source::precomputed(name.clone(), schema, join_keys, lookup);
        insert_unique(&self.sources, "source", name, source)
    }

    /// Declare a precomputed source keyed by an entity's join keys
    pub fn declare_entity_source(
        &self,
        name: impl Into<String>,
        schema: Schema,
        entity: &str,
        lookup: Arc<dyn FeatureLookup>,
    ) -> Result<Arc<Source>> {
        let name = name.into();
        let entity = self.entities.read().get(entity).cloned().ok_or_else(|| Error::MissingDependency {
            owner: format!("source '{}'", name),
            kind: "entity",
            name: entity.to_string(),
        })?;
        self.declare_precomputed_source(name, schema, entity.join_keys.clone(), lookup)
    }

    pub fn declare_feature_view(&self, builder: FeatureViewBuilder) -> Result<Arc<FeatureView>> {
        let FeatureViewBuilder {
            name,
            sources,
            output,
            transformation,
            passthrough,
            description,
            tags,
        } = builder;

        if sources.is_empty() {
            return Err(Error::NoSources(name));
        }

        let resolved = {
            let declared = self.sources.read();
            let mut resolved = Vec::with_capacity(sources.len());
            for source_name in &sources {
                if resolved.iter().any(|s: &Arc<Source>| s.name() == source_name) {
                    return Err(Error::DuplicateName {
                        kind: "view source",
                        name: source_name.clone(),
                    });
                }
                let source = declared.get(source_name).cloned().ok_or_else(|| Error::MissingDependency {
                    owner: format!("feature view '{}'", name),
                    kind: "source",
                    name: source_name.clone(),
                })?;
                resolved.push(source);
            }
            resolved
        };

        let (output, transformation) = if passthrough {
            if resolved.len() != 1 || resolved[0].is_request() {
                return Err(Error::InvalidConfig(format!(
                    "passthrough view '{}' needs exactly one precomputed source",
                    name
                )));
            }
            (resolved[0].schema().clone(), Transformation::passthrough())
        } else {
            let output = output.ok_or_else(|| {
                Error::InvalidConfig(format!("feature view '{}' has no output schema", name))
            })?;
            if output.is_empty() {
                return Err(Error::InvalidConfig(format!(
                    "feature view '{}' has an empty output schema",
                    name
                )));
            }
            let transformation = transformation.ok_or_else(|| {
                Error::InvalidConfig(format!("feature view '{}' has no transformation", name))
            })?;
            (Arc::new(output), transformation)
        };

        let settings = ViewSettings {
            extra_fields: self.config.extra_fields,
            timestamp_field: self.config.timestamp_field.clone(),
        };
        let view = FeatureView::new(
            name.clone(),
            description,
            tags,
            resolved,
            output,
            transformation,
            settings,
        );
        let view = insert_unique(&self.views, "feature view", name, view)?;
        info!(view = %view.name(), sources = view.sources().len(), "declared feature view");
        Ok(view)
    }

    /// Declare a service over already-declared views. Repeated view names
    /// are kept once, at their first position.
    pub fn declare_feature_service<S: AsRef<str>>(
        &self,
        name: impl Into<String>,
        view_names: &[S],
    ) -> Result<Arc<FeatureService>> {
        let name = name.into();
        let views = {
            let declared = self.views.read();
            let mut views: Vec<Arc<FeatureView>> = Vec::with_capacity(view_names.len());
            for view_name in view_names {
                let view_name = view_name.as_ref();
                if views.iter().any(|v| v.name() == view_name) {
                    continue;
                }
                let view = declared.get(view_name).cloned().ok_or_else(|| Error::MissingDependency {
                    owner: format!("feature service '{}'", name),
                    kind: "feature view",
                    name: view_name.to_string(),
                })?;
                views.push(view);
            }
            views
        };
        if views.is_empty() {
            return Err(Error::InvalidConfig(format!(
                "feature service '{}' must include at least one feature view",
                name
            )));
        }

        let service = FeatureService::new(
            name.clone(),
            views,
            self.config.extra_fields,
            self.config.timestamp_field.clone(),
        )?;
        let service = insert_unique(&self.services, "feature service", name, service)?;
        info!(service = %service.name(), views = service.views().len(), "declared feature service");
        Ok(service)
    }

    #[inline]
    pub fn get_entity(&self, name: &str) -> Option<Arc<Entity>> {
        self.entities.read().get(name).cloned()
    }

    #[inline]
    pub fn get_source(&self, name: &str) -> Option<Arc<Source>> {
        self.sources.read().get(name).cloned()
    }

    /// Schema of a precomputed source; `None` for request sources, which
    /// have no stored history
    pub fn precomputed_schema(&self, name: &str) -> Option<Arc<Schema>> {
        self.get_source(name)
            .filter(|s| !s.is_request())
            .map(|s| s.schema().clone())
    }

    #[inline]
    pub fn get_feature_view(&self, name: &str) -> Option<Arc<FeatureView>> {
        self.views.read().get(name).cloned()
    }

    #[inline]
    pub fn get_feature_service(&self, name: &str) -> Option<Arc<FeatureService>> {
        self.services.read().get(name).cloned()
    }

    /// Like [`get_feature_service`](Self::get_feature_service) but as an error
    pub fn feature_service(&self, name: &str) -> Result<Arc<FeatureService>> {
        self.get_feature_service(name)
            .ok_or_else(|| Error::NotFound(format!("feature service '{}'", name)))
    }

    pub fn feature_view(&self, name: &str) -> Result<Arc<FeatureView>> {
        self.get_feature_view(name)
            .ok_or_else(|| Error::NotFound(format!("feature view '{}'", name)))
    }

    #[must_use]
    pub fn list_sources(&self) -> Vec<String> {
        sorted_names(&self.sources)
    }

    #[must_use]
    pub fn list_feature_views(&self) -> Vec<String> {
        sorted_names(&self.views)
    }

    #[must_use]
    pub fn list_feature_services(&self) -> Vec<String> {
        sorted_names(&self.services)
    }
}

fn insert_unique<T>(map: &NameMap<T>, kind: &'static str, name: String, value: T) -> Result<Arc<T>> {
    let mut map = map.write();
    if map.contains_key(&name) {
        return Err(Error::DuplicateName { kind, name });
    }
    let value = Arc::new(value);
    map.insert(name, value.clone());
    Ok(value)
}

fn sorted_names<T>(map: &NameMap<T>) -> Vec<String> {
    let mut names: Vec<String> = map.read().keys().cloned().collect();
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use featx_core::{lookup_fn, FieldType, Row, Value};

    fn registry() -> Registry {
        Registry::new(EngineConfig::default()).unwrap()
    }

    fn amount_schema() -> Schema {
        Schema::from_pairs([("amount", FieldType::Float64)]).unwrap()
    }

    fn is_high(registry: &Registry) -> Result<Arc<FeatureView>> {
        registry.declare_feature_view(
            FeatureView::builder("transaction_amount_is_high")
                .source("transaction_request")
                .output(Schema::from_pairs([("transaction_amount_is_high", FieldType::Bool)]).unwrap())
                .transform(|inputs| {
                    let amount = inputs.require("transaction_request")?.get_f64("amount").unwrap_or(0.0);
                    let mut row = Row::new();
                    row.insert("transaction_amount_is_high".to_string(), Value::Bool(amount > 1000.0));
                    Ok(row)
                }),
        )
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let registry = registry();
        registry.declare_request_source("transaction_request", amount_schema()).unwrap();
        let err = registry
            .declare_request_source("transaction_request", amount_schema())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateName { kind: "source", .. }));
    }

    #[test]
    fn test_view_requires_sources() {
        let registry = registry();
        let err = registry
            .declare_feature_view(
                FeatureView::builder("nothing")
                    .output(Schema::from_pairs([("x", FieldType::Bool)]).unwrap())
                    .transform(|_| Ok(Row::new())),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NoSources(ref v) if v == "nothing"));
        assert!(registry.list_feature_views().is_empty());
    }

    #[test]
    fn test_view_with_undeclared_source() {
        let registry = registry();
        let err = is_high(&registry).unwrap_err();
        assert!(matches!(err, Error::MissingDependency { kind: "source", .. }));
    }

    #[test]
    fn test_duplicate_view_rejected() {
        let registry = registry();
        registry.declare_request_source("transaction_request", amount_schema()).unwrap();
        is_high(&registry).unwrap();
        assert!(matches!(is_high(&registry), Err(Error::DuplicateName { kind: "feature view", .. })));
    }

    #[test]
    fn test_service_dedupes_views_and_checks_dependencies() {
        let registry = registry();
        registry.declare_request_source("transaction_request", amount_schema()).unwrap();
        is_high(&registry).unwrap();

        let service = registry
            .declare_feature_service(
                "fraud_detection_feature_service:v2",
                &["transaction_amount_is_high", "transaction_amount_is_high"],
            )
            .unwrap();
        assert_eq!(service.views().len(), 1);
        assert_eq!(
            service.output_schema().names().collect::<Vec<_>>(),
            vec!["transaction_amount_is_high.transaction_amount_is_high"]
        );

        let err = registry
            .declare_feature_service("broken", &["transaction_amount_is_high", "user_credit_card_issuer"])
            .unwrap_err();
        assert!(matches!(err, Error::MissingDependency { kind: "feature view", ref name, .. } if name == "user_credit_card_issuer"));
        assert!(registry.get_feature_service("broken").is_none());
    }

    #[test]
    fn test_passthrough_view_uses_source_schema() {
        let registry = registry();
        registry
            .declare_entity(Entity::new("user", vec!["user_id".to_string()]))
            .unwrap();
        registry
            .declare_entity_source(
                "user_transaction_metrics",
                Schema::from_pairs([("amount_mean_1d_1d", FieldType::Float64)]).unwrap(),
                "user",
                lookup_fn(|_, _, _| Ok(None)),
            )
            .unwrap();

        let view = registry
            .declare_feature_view(FeatureViewBuilder::passthrough(
                "user_transaction_metrics",
                "user_transaction_metrics",
            ))
            .unwrap();
        assert_eq!(view.output_schema().len(), 1);
        assert!(view.output_schema().fields()[0].nullable);
        assert_eq!(view.sources()[0].join_keys(), ["user_id".to_string()]);
    }

    #[test]
    fn test_precomputed_schema_skips_request_sources() {
        let registry = registry();
        registry.declare_request_source("transaction_request", amount_schema()).unwrap();
        registry
            .declare_precomputed_source(
                "users",
                Schema::from_pairs([("cc_num", FieldType::String)]).unwrap(),
                vec!["user_id".to_string()],
                lookup_fn(|_, _, _| Ok(None)),
            )
            .unwrap();

        assert!(registry.precomputed_schema("transaction_request").is_none());
        assert!(registry.precomputed_schema("unknown").is_none());
        let schema = registry.precomputed_schema("users").unwrap();
        assert!(schema.fields()[0].nullable);
    }

    #[test]
    fn test_entity_source_requires_entity() {
        let registry = registry();
        let err = registry
            .declare_entity_source("users", amount_schema(), "user", lookup_fn(|_, _, _| Ok(None)))
            .unwrap_err();
        assert!(matches!(err, Error::MissingDependency { kind: "entity", .. }));
    }

    #[test]
    fn test_conflicting_request_fields() {
        let registry = registry();
        registry.declare_request_source("transaction_request", amount_schema()).unwrap();
        registry
            .declare_request_source(
                "refund_request",
                Schema::from_pairs([("amount", FieldType::Int64)]).unwrap(),
            )
            .unwrap();
        is_high(&registry).unwrap();
        registry
            .declare_feature_view(
                FeatureView::builder("refund_cents")
                    .source("refund_request")
                    .output(Schema::from_pairs([("cents", FieldType::Int64)]).unwrap())
                    .transform(|inputs| {
                        let amount = inputs.at(0).get_i64("amount").unwrap_or(0);
                        let mut row = Row::new();
                        row.insert("cents".to_string(), Value::Int64(amount * 100));
                        Ok(row)
                    }),
            )
            .unwrap();

        let err = registry
            .declare_feature_service("mixed", &["transaction_amount_is_high", "refund_cents"])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }
}
