//! Allow-list filter on a candidate property.
//!
//! Rule configuration:
//! - `objectPropertyName`: property to read
//! - `permittedObjectPropertyValues`: accepted values
//! - `objectPropertyOnParent`: read the provider's parent instead of the
//!   provider itself
//!
//! An empty property name or an empty permitted list disables the rule.

use crate::instance::InstanceKey;
use crate::rule::{Rule, RuleScope};
use fitment_catalog::{Catalog, CatalogError, ObjectKey, PropertyValue, props};

#[derive(Debug, Clone, Copy, Default)]
pub struct PropertyValueFilter;

struct FilterConfig<'a> {
    property: &'a str,
    permitted: &'a [PropertyValue],
    on_parent: bool,
}

impl<'a> FilterConfig<'a> {
    fn read(catalog: &'a Catalog, rule: ObjectKey) -> Option<Self> {
        let property = catalog.value(rule, props::RULE_PROPERTY_NAME).as_str();
        let permitted = catalog.list(rule, props::RULE_PROPERTY_PERMITTED_VALUES);
        if property.is_empty() || permitted.is_empty() {
            return None;
        }
        Some(Self {
            property,
            permitted,
            on_parent: catalog
                .value(rule, props::RULE_PROPERTY_ON_PARENT)
                .as_bool()
                .unwrap_or(false),
        })
    }

    fn permits(&self, value: &PropertyValue) -> bool {
        self.permitted.contains(value)
    }
}

impl Rule for PropertyValueFilter {
    fn kind(&self) -> &'static str {
        props::RULE_KIND_PROPERTY_VALUE_FILTER
    }

    fn filter_existing(
        &self,
        scope: &RuleScope<'_>,
        _needer: InstanceKey,
        candidates: Vec<InstanceKey>,
        rule: ObjectKey,
    ) -> Result<Vec<InstanceKey>, CatalogError> {
        let Some(config) = FilterConfig::read(scope.catalog, rule) else {
            return Ok(candidates);
        };

        Ok(candidates
            .into_iter()
            .filter(|provider| {
                let subject = if config.on_parent {
                    scope.graph.owner(*provider)
                } else {
                    *provider
                };
                config.permits(scope.value(subject, config.property))
            })
            .collect())
    }

    fn filter_new(
        &self,
        scope: &RuleScope<'_>,
        _needer: InstanceKey,
        candidates: Vec<ObjectKey>,
        rule: ObjectKey,
    ) -> Result<Vec<ObjectKey>, CatalogError> {
        let catalog = scope.catalog;
        let Some(config) = FilterConfig::read(catalog, rule) else {
            return Ok(candidates);
        };

        let mut kept = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let passes = if config.on_parent {
                config.permits(catalog.value(candidate, config.property))
            } else {
                // any declared provider with a permitted value is enough
                catalog
                    .objects_by_ids(catalog.list(candidate, props::PROVIDER_LIST))?
                    .into_iter()
                    .any(|provider| config.permits(catalog.value(provider, config.property)))
            };
            if passes {
                kept.push(candidate);
            }
        }
        Ok(kept)
    }
}
