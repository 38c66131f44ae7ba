//! Extension rules.
//!
//! A rule narrows or reorders the candidate providers of a needer. Rule
//! *objects* live in the catalog (below `BaseRule`) and carry the
//! configuration; their `ruleKind` tag picks the [`Rule`] implementation
//! from a [`RuleRegistry`].

use crate::error::EngineError;
use crate::instance::{InstanceGraph, InstanceKey};
use crate::property_value_filter::PropertyValueFilter;
use crate::session_maximum_filter::SessionMaximumFilter;
use fitment_catalog::{Catalog, CatalogError, ObjectKey, PropertyValue, props};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Read-only view a rule gets of the session.
#[derive(Clone, Copy)]
pub struct RuleScope<'a> {
    pub catalog: &'a Catalog,
    pub graph: &'a InstanceGraph,
}

impl<'a> RuleScope<'a> {
    pub fn value(&self, instance: InstanceKey, name: &str) -> &'a PropertyValue {
        self.graph.value(self.catalog, instance, name)
    }

    pub fn list(&self, instance: InstanceKey, name: &str) -> &'a [PropertyValue] {
        self.graph.list(self.catalog, instance, name)
    }
}

/// A candidate filter bound to a `ruleKind` tag.
///
/// Rules never mutate instances. Both hooks pass candidates through
/// unchanged unless overridden.
pub trait Rule: Send + Sync {
    /// The `ruleKind` tag this implementation answers to.
    fn kind(&self) -> &'static str;

    /// Filter or reorder existing provider instances for `needer`.
    fn filter_existing(
        &self,
        _scope: &RuleScope<'_>,
        _needer: InstanceKey,
        candidates: Vec<InstanceKey>,
        _rule: ObjectKey,
    ) -> Result<Vec<InstanceKey>, CatalogError> {
        Ok(candidates)
    }

    /// Filter or reorder catalog objects that could be created to provide
    /// for `needer`.
    fn filter_new(
        &self,
        _scope: &RuleScope<'_>,
        _needer: InstanceKey,
        candidates: Vec<ObjectKey>,
        _rule: ObjectKey,
    ) -> Result<Vec<ObjectKey>, CatalogError> {
        Ok(candidates)
    }
}

/// Maps `ruleKind` tags to rule implementations.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: BTreeMap<&'static str, Arc<dyn Rule>>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.rules.keys()).finish()
    }
}

impl RuleRegistry {
    /// A registry with no rules at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The common rules every catalog may use.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(PropertyValueFilter));
        registry.register(Arc::new(SessionMaximumFilter));
        registry
    }

    /// Add a rule, returning the one previously bound to the same tag.
    pub fn register(&mut self, rule: Arc<dyn Rule>) -> Option<Arc<dyn Rule>> {
        self.rules.insert(rule.kind(), rule)
    }

    pub fn get(&self, kind: &str) -> Option<&Arc<dyn Rule>> {
        self.rules.get(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.keys().copied()
    }

    /// Resolve the implementation bound to a rule object.
    pub fn resolve(&self, catalog: &Catalog, rule: ObjectKey) -> Result<Arc<dyn Rule>, EngineError> {
        let kind = catalog.value(rule, props::RULE_KIND).as_str();
        self.get(kind)
            .cloned()
            .ok_or_else(|| EngineError::UnknownRuleKind {
                catalog: catalog.name().to_string(),
                rule_id: catalog.object_at(rule).id().to_string(),
                kind: kind.to_string(),
            })
    }

    /// Fail if any rule object in `catalog` names an unregistered kind.
    pub fn check_catalog(&self, catalog: &Catalog) -> Result<(), EngineError> {
        let base_rule = catalog.class_key(props::BASE_RULE_CLASS)?;
        for rule in catalog.descendant_objects(base_rule) {
            self.resolve(catalog, rule)?;
        }
        Ok(())
    }
}
