//! Per-session instance cap.
//!
//! Drops a new-provider candidate once the session already holds
//! `maximum` instances of it. Existing providers are never affected.

use crate::instance::InstanceKey;
use crate::rule::{Rule, RuleScope};
use fitment_catalog::{CatalogError, ObjectKey, props};

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionMaximumFilter;

impl Rule for SessionMaximumFilter {
    fn kind(&self) -> &'static str {
        props::RULE_KIND_SESSION_MAXIMUM_FILTER
    }

    fn filter_new(
        &self,
        scope: &RuleScope<'_>,
        _needer: InstanceKey,
        mut candidates: Vec<ObjectKey>,
        _rule: ObjectKey,
    ) -> Result<Vec<ObjectKey>, CatalogError> {
        candidates.retain(|candidate| {
            // non-numeric maximum means unbounded
            match scope.catalog.value(*candidate, props::MAXIMUM).as_f64() {
                Some(maximum) => maximum.trunc() > scope.graph.count_of(*candidate) as f64,
                None => true,
            }
        });
        Ok(candidates)
    }
}
