//! Validation sessions.
//!
//! A session owns one instance graph built from a shared catalog. Parts
//! are queued as selections, then [`Session::validate`] runs the search
//! exactly once. Work is kept on two stacks: `unprocessed` holds steps
//! still to run (top runs next) and `processed` holds steps whose current
//! alternative is committed, most recent on top. A failing step always
//! backtracks into the most recent success.

use crate::error::EngineError;
use crate::instance::{InstanceGraph, InstanceKey, SessionObject, ValidationStatus};
use crate::report::ValidationReport;
use crate::rule::{Rule, RuleRegistry};
use crate::step::{Stage, StepKey, ValidationStep};
use fitment_catalog::{Catalog, ObjectKey, PropertyValue, props};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// A part picked by the caller, as persisted with a saved session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputSelection {
    pub selection_id: String,
    pub quantity: u32,
}

impl InputSelection {
    pub fn new(selection_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            selection_id: selection_id.into(),
            quantity,
        }
    }
}

#[derive(Debug)]
pub struct Session {
    pub(crate) id: String,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) rules: RuleRegistry,
    pub(crate) graph: InstanceGraph,
    selections: Vec<InputSelection>,
    queue: Vec<InstanceKey>,
    pub(crate) steps: Vec<ValidationStep>,
    unprocessed: Vec<StepKey>,
    processed: Vec<StepKey>,
    validated: bool,
}

impl Session {
    /// A fresh session using the built-in rules.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_rules(catalog, RuleRegistry::builtin())
    }

    pub fn with_rules(catalog: Arc<Catalog>, rules: RuleRegistry) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            catalog,
            rules,
            graph: InstanceGraph::new(),
            selections: Vec::new(),
            queue: Vec::new(),
            steps: Vec::new(),
            unprocessed: Vec::new(),
            processed: Vec::new(),
            validated: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn graph(&self) -> &InstanceGraph {
        &self.graph
    }

    /// Selections in the order they were queued.
    pub fn selections(&self) -> &[InputSelection] {
        &self.selections
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn status(&self, instance: InstanceKey) -> ValidationStatus {
        self.graph.status(&self.catalog, instance)
    }

    pub fn value(&self, instance: InstanceKey, name: &str) -> &PropertyValue {
        self.graph.value(&self.catalog, instance, name)
    }

    pub fn list(&self, instance: InstanceKey, name: &str) -> &[PropertyValue] {
        self.graph.list(&self.catalog, instance, name)
    }

    /// Live instances of catalog object `object_id`, in creation order.
    pub fn instances(&self, object_id: &str) -> Result<Vec<&SessionObject>, EngineError> {
        let object = self.object_key(object_id)?;
        Ok(self
            .graph
            .instances_of(object)
            .iter()
            .filter_map(|key| self.graph.get(*key))
            .collect())
    }

    pub fn instance_count(&self, object_id: &str) -> Result<usize, EngineError> {
        Ok(self.graph.count_of(self.object_key(object_id)?))
    }

    /// Fetch one instance by catalog object id and session object id.
    pub fn instance(&self, object_id: &str, instance_id: &str) -> Result<&SessionObject, EngineError> {
        let object = self.object_key(object_id)?;
        self.graph
            .find(object, instance_id)
            .ok_or_else(|| EngineError::InstanceNotFound {
                catalog: self.catalog.name().to_string(),
                session: self.id.clone(),
                object_id: object_id.to_string(),
                instance_id: instance_id.to_string(),
            })
    }

    fn object_key(&self, object_id: &str) -> Result<ObjectKey, EngineError> {
        self.catalog
            .object_key(object_id)
            .map_err(|source| EngineError::reference(&self.id, source))
    }

    /// Queue `quantity` instances of a top-level catalog object.
    pub fn queue_selection(
        &mut self,
        object_id: &str,
        quantity: u32,
    ) -> Result<Vec<InstanceKey>, EngineError> {
        if self.validated {
            return Err(EngineError::AlreadyValidated {
                catalog: self.catalog.name().to_string(),
                session: self.id.clone(),
            });
        }
        let object = self.object_key(object_id)?;
        self.ensure_top_level(object)?;

        let mut created = Vec::with_capacity(quantity as usize);
        for _ in 0..quantity {
            let key = self.create_instance(object)?;
            self.queue.push(key);
            created.push(key);
        }
        self.selections.push(InputSelection::new(object_id, quantity));
        Ok(created)
    }

    fn ensure_top_level(&self, object: ObjectKey) -> Result<(), EngineError> {
        let base_object = self.catalog.class_key(props::BASE_OBJECT_CLASS)?;
        if self.catalog.is_descendant(object, base_object) {
            return Ok(());
        }
        Err(EngineError::NotTopLevel {
            catalog: self.catalog.name().to_string(),
            session: self.id.clone(),
            object_id: self.catalog.object_at(object).id().to_string(),
        })
    }

    pub(crate) fn create_instance(&mut self, object: ObjectKey) -> Result<InstanceKey, EngineError> {
        self.ensure_top_level(object)?;
        self.graph
            .create(&self.catalog, object)
            .map_err(|source| EngineError::reference(&self.id, source))
    }

    /// Run the search over every queued selection. One pass per session.
    pub fn validate(&mut self) -> Result<(), EngineError> {
        if self.validated {
            return Err(EngineError::AlreadyValidated {
                catalog: self.catalog.name().to_string(),
                session: self.id.clone(),
            });
        }
        self.validated = true;

        self.queue.sort_by(|a, b| {
            let order = |key: &InstanceKey| {
                self.graph
                    .value(&self.catalog, *key, props::VALIDATION_ORDER)
                    .as_f64()
                    .unwrap_or(0.0)
            };
            order(a).total_cmp(&order(b))
        });

        loop {
            self.unprocessed.clear();
            self.processed.clear();

            // selections resolved as a side effect of earlier ones are dropped
            let next = self
                .queue
                .iter()
                .position(|key| self.graph.status(&self.catalog, *key) == ValidationStatus::Unvalidated);
            let Some(selection) = next.and_then(|index| self.queue.drain(..=index).last()) else {
                self.queue.clear();
                break;
            };

            tracing::debug!(
                session = %self.id,
                selection = %self.graph.label(&self.catalog, selection),
                "starting validation of input selection"
            );
            self.push_needer_subtree(selection, None);

            while let Some(&top) = self.unprocessed.last() {
                tracing::trace!(
                    session = %self.id,
                    unprocessed = ?self.unprocessed,
                    processed = ?self.processed,
                    "stacks"
                );
                self.validate_step(top)?;
            }
        }

        tracing::debug!(
            session = %self.id,
            instances = self.graph.len(),
            steps = self.steps.len(),
            "validation finished"
        );
        Ok(())
    }

    /// Structured result of the session.
    pub fn report(&self) -> ValidationReport {
        ValidationReport::from_session(self)
    }

    /// Detach every instance and forget all selections and steps.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.selections.clear();
        self.queue.clear();
        self.steps.clear();
        self.unprocessed.clear();
        self.processed.clear();
    }

    /// Rules bound to the needer's owner whose protocol matches the needer,
    /// in application order.
    pub(crate) fn applicable_rules(
        &self,
        needer: InstanceKey,
    ) -> Result<Vec<(ObjectKey, Arc<dyn Rule>)>, EngineError> {
        let protocol = self.graph.value(&self.catalog, needer, props::PROTOCOL_TYPE).as_str();
        if protocol.is_empty() {
            return Ok(Vec::new());
        }
        let Some(owner) = self.graph.get(self.graph.owner(needer)) else {
            return Ok(Vec::new());
        };

        let mut rules = Vec::new();
        for &rule in self.catalog.applicable_rules(owner.object()) {
            let rule_protocol = self.catalog.value(rule, props::PROTOCOL_TYPE).as_str();
            if rule_protocol == protocol || rule_protocol == props::ANY_PROTOCOL {
                rules.push((rule, self.rules.resolve(&self.catalog, rule)?));
            }
        }
        Ok(rules)
    }

    /// Push one `Existing` step per needer of `instance`, last needer first,
    /// so the first needer in validation order runs next.
    pub(crate) fn push_needer_subtree(&mut self, instance: InstanceKey, parent: Option<StepKey>) {
        let needers = self
            .graph
            .get(instance)
            .map(|object| object.needers().to_vec())
            .unwrap_or_default();
        for needer in needers.into_iter().rev() {
            let step = self.new_step(needer, parent, Stage::Existing);
            self.push_step(step);
        }
    }

    pub(crate) fn push_step(&mut self, key: StepKey) {
        self.unprocessed.push(key);
        tracing::debug!(session = %self.id, step = %self.step_label(key), "adding validation step");
    }

    /// Move the top step to the processed stack after it committed to an
    /// alternative.
    pub(crate) fn confirm_step(&mut self, satisfying: InstanceKey) {
        let Some(key) = self.unprocessed.pop() else {
            return;
        };
        self.processed.push(key);
        tracing::debug!(
            session = %self.id,
            step = %self.step_label(key),
            with = %self.graph.label(&self.catalog, satisfying),
            "satisfied validation step"
        );
    }

    pub(crate) fn remove_unprocessed(&mut self, key: StepKey) -> bool {
        match self.unprocessed.iter().rposition(|k| *k == key) {
            Some(index) => {
                self.unprocessed.remove(index);
                true
            }
            None => false,
        }
    }

    /// Swap `old` for `replacement` on the work stack, discarding `old`.
    pub(crate) fn replace_disjunction_step(&mut self, old: StepKey, replacement: StepKey) {
        self.remove_unprocessed(old);
        self.cleanup_step(old, true);
        self.push_step(replacement);
    }

    /// Backtrack after `failed` ran out of alternatives.
    pub(crate) fn fail_step(&mut self, failed: StepKey) {
        let Some(target) = self.steps[failed.0].target else {
            self.remove_unprocessed(failed);
            tracing::debug!(session = %self.id, step = %self.step_label(failed), "ignoring failure of discarded step");
            return;
        };

        let Some(&last) = self.processed.last() else {
            // nothing to fall back on: the current selection is unsatisfiable
            if let Some(needer) = self.graph.get_mut(target) {
                needer.set_value(props::VALIDATION_STATUS, props::STATUS_FAILED.into());
            }
            tracing::debug!(
                session = %self.id,
                step = %self.step_label(failed),
                needer = %self.graph.label(&self.catalog, target),
                "unable to satisfy validation step"
            );
            self.unprocessed.clear();
            return;
        };

        if self.steps[failed.0].parent == Some(last) {
            // siblings of the failed step are moot once `last` moves on
            let siblings = self.steps[last.0].children.clone();
            for sibling in siblings.into_iter().rev() {
                if self.remove_unprocessed(sibling) {
                    self.cleanup_step(sibling, true);
                }
            }
        } else if self.steps[failed.0].stage == Stage::New {
            let parent = self.steps[failed.0].parent;
            let replacement = self.new_step(target, parent, Stage::Existing);
            self.replace_disjunction_step(failed, replacement);
        } else {
            self.cleanup_step(failed, false);
        }

        self.revert_step(last);
        self.processed.pop();
        self.unprocessed.push(last);
        tracing::debug!(session = %self.id, step = %self.step_label(last), "reverting to next alternative");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{board_catalog, controller_catalog, power_catalog};
    use fitment_catalog::{ClassDocument, ObjectDocument};

    fn needer_of(session: &Session, instance: InstanceKey) -> InstanceKey {
        session.graph.get(instance).expect("live").needers()[0]
    }

    #[test]
    fn one_controller_creates_one_backplane() {
        let mut session = Session::new(controller_catalog(true));
        let controller = session
            .queue_selection("pcie_controller", 1)
            .expect("queue should work")[0];
        session.validate().expect("validate should work");

        assert_eq!(session.status(controller), ValidationStatus::Successful);
        let backplanes = session.instances("pcie_backplane").expect("known object");
        assert_eq!(backplanes.len(), 1);
        let provider = backplanes[0].providers()[0];
        assert_eq!(session.value(provider, props::QTY_PROVIDED), &PropertyValue::Number(1.0));

        let needer = needer_of(&session, controller);
        assert_eq!(session.value(needer, props::QTY_NEEDED), &PropertyValue::Number(0.0));
        assert_eq!(
            session.value(needer, props::SATISFYING_PROVIDER_MODEL_ID).as_str(),
            "bp_pcie_slots"
        );
        assert_eq!(session.value(needer, props::SATISFYING_PROVIDER_ID).as_str(), "1002:1");
    }

    #[test]
    fn second_controller_reuses_the_backplane() {
        let mut session = Session::new(controller_catalog(true));
        let controllers = session
            .queue_selection("pcie_controller", 2)
            .expect("queue should work");
        session.validate().expect("validate should work");

        for controller in &controllers {
            assert_eq!(session.status(*controller), ValidationStatus::Successful);
        }
        let backplanes = session.instances("pcie_backplane").expect("known object");
        assert_eq!(backplanes.len(), 1);
        let provider = backplanes[0].providers()[0];
        assert_eq!(session.value(provider, props::QTY_PROVIDED), &PropertyValue::Number(0.0));
    }

    #[test]
    fn session_maximum_blocks_a_second_backplane() {
        let mut session = Session::new(controller_catalog(true));
        let controllers = session
            .queue_selection("pcie_controller", 3)
            .expect("queue should work");
        session.validate().expect("validate should work");

        assert_eq!(session.status(controllers[0]), ValidationStatus::Successful);
        assert_eq!(session.status(controllers[1]), ValidationStatus::Successful);
        assert_eq!(session.status(controllers[2]), ValidationStatus::Failed);
        assert_eq!(session.instance_count("pcie_backplane").expect("known"), 1);
    }

    #[test]
    fn no_new_providers_fails_without_creating() {
        let mut session = Session::new(controller_catalog(false));
        let controllers = session
            .queue_selection("pcie_controller", 2)
            .expect("queue should work");
        session.validate().expect("validate should work");

        // both selections are attempted even though the first fails
        for controller in &controllers {
            assert_eq!(session.status(*controller), ValidationStatus::Failed);
        }
        assert_eq!(session.instance_count("pcie_backplane").expect("known"), 0);
    }

    #[test]
    fn queued_provider_parent_is_reused() {
        let mut session = Session::new(controller_catalog(false));
        let controller = session
            .queue_selection("pcie_controller", 1)
            .expect("queue should work")[0];
        let backplane = session
            .queue_selection("pcie_backplane", 1)
            .expect("queue should work")[0];
        session.validate().expect("validate should work");

        assert_eq!(session.status(controller), ValidationStatus::Successful);
        assert_eq!(session.status(backplane), ValidationStatus::Successful);
        assert_eq!(session.instance_count("pcie_backplane").expect("known"), 1);
    }

    #[test]
    fn child_lists_do_not_change_during_validation() {
        let mut session = Session::new(controller_catalog(true));
        let controllers = session
            .queue_selection("pcie_controller", 3)
            .expect("queue should work");
        let shape = |session: &Session| -> Vec<(Vec<InstanceKey>, Vec<InstanceKey>)> {
            controllers
                .iter()
                .map(|key| {
                    let object = session.graph.get(*key).expect("live");
                    (object.needers().to_vec(), object.providers().to_vec())
                })
                .collect()
        };
        let before = shape(&session);
        session.validate().expect("validate should work");
        assert_eq!(shape(&session), before);
    }

    #[test]
    fn sessions_validate_once() {
        let mut session = Session::new(controller_catalog(true));
        session
            .queue_selection("pcie_controller", 1)
            .expect("queue should work");
        session.validate().expect("first validate should work");

        assert!(matches!(
            session.validate(),
            Err(EngineError::AlreadyValidated { .. })
        ));
        let err = session
            .queue_selection("pcie_controller", 1)
            .expect_err("queue after validate must fail");
        assert_eq!(err.catalog(), Some("controllers"));
        assert_eq!(err.session(), Some(session.id()));
    }

    #[test]
    fn only_top_level_objects_can_be_selected() {
        let mut session = Session::new(controller_catalog(true));
        for id in ["ctrl_pcie_needer", "bp_pcie_slots", "backplane_cap"] {
            let err = session.queue_selection(id, 1).expect_err("child must fail");
            assert!(matches!(err, EngineError::NotTopLevel { .. }), "{id}: {err}");
        }
        let err = session.queue_selection("missing", 1).expect_err("unknown must fail");
        assert!(matches!(err, EngineError::Reference { .. }));
        assert!(session.selections().is_empty());
        assert!(session.graph().is_empty());
    }

    #[test]
    fn dangling_child_reference_records_no_selection() {
        let catalog = Catalog::builder("dangling")
            .class(
                ClassDocument::new("Card", props::BASE_OBJECT_CLASS).with_object(
                    ObjectDocument::new("card").with_list(props::NEEDER_LIST, ["missing"]),
                ),
            )
            .build()
            .expect("catalog should build");
        let mut session = Session::new(Arc::new(catalog));

        let err = session.queue_selection("card", 2).expect_err("dangling child must fail");
        assert!(matches!(err, EngineError::Reference { .. }));
        assert!(session.selections().is_empty());
        assert!(session.graph().is_empty());
    }

    #[test]
    fn instance_lookup_reports_missing_ids() {
        let mut session = Session::new(controller_catalog(true));
        session
            .queue_selection("pcie_controller", 1)
            .expect("queue should work");
        assert_eq!(session.instance("pcie_controller", "1001").expect("exists").id(), "1001");
        assert!(matches!(
            session.instance("pcie_controller", "1002"),
            Err(EngineError::InstanceNotFound { .. })
        ));
    }

    #[test]
    fn revert_round_trips_committed_alternative() {
        let mut session = Session::new(controller_catalog(false));
        let backplane = session
            .queue_selection("pcie_backplane", 1)
            .expect("queue should work")[0];
        let controller = session
            .queue_selection("pcie_controller", 1)
            .expect("queue should work")[0];
        let needer = needer_of(&session, controller);
        let provider = session.graph.get(backplane).expect("live").providers()[0];
        let snapshot = |session: &Session| {
            (
                session.graph.get(needer).expect("live").clone(),
                session.graph.get(provider).expect("live").clone(),
            )
        };
        let before = snapshot(&session);

        session.push_needer_subtree(controller, None);
        let step = session.unprocessed[0];
        session.validate_step(step).expect("step should run");
        assert_eq!(session.processed, vec![step]);
        assert_eq!(session.status(controller), ValidationStatus::Successful);

        session.revert_step(step);
        let after = snapshot(&session);
        assert_eq!(after.0.value_override(props::QTY_NEEDED), before.0.value_override(props::QTY_NEEDED));
        assert_eq!(after.1.value_override(props::QTY_PROVIDED), None);
        assert_eq!(
            session.value(provider, props::QTY_PROVIDED),
            &PropertyValue::Number(2.0)
        );
        assert_eq!(session.status(controller), ValidationStatus::Unvalidated);
    }

    #[test]
    fn failing_a_discarded_step_leaves_stacks_alone() {
        let mut session = Session::new(controller_catalog(true));
        let controller = session
            .queue_selection("pcie_controller", 2)
            .expect("queue should work")[0];
        session.push_needer_subtree(controller, None);
        let live = session.unprocessed[0];
        let orphan = session.new_step(needer_of(&session, controller), None, Stage::Existing);
        session.processed.push(live);
        session.cleanup_step(orphan, true);

        session.fail_step(orphan);
        session.fail_step(orphan);
        assert_eq!(session.unprocessed, vec![live]);
        assert_eq!(session.processed, vec![live]);
        assert!(session.steps[orphan.0].is_discarded());
    }

    #[test]
    fn inert_step_on_top_is_dropped() {
        let mut session = Session::new(controller_catalog(true));
        let controller = session
            .queue_selection("pcie_controller", 1)
            .expect("queue should work")[0];
        session.push_needer_subtree(controller, None);
        let step = session.unprocessed[0];
        session.cleanup_step(step, true);

        session.validate_step(step).expect("inert step is skipped");
        assert!(session.unprocessed.is_empty());
        assert!(session.processed.is_empty());
    }

    #[test]
    fn exhausted_existing_stage_is_replaced_by_new_stage() {
        let mut session = Session::new(controller_catalog(true));
        let controller = session
            .queue_selection("pcie_controller", 1)
            .expect("queue should work")[0];
        session.push_needer_subtree(controller, None);
        let existing = session.unprocessed[0];

        session.validate_step(existing).expect("step should run");
        assert!(session.steps[existing.0].is_discarded());
        let replacement = session.unprocessed[0];
        assert_eq!(session.unprocessed.len(), 1);
        assert_eq!(session.steps[replacement.0].stage(), Stage::New);
        assert_eq!(session.steps[replacement.0].target(), Some(needer_of(&session, controller)));
    }

    #[test]
    fn failing_child_prunes_siblings_and_retries_parent() {
        let mut session = Session::new(power_catalog());
        let server = session.queue_selection("server", 1).expect("queue should work")[0];
        session.validate().expect("validate should work");

        assert_eq!(session.status(server), ValidationStatus::Successful);
        let needer = needer_of(&session, server);
        assert_eq!(session.value(needer, props::SATISFYING_PROVIDER_MODEL_ID).as_str(), "psu_b_out");
        assert_eq!(session.value(needer, props::SATISFYING_PROVIDER_ID).as_str(), "1003:1");
        assert_eq!(session.instance_count("psu_a").expect("known"), 0);
        assert_eq!(session.instance_count("psu_b").expect("known"), 1);

        // the follow-up and fan steps scheduled under psu_a were discarded
        let discarded: Vec<usize> = session
            .steps
            .iter()
            .filter(|step| step.is_discarded())
            .map(|step| step.key().index())
            .collect();
        assert_eq!(discarded, vec![0, 2, 3]);
    }

    #[test]
    fn failed_new_stage_falls_back_to_existing_and_backtracks() {
        let mut session = Session::new(board_catalog(true));
        let board = session.queue_selection("board_x", 1).expect("queue should work")[0];
        let server = session.queue_selection("server", 1).expect("queue should work")[0];
        session.validate().expect("validate should work");

        assert_eq!(session.status(server), ValidationStatus::Failed);
        let needers = session.graph.get(server).expect("live").needers().to_vec();
        assert_eq!(session.status(needers[0]), ValidationStatus::Failed);
        assert_eq!(session.status(needers[1]), ValidationStatus::Unvalidated);

        let provider = session.graph.get(board).expect("live").providers()[0];
        assert_eq!(session.value(provider, props::QTY_PROVIDED), &PropertyValue::Number(1.0));
        assert_eq!(session.value(needers[0], props::SATISFYING_PROVIDER_ID).as_str(), "");

        assert_eq!(session.steps[2].stage(), Stage::New);
        assert!(session.steps[2].is_discarded());
        assert_eq!(session.steps[3].stage(), Stage::Existing);
        assert_eq!(session.steps[3].target(), Some(needers[1]));
    }

    #[test]
    fn failed_existing_stage_is_undone_and_backtracks() {
        let mut session = Session::new(board_catalog(false));
        session.queue_selection("board_x", 1).expect("queue should work");
        let server = session.queue_selection("server", 1).expect("queue should work")[0];
        session.validate().expect("validate should work");

        assert_eq!(session.status(server), ValidationStatus::Failed);
        assert_eq!(session.steps.len(), 2);
        assert!(!session.steps[0].is_discarded());
        assert_eq!(session.steps[0].next_alternative(), 0);
    }

    #[test]
    fn clear_detaches_everything() {
        let mut session = Session::new(controller_catalog(true));
        session
            .queue_selection("pcie_controller", 2)
            .expect("queue should work");
        session.validate().expect("validate should work");
        session.clear();
        assert!(session.graph().is_empty());
        assert!(session.selections().is_empty());
        assert_eq!(session.instance_count("pcie_controller").expect("known"), 0);
    }
}
