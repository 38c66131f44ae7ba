//! Validation steps: the nodes of the backtracking search.
//!
//! A step tries to satisfy one needer. It starts in [`Stage::Existing`]
//! and walks the providers already in the session. When those run out and
//! the needer allows it, the step is replaced by a [`Stage::New`] sibling
//! that instantiates a provider parent from the catalog. A successful
//! `New` step schedules the new instance's own needers and then an
//! [`Stage::ExistingAfterNew`] step that consumes the freshly created
//! provider.
//!
//! ```text
//! Existing ──exhausted──▶ New ──created──▶ (new instance's needers)
//!                                          ExistingAfterNew
//! ```
//!
//! Every property write made while trying an alternative goes through the
//! step's [`UndoLog`], so moving to the next alternative (or backtracking
//! into this step) first restores the graph exactly.

use crate::change::UndoLog;
use crate::error::EngineError;
use crate::instance::{InstanceKey, ValidationStatus};
use crate::rule::RuleScope;
use crate::session::Session;
use fitment_catalog::{ObjectKey, PropertyValue, props};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Arena slot (and id) of a step within its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StepKey(pub(crate) usize);

impl StepKey {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Existing,
    New,
    ExistingAfterNew,
}

impl Stage {
    pub fn description(self) -> &'static str {
        match self {
            Self::Existing => "Find Existing Provider",
            Self::New => "Create New Provider Parent",
            Self::ExistingAfterNew => "Use Created Provider",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// One node of the search tree.
#[derive(Debug, Clone)]
pub struct ValidationStep {
    pub(crate) key: StepKey,
    /// Needer to satisfy; `None` once the step is discarded.
    pub(crate) target: Option<InstanceKey>,
    pub(crate) parent: Option<StepKey>,
    pub(crate) children: Vec<StepKey>,
    pub(crate) stage: Stage,
    pub(crate) existing: Option<Vec<InstanceKey>>,
    pub(crate) new: Option<Vec<ObjectKey>>,
    /// Index of the next untried alternative.
    pub(crate) next_alternative: usize,
    pub(crate) undo: UndoLog,
    /// Provider parent instantiated by the current `New` alternative.
    pub(crate) created: Option<InstanceKey>,
}

impl ValidationStep {
    pub(crate) fn new(
        key: StepKey,
        target: InstanceKey,
        parent: Option<StepKey>,
        stage: Stage,
    ) -> Self {
        Self {
            key,
            target: Some(target),
            parent,
            children: Vec::new(),
            stage,
            existing: None,
            new: None,
            next_alternative: 0,
            undo: UndoLog::default(),
            created: None,
        }
    }

    pub fn key(&self) -> StepKey {
        self.key
    }

    pub fn target(&self) -> Option<InstanceKey> {
        self.target
    }

    pub fn parent(&self) -> Option<StepKey> {
        self.parent
    }

    pub fn children(&self) -> &[StepKey] {
        &self.children
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_discarded(&self) -> bool {
        self.target.is_none()
    }

    pub fn next_alternative(&self) -> usize {
        self.next_alternative
    }

    pub fn created(&self) -> Option<InstanceKey> {
        self.created
    }

    /// Alternatives not tried yet, for logging.
    fn remaining(&self) -> usize {
        let total = match self.stage {
            Stage::New => self.new.as_ref().map_or(0, Vec::len),
            Stage::Existing | Stage::ExistingAfterNew => {
                self.existing.as_ref().map_or(0, Vec::len)
            }
        };
        total.saturating_sub(self.next_alternative)
    }
}

/// Protocol tags match when equal or when either side is the wildcard.
pub fn protocol_matches(needer: &str, provider: &str) -> bool {
    needer == provider || needer == props::ANY_PROTOCOL || provider == props::ANY_PROTOCOL
}

impl Session {
    pub(crate) fn new_step(
        &mut self,
        target: InstanceKey,
        parent: Option<StepKey>,
        stage: Stage,
    ) -> StepKey {
        let key = StepKey(self.steps.len());
        self.steps.push(ValidationStep::new(key, target, parent, stage));
        if let Some(parent) = parent {
            self.steps[parent.0].children.push(key);
        }
        key
    }

    pub(crate) fn step_label(&self, key: StepKey) -> String {
        let step = &self.steps[key.0];
        match step.target {
            Some(target) => format!(
                "{}({}) #{}",
                step.stage,
                self.graph.get(target).map_or("?", |needer| needer.id()),
                key.0
            ),
            None => format!("discarded #{}", key.0),
        }
    }

    /// Try the next alternative of the step on top of the work stack.
    pub(crate) fn validate_step(&mut self, key: StepKey) -> Result<(), EngineError> {
        let target = self.steps[key.0]
            .target
            .filter(|target| self.graph.contains(*target));
        let Some(target) = target else {
            tracing::debug!(session = %self.id, step = %self.step_label(key), "dropping inert step");
            self.remove_unprocessed(key);
            return Ok(());
        };

        if self.steps[key.0].next_alternative > 0 {
            self.revert_step(key);
        }

        let needed = self
            .graph
            .value(&self.catalog, target, props::QTY_NEEDED)
            .as_f64()
            .unwrap_or(0.0);
        let protocol = self
            .graph
            .value(&self.catalog, target, props::PROTOCOL_TYPE)
            .as_str()
            .to_string();

        match self.steps[key.0].stage {
            Stage::New => self.validate_with_new(key, target, needed, &protocol),
            Stage::Existing | Stage::ExistingAfterNew => {
                self.validate_with_existing(key, target, needed, &protocol)
            }
        }
    }

    fn validate_with_existing(
        &mut self,
        key: StepKey,
        target: InstanceKey,
        needed: f64,
        protocol: &str,
    ) -> Result<(), EngineError> {
        if self.steps[key.0].existing.is_none() {
            let alternatives = self.existing_alternatives(key, target, needed, protocol)?;
            self.steps[key.0].existing = Some(alternatives);
        }

        let step = &self.steps[key.0];
        tracing::trace!(
            session = %self.id,
            step = %self.step_label(key),
            remaining = step.remaining(),
            "existing alternatives"
        );
        let next = step
            .existing
            .as_ref()
            .and_then(|alternatives| alternatives.get(step.next_alternative))
            .copied();

        let Some(provider) = next else {
            let try_new = self
                .graph
                .value(&self.catalog, target, props::TRY_NEW_PROVIDERS)
                .as_bool()
                .unwrap_or(false);
            if try_new && self.steps[key.0].stage == Stage::Existing {
                let parent = self.steps[key.0].parent;
                let replacement = self.new_step(target, parent, Stage::New);
                self.replace_disjunction_step(key, replacement);
                return Ok(());
            }
            self.fail_step(key);
            return Ok(());
        };

        self.steps[key.0].next_alternative += 1;

        let provided = self
            .graph
            .value(&self.catalog, provider, props::QTY_PROVIDED)
            .as_f64()
            .unwrap_or(0.0);
        let (provider_model_id, provider_id) = match self.graph.get(provider) {
            Some(instance) => (
                self.catalog.object_at(instance.object()).id().to_string(),
                instance.id().to_string(),
            ),
            None => (String::new(), String::new()),
        };

        self.record_value(key, target, props::QTY_NEEDED, PropertyValue::Number(0.0));
        self.record_value(
            key,
            provider,
            props::QTY_PROVIDED,
            PropertyValue::Number(provided - needed),
        );
        self.record_value(
            key,
            target,
            props::SATISFYING_PROVIDER_MODEL_ID,
            provider_model_id.into(),
        );
        self.record_value(key, target, props::SATISFYING_PROVIDER_ID, provider_id.into());
        self.record_value(
            key,
            target,
            props::VALIDATION_STATUS,
            props::STATUS_SUCCESSFUL.into(),
        );
        self.confirm_step(provider);

        // a provider owned by another, still unresolved selection is
        // validated before anything else
        let provider_owner = self.graph.owner(provider);
        let needer_owner = self.graph.owner(target);
        if provider_owner != needer_owner
            && self.graph.status(&self.catalog, provider_owner) != ValidationStatus::Successful
        {
            self.push_needer_subtree(provider_owner, Some(key));
        }
        Ok(())
    }

    fn validate_with_new(
        &mut self,
        key: StepKey,
        target: InstanceKey,
        needed: f64,
        protocol: &str,
    ) -> Result<(), EngineError> {
        if self.steps[key.0].new.is_none() {
            let alternatives = self.new_alternatives(target, needed, protocol)?;
            self.steps[key.0].new = Some(alternatives);
        }

        let step = &self.steps[key.0];
        tracing::trace!(
            session = %self.id,
            step = %self.step_label(key),
            remaining = step.remaining(),
            "new alternatives"
        );
        let next = step
            .new
            .as_ref()
            .and_then(|alternatives| alternatives.get(step.next_alternative))
            .copied();

        let Some(object) = next else {
            self.fail_step(key);
            return Ok(());
        };

        let created = self.create_instance(object)?;
        let step = &mut self.steps[key.0];
        step.created = Some(created);
        step.next_alternative += 1;
        self.confirm_step(created);

        // consumed last, after the new instance's own needers
        let follow_up = self.new_step(target, Some(key), Stage::ExistingAfterNew);
        self.push_step(follow_up);
        self.push_needer_subtree(created, Some(key));
        Ok(())
    }

    /// Provider-parent catalog objects reachable from the needer's
    /// `providerParentClassIds`.
    fn provider_parent_objects(&self, target: InstanceKey) -> Result<BTreeSet<ObjectKey>, EngineError> {
        let mut objects = BTreeSet::new();
        for class_id in self
            .graph
            .list(&self.catalog, target, props::PROVIDER_CLASS_ID_LIST)
        {
            let class = self
                .catalog
                .class_key(class_id.as_str())
                .map_err(|source| EngineError::reference(&self.id, source))?;
            objects.extend(self.catalog.descendant_objects(class));
        }
        Ok(objects)
    }

    fn existing_alternatives(
        &self,
        key: StepKey,
        target: InstanceKey,
        needed: f64,
        protocol: &str,
    ) -> Result<Vec<InstanceKey>, EngineError> {
        let step = &self.steps[key.0];
        let only = match step.stage {
            Stage::ExistingAfterNew => {
                let created = step
                    .parent
                    .and_then(|parent| self.steps[parent.0].created);
                match created {
                    Some(created) => Some(created),
                    None => return Ok(Vec::new()),
                }
            }
            Stage::Existing | Stage::New => None,
        };

        let mut providers = Vec::new();
        for object in self.provider_parent_objects(target)? {
            for &instance in self.graph.instances_of(object) {
                if only.is_some_and(|only| only != instance) {
                    continue;
                }
                if self.graph.status(&self.catalog, instance) == ValidationStatus::Failed {
                    continue;
                }
                let Some(parent) = self.graph.get(instance) else {
                    continue;
                };
                for &provider in parent.providers() {
                    let provider_protocol = self
                        .graph
                        .value(&self.catalog, provider, props::PROTOCOL_TYPE)
                        .as_str();
                    let provided = self
                        .graph
                        .value(&self.catalog, provider, props::QTY_PROVIDED)
                        .as_f64()
                        .unwrap_or(0.0);
                    if protocol_matches(protocol, provider_protocol) && provided >= needed {
                        providers.push(provider);
                    }
                }
            }
        }

        if providers.is_empty() {
            return Ok(providers);
        }
        providers.sort();

        let scope = RuleScope {
            catalog: &self.catalog,
            graph: &self.graph,
        };
        for (rule_object, rule) in self.applicable_rules(target)? {
            providers = rule
                .filter_existing(&scope, target, providers, rule_object)
                .map_err(|source| EngineError::reference(&self.id, source))?;
        }
        Ok(providers)
    }

    fn new_alternatives(
        &self,
        target: InstanceKey,
        needed: f64,
        protocol: &str,
    ) -> Result<Vec<ObjectKey>, EngineError> {
        let mut parents = Vec::new();
        for object in self.provider_parent_objects(target)? {
            let declared = self
                .catalog
                .objects_by_ids(self.catalog.list(object, props::PROVIDER_LIST))
                .map_err(|source| EngineError::reference(&self.id, source))?;
            let fits = declared.into_iter().any(|provider| {
                let provider_protocol = self.catalog.value(provider, props::PROTOCOL_TYPE).as_str();
                let provided = self
                    .catalog
                    .value(provider, props::QTY_PROVIDED)
                    .as_f64()
                    .unwrap_or(0.0);
                protocol_matches(protocol, provider_protocol) && provided >= needed
            });
            if fits {
                parents.push(object);
            }
        }

        if parents.is_empty() {
            return Ok(parents);
        }
        parents.sort_by(|a, b| {
            self.catalog
                .object_at(*a)
                .id()
                .cmp(self.catalog.object_at(*b).id())
        });

        let scope = RuleScope {
            catalog: &self.catalog,
            graph: &self.graph,
        };
        for (rule_object, rule) in self.applicable_rules(target)? {
            parents = rule
                .filter_new(&scope, target, parents, rule_object)
                .map_err(|source| EngineError::reference(&self.id, source))?;
        }
        Ok(parents)
    }

    fn record_value(&mut self, key: StepKey, instance: InstanceKey, name: &str, value: PropertyValue) {
        self.steps[key.0]
            .undo
            .set_value(&mut self.graph, instance, name, value);
    }

    /// Undo the step's committed alternative, detaching any provider parent
    /// it created.
    pub(crate) fn revert_step(&mut self, key: StepKey) {
        let step = &mut self.steps[key.0];
        step.undo.revert(&mut self.graph);
        if let Some(created) = step.created.take() {
            tracing::debug!(
                session = %self.id,
                instance = %self.graph.label(&self.catalog, created),
                "removing created provider parent"
            );
            self.graph.remove(created);
        }
    }

    /// Forget cached alternatives. A discarded step is also unlinked from
    /// its parent and can never run again.
    pub(crate) fn cleanup_step(&mut self, key: StepKey, discard: bool) {
        let action = if discard { "discarding" } else { "undoing" };
        tracing::debug!(
            session = %self.id,
            step = %self.step_label(key),
            action,
            "unsatisfiable step"
        );

        let step = &mut self.steps[key.0];
        step.existing = None;
        step.new = None;
        step.next_alternative = 0;
        if !discard {
            return;
        }

        step.target = None;
        if let Some(parent) = step.parent.take() {
            self.steps[parent.0].children.retain(|child| *child != key);
        }
    }
}
