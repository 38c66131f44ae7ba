//! The per-session instance graph.
//!
//! Every selected part becomes a top-level [`SessionObject`]. Its needer
//! and provider children are created with it, from the catalog object's
//! `neederObjectIds` / `providerObjectIds`, and that shape never changes.
//! Only property overrides (quantities, status, satisfying provider)
//! mutate while a session validates.

use fitment_catalog::value::EMPTY_VALUE;
use fitment_catalog::{Catalog, CatalogError, ListMap, ObjectKey, PropertyValue, ValueMap, props};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Arena slot of a session object.
///
/// Keys are handed out in creation order and never reused, so sorting by
/// key sorts by creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceKey(pub(crate) usize);

impl InstanceKey {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Unvalidated,
    Successful,
    Failed,
}

impl ValidationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unvalidated => props::STATUS_UNVALIDATED,
            Self::Successful => props::STATUS_SUCCESSFUL,
            Self::Failed => props::STATUS_FAILED,
        }
    }

    /// Read a stored status; anything unrecognised counts as unvalidated.
    pub fn from_value(value: &PropertyValue) -> Self {
        match value.as_str() {
            props::STATUS_SUCCESSFUL => Self::Successful,
            props::STATUS_FAILED => Self::Failed,
            _ => Self::Unvalidated,
        }
    }
}

impl fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One instantiated catalog object.
#[derive(Debug, Clone)]
pub struct SessionObject {
    key: InstanceKey,
    id: String,
    object: ObjectKey,
    parent: Option<InstanceKey>,
    values: ValueMap,
    lists: ListMap,
    needers: Vec<InstanceKey>,
    providers: Vec<InstanceKey>,
}

impl SessionObject {
    fn new(key: InstanceKey, id: String, object: ObjectKey, parent: Option<InstanceKey>) -> Self {
        Self {
            key,
            id,
            object,
            parent,
            values: ValueMap::new(),
            lists: ListMap::new(),
            needers: Vec::new(),
            providers: Vec::new(),
        }
    }

    pub fn key(&self) -> InstanceKey {
        self.key
    }

    /// Session-unique id: `1001` for top-level objects, `1001:2` for children.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Catalog object this instance was created from.
    pub fn object(&self) -> ObjectKey {
        self.object
    }

    pub fn parent(&self) -> Option<InstanceKey> {
        self.parent
    }

    pub fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    /// Child needers in validation order.
    pub fn needers(&self) -> &[InstanceKey] {
        &self.needers
    }

    pub fn providers(&self) -> &[InstanceKey] {
        &self.providers
    }

    pub fn value_override(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn list_override(&self, name: &str) -> Option<&[PropertyValue]> {
        self.lists.get(name).map(Vec::as_slice)
    }

    pub fn set_value(&mut self, name: &str, value: PropertyValue) {
        if name.is_empty() {
            tracing::warn!(instance = %self.id, "ignoring value write with empty property name");
            return;
        }
        self.values.insert(name.to_string(), value);
    }

    pub fn remove_value(&mut self, name: &str) -> Option<PropertyValue> {
        self.values.remove(name)
    }

    pub fn set_list(&mut self, name: &str, values: Vec<PropertyValue>) {
        if name.is_empty() {
            tracing::warn!(instance = %self.id, "ignoring list write with empty property name");
            return;
        }
        self.lists.insert(name.to_string(), values);
    }

    pub fn remove_list(&mut self, name: &str) -> Option<Vec<PropertyValue>> {
        self.lists.remove(name)
    }
}

/// Arena of session objects plus a per-catalog-object index.
#[derive(Debug, Clone)]
pub struct InstanceGraph {
    slots: Vec<Option<SessionObject>>,
    by_object: BTreeMap<ObjectKey, Vec<InstanceKey>>,
    last_id: u64,
}

impl Default for InstanceGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceGraph {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            by_object: BTreeMap::new(),
            last_id: 1000,
        }
    }

    /// Instantiate `object` as a top-level instance together with its
    /// needer and provider children.
    ///
    /// Child id lists are resolved before anything is inserted, so a
    /// dangling reference leaves the graph untouched.
    pub fn create(
        &mut self,
        catalog: &Catalog,
        object: ObjectKey,
    ) -> Result<InstanceKey, CatalogError> {
        let needer_objects = catalog.objects_by_ids(catalog.list(object, props::NEEDER_LIST))?;
        let provider_objects = catalog.objects_by_ids(catalog.list(object, props::PROVIDER_LIST))?;

        self.last_id += 1;
        let id = self.last_id.to_string();
        let parent = self.insert(SessionObject::new(self.next_key(), id.clone(), object, None));

        let mut child_counter = 0;
        let mut child_id = || {
            child_counter += 1;
            format!("{id}:{child_counter}")
        };

        let mut needers = Vec::with_capacity(needer_objects.len());
        for child in needer_objects {
            let key = self.next_key();
            needers.push(self.insert(SessionObject::new(key, child_id(), child, Some(parent))));
        }
        let mut providers = Vec::with_capacity(provider_objects.len());
        for child in provider_objects {
            let key = self.next_key();
            providers.push(self.insert(SessionObject::new(key, child_id(), child, Some(parent))));
        }
        needers.sort_by(|a, b| {
            let order = |key: &InstanceKey| {
                self.get(*key)
                    .map_or(0.0, |needer| catalog.validation_order(needer.object))
            };
            order(a).total_cmp(&order(b))
        });

        if let Some(instance) = self.get_mut(parent) {
            instance.needers = needers;
            instance.providers = providers;
        }
        Ok(parent)
    }

    fn next_key(&self) -> InstanceKey {
        InstanceKey(self.slots.len())
    }

    fn insert(&mut self, instance: SessionObject) -> InstanceKey {
        let key = instance.key;
        self.by_object.entry(instance.object).or_default().push(key);
        self.slots.push(Some(instance));
        key
    }

    /// Detach an instance and, recursively, its children.
    pub fn remove(&mut self, key: InstanceKey) -> Option<SessionObject> {
        let instance = self.slots.get_mut(key.0)?.take()?;
        for child in instance.needers.iter().chain(&instance.providers) {
            self.remove(*child);
        }
        if let Some(keys) = self.by_object.get_mut(&instance.object) {
            keys.retain(|k| *k != key);
            if keys.is_empty() {
                self.by_object.remove(&instance.object);
            }
        }
        Some(instance)
    }

    /// Detach everything.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.by_object.clear();
    }

    pub fn get(&self, key: InstanceKey) -> Option<&SessionObject> {
        self.slots.get(key.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, key: InstanceKey) -> Option<&mut SessionObject> {
        self.slots.get_mut(key.0).and_then(Option::as_mut)
    }

    pub fn contains(&self, key: InstanceKey) -> bool {
        self.get(key).is_some()
    }

    /// Live instances of `object`, in creation order.
    pub fn instances_of(&self, object: ObjectKey) -> &[InstanceKey] {
        self.by_object.get(&object).map_or(&[], Vec::as_slice)
    }

    pub fn count_of(&self, object: ObjectKey) -> usize {
        self.instances_of(object).len()
    }

    /// Look up an instance by catalog object and session id.
    pub fn find(&self, object: ObjectKey, id: &str) -> Option<&SessionObject> {
        self.instances_of(object)
            .iter()
            .filter_map(|key| self.get(*key))
            .find(|instance| instance.id == id)
    }

    /// All live instances in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &SessionObject> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Top-level instance owning `key` (itself when already top-level).
    pub fn owner(&self, key: InstanceKey) -> InstanceKey {
        self.get(key).and_then(|instance| instance.parent).unwrap_or(key)
    }

    /// Effective single value: session override, then catalog inheritance.
    pub fn value<'a>(
        &'a self,
        catalog: &'a Catalog,
        key: InstanceKey,
        name: &str,
    ) -> &'a PropertyValue {
        match self.get(key) {
            Some(instance) => match instance.values.get(name) {
                Some(value) => value,
                None => catalog.value(instance.object, name),
            },
            None => &EMPTY_VALUE,
        }
    }

    /// Effective list value: session override, then catalog inheritance.
    pub fn list<'a>(
        &'a self,
        catalog: &'a Catalog,
        key: InstanceKey,
        name: &str,
    ) -> &'a [PropertyValue] {
        match self.get(key) {
            Some(instance) => match instance.lists.get(name) {
                Some(values) => values,
                None => catalog.list(instance.object, name),
            },
            None => &[],
        }
    }

    /// Validation status of an instance.
    ///
    /// A child reports its own stored status. A top-level instance reports
    /// the first non-successful status among its needers, and is
    /// successful when it has none.
    pub fn status(&self, catalog: &Catalog, key: InstanceKey) -> ValidationStatus {
        let Some(instance) = self.get(key) else {
            return ValidationStatus::Unvalidated;
        };
        if !instance.is_top_level() {
            return ValidationStatus::from_value(self.value(catalog, key, props::VALIDATION_STATUS));
        }
        instance
            .needers
            .iter()
            .map(|needer| self.status(catalog, *needer))
            .find(|status| *status != ValidationStatus::Successful)
            .unwrap_or(ValidationStatus::Successful)
    }

    /// Human-readable label: `parent_object :: object (id)`.
    pub fn label(&self, catalog: &Catalog, key: InstanceKey) -> String {
        let Some(instance) = self.get(key) else {
            return format!("<detached #{}>", key.0);
        };
        let object = catalog.object_at(instance.object).id();
        match instance.parent.and_then(|parent| self.get(parent)) {
            Some(parent) => format!(
                "{} :: {object} ({})",
                catalog.object_at(parent.object).id(),
                instance.id
            ),
            None => format!("{object} ({})", instance.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitment_catalog::{ClassDocument, ObjectDocument};

    fn catalog() -> Catalog {
        Catalog::builder("graph")
            .class(
                ClassDocument::new("Server", props::BASE_OBJECT_CLASS).with_object(
                    ObjectDocument::new("server")
                        .with_list(props::NEEDER_LIST, ["psu_needer", "cpu_needer"])
                        .with_list(props::PROVIDER_LIST, ["slot_provider"]),
                ),
            )
            .class(
                ClassDocument::new("Needers", props::BASE_NEEDER_CLASS)
                    .with_object(
                        ObjectDocument::new("psu_needer").with_value(props::VALIDATION_ORDER, 20),
                    )
                    .with_object(
                        ObjectDocument::new("cpu_needer").with_value(props::VALIDATION_ORDER, 10),
                    ),
            )
            .class(
                ClassDocument::new("Providers", props::BASE_PROVIDER_CLASS).with_object(
                    ObjectDocument::new("slot_provider").with_value(props::QTY_PROVIDED, 4),
                ),
            )
            .class(
                ClassDocument::new("Broken", props::BASE_OBJECT_CLASS).with_object(
                    ObjectDocument::new("broken").with_list(props::NEEDER_LIST, ["missing"]),
                ),
            )
            .build()
            .expect("graph catalog should build")
    }

    #[test]
    fn create_builds_fixed_children_with_ids() {
        let catalog = catalog();
        let server = catalog.object_key("server").expect("server exists");
        let mut graph = InstanceGraph::new();

        let first = graph.create(&catalog, server).expect("create should work");
        let second = graph.create(&catalog, server).expect("create should work");

        let first = graph.get(first).expect("first is live");
        assert_eq!(first.id(), "1001");
        let needer_ids: Vec<&str> = first
            .needers()
            .iter()
            .map(|key| graph.get(*key).expect("needer is live").id())
            .collect();
        // needers sort by validation order but keep creation ids
        assert_eq!(needer_ids, vec!["1001:2", "1001:1"]);
        let provider = graph.get(first.providers()[0]).expect("provider is live");
        assert_eq!(provider.id(), "1001:3");
        assert_eq!(provider.parent(), Some(first.key()));

        assert_eq!(graph.get(second).expect("second is live").id(), "1002");
        assert_eq!(graph.count_of(server), 2);
        assert_eq!(graph.len(), 8);
    }

    #[test]
    fn overrides_shadow_catalog_values() {
        let catalog = catalog();
        let server = catalog.object_key("server").expect("server exists");
        let mut graph = InstanceGraph::new();
        let key = graph.create(&catalog, server).expect("create should work");
        let provider = graph.get(key).expect("live").providers()[0];

        assert_eq!(
            graph.value(&catalog, provider, props::QTY_PROVIDED),
            &PropertyValue::Number(4.0)
        );
        graph
            .get_mut(provider)
            .expect("live")
            .set_value(props::QTY_PROVIDED, PropertyValue::Number(1.0));
        assert_eq!(
            graph.value(&catalog, provider, props::QTY_PROVIDED),
            &PropertyValue::Number(1.0)
        );

        graph.get_mut(provider).expect("live").set_value("", PropertyValue::Bool(true));
        assert!(graph.get(provider).expect("live").value_override("").is_none());
    }

    #[test]
    fn status_combines_needers() {
        let catalog = catalog();
        let server = catalog.object_key("server").expect("server exists");
        let slot_class = catalog.class_key("Providers").expect("class exists");
        let mut graph = InstanceGraph::new();
        let key = graph.create(&catalog, server).expect("create should work");
        let needers = graph.get(key).expect("live").needers().to_vec();

        assert_eq!(graph.status(&catalog, key), ValidationStatus::Unvalidated);
        for needer in &needers {
            graph
                .get_mut(*needer)
                .expect("live")
                .set_value(props::VALIDATION_STATUS, props::STATUS_SUCCESSFUL.into());
        }
        assert_eq!(graph.status(&catalog, key), ValidationStatus::Successful);

        graph
            .get_mut(needers[1])
            .expect("live")
            .set_value(props::VALIDATION_STATUS, props::STATUS_FAILED.into());
        assert_eq!(graph.status(&catalog, key), ValidationStatus::Failed);

        // a top-level object without needers is successful by default
        let mut bare = InstanceGraph::new();
        let slot = catalog.descendant_objects(slot_class)[0];
        let loose = bare.create(&catalog, slot).expect("create should work");
        assert_eq!(bare.status(&catalog, loose), ValidationStatus::Successful);
    }

    #[test]
    fn remove_detaches_children() {
        let catalog = catalog();
        let server = catalog.object_key("server").expect("server exists");
        let mut graph = InstanceGraph::new();
        let key = graph.create(&catalog, server).expect("create should work");
        let kept = graph.create(&catalog, server).expect("create should work");

        assert!(graph.remove(key).is_some());
        assert!(graph.remove(key).is_none());
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.instances_of(server), &[kept]);
        assert!(graph.find(server, "1001").is_none());
        assert!(graph.find(server, "1002").is_some());
    }

    #[test]
    fn dangling_child_reference_leaves_graph_untouched() {
        let catalog = catalog();
        let broken = catalog.object_key("broken").expect("broken exists");
        let mut graph = InstanceGraph::new();

        let err = graph.create(&catalog, broken).expect_err("missing child must fail");
        assert!(matches!(err, CatalogError::UnknownObject { .. }));
        assert!(graph.is_empty());
    }
}
