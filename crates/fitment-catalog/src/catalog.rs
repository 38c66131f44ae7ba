//! The immutable catalog and its builder.
//!
//! Loading is two-pass: every class document is registered first, then
//! parent links are resolved and the per-object rule applicability cache
//! is computed. Nothing changes after `build()`, so one `Catalog` can be
//! shared by any number of sessions.

use crate::error::CatalogError;
use crate::model::{
    ClassDocument, ClassKey, ModelClass, ModelObject, ObjectDocument, ObjectKey, ValueMap,
};
use crate::props;
use crate::value::{EMPTY_VALUE, PropertyValue};
use std::collections::{BTreeMap, BTreeSet};

/// Read-only schema of classes and objects.
#[derive(Debug, Clone)]
pub struct Catalog {
    name: String,
    classes: Vec<ModelClass>,
    objects: Vec<ModelObject>,
    class_index: BTreeMap<String, ClassKey>,
    object_index: BTreeMap<String, ObjectKey>,
}

/// Class documents every catalog starts from: the model roots and the
/// common rule classes.
pub fn base_model() -> Vec<ClassDocument> {
    vec![
        ClassDocument::root(props::BASE_OBJECT_CLASS)
            .with_value(props::VALIDATION_ORDER, 0)
            .with_value(props::VALIDATION_STATUS, props::STATUS_UNVALIDATED)
            .with_value(props::PART_NUMBER, ""),
        ClassDocument::root(props::BASE_NEEDER_CLASS)
            .with_value(props::VALIDATION_ORDER, 0)
            .with_value(props::VALIDATION_STATUS, props::STATUS_UNVALIDATED)
            .with_value(props::PROTOCOL_TYPE, "")
            .with_value(props::QTY_NEEDED, 1)
            .with_value(props::TRY_NEW_PROVIDERS, true)
            .with_value(props::SATISFYING_PROVIDER_ID, "")
            .with_value(props::SATISFYING_PROVIDER_MODEL_ID, ""),
        ClassDocument::root(props::BASE_PROVIDER_CLASS)
            .with_value(props::PROTOCOL_TYPE, "")
            .with_value(props::QTY_PROVIDED, 0),
        ClassDocument::root(props::BASE_RULE_CLASS)
            .with_value(props::VALIDATION_ORDER, 0)
            .with_value(props::PROTOCOL_TYPE, props::ANY_PROTOCOL)
            .with_value(props::RULE_KIND, ""),
        ClassDocument::new(props::PROPERTY_VALUE_FILTER_CLASS, props::BASE_RULE_CLASS)
            .with_value(props::RULE_KIND, props::RULE_KIND_PROPERTY_VALUE_FILTER)
            .with_value(props::RULE_PROPERTY_NAME, "")
            .with_value(props::RULE_PROPERTY_ON_PARENT, false),
        ClassDocument::new(props::SESSION_MAXIMUM_FILTER_CLASS, props::BASE_RULE_CLASS)
            .with_value(props::RULE_KIND, props::RULE_KIND_SESSION_MAXIMUM_FILTER),
    ]
}

/// Collects class documents and builds a [`Catalog`].
#[derive(Debug, Clone)]
pub struct CatalogBuilder {
    name: String,
    documents: Vec<ClassDocument>,
}

impl CatalogBuilder {
    /// Start a catalog seeded with [`base_model`].
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: base_model(),
        }
    }

    pub fn add_class(&mut self, document: ClassDocument) -> &mut Self {
        self.documents.push(document);
        self
    }

    pub fn class(mut self, document: ClassDocument) -> Self {
        self.documents.push(document);
        self
    }

    pub fn build(self) -> Result<Catalog, CatalogError> {
        let mut catalog = Catalog {
            name: self.name,
            classes: Vec::with_capacity(self.documents.len()),
            objects: Vec::new(),
            class_index: BTreeMap::new(),
            object_index: BTreeMap::new(),
        };

        let mut parent_ids = Vec::with_capacity(self.documents.len());
        for document in self.documents {
            parent_ids.push(document.parent_class_id.clone());
            catalog.register_class(document)?;
        }

        catalog.link_parents(&parent_ids)?;
        catalog.cache_rules()?;
        Ok(catalog)
    }
}

impl Catalog {
    pub fn builder(name: impl Into<String>) -> CatalogBuilder {
        CatalogBuilder::new(name)
    }

    fn register_class(&mut self, document: ClassDocument) -> Result<(), CatalogError> {
        if self.class_index.contains_key(&document.class_id) {
            return Err(CatalogError::DuplicateClass {
                catalog: self.name.clone(),
                id: document.class_id,
            });
        }

        let key = ClassKey(self.classes.len());
        let mut objects = Vec::with_capacity(document.objects.len());
        for ObjectDocument {
            object_id,
            properties,
            list_properties,
        } in document.objects
        {
            if self.object_index.contains_key(&object_id) {
                return Err(CatalogError::DuplicateObject {
                    catalog: self.name.clone(),
                    id: object_id,
                });
            }
            let object_key = ObjectKey(self.objects.len());
            self.object_index.insert(object_id.clone(), object_key);
            self.objects.push(ModelObject {
                key: object_key,
                id: object_id,
                class: key,
                values: properties,
                lists: list_properties,
                rules: Vec::new(),
            });
            objects.push(object_key);
        }

        self.class_index.insert(document.class_id.clone(), key);
        self.classes.push(ModelClass {
            key,
            id: document.class_id,
            parent: None,
            children: Vec::new(),
            values: document.properties,
            lists: document.list_properties,
            objects,
        });
        Ok(())
    }

    fn link_parents(&mut self, parent_ids: &[Option<String>]) -> Result<(), CatalogError> {
        for (index, parent_id) in parent_ids.iter().enumerate() {
            let class_id = self.classes[index].id.clone();
            let parent = match parent_id.as_deref().filter(|id| !id.is_empty()) {
                Some(parent_id) => match self.class_index.get(parent_id) {
                    Some(parent) => Some(*parent),
                    None => {
                        return Err(CatalogError::MissingParent {
                            catalog: self.name.clone(),
                            class_id,
                            parent_id: parent_id.to_string(),
                        });
                    }
                },
                None => None,
            };

            if parent.is_none() && !props::MODEL_ROOT_CLASSES.contains(&class_id.as_str()) {
                return Err(CatalogError::MissingParent {
                    catalog: self.name.clone(),
                    class_id,
                    parent_id: String::new(),
                });
            }

            self.classes[index].parent = parent;
            if let Some(parent) = parent {
                self.classes[parent.0].children.push(ClassKey(index));
            }
        }
        Ok(())
    }

    /// Compute, once, the rules that may apply to each object.
    fn cache_rules(&mut self) -> Result<(), CatalogError> {
        let base_rule = self.class_key(props::BASE_RULE_CLASS)?;
        let rules = self.descendant_objects(base_rule);

        let mut applicable: BTreeMap<ObjectKey, Vec<ObjectKey>> = BTreeMap::new();
        for rule in rules {
            let mut matching = BTreeSet::new();
            for class_id in self.list(rule, props::APPLICABLE_CLASS_ID_LIST) {
                let class = self.class_key(class_id.as_str())?;
                matching.extend(self.descendant_objects(class));
            }
            for object_id in self.list(rule, props::APPLICABLE_OBJECT_ID_LIST) {
                matching.insert(self.object_key(object_id.as_str())?);
            }
            for object_id in self.list(rule, props::INAPPLICABLE_OBJECT_ID_LIST) {
                matching.remove(&self.object_key(object_id.as_str())?);
            }
            for object in matching {
                applicable.entry(object).or_default().push(rule);
            }
        }

        for (object, mut rules) in applicable {
            rules.sort_by(|a, b| {
                self.validation_order(*a)
                    .total_cmp(&self.validation_order(*b))
                    .then_with(|| self.objects[a.0].id.cmp(&self.objects[b.0].id))
            });
            self.objects[object.0].rules = rules;
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn class(&self, id: &str) -> Result<&ModelClass, CatalogError> {
        self.class_key(id).map(|key| &self.classes[key.0])
    }

    pub fn object(&self, id: &str) -> Result<&ModelObject, CatalogError> {
        self.object_key(id).map(|key| &self.objects[key.0])
    }

    pub fn class_key(&self, id: &str) -> Result<ClassKey, CatalogError> {
        self.class_index
            .get(id)
            .copied()
            .ok_or_else(|| CatalogError::UnknownClass {
                catalog: self.name.clone(),
                id: id.to_string(),
            })
    }

    pub fn object_key(&self, id: &str) -> Result<ObjectKey, CatalogError> {
        self.object_index
            .get(id)
            .copied()
            .ok_or_else(|| CatalogError::UnknownObject {
                catalog: self.name.clone(),
                id: id.to_string(),
            })
    }

    pub fn class_at(&self, key: ClassKey) -> &ModelClass {
        &self.classes[key.0]
    }

    pub fn object_at(&self, key: ObjectKey) -> &ModelObject {
        &self.objects[key.0]
    }

    /// Resolve a list of object ids (typically a list property).
    pub fn objects_by_ids(&self, ids: &[PropertyValue]) -> Result<Vec<ObjectKey>, CatalogError> {
        ids.iter().map(|id| self.object_key(id.as_str())).collect()
    }

    /// All classes in definition order.
    pub fn classes(&self) -> impl Iterator<Item = &ModelClass> {
        self.classes.iter()
    }

    /// All objects in definition order.
    pub fn objects(&self) -> impl Iterator<Item = &ModelObject> {
        self.objects.iter()
    }

    /// Single-valued property of a class, walking up the parent chain.
    pub fn class_value(&self, class: ClassKey, name: &str) -> &PropertyValue {
        let mut current = Some(class);
        while let Some(key) = current {
            let class = &self.classes[key.0];
            if let Some(value) = class.values.get(name) {
                return value;
            }
            current = class.parent;
        }
        &EMPTY_VALUE
    }

    /// List property of a class, walking up the parent chain.
    pub fn class_list(&self, class: ClassKey, name: &str) -> &[PropertyValue] {
        let mut current = Some(class);
        while let Some(key) = current {
            let class = &self.classes[key.0];
            if let Some(values) = class.lists.get(name) {
                return values;
            }
            current = class.parent;
        }
        &[]
    }

    /// Single-valued property of an object with class inheritance fallback.
    pub fn value(&self, object: ObjectKey, name: &str) -> &PropertyValue {
        let object = &self.objects[object.0];
        match object.values.get(name) {
            Some(value) => value,
            None => self.class_value(object.class, name),
        }
    }

    /// List property of an object with class inheritance fallback.
    pub fn list(&self, object: ObjectKey, name: &str) -> &[PropertyValue] {
        let object = &self.objects[object.0];
        match object.lists.get(name) {
            Some(values) => values,
            None => self.class_list(object.class, name),
        }
    }

    /// Validation order of an object; non-numeric orders sort as zero.
    pub fn validation_order(&self, object: ObjectKey) -> f64 {
        self.value(object, props::VALIDATION_ORDER)
            .as_f64()
            .unwrap_or(0.0)
    }

    /// Whether `class` is `ancestor` or one of its subclasses.
    pub fn is_class_descendant(&self, class: ClassKey, ancestor: ClassKey) -> bool {
        let mut current = Some(class);
        while let Some(key) = current {
            if key == ancestor {
                return true;
            }
            current = self.classes[key.0].parent;
        }
        false
    }

    /// Whether `object` is instantiated from `ancestor` or a subclass of it.
    pub fn is_descendant(&self, object: ObjectKey, ancestor: ClassKey) -> bool {
        self.is_class_descendant(self.objects[object.0].class, ancestor)
    }

    /// Objects of `class` and of every subclass, own objects first.
    pub fn descendant_objects(&self, class: ClassKey) -> Vec<ObjectKey> {
        let mut out = Vec::new();
        self.collect_descendant_objects(class, &mut out);
        out
    }

    fn collect_descendant_objects(&self, class: ClassKey, out: &mut Vec<ObjectKey>) {
        let class = &self.classes[class.0];
        out.extend_from_slice(&class.objects);
        for child in &class.children {
            self.collect_descendant_objects(*child, out);
        }
    }

    /// `class` itself followed by every subclass, depth first.
    pub fn descendant_classes(&self, class: ClassKey) -> Vec<ClassKey> {
        let mut out = Vec::new();
        self.collect_descendant_classes(class, &mut out);
        out
    }

    fn collect_descendant_classes(&self, class: ClassKey, out: &mut Vec<ClassKey>) {
        out.push(class);
        for child in &self.classes[class.0].children {
            self.collect_descendant_classes(*child, out);
        }
    }

    /// Rule objects that may apply to `object`, in application order.
    pub fn applicable_rules(&self, object: ObjectKey) -> &[ObjectKey] {
        &self.objects[object.0].rules
    }

    /// Own value map of an object merged over its inherited values.
    pub fn resolved_values(&self, object: ObjectKey) -> ValueMap {
        let mut chain = Vec::new();
        let mut current = Some(self.objects[object.0].class);
        while let Some(key) = current {
            chain.push(key);
            current = self.classes[key.0].parent;
        }

        let mut out = ValueMap::new();
        for key in chain.into_iter().rev() {
            out.extend(
                self.classes[key.0]
                    .values
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone())),
            );
        }
        out.extend(
            self.objects[object.0]
                .values
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ObjectDocument;

    fn sample() -> Catalog {
        Catalog::builder("sample")
            .class(
                ClassDocument::new("Controller", props::BASE_OBJECT_CLASS)
                    .with_value(props::PART_NUMBER, "CTRL-0")
                    .with_object(ObjectDocument::new("pcie_controller"))
                    .with_object(
                        ObjectDocument::new("pcix_controller")
                            .with_value(props::PART_NUMBER, "CTRL-X"),
                    ),
            )
            .class(
                ClassDocument::new("RaidController", "Controller")
                    .with_list(props::NEEDER_LIST, ["raid_slot_needer"])
                    .with_object(ObjectDocument::new("raid_controller")),
            )
            .class(
                ClassDocument::new("SlotNeeder", props::BASE_NEEDER_CLASS)
                    .with_object(ObjectDocument::new("raid_slot_needer")),
            )
            .class(
                ClassDocument::new("Caps", props::SESSION_MAXIMUM_FILTER_CLASS).with_object(
                    ObjectDocument::new("late_cap")
                        .with_value(props::VALIDATION_ORDER, 5)
                        .with_list(props::APPLICABLE_CLASS_ID_LIST, ["Controller"])
                        .with_list(props::INAPPLICABLE_OBJECT_ID_LIST, ["pcix_controller"]),
                ),
            )
            .class(
                ClassDocument::new("Filters", props::PROPERTY_VALUE_FILTER_CLASS).with_object(
                    ObjectDocument::new("early_filter")
                        .with_value(props::VALIDATION_ORDER, 1)
                        .with_list(props::APPLICABLE_OBJECT_ID_LIST, ["raid_controller"]),
                ),
            )
            .build()
            .expect("sample catalog should build")
    }

    #[test]
    fn object_values_fall_back_through_class_chain() {
        let catalog = sample();
        let raid = catalog.object_key("raid_controller").expect("raid exists");
        let pcix = catalog.object_key("pcix_controller").expect("pcix exists");

        assert_eq!(catalog.value(raid, props::PART_NUMBER).as_str(), "CTRL-0");
        assert_eq!(catalog.value(pcix, props::PART_NUMBER).as_str(), "CTRL-X");
        assert_eq!(
            catalog.value(raid, props::VALIDATION_STATUS).as_str(),
            props::STATUS_UNVALIDATED
        );
        assert_eq!(catalog.value(raid, "undefined"), &PropertyValue::Empty);
        assert!(catalog.list(raid, "undefined").is_empty());
        assert_eq!(catalog.list(raid, props::NEEDER_LIST).len(), 1);
    }

    #[test]
    fn descendant_objects_lists_own_objects_before_subclasses() {
        let catalog = sample();
        let controller = catalog.class_key("Controller").expect("class exists");
        let ids: Vec<&str> = catalog
            .descendant_objects(controller)
            .into_iter()
            .map(|key| catalog.object_at(key).id())
            .collect();
        assert_eq!(ids, vec!["pcie_controller", "pcix_controller", "raid_controller"]);
    }

    #[test]
    fn rule_cache_applies_includes_excludes_and_priority() {
        let catalog = sample();
        let rule_ids = |object: &str| -> Vec<String> {
            let key = catalog.object_key(object).expect("object exists");
            catalog
                .applicable_rules(key)
                .iter()
                .map(|rule| catalog.object_at(*rule).id().to_string())
                .collect()
        };

        assert_eq!(rule_ids("pcie_controller"), vec!["late_cap"]);
        assert!(rule_ids("pcix_controller").is_empty());
        assert_eq!(rule_ids("raid_controller"), vec!["early_filter", "late_cap"]);
    }

    #[test]
    fn missing_parent_is_rejected() {
        let err = Catalog::builder("broken")
            .class(ClassDocument::new("Orphan", "Nowhere"))
            .build()
            .expect_err("orphan class must fail");
        assert!(matches!(err, CatalogError::MissingParent { .. }));
        assert_eq!(err.catalog(), "broken");
    }

    #[test]
    fn parentless_non_root_is_rejected() {
        let err = Catalog::builder("broken")
            .class(ClassDocument::root("Floating"))
            .build()
            .expect_err("non-root without parent must fail");
        assert!(matches!(err, CatalogError::MissingParent { .. }));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = Catalog::builder("dup")
            .class(ClassDocument::new(props::BASE_OBJECT_CLASS, props::BASE_OBJECT_CLASS))
            .build()
            .expect_err("redefining a root must fail");
        assert!(matches!(err, CatalogError::DuplicateClass { .. }));

        let err = Catalog::builder("dup")
            .class(
                ClassDocument::new("A", props::BASE_OBJECT_CLASS)
                    .with_object(ObjectDocument::new("x")),
            )
            .class(
                ClassDocument::new("B", props::BASE_OBJECT_CLASS)
                    .with_object(ObjectDocument::new("x")),
            )
            .build()
            .expect_err("duplicate object must fail");
        assert!(matches!(err, CatalogError::DuplicateObject { .. }));
    }

    #[test]
    fn unknown_rule_reference_is_a_schema_error() {
        let err = Catalog::builder("refs")
            .class(
                ClassDocument::new("Caps", props::SESSION_MAXIMUM_FILTER_CLASS).with_object(
                    ObjectDocument::new("cap")
                        .with_list(props::APPLICABLE_CLASS_ID_LIST, ["Missing"]),
                ),
            )
            .build()
            .expect_err("unknown class reference must fail");
        assert!(matches!(err, CatalogError::UnknownClass { ref id, .. } if id == "Missing"));
    }

    #[test]
    fn lookups_report_not_found() {
        let catalog = sample();
        assert!(matches!(
            catalog.object("nope"),
            Err(CatalogError::UnknownObject { .. })
        ));
        assert!(matches!(
            catalog.class("Nope"),
            Err(CatalogError::UnknownClass { .. })
        ));
    }

    #[test]
    fn resolved_values_merge_inheritance() {
        let catalog = sample();
        let pcix = catalog.object_key("pcix_controller").expect("pcix exists");
        let values = catalog.resolved_values(pcix);
        assert_eq!(values[props::PART_NUMBER].as_str(), "CTRL-X");
        assert_eq!(values[props::VALIDATION_ORDER], PropertyValue::Number(0.0));
    }

    #[test]
    fn descendant_classes_walk_depth_first() {
        let catalog = sample();
        let base = catalog.class_key(props::BASE_OBJECT_CLASS).expect("class exists");
        let ids: Vec<&str> = catalog
            .descendant_classes(base)
            .into_iter()
            .map(|class| catalog.class_at(class).id())
            .collect();
        assert_eq!(ids, vec![props::BASE_OBJECT_CLASS, "Controller", "RaidController"]);
    }
}
