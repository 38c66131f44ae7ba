//! Catalog classes and objects.
//!
//! Classes form a single-inheritance forest rooted at the model root
//! classes. Objects are instantiated from exactly one class and inherit
//! every property they do not override.
//!
//! ```text
//! BaseObject ── Controller ── pcie_controller, pcix_controller
//!            └─ Backplane  ── pcie_backplane_2_slot
//! BaseNeeder ── SlotNeeder ── pcie_slot_needer
//! ```

use crate::value::PropertyValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Arena index of a class inside its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassKey(pub(crate) usize);

/// Arena index of an object inside its catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectKey(pub(crate) usize);

impl ClassKey {
    pub fn index(self) -> usize {
        self.0
    }
}

impl ObjectKey {
    pub fn index(self) -> usize {
        self.0
    }
}

pub type ValueMap = BTreeMap<String, PropertyValue>;
pub type ListMap = BTreeMap<String, Vec<PropertyValue>>;

/// A class in the catalog.
#[derive(Debug, Clone)]
pub struct ModelClass {
    pub(crate) key: ClassKey,
    pub(crate) id: String,
    pub(crate) parent: Option<ClassKey>,
    pub(crate) children: Vec<ClassKey>,
    pub(crate) values: ValueMap,
    pub(crate) lists: ListMap,
    pub(crate) objects: Vec<ObjectKey>,
}

impl ModelClass {
    pub fn key(&self) -> ClassKey {
        self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<ClassKey> {
        self.parent
    }

    /// Direct subclasses in definition order.
    pub fn children(&self) -> &[ClassKey] {
        &self.children
    }

    /// Objects instantiated directly from this class.
    pub fn objects(&self) -> &[ObjectKey] {
        &self.objects
    }

    /// Properties defined on this class itself (no inheritance).
    pub fn own_values(&self) -> &ValueMap {
        &self.values
    }

    pub fn own_lists(&self) -> &ListMap {
        &self.lists
    }
}

/// An object in the catalog.
#[derive(Debug, Clone)]
pub struct ModelObject {
    pub(crate) key: ObjectKey,
    pub(crate) id: String,
    pub(crate) class: ClassKey,
    pub(crate) values: ValueMap,
    pub(crate) lists: ListMap,
    pub(crate) rules: Vec<ObjectKey>,
}

impl ModelObject {
    pub fn key(&self) -> ObjectKey {
        self.key
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn class(&self) -> ClassKey {
        self.class
    }

    pub fn own_values(&self) -> &ValueMap {
        &self.values
    }

    pub fn own_lists(&self) -> &ListMap {
        &self.lists
    }
}

/// On-disk form of one class and the objects instantiated from it.
///
/// One JSON file per class:
///
/// ```json
/// {
///   "classId": "Backplane",
///   "parentClassId": "BaseObject",
///   "properties": { "maximum": 1 },
///   "objects": [
///     {
///       "objectId": "pcie_backplane_2_slot",
///       "listProperties": { "providerObjectIds": ["pcie_slot_x2"] }
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ClassDocument {
    pub class_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_class_id: Option<String>,
    #[serde(default)]
    pub properties: ValueMap,
    #[serde(default)]
    pub list_properties: ListMap,
    #[serde(default)]
    pub objects: Vec<ObjectDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectDocument {
    pub object_id: String,
    #[serde(default)]
    pub properties: ValueMap,
    #[serde(default)]
    pub list_properties: ListMap,
}

impl ClassDocument {
    pub fn new(class_id: impl Into<String>, parent_class_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            parent_class_id: Some(parent_class_id.into()),
            ..Self::default()
        }
    }

    /// A class with no parent. Only valid for the model roots.
    pub fn root(class_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn with_list<V: Into<PropertyValue>>(
        mut self,
        name: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.list_properties
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_object(mut self, object: ObjectDocument) -> Self {
        self.objects.push(object);
        self
    }
}

impl ObjectDocument {
    pub fn new(object_id: impl Into<String>) -> Self {
        Self {
            object_id: object_id.into(),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn with_list<V: Into<PropertyValue>>(
        mut self,
        name: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.list_properties
            .insert(name.to_string(), values.into_iter().map(Into::into).collect());
        self
    }
}
