//! Reversible property changes.
//!
//! Each change stores the *override* that was in place before the write
//! (or `None` when the instance was still reading through to the
//! catalog), so replaying the log restores the override maps exactly.

use crate::instance::{InstanceGraph, InstanceKey};
use fitment_catalog::PropertyValue;

#[derive(Debug, Clone, PartialEq)]
pub enum ReversibleChange {
    Value {
        instance: InstanceKey,
        name: String,
        previous: Option<PropertyValue>,
    },
    List {
        instance: InstanceKey,
        name: String,
        previous: Option<Vec<PropertyValue>>,
    },
}

impl ReversibleChange {
    /// Put the previous override back. Detached instances are skipped.
    pub fn revert(self, graph: &mut InstanceGraph) {
        match self {
            Self::Value {
                instance,
                name,
                previous,
            } => {
                let Some(object) = graph.get_mut(instance) else {
                    return;
                };
                match previous {
                    Some(value) => object.set_value(&name, value),
                    None => {
                        object.remove_value(&name);
                    }
                }
            }
            Self::List {
                instance,
                name,
                previous,
            } => {
                let Some(object) = graph.get_mut(instance) else {
                    return;
                };
                match previous {
                    Some(values) => object.set_list(&name, values),
                    None => {
                        object.remove_list(&name);
                    }
                }
            }
        }
    }
}

/// Changes applied while trying one alternative, newest last.
#[derive(Debug, Clone, Default)]
pub struct UndoLog {
    changes: Vec<ReversibleChange>,
}

impl UndoLog {
    /// Record the current override of `name`, then overwrite it.
    pub fn set_value(
        &mut self,
        graph: &mut InstanceGraph,
        instance: InstanceKey,
        name: &str,
        value: PropertyValue,
    ) {
        let Some(object) = graph.get_mut(instance) else {
            return;
        };
        self.changes.push(ReversibleChange::Value {
            instance,
            name: name.to_string(),
            previous: object.value_override(name).cloned(),
        });
        object.set_value(name, value);
    }

    pub fn set_list(
        &mut self,
        graph: &mut InstanceGraph,
        instance: InstanceKey,
        name: &str,
        values: Vec<PropertyValue>,
    ) {
        let Some(object) = graph.get_mut(instance) else {
            return;
        };
        self.changes.push(ReversibleChange::List {
            instance,
            name: name.to_string(),
            previous: object.list_override(name).map(<[PropertyValue]>::to_vec),
        });
        object.set_list(name, values);
    }

    /// Replay every change in reverse order, leaving the log empty.
    pub fn revert(&mut self, graph: &mut InstanceGraph) {
        while let Some(change) = self.changes.pop() {
            change.revert(graph);
        }
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
