//! Validation results.
//!
//! A [`ValidationReport`] is a snapshot of every top-level instance in a
//! session, ordered by catalog object id and then creation order. It
//! serializes as camelCase JSON and renders as plain text.

use crate::instance::{InstanceKey, ValidationStatus};
use crate::session::Session;
use fitment_catalog::{PropertyValue, props};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub catalog: String,
    pub session_id: String,
    pub instances: Vec<InstanceReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceReport {
    pub object_id: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub part_number: String,
    pub status: ValidationStatus,
    #[serde(default)]
    pub needers: Vec<NeederReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<ProviderReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeederReport {
    pub object_id: String,
    pub id: String,
    pub status: ValidationStatus,
    pub satisfied_by: Option<ProviderRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRef {
    pub object_id: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderReport {
    pub object_id: String,
    pub id: String,
    pub unused_quantity: f64,
}

impl ValidationReport {
    pub fn from_session(session: &Session) -> Self {
        let catalog = session.catalog();
        let graph = session.graph();

        let mut top_level: Vec<InstanceKey> = graph
            .iter()
            .filter(|instance| instance.is_top_level())
            .map(|instance| instance.key())
            .collect();
        top_level.sort_by(|a, b| {
            let object_id = |key: &InstanceKey| {
                graph
                    .get(*key)
                    .map_or("", |instance| catalog.object_at(instance.object()).id())
            };
            object_id(a).cmp(object_id(b)).then(a.cmp(b))
        });

        let instances = top_level
            .into_iter()
            .filter_map(|key| {
                let instance = graph.get(key)?;
                Some(InstanceReport {
                    object_id: catalog.object_at(instance.object()).id().to_string(),
                    id: instance.id().to_string(),
                    part_number: session.value(key, props::PART_NUMBER).as_str().to_string(),
                    status: session.status(key),
                    needers: instance
                        .needers()
                        .iter()
                        .filter_map(|needer| needer_report(session, *needer))
                        .collect(),
                    providers: instance
                        .providers()
                        .iter()
                        .filter_map(|provider| provider_report(session, *provider))
                        .collect(),
                })
            })
            .collect();

        Self {
            catalog: catalog.name().to_string(),
            session_id: session.id().to_string(),
            instances,
        }
    }

    /// Drop the per-provider listing.
    pub fn without_providers(mut self) -> Self {
        for instance in &mut self.instances {
            instance.providers.clear();
        }
        self
    }

    /// True when every top-level instance validated successfully.
    pub fn is_successful(&self) -> bool {
        self.instances
            .iter()
            .all(|instance| instance.status == ValidationStatus::Successful)
    }

    pub fn render_text(&self, skip_providers: bool) -> String {
        let mut lines = vec!["RESULTS:".to_string()];
        for instance in &self.instances {
            let part_number = if instance.part_number.is_empty() {
                String::new()
            } else {
                format!(", Part Number = {}", instance.part_number)
            };
            lines.push(format!(
                "{} (ID = {}){part_number}, Status = {}",
                instance.object_id, instance.id, instance.status
            ));

            if !instance.needers.is_empty() {
                lines.push("  NEEDERS:".to_string());
                for needer in &instance.needers {
                    let provider = match &needer.satisfied_by {
                        Some(provider) => format!("{} (ID = {})", provider.object_id, provider.id),
                        None => "none".to_string(),
                    };
                    lines.push(format!("    {} (ID = {}) -> {provider}", needer.object_id, needer.id));
                }
            }

            if !skip_providers && !instance.providers.is_empty() {
                lines.push("  PROVIDERS:".to_string());
                for provider in &instance.providers {
                    lines.push(format!(
                        "    {} (ID = {}), Unused Quantity = {}",
                        provider.object_id,
                        provider.id,
                        PropertyValue::Number(provider.unused_quantity)
                    ));
                }
            }
        }
        lines.join("\n")
    }
}

fn needer_report(session: &Session, needer: InstanceKey) -> Option<NeederReport> {
    let instance = session.graph().get(needer)?;
    let provider_object = session.value(needer, props::SATISFYING_PROVIDER_MODEL_ID).as_str();
    let satisfied_by = (!provider_object.is_empty()).then(|| ProviderRef {
        object_id: provider_object.to_string(),
        id: session
            .value(needer, props::SATISFYING_PROVIDER_ID)
            .as_str()
            .to_string(),
    });
    Some(NeederReport {
        object_id: session.catalog().object_at(instance.object()).id().to_string(),
        id: instance.id().to_string(),
        status: session.status(needer),
        satisfied_by,
    })
}

fn provider_report(session: &Session, provider: InstanceKey) -> Option<ProviderReport> {
    let instance = session.graph().get(provider)?;
    Some(ProviderReport {
        object_id: session.catalog().object_at(instance.object()).id().to_string(),
        id: instance.id().to_string(),
        unused_quantity: session
            .value(provider, props::QTY_PROVIDED)
            .as_f64()
            .unwrap_or(0.0),
    })
}
