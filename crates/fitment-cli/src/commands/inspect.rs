use crate::support::{exit_with, join_or_dash, print_json};
use fitment_catalog::{Catalog, ObjectKey, ValueMap, props};
use fitment_engine::{EngineConfig, SessionManager};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogSummary {
    catalog: String,
    class_count: usize,
    object_count: usize,
    selectable_classes: Vec<String>,
    top_level: Vec<TopLevelSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TopLevelSummary {
    object_id: String,
    class_id: String,
    part_number: String,
    validation_order: f64,
    needers: Vec<String>,
    providers: Vec<String>,
    rules: Vec<String>,
    /// Effective properties after inheritance.
    properties: ValueMap,
}

fn ids(catalog: &Catalog, object: ObjectKey, list: &str) -> Vec<String> {
    catalog
        .list(object, list)
        .iter()
        .map(|id| id.as_str().to_string())
        .collect()
}

fn summarize(catalog: &Catalog) -> CatalogSummary {
    let base_object = catalog
        .class_key(props::BASE_OBJECT_CLASS)
        .unwrap_or_else(|e| exit_with(e));

    let mut top_level: Vec<TopLevelSummary> = catalog
        .descendant_objects(base_object)
        .into_iter()
        .map(|object| {
            let model = catalog.object_at(object);
            TopLevelSummary {
                object_id: model.id().to_string(),
                class_id: catalog.class_at(model.class()).id().to_string(),
                part_number: catalog.value(object, props::PART_NUMBER).as_str().to_string(),
                validation_order: catalog.validation_order(object),
                needers: ids(catalog, object, props::NEEDER_LIST),
                providers: ids(catalog, object, props::PROVIDER_LIST),
                rules: catalog
                    .applicable_rules(object)
                    .iter()
                    .map(|rule| catalog.object_at(*rule).id().to_string())
                    .collect(),
                properties: catalog.resolved_values(object),
            }
        })
        .collect();
    top_level.sort_by(|a, b| a.object_id.cmp(&b.object_id));

    CatalogSummary {
        catalog: catalog.name().to_string(),
        class_count: catalog.classes().count(),
        object_count: catalog.objects().count(),
        selectable_classes: catalog
            .descendant_classes(base_object)
            .into_iter()
            // BaseObject itself
            .skip(1)
            .map(|class| catalog.class_at(class).id().to_string())
            .collect(),
        top_level,
    }
}

pub fn run(config: EngineConfig, catalog: String, json_output: bool) {
    let manager = SessionManager::new(config);
    let loaded = manager.catalog(&catalog).unwrap_or_else(|e| exit_with(e));
    let summary = summarize(&loaded);

    if json_output {
        print_json(&summary);
        return;
    }

    println!("fitment inspect {catalog}");
    println!("  Classes: {}", summary.class_count);
    println!("  Objects: {}", summary.object_count);
    println!("  Selectable classes: {}", join_or_dash(&summary.selectable_classes));
    println!("  Selectable: {}", summary.top_level.len());
    for object in &summary.top_level {
        let part_number = if object.part_number.is_empty() {
            String::new()
        } else {
            format!(", Part Number = {}", object.part_number)
        };
        println!("  {} ({}){part_number}", object.object_id, object.class_id);
        println!("    needers: {}", join_or_dash(&object.needers));
        println!("    providers: {}", join_or_dash(&object.providers));
        println!("    rules: {}", join_or_dash(&object.rules));
        let properties: Vec<String> = object
            .properties
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        println!("    properties: {}", join_or_dash(&properties));
    }
}
