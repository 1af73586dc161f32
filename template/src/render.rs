//! CloudFormation template document for a resource graph

use crate::graph::{RemovalPolicy, ResourceGraph, ResourceNode};
use crate::intrinsic::Intrinsic;
use serde_json::{json, Map, Value};

/// Render a graph as a CloudFormation template
///
/// Fragment nodes are inlined where they are referenced and do not appear in
/// Resources. Placeholders that were not resolved stay `Fn::ImportValue`.
pub fn render(graph: &ResourceGraph) -> Value {
    let mut resources = Map::new();

    for node in graph.nodes.iter().filter(|n| !n.kind.is_fragment()) {
        let mut resource = Map::new();
        resource.insert("Type".to_string(), json!(node.kind.as_str()));
        resource.insert("Properties".to_string(), inline(&node.properties, graph));

        if !node.depends_on.is_empty() {
            resource.insert("DependsOn".to_string(), json!(node.depends_on));
        }

        let policy = match node.removal_policy {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
        };

        resource.insert("DeletionPolicy".to_string(), json!(policy));
        resource.insert("UpdateReplacePolicy".to_string(), json!(policy));
        resources.insert(node.logical_name.clone(), Value::Object(resource));
    }

    let mut outputs = Map::new();

    for export in &graph.exports {
        outputs.insert(
            output_name(&export.name),
            json!({
                "Description": export.description,
                "Value": inline(&export.value, graph),
                "Export": { "Name": export.name }
            }),
        );
    }

    let mut template = json!({
        "AWSTemplateFormatVersion": "2010-09-09",
        "Description": description(graph),
        "Resources": resources
    });

    if !outputs.is_empty() {
        template["Outputs"] = Value::Object(outputs);
    }

    template
}

fn description(graph: &ResourceGraph) -> String {
    if graph.instances.is_empty() {
        graph.name.clone()
    } else {
        format!("{}: {}", graph.name, graph.instances.join(", "))
    }
}

/// Output ids are alphanumeric, export names may contain more
fn output_name(export: &str) -> String {
    export.chars().filter(char::is_ascii_alphanumeric).collect()
}

fn fragment<'a>(value: &Value, graph: &'a ResourceGraph) -> Option<&'a ResourceNode> {
    match Intrinsic::parse(value)? {
        Intrinsic::Ref(name) => graph.node(name).filter(|n| n.kind.is_fragment()),
        _ => None,
    }
}

/// Replace references to fragment nodes with their properties
fn inline(value: &Value, graph: &ResourceGraph) -> Value {
    if let Some(node) = fragment(value, graph) {
        return inline(&node.properties, graph);
    }

    match value {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, child)| (key.clone(), inline(child, graph)))
                .collect(),
        ),

        Value::Array(items) => Value::Array(items.iter().map(|child| inline(child, graph)).collect()),
        _ => value.clone(),
    }
}
