//! Replacing cross-graph placeholders with concrete export values

use crate::error::{Error, Result};
use crate::graph::{self, ResourceGraph};
use crate::intrinsic::{child_path, index_path, Intrinsic};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Export name -> concrete value, as published by already deployed stacks
pub type ExportValues = BTreeMap<String, String>;

/// Fill every `Fn::ImportValue` placeholder in the graphs
///
/// Each graph is resolved on its own, so the result does not depend on the
/// order of `graphs`. Graphs without placeholders come back unchanged.
pub fn resolve(graphs: &[ResourceGraph], exports: &ExportValues) -> Result<Vec<ResourceGraph>> {
    graphs
        .iter()
        .map(|graph| resolve_graph(graph, exports, false))
        .collect()
}

/// Fill the placeholders `exports` has values for and keep the rest
///
/// Kept placeholders are left for CloudFormation to resolve at deploy time.
pub fn resolve_known(
    graphs: &[ResourceGraph],
    exports: &ExportValues,
) -> Result<Vec<ResourceGraph>> {
    graphs
        .iter()
        .map(|graph| resolve_graph(graph, exports, true))
        .collect()
}

fn resolve_graph(
    graph: &ResourceGraph,
    exports: &ExportValues,
    keep_missing: bool,
) -> Result<ResourceGraph> {
    let mut resolved = graph.clone();

    for node in resolved.nodes.iter_mut() {
        let lookup = Lookup {
            graph: &graph.name,
            node: &node.logical_name,
            exports,
            keep_missing,
        };

        node.properties = lookup.substitute(&node.properties, String::new())?;
    }

    for export in resolved.exports.iter_mut() {
        let node = format!("Outputs.{}", export.name);
        let lookup = Lookup {
            graph: &graph.name,
            node: &node,
            exports,
            keep_missing,
        };

        export.value = lookup.substitute(&export.value, String::new())?;
    }

    resolved.edges = graph::edges(&resolved.nodes);

    log::debug!(
        "Resolved {} of {} imports in {}",
        graph.imports().len() - resolved.imports().len(),
        graph.imports().len(),
        graph.name
    );

    Ok(resolved)
}

struct Lookup<'a> {
    graph: &'a str,
    node: &'a str,
    exports: &'a ExportValues,
    keep_missing: bool,
}

impl Lookup<'_> {
    fn substitute(&self, value: &Value, path: String) -> Result<Value> {
        if let Some(Intrinsic::Import(name)) = Intrinsic::parse(value) {
            return match self.exports.get(name) {
                Some(concrete) => Ok(Value::String(concrete.clone())),
                None if self.keep_missing => Ok(value.clone()),
                None => Err(Error::MissingExport {
                    graph: self.graph.to_string(),
                    node: self.node.to_string(),
                    property: path,
                    export: name.to_string(),
                }),
            };
        }

        match value {
            Value::Object(object) => {
                let mut result = Map::new();

                for (key, child) in object {
                    result.insert(key.clone(), self.substitute(child, child_path(&path, key))?);
                }

                Ok(Value::Object(result))
            }

            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(index, child)| self.substitute(child, index_path(&path, index)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),

            _ => Ok(value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, ResourceKind, ResourceNode};
    use crate::intrinsic::{get_att, import};
    use serde_json::json;

    fn graph() -> ResourceGraph {
        let mut builder = GraphBuilder::new("EcsStack");
        builder
            .add(ResourceNode::new("GPSTaskRole", ResourceKind::IamRole, json!({})))
            .unwrap();

        builder
            .add(ResourceNode::new(
                "IoTGPSTaskDefinition",
                ResourceKind::EcsTaskDefinition,
                json!({
                    "ExecutionRoleArn": import("EcsTaskExecutionRoleArn"),
                    "TaskRoleArn": get_att("GPSTaskRole", "Arn"),
                    "Subnets": {"Fn::Split": [",", import("IoTClusterVpcPublicSubnetIds")]}
                }),
            ))
            .unwrap();

        builder.build().unwrap()
    }

    fn exports() -> ExportValues {
        ExportValues::from([
            (
                "EcsTaskExecutionRoleArn".to_string(),
                "arn:aws:iam::123456789012:role/ecsTaskExecutionRole".to_string(),
            ),
            (
                "IoTClusterVpcPublicSubnetIds".to_string(),
                "subnet-1,subnet-2".to_string(),
            ),
        ])
    }

    #[test]
    fn placeholders_are_replaced() {
        let resolved = resolve(&[graph()], &exports()).unwrap();
        let node = resolved[0].node("IoTGPSTaskDefinition").unwrap();

        assert_eq!(
            node.properties["ExecutionRoleArn"],
            "arn:aws:iam::123456789012:role/ecsTaskExecutionRole"
        );
        assert_eq!(
            node.properties["Subnets"],
            json!({"Fn::Split": [",", "subnet-1,subnet-2"]})
        );
        assert!(resolved[0].is_resolved());
        assert!(resolved[0].has_edge("IoTGPSTaskDefinition", "GPSTaskRole"));
    }

    #[test]
    fn missing_export_names_node_and_property() {
        let mut exports = exports();
        exports.remove("IoTClusterVpcPublicSubnetIds");

        let error = resolve(&[graph()], &exports).unwrap_err();

        assert_eq!(
            error,
            Error::MissingExport {
                graph: "EcsStack".into(),
                node: "IoTGPSTaskDefinition".into(),
                property: "Subnets.Fn::Split[1]".into(),
                export: "IoTClusterVpcPublicSubnetIds".into(),
            }
        );
    }

    #[test]
    fn known_values_only() {
        let mut exports = exports();
        exports.remove("IoTClusterVpcPublicSubnetIds");

        let resolved = resolve_known(&[graph()], &exports).unwrap();

        assert_eq!(resolved[0].imports(), vec!["IoTClusterVpcPublicSubnetIds"]);
        assert_eq!(
            resolved[0].node("IoTGPSTaskDefinition").unwrap().properties["ExecutionRoleArn"],
            "arn:aws:iam::123456789012:role/ecsTaskExecutionRole"
        );
    }

    #[test]
    fn idempotent() {
        let once = resolve(&[graph()], &exports()).unwrap();
        let twice = resolve(&once, &exports()).unwrap();

        assert_eq!(once, twice);
    }
}
