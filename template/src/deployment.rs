//! A batch of resource graphs deployed together

use crate::error::{CollisionScope, Error, Result};
use crate::graph::{find_cycle_in, EdgeTarget, ResourceGraph};
use crate::names::CasePolicy;
use crate::resolve::{resolve_known, ExportValues};
use std::collections::{BTreeMap, HashMap};

/// Where an export comes from within the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publisher<'a> {
    pub graph: &'a str,
    pub node: &'a str,
}

/// An import nobody in the batch publishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpublishedImport<'a> {
    pub graph: &'a str,
    pub node: &'a str,
    pub property: &'a str,
    pub export: &'a str,
}

#[derive(Debug, Clone)]
pub struct Deployment {
    graphs: Vec<ResourceGraph>,
    case_policy: CasePolicy,
}

impl Deployment {
    /// Check that stack names and export names are unique across the batch
    ///
    /// Physical resource names must be unique too, whatever the case policy:
    /// prefixes GPS and gps both derive the repository my-iot-gps-app.
    pub fn new(graphs: Vec<ResourceGraph>, case_policy: CasePolicy) -> Result<Self> {
        let mut stacks: HashMap<String, &ResourceGraph> = HashMap::new();
        let mut exports: HashMap<String, (&ResourceGraph, &str)> = HashMap::new();
        let mut physical: HashMap<String, (&ResourceGraph, &str)> = HashMap::new();

        for graph in &graphs {
            if let Some(existing) = stacks.insert(case_policy.key(&graph.name).into_owned(), graph) {
                return Err(Error::NameCollision {
                    scope: CollisionScope::Stack,
                    name: graph.name.clone(),
                    first: describe(existing),
                    second: describe(graph),
                });
            }

            for export in &graph.exports {
                let key = case_policy.key(&export.name).into_owned();

                if let Some((publisher, node)) = exports.insert(key, (graph, export.node.as_str())) {
                    return Err(Error::NameCollision {
                        scope: CollisionScope::Export,
                        name: export.name.clone(),
                        first: format!("{}/{node}", publisher.name),
                        second: format!("{}/{}", graph.name, export.node),
                    });
                }
            }

            for node in &graph.nodes {
                let Some(key) = node.physical_key() else {
                    continue;
                };

                if let Some((owner, existing)) = physical.insert(key, (graph, node.logical_name.as_str())) {
                    return Err(Error::NameCollision {
                        scope: CollisionScope::PhysicalName,
                        name: node.physical_name().unwrap_or_default().to_string(),
                        first: format!("{}/{existing}", owner.name),
                        second: format!("{}/{}", graph.name, node.logical_name),
                    });
                }
            }
        }

        Ok(Self {
            graphs,
            case_policy,
        })
    }

    pub fn graphs(&self) -> &[ResourceGraph] {
        &self.graphs
    }

    pub fn case_policy(&self) -> CasePolicy {
        self.case_policy
    }

    /// Export name -> publisher, for every export in the batch
    pub fn published(&self) -> BTreeMap<&str, Publisher<'_>> {
        self.graphs
            .iter()
            .flat_map(|graph| {
                graph.exports.iter().map(|export| {
                    (
                        export.name.as_str(),
                        Publisher {
                            graph: &graph.name,
                            node: &export.node,
                        },
                    )
                })
            })
            .collect()
    }

    /// Imports no graph of the batch publishes, in graph and edge order
    pub fn unpublished_imports(&self) -> Vec<UnpublishedImport<'_>> {
        let published = self.published();
        let mut result = vec![];

        for graph in &self.graphs {
            for edge in &graph.edges {
                if let EdgeTarget::Export { name } = &edge.to {
                    if !published.contains_key(name.as_str()) {
                        result.push(UnpublishedImport {
                            graph: &graph.name,
                            node: &edge.from_node,
                            property: &edge.property,
                            export: name,
                        });
                    }
                }
            }
        }

        result
    }

    /// Stack names with every publisher ahead of the stacks importing from it
    ///
    /// Stacks that do not depend on each other keep their batch order.
    pub fn order(&self) -> Result<Vec<&str>> {
        let published = self.published();

        let adjacency: Vec<(&str, Vec<&str>)> = self
            .graphs
            .iter()
            .map(|graph| {
                let mut publishers: Vec<&str> = vec![];

                for import in graph.imports() {
                    if let Some(publisher) = published.get(import) {
                        if !publishers.contains(&publisher.graph) {
                            publishers.push(publisher.graph);
                        }
                    }
                }

                (graph.name.as_str(), publishers)
            })
            .collect();

        if let Some(path) = find_cycle_in(&adjacency) {
            return Err(Error::Cycle {
                graph: "deployment".to_string(),
                path,
            });
        }

        let index: HashMap<&str, usize> = adjacency
            .iter()
            .enumerate()
            .map(|(i, (name, _))| (*name, i))
            .collect();

        let mut visited = vec![false; adjacency.len()];
        let mut result = vec![];

        for start in 0..adjacency.len() {
            visit(start, &adjacency, &index, &mut visited, &mut result);
        }

        Ok(result)
    }

    /// Graphs with known export values filled in
    ///
    /// Placeholders published inside the batch stay in place for CloudFormation,
    /// so a known value for one of them is a collision with its publisher.
    /// With `strict`, any other placeholder without a known value is an error.
    pub fn resolve(&self, exports: &ExportValues, strict: bool) -> Result<Vec<ResourceGraph>> {
        let published = self.published();

        for name in exports.keys() {
            let publisher = published
                .iter()
                .find(|(export, _)| self.case_policy.key(export) == self.case_policy.key(name));

            if let Some((_, publisher)) = publisher {
                return Err(Error::NameCollision {
                    scope: CollisionScope::Export,
                    name: name.clone(),
                    first: format!("{}/{}", publisher.graph, publisher.node),
                    second: "known export values".to_string(),
                });
            }
        }

        let unpublished = self.unpublished_imports();

        for import in &unpublished {
            if exports.contains_key(import.export) {
                continue;
            }

            if strict {
                return Err(Error::MissingExport {
                    graph: import.graph.to_string(),
                    node: import.node.to_string(),
                    property: import.property.to_string(),
                    export: import.export.to_string(),
                });
            }

            log::warn!(
                "{}/{} imports {} which nobody in the batch publishes",
                import.graph,
                import.node,
                import.export
            );
        }

        resolve_known(&self.graphs, exports)
    }
}

/// Post-order walk over publishers, the acyclic case only
fn visit<'a>(
    node: usize,
    adjacency: &[(&'a str, Vec<&'a str>)],
    index: &HashMap<&str, usize>,
    visited: &mut [bool],
    result: &mut Vec<&'a str>,
) {
    if visited[node] {
        return;
    }

    visited[node] = true;

    for target in &adjacency[node].1 {
        if let Some(&next) = index.get(target) {
            visit(next, adjacency, index, visited, result);
        }
    }

    result.push(adjacency[node].0);
}

fn describe(graph: &ResourceGraph) -> String {
    if graph.instances.is_empty() {
        graph.name.clone()
    } else {
        format!("{} ({})", graph.name, graph.instances.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, ResourceKind, ResourceNode};
    use crate::intrinsic::{import, reference};
    use serde_json::json;

    /// Graph with one node importing `imports` and publishing `exports`
    fn stack(name: &str, imports: &[&str], exports: &[&str]) -> ResourceGraph {
        let properties: serde_json::Map<String, serde_json::Value> = imports
            .iter()
            .map(|export| (export.to_string(), import(export)))
            .collect();

        let mut builder = GraphBuilder::new(name);
        let node = format!("{name}Node");

        builder
            .add(ResourceNode::new(
                &node,
                ResourceKind::SsmParameter,
                serde_json::Value::Object(properties),
            ))
            .unwrap();

        for export in exports {
            builder.export(export, &node, reference(&node), "").unwrap();
        }

        builder.build().unwrap()
    }

    #[test]
    fn publishers_go_first() {
        let deployment = Deployment::new(
            vec![
                stack("EcsStack", &["EcsClusterName", "GPSEcrRepositoryUri"], &[]),
                stack("EcrStack", &[], &["GPSEcrRepositoryUri"]),
                stack("ClusterStack", &[], &["EcsClusterName"]),
                stack("ConfigurationStack", &[], &[]),
            ],
            CasePolicy::Sensitive,
        )
        .unwrap();

        assert_eq!(
            deployment.order().unwrap(),
            vec!["ClusterStack", "EcrStack", "EcsStack", "ConfigurationStack"]
        );
    }

    #[test]
    fn stacks_importing_each_other_are_a_cycle() {
        let deployment = Deployment::new(
            vec![stack("A", &["FromB"], &["FromA"]), stack("B", &["FromA"], &["FromB"])],
            CasePolicy::Sensitive,
        )
        .unwrap();

        assert_eq!(
            deployment.order().unwrap_err(),
            Error::Cycle {
                graph: "deployment".into(),
                path: vec!["A".into(), "B".into(), "A".into()],
            }
        );
    }

    #[test]
    fn duplicate_export_across_stacks() {
        let error = Deployment::new(
            vec![
                stack("EcrStack", &[], &["GPSEcrRepositoryUri"]),
                stack("IotEcrStack", &[], &["GPSEcrRepositoryUri"]),
            ],
            CasePolicy::Sensitive,
        )
        .unwrap_err();

        assert_eq!(
            error,
            Error::NameCollision {
                scope: CollisionScope::Export,
                name: "GPSEcrRepositoryUri".into(),
                first: "EcrStack/EcrStackNode".into(),
                second: "IotEcrStack/IotEcrStackNode".into(),
            }
        );
    }

    #[test]
    fn export_case_policy() {
        let graphs = vec![
            stack("GpsStack", &[], &["GPSEcrRepositoryUri"]),
            stack("gpsStack", &[], &["gpsEcrRepositoryUri"]),
        ];

        assert!(Deployment::new(graphs.clone(), CasePolicy::Sensitive).is_ok());
        assert!(matches!(
            Deployment::new(graphs, CasePolicy::Insensitive),
            Err(Error::NameCollision {
                scope: CollisionScope::Stack,
                ..
            })
        ));
    }

    #[test]
    fn duplicate_stack() {
        let error = Deployment::new(
            vec![stack("EcsStack", &[], &[]), stack("EcsStack", &[], &[])],
            CasePolicy::Sensitive,
        )
        .unwrap_err();

        assert!(matches!(
            error,
            Error::NameCollision {
                scope: CollisionScope::Stack,
                ..
            }
        ));
    }

    #[test]
    fn unpublished_and_strict_resolution() {
        let deployment = Deployment::new(
            vec![
                stack("EcsStack", &["EcsClusterName", "GPSEcrRepositoryUri"], &[]),
                stack("ClusterStack", &[], &["EcsClusterName"]),
            ],
            CasePolicy::Sensitive,
        )
        .unwrap();

        let unpublished = deployment.unpublished_imports();
        assert_eq!(unpublished.len(), 1);
        assert_eq!(unpublished[0].export, "GPSEcrRepositoryUri");
        assert_eq!(unpublished[0].node, "EcsStackNode");

        assert!(matches!(
            deployment.resolve(&ExportValues::new(), true),
            Err(Error::MissingExport { export, .. }) if export == "GPSEcrRepositoryUri"
        ));

        let graphs = deployment.resolve(&ExportValues::new(), false).unwrap();
        assert_eq!(graphs[0].imports().len(), 2);

        let known = ExportValues::from([(
            "GPSEcrRepositoryUri".to_string(),
            "123456789012.dkr.ecr.us-east-1.amazonaws.com/my-iot-gps-app".to_string(),
        )]);

        let graphs = deployment.resolve(&known, true).unwrap();
        assert_eq!(graphs[0].imports(), vec!["EcsClusterName"]);
        assert_eq!(
            graphs[0].nodes[0].properties["GPSEcrRepositoryUri"],
            json!("123456789012.dkr.ecr.us-east-1.amazonaws.com/my-iot-gps-app")
        );
    }

    #[test]
    fn known_value_for_a_published_export() {
        let deployment = Deployment::new(
            vec![
                stack("EcsStack", &["GPSEcrRepositoryUri"], &[]),
                stack("EcrStack", &[], &["GPSEcrRepositoryUri"]),
            ],
            CasePolicy::Sensitive,
        )
        .unwrap();

        let stale = ExportValues::from([(
            "GPSEcrRepositoryUri".to_string(),
            "stale".to_string(),
        )]);

        for strict in [false, true] {
            assert_eq!(
                deployment.resolve(&stale, strict).unwrap_err(),
                Error::NameCollision {
                    scope: CollisionScope::Export,
                    name: "GPSEcrRepositoryUri".into(),
                    first: "EcrStack/EcrStackNode".into(),
                    second: "known export values".into(),
                }
            );
        }

        let graphs = deployment.resolve(&ExportValues::new(), true).unwrap();
        assert_eq!(graphs[0].imports(), vec!["GPSEcrRepositoryUri"]);
    }

    #[test]
    fn physical_names_across_stacks() {
        let repository = |stack: &str, prefix: &str| {
            let mut builder = GraphBuilder::new(stack);

            builder
                .add(ResourceNode::new(
                    format!("{prefix}EcrRepository"),
                    ResourceKind::EcrRepository,
                    json!({"RepositoryName": format!("my-iot-{}-app", prefix.to_lowercase())}),
                ))
                .unwrap();

            builder
                .export(
                    &format!("{prefix}EcrRepositoryUri"),
                    &format!("{prefix}EcrRepository"),
                    reference(&format!("{prefix}EcrRepository")),
                    "",
                )
                .unwrap();

            builder.build().unwrap()
        };

        let graphs = vec![repository("EcrStack", "GPS"), repository("IotEcrStack", "gps")];

        assert_eq!(
            Deployment::new(graphs.clone(), CasePolicy::Sensitive).unwrap_err(),
            Error::NameCollision {
                scope: CollisionScope::PhysicalName,
                name: "my-iot-gps-app".into(),
                first: "EcrStack/GPSEcrRepository".into(),
                second: "IotEcrStack/gpsEcrRepository".into(),
            }
        );

        // Export names clash first when case does not matter
        assert!(matches!(
            Deployment::new(graphs, CasePolicy::Insensitive),
            Err(Error::NameCollision {
                scope: CollisionScope::Export,
                ..
            })
        ));

        let graphs = vec![repository("EcrStack", "GPS"), repository("IotEcrStack", "ENV")];
        assert!(Deployment::new(graphs, CasePolicy::Sensitive).is_ok());
    }
}
