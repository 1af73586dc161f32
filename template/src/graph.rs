//! Resource graph: declared resources, the references between them and the
//! values they publish for other graphs

use crate::error::{CollisionScope, Error, Result};
use crate::intrinsic::{self, Intrinsic};
use crate::names::CasePolicy;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;

/// AWS resource type of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    CognitoIdentityPool,
    CognitoIdentityPoolRoleAttachment,
    CognitoUserPool,
    CognitoUserPoolClient,
    DynamoDbTable,
    Ec2InternetGateway,
    Ec2Route,
    Ec2RouteTable,
    Ec2Subnet,
    Ec2SubnetRouteTableAssociation,
    Ec2Vpc,
    Ec2VpcGatewayAttachment,
    EcrRepository,
    EcsCluster,
    EcsService,
    EcsTaskDefinition,
    /// A container of a task definition, inlined into it when rendered
    EcsContainerDefinition,
    GlueCrawler,
    GlueDatabase,
    GlueJob,
    IamRole,
    IotCertificate,
    IotPolicy,
    IotPolicyPrincipalAttachment,
    IotThing,
    IotThingPrincipalAttachment,
    IotTopicRule,
    LambdaFunction,
    LambdaPermission,
    LogGroup,
    S3Bucket,
    SecretsManagerSecret,
    SsmParameter,
}

impl ResourceKind {
    /// CloudFormation type name
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::CognitoIdentityPool => "AWS::Cognito::IdentityPool",
            ResourceKind::CognitoIdentityPoolRoleAttachment => {
                "AWS::Cognito::IdentityPoolRoleAttachment"
            }
            ResourceKind::CognitoUserPool => "AWS::Cognito::UserPool",
            ResourceKind::CognitoUserPoolClient => "AWS::Cognito::UserPoolClient",
            ResourceKind::DynamoDbTable => "AWS::DynamoDB::Table",
            ResourceKind::Ec2InternetGateway => "AWS::EC2::InternetGateway",
            ResourceKind::Ec2Route => "AWS::EC2::Route",
            ResourceKind::Ec2RouteTable => "AWS::EC2::RouteTable",
            ResourceKind::Ec2Subnet => "AWS::EC2::Subnet",
            ResourceKind::Ec2SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            ResourceKind::Ec2Vpc => "AWS::EC2::VPC",
            ResourceKind::Ec2VpcGatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            ResourceKind::EcrRepository => "AWS::ECR::Repository",
            ResourceKind::EcsCluster => "AWS::ECS::Cluster",
            ResourceKind::EcsService => "AWS::ECS::Service",
            ResourceKind::EcsTaskDefinition => "AWS::ECS::TaskDefinition",
            ResourceKind::EcsContainerDefinition => "Custom::ContainerDefinition",
            ResourceKind::GlueCrawler => "AWS::Glue::Crawler",
            ResourceKind::GlueDatabase => "AWS::Glue::Database",
            ResourceKind::GlueJob => "AWS::Glue::Job",
            ResourceKind::IamRole => "AWS::IAM::Role",
            // Issued by a provider Lambda declared next to it
            ResourceKind::IotCertificate => "Custom::ThingCertificate",
            ResourceKind::IotPolicy => "AWS::IoT::Policy",
            ResourceKind::IotPolicyPrincipalAttachment => "AWS::IoT::PolicyPrincipalAttachment",
            ResourceKind::IotThing => "AWS::IoT::Thing",
            ResourceKind::IotThingPrincipalAttachment => "AWS::IoT::ThingPrincipalAttachment",
            ResourceKind::IotTopicRule => "AWS::IoT::TopicRule",
            ResourceKind::LambdaFunction => "AWS::Lambda::Function",
            ResourceKind::LambdaPermission => "AWS::Lambda::Permission",
            ResourceKind::LogGroup => "AWS::Logs::LogGroup",
            ResourceKind::S3Bucket => "AWS::S3::Bucket",
            ResourceKind::SecretsManagerSecret => "AWS::SecretsManager::Secret",
            ResourceKind::SsmParameter => "AWS::SSM::Parameter",
        }
    }

    /// Fragments are not standalone resources, they are inlined into whoever references them
    pub fn is_fragment(&self) -> bool {
        matches!(self, ResourceKind::EcsContainerDefinition)
    }

    /// Stateful resources are kept on stack deletion unless a template says otherwise
    pub fn default_removal_policy(&self) -> RemovalPolicy {
        match self {
            ResourceKind::DynamoDbTable
            | ResourceKind::EcrRepository
            | ResourceKind::GlueDatabase
            | ResourceKind::LogGroup
            | ResourceKind::S3Bucket
            | ResourceKind::CognitoUserPool
            | ResourceKind::SecretsManagerSecret => RemovalPolicy::Retain,
            _ => RemovalPolicy::Destroy,
        }
    }

    /// Pointer to the property AWS keeps unique per account and region
    pub fn name_property(&self) -> Option<&'static str> {
        match self {
            ResourceKind::DynamoDbTable => Some("/TableName"),
            ResourceKind::EcrRepository => Some("/RepositoryName"),
            ResourceKind::EcsCluster => Some("/ClusterName"),
            ResourceKind::GlueCrawler | ResourceKind::GlueJob => Some("/Name"),
            ResourceKind::GlueDatabase => Some("/DatabaseInput/Name"),
            ResourceKind::IamRole => Some("/RoleName"),
            ResourceKind::IotPolicy => Some("/PolicyName"),
            ResourceKind::IotThing => Some("/ThingName"),
            ResourceKind::IotTopicRule => Some("/RuleName"),
            ResourceKind::LambdaFunction => Some("/FunctionName"),
            ResourceKind::LogGroup => Some("/LogGroupName"),
            ResourceKind::S3Bucket => Some("/BucketName"),
            ResourceKind::SecretsManagerSecret | ResourceKind::SsmParameter => Some("/Name"),
            _ => None,
        }
    }

    /// IAM and Glue compare names ignoring case
    fn case_insensitive_names(&self) -> bool {
        matches!(
            self,
            ResourceKind::IamRole
                | ResourceKind::GlueCrawler
                | ResourceKind::GlueDatabase
                | ResourceKind::GlueJob
        )
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ResourceKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// What happens to a resource when its stack is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    Destroy,
    Retain,
}

/// One declared resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceNode {
    pub logical_name: String,
    pub kind: ResourceKind,
    pub properties: Value,
    pub removal_policy: RemovalPolicy,

    /// Ordering constraints without a property reference
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Template instance that declared the node, e.g. device-identity-pipeline[GPS]
    pub origin: String,
}

impl ResourceNode {
    pub fn new(logical_name: impl Into<String>, kind: ResourceKind, properties: Value) -> Self {
        Self {
            logical_name: logical_name.into(),
            kind,
            properties,
            removal_policy: kind.default_removal_policy(),
            depends_on: vec![],
            origin: String::new(),
        }
    }

    pub fn removal(mut self, policy: RemovalPolicy) -> Self {
        self.removal_policy = policy;
        self
    }

    pub fn depends_on(mut self, node: &str) -> Self {
        self.depends_on.push(node.to_string());
        self
    }

    /// Literal name the resource gets in AWS, None when AWS generates it
    pub fn physical_name(&self) -> Option<&str> {
        self.properties.pointer(self.kind.name_property()?)?.as_str()
    }

    /// Key two nodes share when AWS would refuse to create both
    pub(crate) fn physical_key(&self) -> Option<String> {
        let name = self.physical_name()?;

        if self.kind.case_insensitive_names() {
            Some(format!("{}:{}", self.kind.as_str(), name.to_ascii_lowercase()))
        } else {
            Some(format!("{}:{name}", self.kind.as_str()))
        }
    }
}

/// The other end of an edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgeTarget {
    Node {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        attribute: Option<String>,
    },

    Export { name: String },
}

/// A property of one node pointing at another node or at an export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEdge {
    pub from_node: String,

    /// Path of the property holding the reference, DependsOn for explicit dependencies
    pub property: String,
    pub to: EdgeTarget,
}

impl ResourceEdge {
    /// Target node name, None for edges into exports
    pub fn to_node(&self) -> Option<&str> {
        match &self.to {
            EdgeTarget::Node { name, .. } => Some(name),
            EdgeTarget::Export { .. } => None,
        }
    }
}

/// A value published by a graph for consumption by other graphs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrossGraphExport {
    pub name: String,

    /// Intrinsic over the publishing node, or a literal
    pub value: Value,
    pub description: String,

    /// Publishing node
    pub node: String,

    /// Publishing graph (stack name)
    pub graph: String,
}

/// A complete, checked resource graph for one stack
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGraph {
    pub name: String,

    /// Template instances the graph was built from
    pub instances: Vec<String>,
    pub nodes: Vec<ResourceNode>,
    pub edges: Vec<ResourceEdge>,
    pub exports: Vec<CrossGraphExport>,
}

impl ResourceGraph {
    pub fn node(&self, logical_name: &str) -> Option<&ResourceNode> {
        self.nodes.iter().find(|n| n.logical_name == logical_name)
    }

    pub fn edges_from<'a>(&'a self, node: &'a str) -> impl Iterator<Item = &'a ResourceEdge> {
        self.edges.iter().filter(move |e| e.from_node == node)
    }

    /// Whether `from` has a property referencing node `to`
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges_from(from).any(|e| e.to_node() == Some(to))
    }

    /// Export names consumed by this graph, in edge order, deduplicated
    pub fn imports(&self) -> Vec<&str> {
        let mut result: Vec<&str> = vec![];

        for edge in &self.edges {
            if let EdgeTarget::Export { name } = &edge.to {
                if !result.contains(&name.as_str()) {
                    result.push(name);
                }
            }
        }

        result
    }

    /// No cross-graph placeholders left
    pub fn is_resolved(&self) -> bool {
        self.imports().is_empty()
    }

    pub fn export(&self, name: &str) -> Option<&CrossGraphExport> {
        self.exports.iter().find(|e| e.name == name)
    }
}

/// Derive edges from the intrinsics in node properties and explicit dependencies
pub(crate) fn edges(nodes: &[ResourceNode]) -> Vec<ResourceEdge> {
    let mut result = vec![];

    for node in nodes {
        for (property, intrinsic) in intrinsic::references(&node.properties) {
            let to = match intrinsic {
                Intrinsic::Ref(name) => EdgeTarget::Node {
                    name: name.to_string(),
                    attribute: None,
                },
                Intrinsic::GetAtt(name, attribute) => EdgeTarget::Node {
                    name: name.to_string(),
                    attribute: Some(attribute.to_string()),
                },
                Intrinsic::Import(name) => EdgeTarget::Export {
                    name: name.to_string(),
                },
            };

            result.push(ResourceEdge {
                from_node: node.logical_name.clone(),
                property,
                to,
            });
        }

        for dependency in &node.depends_on {
            result.push(ResourceEdge {
                from_node: node.logical_name.clone(),
                property: "DependsOn".to_string(),
                to: EdgeTarget::Node {
                    name: dependency.clone(),
                    attribute: None,
                },
            });
        }
    }

    result
}

/// Accumulates nodes and exports of one stack, then checks the whole graph
#[derive(Debug)]
pub struct GraphBuilder {
    name: String,
    case_policy: CasePolicy,
    origin: String,
    instances: Vec<String>,
    nodes: Vec<ResourceNode>,
    exports: Vec<CrossGraphExport>,

    /// Uniqueness key -> index in nodes
    node_index: HashMap<String, usize>,
    physical_index: HashMap<String, usize>,
    export_index: HashMap<String, usize>,
}

impl GraphBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            case_policy: CasePolicy::default(),
            origin: name.to_string(),
            instances: vec![],
            nodes: vec![],
            exports: vec![],
            node_index: HashMap::new(),
            physical_index: HashMap::new(),
            export_index: HashMap::new(),
        }
    }

    pub fn with_case_policy(mut self, case_policy: CasePolicy) -> Self {
        self.case_policy = case_policy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Nodes and exports added from now on are attributed to this instance
    pub fn begin_instance(&mut self, origin: &str) {
        self.origin = origin.to_string();
        self.instances.push(origin.to_string());
    }

    /// Declare a resource
    ///
    /// Fails when the logical name is already taken under the case policy, or
    /// when another node already claims the same physical name.
    pub fn add(&mut self, mut node: ResourceNode) -> Result<()> {
        if node.origin.is_empty() {
            node.origin = self.origin.clone();
        }

        let key = self.case_policy.key(&node.logical_name).into_owned();

        if let Some(&index) = self.node_index.get(&key) {
            let existing = &self.nodes[index];

            return Err(Error::NameCollision {
                scope: CollisionScope::Node,
                name: node.logical_name,
                first: format!("{} ({})", existing.origin, existing.logical_name),
                second: node.origin,
            });
        }

        let physical = node.physical_key();

        if let Some(&index) = physical.as_ref().and_then(|k| self.physical_index.get(k)) {
            let existing = &self.nodes[index];

            return Err(Error::NameCollision {
                scope: CollisionScope::PhysicalName,
                name: node.physical_name().unwrap_or_default().to_string(),
                first: format!("{} ({})", existing.origin, existing.logical_name),
                second: format!("{} ({})", node.origin, node.logical_name),
            });
        }

        if let Some(physical) = physical {
            self.physical_index.insert(physical, self.nodes.len());
        }

        self.node_index.insert(key, self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    /// Publish a value of `node` under an export name
    pub fn export(&mut self, name: &str, node: &str, value: Value, description: &str) -> Result<()> {
        let key = self.case_policy.key(name).into_owned();

        if let Some(&index) = self.export_index.get(&key) {
            return Err(Error::NameCollision {
                scope: CollisionScope::Export,
                name: name.to_string(),
                first: format!("{}/{}", self.name, self.exports[index].node),
                second: self.origin.clone(),
            });
        }

        self.export_index.insert(key, self.exports.len());

        self.exports.push(CrossGraphExport {
            name: name.to_string(),
            value,
            description: description.to_string(),
            node: node.to_string(),
            graph: self.name.clone(),
        });

        Ok(())
    }

    /// Derive edges and check that every reference lands and nothing loops
    pub fn build(self) -> Result<ResourceGraph> {
        let edges = edges(&self.nodes);

        let exists = |name: &str| self.nodes.iter().any(|n| n.logical_name == name);

        for edge in &edges {
            if let Some(target) = edge.to_node() {
                if !exists(target) {
                    return Err(Error::DanglingReference {
                        graph: self.name.clone(),
                        node: edge.from_node.clone(),
                        property: edge.property.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }

        for export in &self.exports {
            let targets = intrinsic::references(&export.value)
                .into_iter()
                .filter_map(|(property, intrinsic)| Some((property, intrinsic.node()?)))
                .chain([("Node".to_string(), export.node.as_str())]);

            for (property, target) in targets {
                if !exists(target) {
                    return Err(Error::DanglingReference {
                        graph: self.name.clone(),
                        node: format!("Outputs.{}", export.name),
                        property,
                        target: target.to_string(),
                    });
                }
            }
        }

        if let Some(path) = find_cycle(&self.nodes, &edges) {
            return Err(Error::Cycle {
                graph: self.name,
                path,
            });
        }

        log::debug!(
            "Built graph {} with {} nodes, {} edges and {} exports",
            self.name,
            self.nodes.len(),
            edges.len(),
            self.exports.len()
        );

        Ok(ResourceGraph {
            name: self.name,
            instances: self.instances,
            nodes: self.nodes,
            edges,
            exports: self.exports,
        })
    }
}

/// Depth-first search over node edges, returns the first cycle as a closed path
pub(crate) fn find_cycle(nodes: &[ResourceNode], edges: &[ResourceEdge]) -> Option<Vec<String>> {
    let names: Vec<&str> = nodes.iter().map(|n| n.logical_name.as_str()).collect();
    let adjacency: Vec<(&str, Vec<&str>)> = names
        .iter()
        .map(|name| {
            let targets = edges
                .iter()
                .filter(|e| e.from_node == *name)
                .filter_map(|e| e.to_node())
                .collect();

            (*name, targets)
        })
        .collect();

    find_cycle_in(&adjacency)
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    New,
    Active,
    Done,
}

/// Cycle search over an adjacency list given in a fixed order, so the reported path is stable
pub(crate) fn find_cycle_in(adjacency: &[(&str, Vec<&str>)]) -> Option<Vec<String>> {
    let index: HashMap<&str, usize> = adjacency
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (*name, i))
        .collect();

    let mut marks = vec![Mark::New; adjacency.len()];

    for start in 0..adjacency.len() {
        if marks[start] != Mark::New {
            continue;
        }

        // (node, next child to visit)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        marks[start] = Mark::Active;

        while let Some(top) = stack.len().checked_sub(1) {
            let (node, child) = stack[top];
            let targets = &adjacency[node].1;

            if child == targets.len() {
                marks[node] = Mark::Done;
                stack.pop();
                continue;
            }

            stack[top].1 += 1;

            // Targets outside the graph are reported as dangling elsewhere
            let Some(&next) = index.get(targets[child]) else {
                continue;
            };

            match marks[next] {
                Mark::New => {
                    marks[next] = Mark::Active;
                    stack.push((next, 0));
                }

                Mark::Active => {
                    let from = stack.iter().position(|(n, _)| *n == next)?;
                    let mut path: Vec<String> = stack[from..]
                        .iter()
                        .map(|(n, _)| adjacency[*n].0.to_string())
                        .collect();

                    path.push(adjacency[next].0.to_string());
                    return Some(path);
                }

                Mark::Done => {}
            }
        }
    }

    None
}
