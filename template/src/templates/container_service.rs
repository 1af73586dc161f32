//! Fargate service running a device transmitter container

use super::device_identity::secret_name;
use super::{assume_role, inline_policy, limits, logical, logical_pattern, managed_policy};
use crate::catalog::Blueprint;
use crate::error::Result;
use crate::graph::{GraphBuilder, RemovalPolicy, ResourceKind, ResourceNode};
use crate::intrinsic::{get_att, import, reference};
use crate::params::{ParameterSpec, Parameters, Rule, ACCOUNT, CLUSTER, PREFIX, REGION, VPC};
use serde_json::json;

/// Export names published by the container-cluster template without a prefix
pub const CLUSTER_EXPORT: &str = "EcsClusterName";
pub const EXECUTION_ROLE_EXPORT: &str = "EcsTaskExecutionRoleArn";
pub const DEFAULT_VPC: &str = "IoTClusterVpc";

const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required(PREFIX, Rule::Prefix, "Device prefix, e.g. GPS"),
    ParameterSpec::required(ACCOUNT, Rule::Account, "Account of the device secret"),
    ParameterSpec::required(REGION, Rule::Region, "Region of the device secret and logs"),
    ParameterSpec::optional(
        CLUSTER,
        Rule::Reference,
        "ECS cluster name or ARN, imported from EcsClusterName when omitted",
    ),
    ParameterSpec::optional(
        VPC,
        Rule::Prefix,
        "VPC publishing {vpc}PublicSubnetIds, IoTClusterVpc when omitted",
    ),
];

const RESOURCES: &[ResourceKind] = &[
    ResourceKind::LogGroup,
    ResourceKind::IamRole,
    ResourceKind::EcsContainerDefinition,
    ResourceKind::EcsTaskDefinition,
    ResourceKind::EcsService,
];

pub struct ContainerServicePipeline;

impl Blueprint for ContainerServicePipeline {
    fn parameters(&self) -> &'static [ParameterSpec] {
        PARAMETERS
    }

    fn resources(&self) -> &'static [ResourceKind] {
        RESOURCES
    }

    fn build(&self, params: &Parameters, graph: &mut GraphBuilder) -> Result<()> {
        let prefix = params.prefix();
        let account = params.require(ACCOUNT)?;
        let region = params.require(REGION)?;

        let log_group = logical(params, "log-group")?;
        let task_role = logical(params, "task-role")?;
        let container = logical(params, "container")?;
        let task_definition = logical_pattern(params, format!("IoT{prefix}TaskDefinition"))?;
        let service = logical_pattern(params, format!("{prefix}IoTService"))?;

        let log_group_name = params.checked(PREFIX, format!("/ecs/IoT-{prefix}"), limits::LOG_GROUP)?;
        let family = params.checked(PREFIX, format!("IoT-{prefix}"), limits::ECS_FAMILY)?;

        graph.add(
            ResourceNode::new(
                &log_group,
                ResourceKind::LogGroup,
                json!({
                    "LogGroupName": log_group_name,
                    "RetentionInDays": 7
                }),
            )
            .removal(RemovalPolicy::Destroy),
        )?;

        let secret_arn = format!(
            "arn:aws:secretsmanager:{region}:{account}:secret:{}-*",
            secret_name(prefix)
        );

        graph.add(ResourceNode::new(
            &task_role,
            ResourceKind::IamRole,
            json!({
                "AssumeRolePolicyDocument": assume_role("ecs-tasks.amazonaws.com"),
                "Description": format!(
                    "Task role for {prefix} task with permissions for Secrets Manager and IoT publishing"
                ),
                "ManagedPolicyArns": [managed_policy("AmazonSSMReadOnlyAccess")],
                "Policies": [
                    inline_policy(
                        params,
                        format!("{prefix}ThingSecretRead"),
                        &["secretsmanager:GetSecretValue", "secretsmanager:DescribeSecret"],
                        json!(secret_arn),
                    )?,
                    inline_policy(
                        params,
                        format!("{prefix}LogsAndIoT"),
                        &[
                            "logs:CreateLogGroup",
                            "logs:CreateLogStream",
                            "logs:PutLogEvents",
                            "iot:DescribeEndpoint",
                            "iot:Connect",
                            "iot:Publish",
                            "iot:Subscribe",
                            "iot:Receive",
                        ],
                        json!("*"),
                    )?,
                ]
            }),
        ))?;

        graph.add(ResourceNode::new(
            &container,
            ResourceKind::EcsContainerDefinition,
            json!({
                "Name": container,
                "Image": import(&format!("{prefix}EcrRepositoryUri")),
                "Essential": true,
                "LogConfiguration": {
                    "LogDriver": "awslogs",
                    "Options": {
                        "awslogs-group": reference(&log_group),
                        "awslogs-stream-prefix": family,
                        "awslogs-region": region
                    }
                },
                "PortMappings": [{
                    "ContainerPort": 80,
                    "Protocol": "tcp"
                }]
            }),
        ))?;

        graph.add(ResourceNode::new(
            &task_definition,
            ResourceKind::EcsTaskDefinition,
            json!({
                "Family": family,
                "Cpu": "256",
                "Memory": "512",
                "NetworkMode": "awsvpc",
                "RequiresCompatibilities": ["FARGATE"],
                "ExecutionRoleArn": import(EXECUTION_ROLE_EXPORT),
                "TaskRoleArn": get_att(&task_role, "Arn"),
                "ContainerDefinitions": [reference(&container)]
            }),
        ))?;

        let cluster = match params.get(CLUSTER) {
            Some(cluster) => json!(cluster),
            None => import(CLUSTER_EXPORT),
        };

        let vpc = params.get(VPC).unwrap_or(DEFAULT_VPC);

        graph.add(ResourceNode::new(
            &service,
            ResourceKind::EcsService,
            json!({
                "Cluster": cluster,
                "LaunchType": "FARGATE",
                "TaskDefinition": reference(&task_definition),
                "DesiredCount": 1,
                "EnableExecuteCommand": true,
                "NetworkConfiguration": {
                    "AwsvpcConfiguration": {
                        "AssignPublicIp": "ENABLED",
                        "Subnets": {
                            "Fn::Split": [",", import(&format!("{vpc}PublicSubnetIds"))]
                        }
                    }
                }
            }),
        ))?;

        graph.export(
            &format!("{prefix}FargateServiceName"),
            &service,
            get_att(&service, "Name"),
            &format!("Fargate service of the {prefix} transmitter"),
        )?;

        graph.export(
            &format!("{prefix}TaskDefinitionFamily"),
            &task_definition,
            json!(family),
            &format!("Task definition family of the {prefix} transmitter"),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{instantiate, Catalog, TemplateKind};
    use crate::graph::EdgeTarget;
    use crate::params::TemplateParameters;

    fn params() -> TemplateParameters {
        TemplateParameters::from([
            ("prefix", "ENV"),
            ("account", "123456789012"),
            ("region", "us-east-1"),
        ])
    }

    #[test]
    fn imports_cluster_and_subnets_by_default() {
        let catalog = Catalog::standard();
        let template = catalog.get(TemplateKind::ContainerServicePipeline).unwrap();
        let graph = instantiate(template, &params()).unwrap();

        let mut imports = graph.imports();
        imports.sort();

        assert_eq!(
            imports,
            vec![
                "ENVEcrRepositoryUri",
                "EcsClusterName",
                "EcsTaskExecutionRoleArn",
                "IoTClusterVpcPublicSubnetIds",
            ]
        );

        let container_edges: Vec<_> = graph.edges_from("ENVContainer").collect();
        assert_eq!(container_edges.len(), 2);
        assert_eq!(container_edges[0].property, "Image");
        assert_eq!(
            container_edges[0].to,
            EdgeTarget::Export {
                name: "ENVEcrRepositoryUri".into()
            }
        );
    }

    #[test]
    fn explicit_cluster_and_vpc() {
        let catalog = Catalog::standard();
        let template = catalog.get(TemplateKind::ContainerServicePipeline).unwrap();
        let params = params()
            .with("cluster", "arn:aws:ecs:us-east-1:123456789012:cluster/IoTCluster")
            .with("vpc", "EdgeVpc");

        let graph = instantiate(template, &params).unwrap();
        let service = graph.node("ENVIoTService").unwrap();

        assert_eq!(
            service.properties["Cluster"],
            "arn:aws:ecs:us-east-1:123456789012:cluster/IoTCluster"
        );
        assert!(graph.imports().contains(&"EdgeVpcPublicSubnetIds"));
        assert!(!graph.imports().contains(&"EcsClusterName"));
    }

    #[test]
    fn task_role_reads_the_device_secret() {
        let catalog = Catalog::standard();
        let template = catalog.get(TemplateKind::ContainerServicePipeline).unwrap();
        let graph = instantiate(template, &params()).unwrap();
        let role = graph.node("ENVTaskRole").unwrap();

        assert_eq!(
            role.properties["Policies"][0]["PolicyDocument"]["Statement"][0]["Resource"],
            "arn:aws:secretsmanager:us-east-1:123456789012:secret:IoT/ENVThing/certs-*"
        );
    }

    #[test]
    fn policy_name_limit_blames_prefix() {
        let catalog = Catalog::standard();
        let template = catalog.get(TemplateKind::ContainerServicePipeline).unwrap();
        let prefix = "P".repeat(200);

        let error = instantiate(template, &params().with("prefix", &prefix)).unwrap_err();

        assert_eq!(error.field(), Some("prefix"));
        assert!(error.to_string().contains("ThingSecretRead\" is longer than 128 chars"));
    }
}
