//! Shared network and ECS cluster for the device containers

use super::{assume_role, limits, logical, logical_pattern, managed_policy};
use crate::catalog::Blueprint;
use crate::error::Result;
use crate::graph::{GraphBuilder, ResourceKind, ResourceNode};
use crate::intrinsic::{get_att, reference};
use crate::params::{ParameterSpec, Parameters, Rule, PREFIX, REGION};
use serde_json::json;

const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::optional(PREFIX, Rule::Prefix, "Namespace for names and exports, none by default"),
    ParameterSpec::required(REGION, Rule::Region, "Region the subnets are spread over"),
];

const RESOURCES: &[ResourceKind] = &[
    ResourceKind::Ec2Vpc,
    ResourceKind::Ec2InternetGateway,
    ResourceKind::Ec2VpcGatewayAttachment,
    ResourceKind::Ec2RouteTable,
    ResourceKind::Ec2Route,
    ResourceKind::Ec2Subnet,
    ResourceKind::Ec2SubnetRouteTableAssociation,
    ResourceKind::EcsCluster,
    ResourceKind::IamRole,
];

const VPC_CIDR: &str = "10.0.0.0/16";
const SUBNET_CIDRS: [&str; 2] = ["10.0.0.0/24", "10.0.1.0/24"];

pub struct ContainerCluster;

impl Blueprint for ContainerCluster {
    fn parameters(&self) -> &'static [ParameterSpec] {
        PARAMETERS
    }

    fn resources(&self) -> &'static [ResourceKind] {
        RESOURCES
    }

    fn build(&self, params: &Parameters, graph: &mut GraphBuilder) -> Result<()> {
        let prefix = params.prefix();
        let region = params.require(REGION)?;

        let vpc = logical_pattern(params, format!("{prefix}IoTClusterVpc"))?;
        let gateway = format!("{vpc}InternetGateway");
        let attachment = format!("{vpc}GatewayAttachment");
        let route_table = format!("{vpc}PublicRouteTable");
        let cluster = logical_pattern(params, format!("{prefix}IoTCluster"))?;
        let execution_role = logical(params, "ecs-task-execution-role")?;

        let cluster_name = params.checked(PREFIX, cluster.clone(), limits::ECS_CLUSTER)?;
        let role_name = params.checked(
            PREFIX,
            format!("{prefix}ecsTaskExecutionRole"),
            limits::IAM_ROLE,
        )?;

        graph.add(ResourceNode::new(
            &vpc,
            ResourceKind::Ec2Vpc,
            json!({
                "CidrBlock": VPC_CIDR,
                "EnableDnsHostnames": true,
                "EnableDnsSupport": true,
                "Tags": [{ "Key": "Name", "Value": vpc }]
            }),
        ))?;

        graph.add(ResourceNode::new(&gateway, ResourceKind::Ec2InternetGateway, json!({})))?;

        graph.add(ResourceNode::new(
            &attachment,
            ResourceKind::Ec2VpcGatewayAttachment,
            json!({
                "VpcId": reference(&vpc),
                "InternetGatewayId": reference(&gateway)
            }),
        ))?;

        graph.add(ResourceNode::new(
            &route_table,
            ResourceKind::Ec2RouteTable,
            json!({ "VpcId": reference(&vpc) }),
        ))?;

        // The route is only usable once the gateway is attached to the VPC
        graph.add(
            ResourceNode::new(
                format!("{vpc}PublicRoute"),
                ResourceKind::Ec2Route,
                json!({
                    "RouteTableId": reference(&route_table),
                    "DestinationCidrBlock": "0.0.0.0/0",
                    "GatewayId": reference(&gateway)
                }),
            )
            .depends_on(&attachment),
        )?;

        let mut subnets = vec![];

        for (index, cidr) in SUBNET_CIDRS.iter().enumerate() {
            let subnet = format!("{vpc}PublicSubnet{}", index + 1);

            graph.add(ResourceNode::new(
                &subnet,
                ResourceKind::Ec2Subnet,
                json!({
                    "VpcId": reference(&vpc),
                    "CidrBlock": cidr,
                    "AvailabilityZone": { "Fn::Select": [index, { "Fn::GetAZs": region }] },
                    "MapPublicIpOnLaunch": true
                }),
            ))?;

            graph.add(ResourceNode::new(
                format!("{subnet}RouteTableAssociation"),
                ResourceKind::Ec2SubnetRouteTableAssociation,
                json!({
                    "SubnetId": reference(&subnet),
                    "RouteTableId": reference(&route_table)
                }),
            ))?;

            subnets.push(reference(&subnet));
        }

        graph.add(ResourceNode::new(
            &cluster,
            ResourceKind::EcsCluster,
            json!({ "ClusterName": cluster_name }),
        ))?;

        graph.add(ResourceNode::new(
            &execution_role,
            ResourceKind::IamRole,
            json!({
                "RoleName": role_name,
                "AssumeRolePolicyDocument": assume_role("ecs-tasks.amazonaws.com"),
                "ManagedPolicyArns": [managed_policy("service-role/AmazonECSTaskExecutionRolePolicy")]
            }),
        ))?;

        graph.export(
            &format!("{prefix}EcsClusterName"),
            &cluster,
            reference(&cluster),
            "ECS cluster running the device containers",
        )?;

        graph.export(
            &format!("{prefix}EcsTaskExecutionRoleArn"),
            &execution_role,
            get_att(&execution_role, "Arn"),
            "Role ECS uses to pull images and write logs",
        )?;

        graph.export(
            &format!("{vpc}PublicSubnetIds"),
            &vpc,
            json!({ "Fn::Join": [",", subnets] }),
            "Comma-separated public subnets of the cluster VPC",
        )
    }
}
