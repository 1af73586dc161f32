//! ECR repository holding a device transmitter image

use super::{limits, logical};
use crate::catalog::Blueprint;
use crate::error::Result;
use crate::graph::{GraphBuilder, RemovalPolicy, ResourceKind, ResourceNode};
use crate::intrinsic::get_att;
use crate::names::to_lower;
use crate::params::{ParameterSpec, Parameters, Rule, PREFIX};
use serde_json::json;

const PARAMETERS: &[ParameterSpec] = &[ParameterSpec::required(
    PREFIX,
    Rule::Prefix,
    "Device prefix, e.g. GPS",
)];

const RESOURCES: &[ResourceKind] = &[ResourceKind::EcrRepository];

pub struct ContainerRegistry;

impl Blueprint for ContainerRegistry {
    fn parameters(&self) -> &'static [ParameterSpec] {
        PARAMETERS
    }

    fn resources(&self) -> &'static [ResourceKind] {
        RESOURCES
    }

    fn build(&self, params: &Parameters, graph: &mut GraphBuilder) -> Result<()> {
        let prefix = params.prefix();
        let repository = logical(params, "ecr-repository")?;
        let repository_name = params.checked(
            PREFIX,
            format!("my-iot-{}-app", to_lower(prefix)),
            limits::ECR_REPOSITORY,
        )?;

        graph.add(
            ResourceNode::new(
                &repository,
                ResourceKind::EcrRepository,
                json!({
                    "RepositoryName": repository_name,
                    "EmptyOnDelete": true
                }),
            )
            .removal(RemovalPolicy::Destroy),
        )?;

        graph.export(
            &format!("{prefix}EcrRepositoryUri"),
            &repository,
            get_att(&repository, "RepositoryUri"),
            &format!("URI of the {prefix} transmitter image repository"),
        )
    }
}
