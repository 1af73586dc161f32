//! SSM parameters read by a device transmitter at startup

use super::{limits, logical};
use crate::catalog::Blueprint;
use crate::error::Result;
use crate::graph::{GraphBuilder, ResourceKind, ResourceNode};
use crate::names::to_lower;
use crate::params::{ParameterSpec, Parameters, Rule, INTERVAL, PREFIX};
use serde_json::json;

const DEFAULT_INTERVAL: &str = "120";

const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required(PREFIX, Rule::Prefix, "Device prefix, e.g. GPS"),
    ParameterSpec::optional(INTERVAL, Rule::Interval, "Publish interval in seconds, 120 by default"),
];

const RESOURCES: &[ResourceKind] = &[ResourceKind::SsmParameter];

/// Parameter holding the topic a device publishes to
pub fn topic_parameter(prefix: &str) -> String {
    format!("/iot-topics/{}-topic-name", to_lower(prefix))
}

pub fn interval_parameter(prefix: &str) -> String {
    format!("/iot-settings/{}-publish-interval", to_lower(prefix))
}

pub struct DeviceConfiguration;

impl Blueprint for DeviceConfiguration {
    fn parameters(&self) -> &'static [ParameterSpec] {
        PARAMETERS
    }

    fn resources(&self) -> &'static [ResourceKind] {
        RESOURCES
    }

    fn build(&self, params: &Parameters, graph: &mut GraphBuilder) -> Result<()> {
        let prefix = params.prefix();
        let interval = params.get(INTERVAL).unwrap_or(DEFAULT_INTERVAL);

        graph.add(ResourceNode::new(
            logical(params, "topic-parameter")?,
            ResourceKind::SsmParameter,
            json!({
                "Name": params.checked(PREFIX, topic_parameter(prefix), limits::SSM_PARAMETER)?,
                "Type": "String",
                "Value": format!("IoT/{prefix}")
            }),
        ))?;

        graph.add(ResourceNode::new(
            logical(params, "publish-interval-parameter")?,
            ResourceKind::SsmParameter,
            json!({
                "Name": params.checked(PREFIX, interval_parameter(prefix), limits::SSM_PARAMETER)?,
                "Type": "String",
                "Value": interval
            }),
        ))
    }
}
