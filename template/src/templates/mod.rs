//! Built-in blueprints and the helpers they share

pub mod analytics;
pub mod cluster;
pub mod configuration;
pub mod container_service;
pub mod data_bucket;
pub mod device_identity;
pub mod ingestion;
pub mod registry;
pub mod web_auth;

use crate::error::Result;
use crate::names::logical_name;
use crate::params::{Parameters, ACCOUNT, BUCKET, PREFIX, REGION};
use serde_json::{json, Value};

/// Service limits on names derived from parameters
pub(crate) mod limits {
    pub const LOGICAL_ID: usize = 255;
    pub const COGNITO_POOL: usize = 128;
    pub const DYNAMODB_TABLE: usize = 255;
    pub const ECR_REPOSITORY: usize = 256;
    pub const ECS_CLUSTER: usize = 255;
    pub const ECS_FAMILY: usize = 255;
    pub const GLUE_NAME: usize = 255;
    pub const IAM_POLICY: usize = 128;
    pub const IAM_ROLE: usize = 64;
    pub const IOT_POLICY: usize = 128;
    pub const IOT_RULE: usize = 128;
    pub const IOT_THING: usize = 128;
    pub const LAMBDA_FUNCTION: usize = 64;
    pub const LOG_GROUP: usize = 512;
    pub const S3_BUCKET: usize = 63;
    pub const SECRET: usize = 512;
    pub const SSM_PARAMETER: usize = 1011;
}

/// Prefix followed by the UpperCamelCase role, checked against the logical id limit
pub(crate) fn logical(params: &Parameters, role: &str) -> Result<String> {
    params.checked(
        PREFIX,
        logical_name(params.prefix(), role),
        limits::LOGICAL_ID,
    )
}

/// Logical name built from a fixed pattern, e.g. IoT{prefix}TaskDefinition
pub(crate) fn logical_pattern(params: &Parameters, name: String) -> Result<String> {
    params.checked(PREFIX, name, limits::LOGICAL_ID)
}

/// Trust policy letting an AWS service assume a role
pub(crate) fn assume_role(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Effect": "Allow",
            "Principal": {
                "Service": [service]
            },
            "Action": ["sts:AssumeRole"]
        }]
    })
}

/// ARN of an AWS managed policy, e.g. service-role/AWSGlueServiceRole
pub(crate) fn managed_policy(name: &str) -> String {
    format!("arn:aws:iam::aws:policy/{name}")
}

/// The bucket parameter, or iot-data-{account}-{region} shared by the data templates
///
/// A default name over the S3 limit blames the region, the last part glued into it.
pub(crate) fn data_bucket(params: &Parameters) -> Result<String> {
    if let Some(bucket) = params.get(BUCKET) {
        return Ok(bucket.to_string());
    }

    let account = params.require(ACCOUNT)?;
    let region = params.require(REGION)?;

    params.checked(REGION, format!("iot-data-{account}-{region}"), limits::S3_BUCKET)
}

/// Inline policy with a single allow statement, its name checked against the IAM limit
pub(crate) fn inline_policy(
    params: &Parameters,
    name: String,
    actions: &[&str],
    resource: Value,
) -> Result<Value> {
    let name = params.checked(PREFIX, name, limits::IAM_POLICY)?;

    Ok(json!({
        "PolicyName": name,
        "PolicyDocument": {
            "Version": "2012-10-17",
            "Statement": [{
                "Effect": "Allow",
                "Action": actions,
                "Resource": resource
            }]
        }
    }))
}
