//! Versioned data bucket shared by the data templates, with a File Gateway role on it

use super::{assume_role, data_bucket, inline_policy, logical};
use crate::catalog::Blueprint;
use crate::error::Result;
use crate::graph::{GraphBuilder, ResourceKind, ResourceNode};
use crate::intrinsic::{get_att, join, reference};
use crate::params::{ParameterSpec, Parameters, Rule, ACCOUNT, BUCKET, PREFIX, REGION};
use serde_json::json;

const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::optional(PREFIX, Rule::Prefix, "Namespace for names and exports, none by default"),
    ParameterSpec::required(ACCOUNT, Rule::Account, "Account owning the bucket"),
    ParameterSpec::required(REGION, Rule::Region, "Region of the bucket"),
    ParameterSpec::optional(
        BUCKET,
        Rule::Bucket,
        "Bucket name, iot-data-{account}-{region} when omitted",
    ),
];

const RESOURCES: &[ResourceKind] = &[ResourceKind::S3Bucket, ResourceKind::IamRole];

/// Days before objects move to Glacier
const GLACIER_AFTER_DAYS: u32 = 30;

pub struct DataBucket;

impl Blueprint for DataBucket {
    fn parameters(&self) -> &'static [ParameterSpec] {
        PARAMETERS
    }

    fn resources(&self) -> &'static [ResourceKind] {
        RESOURCES
    }

    fn build(&self, params: &Parameters, graph: &mut GraphBuilder) -> Result<()> {
        let prefix = params.prefix();
        let bucket_name = data_bucket(params)?;

        let bucket = logical(params, "data-bucket")?;
        let role = logical(params, "file-gateway-role")?;

        // Kept on stack deletion, it holds ingested data
        graph.add(ResourceNode::new(
            &bucket,
            ResourceKind::S3Bucket,
            json!({
                "BucketName": bucket_name,
                "VersioningConfiguration": { "Status": "Enabled" },
                "PublicAccessBlockConfiguration": {
                    "BlockPublicAcls": true,
                    "BlockPublicPolicy": true,
                    "IgnorePublicAcls": true,
                    "RestrictPublicBuckets": true
                },
                "LifecycleConfiguration": {
                    "Rules": [{
                        "Id": "MoveOldFilesToGlacier",
                        "Status": "Enabled",
                        "Transitions": [{
                            "StorageClass": "GLACIER",
                            "TransitionInDays": GLACIER_AFTER_DAYS
                        }]
                    }]
                }
            }),
        ))?;

        graph.add(ResourceNode::new(
            &role,
            ResourceKind::IamRole,
            json!({
                "AssumeRolePolicyDocument": assume_role("storagegateway.amazonaws.com"),
                "Policies": [inline_policy(
                    params,
                    format!("{prefix}FileGatewayAccess"),
                    &["s3:PutObject", "s3:GetObject", "s3:DeleteObject", "s3:ListBucket"],
                    json!([
                        get_att(&bucket, "Arn"),
                        join(vec![get_att(&bucket, "Arn"), json!("/*")]),
                    ]),
                )?]
            }),
        ))?;

        graph.export(
            &format!("{prefix}DataBucketName"),
            &bucket,
            reference(&bucket),
            "Bucket with device data, ETL scripts and Lambda code",
        )?;

        graph.export(
            &format!("{prefix}DataBucketArn"),
            &bucket,
            get_att(&bucket, "Arn"),
            "ARN of the data bucket",
        )?;

        graph.export(
            &format!("{prefix}FileGatewayRoleArn"),
            &role,
            get_att(&role, "Arn"),
            "Role a Storage Gateway file share uses to reach the data bucket",
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{instantiate, Catalog, TemplateKind};
    use crate::graph::RemovalPolicy;
    use crate::params::TemplateParameters;
    use serde_json::json;

    #[test]
    fn bucket_named_after_account_and_region() {
        let catalog = Catalog::standard();
        let template = catalog.get(TemplateKind::DataBucket).unwrap();
        let params = TemplateParameters::from([("account", "123456789012"), ("region", "us-east-1")]);

        let graph = instantiate(template, &params).unwrap();
        assert_eq!(graph.name, "DataBucket");

        let bucket = graph.node("DataBucket").unwrap();
        assert_eq!(bucket.properties["BucketName"], "iot-data-123456789012-us-east-1");
        assert_eq!(bucket.removal_policy, RemovalPolicy::Retain);
        assert_eq!(
            bucket.properties["LifecycleConfiguration"]["Rules"][0]["Transitions"][0],
            json!({ "StorageClass": "GLACIER", "TransitionInDays": 30 })
        );

        let role = graph.node("FileGatewayRole").unwrap();
        let policy = &role.properties["Policies"][0];
        assert_eq!(policy["PolicyName"], "FileGatewayAccess");
        assert_eq!(
            policy["PolicyDocument"]["Statement"][0]["Resource"][1],
            json!({ "Fn::Join": ["", [{ "Fn::GetAtt": ["DataBucket", "Arn"] }, "/*"]] })
        );

        assert!(graph.has_edge("FileGatewayRole", "DataBucket"));
        assert!(graph.export("DataBucketName").is_some());
        assert!(graph.export("FileGatewayRoleArn").is_some());
    }

    #[test]
    fn explicit_bucket_and_prefix() {
        let catalog = Catalog::standard();
        let template = catalog.get(TemplateKind::DataBucket).unwrap();
        let params = TemplateParameters::from([
            ("prefix", "Lab"),
            ("account", "123456789012"),
            ("region", "us-east-1"),
            ("bucket", "lab-data-storage"),
        ]);

        let graph = instantiate(template, &params).unwrap();

        assert_eq!(
            graph.node("LabDataBucket").unwrap().properties["BucketName"],
            "lab-data-storage"
        );
        assert!(graph.export("LabDataBucketArn").is_some());
    }
}
