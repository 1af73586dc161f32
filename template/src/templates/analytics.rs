//! Glue database and crawler over the ETL results a prefix writes to the data bucket

use super::{assume_role, data_bucket, inline_policy, limits, logical, managed_policy};
use crate::catalog::Blueprint;
use crate::error::Result;
use crate::graph::{GraphBuilder, ResourceKind, ResourceNode};
use crate::intrinsic::{get_att, reference};
use crate::names::to_lower;
use crate::params::{ParameterSpec, Parameters, Rule, ACCOUNT, BUCKET, PREFIX, REGION};
use serde_json::json;

const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required(PREFIX, Rule::Prefix, "Device prefix, e.g. GPS"),
    ParameterSpec::required(ACCOUNT, Rule::Account, "Account owning the Glue catalog"),
    ParameterSpec::required(REGION, Rule::Region, "Region of the data bucket"),
    ParameterSpec::optional(
        BUCKET,
        Rule::Bucket,
        "Bucket the ETL job writes to, iot-data-{account}-{region} when omitted",
    ),
];

const RESOURCES: &[ResourceKind] = &[
    ResourceKind::IamRole,
    ResourceKind::GlueDatabase,
    ResourceKind::GlueCrawler,
];

pub struct AnalyticsCrawler;

impl Blueprint for AnalyticsCrawler {
    fn parameters(&self) -> &'static [ParameterSpec] {
        PARAMETERS
    }

    fn resources(&self) -> &'static [ResourceKind] {
        RESOURCES
    }

    fn build(&self, params: &Parameters, graph: &mut GraphBuilder) -> Result<()> {
        let prefix = params.prefix();
        let lower = to_lower(prefix);
        let account = params.require(ACCOUNT)?;
        let bucket = data_bucket(params)?;

        let role = logical(params, "analytics-crawler-role")?;
        let database = logical(params, "analytics-database")?;

        let database_name = params.checked(
            PREFIX,
            format!("{lower}_data_analytics_db"),
            limits::GLUE_NAME,
        )?;
        let crawler_name = params.checked(
            PREFIX,
            format!("{prefix}S3ResultsCrawler"),
            limits::GLUE_NAME,
        )?;

        graph.add(ResourceNode::new(
            &role,
            ResourceKind::IamRole,
            json!({
                "AssumeRolePolicyDocument": assume_role("glue.amazonaws.com"),
                "ManagedPolicyArns": [managed_policy("service-role/AWSGlueServiceRole")],
                "Policies": [inline_policy(
                    params,
                    format!("{prefix}AnalyticsBucketRead"),
                    &["s3:GetObject", "s3:ListBucket"],
                    json!([
                        format!("arn:aws:s3:::{bucket}"),
                        format!("arn:aws:s3:::{bucket}/*"),
                    ]),
                )?]
            }),
        ))?;

        graph.add(ResourceNode::new(
            &database,
            ResourceKind::GlueDatabase,
            json!({
                "CatalogId": account,
                "DatabaseInput": { "Name": database_name }
            }),
        ))?;

        // Same path the ingestion ETL job writes to
        graph.add(ResourceNode::new(
            logical(params, "s3-results-crawler")?,
            ResourceKind::GlueCrawler,
            json!({
                "Name": crawler_name,
                "Role": get_att(&role, "Arn"),
                "DatabaseName": reference(&database),
                "Targets": {
                    "S3Targets": [{ "Path": format!("s3://{bucket}/{lower}_data/") }]
                },
                "TablePrefix": "processed_"
            }),
        ))?;

        graph.export(
            &format!("{prefix}AnalyticsDatabaseName"),
            &database,
            reference(&database),
            &format!("Glue database with the processed {prefix} tables"),
        )
    }
}
