//! Device topic into DynamoDB through a Lambda, crawled and exported to S3 by Glue

use super::{assume_role, data_bucket, inline_policy, limits, logical, managed_policy};
use crate::catalog::Blueprint;
use crate::error::Result;
use crate::graph::{GraphBuilder, RemovalPolicy, ResourceKind, ResourceNode};
use crate::intrinsic::{get_att, reference};
use crate::names::{to_camel, to_lower};
use crate::params::{ParameterSpec, Parameters, Rule, ACCOUNT, BUCKET, PREFIX, REGION};
use serde_json::json;

const PARAMETERS: &[ParameterSpec] = &[
    ParameterSpec::required(PREFIX, Rule::Prefix, "Device prefix, e.g. GPS"),
    ParameterSpec::required(ACCOUNT, Rule::Account, "Account owning the Glue catalog"),
    ParameterSpec::required(REGION, Rule::Region, "Region of the pipeline"),
    ParameterSpec::optional(
        BUCKET,
        Rule::Bucket,
        "Bucket with ETL scripts, Lambda code and job output, iot-data-{account}-{region} when omitted",
    ),
];

const RESOURCES: &[ResourceKind] = &[
    ResourceKind::DynamoDbTable,
    ResourceKind::IamRole,
    ResourceKind::LambdaFunction,
    ResourceKind::IotTopicRule,
    ResourceKind::LambdaPermission,
    ResourceKind::GlueDatabase,
    ResourceKind::GlueCrawler,
    ResourceKind::GlueJob,
];

pub struct IngestionPipeline;

impl Blueprint for IngestionPipeline {
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

        let table = logical(params, "data-table")?;
        let lambda_role = logical(params, "lambda-role")?;
        let function = logical(params, "topic-processor")?;
        let rule = logical(params, "iot-rule")?;
        let glue_role = logical(params, "glue-role")?;
        let database = logical(params, "data-catalog")?;
        let job = logical(params, "dynamo-db-to-s3-job")?;

        let table_name = params.checked(PREFIX, format!("{prefix}DataTable"), limits::DYNAMODB_TABLE)?;
        let function_name = params.checked(
            PREFIX,
            format!("{prefix}TopicProcessor"),
            limits::LAMBDA_FUNCTION,
        )?;
        let rule_name = params.checked(PREFIX, format!("{prefix}IotRule"), limits::IOT_RULE)?;
        let database_name = params.checked(
            PREFIX,
            format!("{lower}_data_catalog"),
            limits::GLUE_NAME,
        )?;
        let crawler_name = params.checked(PREFIX, format!("DynamoDB{lower}"), limits::GLUE_NAME)?;
        let job_name = params.checked(PREFIX, format!("DynamoDBToS3{prefix}"), limits::GLUE_NAME)?;

        graph.add(
            ResourceNode::new(
                &table,
                ResourceKind::DynamoDbTable,
                json!({
                    "TableName": table_name,
                    "AttributeDefinitions": [
                        { "AttributeName": "Topic", "AttributeType": "S" },
                        { "AttributeName": "Timestamp", "AttributeType": "S" }
                    ],
                    "KeySchema": [
                        { "AttributeName": "Topic", "KeyType": "HASH" },
                        { "AttributeName": "Timestamp", "KeyType": "RANGE" }
                    ],
                    "BillingMode": "PAY_PER_REQUEST"
                }),
            )
            .removal(RemovalPolicy::Destroy),
        )?;

        graph.add(ResourceNode::new(
            &lambda_role,
            ResourceKind::IamRole,
            json!({
                "AssumeRolePolicyDocument": assume_role("lambda.amazonaws.com"),
                "Path": "/",
                "ManagedPolicyArns": [managed_policy("service-role/AWSLambdaBasicExecutionRole")],
                "Policies": [inline_policy(
                    params,
                    format!("{prefix}DataTableReadWrite"),
                    &[
                        "dynamodb:BatchGetItem",
                        "dynamodb:BatchWriteItem",
                        "dynamodb:DeleteItem",
                        "dynamodb:GetItem",
                        "dynamodb:PutItem",
                        "dynamodb:Query",
                        "dynamodb:Scan",
                        "dynamodb:UpdateItem",
                    ],
                    get_att(&table, "Arn"),
                )?]
            }),
        ))?;

        graph.add(
            ResourceNode::new(
                &function,
                ResourceKind::LambdaFunction,
                json!({
                    "FunctionName": function_name,
                    "Handler": format!("{function_name}.lambda_handler"),
                    "Runtime": "python3.12",
                    "Role": get_att(&lambda_role, "Arn"),
                    "Code": {
                        "S3Bucket": bucket,
                        "S3Key": format!("lambda/{function_name}.zip")
                    },
                    "Environment": {
                        "Variables": {
                            format!("{}DataTable", to_camel(prefix)): reference(&table)
                        }
                    }
                }),
            )
            .removal(RemovalPolicy::Destroy),
        )?;

        graph.add(
            ResourceNode::new(
                &rule,
                ResourceKind::IotTopicRule,
                json!({
                    "RuleName": rule_name,
                    "TopicRulePayload": {
                        "Description": format!("Processes the {prefix} topic"),
                        "Sql": format!("SELECT * FROM 'IoT/{prefix}'"),
                        "Actions": [{
                            "Lambda": { "FunctionArn": get_att(&function, "Arn") }
                        }],
                        "RuleDisabled": false
                    }
                }),
            )
            .removal(RemovalPolicy::Destroy),
        )?;

        graph.add(ResourceNode::new(
            logical(params, "iot-invoke-permission")?,
            ResourceKind::LambdaPermission,
            json!({
                "Action": "lambda:InvokeFunction",
                "FunctionName": get_att(&function, "Arn"),
                "Principal": "iot.amazonaws.com",
                "SourceAccount": account,
                "SourceArn": get_att(&rule, "Arn")
            }),
        ))?;

        graph.add(ResourceNode::new(
            &glue_role,
            ResourceKind::IamRole,
            json!({
                "AssumeRolePolicyDocument": assume_role("glue.amazonaws.com"),
                "ManagedPolicyArns": [
                    managed_policy("service-role/AWSGlueServiceRole"),
                    managed_policy("AmazonDynamoDBReadOnlyAccess"),
                    managed_policy("AmazonS3FullAccess"),
                ]
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

        graph.add(ResourceNode::new(
            logical(params, "dynamo-db-crawler")?,
            ResourceKind::GlueCrawler,
            json!({
                "Name": crawler_name,
                "Role": get_att(&glue_role, "Arn"),
                "DatabaseName": reference(&database),
                "Targets": {
                    "DynamoDBTargets": [{ "Path": reference(&table) }]
                },
                "Schedule": { "ScheduleExpression": "cron(0 12 * * ? *)" },
                "TablePrefix": ""
            }),
        ))?;

        graph.add(ResourceNode::new(
            &job,
            ResourceKind::GlueJob,
            json!({
                "Name": job_name,
                "Role": get_att(&glue_role, "Arn"),
                "Command": {
                    "Name": "glueetl",
                    "ScriptLocation": format!("s3://{bucket}/scripts/etl_{prefix}toDb.py"),
                    "PythonVersion": "3"
                },
                "DefaultArguments": {
                    "--job-language": "python",
                    "--TempDir": format!("s3://{bucket}/tmp/"),
                    "--enable-metrics": "",
                    "--enable-continuous-cloudwatch-log": "true",
                    "--s3_output_path": format!("s3://{bucket}/{lower}_data/"),
                    "--table_name": reference(&table),
                    "--Dlog4j2.formatMsgNoLookups": "true"
                },
                "MaxRetries": 3,
                "GlueVersion": "3.0",
                "NumberOfWorkers": 2,
                "WorkerType": "G.1X",
                "Timeout": 20
            }),
        ))?;

        graph.export(
            &format!("{prefix}DataTableName"),
            &table,
            reference(&table),
            &format!("Table with {prefix} topic messages"),
        )?;

        graph.export(
            &format!("{prefix}GlueJobName"),
            &job,
            reference(&job),
            &format!("Glue job exporting {prefix} data to S3"),
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::{instantiate, Catalog, TemplateKind};
    use crate::params::TemplateParameters;

    fn params() -> TemplateParameters {
        TemplateParameters::from([
            ("prefix", "GPS"),
            ("account", "123456789012"),
            ("region", "us-east-1"),
        ])
    }

    #[test]
    fn derived_names() {
        let catalog = Catalog::standard();
        let template = catalog.get(TemplateKind::IngestionPipeline).unwrap();
        let graph = instantiate(template, &params()).unwrap();

        let function = graph.node("GPSTopicProcessor").unwrap();
        assert_eq!(function.properties["FunctionName"], "GPSTopicProcessor");
        assert_eq!(
            function.properties["Environment"]["Variables"]["GpsDataTable"],
            serde_json::json!({"Ref": "GPSDataTable"})
        );

        let rule = graph.node("GPSIotRule").unwrap();
        assert_eq!(
            rule.properties["TopicRulePayload"]["Sql"],
            "SELECT * FROM 'IoT/GPS'"
        );

        let crawler = graph.node("GPSDynamoDbCrawler").unwrap();
        assert_eq!(crawler.properties["Name"], "DynamoDBgps");

        let database = graph.node("GPSDataCatalog").unwrap();
        assert_eq!(database.properties["DatabaseInput"]["Name"], "gps_data_catalog");

        let job = graph.node("GPSDynamoDbToS3Job").unwrap();
        assert_eq!(job.properties["Name"], "DynamoDBToS3GPS");
        assert_eq!(
            job.properties["Command"]["ScriptLocation"],
            "s3://iot-data-123456789012-us-east-1/scripts/etl_GPStoDb.py"
        );
        assert_eq!(
            job.properties["DefaultArguments"]["--s3_output_path"],
            "s3://iot-data-123456789012-us-east-1/gps_data/"
        );
    }

    #[test]
    fn edges_follow_the_data_flow() {
        let catalog = Catalog::standard();
        let template = catalog.get(TemplateKind::IngestionPipeline).unwrap();
        let graph = instantiate(template, &params()).unwrap();

        assert!(graph.has_edge("GPSTopicProcessor", "GPSLambdaRole"));
        assert!(graph.has_edge("GPSTopicProcessor", "GPSDataTable"));
        assert!(graph.has_edge("GPSIotRule", "GPSTopicProcessor"));
        assert!(graph.has_edge("GPSIotInvokePermission", "GPSIotRule"));
        assert!(graph.has_edge("GPSDynamoDbCrawler", "GPSDataCatalog"));
        assert!(graph.has_edge("GPSDynamoDbToS3Job", "GPSGlueRole"));
        assert!(graph.is_resolved());
    }

    #[test]
    fn explicit_bucket() {
        let catalog = Catalog::standard();
        let template = catalog.get(TemplateKind::IngestionPipeline).unwrap();
        let graph = instantiate(template, &params().with("bucket", "wildlife-etl")).unwrap();
        let job = graph.node("GPSDynamoDbToS3Job").unwrap();

        assert_eq!(job.properties["DefaultArguments"]["--TempDir"], "s3://wildlife-etl/tmp/");
    }

    #[test]
    fn function_name_limit_blames_prefix() {
        let catalog = Catalog::standard();
        let template = catalog.get(TemplateKind::IngestionPipeline).unwrap();
        let prefix = "G".repeat(60);

        let error = instantiate(template, &params().with("prefix", &prefix)).unwrap_err();
        assert_eq!(error.field(), Some("prefix"));
    }
}
