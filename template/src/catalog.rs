//! Catalog of resource templates and the instantiator

use crate::error::{Error, Result};
use crate::graph::{GraphBuilder, ResourceGraph, ResourceKind};
use crate::names::role_name;
use crate::params::{ParameterSpec, Parameters, TemplateParameters, PREFIX};
use crate::templates;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

/// Templates known to the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    IngestionPipeline,
    DeviceIdentityPipeline,
    ContainerServicePipeline,
    ContainerRegistry,
    ContainerCluster,
    DeviceConfiguration,
    WebAuth,
    DataBucket,
    AnalyticsCrawler,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 9] = [
        TemplateKind::IngestionPipeline,
        TemplateKind::DeviceIdentityPipeline,
        TemplateKind::ContainerServicePipeline,
        TemplateKind::ContainerRegistry,
        TemplateKind::ContainerCluster,
        TemplateKind::DeviceConfiguration,
        TemplateKind::WebAuth,
        TemplateKind::DataBucket,
        TemplateKind::AnalyticsCrawler,
    ];

    /// Kebab-case identifier used in manifests
    pub fn id(&self) -> &'static str {
        match self {
            TemplateKind::IngestionPipeline => "ingestion-pipeline",
            TemplateKind::DeviceIdentityPipeline => "device-identity-pipeline",
            TemplateKind::ContainerServicePipeline => "container-service-pipeline",
            TemplateKind::ContainerRegistry => "container-registry",
            TemplateKind::ContainerCluster => "container-cluster",
            TemplateKind::DeviceConfiguration => "device-configuration",
            TemplateKind::WebAuth => "web-auth",
            TemplateKind::DataBucket => "data-bucket",
            TemplateKind::AnalyticsCrawler => "analytics-crawler",
        }
    }
}

impl Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl FromStr for TemplateKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TemplateKind::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| Error::UnknownTemplate(s.to_string()))
    }
}

/// The resource topology behind a template
pub trait Blueprint: Send + Sync {
    /// Parameters the template accepts
    fn parameters(&self) -> &'static [ParameterSpec];

    /// Kinds of resources the template declares
    fn resources(&self) -> &'static [ResourceKind];

    /// Declare the resources and exports for validated parameters
    fn build(&self, params: &Parameters, graph: &mut GraphBuilder) -> Result<()>;
}

/// A named, parameterized description of a resource topology
pub struct ResourceTemplate {
    kind: TemplateKind,
    description: &'static str,
    blueprint: Box<dyn Blueprint>,
}

impl std::fmt::Debug for ResourceTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTemplate")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .finish()
    }
}

impl ResourceTemplate {
    pub fn new(
        kind: TemplateKind,
        description: &'static str,
        blueprint: impl Blueprint + 'static,
    ) -> Self {
        Self {
            kind,
            description,
            blueprint: Box::new(blueprint),
        }
    }

    pub fn kind(&self) -> TemplateKind {
        self.kind
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    pub fn parameters(&self) -> &'static [ParameterSpec] {
        self.blueprint.parameters()
    }

    pub fn resources(&self) -> &'static [ResourceKind] {
        self.blueprint.resources()
    }

    /// Label of one instance, e.g. device-identity-pipeline[GPS]
    pub fn origin(&self, params: &TemplateParameters) -> String {
        match params.get(PREFIX).filter(|p| !p.is_empty()) {
            Some(prefix) => format!("{}[{prefix}]", self.kind),
            None => self.kind.to_string(),
        }
    }

    /// Stack name used when the template is instantiated on its own, GPS + ingestion-pipeline -> GPSIngestionPipeline
    pub fn stack_name(&self, params: &TemplateParameters) -> String {
        format!(
            "{}{}",
            params.get(PREFIX).unwrap_or_default(),
            role_name(self.kind.id())
        )
    }
}

/// Immutable set of templates
#[derive(Debug)]
pub struct Catalog {
    templates: Vec<ResourceTemplate>,
}

impl Catalog {
    /// All built-in templates
    pub fn standard() -> Self {
        Self {
            templates: vec![
                ResourceTemplate::new(
                    TemplateKind::IngestionPipeline,
                    "Device topic into a DynamoDB table through a Lambda, crawled and exported by Glue",
                    templates::ingestion::IngestionPipeline,
                ),
                ResourceTemplate::new(
                    TemplateKind::DeviceIdentityPipeline,
                    "IoT thing with a policy and a certificate stored in Secrets Manager",
                    templates::device_identity::DeviceIdentityPipeline,
                ),
                ResourceTemplate::new(
                    TemplateKind::ContainerServicePipeline,
                    "Fargate service running the device transmitter image",
                    templates::container_service::ContainerServicePipeline,
                ),
                ResourceTemplate::new(
                    TemplateKind::ContainerRegistry,
                    "ECR repository for a device transmitter image",
                    templates::registry::ContainerRegistry,
                ),
                ResourceTemplate::new(
                    TemplateKind::ContainerCluster,
                    "VPC with public subnets, ECS cluster and task execution role",
                    templates::cluster::ContainerCluster,
                ),
                ResourceTemplate::new(
                    TemplateKind::DeviceConfiguration,
                    "SSM parameters with a device's topic name and publish interval",
                    templates::configuration::DeviceConfiguration,
                ),
                ResourceTemplate::new(
                    TemplateKind::WebAuth,
                    "Cognito user pool, web client and identity pool for signed-in users",
                    templates::web_auth::WebAuth,
                ),
                ResourceTemplate::new(
                    TemplateKind::DataBucket,
                    "Versioned data bucket moving old files to Glacier, with a File Gateway role",
                    templates::data_bucket::DataBucket,
                ),
                ResourceTemplate::new(
                    TemplateKind::AnalyticsCrawler,
                    "Glue database and crawler over the ETL results in the data bucket",
                    templates::analytics::AnalyticsCrawler,
                ),
            ],
        }
    }

    pub fn get(&self, kind: TemplateKind) -> Option<&ResourceTemplate> {
        self.templates.iter().find(|t| t.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceTemplate> {
        self.templates.iter()
    }
}

/// Build the resource graph of a single template instance
pub fn instantiate(
    template: &ResourceTemplate,
    params: &TemplateParameters,
) -> Result<ResourceGraph> {
    let mut builder = GraphBuilder::new(&template.stack_name(params));
    instantiate_into(&mut builder, template, params)?;
    builder.build()
}

/// Add a template instance to a graph shared with other instances
///
/// Whole-graph checks (dangling references, cycles) run in `GraphBuilder::build`.
pub fn instantiate_into(
    builder: &mut GraphBuilder,
    template: &ResourceTemplate,
    params: &TemplateParameters,
) -> Result<()> {
    let validated = params.validate(template.kind.id(), template.parameters())?;
    let origin = template.origin(params);

    log::debug!("Instantiating {origin} into {}", builder.name());

    builder.begin_instance(&origin);
    template.blueprint.build(&validated, builder)
}
