use crate::config::config;
use crate::error::Error;
use eyre::{eyre, WrapErr};
use serde::Deserialize;
use stackgraph_template::params::{ACCOUNT, REGION};
use stackgraph_template::{
    instantiate_into, CasePolicy, Catalog, Deployment, ExportValues, GraphBuilder, ResourceGraph,
    TemplateKind, TemplateParameters,
};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Manifest is the structure of stackgraph.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct Manifest {
    /// [deployment]
    /// account = "123456789012"
    #[serde(default)]
    deployment: DeploymentSection,

    /// [exports]
    /// GPSEcrRepositoryUri = "..."
    #[serde(default)]
    exports: ExportValues,

    /// [[stack]]
    /// name = "IotCodeStack"
    #[serde(default, rename = "stack")]
    stacks: Vec<StackSection>,

    #[serde(skip)]
    path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DeploymentSection {
    account: Option<String>,
    region: Option<String>,

    #[serde(default)]
    case_policy: CasePolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct StackSection {
    name: String,

    /// [[stack.instance]]
    /// template = "device-identity-pipeline"
    /// prefix = "GPS"
    #[serde(default, rename = "instance")]
    instances: Vec<InstanceSection>,
}

#[derive(Debug, Clone, Deserialize)]
struct InstanceSection {
    template: String,

    /// Everything else is a template parameter
    #[serde(flatten)]
    params: BTreeMap<String, toml::Value>,
}

impl Manifest {
    /// Read and parse a manifest file
    pub(crate) fn from_path(path: &Path) -> eyre::Result<Self> {
        let toml_string = fs::read_to_string(path).wrap_err(Error::new(
            &format!("Failed to read {path:?}"),
            Some(&format!(
                "Run the command in a dir with {} or pass --manifest",
                config().manifest_file
            )),
        ))?;

        let mut manifest = Self::parse(&toml_string)
            .wrap_err(format!("Failed to parse {path:?}"))?;

        manifest.path = path.to_path_buf();
        Ok(manifest)
    }

    pub(crate) fn parse(toml_string: &str) -> eyre::Result<Self> {
        let manifest: Manifest = toml::from_str(toml_string).wrap_err("Invalid manifest")?;

        if manifest.stacks.is_empty() {
            return Err(eyre!("No [[stack]] declared"));
        }

        Ok(manifest)
    }

    /// Override [deployment] account and region with values from the environment
    pub(crate) fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(account) = var(config().account_env).filter(|v| !v.is_empty()) {
            log::info!("Using account {account} from {}", config().account_env);
            self.deployment.account = Some(account);
        }

        if let Some(region) = var(config().region_env).filter(|v| !v.is_empty()) {
            log::info!("Using region {region} from {}", config().region_env);
            self.deployment.region = Some(region);
        }

        self
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn exports(&self) -> &ExportValues {
        &self.exports
    }

    pub(crate) fn case_policy(&self) -> CasePolicy {
        self.deployment.case_policy
    }

    /// Instantiate every stack of the manifest
    pub(crate) fn graphs(&self, catalog: &Catalog) -> eyre::Result<Vec<ResourceGraph>> {
        self.stacks
            .iter()
            .map(|stack| {
                self.stack_graph(stack, catalog)
                    .wrap_err(format!("Failed to build stack {}", stack.name))
            })
            .collect()
    }

    /// Instantiate the stacks and check them as one deployment
    pub(crate) fn deployment(&self, catalog: &Catalog) -> eyre::Result<Deployment> {
        let graphs = self.graphs(catalog)?;

        Deployment::new(graphs, self.case_policy()).wrap_err("Stacks do not form a valid deployment")
    }

    fn stack_graph(&self, stack: &StackSection, catalog: &Catalog) -> eyre::Result<ResourceGraph> {
        let mut builder = GraphBuilder::new(&stack.name).with_case_policy(self.case_policy());

        for (index, instance) in stack.instances.iter().enumerate() {
            let kind: TemplateKind = instance.template.parse()?;
            let template = catalog
                .get(kind)
                .ok_or_else(|| eyre!("Template {kind} is not in the catalog"))?;

            let mut params = TemplateParameters::new();

            for (name, value) in &instance.params {
                params.insert(name, &parameter_value(name, value)?);
            }

            // Deployment-wide defaults apply only where the template takes them
            for (name, default) in [
                (ACCOUNT, &self.deployment.account),
                (REGION, &self.deployment.region),
            ] {
                let declared = template.parameters().iter().any(|p| p.name == name);

                if let Some(default) = default.as_deref().filter(|_| declared) {
                    if !params.contains(name) {
                        params.insert(name, default);
                    }
                }
            }

            instantiate_into(&mut builder, template, &params).wrap_err(format!(
                "Instance #{} ({}) is invalid",
                index + 1,
                template.origin(&params)
            ))?;
        }

        Ok(builder.build()?)
    }
}

/// Parameters are strings, integers are accepted for convenience (interval = 120)
fn parameter_value(name: &str, value: &toml::Value) -> eyre::Result<String> {
    match value {
        toml::Value::String(value) => Ok(value.clone()),
        toml::Value::Integer(value) => Ok(value.to_string()),
        _ => Err(eyre!("Parameter \"{name}\" must be a string or an integer")),
    }
}
