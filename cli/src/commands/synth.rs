use crate::config::config;
use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use eyre::WrapErr;
use serde_json::{Map, Value};
use stackgraph_template::{render, Deployment, ExportValues};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(clap::Args, Clone)]
pub(crate) struct SynthCommand {
    /// Path to the manifest, stackgraph.toml in the current dir by default
    #[arg(short, long, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// Write <Stack>.template.json files into the dir instead of printing them
    #[arg(short, long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Fail when an import is neither published by a stack nor given in [exports]
    #[arg(long)]
    strict: bool,

    /// Print the templates as one JSON object keyed by stack name
    #[arg(long)]
    json: bool,
}

impl Runnable for SynthCommand {
    fn runner(&self, writer: &Writer) -> impl Runner {
        SynthRunner {
            command: self.clone(),
            writer: Writer::new(self.json || writer.is_structured()),
        }
    }
}

struct SynthRunner {
    command: SynthCommand,
    writer: Writer,
}

impl Runner for SynthRunner {
    /// Render every stack of the manifest in deploy order
    fn run(&mut self) -> Result<(), Error> {
        let manifest = self.manifest(self.command.manifest.as_deref())?;
        let deployment = self.deployment(&manifest)?;

        let templates = synthesize(&deployment, manifest.exports(), self.command.strict)
            .map_err(|e| {
                self.error(
                    Some("Synthesis failed"),
                    Some(&format!("{e:#}")),
                    Some(e.into()),
                )
            })?;

        if let Some(dir) = &self.command.out {
            let paths = write_templates(dir, &templates)
                .map_err(|e| self.error(None, None, Some(e.into())))?;

            for path in paths {
                self.writer.text(&format!(
                    "{} {}\n",
                    console::style("Wrote").bold().green(),
                    path.display()
                ))?;
            }

            return Ok(());
        }

        if self.writer.is_structured() {
            let object: Map<String, Value> = templates.into_iter().collect();
            return self.writer.json(Value::Object(object));
        }

        for (name, template) in &templates {
            let body = serde_json::to_string_pretty(template)
                .map_err(|e| self.error(None, None, Some(e.into())))?;

            self.writer.text(&format!(
                "{}\n{body}\n",
                console::style(format!("# {name}")).dim()
            ))?;
        }

        Ok(())
    }
}

/// Stack name and CloudFormation template, publishers first
fn synthesize(
    deployment: &Deployment,
    exports: &ExportValues,
    strict: bool,
) -> eyre::Result<Vec<(String, Value)>> {
    let order = deployment.order().wrap_err("Stacks can not be ordered")?;
    let graphs = deployment
        .resolve(exports, strict)
        .wrap_err("Cross-stack exports are not resolved")?;

    let mut templates = vec![];

    for name in order {
        if let Some(graph) = graphs.iter().find(|g| g.name == name) {
            log::debug!("Rendering {name} with {} resources", graph.nodes.len());
            templates.push((name.to_string(), render(graph)));
        }
    }

    Ok(templates)
}

fn write_templates(dir: &Path, templates: &[(String, Value)]) -> eyre::Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).wrap_err(format!("Failed to create {dir:?}"))?;

    let mut paths = vec![];

    for (name, template) in templates {
        let path = dir.join(format!("{name}{}", config().template_suffix));
        let body = serde_json::to_string_pretty(template).wrap_err("Failed to serialize")?;

        fs::write(&path, format!("{body}\n")).wrap_err(format!("Failed to write {path:?}"))?;
        paths.push(path);
    }

    Ok(paths)
}
