use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use serde_json::json;
use std::path::PathBuf;

#[derive(clap::Args, Clone)]
pub(crate) struct CheckCommand {
    /// Path to the manifest, stackgraph.toml in the current dir by default
    #[arg(short, long, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// Output the deploy order and unpublished imports as JSON
    #[arg(long)]
    json: bool,
}

impl Runnable for CheckCommand {
    fn runner(&self, writer: &Writer) -> impl Runner {
        CheckRunner {
            command: self.clone(),
            writer: Writer::new(self.json || writer.is_structured()),
        }
    }
}

struct CheckRunner {
    command: CheckCommand,
    writer: Writer,
}

impl Runner for CheckRunner {
    /// Build every stack, order them, check [exports] and list imports left for it
    fn run(&mut self) -> Result<(), Error> {
        let manifest = self.manifest(self.command.manifest.as_deref())?;
        let deployment = self.deployment(&manifest)?;

        let order = deployment.order().map_err(|e| {
            self.error(
                Some("Stacks can not be ordered"),
                Some(&e.to_string()),
                Some(e.into()),
            )
        })?;

        deployment.resolve(manifest.exports(), false).map_err(|e| {
            self.error(
                Some("Invalid [exports]"),
                Some(&e.to_string()),
                Some(e.into()),
            )
        })?;

        let unpublished: Vec<_> = deployment
            .unpublished_imports()
            .into_iter()
            .filter(|import| !manifest.exports().contains_key(import.export))
            .collect();

        if self.writer.is_structured() {
            return self.writer.json(json!({
                "order": order,
                "unpublished": unpublished.iter().map(|import| json!({
                    "stack": import.graph,
                    "resource": import.node,
                    "property": import.property,
                    "export": import.export,
                })).collect::<Vec<_>>(),
            }));
        }

        self.writer.text(&format!(
            "\n{} {}\n",
            console::style("Valid").bold().green(),
            console::style(manifest.path().display()).dim()
        ))?;

        for (index, name) in order.iter().enumerate() {
            self.writer.text(&format!("  {}. {name}\n", index + 1))?;
        }

        for import in &unpublished {
            self.writer.error(&format!(
                "{} {}/{} imports {} ({}), it must already be deployed\n",
                console::style("Warning").yellow().bold(),
                import.graph,
                import.node,
                console::style(import.export).bold(),
                import.property,
            ))?;
        }

        Ok(())
    }
}
