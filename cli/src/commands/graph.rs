use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use stackgraph_template::{EdgeTarget, ResourceGraph, ResourceNode};
use std::path::PathBuf;
use tabled::settings::style::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Resource")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "References")]
    references: String,
    #[tabled(rename = "Instance")]
    origin: String,
}

impl NodeRow {
    fn new(graph: &ResourceGraph, node: &ResourceNode) -> Self {
        let references = graph
            .edges_from(&node.logical_name)
            .map(|edge| match &edge.to {
                EdgeTarget::Node { name, .. } => name.clone(),
                EdgeTarget::Export { name } => format!("import:{name}"),
            })
            .collect::<Vec<_>>()
            .join("\n");

        Self {
            name: node.logical_name.clone(),
            kind: node.kind.as_str().to_string(),
            references,
            origin: node.origin.clone(),
        }
    }
}

#[derive(clap::Args, Clone)]
pub(crate) struct GraphCommand {
    /// Path to the manifest, stackgraph.toml in the current dir by default
    #[arg(short, long, value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// Output nodes, edges and exports as JSON
    #[arg(long)]
    json: bool,
}

impl Runnable for GraphCommand {
    fn runner(&self, writer: &Writer) -> impl Runner {
        GraphRunner {
            command: self.clone(),
            writer: Writer::new(self.json || writer.is_structured()),
        }
    }
}

struct GraphRunner {
    command: GraphCommand,
    writer: Writer,
}

impl Runner for GraphRunner {
    /// Print a table of resources per stack, followed by its exports
    fn run(&mut self) -> Result<(), Error> {
        let manifest = self.manifest(self.command.manifest.as_deref())?;
        let deployment = self.deployment(&manifest)?;

        if self.writer.is_structured() {
            let graphs = serde_json::to_value(deployment.graphs()).map_err(|e| {
                self.error(
                    Some("Output error"),
                    Some("Could not serialize the graphs"),
                    Some(e.into()),
                )
            })?;

            return self.writer.json(graphs);
        }

        for graph in deployment.graphs() {
            let rows: Vec<NodeRow> = graph.nodes.iter().map(|n| NodeRow::new(graph, n)).collect();
            let mut table = Table::new(rows);
            table.with(Style::modern());

            self.writer.text(&format!(
                "\n{} {}\n{table}\n",
                console::style(&graph.name).bold().green(),
                console::style(format!("({} resources)", graph.nodes.len())).dim(),
            ))?;

            for export in &graph.exports {
                self.writer.text(&format!(
                    "  {} {} {}\n",
                    console::style("export").dim(),
                    console::style(&export.name).bold(),
                    console::style(format!("from {}", export.node)).dim(),
                ))?;
            }
        }

        Ok(())
    }
}
