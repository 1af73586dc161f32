use crate::error::Error;
use crate::runner::{Runnable, Runner};
use crate::writer::Writer;
use serde_json::json;
use stackgraph_template::{Catalog, ResourceTemplate};
use tabled::settings::style::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "Template")]
    id: String,
    #[tabled(rename = "Parameters")]
    parameters: String,
    #[tabled(rename = "Description")]
    description: String,
}

impl From<&ResourceTemplate> for TemplateRow {
    fn from(template: &ResourceTemplate) -> Self {
        let parameters = template
            .parameters()
            .iter()
            .map(|p| {
                if p.required {
                    p.name.to_string()
                } else {
                    format!("[{}]", p.name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            id: template.kind().to_string(),
            parameters,
            description: template.description().to_string(),
        }
    }
}

#[derive(clap::Args, Clone)]
pub(crate) struct TemplatesCommand {
    /// Output the catalog as JSON
    #[arg(long)]
    json: bool,
}

impl Runnable for TemplatesCommand {
    fn runner(&self, writer: &Writer) -> impl Runner {
        TemplatesRunner {
            writer: Writer::new(self.json || writer.is_structured()),
        }
    }
}

struct TemplatesRunner {
    writer: Writer,
}

impl Runner for TemplatesRunner {
    /// Print every template with its parameters, optional ones in brackets
    fn run(&mut self) -> Result<(), Error> {
        let catalog = Catalog::standard();

        if self.writer.is_structured() {
            let templates: Vec<serde_json::Value> = catalog
                .iter()
                .map(|template| {
                    json!({
                        "id": template.kind(),
                        "description": template.description(),
                        "parameters": template.parameters().iter().map(|p| json!({
                            "name": p.name,
                            "required": p.required,
                            "description": p.description,
                        })).collect::<Vec<_>>(),
                        "resources": template.resources(),
                    })
                })
                .collect();

            return self.writer.json(json!(templates));
        }

        let rows: Vec<TemplateRow> = catalog.iter().map(TemplateRow::from).collect();
        let mut table = Table::new(rows);
        table.with(Style::modern());

        self.writer.text(&format!(
            "\n{}\n{table}\n",
            console::style("Templates").bold().green()
        ))
    }
}
