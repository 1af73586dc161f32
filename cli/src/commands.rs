pub(crate) mod check;
pub(crate) mod graph;
pub(crate) mod synth;
pub(crate) mod templates;
use clap::Subcommand;

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List the templates of the catalog and their parameters
    Templates(templates::TemplatesCommand),

    /// Show the resource graph of every stack in the manifest
    Graph(graph::GraphCommand),

    /// Resolve cross-stack exports and write CloudFormation templates
    Synth(synth::SynthCommand),

    /// Validate the manifest and print the deploy order
    Check(check::CheckCommand),
}
