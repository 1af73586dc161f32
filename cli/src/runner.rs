use crate::config::config;
use crate::error::Error;
use crate::manifest::Manifest;
use crate::writer::Writer;
use stackgraph_template::{Catalog, Deployment};
use std::error::Error as StdError;
use std::path::{Path, PathBuf};

pub(crate) trait Runner {
    /// Manifest from --manifest, or from the current dir
    ///
    /// Account and region in the environment take precedence over the file.
    fn manifest(&self, path: Option<&Path>) -> Result<Manifest, Error> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(config().manifest_file));

        let manifest = Manifest::from_path(&path).map_err(|e| {
            self.error(
                Some("Manifest not loaded"),
                Some(&format!("{e:#}")),
                Some(e.into()),
            )
        })?;

        Ok(manifest.with_env(|name| std::env::var(name).ok()))
    }

    /// All stacks of the manifest checked as one deployment
    fn deployment(&self, manifest: &Manifest) -> Result<Deployment, Error> {
        manifest.deployment(&Catalog::standard()).map_err(|e| {
            self.error(
                Some("Invalid stacks"),
                Some(&format!("{e:#}")),
                Some(e.into()),
            )
        })
    }

    /// Run the command
    ///
    /// Returns an error shown to the user in case of failure
    fn run(&mut self) -> Result<(), Error>;

    /// Construct an error shown to the user
    fn error(
        &self,
        title: Option<&str>,
        description: Option<&str>,
        origin: Option<Box<dyn StdError>>,
    ) -> Error {
        if let Some(origin) = origin {
            log::error!("{origin:?}");
        }

        if let Some(title) = title {
            Error::new(title, description)
        } else {
            Error::new(
                "Failed to run the command",
                Some("Run with RUST_LOG=error to see what went wrong"),
            )
        }
    }
}

/// Return a runner for a command
pub(crate) trait Runnable {
    fn runner(&self, writer: &Writer) -> impl Runner;
}
