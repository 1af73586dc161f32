use crate::error::Error;
use std::io::Write;

/// Write all stdout/stderr outputs in the app
///
/// In either plain text mode or structured (JSON).
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Writer {
    is_structured: bool,
}

impl Writer {
    pub(crate) fn new(is_structured: bool) -> Self {
        Writer { is_structured }
    }

    /// Output plain text
    ///
    /// Prints out nothing but a warning (in warn log level) when the writer is in structured mode.
    pub(crate) fn text(&self, output: &str) -> Result<(), Error> {
        if self.is_structured {
            log::warn!("Skipping output (not structured data): {output}");
            return Ok(());
        }

        self.write(output, false)
    }

    /// Output serialized JSON
    ///
    /// Prints out nothing but a warning (in warn log level) when the writer is in plain text mode.
    pub(crate) fn json(&self, output: serde_json::Value) -> Result<(), Error> {
        if !self.is_structured {
            log::warn!("Skipping output (not plain text): {output}");
            return Ok(());
        }

        let output = serde_json::to_string_pretty(&output).map_err(|e| {
            log::error!("Failed to serialize output: {e:?}");
            Error::new("Output error", Some("Could not serialize the output to JSON"))
        })?;

        self.write(&format!("{output}\n"), false)
    }

    /// Output plain text in stderr, in both modes
    pub(crate) fn error(&self, output: &str) -> Result<(), Error> {
        self.write(output, true)
    }

    /// General method for writing to stdout/stderr
    fn write(&self, output: &str, is_error: bool) -> Result<(), Error> {
        let result = if is_error {
            std::io::stderr().write_all(output.as_bytes())
        } else {
            std::io::stdout().write_all(output.as_bytes())
        };

        result.map_err(|e| {
            log::error!("Error while writing to std*: {e:?}");
            Error::new("Output error", Some("Could not write to the terminal"))
        })
    }

    pub(crate) fn is_structured(&self) -> bool {
        self.is_structured
    }
}
