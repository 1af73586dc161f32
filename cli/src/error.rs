/// Error shown to the user: what failed and, optionally, what to do about it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    message: String,
    hint: Option<String>,
}

impl Error {
    pub fn new(message: &str, hint: Option<&str>) -> Self {
        Self {
            message: message.to_string(),
            hint: hint.map(str::to_string),
        }
    }

    /// Print the error and stop the process, only main calls this
    pub fn exit(&self) -> ! {
        eprintln!("\n{}\n{self}", console::style("Error").red().bold());
        std::process::exit(1)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(hint) = &self.hint {
            write!(f, "\n\n{}", console::style(hint).dim())?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {}

/// Keep an Error wrapped into a report as is, otherwise the report's
/// outermost message with its causes as the hint
impl From<eyre::ErrReport> for Error {
    fn from(report: eyre::ErrReport) -> Self {
        match report.downcast::<Error>() {
            Ok(error) => error,
            Err(report) => {
                let causes: Vec<String> = report.chain().skip(1).map(|c| c.to_string()).collect();
                let hint = (!causes.is_empty()).then(|| causes.join("\n"));

                Self {
                    message: report.to_string(),
                    hint,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::{eyre, WrapErr};

    #[test]
    fn report_becomes_message_and_causes() {
        let report = Err::<(), _>(eyre!("no such file"))
            .wrap_err("Failed to read stackgraph.toml")
            .unwrap_err();

        let error = Error::from(report);

        assert_eq!(
            error,
            Error::new("Failed to read stackgraph.toml", Some("no such file"))
        );
    }

    #[test]
    fn wrapped_error_is_kept() {
        let error = Error::from(eyre::Report::new(Error::new(
            "Manifest not loaded",
            Some("Pass --manifest"),
        )));

        assert_eq!(error, Error::new("Manifest not loaded", Some("Pass --manifest")));
    }

    #[test]
    fn message_without_hint() {
        console::set_colors_enabled(false);

        assert_eq!(Error::new("Output error", None).to_string(), "Output error");
        assert_eq!(
            Error::new("Output error", Some("Could not write to the terminal")).to_string(),
            "Output error\n\nCould not write to the terminal"
        );
    }
}
