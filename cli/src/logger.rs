use std::sync::OnceLock;

/// Set up log levels, formatting, and other configurations for the logger
pub struct Logger;

static LOGGER: OnceLock<Logger> = OnceLock::new();

impl Logger {
    pub fn init() -> &'static Self {
        LOGGER.get_or_init(|| {
            // No logs shown by default, only human-friendly messages
            // Enable logs output with "export RUST_LOG=warn" in terminal
            let logger = env_logger::Builder::from_env(
                env_logger::Env::default().default_filter_or("off"),
            )
            .format_timestamp(None)
            .build();

            let level = logger.filter();

            // Fails only when a logger is already set, e.g. by a test harness
            if log::set_boxed_logger(Box::new(logger)).is_ok() {
                log::set_max_level(level);
            }

            Self
        })
    }
}
