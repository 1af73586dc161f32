use std::sync::OnceLock;

pub(crate) struct Config<'a> {
    /// Manifest looked up in the current dir when --manifest is not given
    pub(crate) manifest_file: &'a str,

    /// Environment variables overriding [deployment] in the manifest
    pub(crate) account_env: &'a str,
    pub(crate) region_env: &'a str,

    /// Suffix of synthesized template files, <Stack>.template.json
    pub(crate) template_suffix: &'a str,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

pub(crate) fn config() -> &'static Config<'static> {
    CONFIG.get_or_init(|| Config {
        manifest_file: option_env!("STACKGRAPH_MANIFEST_FILE").unwrap_or("stackgraph.toml"),
        account_env: "STACKGRAPH_ACCOUNT",
        region_env: "STACKGRAPH_REGION",
        template_suffix: ".template.json",
    })
}
