use anyhow::Result;
use clap::ArgMatches;
use clap::parser::ValueSource;
use config::{Config as ConfigBuilder, Environment, File, FileFormat, Value};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "./docsite.toml";

/// Complete configuration that merges CLI args, env vars, config files, and defaults
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DocsiteConfig {
    /// Build configuration
    pub build: BuildConfig,
    /// Site configuration (from docsite-core)
    #[serde(flatten)]
    pub site: docsite_core::config::Config,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Source directory containing markdown files
    pub source: String,
    /// Output directory for generated site
    pub output: String,
    /// Theme directory
    pub theme: String,
    /// Configuration file path
    pub config: String,
    /// Host for the preview server
    pub host: String,
    /// Port for the preview server
    pub port: u16,
    /// Open browser automatically
    pub open: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            source: "./docs".to_string(),
            output: "./out".to_string(),
            theme: "./theme".to_string(),
            config: DEFAULT_CONFIG_FILE.to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
            open: false,
        }
    }
}

impl DocsiteConfig {
    /// Load configuration with cascading precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables (DOCSITE_*)
    /// 3. Configuration file
    /// 4. Defaults (lowest priority)
    pub fn load(args: &ArgMatches) -> Result<Self> {
        let config_file = args
            .try_get_one::<String>("config")
            .ok()
            .flatten()
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());

        let mut builder = ConfigBuilder::builder();

        // 1. Start with defaults
        builder = builder.add_source(ConfigBuilder::try_from(&Self::default())?);

        // 2. Add configuration file if it exists
        if Path::new(&config_file).exists() {
            tracing::debug!(file = %config_file, "Reading configuration file");
            builder = builder.add_source(File::new(&config_file, FileFormat::Toml));
        }

        // 3. Add environment variables with DOCSITE_ prefix
        builder = builder.add_source(
            Environment::with_prefix("DOCSITE")
                .prefix_separator("_")
                .separator("__"), // Use double underscore for nested keys
        );

        // 4. Override with CLI arguments (highest priority)
        for (key, value) in cli_overrides(args) {
            builder = builder.set_override(key, value)?;
        }

        let config: DocsiteConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Site configuration handed to docsite-core
    pub fn site_config(&self) -> &docsite_core::config::Config {
        &self.site
    }

    pub fn build_config(&self) -> &BuildConfig {
        &self.build
    }
}

/// Only flags the user actually passed override lower layers; clap defaults
/// would otherwise mask the config file.
fn cli_overrides(args: &ArgMatches) -> Vec<(String, Value)> {
    let mut overrides = Vec::new();

    for key in ["source", "output", "theme", "config", "host"] {
        if let Some(value) = explicit::<String>(args, key) {
            overrides.push((format!("build.{key}"), Value::from(value.as_str())));
        }
    }
    if let Some(port) = explicit::<String>(args, "port") {
        match port.parse::<u16>() {
            Ok(port) => overrides.push(("build.port".to_string(), Value::from(i64::from(port)))),
            Err(_) => tracing::warn!(port = %port, "Ignoring invalid port"),
        }
    }
    if explicit::<bool>(args, "open").is_some_and(|open| *open) {
        overrides.push(("build.open".to_string(), Value::from(true)));
    }

    overrides
}

fn explicit<'a, T: Clone + Send + Sync + 'static>(args: &'a ArgMatches, id: &str) -> Option<&'a T> {
    // Subcommands don't all define every flag
    if !args.try_contains_id(id).unwrap_or(false) {
        return None;
    }
    let from_cli = matches!(
        args.value_source(id),
        Some(ValueSource::CommandLine | ValueSource::EnvVariable)
    );
    if !from_cli {
        return None;
    }
    args.try_get_one::<T>(id).ok().flatten()
}

/// Load configuration specifically for build commands
pub fn load_build_config(args: &ArgMatches) -> Result<DocsiteConfig> {
    DocsiteConfig::load(args)
}

/// Load configuration specifically for serve commands
pub fn load_serve_config(args: &ArgMatches) -> Result<DocsiteConfig> {
    DocsiteConfig::load(args)
}
