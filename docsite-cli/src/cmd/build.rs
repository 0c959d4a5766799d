use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use docsite_core::build_site;
use std::path::Path;

use crate::config::load_build_config;

pub fn add_build_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("source")
                .value_name("DIR")
                .help("Source directory containing markdown files")
                .default_value("./docs"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .help("Output directory for generated site")
                .default_value("./out"),
        )
        .arg(
            Arg::new("theme")
                .short('t')
                .long("theme")
                .value_name("DIR")
                .help("Theme directory")
                .default_value("./theme"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .default_value("./docsite.toml"),
        )
}

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("build")).about("Build the static site and its deployment files")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = load_build_config(args)?;
    let build_config = config.build_config();

    let source_dir = Path::new(&build_config.source);
    let output_dir = Path::new(&build_config.output);
    let theme_dir = Path::new(&build_config.theme);

    let report = build_site(config.site_config(), source_dir, output_dir, theme_dir)
        .with_context(|| format!("Failed to build {}", source_dir.display()))?;

    for link in &report.unresolved_links {
        tracing::warn!("{link}");
    }
    tracing::info!(
        pages = report.pages.len(),
        categories = report.category_count(),
        unresolved_links = report.unresolved_links.len(),
        "Site built successfully in {}",
        report.output_dir.display()
    );

    Ok(())
}
