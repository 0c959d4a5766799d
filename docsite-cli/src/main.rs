mod cmd;
mod config;

use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,docsite_core=info,docsite_dev_server=info,docsite=info";

fn cli() -> Command {
    Command::new("docsite")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Build and preview a documentation site from front-matter Markdown")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log every document and file change")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(cmd::build::make_subcommand())
        .subcommand(cmd::serve::make_subcommand())
}

fn init_tracing(verbose: bool) {
    // --verbose wins, then RUST_LOG, then the default filter
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    match matches.subcommand() {
        Some(("build", args)) => cmd::build::execute(args),
        Some(("serve", args)) => cmd::serve::execute(args).await,
        _ => unreachable!("clap requires a subcommand"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        cli().debug_assert();
    }

    #[test]
    fn test_verbose_is_global() {
        let matches = cli().try_get_matches_from(["docsite", "build", "--verbose"]).unwrap();
        assert!(matches.get_flag("verbose"));
    }
}
