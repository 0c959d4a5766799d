use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use docsite_core::build_site;
use docsite_dev_server::{LiveServer, LiveServerConfig};
use notify::Watcher;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use crate::cmd::build::add_build_args;
use crate::config::{BuildConfig, DocsiteConfig, load_serve_config};

pub fn make_subcommand() -> Command {
    add_build_args(Command::new("serve"))
        .about("Preview the site locally with live reload")
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to serve on")
                .default_value("3000"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Host to bind to")
                .default_value("127.0.0.1"),
        )
        .arg(
            Arg::new("open")
                .long("open")
                .help("Open browser automatically")
                .action(ArgAction::SetTrue),
        )
}

pub async fn execute(args: &ArgMatches) -> Result<()> {
    let config = load_serve_config(args)?;
    let build_config = config.build_config().clone();
    let config = preview_config(config, &build_config);

    rebuild(&config)?;

    let server_config = LiveServerConfig {
        host: build_config.host.clone(),
        port: build_config.port,
        root: PathBuf::from(&build_config.output),
        open: build_config.open,
        ignore: vec![".git".to_string(), ".tmp".to_string()],
        headers: config.site.deploy.headers.clone(),
    };

    let server = LiveServer::new(server_config);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "Preview server stopped");
        }
    });

    let args = args.clone();
    let watcher_handle = tokio::spawn(async move {
        if let Err(e) = watch_source_files(config, args).await {
            tracing::error!(error = %e, "Source watcher stopped");
        }
    });

    let _ = tokio::try_join!(server_handle, watcher_handle)?;

    Ok(())
}

/// Pin the paths and address of the running session and turn on live reload.
/// A changed config file can alter the site, not where the server listens or
/// which directory it serves.
fn preview_config(mut config: DocsiteConfig, running: &BuildConfig) -> DocsiteConfig {
    config.build.output = running.output.clone();
    config.build.host = running.host.clone();
    config.build.port = running.port;
    config.site.dev(running.host.clone(), running.port);
    config
}

/// Re-read the config file after it changed, keeping the running session's
/// address and output directory.
fn reload_config(args: &ArgMatches, running: &BuildConfig) -> Result<DocsiteConfig> {
    let config = load_serve_config(args)?;
    Ok(preview_config(config, running))
}

fn rebuild(config: &DocsiteConfig) -> Result<()> {
    let build = config.build_config();
    let report = build_site(
        config.site_config(),
        Path::new(&build.source),
        Path::new(&build.output),
        Path::new(&build.theme),
    )?;
    tracing::info!(
        pages = report.pages.len(),
        unresolved_links = report.unresolved_links.len(),
        "Site rebuilt"
    );
    Ok(())
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

fn is_config_change(path: &Path, config_file: &Path) -> bool {
    canonical(path) == canonical(config_file)
}

/// Whether a changed path should trigger a rebuild.
fn is_source_change(path: &Path, watched_dirs: &[PathBuf], config_file: &Path) -> bool {
    let changed = canonical(path);
    watched_dirs.iter().any(|dir| changed.starts_with(canonical(dir))) || is_config_change(path, config_file)
}

async fn watch_source_files(mut config: DocsiteConfig, args: ArgMatches) -> Result<()> {
    let running = config.build_config().clone();
    let source_dir = PathBuf::from(&running.source);
    let theme_dir = PathBuf::from(&running.theme);
    let config_file = PathBuf::from(&running.config);

    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut debouncer = new_debouncer(Duration::from_millis(500), move |res: DebounceEventResult| {
        if let Ok(events) = res {
            for event in events {
                let _ = tx.blocking_send(event.path);
            }
        }
    })?;

    debouncer
        .watcher()
        .watch(&source_dir, notify::RecursiveMode::Recursive)?;
    tracing::info!(path = %source_dir.display(), "Watching source directory");

    if theme_dir.exists() {
        debouncer
            .watcher()
            .watch(&theme_dir, notify::RecursiveMode::Recursive)?;
        tracing::info!(path = %theme_dir.display(), "Watching theme directory");
    }

    if config_file.exists() {
        debouncer
            .watcher()
            .watch(&config_file, notify::RecursiveMode::NonRecursive)?;
        tracing::info!(path = %config_file.display(), "Watching config file");
    }

    let watched_dirs = [source_dir, theme_dir];
    while let Some(path) = rx.recv().await {
        if !is_source_change(&path, &watched_dirs, &config_file) {
            tracing::debug!(path = %path.display(), "Skipping non-source change");
            continue;
        }
        tracing::info!(path = %path.display(), "Source changed, rebuilding");

        if is_config_change(&path, &config_file) {
            match reload_config(&args, &running) {
                Ok(fresh) => {
                    tracing::info!(file = %config_file.display(), "Reloaded configuration");
                    config = fresh;
                }
                Err(e) => tracing::error!("Keeping previous configuration: {e:#}"),
            }
        }

        // A broken page shouldn't stop the preview; report and keep watching
        if let Err(e) = rebuild(&config) {
            tracing::error!("Build error: {e:#}");
        }
    }

    Ok(())
}
