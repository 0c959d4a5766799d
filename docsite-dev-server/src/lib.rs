use anyhow::Result;
use axum::{
    Router,
    extract::{
        Request, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderName, HeaderValue},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use docsite_core::deploy::HeaderRule;
use notify::Watcher;
use notify_debouncer_mini::{DebounceEventResult, new_debouncer};
use std::{
    net::SocketAddr,
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::broadcast;
use tower_http::services::ServeDir;

/// Websocket endpoint rendered pages connect to for reload signals.
pub const LIVERELOAD_PATH: &str = "/__livereload";

const RELOAD_MESSAGE: &str = "reload";

/// Configuration for the live preview server
#[derive(Debug, Clone)]
pub struct LiveServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to serve on
    pub port: u16,
    /// Built site to serve and watch
    pub root: PathBuf,
    /// Auto-open browser
    pub open: bool,
    /// Path fragments to ignore when watching
    pub ignore: Vec<String>,
    /// Response header rules from the deployment descriptor
    pub headers: Vec<HeaderRule>,
}

impl Default for LiveServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            root: PathBuf::from("./out"),
            open: false,
            ignore: vec![],
            headers: vec![],
        }
    }
}

impl LiveServerConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        Ok(format!("{}:{}", self.host, self.port).parse()?)
    }
}

/// Static file server for a built site, with live reload and the site's
/// header rules applied the way the host would.
pub struct LiveServer {
    config: LiveServerConfig,
}

impl LiveServer {
    pub fn new(config: LiveServerConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        if !self.config.root.exists() {
            return Err(anyhow::anyhow!(
                "Root directory does not exist: {}",
                self.config.root.display()
            ));
        }

        let (reload_tx, _) = broadcast::channel::<String>(100);

        let watcher_reload_tx = reload_tx.clone();
        let watch_path = self.config.root.clone();
        let ignore_patterns = self.config.ignore.clone();
        tokio::spawn(async move {
            if let Err(e) = watch_output(watch_path, watcher_reload_tx, ignore_patterns).await {
                tracing::error!(error = %e, "Output watcher failed");
            }
        });

        let app = router(&self.config, reload_tx);
        let addr = self.config.addr()?;

        tracing::info!("Serving at http://{addr}");
        tracing::info!("Live reload enabled at ws://{addr}{LIVERELOAD_PATH}");

        if self.config.open {
            if let Err(e) = open::that(format!("http://{addr}")) {
                tracing::warn!(error = %e, "Failed to open browser");
            }
        }

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

#[derive(Clone)]
struct AppState {
    reload_tx: broadcast::Sender<String>,
}

fn router(config: &LiveServerConfig, reload_tx: broadcast::Sender<String>) -> Router {
    let rules = Arc::new(config.headers.clone());

    Router::new()
        .route(LIVERELOAD_PATH, get(websocket_handler))
        .fallback_service(ServeDir::new(&config.root))
        .layer(middleware::from_fn_with_state(rules, apply_header_rules))
        .with_state(AppState { reload_tx })
}

async fn apply_header_rules(
    State(rules): State<Arc<Vec<HeaderRule>>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    for rule in rules.iter().filter(|rule| rule.matches(&path)) {
        for (name, value) in &rule.values {
            match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Skipping header that isn't valid HTTP"),
            }
        }
    }

    response
}

async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| websocket_connection(socket, state.reload_tx))
}

async fn websocket_connection(mut socket: WebSocket, reload_tx: broadcast::Sender<String>) {
    let mut rx = reload_tx.subscribe();

    if socket
        .send(Message::Text("connected".to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            msg = next_signal(&mut rx) => {
                let Some(reload_msg) = msg else {
                    break;
                };
                if socket.send(Message::Text(reload_msg.into())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                if msg.is_none() {
                    break;
                }
            }
        }
    }
}

/// Next reload signal, or `None` once the server side is gone. A client that
/// fell behind skips ahead instead of disconnecting.
async fn next_signal(rx: &mut broadcast::Receiver<String>) -> Option<String> {
    loop {
        match rx.recv().await {
            Ok(msg) => return Some(msg),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Live reload client lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

async fn watch_output(
    watch_path: PathBuf,
    reload_tx: broadcast::Sender<String>,
    ignore_patterns: Vec<String>,
) -> Result<()> {
    let (tx, mut rx) = tokio::sync::mpsc::channel(100);

    let mut debouncer = new_debouncer(Duration::from_millis(500), move |res: DebounceEventResult| {
        if let Ok(events) = res {
            for event in events {
                if !is_ignored(&event.path, &ignore_patterns) {
                    let _ = tx.blocking_send(event.path);
                }
            }
        }
    })?;

    debouncer
        .watcher()
        .watch(&watch_path, notify::RecursiveMode::Recursive)?;
    tracing::info!(path = %watch_path.display(), "Watching output for changes");

    // A rebuild touches many files at once; collapse them into one reload
    let mut last_reload: Option<Instant> = None;
    while let Some(path) = rx.recv().await {
        tracing::debug!(path = %path.display(), "Output changed");

        let now = Instant::now();
        if last_reload.is_none_or(|t| now.duration_since(t) > Duration::from_millis(1000)) {
            let _ = reload_tx.send(RELOAD_MESSAGE.to_string());
            last_reload = Some(now);
            tracing::info!("Sent reload signal");
        }
    }

    Ok(())
}

fn is_ignored(path: &std::path::Path, patterns: &[String]) -> bool {
    let path = path.to_string_lossy();
    patterns.iter().any(|pattern| path.contains(pattern.as_str()))
}
