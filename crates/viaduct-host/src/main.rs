//! Viaduct host binary — hosts local database engines and bridges them to a
//! remote proxy on demand.
//!
//! Starts the axum control API with structured logging, builds the engine
//! registry and the connection bridge from configuration, and shuts down
//! gracefully on SIGTERM/SIGINT (closing any active bridge connection).

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use viaduct_bridge::{ConnectionBridge, EndpointResolver};
use viaduct_engine::{EngineRuntime, EngineSettings, InstanceRegistry};
use viaduct_host::{app, config, AppState};

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("VIADUCT_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the host cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    // Build the engine registry. A disabled engine section models an
    // environment without local hosting support: the registry degrades to
    // "unavailable" instead of crashing.
    let runtime = if config.engine.enabled {
        Some(EngineRuntime::new(
            &config.engine.data_dir,
            EngineSettings {
                busy_timeout_ms: config.engine.busy_timeout_ms,
                pool_max_size: config.engine.pool_max_size,
            },
        ))
    } else {
        tracing::warn!("local engine hosting is disabled; instances will be unavailable");
        None
    };
    let registry = Arc::new(InstanceRegistry::new(runtime));

    // Build the bridge
    let resolver = EndpointResolver::new(&config.proxy.domain, config.proxy.secure)
        .expect("invalid proxy.domain in config");
    let resolver = match &config.proxy.override_url {
        Some(url) => resolver
            .with_override(url)
            .expect("invalid proxy.override_url in config"),
        None => resolver,
    };
    let bridge = Arc::new(ConnectionBridge::new(registry.clone(), resolver));

    // Build application
    let app = app(AppState {
        registry,
        bridge: bridge.clone(),
    });
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, proxy_domain = %config.proxy.domain, "starting viaduct host");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    // Close any active bridge connection before exit.
    bridge.disconnect().await;

    tracing::info!("viaduct host shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
