#![forbid(unsafe_code)]

use std::net::SocketAddr;

use recipe_relay::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("recipe-relay: {err}");
            std::process::exit(2);
        }
    };

    let addr: SocketAddr = cfg
        .bind
        .parse()
        .unwrap_or_else(|_| panic!("invalid RECIPE_RELAY_BIND: {}", cfg.bind));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|err| panic!("failed to bind {addr}: {err}"));

    tracing::info!(
        bind = %addr,
        upstream = %cfg.upstream_url,
        "recipe-relay listening"
    );

    let app = match recipe_relay::app(cfg) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("recipe-relay: failed to build upstream client: {err}");
            std::process::exit(2);
        }
    };

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        eprintln!("recipe-relay server error: {err}");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
