//! route-dispatch demo server.
//!
//! Loads an optional TOML config, registers a handful of routes, and serves
//! them until Ctrl+C or SIGTERM.

use std::path::PathBuf;

use axum::http::{Method, StatusCode};
use clap::Parser;
use tokio::net::TcpListener;

use route_dispatch::config::{load_config, ServerConfig};
use route_dispatch::observability::{init_logging, metrics};
use route_dispatch::{handler, lifecycle, Context, Server, Shutdown};

#[derive(Parser)]
#[command(name = "route-dispatch")]
#[command(about = "Regex route dispatcher demo server", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Dump every request and response to the debug log.
    #[arg(short, long)]
    debug: bool,
}

fn register_routes(server: &mut Server) {
    server.get("/", |ctx: &mut Context<'_>| {
        ctx.write_str("route-dispatch is running\n");
    });

    server.get("/user/(?P<id>[0-9]+)", |ctx: &mut Context<'_>| {
        let body = format!("id={}", ctx.param("id").unwrap_or_default());
        ctx.write_str(&body);
    });

    server.route(
        Method::GET,
        "/hello/(?P<name>[^/]+)",
        [
            handler(|ctx| {
                if ctx.param("name") == Some("nobody") {
                    ctx.abort(StatusCode::FORBIDDEN, "Forbidden");
                }
            }),
            handler(|ctx| {
                let greeting = match ctx.query().get("greeting") {
                    Some(greeting) => greeting.to_string(),
                    None => "hello".to_string(),
                };
                let body = format!("{}, {}\n", greeting, ctx.param("name").unwrap_or_default());
                ctx.write_str(&body);
            }),
        ],
    );

    server.post("/echo", |ctx: &mut Context<'_>| {
        let body = ctx.body().clone();
        if let Some(content_type) = ctx.header("content-type").map(str::to_string) {
            ctx.set_content_type(&content_type);
        }
        ctx.write(&body);
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if cli.debug {
        config.dispatch.debug = true;
    }

    init_logging(&config.observability)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        debug = config.dispatch.debug,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut server = Server::from_config(&config);
    register_routes(&mut server);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        lifecycle::shutdown_signal().await;
        signal.trigger();
    });

    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
