use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

mod agents;
mod config;
mod controllers;
mod mcp;
mod multi_agent;
mod tools;

use agents::{AgentCatalog, AgentRoster};
use config::Config;
use mcp::HttpMcpTransport;
use multi_agent::{KeywordDelegator, Orchestrator};
use tools::ToolRegistry;

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<AgentCatalog>,
    pub tool_registry: Arc<ToolRegistry>,
    pub roster: Arc<AgentRoster>,
    pub orchestrator: Arc<Orchestrator>,
    /// Cancelled on shutdown; each request runs under a child token
    pub shutdown: CancellationToken,
}

fn startup_error(what: &str, err: impl std::fmt::Display) -> io::Error {
    log::error!("{}: {}", what, err);
    io::Error::other(format!("{}: {}", what, err))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    let port = config.port;

    log::info!("Loading agent catalog");
    let catalog = Arc::new(
        AgentCatalog::builtin()
            .map_err(|e| startup_error("Failed to load agent catalog", e))?
            .with_disabled(&config.disabled_agents),
    );

    log::info!("Initializing tool registry");
    let tool_registry = Arc::new(ToolRegistry::new());
    let registered = tool_registry
        .bootstrap()
        .map_err(|e| startup_error("Failed to register built-in tools", e))?;
    log::info!("Registered {} tools", registered);

    log::info!("Building agents");
    let transport = Arc::new(HttpMcpTransport::new(config.mcp_timeout()));
    let roster = Arc::new(
        AgentRoster::build(&catalog, tool_registry.clone(), transport)
            .map_err(|e| startup_error("Failed to build agents", e))?,
    );
    // MCP discovery happens here so the first request doesn't pay for it
    roster.warm_up().await;
    log::info!("Registry holds {} tools after discovery", tool_registry.len());

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(KeywordDelegator::new(config.delegator_config())),
        roster.clone(),
        config.orchestrator_config(),
    ));

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Shutdown requested, cancelling in-flight requests");
            on_signal.cancel();
        }
    });
    let request_timeout = Duration::from_secs(config.request_timeout_secs);

    log::info!("Starting swarm backend on port {}", port);

    let state = web::Data::new(AppState {
        config,
        catalog,
        tool_registry,
        roster,
        orchestrator,
        shutdown,
    });

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::agents::config)
            .configure(controllers::chat::config)
    })
    .client_request_timeout(request_timeout)
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
