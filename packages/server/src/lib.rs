#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web server for the space agent.
//!
//! Serves the REST endpoints under `{API_PREFIX}/{API_VERSION}/space` and a
//! WebSocket at `/ws/space` that streams assistant messages and platform
//! commands to the front end, and accepts the platform's results back.
//! Conversation state lives in the checkpoint store selected by
//! `CHECKPOINT_BACKEND`.

mod config;
mod handlers;
pub mod interactive;
pub mod ws;

pub use config::ServerConfig;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use space_agent_ai::AiError;
use space_agent_checkpoint::{CheckpointError, CheckpointStore};
use space_agent_graph::{GraphConfig, GraphError, SpaceGraph, ToolRegistry};
use thiserror::Error;

/// Shared application state.
pub struct AppState {
    /// The conversation graph shared by every request and socket.
    pub graph: Arc<SpaceGraph>,
}

/// Errors that prevent the server from starting.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid server setting.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },

    /// Binding or running the HTTP server failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The LLM provider could not be configured.
    #[error(transparent)]
    Ai(#[from] AiError),

    /// The checkpoint store could not be opened.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Invalid graph setting.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Registers every route.
pub fn configure(cfg: &mut web::ServiceConfig, config: &ServerConfig) {
    cfg.service(
        web::scope(&config.api_prefix)
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope(&config.space_scope())
                    .route("/invoke", web::post().to(handlers::invoke))
                    .route("/get_state/{thread_id}", web::get().to(handlers::get_state))
                    .route("/threads", web::get().to(handlers::list_threads))
                    .route("/threads/{thread_id}", web::delete().to(handlers::delete_thread)),
            ),
    )
    .route("/ws/space", web::get().to(ws::space_socket));
}

/// Builds the graph on top of `store` with the LLM provider and graph
/// settings from the environment.
///
/// # Errors
///
/// Returns [`ServerError`] if no LLM provider is configured or a graph
/// setting is invalid.
pub fn build_graph(store: Arc<dyn CheckpointStore>) -> Result<SpaceGraph, ServerError> {
    let provider = space_agent_ai::create_provider_from_env()?;
    Ok(SpaceGraph::new(
        Arc::from(provider),
        store,
        ToolRegistry::default(),
        GraphConfig::from_env()?,
    ))
}

/// Starts the server with every setting taken from the environment.
///
/// This is a regular async function; the caller provides the actix runtime
/// (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns [`ServerError`] if configuration fails or the HTTP server cannot
/// bind.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> Result<(), ServerError> {
    let config = ServerConfig::from_env()?;

    log::info!("Opening checkpoint store...");
    let store = space_agent_checkpoint::open_store_from_env().await?;

    serve(build_graph(store)?, config).await
}

/// Serves `graph` until the server is stopped.
///
/// # Errors
///
/// Returns [`ServerError::Io`] if the HTTP server fails to bind or run.
#[allow(clippy::future_not_send)]
pub async fn serve(graph: SpaceGraph, config: ServerConfig) -> Result<(), ServerError> {
    let state = web::Data::new(AppState {
        graph: Arc::new(graph),
    });

    log::info!(
        "Starting server on {}:{} (REST under {}{})",
        config.bind_addr,
        config.port,
        config.api_prefix,
        config.space_scope()
    );

    let bind = (config.bind_addr.clone(), config.port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(|cfg| configure(cfg, &config))
    })
    .bind(bind)?
    .run()
    .await?;

    Ok(())
}
