//! Interactive mode for the server.
//!
//! Prompts for the bind address, port and checkpoint backend before
//! starting the server.

use std::path::Path;
use std::sync::Arc;

use dialoguer::{Confirm, Input, Select};
use space_agent_checkpoint::{
    CheckpointStore, DEFAULT_DB_PATH, MemoryCheckpointStore, SqliteCheckpointStore,
};

use crate::{ServerConfig, ServerError};

const BACKENDS: &[&str] = &["In-memory (lost on exit)", "SQLite file"];

/// Runs the server in interactive mode, prompting for configuration.
///
/// Defaults come from the environment, as in [`super::run_server`].
///
/// # Errors
///
/// Returns [`ServerError`] if a prompt fails, the store cannot be opened or
/// the server fails to start.
#[allow(clippy::future_not_send)]
pub async fn run() -> Result<(), ServerError> {
    println!("Space Agent Server");
    println!();

    let defaults = ServerConfig::from_env()?;

    let bind_addr: String = Input::new()
        .with_prompt("Bind address")
        .default(defaults.bind_addr.clone())
        .interact_text()
        .map_err(prompt_error)?;

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(defaults.port)
        .interact_text()
        .map_err(prompt_error)?;

    let backend = Select::new()
        .with_prompt("Checkpoint store")
        .items(BACKENDS)
        .default(0)
        .interact()
        .map_err(prompt_error)?;

    let store: Arc<dyn CheckpointStore> = if backend == 0 {
        Arc::new(MemoryCheckpointStore::new())
    } else {
        let path: String = Input::new()
            .with_prompt("Database path")
            .default(DEFAULT_DB_PATH.to_string())
            .interact_text()
            .map_err(prompt_error)?;
        Arc::new(SqliteCheckpointStore::open(Path::new(&path)).await?)
    };

    if !Confirm::new()
        .with_prompt(format!("Start server on {bind_addr}:{port}?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    let config = ServerConfig {
        bind_addr,
        port,
        ..defaults
    };
    super::serve(super::build_graph(store)?, config).await
}

fn prompt_error(e: dialoguer::Error) -> ServerError {
    ServerError::Config {
        message: format!("Prompt failed: {e}"),
    }
}
