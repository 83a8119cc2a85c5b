#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Interactive console for the space agent.
//!
//! Provides a single entry point that lets users chat with the agent in the
//! terminal (the console plays the scene platform), browse stored threads,
//! or start the server.

mod chat;

use std::sync::Arc;

use dialoguer::Select;
use space_agent_graph::{GraphConfig, SpaceGraph, ToolRegistry};

/// Top-level tool selection.
enum Tool {
    Chat,
    Threads,
    Server,
}

impl Tool {
    const ALL: &[Self] = &[Self::Chat, Self::Threads, Self::Server];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Chat => "Chat with the agent",
            Self::Threads => "Browse stored threads",
            Self::Server => "Start server",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();

    println!("Space Agent");
    println!();

    let labels: Vec<&str> = Tool::ALL.iter().map(Tool::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Tool::ALL[idx] {
        Tool::Chat => {
            let store = space_agent_checkpoint::open_store_from_env().await?;
            let provider = space_agent_ai::create_provider_from_env()?;
            let graph = SpaceGraph::new(
                Arc::from(provider),
                store,
                ToolRegistry::default(),
                GraphConfig::from_env()?,
            );
            chat::run(&graph).await?;
        }
        Tool::Threads => {
            let store = space_agent_checkpoint::open_store_from_env().await?;
            space_agent_checkpoint::interactive::run(store.as_ref()).await?;
        }
        Tool::Server => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(space_agent_server::interactive::run())
            })
            .await??;
        }
    }

    Ok(())
}
