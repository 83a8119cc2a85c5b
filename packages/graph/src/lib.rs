#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Conversation graph for the space scenario agent.
//!
//! A turn starts at the agent node, which asks the LLM for the next step.
//! The router then sends tool calls to one of the executors:
//!
//! - `confirm_user_action` and unapproved writes go to the confirmation node,
//!   which asks the human and suspends the thread
//! - queries and approved writes are turned into platform commands; the
//!   thread suspends until the platform reports a result
//! - read tools are answered in-process
//!
//! Results are folded into the conversation by the result processor and the
//! agent summarises them. The state is checkpointed after every node through
//! a [`CheckpointStore`](space_agent_checkpoint::CheckpointStore), so a
//! suspended thread can be resumed by a later request.

pub mod config;
pub mod locks;
pub mod nodes;
pub mod prompt;
pub mod registry;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use config::GraphConfig;
pub use registry::ToolRegistry;
pub use runner::{Snapshot, SpaceGraph, StateInfo};

use space_agent_checkpoint::CheckpointError;
use thiserror::Error;

/// Errors from running the graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Checkpoint storage failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// A thread was resumed before it was ever started.
    #[error("Unknown thread: {0}")]
    UnknownThread(String),

    /// Invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description.
        message: String,
    },
}
