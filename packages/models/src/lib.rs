#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the space agent conversation graph.
//!
//! The [`ConversationState`] is the single record threaded through every
//! graph node and persisted by the checkpoint stores. Tool calls emitted by
//! the LLM are parsed into the closed [`ToolOperation`] enumeration, so the
//! router and executors match on typed variants instead of sniffing tool
//! name strings. Tools never act on the 3D scene directly: they produce a
//! [`CommandDescriptor`] that the front-end platform executes and reports
//! back as a [`CommandOutcome`].

pub mod command;
pub mod datetime;
pub mod message;
pub mod reply;
pub mod state;
pub mod tool;

pub use command::{CommandDescriptor, CommandOutcome, OutcomeParseError};
pub use datetime::validate_datetime;
pub use message::ChatMessage;
pub use reply::Reply;
pub use state::{
    Confirmation, ConversationState, GraphStatus, NodeId, PendingTool, Route, StateUpdate,
    SuspendReason,
};
pub use tool::{ToolCall, ToolClass, ToolKind, ToolOperation, ToolParseError};
