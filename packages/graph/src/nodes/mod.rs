//! Graph nodes.
//!
//! Each node reads the current [`ConversationState`] and returns a
//! [`NodeOutput`]: a partial [`StateUpdate`] plus where execution goes next.
//! Nodes never write to the checkpoint store; the runner applies the update
//! and persists it.
//!
//! [`ConversationState`]: space_agent_models::ConversationState

pub mod agent;
pub mod confirm;
pub mod process;
pub mod router;
pub mod tools;

use space_agent_models::{NodeId, StateUpdate, SuspendReason};

/// Where execution continues after a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Run another node.
    Goto(NodeId),
    /// Stop and wait to be resumed before `at`.
    Suspend {
        /// Node that runs on resume.
        at: NodeId,
        /// Identifies the outstanding request.
        resume_token: String,
        /// What the thread waits for.
        reason: SuspendReason,
    },
    /// The turn is over.
    End,
}

/// Result of running one node.
#[derive(Debug, Clone)]
pub struct NodeOutput {
    /// Changes to merge into the state.
    pub update: StateUpdate,
    /// Next step.
    pub transition: Transition,
}

impl NodeOutput {
    /// Output continuing at `node`.
    #[must_use]
    pub const fn goto(update: StateUpdate, node: NodeId) -> Self {
        Self {
            update,
            transition: Transition::Goto(node),
        }
    }

    /// Output suspending the thread.
    #[must_use]
    pub fn suspend(
        update: StateUpdate,
        at: NodeId,
        resume_token: impl Into<String>,
        reason: SuspendReason,
    ) -> Self {
        Self {
            update,
            transition: Transition::Suspend {
                at,
                resume_token: resume_token.into(),
                reason,
            },
        }
    }
}
