//! Tool executors.
//!
//! * `read_tools` answers in-process and continues to the result processor
//! * `write_tools` validates a confirmed write and forwards it
//! * `continue_external` forwards a query
//!
//! Forwarded commands suspend the thread until the platform reports back.

use space_agent_models::{
    ChatMessage, ConversationState, NodeId, PendingTool, StateUpdate, SuspendReason,
};

use super::NodeOutput;
use crate::registry::ToolRegistry;

fn pending_call(state: &ConversationState) -> Option<PendingTool> {
    state.pending_tool.clone().or_else(|| {
        state
            .last_message()
            .and_then(ChatMessage::tool_call)
            .map(PendingTool::from)
    })
}

fn nothing_pending(state: &ConversationState, node: NodeId) -> NodeOutput {
    log::warn!("{node}: no pending tool call on thread {}", state.thread_id);
    NodeOutput::goto(StateUpdate::new().pending_tool(None), NodeId::Process)
}

/// Runs a read tool and hands its result to the result processor.
#[must_use]
pub fn read_tools(state: &ConversationState, registry: &ToolRegistry) -> NodeOutput {
    let Some(pending) = pending_call(state) else {
        return nothing_pending(state, NodeId::ReadTools);
    };

    let descriptor = registry.execute_read(&pending.operation);
    log::info!(
        "read_tools: executed {} ({}) success={}",
        pending.name(),
        pending.call_id,
        descriptor.success
    );

    let update = StateUpdate::new()
        .message(ChatMessage::tool(pending.call_id, descriptor.to_content()))
        .pending_tool(None)
        .external_result(Some(serde_json::to_value(descriptor.to_outcome()).unwrap_or_default()))
        .last_command(Some(descriptor));

    NodeOutput::goto(update, NodeId::Process)
}

/// Executes a confirmed write tool.
///
/// The approval is consumed whatever the outcome. A descriptor that failed
/// validation is processed locally; a valid one is forwarded and the thread
/// suspends at the result processor.
#[must_use]
pub fn write_tools(state: &ConversationState, registry: &ToolRegistry) -> NodeOutput {
    let Some(pending) = pending_call(state) else {
        return nothing_pending(state, NodeId::WriteTools);
    };

    let descriptor = registry.prepare_write(&pending.operation);
    let update = StateUpdate::new()
        .message(ChatMessage::tool(pending.call_id.clone(), descriptor.to_content()))
        .pending_tool(None)
        .confirmation(None)
        .has_answered(false);

    if !descriptor.success {
        log::warn!(
            "write_tools: {} rejected its arguments: {}",
            pending.name(),
            descriptor.message
        );
        let outcome = serde_json::to_value(descriptor.to_outcome()).unwrap_or_default();
        return NodeOutput::goto(
            update
                .external_result(Some(outcome))
                .last_command(Some(descriptor)),
            NodeId::Process,
        );
    }

    log::info!(
        "write_tools: forwarding {} ({}) to the platform",
        descriptor.func,
        pending.call_id
    );
    NodeOutput::suspend(
        update.external_result(None).last_command(Some(descriptor)),
        NodeId::Process,
        pending.call_id,
        SuspendReason::AwaitingExternalResult,
    )
}

/// Forwards a query tool and suspends until the platform answers.
#[must_use]
pub fn continue_external(state: &ConversationState, registry: &ToolRegistry) -> NodeOutput {
    let Some(pending) = pending_call(state) else {
        return nothing_pending(state, NodeId::ContinueExternal);
    };

    let descriptor = registry.prepare_query(&pending.operation);
    log::info!(
        "continue_external: forwarding {} ({}) to the platform",
        descriptor.func,
        pending.call_id
    );

    let update = StateUpdate::new()
        .message(ChatMessage::tool(pending.call_id.clone(), descriptor.to_content()))
        .pending_tool(None)
        .external_result(None)
        .last_command(Some(descriptor));

    NodeOutput::suspend(
        update,
        NodeId::Process,
        pending.call_id,
        SuspendReason::AwaitingExternalResult,
    )
}

#[cfg(test)]
mod tests {
    use space_agent_models::tool::{QueryScenarioArgs, ScenarioConfig};
    use space_agent_models::{Confirmation, ToolCall, ToolOperation};

    use super::*;
    use crate::nodes::Transition;

    fn state_with(operation: ToolOperation) -> ConversationState {
        let call = ToolCall {
            call_id: "c9".to_string(),
            operation,
        };
        let mut state = ConversationState::new("t");
        state.pending_tool = Some(PendingTool::from(&call));
        state.messages.push(ChatMessage::assistant_with_tool("", call));
        state.confirmation = Some(Confirmation {
            call_id: "c8".to_string(),
            action: "创建场景".to_string(),
            details: Vec::new(),
            requested_tool: None,
            answer: Some(true),
        });
        state
    }

    fn scenario(start: &str) -> ToolOperation {
        ToolOperation::CreateScenario(ScenarioConfig {
            name: "太空任务".to_string(),
            central_body: "Earth".to_string(),
            start_time: start.to_string(),
            end_time: "2025-01-02T00:00:00.000Z".to_string(),
            description: None,
        })
    }

    #[test]
    fn valid_write_is_forwarded_and_suspends() {
        let output = write_tools(&state_with(scenario("2025-01-01T00:00:00.000Z")), &ToolRegistry::default());

        assert_eq!(output.update.confirmation, Some(None));
        assert_eq!(output.update.pending_tool, Some(None));
        let command = output.update.last_command.clone().flatten().unwrap();
        assert_eq!(command.func, "create_scenario");
        assert!(command.success);
        assert_eq!(
            output.transition,
            Transition::Suspend {
                at: NodeId::Process,
                resume_token: "c9".to_string(),
                reason: SuspendReason::AwaitingExternalResult,
            }
        );
    }

    #[test]
    fn invalid_write_is_processed_locally() {
        let output = write_tools(&state_with(scenario("下周一")), &ToolRegistry::default());

        assert_eq!(output.transition, Transition::Goto(NodeId::Process));
        let result = output.update.external_result.flatten().unwrap();
        assert_eq!(result["success"], false);
        assert_eq!(output.update.confirmation, Some(None));
    }

    #[test]
    fn read_tool_never_leaves_the_process() {
        let output = read_tools(&state_with(ToolOperation::ListEntityTypes), &ToolRegistry::default());

        assert_eq!(output.transition, Transition::Goto(NodeId::Process));
        assert!(output.update.external_result.flatten().unwrap()["data"].is_array());
        assert_eq!(output.update.messages[0].role(), "tool");
    }

    #[test]
    fn query_forwards_and_suspends() {
        let output = continue_external(
            &state_with(ToolOperation::QueryScenario(QueryScenarioArgs {
                name: "太空任务".to_string(),
            })),
            &ToolRegistry::default(),
        );

        let command = output.update.last_command.clone().flatten().unwrap();
        assert_eq!(command.func, "query_scene");
        assert_eq!(command.message, "向平台发送查询场景指令");
        assert!(matches!(output.transition, Transition::Suspend { at: NodeId::Process, .. }));
    }
}
