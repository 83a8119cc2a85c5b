//! Result processor: folds a command outcome into the conversation.

use space_agent_models::{ChatMessage, CommandOutcome, ConversationState, NodeId, StateUpdate};

use super::NodeOutput;

/// Turns `external_result` into an assistant message and completes the turn.
///
/// Without a result this is a pass-through to the agent.
#[must_use]
pub fn run(state: &ConversationState) -> NodeOutput {
    let Some(payload) = &state.external_result else {
        log::debug!("process: no result on thread {}", state.thread_id);
        return NodeOutput::goto(StateUpdate::new(), NodeId::Agent);
    };

    let kind = state.last_command.as_ref().map(|c| c.kind);
    let message = match CommandOutcome::parse(payload) {
        Ok(outcome) => {
            log::info!(
                "process: {} success={} on thread {}",
                outcome.tool_func.as_deref().unwrap_or("command"),
                outcome.success,
                state.thread_id
            );
            outcome.render(kind)
        }
        Err(e) => {
            log::warn!("process: unreadable result on thread {}: {e}", state.thread_id);
            format!("无法解析平台返回的执行结果：{e}")
        }
    };

    NodeOutput::goto(
        StateUpdate::new()
            .message(ChatMessage::assistant(message))
            .external_result(None)
            .completed(true),
        NodeId::Agent,
    )
}

#[cfg(test)]
mod tests {
    use space_agent_models::tool::QueryScenarioArgs;
    use space_agent_models::{CommandDescriptor, ToolOperation};

    use super::*;
    use crate::nodes::Transition;

    fn awaiting(operation: &ToolOperation, payload: serde_json::Value) -> ConversationState {
        let mut state = ConversationState::new("t");
        state.last_command = Some(CommandDescriptor::forward(operation, "sent"));
        state.external_result = Some(payload);
        state
    }

    #[test]
    fn write_outcome_uses_platform_message() {
        let state = awaiting(
            &ToolOperation::ClearScene,
            serde_json::json!({ "tool_func": "clear_scene", "result": { "success": true, "message": "场景已成功清除。" } }),
        );

        let output = run(&state);

        assert_eq!(output.update.messages, vec![ChatMessage::assistant("场景已成功清除。")]);
        assert_eq!(output.update.completed, Some(true));
        assert_eq!(output.update.external_result, Some(None));
        assert_eq!(output.transition, Transition::Goto(NodeId::Agent));
    }

    #[test]
    fn query_outcome_appends_data() {
        let op = ToolOperation::QueryScenario(QueryScenarioArgs {
            name: "太空任务".to_string(),
        });
        let state = awaiting(
            &op,
            serde_json::json!({ "success": true, "message": "查询成功", "data": [{ "name": "太空任务" }] }),
        );

        let output = run(&state);

        assert_eq!(
            output.update.messages[0].content(),
            "查询成功\n[{\"name\":\"太空任务\"}]"
        );
    }

    #[test]
    fn unreadable_outcome_reports_error_and_completes() {
        let state = awaiting(&ToolOperation::ClearScene, serde_json::json!(42));

        let output = run(&state);

        assert!(output.update.messages[0]
            .content()
            .starts_with("无法解析平台返回的执行结果："));
        assert_eq!(output.update.completed, Some(true));
    }

    #[test]
    fn missing_result_passes_through() {
        let output = run(&ConversationState::new("t"));
        assert!(output.update.messages.is_empty());
        assert_eq!(output.transition, Transition::Goto(NodeId::Agent));
    }
}
