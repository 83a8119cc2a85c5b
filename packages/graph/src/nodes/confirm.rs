//! Confirmation node: turns a tool call into a yes/no question and suspends.

use space_agent_models::{
    ChatMessage, Confirmation, ConversationState, NodeId, PendingTool, StateUpdate, SuspendReason,
    ToolClass, ToolOperation,
};

use super::NodeOutput;

/// Asks the human to confirm the pending tool call.
///
/// `confirm_user_action` carries its own action and details; its approval
/// covers a later write only as far as those details match it. A write tool
/// that reached this node without approval is confirmed for that exact call.
#[must_use]
pub fn run(state: &ConversationState) -> NodeOutput {
    let pending = state.pending_tool.clone().or_else(|| {
        state
            .last_message()
            .and_then(ChatMessage::tool_call)
            .map(PendingTool::from)
    });

    let Some(pending) = pending else {
        log::warn!("confirm: nothing to confirm on thread {}", state.thread_id);
        return NodeOutput {
            update: StateUpdate::new().completed(true),
            transition: super::Transition::End,
        };
    };

    let confirmation = build_confirmation(&pending);
    let question = confirmation.prompt();
    log::info!(
        "confirm: asking to {} (call {})",
        confirmation.action,
        pending.call_id
    );

    let update = StateUpdate::new()
        .message(ChatMessage::tool(pending.call_id.clone(), question.clone()))
        .message(ChatMessage::assistant(question))
        .pending_tool(None)
        .confirmation(Some(confirmation))
        .has_answered(false)
        .completed(true);

    NodeOutput::suspend(
        update,
        NodeId::Agent,
        pending.call_id,
        SuspendReason::AwaitingConfirmation,
    )
}

fn build_confirmation(pending: &PendingTool) -> Confirmation {
    let requested_tool = match &pending.operation {
        ToolOperation::ConfirmUserAction(_) => None,
        other if other.kind().class() == ToolClass::Write => Some(other.kind()),
        _ => None,
    };

    Confirmation {
        call_id: pending.call_id.clone(),
        action: pending.operation.confirmation_action(),
        details: pending.operation.confirmation_details(),
        requested_tool,
        answer: None,
    }
}

#[cfg(test)]
mod tests {
    use space_agent_models::tool::{ConfirmArgs, RenameArgs};
    use space_agent_models::{ToolCall, ToolKind};

    use super::*;
    use crate::nodes::Transition;

    fn state_with(operation: ToolOperation) -> ConversationState {
        let call = ToolCall {
            call_id: "c1".to_string(),
            operation,
        };
        let mut state = ConversationState::new("t");
        state.pending_tool = Some(PendingTool::from(&call));
        state.messages.push(ChatMessage::assistant_with_tool("", call));
        state
    }

    #[test]
    fn confirm_user_action_builds_question_and_suspends() {
        let mut details = serde_json::Map::new();
        details.insert("name".to_string(), serde_json::json!("太空任务"));
        details.insert("centralBody".to_string(), serde_json::json!("Earth"));
        let state = state_with(ToolOperation::ConfirmUserAction(ConfirmArgs {
            action_description: "创建场景".to_string(),
            details,
        }));

        let output = run(&state);

        let question = output.update.messages[1].content().to_string();
        assert!(question.starts_with("请确认是否要创建场景：\n"));
        assert!(question.contains("- name: 太空任务"));
        assert!(question.ends_with("请输入 '是' 或 '否'。"));
        assert_eq!(output.update.messages[0].role(), "tool");
        assert_eq!(output.update.completed, Some(true));

        let confirmation = output.update.confirmation.flatten().unwrap();
        assert_eq!(confirmation.requested_tool, None);
        assert_eq!(confirmation.answer, None);

        assert_eq!(
            output.transition,
            Transition::Suspend {
                at: NodeId::Agent,
                resume_token: "c1".to_string(),
                reason: SuspendReason::AwaitingConfirmation,
            }
        );
    }

    #[test]
    fn unapproved_write_is_confirmed_for_that_tool() {
        let state = state_with(ToolOperation::RenameScenario(RenameArgs {
            new_name: "新场景".to_string(),
        }));

        let output = run(&state);
        let confirmation = output.update.confirmation.flatten().unwrap();

        assert_eq!(confirmation.requested_tool, Some(ToolKind::RenameScenario));
        assert_eq!(confirmation.action, "重命名当前场景");
        assert_eq!(confirmation.details, vec![("new_name".to_string(), "新场景".to_string())]);
        assert_eq!(output.update.pending_tool, Some(None));
    }

    #[test]
    fn nothing_pending_ends_the_turn() {
        let output = run(&ConversationState::new("t"));
        assert_eq!(output.transition, Transition::End);
    }
}
