//! Conversation state threaded through the graph and persisted per thread.

use serde::{Deserialize, Serialize};

use crate::command::CommandDescriptor;
use crate::message::ChatMessage;
use crate::tool::{ToolCall, ToolKind, ToolOperation};

/// Graph nodes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NodeId {
    /// Calls the LLM.
    Agent,
    /// Executes read tools in-process.
    ReadTools,
    /// Executes confirmed write tools.
    WriteTools,
    /// Asks the human to confirm.
    Confirm,
    /// Forwards query tools to the platform.
    ContinueExternal,
    /// Folds a tool result into the conversation.
    Process,
}

/// Router decision after the agent node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Route {
    /// Run the read executor.
    ReadTools,
    /// Run the write executor.
    WriteTools,
    /// Ask for confirmation.
    Confirm,
    /// Forward a query to the platform.
    ContinueExternal,
    /// Turn is over.
    End,
}

impl Route {
    /// The node a route leads to, or `None` for [`Route::End`].
    #[must_use]
    pub const fn target(self) -> Option<NodeId> {
        match self {
            Self::ReadTools => Some(NodeId::ReadTools),
            Self::WriteTools => Some(NodeId::WriteTools),
            Self::Confirm => Some(NodeId::Confirm),
            Self::ContinueExternal => Some(NodeId::ContinueExternal),
            Self::End => None,
        }
    }
}

/// Why a thread is suspended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SuspendReason {
    /// Waiting for the human to answer a confirmation question.
    AwaitingConfirmation,
    /// Waiting for the platform to report a command result.
    AwaitingExternalResult,
}

/// Execution status of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GraphStatus {
    /// No turn in progress.
    #[default]
    Idle,
    /// A turn is running; `next` is the node to execute.
    Running {
        /// Next node.
        next: NodeId,
    },
    /// Execution stopped before `at` until the thread is resumed.
    Suspended {
        /// Node that runs on resume.
        at: NodeId,
        /// Identifies the outstanding request (the tool call id).
        resume_token: String,
        /// What the thread is waiting for.
        reason: SuspendReason,
    },
}

impl GraphStatus {
    /// Whether the thread waits for a platform result.
    #[must_use]
    pub const fn is_awaiting_external(&self) -> bool {
        matches!(
            self,
            Self::Suspended {
                reason: SuspendReason::AwaitingExternalResult,
                ..
            }
        )
    }

    /// Whether the thread waits for a confirmation answer.
    #[must_use]
    pub const fn is_awaiting_confirmation(&self) -> bool {
        matches!(
            self,
            Self::Suspended {
                reason: SuspendReason::AwaitingConfirmation,
                ..
            }
        )
    }
}

/// A tool call waiting to be dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingTool {
    /// Call identifier.
    pub call_id: String,
    /// Requested operation.
    pub operation: ToolOperation,
}

impl PendingTool {
    /// Tool name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.operation.kind().into()
    }

    /// Tool arguments.
    #[must_use]
    pub fn arguments(&self) -> serde_json::Value {
        self.operation.arguments()
    }

    /// Tool kind.
    #[must_use]
    pub const fn kind(&self) -> ToolKind {
        self.operation.kind()
    }
}

impl From<&ToolCall> for PendingTool {
    fn from(call: &ToolCall) -> Self {
        Self {
            call_id: call.call_id.clone(),
            operation: call.operation.clone(),
        }
    }
}

/// An outstanding or answered confirmation question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// Tool call that raised the question.
    pub call_id: String,
    /// What is being confirmed.
    pub action: String,
    /// Parameters shown to the human.
    pub details: Vec<(String, String)>,
    /// The write tool the question is about. `None` for a free-form
    /// `confirm_user_action` question, which only covers writes whose
    /// arguments match `details`.
    pub requested_tool: Option<ToolKind>,
    /// The human's answer once given.
    pub answer: Option<bool>,
}

impl Confirmation {
    /// Whether this confirmation approves running `operation`.
    ///
    /// A question raised for a specific write approves exactly that tool
    /// with exactly the arguments shown. A free-form question approves a
    /// write only if no shown detail contradicts the write's arguments, at
    /// least one argument was shown, and the confirmed action names the
    /// write or the shown details cover all of its arguments. An
    /// argument-less write needs the confirmed action to be its own.
    #[must_use]
    pub fn approves(&self, operation: &ToolOperation) -> bool {
        if self.answer != Some(true) {
            return false;
        }

        let kind = operation.kind();
        let details = operation.confirmation_details();
        let own_action = operation.confirmation_action();

        if let Some(requested) = self.requested_tool {
            return requested == kind && same_details(&self.details, &details);
        }

        let action = self.action.trim();
        if details.is_empty() {
            return action == kind.action_label() || action == own_action;
        }

        let mut shown = 0;
        for (key, value) in &details {
            if let Some((_, confirmed)) = self
                .details
                .iter()
                .find(|(k, _)| detail_key(k) == detail_key(key))
            {
                if confirmed.trim() != value.trim() {
                    return false;
                }
                shown += 1;
            }
        }

        let named = action.contains(kind.action_label()) || action.contains(own_action.as_str());
        shown > 0 && (named || shown == details.len())
    }

    /// The question shown to the human.
    #[must_use]
    pub fn prompt(&self) -> String {
        use std::fmt::Write as _;

        let mut text = format!("请确认是否要{}：\n", self.action);
        for (key, value) in &self.details {
            let _ = writeln!(text, "- {key}: {value}");
        }
        text.push_str("请输入 '是' 或 '否'。");
        text
    }
}

/// Detail keys compare case-insensitively and ignore separators, so
/// `centralBody` matches `central_body`.
fn detail_key(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

fn same_details(confirmed: &[(String, String)], requested: &[(String, String)]) -> bool {
    confirmed.len() == requested.len()
        && requested
            .iter()
            .all(|(key, value)| confirmed.iter().any(|(k, v)| k == key && v == value))
}

/// Per-thread conversation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    /// Thread identifier.
    pub thread_id: String,
    /// Append-only history.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    /// Latest utterance not yet folded into `messages`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_input: Option<String>,
    /// Tool call emitted by the agent and not yet dispatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_tool: Option<PendingTool>,
    /// Platform result delivered but not yet processed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_result: Option<serde_json::Value>,
    /// The current turn's terminal response has been appended.
    #[serde(default)]
    pub completed: bool,
    /// The human answered the last confirmation question.
    #[serde(default)]
    pub has_answered: bool,
    /// Last confirmation question.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<Confirmation>,
    /// Last command forwarded to the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_command: Option<CommandDescriptor>,
    /// Execution status.
    #[serde(default)]
    pub status: GraphStatus,
}

impl ConversationState {
    /// Empty state for a new thread.
    #[must_use]
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            user_input: None,
            pending_tool: None,
            external_result: None,
            completed: false,
            has_answered: false,
            confirmation: None,
            last_command: None,
            status: GraphStatus::Idle,
        }
    }

    /// Merges a partial update: messages are appended, every other field
    /// present in the update replaces the current value.
    pub fn apply(&mut self, update: StateUpdate) {
        self.messages.extend(update.messages);
        if let Some(user_input) = update.user_input {
            self.user_input = user_input;
        }
        if let Some(pending_tool) = update.pending_tool {
            self.pending_tool = pending_tool;
        }
        if let Some(external_result) = update.external_result {
            self.external_result = external_result;
        }
        if let Some(completed) = update.completed {
            self.completed = completed;
        }
        if let Some(has_answered) = update.has_answered {
            self.has_answered = has_answered;
        }
        if let Some(confirmation) = update.confirmation {
            self.confirmation = confirmation;
        }
        if let Some(last_command) = update.last_command {
            self.last_command = last_command;
        }
        if let Some(status) = update.status {
            self.status = status;
        }
    }

    /// Most recent message.
    #[must_use]
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Names of the fields that currently hold a value.
    #[must_use]
    pub fn present_keys(&self) -> Vec<String> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, _)| k)
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Partial state update returned by a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// Appended to the history.
    pub messages: Vec<ChatMessage>,
    /// Replaces `user_input` when set.
    pub user_input: Option<Option<String>>,
    /// Replaces `pending_tool` when set.
    pub pending_tool: Option<Option<PendingTool>>,
    /// Replaces `external_result` when set.
    pub external_result: Option<Option<serde_json::Value>>,
    /// Replaces `completed` when set.
    pub completed: Option<bool>,
    /// Replaces `has_answered` when set.
    pub has_answered: Option<bool>,
    /// Replaces `confirmation` when set.
    pub confirmation: Option<Option<Confirmation>>,
    /// Replaces `last_command` when set.
    pub last_command: Option<Option<CommandDescriptor>>,
    /// Replaces `status` when set.
    pub status: Option<GraphStatus>,
}

impl StateUpdate {
    /// An update that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    #[must_use]
    pub fn user_input(mut self, user_input: Option<String>) -> Self {
        self.user_input = Some(user_input);
        self
    }

    #[must_use]
    pub fn pending_tool(mut self, pending_tool: Option<PendingTool>) -> Self {
        self.pending_tool = Some(pending_tool);
        self
    }

    #[must_use]
    pub fn external_result(mut self, external_result: Option<serde_json::Value>) -> Self {
        self.external_result = Some(external_result);
        self
    }

    #[must_use]
    pub const fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    #[must_use]
    pub const fn has_answered(mut self, has_answered: bool) -> Self {
        self.has_answered = Some(has_answered);
        self
    }

    #[must_use]
    pub fn confirmation(mut self, confirmation: Option<Confirmation>) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    #[must_use]
    pub fn last_command(mut self, last_command: Option<CommandDescriptor>) -> Self {
        self.last_command = Some(last_command);
        self
    }

    #[must_use]
    pub fn status(mut self, status: GraphStatus) -> Self {
        self.status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use crate::tool::{RenameArgs, ScenarioConfig};

    use super::*;

    #[test]
    fn apply_appends_messages_and_overwrites_scalars() {
        let mut state = ConversationState::new("t1");
        state.apply(
            StateUpdate::new()
                .message(ChatMessage::user("你好"))
                .completed(true),
        );
        state.apply(
            StateUpdate::new()
                .message(ChatMessage::assistant("您好"))
                .completed(false),
        );

        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.messages[0].content(), "你好");
        assert!(!state.completed);
    }

    #[test]
    fn unset_fields_are_left_alone() {
        let mut state = ConversationState::new("t1");
        state.user_input = Some("hi".to_string());
        state.has_answered = true;

        state.apply(StateUpdate::new().completed(true));

        assert_eq!(state.user_input.as_deref(), Some("hi"));
        assert!(state.has_answered);
    }

    #[test]
    fn explicit_none_clears_field() {
        let mut state = ConversationState::new("t1");
        state.external_result = Some(serde_json::json!({"success": true}));
        state.apply(StateUpdate::new().external_result(None));
        assert!(state.external_result.is_none());
    }

    #[test]
    fn confirmation_prompt_lists_details() {
        let confirmation = Confirmation {
            call_id: "c1".to_string(),
            action: "创建以下场景".to_string(),
            details: vec![("name".to_string(), "X".to_string())],
            requested_tool: None,
            answer: None,
        };
        assert_eq!(
            confirmation.prompt(),
            "请确认是否要创建以下场景：\n- name: X\n请输入 '是' 或 '否'。"
        );
    }

    fn scenario(name: &str) -> ToolOperation {
        ToolOperation::CreateScenario(ScenarioConfig {
            name: name.to_string(),
            central_body: "Earth".to_string(),
            start_time: "2025-01-01".to_string(),
            end_time: "2025-01-02".to_string(),
            description: None,
        })
    }

    fn approved(action: &str, details: &[(&str, &str)], requested_tool: Option<ToolKind>) -> Confirmation {
        Confirmation {
            call_id: "c1".to_string(),
            action: action.to_string(),
            details: details
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            requested_tool,
            answer: Some(true),
        }
    }

    #[test]
    fn confirmation_approval_is_scoped_to_requested_tool() {
        let mut confirmation = approved("清除当前场景", &[], Some(ToolKind::ClearScene));
        assert!(confirmation.approves(&ToolOperation::ClearScene));
        assert!(!confirmation.approves(&ToolOperation::ClearEntities));

        confirmation.answer = Some(false);
        assert!(!confirmation.approves(&ToolOperation::ClearScene));
    }

    #[test]
    fn requested_write_approval_binds_arguments() {
        let confirmation = approved(
            "重命名当前场景",
            &[("new_name", "新场景")],
            Some(ToolKind::RenameScenario),
        );

        assert!(confirmation.approves(&ToolOperation::RenameScenario(RenameArgs {
            new_name: "新场景".to_string(),
        })));
        assert!(!confirmation.approves(&ToolOperation::RenameScenario(RenameArgs {
            new_name: "别的名字".to_string(),
        })));
    }

    #[test]
    fn free_form_approval_covers_only_the_confirmed_request() {
        let confirmation = approved(
            "创建以下场景",
            &[("name", "太空任务"), ("centralBody", "Earth")],
            None,
        );

        assert!(confirmation.approves(&scenario("太空任务")));
        assert!(!confirmation.approves(&scenario("另一个任务")));
        assert!(!confirmation.approves(&ToolOperation::ClearScene));
        assert!(!confirmation.approves(&ToolOperation::RenameScenario(RenameArgs {
            new_name: "太空任务".to_string(),
        })));
    }

    #[test]
    fn free_form_approval_without_named_action_needs_every_argument() {
        let partial = approved("确认操作", &[("name", "太空任务")], None);
        assert!(!partial.approves(&scenario("太空任务")));

        let full = approved(
            "确认操作",
            &[
                ("name", "太空任务"),
                ("central_body", "Earth"),
                ("startTime", "2025-01-01"),
                ("end_time", "2025-01-02"),
            ],
            None,
        );
        assert!(full.approves(&scenario("太空任务")));

        let empty = approved("创建以下场景", &[], None);
        assert!(!empty.approves(&scenario("太空任务")));
    }

    #[test]
    fn argument_less_write_must_be_named_in_action() {
        assert!(approved("清除场景", &[], None).approves(&ToolOperation::ClearScene));
        assert!(!approved("清除场景", &[], None).approves(&ToolOperation::ClearEntities));
        assert!(
            !approved("清除当前场景中的所有实体", &[], None).approves(&ToolOperation::ClearScene)
        );
        assert!(
            approved("清除当前场景中的所有实体", &[], None).approves(&ToolOperation::ClearEntities)
        );
    }

    #[test]
    fn status_round_trips_through_json() {
        let status = GraphStatus::Suspended {
            at: NodeId::Process,
            resume_token: "call_1".to_string(),
            reason: SuspendReason::AwaitingExternalResult,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "suspended");
        assert_eq!(json["at"], "process");
        let back: GraphStatus = serde_json::from_value(json).unwrap();
        assert!(back.is_awaiting_external());
    }

    #[test]
    fn present_keys_skip_empty_options() {
        let state = ConversationState::new("t1");
        let keys = state.present_keys();
        assert!(keys.contains(&"messages".to_string()));
        assert!(!keys.contains(&"pending_tool".to_string()));
    }
}
