//! Graph runner: executes nodes, checkpoints after each one and yields a
//! snapshot per node.

use std::sync::Arc;

use futures::{Stream, StreamExt as _};
use space_agent_ai::LlmProvider;
use space_agent_checkpoint::{CheckpointStore, CheckpointSummary};
use space_agent_models::{
    ChatMessage, CommandDescriptor, ConversationState, GraphStatus, NodeId, Reply, StateUpdate,
    SuspendReason,
};

use crate::config::GraphConfig;
use crate::locks::ThreadLocks;
use crate::nodes::{Transition, agent, confirm, process, router, tools};
use crate::prompt::build_system_prompt;
use crate::registry::ToolRegistry;
use crate::GraphError;

/// Appended when a new message arrives while a platform result is still
/// outstanding.
pub const ABANDONED_COMMAND_NOTE: &str = "（上一条平台指令未返回结果，已取消等待。）";

/// Appended when a turn exceeds the node budget.
pub const STEP_BUDGET_APOLOGY: &str = "抱歉，本次请求的处理步骤过多，已停止执行，请重新描述您的需求。";

/// Tool response recorded for a call the step budget stopped before it ran.
pub const CANCELLED_TOOL_NOTE: &str = "（处理步骤过多，该工具调用已取消。）";

/// State after one node ran.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The node that produced this snapshot, `None` for a no-op resume.
    pub node: Option<NodeId>,
    /// Checkpointed state.
    pub state: ConversationState,
    /// Command the platform must execute before the thread can resume.
    pub forwarded: Option<CommandDescriptor>,
}

/// What is known about a thread without running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateInfo {
    pub thread_id: String,
    pub exists: bool,
    /// State fields holding a value.
    pub keys: Vec<String>,
}

/// The conversation graph.
pub struct SpaceGraph {
    provider: Arc<dyn LlmProvider>,
    store: Arc<dyn CheckpointStore>,
    registry: ToolRegistry,
    config: GraphConfig,
    locks: ThreadLocks,
}

impl std::fmt::Debug for SpaceGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceGraph")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SpaceGraph {
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        store: Arc<dyn CheckpointStore>,
        registry: ToolRegistry,
        config: GraphConfig,
    ) -> Self {
        Self {
            provider,
            store,
            registry,
            config,
            locks: ThreadLocks::new(),
        }
    }

    /// Runs one turn of `thread_id`, yielding a snapshot after every node.
    ///
    /// With `input` a new turn starts at the agent node. Without input the
    /// thread resumes where it stopped: a running turn continues, a thread
    /// suspended for a platform result continues once the result is present,
    /// and anything else yields a single unchanged snapshot.
    ///
    /// Turns of the same thread never interleave.
    ///
    /// # Errors
    ///
    /// The stream yields [`GraphError::UnknownThread`] when resuming a thread
    /// that was never started and [`GraphError::Checkpoint`] when the store
    /// fails; both end the stream.
    pub fn stream(
        &self,
        thread_id: impl Into<String>,
        input: Option<String>,
    ) -> impl Stream<Item = Result<Snapshot, GraphError>> + Send + '_ {
        let thread_id = thread_id.into();

        async_stream::stream! {
            let _guard = self.locks.acquire(&thread_id).await;

            let loaded = match self.store.load(&thread_id).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    yield Err(GraphError::from(e));
                    return;
                }
            };

            let mut state = match (loaded, &input) {
                (Some(state), _) => state,
                (None, Some(_)) => {
                    log::info!("Starting new thread {thread_id}");
                    ConversationState::new(thread_id.clone())
                }
                (None, None) => {
                    yield Err(GraphError::UnknownThread(thread_id.clone()));
                    return;
                }
            };

            let start = match input {
                Some(text) => {
                    let update = begin_turn(&state, text);
                    state.apply(update);
                    Some(NodeId::Agent)
                }
                None => resume_point(&state),
            };

            let Some(mut node) = start else {
                log::debug!("Nothing to resume on thread {thread_id} ({:?})", state.status);
                yield Ok(Snapshot { node: None, state, forwarded: None });
                return;
            };

            let mut steps = 0;
            loop {
                if steps >= self.config.max_steps {
                    log::warn!(
                        "Thread {thread_id} exceeded {} steps; ending the turn",
                        self.config.max_steps
                    );
                    let mut update = StateUpdate::new();
                    if let Some(call) = state.last_message().and_then(ChatMessage::tool_call) {
                        // Every tool call in the history must keep its response.
                        update = update.message(ChatMessage::tool(
                            call.call_id.clone(),
                            CANCELLED_TOOL_NOTE,
                        ));
                    }
                    state.apply(
                        update
                            .message(ChatMessage::assistant(STEP_BUDGET_APOLOGY))
                            .pending_tool(None)
                            .completed(true)
                            .status(GraphStatus::Idle),
                    );
                    if let Err(e) = self.store.save(&state).await {
                        yield Err(GraphError::from(e));
                        return;
                    }
                    yield Ok(Snapshot { node: Some(node), state, forwarded: None });
                    return;
                }
                steps += 1;

                let transition = self.step(node, &mut state).await;
                let (following, forwarded) = match transition {
                    Transition::Goto(next) => {
                        state.status = GraphStatus::Running { next };
                        (Some(next), None)
                    }
                    Transition::Suspend { at, resume_token, reason } => {
                        log::info!("Thread {thread_id} suspended before {at}: {reason}");
                        state.status = GraphStatus::Suspended { at, resume_token, reason };
                        let forwarded = (reason == SuspendReason::AwaitingExternalResult)
                            .then(|| state.last_command.clone())
                            .flatten();
                        (None, forwarded)
                    }
                    Transition::End => {
                        state.apply(
                            StateUpdate::new()
                                .pending_tool(None)
                                .completed(true)
                                .status(GraphStatus::Idle),
                        );
                        (None, None)
                    }
                };

                if let Err(e) = self.store.save(&state).await {
                    yield Err(GraphError::from(e));
                    return;
                }
                yield Ok(Snapshot { node: Some(node), state: state.clone(), forwarded });

                match following {
                    Some(next) => node = next,
                    None => break,
                }
            }
        }
    }

    async fn step(&self, node: NodeId, state: &mut ConversationState) -> Transition {
        log::debug!("Running {node} on thread {}", state.thread_id);

        let output = match node {
            NodeId::Agent => {
                let prompt = build_system_prompt(self.registry.tools(), chrono::Local::now());
                let update =
                    agent::run(state, self.provider.as_ref(), &self.registry, &prompt).await;
                state.apply(update);
                return router::route_after_agent(state)
                    .target()
                    .map_or(Transition::End, Transition::Goto);
            }
            NodeId::Confirm => confirm::run(state),
            NodeId::ReadTools => tools::read_tools(state, &self.registry),
            NodeId::WriteTools => tools::write_tools(state, &self.registry),
            NodeId::ContinueExternal => tools::continue_external(state, &self.registry),
            NodeId::Process => process::run(state),
        };

        state.apply(output.update);
        output.transition
    }

    /// Runs a turn to completion and returns the final state.
    ///
    /// # Errors
    ///
    /// See [`SpaceGraph::stream`].
    pub async fn invoke(
        &self,
        thread_id: impl Into<String>,
        input: Option<String>,
    ) -> Result<ConversationState, GraphError> {
        let thread_id = thread_id.into();
        let stream = self.stream(thread_id.clone(), input);
        futures::pin_mut!(stream);

        let mut last = None;
        while let Some(snapshot) = stream.next().await {
            last = Some(snapshot?.state);
        }

        last.ok_or(GraphError::UnknownThread(thread_id))
    }

    /// Stores a platform result for a thread waiting on one.
    ///
    /// Returns `false`, leaving the checkpoint untouched, when the thread is
    /// unknown or not waiting for a result.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Checkpoint`] if the store fails.
    pub async fn update_external_result(
        &self,
        thread_id: &str,
        payload: serde_json::Value,
    ) -> Result<bool, GraphError> {
        let _guard = self.locks.acquire(thread_id).await;

        let Some(mut state) = self.store.load(thread_id).await? else {
            log::warn!("Ignoring result for unknown thread {thread_id}");
            return Ok(false);
        };

        if !state.status.is_awaiting_external() {
            log::warn!(
                "Ignoring result for thread {thread_id}: not awaiting one ({:?})",
                state.status
            );
            return Ok(false);
        }

        if let (Some(expected), Some(reported)) = (
            state.last_command.as_ref().map(|c| c.func.as_str()),
            payload.get("tool_func").and_then(serde_json::Value::as_str),
        ) && expected != reported
        {
            log::warn!("Thread {thread_id} expected a {expected} result but got {reported}");
        }

        state.external_result = Some(payload);
        self.store.save(&state).await?;
        log::info!("Stored platform result for thread {thread_id}");
        Ok(true)
    }

    /// Describes a thread's checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Checkpoint`] if the store fails.
    pub async fn get_state(&self, thread_id: &str) -> Result<StateInfo, GraphError> {
        let state = self.store.load(thread_id).await?;
        Ok(StateInfo {
            thread_id: thread_id.to_string(),
            exists: state.is_some(),
            keys: state.map(|s| s.present_keys()).unwrap_or_default(),
        })
    }

    /// Loads a thread's full state.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Checkpoint`] if the store fails.
    pub async fn load(&self, thread_id: &str) -> Result<Option<ConversationState>, GraphError> {
        Ok(self.store.load(thread_id).await?)
    }

    /// Deletes a thread. Returns `false` if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Checkpoint`] if the store fails.
    pub async fn delete_thread(&self, thread_id: &str) -> Result<bool, GraphError> {
        let deleted = {
            let _guard = self.locks.acquire(thread_id).await;
            self.store.delete(thread_id).await?
        };
        self.locks.forget(thread_id).await;
        Ok(deleted)
    }

    /// Lists threads, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::Checkpoint`] if the store fails.
    pub async fn list_threads(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CheckpointSummary>, GraphError> {
        Ok(self.store.list(limit, offset).await?)
    }
}

/// State changes applied before the agent sees a new user message.
fn begin_turn(state: &ConversationState, text: String) -> StateUpdate {
    let update = StateUpdate::new()
        .user_input(Some(text.clone()))
        .pending_tool(None)
        .completed(false)
        .status(GraphStatus::Running {
            next: NodeId::Agent,
        });

    match &state.status {
        GraphStatus::Suspended {
            reason: SuspendReason::AwaitingConfirmation,
            ..
        } => {
            let answer = match Reply::classify(&text) {
                Reply::Affirmative => Some(true),
                Reply::Negative => Some(false),
                Reply::Other => None,
            };
            log::info!(
                "Thread {} answered confirmation: {answer:?}",
                state.thread_id
            );
            let confirmation = state.confirmation.clone().map(|mut c| {
                c.answer = answer;
                c
            });
            update.confirmation(confirmation).has_answered(true)
        }
        GraphStatus::Suspended {
            reason: SuspendReason::AwaitingExternalResult,
            resume_token,
            ..
        } => {
            log::warn!(
                "Thread {} abandons outstanding command {resume_token}",
                state.thread_id
            );
            update
                .message(ChatMessage::assistant(ABANDONED_COMMAND_NOTE))
                .external_result(None)
                .confirmation(None)
                .has_answered(false)
        }
        GraphStatus::Idle | GraphStatus::Running { .. } => {
            update.confirmation(None).has_answered(false)
        }
    }
}

/// Where a resume without input continues, if anywhere.
fn resume_point(state: &ConversationState) -> Option<NodeId> {
    match &state.status {
        GraphStatus::Running { next } => Some(*next),
        GraphStatus::Suspended {
            at,
            reason: SuspendReason::AwaitingExternalResult,
            ..
        } if state.external_result.is_some() => Some(*at),
        GraphStatus::Idle | GraphStatus::Suspended { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use space_agent_ai::AiError;
    use space_agent_checkpoint::MemoryCheckpointStore;
    use space_agent_models::ToolKind;

    use super::*;
    use crate::nodes::agent::APOLOGY;
    use crate::testing::{GatedProvider, ScriptedProvider, text, tool_use};

    const CONFIRM_ARGS: &str = r#"{"action_description": "创建以下场景", "details": {"name": "太空任务", "centralBody": "Earth"}}"#;
    const CREATE_ARGS: &str = r#"{"name": "太空任务", "centralBody": "Earth", "startTime": "2025-01-01T00:00:00.000Z", "endTime": "2025-01-02T00:00:00.000Z"}"#;

    fn build(provider: ScriptedProvider) -> (SpaceGraph, Arc<ScriptedProvider>) {
        build_with(provider, GraphConfig::default())
    }

    fn build_with(
        provider: ScriptedProvider,
        config: GraphConfig,
    ) -> (SpaceGraph, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let graph = SpaceGraph::new(
            provider.clone(),
            Arc::new(MemoryCheckpointStore::new()),
            ToolRegistry::default(),
            config,
        );
        (graph, provider)
    }

    async fn collect(graph: &SpaceGraph, thread_id: &str, input: Option<&str>) -> Vec<Snapshot> {
        let stream = graph.stream(thread_id, input.map(str::to_string));
        futures::pin_mut!(stream);
        let mut snapshots = Vec::new();
        while let Some(snapshot) = stream.next().await {
            snapshots.push(snapshot.unwrap());
        }
        snapshots
    }

    fn last_text(state: &ConversationState) -> &str {
        state.last_message().map_or("", ChatMessage::content)
    }

    #[tokio::test]
    async fn plain_answer_ends_the_turn() {
        let (graph, _) = build(ScriptedProvider::new(vec![Ok(text("您好，我是空间场景助手。"))]));

        let snapshots = collect(&graph, "t1", Some("你好")).await;

        assert_eq!(snapshots.len(), 1);
        let state = &snapshots[0].state;
        assert_eq!(state.messages.len(), 2);
        assert_eq!(state.status, GraphStatus::Idle);
        assert!(state.completed);
        assert_eq!(state.user_input, None);
    }

    #[tokio::test]
    async fn create_scenario_flow() {
        let (graph, provider) = build(ScriptedProvider::new(vec![
            Ok(tool_use("c1", "confirm_user_action", CONFIRM_ARGS)),
            Ok(tool_use("c2", "create_scenario", CREATE_ARGS)),
            Ok(text("")),
        ]));

        // Turn 1: the agent asks for confirmation.
        let state = graph.invoke("t1", Some("创建一个名为太空任务的场景".to_string())).await.unwrap();
        assert!(state.status.is_awaiting_confirmation());
        assert!(last_text(&state).starts_with("请确认是否要创建以下场景："));
        assert!(state.completed);

        // Turn 2: approval executes the write and suspends for the platform.
        let snapshots = collect(&graph, "t1", Some("是")).await;
        let last = snapshots.last().unwrap();
        assert!(last.state.status.is_awaiting_external());
        let forwarded = last.forwarded.clone().unwrap();
        assert_eq!(forwarded.func, "create_scenario");
        assert_eq!(forwarded.message, "场景:太空任务 创建成功");
        assert_eq!(last.state.confirmation, None);
        assert!(!last.state.completed);

        // The platform reports back and the thread resumes.
        let payload = serde_json::json!({
            "tool_func": "create_scenario",
            "result": { "success": true, "message": "场景:太空任务 创建成功" }
        });
        assert!(graph.update_external_result("t1", payload).await.unwrap());

        let snapshots = collect(&graph, "t1", None).await;
        let nodes: Vec<_> = snapshots.iter().map(|s| s.node).collect();
        assert_eq!(nodes, vec![Some(NodeId::Process), Some(NodeId::Agent)]);

        let state = &snapshots.last().unwrap().state;
        assert_eq!(last_text(state), "场景:太空任务 创建成功");
        assert!(state.completed);
        assert_eq!(state.status, GraphStatus::Idle);
        assert_eq!(state.external_result, None);
        assert_eq!(provider.calls().len(), 3);
    }

    #[tokio::test]
    async fn unparsable_result_reports_error() {
        let (graph, _) = build(ScriptedProvider::new(vec![Ok(tool_use(
            "c1",
            "query_scenario_entities",
            "{}",
        ))]));

        graph.invoke("t1", Some("查询实体".to_string())).await.unwrap();
        assert!(
            graph
                .update_external_result("t1", serde_json::json!("not json"))
                .await
                .unwrap()
        );

        let state = graph.invoke("t1", None).await.unwrap();
        assert!(
            state
                .messages
                .iter()
                .any(|m| m.content().starts_with("无法解析平台返回的执行结果："))
        );
        assert!(state.completed);
    }

    #[tokio::test]
    async fn resume_with_nothing_pending_is_a_noop() {
        let (graph, provider) = build(ScriptedProvider::new(vec![Ok(text("好的"))]));
        let before = graph.invoke("t1", Some("你好".to_string())).await.unwrap();

        let snapshots = collect(&graph, "t1", None).await;

        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].node, None);
        assert_eq!(snapshots[0].state, before);
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn resume_before_result_arrives_is_a_noop() {
        let (graph, _) = build(ScriptedProvider::new(vec![Ok(tool_use(
            "c1",
            "query_scenario_entities",
            "",
        ))]));
        graph.invoke("t1", Some("查询实体".to_string())).await.unwrap();

        let snapshots = collect(&graph, "t1", None).await;

        assert_eq!(snapshots.len(), 1);
        assert!(snapshots[0].state.status.is_awaiting_external());
    }

    #[tokio::test]
    async fn resuming_unknown_thread_fails() {
        let (graph, _) = build(ScriptedProvider::new(Vec::new()));
        let result = graph.invoke("missing", None).await;
        assert!(matches!(result, Err(GraphError::UnknownThread(id)) if id == "missing"));
    }

    #[tokio::test]
    async fn write_without_approval_asks_first() {
        let (graph, _) = build(ScriptedProvider::new(vec![Ok(tool_use(
            "c1",
            "clear_scene",
            "{}",
        ))]));

        let state = graph.invoke("t1", Some("清除场景".to_string())).await.unwrap();

        assert!(state.status.is_awaiting_confirmation());
        assert!(last_text(&state).starts_with("请确认是否要清除当前场景："));
        assert_eq!(
            state.confirmation.unwrap().requested_tool,
            Some(ToolKind::ClearScene)
        );
    }

    #[tokio::test]
    async fn declined_confirmation_does_not_execute() {
        let (graph, _) = build(ScriptedProvider::new(vec![
            Ok(tool_use("c1", "clear_scene", "{}")),
            Ok(tool_use("c2", "clear_scene", "{}")),
        ]));
        graph.invoke("t1", Some("清除场景".to_string())).await.unwrap();

        let state = graph.invoke("t1", Some("否".to_string())).await.unwrap();

        // The declined write is asked again instead of being executed.
        assert!(state.status.is_awaiting_confirmation());
        assert_eq!(state.last_command, None);
    }

    #[tokio::test]
    async fn llm_error_apologises() {
        let (graph, _) = build(ScriptedProvider::new(vec![Err(AiError::Provider {
            message: "boom".to_string(),
        })]));

        let state = graph.invoke("t1", Some("你好".to_string())).await.unwrap();

        assert_eq!(last_text(&state), APOLOGY);
        assert!(state.completed);
        assert_eq!(state.status, GraphStatus::Idle);
    }

    #[tokio::test]
    async fn result_is_ignored_when_not_awaiting() {
        let (graph, _) = build(ScriptedProvider::new(vec![Ok(text("好的"))]));
        graph.invoke("t1", Some("你好".to_string())).await.unwrap();

        let accepted = graph
            .update_external_result("t1", serde_json::json!({ "success": true }))
            .await
            .unwrap();

        assert!(!accepted);
        assert_eq!(graph.load("t1").await.unwrap().unwrap().external_result, None);
        assert!(
            !graph
                .update_external_result("nope", serde_json::json!({}))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn new_input_abandons_outstanding_command() {
        let (graph, _) = build(ScriptedProvider::new(vec![
            Ok(tool_use("c1", "query_scenario_entities", "{}")),
            Ok(text("您好")),
        ]));
        graph.invoke("t1", Some("查询实体".to_string())).await.unwrap();

        let state = graph.invoke("t1", Some("算了".to_string())).await.unwrap();

        assert!(state.messages.iter().any(|m| m.content() == ABANDONED_COMMAND_NOTE));
        assert_eq!(state.status, GraphStatus::Idle);
        assert_eq!(last_text(&state), "您好");
        assert!(
            !graph
                .update_external_result("t1", serde_json::json!({ "success": true }))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn read_tool_answers_without_suspending() {
        let (graph, _) = build(ScriptedProvider::new(vec![
            Ok(tool_use("c1", "list_entity_types", "{}")),
            Ok(text("")),
        ]));

        let snapshots = collect(&graph, "t1", Some("有哪些实体类型？")).await;
        let nodes: Vec<_> = snapshots.iter().filter_map(|s| s.node).collect();

        assert_eq!(
            nodes,
            vec![NodeId::Agent, NodeId::ReadTools, NodeId::Process, NodeId::Agent]
        );
        let state = &snapshots.last().unwrap().state;
        assert!(last_text(state).starts_with("平台支持 14 种实体类型\n["));
        assert_eq!(state.status, GraphStatus::Idle);
    }

    #[tokio::test]
    async fn step_budget_ends_the_turn() {
        let (graph, _) = build_with(
            ScriptedProvider::new(vec![
                Ok(tool_use("c1", "list_entity_types", "{}")),
                Ok(text("")),
            ]),
            GraphConfig { max_steps: 2 },
        );

        let state = graph.invoke("t1", Some("有哪些实体类型？".to_string())).await.unwrap();

        assert_eq!(last_text(&state), STEP_BUDGET_APOLOGY);
        assert!(state.completed);
        assert_eq!(state.status, GraphStatus::Idle);
    }

    #[tokio::test]
    async fn approval_does_not_carry_over_to_another_write() {
        let (graph, _) = build(ScriptedProvider::new(vec![
            Ok(tool_use("c1", "confirm_user_action", CONFIRM_ARGS)),
            Ok(tool_use("c2", "clear_scene", "{}")),
        ]));
        graph.invoke("t1", Some("创建一个名为太空任务的场景".to_string())).await.unwrap();

        let state = graph.invoke("t1", Some("是".to_string())).await.unwrap();

        assert!(state.status.is_awaiting_confirmation());
        assert!(last_text(&state).starts_with("请确认是否要清除当前场景："));
        assert_eq!(state.last_command, None);
        assert_eq!(
            state.confirmation.unwrap().requested_tool,
            Some(ToolKind::ClearScene)
        );
    }

    #[tokio::test]
    async fn approval_does_not_cover_changed_arguments() {
        let other = CREATE_ARGS.replace("太空任务", "另一个任务");
        let (graph, _) = build(ScriptedProvider::new(vec![
            Ok(tool_use("c1", "confirm_user_action", CONFIRM_ARGS)),
            Ok(tool_use("c2", "create_scenario", &other)),
        ]));
        graph.invoke("t1", Some("创建场景".to_string())).await.unwrap();

        let state = graph.invoke("t1", Some("是".to_string())).await.unwrap();

        assert!(state.status.is_awaiting_confirmation());
        assert!(last_text(&state).contains("- name: 另一个任务"));
        assert_eq!(state.last_command, None);
    }

    #[tokio::test]
    async fn success_without_message_uses_fallback_text() {
        let (graph, _) = build(ScriptedProvider::new(vec![
            Ok(tool_use("c1", "confirm_user_action", CONFIRM_ARGS)),
            Ok(tool_use("c2", "create_scenario", CREATE_ARGS)),
            Ok(text("")),
        ]));
        graph.invoke("t1", Some("创建一个名为太空任务的场景".to_string())).await.unwrap();
        graph.invoke("t1", Some("是".to_string())).await.unwrap();

        assert!(
            graph
                .update_external_result("t1", serde_json::json!({ "success": true }))
                .await
                .unwrap()
        );
        let state = graph.invoke("t1", None).await.unwrap();

        assert!(last_text(&state).contains("成功创建"));
        assert!(state.completed);
    }

    #[tokio::test]
    async fn repeated_resume_after_result_is_stable() {
        let (graph, provider) = build(ScriptedProvider::new(vec![
            Ok(tool_use("c1", "query_scenario_entities", "{}")),
            Ok(text("场景中没有实体。")),
        ]));
        graph.invoke("t1", Some("查询实体".to_string())).await.unwrap();
        graph
            .update_external_result(
                "t1",
                serde_json::json!({ "success": true, "message": "查询成功", "data": [] }),
            )
            .await
            .unwrap();

        let first = collect(&graph, "t1", None).await;
        let second = collect(&graph, "t1", None).await;

        let first = &first.last().unwrap().state;
        let second = &second.last().unwrap().state;
        assert!(first.completed);
        assert!(second.completed);
        assert_eq!(first.messages.len(), second.messages.len());
        assert_eq!(provider.calls().len(), 2);
    }

    #[tokio::test]
    async fn step_budget_answers_dangling_tool_call() {
        let (graph, _) = build_with(
            ScriptedProvider::new(vec![
                Ok(tool_use("c1", "query_scenario_entities", "{}")),
                Ok(text("您好")),
            ]),
            GraphConfig { max_steps: 1 },
        );

        let state = graph.invoke("t1", Some("查询实体".to_string())).await.unwrap();

        assert_eq!(last_text(&state), STEP_BUDGET_APOLOGY);
        for (i, message) in state.messages.iter().enumerate() {
            if let Some(call) = message.tool_call() {
                assert!(matches!(
                    state.messages.get(i + 1),
                    Some(ChatMessage::Tool { call_id, .. }) if *call_id == call.call_id
                ));
            }
        }

        // The thread keeps working on the next turn.
        let state = graph.invoke("t1", Some("你好".to_string())).await.unwrap();
        assert_eq!(last_text(&state), "您好");
    }

    #[tokio::test]
    async fn same_thread_calls_wait_for_the_running_turn() {
        let provider = Arc::new(GatedProvider::new(vec![Ok(tool_use(
            "c1",
            "query_scenario_entities",
            "{}",
        ))]));
        let graph = Arc::new(SpaceGraph::new(
            provider.clone(),
            Arc::new(MemoryCheckpointStore::new()),
            ToolRegistry::default(),
            GraphConfig::default(),
        ));

        let turn = tokio::spawn({
            let graph = graph.clone();
            async move { graph.invoke("t1", Some("查询实体".to_string())).await }
        });
        provider.entered().await;

        let result = tokio::spawn({
            let graph = graph.clone();
            async move {
                graph
                    .update_external_result("t1", serde_json::json!({ "success": true }))
                    .await
            }
        });
        let resume = tokio::spawn({
            let graph = graph.clone();
            async move { graph.invoke("t1", None).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!result.is_finished());
        assert!(!resume.is_finished());

        provider.release();
        let suspended = turn.await.unwrap().unwrap();
        assert!(suspended.status.is_awaiting_external());

        // Both ran against the checkpoint the turn left behind: the result
        // was accepted and the resume went on to process it.
        assert!(result.await.unwrap().unwrap());
        provider.release();
        let resumed = resume.await.unwrap().unwrap();
        assert!(resumed.completed);
        assert_eq!(resumed.external_result, None);
    }

    #[tokio::test]
    async fn get_state_and_delete() {
        let (graph, _) = build(ScriptedProvider::new(vec![Ok(text("好的"))]));

        assert!(!graph.get_state("t1").await.unwrap().exists);
        graph.invoke("t1", Some("你好".to_string())).await.unwrap();

        let info = graph.get_state("t1").await.unwrap();
        assert!(info.exists);
        assert!(info.keys.contains(&"messages".to_string()));
        assert_eq!(graph.list_threads(10, 0).await.unwrap().len(), 1);

        assert!(graph.delete_thread("t1").await.unwrap());
        assert!(!graph.delete_thread("t1").await.unwrap());
    }
}
