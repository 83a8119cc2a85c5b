//! Console chat on a single thread.
//!
//! The console stands in for the scene platform: when the agent forwards a
//! command, the user decides whether to report success or failure, and the
//! thread resumes with that result.

use dialoguer::{Input, Select};
use futures::StreamExt as _;
use space_agent_graph::{GraphError, SpaceGraph};
use space_agent_models::{ChatMessage, CommandDescriptor};

/// What to report for a forwarded command.
enum PlatformReply {
    Success,
    Failure,
    Ignore,
}

impl PlatformReply {
    const ALL: &[Self] = &[Self::Success, Self::Failure, Self::Ignore];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Success => "Report success",
            Self::Failure => "Report failure",
            Self::Ignore => "Leave it pending",
        }
    }
}

/// Runs the chat loop until the user types `exit`.
///
/// # Errors
///
/// Returns an error if a prompt fails or the graph cannot reach its store.
pub async fn run(graph: &SpaceGraph) -> Result<(), Box<dyn std::error::Error>> {
    let thread_id = format!("space-thread-{}", uuid::Uuid::new_v4());
    log::info!("Starting console chat on {thread_id}");
    println!("Thread: {thread_id}");
    println!("Type 'exit' to quit.");
    println!();

    loop {
        let input: String = Input::new()
            .with_prompt("You")
            .allow_empty(true)
            .interact_text()?;
        let input = input.trim();

        if input.is_empty() {
            continue;
        }
        if matches!(input, "exit" | "quit") {
            break;
        }

        let mut forwarded = run_turn(graph, &thread_id, Some(input.to_string())).await?;

        while let Some(command) = forwarded.take() {
            println!();
            println!("[platform] {} {}", command.func, command.args);

            let idx = Select::new()
                .with_prompt("Platform result")
                .items(
                    &PlatformReply::ALL
                        .iter()
                        .map(PlatformReply::label)
                        .collect::<Vec<_>>(),
                )
                .default(0)
                .interact()?;

            let success = match PlatformReply::ALL[idx] {
                PlatformReply::Success => true,
                PlatformReply::Failure => false,
                PlatformReply::Ignore => {
                    log::debug!("Leaving {} pending on {thread_id}", command.func);
                    break;
                }
            };

            if graph
                .update_external_result(&thread_id, simulated_result(&command, success))
                .await?
            {
                forwarded = run_turn(graph, &thread_id, None).await?;
            } else {
                log::warn!("{thread_id} is no longer waiting for a {} result", command.func);
            }
        }
    }

    Ok(())
}

/// Streams one turn, printing new assistant replies. Returns the command
/// the platform must execute, if the turn suspended for one.
async fn run_turn(
    graph: &SpaceGraph,
    thread_id: &str,
    input: Option<String>,
) -> Result<Option<CommandDescriptor>, GraphError> {
    let stream = graph.stream(thread_id, input);
    futures::pin_mut!(stream);

    let mut shown = graph
        .load(thread_id)
        .await?
        .map_or(0, |state| state.messages.len());
    let mut forwarded = None;

    while let Some(snapshot) = stream.next().await {
        let snapshot = snapshot?;
        let messages = &snapshot.state.messages;

        for reply in assistant_replies(messages.get(shown..).unwrap_or_default()) {
            println!("Agent: {reply}");
        }
        shown = messages.len();

        if snapshot.forwarded.is_some() {
            forwarded = snapshot.forwarded;
        }
    }

    Ok(forwarded)
}

fn assistant_replies(messages: &[ChatMessage]) -> impl Iterator<Item = &str> {
    messages
        .iter()
        .filter(|m| m.is_assistant())
        .map(ChatMessage::content)
        .filter(|c| !c.trim().is_empty())
}

/// The result envelope a platform would send for `command`.
fn simulated_result(command: &CommandDescriptor, success: bool) -> serde_json::Value {
    let message = if success {
        command.message.clone()
    } else {
        format!("平台执行 {} 失败", command.func)
    };

    let mut result = serde_json::json!({ "success": success, "message": message });
    if success && command.func.starts_with("query_") {
        result["data"] = serde_json::json!([]);
    }

    serde_json::json!({
        "type": "tool_result",
        "tool_func": command.func,
        "result": result,
    })
}

#[cfg(test)]
mod tests {
    use space_agent_models::ToolOperation;

    use super::*;

    #[test]
    fn simulated_success_echoes_command_message() {
        let command = CommandDescriptor::forward(&ToolOperation::ClearScene, "场景已成功清除。");
        let result = simulated_result(&command, true);

        assert_eq!(result["tool_func"], "clear_scene");
        assert_eq!(result["result"]["success"], true);
        assert_eq!(result["result"]["message"], "场景已成功清除。");
        assert!(result["result"].get("data").is_none());
    }

    #[test]
    fn simulated_query_carries_empty_data() {
        let command =
            CommandDescriptor::forward(&ToolOperation::QueryScenarioEntities, "向平台发送查询场景实体指令");
        let result = simulated_result(&command, true);
        assert_eq!(result["result"]["data"], serde_json::json!([]));

        let failed = simulated_result(&command, false);
        assert_eq!(failed["result"]["success"], false);
        assert_eq!(failed["result"]["message"], "平台执行 query_scene_entities 失败");
    }

    #[test]
    fn only_non_empty_assistant_text_is_shown() {
        let messages = vec![
            ChatMessage::user("你好"),
            ChatMessage::assistant(""),
            ChatMessage::tool("c1", "{}"),
            ChatMessage::assistant("您好！"),
        ];
        assert_eq!(assistant_replies(&messages).collect::<Vec<_>>(), vec!["您好！"]);
    }
}
