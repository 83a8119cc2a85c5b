//! Routing after the agent node.

use space_agent_models::{ConversationState, Route, ToolClass};

/// Decides where to go after the agent node.
///
/// * completed turn or empty history: end
/// * last message is not an assistant tool call: end
/// * confirmation tool: ask the human
/// * query tool: forward to the platform
/// * read tool: answer in-process
/// * write tool: execute only if an affirmative confirmation covers this
///   exact call, otherwise ask first
#[must_use]
pub fn route_after_agent(state: &ConversationState) -> Route {
    if state.completed || state.messages.is_empty() {
        return Route::End;
    }

    let Some(call) = state.last_message().and_then(|m| m.tool_call()) else {
        log::info!("No tool call requested. Ending turn.");
        return Route::End;
    };

    let kind = call.kind();
    let route = match kind.class() {
        ToolClass::Confirmation => Route::Confirm,
        ToolClass::Query => Route::ContinueExternal,
        ToolClass::Read => Route::ReadTools,
        ToolClass::Write => {
            if state
                .confirmation
                .as_ref()
                .is_some_and(|c| c.approves(&call.operation))
            {
                Route::WriteTools
            } else {
                log::info!(
                    "Write tool {kind} is not covered by an approved confirmation; asking first"
                );
                Route::Confirm
            }
        }
    };

    log::info!("Routing {kind} call {} to {route}", call.call_id);
    route
}
