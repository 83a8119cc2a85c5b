//! HTTP handler functions for the space agent API.

use actix_web::{HttpResponse, web};
use space_agent_models::ConversationState;
use space_agent_server_models::{
    ApiError, ApiHealth, ApiThread, InvokeRequest, InvokeResponse, StateResponse,
    ThreadListParams,
};

use crate::AppState;

const DEFAULT_THREAD_LIMIT: u32 = 20;

fn error(detail: impl Into<String>) -> ApiError {
    ApiError {
        detail: detail.into(),
    }
}

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `POST /api/v1/space/invoke`
///
/// Runs one turn to its next suspension or end and returns the final state
/// with only its last message.
pub async fn invoke(state: web::Data<AppState>, body: web::Json<InvokeRequest>) -> HttpResponse {
    let InvokeRequest { input, thread_id } = body.into_inner();

    let Some(thread_id) = thread_id.filter(|id| !id.trim().is_empty()) else {
        log::warn!("Invoke request missing thread_id");
        return HttpResponse::BadRequest().json(error("thread_id is required"));
    };

    log::info!("Received invoke request for thread_id: {thread_id}");

    match state.graph.invoke(thread_id.clone(), Some(input)).await {
        Ok(final_state) => HttpResponse::Ok().json(InvokeResponse {
            output: last_message_only(&final_state),
            thread_id,
        }),
        Err(e) => {
            log::error!("Error invoking agent for thread {thread_id}: {e}");
            HttpResponse::InternalServerError()
                .json(error(format!("Agent invocation failed: {e}")))
        }
    }
}

/// `GET /api/v1/space/get_state/{thread_id}`
pub async fn get_state(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let thread_id = path.into_inner();

    match state.graph.get_state(&thread_id).await {
        Ok(info) => HttpResponse::Ok().json(StateResponse {
            thread_id: info.thread_id,
            state_exists: info.exists,
            current_values_keys: info.exists.then_some(info.keys),
        }),
        Err(e) => {
            log::error!("Error getting state for thread {thread_id}: {e}");
            HttpResponse::InternalServerError().json(error(format!("Failed to get state: {e}")))
        }
    }
}

/// `GET /api/v1/space/threads?limit&offset`
pub async fn list_threads(
    state: web::Data<AppState>,
    params: web::Query<ThreadListParams>,
) -> HttpResponse {
    let limit = params.limit.unwrap_or(DEFAULT_THREAD_LIMIT);
    let offset = params.offset.unwrap_or(0);

    match state.graph.list_threads(limit, offset).await {
        Ok(threads) => {
            let threads: Vec<ApiThread> = threads
                .into_iter()
                .map(|t| ApiThread {
                    thread_id: t.thread_id,
                    title: t.title,
                    created_at: t.created_at,
                    updated_at: t.updated_at,
                    message_count: t.message_count,
                })
                .collect();
            HttpResponse::Ok().json(threads)
        }
        Err(e) => {
            log::error!("Failed to list threads: {e}");
            HttpResponse::InternalServerError().json(error("Failed to list threads"))
        }
    }
}

/// `DELETE /api/v1/space/threads/{thread_id}`
pub async fn delete_thread(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let thread_id = path.into_inner();

    match state.graph.delete_thread(&thread_id).await {
        Ok(true) => HttpResponse::NoContent().finish(),
        Ok(false) => HttpResponse::NotFound().json(error(format!("Unknown thread: {thread_id}"))),
        Err(e) => {
            log::error!("Failed to delete thread {thread_id}: {e}");
            HttpResponse::InternalServerError().json(error("Failed to delete thread"))
        }
    }
}

/// Serializes the state keeping only the last message.
fn last_message_only(state: &ConversationState) -> serde_json::Value {
    let mut value = serde_json::to_value(state).unwrap_or_default();
    if let Some(messages) = value
        .get_mut("messages")
        .and_then(serde_json::Value::as_array_mut)
    {
        let last = messages.pop();
        messages.clear();
        messages.extend(last);
    }
    value
}
