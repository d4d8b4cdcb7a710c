//! Agent endpoints: tool catalogue and chat.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tokio_util::sync::CancellationToken;

use crate::agent::{AbortCause, Domain};
use crate::tools::ToolInfo;

use super::routes::{error_response, AppState};
use super::types::{ChatErrorResponse, ChatRequest, ChatResponse};

pub(super) async fn weather_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolInfo>> {
    list_tools(&state, Domain::Weather)
}

pub(super) async fn students_tools(State(state): State<Arc<AppState>>) -> Json<Vec<ToolInfo>> {
    list_tools(&state, Domain::Students)
}

pub(super) async fn weather_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    chat(&state, Domain::Weather, req).await
}

pub(super) async fn students_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    chat(&state, Domain::Students, req).await
}

fn list_tools(state: &AppState, domain: Domain) -> Json<Vec<ToolInfo>> {
    Json(state.agent(domain).tools().list_tools())
}

async fn chat(state: &AppState, domain: Domain, req: ChatRequest) -> Response {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Prompt is required");
    }
    let model = req
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(state.config.default_model.as_str());

    // Axum drops this future when the client goes away; the guard then
    // cancels the run so no further model or tool calls are made.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    match state.agent(domain).run(prompt, model, &cancel).await {
        Ok(outcome) => Json(ChatResponse::from(outcome)).into_response(),
        Err(e) => {
            tracing::error!(
                %domain,
                error = %e,
                iterations = e.iterations,
                tools_used = e.tools_used(),
                "Chat request failed"
            );
            let status = match e.cause {
                AbortCause::Model(_) => StatusCode::BAD_GATEWAY,
                AbortCause::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                // Only reachable if the client already left.
                AbortCause::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            };
            (status, Json(ChatErrorResponse::from(e))).into_response()
        }
    }
}
