//! Voice-session tool calls. Always answer 200 with a `ToolResult`.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;

use carecall_core::ToolResult;
use carecall_scheduler::tools::TOOL_NAMES;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ToolCallBody {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub args: JsonValue,
}

pub async fn list_tools() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "tools": TOOL_NAMES }))
}

pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<ToolCallBody>, JsonRejection>,
) -> Json<ToolResult> {
    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            return Json(ToolResult::err(format!(
                "Invalid request: {}",
                rejection.body_text()
            )))
        }
    };

    Json(state.tools.dispatch(&name, &body.args, &body.user_id).await)
}
