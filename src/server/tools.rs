//! Tool-call protocol router.
//!
//! Exposes the coordinator's operations as named tools with JSON schemas,
//! for agent integrations that speak a list/invoke protocol rather than
//! plain REST.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::coordinator::IndexCoordinator;

/// Tool information with schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Tool definitions for Semdex.
#[must_use]
pub fn get_tools() -> Vec<ToolInfo> {
    vec![
        ToolInfo {
            name: "trigger_index".to_string(),
            description: Some(
                "Trigger a full indexing scan of the configured project path".to_string(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "force_reindex": {
                        "type": "boolean",
                        "description": "Clear the existing index before scanning (default: false)",
                        "default": false
                    }
                },
                "required": []
            }),
        },
        ToolInfo {
            name: "get_status".to_string(),
            description: Some("Get the current indexing status and statistics".to_string()),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {}
            }),
        },
        ToolInfo {
            name: "search".to_string(),
            description: Some(
                "Search the semantic index for chunks matching a query".to_string(),
            ),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Natural language query"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Maximum number of results (default: 5)",
                        "default": 5
                    }
                },
                "required": ["query"]
            }),
        },
    ]
}

/// Create the tool router.
pub fn create_tool_router(coordinator: Arc<IndexCoordinator>) -> Router {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/invoke", post(invoke_tool))
        .with_state(coordinator)
}

/// List available tools.
async fn list_tools() -> Json<Vec<ToolInfo>> {
    Json(get_tools())
}

/// Tool invocation request.
#[derive(Debug, Deserialize)]
pub struct ToolRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// Tool invocation response.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub content: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Invoke a tool.
async fn invoke_tool(
    State(coordinator): State<Arc<IndexCoordinator>>,
    Json(request): Json<ToolRequest>,
) -> Json<ToolResponse> {
    tracing::debug!(tool = %request.name, "Invoking tool");

    let result = match request.name.as_str() {
        "trigger_index" => handle_trigger_index(&coordinator, &request.arguments),
        "get_status" => handle_get_status(&coordinator).await,
        "search" => handle_search(&coordinator, &request.arguments).await,
        _ => Err(format!("Unknown tool: {}", request.name)),
    };

    match result {
        Ok(content) => {
            tracing::debug!("Tool invocation succeeded");
            Json(ToolResponse {
                content,
                error: None,
            })
        }
        Err(e) => {
            tracing::warn!(error = %e, "Tool invocation failed");
            Json(ToolResponse {
                content: serde_json::Value::Null,
                error: Some(e),
            })
        }
    }
}

// Tool handlers

fn handle_trigger_index(
    coordinator: &Arc<IndexCoordinator>,
    args: &serde_json::Value,
) -> std::result::Result<serde_json::Value, String> {
    let force_reindex = args["force_reindex"].as_bool().unwrap_or(false);

    Arc::clone(coordinator)
        .request_scan(force_reindex)
        .map_err(|e| e.to_string())?;

    Ok(serde_json::json!({
        "message": format!(
            "Indexing process initiated for {} in the background.",
            coordinator.project_root().display()
        )
    }))
}

async fn handle_get_status(
    coordinator: &Arc<IndexCoordinator>,
) -> std::result::Result<serde_json::Value, String> {
    let report = coordinator.status().await;
    serde_json::to_value(&report).map_err(|e| e.to_string())
}

#[allow(clippy::cast_possible_truncation)]
async fn handle_search(
    coordinator: &Arc<IndexCoordinator>,
    args: &serde_json::Value,
) -> std::result::Result<serde_json::Value, String> {
    let query = args["query"].as_str().ok_or("query is required")?;
    let top_k = args["top_k"].as_u64().unwrap_or(5) as usize;

    let results = coordinator
        .search(query, top_k)
        .await
        .map_err(|e| e.to_string())?;
    let count = results.len();

    Ok(serde_json::json!({
        "results": results,
        "query": query,
        "count": count,
    }))
}
