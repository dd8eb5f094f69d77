//! HTTP transports and process plumbing.
//!
//! This module provides:
//! - REST API using axum (index / status / search)
//! - Tool-call protocol router for agent integrations
//! - Tracing setup, Prometheus metrics, and the application lifecycle

mod app;
pub mod metrics;
mod observability;
mod rest;
mod tools;

pub use app::{App, ServerConfig};
pub use metrics::init_metrics;
pub use observability::init_tracing;
pub use rest::create_rest_router;
pub use tools::{create_tool_router, get_tools, ToolInfo, ToolRequest, ToolResponse};
