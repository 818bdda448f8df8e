//! API schema types for the generation endpoints.
//!
//! Defines the request and response types for `POST /generate`,
//! `GET /generate/status`, and `POST /generate/terminate`.

use serde::{Deserialize, Serialize};

use langforge_core::run::RunStatus;

/// Request body for `POST /generate`.
///
/// `prompt` is optional at the deserialization layer so an absent field
/// maps to the missing-input error rather than a generic decode failure.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Natural-language description of the language to generate.
    pub prompt: Option<String>,
}

/// Response body for `POST /generate`.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    /// Identifier to poll with.
    #[serde(rename = "workflowId")]
    pub workflow_id: String,
}

/// Query string for `GET /generate/status` and `POST /generate/terminate`.
#[derive(Debug, Deserialize)]
pub struct WorkflowQuery {
    #[serde(rename = "workflowId")]
    pub workflow_id: String,
}

/// Response body for `GET /generate/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Current run status.
    pub status: RunStatus,
    /// Base64-encoded package, present once complete.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Failure diagnostic, present when errored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response body for `POST /generate/terminate`.
#[derive(Debug, Serialize)]
pub struct TerminateResponse {
    #[serde(rename = "workflowId")]
    pub workflow_id: String,
    /// Status after the terminate request was applied.
    pub status: RunStatus,
}
