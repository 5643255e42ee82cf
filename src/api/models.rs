//! API data models

use serde::{Deserialize, Serialize};

/// Query parameters accepted by `GET /clips`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipQuery {
    pub watched: Option<bool>,
    pub memorized: Option<bool>,
    /// Category filter, `study` or `relax`
    pub directory_type: Option<String>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

/// Operation selector for `POST /clips/bulk`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkOperation {
    Create,
    Update,
    Delete,
}

/// Body of `POST /clips/bulk`. For delete, each clip only needs an `id`.
#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub operation: BulkOperation,
    pub clips: Vec<serde_json::Value>,
}

/// Identity key portion of a `PUT /clips/find-and-update` body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipIdentityRequest {
    /// Video name on the wire
    pub video_path: String,
    pub start_time: u32,
    pub end_time: u32,
}
