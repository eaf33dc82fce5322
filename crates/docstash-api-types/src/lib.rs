//! Response bodies shared between the docstash server and its clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Media type used for every error response.
pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Header carrying the identifier of a cached template (`X-Template-Hash`).
///
/// Header names are kept lowercase so they can be used with `HeaderName::from_static`.
pub const TEMPLATE_HASH_HEADER: &str = "x-template-hash";
/// Header carrying the identifier of a cached rendered report.
pub const REPORT_HASH_HEADER: &str = "x-report-hash";
/// Header carrying the final file name of a rendered report.
pub const REPORT_NAME_HEADER: &str = "x-report-name";
/// Header set when a removal purged metadata but left files behind.
pub const STORAGE_WARNING_HEADER: &str = "x-storage-warning";
/// Per-request id echoed on every response, matching the server logs.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Problem details body (RFC 7807 subset).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Supported conversions keyed by template extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTypesResponse {
    pub dictionary: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub entries: usize,
    pub total_bytes: u64,
}
