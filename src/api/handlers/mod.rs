//! API handlers

pub mod api_keys;
pub mod auth;
pub mod groups;
pub mod ingress;
pub mod labels;
pub mod ready;
pub mod sessions;
pub mod testcases;

use serde::Deserialize;

pub(crate) fn default_limit() -> i64 {
    100
}

/// Offset/limit parameters shared by the plain listing endpoints.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}
