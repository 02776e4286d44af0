//! Database models and API payloads

mod api_key;
mod label;
mod session;
mod testcase;
mod user;

pub use api_key::*;
pub use label::*;
pub use session::*;
pub use testcase::*;
pub use user::*;

use serde::Serialize;

/// Offset/limit page envelope shared by the listing endpoints.
#[derive(Debug, Serialize)]
pub struct OffsetPagination<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}
