//! Abstract syntax of the testcase query language.
//!
//! Every consumer dispatches over these enums exhaustively, so adding a
//! node kind breaks every match until it is handled.

use uuid::Uuid;

use crate::storage::models::TestcaseStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Equals,
    NotEquals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A filter expression over testcases.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// The empty or whitespace-only query string.
    Empty,
    Session {
        session_id: Uuid,
        op: Comparison,
    },
    Id {
        id: Uuid,
        op: Comparison,
    },
    Name {
        name: String,
        op: Comparison,
    },
    Classname {
        classname: String,
        op: Comparison,
    },
    Testsuite {
        testsuite: String,
        op: Comparison,
    },
    File {
        file: String,
        op: Comparison,
    },
    /// `None` is the empty status string, which matches no stored status.
    Status {
        status: Option<TestcaseStatus>,
        op: Comparison,
    },
    /// Tag presence; `NotEquals` means the session has no such label row.
    Tag {
        tag: String,
        op: Comparison,
    },
    TagValue {
        tag: String,
        value: String,
        op: Comparison,
    },
    /// Strictly left-associative chain; `operators.len() == queries.len() - 1`
    /// and AND/OR share one precedence level.
    Compound {
        queries: Vec<Query>,
        operators: Vec<LogicalOp>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupByToken {
    SessionId,
    Tag(String),
}

impl GroupByToken {
    /// Human-readable column name used in group headers and drill-down keys.
    pub fn header(&self) -> String {
        match self {
            GroupByToken::SessionId => "session_id".to_string(),
            GroupByToken::Tag(name) => format!("#\"{name}\""),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupByClause {
    pub tokens: Vec<GroupByToken>,
}

/// Outcome of parsing one query string: the main filter plus an optional
/// trailing `group_by(...)` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    pub main: Query,
    pub group_by: Option<GroupByClause>,
}

impl ParsedQuery {
    pub fn is_grouping(&self) -> bool {
        self.group_by.is_some()
    }
}
