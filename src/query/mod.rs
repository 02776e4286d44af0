//! The testcase query language.
//!
//! A query is a chain of predicates over testcases, optionally followed
//! by a `group_by(...)` clause:
//!
//! ```text
//! session_id = "550e8400-e29b-41d4-a716-446655440000" and #"env" = "prod"
//! status != "pass" or #"flaky" group_by(session_id, #"env")
//! ```
//!
//! Predicates compare the testcase columns (`session_id`, `id`, `name`,
//! `classname`, `testsuite`, `file`, `status`) with `=` / `!=`, or test
//! session tags: `#"k"` is tag presence, `#"k" = "v"` a tag value match.
//! Tag predicates are *session-scoped*: `!#"k"` selects testcases whose
//! session has no `k` label at all, not testcases missing the tag
//! themselves. Keywords and `and`/`or` are case-insensitive, and the two
//! logical operators share one precedence level, folding strictly left to
//! right: `a or b and c` means `(a or b) and c`.
//!
//! Submodules: the AST, the pest-based parser, SQL compilation and the
//! group identifier codec used for drill-down.

pub mod ast;
pub mod group;
pub mod parser;
pub mod sql;

pub use ast::{Comparison, GroupByClause, GroupByToken, LogicalOp, ParsedQuery, Query};
pub use group::{expected_keys, GroupIdentifier, GroupIdentifierError};
pub use parser::{QueryParseError, QueryParser};
