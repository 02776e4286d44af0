//! Compilation of parsed queries into parameterized SQL.
//!
//! Everything is emitted through [`sqlx::QueryBuilder`] so user-supplied
//! values only ever travel as bind parameters. Label joins introduced for
//! grouping and drill-down filtering are aliased `label_<i>` by group-by
//! token index, so two compilations of the same query agree on names.

use sqlx::{QueryBuilder, Sqlite};

use super::ast::{Comparison, GroupByToken, LogicalOp, Query};

/// Append the WHERE fragment for a filter expression.
///
/// Compound chains fold strictly left-associatively with AND and OR at
/// equal precedence: `a or b and c` emits `((a OR b) AND c)`.
pub fn push_query_conditions(builder: &mut QueryBuilder<'_, Sqlite>, query: &Query) {
    match query {
        Query::Empty => {
            builder.push("1 = 1");
        }
        Query::Session { session_id, op } => {
            builder.push("testcases.session_id ");
            push_cmp(builder, *op);
            builder.push_bind(session_id.to_string());
        }
        Query::Id { id, op } => {
            builder.push("testcases.id ");
            push_cmp(builder, *op);
            builder.push_bind(id.to_string());
        }
        Query::Name { name, op } => {
            builder.push("testcases.name ");
            push_cmp(builder, *op);
            builder.push_bind(name.clone());
        }
        Query::Classname { classname, op } => {
            builder.push("testcases.classname ");
            push_cmp(builder, *op);
            builder.push_bind(classname.clone());
        }
        Query::Testsuite { testsuite, op } => {
            builder.push("testcases.testsuite ");
            push_cmp(builder, *op);
            builder.push_bind(testsuite.clone());
        }
        Query::File { file, op } => {
            builder.push("testcases.file ");
            push_cmp(builder, *op);
            builder.push_bind(file.clone());
        }
        Query::Status { status, op } => {
            builder.push("testcases.status ");
            push_cmp(builder, *op);
            match status {
                Some(status) => builder.push_bind(status.code()),
                // The empty status string matches no stored code.
                None => builder.push_bind(String::new()),
            };
        }
        Query::Tag { tag, op } => {
            builder.push("testcases.session_id ");
            push_membership(builder, *op);
            builder.push("(SELECT session_id FROM labels WHERE key = ");
            builder.push_bind(tag.clone());
            builder.push(")");
        }
        Query::TagValue { tag, value, op } => {
            builder.push("testcases.session_id ");
            push_membership(builder, *op);
            builder.push("(SELECT session_id FROM labels WHERE key = ");
            builder.push_bind(tag.clone());
            builder.push(" AND value = ");
            builder.push_bind(value.clone());
            builder.push(")");
        }
        Query::Compound { queries, operators } => {
            for _ in 1..queries.len() {
                builder.push("(");
            }
            let mut parts = queries.iter();
            if let Some(first) = parts.next() {
                push_query_conditions(builder, first);
            }
            for (query, op) in parts.zip(operators.iter()) {
                builder.push(match op {
                    LogicalOp::And => " AND ",
                    LogicalOp::Or => " OR ",
                });
                push_query_conditions(builder, query);
                builder.push(")");
            }
        }
    }
}

/// Append the JOINs a grouping query needs, one per token in order:
/// `sessions` for the session column, a fresh `labels` alias per tag.
pub fn push_group_joins(builder: &mut QueryBuilder<'_, Sqlite>, tokens: &[GroupByToken]) {
    for (i, token) in tokens.iter().enumerate() {
        match token {
            GroupByToken::SessionId => {
                builder.push(" JOIN sessions ON testcases.session_id = sessions.id");
            }
            GroupByToken::Tag(name) => {
                builder.push(format!(
                    " JOIN labels AS label_{i} ON testcases.session_id = label_{i}.session_id AND label_{i}.key = "
                ));
                builder.push_bind(name.clone());
            }
        }
    }
}

/// Append the group column projection, aliased `group_<i>` in token order.
pub fn push_group_projection(builder: &mut QueryBuilder<'_, Sqlite>, tokens: &[GroupByToken]) {
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        match token {
            GroupByToken::SessionId => builder.push(format!("sessions.id AS group_{i}")),
            GroupByToken::Tag(_) => builder.push(format!("label_{i}.value AS group_{i}")),
        };
    }
}

/// Comma-separated `group_<i>` list for GROUP BY / ORDER BY clauses.
pub fn group_column_list(tokens: &[GroupByToken]) -> String {
    (0..tokens.len())
        .map(|i| format!("group_{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One drill-down column filter: the token that produced the column and
/// the value the caller selected (None picks valueless labels).
pub type GroupColumnFilter = (GroupByToken, Option<String>);

/// Append the JOINs for a drill-down filter. The selected value for a tag
/// column is folded into the join condition (`IS NULL` for valueless
/// labels); session-column equality goes into the WHERE clause via
/// [`push_drilldown_conditions`].
pub fn push_drilldown_joins(builder: &mut QueryBuilder<'_, Sqlite>, filters: &[GroupColumnFilter]) {
    for (i, (token, value)) in filters.iter().enumerate() {
        match token {
            GroupByToken::SessionId => {
                builder.push(" JOIN sessions ON testcases.session_id = sessions.id");
            }
            GroupByToken::Tag(name) => {
                builder.push(format!(
                    " JOIN labels AS label_{i} ON testcases.session_id = label_{i}.session_id AND label_{i}.key = "
                ));
                builder.push_bind(name.clone());
                match value {
                    Some(value) => {
                        builder.push(format!(" AND label_{i}.value = "));
                        builder.push_bind(value.clone());
                    }
                    None => {
                        builder.push(format!(" AND label_{i}.value IS NULL"));
                    }
                }
            }
        }
    }
}

/// Append the WHERE conditions (`AND`-prefixed) for the session columns of
/// a drill-down filter.
pub fn push_drilldown_conditions(
    builder: &mut QueryBuilder<'_, Sqlite>,
    filters: &[GroupColumnFilter],
) {
    for (token, value) in filters {
        if let GroupByToken::SessionId = token {
            match value {
                Some(value) => {
                    builder.push(" AND sessions.id = ");
                    builder.push_bind(value.clone());
                }
                None => {
                    builder.push(" AND sessions.id IS NULL");
                }
            }
        }
    }
}

fn push_cmp(builder: &mut QueryBuilder<'_, Sqlite>, op: Comparison) {
    builder.push(match op {
        Comparison::Equals => "= ",
        Comparison::NotEquals => "!= ",
    });
}

fn push_membership(builder: &mut QueryBuilder<'_, Sqlite>, op: Comparison) {
    builder.push(match op {
        Comparison::Equals => "IN ",
        Comparison::NotEquals => "NOT IN ",
    });
}
