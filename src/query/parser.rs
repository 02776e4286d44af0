//! Query string parsing.
//!
//! The grammar lives in `grammar.pest`; this module turns the parse tree
//! into [`ParsedQuery`] in a single pass, applying the semantic checks
//! (UUID fields, non-empty names and tags, the status vocabulary,
//! duplicate group-by tokens). There is no error recovery: any failure is
//! reported as one [`QueryParseError`].

use std::collections::HashSet;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;
use uuid::Uuid;

use super::ast::{Comparison, GroupByClause, GroupByToken, LogicalOp, ParsedQuery, Query};
use crate::storage::models::TestcaseStatus;

#[derive(Parser)]
#[grammar = "query/grammar.pest"]
struct DslParser;

#[derive(Debug, Error)]
#[error("Failed to parse query '{query}': {message}")]
pub struct QueryParseError {
    pub query: String,
    pub message: String,
}

pub struct QueryParser;

impl QueryParser {
    /// Parse a query string. Whitespace-only input yields an empty query.
    pub fn parse(input: &str) -> Result<ParsedQuery, QueryParseError> {
        let wrap = |message: String| QueryParseError {
            query: input.to_string(),
            message,
        };

        let mut pairs = DslParser::parse(Rule::query, input.trim())
            .map_err(|e| wrap(e.to_string()))?;
        let query_pair = pairs
            .next()
            .ok_or_else(|| wrap("empty parse tree".to_string()))?;

        let mut main = Query::Empty;
        let mut group_by = None;
        for pair in query_pair.into_inner() {
            match pair.as_rule() {
                Rule::compound_query => main = build_compound(pair).map_err(&wrap)?,
                Rule::group_by => group_by = Some(build_group_by(pair).map_err(&wrap)?),
                Rule::EOI => {}
                rule => return Err(wrap(format!("unexpected rule {rule:?}"))),
            }
        }

        Ok(ParsedQuery { main, group_by })
    }
}

fn build_compound(pair: Pair<'_, Rule>) -> Result<Query, String> {
    let mut queries = Vec::new();
    let mut operators = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::and_op => operators.push(LogicalOp::And),
            Rule::or_op => operators.push(LogicalOp::Or),
            _ => queries.push(build_atomic(inner)?),
        }
    }

    // A single atom collapses to itself.
    if queries.len() == 1 {
        return Ok(queries.remove(0));
    }
    if operators.len() != queries.len() - 1 {
        return Err(format!(
            "expected {} operators for {} queries, got {}",
            queries.len() - 1,
            queries.len(),
            operators.len()
        ));
    }
    Ok(Query::Compound { queries, operators })
}

fn build_atomic(pair: Pair<'_, Rule>) -> Result<Query, String> {
    match pair.as_rule() {
        Rule::session_query => {
            let (op, value) = field_parts(pair)?;
            if value.is_empty() {
                return Err("session_id cannot be empty".to_string());
            }
            let session_id = Uuid::parse_str(&value)
                .map_err(|_| format!("Invalid UUID format for session_id: {value}"))?;
            Ok(Query::Session { session_id, op })
        }
        Rule::id_query => {
            let (op, value) = field_parts(pair)?;
            if value.is_empty() {
                return Err("id cannot be empty".to_string());
            }
            let id = Uuid::parse_str(&value)
                .map_err(|_| format!("Invalid UUID format for id: {value}"))?;
            Ok(Query::Id { id, op })
        }
        Rule::name_query => {
            let (op, name) = field_parts(pair)?;
            if name.is_empty() {
                return Err("Name must be non-empty".to_string());
            }
            Ok(Query::Name { name, op })
        }
        Rule::classname_query => {
            let (op, classname) = field_parts(pair)?;
            Ok(Query::Classname { classname, op })
        }
        Rule::testsuite_query => {
            let (op, testsuite) = field_parts(pair)?;
            Ok(Query::Testsuite { testsuite, op })
        }
        Rule::file_query => {
            let (op, file) = field_parts(pair)?;
            Ok(Query::File { file, op })
        }
        Rule::status_query => {
            let (op, value) = field_parts(pair)?;
            let status = if value.is_empty() {
                None
            } else {
                Some(TestcaseStatus::from_wire(&value).ok_or_else(|| {
                    format!("Invalid status '{value}'. Must be one of: pass, fail, error, skip")
                })?)
            };
            Ok(Query::Status { status, op })
        }
        Rule::tag_query => {
            let tag = first_quoted(pair)?;
            if tag.is_empty() {
                return Err("Tag must be non-empty".to_string());
            }
            Ok(Query::Tag {
                tag,
                op: Comparison::Equals,
            })
        }
        Rule::negated_tag_query => {
            let tag = first_quoted(pair)?;
            if tag.is_empty() {
                return Err("Tag must be non-empty".to_string());
            }
            Ok(Query::Tag {
                tag,
                op: Comparison::NotEquals,
            })
        }
        Rule::tag_value_query => {
            let mut inner = pair.into_inner();
            let tag = inner
                .next()
                .map(quoted_text)
                .ok_or_else(malformed)?;
            if tag.is_empty() {
                return Err("Tag must be non-empty".to_string());
            }
            let op = inner.next().map(|p| comparison(&p)).ok_or_else(malformed)?;
            let value = inner.next().map(quoted_text).ok_or_else(malformed)?;
            Ok(Query::TagValue { tag, value, op })
        }
        rule => Err(format!("unexpected rule {rule:?}")),
    }
}

fn build_group_by(pair: Pair<'_, Rule>) -> Result<GroupByClause, String> {
    let mut tokens = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::session_id_token => tokens.push(GroupByToken::SessionId),
            Rule::tag_token => {
                let tag = first_quoted(inner)?;
                if tag.is_empty() {
                    return Err("TAG tokens must have a non-empty value".to_string());
                }
                tokens.push(GroupByToken::Tag(tag));
            }
            rule => return Err(format!("unexpected rule {rule:?}")),
        }
    }

    let mut seen = HashSet::new();
    for token in &tokens {
        if !seen.insert(token.clone()) {
            return Err(format!("Duplicate group_by token: {}", token.header()));
        }
    }

    Ok(GroupByClause { tokens })
}

/// `<keyword> <cmp> <quoted>` predicates: extract the operator and value.
fn field_parts(pair: Pair<'_, Rule>) -> Result<(Comparison, String), String> {
    let mut inner = pair.into_inner();
    let op = inner.next().map(|p| comparison(&p)).ok_or_else(malformed)?;
    let value = inner.next().map(quoted_text).ok_or_else(malformed)?;
    Ok((op, value))
}

fn first_quoted(pair: Pair<'_, Rule>) -> Result<String, String> {
    pair.into_inner()
        .next()
        .map(quoted_text)
        .ok_or_else(malformed)
}

fn comparison(pair: &Pair<'_, Rule>) -> Comparison {
    if pair.as_str() == "!=" {
        Comparison::NotEquals
    } else {
        Comparison::Equals
    }
}

fn quoted_text(pair: Pair<'_, Rule>) -> String {
    pair.into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default()
}

fn malformed() -> String {
    "malformed predicate".to_string()
}
