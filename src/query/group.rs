//! Group identifier codec.
//!
//! A group row returned by the grouping endpoint is addressed by a JSON
//! tuple `[keys, values]`: the human-readable column names in token order
//! (`session_id` or `#"name"`) and the selected value per column, null
//! selecting valueless labels. Clients pass it URL-encoded in the `group`
//! query parameter when drilling into one group's testcases.

use thiserror::Error;

use super::ast::GroupByToken;
use super::sql::GroupColumnFilter;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct GroupIdentifierError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIdentifier {
    pub keys: Vec<String>,
    pub values: Vec<Option<String>>,
}

impl GroupIdentifier {
    /// Parse and validate the JSON wire form.
    pub fn parse(raw: &str) -> Result<Self, GroupIdentifierError> {
        let parsed: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| GroupIdentifierError(e.to_string()))?;

        let parts = parsed
            .as_array()
            .filter(|parts| parts.len() == 2)
            .ok_or_else(|| {
                GroupIdentifierError(
                    "Group identifier must be an array with exactly 2 elements".to_string(),
                )
            })?;

        let (raw_keys, raw_values) = match (parts[0].as_array(), parts[1].as_array()) {
            (Some(keys), Some(values)) => (keys, values),
            _ => {
                return Err(GroupIdentifierError(
                    "Both elements must be arrays".to_string(),
                ))
            }
        };

        if raw_keys.len() != raw_values.len() {
            return Err(GroupIdentifierError(
                "Group keys and values must have the same length".to_string(),
            ));
        }

        let keys = raw_keys
            .iter()
            .map(|key| key.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| {
                GroupIdentifierError("All group keys must be strings".to_string())
            })?;

        let mut values = Vec::with_capacity(raw_values.len());
        for value in raw_values {
            match value {
                serde_json::Value::Null => values.push(None),
                serde_json::Value::String(s) => values.push(Some(s.clone())),
                _ => {
                    return Err(GroupIdentifierError(
                        "All group values must be strings or null".to_string(),
                    ))
                }
            }
        }

        Ok(GroupIdentifier { keys, values })
    }

    /// Pair the identifier's values with the grouping tokens that produced
    /// the columns. The caller must have checked `keys` against
    /// [`expected_keys`] first.
    pub fn column_filters(&self, tokens: &[GroupByToken]) -> Vec<GroupColumnFilter> {
        tokens
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

/// The column names a grouping query exposes, in token order.
pub fn expected_keys(tokens: &[GroupByToken]) -> Vec<String> {
    tokens.iter().map(GroupByToken::header).collect()
}
