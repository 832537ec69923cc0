//! Parser configuration

use serde::{Deserialize, Serialize};

/// Settings applied to every [`crate::Parser::parse`] call
///
/// Deserializable so hosts can embed it in their own configuration files:
///
/// ```
/// let config: predicate::ParserConfig = serde_json::from_str(r#"{"max_depth": 64}"#).unwrap();
/// assert_eq!(config.max_depth, Some(64));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Deepest nesting accepted by the syntax parser, counting parentheses,
    /// calls, indexing, unary operators, chained binary operators and
    /// selector steps; unbounded when `None`
    pub max_depth: Option<usize>,
}

impl ParserConfig {
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }
}
