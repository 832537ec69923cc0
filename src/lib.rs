//! Predicate - embeddable interpreter for small predicate languages
//!
//! A host describes its language in a [`Definition`]: which operators,
//! functions and methods exist, and how identifiers and index expressions are
//! resolved. [`Parser::parse`] then turns expressions such as
//! `latency() > 40 || errorRate() > 0.5` into a [`Value`], typically a
//! closure the host invokes later against concrete data.
//!
//! ```
//! use std::sync::Arc;
//! use predicate::{Callable, Definition, Operators, Parser};
//!
//! type NumberPredicate = Arc<dyn Fn(i64) -> bool + Send + Sync>;
//!
//! fn divisible_by(divisor: i64) -> NumberPredicate {
//!     Arc::new(move |v| v % divisor == 0)
//! }
//!
//! fn number_and(a: NumberPredicate, b: NumberPredicate) -> NumberPredicate {
//!     Arc::new(move |v| a(v) && b(v))
//! }
//!
//! let parser = Parser::new(
//!     Definition::new()
//!         .with_operators(Operators {
//!             and: Some(Callable::new(number_and)),
//!             ..Default::default()
//!         })
//!         .with_function("DivisibleBy", Callable::new(divisible_by)),
//! );
//!
//! let value = parser.parse("DivisibleBy(2) && DivisibleBy(3)").unwrap();
//! let predicate = value.downcast_ref::<NumberPredicate>().unwrap();
//! assert!(!predicate(2));
//! assert!(!predicate(3));
//! assert!(predicate(6));
//! ```

pub mod ast;
pub mod builtins;
pub mod callable;
pub mod config;
pub mod definition;
pub mod error;
pub mod evaluator;
pub mod fields;
pub mod lexer;
pub mod token_parser;
pub mod value;

use std::sync::Arc;

use tracing::debug;

// Re-export commonly used types
pub use ast::Expr;
pub use callable::{Arity, CallError, Callable, InvocationFault};
pub use config::ParserConfig;
pub use definition::{Definition, IdentifierResolver, Operators, PropertyResolver};
pub use error::{Error, ErrorKind, SyntaxError};
pub use evaluator::Evaluator;
pub use fields::{get_field_by_tag, FieldError, FieldInfo, Record, StructTag};
pub use value::Value;

/// Parses expressions against a fixed [`Definition`]
///
/// Cloning is cheap and clones share the definition, so one parser can be
/// used from many threads at once.
#[derive(Debug, Clone)]
pub struct Parser {
    definition: Arc<Definition>,
    config: ParserConfig,
}

impl Parser {
    pub fn new(definition: Definition) -> Self {
        Self::with_config(definition, ParserConfig::default())
    }

    pub fn with_config(definition: Definition, config: ParserConfig) -> Self {
        Self {
            definition: Arc::new(definition),
            config,
        }
    }

    pub fn definition(&self) -> &Definition {
        &self.definition
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse and evaluate `source`
    pub fn parse(&self, source: &str) -> Result<Value, Error> {
        debug!(source, "parsing predicate");

        let expr = token_parser::parse_with_depth(source, self.config.max_depth)?;
        let result = Evaluator::new(&self.definition).evaluate_expression(&expr);

        if let Err(err) = &result {
            debug!(source, kind = ?err.kind(), error = %err, "predicate evaluation failed");
        }
        result
    }
}

/// Parse `source` into an expression tree without evaluating it
pub fn parse_expression(source: &str) -> Result<Expr, SyntaxError> {
    token_parser::parse(source)
}
