//! The caller-supplied environment of an expression language
//!
//! A [`Definition`] lists every operator, function and method the language
//! understands, together with the resolvers for identifiers (`a.b.c`) and
//! index expressions (`m["key"]`). Anything not listed is an error at parse
//! time. Lookups are exact and case-sensitive.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::callable::Callable;
use crate::value::Value;

/// Resolves a selector chain such as `["user", "spec", "roles"]`
pub type IdentifierResolver = dyn Fn(&[String]) -> anyhow::Result<Value> + Send + Sync;

/// Resolves `container[key]`
pub type PropertyResolver = dyn Fn(Value, Value) -> anyhow::Result<Value> + Send + Sync;

/// Implementations of the built-in operators
///
/// Comparison and logical operators are all binary; `not` receives a single
/// operand. Absent entries make the operator unsupported.
#[derive(Debug, Clone, Default)]
pub struct Operators {
    pub eq: Option<Callable>,
    pub neq: Option<Callable>,

    pub lt: Option<Callable>,
    pub gt: Option<Callable>,

    pub le: Option<Callable>,
    pub ge: Option<Callable>,

    pub or: Option<Callable>,
    pub and: Option<Callable>,
    pub not: Option<Callable>,
}

impl Operators {
    /// The implementation of a binary operator, if registered
    pub fn binary(&self, op: BinaryOperator) -> Option<&Callable> {
        match op {
            BinaryOperator::Equal => self.eq.as_ref(),
            BinaryOperator::NotEqual => self.neq.as_ref(),
            BinaryOperator::LessThan => self.lt.as_ref(),
            BinaryOperator::GreaterThan => self.gt.as_ref(),
            BinaryOperator::LessThanOrEqual => self.le.as_ref(),
            BinaryOperator::GreaterThanOrEqual => self.ge.as_ref(),
            BinaryOperator::Or => self.or.as_ref(),
            BinaryOperator::And => self.and.as_ref(),
            BinaryOperator::Add
            | BinaryOperator::Subtract
            | BinaryOperator::Multiply
            | BinaryOperator::Divide
            | BinaryOperator::Modulo
            | BinaryOperator::ShiftLeft
            | BinaryOperator::ShiftRight => None,
        }
    }

    /// The implementation of a unary operator, if registered
    pub fn unary(&self, op: UnaryOperator) -> Option<&Callable> {
        match op {
            UnaryOperator::Not => self.not.as_ref(),
            UnaryOperator::Negate | UnaryOperator::Plus => None,
        }
    }
}

/// Operators, functions, methods and resolvers of one expression language
#[derive(Clone, Default)]
pub struct Definition {
    pub operators: Operators,
    /// Free functions by name; `module.Name` keys are reached through
    /// `module.Name(...)` calls
    pub functions: HashMap<String, Callable>,
    /// Methods by name; `x.name(...)` calls `name(x, ...)`
    pub methods: HashMap<String, Callable>,
    pub identifier: Option<Arc<IdentifierResolver>>,
    pub property: Option<Arc<PropertyResolver>>,
}

impl Definition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operators(mut self, operators: Operators) -> Self {
        self.operators = operators;
        self
    }

    pub fn with_function(mut self, name: impl Into<String>, callable: Callable) -> Self {
        self.functions.insert(name.into(), callable);
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, callable: Callable) -> Self {
        self.methods.insert(name.into(), callable);
        self
    }

    pub fn with_identifier<F>(mut self, resolver: F) -> Self
    where
        F: Fn(&[String]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.identifier = Some(Arc::new(resolver));
        self
    }

    pub fn with_property<F>(mut self, resolver: F) -> Self
    where
        F: Fn(Value, Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.property = Some(Arc::new(resolver));
        self
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut functions: Vec<_> = self.functions.keys().collect();
        functions.sort();
        let mut methods: Vec<_> = self.methods.keys().collect();
        methods.sort();

        f.debug_struct("Definition")
            .field("operators", &self.operators)
            .field("functions", &functions)
            .field("methods", &methods)
            .field("identifier", &self.identifier.is_some())
            .field("property", &self.property.is_some())
            .finish()
    }
}
