//! Built-in predicate helpers
//!
//! Most predicate languages built on this crate end up with the same small
//! toolkit: deferred boolean predicates combined with `&&`, `||` and `!`,
//! string and string-list comparisons, and indexing into string maps. This
//! module provides those pieces so a definition can be assembled from them.
//!
//! ```
//! use predicate::builtins::{self, BoolPredicate};
//! use predicate::{Definition, Parser, Value};
//!
//! let definition = builtins::register(Definition::new())
//!     .with_identifier(|selector| Ok(Value::new(selector.join("."))));
//! let parser = Parser::new(definition);
//!
//! let value = parser.parse(r#"equals(user.name, "user.name") && !equals("a", "b")"#).unwrap();
//! let predicate = value.downcast_ref::<BoolPredicate>().unwrap();
//! assert!(predicate());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::callable::Callable;
use crate::definition::{Definition, Operators};
use crate::value::Value;

/// A deferred boolean, evaluated each time it is called
pub type BoolPredicate = Arc<dyn Fn() -> bool + Send + Sync>;

/// Register the boolean operators and the `equals` / `contains` functions,
/// plus [`get_string_map_value`] as the property resolver
pub fn register(definition: Definition) -> Definition {
    definition
        .with_operators(operators())
        .with_function("equals", Callable::new(equals))
        .with_function("contains", Callable::new(contains))
        .with_property(get_string_map_value)
}

/// `&&`, `||` and `!` over [`BoolPredicate`], with `==` and `!=` as
/// [`equals`] and its negation
pub fn operators() -> Operators {
    Operators {
        and: Some(Callable::new(and)),
        or: Some(Callable::new(or)),
        not: Some(Callable::new(not)),
        eq: Some(Callable::new(equals)),
        neq: Some(Callable::new(|a: Value, b: Value| not(equals(a, b)))),
        ..Default::default()
    }
}

/// Compares strings or string lists; values of any other type are unequal
pub fn equals(a: Value, b: Value) -> BoolPredicate {
    Arc::new(move || {
        if let Some(a) = a.downcast_ref::<String>() {
            return b.downcast_ref::<String>() == Some(a);
        }
        if let Some(a) = a.downcast_ref::<Vec<String>>() {
            return b.downcast_ref::<Vec<String>>() == Some(a);
        }
        false
    })
}

/// Whether the string list `list` contains the string `item`
pub fn contains(list: Value, item: Value) -> BoolPredicate {
    Arc::new(move || {
        match (list.downcast_ref::<Vec<String>>(), item.downcast_ref::<String>()) {
            (Some(list), Some(item)) => list.contains(item),
            _ => false,
        }
    })
}

pub fn and(a: BoolPredicate, b: BoolPredicate) -> BoolPredicate {
    Arc::new(move || a() && b())
}

pub fn or(a: BoolPredicate, b: BoolPredicate) -> BoolPredicate {
    Arc::new(move || a() || b())
}

pub fn not(a: BoolPredicate) -> BoolPredicate {
    Arc::new(move || !a())
}

/// Property resolver over `HashMap<String, String>` and
/// `HashMap<String, Vec<String>>`
///
/// Missing keys yield an empty string or an empty list rather than an error.
pub fn get_string_map_value(map: Value, key: Value) -> Result<Value> {
    let key = key
        .downcast_ref::<String>()
        .ok_or_else(|| anyhow!("only string keys are supported"))?;

    if let Some(map) = map.downcast_ref::<HashMap<String, Vec<String>>>() {
        return Ok(Value::new(map.get(key).cloned().unwrap_or_default()));
    }
    if let Some(map) = map.downcast_ref::<HashMap<String, String>>() {
        return Ok(Value::new(map.get(key).cloned().unwrap_or_default()));
    }

    Err(anyhow!("type {} is not supported", map.type_name()))
}
