//! Evaluator for predicate expressions - reduces a tree into a value by
//! dispatching to the definition's operators, functions and resolvers

use tracing::trace;

use crate::ast::{Expr, LiteralKind};
use crate::callable::{invoke, Callable};
use crate::definition::Definition;
use crate::error::Error;
use crate::lexer;
use crate::value::Value;

/// A callee resolved from the function part of a call expression
struct Callee<'e> {
    name: String,
    callable: Callable,
    /// Receiver of a method call, evaluated before the declared arguments
    receiver: Option<&'e Expr>,
}

/// Evaluator context
pub struct Evaluator<'d> {
    definition: &'d Definition,
}

impl<'d> Evaluator<'d> {
    pub fn new(definition: &'d Definition) -> Self {
        Self { definition }
    }

    /// Evaluate an expression
    pub fn evaluate_expression(&self, expr: &Expr) -> Result<Value, Error> {
        match expr {
            Expr::Binary {
                op, left, right, ..
            } => {
                // Both sides are always evaluated, including for && and ||
                let left = self.evaluate_expression(left)?;
                let right = self.evaluate_expression(right)?;

                let callable = self
                    .definition
                    .operators
                    .binary(*op)
                    .ok_or_else(|| Error::UndefinedOperator(op.to_string()))?;
                invoke(&op.to_string(), callable, vec![left, right])
            }

            Expr::Unary { op, operand, .. } => {
                let callable = self
                    .definition
                    .operators
                    .unary(*op)
                    .ok_or_else(|| Error::UndefinedOperator(op.to_string()))?;
                let operand = self.evaluate_expression(operand)?;
                invoke(&op.to_string(), callable, vec![operand])
            }

            Expr::Paren { inner, .. } => self.evaluate_expression(inner),

            Expr::Literal { kind, text, .. } => literal_to_value(*kind, text),

            Expr::Index { container, key, .. } => {
                let resolver = self
                    .definition
                    .property
                    .as_ref()
                    .ok_or(Error::PropertyUnsupported)?;

                let container = self.evaluate_expression(container)?;
                let key = self.evaluate_expression(key)?;

                resolver(container, key).map_err(|source| Error::Property { source })
            }

            Expr::Identifier { .. } | Expr::Selector { .. } => {
                let chain = selector_chain(expr)?;
                self.resolve_identifier(chain)
            }

            Expr::Call { callee, args, .. } => {
                let callee = self.resolve_callee(callee)?;

                let mut values = Vec::with_capacity(args.len() + 1);
                if let Some(receiver) = callee.receiver {
                    values.push(self.evaluate_expression(receiver)?);
                }
                for arg in args {
                    values.push(self.evaluate_expression(arg)?);
                }

                trace!(callee = %callee.name, args = values.len(), "dispatching call");
                invoke(&callee.name, &callee.callable, values)
            }

            Expr::Slice { .. } => Err(Error::UnsupportedNode(expr.kind_name().to_string())),
        }
    }

    fn resolve_identifier(&self, chain: Vec<String>) -> Result<Value, Error> {
        let selector = chain.join(".");
        let resolver = self
            .definition
            .identifier
            .as_ref()
            .ok_or_else(|| Error::UndefinedIdentifier(selector.clone()))?;

        trace!(%selector, "resolving identifier");
        resolver(&chain).map_err(|source| Error::Identifier { selector, source })
    }

    /// Find the callable for the function part of a call
    ///
    /// `name(...)` is a free function. `x.name(...)` is a method when one
    /// named `name` is registered, otherwise `x` must be a bare identifier
    /// and `x.name` a qualified function.
    fn resolve_callee<'e>(&self, callee: &'e Expr) -> Result<Callee<'e>, Error> {
        match callee {
            Expr::Identifier { name, .. } => Ok(Callee {
                callable: self.function(name)?,
                name: name.clone(),
                receiver: None,
            }),

            Expr::Selector { target, field, .. } => {
                if let Some(method) = self.definition.methods.get(field) {
                    return Ok(Callee {
                        name: field.clone(),
                        callable: method.clone(),
                        receiver: Some(target.as_ref()),
                    });
                }

                match target.as_ref() {
                    Expr::Identifier { name: module, .. } => {
                        let name = format!("{}.{}", module, field);
                        Ok(Callee {
                            callable: self.function(&name)?,
                            name,
                            receiver: None,
                        })
                    }
                    other => Err(Error::UnsupportedSelector(format!(
                        "expected selector identifier, got {}",
                        other.kind_name()
                    ))),
                }
            }

            other => Err(Error::UnsupportedNode(format!(
                "calling a {}",
                other.kind_name()
            ))),
        }
    }

    fn function(&self, name: &str) -> Result<Callable, Error> {
        self.definition
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UndefinedFunction(name.to_string()))
    }
}

/// Collect `a.b.c` into `["a", "b", "c"]`
fn selector_chain(expr: &Expr) -> Result<Vec<String>, Error> {
    let mut fields = Vec::new();
    let mut current = expr;

    loop {
        match current {
            Expr::Selector { target, field, .. } => {
                fields.push(field.clone());
                current = target;
            }
            Expr::Identifier { name, .. } => {
                fields.push(name.clone());
                fields.reverse();
                return Ok(fields);
            }
            other => {
                return Err(Error::UnsupportedSelector(format!(
                    "selector over a {}",
                    other.kind_name()
                )))
            }
        }
    }
}

fn literal_to_value(kind: LiteralKind, text: &str) -> Result<Value, Error> {
    let parse_error = |reason: String| Error::LiteralParse {
        text: text.to_string(),
        reason,
    };

    match kind {
        LiteralKind::Float => match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Value::new(v)),
            Ok(_) => Err(parse_error("value out of range".to_string())),
            Err(e) => Err(parse_error(e.to_string())),
        },
        LiteralKind::Integer => text
            .parse::<i64>()
            .map(Value::new)
            .map_err(|e| parse_error(e.to_string())),
        LiteralKind::String => lexer::unquote(text).map(Value::new).map_err(parse_error),
        LiteralKind::Char => Err(Error::UnsupportedNode(format!("{} literal", kind))),
    }
}
