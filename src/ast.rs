//! Abstract Syntax Tree definitions for predicate expressions
//!
//! Trees are produced by [`crate::token_parser`] once per parse call and
//! consumed by the evaluator. They are never mutated after construction.

use std::fmt;

/// Source location information
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
    pub length: usize,
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Binary operation: `left op right`
    Binary {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
        span: SourceSpan,
    },

    /// Unary operation: `!operand`
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
        span: SourceSpan,
    },

    /// Literal with its raw source text
    Literal {
        kind: LiteralKind,
        text: String,
        span: SourceSpan,
    },

    /// Bare identifier: `name`
    Identifier { name: String, span: SourceSpan },

    /// Field selection: `target.field`
    ///
    /// Nested selectors over an identifier root form a dotted chain such as
    /// `a.b.c`.
    Selector {
        target: Box<Expr>,
        field: String,
        span: SourceSpan,
    },

    /// Index access: `container[key]`
    Index {
        container: Box<Expr>,
        key: Box<Expr>,
        span: SourceSpan,
    },

    /// Slice access: `container[low:high]`
    Slice {
        container: Box<Expr>,
        low: Option<Box<Expr>>,
        high: Option<Box<Expr>>,
        span: SourceSpan,
    },

    /// Call: `callee(args...)`
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: SourceSpan,
    },

    /// Parenthesized expression: `(inner)`
    Paren { inner: Box<Expr>, span: SourceSpan },
}

impl Expr {
    /// Source location of this node
    pub fn span(&self) -> SourceSpan {
        match self {
            Expr::Binary { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Literal { span, .. }
            | Expr::Identifier { span, .. }
            | Expr::Selector { span, .. }
            | Expr::Index { span, .. }
            | Expr::Slice { span, .. }
            | Expr::Call { span, .. }
            | Expr::Paren { span, .. } => *span,
        }
    }

    /// Short human readable name of the node kind
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Binary { .. } => "binary expression",
            Expr::Unary { .. } => "unary expression",
            Expr::Literal { .. } => "literal",
            Expr::Identifier { .. } => "identifier",
            Expr::Selector { .. } => "selector expression",
            Expr::Index { .. } => "index expression",
            Expr::Slice { .. } => "slice expression",
            Expr::Call { .. } => "call expression",
            Expr::Paren { .. } => "parenthesized expression",
        }
    }
}

/// Literal kinds recognized by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Integer,
    Float,
    String,
    Char,
}

impl fmt::Display for LiteralKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LiteralKind::Integer => write!(f, "integer"),
            LiteralKind::Float => write!(f, "float"),
            LiteralKind::String => write!(f, "string"),
            LiteralKind::Char => write!(f, "character"),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    // Logical
    And,
    Or,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,

    // Arithmetic and shifts; parsed so they can be rejected precisely
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    ShiftLeft,
    ShiftRight,
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let symbol = match self {
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessThanOrEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterThanOrEqual => ">=",
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::ShiftLeft => "<<",
            BinaryOperator::ShiftRight => ">>",
        };
        write!(f, "{}", symbol)
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
}

impl fmt::Display for UnaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UnaryOperator::Not => write!(f, "!"),
            UnaryOperator::Negate => write!(f, "-"),
            UnaryOperator::Plus => write!(f, "+"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Binary {
                op, left, right, ..
            } => write!(f, "{} {} {}", left, op, right),
            Expr::Unary { op, operand, .. } => write!(f, "{}{}", op, operand),
            Expr::Literal { text, .. } => write!(f, "{}", text),
            Expr::Identifier { name, .. } => write!(f, "{}", name),
            Expr::Selector { target, field, .. } => write!(f, "{}.{}", target, field),
            Expr::Index { container, key, .. } => write!(f, "{}[{}]", container, key),
            Expr::Slice {
                container,
                low,
                high,
                ..
            } => {
                write!(f, "{}[", container)?;
                if let Some(low) = low {
                    write!(f, "{}", low)?;
                }
                write!(f, ":")?;
                if let Some(high) = high {
                    write!(f, "{}", high)?;
                }
                write!(f, "]")
            }
            Expr::Call { callee, args, .. } => {
                write!(f, "{}(", callee)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
            Expr::Paren { inner, .. } => write!(f, "({})", inner),
        }
    }
}
