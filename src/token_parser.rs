//! Token-based parser for predicate expressions
//!
//! A recursive descent parser that consumes tokens from the lexer and builds
//! an [`Expr`] tree. Precedence, lowest first:
//!
//! 1. `||`
//! 2. `&&`
//! 3. `==` `!=` `<` `<=` `>` `>=`
//! 4. `+` `-`
//! 5. `*` `/` `%` `<<` `>>`
//! 6. unary `!` `-` `+`
//! 7. postfix calls, selectors and index/slice access

use crate::ast::{BinaryOperator, Expr, LiteralKind, SourceSpan, UnaryOperator};
use crate::error::SyntaxError;
use crate::lexer::{Token, TokenKind};

/// Parser that consumes tokens to produce an AST
pub struct TokenParser {
    tokens: Vec<Token>,
    position: usize,
    depth: usize,
    max_depth: Option<usize>,
}

impl TokenParser {
    /// Create a new parser from a token stream
    ///
    /// The stream must end with [`TokenKind::Eof`], as produced by
    /// [`crate::lexer::tokenize`].
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
            max_depth: None,
        }
    }

    /// Limit how deeply expressions nest
    ///
    /// Parentheses, argument lists, index expressions, unary operators,
    /// every folded binary operator and every postfix call, selector or index
    /// step each count as one level while the parser holds them open.
    pub fn with_max_depth(mut self, max_depth: Option<usize>) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Parse a single complete expression, rejecting trailing tokens
    pub fn parse_complete(&mut self) -> Result<Expr, SyntaxError> {
        if self.is_at_end() {
            return Err(self.error_here("expected expression"));
        }

        let expr = self.parse_expression()?;

        if !self.is_at_end() {
            return Err(self.error_here("unexpected token after expression"));
        }

        Ok(expr)
    }

    /// Parse an expression
    fn parse_expression(&mut self) -> Result<Expr, SyntaxError> {
        self.enter()?;
        let expr = self.parse_or();
        self.leave(1);
        expr
    }

    /// Parse or expression
    fn parse_or(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.mark_position();
        let mut left = self.parse_and()?;
        let mut folds = 0;

        while self.check(&TokenKind::OrOr) {
            self.advance();
            self.enter()?;
            folds += 1;
            let right = self.parse_and()?;
            left = Expr::Binary {
                op: BinaryOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        self.leave(folds);
        Ok(left)
    }

    /// Parse and expression
    fn parse_and(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.mark_position();
        let mut left = self.parse_comparison()?;
        let mut folds = 0;

        while self.check(&TokenKind::AndAnd) {
            self.advance();
            self.enter()?;
            folds += 1;
            let right = self.parse_comparison()?;
            left = Expr::Binary {
                op: BinaryOperator::And,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        self.leave(folds);
        Ok(left)
    }

    /// Parse equality and ordering comparisons, which share one precedence level
    fn parse_comparison(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.mark_position();
        let mut left = self.parse_additive()?;
        let mut folds = 0;

        loop {
            let op = match self.current().kind {
                TokenKind::EqualEqual => BinaryOperator::Equal,
                TokenKind::NotEqual => BinaryOperator::NotEqual,
                TokenKind::Less => BinaryOperator::LessThan,
                TokenKind::LessEqual => BinaryOperator::LessThanOrEqual,
                TokenKind::Greater => BinaryOperator::GreaterThan,
                TokenKind::GreaterEqual => BinaryOperator::GreaterThanOrEqual,
                _ => break,
            };
            self.advance();
            self.enter()?;
            folds += 1;
            let right = self.parse_additive()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        self.leave(folds);
        Ok(left)
    }

    /// Parse addition/subtraction
    fn parse_additive(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.mark_position();
        let mut left = self.parse_multiplicative()?;
        let mut folds = 0;

        loop {
            let op = match self.current().kind {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Subtract,
                _ => break,
            };
            self.advance();
            self.enter()?;
            folds += 1;
            let right = self.parse_multiplicative()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        self.leave(folds);
        Ok(left)
    }

    /// Parse multiplication/division/modulo and shifts
    fn parse_multiplicative(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.mark_position();
        let mut left = self.parse_unary()?;
        let mut folds = 0;

        loop {
            let op = match self.current().kind {
                TokenKind::Star => BinaryOperator::Multiply,
                TokenKind::Slash => BinaryOperator::Divide,
                TokenKind::Percent => BinaryOperator::Modulo,
                TokenKind::ShiftLeft => BinaryOperator::ShiftLeft,
                TokenKind::ShiftRight => BinaryOperator::ShiftRight,
                _ => break,
            };
            self.advance();
            self.enter()?;
            folds += 1;
            let right = self.parse_unary()?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: self.span_from(start),
            };
        }

        self.leave(folds);
        Ok(left)
    }

    /// Parse unary expression
    fn parse_unary(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.mark_position();

        let op = match self.current().kind {
            TokenKind::Bang => UnaryOperator::Not,
            TokenKind::Minus => UnaryOperator::Negate,
            TokenKind::Plus => UnaryOperator::Plus,
            _ => return self.parse_postfix(),
        };
        self.advance();

        self.enter()?;
        let operand = self.parse_unary();
        self.leave(1);

        Ok(Expr::Unary {
            op,
            operand: Box::new(operand?),
            span: self.span_from(start),
        })
    }

    /// Parse postfix expressions (calls, selectors, indexing)
    fn parse_postfix(&mut self) -> Result<Expr, SyntaxError> {
        let start = self.mark_position();
        let mut expr = self.parse_primary()?;
        let mut steps = 0;

        loop {
            if matches!(
                self.current().kind,
                TokenKind::LeftParen | TokenKind::Dot | TokenKind::LeftBracket
            ) {
                self.enter()?;
                steps += 1;
            }

            if self.check(&TokenKind::LeftParen) {
                self.advance();
                let args = if !self.check(&TokenKind::RightParen) {
                    self.parse_argument_list()?
                } else {
                    Vec::new()
                };
                self.expect(&TokenKind::RightParen, "')' to close the argument list")?;

                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    span: self.span_from(start),
                };
            } else if self.check(&TokenKind::Dot) {
                self.advance();
                let field = self.parse_identifier()?;
                expr = Expr::Selector {
                    target: Box::new(expr),
                    field,
                    span: self.span_from(start),
                };
            } else if self.check(&TokenKind::LeftBracket) {
                self.advance();
                expr = self.parse_index_or_slice(expr, start)?;
            } else {
                break;
            }
        }

        self.leave(steps);
        Ok(expr)
    }

    /// Parse the remainder of `container[...]` after the opening bracket
    fn parse_index_or_slice(&mut self, container: Expr, start: usize) -> Result<Expr, SyntaxError> {
        let low = if self.check(&TokenKind::Colon) {
            None
        } else if self.check(&TokenKind::RightBracket) {
            return Err(self.error_here("expected index expression"));
        } else {
            Some(Box::new(self.parse_expression()?))
        };

        if !self.check(&TokenKind::Colon) {
            self.expect(&TokenKind::RightBracket, "']' to close the index")?;
            return match low {
                Some(key) => Ok(Expr::Index {
                    container: Box::new(container),
                    key,
                    span: self.span_from(start),
                }),
                None => Err(self.error_here("expected index expression")),
            };
        }

        self.advance(); // consume ':'
        let high = if self.check(&TokenKind::RightBracket) {
            None
        } else {
            Some(Box::new(self.parse_expression()?))
        };
        self.expect(&TokenKind::RightBracket, "']' to close the slice")?;

        Ok(Expr::Slice {
            container: Box::new(container),
            low,
            high,
            span: self.span_from(start),
        })
    }

    /// Parse argument list
    fn parse_argument_list(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut args = vec![self.parse_expression()?];
        while self.check(&TokenKind::Comma) {
            self.advance();
            // allow a trailing comma before ')'
            if self.check(&TokenKind::RightParen) {
                break;
            }
            args.push(self.parse_expression()?);
        }
        Ok(args)
    }

    /// Parse primary expression
    fn parse_primary(&mut self) -> Result<Expr, SyntaxError> {
        let span = self.current_span();

        let literal = match &self.current().kind {
            TokenKind::Integer(text) => Some((LiteralKind::Integer, text.clone())),
            TokenKind::Float(text) => Some((LiteralKind::Float, text.clone())),
            TokenKind::String(text) => Some((LiteralKind::String, text.clone())),
            TokenKind::Char(text) => Some((LiteralKind::Char, text.clone())),
            _ => None,
        };
        if let Some((kind, text)) = literal {
            self.advance();
            return Ok(Expr::Literal { kind, text, span });
        }

        if self.check(&TokenKind::LeftParen) {
            let start = self.mark_position();
            self.advance();
            let inner = self.parse_expression()?;
            self.expect(&TokenKind::RightParen, "')' to close the parenthesis")?;
            return Ok(Expr::Paren {
                inner: Box::new(inner),
                span: self.span_from(start),
            });
        }

        if self.check_identifier() {
            let name = self.parse_identifier()?;
            return Ok(Expr::Identifier { name, span });
        }

        Err(self.error_here("expected expression"))
    }

    /// Parse an identifier
    fn parse_identifier(&mut self) -> Result<String, SyntaxError> {
        match &self.current().kind {
            TokenKind::Identifier(name) => {
                let n = name.clone();
                self.advance();
                Ok(n)
            }
            _ => Err(self.error_here("expected identifier")),
        }
    }

    // Helper methods

    fn current(&self) -> &Token {
        // The lexer always terminates the stream with Eof and `advance`
        // never moves past it.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn is_at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    fn advance(&mut self) {
        if !self.is_at_end() {
            self.position += 1;
        }
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    fn check_identifier(&self) -> bool {
        matches!(self.current().kind, TokenKind::Identifier(_))
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), SyntaxError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error_here(&format!("expected {}", what)))
        }
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        match self.max_depth {
            Some(max) if self.depth > max => {
                self.depth -= 1;
                Err(self.error_here(&format!("expression nested deeper than {} levels", max)))
            }
            _ => Ok(()),
        }
    }

    fn leave(&mut self, levels: usize) {
        self.depth -= levels;
    }

    fn error_here(&self, message: &str) -> SyntaxError {
        let token = self.current();
        let found = match token.kind {
            TokenKind::Eof => None,
            _ => Some(token.span.text.clone()),
        };
        let message = match token.kind {
            TokenKind::Eof => format!("{}, got end of input", message),
            _ => format!("{}, got '{}'", message, token.span.text),
        };
        SyntaxError::at(message, token.span.start, found)
    }

    /// Mark the current position to start tracking a span
    fn mark_position(&self) -> usize {
        self.position
    }

    /// Create a SourceSpan from a marked position to the previous token
    /// (the last token that was consumed before the current position)
    fn span_from(&self, start_pos: usize) -> SourceSpan {
        let last = self.tokens.len() - 1;
        let start_token = &self.tokens[start_pos.min(last)];
        let end_token = &self.tokens[self.position.saturating_sub(1).min(last)];

        SourceSpan {
            line: start_token.span.start.line,
            column: start_token.span.start.column,
            offset: start_token.span.start.offset,
            length: end_token
                .span
                .end
                .offset
                .saturating_sub(start_token.span.start.offset),
        }
    }

    /// Get the span of the current token
    fn current_span(&self) -> SourceSpan {
        let token = self.current();
        SourceSpan {
            line: token.span.start.line,
            column: token.span.start.column,
            offset: token.span.start.offset,
            length: token.span.text.len(),
        }
    }
}

/// Parse source text into an expression tree
pub fn parse(source: &str) -> Result<Expr, SyntaxError> {
    parse_with_depth(source, None)
}

/// Parse source text, rejecting nesting deeper than `max_depth`
pub fn parse_with_depth(source: &str, max_depth: Option<usize>) -> Result<Expr, SyntaxError> {
    let tokens = crate::lexer::tokenize(source)?;
    TokenParser::new(tokens)
        .with_max_depth(max_depth)
        .parse_complete()
}
