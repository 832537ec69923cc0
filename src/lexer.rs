//! Lexer for predicate expressions - tokenizes source text before parsing
//!
//! Compilation happens in two phases:
//! 1. Lexer: Source text → Token stream (pest grammar in `lexer.pest`)
//! 2. Parser: Token stream → AST (see [`crate::token_parser`])
//!
//! Literal tokens keep their raw source text. Number conversion and string
//! unescaping happen at evaluation time so that malformed literals surface as
//! evaluation errors rather than lexer errors.

use pest::Parser;
use pest_derive::Parser;

use crate::error::SyntaxError;

#[derive(Parser)]
#[grammar = "lexer.pest"]
struct LexerParser;

/// Position information for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

/// A token with its kind and position
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Span of source text
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
    pub text: String,
}

/// Token types
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals (raw source text)
    Identifier(String),
    Integer(String),
    Float(String),
    String(String),
    Char(String),

    // Operators
    AndAnd,       // &&
    OrOr,         // ||
    EqualEqual,   // ==
    NotEqual,     // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=
    Bang,         // !
    Plus,         // +
    Minus,        // -
    Star,         // *
    Slash,        // /
    Percent,      // %
    ShiftLeft,    // <<
    ShiftRight,   // >>

    // Punctuation
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    Comma,        // ,
    Dot,          // .
    Colon,        // :

    Eof,
}

/// Lexer that converts source text to tokens
pub struct Lexer<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    /// Last position handed out; token boundaries arrive in source order
    cursor: Position,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            cursor: Position {
                line: 1,
                column: 1,
                offset: 0,
            },
        }
    }

    /// Tokenize the source text, always terminating the stream with [`TokenKind::Eof`]
    pub fn tokenize(mut self) -> Result<Vec<Token>, SyntaxError> {
        let pairs = LexerParser::parse(Rule::tokens, self.source)
            .map_err(|e| SyntaxError::from_pest(&e))?;

        for pair in pairs {
            if pair.as_rule() != Rule::tokens {
                continue;
            }
            for inner in pair.into_inner() {
                if inner.as_rule() == Rule::token {
                    let token = self.process_token(inner)?;
                    self.tokens.push(token);
                }
            }
        }

        let eof = self.position_from_offset(self.source.len());
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span {
                start: eof,
                end: eof,
                text: String::new(),
            },
        });

        Ok(self.tokens)
    }

    /// Process a single token pair
    fn process_token(&mut self, pair: pest::iterators::Pair<Rule>) -> Result<Token, SyntaxError> {
        let span = self.span_from_pair(&pair);
        let start = span.start;

        let inner = pair
            .into_inner()
            .next()
            .ok_or_else(|| SyntaxError::at("empty token", start, None))?;

        let text = inner.as_str();
        let kind = match inner.as_rule() {
            Rule::number_token => {
                let number = inner
                    .into_inner()
                    .next()
                    .ok_or_else(|| SyntaxError::at("empty number", start, None))?;
                match number.as_rule() {
                    Rule::float_token => TokenKind::Float(text.to_string()),
                    _ => TokenKind::Integer(text.to_string()),
                }
            }
            Rule::string_token => TokenKind::String(text.to_string()),
            Rule::char_token => TokenKind::Char(text.to_string()),
            Rule::identifier_token => TokenKind::Identifier(text.to_string()),

            Rule::operator_token => match text {
                "&&" => TokenKind::AndAnd,
                "||" => TokenKind::OrOr,
                "==" => TokenKind::EqualEqual,
                "!=" => TokenKind::NotEqual,
                "<=" => TokenKind::LessEqual,
                ">=" => TokenKind::GreaterEqual,
                "<<" => TokenKind::ShiftLeft,
                ">>" => TokenKind::ShiftRight,
                "<" => TokenKind::Less,
                ">" => TokenKind::Greater,
                "!" => TokenKind::Bang,
                "+" => TokenKind::Plus,
                "-" => TokenKind::Minus,
                "*" => TokenKind::Star,
                "/" => TokenKind::Slash,
                "%" => TokenKind::Percent,
                op => {
                    return Err(SyntaxError::at(
                        format!("unknown operator: {}", op),
                        start,
                        Some(op.to_string()),
                    ))
                }
            },

            Rule::punctuation_token => match text {
                "(" => TokenKind::LeftParen,
                ")" => TokenKind::RightParen,
                "[" => TokenKind::LeftBracket,
                "]" => TokenKind::RightBracket,
                "," => TokenKind::Comma,
                "." => TokenKind::Dot,
                ":" => TokenKind::Colon,
                p => {
                    return Err(SyntaxError::at(
                        format!("unknown punctuation: {}", p),
                        start,
                        Some(p.to_string()),
                    ))
                }
            },

            other => {
                return Err(SyntaxError::at(
                    format!("unexpected token rule {:?}", other),
                    start,
                    Some(text.to_string()),
                ))
            }
        };

        Ok(Token { kind, span })
    }

    /// Create a Span from a pest Pair
    fn span_from_pair(&mut self, pair: &pest::iterators::Pair<Rule>) -> Span {
        let pest_span = pair.as_span();
        Span {
            start: self.position_from_offset(pest_span.start()),
            end: self.position_from_offset(pest_span.end()),
            text: pair.as_str().to_string(),
        }
    }

    /// Calculate line and column from a byte offset, scanning forward from
    /// the previous position
    fn position_from_offset(&mut self, offset: usize) -> Position {
        if offset < self.cursor.offset {
            self.cursor = Position {
                line: 1,
                column: 1,
                offset: 0,
            };
        }

        let Position {
            mut line,
            mut column,
            ..
        } = self.cursor;
        let skipped = self.source.get(self.cursor.offset..offset).unwrap_or_default();
        for c in skipped.chars() {
            if c == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }

        self.cursor = Position {
            line,
            column,
            offset,
        };
        self.cursor
    }
}

/// Convenience function to tokenize a string
pub fn tokenize(source: &str) -> Result<Vec<Token>, SyntaxError> {
    Lexer::new(source).tokenize()
}

/// Remove the surrounding double quotes from a string literal and resolve
/// its escape sequences.
///
/// Accepts the escapes `\a \b \f \n \r \t \v \\ \"`, octal `\NNN`,
/// `\xHH`, `\uHHHH` and `\UHHHHHHHH`. Anything else is an error.
pub fn unquote(literal: &str) -> Result<String, String> {
    let body = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .ok_or_else(|| "missing surrounding quotes".to_string())?;

    let mut result = String::with_capacity(body.len());
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => return Err("unescaped quote inside literal".to_string()),
            '\n' => return Err("newline inside literal".to_string()),
            '\\' => {
                let escaped = match chars.next() {
                    Some('a') => '\u{07}',
                    Some('b') => '\u{08}',
                    Some('f') => '\u{0c}',
                    Some('n') => '\n',
                    Some('r') => '\r',
                    Some('t') => '\t',
                    Some('v') => '\u{0b}',
                    Some('\\') => '\\',
                    Some('"') => '"',
                    Some('x') => read_code_point(&mut chars, 2, 16)?,
                    Some('u') => read_code_point(&mut chars, 4, 16)?,
                    Some('U') => read_code_point(&mut chars, 8, 16)?,
                    Some(d @ '0'..='7') => {
                        let rest: String = chars.by_ref().take(2).collect();
                        let digits = format!("{}{}", d, rest);
                        if digits.len() != 3 {
                            return Err(format!("invalid octal escape \\{}", digits));
                        }
                        let code = u32::from_str_radix(&digits, 8)
                            .map_err(|_| format!("invalid octal escape \\{}", digits))?;
                        if code > 0xff {
                            return Err(format!("octal escape \\{} out of range", digits));
                        }
                        char::from_u32(code)
                            .ok_or_else(|| format!("invalid octal escape \\{}", digits))?
                    }
                    Some(other) => return Err(format!("unknown escape sequence \\{}", other)),
                    None => return Err("trailing backslash".to_string()),
                };
                result.push(escaped);
            }
            other => result.push(other),
        }
    }

    Ok(result)
}

fn read_code_point(chars: &mut std::str::Chars<'_>, len: usize, radix: u32) -> Result<char, String> {
    let digits: String = chars.by_ref().take(len).collect();
    if digits.chars().count() != len || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!("escape needs {} hex digits, got {:?}", len, digits));
    }
    let code = u32::from_str_radix(&digits, radix)
        .map_err(|_| format!("invalid hex escape {:?}", digits))?;
    char::from_u32(code).ok_or_else(|| format!("invalid code point {:#x}", code))
}
