use std::fmt;

use crate::dsp::{Bracket, SyntaxError};

/// Characters accepted besides ASCII digits.
pub const VALID_SYMBOLS: &str = "ABF+-*/^pe.()";
/// Deepest bracket nesting an equation may use. Evaluation recurses once per
/// level on the worker's stack.
pub const MAX_NESTING: usize = 256;

#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    /// Digits and dots exactly as typed; only checked when evaluated.
    Number(String),
    A,
    B,
    F,
    Pi,
    E,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Token::Number(text) => text.as_str(),
            Token::A => "A",
            Token::B => "B",
            Token::F => "F",
            Token::Pi => "pi",
            Token::E => "e",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Caret => "^",
            Token::LParen => "(",
            Token::RParen => ")",
        };
        f.write_str(text)
    }
}

/// A validated math-channel equation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Expression {
    tokens: Vec<Token>,
    requires_a: bool,
    requires_b: bool,
    requires_f: bool,
}

impl Expression {
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn requires_a(&self) -> bool {
        self.requires_a
    }

    pub fn requires_b(&self) -> bool {
        self.requires_b
    }

    pub fn requires_f(&self) -> bool {
        self.requires_f
    }
}

/// Tokenizes `text`, rejecting unknown symbols and unbalanced brackets.
pub fn validate(text: &str) -> Result<Expression, SyntaxError> {
    let mut expr = Expression::default();
    let mut depth = 0usize;
    let mut number = String::new();
    let mut chars = text.chars().enumerate().peekable();

    while let Some((position, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }
        if !c.is_ascii_digit() && !VALID_SYMBOLS.contains(c) {
            return Err(SyntaxError::InvalidSymbol {
                symbol: c,
                position,
            });
        }

        if c == '.' || c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        if !number.is_empty() {
            expr.tokens.push(Token::Number(std::mem::take(&mut number)));
        }

        let token = match c {
            'A' => {
                expr.requires_a = true;
                Token::A
            }
            'B' => {
                expr.requires_b = true;
                Token::B
            }
            'F' => {
                expr.requires_f = true;
                Token::F
            }
            'p' => match chars.next() {
                Some((_, 'i')) => Token::Pi,
                _ => {
                    return Err(SyntaxError::InvalidSymbol {
                        symbol: 'p',
                        position,
                    })
                }
            },
            'e' => Token::E,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '(' => {
                if depth == MAX_NESTING {
                    return Err(SyntaxError::NestingTooDeep {
                        limit: MAX_NESTING,
                        position,
                    });
                }
                depth += 1;
                Token::LParen
            }
            ')' => {
                if depth == 0 {
                    return Err(SyntaxError::UnmatchedBracket(Bracket::MissingOpen));
                }
                depth -= 1;
                Token::RParen
            }
            other => {
                return Err(SyntaxError::InvalidSymbol {
                    symbol: other,
                    position,
                })
            }
        };
        expr.tokens.push(token);
    }

    if !number.is_empty() {
        expr.tokens.push(Token::Number(number));
    }
    if depth > 0 {
        return Err(SyntaxError::UnmatchedBracket(Bracket::MissingClose));
    }
    Ok(expr)
}
