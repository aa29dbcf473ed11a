//! Recursive-descent evaluation of a validated [`Expression`].
//!
//! ```text
//! Expr   := Term (('+' | '-') Term)*
//! Term   := Base (('*' | '/') Base)*
//! Base   := Unary ['^' Unary]
//! Unary  := ['-'] Factor
//! Factor := number | '(' Expr ')' | 'A' | 'B' | 'F' | 'pi' | 'e'
//! ```

use crate::dsp::{ScopeError, ScopeResult};
use crate::expr::lexer::{Expression, Token};

pub const PI: f64 = 3.14159;
pub const E: f64 = 2.71828;

/// Channel values at the point being evaluated.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Operands {
    pub a: f64,
    pub b: f64,
    pub f: f64,
}

impl Expression {
    /// Evaluates the whole token stream; leftover tokens are an error.
    pub fn evaluate(&self, operands: &Operands) -> ScopeResult<f64> {
        let mut cursor = Cursor {
            tokens: self.tokens(),
            pos: 0,
            operands,
        };
        let value = cursor.expr()?;
        match cursor.peek() {
            None => Ok(value),
            Some(token) => Err(misused(token)),
        }
    }
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
    operands: &'a Operands,
}

fn misused(token: &Token) -> ScopeError {
    ScopeError::MalformedExpression(format!("{token} is incorrectly used."))
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn expr(&mut self) -> ScopeResult<f64> {
        let mut result = self.term()?;
        while let Some(op @ (Token::Plus | Token::Minus)) = self.peek() {
            self.pos += 1;
            let rhs = self.term()?;
            if *op == Token::Plus {
                result += rhs;
            } else {
                result -= rhs;
            }
        }
        Ok(result)
    }

    fn term(&mut self) -> ScopeResult<f64> {
        let mut result = self.base()?;
        while let Some(op @ (Token::Star | Token::Slash)) = self.peek() {
            self.pos += 1;
            if *op == Token::Star {
                result *= self.base()?;
                continue;
            }
            // Only a literal "0" divisor is refused; computed zeros divide.
            if matches!(self.peek(), Some(Token::Number(text)) if text == "0") {
                return Err(ScopeError::MalformedExpression(
                    "/ is incorrectly used: division by 0.".into(),
                ));
            }
            result /= self.base()?;
        }
        Ok(result)
    }

    fn base(&mut self) -> ScopeResult<f64> {
        let result = self.unary()?;
        if let Some(Token::Caret) = self.peek() {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(result.powf(exponent));
        }
        Ok(result)
    }

    fn unary(&mut self) -> ScopeResult<f64> {
        if let Some(Token::Minus) = self.peek() {
            self.pos += 1;
            return Ok(-self.factor()?);
        }
        self.factor()
    }

    fn factor(&mut self) -> ScopeResult<f64> {
        let token = self
            .peek()
            .ok_or_else(|| ScopeError::MalformedExpression("missing rvalue.".into()))?;
        let value = match token {
            Token::Number(text) => text.parse::<f64>().map_err(|_| misused(token))?,
            Token::LParen => {
                self.pos += 1;
                let inner = self.expr()?;
                match self.peek() {
                    Some(Token::RParen) => inner,
                    Some(other) => return Err(misused(other)),
                    None => {
                        return Err(ScopeError::MalformedExpression(
                            "missing closing bracket.".into(),
                        ))
                    }
                }
            }
            Token::A => self.operands.a,
            Token::B => self.operands.b,
            Token::F => self.operands.f,
            Token::Pi => PI,
            Token::E => E,
            _ => return Err(misused(token)),
        };
        self.pos += 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::validate;

    fn eval(text: &str, a: f64, b: f64, f: f64) -> ScopeResult<f64> {
        validate(text).unwrap().evaluate(&Operands { a, b, f })
    }

    #[test]
    fn precedence_and_channels() {
        assert_eq!(eval("A+B*2", 1.0, 2.0, 0.0).unwrap(), 5.0);
        assert_eq!(eval("(A+B)*2", 1.0, 2.0, 0.0).unwrap(), 6.0);
        assert_eq!(eval("F-A-B", 1.0, 2.0, 10.0).unwrap(), 7.0);
        assert_eq!(eval("2^3*2", 0.0, 0.0, 0.0).unwrap(), 16.0);
        assert_eq!(eval("-A^2", 3.0, 0.0, 0.0).unwrap(), 9.0);
        assert_eq!(eval("A^-1", 4.0, 0.0, 0.0).unwrap(), 0.25);
    }

    #[test]
    fn constants_use_display_precision() {
        assert_eq!(eval("pi", 0.0, 0.0, 0.0).unwrap(), 3.14159);
        assert_eq!(eval("2*e", 0.0, 0.0, 0.0).unwrap(), 5.43656);
    }

    #[test]
    fn literal_zero_divisor_is_refused() {
        let err = eval("A/0", 1.0, 0.0, 0.0).unwrap_err();
        match err {
            ScopeError::MalformedExpression(msg) => assert!(msg.starts_with('/')),
            other => panic!("unexpected {other:?}"),
        }
        // Only the literal token is checked.
        assert!(eval("A/(1-1)", 1.0, 0.0, 0.0).unwrap().is_infinite());
        assert!(eval("A/0.0", 1.0, 0.0, 0.0).unwrap().is_infinite());
    }

    #[test]
    fn deepest_allowed_nesting_evaluates() {
        use crate::expr::lexer::MAX_NESTING;
        let text = format!("{}A{}", "(".repeat(MAX_NESTING), ")".repeat(MAX_NESTING));
        assert_eq!(eval(&text, 2.5, 0.0, 0.0).unwrap(), 2.5);
    }

    #[test]
    fn structural_failures_are_malformed() {
        for text in ["", "A+", "A B", "2^3^2", "--A", "(A)(B)", "1..2", "*A"] {
            assert!(
                matches!(
                    eval(text, 1.0, 1.0, 1.0),
                    Err(ScopeError::MalformedExpression(_))
                ),
                "{text:?} should be malformed"
            );
        }
    }
}
