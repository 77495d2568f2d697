//! Strict parser for the numeric literals found in a `parameters` file.
//!
//! Values such as `L = [128, 64]` or `dens = (10, 10, 5)` are read as nested
//! sequences of numbers. Only numbers, `[...]`, `(...)`, commas and
//! whitespace are accepted; anything else is an error.

use crate::error::LiteralError;

/// A parsed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Seq(Vec<Literal>),
}

impl Literal {
    /// Integer value, if this is an integer scalar.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Literal::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value of a scalar, integers widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Int(v) => Some(*v as f64),
            Literal::Float(v) => Some(*v),
            Literal::Seq(_) => None,
        }
    }

    /// Integers of a flat sequence. A scalar integer yields a one-element vector.
    pub fn as_ints(&self) -> Option<Vec<i64>> {
        match self {
            Literal::Int(v) => Some(vec![*v]),
            Literal::Float(_) => None,
            Literal::Seq(items) => items.iter().map(Literal::as_i64).collect(),
        }
    }

    /// Numbers of a flat sequence. A scalar yields a one-element vector.
    pub fn as_floats(&self) -> Option<Vec<f64>> {
        match self {
            Literal::Seq(items) => items.iter().map(Literal::as_f64).collect(),
            scalar => scalar.as_f64().map(|v| vec![v]),
        }
    }
}

/// Parses a complete literal. Trailing non-whitespace input is rejected.
pub fn parse_literal(text: &str) -> Result<Literal, LiteralError> {
    let mut parser = Parser { src: text, pos: 0 };
    parser.skip_ws();
    if parser.at_end() {
        return Err(LiteralError::Empty);
    }
    let value = parser.value()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(LiteralError::Trailing { offset: parser.pos });
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn value(&mut self) -> Result<Literal, LiteralError> {
        match self.peek() {
            Some('[') => self.sequence(']'),
            Some('(') => self.sequence(')'),
            Some(c) if c.is_ascii_digit() || matches!(c, '+' | '-' | '.') => self.number(),
            Some(found) => Err(LiteralError::Unexpected { found, offset: self.pos }),
            None => Err(LiteralError::Unterminated { offset: self.pos }),
        }
    }

    fn sequence(&mut self, close: char) -> Result<Literal, LiteralError> {
        let open_at = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None => return Err(LiteralError::Unterminated { offset: open_at }),
                Some(c) if c == close => {
                    self.pos += 1;
                    return Ok(Literal::Seq(items));
                }
                Some(c @ (']' | ')')) => {
                    return Err(LiteralError::Mismatched { found: c, offset: self.pos })
                }
                Some(_) => {}
            }

            items.push(self.value()?);

            self.skip_ws();
            match self.peek() {
                Some(',') => self.pos += 1,
                Some(c) if c == close => {}
                Some(c @ (']' | ')')) => {
                    return Err(LiteralError::Mismatched { found: c, offset: self.pos })
                }
                Some(found) => return Err(LiteralError::Unexpected { found, offset: self.pos }),
                None => return Err(LiteralError::Unterminated { offset: open_at }),
            }
        }
    }

    fn number(&mut self) -> Result<Literal, LiteralError> {
        let start = self.pos;
        let bytes = self.src.as_bytes();
        let mut end = start;
        if matches!(bytes.get(end), Some(b'+' | b'-')) {
            end += 1;
        }
        let mut is_float = false;
        while let Some(&b) = bytes.get(end) {
            match b {
                b'0'..=b'9' => end += 1,
                b'.' => {
                    is_float = true;
                    end += 1;
                }
                b'e' | b'E' => {
                    is_float = true;
                    end += 1;
                    if matches!(bytes.get(end), Some(b'+' | b'-')) {
                        end += 1;
                    }
                }
                _ => break,
            }
        }

        let text = &self.src[start..end];
        let invalid = || LiteralError::InvalidNumber { text: text.to_string(), offset: start };
        let value = if is_float {
            text.parse::<f64>().map(Literal::Float).map_err(|_| invalid())?
        } else {
            text.parse::<i64>().map(Literal::Int).map_err(|_| invalid())?
        };
        self.pos = end;
        Ok(value)
    }
}
