//! Whitespace tokenizer for `.dat` files.
//!
//! Values are separated by arbitrary whitespace and newlines; `#` starts a
//! comment that runs to the end of the line. Every token remembers its line
//! for error reporting.

use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Token<'a> {
    pub text: &'a str,
    pub line: usize,
}

pub(crate) struct Lexer<'a> {
    tokens: Vec<Token<'a>>,
    position: usize,
    last_line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut tokens = Vec::new();
        let mut last_line = 1;
        for (index, line) in input.lines().enumerate() {
            last_line = index + 1;
            let content = line.split('#').next().unwrap_or("");
            tokens.extend(content.split_whitespace().map(|text| Token {
                text,
                line: index + 1,
            }));
        }
        Self {
            tokens,
            position: 0,
            last_line,
        }
    }

    fn next_token(&mut self, what: &str) -> Result<Token<'a>> {
        let token = self.tokens.get(self.position).copied().ok_or_else(|| Error::Parse {
            line: self.last_line,
            message: format!("unexpected end of file, expected {what}"),
        })?;
        self.position += 1;
        Ok(token)
    }

    fn parse<T: FromStr>(&mut self, what: &str) -> Result<(T, usize)> {
        let token = self.next_token(what)?;
        let value = token.text.parse().map_err(|_| Error::Parse {
            line: token.line,
            message: format!("expected {what}, found '{}'", token.text),
        })?;
        Ok((value, token.line))
    }

    /// Next token as a non-negative integer.
    pub fn usize(&mut self, what: &str) -> Result<usize> {
        self.parse(what).map(|(v, _)| v)
    }

    /// Next token as a non-negative integer, with its line.
    pub fn usize_at(&mut self, what: &str) -> Result<(usize, usize)> {
        self.parse(what)
    }

    pub fn f64(&mut self, what: &str) -> Result<f64> {
        self.parse(what).map(|(v, _)| v)
    }

    /// `count` reals.
    pub fn f64s(&mut self, count: usize, what: &str) -> Result<Vec<f64>> {
        self.expect_remaining(count, what)?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(self.f64(what)?);
        }
        Ok(values)
    }

    /// Tokens not yet consumed.
    pub fn remaining(&self) -> usize {
        self.tokens.len() - self.position
    }

    /// Fail unless at least `count` tokens are left. Counts read from the
    /// file are checked this way before anything is sized by them.
    pub fn expect_remaining(&self, count: usize, what: &str) -> Result<()> {
        let remaining = self.remaining();
        if count > remaining {
            return Err(Error::Parse {
                line: self.last_line,
                message: format!("unexpected end of file, expected {count} x {what} but {remaining} tokens are left"),
            });
        }
        Ok(())
    }

    /// Line of the next token, or of the end of input.
    pub fn line(&self) -> usize {
        self.tokens
            .get(self.position)
            .map_or(self.last_line, |t| t.line)
    }

    /// Fail if anything but comments and whitespace is left.
    pub fn expect_end(&self) -> Result<()> {
        match self.tokens.get(self.position) {
            None => Ok(()),
            Some(token) => Err(Error::Parse {
                line: token.line,
                message: format!("trailing data '{}'", token.text),
            }),
        }
    }
}
