use crate::ast::{Expression, Path, Rhs, Step};
use crate::lexer::{Token, TokenKind};

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
  #[error("expected {expected}, found `{found}` at column {pos}")]
  UnexpectedToken {
    expected: &'static str,
    found: String,
    pos: usize,
  },
  #[error("unexpected end of expression at column {pos}")]
  UnexpectedEnd { pos: usize },
  #[error("invalid number `{literal}` at column {pos}")]
  InvalidNumber { literal: String, pos: usize },
}

/// Recursive descent parser for the capture expression grammar:
///
/// ```text
/// expr := path ( '==' rhs | ':=' rhs )?
/// path := step ( '.' step )*
/// step := IDENT | NUMBER | IDENT '[' NUMBER ']'
/// rhs  := STRING | NUMBER | path
/// ```
pub struct Parser<'t> {
  tokens: &'t [Token],
  position: usize,
}

impl<'t> Parser<'t> {
  pub fn new(tokens: &'t [Token]) -> Self {
    Self {
      tokens,
      position: 0,
    }
  }

  pub fn parse(mut self) -> Result<Expression, ParseError> {
    if self.tokens.is_empty() {
      return Err(ParseError::UnexpectedEnd { pos: 0 });
    }
    let lhs = self.path()?;
    let expression = match self.peek().kind {
      TokenKind::EqFilter => {
        self.advance();
        Expression::EqFilter {
          lhs,
          rhs: self.rhs()?,
        }
      }
      TokenKind::Replace => {
        self.advance();
        Expression::Replace {
          lhs,
          rhs: self.rhs()?,
        }
      }
      _ => Expression::Path(lhs),
    };
    let trailing = self.peek();
    if trailing.kind != TokenKind::Eof {
      return Err(ParseError::UnexpectedToken {
        expected: "end of expression",
        found: trailing.literal.clone(),
        pos: trailing.pos,
      });
    }
    Ok(expression)
  }

  fn peek(&self) -> &'t Token {
    &self.tokens[self.position.min(self.tokens.len() - 1)]
  }

  fn advance(&mut self) -> &'t Token {
    let token = self.peek();
    if self.position < self.tokens.len() {
      self.position += 1;
    }
    token
  }

  fn path(&mut self) -> Result<Path, ParseError> {
    let mut steps = Vec::new();
    self.step(&mut steps)?;
    while self.peek().kind == TokenKind::Dot {
      self.advance();
      self.step(&mut steps)?;
    }
    Ok(Path::new(steps))
  }

  fn step(&mut self, steps: &mut Vec<Step>) -> Result<(), ParseError> {
    let token = self.peek();
    match token.kind {
      TokenKind::Identity => {
        self.advance();
        steps.push(Step::Identity {
          pos: token.pos,
          name: token.literal.clone(),
        });
        if self.peek().kind == TokenKind::OpenBracket {
          self.advance();
          steps.push(self.index_step()?);
          let closing = self.peek();
          if closing.kind != TokenKind::CloseBracket {
            return Err(ParseError::UnexpectedToken {
              expected: "`]`",
              found: closing.literal.clone(),
              pos: closing.pos,
            });
          }
          self.advance();
        }
        Ok(())
      }
      TokenKind::Number => {
        steps.push(self.index_step()?);
        Ok(())
      }
      TokenKind::Eof => Err(ParseError::UnexpectedEnd { pos: token.pos }),
      _ => Err(ParseError::UnexpectedToken {
        expected: "a path step",
        found: token.literal.clone(),
        pos: token.pos,
      }),
    }
  }

  fn index_step(&mut self) -> Result<Step, ParseError> {
    let token = self.peek();
    if token.kind != TokenKind::Number {
      return Err(ParseError::UnexpectedToken {
        expected: "a sequence index",
        found: token.literal.clone(),
        pos: token.pos,
      });
    }
    self.advance();
    let index = token
      .literal
      .parse::<usize>()
      .map_err(|_| ParseError::InvalidNumber {
        literal: token.literal.clone(),
        pos: token.pos,
      })?;
    Ok(Step::Index {
      pos: token.pos,
      index,
    })
  }

  fn rhs(&mut self) -> Result<Rhs, ParseError> {
    let token = self.peek();
    match token.kind {
      TokenKind::Str => {
        self.advance();
        Ok(Rhs::Str {
          pos: token.pos,
          value: token.literal.clone(),
        })
      }
      TokenKind::Number => {
        self.advance();
        let value = token
          .literal
          .parse::<i64>()
          .map_err(|_| ParseError::InvalidNumber {
            literal: token.literal.clone(),
            pos: token.pos,
          })?;
        Ok(Rhs::Number {
          pos: token.pos,
          value,
        })
      }
      TokenKind::Identity => Ok(Rhs::Path(self.path()?)),
      TokenKind::Eof => Err(ParseError::UnexpectedEnd { pos: token.pos }),
      _ => Err(ParseError::UnexpectedToken {
        expected: "a string, a number or a path",
        found: token.literal.clone(),
        pos: token.pos,
      }),
    }
  }
}
