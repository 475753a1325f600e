use thiserror::Error;

use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LexError {
  #[error("unexpected character `{character}` at column {offset}")]
  UnexpectedCharacter { character: char, offset: usize },
  #[error("unterminated string starting at column {offset}")]
  UnterminatedString { offset: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TokenKind {
  Identity,
  Number,
  Str,
  Dot,
  EqFilter,
  Replace,
  /// Reserved for piping captures between expressions. Lexes, never parses.
  Pipe,
  OpenBracket,
  CloseBracket,
  Eof,
}

/// A lexeme with the byte offset of its first character, used by the
/// parser and the resolver to localize errors in the expression.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
  pub kind: TokenKind,
  pub literal: String,
  pub pos: usize,
}

impl Token {
  fn new(kind: TokenKind, literal: impl Into<String>, pos: usize) -> Self {
    Self {
      kind,
      literal: literal.into(),
      pos,
    }
  }
}

/// Tokenizes a capture expression.
///
/// Identifiers start with a letter and continue with letters, digits,
/// `-` and `_`. Numbers are decimal integers. Strings are double quoted
/// with `\"` as the only escape. Whitespace separates tokens.
pub struct Lexer<'a> {
  input: &'a str,
  chars: Peekable<CharIndices<'a>>,
}

impl<'a> Lexer<'a> {
  pub fn new(input: &'a str) -> Self {
    Self {
      input,
      chars: input.char_indices().peekable(),
    }
  }

  /// Consumes the input and returns its tokens, always terminated by
  /// an `Eof` token carrying the input length as offset.
  pub fn lex(mut self) -> Result<Vec<Token>, LexError> {
    let mut tokens = Vec::new();
    while let Some((pos, character)) = self.chars.next() {
      match character {
        c if c.is_ascii_whitespace() => {}
        '.' => tokens.push(Token::new(TokenKind::Dot, ".", pos)),
        '|' => tokens.push(Token::new(TokenKind::Pipe, "|", pos)),
        '[' => tokens.push(Token::new(TokenKind::OpenBracket, "[", pos)),
        ']' => tokens.push(Token::new(TokenKind::CloseBracket, "]", pos)),
        '=' => {
          self.operator_tail('=', pos)?;
          tokens.push(Token::new(TokenKind::EqFilter, "==", pos));
        }
        ':' => {
          self.operator_tail(':', pos)?;
          tokens.push(Token::new(TokenKind::Replace, ":=", pos));
        }
        '"' => tokens.push(self.string(pos)?),
        c if c.is_ascii_alphabetic() => tokens.push(self.identity(c, pos)),
        c if c.is_ascii_digit() => tokens.push(self.number(c, pos)),
        c => {
          return Err(LexError::UnexpectedCharacter {
            character: c,
            offset: pos,
          })
        }
      }
    }
    tokens.push(Token::new(TokenKind::Eof, "", self.input.len()));
    Ok(tokens)
  }

  // `==` and `:=` are the only two-character operators; a lone `=` or `:`
  // is not part of the language.
  fn operator_tail(&mut self, operator: char, pos: usize) -> Result<(), LexError> {
    match self.chars.peek() {
      Some(&(_, '=')) => {
        self.chars.next();
        Ok(())
      }
      _ => Err(LexError::UnexpectedCharacter {
        character: operator,
        offset: pos,
      }),
    }
  }

  fn identity(&mut self, first: char, pos: usize) -> Token {
    let mut literal = String::from(first);
    while let Some(&(_, c)) = self.chars.peek() {
      if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
        literal.push(c);
        self.chars.next();
      } else {
        break;
      }
    }
    Token::new(TokenKind::Identity, literal, pos)
  }

  fn number(&mut self, first: char, pos: usize) -> Token {
    let mut literal = String::from(first);
    while let Some(&(_, c)) = self.chars.peek() {
      if c.is_ascii_digit() {
        literal.push(c);
        self.chars.next();
      } else {
        break;
      }
    }
    Token::new(TokenKind::Number, literal, pos)
  }

  fn string(&mut self, pos: usize) -> Result<Token, LexError> {
    let mut literal = String::new();
    loop {
      match self.chars.next() {
        None => return Err(LexError::UnterminatedString { offset: pos }),
        Some((_, '"')) => return Ok(Token::new(TokenKind::Str, literal, pos)),
        Some((_, '\\')) => {
          if let Some(&(_, '"')) = self.chars.peek() {
            literal.push('"');
            self.chars.next();
          } else {
            literal.push('\\');
          }
        }
        Some((_, c)) => literal.push(c),
      }
    }
  }
}
