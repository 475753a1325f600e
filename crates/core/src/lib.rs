/*!
This crate contains the expression engine for netpolicy.

It provides the schemaless state tree, the lexer and parser for the
capture expression language, and the resolver that walks, filters and
replaces sub-states of a network state document.
Usually you will use the `netpolicy` crate instead of this one, unless
you want to evaluate expressions against state documents directly.
*/

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod state;

pub use ast::{Expression, Path, Rhs, Step};
pub use lexer::{LexError, Lexer, Token, TokenKind};
pub use parser::{ParseError, Parser};
pub use resolver::{CaptureLookup, ExpressionError, NoCaptures, ResolveError, Resolver};
pub use state::{StateMap, StateSeq, StateValue};
