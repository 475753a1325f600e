mod filter;
mod path;
mod replace;
mod walk;

use crate::ast::{Expression, Path, Rhs, Step};
use crate::lexer::LexError;
use crate::parser::ParseError;
use crate::state::StateValue;

use thiserror::Error;

use std::collections::HashSet;

/// Container keys whose matching rule is "collapse to the filtered
/// subset" rather than "preserve siblings".
pub const DEFAULT_PROJECTION: [&str; 4] = ["interfaces", "routes", "running", "config"];

#[derive(Debug, Error)]
pub enum ResolveError {
  #[error("step `{step}` not found (column {})", .step.pos())]
  StepNotFound { step: Step },
  #[error("invalid type `{kind}` for step `{step}` (column {})", .step.pos())]
  InvalidTypeForStep { kind: &'static str, step: Step },
  #[error("unexpected non identity step `{step}` for map state (column {})", .step.pos())]
  NonIdentityStep { step: Step },
  #[error("unexpected non numeric step `{step}` for sequence state (column {})", .step.pos())]
  NonNumericStep { step: Step },
  #[error("type mismatch: the value in the path does not match the value to filter, `{obtained}` != `{expected}`")]
  TypeMismatch {
    obtained: &'static str,
    expected: &'static str,
  },
  #[error("failed converting {op} result to a map, got `{kind}`")]
  NotAMap { op: &'static str, kind: &'static str },
  #[error("replace failed: {reason}")]
  Replace { reason: &'static str },
  #[error("capture `{0}` is not defined")]
  UnknownCapture(String),
  #[error("circular capture reference: {}", .0.join(" -> "))]
  CaptureCycle(Vec<String>),
  #[error("capture reference is missing the capture name")]
  MissingCaptureName,
  #[error("failed to parse captured state of `{name}`: {reason}")]
  CapturedState { name: String, reason: String },
  #[error("step `{step}`: {source}")]
  AtStep {
    step: Step,
    source: Box<ResolveError>,
  },
  #[error("failed resolving capture `{name}`: {source}")]
  Capture {
    name: String,
    source: Box<ExpressionError>,
  },
}

impl ResolveError {
  pub(crate) fn at_step(self, step: &Step) -> Self {
    ResolveError::AtStep {
      step: step.clone(),
      source: Box::new(self),
    }
  }

  /// Innermost error with all step context stripped.
  pub fn root_cause(&self) -> &ResolveError {
    match self {
      ResolveError::AtStep { source, .. } => source.root_cause(),
      other => other,
    }
  }
}

/// Everything that can go wrong running one expression end to end.
#[derive(Debug, Error)]
pub enum ExpressionError {
  #[error("failed to lex expression: {0}")]
  Lex(#[from] LexError),
  #[error("failed to parse expression: {0}")]
  Parse(#[from] ParseError),
  #[error("failed to resolve expression: {0}")]
  Resolve(#[from] ResolveError),
}

/// Gives the resolver access to other captures' resolved states when a
/// path references them with the `capture.<name>` prefix. The capture
/// controller implements this with its memoized resolution session.
pub trait CaptureLookup {
  fn resolve_capture(&mut self, name: &str) -> Result<StateValue, ResolveError>;
}

/// Lookup for contexts without captures: every reference is unknown.
pub struct NoCaptures;

impl CaptureLookup for NoCaptures {
  fn resolve_capture(&mut self, name: &str) -> Result<StateValue, ResolveError> {
    Err(ResolveError::UnknownCapture(name.to_string()))
  }
}

/// Evaluates expressions against a state tree.
///
/// Walks resolve bare paths, equality filters select matching
/// sub-states, replaces produce an updated copy of the state. The
/// projection set controls which filter steps collapse their container
/// to the matching subset.
#[derive(Debug)]
pub struct Resolver {
  projection: HashSet<String>,
}

impl Default for Resolver {
  fn default() -> Self {
    Self {
      projection: DEFAULT_PROJECTION.iter().map(|key| key.to_string()).collect(),
    }
  }
}

impl Resolver {
  pub fn new() -> Self {
    Self::default()
  }

  /// Overrides the projection set used by equality filters.
  pub fn with_projection<I, S>(keys: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      projection: keys.into_iter().map(Into::into).collect(),
    }
  }

  pub fn resolve(
    &self,
    expression: &Expression,
    state: &StateValue,
    captures: &mut dyn CaptureLookup,
  ) -> Result<StateValue, ResolveError> {
    match expression {
      Expression::Path(path) => self.resolve_path(path, state, captures),
      Expression::EqFilter { lhs, rhs } => {
        let expected = self.evaluate_rhs(rhs, state, captures)?;
        filter::filter(state, lhs, &expected, &self.projection)
      }
      Expression::Replace { lhs, rhs } => {
        let value = self.evaluate_rhs(rhs, state, captures)?;
        replace::replace(state, lhs, value)
      }
    }
  }

  // A path either walks the input state or, with a `capture.<name>`
  // prefix, the referenced capture's resolved state.
  fn resolve_path(
    &self,
    path: &Path,
    state: &StateValue,
    captures: &mut dyn CaptureLookup,
  ) -> Result<StateValue, ResolveError> {
    if !path.references_capture() {
      return walk::walk(state, &path.steps);
    }
    let Some(name) = path.steps.get(1).and_then(Step::name) else {
      return Err(ResolveError::MissingCaptureName);
    };
    let captured = captures.resolve_capture(name)?;
    let steps = &path.steps[2..];
    if steps.is_empty() {
      Ok(captured)
    } else {
      walk::walk(&captured, steps)
    }
  }

  fn evaluate_rhs(
    &self,
    rhs: &Rhs,
    state: &StateValue,
    captures: &mut dyn CaptureLookup,
  ) -> Result<StateValue, ResolveError> {
    match rhs {
      Rhs::Str { value, .. } => Ok(StateValue::Str(value.clone())),
      Rhs::Number { value, .. } => Ok(StateValue::Int(*value)),
      Rhs::Path(path) => self.resolve_path(path, state, captures),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::lexer::Lexer;
  use crate::parser::Parser;

  use std::collections::HashMap;

  struct FixedCaptures(HashMap<String, StateValue>);

  impl CaptureLookup for FixedCaptures {
    fn resolve_capture(&mut self, name: &str) -> Result<StateValue, ResolveError> {
      self
        .0
        .get(name)
        .cloned()
        .ok_or_else(|| ResolveError::UnknownCapture(name.to_string()))
    }
  }

  fn parse_state(src: &str) -> StateValue {
    StateValue::from_yaml(src.as_bytes()).expect("document should parse")
  }

  fn parse_expression(src: &str) -> Expression {
    let tokens = Lexer::new(src).lex().expect("should lex");
    Parser::new(&tokens).parse().expect("should parse")
  }

  fn current_state() -> StateValue {
    parse_state(
      "
interfaces:
- name: eth1
  type: ethernet
- name: br1
  type: linux-bridge
routes:
  running:
  - destination: 0.0.0.0/0
    next-hop-interface: eth1
",
    )
  }

  #[test]
  fn test_resolve_bare_path() {
    let resolved = Resolver::new()
      .resolve(
        &parse_expression("interfaces[0].name"),
        &current_state(),
        &mut NoCaptures,
      )
      .unwrap();
    assert_eq!(resolved, StateValue::from("eth1"));
  }

  #[test]
  fn test_resolve_filter_with_literal_rhs() {
    let resolved = Resolver::new()
      .resolve(
        &parse_expression(r#"interfaces.type == "ethernet""#),
        &current_state(),
        &mut NoCaptures,
      )
      .unwrap();
    assert_eq!(
      resolved,
      parse_state("interfaces:\n- name: eth1\n  type: ethernet")
    );
  }

  #[test]
  fn test_resolve_filter_with_path_rhs() {
    // the rhs path walks the same current state
    let resolved = Resolver::new()
      .resolve(
        &parse_expression("interfaces.name == routes.running[0].next-hop-interface"),
        &current_state(),
        &mut NoCaptures,
      )
      .unwrap();
    assert_eq!(
      resolved,
      parse_state("interfaces:\n- name: eth1\n  type: ethernet")
    );
  }

  #[test]
  fn test_resolve_replace() {
    let resolved = Resolver::new()
      .resolve(
        &parse_expression(r#"routes.running.next-hop-interface := "br1""#),
        &current_state(),
        &mut NoCaptures,
      )
      .unwrap();
    assert_eq!(
      resolved.as_map().unwrap()["routes"],
      parse_state("running:\n- destination: 0.0.0.0/0\n  next-hop-interface: br1"),
    );
  }

  #[test]
  fn test_resolve_capture_reference_path() {
    let mut captures = FixedCaptures(
      [(
        "base-iface".to_string(),
        parse_state("interfaces:\n- name: eth1\n  ipv4:\n    address: 192.0.2.1"),
      )]
      .into(),
    );
    let resolved = Resolver::new()
      .resolve(
        &parse_expression("capture.base-iface.interfaces[0].ipv4"),
        &current_state(),
        &mut captures,
      )
      .unwrap();
    assert_eq!(resolved, parse_state("address: 192.0.2.1"));
  }

  #[test]
  fn test_resolve_whole_capture_reference() {
    let tree = parse_state("a: 1");
    let mut captures = FixedCaptures([("base".to_string(), tree.clone())].into());
    let resolved = Resolver::new()
      .resolve(
        &parse_expression("capture.base"),
        &current_state(),
        &mut captures,
      )
      .unwrap();
    assert_eq!(resolved, tree);
  }

  #[test]
  fn test_resolve_unknown_capture() {
    let err = Resolver::new()
      .resolve(
        &parse_expression("capture.missing.interfaces"),
        &current_state(),
        &mut NoCaptures,
      )
      .unwrap_err();
    assert!(matches!(err, ResolveError::UnknownCapture(name) if name == "missing"));
  }

  #[test]
  fn test_resolve_capture_reference_without_name() {
    let err = Resolver::new()
      .resolve(
        &parse_expression("capture"),
        &current_state(),
        &mut NoCaptures,
      )
      .unwrap_err();
    assert!(matches!(err, ResolveError::MissingCaptureName));
  }

  #[test]
  fn test_resolution_is_deterministic() {
    let expression = parse_expression(r#"interfaces.type == "ethernet""#);
    let state = current_state();
    let resolver = Resolver::new();
    let first = resolver.resolve(&expression, &state, &mut NoCaptures).unwrap();
    let second = resolver.resolve(&expression, &state, &mut NoCaptures).unwrap();
    assert_eq!(first, second);
  }
}
