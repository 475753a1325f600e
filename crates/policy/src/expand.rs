use crate::capture::ResolvedCaptures;
use crate::PolicyError;

use netpolicy_core::lexer::Lexer;
use netpolicy_core::parser::Parser;
use netpolicy_core::resolver::ExpressionError;
use netpolicy_core::state::{StateMap, StateSeq, StateValue};

use tracing::debug;

const EXPRESSION_OPEN: &str = "{{";
const EXPRESSION_CLOSE: &str = "}}";

/// Expands the desired state: every string scalar of the form
/// `"{{ <expression> }}"` is resolved with capture semantics and the
/// result spliced in place. Everything else passes through.
pub(crate) fn expand(
  desired_state: &[u8],
  captures: &mut ResolvedCaptures,
) -> Result<Vec<u8>, PolicyError> {
  let tree = StateValue::from_yaml(desired_state).map_err(PolicyError::DesiredState)?;
  let expanded = expand_value(&tree, captures)?;
  expanded.to_yaml().map_err(PolicyError::Serialize)
}

fn expand_value(
  value: &StateValue,
  captures: &mut ResolvedCaptures,
) -> Result<StateValue, PolicyError> {
  match value {
    StateValue::Map(map) => {
      let mut expanded = StateMap::new();
      for (key, value) in map {
        expanded.insert(key.clone(), expand_value(value, captures)?);
      }
      Ok(StateValue::Map(expanded))
    }
    StateValue::Seq(seq) => {
      let mut expanded = StateSeq::with_capacity(seq.len());
      for element in seq {
        expanded.push(expand_value(element, captures)?);
      }
      Ok(StateValue::Seq(expanded))
    }
    StateValue::Str(text) => match embedded_expression(text)? {
      Some(expression) => resolve_embedded(expression, captures),
      None => Ok(value.clone()),
    },
    scalar => Ok(scalar.clone()),
  }
}

// An embedded expression is a whole scalar delimited by `{{ … }}`, with
// optional surrounding whitespace. A scalar that opens the delimiter
// without closing it is an error; one that merely contains `{{`
// somewhere else passes through.
fn embedded_expression(text: &str) -> Result<Option<&str>, PolicyError> {
  let trimmed = text.trim();
  let Some(rest) = trimmed.strip_prefix(EXPRESSION_OPEN) else {
    return Ok(None);
  };
  let Some(inner) = rest.strip_suffix(EXPRESSION_CLOSE) else {
    return Err(PolicyError::UnterminatedExpression(text.to_string()));
  };
  Ok(Some(inner.trim()))
}

fn resolve_embedded(
  expression: &str,
  captures: &mut ResolvedCaptures,
) -> Result<StateValue, PolicyError> {
  let expand_error = |source: ExpressionError| PolicyError::Expression {
    expression: expression.to_string(),
    source,
  };
  let tokens = Lexer::new(expression)
    .lex()
    .map_err(|err| expand_error(err.into()))?;
  let parsed = Parser::new(&tokens)
    .parse()
    .map_err(|err| expand_error(err.into()))?;
  let ResolvedCaptures {
    current,
    resolver,
    store,
  } = captures;
  let value = resolver
    .resolve(&parsed, current, store)
    .map_err(|err| expand_error(err.into()))?;
  debug!(expression, "expanded embedded expression");
  Ok(value)
}
