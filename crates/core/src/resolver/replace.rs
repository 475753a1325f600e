use super::path::{visit_state, PathCursor, StateVisitor};
use super::ResolveError;
use crate::ast::Path;
use crate::state::{StateMap, StateSeq, StateValue};

/// Replaces the value the path points at with `value`, materializing the
/// change in a fresh tree. The input state is never mutated.
pub(super) fn replace(
  state: &StateValue,
  lhs: &Path,
  value: StateValue,
) -> Result<StateValue, ResolveError> {
  let mut visitor = ReplaceVisitor { value };
  let replaced = visit_state(PathCursor::new(&lhs.steps), state, &mut visitor)?;
  match replaced {
    Some(replaced @ StateValue::Map(_)) => Ok(replaced),
    _ => Err(ResolveError::Replace {
      reason: "the result is not a map",
    }),
  }
}

struct ReplaceVisitor {
  value: StateValue,
}

impl StateVisitor for ReplaceVisitor {
  fn visit_last_map(
    &mut self,
    path: PathCursor,
    map: &StateMap,
  ) -> Result<Option<StateValue>, ResolveError> {
    let step = path.current();
    let Some(name) = step.name() else {
      return Err(ResolveError::NonIdentityStep { step: step.clone() });
    };
    let mut replaced = map.clone();
    replaced.insert(name.to_string(), self.value.clone());
    Ok(Some(StateValue::Map(replaced)))
  }

  fn visit_last_seq(
    &mut self,
    _path: PathCursor,
    _seq: &StateSeq,
  ) -> Result<Option<StateValue>, ResolveError> {
    Ok(None)
  }

  fn visit_next_map(
    &mut self,
    path: PathCursor,
    map: &StateMap,
  ) -> Result<Option<StateValue>, ResolveError> {
    let step = path.current();
    let Some(name) = step.name() else {
      return Err(ResolveError::NonIdentityStep { step: step.clone() });
    };
    let Some(value) = map.get(name) else {
      return Ok(None);
    };
    let result = visit_state(path, value, self)?;
    let mut replaced = map.clone();
    replaced.insert(name.to_string(), result.unwrap_or(StateValue::Null));
    Ok(Some(StateValue::Map(replaced)))
  }

  fn visit_next_seq(
    &mut self,
    path: PathCursor,
    seq: &StateSeq,
  ) -> Result<Option<StateValue>, ResolveError> {
    // numeric indices are not supported when replacing inside a sequence
    if path.current().index().is_some() {
      return Ok(None);
    }
    let mut replaced = StateSeq::with_capacity(seq.len());
    for element in seq {
      let result = visit_state(path, element, self)?;
      replaced.push(result.unwrap_or(StateValue::Null));
    }
    Ok(Some(StateValue::Seq(replaced)))
  }
}
