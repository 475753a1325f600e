use super::path::{visit_state, PathCursor, StateVisitor};
use super::ResolveError;
use crate::ast::Step;
use crate::state::{StateMap, StateSeq, StateValue};

/// Read-only lookup of the value a path points at.
pub(super) fn walk(state: &StateValue, steps: &[Step]) -> Result<StateValue, ResolveError> {
  let result = visit_state(PathCursor::new(steps), state, &mut WalkVisitor)?;
  Ok(result.unwrap_or(StateValue::Null))
}

struct WalkVisitor;

impl StateVisitor for WalkVisitor {
  fn visit_last_map(
    &mut self,
    path: PathCursor,
    map: &StateMap,
  ) -> Result<Option<StateValue>, ResolveError> {
    let step = path.current();
    let Some(name) = step.name() else {
      return Err(ResolveError::NonIdentityStep { step: step.clone() });
    };
    match map.get(name) {
      Some(value) => Ok(Some(value.clone())),
      None => Err(ResolveError::StepNotFound { step: step.clone() }),
    }
  }

  fn visit_last_seq(
    &mut self,
    path: PathCursor,
    seq: &StateSeq,
  ) -> Result<Option<StateValue>, ResolveError> {
    let step = path.current();
    let Some(index) = step.index() else {
      return Err(ResolveError::NonNumericStep { step: step.clone() });
    };
    match seq.get(index) {
      Some(value) => Ok(Some(value.clone())),
      None => Err(ResolveError::StepNotFound { step: step.clone() }),
    }
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
      return Err(ResolveError::StepNotFound { step: step.clone() });
    };
    visit_state(path, value, self).map_err(|err| err.at_step(step))
  }

  fn visit_next_seq(
    &mut self,
    path: PathCursor,
    seq: &StateSeq,
  ) -> Result<Option<StateValue>, ResolveError> {
    let step = path.current();
    let Some(index) = step.index() else {
      // the cursor was rewound, the offending step is the next one
      return Err(ResolveError::NonNumericStep {
        step: path.peek_next().clone(),
      });
    };
    let Some(value) = seq.get(index) else {
      return Err(ResolveError::StepNotFound { step: step.clone() });
    };
    visit_state(path, value, self).map_err(|err| err.at_step(step))
  }
}
