use super::ResolveError;
use crate::ast::Step;
use crate::state::{StateMap, StateSeq, StateValue};

/// Cursor over the steps of a path.
///
/// It is `Copy` and handed to visitors by value, so every visitor
/// invocation observes exactly the step it has to act on and recursion
/// into children never disturbs the caller's position.
#[derive(Clone, Copy)]
pub(crate) struct PathCursor<'p> {
  steps: &'p [Step],
  index: usize,
  started: bool,
}

impl<'p> PathCursor<'p> {
  pub(crate) fn new(steps: &'p [Step]) -> Self {
    Self {
      steps,
      index: 0,
      started: false,
    }
  }

  fn next_step(&mut self) {
    if !self.started {
      self.started = true;
    } else if self.has_more_steps() {
      self.index += 1;
    }
  }

  // Rewinds one step so sequence visitors re-apply the identity step to
  // every element.
  fn back_step(&mut self) {
    if self.index > 0 {
      self.index -= 1;
    }
  }

  pub(crate) fn has_more_steps(&self) -> bool {
    self.index + 1 < self.steps.len()
  }

  pub(crate) fn current(&self) -> &'p Step {
    &self.steps[self.index]
  }

  pub(crate) fn peek_next(&self) -> &'p Step {
    if self.has_more_steps() {
      &self.steps[self.index + 1]
    } else {
      self.current()
    }
  }
}

/// The four operations a resolver op implements over the state tree.
///
/// `visit_state` drives the structural traversal and dispatches on the
/// node type and on whether more steps remain; the visitor decides what
/// to produce and continues recursion by calling `visit_state` on a
/// child. `None` results model "nothing here" (a filter miss, an
/// unsupported position); errors are structural faults.
pub(crate) trait StateVisitor {
  fn visit_last_map(
    &mut self,
    path: PathCursor,
    map: &StateMap,
  ) -> Result<Option<StateValue>, ResolveError>;

  fn visit_last_seq(
    &mut self,
    path: PathCursor,
    seq: &StateSeq,
  ) -> Result<Option<StateValue>, ResolveError>;

  fn visit_next_map(
    &mut self,
    path: PathCursor,
    map: &StateMap,
  ) -> Result<Option<StateValue>, ResolveError>;

  fn visit_next_seq(
    &mut self,
    path: PathCursor,
    seq: &StateSeq,
  ) -> Result<Option<StateValue>, ResolveError>;
}

pub(crate) fn visit_state<V: StateVisitor>(
  mut path: PathCursor,
  state: &StateValue,
  visitor: &mut V,
) -> Result<Option<StateValue>, ResolveError> {
  path.next_step();
  match state {
    StateValue::Map(map) => {
      if path.has_more_steps() {
        if path.current().name().is_none() {
          return Err(ResolveError::NonIdentityStep {
            step: path.current().clone(),
          });
        }
        visitor.visit_next_map(path, map)
      } else {
        visitor.visit_last_map(path, map)
      }
    }
    StateValue::Seq(seq) => {
      if path.has_more_steps() || path.current().index().is_none() {
        if path.current().index().is_none() {
          path.back_step();
        }
        visitor.visit_next_seq(path, seq)
      } else {
        visitor.visit_last_seq(path, seq)
      }
    }
    scalar => Err(ResolveError::InvalidTypeForStep {
      kind: scalar.kind(),
      step: path.current().clone(),
    }),
  }
}
