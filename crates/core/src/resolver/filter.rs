use super::path::{visit_state, PathCursor, StateVisitor};
use super::ResolveError;
use crate::ast::{Path, Step};
use crate::state::{StateMap, StateSeq, StateValue};

use std::collections::HashSet;

/// Selects the sub-states where the leaf the path points at equals
/// `expected`. Steps named in `projection` collapse their container to
/// the matching subset; all other steps preserve sibling keys and
/// non-matching elements.
pub(super) fn filter(
  state: &StateValue,
  lhs: &Path,
  expected: &StateValue,
  projection: &HashSet<String>,
) -> Result<StateValue, ResolveError> {
  let mut visitor = EqFilterVisitor {
    expected,
    projection,
  };
  let filtered = visit_state(PathCursor::new(&lhs.steps), state, &mut visitor)?;
  match filtered {
    None => Ok(StateValue::Null),
    Some(filtered @ StateValue::Map(_)) => Ok(filtered),
    Some(other) => Err(ResolveError::NotAMap {
      op: "filter",
      kind: other.kind(),
    }),
  }
}

struct EqFilterVisitor<'a> {
  expected: &'a StateValue,
  projection: &'a HashSet<String>,
}

impl EqFilterVisitor<'_> {
  fn collapses(&self, step: &Step) -> bool {
    match step.name() {
      Some(name) => self.projection.contains(name),
      None => false,
    }
  }
}

impl StateVisitor for EqFilterVisitor<'_> {
  fn visit_last_map(
    &mut self,
    path: PathCursor,
    map: &StateMap,
  ) -> Result<Option<StateValue>, ResolveError> {
    let step = path.current();
    let Some(name) = step.name() else {
      return Err(ResolveError::NonIdentityStep { step: step.clone() });
    };
    let Some(obtained) = map.get(name) else {
      return Ok(None);
    };
    if !obtained.same_kind(self.expected) {
      return Err(ResolveError::TypeMismatch {
        obtained: obtained.kind(),
        expected: self.expected.kind(),
      });
    }
    if obtained == self.expected {
      Ok(Some(StateValue::Map(map.clone())))
    } else {
      Ok(None)
    }
  }

  fn visit_last_seq(
    &mut self,
    _path: PathCursor,
    _seq: &StateSeq,
  ) -> Result<Option<StateValue>, ResolveError> {
    // no numeric leaf comparison on sequences
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
    let Some(filtered) = visit_state(path, value, self)? else {
      return Ok(None);
    };
    let mut result = if self.collapses(step) {
      StateMap::new()
    } else {
      map.clone()
    };
    result.insert(name.to_string(), filtered);
    Ok(Some(StateValue::Map(result)))
  }

  fn visit_next_seq(
    &mut self,
    path: PathCursor,
    seq: &StateSeq,
  ) -> Result<Option<StateValue>, ResolveError> {
    let step = path.current();
    if step.index().is_some() {
      return Ok(None);
    }
    let mut filtered = StateSeq::new();
    let mut has_match = false;
    for element in seq {
      match visit_state(path, element, self)? {
        Some(matched) => {
          has_match = true;
          filtered.push(matched);
        }
        None if !self.collapses(step) => filtered.push(element.clone()),
        None => {}
      }
    }
    if has_match {
      Ok(Some(StateValue::Seq(filtered)))
    } else {
      Ok(None)
    }
  }
}
