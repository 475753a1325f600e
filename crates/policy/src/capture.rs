use crate::types::{CaptureCache, CaptureState, MetaInfo};
use crate::PolicyError;

use netpolicy_core::lexer::Lexer;
use netpolicy_core::parser::Parser;
use netpolicy_core::resolver::{CaptureLookup, ExpressionError, ResolveError, Resolver};
use netpolicy_core::state::StateValue;

use tracing::debug;

use std::collections::HashMap;

/// Resolves named capture expressions against a current state document,
/// honoring previously cached results.
///
/// Expressions referencing other captures through the `capture.<name>`
/// prefix are resolved on demand and memoized, so each capture is
/// resolved at most once per session regardless of how many expressions
/// reference it. Revisiting an in-progress capture is reported as a
/// circular reference instead of recursing forever.
pub struct Capturer {
  expressions: HashMap<String, String>,
  resolver: Resolver,
}

impl Capturer {
  pub fn new(expressions: HashMap<String, String>) -> Self {
    Self {
      expressions,
      resolver: Resolver::new(),
    }
  }

  /// Same as [`Capturer::new`] with a custom configured resolver, e.g.
  /// a non-default projection set.
  pub fn with_resolver(expressions: HashMap<String, String>, resolver: Resolver) -> Self {
    Self {
      expressions,
      resolver,
    }
  }

  /// Resolves every expression and returns the session result. Cached
  /// entries are adopted byte for byte and never recomputed; cache
  /// entries not named by any expression are dropped. Fresh entries are
  /// stamped with `meta_info`.
  pub fn resolve(
    self,
    cache: &CaptureCache,
    current_state: &[u8],
    meta_info: &MetaInfo,
  ) -> Result<ResolvedCaptures, PolicyError> {
    if self.expressions.is_empty() {
      return Ok(ResolvedCaptures::empty(self.resolver));
    }
    if current_state.is_empty() && cache.is_empty() {
      return Ok(ResolvedCaptures::empty(self.resolver));
    }

    let current =
      StateValue::from_yaml(current_state).map_err(PolicyError::CurrentState)?;
    let mut session = Session {
      expressions: &self.expressions,
      cache,
      resolver: &self.resolver,
      current: &current,
      resolved: HashMap::new(),
      visiting: Vec::new(),
    };
    for name in self.expressions.keys() {
      if cache.contains_key(name) {
        debug!(capture = name.as_str(), "adopting cached capture");
        continue;
      }
      session
        .resolve_entry(name)
        .map_err(|source| PolicyError::Capture {
          name: name.clone(),
          source,
        })?;
    }
    let trees = session.resolved;

    let mut states = HashMap::new();
    for name in self.expressions.keys() {
      let state = match cache.get(name) {
        Some(cached) => cached.clone(),
        None => {
          let tree = &trees[name];
          CaptureState::new(
            tree.to_yaml().map_err(PolicyError::Serialize)?,
            meta_info.clone(),
          )
        }
      };
      states.insert(name.clone(), state);
    }
    Ok(ResolvedCaptures {
      current,
      resolver: self.resolver,
      store: CaptureStore { states, trees },
    })
  }
}

/// The outcome of a capture resolution session: per-name capture states
/// for the output cache, plus the parsed trees and the current state so
/// desired-state expansion can evaluate embedded expressions without
/// re-deserializing anything.
#[derive(Debug)]
pub struct ResolvedCaptures {
  pub(crate) current: StateValue,
  pub(crate) resolver: Resolver,
  pub(crate) store: CaptureStore,
}

impl ResolvedCaptures {
  fn empty(resolver: Resolver) -> Self {
    Self {
      current: StateValue::default(),
      resolver,
      store: CaptureStore {
        states: HashMap::new(),
        trees: HashMap::new(),
      },
    }
  }

  pub fn capture_states(&self) -> &HashMap<String, CaptureState> {
    &self.store.states
  }

  pub fn into_cache(self) -> CaptureCache {
    self.store.states
  }
}

/// Capture states by name, with lazily parsed trees. Cached entries are
/// only deserialized when something actually references them.
#[derive(Debug)]
pub(crate) struct CaptureStore {
  states: HashMap<String, CaptureState>,
  trees: HashMap<String, StateValue>,
}

impl CaptureLookup for CaptureStore {
  fn resolve_capture(&mut self, name: &str) -> Result<StateValue, ResolveError> {
    if let Some(tree) = self.trees.get(name) {
      return Ok(tree.clone());
    }
    let Some(entry) = self.states.get(name) else {
      return Err(ResolveError::UnknownCapture(name.to_string()));
    };
    let tree =
      StateValue::from_yaml(&entry.state).map_err(|err| ResolveError::CapturedState {
        name: name.to_string(),
        reason: err.to_string(),
      })?;
    self.trees.insert(name.to_string(), tree.clone());
    Ok(tree)
  }
}

// One resolution pass over a set of expressions. `resolved` doubles as
// the memoization table and `visiting` as the cycle detector: a name on
// the visiting stack that is asked for again closes a cycle.
struct Session<'a> {
  expressions: &'a HashMap<String, String>,
  cache: &'a CaptureCache,
  resolver: &'a Resolver,
  current: &'a StateValue,
  resolved: HashMap<String, StateValue>,
  visiting: Vec<String>,
}

impl Session<'_> {
  fn resolve_entry(&mut self, name: &str) -> Result<StateValue, ExpressionError> {
    if let Some(tree) = self.resolved.get(name) {
      return Ok(tree.clone());
    }
    if let Some(cached) = self.cache.get(name) {
      let tree =
        StateValue::from_yaml(&cached.state).map_err(|err| ResolveError::CapturedState {
          name: name.to_string(),
          reason: err.to_string(),
        })?;
      self.resolved.insert(name.to_string(), tree.clone());
      return Ok(tree);
    }
    let Some(source) = self.expressions.get(name) else {
      return Err(ResolveError::UnknownCapture(name.to_string()).into());
    };
    if let Some(start) = self.visiting.iter().position(|visited| visited == name) {
      return Err(ResolveError::CaptureCycle(self.visiting[start..].to_vec()).into());
    }

    self.visiting.push(name.to_string());
    let tokens = Lexer::new(source).lex()?;
    let expression = Parser::new(&tokens).parse()?;
    let resolver = self.resolver;
    let current = self.current;
    let tree = resolver.resolve(&expression, current, self)?;
    self.visiting.pop();
    debug!(capture = name, "resolved capture expression");
    self.resolved.insert(name.to_string(), tree.clone());
    Ok(tree)
  }
}

impl CaptureLookup for Session<'_> {
  fn resolve_capture(&mut self, name: &str) -> Result<StateValue, ResolveError> {
    self.resolve_entry(name).map_err(|err| match err {
      // these keep their kind so callers can tell them apart
      ExpressionError::Resolve(
        inner @ (ResolveError::UnknownCapture(_) | ResolveError::CaptureCycle(_)),
      ) => inner,
      other => ResolveError::Capture {
        name: name.to_string(),
        source: Box::new(other),
      },
    })
  }
}
