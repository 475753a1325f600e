use chrono::{DateTime, Utc};

use std::collections::HashMap;

/// Version stamped into every [`MetaInfo`] produced by this engine.
pub const META_INFO_VERSION: &str = "0";

/// A policy: named capture expressions describing how to derive facts
/// from the current state, plus the desired state document the caller
/// wants realized, possibly containing embedded `{{ … }}` expressions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolicySpec {
  /// Capture expressions by capture name.
  pub capture: HashMap<String, String>,
  /// Desired state document, YAML or JSON.
  pub desired_state: Vec<u8>,
}

/// Metadata of one generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaInfo {
  pub version: String,
  pub timestamp: DateTime<Utc>,
}

impl MetaInfo {
  /// Fresh metadata stamped with the current wall clock.
  pub fn now() -> Self {
    Self {
      version: META_INFO_VERSION.to_string(),
      timestamp: Utc::now(),
    }
  }
}

/// A resolved capture as stored in the cache: the serialized sub-state
/// plus the metadata of the generation that produced it. Entries are
/// immutable once cached; the engine adopts them verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureState {
  pub state: Vec<u8>,
  pub meta_info: MetaInfo,
}

impl CaptureState {
  pub fn new(state: impl Into<Vec<u8>>, meta_info: MetaInfo) -> Self {
    Self {
      state: state.into(),
      meta_info,
    }
  }
}

/// Previously resolved captures by name. An empty cache is the
/// "no cache" sentinel.
pub type CaptureCache = HashMap<String, CaptureState>;

/// The output of a generation: the expanded desired state, the cache of
/// every capture it resolved, and the generation metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedState {
  pub cache: CaptureCache,
  pub desired_state: Vec<u8>,
  pub meta_info: MetaInfo,
}
