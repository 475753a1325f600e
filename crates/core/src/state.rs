use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;

pub type StateMap = BTreeMap<String, StateValue>;
pub type StateSeq = Vec<StateValue>;

/// A schemaless state document.
///
/// YAML and JSON documents both deserialize into this tree and every
/// engine operation is defined over it. `Int` and `Float` are distinct
/// variants so filters can tell a numeric `mtu: 1500` apart from the
/// string `"1500"`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(String),
  Seq(StateSeq),
  Map(StateMap),
}

impl StateValue {
  /// Variant name used in diagnostics.
  pub fn kind(&self) -> &'static str {
    match self {
      StateValue::Null => "null",
      StateValue::Bool(_) => "boolean",
      StateValue::Int(_) => "integer",
      StateValue::Float(_) => "float",
      StateValue::Str(_) => "string",
      StateValue::Seq(_) => "sequence",
      StateValue::Map(_) => "map",
    }
  }

  /// Whether `other` holds the same variant.
  pub fn same_kind(&self, other: &StateValue) -> bool {
    std::mem::discriminant(self) == std::mem::discriminant(other)
  }

  pub fn as_map(&self) -> Option<&StateMap> {
    match self {
      StateValue::Map(map) => Some(map),
      _ => None,
    }
  }

  pub fn as_seq(&self) -> Option<&StateSeq> {
    match self {
      StateValue::Seq(seq) => Some(seq),
      _ => None,
    }
  }

  /// Parses a YAML (or JSON, which rides through the YAML codec) document.
  ///
  /// An empty document yields an empty map so lookups against a zero-value
  /// state miss cleanly instead of failing on the document type.
  pub fn from_yaml(bytes: &[u8]) -> Result<Self, serde_yaml::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
      return Ok(StateValue::default());
    }
    serde_yaml::from_slice(bytes)
  }

  /// Serializes the tree back into a YAML document. Maps are backed by
  /// `BTreeMap`, so the emitted key order is alphabetical and stable.
  pub fn to_yaml(&self) -> Result<Vec<u8>, serde_yaml::Error> {
    serde_yaml::to_string(self).map(String::into_bytes)
  }
}

impl Default for StateValue {
  fn default() -> Self {
    StateValue::Map(StateMap::new())
  }
}

impl From<&str> for StateValue {
  fn from(value: &str) -> Self {
    StateValue::Str(value.to_string())
  }
}

impl From<String> for StateValue {
  fn from(value: String) -> Self {
    StateValue::Str(value)
  }
}

impl From<i64> for StateValue {
  fn from(value: i64) -> Self {
    StateValue::Int(value)
  }
}

impl From<bool> for StateValue {
  fn from(value: bool) -> Self {
    StateValue::Bool(value)
  }
}
