/*!
Declarative network state policy engine.

A policy pairs a desired state document with named capture expressions.
[`generate_state`] resolves every capture against the current state
document (reusing previously cached results), substitutes the embedded
`{{ … }}` expressions inside the desired state with the resolved
values, and returns the generated state together with a cache the
caller can feed back into the next generation.

```
use netpolicy::{generate_state, CaptureCache, PolicySpec};

let policy = PolicySpec {
  capture: [(
    "base-iface".to_string(),
    r#"interfaces.name == "eth1""#.to_string(),
  )]
  .into(),
  desired_state: br#"
interfaces:
- name: br1
  type: linux-bridge
  ipv4: "{{ capture.base-iface.interfaces[0].ipv4 }}"
"#
  .to_vec(),
};
let current = br#"
interfaces:
- name: eth1
  type: ethernet
  ipv4:
    address: 192.0.2.1
"#;

let generated = generate_state(&policy, current, CaptureCache::new()).unwrap();
let desired = String::from_utf8(generated.desired_state).unwrap();
assert!(desired.contains("address: 192.0.2.1"));
```
*/

mod capture;
mod expand;
mod types;

pub use capture::{Capturer, ResolvedCaptures};
pub use types::{CaptureCache, CaptureState, GeneratedState, MetaInfo, PolicySpec, META_INFO_VERSION};

pub use netpolicy_core::resolver::{ExpressionError, ResolveError, Resolver};
pub use netpolicy_core::state::StateValue;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum PolicyError {
  #[error("failed to parse current state document: {0}")]
  CurrentState(#[source] serde_yaml::Error),
  #[error("failed to parse desired state document: {0}")]
  DesiredState(#[source] serde_yaml::Error),
  #[error("failed to serialize state document: {0}")]
  Serialize(#[source] serde_yaml::Error),
  #[error("failed resolving capture `{name}`: {source}")]
  Capture {
    name: String,
    source: ExpressionError,
  },
  #[error("failed expanding expression `{expression}`: {source}")]
  Expression {
    expression: String,
    source: ExpressionError,
  },
  #[error("unterminated expression delimiter in `{0}`")]
  UnterminatedExpression(String),
}

/// Generates the state described by `policy` out of `current_state`.
///
/// `cache` carries captures resolved by previous generations; cached
/// entries are adopted verbatim and never recomputed. The returned
/// cache holds every capture of this generation, restricted to the
/// names the policy declares. With no declared captures the desired
/// state passes through byte for byte, whatever it contains.
pub fn generate_state(
  policy: &PolicySpec,
  current_state: &[u8],
  cache: CaptureCache,
) -> Result<GeneratedState, PolicyError> {
  generate_state_with_resolver(policy, current_state, cache, Resolver::new())
}

/// Same as [`generate_state`] with a custom configured expression
/// resolver, e.g. a non-default projection set for equality filters
/// (see [`Resolver::with_projection`]).
pub fn generate_state_with_resolver(
  policy: &PolicySpec,
  current_state: &[u8],
  cache: CaptureCache,
  resolver: Resolver,
) -> Result<GeneratedState, PolicyError> {
  let meta_info = MetaInfo::now();
  if policy.capture.is_empty() {
    return Ok(GeneratedState {
      cache: CaptureCache::new(),
      desired_state: policy.desired_state.clone(),
      meta_info,
    });
  }

  let capturer = Capturer::with_resolver(policy.capture.clone(), resolver);
  let mut resolved = capturer.resolve(&cache, current_state, &meta_info)?;
  debug!(
    captures = resolved.capture_states().len(),
    "resolved policy captures"
  );

  let desired_state = if policy.desired_state.is_empty() {
    Vec::new()
  } else {
    expand::expand(&policy.desired_state, &mut resolved)?
  };
  Ok(GeneratedState {
    cache: resolved.into_cache(),
    desired_state,
    meta_info,
  })
}
