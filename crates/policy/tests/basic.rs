use netpolicy::{
  generate_state, generate_state_with_resolver, CaptureCache, CaptureState, MetaInfo, PolicyError,
  PolicySpec, Resolver, StateValue,
};

use std::collections::HashMap;

const CURRENT_STATE: &[u8] = b"
interfaces:
- name: eth1
  type: ethernet
  state: up
  ipv4:
    address: 192.16.1.10
- name: br1
  type: linux-bridge
  state: down
routes:
  running:
  - destination: 0.0.0.0/0
    next-hop-interface: eth1
";

fn policy(captures: &[(&str, &str)], desired_state: &str) -> PolicySpec {
  PolicySpec {
    capture: captures
      .iter()
      .map(|(name, expression)| (name.to_string(), expression.to_string()))
      .collect(),
    desired_state: desired_state.as_bytes().to_vec(),
  }
}

fn parsed(bytes: &[u8]) -> StateValue {
  StateValue::from_yaml(bytes).expect("state should parse")
}

#[test]
fn empty_policy() {
  let generated = generate_state(&PolicySpec::default(), b"", CaptureCache::new()).unwrap();
  assert_eq!(generated.meta_info.version, "0");
  assert!(generated.desired_state.is_empty());
  assert!(generated.cache.is_empty());
}

#[test]
fn desired_state_passes_through_untouched() {
  // without captures the desired state is not even parsed
  let spec = policy(&[], "this is not a legal yaml format!");
  let generated = generate_state(&spec, b"", CaptureCache::new()).unwrap();
  assert_eq!(generated.desired_state, spec.desired_state);
  assert!(generated.cache.is_empty());
}

#[test]
fn filter_capture_selects_matching_interface() -> anyhow::Result<()> {
  let spec = policy(&[("ethers", r#"interfaces.type == "ethernet""#)], "");
  let generated = generate_state(&spec, CURRENT_STATE, CaptureCache::new())?;
  assert_eq!(
    parsed(&generated.cache["ethers"].state),
    parsed(
      b"
interfaces:
- name: eth1
  type: ethernet
  state: up
  ipv4:
    address: 192.16.1.10
"
    )
  );
  Ok(())
}

#[test]
fn embedded_expression_splices_resolved_state() -> anyhow::Result<()> {
  let spec = policy(
    &[("base-iface", r#"interfaces.name == "eth1""#)],
    r#"
interfaces:
- name: br1
  type: linux-bridge
  state: up
  ipv4: "{{ capture.base-iface.interfaces[0].ipv4 }}"
  bridge:
    port:
    - name: "{{ capture.base-iface.interfaces[0].name }}"
"#,
  );
  let generated = generate_state(&spec, CURRENT_STATE, CaptureCache::new())?;
  let desired = parsed(&generated.desired_state);
  let interfaces = desired.as_map().unwrap()["interfaces"].as_seq().unwrap();
  let bridge = interfaces[0].as_map().unwrap();
  assert_eq!(bridge["ipv4"], parsed(b"address: 192.16.1.10"));
  assert_eq!(bridge["bridge"], parsed(b"port:\n- name: eth1"));
  Ok(())
}

#[test]
fn replace_capture_rewrites_leaf() {
  let spec = policy(
    &[(
      "bridge-routes",
      r#"routes.running.next-hop-interface := "br1""#,
    )],
    "",
  );
  let generated = generate_state(&spec, CURRENT_STATE, CaptureCache::new()).unwrap();
  assert_eq!(
    parsed(&generated.cache["bridge-routes"].state)
      .as_map()
      .unwrap()["routes"],
    parsed(b"running:\n- destination: 0.0.0.0/0\n  next-hop-interface: br1"),
  );
}

#[test]
fn chained_captures_resolve_once_and_both_land_in_cache() {
  let spec = policy(
    &[
      ("default-gw", r#"routes.running.destination == "0.0.0.0/0""#),
      (
        "base-iface",
        "interfaces.name == capture.default-gw.routes.running[0].next-hop-interface",
      ),
    ],
    "",
  );
  let generated = generate_state(&spec, CURRENT_STATE, CaptureCache::new()).unwrap();
  assert_eq!(generated.cache.len(), 2);
  assert_eq!(
    parsed(&generated.cache["base-iface"].state)
      .as_map()
      .unwrap()["interfaces"]
      .as_seq()
      .unwrap()[0]
      .as_map()
      .unwrap()["name"],
    StateValue::from("eth1"),
  );
}

#[test]
fn cached_captures_are_adopted_not_recomputed() {
  let spec = policy(
    &[("base-iface", "would not even lex |||")],
    r#"name: "{{ capture.base-iface.interfaces[0].name }}""#,
  );
  let mut cache = CaptureCache::new();
  cache.insert(
    "base-iface".to_string(),
    CaptureState::new(
      b"interfaces:\n- name: eth7\n".to_vec(),
      MetaInfo::now(),
    ),
  );
  let generated = generate_state(&spec, CURRENT_STATE, cache.clone()).unwrap();
  assert_eq!(generated.cache["base-iface"], cache["base-iface"]);
  assert_eq!(
    parsed(&generated.desired_state),
    parsed(b"name: eth7"),
  );
}

#[test]
fn cache_entries_not_in_policy_are_dropped() {
  let spec = policy(&[("keep", "interfaces[0].name")], "");
  let mut cache = CaptureCache::new();
  cache.insert(
    "stale".to_string(),
    CaptureState::new(b"gone: true".to_vec(), MetaInfo::now()),
  );
  let generated = generate_state(&spec, CURRENT_STATE, cache).unwrap();
  assert_eq!(generated.cache.len(), 1);
  assert!(generated.cache.contains_key("keep"));
}

#[test]
fn generation_reuses_cache_across_invocations() {
  let spec = policy(&[("ethers", r#"interfaces.type == "ethernet""#)], "");
  let first = generate_state(&spec, CURRENT_STATE, CaptureCache::new()).unwrap();
  // second run with a different current state: the cached capture wins
  let second = generate_state(&spec, b"interfaces: []", first.cache.clone()).unwrap();
  assert_eq!(second.cache["ethers"], first.cache["ethers"]);
}

#[test]
fn capture_cycle_is_detected() {
  let spec = policy(
    &[
      ("a", "interfaces.name == capture.b.interfaces[0].name"),
      ("b", "interfaces.name == capture.a.interfaces[0].name"),
    ],
    "",
  );
  let err = generate_state(&spec, CURRENT_STATE, CaptureCache::new()).unwrap_err();
  assert!(err.to_string().contains("circular capture reference"));
}

#[test]
fn filter_type_mismatch_fails_generation() {
  let current = b"
interfaces:
- name: eth1
  mtu: 1500
";
  let spec = policy(&[("jumbo", r#"interfaces.mtu == "1500""#)], "");
  let err = generate_state(&spec, current, CaptureCache::new()).unwrap_err();
  assert!(matches!(err, PolicyError::Capture { ref name, .. } if name == "jumbo"));
  assert!(err.to_string().contains("type mismatch"));
}

#[test]
fn current_state_is_never_mutated() {
  let spec = policy(
    &[("ethers", r#"interfaces.type == "ethernet""#)],
    r#"ipv4: "{{ capture.ethers.interfaces[0].ipv4 }}""#,
  );
  let first = generate_state(&spec, CURRENT_STATE, CaptureCache::new()).unwrap();
  let second = generate_state(&spec, CURRENT_STATE, CaptureCache::new()).unwrap();
  assert_eq!(first.desired_state, second.desired_state);
  assert_eq!(
    strip_meta(first.cache),
    strip_meta(second.cache),
  );
}

#[test]
fn empty_desired_state_stays_empty() {
  let spec = policy(&[("ethers", r#"interfaces.type == "ethernet""#)], "");
  let generated = generate_state(&spec, CURRENT_STATE, CaptureCache::new()).unwrap();
  assert!(generated.desired_state.is_empty());
  assert_eq!(generated.cache.len(), 1);
}

#[test]
fn custom_projection_changes_filter_collapse() -> anyhow::Result<()> {
  let current = b"
tiers:
- level: 1
  kind: gold
- level: 2
  kind: silver
";
  let spec = policy(&[("golds", r#"tiers.kind == "gold""#)], "");

  // under the default projection `tiers` is not whitelisted, so the
  // non-matching element is preserved
  let generated = generate_state(&spec, current, CaptureCache::new())?;
  assert_eq!(
    parsed(&generated.cache["golds"].state)
      .as_map()
      .unwrap()["tiers"]
      .as_seq()
      .unwrap()
      .len(),
    2,
  );

  // a projection naming `tiers` collapses it to the matching subset
  let resolver = Resolver::with_projection(["tiers"]);
  let generated = generate_state_with_resolver(&spec, current, CaptureCache::new(), resolver)?;
  assert_eq!(
    parsed(&generated.cache["golds"].state),
    parsed(b"tiers:\n- level: 1\n  kind: gold"),
  );
  Ok(())
}

#[test]
fn meta_info_is_stamped_on_fresh_captures() {
  let spec = policy(&[("ethers", r#"interfaces.type == "ethernet""#)], "");
  let generated = generate_state(&spec, CURRENT_STATE, CaptureCache::new()).unwrap();
  assert_eq!(
    generated.cache["ethers"].meta_info,
    generated.meta_info,
  );
}

fn strip_meta(cache: CaptureCache) -> HashMap<String, Vec<u8>> {
  cache
    .into_iter()
    .map(|(name, capture)| (name, capture.state))
    .collect()
}
