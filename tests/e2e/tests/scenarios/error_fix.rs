//! Error canonicalization, fingerprint wiring, and fix recall

use engram_e2e_tests::harness::{at, TestEngine};
use engram_core::normalize;

const RAW_ERROR: &str = "TypeError: cannot read 'token' of undefined";
const FINGERPRINT: &str = "TYPE_ERROR|property_access";

#[test]
fn record_error_creates_normalized_and_fingerprint_neurons() {
    let mut h = TestEngine::new();
    let (neuron, _) = h
        .engine
        .record_error(RAW_ERROR, Some("login flow"), Some(at(0)))
        .unwrap();

    assert_eq!(neuron.path, normalize(RAW_ERROR));
    assert_eq!(neuron.id, format!("error:{}", normalize(RAW_ERROR)));

    let fp = h
        .engine
        .store()
        .get_neuron(&format!("error:{}", FINGERPRINT))
        .unwrap()
        .expect("fingerprint neuron must exist");
    assert_eq!(fp.path, FINGERPRINT);

    // Strong bidirectional wiring between error and fingerprint
    let forward = h.weight(&neuron.id, &fp.id).unwrap();
    let reverse = h.weight(&fp.id, &neuron.id).unwrap();
    assert!((forward - 0.85).abs() < 1e-9);
    assert!((reverse - 0.85).abs() < 1e-9);
}

#[test]
fn resolve_wires_fixes_to_error_and_fingerprint() {
    let mut h = TestEngine::new();
    h.engine
        .record_error(RAW_ERROR, None, Some(at(0)))
        .unwrap();
    h.engine
        .resolve_error(
            RAW_ERROR,
            &["/auth.ts".to_string(), "/session.ts".to_string()],
            Some("token fix"),
        )
        .unwrap();

    let error_id = format!("error:{}", normalize(RAW_ERROR));
    let fp_id = format!("error:{}", FINGERPRINT);
    for fix in ["file:/auth.ts", "file:/session.ts"] {
        for err in [error_id.as_str(), fp_id.as_str()] {
            let forward = h.weight(err, fix).unwrap();
            let reverse = h.weight(fix, err).unwrap();
            assert!((forward - 0.85).abs() < 1e-9, "{} -> {}: {}", err, fix, forward);
            assert!((reverse - 0.85).abs() < 1e-9, "{} -> {}: {}", fix, err, reverse);
        }
    }
    h.assert_invariants();
}

#[test]
fn different_error_same_family_finds_fixes_via_fingerprint() {
    let mut h = TestEngine::new();
    h.engine
        .record_error(RAW_ERROR, None, Some(at(0)))
        .unwrap();
    h.engine
        .resolve_error(
            RAW_ERROR,
            &["/auth.ts".to_string(), "/session.ts".to_string()],
            None,
        )
        .unwrap();

    // Syntactically different TypeError, same TYPE|OPERATION family
    let other = "TypeError: Cannot read properties of undefined (reading 'id')";
    assert_ne!(normalize(other), normalize(RAW_ERROR));

    let (_, fixes) = h.engine.record_error(other, None, Some(at(60))).unwrap();
    let label = format!("fingerprint: {}", FINGERPRINT);
    for fix_path in ["/auth.ts", "/session.ts"] {
        let hit = fixes
            .iter()
            .find(|r| r.neuron.path == fix_path)
            .unwrap_or_else(|| panic!("{} missing from potential fixes", fix_path));
        assert_eq!(hit.activation_path, label);
        assert!(hit.confidence >= 0.4);
    }
}

#[test]
fn empty_inputs_are_rejected_without_mutation() {
    let mut h = TestEngine::new();
    assert!(h.engine.record_error("   ", None, None).is_err());
    assert!(h
        .engine
        .resolve_error(RAW_ERROR, &[], None)
        .is_err());
    let stats = h.engine.stats().unwrap();
    assert_eq!(stats.error_neurons, 0);
}
