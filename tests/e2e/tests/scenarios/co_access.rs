//! Co-access wiring: synapse birth, tag-and-capture, window eviction

use engram_e2e_tests::harness::{at, TestEngine};

#[test]
fn single_co_access_creates_floored_tagged_pair() {
    let mut h = TestEngine::new();
    h.file("/a", Some("auth work"), at(0));
    h.file("/b", Some("auth work"), at(10));

    for (source, target) in [("file:/a", "file:/b"), ("file:/b", "file:/a")] {
        let synapse = h
            .engine
            .store()
            .get_synapse(source, target)
            .unwrap()
            .expect("co-access must create both directions");
        // First co-access lands at the capture floor, not the raw Hebbian delta
        assert!((synapse.weight - 0.3).abs() < 1e-9, "weight {}", synapse.weight);
        assert_eq!(synapse.co_access_count, 1);
        // Born tagged at the recording time
        assert_eq!(synapse.tagged_at, Some(at(10)));
    }
    h.assert_invariants();
}

#[test]
fn touching_either_endpoint_captures_the_tag() {
    let mut h = TestEngine::new();
    h.file("/a", Some("auth work"), at(0));
    h.file("/b", Some("auth work"), at(10));

    // A later record within the capture window clears the tag and keeps the floor
    h.file("/a", None, at(20));

    for (source, target) in [("file:/a", "file:/b"), ("file:/b", "file:/a")] {
        let synapse = h
            .engine
            .store()
            .get_synapse(source, target)
            .unwrap()
            .unwrap();
        assert!(synapse.tagged_at.is_none(), "tag should be captured");
        assert!(synapse.weight >= 0.3);
    }
    // The touch also strengthened the pair past the floor
    assert!(h.weight("file:/a", "file:/b").unwrap() > 0.3);
}

#[test]
fn symmetric_pattern_keeps_directions_equal() {
    let mut h = TestEngine::new();
    for i in 0..6 {
        h.file("/left", None, at(i * 20));
        h.file("/right", None, at(i * 20 + 10));
    }
    let forward = h.weight("file:/left", "file:/right").unwrap();
    let reverse = h.weight("file:/right", "file:/left").unwrap();
    assert!((forward - reverse).abs() < 1e-9);
    assert!(forward > 0.3);
}

#[test]
fn window_evicts_after_twenty_five_distinct_neurons() {
    let mut h = TestEngine::new();
    for i in 1..=26 {
        h.file(&format!("/f{}", i), None, at(i * 10));
    }

    // The 26th record displaced the 1st before peers were wired
    assert!(h.weight("file:/f1", "file:/f26").is_none());
    assert!(h.weight("file:/f26", "file:/f1").is_none());

    // Still-resident peers did get wired
    assert!(h.weight("file:/f25", "file:/f26").is_some());
    assert!(h.weight("file:/f2", "file:/f26").is_some());
    h.assert_invariants();
}

#[test]
fn access_log_rows_match_access_count() {
    let mut h = TestEngine::new();
    let mut neuron = h.file("/counted", None, at(0));
    for i in 1..7 {
        neuron = h.file("/counted", None, at(i * 10));
    }
    assert_eq!(neuron.access_count, 7);
    let rows = h
        .engine
        .store()
        .access_rows_for_neuron("file:/counted")
        .unwrap();
    assert_eq!(rows, 7);
}

#[test]
fn contexts_stay_capped_and_deduplicated() {
    let mut h = TestEngine::new();
    let mut neuron = h.file("/ctx", Some("q0"), at(0));
    for i in 1..25 {
        neuron = h.file("/ctx", Some(&format!("q{}", i)), at(i * 10));
    }
    // Re-adding an existing context is a no-op
    neuron = h.file("/ctx", Some("q24"), at(300));

    assert_eq!(neuron.contexts.len(), 20);
    // Trimmed from the front: the oldest queries are gone
    assert_eq!(neuron.contexts.first().map(String::as_str), Some("q5"));
    assert_eq!(neuron.contexts.last().map(String::as_str), Some("q24"));
}
