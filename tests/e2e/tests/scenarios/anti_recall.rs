//! Anti-recall: suggested-but-ignored files lose their edges

use engram_core::NeuronType;
use engram_e2e_tests::harness::TestEngine;

fn setup() -> TestEngine {
    let mut h = TestEngine::new();
    h.engine
        .seed_neuron("/x", NeuronType::File, Some("xray investigation"))
        .unwrap();
    h.engine
        .seed_neuron("/y", NeuronType::File, Some("yaml parser"))
        .unwrap();
    h.engine.seed_synapse("/x", "/y", 0.8, None).unwrap();
    // Fan /y out so spreading dilutes below the gate: only /x gets recalled,
    // and only /x's ignores drive the weakening
    for i in 0..5 {
        h.engine.seed_synapse("/y", &format!("/z{}", i), 0.5, None).unwrap();
    }
    h
}

/// Recall /x without ever opening it
fn recall_x(h: &mut TestEngine) {
    let results = h.engine.recall("xray investigation").unwrap();
    assert!(
        results.iter().any(|r| r.neuron.path == "/x"),
        "/x must be recalled for the scenario to apply"
    );
    assert!(
        results.iter().all(|r| r.neuron.path != "/y"),
        "/y must stay below the gate"
    );
}

#[test]
fn ignored_recalls_escalate_and_never_cross_the_floor() {
    let mut h = setup();

    let expected = [0.72, 0.5832, 0.4252];
    let mut previous = 0.8;
    for (round, expect) in expected.iter().enumerate() {
        recall_x(&mut h);
        h.engine.rotate_session(None).unwrap();

        let neuron = h.engine.store().get_neuron("file:/x").unwrap().unwrap();
        assert_eq!(neuron.ignore_streak, round as i64 + 1);

        let weight = h.weight("file:/x", "file:/y").unwrap();
        assert!(weight < previous, "weight must keep falling");
        assert!(
            (weight - expect).abs() < 1e-6,
            "round {}: expected {} got {}",
            round + 1,
            expect,
            weight
        );
        // Both directions are incident, both weaken
        let reverse = h.weight("file:/y", "file:/x").unwrap();
        assert!((reverse - weight).abs() < 1e-9);
        previous = weight;
    }

    // Keep ignoring: the floor holds
    for _ in 0..10 {
        recall_x(&mut h);
        h.engine.rotate_session(None).unwrap();
    }
    let weight = h.weight("file:/x", "file:/y").unwrap();
    assert!(weight >= 0.1 - 1e-9, "floor crossed: {}", weight);
    assert!((weight - 0.1).abs() < 1e-3, "should sit at the floor: {}", weight);
}

#[test]
fn opening_an_ignored_file_resets_the_streak() {
    let mut h = setup();
    for _ in 0..2 {
        recall_x(&mut h);
        h.engine.rotate_session(None).unwrap();
    }
    assert_eq!(
        h.engine.store().get_neuron("file:/x").unwrap().unwrap().ignore_streak,
        2
    );

    // Actually opening the file forgives the history
    let neuron = h
        .engine
        .record("/x", NeuronType::File, None, None)
        .unwrap();
    assert_eq!(neuron.ignore_streak, 0);
    assert_eq!(
        h.engine.store().get_neuron("file:/x").unwrap().unwrap().ignore_streak,
        0
    );
}

#[test]
fn flat_variant_does_not_touch_streaks() {
    let mut h = setup();
    recall_x(&mut h);
    let processed = h.engine.apply_anti_recall_flat().unwrap();
    assert_eq!(processed, 1);

    let neuron = h.engine.store().get_neuron("file:/x").unwrap().unwrap();
    assert_eq!(neuron.ignore_streak, 0);
    let weight = h.weight("file:/x", "file:/y").unwrap();
    assert!((weight - 0.72).abs() < 1e-9);
}

#[test]
fn opened_files_are_not_penalized() {
    let mut h = setup();
    recall_x(&mut h);
    // Open it in the same session
    h.engine.record("/x", NeuronType::File, None, None).unwrap();
    h.engine.rotate_session(None).unwrap();

    let weight = h.weight("file:/x", "file:/y").unwrap();
    assert!((weight - 0.8).abs() < 1e-9, "opened file must keep its edges");
}
