//! BCM myelination growth and SNAP weight freezing

use engram_e2e_tests::harness::{at, TestEngine};

#[test]
fn myelination_grows_with_diminishing_deltas() {
    let mut h = TestEngine::new();

    let mut myelinations = Vec::new();
    for i in 0..10 {
        let neuron = h.file("/m", None, at(i * 10));
        myelinations.push(neuron.myelination);
    }

    let final_neuron = h.engine.store().get_neuron("file:/m").unwrap().unwrap();
    assert_eq!(final_neuron.access_count, 10);

    // Starts at zero, strictly monotone increasing afterwards
    assert_eq!(myelinations[0], 0.0);
    for pair in myelinations.windows(2) {
        assert!(pair[1] > pair[0], "myelination must grow: {:?}", pair);
    }

    // Deltas strictly decreasing
    let deltas: Vec<f64> = myelinations.windows(2).map(|p| p[1] - p[0]).collect();
    for pair in deltas.windows(2) {
        assert!(pair[1] < pair[0], "deltas must shrink: {:?}", pair);
    }

    // Final consolidation in the expected envelope, far from the ceiling
    let m = final_neuron.myelination;
    assert!((0.08..=0.20).contains(&m), "myelination {}", m);
    assert!(m < 0.95);
}

#[test]
fn myelination_respects_the_ceiling() {
    let mut h = TestEngine::new();
    for i in 0..200 {
        h.file("/hot", None, at(i * 10));
    }
    let neuron = h.engine.store().get_neuron("file:/hot").unwrap().unwrap();
    assert!(neuron.myelination <= 0.95);
}

#[test]
fn snap_freezes_strong_synapses() {
    let mut h = TestEngine::new();
    h.engine.seed_neuron("/s1", engram_core::NeuronType::File, None).unwrap();
    h.engine.seed_neuron("/s2", engram_core::NeuronType::File, None).unwrap();
    h.engine.seed_synapse("/s1", "/s2", 0.85, Some(20)).unwrap();

    // Double the co-access count of the already-strong pair
    for i in 0..20 {
        h.file("/s1", None, at(i * 20));
        h.file("/s2", None, at(i * 20 + 10));
    }

    let weight = h.weight("file:/s1", "file:/s2").unwrap();
    assert!(
        (weight - 0.85).abs() < 0.03,
        "strong synapse moved too much: {}",
        weight
    );
    assert!(weight <= 1.0);
    h.assert_invariants();
}
