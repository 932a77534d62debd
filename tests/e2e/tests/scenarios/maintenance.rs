//! Maintenance: decay, pruning, homeostasis, tag expiry

use chrono::Duration;
use engram_core::NeuronType;
use engram_e2e_tests::harness::{at, TestEngine};

#[test]
fn decay_applies_multiplicative_rates() {
    let mut h = TestEngine::new();
    // Enough accesses to build myelination, one co-access for the edge:
    // averages stay under the homeostasis targets so only pure decay applies
    for i in 0..10 {
        h.file("/steady", None, at(i * 10));
    }
    h.file("/partner", None, at(100));

    let before = h.engine.store().get_neuron("file:/steady").unwrap().unwrap();
    let weight_before = h.weight("file:/steady", "file:/partner").unwrap();
    assert!((weight_before - 0.3).abs() < 1e-9);

    h.engine.decay_at(at(200)).unwrap();

    let after = h.engine.store().get_neuron("file:/steady").unwrap().unwrap();
    assert!((after.activation - before.activation * 0.85).abs() < 1e-9);
    assert!((after.myelination - before.myelination * 0.995).abs() < 1e-9);

    let weight_after = h.weight("file:/steady", "file:/partner").unwrap();
    assert!((weight_after - weight_before * 0.98).abs() < 1e-9);
}

#[test]
fn decay_twice_never_goes_negative() {
    let mut h = TestEngine::new();
    for i in 0..5 {
        h.file("/a", None, at(i * 10));
        h.file("/b", None, at(i * 10 + 5));
    }
    h.engine.decay_at(at(100)).unwrap();
    h.engine.decay_at(at(200)).unwrap();
    h.assert_invariants();
}

#[test]
fn stale_weak_synapses_are_pruned_in_tiers() {
    let mut h = TestEngine::new();
    // One co-access leaves the pair at the 0.3 floor
    h.file("/old1", None, at(0));
    h.file("/old2", None, at(10));

    // 31 idle days later: decay pushes the edge under 0.3 and the stale tier
    // (< 0.3, idle > 30 days) drops it
    let report = h.engine.decay_at(at(31 * 24 * 3600)).unwrap();
    assert!(report.synapses_pruned >= 2, "pruned {}", report.synapses_pruned);
    assert!(h.weight("file:/old1", "file:/old2").is_none());
    assert!(h.weight("file:/old2", "file:/old1").is_none());
}

#[test]
fn orphan_files_are_pruned() {
    let mut h = TestEngine::new();
    h.engine
        .seed_neuron("/orphan", NeuronType::File, None)
        .unwrap();
    // A connected, active neighborhood that must survive
    for i in 0..5 {
        h.file("/keep1", None, at(i * 10));
        h.file("/keep2", None, at(i * 10 + 5));
    }

    let report = h.engine.decay_at(at(100)).unwrap();
    assert_eq!(report.orphan_files_pruned, 1);
    assert!(h.engine.store().get_neuron("file:/orphan").unwrap().is_none());
    assert!(h.engine.store().get_neuron("file:/keep1").unwrap().is_some());
}

#[test]
fn homeostasis_scales_hot_myelination_to_target() {
    let mut h = TestEngine::new();
    // One heavily-consolidated file pushes the average past 0.15
    for i in 0..60 {
        h.file("/hot", None, at(i * 10));
    }
    let before = h.engine.store().get_neuron("file:/hot").unwrap().unwrap();
    assert!(before.myelination > 0.15);

    let report = h.engine.homeostasis_at(at(700)).unwrap();
    assert!(report.myelination_scale.is_some());

    let after = h.engine.store().get_neuron("file:/hot").unwrap().unwrap();
    assert!((after.myelination - 0.15).abs() < 1e-6);
}

#[test]
fn homeostasis_preserves_rank_order() {
    let mut h = TestEngine::new();
    for i in 0..60 {
        h.file("/more", None, at(i * 10));
    }
    for i in 0..20 {
        h.file("/less", None, at(i * 10 + 5));
    }
    h.engine.homeostasis_at(at(700)).unwrap();

    let more = h.engine.store().get_neuron("file:/more").unwrap().unwrap();
    let less = h.engine.store().get_neuron("file:/less").unwrap().unwrap();
    assert!(more.myelination > less.myelination);
}

#[test]
fn tags_expire_after_the_capture_window() {
    let mut h = TestEngine::new();
    h.file("/t1", None, at(0));
    h.file("/t2", None, at(10));
    let tagged = h
        .engine
        .store()
        .get_synapse("file:/t1", "file:/t2")
        .unwrap()
        .unwrap();
    assert!(tagged.tagged_at.is_some());

    // Two hours later the tag is past the 60-minute window
    let report = h
        .engine
        .homeostasis_at(at(0) + Duration::hours(2))
        .unwrap();
    assert!(report.tags_expired >= 2);

    let expired = h
        .engine
        .store()
        .get_synapse("file:/t1", "file:/t2")
        .unwrap()
        .unwrap();
    assert!(expired.tagged_at.is_none());
    // Expiry clears the tag without touching the weight
    assert!((expired.weight - tagged.weight).abs() < 1e-9);
}
