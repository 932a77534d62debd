//! Consolidation: replay, review, cross-session and directional mining

use chrono::Duration;
use engram_e2e_tests::harness::{at, t0, TestEngine};

/// Record `/p` and `/q` in one session, separated by enough fillers that the
/// sequential window never wires them directly
fn far_apart_session(h: &mut TestEngine, session: usize, base: i64) {
    h.file("/p", Some("pq work"), at(base));
    for i in 0..26 {
        h.file(&format!("/s{}_f{}", session, i), None, at(base + 10 + i * 10));
    }
    h.file("/q", Some("pq work"), at(base + 300));
    h.engine.rotate_session(Some(at(base + 310))).unwrap();
}

#[test]
fn cross_session_pairs_are_discovered_and_born_tagged() {
    let mut h = TestEngine::new();
    for session in 0..3 {
        far_apart_session(&mut h, session, session as i64 * 1000);
    }
    // The window alone never connected them
    assert!(h.weight("file:/p", "file:/q").is_none());

    let report = h.engine.consolidate_at(at(4000)).unwrap();
    assert!(report.cross_session_created >= 1);

    for (source, target) in [("file:/p", "file:/q"), ("file:/q", "file:/p")] {
        let synapse = h
            .engine
            .store()
            .get_synapse(source, target)
            .unwrap()
            .expect("cross-session edge must exist");
        assert!((synapse.weight - 0.15).abs() < 1e-9);
        assert!(synapse.tagged_at.is_some(), "discovered edges are born tagged");
    }

    // A second pass reinforces the still-weak pair instead of recreating it
    let report2 = h.engine.consolidate_at(at(4100)).unwrap();
    assert!(report2.cross_session_reinforced >= 1);
    let weight = h.weight("file:/p", "file:/q").unwrap();
    assert!(weight > 0.15 && weight < 0.3);
    h.assert_invariants();
}

#[test]
fn replay_strengthens_existing_synapses_only() {
    let mut h = TestEngine::new();
    // Adjacent pair: wired at recording time
    h.file("/r1", None, at(0));
    h.file("/r2", None, at(10));
    // Distant pair in the same session: never wired
    h.file("/r3", None, at(20));
    for i in 0..26 {
        h.file(&format!("/fill{}", i), None, at(30 + i * 10));
    }
    h.file("/r4", None, at(400));

    let before = h.weight("file:/r1", "file:/r2").unwrap();
    let report = h.engine.consolidate_at(at(3600)).unwrap();
    assert_eq!(report.sessions_replayed, 1);
    assert!(report.replay_reinforced > 0);

    let after = h.weight("file:/r1", "file:/r2").unwrap();
    assert!(after > before, "replay must reinforce the existing edge");
    assert!(after < before + 0.02, "replay runs at a tenth of the learning rate");

    // Replay does not invent edges for the distant pair
    assert!(h.weight("file:/r3", "file:/r4").is_none());
}

#[test]
fn ebbinghaus_boosts_rested_and_fades_idle_memories() {
    // Rested 3 days: quarter-review boost
    let mut h = TestEngine::new();
    for i in 0..10 {
        h.file("/rested", None, at(i * 10));
    }
    let before = h.engine.store().get_neuron("file:/rested").unwrap().unwrap();
    h.engine
        .consolidate_at(t0() + Duration::days(3))
        .unwrap();
    let after = h.engine.store().get_neuron("file:/rested").unwrap().unwrap();
    assert!(after.myelination > before.myelination);
    assert!(after.myelination < before.myelination + 0.01);

    // Idle 10 days: gentle fade
    let mut h = TestEngine::new();
    for i in 0..10 {
        h.file("/idle", None, at(i * 10));
    }
    let before = h.engine.store().get_neuron("file:/idle").unwrap().unwrap();
    h.engine
        .consolidate_at(t0() + Duration::days(10))
        .unwrap();
    let after = h.engine.store().get_neuron("file:/idle").unwrap().unwrap();
    assert!((after.myelination - before.myelination * 0.95).abs() < 1e-9);
}

#[test]
fn dominant_direction_earns_extra_weight() {
    let mut h = TestEngine::new();
    for s in 0..5 {
        h.file("/da", None, at(s * 1000));
        h.file("/db", None, at(s * 1000 + 10));
        h.engine.rotate_session(Some(at(s * 1000 + 20))).unwrap();
    }
    let forward_before = h.weight("file:/da", "file:/db").unwrap();
    let reverse_before = h.weight("file:/db", "file:/da").unwrap();
    assert!((forward_before - reverse_before).abs() < 1e-9);

    let report = h.engine.consolidate_at(at(5000)).unwrap();
    assert!(report.directional_boosted >= 1);

    let forward = h.weight("file:/da", "file:/db").unwrap();
    let reverse = h.weight("file:/db", "file:/da").unwrap();
    assert!(
        forward > reverse,
        "forward {} should outweigh reverse {}",
        forward,
        reverse
    );
}

#[test]
fn episodic_log_is_truncated_by_age() {
    let mut h = TestEngine::new();
    h.file("/ancient", None, t0() - Duration::days(40));
    h.file("/recent", None, at(0));

    let count_before = h.engine.stats().unwrap().access_log_rows;
    assert_eq!(count_before, 2);

    let report = h.engine.consolidate_at(at(10)).unwrap();
    assert_eq!(report.access_rows_pruned, 1);

    let stats = h.engine.stats().unwrap();
    assert_eq!(stats.access_log_rows, 1);
    // The neuron itself survives truncation of its episodic trace
    assert!(h.engine.store().get_neuron("file:/ancient").unwrap().is_some());
}
