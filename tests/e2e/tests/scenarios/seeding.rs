//! Seeding API, bootstrap batches, snippets, and session context capture

use engram_core::{NeuronType, SeedBatch, SnippetRecord, SnippetKind};
use engram_e2e_tests::harness::{at, TestEngine};

#[test]
fn seeded_neurons_skip_the_hebbian_machinery() {
    let mut h = TestEngine::new();
    let neuron = h
        .engine
        .seed_neuron("/seeded.rs", NeuronType::File, Some("bootstrap import scan"))
        .unwrap();

    assert!((neuron.activation - 0.5).abs() < 1e-9);
    assert_eq!(neuron.myelination, 0.0);
    assert_eq!(neuron.access_count, 0);
    assert_eq!(neuron.contexts, vec!["bootstrap import scan"]);
    // No episodic trace for seeds
    assert_eq!(
        h.engine.store().access_rows_for_neuron(&neuron.id).unwrap(),
        0
    );

    // Seeds stay out of the window: the next record gains no seed edge
    h.file("/unrelated.rs", None, at(0));
    assert!(h.weight("file:/seeded.rs", "file:/unrelated.rs").is_none());
}

#[test]
fn seed_synapse_is_bidirectional_with_max_merge() {
    let mut h = TestEngine::new();
    h.engine.seed_synapse("/a.rs", "/b.rs", 0.6, Some(4)).unwrap();

    let forward = h
        .engine
        .store()
        .get_synapse("file:/a.rs", "file:/b.rs")
        .unwrap()
        .unwrap();
    let reverse = h
        .engine
        .store()
        .get_synapse("file:/b.rs", "file:/a.rs")
        .unwrap()
        .unwrap();
    assert!((forward.weight - 0.6).abs() < 1e-9);
    assert!((reverse.weight - 0.6).abs() < 1e-9);
    assert_eq!(forward.co_access_count, 4);
    // Seeded edges are not tentative
    assert!(forward.tagged_at.is_none());

    // Re-seeding lower keeps the stronger value
    h.engine.seed_synapse("/a.rs", "/b.rs", 0.2, Some(1)).unwrap();
    assert!((h.weight("file:/a.rs", "file:/b.rs").unwrap() - 0.6).abs() < 1e-9);

    // Re-seeding higher wins
    h.engine.seed_synapse("/a.rs", "/b.rs", 0.9, None).unwrap();
    assert!((h.weight("file:/a.rs", "file:/b.rs").unwrap() - 0.9).abs() < 1e-9);
}

#[test]
fn bootstrap_batches_apply_and_clear_the_window() {
    let mut h = TestEngine::new();
    // A record beforehand puts something in the window
    h.file("/pre.rs", None, at(0));

    let batch: SeedBatch = serde_json::from_str(
        r#"{
            "neurons": [
                {"path": "commit:abc123", "neuronType": "semantic", "context": "fix auth races"},
                {"path": "/src/auth.rs", "neuronType": "file"}
            ],
            "synapses": [
                {"pathA": "/src/auth.rs", "pathB": "/src/session.rs", "weight": 0.5},
                {"pathA": "/src/auth.rs", "pathB": "/src/token.rs", "weight": 0.3, "coAccessCount": 2}
            ]
        }"#,
    )
    .unwrap();

    let (neurons, synapses) = h.engine.apply_seed_batch(&batch).unwrap();
    assert_eq!((neurons, synapses), (2, 2));

    let commit = h
        .engine
        .store()
        .get_neuron("semantic:commit:abc123")
        .unwrap()
        .unwrap();
    assert_eq!(commit.neuron_type, NeuronType::Semantic);
    assert_eq!(commit.contexts, vec!["fix auth races"]);

    assert!((h.weight("file:/src/auth.rs", "file:/src/session.rs").unwrap() - 0.5).abs() < 1e-9);
    assert!((h.weight("file:/src/token.rs", "file:/src/auth.rs").unwrap() - 0.3).abs() < 1e-9);

    // Window cleared at the batch boundary: no bleed into later records
    h.file("/post.rs", None, at(10));
    assert!(h.weight("file:/pre.rs", "file:/post.rs").is_none());
}

#[test]
fn snippets_ingest_idempotently_and_cascade_with_their_file() {
    let mut h = TestEngine::new();
    let records = vec![
        SnippetRecord {
            file_path: "/src/auth.rs".into(),
            name: "refresh_token".into(),
            kind: SnippetKind::Function,
            start_line: 40,
            end_line: 78,
            source: "fn refresh_token() {}".into(),
            content_hash: "h1".into(),
        },
        SnippetRecord {
            file_path: "/src/auth.rs".into(),
            name: "Session".into(),
            kind: SnippetKind::Struct,
            start_line: 10,
            end_line: 30,
            source: "struct Session {}".into(),
            content_hash: "h2".into(),
        },
    ];
    assert_eq!(h.engine.ingest_snippets(&records).unwrap(), 2);
    assert_eq!(h.engine.store().snippet_count().unwrap(), 2);

    // Same rows again: upsert by content-addressed id
    h.engine.ingest_snippets(&records).unwrap();
    assert_eq!(h.engine.store().snippet_count().unwrap(), 2);

    let snippets = h
        .engine
        .store()
        .snippets_for_parent("file:/src/auth.rs")
        .unwrap();
    assert_eq!(snippets.len(), 2);
    assert_eq!(snippets[0].name, "Session"); // ordered by start line
}

#[test]
fn append_context_respects_cap_and_unknown_ids() {
    let mut h = TestEngine::new();
    h.engine.seed_neuron("/ctx.rs", NeuronType::File, None).unwrap();
    for i in 0..25 {
        h.engine
            .append_context("file:/ctx.rs", &format!("topic {}", i))
            .unwrap();
    }
    let neuron = h.engine.store().get_neuron("file:/ctx.rs").unwrap().unwrap();
    assert_eq!(neuron.contexts.len(), 20);
    assert_eq!(neuron.contexts.first().map(String::as_str), Some("topic 5"));

    assert!(h.engine.append_context("file:/missing.rs", "nope").is_err());
}

#[test]
fn session_context_capture_distills_frequent_tokens() {
    let mut h = TestEngine::new();
    let messages = vec![
        "we should refactor the token refresh logic".to_string(),
        "the refresh path races with logout".to_string(),
        "token refresh needs a mutex around the store".to_string(),
    ];
    let neuron = h.engine.capture_session_context(&messages).unwrap();

    assert_eq!(neuron.neuron_type, NeuronType::Semantic);
    assert!(neuron.path.starts_with("session:"));
    // Frequent meaningful tokens lead; stopwords never appear
    assert_eq!(neuron.contexts.first().map(String::as_str), Some("refresh"));
    assert!(neuron.contexts.iter().any(|c| c == "token"));
    assert!(neuron.contexts.iter().all(|c| c != "the" && c != "with"));
    assert!(neuron.contexts.len() <= 20);
}

#[test]
fn window_survives_process_restart_via_access_log() {
    let mut h = TestEngine::new();
    let now = chrono::Utc::now();
    h.engine
        .record("/warm1.rs", NeuronType::File, None, Some(now - chrono::Duration::minutes(5)))
        .unwrap();
    h.engine
        .record("/warm2.rs", NeuronType::File, None, Some(now - chrono::Duration::minutes(4)))
        .unwrap();

    // A fresh engine over the same store rebuilds the window from the log
    let mut reopened = h.reopen();
    reopened
        .record("/warm3.rs", NeuronType::File, None, Some(now))
        .unwrap();

    let store = reopened.store();
    assert!(store.get_synapse("file:/warm2.rs", "file:/warm3.rs").unwrap().is_some());
    assert!(store.get_synapse("file:/warm1.rs", "file:/warm3.rs").unwrap().is_some());
}
