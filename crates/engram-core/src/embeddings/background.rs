//! Background Embedding Executor
//!
//! `record` must never block on the model, so newly created neurons are
//! embedded fire-and-forget on a dedicated single-worker runtime. The queue is
//! bounded by a semaphore; when it is saturated the job is dropped - a neuron
//! without an embedding is a legal state and recall degrades gracefully.

use std::sync::Arc;

use tokio::runtime::Runtime;
use tokio::sync::Semaphore;

use super::local::EmbeddingService;
use crate::storage::Store;

/// Default bound on in-flight embedding jobs
pub const DEFAULT_MAX_PENDING: usize = 64;

/// Bounded fire-and-forget embedder
pub struct BackgroundEmbedder {
    runtime: Runtime,
    permits: Arc<Semaphore>,
    service: EmbeddingService,
}

impl BackgroundEmbedder {
    /// Build the executor with its own single-worker runtime
    pub fn new(max_pending: usize) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("engram-embed")
            .enable_time()
            .build()?;

        Ok(Self {
            runtime,
            permits: Arc::new(Semaphore::new(max_pending.max(1))),
            service: EmbeddingService::new(),
        })
    }

    /// Submit a neuron for embedding; drops the job when the queue is full
    pub fn submit(&self, store: Arc<Store>, neuron_id: String, text: String) {
        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(p) => p,
            Err(_) => {
                tracing::debug!("Embed queue saturated, dropping job for {}", neuron_id);
                return;
            }
        };

        let service = self.service;
        self.runtime.spawn(async move {
            let _permit = permit;
            let result = tokio::task::spawn_blocking(move || service.embed(&text)).await;
            match result {
                Ok(Ok(embedding)) => {
                    if let Err(e) = store.set_neuron_embedding(&neuron_id, &embedding) {
                        tracing::warn!("Failed to persist embedding for {}: {}", neuron_id, e);
                    }
                }
                Ok(Err(e)) => {
                    tracing::debug!("Background embed skipped for {}: {}", neuron_id, e);
                }
                Err(e) => {
                    tracing::warn!("Embed task panicked for {}: {}", neuron_id, e);
                }
            }
        });
    }
}
