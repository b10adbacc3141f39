//! Pluggable replacement for the HTTP transport, used for tests and local use.

use crate::batch::Batch;
use crate::error::SinkError;
use crate::event::Event;
use parking_lot::Mutex;
use std::sync::Arc;

/// A pluggable terminal consumer of events, replacing the HTTP sender.
///
/// The batcher and dispatcher pool (work queue, per-destination batching,
/// bounded concurrency) run unconditionally whether or not a sink is
/// configured - only the transport-specific leaf of the dispatcher changes.
/// See `SPEC_FULL.md` §2 for the rationale.
pub trait Sink<M = ()>: Send + Sync {
    /// Called once before the pipeline starts accepting events. Failure
    /// aborts engine initialization.
    fn start(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Called once after the pipeline has drained, during shutdown.
    fn stop(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Accept one event from a sealed batch. Expected to be fast /
    /// non-blocking; slow sinks stall the dispatcher worker that calls them.
    fn add(&self, event: &Event<M>);

    /// Called once per sealed batch, in dispatch order. The default
    /// forwards each event to [`Sink::add`] individually; override this to
    /// observe batch boundaries, as [`MockSink`] does to support the
    /// round-trip testable property.
    fn add_batch(&self, batch: &Batch<M>) {
        for event in &batch.events {
            self.add(event);
        }
    }
}

/// In-memory test double: captures whole batches, in dispatch order, for
/// assertions like the round-trip property (§8 invariant 4).
pub struct MockSink<M = ()> {
    batches: Mutex<Vec<CapturedBatch<M>>>,
}

/// A batch's worth of events, as observed by [`MockSink`].
pub struct CapturedBatch<M> {
    pub dataset: String,
    pub event_count: usize,
    pub fields: Vec<serde_json::Map<String, serde_json::Value>>,
    pub metadata: Vec<Option<M>>,
}

impl<M> Default for MockSink<M> {
    fn default() -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
        }
    }
}

impl<M: Clone> MockSink<M> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record_batch(&self, batch: &Batch<M>) {
        let mut batches = self.batches.lock();
        batches.push(CapturedBatch {
            dataset: batch.destination.dataset.clone(),
            event_count: batch.len(),
            fields: batch.events.iter().map(|e| e.fields().clone()).collect(),
            metadata: batch.events.iter().map(|e| e.metadata().cloned()).collect(),
        });
    }

    pub fn captured_batches(&self) -> Vec<CapturedBatch<M>>
    where
        M: Clone,
    {
        let batches = self.batches.lock();
        batches
            .iter()
            .map(|b| CapturedBatch {
                dataset: b.dataset.clone(),
                event_count: b.event_count,
                fields: b.fields.clone(),
                metadata: b.metadata.clone(),
            })
            .collect()
    }

    pub fn total_events(&self) -> usize {
        self.batches.lock().iter().map(|b| b.event_count).sum()
    }
}

impl<M: Clone + Send + Sync + 'static> Sink<M> for MockSink<M> {
    fn add(&self, _event: &Event<M>) {
        // Batch boundaries matter for this test double; see `add_batch`.
    }

    fn add_batch(&self, batch: &Batch<M>) {
        self.record_batch(batch);
    }
}

/// Writes each event as one line to an arbitrary [`std::io::Write`] sink -
/// the "local file/stdout writer" use case from §4.8.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W: std::io::Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

impl<W: std::io::Write + Send + Sync, M: serde::Serialize> Sink<M> for WriterSink<W> {
    fn add(&self, event: &Event<M>) {
        let mut writer = self.writer.lock();
        if let Ok(line) = serde_json::to_string(event.fields()) {
            let _ = writeln!(writer, "{line}");
        }
    }
}
