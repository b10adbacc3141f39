//! The lifecycle controller: a cloneable handle over the batching pipeline.

use crate::batcher;
use crate::config::Config;
use crate::dispatcher;
use crate::error::{InitError, ValidationError};
use crate::event::{Event, EventBuilder};
use crate::response::Response;
use crate::sampler;
use crate::sink::Sink;

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EngineState {
    Running,
    Flushing,
    Stopped,
}

/// The mutable, swappable half of the pipeline: the work queue and the two
/// tasks it feeds. Rebuilt wholesale by `flush`, while the response channel
/// and HTTP transport on `Inner` outlive it.
struct Pipeline<M> {
    work_tx: mpsc::Sender<Event<M>>,
    batcher_handle: JoinHandle<()>,
    dispatcher_handle: JoinHandle<()>,
}

struct Inner<M> {
    config: Config,
    http: reqwest::Client,
    sink: Option<Arc<dyn Sink<M>>>,
    resp_tx: mpsc::Sender<Response<M>>,
    pipeline: Mutex<Option<Pipeline<M>>>,
    state: Mutex<EngineState>,
}

/// A handle to the asynchronous batching transmission engine.
///
/// Cheap to clone - an `Arc`-backed handle - and safe to share across tasks.
pub struct Client<M = ()> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for Client<M> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// The caller-facing end of the response channel (one per [`Client`]).
///
/// Outlives individual `flush` cycles; only closes once every [`Client`]
/// clone has been dropped or [`Client::close`] has run.
pub struct Responses<M = ()> {
    rx: mpsc::Receiver<Response<M>>,
}

impl<M> Responses<M> {
    pub async fn recv(&mut self) -> Option<Response<M>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Response<M>, mpsc::error::TryRecvError> {
        self.rx.try_recv()
    }
}

/// Builder for a [`Client`], mirroring the teacher's `ClientBuilder`/
/// `ProducerBuilder` pattern: typed setters over a config struct, consumed
/// by a terminal, fallible `build`.
#[must_use = "builders do nothing unless you call .build()"]
pub struct ClientBuilder<M = ()> {
    config: Config,
    transport: Option<reqwest::Client>,
    sink: Option<Arc<dyn Sink<M>>>,
}

impl<M: Clone + Send + Sync + 'static> ClientBuilder<M> {
    pub fn new(
        api_host: impl Into<String>,
        write_key: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            config: Config::new(api_host, write_key, dataset),
            transport: None,
            sink: None,
        }
    }

    pub fn sample_rate(mut self, rate: u32) -> Self {
        self.config.sample_rate = rate.max(1);
        self
    }

    pub fn max_batch_size(mut self, size: usize) -> Self {
        self.config.max_batch_size = size.max(1);
        self
    }

    pub fn batch_timeout(mut self, timeout: Duration) -> Self {
        self.config.batch_timeout = timeout;
        self
    }

    pub fn max_concurrent_batches(mut self, count: usize) -> Self {
        self.config.max_concurrent_batches = count.max(1);
        self
    }

    pub fn pending_work_capacity(mut self, capacity: usize) -> Self {
        self.config.pending_work_capacity = capacity.max(1);
        self
    }

    pub fn block_on_send(mut self, block: bool) -> Self {
        self.config.block_on_send = block;
        self
    }

    pub fn block_on_response(mut self, block: bool) -> Self {
        self.config.block_on_response = block;
        self
    }

    pub fn user_agent_addendum(mut self, addendum: impl Into<String>) -> Self {
        self.config.user_agent_addendum = addendum.into();
        self
    }

    /// Supply a pre-built HTTP transport, e.g. one pointed at a test server.
    pub fn transport(mut self, client: reqwest::Client) -> Self {
        self.transport = Some(client);
        self
    }

    /// Replace the dispatcher's HTTP leaf with a pluggable sink.
    pub fn sink(mut self, sink: Arc<dyn Sink<M>>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Start the sink (if any), build the default transport (if none was
    /// supplied), and spawn the batcher and dispatcher pool.
    pub fn build(self) -> Result<(Client<M>, Responses<M>), InitError> {
        if let Some(sink) = &self.sink {
            sink.start().map_err(InitError::SinkStart)?;
        }

        let http = match self.transport {
            Some(client) => client,
            None => reqwest::Client::builder()
                .pool_max_idle_per_host(10)
                .pool_idle_timeout(Duration::from_secs(90))
                .build()
                .map_err(InitError::Http)?,
        };

        let resp_capacity = (2 * self.config.pending_work_capacity).max(1);
        let (resp_tx, resp_rx) = mpsc::channel(resp_capacity);

        let inner = Arc::new(Inner {
            config: self.config,
            http,
            sink: self.sink,
            resp_tx,
            pipeline: Mutex::new(None),
            state: Mutex::new(EngineState::Stopped),
        });

        let client = Client { inner };
        client.start_pipeline();

        Ok((client, Responses { rx: resp_rx }))
    }
}

impl<M: Clone + Send + Sync + 'static> Client<M> {
    fn start_pipeline(&self) {
        let cfg = &self.inner.config;
        let (work_tx, work_rx) = mpsc::channel(cfg.pending_work_capacity.max(1));
        let (ready_tx, ready_rx) = mpsc::channel(cfg.max_concurrent_batches.max(1));

        let batcher_handle = tokio::spawn(batcher::run(
            work_rx,
            ready_tx,
            cfg.max_batch_size,
            cfg.batch_timeout,
        ));

        let dispatcher_handle = tokio::spawn(dispatcher::run(
            ready_rx,
            self.inner.resp_tx.clone(),
            self.inner.http.clone(),
            self.inner.sink.clone(),
            cfg.max_concurrent_batches,
            cfg.user_agent_addendum.clone(),
            cfg.block_on_response,
        ));

        *self.inner.pipeline.lock() = Some(Pipeline {
            work_tx,
            batcher_handle,
            dispatcher_handle,
        });
        *self.inner.state.lock() = EngineState::Running;
    }

    /// An [`EventBuilder`] pre-populated with this client's destination and
    /// default sample rate - a convenience over repeating the three
    /// destination arguments at every call site.
    pub fn event(&self) -> EventBuilder<M> {
        let cfg = &self.inner.config;
        EventBuilder::new(cfg.api_host.clone(), cfg.write_key.clone(), cfg.dataset.clone())
            .sample_rate(cfg.sample_rate)
    }

    /// Submit an event for batching and delivery.
    ///
    /// Enforces the one submission-time rule that applies to an
    /// already-built event: rejecting concurrent submission during a
    /// `flush`. Every other outcome - success, server/network error,
    /// sampling drop, queue overflow, or shutdown drop - is reported
    /// asynchronously on the response channel.
    pub async fn submit(&self, mut event: Event<M>) -> Result<(), ValidationError> {
        if *self.inner.state.lock() == EngineState::Flushing {
            return Err(ValidationError::Flushing);
        }

        event.stamp_if_absent();

        let sample_rate = event.sample_rate();
        let dropped = {
            let mut rng = rand::thread_rng();
            sampler::should_drop(sample_rate, &mut rng)
        };
        if dropped {
            let metadata = event.take_metadata();
            self.emit_direct(Response::error(crate::error::DeliveryError::SamplingDrop, metadata))
                .await;
            return Ok(());
        }

        let work_tx = self.inner.pipeline.lock().as_ref().map(|p| p.work_tx.clone());
        let Some(work_tx) = work_tx else {
            let metadata = event.take_metadata();
            self.emit_direct(Response::error(crate::error::DeliveryError::ShutdownDrop, metadata))
                .await;
            return Ok(());
        };

        if self.inner.config.block_on_send {
            if work_tx.send(event).await.is_err() {
                tracing::debug!("submit: work queue closed mid-send");
            }
        } else {
            match work_tx.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(event)) => {
                    let metadata = event.take_metadata();
                    self.emit_direct(Response::error(crate::error::DeliveryError::QueueOverflow, metadata))
                        .await;
                }
                Err(mpsc::error::TrySendError::Closed(event)) => {
                    let metadata = event.take_metadata();
                    self.emit_direct(Response::error(crate::error::DeliveryError::ShutdownDrop, metadata))
                        .await;
                }
            }
        }

        Ok(())
    }

    /// Emit a response synthesized directly by the client (sampling drops,
    /// overflow, shutdown drops) rather than one produced by the dispatcher.
    async fn emit_direct(&self, response: Response<M>) {
        let delivered = if self.inner.config.block_on_response {
            self.inner.resp_tx.send(response).await.is_ok()
        } else {
            self.inner.resp_tx.try_send(response).is_ok()
        };
        if !delivered {
            tracing::debug!("direct response dropped: response channel closed or full");
        }
    }

    /// Drain every in-flight batch, then restart the pipeline with the same
    /// configuration and transport.
    ///
    /// Concurrent `submit` calls are rejected with
    /// [`ValidationError::Flushing`] for the duration, rather than being
    /// silently queued against a pipeline that is being torn down.
    pub async fn flush(&self) {
        *self.inner.state.lock() = EngineState::Flushing;
        self.drain_pipeline().await;
        self.start_pipeline();
    }

    /// Stop the engine for good: close the work queue, let the batcher and
    /// dispatcher pool drain every open and in-flight batch, then stop the
    /// sink if one is configured. Does not close the response channel by
    /// itself - that happens once every [`Client`] clone (and the
    /// dispatcher's internal clone) has been dropped.
    pub async fn close(&self) {
        *self.inner.state.lock() = EngineState::Stopped;
        self.drain_pipeline().await;
        if let Some(sink) = &self.inner.sink {
            if let Err(e) = sink.stop() {
                tracing::warn!(error = %e, "sink failed to stop cleanly");
            }
        }
    }

    async fn drain_pipeline(&self) {
        let pipeline = self.inner.pipeline.lock().take();
        if let Some(pipeline) = pipeline {
            drop(pipeline.work_tx);
            if let Err(e) = pipeline.batcher_handle.await {
                tracing::error!(error = %e, "batcher task panicked");
            }
            if let Err(e) = pipeline.dispatcher_handle.await {
                tracing::error!(error = %e, "dispatcher task panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MockSink;

    #[tokio::test]
    async fn submits_and_delivers_through_sink() {
        let sink: Arc<MockSink<()>> = MockSink::new();
        let (client, mut responses) = ClientBuilder::<()>::new("https://api.honeycomb.io", "wk", "ds")
            .max_batch_size(1)
            .sink(sink.clone())
            .build()
            .unwrap();

        let event = client.event().add_field("a", 1).build().unwrap();
        client.submit(event).await.unwrap();

        let response = tokio::time::timeout(Duration::from_secs(1), responses.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(response.is_success());
        assert_eq!(sink.total_events(), 1);

        client.close().await;
    }

    #[tokio::test]
    async fn flush_rejects_concurrent_submit_and_restarts() {
        let sink: Arc<MockSink<()>> = MockSink::new();
        let (client, mut responses) = ClientBuilder::<()>::new("h", "w", "d")
            .max_batch_size(10)
            .batch_timeout(Duration::from_millis(10))
            .sink(sink.clone())
            .build()
            .unwrap();

        *client.inner.state.lock() = EngineState::Flushing;
        let event = client.event().add_field("a", 1).build().unwrap();
        assert_eq!(client.submit(event).await, Err(ValidationError::Flushing));

        *client.inner.state.lock() = EngineState::Running;
        let event = client.event().add_field("a", 2).build().unwrap();
        client.submit(event).await.unwrap();

        let response = tokio::time::timeout(Duration::from_secs(1), responses.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(response.is_success());

        client.close().await;
    }

    #[tokio::test]
    async fn submit_after_close_reports_shutdown_drop() {
        let sink: Arc<MockSink<()>> = MockSink::new();
        let (client, mut responses) = ClientBuilder::<()>::new("h", "w", "d").sink(sink).build().unwrap();
        client.close().await;

        let event = client.event().add_field("a", 1).build().unwrap();
        client.submit(event).await.unwrap();

        let response = tokio::time::timeout(Duration::from_secs(1), responses.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(response.err, Some(crate::error::DeliveryError::ShutdownDrop));
    }
}
