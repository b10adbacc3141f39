//! Bounded-concurrency pool of workers draining sealed batches.

use crate::batch::Batch;
use crate::response::Response;
use crate::sink::Sink;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Run the dispatcher supervisor to completion: fans sealed batches out to
/// up to `max_concurrent_batches` concurrent workers, routing each batch
/// through `sink` if configured, or the HTTP sender otherwise. Exits once
/// `ready_rx` closes and every spawned send has completed.
pub async fn run<M>(
    mut ready_rx: mpsc::Receiver<Batch<M>>,
    resp_tx: mpsc::Sender<Response<M>>,
    http: reqwest::Client,
    sink: Option<Arc<dyn Sink<M>>>,
    max_concurrent_batches: usize,
    user_agent_addendum: String,
    block_on_response: bool,
) where
    M: Clone + Send + Sync + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrent_batches.max(1)));
    let mut in_flight: JoinSet<()> = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            maybe_batch = ready_rx.recv() => {
                match maybe_batch {
                    Some(batch) => {
                        let permit = semaphore
                            .clone()
                            .acquire_owned()
                            .await
                            .expect("dispatcher semaphore is never closed");
                        let resp_tx = resp_tx.clone();
                        let http = http.clone();
                        let sink = sink.clone();
                        let user_agent_addendum = user_agent_addendum.clone();
                        in_flight.spawn(async move {
                            let _permit = permit;
                            dispatch_one(batch, http, sink, resp_tx, &user_agent_addendum, block_on_response).await;
                        });
                    }
                    None => break,
                }
            }

            Some(result) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "dispatcher worker task panicked");
                }
            }
        }
    }

    while let Some(result) = in_flight.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "dispatcher worker task panicked");
        }
    }
    tracing::debug!("dispatcher pool drained");
}

async fn dispatch_one<M>(
    batch: Batch<M>,
    http: reqwest::Client,
    sink: Option<Arc<dyn Sink<M>>>,
    resp_tx: mpsc::Sender<Response<M>>,
    user_agent_addendum: &str,
    block_on_response: bool,
) where
    M: Clone + Send + Sync + 'static,
{
    let responses = match sink {
        Some(sink) => dispatch_via_sink(&*sink, batch),
        None => crate::http_sender::send_batch(&http, batch, user_agent_addendum).await,
    };

    for response in responses {
        let outcome = if block_on_response {
            resp_tx.send(response).await.is_ok()
        } else {
            resp_tx.try_send(response).is_ok()
        };
        if !outcome {
            tracing::debug!("response dropped: response channel closed or full");
        }
    }
}

fn dispatch_via_sink<M: Clone>(sink: &dyn Sink<M>, batch: Batch<M>) -> Vec<Response<M>> {
    let started = Instant::now();
    sink.add_batch(&batch);
    let duration = started.elapsed();
    batch
        .events
        .iter()
        .map(|event| Response::success(0, None, duration, event.metadata().cloned()))
        .collect()
}
