//! Wire format construction and HTTP dispatch for a sealed batch.

use crate::batch::Batch;
use crate::error::DeliveryError;
use crate::response::{EventStatus, Response};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};

const HEADER_TEAM: &str = "X-Honeycomb-Team";

/// Build the JSON array body for a batch, per the wire format:
/// `[{ "data": <fields>, "samplerate"?: <rate>, "time"?: <rfc3339> }, ...]`.
///
/// A pure function of the batch, so it is unit-tested directly without any
/// network I/O.
pub fn build_body<M>(batch: &Batch<M>) -> Vec<u8> {
    let array: Vec<Value> = batch
        .events
        .iter()
        .map(|event| {
            let mut entry = Map::with_capacity(3);
            entry.insert("data".to_string(), Value::Object(event.fields().clone()));
            if event.sample_rate() != 1 {
                entry.insert("samplerate".to_string(), Value::from(event.sample_rate()));
            }
            if let Some(ts) = event.timestamp() {
                entry.insert("time".to_string(), Value::from(ts.to_rfc3339()));
            }
            Value::Object(entry)
        })
        .collect();

    serde_json::to_vec(&Value::Array(array)).unwrap_or_default()
}

fn user_agent(addendum: &str) -> String {
    let base = format!("libhoney-rs/{}", env!("CARGO_PKG_VERSION"));
    if addendum.is_empty() {
        base
    } else {
        format!("{base} {addendum}")
    }
}

/// Serialize, POST, and demultiplex a sealed batch into one [`Response`] per event.
pub async fn send_batch<M>(
    http: &reqwest::Client,
    batch: Batch<M>,
    user_agent_addendum: &str,
) -> Vec<Response<M>>
where
    M: Clone,
{
    let url = batch.destination.batch_url();
    let body = build_body(&batch);
    let write_key = batch.destination.write_key.clone();
    let metadatas: Vec<Option<M>> = batch.events.iter().map(|e| e.metadata().cloned()).collect();
    let count = batch.events.len();

    tracing::debug!(batch_id = batch.id, dataset = %batch.destination.dataset, count, "dispatching batch");

    let started = Instant::now();
    let result = http
        .post(&url)
        .header("Content-Type", "application/json")
        .header(HEADER_TEAM, write_key)
        .header("User-Agent", user_agent(user_agent_addendum))
        .body(body)
        .send()
        .await;
    let duration = started.elapsed();

    let resp = match result {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(batch_id = batch.id, error = %e, "batch transport error");
            return uniform_error(DeliveryError::from(e), metadatas, duration);
        }
    };

    let status = resp.status();
    if !status.is_success() {
        let message = resp
            .text()
            .await
            .unwrap_or_default()
            .chars()
            .take(256)
            .collect::<String>();
        tracing::warn!(batch_id = batch.id, status = status.as_u16(), "batch server error");
        return uniform_error(
            DeliveryError::Server {
                status: status.as_u16(),
                message,
            },
            metadatas,
            duration,
        );
    }

    let body_bytes = match resp.bytes().await {
        Ok(b) => b,
        Err(e) => return uniform_error(DeliveryError::from(e), metadatas, duration),
    };

    let statuses: Result<Vec<EventStatus>, _> = serde_json::from_slice(&body_bytes);
    match statuses {
        Ok(statuses) if statuses.len() == count => {
            tracing::debug!(batch_id = batch.id, "batch dispatched");
            statuses
                .into_iter()
                .zip(metadatas)
                .map(|(s, metadata)| {
                    if (200..300).contains(&s.status) {
                        Response::success(s.status, None, duration, metadata)
                    } else {
                        Response {
                            status_code: s.status,
                            body: s.error.clone(),
                            duration,
                            metadata,
                            err: Some(DeliveryError::Server {
                                status: s.status,
                                message: s.error.unwrap_or_default(),
                            }),
                        }
                    }
                })
                .collect()
        }
        Ok(statuses) => {
            tracing::warn!(
                batch_id = batch.id,
                expected = count,
                got = statuses.len(),
                "ingest response length mismatch"
            );
            uniform_error(
                DeliveryError::Parse(format!(
                    "expected {count} statuses, got {}",
                    statuses.len()
                )),
                metadatas,
                duration,
            )
        }
        Err(e) => {
            tracing::warn!(batch_id = batch.id, error = %e, "could not parse ingest response");
            uniform_error(DeliveryError::Parse(e.to_string()), metadatas, duration)
        }
    }
}

fn uniform_error<M>(err: DeliveryError, metadatas: Vec<Option<M>>, duration: Duration) -> Vec<Response<M>> {
    metadatas
        .into_iter()
        .map(|metadata| Response {
            status_code: 0,
            body: None,
            duration,
            metadata,
            err: Some(err.clone()),
        })
        .collect()
}
