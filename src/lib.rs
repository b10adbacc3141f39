//! An asynchronous, batching HTTP client for telemetry events.
//!
//! Events are submitted through a [`Client`], coalesced by destination into
//! size- or time-triggered batches, and dispatched over a pooled, bounded-
//! concurrency HTTP pipeline. Per-event outcomes - success, server error,
//! sampling drop, queue overflow - arrive asynchronously on a response
//! channel rather than from `submit` itself.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use libhoney::ClientBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, mut responses) = ClientBuilder::<()>::new(
//!         "https://api.honeycomb.io",
//!         "my-write-key",
//!         "my-dataset",
//!     )
//!     .build()?;
//!
//!     let event = client.event().add_field("duration_ms", 42).build()?;
//!     client.submit(event).await?;
//!
//!     tokio::spawn(async move {
//!         while let Some(response) = responses.recv().await {
//!             if !response.is_success() {
//!                 eprintln!("delivery failed: {:?}", response.err);
//!             }
//!         }
//!     });
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

mod batch;
mod batcher;
mod client;
mod config;
mod destination;
mod dispatcher;
mod error;
mod event;
mod http_sender;
mod response;
mod sampler;
mod sink;
mod verify;

pub use batch::Batch;
pub use client::{Client, ClientBuilder, Responses};
pub use config::Config;
pub use destination::DestinationKey;
pub use error::{DeliveryError, InitError, SinkError, ValidationError, VerifyError};
pub use event::{Event, EventBuilder};
pub use response::{EventStatus, Response};
pub use sink::{CapturedBatch, MockSink, Sink, WriterSink};
pub use verify::verify_key;
