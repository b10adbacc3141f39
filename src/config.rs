//! Tunables for the transmission engine. See [`crate::ClientBuilder`] for
//! the builder that turns a `Config` into a running [`crate::Client`].

use std::time::Duration;

/// Tunables for the transmission engine, with the defaults from the
/// ingest service's reference client.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_host: String,
    pub write_key: String,
    pub dataset: String,
    pub sample_rate: u32,
    pub max_batch_size: usize,
    pub batch_timeout: Duration,
    pub max_concurrent_batches: usize,
    pub pending_work_capacity: usize,
    pub block_on_send: bool,
    pub block_on_response: bool,
    pub user_agent_addendum: String,
}

impl Config {
    pub fn new(api_host: impl Into<String>, write_key: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            api_host: api_host.into(),
            write_key: write_key.into(),
            dataset: dataset.into(),
            sample_rate: 1,
            max_batch_size: 50,
            batch_timeout: Duration::from_millis(100),
            max_concurrent_batches: 80,
            pending_work_capacity: 10_000,
            block_on_send: false,
            block_on_response: false,
            user_agent_addendum: String::new(),
        }
    }
}
