//! The key that partitions events into batches.

use std::fmt;

/// The (api host, write key, dataset) triple that determines which batch an
/// event belongs to. Two events share a batch iff their destination keys are
/// equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DestinationKey {
    pub api_host: String,
    pub write_key: String,
    pub dataset: String,
}

impl DestinationKey {
    pub fn new(
        api_host: impl Into<String>,
        write_key: impl Into<String>,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            api_host: api_host.into(),
            write_key: write_key.into(),
            dataset: dataset.into(),
        }
    }

    /// `<api_host>/1/batch/<url-escaped-dataset>`
    pub fn batch_url(&self) -> String {
        format!(
            "{}/1/batch/{}",
            self.api_host.trim_end_matches('/'),
            escape_path_segment(&self.dataset)
        )
    }
}

/// Minimal percent-encoder for a single URL path segment, rather than
/// pulling in a URL-encoding crate for one function.
pub(crate) fn escape_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

impl fmt::Display for DestinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.api_host, self.dataset)
    }
}
