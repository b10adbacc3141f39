//! Synchronous credential-verification side operation.
//!
//! Not part of the async batching pipeline - a single-shot request usable
//! without ever constructing a [`crate::Client`].

use crate::error::VerifyError;

const HEADER_TEAM: &str = "X-Honeycomb-Team";

/// Issue `GET {api_host}/1/team_slug` with the write key and return the
/// team slug, or a taxonomized error.
pub async fn verify_key(http: &reqwest::Client, api_host: &str, write_key: &str) -> Result<String, VerifyError> {
    let url = format!("{}/1/team_slug", api_host.trim_end_matches('/'));
    let resp = http.get(&url).header(HEADER_TEAM, write_key).send().await?;

    let status = resp.status();
    let bytes = resp.bytes().await?;

    if !status.is_success() {
        let body = String::from_utf8_lossy(&bytes).into_owned();
        return Err(VerifyError::from_status(status.as_u16(), body));
    }

    parse_team_slug(&bytes)
}

fn parse_team_slug(bytes: &[u8]) -> Result<String, VerifyError> {
    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|e| VerifyError::Parse(e.to_string()))?;
    value
        .get("team_slug")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| VerifyError::Parse("missing team_slug field".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_team_slug_from_body() {
        let body = br#"{"team_slug":"my-team"}"#;
        assert_eq!(parse_team_slug(body).unwrap(), "my-team");
    }

    #[test]
    fn rejects_body_without_team_slug() {
        let body = br#"{"other":"field"}"#;
        assert!(parse_team_slug(body).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_team_slug(b"not json").is_err());
    }

    #[test]
    fn maps_401_to_unauthorized() {
        assert!(matches!(
            VerifyError::from_status(401, String::new()),
            VerifyError::Unauthorized
        ));
    }

    #[test]
    fn maps_other_non_2xx_to_server_error() {
        match VerifyError::from_status(503, "down".to_string()) {
            VerifyError::Server { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "down");
            }
            other => panic!("expected Server error, got {other:?}"),
        }
    }
}
