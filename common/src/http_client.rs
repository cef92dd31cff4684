use crate::errors::FetchError;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// HTTP client with a hard per-request timeout covering connect, send and
/// body read. Retries are left to callers.
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { client }
    }

    /// Fetch JSON from URL, mapping every failure onto the upstream taxonomy
    #[instrument(skip(self, url), fields(url = %redact(url)))]
    pub async fn get_json<T>(&self, url: &str) -> Result<T, FetchError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(error = %e, "Upstream request failed");
            if e.is_timeout() {
                FetchError::unavailable(format!("request to {} timed out", redact(url)))
            } else {
                FetchError::unavailable(format!("request to {} failed", redact(url)))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Upstream returned error status");
            return Err(FetchError::unavailable(format!("HTTP error: {}", status)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| FetchError::unavailable(format!("failed to read body: {}", e)))?;
        let json: T = serde_json::from_str(&text)
            .map_err(|e| FetchError::invalid_response(format!("malformed JSON: {}", e)))?;

        info!(status = status.as_u16(), "Request successful");
        Ok(json)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Strip the query string so credentials never reach the logs.
fn redact(url: &str) -> &str {
    url.split_once('?').map(|(base, _)| base).unwrap_or(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize)]
    struct Payload {
        value: u32,
    }

    #[test]
    fn redact_drops_query_string() {
        assert_eq!(
            redact("https://api.example.com/v1/forecast?apikey=secret"),
            "https://api.example.com/v1/forecast"
        );
        assert_eq!(redact("http://localhost/x"), "http://localhost/x");
    }

    #[tokio::test]
    async fn decodes_successful_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payload"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"value": 7}"#))
            .mount(&server)
            .await;

        let payload: Payload = HttpClient::default()
            .get_json(&format!("{}/payload", server.uri()))
            .await
            .unwrap();
        assert_eq!(payload.value, 7);
    }

    #[tokio::test]
    async fn error_status_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = HttpClient::default()
            .get_json::<Payload>(&format!("{}/payload", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn malformed_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = HttpClient::default()
            .get_json::<Payload>(&format!("{}/payload", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::UpstreamInvalidResponse(_)));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"value": 1}"#)
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let started = std::time::Instant::now();
        let err = HttpClient::new(1)
            .get_json::<Payload>(&format!("{}/payload", server.uri()))
            .await
            .unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(4));
        match err {
            FetchError::UpstreamUnavailable(message) => assert!(message.contains("timed out")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
