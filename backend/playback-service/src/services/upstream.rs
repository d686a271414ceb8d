/// Outbound HTTP to license servers and stream origins
///
/// One shared `reqwest::Client` with a hard timeout. Calls are never retried:
/// a duplicated license request can be billed twice by a DRM vendor.
use anyhow::Context;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Response};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream request: {0}")]
    InvalidRequest(String),

    /// Stored without its URL
    #[error("upstream unreachable: {0}")]
    Transport(reqwest::Error),
}

/// Buffered upstream answer
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::Transport(err.without_url())
    }
}

impl UpstreamClient {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build upstream HTTP client")?;
        Ok(Self { http })
    }

    /// Send `body` to `url` with `method`, adding `headers` on top of the
    /// caller's content type.
    pub async fn forward(
        &self,
        method: &str,
        url: &str,
        headers: &BTreeMap<String, String>,
        content_type: Option<&str>,
        body: Bytes,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| UpstreamError::InvalidRequest(format!("method {}", method)))?;

        let mut header_map = HeaderMap::new();
        if let Some(content_type) = content_type {
            if let Ok(value) = HeaderValue::from_str(content_type) {
                header_map.insert(CONTENT_TYPE, value);
            }
        }
        merge_headers(&mut header_map, headers)?;

        let mut request = self.http.request(method.clone(), url).headers(header_map);
        if method != Method::GET && method != Method::HEAD {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = content_type_of(&response);
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }

    /// GET `url` with `headers`, leaving the body unread.
    pub async fn fetch(
        &self,
        url: &str,
        headers: &BTreeMap<String, String>,
    ) -> Result<Response, UpstreamError> {
        let mut header_map = HeaderMap::new();
        merge_headers(&mut header_map, headers)?;

        Ok(self.http.get(url).headers(header_map).send().await?)
    }
}

pub fn content_type_of(response: &Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Secret headers override anything the caller supplied.
fn merge_headers(
    target: &mut HeaderMap,
    headers: &BTreeMap<String, String>,
) -> Result<(), UpstreamError> {
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|_| UpstreamError::InvalidRequest("header name".to_string()))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| UpstreamError::InvalidRequest(format!("value of header {}", name)))?;
        target.insert(name, value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> UpstreamClient {
        UpstreamClient::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_forward_post_relays_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wv"))
            .and(header("x-vendor-auth", "secret"))
            .and(header("content-type", "application/octet-stream"))
            .and(body_bytes(vec![1u8, 2, 3]))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/octet-stream")
                    .set_body_bytes(vec![9u8, 8, 7]),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut headers = BTreeMap::new();
        headers.insert("X-Vendor-Auth".to_string(), "secret".to_string());

        let response = client()
            .forward(
                "POST",
                &format!("{}/wv", server.uri()),
                &headers,
                Some("application/octet-stream"),
                Bytes::from_static(&[1, 2, 3]),
            )
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body.as_ref(), &[9, 8, 7]);
        assert_eq!(response.content_type.as_deref(), Some("application/octet-stream"));
    }

    #[tokio::test]
    async fn test_forward_relays_upstream_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("denied"))
            .mount(&server)
            .await;

        let response = client()
            .forward("GET", &server.uri(), &BTreeMap::new(), None, Bytes::new())
            .await
            .unwrap();

        assert_eq!(response.status, 403);
        assert_eq!(response.body.as_ref(), b"denied");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_transport_error() {
        let result = client()
            .forward("GET", "http://127.0.0.1:9/", &BTreeMap::new(), None, Bytes::new())
            .await;

        assert!(matches!(result, Err(UpstreamError::Transport(_))));
    }

    #[tokio::test]
    async fn test_invalid_header_is_rejected_before_sending() {
        let mut headers = BTreeMap::new();
        headers.insert("bad header".to_string(), "x".to_string());

        let result = client()
            .fetch("http://127.0.0.1:9/", &headers)
            .await;

        assert!(matches!(result, Err(UpstreamError::InvalidRequest(_))));
    }
}
