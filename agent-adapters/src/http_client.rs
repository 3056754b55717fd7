//! Shared HTTPS client for the gateway's JSON services.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use agent_primitives::{UpstreamError, UpstreamResult};
use hyper::body::to_bytes;
use hyper::client::HttpConnector;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER};
use hyper::{Body, Client, Request, Response, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;
use tracing::debug;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::traits::{AdapterError, AdapterResult};

pub(crate) type HyperClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[allow(clippy::unnecessary_wraps)]
pub(crate) fn build_https_client() -> AdapterResult<HyperClient> {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = HttpsConnector::from((http, Arc::new(config)));

    Ok(Client::builder().build::<_, Body>(connector))
}

/// Connection settings shared by every remote service client.
#[derive(Clone)]
pub struct ServiceEndpoint {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl fmt::Debug for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceEndpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ServiceEndpoint {
    /// Creates settings for the given base URL.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] when the URL has no
    /// `http://`/`https://` scheme or does not parse.
    pub fn new(base_url: impl AsRef<str>) -> AdapterResult<Self> {
        Ok(Self {
            base_url: sanitize_base_url(base_url.as_ref())?,
            api_key: None,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Sends `Authorization: Bearer <key>` with every request.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Overrides the per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Normalized base URL, always ending in `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// JSON-over-HTTPS client bound to one [`ServiceEndpoint`].
#[derive(Clone)]
pub(crate) struct HttpJsonClient {
    client: HyperClient,
    endpoint: ServiceEndpoint,
}

impl fmt::Debug for HttpJsonClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpJsonClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpJsonClient {
    pub(crate) fn new(endpoint: ServiceEndpoint) -> AdapterResult<Self> {
        Ok(Self {
            client: build_https_client()?,
            endpoint,
        })
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.endpoint.timeout
    }

    /// Posts `payload` and returns the raw response once headers arrive.
    /// Non-success statuses are mapped before returning.
    pub(crate) async fn send<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> UpstreamResult<Response<Body>> {
        let uri = format!("{}{path}", self.endpoint.base_url)
            .parse::<Uri>()
            .map_err(|err| UpstreamError::unavailable(format!("invalid endpoint {path}: {err}")))?;
        let body = serde_json::to_vec(payload)
            .map_err(|err| UpstreamError::unavailable(format!("failed to encode {path} request: {err}")))?;

        let mut builder = Request::post(uri).header(CONTENT_TYPE, "application/json");
        if let Some(key) = &self.endpoint.api_key {
            builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
        }
        let request = builder
            .body(Body::from(body))
            .map_err(|err| UpstreamError::unavailable(format!("failed to build {path} request: {err}")))?;

        debug!(path, "sending service request");
        let response = timeout(self.endpoint.timeout, self.client.request(request))
            .await
            .map_err(|_| UpstreamError::unavailable(format!("{path} request timed out")))?
            .map_err(|err| UpstreamError::unavailable(format!("{path} request failed: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let bytes = timeout(self.endpoint.timeout, to_bytes(response.into_body()))
            .await
            .ok()
            .and_then(Result::ok)
            .unwrap_or_default();
        Err(map_status(status, &headers, &String::from_utf8_lossy(&bytes), path))
    }

    /// Posts `payload` and decodes a JSON response body.
    pub(crate) async fn post_json<T, R>(&self, path: &str, payload: &T) -> UpstreamResult<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self.send(path, payload).await?;
        let bytes = timeout(self.endpoint.timeout, to_bytes(response.into_body()))
            .await
            .map_err(|_| UpstreamError::unavailable(format!("{path} response timed out")))?
            .map_err(|err| UpstreamError::unavailable(format!("failed to read {path} response: {err}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| UpstreamError::malformed(format!("failed to decode {path} response: {err}")))
    }

    /// Posts `payload` and discards whatever the service answers.
    pub(crate) async fn post_ignored<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
    ) -> UpstreamResult<()> {
        let response = self.send(path, payload).await?;
        // Drain so the connection can be reused.
        let _ = timeout(self.endpoint.timeout, to_bytes(response.into_body())).await;
        Ok(())
    }
}

/// Maps a non-success HTTP status onto the upstream error taxonomy.
pub(crate) fn map_status(
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
    path: &str,
) -> UpstreamError {
    match status {
        StatusCode::NOT_FOUND => UpstreamError::NotFound {
            resource: if body.trim().is_empty() {
                path.to_owned()
            } else {
                body.trim().to_owned()
            },
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => UpstreamError::PermissionDenied {
            reason: format!("{status}: {}", body.trim()),
        },
        StatusCode::TOO_MANY_REQUESTS => UpstreamError::Throttled {
            retry_after: headers
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        _ => UpstreamError::unavailable(format!("{path} returned {status}: {}", body.trim())),
    }
}

fn sanitize_base_url(input: &str) -> AdapterResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(AdapterError::configuration(
            "service base URL must start with http:// or https://",
        ));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid service base URL: {err}")))?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn rejects_base_url_without_scheme() {
        let err = ServiceEndpoint::new("agentcore.internal").unwrap_err();
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn sanitize_adds_trailing_slash() {
        let endpoint = ServiceEndpoint::new("https://agentcore.internal/v1").unwrap();
        assert_eq!(endpoint.base_url(), "https://agentcore.internal/v1/");
    }

    #[test]
    fn debug_hides_api_key() {
        let endpoint = ServiceEndpoint::new("https://agentcore.internal")
            .unwrap()
            .with_api_key("secret");
        assert!(!format!("{endpoint:?}").contains("secret"));
    }

    #[test]
    fn maps_not_found_and_permission() {
        let headers = HeaderMap::new();
        assert!(matches!(
            map_status(StatusCode::NOT_FOUND, &headers, "", "prompts/get"),
            UpstreamError::NotFound { resource } if resource == "prompts/get"
        ));
        for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
            assert!(matches!(
                map_status(status, &headers, "denied", "prompts/get"),
                UpstreamError::PermissionDenied { .. }
            ));
        }
    }

    #[test]
    fn maps_throttling_with_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(
            map_status(StatusCode::TOO_MANY_REQUESTS, &headers, "", "agents/invoke"),
            UpstreamError::Throttled {
                retry_after: Some(Duration::from_secs(7))
            }
        );
        assert_eq!(
            map_status(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), "", "agents/invoke"),
            UpstreamError::Throttled { retry_after: None }
        );
    }

    #[test]
    fn other_failures_carry_body() {
        let err = map_status(
            StatusCode::BAD_GATEWAY,
            &HeaderMap::new(),
            "upstream exploded",
            "guardrails/apply",
        );
        assert!(matches!(err, UpstreamError::Unavailable { reason } if reason.contains("upstream exploded")));
    }
}
