use crate::data::{RequestData, ResponseData};
use async_trait::async_trait;
use hyper::{
    body,
    header::{HeaderName, HeaderValue},
    Body, HeaderMap, Request,
};
use hyper_tls::HttpsConnector;
use std::{
    collections::HashMap,
    fmt::{self, Display},
};

/// A transport-level failure, as distinct from an HTTP error status (which
/// is an ordinary [`ResponseData`]).
#[derive(Debug, Clone)]
pub enum TransportError {
    /// The connection itself failed (real or simulated).
    ConnectionFailed(String),
    /// Real networking is disabled and no interceptor matched the request.
    NetworkDisabled(String),
    /// The request could not be built (bad URL or header material).
    InvalidRequest(String),
}

impl std::error::Error for TransportError {}

impl Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectionFailed(message) => {
                write!(f, "connection failed: {}", message)
            }
            TransportError::NetworkDisabled(message) => {
                write!(f, "network disabled: {}", message)
            }
            TransportError::InvalidRequest(message) => {
                write!(f, "invalid request: {}", message)
            }
        }
    }
}

/// The outbound-HTTP capability handed to scripts through their context.
/// Live code talks to the real network via [`HyperHttpClient`]; under the
/// harness the same seam is answered by the mock transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: &RequestData) -> Result<ResponseData, TransportError>;
}

#[derive(Debug, Default)]
pub struct HyperHttpClient;

impl HyperHttpClient {
    pub fn new() -> Self {
        Self {}
    }
}

#[async_trait]
impl HttpClient for HyperHttpClient {
    async fn send(&self, request_data: &RequestData) -> Result<ResponseData, TransportError> {
        let mut request_builder = Request::builder()
            .uri(request_data.url.as_str())
            .method(request_data.method.as_str());

        if let Some(headers_mut) = request_builder.headers_mut() {
            put_headers(
                headers_mut,
                request_data
                    .headers
                    .iter()
                    .filter(|(header_name, _)| !header_name.eq_ignore_ascii_case("host")),
            )?;
        }

        let request: Request<Body> = request_builder
            .body(request_data.body.clone().into())
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let client = hyper::Client::builder().build(HttpsConnector::new());
        let response = client
            .request(request)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let status_code = response.status().as_u16();
        let headers = extract_headers(response.headers());
        let body = body::to_bytes(response.into_body())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(ResponseData {
            status_code,
            headers,
            body: String::from_utf8_lossy(&body).into(),
        })
    }
}

pub(crate) fn extract_headers(header_map: &HeaderMap) -> HashMap<String, String> {
    // it currently ignores header values with opaque characters
    header_map
        .iter()
        .map(|(k, v)| (String::from(k.as_str()), v.to_str()))
        .filter_map(|(key, value)| value.ok().map(|v| (key, String::from(v))))
        .collect::<HashMap<_, _>>()
}

pub(crate) fn put_headers<'a, I: IntoIterator<Item = (&'a String, &'a String)>>(
    header_map: &mut HeaderMap<HeaderValue>,
    headers: I,
) -> Result<(), TransportError> {
    for (key, value) in headers {
        let header_name = HeaderName::from_lowercase(key.to_lowercase().as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("invalid header name '{}'", key)))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            TransportError::InvalidRequest(format!("invalid value for header '{}'", key))
        })?;
        header_map.append(header_name, header_value);
    }

    Ok(())
}
