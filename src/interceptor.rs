//! Per-scenario request interception: one interceptor per expected step,
//! canned replies, and handles proving every expected request was made.

use crate::data::{RequestData, ResponseData, Step};
use crate::error::Error;
use crate::http_client::{HttpClient, TransportError};
use async_trait::async_trait;
use hyper::Uri;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

pub const SUPPORTED_METHODS: &[&str] =
    &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

#[derive(Debug, Clone)]
enum Reply {
    Fixture(ResponseData),
    ConnectionFailure,
}

#[derive(Debug)]
struct Interceptor {
    method: String,
    origin: String,
    path_and_query: String,
    headers: Option<Vec<(String, String)>>,
    reply: Reply,
    triggered: Arc<AtomicBool>,
}

impl Interceptor {
    fn matches(&self, request: &RequestData, origin: &str, path_and_query: &str) -> bool {
        if self.triggered.load(Ordering::SeqCst) {
            // consumed on first match; an extra identical call falls through
            return false;
        }
        if !self.method.eq_ignore_ascii_case(&request.method)
            || self.origin != origin
            || self.path_and_query != path_and_query
        {
            return false;
        }
        match &self.headers {
            None => true,
            Some(expected) => expected.iter().all(|(name, value)| {
                request
                    .headers
                    .iter()
                    .any(|(k, v)| k.eq_ignore_ascii_case(name) && v == value)
            }),
        }
    }
}

/// The scenario-scoped mock transport. Implements [`HttpClient`], so the
/// script under test reaches it through the same seam it would use for the
/// real network; while it is installed, unmatched requests fail instead of
/// going out.
pub struct MockTransport {
    interceptors: Mutex<Vec<Interceptor>>,
}

/// Proof token for one interceptor. `verify_satisfied` fails loudly if the
/// expected request was never made.
#[derive(Debug)]
pub struct InterceptorHandle {
    description: String,
    triggered: Arc<AtomicBool>,
}

impl InterceptorHandle {
    pub fn is_satisfied(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn verify_satisfied(&self) -> Result<(), Error> {
        if self.is_satisfied() {
            Ok(())
        } else {
            Err(Error::UnsatisfiedInterceptor(self.description.clone()))
        }
    }
}

impl MockTransport {
    /// Installs one interceptor per resolved step, in order. Fails with
    /// `UnsupportedMethod` for a verb outside [`SUPPORTED_METHODS`] and with
    /// `UnresolvedStep` when a step carries neither fixture data nor the
    /// network-error flag.
    pub fn install(steps: &[Step]) -> Result<(Arc<MockTransport>, Vec<InterceptorHandle>), Error> {
        let mut interceptors = Vec::with_capacity(steps.len());
        let mut handles = Vec::with_capacity(steps.len());

        for step in steps {
            let method = step.request.method.to_uppercase();
            if !SUPPORTED_METHODS.contains(&method.as_str()) {
                return Err(Error::UnsupportedMethod(step.request.method.clone()));
            }
            let (origin, path_and_query) = split_url(&step.request.url)?;

            let reply = if step.network_error {
                Reply::ConnectionFailure
            } else if let Some(fixture) = &step.fixture {
                Reply::Fixture(fixture.clone())
            } else {
                return Err(Error::UnresolvedStep(format!(
                    "step {} {} has neither fixture data nor a network-error flag",
                    method, step.request.url
                )));
            };

            let triggered = Arc::new(AtomicBool::new(false));
            handles.push(InterceptorHandle {
                description: format!("{} {}{}", method, origin, path_and_query),
                triggered: triggered.clone(),
            });
            interceptors.push(Interceptor {
                method,
                origin,
                path_and_query,
                headers: step
                    .request
                    .headers
                    .as_ref()
                    .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect()),
                reply,
                triggered,
            });
        }

        Ok((
            Arc::new(MockTransport {
                interceptors: Mutex::new(interceptors),
            }),
            handles,
        ))
    }

    /// Removes all active interceptors. Subsequent requests through this
    /// transport fail as network-disabled.
    pub fn teardown(&self) {
        self.interceptors.lock().unwrap().clear();
    }
}

#[async_trait]
impl HttpClient for MockTransport {
    async fn send(&self, request: &RequestData) -> Result<ResponseData, TransportError> {
        let (origin, path_and_query) = split_url(&request.url)
            .map_err(|_| TransportError::InvalidRequest(request.url.clone()))?;

        let interceptors = self.interceptors.lock().unwrap();
        for interceptor in interceptors.iter() {
            if !interceptor.matches(request, &origin, &path_and_query) {
                continue;
            }
            interceptor.triggered.store(true, Ordering::SeqCst);
            log::debug!(
                "interceptor answered {} {}{}",
                interceptor.method,
                interceptor.origin,
                interceptor.path_and_query
            );
            return match &interceptor.reply {
                Reply::Fixture(fixture) => Ok(fixture.clone()),
                Reply::ConnectionFailure => Err(TransportError::ConnectionFailed(format!(
                    "simulated network failure for {} {}",
                    request.method, request.url
                ))),
            };
        }

        Err(TransportError::NetworkDisabled(format!(
            "no interceptor matched {} {}",
            request.method, request.url
        )))
    }
}

/// Tears the transport down on every exit path of a scenario, so mock state
/// never leaks into the next test.
pub struct InterceptionGuard {
    transport: Arc<MockTransport>,
}

impl InterceptionGuard {
    pub fn new(transport: Arc<MockTransport>) -> Self {
        InterceptionGuard { transport }
    }
}

impl Drop for InterceptionGuard {
    fn drop(&mut self) {
        self.transport.teardown();
    }
}

fn split_url(url: &str) -> Result<(String, String), Error> {
    let uri: Uri = url
        .parse()
        .map_err(|_| Error::ParseUriError(url.to_string()))?;
    let scheme = uri
        .scheme_str()
        .ok_or_else(|| Error::ParseUriError(url.to_string()))?;
    let authority = uri
        .authority()
        .ok_or_else(|| Error::ParseUriError(url.to_string()))?;
    let path_and_query = uri
        .path_and_query()
        .map(|p| p.to_string())
        .unwrap_or_else(|| String::from("/"));

    Ok((format!("{}://{}", scheme, authority), path_and_query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RequestSpec;
    use std::collections::HashMap;

    fn fixture(status_code: u16, body: &str) -> ResponseData {
        ResponseData {
            status_code,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    fn step(method: &str, url: &str) -> Step {
        Step {
            request: RequestSpec {
                method: method.to_string(),
                url: url.to_string(),
                headers: None,
            },
            fixture_path: None,
            fixture: Some(fixture(200, "ok")),
            network_error: false,
        }
    }

    #[tokio::test]
    async fn answers_a_matching_request_with_the_fixture() {
        let steps = vec![step("GET", "https://api.example.test/widgets?page=2")];
        let (transport, handles) = MockTransport::install(&steps).unwrap();

        let response = transport
            .send(&RequestData::new(
                "GET",
                "https://api.example.test/widgets?page=2",
            ))
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "ok");
        assert!(handles[0].is_satisfied());
    }

    #[tokio::test]
    async fn unmatched_requests_fail_as_network_disabled() {
        let steps = vec![step("GET", "https://api.example.test/widgets")];
        let (transport, _handles) = MockTransport::install(&steps).unwrap();

        let result = transport
            .send(&RequestData::new("GET", "https://other.example.test/widgets"))
            .await;

        match result {
            Err(TransportError::NetworkDisabled(_)) => {}
            other => panic!("expected NetworkDisabled, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn interceptors_are_consumed_on_first_match() {
        let steps = vec![step("GET", "https://api.example.test/once")];
        let (transport, _handles) = MockTransport::install(&steps).unwrap();
        let request = RequestData::new("GET", "https://api.example.test/once");

        transport.send(&request).await.unwrap();
        let second = transport.send(&request).await;

        match second {
            Err(TransportError::NetworkDisabled(_)) => {}
            other => panic!("expected NetworkDisabled, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn header_constraints_allow_extra_request_headers() {
        let mut expected = HashMap::new();
        expected.insert(String::from("Authorization"), String::from("SSWS token"));
        let steps = vec![Step {
            request: RequestSpec {
                method: String::from("GET"),
                url: String::from("https://api.example.test/guarded"),
                headers: Some(expected),
            },
            fixture_path: None,
            fixture: Some(fixture(200, "ok")),
            network_error: false,
        }];
        let (transport, _handles) = MockTransport::install(&steps).unwrap();

        let mut request = RequestData::new("GET", "https://api.example.test/guarded");
        request
            .headers
            .insert(String::from("authorization"), String::from("SSWS token"));
        request
            .headers
            .insert(String::from("Accept"), String::from("application/json"));
        assert!(transport.send(&request).await.is_ok());

        // wrong header value no longer matches anything
        let mut bad = RequestData::new("GET", "https://api.example.test/guarded");
        bad.headers
            .insert(String::from("Authorization"), String::from("SSWS other"));
        assert!(transport.send(&bad).await.is_err());
    }

    #[tokio::test]
    async fn network_error_steps_fail_at_the_transport_level() {
        let steps = vec![Step {
            network_error: true,
            fixture: None,
            ..step("POST", "https://api.example.test/flaky")
        }];
        let (transport, handles) = MockTransport::install(&steps).unwrap();

        let result = transport
            .send(&RequestData::new("POST", "https://api.example.test/flaky"))
            .await;

        match result {
            Err(TransportError::ConnectionFailed(_)) => {}
            other => panic!("expected ConnectionFailed, got {:?}", other),
        }
        assert!(handles[0].is_satisfied());
    }

    #[test]
    fn rejects_unsupported_methods() {
        let steps = vec![step("TRACE", "https://api.example.test/widgets")];

        match MockTransport::install(&steps) {
            Err(Error::UnsupportedMethod(method)) => assert_eq!(method, "TRACE"),
            other => panic!("expected UnsupportedMethod, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rejects_unresolved_steps() {
        let steps = vec![Step {
            fixture: None,
            ..step("GET", "https://api.example.test/widgets")
        }];

        match MockTransport::install(&steps) {
            Err(Error::UnresolvedStep(_)) => {}
            other => panic!("expected UnresolvedStep, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn unsatisfied_handles_fail_verification() {
        let steps = vec![step("GET", "https://api.example.test/never")];
        let (_transport, handles) = MockTransport::install(&steps).unwrap();

        match handles[0].verify_satisfied() {
            Err(Error::UnsatisfiedInterceptor(description)) => {
                assert!(description.contains("https://api.example.test/never"))
            }
            other => panic!("expected UnsatisfiedInterceptor, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn guard_tears_interceptors_down() {
        let steps = vec![step("GET", "https://api.example.test/scoped")];
        let (transport, _handles) = MockTransport::install(&steps).unwrap();

        {
            let _guard = InterceptionGuard::new(transport.clone());
        }

        let result = transport
            .send(&RequestData::new("GET", "https://api.example.test/scoped"))
            .await;
        match result {
            Err(TransportError::NetworkDisabled(_)) => {}
            other => panic!("expected NetworkDisabled after teardown, got {:?}", other),
        }
    }
}
