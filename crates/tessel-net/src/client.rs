//! HTTP Client
//!
//! Request interceptors run in registration order and may rewrite the
//! options asynchronously. The response (or error) then passes through each
//! response interceptor pair in order, like a promise chain: a success
//! transformer may fail the chain, an error transformer may recover it.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use smol::future::{BoxedLocal, FutureExt};
use tracing::{debug, warn};

use crate::request::{Request, RequestOptions};
use crate::transport::{Transport, UnavailableTransport};
use crate::NetError;

/// Async rewrite of outgoing `(url, options)`
pub type RequestInterceptor =
    Rc<dyn Fn(String, RequestOptions) -> BoxedLocal<Result<(String, RequestOptions), NetError>>>;

/// Wrap an async closure as a [`RequestInterceptor`]
pub fn request_interceptor<F, Fut>(f: F) -> RequestInterceptor
where
    F: Fn(String, RequestOptions) -> Fut + 'static,
    Fut: Future<Output = Result<(String, RequestOptions), NetError>> + 'static,
{
    Rc::new(move |url, options| f(url, options).boxed_local())
}

type SuccessFn = Rc<dyn Fn(serde_json::Value) -> Result<serde_json::Value, NetError>>;
type ErrorFn = Rc<dyn Fn(NetError) -> Result<serde_json::Value, NetError>>;

/// Success/error transformer pair
#[derive(Clone, Default)]
pub struct ResponseInterceptor {
    on_success: Option<SuccessFn>,
    on_error: Option<ErrorFn>,
}

impl ResponseInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl Fn(serde_json::Value) -> Result<serde_json::Value, NetError> + 'static) -> Self {
        self.on_success = Some(Rc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(NetError) -> Result<serde_json::Value, NetError> + 'static) -> Self {
        self.on_error = Some(Rc::new(f));
        self
    }

    fn apply(&self, result: Result<serde_json::Value, NetError>) -> Result<serde_json::Value, NetError> {
        match result {
            Ok(value) => match &self.on_success {
                Some(f) => f(value),
                None => Ok(value),
            },
            Err(err) => match &self.on_error {
                Some(f) => f(err),
                None => Err(err),
            },
        }
    }
}

/// HTTP client builder
pub struct HttpClientBuilder {
    transport: Rc<dyn Transport>,
    default_headers: Vec<(String, String)>,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self { transport: Rc::new(UnavailableTransport), default_headers: Vec::new() }
    }

    pub fn transport(mut self, transport: Rc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn default_header(mut self, name: &str, value: &str) -> Self {
        self.default_headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn build(self) -> HttpClient {
        HttpClient {
            transport: RefCell::new(self.transport),
            default_headers: self.default_headers,
            request_interceptors: RefCell::new(Vec::new()),
            response_interceptors: RefCell::new(Vec::new()),
        }
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client
pub struct HttpClient {
    transport: RefCell<Rc<dyn Transport>>,
    default_headers: Vec<(String, String)>,
    request_interceptors: RefCell<Vec<RequestInterceptor>>,
    response_interceptors: RefCell<Vec<ResponseInterceptor>>,
}

impl HttpClient {
    pub fn new(transport: Rc<dyn Transport>) -> Self {
        Self::builder().transport(transport).build()
    }

    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::new()
    }

    pub fn set_transport(&self, transport: Rc<dyn Transport>) {
        *self.transport.borrow_mut() = transport;
    }

    pub fn add_request_interceptor(&self, interceptor: RequestInterceptor) {
        self.request_interceptors.borrow_mut().push(interceptor);
    }

    pub fn add_response_interceptor(&self, interceptor: ResponseInterceptor) {
        self.response_interceptors.borrow_mut().push(interceptor);
    }

    pub fn interceptor_count(&self) -> (usize, usize) {
        (self.request_interceptors.borrow().len(), self.response_interceptors.borrow().len())
    }

    /// Send a request and decode the body. Non-2xx statuses become
    /// [`NetError::Http`] carrying the body text.
    pub async fn request(&self, url: &str, options: RequestOptions) -> Result<serde_json::Value, NetError> {
        let result = self.send(url, options).await;

        let interceptors = self.response_interceptors.borrow().clone();
        let result = interceptors.iter().fold(result, |acc, i| i.apply(acc));
        if let Err(err) = &result {
            warn!(url, error = %err, "request failed");
        }
        result
    }

    async fn send(&self, url: &str, mut options: RequestOptions) -> Result<serde_json::Value, NetError> {
        for (name, value) in &self.default_headers {
            if options.get_header(name).is_none() {
                options.set_header(name, value);
            }
        }

        let mut url = url.to_string();
        let interceptors = self.request_interceptors.borrow().clone();
        for interceptor in interceptors {
            (url, options) = interceptor(url, options).await?;
        }

        debug!(method = options.method.as_str(), url = %url, "sending request");
        let transport = self.transport.borrow().clone();
        let response = transport.send(Request::new(&url, options)).await?;

        if !response.ok() {
            return Err(NetError::Http { status: response.status, body: response.text() });
        }
        Ok(response.json_or_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{StaticRoute, StaticTransport};
    use crate::Method;

    fn client_with(transport: StaticTransport) -> (HttpClient, Rc<StaticTransport>) {
        let transport = Rc::new(transport);
        (HttpClient::new(transport.clone()), transport)
    }

    #[test]
    fn test_json_and_text_bodies() {
        let (client, _) = client_with(
            StaticTransport::new()
                .json("/json", serde_json::json!({"ok": true}))
                .route(Method::Get, "/text", StaticRoute::ok("hello")),
        );
        let json = smol::block_on(client.request("/json", RequestOptions::new())).unwrap();
        let text = smol::block_on(client.request("/text", RequestOptions::new())).unwrap();
        assert_eq!(json, serde_json::json!({"ok": true}));
        assert_eq!(text, serde_json::json!("hello"));
    }

    #[test]
    fn test_non_2xx_is_error_with_body() {
        let (client, _) =
            client_with(StaticTransport::new().route(Method::Get, "/bad", StaticRoute::status(500, "oops")));
        let err = smol::block_on(client.request("/bad", RequestOptions::new())).unwrap_err();
        assert_eq!(err, NetError::Http { status: 500, body: "oops".into() });
    }

    #[test]
    fn test_request_interceptor_can_reject() {
        let (client, transport) = client_with(StaticTransport::new());
        client.add_request_interceptor(request_interceptor(|_, _| async {
            Err(NetError::Interceptor("denied".into()))
        }));
        let err = smol::block_on(client.request("/x", RequestOptions::new())).unwrap_err();
        assert_eq!(err, NetError::Interceptor("denied".into()));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_default_headers() {
        let transport = Rc::new(StaticTransport::new().json("/h", serde_json::json!(null)));
        let client = HttpClient::builder()
            .transport(transport.clone())
            .default_header("Accept", "application/json")
            .build();
        smol::block_on(client.request("/h", RequestOptions::new())).unwrap();
        assert_eq!(transport.requests()[0].header("accept"), Some("application/json"));
    }
}
