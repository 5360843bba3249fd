//! Transports
//!
//! A transport turns a [`Request`] into a [`Response`]. Futures are
//! `!Send`: everything runs on the engine's single-threaded executor.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::task::{Poll, Waker};

use smol::future::{self, BoxedLocal, FutureExt};
use tracing::debug;

use crate::request::{Method, Request, Response};
use crate::NetError;

/// Sends a request
pub trait Transport {
    fn send(&self, request: Request) -> BoxedLocal<Result<Response, NetError>>;
}

/// Rejects every request. Default when no transport is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableTransport;

impl Transport for UnavailableTransport {
    fn send(&self, request: Request) -> BoxedLocal<Result<Response, NetError>> {
        let message = format!("no transport configured for {}", request.url);
        async move { Err(NetError::Transport(message)) }.boxed_local()
    }
}

/// Latch that holds pending sends until opened
#[derive(Clone, Default)]
pub struct Gate {
    inner: Rc<GateInner>,
}

#[derive(Default)]
struct GateInner {
    open: Cell<bool>,
    wakers: RefCell<Vec<Waker>>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.get()
    }

    /// Release everything waiting, and all later waits
    pub fn open(&self) {
        self.inner.open.set(true);
        let wakers = std::mem::take(&mut *self.inner.wakers.borrow_mut());
        for waker in wakers {
            waker.wake();
        }
    }

    pub async fn wait(&self) {
        future::poll_fn(|cx| {
            if self.inner.open.get() {
                Poll::Ready(())
            } else {
                self.inner.wakers.borrow_mut().push(cx.waker().clone());
                Poll::Pending
            }
        })
        .await
    }
}

/// Canned response for [`StaticTransport`]
#[derive(Debug, Clone, PartialEq)]
pub struct StaticRoute {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl StaticRoute {
    pub fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            status: 200,
            headers: vec![("Content-Type".into(), "application/json".into())],
            body: value.to_string(),
        }
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self { status, headers: Vec::new(), body: body.to_string() }
    }
}

/// In-memory transport serving registered routes. Records every request.
#[derive(Default)]
pub struct StaticTransport {
    routes: RefCell<HashMap<(Method, String), StaticRoute>>,
    requests: RefCell<Vec<Request>>,
    calls: Cell<usize>,
    gate: RefCell<Option<Gate>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`add_route`](Self::add_route)
    pub fn route(self, method: Method, url: &str, route: StaticRoute) -> Self {
        self.add_route(method, url, route);
        self
    }

    pub fn add_route(&self, method: Method, url: &str, route: StaticRoute) {
        self.routes.borrow_mut().insert((method, url.to_string()), route);
    }

    /// Serve `value` for `GET url`
    pub fn json(self, url: &str, value: serde_json::Value) -> Self {
        self.route(Method::Get, url, StaticRoute::json(&value))
    }

    /// Hold every subsequent send until the returned gate opens
    pub fn hold(&self) -> Gate {
        let gate = Gate::new();
        *self.gate.borrow_mut() = Some(gate.clone());
        gate
    }

    /// Stop holding new sends (sends already held stay on their gate)
    pub fn release(&self) {
        if let Some(gate) = self.gate.borrow_mut().take() {
            gate.open();
        }
    }

    /// Total number of sends
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.requests.borrow().iter().filter(|r| r.url == url).count()
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }
}

impl Transport for StaticTransport {
    fn send(&self, request: Request) -> BoxedLocal<Result<Response, NetError>> {
        self.calls.set(self.calls.get() + 1);
        debug!(method = request.method.as_str(), url = %request.url, "static transport");

        let route = self.routes.borrow().get(&(request.method, request.url.clone())).cloned();
        self.requests.borrow_mut().push(request);
        let gate = self.gate.borrow().clone();

        async move {
            if let Some(gate) = gate {
                gate.wait().await;
            }
            Ok(match route {
                Some(route) => Response { status: route.status, headers: route.headers, body: route.body.into_bytes() },
                None => Response::new(404, "Not Found"),
            })
        }
        .boxed_local()
    }
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send(&self, request: Request) -> BoxedLocal<Result<Response, NetError>> {
        (**self).send(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_routes_and_counts() {
        let transport = StaticTransport::new().json("/a", serde_json::json!([1]));
        let ok = smol::block_on(transport.send(Request::get("/a"))).unwrap();
        let missing = smol::block_on(transport.send(Request::get("/b"))).unwrap();
        assert_eq!(ok.status, 200);
        assert_eq!(missing.status, 404);
        assert_eq!(transport.calls(), 2);
        assert_eq!(transport.calls_to("/a"), 1);
    }

    #[test]
    fn test_gate_holds_until_open() {
        let transport = StaticTransport::new().json("/slow", serde_json::json!(1));
        let gate = transport.hold();
        let ex = smol::LocalExecutor::new();
        let task = ex.spawn(transport.send(Request::get("/slow")));
        while ex.try_tick() {}
        assert!(!task.is_finished());
        gate.open();
        while ex.try_tick() {}
        assert!(task.is_finished());
    }

    #[test]
    fn test_unavailable() {
        let result = smol::block_on(UnavailableTransport.send(Request::get("/x")));
        assert!(matches!(result, Err(NetError::Transport(_))));
    }
}
