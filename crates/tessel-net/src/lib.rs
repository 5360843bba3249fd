//! Tessel Networking
//!
//! The request capability behind `data-fetch`: a [`Transport`] that moves
//! bytes, and an [`HttpClient`] that runs interceptors around it and decodes
//! bodies as JSON.

mod client;
mod http1;
mod request;
mod transport;

pub use client::{request_interceptor, HttpClient, HttpClientBuilder, RequestInterceptor, ResponseInterceptor};
pub use http1::TcpTransport;
pub use request::{Method, Request, RequestOptions, Response};
pub use transport::{Gate, StaticRoute, StaticTransport, Transport, UnavailableTransport};

/// Network error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NetError {
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("interceptor rejected request: {0}")]
    Interceptor(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}
