//! Plain HTTP/1.1 over TCP
//!
//! One connection per request (`Connection: close`). Only `http://` URLs;
//! TLS is left to custom transports.

use smol::future::{BoxedLocal, FutureExt};
use smol::io::{AsyncReadExt, AsyncWriteExt};
use smol::net::TcpStream;
use tracing::debug;
use url::{Host, Url};

use crate::request::{Request, Response};
use crate::transport::Transport;
use crate::NetError;

/// An `http://` URL resolved to what the request line needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HttpUrl {
    /// Host to connect to (IPv6 addresses without brackets)
    pub host: String,
    /// `Host` header value
    pub authority: String,
    pub port: u16,
    /// Percent-encoded path and query
    pub path: String,
}

impl HttpUrl {
    pub(crate) fn parse(raw: &str) -> Result<Self, NetError> {
        let url = Url::parse(raw).map_err(|e| NetError::InvalidUrl(format!("{raw}: {e}")))?;
        if url.scheme() != "http" {
            return Err(NetError::InvalidUrl(format!("{raw} (only http:// is supported)")));
        }
        let host = match url.host() {
            Some(Host::Domain(domain)) => domain.to_string(),
            Some(Host::Ipv4(addr)) => addr.to_string(),
            Some(Host::Ipv6(addr)) => addr.to_string(),
            None => return Err(NetError::InvalidUrl(raw.to_string())),
        };
        let port = url.port_or_known_default().unwrap_or(80);
        let host_str = url.host_str().unwrap_or(host.as_str());
        let authority = match url.port() {
            Some(port) => format!("{host_str}:{port}"),
            None => host_str.to_string(),
        };
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        Ok(Self { host, authority, port, path })
    }
}

/// HTTP/1.1 client transport
#[derive(Debug, Clone)]
pub struct TcpTransport {
    user_agent: String,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self { user_agent: "Tessel/0.1".into() }
    }

    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = ua.to_string();
        self
    }
}

impl Default for TcpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for TcpTransport {
    fn send(&self, request: Request) -> BoxedLocal<Result<Response, NetError>> {
        let user_agent = self.user_agent.clone();
        async move {
            let url = HttpUrl::parse(&request.url)?;
            debug!(method = request.method.as_str(), host = %url.host, path = %url.path, "HTTP request");

            let mut stream = TcpStream::connect((url.host.as_str(), url.port))
                .await
                .map_err(|e| NetError::Transport(e.to_string()))?;

            let head = encode_head(&request, &url, &user_agent);
            stream.write_all(head.as_bytes()).await.map_err(|e| NetError::Transport(e.to_string()))?;
            if let Some(body) = &request.body {
                stream.write_all(body).await.map_err(|e| NetError::Transport(e.to_string()))?;
            }
            stream.flush().await.map_err(|e| NetError::Transport(e.to_string()))?;

            let mut raw = Vec::new();
            stream.read_to_end(&mut raw).await.map_err(|e| NetError::Transport(e.to_string()))?;
            parse_response(&raw)
        }
        .boxed_local()
    }
}

fn encode_head(request: &Request, url: &HttpUrl, user_agent: &str) -> String {
    let mut head = format!("{} {} HTTP/1.1\r\n", request.method.as_str(), url.path);
    head.push_str(&format!("Host: {}\r\n", url.authority));
    head.push_str(&format!("User-Agent: {user_agent}\r\n"));
    head.push_str("Connection: close\r\n");
    for (name, value) in &request.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    if let Some(body) = &request.body {
        head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    }
    head.push_str("\r\n");
    head
}

pub(crate) fn parse_response(raw: &[u8]) -> Result<Response, NetError> {
    let split = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or_else(|| NetError::Decode("incomplete response head".into()))?;
    let head = std::str::from_utf8(&raw[..split]).map_err(|e| NetError::Decode(e.to_string()))?;
    let body = &raw[split + 4..];

    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let status = status_line
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| NetError::Decode(format!("bad status line: {status_line}")))?;

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let mut response = Response { status, headers, body: Vec::new() };
    let chunked = response
        .header("Transfer-Encoding")
        .is_some_and(|v| v.eq_ignore_ascii_case("chunked"));
    response.body = if chunked {
        decode_chunked(body)?
    } else if let Some(len) = response.header("Content-Length").and_then(|v| v.parse::<usize>().ok()) {
        body[..len.min(body.len())].to_vec()
    } else {
        body.to_vec()
    };
    Ok(response)
}

fn decode_chunked(mut data: &[u8]) -> Result<Vec<u8>, NetError> {
    let mut out = Vec::new();
    loop {
        let line_end = data
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or_else(|| NetError::Decode("truncated chunk size".into()))?;
        let size_text = std::str::from_utf8(&data[..line_end]).map_err(|e| NetError::Decode(e.to_string()))?;
        let size_text = size_text.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_text, 16)
            .map_err(|_| NetError::Decode(format!("bad chunk size: {size_text}")))?;
        data = &data[line_end + 2..];
        if size == 0 {
            return Ok(out);
        }
        if data.len() < size {
            return Err(NetError::Decode("truncated chunk".into()));
        }
        out.extend_from_slice(&data[..size]);
        data = data.get(size + 2..).unwrap_or_default();
    }
}
