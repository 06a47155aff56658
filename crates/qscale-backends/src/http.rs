//! Minimal HTTP/1.1 client shared by the backends.
//!
//! Opens one connection per request (the controller makes at most three
//! calls per tick), wraps it in TLS for `https` URLs, and bounds the whole
//! exchange with a timeout.

use std::time::Duration;

use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

use qscale_core::{BackendError, BackendResult};

use crate::tls::TlsConfig;

const CLIENT_AGENT: &str = concat!("qscale/", env!("CARGO_PKG_VERSION"));

/// Status and fully-read body of a response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

impl HttpResponse {
    /// Turn non-2xx statuses into `BackendError::Status`.
    pub fn error_for_status(self) -> BackendResult<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(BackendError::Status {
                status: self.status.as_u16(),
                body: String::from_utf8_lossy(&self.body).trim().to_string(),
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> BackendResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

/// HTTP client with a fixed TLS config and per-request timeout.
#[derive(Clone)]
pub struct HttpClient {
    tls: TlsConfig,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(tls: TlsConfig, timeout: Duration) -> Self {
        Self { tls, timeout }
    }

    pub async fn get(&self, url: &str, authorization: &str) -> BackendResult<HttpResponse> {
        self.send(Method::GET, url, authorization, None).await
    }

    pub async fn post_json(
        &self,
        url: &str,
        authorization: &str,
        body: &serde_json::Value,
    ) -> BackendResult<HttpResponse> {
        let payload =
            serde_json::to_vec(body).map_err(|e| BackendError::Request(e.to_string()))?;
        self.send(Method::POST, url, authorization, Some(payload)).await
    }

    /// Send a request, bounded by the client timeout.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        authorization: &str,
        body: Option<Vec<u8>>,
    ) -> BackendResult<HttpResponse> {
        match tokio::time::timeout(self.timeout, self.exchange(method, url, authorization, body))
            .await
        {
            Ok(result) => result,
            Err(_) => {
                debug!(%url, "http request timed out");
                Err(BackendError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    async fn exchange(
        &self,
        method: Method,
        url: &str,
        authorization: &str,
        body: Option<Vec<u8>>,
    ) -> BackendResult<HttpResponse> {
        let target = Target::parse(url)?;

        let mut builder = Request::builder()
            .method(method)
            .uri(target.path_and_query.as_str())
            .header(HOST, target.authority.as_str())
            .header(USER_AGENT, CLIENT_AGENT)
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, authorization);
        if body.is_some() {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(Full::new(Bytes::from(body.unwrap_or_default())))
            .map_err(|e| BackendError::Request(e.to_string()))?;

        let stream = TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(|e| BackendError::Connect(format!("{}:{}: {e}", target.host, target.port)))?;

        if target.tls {
            let server_name = rustls::pki_types::ServerName::try_from(target.host.clone())
                .map_err(|e| BackendError::Tls(format!("{}: {e}", target.host)))?;
            let connector = tokio_rustls::TlsConnector::from(self.tls.client_config.clone());
            let stream = connector
                .connect(server_name, stream)
                .await
                .map_err(|e| BackendError::Tls(e.to_string()))?;
            round_trip(stream, request).await
        } else {
            round_trip(stream, request).await
        }
    }
}

async fn round_trip<T>(io: T, request: Request<Full<Bytes>>) -> BackendResult<HttpResponse>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .map_err(|e| BackendError::Request(format!("handshake: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "http connection closed with error");
        }
    });

    let response = sender
        .send_request(request)
        .await
        .map_err(|e| BackendError::Request(e.to_string()))?;

    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|e| BackendError::Request(format!("reading body: {e}")))?
        .to_bytes();

    Ok(HttpResponse { status, body })
}

/// Connection details pulled out of an absolute URL.
#[derive(Debug, PartialEq, Eq)]
struct Target {
    tls: bool,
    host: String,
    port: u16,
    authority: String,
    path_and_query: String,
}

impl Target {
    fn parse(url: &str) -> BackendResult<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| BackendError::Url(format!("{url}: {e}")))?;

        let tls = match uri.scheme_str() {
            Some("https") => true,
            Some("http") => false,
            other => {
                return Err(BackendError::Url(format!(
                    "{url}: unsupported scheme {other:?}"
                )));
            }
        };

        let authority = uri
            .authority()
            .ok_or_else(|| BackendError::Url(format!("{url}: missing host")))?;
        let host = authority
            .host()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = authority.port_u16().unwrap_or(if tls { 443 } else { 80 });
        let path_and_query = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            tls,
            host,
            port,
            authority: authority.as_str().to_string(),
            path_and_query,
        })
    }
}

/// Percent-encode one URL path segment (RFC 3986 unreserved set passes
/// through).
pub fn encode_path_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
