//! Fresh-connection HTTP streams.
//!
//! Wraps hyper's http1 connection machinery: the factory opens one
//! connection per request through the configured connector, performs the
//! handshake, and spawns the connection driver. Requests are sent in
//! origin-form with an explicit `Host` header.

use crate::base::error::DohError;
use crate::socket::connect::Connector;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, Request};
use http_body_util::{BodyExt, Empty};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use url::Url;

/// Wraps the underlying protocol stream.
///
/// Bodies are empty: the fetch surface of this crate is GET-shaped, and
/// the DoH wire contract is a bodyless GET.
pub struct HttpStream {
    sender: http1::SendRequest<Empty<Bytes>>,
}

impl HttpStream {
    /// Sends one request and waits for the response headers.
    pub async fn send_request(
        &mut self,
        req: Request<Empty<Bytes>>,
    ) -> Result<http::Response<Incoming>, DohError> {
        self.sender.send_request(req).await.map_err(|error| {
            tracing::debug!(%error, "HTTP exchange failed");
            DohError::Http
        })
    }
}

/// Opens one [`HttpStream`] per request. No pooling, no reuse.
pub struct StreamFactory {
    connector: Connector,
    header_timeout: Duration,
}

impl StreamFactory {
    pub fn new(connector: Connector, header_timeout: Duration) -> Self {
        Self {
            connector,
            header_timeout,
        }
    }

    /// Connects to the URL's origin and performs the http1 handshake.
    pub async fn open(&self, url: &Url) -> Result<HttpStream, DohError> {
        let socket = self.connector.connect(url).await?;
        let io = TokioIo::new(socket);

        let (sender, conn) = http1::handshake(io).await.map_err(|error| {
            tracing::debug!(%error, "http1 handshake failed");
            DohError::Http
        })?;

        // Drive the connection until the exchange completes.
        tokio::spawn(async move {
            if let Err(error) = conn.await {
                tracing::trace!(%error, "connection driver ended with error");
            }
        });

        Ok(HttpStream { sender })
    }

    /// Opens a fresh connection and performs one request on it, bounded
    /// by the response-header timeout.
    pub async fn execute(
        &self,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
    ) -> Result<http::Response<Incoming>, DohError> {
        let mut stream = self.open(url).await?;
        let request = build_request(method, url, headers)?;

        match tokio::time::timeout(self.header_timeout, stream.send_request(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::debug!(%url, "response headers timed out");
                Err(DohError::Http)
            }
        }
    }
}

/// Builds an origin-form request with an explicit `Host` header, as the
/// http1 connection API requires.
fn build_request(
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
) -> Result<Request<Empty<Bytes>>, DohError> {
    let host = url.host_str().ok_or(DohError::InvalidUrl)?;
    let host_header = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut request = Request::builder()
        .method(method.clone())
        .uri(target)
        .header(
            header::HOST,
            HeaderValue::from_str(&host_header).map_err(|_| DohError::InvalidUrl)?,
        )
        .body(Empty::new())
        .map_err(|_| DohError::InvalidUrl)?;

    request.headers_mut().extend(headers.clone());
    Ok(request)
}

/// Response body wrapper.
pub struct ResponseBody {
    inner: Incoming,
}

impl ResponseBody {
    pub fn new(inner: Incoming) -> Self {
        Self { inner }
    }

    /// Read the entire body as bytes.
    pub async fn bytes(self) -> Result<Bytes, DohError> {
        let collected = self.inner.collect().await.map_err(|error| {
            tracing::debug!(%error, "body read failed");
            DohError::Body
        })?;
        Ok(collected.to_bytes())
    }

    /// Read the body and decode it as JSON.
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T, DohError> {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(DohError::Decode)
    }
}
