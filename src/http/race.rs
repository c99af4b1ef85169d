//! Race-to-first-success request execution.
//!
//! Redundancy against slow or failing network paths: the same request
//! runs on several fresh connections at once and the first successful
//! body wins. Losing attempts are never aggregated into the caller's
//! error; when nothing succeeds, only the timeout surfaces.

use crate::base::error::DohError;
use crate::http::stream::{ResponseBody, StreamFactory};
use bytes::Bytes;
use http::{HeaderMap, Method};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use url::Url;

/// Runs `attempts` concurrent executions of one request and returns the
/// body of the first that succeeds within `window`.
///
/// Each attempt dials its own fresh connection through the factory's
/// connector. The report channel is buffered to the fan-out width, so an
/// attempt that completes after the race is decided never blocks; the
/// remaining tasks are aborted once a result is taken.
pub(crate) async fn race_fetch(
    factory: &Arc<StreamFactory>,
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
    attempts: usize,
    window: Duration,
) -> Result<Bytes, DohError> {
    let attempts = attempts.max(1);
    let deadline = Instant::now() + window;
    let (tx, mut rx) = mpsc::channel(attempts);

    let mut handles = Vec::with_capacity(attempts);
    for n in 0..attempts {
        let tx = tx.clone();
        let factory = Arc::clone(factory);
        let method = method.clone();
        let url = url.clone();
        let headers = headers.clone();
        handles.push(tokio::spawn(async move {
            match attempt(&factory, &method, &url, &headers).await {
                Ok(body) => {
                    let _ = tx.try_send(body);
                }
                Err(error) => {
                    tracing::trace!(attempt = n, %error, "fetch attempt lost");
                }
            }
        }));
    }
    drop(tx);

    let outcome = match tokio::time::timeout_at(deadline, rx.recv()).await {
        Ok(Some(body)) => {
            tracing::debug!(%url, attempts, "fetch race won");
            Ok(body)
        }
        // Every attempt already failed; per the error policy only the
        // timeout surfaces, without waiting out the window.
        Ok(None) => Err(DohError::Timeout),
        Err(_) => Err(DohError::Timeout),
    };

    for handle in &handles {
        handle.abort();
    }
    outcome
}

/// One execution: fresh connection, request, status check, body read.
async fn attempt(
    factory: &StreamFactory,
    method: &Method,
    url: &Url,
    headers: &HeaderMap,
) -> Result<Bytes, DohError> {
    let response = factory.execute(method, url, headers).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DohError::Status(status.as_u16()));
    }
    ResponseBody::new(response.into_body()).bytes().await
}
