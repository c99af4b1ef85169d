//! Single-endpoint dns-json queries.
//!
//! One query is one HTTPS GET with `Accept: application/dns-json`
//! against one endpoint, on a fresh connection. A query succeeds only
//! if the HTTP status is 200, the body decodes, the DNS status is zero,
//! and at least one answer's data parses as an IP literal. Retries and
//! redundancy live entirely in the racing layer.

use crate::base::error::DohError;
use crate::dns::providers::Endpoint;
use crate::http::stream::{ResponseBody, StreamFactory};
use http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;

/// The question section of a dns-json response.
#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: u16,
}

/// One resource record from the answer section.
///
/// `data` holds the record content; only records whose data parses as
/// an IP literal contribute to resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct Answer {
    pub name: String,
    #[serde(rename = "type")]
    pub record_type: u16,
    #[serde(rename = "TTL", default)]
    pub ttl: u32,
    pub data: String,
}

/// A decoded dns-json response.
///
/// Field names follow the wire schema shared by Cloudflare, Google and
/// Quad9. `status` is the DNS rcode and is independent of the HTTP
/// status the endpoint answered with.
#[derive(Debug, Clone, Deserialize)]
pub struct DnsResponse {
    #[serde(rename = "Status")]
    pub status: i32,
    #[serde(rename = "TC", default)]
    pub truncated: bool,
    #[serde(rename = "RD", default)]
    pub recursion_desired: bool,
    #[serde(rename = "RA", default)]
    pub recursion_available: bool,
    #[serde(rename = "AD", default)]
    pub authenticated_data: bool,
    #[serde(rename = "CD", default)]
    pub checking_disabled: bool,
    #[serde(rename = "Question", default)]
    pub question: Vec<Question>,
    #[serde(rename = "Answer", default)]
    pub answer: Vec<Answer>,
}

impl DnsResponse {
    /// The answer records whose data is a valid IP literal.
    pub fn addresses(&self) -> Vec<IpAddr> {
        self.answer
            .iter()
            .filter_map(|a| a.data.parse().ok())
            .collect()
    }
}

/// Performs single dns-json lookups against one endpoint at a time.
#[derive(Clone)]
pub struct DohQuery {
    factory: Arc<StreamFactory>,
}

impl DohQuery {
    /// Creates a query unit over the given transport.
    ///
    /// The factory's connector must be the system path: endpoint
    /// hostnames are resolved by the operating system, never by the
    /// racing resolver this unit feeds.
    pub fn new(factory: Arc<StreamFactory>) -> Self {
        Self { factory }
    }

    /// Resolves `name` to A-record addresses via one endpoint.
    pub async fn query(&self, name: &str, endpoint: &Endpoint) -> Result<Vec<IpAddr>, DohError> {
        let url = endpoint.query_url(name);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("application/dns-json"),
        );

        let response = self.factory.execute(&Method::GET, &url, &headers).await?;
        if response.status() != StatusCode::OK {
            return Err(DohError::Status(response.status().as_u16()));
        }

        let decoded: DnsResponse = ResponseBody::new(response.into_body()).json().await?;
        if decoded.status != 0 {
            return Err(DohError::Unresolved(name.to_string(), decoded.status));
        }

        let addrs = decoded.addresses();
        if addrs.is_empty() {
            return Err(DohError::NoAddress(name.to_string()));
        }

        tracing::debug!(name, %endpoint, count = addrs.len(), "dns-json query answered");
        Ok(addrs)
    }
}
