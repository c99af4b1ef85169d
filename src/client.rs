//! HTTP client facade with builder pattern.
//!
//! Wires the provider table into a racing resolver, the resolver into
//! the resolving connector, and exposes the two caller-facing
//! operations: pure resolution ([`Client::lookup`]) and
//! resolution-integrated fetching ([`Client::fetch`]).
//!
//! # Example
//!
//! ```rust,ignore
//! use dohnet::Client;
//!
//! let client = Client::builder()
//!     .fetch_attempts(8)
//!     .build();
//!
//! let addrs = client.lookup("example.com").await?;
//! let body = client.get("https://example.com/").send().await?;
//! ```

use crate::base::error::DohError;
use crate::dns::{DnsResolverWithOverrides, DohQuery, Name, ProviderTable, RacingResolver, Resolve};
use crate::http::race::race_fetch;
use crate::http::stream::StreamFactory;
use crate::socket::connect::Connector;
use bytes::Bytes;
use http::{HeaderMap, Method};
use std::borrow::Cow;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_FETCH_ATTEMPTS: usize = 20;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_TLS_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_HEADER_TIMEOUT: Duration = Duration::from_secs(5);

/// A fully formed request for [`Client::fetch`].
///
/// Bodyless; the fetch surface is GET-shaped.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
}

impl Request {
    /// Creates a request with the given method and URL.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Creates a GET request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }
}

/// Client for DoH-resolved lookups and racing fetches.
///
/// Use [`Client::builder()`] to configure and create a client. Cloning
/// is cheap; clones share the resolver and transport.
#[derive(Clone)]
pub struct Client {
    resolver: Arc<dyn Resolve>,
    factory: Arc<StreamFactory>,
    fetch_attempts: usize,
    fetch_timeout: Duration,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a client with the builtin provider table and defaults.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Resolves a hostname to IP addresses by racing every configured
    /// DoH endpoint.
    ///
    /// Resolution here is exactly what the fetch path sees at dial
    /// time, overrides included.
    pub async fn lookup(&self, name: &str) -> Result<Vec<IpAddr>, DohError> {
        self.resolver.resolve(Name::new(name)).await
    }

    /// Executes `request` on several concurrent connections and returns
    /// the body of the first attempt that succeeds.
    ///
    /// Every attempt dials through the resolving connector, so each
    /// connection independently substitutes a DoH-resolved address for
    /// the hostname (falling back to system resolution on failure).
    pub async fn fetch(&self, request: Request) -> Result<Bytes, DohError> {
        race_fetch(
            &self.factory,
            request.method(),
            request.url(),
            request.headers(),
            self.fetch_attempts,
            self.fetch_timeout,
        )
        .await
    }

    /// Start building a GET request.
    pub fn get(&self, url: impl AsRef<str>) -> RequestBuilder {
        self.request(Method::GET, url)
    }

    /// Start building a request with a custom method.
    pub fn request(&self, method: Method, url: impl AsRef<str>) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            method,
            url: url.as_ref().to_string(),
            headers: HeaderMap::new(),
        }
    }
}

/// Builder for creating a [`Client`].
pub struct ClientBuilder {
    providers: ProviderTable,
    overrides: HashMap<Cow<'static, str>, Vec<IpAddr>>,
    resolve_timeout: Duration,
    fetch_timeout: Duration,
    fetch_attempts: usize,
    connect_timeout: Duration,
    tls_timeout: Duration,
    header_timeout: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            providers: ProviderTable::builtin(),
            overrides: HashMap::new(),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            fetch_attempts: DEFAULT_FETCH_ATTEMPTS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            tls_timeout: DEFAULT_TLS_TIMEOUT,
            header_timeout: DEFAULT_HEADER_TIMEOUT,
        }
    }
}

impl ClientBuilder {
    /// Replaces the provider table.
    pub fn providers(mut self, providers: ProviderTable) -> Self {
        self.providers = providers;
        self
    }

    /// Pins a hostname to a fixed address set, bypassing DoH.
    pub fn dns_override(
        mut self,
        host: impl Into<Cow<'static, str>>,
        addrs: Vec<IpAddr>,
    ) -> Self {
        self.overrides.insert(host.into(), addrs);
        self
    }

    /// Deadline for one racing resolution.
    pub fn resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Window for one racing fetch.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Number of concurrent executions per fetch.
    pub fn fetch_attempts(mut self, attempts: usize) -> Self {
        self.fetch_attempts = attempts;
        self
    }

    /// TCP connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// TLS handshake timeout.
    pub fn tls_timeout(mut self, timeout: Duration) -> Self {
        self.tls_timeout = timeout;
        self
    }

    /// Response-header timeout per HTTP exchange.
    pub fn header_timeout(mut self, timeout: Duration) -> Self {
        self.header_timeout = timeout;
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        // DoH queries dial through the system path: endpoint hostnames
        // are never resolved by the resolver they feed.
        let query_factory = Arc::new(StreamFactory::new(
            Connector::system(self.connect_timeout, self.tls_timeout),
            self.header_timeout,
        ));
        let racing = RacingResolver::new(
            self.providers.flatten(),
            DohQuery::new(query_factory),
            self.resolve_timeout,
        );

        let resolver: Arc<dyn Resolve> = if self.overrides.is_empty() {
            Arc::new(racing)
        } else {
            Arc::new(DnsResolverWithOverrides::new(
                Arc::new(racing),
                self.overrides,
            ))
        };

        let factory = Arc::new(StreamFactory::new(
            Connector::resolving(resolver.clone(), self.connect_timeout, self.tls_timeout),
            self.header_timeout,
        ));

        Client {
            resolver,
            factory,
            fetch_attempts: self.fetch_attempts,
            fetch_timeout: self.fetch_timeout,
        }
    }
}

/// Builder for a single request.
pub struct RequestBuilder {
    client: Client,
    method: Method,
    url: String,
    headers: HeaderMap,
}

impl RequestBuilder {
    /// Add a header.
    pub fn header<K, V>(mut self, key: K, value: V) -> Self
    where
        K: http::header::IntoHeaderName,
        V: TryInto<http::HeaderValue>,
    {
        if let Ok(val) = value.try_into() {
            self.headers.insert(key, val);
        }
        self
    }

    /// Send the request and return the winning body.
    pub async fn send(self) -> Result<Bytes, DohError> {
        let url = Url::parse(&self.url).map_err(|_| DohError::InvalidUrl)?;
        let mut request = Request::new(self.method, url);
        *request.headers_mut() = self.headers;
        self.client.fetch(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_request_accessors() {
        let url = Url::parse("https://example.com/").unwrap();
        let request = Request::get(url.clone());
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.url(), &url);
        assert!(request.headers().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_uses_overrides() {
        let pinned = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));
        let client = Client::builder()
            .providers(ProviderTable::empty())
            .dns_override("pinned.test", vec![pinned])
            .build();

        let addrs = client.lookup("pinned.test").await.unwrap();
        assert_eq!(addrs, vec![pinned]);
    }

    #[tokio::test]
    async fn test_lookup_without_endpoints_fails() {
        let client = Client::builder()
            .providers(ProviderTable::empty())
            .build();

        let err = client.lookup("example.com").await.unwrap_err();
        assert!(matches!(err, DohError::AllEndpointsFailed(0)));
    }

    #[tokio::test]
    async fn test_request_builder_rejects_bad_url() {
        let client = Client::builder()
            .providers(ProviderTable::empty())
            .build();

        let err = client.get("not a url").send().await.unwrap_err();
        assert!(matches!(err, DohError::InvalidUrl));
    }
}
