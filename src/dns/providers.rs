//! DoH provider and endpoint registry.
//!
//! A provider is a named operator of one or more dns-json endpoints.
//! The table is assembled once at client construction and flattened into
//! the ordered endpoint list the racing resolver fans out over; it is
//! never mutated afterwards.

use crate::base::error::DohError;
use std::fmt;
use url::Url;

/// One DoH endpoint capable of answering `?name=<host>&type=A` JSON
/// queries.
#[derive(Debug, Clone)]
pub struct Endpoint {
    url: Url,
}

impl Endpoint {
    /// Parses and validates an endpoint URL.
    ///
    /// Only `http` and `https` URLs with a host are accepted. Any query
    /// string on the given URL is preserved and the DNS parameters are
    /// appended to it at query time.
    pub fn new(url: impl AsRef<str>) -> Result<Self, DohError> {
        let url = Url::parse(url.as_ref()).map_err(|_| DohError::InvalidUrl)?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(DohError::InvalidUrl);
        }
        Ok(Self { url })
    }

    /// The endpoint's base URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Builds the query URL for one lookup: `name=<host>&type=A`,
    /// percent-encoded.
    pub(crate) fn query_url(&self, name: &str) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut()
            .append_pair("name", name)
            .append_pair("type", "A");
        url
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}

/// A named DoH operator and its endpoints.
#[derive(Debug, Clone)]
pub struct Provider {
    name: String,
    endpoints: Vec<Endpoint>,
}

impl Provider {
    /// Creates a provider from a name and its endpoint list.
    pub fn new(name: impl Into<String>, endpoints: Vec<Endpoint>) -> Self {
        Self {
            name: name.into(),
            endpoints,
        }
    }

    /// The provider's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The provider's endpoints.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }
}

/// Registry of DoH providers.
///
/// [`ProviderTable::default`] carries the builtin three-provider table;
/// use [`ProviderTable::empty`] plus [`ProviderTable::with_provider`] to
/// build a custom one.
#[derive(Debug, Clone)]
pub struct ProviderTable {
    providers: Vec<Provider>,
}

impl ProviderTable {
    /// A table with no providers.
    pub fn empty() -> Self {
        Self { providers: Vec::new() }
    }

    /// The builtin table: Cloudflare, Google and Quad9, hostname and
    /// anycast-IP endpoints for each.
    pub fn builtin() -> Self {
        let provider = |name: &str, urls: &[&str]| {
            Provider::new(
                name,
                urls.iter()
                    .map(|u| Endpoint::new(u).expect("builtin endpoint URL is valid"))
                    .collect(),
            )
        };
        Self {
            providers: vec![
                provider(
                    "cloudflare",
                    &[
                        "https://cloudflare-dns.com/dns-query",
                        "https://1.1.1.1/dns-query",
                    ],
                ),
                provider(
                    "google",
                    &["https://dns.google/resolve", "https://8.8.8.8/resolve"],
                ),
                provider(
                    "quad9",
                    &[
                        "https://dns.quad9.net:5053/dns-query",
                        "https://9.9.9.9:5053/dns-query",
                        "https://149.112.112.112:5053/dns-query",
                    ],
                ),
            ],
        }
    }

    /// Adds a provider to the table.
    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    /// The registered providers, in insertion order.
    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Flattens the table into the ordered endpoint list consumed by the
    /// racing resolver: providers in insertion order, each provider's
    /// endpoints in declaration order.
    pub fn flatten(&self) -> Vec<Endpoint> {
        self.providers
            .iter()
            .flat_map(|p| p.endpoints.iter().cloned())
            .collect()
    }
}

impl Default for ProviderTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_rejects_bad_urls() {
        assert!(Endpoint::new("ftp://1.1.1.1/dns-query").is_err());
        assert!(Endpoint::new("not a url").is_err());
        assert!(Endpoint::new("https:///dns-query").is_err());
        assert!(Endpoint::new("https://1.1.1.1/dns-query").is_ok());
    }

    #[test]
    fn test_query_url_parameters() {
        let endpoint = Endpoint::new("https://cloudflare-dns.com/dns-query").unwrap();
        let url = endpoint.query_url("example.com");
        assert_eq!(url.query(), Some("name=example.com&type=A"));
    }

    #[test]
    fn test_query_url_escapes_name() {
        let endpoint = Endpoint::new("https://1.1.1.1/dns-query").unwrap();
        let url = endpoint.query_url("weird&name.example");
        assert_eq!(url.query(), Some("name=weird%26name.example&type=A"));
    }

    #[test]
    fn test_builtin_table_shape() {
        let table = ProviderTable::builtin();
        let names: Vec<_> = table.providers().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["cloudflare", "google", "quad9"]);
        assert_eq!(table.flatten().len(), 7);
    }

    #[test]
    fn test_flatten_preserves_order() {
        let table = ProviderTable::empty()
            .with_provider(Provider::new(
                "a",
                vec![Endpoint::new("https://a.test/dns-query").unwrap()],
            ))
            .with_provider(Provider::new(
                "b",
                vec![
                    Endpoint::new("https://b1.test/dns-query").unwrap(),
                    Endpoint::new("https://b2.test/dns-query").unwrap(),
                ],
            ));

        let flat = table.flatten();
        let hosts: Vec<_> = flat.iter().filter_map(|e| e.url().host_str()).collect();
        assert_eq!(hosts, vec!["a.test", "b1.test", "b2.test"]);
    }
}
