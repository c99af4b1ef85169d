//! Connection establishment: resolution → TCP → TLS.
//!
//! [`Connector`] is the dial layer for every request the crate makes.
//! With a resolver attached it intercepts `host:port` targets, swaps in
//! a DoH-resolved address, and falls back to the default [`Dial`] on any
//! resolution failure: a failed DoH lookup must never fail a connection
//! the system resolver could complete. Without a resolver it is the
//! plain system path the DoH queries themselves dial through, so a
//! lookup never re-enters the resolver.

use crate::base::error::DohError;
use crate::dns::{Name, Resolve};
use crate::socket::stream::SocketType;
use boring::ssl::{SslConnector, SslMethod, SslVersion};
use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::TcpStream;
use url::Url;

/// Alias for the `Future` type returned by a [`Dial`] implementation.
pub type Dialing = Pin<Box<dyn Future<Output = io::Result<TcpStream>> + Send>>;

/// The default network connector.
///
/// Given a `"host:port"` target, produce a TCP connection using
/// ordinary system resolution. The resolving dial path delegates here
/// whenever DoH cannot supply an address.
pub trait Dial: Send + Sync {
    fn dial(&self, target: String) -> Dialing;
}

/// System path: `tokio::net::lookup_host`, then the first address that
/// accepts the connection.
#[derive(Clone, Debug, Default)]
pub struct SystemDial;

impl Dial for SystemDial {
    fn dial(&self, target: String) -> Dialing {
        Box::pin(async move {
            let addrs = tokio::net::lookup_host(target.as_str()).await?;
            let mut last = None;
            for addr in addrs {
                match TcpStream::connect(addr).await {
                    Ok(stream) => return Ok(stream),
                    Err(e) => last = Some(e),
                }
            }
            Err(last.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "no addresses for target")
            }))
        })
    }
}

/// Process-wide address selection state.
///
/// Seeded once from the clock, advanced atomically on every pick so
/// concurrent dials across a resolved set spread over its addresses.
static SELECTION_STATE: LazyLock<AtomicU64> = LazyLock::new(|| {
    let seed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() ^ u64::from(d.subsec_nanos()))
        .unwrap_or(0x9E37_79B9_7F4A_7C15);
    AtomicU64::new(seed | 1)
});

/// Picks one index in `0..len`, advancing the shared selection state.
///
/// splitmix64 step and finalizer over the atomic seed.
fn pick_index(len: usize) -> usize {
    debug_assert!(len > 0);
    let s = SELECTION_STATE.fetch_add(0x9E37_79B9_7F4A_7C15, Ordering::Relaxed);
    let mut z = s;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^= z >> 31;
    (z % len as u64) as usize
}

/// Splits a `"host:port"` target, unbracketing IPv6 hosts.
///
/// `None` means the target is not in host:port form and belongs to the
/// default dial untouched.
fn split_host_port(target: &str) -> Option<(&str, u16)> {
    let (host, port) = target.rsplit_once(':')?;
    let port: u16 = port.parse().ok()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some((host, port))
}

/// Joins a host and port, bracketing bare IPv6 hosts.
fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Manages the connection process: resolution → TCP → TLS.
pub struct Connector {
    resolver: Option<Arc<dyn Resolve>>,
    fallback: Arc<dyn Dial>,
    connect_timeout: Duration,
    tls_timeout: Duration,
}

impl Connector {
    /// A connector that always dials through the default path.
    ///
    /// This is the transport under the DoH queries themselves.
    pub fn system(connect_timeout: Duration, tls_timeout: Duration) -> Self {
        Self {
            resolver: None,
            fallback: Arc::new(SystemDial),
            connect_timeout,
            tls_timeout,
        }
    }

    /// A connector that substitutes DoH-resolved addresses at dial time.
    pub fn resolving(
        resolver: Arc<dyn Resolve>,
        connect_timeout: Duration,
        tls_timeout: Duration,
    ) -> Self {
        Self {
            resolver: Some(resolver),
            fallback: Arc::new(SystemDial),
            connect_timeout,
            tls_timeout,
        }
    }

    /// Replaces the default dial path.
    pub fn with_fallback(mut self, fallback: Arc<dyn Dial>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Opens a connection to the URL's origin, TLS-wrapped for `https`.
    ///
    /// SNI and certificate verification use the URL's hostname, never a
    /// substituted IP.
    pub async fn connect(&self, url: &Url) -> Result<SocketType, DohError> {
        let host = url.host_str().ok_or(DohError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(DohError::InvalidUrl)?;

        let stream = self.dial(&join_host_port(host, port)).await?;

        if url.scheme() == "https" {
            let sni = host.trim_start_matches('[').trim_end_matches(']');
            let stream = self.handshake_tls(sni, stream).await?;
            Ok(SocketType::Ssl(stream))
        } else {
            Ok(SocketType::Tcp(stream))
        }
    }

    /// The dial hook: opens a TCP connection to a `"host:port"` target.
    ///
    /// When a resolver is attached and the host is not already an IP
    /// literal, the host is resolved over DoH and one address is picked
    /// pseudo-randomly; any resolution failure falls back silently to
    /// the default dial with the original, unmodified target.
    pub async fn dial(&self, target: &str) -> Result<TcpStream, DohError> {
        if let Some(resolver) = &self.resolver {
            if let Some((host, port)) = split_host_port(target) {
                if host.parse::<IpAddr>().is_err() {
                    match resolver.resolve(Name::new(host)).await {
                        Ok(addrs) if !addrs.is_empty() => {
                            let ip = addrs[pick_index(addrs.len())];
                            tracing::debug!(host, %ip, of = addrs.len(), "dialing resolved address");
                            return self.tcp_connect(SocketAddr::new(ip, port)).await;
                        }
                        Ok(_) => {
                            tracing::debug!(host, "resolver returned no addresses, using default dial");
                        }
                        Err(error) => {
                            tracing::debug!(host, %error, "DoH resolution failed, using default dial");
                        }
                    }
                }
            }
        }

        match tokio::time::timeout(self.connect_timeout, self.fallback.dial(target.to_string()))
            .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(DohError::Connect(e)),
            Err(_) => Err(DohError::Connect(io::Error::new(
                io::ErrorKind::TimedOut,
                "connect timed out",
            ))),
        }
    }

    async fn tcp_connect(&self, addr: SocketAddr) -> Result<TcpStream, DohError> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(DohError::Connect(e)),
            Err(_) => Err(DohError::Connect(io::Error::new(
                io::ErrorKind::TimedOut,
                "connect timed out",
            ))),
        }
    }

    async fn handshake_tls(
        &self,
        domain: &str,
        stream: TcpStream,
    ) -> Result<tokio_boring::SslStream<TcpStream>, DohError> {
        let mut builder =
            SslConnector::builder(SslMethod::tls()).map_err(|_| DohError::TlsHandshake)?;
        builder
            .set_min_proto_version(Some(SslVersion::TLS1_2))
            .map_err(|_| DohError::TlsHandshake)?;
        // One-shot http1 streams; no h2 offer.
        builder
            .set_alpn_protos(b"\x08http/1.1")
            .map_err(|_| DohError::TlsHandshake)?;

        let config = builder
            .build()
            .configure()
            .map_err(|_| DohError::TlsHandshake)?;

        match tokio::time::timeout(self.tls_timeout, tokio_boring::connect(config, domain, stream))
            .await
        {
            Ok(Ok(tls)) => Ok(tls),
            Ok(Err(error)) => {
                tracing::debug!(domain, error = ?error, "TLS handshake failed");
                Err(DohError::TlsHandshake)
            }
            Err(_) => Err(DohError::TlsHandshake),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("example.com:443"), Some(("example.com", 443)));
        assert_eq!(split_host_port("127.0.0.1:80"), Some(("127.0.0.1", 80)));
        assert_eq!(split_host_port("[::1]:8080"), Some(("::1", 8080)));
        assert_eq!(split_host_port("example.com"), None);
        assert_eq!(split_host_port("example.com:notaport"), None);
        assert_eq!(split_host_port(":443"), None);
    }

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("example.com", 443), "example.com:443");
        assert_eq!(join_host_port("::1", 53), "[::1]:53");
        assert_eq!(join_host_port("[::1]", 53), "[::1]:53");
    }

    #[test]
    fn test_pick_index_bounds() {
        for len in 1..16 {
            for _ in 0..64 {
                assert!(pick_index(len) < len);
            }
        }
    }

    #[test]
    fn test_pick_index_varies() {
        let picks: std::collections::HashSet<_> = (0..64).map(|_| pick_index(8)).collect();
        assert!(picks.len() > 1, "selection state never varied");
    }

    #[tokio::test]
    async fn test_system_dial_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let stream = SystemDial.dial(addr.to_string()).await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), addr);
    }
}
