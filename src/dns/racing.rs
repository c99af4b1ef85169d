//! Concurrent multi-endpoint resolution.
//!
//! One lookup fans out one dns-json query per configured endpoint and
//! takes the first successful, non-empty address set. Losing queries
//! are cancelled cooperatively: their tasks are aborted once the race
//! is decided, and a task that finishes in the gap reports into a
//! channel buffered to the fan-out width, so it can never block.
//!
//! Per-endpoint failures stay internal. The caller observes the winning
//! address set, [`DohError::Timeout`] when the deadline passes first, or
//! [`DohError::AllEndpointsFailed`] when every endpoint fails before it.

use crate::base::error::DohError;
use crate::dns::providers::Endpoint;
use crate::dns::query::DohQuery;
use crate::dns::resolve::{Name, Resolve, Resolving};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Races dns-json queries across every configured endpoint.
#[derive(Clone)]
pub struct RacingResolver {
    endpoints: Arc<[Endpoint]>,
    query: DohQuery,
    deadline: Duration,
}

impl RacingResolver {
    /// Creates a resolver over the flattened endpoint list.
    pub fn new(endpoints: Vec<Endpoint>, query: DohQuery, deadline: Duration) -> Self {
        Self {
            endpoints: endpoints.into(),
            query,
            deadline,
        }
    }

    /// The endpoints participating in each race.
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Resolves `name` to the first valid address set any endpoint
    /// returns, bounded by the configured deadline.
    pub async fn lookup(&self, name: &str) -> Result<Vec<IpAddr>, DohError> {
        let fanout = self.endpoints.len();
        if fanout == 0 {
            return Err(DohError::AllEndpointsFailed(0));
        }

        let deadline = Instant::now() + self.deadline;
        let (tx, mut rx) = mpsc::channel(fanout);

        let mut handles = Vec::with_capacity(fanout);
        for endpoint in self.endpoints.iter().cloned() {
            let tx = tx.clone();
            let query = self.query.clone();
            let name = name.to_string();
            handles.push(tokio::spawn(async move {
                let outcome = query.query(&name, &endpoint).await;
                // Buffered to the fan-out width: a loser never blocks.
                let _ = tx.try_send((endpoint, outcome));
            }));
        }
        drop(tx);

        let mut failed = 0usize;
        let outcome = loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => break Err(DohError::Timeout),
                Ok(None) => break Err(DohError::AllEndpointsFailed(fanout)),
                Ok(Some((endpoint, Ok(addrs)))) => {
                    tracing::debug!(name, %endpoint, count = addrs.len(), "resolution race won");
                    break Ok(addrs);
                }
                Ok(Some((endpoint, Err(error)))) => {
                    failed += 1;
                    tracing::debug!(name, %endpoint, %error, "resolution attempt failed");
                    if failed == fanout {
                        break Err(DohError::AllEndpointsFailed(fanout));
                    }
                }
            }
        };

        for handle in &handles {
            handle.abort();
        }
        outcome
    }
}

impl Resolve for RacingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let resolver = self.clone();
        Box::pin(async move { resolver.lookup(name.as_str()).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::stream::StreamFactory;
    use crate::socket::connect::Connector;

    fn resolver_with_endpoints(endpoints: Vec<Endpoint>) -> RacingResolver {
        let factory = Arc::new(StreamFactory::new(
            Connector::system(Duration::from_millis(200), Duration::from_millis(200)),
            Duration::from_millis(200),
        ));
        RacingResolver::new(endpoints, DohQuery::new(factory), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_empty_endpoint_list_fails_immediately() {
        let resolver = resolver_with_endpoints(Vec::new());
        let err = resolver.lookup("example.com").await.unwrap_err();
        assert!(matches!(err, DohError::AllEndpointsFailed(0)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoints_aggregate() {
        // Nothing listens on these ports; every attempt fails fast and
        // the aggregate error surfaces well before the deadline.
        let resolver = resolver_with_endpoints(vec![
            Endpoint::new("http://127.0.0.1:1/dns-query").unwrap(),
            Endpoint::new("http://127.0.0.1:2/dns-query").unwrap(),
        ]);
        let err = resolver.lookup("example.com").await.unwrap_err();
        assert!(matches!(err, DohError::AllEndpointsFailed(2)));
    }
}
