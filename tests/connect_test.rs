//! Resolving Dial Hook Tests
//!
//! Covers:
//! - fallback to the default dial with the original, unmodified target
//!   when resolution fails entirely
//! - address substitution when resolution succeeds
//! - IP-literal targets bypassing the resolver
//! - non host:port targets going straight to the default dial

use dohnet::dns::{Name, Resolve, Resolving};
use dohnet::socket::{Connector, Dial, Dialing, SystemDial};
use dohnet::DohError;

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

struct FailingResolver;

impl Resolve for FailingResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        Box::pin(async { Err(DohError::AllEndpointsFailed(3)) })
    }
}

struct FixedResolver {
    addrs: Vec<IpAddr>,
    calls: Arc<AtomicUsize>,
}

impl Resolve for FixedResolver {
    fn resolve(&self, _name: Name) -> Resolving {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let addrs = self.addrs.clone();
        Box::pin(async move { Ok(addrs) })
    }
}

/// Records every target it is asked to dial, then refuses.
#[derive(Clone, Default)]
struct RecordingDial {
    targets: Arc<Mutex<Vec<String>>>,
}

impl RecordingDial {
    fn targets(&self) -> Vec<String> {
        self.targets.lock().unwrap().clone()
    }
}

impl Dial for RecordingDial {
    fn dial(&self, target: String) -> Dialing {
        let targets = self.targets.clone();
        Box::pin(async move {
            targets.lock().unwrap().push(target);
            Err(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "recording dial refuses everything",
            ))
        })
    }
}

fn connector(resolver: Arc<dyn Resolve>) -> Connector {
    Connector::resolving(resolver, Duration::from_secs(1), Duration::from_secs(1))
}

async fn local_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

#[tokio::test]
async fn test_resolver_failure_falls_back_with_original_address() {
    let recording = RecordingDial::default();
    let connector =
        connector(Arc::new(FailingResolver)).with_fallback(Arc::new(recording.clone()));

    let err = connector.dial("example.com:443").await.unwrap_err();

    // The fallback saw the untouched target and its refusal is the only
    // error the caller observes.
    assert_eq!(recording.targets(), vec!["example.com:443".to_string()]);
    assert!(matches!(err, DohError::Connect(_)));
}

#[tokio::test]
async fn test_resolved_address_is_substituted() {
    let (listener, addr) = local_listener().await;
    let calls = Arc::new(AtomicUsize::new(0));
    let recording = RecordingDial::default();

    let connector = connector(Arc::new(FixedResolver {
        addrs: vec![addr.ip()],
        calls: calls.clone(),
    }))
    .with_fallback(Arc::new(recording.clone()));

    // The hostname never resolves via the system; reaching the listener
    // proves the resolved IP was substituted.
    let target = format!("does-not-exist.invalid:{}", addr.port());
    let dialed = connector.dial(&target).await.unwrap();
    let (accepted, peer) = listener.accept().await.unwrap();

    assert_eq!(dialed.local_addr().unwrap(), peer);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(recording.targets().is_empty());
    drop(accepted);
}

#[tokio::test]
async fn test_ip_literal_target_bypasses_resolver() {
    let (listener, addr) = local_listener().await;
    let calls = Arc::new(AtomicUsize::new(0));

    let connector = connector(Arc::new(FixedResolver {
        addrs: vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))],
        calls: calls.clone(),
    }));

    let dialed = connector.dial(&addr.to_string()).await.unwrap();
    let _ = listener.accept().await.unwrap();

    assert!(dialed.peer_addr().is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 0, "resolver must not be consulted");
}

#[tokio::test]
async fn test_unsplittable_target_goes_to_default_dial() {
    let recording = RecordingDial::default();
    let connector =
        connector(Arc::new(FailingResolver)).with_fallback(Arc::new(recording.clone()));

    let err = connector.dial("example.com").await.unwrap_err();

    assert_eq!(recording.targets(), vec!["example.com".to_string()]);
    assert!(matches!(err, DohError::Connect(_)));
}

#[tokio::test]
async fn test_system_dial_reaches_local_listener() {
    let (listener, addr) = local_listener().await;

    let stream = SystemDial.dial(addr.to_string()).await.unwrap();
    let _ = listener.accept().await.unwrap();

    assert_eq!(stream.peer_addr().unwrap(), addr);
}
