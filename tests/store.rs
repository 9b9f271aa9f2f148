//! Address store tests.

mod common;

use common::{store_over, store_with_timeout, FailingBackend, Stall, StallingBackend, TEST_ROOT};
use ipalloc::store::backend::{KvBackend, KvError};
use ipalloc::store::{self, MemoryBackend};
use ipalloc::{Config, IpamError, Pool};
use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

fn pool(s: &str) -> Pool {
    s.parse().unwrap()
}

fn addr(s: &str) -> IpAddr {
    s.parse().unwrap()
}

// ============================================================================
// Claim / release
// ============================================================================

#[tokio::test]
async fn claim_is_exclusive() {
    let store = store_over(Arc::new(MemoryBackend::new()));
    let p = pool("10.0.0.0/24");

    assert!(store.claim(&p, addr("10.0.0.9")).await.unwrap());
    assert!(!store.claim(&p, addr("10.0.0.9")).await.unwrap());
}

#[tokio::test]
async fn claim_writes_the_documented_key() {
    let backend = MemoryBackend::new();
    let store = store_over(Arc::new(backend.clone()));

    store.claim(&pool("10.0.0.0/24"), addr("10.0.0.9")).await.unwrap();
    store.claim(&pool("fd00::/64"), addr("fd00::9")).await.unwrap();

    assert!(backend.contains_key(&format!("{}/ipam/v4/assignment/10.0.0.0-24/10.0.0.9", TEST_ROOT)));
    assert!(backend.contains_key(&format!("{}/ipam/v6/assignment/fd00::-64/fd00::9", TEST_ROOT)));
}

#[tokio::test]
async fn release_reports_whether_a_record_existed() {
    let store = store_over(Arc::new(MemoryBackend::new()));
    let p = pool("10.0.0.0/24");

    assert!(!store.release(&p, addr("10.0.0.3")).await.unwrap());
    store.claim(&p, addr("10.0.0.3")).await.unwrap();
    assert!(store.release(&p, addr("10.0.0.3")).await.unwrap());
    assert!(!store.release(&p, addr("10.0.0.3")).await.unwrap());
    assert!(store.claim(&p, addr("10.0.0.3")).await.unwrap());
}

#[tokio::test]
async fn addresses_outside_the_pool_never_reach_the_store() {
    let failing = Arc::new(FailingBackend::unavailable());
    let store = store_over(failing.clone());
    let p = pool("10.0.0.0/24");

    let err = store.claim(&p, addr("10.0.1.1")).await.unwrap_err();
    assert!(matches!(err, IpamError::InvalidAddress { .. }));
    assert!(err.is_invalid_input());

    let err = store.release(&p, addr("fd00::1")).await.unwrap_err();
    assert!(matches!(err, IpamError::InvalidAddress { .. }));

    assert_eq!(failing.calls(), 0);
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn first_listing_creates_the_namespace() {
    let backend = MemoryBackend::new();
    let store = store_over(Arc::new(backend.clone()));
    let p = pool("10.2.0.0/16");
    let marker = format!("{}/ipam/v4/assignment/10.2.0.0-16/", TEST_ROOT);

    assert!(!backend.contains_key(&marker));
    assert!(store.list_assigned(&p).await.unwrap().is_empty());
    assert!(backend.contains_key(&marker));

    // Second listing finds the (empty) namespace without recreating it.
    let revision = backend.stats().current_revision;
    assert!(store.list_assigned(&p).await.unwrap().is_empty());
    assert_eq!(backend.stats().current_revision, revision);
}

#[tokio::test]
async fn listing_returns_exactly_the_claimed_addresses() {
    let store = store_over(Arc::new(MemoryBackend::new()));
    let p = pool("10.0.0.0/24");

    for a in ["10.0.0.7", "10.0.0.1", "10.0.0.200"] {
        store.claim(&p, addr(a)).await.unwrap();
    }
    store.release(&p, addr("10.0.0.7")).await.unwrap();

    let expected: BTreeSet<IpAddr> = [addr("10.0.0.1"), addr("10.0.0.200")].into();
    assert_eq!(store.list_assigned(&p).await.unwrap(), expected);
}

#[tokio::test]
async fn foreign_records_are_ignored() {
    let backend = MemoryBackend::new();
    let store = store_over(Arc::new(backend.clone()));
    let p = pool("10.0.0.0/24");
    let namespace = format!("{}/ipam/v4/assignment/10.0.0.0-24", TEST_ROOT);

    store.claim(&p, addr("10.0.0.5")).await.unwrap();
    backend.create(&format!("{}/not-an-address", namespace), b"").await.unwrap();
    backend.create(&format!("{}/192.168.0.1", namespace), b"").await.unwrap();
    backend.create(&format!("{}/nested/10.0.0.6", namespace), b"").await.unwrap();

    let expected: BTreeSet<IpAddr> = [addr("10.0.0.5")].into();
    assert_eq!(store.list_assigned(&p).await.unwrap(), expected);
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn connectivity_failures_map_to_unavailable() {
    let store = store_over(Arc::new(FailingBackend::unavailable()));
    let p = pool("10.0.0.0/24");

    for err in [
        store.claim(&p, addr("10.0.0.1")).await.unwrap_err(),
        store.release(&p, addr("10.0.0.1")).await.unwrap_err(),
        store.list_assigned(&p).await.unwrap_err(),
    ] {
        assert!(matches!(err, IpamError::StoreUnavailable { .. }), "{:?}", err);
    }
}

#[tokio::test]
async fn permission_failures_map_to_store_errors() {
    let store = store_over(Arc::new(FailingBackend::new(KvError::PermissionDenied(
        "role lacks write".to_string(),
    ))));
    let err = store
        .claim(&pool("10.0.0.0/24"), addr("10.0.0.1"))
        .await
        .unwrap_err();
    assert!(matches!(err, IpamError::Store { .. }));
    assert!(err.is_store_failure());
    assert!(!err.is_transient());
}

#[tokio::test(start_paused = true)]
async fn each_round_trip_is_bounded() {
    let store = store_with_timeout(
        Arc::new(StallingBackend::new(Stall::Everything)),
        Duration::from_millis(250),
    );
    let p = pool("10.0.0.0/24");

    let err = store.claim(&p, addr("10.0.0.1")).await.unwrap_err();
    assert!(matches!(
        err,
        IpamError::StoreTimeout {
            operation: "claim",
            timeout_ms: 250
        }
    ));
    let err = store.release(&p, addr("10.0.0.1")).await.unwrap_err();
    assert!(matches!(
        err,
        IpamError::StoreTimeout {
            operation: "release",
            ..
        }
    ));
}

// ============================================================================
// Construction from config
// ============================================================================

#[tokio::test]
async fn memory_backend_from_config() {
    let config = Config::from_toml("[store]\nbackend = \"memory\"\n").unwrap();
    let store = store::open(&config.store).unwrap();
    assert_eq!(store.backend_name(), "memory");
    assert_eq!(store.layout().root(), "/calico/v1");

    let p = pool("10.0.0.0/30");
    assert!(store.claim(&p, addr("10.0.0.1")).await.unwrap());
}

#[cfg(feature = "grpc")]
#[tokio::test]
async fn etcd_backend_connects_lazily() {
    let config = Config::from_toml(
        "[store]\nbackend = \"etcd\"\nendpoints = [\"127.0.0.1:1\", \"127.0.0.1:2\"]\n",
    )
    .unwrap();
    let backend = store::connect_backend(&config.store).unwrap();
    assert_eq!(backend.name(), "etcd");

    let etcd = store::etcd::EtcdBackend::connect(&config.store).unwrap();
    assert_eq!(etcd.endpoints(), ["http://127.0.0.1:1", "http://127.0.0.1:2"]);
}

#[cfg(feature = "grpc")]
#[tokio::test]
async fn silent_etcd_member_surfaces_store_timeout() {
    // Accepts connections and never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = listener.local_addr().unwrap();
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = Config::from_toml(&format!(
        "[store]\nbackend = \"etcd\"\nendpoints = [\"{}\"]\nrequest_timeout_ms = 200\nconnect_timeout_ms = 10000\n",
        endpoint
    ))
    .unwrap();
    let store = store::open(&config.store).unwrap();

    let err = store
        .claim(&pool("10.0.0.0/30"), addr("10.0.0.1"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, IpamError::StoreTimeout { operation: "claim", timeout_ms: 200 }),
        "{:?}",
        err
    );
    silent.abort();
}
