//! Lowest-free-address allocation over an [`AddressStore`].

use super::AllocateOptions;
use crate::core::error::{IpamError, IpamResult};
use crate::pool::Pool;
use crate::store::AddressStore;
use std::collections::BTreeSet;
use std::future::Future;
use std::net::IpAddr;
use tokio::sync::watch;
use tokio::time::Instant;

/// Allocates the lowest unassigned host address of a pool.
///
/// Stateless apart from the store handle and default options; clones can be
/// used concurrently, from one process or many.
#[derive(Debug, Clone)]
pub struct SequentialAllocator {
    store: AddressStore,
    defaults: AllocateOptions,
}

impl SequentialAllocator {
    pub fn new(store: AddressStore) -> Self {
        Self {
            store,
            defaults: AllocateOptions::default(),
        }
    }

    /// Use `defaults` for [`allocate`](Self::allocate).
    pub fn with_options(mut self, defaults: AllocateOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Allocate with the default options.
    ///
    /// `Ok(None)` means every usable address in the pool is assigned.
    pub async fn allocate(&self, pool: &Pool) -> IpamResult<Option<IpAddr>> {
        self.allocate_with(pool, &self.defaults).await
    }

    /// Allocate under explicit options.
    ///
    /// Each attempt lists the pool's assignments, picks the lowest free host
    /// and claims it. Losing the claim to a concurrent allocator starts a new
    /// attempt from a fresh listing.
    pub async fn allocate_with(
        &self,
        pool: &Pool,
        options: &AllocateOptions,
    ) -> IpamResult<Option<IpAddr>> {
        let started = Instant::now();
        let deadline = options.deadline().map(|d| started + d);
        let mut cancel = options.cancel();

        for attempt in 1..=options.max_attempts() {
            if is_cancelled(cancel.as_ref()) {
                tracing::debug!(pool = %pool, attempt, "allocation cancelled");
                return Err(IpamError::Cancelled);
            }
            if deadline.is_some_and(|at| Instant::now() >= at) {
                return Err(deadline_exceeded(started));
            }

            let assigned = interruptible(
                self.store.list_assigned(pool),
                started,
                deadline,
                cancel.as_mut(),
            )
            .await?;

            let Some(candidate) = first_free(pool, &assigned) else {
                tracing::info!(pool = %pool, assigned = assigned.len(), "pool exhausted");
                return Ok(None);
            };

            if self.store.claim(pool, candidate).await? {
                tracing::info!(pool = %pool, address = %candidate, attempt, "address allocated");
                return Ok(Some(candidate));
            }

            if attempt == 1 {
                tracing::debug!(pool = %pool, address = %candidate, attempt, "claim lost, rescanning");
            } else {
                tracing::warn!(pool = %pool, address = %candidate, attempt, "claim lost again, rescanning");
            }
        }

        tracing::warn!(
            pool = %pool,
            attempts = options.max_attempts(),
            "allocation gave up under contention"
        );
        Err(IpamError::AllocationContention {
            attempts: options.max_attempts(),
        })
    }

    /// Release `address` in `pool`; `false` if it was not assigned.
    pub async fn release(&self, pool: &Pool, address: IpAddr) -> IpamResult<bool> {
        self.store.release(pool, address).await
    }

    /// Addresses currently assigned in `pool`.
    pub async fn list_assigned(&self, pool: &Pool) -> IpamResult<BTreeSet<IpAddr>> {
        self.store.list_assigned(pool).await
    }
}

/// Lowest usable host of `pool` not in `assigned`.
pub fn first_free(pool: &Pool, assigned: &BTreeSet<IpAddr>) -> Option<IpAddr> {
    pool.hosts().find(|addr| !assigned.contains(addr))
}

fn is_cancelled(cancel: Option<&watch::Receiver<bool>>) -> bool {
    cancel.is_some_and(|rx| *rx.borrow())
}

fn deadline_exceeded(started: Instant) -> IpamError {
    IpamError::DeadlineExceeded {
        elapsed_ms: started.elapsed().as_millis() as u64,
    }
}

/// Await `fut` unless the deadline passes or cancellation arrives first.
async fn interruptible<T>(
    fut: impl Future<Output = IpamResult<T>>,
    started: Instant,
    deadline: Option<Instant>,
    cancel: Option<&mut watch::Receiver<bool>>,
) -> IpamResult<T> {
    let expired = async {
        match deadline {
            Some(at) => tokio::time::sleep_until(at).await,
            None => std::future::pending().await,
        }
    };
    let cancelled = async {
        match cancel {
            Some(rx) => wait_for_cancel(rx).await,
            None => std::future::pending().await,
        }
    };

    tokio::select! {
        biased;
        result = fut => result,
        _ = cancelled => Err(IpamError::Cancelled),
        _ = expired => Err(deadline_exceeded(started)),
    }
}

async fn wait_for_cancel(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        // A dropped sender can never cancel.
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyLayout, MemoryBackend};
    use std::sync::Arc;
    use std::time::Duration;

    fn allocator() -> SequentialAllocator {
        let store = AddressStore::with_layout(
            Arc::new(MemoryBackend::new()),
            KeyLayout::new("/test"),
            Duration::from_secs(5),
        );
        SequentialAllocator::new(store)
    }

    fn addr(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn first_free_fills_holes() {
        let pool: Pool = "10.0.0.0/29".parse().unwrap();
        let assigned: BTreeSet<IpAddr> = [addr("10.0.0.1"), addr("10.0.0.3")].into();
        assert_eq!(first_free(&pool, &assigned), Some(addr("10.0.0.2")));
    }

    #[test]
    fn first_free_on_full_pool() {
        let pool: Pool = "10.0.0.0/30".parse().unwrap();
        let assigned: BTreeSet<IpAddr> = [addr("10.0.0.1"), addr("10.0.0.2")].into();
        assert_eq!(first_free(&pool, &assigned), None);
    }

    #[tokio::test]
    async fn allocates_in_ascending_order_then_exhausts() {
        let allocator = allocator();
        let pool: Pool = "10.0.0.0/30".parse().unwrap();
        assert_eq!(allocator.allocate(&pool).await.unwrap(), Some(addr("10.0.0.1")));
        assert_eq!(allocator.allocate(&pool).await.unwrap(), Some(addr("10.0.0.2")));
        assert_eq!(allocator.allocate(&pool).await.unwrap(), None);
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let allocator = allocator();
        let pool: Pool = "10.0.0.0/30".parse().unwrap();
        let (tx, rx) = watch::channel(true);
        let options = AllocateOptions::default().with_cancel(rx);
        let err = allocator.allocate_with(&pool, &options).await.unwrap_err();
        assert!(matches!(err, IpamError::Cancelled));
        assert!(allocator.list_assigned(&pool).await.unwrap().is_empty());
        drop(tx);
    }

    #[tokio::test]
    async fn dropped_cancel_sender_does_not_cancel() {
        let allocator = allocator();
        let pool: Pool = "10.0.0.0/30".parse().unwrap();
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let options = AllocateOptions::default().with_cancel(rx);
        assert_eq!(
            allocator.allocate_with(&pool, &options).await.unwrap(),
            Some(addr("10.0.0.1"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_deadline_expires_immediately() {
        let allocator = allocator();
        let pool: Pool = "10.0.0.0/30".parse().unwrap();
        let options = AllocateOptions::default().with_deadline(Duration::ZERO);
        let err = allocator.allocate_with(&pool, &options).await.unwrap_err();
        assert!(matches!(err, IpamError::DeadlineExceeded { .. }));
    }
}
