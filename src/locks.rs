//! Process-local named locks.
//!
//! Used to keep two requests (or a request and the scheduler) from reconciling the same
//! resource at the same time. Not distributed: each process has its own set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

pub const ORDERS_SYNC: &str = "orders-sync";
pub const PRODUCTS_SYNC: &str = "products-sync";
pub const RETURNS_SYNC: &str = "returns-sync";

/// Lock name for mutations of a single order.
pub fn order_lock(order_number: &str) -> String {
    format!("order:{order_number}")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("resource {name} is busy (waited {waited:?})")]
    Timeout { name: String, waited: Duration },
}

pub struct LockManager {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    default_timeout: Duration,
}

/// Held lock. Released on drop.
pub struct NamedLockGuard {
    name: String,
    _guard: OwnedMutexGuard<()>,
}

impl NamedLockGuard {
    pub fn name(&self) -> &str { &self.name }
}

impl Drop for NamedLockGuard {
    fn drop(&mut self) {
        debug!(lock = %self.name, "released lock");
    }
}

impl LockManager {
    pub fn new(default_timeout: Duration) -> Self {
        Self { slots: Mutex::new(HashMap::new()), default_timeout }
    }

    fn slot(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.entry(name.to_string()).or_default().clone()
    }

    pub async fn acquire(&self, name: &str) -> Result<NamedLockGuard, LockError> {
        self.acquire_timeout(name, self.default_timeout).await
    }

    /// Wait up to `timeout` for the lock.
    pub async fn acquire_timeout(&self, name: &str, timeout: Duration) -> Result<NamedLockGuard, LockError> {
        let slot = self.slot(name);
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => {
                debug!(lock = name, "acquired lock");
                Ok(NamedLockGuard { name: name.to_string(), _guard: guard })
            }
            Err(_) => {
                warn!(lock = name, ?timeout, "timed out waiting for lock");
                Err(LockError::Timeout { name: name.to_string(), waited: timeout })
            }
        }
    }

    /// Take the lock only if nobody holds it.
    pub fn try_acquire(&self, name: &str) -> Option<NamedLockGuard> {
        let guard = self.slot(name).try_lock_owned().ok()?;
        Some(NamedLockGuard { name: name.to_string(), _guard: guard })
    }

    pub fn is_locked(&self, name: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        slots.get(name).is_some_and(|slot| slot.try_lock().is_err())
    }

    /// Forget locks nobody holds or waits on. Returns how many were dropped.
    pub fn prune_idle(&self) -> usize {
        let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = slots.len();
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        before - slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_acquire_times_out() {
        let locks = LockManager::new(Duration::from_millis(50));
        let held = locks.acquire(ORDERS_SYNC).await.unwrap();
        assert!(locks.is_locked(ORDERS_SYNC));
        let err = locks.acquire(ORDERS_SYNC).await.err().unwrap();
        assert_eq!(err, LockError::Timeout { name: ORDERS_SYNC.into(), waited: Duration::from_millis(50) });
        assert!(locks.try_acquire(ORDERS_SYNC).is_none());

        drop(held);
        assert!(!locks.is_locked(ORDERS_SYNC));
        assert!(locks.acquire(ORDERS_SYNC).await.is_ok());
    }

    #[tokio::test]
    async fn test_names_are_independent() {
        let locks = LockManager::new(Duration::from_millis(10));
        let _a = locks.acquire(&order_lock("1")).await.unwrap();
        let b = locks.try_acquire(&order_lock("2")).unwrap();
        assert_eq!(b.name(), "order:2");
    }

    #[tokio::test]
    async fn test_waiter_gets_lock_after_release() {
        let locks = Arc::new(LockManager::new(Duration::from_secs(5)));
        let held = locks.acquire(PRODUCTS_SYNC).await.unwrap();
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.acquire(PRODUCTS_SYNC).await.map(|g| g.name().to_string()) })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert_eq!(waiter.await.unwrap().unwrap(), PRODUCTS_SYNC);
    }

    #[test]
    fn test_prune_idle() {
        let locks = LockManager::new(Duration::from_millis(10));
        let held = locks.try_acquire("a").unwrap();
        drop(locks.try_acquire("b"));
        assert_eq!(locks.prune_idle(), 1);
        assert!(locks.is_locked("a"));
        drop(held);
        assert_eq!(locks.prune_idle(), 1);
    }
}
