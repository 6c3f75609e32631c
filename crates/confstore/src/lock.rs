//! Datastore lock.
//!
//! One named, non-reentrant mutual-exclusion resource per datastore. The lock
//! records who holds it so a refused caller can be told, and it is used by
//! [`save`](crate::Datastore::save) to serialize persistence.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::error::{DatastoreError, Result};

/// Holder recorded when the caller does not identify itself.
pub const UNKNOWN_HOLDER: &str = "(unknown)";

/// Default time a blocking acquire waits.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub struct LockManager {
    datastore: String,
    holder: Mutex<Option<String>>,
    released: Condvar,
    default_timeout: Duration,
}

impl LockManager {
    pub fn new(datastore: impl Into<String>) -> Self {
        Self::with_timeout(datastore, DEFAULT_LOCK_TIMEOUT)
    }

    pub fn with_timeout(datastore: impl Into<String>, default_timeout: Duration) -> Self {
        Self {
            datastore: datastore.into(),
            holder: Mutex::new(None),
            released: Condvar::new(),
            default_timeout,
        }
    }

    /// Take the lock for `holder`.
    ///
    /// A blocking acquire waits up to `timeout` (the manager's default when
    /// `None`); a non-blocking one fails immediately if the lock is held.
    ///
    /// # Errors
    ///
    /// [`DatastoreError::LockBusy`] naming the current holder.
    pub fn acquire(&self, holder: Option<&str>, blocking: bool, timeout: Option<Duration>) -> Result<()> {
        let holder = holder.unwrap_or(UNKNOWN_HOLDER);
        let mut current = self.holder.lock();

        if blocking {
            // A timeout past the end of `Instant` waits without deadline.
            let deadline = Instant::now().checked_add(timeout.unwrap_or(self.default_timeout));
            while current.is_some() {
                match deadline {
                    Some(deadline) => {
                        if self.released.wait_until(&mut current, deadline).timed_out() {
                            break;
                        }
                    }
                    None => self.released.wait(&mut current),
                }
            }
        }

        if let Some(busy) = current.as_ref() {
            debug!(datastore = %self.datastore, holder, current = %busy, "lock busy");
            return Err(DatastoreError::LockBusy {
                datastore: self.datastore.clone(),
                holder: busy.clone(),
            });
        }

        *current = Some(holder.to_string());
        debug!(datastore = %self.datastore, holder, "lock acquired");
        Ok(())
    }

    /// Release the lock. Releasing a lock nobody holds is logged and ignored.
    pub fn release(&self) {
        let mut current = self.holder.lock();
        match current.take() {
            Some(holder) => {
                debug!(datastore = %self.datastore, %holder, "lock released");
                self.released.notify_one();
            }
            None => warn!(datastore = %self.datastore, "release of a lock that is not held"),
        }
    }

    /// Current holder, if locked.
    pub fn holder(&self) -> Option<String> {
        self.holder.lock().clone()
    }

    pub fn is_locked(&self) -> bool {
        self.holder.lock().is_some()
    }

    /// Blocking acquire with the default timeout, released on drop.
    pub fn hold(&self, holder: &str) -> Result<LockGuard<'_>> {
        self.acquire(Some(holder), true, None)?;
        Ok(LockGuard { lock: self })
    }
}

/// Releases its [`LockManager`] when dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct LockGuard<'a> {
    lock: &'a LockManager,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn nonblocking_acquire_reports_holder() {
        let lock = LockManager::new("running");
        lock.acquire(Some("alice"), false, None).unwrap();
        match lock.acquire(Some("bob"), false, None) {
            Err(DatastoreError::LockBusy { datastore, holder }) => {
                assert_eq!(datastore, "running");
                assert_eq!(holder, "alice");
            }
            other => panic!("expected LockBusy, got {other:?}"),
        }
        lock.release();
        lock.acquire(Some("bob"), false, None).unwrap();
        assert_eq!(lock.holder().as_deref(), Some("bob"));
    }

    #[test]
    fn anonymous_holder() {
        let lock = LockManager::new("running");
        lock.acquire(None, false, None).unwrap();
        assert_eq!(lock.holder().as_deref(), Some(UNKNOWN_HOLDER));
    }

    #[test]
    fn not_reentrant() {
        let lock = LockManager::new("running");
        lock.acquire(Some("a"), false, None).unwrap();
        assert!(lock.acquire(Some("a"), false, None).is_err());
    }

    #[test]
    fn blocking_acquire_times_out() {
        let lock = LockManager::new("running");
        lock.acquire(Some("a"), false, None).unwrap();
        let started = Instant::now();
        let err = lock.acquire(Some("b"), true, Some(Duration::from_millis(50))).unwrap_err();
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(err.kind(), "lock-busy");
    }

    #[test]
    fn blocking_acquire_wakes_on_release() {
        let lock = Arc::new(LockManager::new("running"));
        lock.acquire(Some("a"), false, None).unwrap();

        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.acquire(Some("b"), true, Some(Duration::from_secs(5))))
        };
        thread::sleep(Duration::from_millis(20));
        lock.release();
        waiter.join().unwrap().unwrap();
        assert_eq!(lock.holder().as_deref(), Some("b"));
    }

    #[test]
    fn unbounded_timeout_on_free_lock() {
        let lock = LockManager::new("running");
        lock.acquire(Some("a"), true, Some(Duration::MAX)).unwrap();
        assert_eq!(lock.holder().as_deref(), Some("a"));
    }

    #[test]
    fn unbounded_timeout_waits_for_release() {
        let lock = Arc::new(LockManager::new("running"));
        lock.acquire(Some("a"), false, None).unwrap();

        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.acquire(Some("b"), true, Some(Duration::MAX)))
        };
        thread::sleep(Duration::from_millis(20));
        lock.release();
        waiter.join().unwrap().unwrap();
        assert_eq!(lock.holder().as_deref(), Some("b"));
    }

    #[test]
    fn release_unheld_is_ignored() {
        let lock = LockManager::new("running");
        lock.release();
        assert!(!lock.is_locked());
    }

    #[test]
    fn guard_releases_on_drop() {
        let lock = LockManager::new("running");
        {
            let _guard = lock.hold("json_save").unwrap();
            assert_eq!(lock.holder().as_deref(), Some("json_save"));
        }
        assert!(!lock.is_locked());
    }
}
