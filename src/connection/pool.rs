//! Fixed-size pool of sessions.
//!
//! Entries are leased by position. A leased session is used by exactly one
//! thread until it is given back.

use crate::backend::BackendRegistry;
use crate::connection::params::ConnectionParameters;
use crate::connection::session::Session;
use crate::error::{BridgeError, PoolError};
use parking_lot::{Condvar, Mutex};
use std::ops::Deref;
use std::time::{Duration, Instant};
use tracing::trace;

/// Pool of `size` sessions with blocking lease and give-back.
///
/// # Example
///
/// ```no_run
/// # use sqlbridge::{BackendRegistry, ConnectionParameters, ConnectionPool};
/// # fn example() -> Result<(), sqlbridge::BridgeError> {
/// let params = ConnectionParameters::new("sqlite3", "db=app.db timeout=5");
/// let pool = ConnectionPool::open(4, &BackendRegistry::with_builtin(), &params)?;
///
/// std::thread::scope(|s| {
///     for _ in 0..8 {
///         s.spawn(|| {
///             let session = pool.lease_session();
///             let _ = session.once("update counters set n = n + 1", []);
///         });
///     }
/// });
/// # Ok(())
/// # }
/// ```
pub struct ConnectionPool {
    sessions: Vec<Session>,
    /// `true` marks a free entry
    free: Mutex<Vec<bool>>,
    available: Condvar,
}

impl ConnectionPool {
    /// Create a pool of `size` unconnected sessions, all free.
    pub fn new(size: usize) -> Result<Self, PoolError> {
        if size == 0 {
            return Err(PoolError::InvalidSize);
        }
        Ok(Self {
            sessions: (0..size).map(|_| Session::new()).collect(),
            free: Mutex::new(vec![true; size]),
            available: Condvar::new(),
        })
    }

    /// Create a pool and open every session with `params`.
    pub fn open(
        size: usize,
        registry: &BackendRegistry,
        params: &ConnectionParameters,
    ) -> Result<Self, BridgeError> {
        let pool = Self::new(size)?;
        for session in &pool.sessions {
            session.open(registry, params)?;
        }
        Ok(pool)
    }

    pub fn size(&self) -> usize {
        self.sessions.len()
    }

    /// Session at `position`, leased or not.
    pub fn at(&self, position: usize) -> Result<&Session, PoolError> {
        self.sessions.get(position).ok_or(PoolError::InvalidPosition {
            position,
            size: self.sessions.len(),
        })
    }

    /// Lease a free entry, waiting at most `timeout`.
    ///
    /// `None` waits indefinitely. Returns `None` when the deadline passes
    /// with every entry still leased.
    pub fn try_lease(&self, timeout: Option<Duration>) -> Option<usize> {
        let Some(timeout) = timeout else {
            return Some(self.lease());
        };
        let deadline = Instant::now() + timeout;
        let mut free = self.free.lock();

        loop {
            if let Some(position) = take_free(&mut free) {
                return Some(position);
            }
            if self.available.wait_until(&mut free, deadline).timed_out() {
                // A give-back may have raced the timeout.
                return take_free(&mut free);
            }
        }
    }

    /// Lease a free entry, waiting as long as it takes.
    pub fn lease(&self) -> usize {
        let mut free = self.free.lock();
        loop {
            if let Some(position) = take_free(&mut free) {
                return position;
            }
            self.available.wait(&mut free);
        }
    }

    /// Return the entry at `position` to the pool and wake one waiter.
    pub fn give_back(&self, position: usize) -> Result<(), PoolError> {
        let mut free = self.free.lock();
        let size = free.len();
        let slot = free
            .get_mut(position)
            .ok_or(PoolError::InvalidPosition { position, size })?;
        if *slot {
            return Err(PoolError::DoubleRelease { position });
        }
        *slot = true;
        drop(free);

        trace!(position, "gave back pool entry");
        self.available.notify_one();
        Ok(())
    }

    /// Lease a session that is given back when the guard drops.
    pub fn lease_session(&self) -> PooledSession<'_> {
        PooledSession {
            pool: self,
            position: self.lease(),
        }
    }

    /// Like [`lease_session`](Self::lease_session) with a timeout.
    pub fn try_lease_session(&self, timeout: Option<Duration>) -> Option<PooledSession<'_>> {
        self.try_lease(timeout).map(|position| PooledSession {
            pool: self,
            position,
        })
    }

    /// Number of entries currently free.
    pub fn free_count(&self) -> usize {
        self.free.lock().iter().filter(|&&f| f).count()
    }
}

/// Mark the first free entry as leased.
fn take_free(free: &mut [bool]) -> Option<usize> {
    let position = free.iter().position(|&f| f)?;
    free[position] = false;
    trace!(position, "leased pool entry");
    Some(position)
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("size", &self.size())
            .field("free", &self.free_count())
            .finish()
    }
}

/// A leased pool entry.
pub struct PooledSession<'p> {
    pool: &'p ConnectionPool,
    position: usize,
}

impl PooledSession<'_> {
    pub fn position(&self) -> usize {
        self.position
    }
}

impl Deref for PooledSession<'_> {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.pool.sessions[self.position]
    }
}

impl Drop for PooledSession<'_> {
    fn drop(&mut self) {
        let _ = self.pool.give_back(self.position);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_size() {
        assert_eq!(ConnectionPool::new(0).unwrap_err(), PoolError::InvalidSize);

        let pool = ConnectionPool::new(3).unwrap();
        assert_eq!(pool.size(), 3);
        assert_eq!(pool.free_count(), 3);
        assert!(pool.at(2).is_ok());
        assert_eq!(
            pool.at(3).unwrap_err(),
            PoolError::InvalidPosition { position: 3, size: 3 }
        );
    }

    #[test]
    fn test_lease_and_give_back() {
        let pool = ConnectionPool::new(2).unwrap();
        let a = pool.lease();
        let b = pool.lease();
        assert_ne!(a, b);
        assert_eq!(pool.free_count(), 0);

        pool.give_back(a).unwrap();
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.try_lease(Some(Duration::ZERO)), Some(a));
        pool.give_back(a).unwrap();
        assert_eq!(pool.try_lease(None), Some(a));
    }

    #[test]
    fn test_double_release() {
        let pool = ConnectionPool::new(1).unwrap();
        let pos = pool.lease();
        pool.give_back(pos).unwrap();
        assert_eq!(
            pool.give_back(pos).unwrap_err(),
            PoolError::DoubleRelease { position: pos }
        );
        assert_eq!(
            pool.give_back(7).unwrap_err(),
            PoolError::InvalidPosition { position: 7, size: 1 }
        );
    }

    #[test]
    fn test_try_lease_times_out() {
        let pool = ConnectionPool::new(1).unwrap();
        let _pos = pool.lease();

        let start = Instant::now();
        let result = pool.try_lease(Some(Duration::from_millis(50)));
        assert_eq!(result, None);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_pooled_session_guard() {
        let pool = ConnectionPool::new(1).unwrap();
        {
            let session = pool.lease_session();
            assert_eq!(session.position(), 0);
            assert!(!session.is_connected());
            assert!(pool.try_lease_session(Some(Duration::ZERO)).is_none());
        }
        assert_eq!(pool.free_count(), 1);
    }
}
