use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::debug;

use super::connection::{ConnectionError, PooledConnection};
use super::uri::DbUri;

/// Idle limit of a pool nobody has configured yet
pub const DEFAULT_MAX_IDLE: usize = 2;

/// Connection pool for a single endpoint URI
///
/// Connections are checked out for one query and returned afterwards.
/// `max_open` of 0 means unlimited.
pub struct EndpointPool {
    uri: DbUri,
    connect_timeout: Duration,
    max_idle_time: Duration,
    max_open: AtomicUsize,
    max_idle: AtomicUsize,
    /// Idle plus checked-out connections
    open: AtomicUsize,
    idle: Mutex<VecDeque<PooledConnection>>,
    released: Notify,
}

impl EndpointPool {
    pub fn new(uri: DbUri, connect_timeout: Duration, max_idle_time: Duration) -> Self {
        Self {
            uri,
            connect_timeout,
            max_idle_time,
            max_open: AtomicUsize::new(0),
            max_idle: AtomicUsize::new(DEFAULT_MAX_IDLE),
            open: AtomicUsize::new(0),
            idle: Mutex::new(VecDeque::new()),
            released: Notify::new(),
        }
    }

    /// Limit the number of open connections (0 = unlimited)
    pub fn set_max_open_conns(&self, n: usize) {
        self.max_open.store(n, Ordering::SeqCst);
        // Keep max_idle <= max_open
        if n > 0 && self.max_idle.load(Ordering::SeqCst) > n {
            self.set_max_idle_conns(n);
        }
    }

    /// Limit the number of idle connections kept for reuse
    pub fn set_max_idle_conns(&self, n: usize) {
        let max_open = self.max_open.load(Ordering::SeqCst);
        let n = if max_open > 0 { n.min(max_open) } else { n };
        self.max_idle.store(n, Ordering::SeqCst);

        let mut idle = self.idle.lock();
        while idle.len() > n {
            idle.pop_back();
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
    }

    pub fn max_open_conns(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn max_idle_conns(&self) -> usize {
        self.max_idle.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().len()
    }

    pub fn uri(&self) -> &DbUri {
        &self.uri
    }

    /// Check out a connection
    ///
    /// Reuses an idle connection when one is fresh enough, opens a new one
    /// while under `max_open`, and otherwise waits for a release.
    pub async fn get(self: &Arc<Self>) -> Result<PoolGuard, ConnectionError> {
        loop {
            let released = self.released.notified();

            if let Some(mut conn) = self.take_idle() {
                conn.acquire();
                debug!(addr = %conn.addr(), "Reusing idle connection");
                return Ok(PoolGuard::new(self.clone(), conn));
            }

            if self.try_reserve() {
                debug!(uri = %self.uri, "Opening new connection");
                return match PooledConnection::connect(&self.uri, self.connect_timeout).await {
                    Ok(mut conn) => {
                        conn.acquire();
                        Ok(PoolGuard::new(self.clone(), conn))
                    }
                    Err(e) => {
                        self.open.fetch_sub(1, Ordering::SeqCst);
                        self.released.notify_one();
                        Err(e)
                    }
                };
            }

            debug!(uri = %self.uri, open = self.open_count(), "Pool exhausted, waiting for release");
            released.await;
        }
    }

    /// Send COM_QUIT on every idle connection and drop them
    pub async fn close_idle(&self) -> usize {
        let drained: Vec<PooledConnection> = self.idle.lock().drain(..).collect();
        let closed = drained.len();
        for mut conn in drained {
            conn.quit().await;
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        closed
    }

    fn take_idle(&self) -> Option<PooledConnection> {
        let mut idle = self.idle.lock();
        while let Some(conn) = idle.pop_front() {
            if conn.is_idle_too_long(self.max_idle_time) {
                debug!("Connection idle too long, discarding");
                self.open.fetch_sub(1, Ordering::SeqCst);
                continue;
            }
            return Some(conn);
        }
        None
    }

    fn try_reserve(&self) -> bool {
        let max_open = self.max_open.load(Ordering::SeqCst);
        self.open
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |open| {
                (max_open == 0 || open < max_open).then_some(open + 1)
            })
            .is_ok()
    }

    /// Return a connection; kept idle if usable and under both limits
    fn put(&self, mut conn: PooledConnection) {
        conn.release();

        let max_open = self.max_open.load(Ordering::SeqCst);
        let over_open = max_open > 0 && self.open.load(Ordering::SeqCst) > max_open;

        if conn.is_usable() && !over_open {
            let mut idle = self.idle.lock();
            if idle.len() < self.max_idle.load(Ordering::SeqCst) {
                idle.push_back(conn);
                drop(idle);
                self.released.notify_one();
                return;
            }
        }

        debug!(usable = conn.is_usable(), "Closing connection instead of pooling it");
        drop(conn);
        self.open.fetch_sub(1, Ordering::SeqCst);
        self.released.notify_one();
    }
}

/// A checked-out connection, returned to its pool on drop
pub struct PoolGuard {
    pool: Arc<EndpointPool>,
    conn: Option<PooledConnection>,
}

impl PoolGuard {
    fn new(pool: Arc<EndpointPool>, conn: PooledConnection) -> Self {
        Self {
            pool,
            conn: Some(conn),
        }
    }
}

impl Deref for PoolGuard {
    type Target = PooledConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref().expect("connection is present until drop")
    }
}

impl DerefMut for PoolGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut().expect("connection is present until drop")
    }
}

impl Drop for PoolGuard {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.put(conn);
        }
    }
}
