use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::{Manager, PoolConfig, PoolError};
use crate::amqp::ConnectionFactory;

/// A bounded pool of broker connections.
///
/// `ConnectionPool` tracks every connection it has dialed and not yet closed - idle ones
/// sitting in its buffer as well as the ones currently checked out by callers - and never
/// lets that number exceed [`PoolConfig::max_open`].
///
/// The pool is cheap to clone: clones share the same idle buffer and counters, so the
/// same pool can be handed to publishers, consumers and the topology manager.
///
/// # Checkout discipline
///
/// A connection obtained with [`ConnectionPool::get`] is exclusively owned by the caller
/// and must be handed back with [`ConnectionPool::put`] once the operation is over.
/// A connection that is dropped instead of returned keeps holding its slot.
pub struct ConnectionPool<M: Manager = ConnectionFactory> {
    inner: Arc<PoolInner<M>>,
}

impl<M: Manager> Clone for ConnectionPool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct PoolInner<M: Manager> {
    manager: M,
    max_open: usize,
    max_idle: usize,
    state: Mutex<PoolState<M::Connection>>,
}

struct PoolState<C> {
    idle: VecDeque<C>,
    /// Idle plus checked-out connections.
    live: usize,
    closed: bool,
}

/// A point-in-time view of the pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_open: usize,
    pub max_idle: usize,
    /// Connections sitting in the idle buffer.
    pub idle: usize,
    /// Connections in existence, idle and checked out.
    pub live: usize,
    pub closed: bool,
}

enum Checkout<C> {
    Idle(C),
    Reserved,
}

impl ConnectionPool<ConnectionFactory> {
    /// Build a pool that dials `config.url()` with `lapin`.
    ///
    /// Use [`ConnectionPool::with_manager`] to customise how connections are established
    /// (e.g. TLS, see [`ConnectionFactory::new_from_config`]).
    pub fn new(config: &PoolConfig) -> Result<Self, anyhow::Error> {
        let factory = ConnectionFactory::from_url(config.url().expose_secret())?;
        Ok(Self::with_manager(config, factory))
    }
}

impl<M: Manager> ConnectionPool<M> {
    /// Build a pool that dials connections through `manager`.
    ///
    /// The url in `config` is not used: `manager` already knows where to connect.
    pub fn with_manager(config: &PoolConfig, manager: M) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                manager,
                max_open: config.max_open(),
                max_idle: config.max_idle(),
                state: Mutex::new(PoolState {
                    idle: VecDeque::with_capacity(config.max_idle()),
                    live: 0,
                    closed: false,
                }),
            }),
        }
    }

    /// Check a connection out of the pool.
    ///
    /// Reuses an idle connection when one is available, otherwise dials a new one if
    /// fewer than `max_open` connections exist. It never waits for a connection to be
    /// returned: when all slots are taken it fails straight away with
    /// [`PoolError::Exhausted`].
    #[tracing::instrument(name = "pool_get", skip(self), level = "debug")]
    pub async fn get(&self) -> Result<M::Connection, PoolError> {
        let slot = loop {
            let checkout = {
                let mut state = self.inner.state.lock();
                if state.closed {
                    return Err(PoolError::Closed);
                }
                match state.idle.pop_front() {
                    Some(connection) => Checkout::Idle(connection),
                    None if state.live < self.inner.max_open => {
                        // Reserve the slot before releasing the lock, the dial happens outside.
                        state.live += 1;
                        Checkout::Reserved
                    }
                    None => {
                        return Err(PoolError::Exhausted {
                            max_open: self.inner.max_open,
                        })
                    }
                }
            };
            match checkout {
                Checkout::Idle(connection) => {
                    if self.inner.manager.is_healthy(&connection) {
                        return Ok(connection);
                    }
                    warn!("Discarding a broken idle connection");
                    self.inner.discard(connection).await;
                }
                Checkout::Reserved => break Slot::new(&self.inner),
            }
        };

        let connection = self
            .inner
            .manager
            .connect()
            .await
            .map_err(PoolError::Connect)?;
        slot.keep();
        Ok(connection)
    }

    /// Return a connection to the pool.
    ///
    /// The connection is buffered for reuse if there is idle capacity left, closed
    /// otherwise. Broken connections, and any connection returned after
    /// [`ConnectionPool::close`], are always closed.
    #[tracing::instrument(name = "pool_put", skip_all, level = "debug")]
    pub async fn put(&self, connection: M::Connection) {
        if !self.inner.manager.is_healthy(&connection) {
            warn!("Discarding a broken connection returned to the pool");
            return self.inner.discard(connection).await;
        }

        let rejected = {
            let mut state = self.inner.state.lock();
            if state.closed || state.idle.len() >= self.inner.max_idle {
                Some(connection)
            } else {
                state.idle.push_back(connection);
                None
            }
        };
        if let Some(connection) = rejected {
            debug!("No idle capacity left, closing the returned connection");
            self.inner.discard(connection).await;
        }
    }

    /// Close every idle connection and stop handing out new ones.
    ///
    /// Connections checked out at the time of the call are not touched: they are closed
    /// when their owners [`put`](ConnectionPool::put) them back.
    /// Calling `close` more than once is harmless.
    #[tracing::instrument(name = "pool_close", skip(self))]
    pub async fn close(&self) {
        let drained: Vec<_> = {
            let mut state = self.inner.state.lock();
            state.closed = true;
            state.idle.drain(..).collect()
        };
        if !drained.is_empty() {
            info!(connections = drained.len(), "Closing idle connections");
        }
        join_all(
            drained
                .into_iter()
                .map(|connection| self.inner.discard(connection)),
        )
        .await;
    }

    /// A snapshot of the pool counters.
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            max_open: self.inner.max_open,
            max_idle: self.inner.max_idle,
            idle: state.idle.len(),
            live: state.live,
            closed: state.closed,
        }
    }

    /// The manager used to dial and close connections.
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }
}

impl<M: Manager> PoolInner<M> {
    /// Close `connection` and give its slot back once it is gone.
    async fn discard(&self, connection: M::Connection) {
        let _slot = Slot::new(self);
        self.manager.disconnect(connection).await;
    }
}

/// One unit of `max_open` capacity, released on drop unless kept.
///
/// Dropping a `get` future halfway through the dial still releases its reservation.
struct Slot<'a, M: Manager> {
    pool: &'a PoolInner<M>,
    held: bool,
}

impl<'a, M: Manager> Slot<'a, M> {
    fn new(pool: &'a PoolInner<M>) -> Self {
        Self { pool, held: true }
    }

    /// The slot now belongs to a live connection.
    fn keep(mut self) {
        self.held = false;
    }
}

impl<M: Manager> Drop for Slot<'_, M> {
    fn drop(&mut self) {
        if self.held {
            self.pool.state.lock().live -= 1;
        }
    }
}
