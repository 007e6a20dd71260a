//! Bounded connection pool over tokio-postgres.
//!
//! Each pooled client owns its driver task: `tokio_postgres::connect` yields
//! a `Client` plus a `Connection` future that must be polled for the client
//! to make progress, so the pool spawns the connection onto the runtime and
//! keeps only the client. Acquiring takes a semaphore permit and an idle
//! client (or dials a new one); dropping the guard returns the client.
//! Clients whose connection task has died are discarded on acquire and on
//! return rather than repaired in place.
//!
//! The pool is the only shared mutable resource in the store; there is no
//! other in-process locking. Mutual exclusion between callers is the
//! engine's own row locking inside a transaction, held for one call.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_postgres::{Client, NoTls};

use super::StoreError;

struct PoolInner {
    conn_str: String,
    idle: Mutex<Vec<Client>>,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

/// A cloneable handle to a bounded pool of PostgreSQL connections.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Create a pool and validate connectivity by dialing one connection.
    ///
    /// Further connections are opened lazily by [`Pool::acquire`], up to
    /// `max_size` concurrently checked-out clients.
    pub async fn connect(conn_str: &str, max_size: usize) -> Result<Self, StoreError> {
        let first = open_client(conn_str).await?;
        let inner = PoolInner {
            conn_str: conn_str.to_string(),
            idle: Mutex::new(vec![first]),
            permits: Arc::new(Semaphore::new(max_size.max(1))),
            closed: AtomicBool::new(false),
        };
        tracing::debug!(max_size, "connection pool established");
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Check out a client, waiting for a permit if the pool is exhausted.
    ///
    /// # Errors
    /// Fails with [`StoreError::PoolClosed`] if [`Pool::close`] has run.
    pub async fn acquire(&self) -> Result<PooledClient, StoreError> {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| StoreError::PoolClosed)?;
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(StoreError::PoolClosed);
        }

        // Reuse the most recently returned live client; discard dead ones.
        loop {
            let candidate = self.pop_idle();
            match candidate {
                Some(client) if client.is_closed() => {
                    tracing::debug!("discarding dead pooled connection");
                }
                Some(client) => {
                    return Ok(PooledClient {
                        client: Some(client),
                        pool: Arc::clone(&self.inner),
                        _permit: permit,
                    });
                }
                None => break,
            }
        }

        let client = open_client(&self.inner.conn_str).await?;
        Ok(PooledClient {
            client: Some(client),
            pool: Arc::clone(&self.inner),
            _permit: permit,
        })
    }

    fn pop_idle(&self) -> Option<Client> {
        match self.inner.idle.lock() {
            Ok(mut idle) => idle.pop(),
            Err(poisoned) => poisoned.into_inner().pop(),
        }
    }

    /// Close the pool: waiters fail, idle connections drop, and clients
    /// returned later are discarded instead of pooled.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.permits.close();
        if let Ok(mut idle) = self.inner.idle.lock() {
            idle.clear();
        }
        tracing::debug!("connection pool closed");
    }
}

async fn open_client(conn_str: &str) -> Result<Client, StoreError> {
    let (client, connection) = tokio_postgres::connect(conn_str, NoTls).await?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!(error = %e, "postgres connection task ended");
        }
    });
    Ok(client)
}

/// A checked-out client. Dereferences to [`tokio_postgres::Client`]; the
/// client returns to the pool when the guard drops.
pub struct PooledClient {
    client: Option<Client>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledClient {
    type Target = Client;

    fn deref(&self) -> &Client {
        self.client.as_ref().expect("client present until drop")
    }
}

impl DerefMut for PooledClient {
    fn deref_mut(&mut self) -> &mut Client {
        self.client.as_mut().expect("client present until drop")
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };
        if self.pool.closed.load(Ordering::SeqCst) || client.is_closed() {
            return;
        }
        if let Ok(mut idle) = self.pool.idle.lock() {
            idle.push(client);
        }
    }
}
