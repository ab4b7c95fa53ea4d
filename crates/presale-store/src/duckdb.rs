//! Pooled `DuckDB` connections for the catalog.
//!
//! Every handle is cloned from one root connection so all of them share a single
//! database instance; opening the same file twice from one process is not
//! supported by `DuckDB`.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ::duckdb::Connection;
use tracing::debug;

/// Access mode for catalog connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Lookups used by valuation and listings.
    ReadOnly,
    /// Inserts, updates and migrations.
    ReadWrite,
}

#[derive(Default)]
struct Idle {
    read_only: Vec<Connection>,
    read_write: Vec<Connection>,
}

impl Idle {
    fn slot(&mut self, mode: AccessMode) -> &mut Vec<Connection> {
        match mode {
            AccessMode::ReadOnly => &mut self.read_only,
            AccessMode::ReadWrite => &mut self.read_write,
        }
    }
}

struct PoolInner {
    db_path: PathBuf,
    max_idle: usize,
    root: Mutex<Connection>,
    idle: Mutex<Idle>,
}

// A panic while holding either lock leaves plain handles behind, which are
// still usable.
fn relock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps a bounded number of idle connections per access mode.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Open the database file and prepare an empty pool around it.
    ///
    /// # Errors
    /// Returns an error if the database file cannot be opened or configured.
    pub fn open(path: impl Into<PathBuf>, max_idle: usize) -> Result<Self, ::duckdb::Error> {
        let db_path = path.into();
        debug!(path = %db_path.display(), "opening catalog database");
        let root = Connection::open(db_path.as_path())?;
        root.execute_batch("PRAGMA disable_progress_bar;")?;

        Ok(Self {
            inner: Arc::new(PoolInner {
                db_path,
                max_idle: max_idle.max(1),
                root: Mutex::new(root),
                idle: Mutex::new(Idle::default()),
            }),
        })
    }

    /// Take an idle connection for `mode`, cloning a new one when none is parked.
    ///
    /// # Errors
    /// Returns an error if a new connection cannot be created.
    pub fn acquire(&self, mode: AccessMode) -> Result<PooledConnection, ::duckdb::Error> {
        let parked = relock(&self.inner.idle).slot(mode).pop();
        let connection = match parked {
            Some(connection) => connection,
            None => relock(&self.inner.root).try_clone()?,
        };

        Ok(PooledConnection {
            mode,
            pool: Arc::clone(&self.inner),
            connection: Some(connection),
        })
    }

    #[must_use]
    pub fn db_path(&self) -> &Path {
        self.inner.db_path.as_path()
    }
}

/// Connection handle that parks itself back in the pool on drop.
pub struct PooledConnection {
    mode: AccessMode,
    pool: Arc<PoolInner>,
    connection: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection
            .as_ref()
            .expect("pooled connection taken before drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection
            .as_mut()
            .expect("pooled connection taken before drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };

        let mut idle = relock(&self.pool.idle);
        let slot = idle.slot(self.mode);
        if slot.len() < self.pool.max_idle {
            slot.push(connection);
        }
    }
}
