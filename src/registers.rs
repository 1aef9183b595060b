//! Shared transactional registers the Controller publishes to on every
//! timer tick: the Choke Manager's rate register and the Status Process's
//! byte-count register.
//!
//! Both are append-only lists behind a lock; the consumer drains the
//! accumulated batch atomically on its own cadence via `drain`, never seeing
//! a partial batch.

use std::sync::{Arc, Mutex};

use crate::{PeerId, TorrentId};

/// A tuple appended to the Choke Manager's rate register on every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateEntry {
    pub peer_id: PeerId,
    pub up_bps: u64,
    pub down_bps: u64,
    pub peer_interested: bool,
    pub is_seeder: bool,
    pub peer_choke: bool,
}

/// A sample appended to the Status Process's register on every tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSample {
    pub torrent_id: TorrentId,
    pub up_bytes: u64,
    pub down_bytes: u64,
}

/// A shared append-only list with atomic drain semantics.
#[derive(Clone)]
pub struct SharedRegister<T> {
    inner: Arc<Mutex<Vec<T>>>,
}

impl<T> SharedRegister<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Appends an entry. Only ever called by peer Controllers.
    pub fn push(&self, entry: T) {
        self.inner.lock().unwrap().push(entry);
    }

    /// Atomically swaps out the accumulated batch, leaving the register
    /// empty for the next round of writers. Only ever called by the
    /// consumer (Choke Manager or Status Process), on its own cadence.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.inner.lock().unwrap())
    }
}

impl<T> Default for SharedRegister<T> {
    fn default() -> Self {
        Self::new()
    }
}
