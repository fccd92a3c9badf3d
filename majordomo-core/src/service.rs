//! Per-service worker availability and request backlog.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::envelope::ReturnPath;
use crate::message::Multipart;

/// A client request parked until a worker frees up.
///
/// Everything needed to re-enter the client path unchanged is kept: the
/// protocol id the client sent, its return path, and the frames with the
/// service name back at the head.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub proto: Bytes,
    pub return_path: ReturnPath,
    pub frames: Multipart,
}

/// Worker queue and request backlog for one service.
///
/// Both queues are strict FIFO: the least-recently-used worker serves next,
/// and the oldest request is dispatched first. `available` never holds
/// duplicates.
#[derive(Debug, Default)]
pub struct ServiceEntry {
    available: VecDeque<Bytes>,
    pending: VecDeque<PendingRequest>,
}

impl ServiceEntry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `wid` to the available queue. Duplicate puts are idempotent.
    pub fn put(&mut self, wid: Bytes) {
        if !self.contains(&wid) {
            self.available.push_back(wid);
        }
    }

    /// Pop the least-recently-used available worker.
    pub fn get(&mut self) -> Option<Bytes> {
        self.available.pop_front()
    }

    /// Remove `wid` from the available queue if present; idempotent.
    pub fn remove(&mut self, wid: &[u8]) {
        // O(n), but worker churn is not the hot path.
        if let Some(pos) = self.available.iter().position(|w| w == wid) {
            self.available.remove(pos);
        }
    }

    #[must_use]
    pub fn contains(&self, wid: &[u8]) -> bool {
        self.available.iter().any(|w| w == wid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.available.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }

    /// Park a request at the back of the backlog.
    pub fn enqueue_pending(&mut self, request: PendingRequest) {
        self.pending.push_back(request);
    }

    /// Take the oldest parked request.
    pub fn dequeue_pending(&mut self) -> Option<PendingRequest> {
        self.pending.pop_front()
    }

    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
