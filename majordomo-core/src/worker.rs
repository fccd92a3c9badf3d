//! Per-worker liveness and heartbeat state.

use std::time::{Duration, Instant};

use bytes::Bytes;
use flume::Sender;

use crate::message::{Message, Multipart};
use crate::protocol::{worker_protocol_frame, WorkerCommand};

/// Broker-side record of one connected worker.
///
/// The record owns its heartbeat schedule: a single deadline with period
/// `hb_interval` drives both the inbound liveness countdown and the outbound
/// heartbeat emission. It holds a clone of the backend sender so it can emit
/// its own beats; dropping the record stops the schedule, so eviction from
/// the broker table is the only teardown needed.
#[derive(Debug)]
pub struct WorkerRecord {
    wid: Bytes,
    service: Bytes,
    liveness: u32,
    hb_liveness: u32,
    hb_interval: Duration,
    last_hb_time: Instant,
    hb_at: Instant,
    backend: Sender<Multipart>,
}

impl WorkerRecord {
    pub fn new(
        wid: Bytes,
        service: Bytes,
        now: Instant,
        hb_interval: Duration,
        hb_liveness: u32,
        backend: Sender<Multipart>,
    ) -> Self {
        Self {
            wid,
            service,
            liveness: hb_liveness,
            hb_liveness,
            hb_interval,
            last_hb_time: now,
            hb_at: now + hb_interval,
            backend,
        }
    }

    #[must_use]
    pub fn wid(&self) -> &Bytes {
        &self.wid
    }

    #[must_use]
    pub fn service(&self) -> &Bytes {
        &self.service
    }

    #[must_use]
    pub fn liveness(&self) -> u32 {
        self.liveness
    }

    #[must_use]
    pub fn last_hb_time(&self) -> Instant {
        self.last_hb_time
    }

    /// Next instant at which this record's heartbeat schedule fires.
    #[must_use]
    pub fn hb_at(&self) -> Instant {
        self.hb_at
    }

    /// One missed heartbeat interval.
    pub fn tick_in(&mut self) {
        self.liveness = self.liveness.saturating_sub(1);
    }

    /// Emit `[wid, "", "MDPW01", HEARTBEAT]` on the backend.
    pub fn send_hb(&self) {
        let msg = Message::new()
            .push(self.wid.clone())
            .push_empty()
            .push(worker_protocol_frame())
            .push(WorkerCommand::Heartbeat.to_frame())
            .into_frames();
        let _ = self.backend.send(msg);
    }

    /// Refresh liveness after inbound traffic from this worker.
    pub fn on_heartbeat(&mut self, now: Instant) {
        self.liveness = self.hb_liveness;
        self.last_hb_time = now;
    }

    #[must_use]
    pub fn alive(&self) -> bool {
        self.liveness > 0
    }

    /// Advance the heartbeat schedule if its deadline has passed: count one
    /// missed inbound interval and emit one outbound beat.
    pub fn poll_hb(&mut self, now: Instant) {
        if self.hb_at > now {
            return;
        }
        self.tick_in();
        self.send_hb();
        self.hb_at = now + self.hb_interval;
    }
}
