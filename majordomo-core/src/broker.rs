//! The broker routing engine.
//!
//! Channel-fed and sans-IO: inbound frame lists are handed to
//! [`BrokerEngine::handle_frames`], time is injected through
//! [`BrokerEngine::on_tick`], and every outbound message is a non-blocking
//! enqueue on a `flume` sender. Malformed input fails closed; no error
//! crosses a handler boundary.
//!
//! The engine never branches on which socket delivered a frame list:
//! classification is by protocol prefix alone, so the frontend and backend
//! senders may be clones of the same channel.

use std::time::Instant;

use bytes::Bytes;
use flume::Sender;
use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::config::BrokerConfig;
use crate::envelope::{split_address, wid_hex, ReturnPath};
use crate::message::{Message, Multipart};
use crate::protocol::{
    client_protocol_frame, is_client_protocol, is_worker_protocol, worker_protocol_frame,
    WorkerCommand,
};
use crate::service::{PendingRequest, ServiceEntry};
use crate::worker::WorkerRecord;

/// The MDP broker state machine.
///
/// Owns the worker table, the service table and the heartbeat schedule.
/// Service entries are created on first worker registration and never
/// removed; an empty entry queues later requests until a worker returns.
pub struct BrokerEngine {
    config: BrokerConfig,
    frontend: Sender<Multipart>,
    backend: Sender<Multipart>,
    workers: HashMap<Bytes, WorkerRecord>,
    services: HashMap<Bytes, ServiceEntry>,
    sweep_at: Instant,
}

impl BrokerEngine {
    pub fn new(
        config: BrokerConfig,
        frontend: Sender<Multipart>,
        backend: Sender<Multipart>,
        now: Instant,
    ) -> Self {
        let sweep_at = now + config.hb_interval;
        Self {
            config,
            frontend,
            backend,
            workers: HashMap::new(),
            services: HashMap::new(),
            sweep_at,
        }
    }

    /// Process one inbound frame list from either socket.
    pub fn handle_frames(&mut self, now: Instant, frames: Multipart) {
        let (rp, mut msg) = split_address(frames);
        if msg.is_empty() {
            debug!("frame list without payload, dropping");
            return;
        }
        let proto = msg.remove(0);
        if is_worker_protocol(&proto) {
            self.on_worker(now, rp, msg);
        } else if is_client_protocol(&proto) {
            self.on_client(proto, rp, msg);
        } else {
            debug!(proto = ?proto, "unknown protocol, dropping");
        }
    }

    /// Route a client request to a free worker, or park it.
    ///
    /// `msg[0]` is the requested service, the rest is the request body. A
    /// request for a service this broker has never seen is dropped.
    fn on_client(&mut self, proto: Bytes, rp: ReturnPath, mut msg: Multipart) {
        if msg.is_empty() {
            debug!("client message without service frame, dropping");
            return;
        }
        let service = msg.remove(0);
        let Some(entry) = self.services.get_mut(&service) else {
            warn!(
                service = %String::from_utf8_lossy(&service),
                "no such service, dropping request"
            );
            return;
        };

        let Some(wid) = entry.get() else {
            // no worker ready; park with the service frame back at the head
            msg.insert(0, service);
            entry.enqueue_pending(PendingRequest {
                proto,
                return_path: rp,
                frames: msg,
            });
            return;
        };

        if !self.workers.contains_key(&wid) {
            // availability queue invariant was violated upstream; fail closed
            warn!(wid = %wid_hex(&wid), "available worker missing from table, dropping request");
            return;
        }

        let mut out: Multipart = Vec::with_capacity(4 + rp.len() + 1 + msg.len());
        out.push(wid);
        out.push(Bytes::new());
        out.push(worker_protocol_frame());
        out.push(WorkerCommand::Request.to_frame());
        out.extend(rp);
        out.push(Bytes::new());
        out.extend(msg);
        let _ = self.backend.send(out);
    }

    /// Dispatch a worker frame list on its command byte.
    ///
    /// `rp[0]` is the worker identity. Any classified frame from a known,
    /// still-alive worker refreshes its liveness; a worker already at zero
    /// stays dead until the sweep evicts it.
    fn on_worker(&mut self, now: Instant, rp: ReturnPath, mut msg: Multipart) {
        let Some(wid) = rp.first().cloned() else {
            debug!("worker message without return path, dropping");
            return;
        };
        if msg.is_empty() {
            debug!(wid = %wid_hex(&wid), "worker message without command frame, dropping");
            return;
        }
        let cmd_frame = msg.remove(0);
        let Some(cmd) = WorkerCommand::decode(&cmd_frame) else {
            debug!(wid = %wid_hex(&wid), cmd = ?cmd_frame, "unknown worker command, dropping");
            return;
        };

        if let Some(wrep) = self.workers.get_mut(&wid) {
            if wrep.alive() {
                wrep.on_heartbeat(now);
            }
        }

        match cmd {
            WorkerCommand::Ready => {
                let Some(service) = msg.first().cloned().filter(|s| !s.is_empty()) else {
                    debug!(wid = %wid_hex(&wid), "READY without service name, dropping");
                    return;
                };
                self.register_worker(now, wid, service);
            }
            WorkerCommand::Reply => self.on_reply(&wid, msg),
            WorkerCommand::Heartbeat => {
                // the liveness refresh above is the whole effect
            }
            WorkerCommand::Disconnect => self.unregister_worker(&wid),
            WorkerCommand::Request => {
                debug!(wid = %wid_hex(&wid), "REQUEST from worker side, dropping");
            }
        }
    }

    /// Add a worker to its service. A READY from a known identity is a no-op.
    ///
    /// Registration may free up a service with a backlog, in which case the
    /// oldest parked request goes to the new worker in the same turn.
    fn register_worker(&mut self, now: Instant, wid: Bytes, service: Bytes) {
        if self.workers.contains_key(&wid) {
            return;
        }
        debug!(
            wid = %wid_hex(&wid),
            service = %String::from_utf8_lossy(&service),
            "worker ready"
        );
        let wrep = WorkerRecord::new(
            wid.clone(),
            service.clone(),
            now,
            self.config.hb_interval,
            self.config.hb_liveness,
            self.backend.clone(),
        );
        self.workers.insert(wid.clone(), wrep);

        let pending = {
            let entry = self.services.entry(service).or_default();
            entry.put(wid);
            entry.dequeue_pending()
        };
        if let Some(req) = pending {
            self.on_client(req.proto, req.return_path, req.frames);
        }
    }

    /// Forward a worker reply to its client and free the worker.
    ///
    /// `msg` still carries the client return path handed out with the
    /// request, then a delimiter, then the reply body.
    fn on_reply(&mut self, wid: &Bytes, msg: Multipart) {
        let Some(wrep) = self.workers.get(wid) else {
            debug!(wid = %wid_hex(wid), "REPLY from unknown worker, dropping");
            return;
        };
        let service = wrep.service().clone();

        let (client_rp, body) = split_address(msg);
        if client_rp.is_empty() {
            debug!(wid = %wid_hex(wid), "reply without client return path, dropping");
        } else {
            let mut out: Multipart = Vec::with_capacity(client_rp.len() + 3 + body.len());
            out.extend(client_rp);
            out.push(Bytes::new());
            out.push(client_protocol_frame());
            out.push(service.clone());
            out.extend(body);
            let _ = self.frontend.send(out);
        }

        // the worker is free again; hand it the oldest parked request, if any
        let pending = {
            let entry = self.services.entry(service).or_default();
            entry.put(wid.clone());
            entry.dequeue_pending()
        };
        if let Some(req) = pending {
            self.on_client(req.proto, req.return_path, req.frames);
        }
    }

    /// Evict a worker. Unknown identities are ignored.
    ///
    /// Parked requests for the service stay queued; a request already in
    /// flight to this worker is lost and its client sees only a timeout.
    pub fn unregister_worker(&mut self, wid: &[u8]) {
        let Some(wrep) = self.workers.remove(wid) else {
            return;
        };
        debug!(
            wid = %wid_hex(wid),
            service = %String::from_utf8_lossy(wrep.service()),
            "unregistering worker"
        );
        if let Some(entry) = self.services.get_mut(wrep.service()) {
            entry.remove(wid);
        }
    }

    /// Send a fully framed DISCONNECT to a worker and evict it.
    pub fn disconnect(&mut self, wid: &Bytes) {
        let msg = Message::new()
            .push(wid.clone())
            .push_empty()
            .push(worker_protocol_frame())
            .push(WorkerCommand::Disconnect.to_frame())
            .into_frames();
        let _ = self.backend.send(msg);
        self.unregister_worker(wid);
    }

    /// Advance heartbeat schedules and evict workers whose liveness ran out.
    pub fn on_tick(&mut self, now: Instant) {
        for wrep in self.workers.values_mut() {
            wrep.poll_hb(now);
        }
        if self.sweep_at <= now {
            self.sweep_at = now + self.config.hb_interval;
            let dead: Vec<Bytes> = self
                .workers
                .values()
                .filter(|w| !w.alive())
                .map(|w| w.wid().clone())
                .collect();
            for wid in dead {
                warn!(wid = %wid_hex(&wid), "dead worker");
                self.unregister_worker(&wid);
            }
        }
    }

    /// Earliest instant at which [`Self::on_tick`] has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Instant {
        self.workers
            .values()
            .map(WorkerRecord::hb_at)
            .fold(self.sweep_at, std::cmp::min)
    }

    /// Discard all broker state. Parked requests and worker registrations
    /// are dropped; undelivered outbound frames die with the channels.
    pub fn shutdown(&mut self) {
        self.workers.clear();
        self.services.clear();
    }

    #[must_use]
    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    #[must_use]
    pub fn has_worker(&self, wid: &[u8]) -> bool {
        self.workers.contains_key(wid)
    }

    #[must_use]
    pub fn service(&self, name: &[u8]) -> Option<&ServiceEntry> {
        self.services.get(name)
    }
}
