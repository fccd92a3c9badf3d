//! MDP worker.
//!
//! A worker offers exactly one service. It announces itself with READY,
//! receives requests one at a time, replies with the preserved client
//! envelope, and keeps the connection warm with heartbeats in both
//! directions.

use std::time::{Duration, Instant};

use bytes::Bytes;
use majordomo_core::envelope::{split_address, ReturnPath};
use majordomo_core::error::{MajordomoError, Result};
use majordomo_core::message::Multipart;
use majordomo_core::protocol::{is_worker_protocol, worker_protocol_frame, WorkerCommand};
use tracing::debug;

use crate::inproc::PeerSocket;

/// Worker-side heartbeat settings.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Heartbeat period toward the broker.
    pub hb_interval: Duration,
    /// Quiet intervals tolerated before the broker counts as gone.
    pub hb_liveness: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            hb_interval: Duration::from_millis(1000),
            hb_liveness: 3,
        }
    }
}

impl WorkerConfig {
    /// Set the heartbeat interval (builder-style).
    #[must_use]
    pub const fn with_hb_interval(mut self, interval: Duration) -> Self {
        self.hb_interval = interval;
        self
    }

    /// Set the liveness tolerance (builder-style).
    #[must_use]
    pub const fn with_hb_liveness(mut self, liveness: u32) -> Self {
        self.hb_liveness = liveness;
        self
    }
}

/// One request handed to a worker.
///
/// The envelope is the client's return path; it goes back verbatim with the
/// reply so the broker can reconstruct the client address.
#[derive(Debug)]
pub struct Request {
    envelope: ReturnPath,
    /// Request body frames.
    pub body: Multipart,
}

/// Worker side of the MDP request/reply flow.
pub struct Worker {
    socket: PeerSocket,
    service: Bytes,
    config: WorkerConfig,
    liveness: u32,
    hb_at: Instant,
}

impl Worker {
    /// Connect to a broker backend endpoint and announce the service.
    pub fn connect(endpoint: &str, service: impl Into<Bytes>) -> Result<Self> {
        Self::with_config(WorkerConfig::default(), endpoint, service)
    }

    /// Connect with explicit heartbeat settings.
    pub fn with_config(
        config: WorkerConfig,
        endpoint: &str,
        service: impl Into<Bytes>,
    ) -> Result<Self> {
        let socket = PeerSocket::connect(endpoint)?;
        let service = service.into();

        // ["", "MDPW01", READY, service]
        socket.send(vec![
            Bytes::new(),
            worker_protocol_frame(),
            WorkerCommand::Ready.to_frame(),
            service.clone(),
        ])?;

        let liveness = config.hb_liveness;
        let hb_at = Instant::now() + config.hb_interval;
        Ok(Self {
            socket,
            service,
            config,
            liveness,
            hb_at,
        })
    }

    /// The service this worker offers.
    #[must_use]
    pub fn service(&self) -> &Bytes {
        &self.service
    }

    /// Receive the next request, servicing heartbeats while idle.
    ///
    /// # Errors
    ///
    /// [`MajordomoError::Disconnected`] on a broker DISCONNECT,
    /// [`MajordomoError::HeartbeatLost`] after `hb_liveness` quiet intervals,
    /// or a transport error.
    pub async fn recv(&mut self) -> Result<Request> {
        loop {
            let delay = self.hb_at.saturating_duration_since(Instant::now());
            let frames = match compio::time::timeout(delay, self.socket.recv()).await {
                Ok(frames) => frames?,
                Err(_elapsed) => {
                    // our beat is due and the broker stayed quiet
                    self.liveness = self.liveness.saturating_sub(1);
                    if self.liveness == 0 {
                        return Err(MajordomoError::HeartbeatLost);
                    }
                    self.send_hb()?;
                    self.hb_at = Instant::now() + self.config.hb_interval;
                    continue;
                }
            };

            self.liveness = self.config.hb_liveness;
            match self.classify(frames) {
                Some(Inbound::Request(request)) => return Ok(request),
                Some(Inbound::Heartbeat) => {}
                Some(Inbound::Disconnect) => return Err(MajordomoError::Disconnected),
                None => debug!("malformed broker message, dropping"),
            }
        }
    }

    /// Echo the request envelope back with the reply body.
    pub fn reply(&self, request: &Request, body: impl IntoIterator<Item = Bytes>) -> Result<()> {
        let mut frames: Multipart = vec![
            Bytes::new(),
            worker_protocol_frame(),
            WorkerCommand::Reply.to_frame(),
        ];
        frames.extend(request.envelope.iter().cloned());
        frames.push(Bytes::new());
        frames.extend(body);
        self.socket.send(frames)
    }

    /// Tell the broker this worker is going away, then drop the connection.
    pub fn shutdown(self) {
        let _ = self.socket.send(vec![
            Bytes::new(),
            worker_protocol_frame(),
            WorkerCommand::Disconnect.to_frame(),
        ]);
    }

    fn send_hb(&self) -> Result<()> {
        self.socket.send(vec![
            Bytes::new(),
            worker_protocol_frame(),
            WorkerCommand::Heartbeat.to_frame(),
        ])
    }

    /// Parse `["", "MDPW01", cmd, …]` from the broker.
    fn classify(&self, frames: Multipart) -> Option<Inbound> {
        let mut iter = frames.into_iter();
        if !iter.next()?.is_empty() {
            return None;
        }
        if !is_worker_protocol(&iter.next()?) {
            return None;
        }
        let cmd = WorkerCommand::decode(&iter.next()?)?;
        match cmd {
            WorkerCommand::Request => {
                let (envelope, body) = split_address(iter.collect());
                if envelope.is_empty() {
                    return None;
                }
                Some(Inbound::Request(Request { envelope, body }))
            }
            WorkerCommand::Heartbeat => Some(Inbound::Heartbeat),
            WorkerCommand::Disconnect => Some(Inbound::Disconnect),
            // READY and REPLY travel worker-to-broker only
            WorkerCommand::Ready | WorkerCommand::Reply => None,
        }
    }
}

enum Inbound {
    Request(Request),
    Heartbeat,
    Disconnect,
}
