//! The broker task.
//!
//! Wires a [`BrokerEngine`] to its transport channels and drives it from a
//! single-task select loop: one arm per ingress channel and one timer arm
//! that sleeps until the engine's next heartbeat deadline. Handlers run to
//! completion; all state mutation is serialised by the loop.

use std::io;
use std::time::Instant;

use bytes::Bytes;
use flume::{Receiver, Sender};
use futures::FutureExt;
use majordomo_core::broker::BrokerEngine;
use majordomo_core::config::BrokerConfig;
use majordomo_core::message::Multipart;
use tracing::debug;

use crate::inproc::{self, RouterHub};

/// Control commands for a running broker.
#[derive(Debug)]
pub enum BrokerCmd {
    /// Send a fully framed DISCONNECT to a worker and evict it.
    Disconnect(Bytes),
    /// Tear down all broker state and exit the loop.
    Shutdown,
}

/// Clonable handle for controlling a running broker.
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    ctl_tx: Sender<BrokerCmd>,
}

impl BrokerHandle {
    /// Ask the broker to shut down. Idempotent; ignored once it has exited.
    pub fn shutdown(&self) {
        let _ = self.ctl_tx.send(BrokerCmd::Shutdown);
    }

    /// Ask the broker to disconnect a worker.
    pub fn disconnect(&self, wid: Bytes) {
        let _ = self.ctl_tx.send(BrokerCmd::Disconnect(wid));
    }
}

/// An MDP broker bound to its transport.
///
/// The frontend faces clients, the backend faces workers. With a single
/// endpoint both directions share one channel pair; dispatch is by protocol
/// prefix, so the loop never needs to know which side a frame list came
/// from.
pub struct Broker {
    engine: BrokerEngine,
    frontend_rx: Receiver<Multipart>,
    backend_rx: Receiver<Multipart>,
    ctl_tx: Sender<BrokerCmd>,
    ctl_rx: Receiver<BrokerCmd>,
    hubs: Vec<RouterHub>,
}

impl Broker {
    /// Bind `inproc://` endpoints with the default configuration.
    ///
    /// When `backend` is `None`, the frontend endpoint serves both clients
    /// and workers.
    pub fn bind(frontend: &str, backend: Option<&str>) -> io::Result<Self> {
        Self::with_config(BrokerConfig::default(), frontend, backend)
    }

    /// Bind `inproc://` endpoints with an explicit configuration.
    pub fn with_config(
        config: BrokerConfig,
        frontend: &str,
        backend: Option<&str>,
    ) -> io::Result<Self> {
        let (front_hub, front) = inproc::bind(frontend)?;
        let mut hubs = vec![front_hub];

        let (backend_tx, backend_rx) = match backend {
            Some(endpoint) => {
                let (hub, binding) = inproc::bind(endpoint)?;
                hubs.push(hub);
                (binding.out_tx, binding.in_rx)
            }
            // single-socket mode: another handle on the same channel pair
            None => (front.out_tx.clone(), front.in_rx.clone()),
        };

        let mut broker =
            Self::from_channels(config, front.out_tx, front.in_rx, backend_tx, backend_rx);
        broker.hubs = hubs;
        Ok(broker)
    }

    /// Construct a broker over raw channel endpoints.
    ///
    /// This is the seam for alternative transports: anything that delivers
    /// inbound frame lists on the receivers and drains the senders will do.
    pub fn from_channels(
        config: BrokerConfig,
        frontend_tx: Sender<Multipart>,
        frontend_rx: Receiver<Multipart>,
        backend_tx: Sender<Multipart>,
        backend_rx: Receiver<Multipart>,
    ) -> Self {
        let (ctl_tx, ctl_rx) = flume::unbounded();
        Self {
            engine: BrokerEngine::new(config, frontend_tx, backend_tx, Instant::now()),
            frontend_rx,
            backend_rx,
            ctl_tx,
            ctl_rx,
            hubs: Vec::new(),
        }
    }

    /// Control handle for the broker; clonable, usable after `run` starts.
    #[must_use]
    pub fn handle(&self) -> BrokerHandle {
        BrokerHandle {
            ctl_tx: self.ctl_tx.clone(),
        }
    }

    /// Drive the broker until shutdown.
    pub async fn run(mut self) {
        use futures::select;

        for hub in self.hubs.drain(..) {
            compio::runtime::spawn(hub.run()).detach();
        }

        loop {
            let delay = self
                .engine
                .next_deadline()
                .saturating_duration_since(Instant::now());
            let mut tick = Box::pin(compio::time::sleep(delay).fuse());

            select! {
                frames = self.frontend_rx.recv_async().fuse() => match frames {
                    Ok(frames) => self.engine.handle_frames(Instant::now(), frames),
                    Err(_) => break, // transport gone
                },
                frames = self.backend_rx.recv_async().fuse() => match frames {
                    Ok(frames) => self.engine.handle_frames(Instant::now(), frames),
                    Err(_) => break,
                },
                cmd = self.ctl_rx.recv_async().fuse() => match cmd {
                    Ok(BrokerCmd::Disconnect(wid)) => self.engine.disconnect(&wid),
                    Ok(BrokerCmd::Shutdown) | Err(_) => break,
                },
                () = tick => self.engine.on_tick(Instant::now()),
            }
        }

        debug!("broker loop exiting");
        self.engine.shutdown();
    }

    /// Read-only access to the engine, for inspection before `run`.
    #[must_use]
    pub fn engine(&self) -> &BrokerEngine {
        &self.engine
    }
}
