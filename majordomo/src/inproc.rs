//! In-process router transport.
//!
//! Endpoints use the `inproc://` URI scheme and live in a process-global
//! registry. Each bound endpoint is served by a [`RouterHub`] task that
//! emulates ROUTER-socket framing:
//! - frames received from a peer reach the binder with the peer's identity
//!   frame prepended,
//! - outbound frame lists are routed by their first frame, which the hub
//!   consumes; everything after it (including the empty envelope delimiter)
//!   is delivered to the peer verbatim,
//! - unknown destination identities are dropped silently, as a ROUTER
//!   socket would.
//!
//! The hub does no I/O; it only moves already-framed messages between
//! channels.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use dashmap::DashMap;
use flume::{Receiver, Sender};
use hashbrown::HashMap;
use majordomo_core::error::{MajordomoError, Result};
use majordomo_core::message::Multipart;
use tracing::trace;

static PEER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Peer lifecycle events delivered to a router hub.
#[derive(Debug)]
enum PeerEvent {
    PeerUp {
        identity: Bytes,
        tx: Sender<Multipart>,
    },
    PeerDown {
        identity: Bytes,
    },
}

/// Registry entry shared with connecting peers.
#[derive(Clone)]
struct BoundEndpoint {
    ctl_tx: Sender<PeerEvent>,
    in_tx: Sender<Multipart>,
}

/// Global registry of bound inproc endpoints
static REGISTRY: once_cell::sync::Lazy<DashMap<String, BoundEndpoint>> =
    once_cell::sync::Lazy::new(DashMap::new);

/// Channel ends handed to the binder of an endpoint.
#[derive(Debug)]
pub struct RouterBinding {
    /// Outbound frame lists: first frame is the destination identity.
    pub out_tx: Sender<Multipart>,
    /// Inbound frame lists, identity-prepended.
    pub in_rx: Receiver<Multipart>,
}

/// Routing task for one bound endpoint. Must be spawned; it exits and
/// unbinds the endpoint when the binder drops its [`RouterBinding`].
#[derive(Debug)]
pub struct RouterHub {
    endpoint: String,
    peers: HashMap<Bytes, Sender<Multipart>>,
    ctl_rx: Receiver<PeerEvent>,
    out_rx: Receiver<Multipart>,
}

impl RouterHub {
    /// Drive the hub until the binder side is gone.
    pub async fn run(mut self) {
        use futures::{select, FutureExt};

        loop {
            select! {
                ev = self.ctl_rx.recv_async().fuse() => match ev {
                    Ok(ev) => self.on_peer_event(ev),
                    Err(_) => break,
                },
                msg = self.out_rx.recv_async().fuse() => match msg {
                    Ok(msg) => {
                        // apply queued peer events first so an attach that
                        // happened before this send is visible to routing
                        while let Ok(ev) = self.ctl_rx.try_recv() {
                            self.on_peer_event(ev);
                        }
                        self.route_outbound(msg);
                    }
                    Err(_) => break, // binder dropped its sender
                },
            }
        }
        REGISTRY.remove(&self.endpoint);
    }

    fn on_peer_event(&mut self, ev: PeerEvent) {
        match ev {
            PeerEvent::PeerUp { identity, tx } => {
                // a reconnect with the same identity replaces the old peer
                self.peers.insert(identity, tx);
            }
            PeerEvent::PeerDown { identity } => {
                self.peers.remove(&identity);
            }
        }
    }

    fn route_outbound(&mut self, mut frames: Multipart) {
        if frames.is_empty() {
            return;
        }
        let target = frames.remove(0);
        match self.peers.get(&target) {
            Some(tx) => {
                let _ = tx.send(frames);
            }
            None => {
                // ROUTER behavior: silently drop if unknown id
                trace!(endpoint = %self.endpoint, "no such peer, dropping");
            }
        }
    }
}

/// Bind an `inproc://` endpoint.
///
/// Returns the hub task (to be spawned) and the binder's channel ends.
///
/// # Errors
///
/// Returns an error if the endpoint doesn't start with `inproc://`, has an
/// empty name, or is already bound.
pub fn bind(endpoint: &str) -> io::Result<(RouterHub, RouterBinding)> {
    let name = validate_and_extract_name(endpoint)?;

    let (ctl_tx, ctl_rx) = flume::unbounded();
    let (in_tx, in_rx) = flume::unbounded();
    let (out_tx, out_rx) = flume::unbounded();

    match REGISTRY.entry(name.to_string()) {
        dashmap::mapref::entry::Entry::Occupied(_) => {
            return Err(io::Error::new(
                io::ErrorKind::AddrInUse,
                format!("inproc endpoint '{}' is already bound", name),
            ));
        }
        dashmap::mapref::entry::Entry::Vacant(v) => {
            v.insert(BoundEndpoint { ctl_tx, in_tx });
        }
    }

    let hub = RouterHub {
        endpoint: name.to_string(),
        peers: HashMap::new(),
        ctl_rx,
        out_rx,
    };
    Ok((hub, RouterBinding { out_tx, in_rx }))
}

/// Remove an endpoint from the registry without waiting for the hub to exit.
pub fn unbind(endpoint: &str) -> io::Result<()> {
    let name = validate_and_extract_name(endpoint)?;
    REGISTRY.remove(name);
    Ok(())
}

/// Dealer-style peer attached to a bound router endpoint.
///
/// Sends are non-blocking enqueues; the hub sees every sent frame list with
/// this peer's identity prepended. Dropping the socket detaches the peer
/// from the hub.
#[derive(Debug)]
pub struct PeerSocket {
    identity: Bytes,
    to_hub: Sender<Multipart>,
    rx: Receiver<Multipart>,
    ctl_tx: Sender<PeerEvent>,
}

impl PeerSocket {
    /// Connect with an auto-generated identity.
    pub fn connect(endpoint: &str) -> io::Result<Self> {
        let peer_id = PEER_ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self::connect_with_identity(endpoint, Bytes::from(format!("peer-{}", peer_id)))
    }

    /// Connect with an explicit identity.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is malformed or not bound.
    pub fn connect_with_identity(endpoint: &str, identity: Bytes) -> io::Result<Self> {
        let name = validate_and_extract_name(endpoint)?;
        let Some(bound) = REGISTRY.get(name) else {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("inproc endpoint '{}' not found (must bind before connect)", name),
            ));
        };

        let (tx, rx) = flume::unbounded();
        bound
            .ctl_tx
            .send(PeerEvent::PeerUp {
                identity: identity.clone(),
                tx,
            })
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "router hub is gone"))?;

        Ok(Self {
            identity,
            to_hub: bound.in_tx.clone(),
            rx,
            ctl_tx: bound.ctl_tx.clone(),
        })
    }

    /// The identity frame the hub prepends to this peer's traffic.
    #[must_use]
    pub fn identity(&self) -> &Bytes {
        &self.identity
    }

    /// Send a frame list to the binder.
    pub fn send(&self, frames: Multipart) -> Result<()> {
        let mut out = Vec::with_capacity(frames.len() + 1);
        out.push(self.identity.clone());
        out.extend(frames);
        self.to_hub.send(out).map_err(|_| MajordomoError::ChannelSend)
    }

    /// Await the next frame list routed to this peer.
    pub async fn recv(&self) -> Result<Multipart> {
        self.rx
            .recv_async()
            .await
            .map_err(|_| MajordomoError::SocketClosed)
    }

    /// Non-blocking receive.
    #[must_use]
    pub fn try_recv(&self) -> Option<Multipart> {
        self.rx.try_recv().ok()
    }
}

impl Drop for PeerSocket {
    fn drop(&mut self) {
        let _ = self.ctl_tx.send(PeerEvent::PeerDown {
            identity: self.identity.clone(),
        });
    }
}

/// Validate endpoint format and extract the name.
fn validate_and_extract_name(endpoint: &str) -> io::Result<&str> {
    const PREFIX: &str = "inproc://";

    if !endpoint.starts_with(PREFIX) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("inproc endpoint must start with '{}', got: '{}'", PREFIX, endpoint),
        ));
    }

    let name = &endpoint[PREFIX.len()..];
    if name.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "inproc endpoint name cannot be empty",
        ));
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint() {
        assert_eq!(validate_and_extract_name("inproc://test").unwrap(), "test");
        assert!(validate_and_extract_name("tcp://test").is_err());
        assert!(validate_and_extract_name("inproc://").is_err());
        assert!(validate_and_extract_name("").is_err());
    }

    #[test]
    fn test_bind_duplicate() {
        let endpoint = "inproc://test-duplicate";

        let first = bind(endpoint);
        assert!(first.is_ok());

        let second = bind(endpoint);
        assert!(second.is_err());
        assert_eq!(second.unwrap_err().kind(), io::ErrorKind::AddrInUse);

        let _ = unbind(endpoint);
    }

    #[test]
    fn test_connect_requires_bind() {
        let err = PeerSocket::connect("inproc://test-unbound").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_peer_send_is_identity_prepended() {
        let endpoint = "inproc://test-identity";
        let (_hub, binding) = bind(endpoint).unwrap();

        let peer =
            PeerSocket::connect_with_identity(endpoint, Bytes::from_static(b"wrk-1")).unwrap();
        peer.send(vec![Bytes::new(), Bytes::from_static(b"MDPW01")]).unwrap();

        let got = binding.in_rx.try_recv().unwrap();
        assert_eq!(got[0], Bytes::from_static(b"wrk-1"));
        assert!(got[1].is_empty());
        assert_eq!(got[2], Bytes::from_static(b"MDPW01"));

        unbind(endpoint).unwrap();
    }
}
