//! MDP client.
//!
//! Thin REQ-style wrapper over a peer socket: one outstanding request at a
//! time, an optional per-request timeout to detect broker failure, and
//! envelope validation on the reply path.

use std::time::Duration;

use bytes::Bytes;
use majordomo_core::error::{MajordomoError, Result};
use majordomo_core::message::Multipart;
use majordomo_core::protocol::{client_protocol_frame, CLIENT_PROTOCOL};
use tracing::debug;

use crate::inproc::PeerSocket;

/// Client side of the MDP request/reply flow.
///
/// A client addresses one service. `request` enforces the protocol's
/// at-most-one-outstanding rule: a second request before the previous reply
/// (or timeout) fails with [`MajordomoError::InvalidState`].
pub struct Client {
    socket: PeerSocket,
    service: Bytes,
    can_send: bool,
}

impl Client {
    /// Connect to a broker frontend endpoint for the given service.
    pub fn connect(endpoint: &str, service: impl Into<Bytes>) -> Result<Self> {
        Ok(Self {
            socket: PeerSocket::connect(endpoint)?,
            service: service.into(),
            can_send: true,
        })
    }

    /// The service this client addresses.
    #[must_use]
    pub fn service(&self) -> &Bytes {
        &self.service
    }

    /// Send one request and await its reply body.
    ///
    /// With a timeout, a late reply is discarded before the next request is
    /// sent, so a timed-out exchange cannot leak into the following one.
    ///
    /// # Errors
    ///
    /// [`MajordomoError::InvalidState`] if a request is already outstanding,
    /// [`MajordomoError::RequestTimeout`] when the window elapses, or a
    /// transport error.
    pub async fn request(
        &mut self,
        body: impl IntoIterator<Item = Bytes>,
        timeout: Option<Duration>,
    ) -> Result<Multipart> {
        if !self.can_send {
            return Err(MajordomoError::InvalidState);
        }

        // a reply that lost its race against an earlier timeout is stale
        while let Some(stale) = self.socket.try_recv() {
            debug!(frames = stale.len(), "discarding stale reply");
        }

        let mut frames: Multipart = vec![Bytes::new(), client_protocol_frame(), self.service.clone()];
        frames.extend(body);
        self.socket.send(frames)?;
        self.can_send = false;

        let reply = match timeout {
            Some(window) => match compio::time::timeout(window, self.recv_reply()).await {
                Ok(reply) => reply?,
                Err(_elapsed) => {
                    self.can_send = true;
                    return Err(MajordomoError::RequestTimeout(window));
                }
            },
            None => self.recv_reply().await?,
        };
        self.can_send = true;
        Ok(reply)
    }

    async fn recv_reply(&self) -> Result<Multipart> {
        loop {
            let frames = self.socket.recv().await?;
            match self.strip_envelope(frames) {
                Some(body) => return Ok(body),
                None => debug!("malformed reply envelope, dropping"),
            }
        }
    }

    /// Strip `["", "MDPC01", service]` from the front of a reply.
    fn strip_envelope(&self, frames: Multipart) -> Option<Multipart> {
        let mut iter = frames.into_iter();
        if !iter.next()?.is_empty() {
            return None;
        }
        if iter.next()? != CLIENT_PROTOCOL {
            return None;
        }
        if iter.next()? != self.service {
            return None;
        }
        Some(iter.collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inproc;

    fn client_for(endpoint: &str) -> (Client, inproc::RouterBinding, inproc::RouterHub) {
        let (hub, binding) = inproc::bind(endpoint).unwrap();
        let client = Client::connect(endpoint, &b"echo"[..]).unwrap();
        (client, binding, hub)
    }

    #[test]
    fn test_request_frames_carry_protocol_and_service() {
        let (mut client, binding, _hub) =
            client_for("inproc://client-frames-test");

        compio::runtime::Runtime::new().unwrap().block_on(async {
            // no reply will come; use a zero-ish timeout and ignore the error
            let _ = client
                .request(
                    [Bytes::from_static(b"TEST")],
                    Some(Duration::from_millis(10)),
                )
                .await;
        });

        let sent = binding.in_rx.try_recv().unwrap();
        // [identity, "", "MDPC01", "echo", "TEST"]
        assert_eq!(sent.len(), 5);
        assert!(sent[1].is_empty());
        assert_eq!(sent[2], Bytes::from_static(b"MDPC01"));
        assert_eq!(sent[3], Bytes::from_static(b"echo"));
        assert_eq!(sent[4], Bytes::from_static(b"TEST"));

        inproc::unbind("inproc://client-frames-test").unwrap();
    }

    #[test]
    fn test_strip_envelope_rejects_wrong_service() {
        let (client, _binding, _hub) = client_for("inproc://client-envelope-test");

        let good = vec![
            Bytes::new(),
            Bytes::from_static(b"MDPC01"),
            Bytes::from_static(b"echo"),
            Bytes::from_static(b"body"),
        ];
        assert_eq!(
            client.strip_envelope(good),
            Some(vec![Bytes::from_static(b"body")])
        );

        let wrong_service = vec![
            Bytes::new(),
            Bytes::from_static(b"MDPC01"),
            Bytes::from_static(b"other"),
        ];
        assert!(client.strip_envelope(wrong_service).is_none());

        let no_delimiter = vec![
            Bytes::from_static(b"MDPC01"),
            Bytes::from_static(b"echo"),
        ];
        assert!(client.strip_envelope(no_delimiter).is_none());

        inproc::unbind("inproc://client-envelope-test").unwrap();
    }
}
