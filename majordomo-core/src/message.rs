//! Message builder for ergonomic multipart message construction.
//!
//! MDP messages are ordered lists of opaque byte frames. This module provides
//! the `Multipart` alias used throughout the crate and a fluent builder for
//! assembling outbound frame lists.

use bytes::Bytes;
use std::io;

/// A multipart message: an ordered list of opaque byte frames.
pub type Multipart = Vec<Bytes>;

/// A multipart message builder with ergonomic frame construction.
///
/// # Examples
///
/// ```
/// use majordomo_core::message::Message;
///
/// // ROUTER envelope: [identity] [empty] [body]
/// let msg = Message::new()
///     .push(b"worker-1".as_slice())
///     .push_empty()
///     .push_str("MDPW01")
///     .into_frames();
/// assert_eq!(msg.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Message {
    frames: Multipart,
}

impl Message {
    /// Create a new empty message.
    #[must_use]
    pub const fn new() -> Self {
        Self { frames: Vec::new() }
    }

    /// Create a message from existing frames.
    #[must_use]
    pub const fn from_frames(frames: Multipart) -> Self {
        Self { frames }
    }

    /// Add a frame from any type that can be converted to `Bytes`.
    #[must_use]
    pub fn push(mut self, frame: impl Into<Bytes>) -> Self {
        self.frames.push(frame.into());
        self
    }

    /// Add a string frame (UTF-8 encoded).
    #[must_use]
    pub fn push_str(mut self, s: &str) -> Self {
        self.frames.push(Bytes::copy_from_slice(s.as_bytes()));
        self
    }

    /// Add an empty frame (the envelope delimiter).
    #[must_use]
    pub fn push_empty(mut self) -> Self {
        self.frames.push(Bytes::new());
        self
    }

    /// Add every frame of an existing list.
    #[must_use]
    pub fn push_all(mut self, frames: impl IntoIterator<Item = Bytes>) -> Self {
        self.frames.extend(frames);
        self
    }

    /// Get the number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Check if the message has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Get a reference to the frames.
    #[must_use]
    pub fn frames(&self) -> &[Bytes] {
        &self.frames
    }

    /// Consume the builder and return the frames.
    #[must_use]
    pub fn into_frames(self) -> Multipart {
        self.frames
    }

    /// Try to parse a frame as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame doesn't exist or isn't valid UTF-8.
    pub fn parse_frame_str(&self, index: usize) -> io::Result<&str> {
        let frame = self
            .frames
            .get(index)
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "Frame index out of bounds"))?;

        std::str::from_utf8(frame).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

impl From<Multipart> for Message {
    fn from(frames: Multipart) -> Self {
        Self { frames }
    }
}

impl From<Message> for Multipart {
    fn from(msg: Message) -> Self {
        msg.frames
    }
}
