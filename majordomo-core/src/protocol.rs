//! MDP/0.1 wire protocol constants and command decoding.
//!
//! Protocol identifiers are matched on their four-byte prefix so minor
//! version bumps do not break dispatch. Worker command bytes are decoded at
//! the edge into [`WorkerCommand`]; handlers match on the variant.

use bytes::Bytes;

/// Protocol identifier sent by clients.
pub const CLIENT_PROTOCOL: &[u8] = b"MDPC01";
/// Protocol identifier sent by and to workers.
pub const WORKER_PROTOCOL: &[u8] = b"MDPW01";

const CLIENT_PREFIX: &[u8] = b"MDPC";
const WORKER_PREFIX: &[u8] = b"MDPW";

/// True for any client protocol revision.
#[inline]
pub fn is_client_protocol(proto: &[u8]) -> bool {
    proto.starts_with(CLIENT_PREFIX)
}

/// True for any worker protocol revision.
#[inline]
pub fn is_worker_protocol(proto: &[u8]) -> bool {
    proto.starts_with(WORKER_PREFIX)
}

/// The client protocol identifier as a frame.
#[inline]
pub fn client_protocol_frame() -> Bytes {
    Bytes::from_static(CLIENT_PROTOCOL)
}

/// The worker protocol identifier as a frame.
#[inline]
pub fn worker_protocol_frame() -> Bytes {
    Bytes::from_static(WORKER_PROTOCOL)
}

/// Worker-side MDP commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerCommand {
    Ready = 0x01,
    Request = 0x02,
    Reply = 0x03,
    Heartbeat = 0x04,
    Disconnect = 0x05,
}

impl WorkerCommand {
    /// Decode a command frame. Commands are exactly one byte; anything else
    /// is unknown and the message is dropped by the caller.
    pub fn decode(frame: &[u8]) -> Option<Self> {
        match frame {
            [0x01] => Some(Self::Ready),
            [0x02] => Some(Self::Request),
            [0x03] => Some(Self::Reply),
            [0x04] => Some(Self::Heartbeat),
            [0x05] => Some(Self::Disconnect),
            _ => None,
        }
    }

    /// The wire byte for this command.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }

    /// The single-byte command frame.
    #[must_use]
    pub fn to_frame(self) -> Bytes {
        match self {
            Self::Ready => Bytes::from_static(&[0x01]),
            Self::Request => Bytes::from_static(&[0x02]),
            Self::Reply => Bytes::from_static(&[0x03]),
            Self::Heartbeat => Bytes::from_static(&[0x04]),
            Self::Disconnect => Bytes::from_static(&[0x05]),
        }
    }
}
