//! Routing-envelope handling.
//!
//! A router-style socket prepends one or more identity frames followed by an
//! empty delimiter to every message it delivers. The return path is echoed
//! back verbatim to reach the origin; it is never interpreted here.

use bytes::Bytes;
use smallvec::SmallVec;

use crate::message::Multipart;

/// Identity frames collected from the front of a message, delimiter excluded.
///
/// Return paths are almost always a single identity frame; intermediary
/// devices can add more.
pub type ReturnPath = SmallVec<[Bytes; 4]>;

/// Split a frame list into its return path and the remainder.
///
/// Non-empty frames are collected from the front until the first empty
/// delimiter frame; the remainder is everything strictly after it. A list
/// with no delimiter yields the whole list as return path and an empty
/// remainder, which callers treat as a malformed message and drop.
pub fn split_address(frames: Multipart) -> (ReturnPath, Multipart) {
    let mut path = ReturnPath::new();
    let mut iter = frames.into_iter();
    for frame in iter.by_ref() {
        if frame.is_empty() {
            break;
        }
        path.push(frame);
    }
    (path, iter.collect())
}

/// Printable hex form of a socket identity, for diagnostics.
pub fn wid_hex(wid: &[u8]) -> String {
    use std::fmt::Write;

    let mut out = String::with_capacity(wid.len() * 2);
    for b in wid {
        let _ = write!(out, "{b:02X}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames(parts: &[&'static [u8]]) -> Multipart {
        parts.iter().map(|p| Bytes::from_static(p)).collect()
    }

    #[test]
    fn test_single_identity() {
        let (path, rest) = split_address(frames(&[b"client-1", b"", b"MDPC01", b"echo"]));
        assert_eq!(path.as_slice(), &[Bytes::from_static(b"client-1")][..]);
        assert_eq!(rest, frames(&[b"MDPC01", b"echo"]));
    }

    #[test]
    fn test_multi_hop_path() {
        let (path, rest) = split_address(frames(&[b"hop-a", b"hop-b", b"", b"body"]));
        assert_eq!(path.len(), 2);
        assert_eq!(path[1], Bytes::from_static(b"hop-b"));
        assert_eq!(rest, frames(&[b"body"]));
    }

    #[test]
    fn test_leading_delimiter() {
        // A DEALER-originated message has no identity frames of its own.
        let (path, rest) = split_address(frames(&[b"", b"MDPW01", b"\x01", b"echo"]));
        assert!(path.is_empty());
        assert_eq!(rest.len(), 3);
    }

    #[test]
    fn test_missing_delimiter() {
        let (path, rest) = split_address(frames(&[b"only", b"identities"]));
        assert_eq!(path.len(), 2);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_empty_input() {
        let (path, rest) = split_address(Vec::new());
        assert!(path.is_empty());
        assert!(rest.is_empty());
    }

    #[test]
    fn test_wid_hex() {
        assert_eq!(wid_hex(&[0x00, 0x8a, 0xff]), "008AFF");
        assert_eq!(wid_hex(b""), "");
    }
}
