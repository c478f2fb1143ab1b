//! Message capture list: owned, insertion-ordered copies of received
//! frames.

use super::attr::AttrIter;
use super::error::{Error, Result};
use super::message::{NLMSG_HDRLEN, NlMsgHdr};

/// One captured netlink frame: a byte-exact owned copy, header included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedFrame {
    data: Vec<u8>,
}

impl CapturedFrame {
    /// The frame header.
    pub fn header(&self) -> &NlMsgHdr {
        // The constructor guarantees at least NLMSG_HDRLEN bytes.
        NlMsgHdr::from_bytes(&self.data).unwrap()
    }

    /// The payload past the header.
    pub fn payload(&self) -> &[u8] {
        &self.data[NLMSG_HDRLEN..]
    }

    /// The whole frame, header included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Iterate the attributes following a fixed-size type header of
    /// `hdrlen` bytes within the payload.
    pub fn attrs_after(&self, hdrlen: usize) -> AttrIter<'_> {
        let payload = self.payload();
        if payload.len() > hdrlen {
            AttrIter::new(&payload[hdrlen..])
        } else {
            AttrIter::new(&[])
        }
    }
}

/// Append-only ordered sequence of captured frames.
///
/// The list owns every entry and frees them all when dropped. Appends
/// never disturb prior entries.
#[derive(Debug, Default)]
pub struct CaptureList {
    frames: Vec<CapturedFrame>,
}

impl CaptureList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy one frame into the list.
    ///
    /// Storage is sized to the frame's declared length (`nlmsg_len`);
    /// trailing alignment padding in the source buffer is not copied. A
    /// source shorter than its declared length fails with
    /// [`Error::Truncated`] and leaves the list unmodified.
    pub fn append(&mut self, frame: &[u8]) -> Result<&CapturedFrame> {
        let header = NlMsgHdr::from_bytes(frame)?;
        let len = header.nlmsg_len as usize;
        if len < NLMSG_HDRLEN || len > frame.len() {
            return Err(Error::Truncated {
                expected: len,
                actual: frame.len(),
            });
        }

        self.frames.push(CapturedFrame {
            data: frame[..len].to_vec(),
        });
        Ok(self.frames.last().unwrap())
    }

    /// Number of captured frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Iterate the frames in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, CapturedFrame> {
        self.frames.iter()
    }

    /// Drop all captured frames, keeping the list reusable.
    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

impl<'a> IntoIterator for &'a CaptureList {
    type Item = &'a CapturedFrame;
    type IntoIter = std::slice::Iter<'a, CapturedFrame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}
