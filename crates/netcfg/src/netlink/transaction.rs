//! The netlink transaction engine.
//!
//! Two exchange shapes ride on the shared channel:
//!
//! - a single-reply exchange ([`talk`], [`talk_with`], [`talk_into`]):
//!   send one request, then receive until exactly one of {ack, error
//!   frame, receive failure} terminates the call, optionally delivering
//!   data frames to a caller-supplied sink before the ack;
//! - a dump exchange ([`dump_into`], [`dump_filtered`]): send a generic
//!   dump request and copy every surviving frame into a
//!   [`CaptureList`] until the end marker.
//!
//! Classification state is built fresh for every call, so per-call sinks
//! and filters never leak across exchanges. Frames whose sender port is
//! not 0 did not come from the kernel and are dropped without
//! terminating the wait.

use std::io;

use tracing::{debug, error, warn};

use super::builder::MessageBuilder;
use super::capture::CaptureList;
use super::channel::NetlinkContext;
use super::error::{Error, Result};
use super::message::{
    MessageIter, NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgError, NlMsgHdr,
};
use super::socket::NetlinkSocket;

/// Build a request expecting an ACK.
pub fn ack_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK)
}

/// Build a generic dump request for one address family (rtgenmsg).
pub fn dump_request(msg_type: u16, family: u8) -> MessageBuilder {
    let mut builder = MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_DUMP);
    builder.append_bytes(&[family, 0, 0, 0]);
    builder
}

/// Per-call classifier parameters for a dump exchange.
///
/// Both filters are optional; a failed check drops the frame and the
/// dump continues with the remaining frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct DumpFilter {
    /// Expected message type; mismatching frames are dropped.
    pub expect_type: Option<u16>,
    /// Minimum payload length per object type; undersized frames are
    /// dropped.
    pub min_payload: usize,
}

/// Send a request and wait for its ack or error.
///
/// The request should carry `NLM_F_ACK` (see [`ack_request`]); the
/// receive loop runs until the ack or an error frame arrives.
pub async fn talk(ctx: &NetlinkContext, request: MessageBuilder) -> Result<()> {
    talk_with(ctx, request, |_, _| {}).await
}

/// Like [`talk`], but data frames matching the request's sequence number
/// are handed to `sink` before the ack arrives.
pub async fn talk_with(
    ctx: &NetlinkContext,
    mut request: MessageBuilder,
    mut sink: impl FnMut(&NlMsgHdr, &[u8]),
) -> Result<()> {
    let socket = ctx.channel()?.socket();
    let seq = socket.next_seq();
    request.set_seq(seq);
    request.set_pid(socket.pid());
    socket.send(&request.finish()).await?;

    let mut exchange = Exchange::new(seq);
    while !exchange.acked() {
        let (data, sender) = recv_retry(socket).await?;
        exchange.absorb(&data, sender, &mut sink)?;
    }
    Ok(())
}

/// Like [`talk`], but captured reply frames are stored in `list`.
pub async fn talk_into(
    ctx: &NetlinkContext,
    request: MessageBuilder,
    list: &mut CaptureList,
) -> Result<()> {
    let mut append_err = None;
    let result = talk_with(ctx, request, |header, payload| {
        if append_err.is_none() {
            let mut frame = header.as_bytes().to_vec();
            frame.extend_from_slice(payload);
            if let Err(e) = list.append(&frame) {
                append_err = Some(e);
            }
        }
    })
    .await;
    match append_err {
        Some(e) => Err(e),
        None => result,
    }
}

/// Issue a dump request for `family`/`msg_type` and store every reply
/// frame in `list`.
pub async fn dump_into(
    ctx: &NetlinkContext,
    family: u8,
    msg_type: u16,
    list: &mut CaptureList,
) -> Result<()> {
    dump_filtered(ctx, family, msg_type, DumpFilter::default(), list).await
}

/// [`dump_into`] with per-call classification.
///
/// On error the list keeps whatever was captured before the failure;
/// discarding or inspecting it is the caller's choice. In particular
/// [`Error::DumpInterrupted`] is surfaced rather than retried so a
/// partial result never masquerades as a complete one.
pub async fn dump_filtered(
    ctx: &NetlinkContext,
    family: u8,
    msg_type: u16,
    filter: DumpFilter,
    list: &mut CaptureList,
) -> Result<()> {
    let socket = ctx.channel()?.socket();
    let seq = socket.next_seq();
    let mut request = dump_request(msg_type, family);
    request.set_seq(seq);
    request.set_pid(socket.pid());
    socket.send(&request.finish()).await?;

    let mut collector = DumpCollector { seq, filter, list };
    loop {
        let (data, sender) = recv_retry(socket).await?;
        if collector.absorb(&data, sender)? {
            return Ok(());
        }
    }
}

/// Receive one datagram, silently retrying the transient "try again"
/// condition. Anything else propagates to the caller.
async fn recv_retry(socket: &NetlinkSocket) -> Result<(Vec<u8>, u32)> {
    loop {
        match socket.recv_from().await {
            Err(Error::Io(e)) if e.kind() == io::ErrorKind::Interrupted => {
                debug!("netlink receive interrupted, retrying");
            }
            other => return other,
        }
    }
}

/// Classification state for one single-reply exchange.
struct Exchange {
    seq: u32,
    acked: bool,
}

impl Exchange {
    fn new(seq: u32) -> Self {
        Self { seq, acked: false }
    }

    fn acked(&self) -> bool {
        self.acked
    }

    /// Classify one received datagram.
    ///
    /// Terminates the exchange by setting the acked flag (ack frame) or
    /// by returning the kernel's signed error code (error frame). Data
    /// frames matching the sequence go to `sink`; everything else is
    /// dropped.
    fn absorb(
        &mut self,
        data: &[u8],
        sender_pid: u32,
        sink: &mut impl FnMut(&NlMsgHdr, &[u8]),
    ) -> Result<()> {
        if sender_pid != 0 {
            warn!(sender_pid, "netlink message from non-kernel sender, ignoring");
            return Ok(());
        }

        for result in MessageIter::new(data) {
            let (header, payload) = result?;

            if header.nlmsg_seq != self.seq {
                continue;
            }

            if header.is_error() {
                let err = NlMsgError::from_bytes(payload)?;
                if err.is_ack() {
                    self.acked = true;
                    return Ok(());
                }
                debug!(code = err.error, "netlink reports error");
                return Err(Error::from_errno(err.error));
            }

            if header.is_done() {
                continue;
            }

            sink(header, payload);
        }

        Ok(())
    }
}

/// Classification state for one dump exchange.
struct DumpCollector<'a> {
    seq: u32,
    filter: DumpFilter,
    list: &'a mut CaptureList,
}

impl DumpCollector<'_> {
    /// Classify one received datagram; `Ok(true)` once the end marker
    /// has been seen.
    fn absorb(&mut self, data: &[u8], sender_pid: u32) -> Result<bool> {
        if sender_pid != 0 {
            warn!(sender_pid, "netlink message from non-kernel sender, ignoring");
            return Ok(false);
        }

        for result in MessageIter::new(data) {
            let (header, payload) = result?;

            if header.is_dump_interrupted() {
                // Not retried here: the caller decides whether to
                // re-issue the whole dump.
                debug!("kernel interrupted the dump mid-stream");
                return Err(Error::DumpInterrupted);
            }

            if header.nlmsg_seq != self.seq {
                continue;
            }

            if header.is_done() {
                return Ok(true);
            }

            if header.is_error() {
                let err = NlMsgError::from_bytes(payload)?;
                if err.is_ack() {
                    return Ok(true);
                }
                return Err(Error::from_errno(err.error));
            }

            if payload.len() < self.filter.min_payload {
                error!(
                    len = payload.len(),
                    min = self.filter.min_payload,
                    "netlink message too short"
                );
                continue;
            }

            if let Some(expect) = self.filter.expect_type
                && header.nlmsg_type != expect
            {
                error!(
                    got = header.nlmsg_type,
                    expected = expect,
                    "netlink message has unexpected type"
                );
                continue;
            }

            // Recover the full frame (header + payload) within the
            // datagram for a byte-exact copy.
            let msg_len = header.nlmsg_len as usize;
            let msg_start =
                payload.as_ptr() as usize - data.as_ptr() as usize - NLMSG_HDRLEN;
            if msg_start + msg_len <= data.len() {
                self.list.append(&data[msg_start..msg_start + msg_len])?;
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::message::{NLM_F_DUMP_INTR, NLM_F_MULTI, NlMsgType, nlmsg_align};
    use zerocopy::IntoBytes as _;

    fn frame(msg_type: u16, flags: u16, seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut hdr = NlMsgHdr::new(msg_type, flags);
        hdr.nlmsg_seq = seq;
        hdr.nlmsg_len = (NLMSG_HDRLEN + payload.len()) as u32;
        let mut buf = hdr.as_bytes().to_vec();
        buf.extend_from_slice(payload);
        buf.resize(nlmsg_align(buf.len()), 0);
        buf
    }

    fn error_frame(seq: u32, code: i32) -> Vec<u8> {
        let mut payload = code.as_bytes().to_vec();
        payload.extend_from_slice(NlMsgHdr::new(NlMsgType::RTM_GETLINK, 0).as_bytes());
        frame(NlMsgType::ERROR, 0, seq, &payload)
    }

    fn done_frame(seq: u32) -> Vec<u8> {
        frame(NlMsgType::DONE, NLM_F_MULTI, seq, 0i32.as_bytes())
    }

    #[test]
    fn test_exchange_ack_terminates_cleanly() {
        let mut exchange = Exchange::new(1);
        exchange
            .absorb(&error_frame(1, 0), 0, &mut |_, _| {})
            .unwrap();
        assert!(exchange.acked());
    }

    #[test]
    fn test_exchange_error_frame_returns_code() {
        let mut exchange = Exchange::new(1);
        let err = exchange
            .absorb(&error_frame(1, -libc::EACCES), 0, &mut |_, _| {})
            .unwrap_err();
        assert_eq!(err.errno(), Some(libc::EACCES));
        assert!(!exchange.acked());
    }

    #[test]
    fn test_exchange_spoofed_sender_does_not_terminate() {
        let mut exchange = Exchange::new(1);

        // A spoofed error frame must neither ack nor fail the exchange.
        exchange
            .absorb(&error_frame(1, -libc::EPERM), 4711, &mut |_, _| {})
            .unwrap();
        assert!(!exchange.acked());

        exchange
            .absorb(&error_frame(1, 0), 0, &mut |_, _| {})
            .unwrap();
        assert!(exchange.acked());
    }

    #[test]
    fn test_exchange_delivers_data_before_ack() {
        let mut exchange = Exchange::new(5);
        let mut seen = Vec::new();

        let mut datagram = frame(NlMsgType::RTM_NEWLINK, NLM_F_MULTI, 5, &[1, 2, 3, 4]);
        datagram.extend_from_slice(&frame(NlMsgType::RTM_NEWLINK, NLM_F_MULTI, 99, &[9; 4]));
        exchange
            .absorb(&datagram, 0, &mut |hdr, payload| {
                seen.push((hdr.nlmsg_seq, payload.to_vec()));
            })
            .unwrap();
        exchange
            .absorb(&error_frame(5, 0), 0, &mut |hdr, payload| {
                seen.push((hdr.nlmsg_seq, payload.to_vec()));
            })
            .unwrap();

        assert!(exchange.acked());
        // The foreign-sequence frame was dropped; the ack was not a
        // data frame.
        assert_eq!(seen, vec![(5, vec![1, 2, 3, 4])]);
    }

    #[test]
    fn test_dump_classifier_drops_invalid_frames() {
        let mut list = CaptureList::new();
        let filter = DumpFilter {
            expect_type: Some(NlMsgType::RTM_NEWLINK),
            min_payload: 8,
        };
        let mut collector = DumpCollector {
            seq: 3,
            filter,
            list: &mut list,
        };

        let valid = frame(NlMsgType::RTM_NEWLINK, NLM_F_MULTI, 3, &[7; 16]);
        assert!(!collector.absorb(&valid, 0).unwrap());

        // Spoofed sender: whole datagram dropped.
        let spoofed = frame(NlMsgType::RTM_NEWLINK, NLM_F_MULTI, 3, &[8; 16]);
        assert!(!collector.absorb(&spoofed, 1234).unwrap());

        // Undersized payload.
        let short = frame(NlMsgType::RTM_NEWLINK, NLM_F_MULTI, 3, &[9; 4]);
        assert!(!collector.absorb(&short, 0).unwrap());

        // Unexpected type.
        let wrong = frame(NlMsgType::RTM_NEWADDR, NLM_F_MULTI, 3, &[10; 16]);
        assert!(!collector.absorb(&wrong, 0).unwrap());

        assert!(collector.absorb(&done_frame(3), 0).unwrap());
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().next().unwrap().payload(), &[7; 16]);
    }

    #[test]
    fn test_dump_interrupted_surfaced_with_partial_list() {
        let mut list = CaptureList::new();
        let mut collector = DumpCollector {
            seq: 3,
            filter: DumpFilter::default(),
            list: &mut list,
        };

        let valid = frame(NlMsgType::RTM_NEWLINK, NLM_F_MULTI, 3, &[7; 16]);
        assert!(!collector.absorb(&valid, 0).unwrap());

        let interrupted = frame(
            NlMsgType::RTM_NEWLINK,
            NLM_F_MULTI | NLM_F_DUMP_INTR,
            3,
            &[8; 16],
        );
        let err = collector.absorb(&interrupted, 0).unwrap_err();
        assert!(matches!(err, Error::DumpInterrupted));

        // The partial capture stays inspectable.
        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().next().unwrap().payload(), &[7; 16]);
    }

    #[test]
    fn test_dump_error_frame_terminates_with_code() {
        let mut list = CaptureList::new();
        let mut collector = DumpCollector {
            seq: 2,
            filter: DumpFilter::default(),
            list: &mut list,
        };
        let err = collector
            .absorb(&error_frame(2, -libc::ENODEV), 0)
            .unwrap_err();
        assert_eq!(err.errno(), Some(libc::ENODEV));
    }

    #[tokio::test]
    async fn test_dump_without_channel_fails_early() {
        let ctx = NetlinkContext::new();
        let mut list = CaptureList::new();
        let err = dump_into(&ctx, libc::AF_UNSPEC as u8, NlMsgType::RTM_GETLINK, &mut list)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoChannel));
        assert!(list.is_empty());
    }

    #[tokio::test]
    async fn test_talk_without_channel_fails_early() {
        let ctx = NetlinkContext::new();
        let err = talk(&ctx, ack_request(NlMsgType::RTM_SETLINK))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoChannel));
    }

    #[test]
    fn test_dump_request_shape() {
        let mut request = dump_request(NlMsgType::RTM_GETLINK, libc::AF_INET as u8);
        request.set_seq(11);
        let msg = request.finish();
        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_type, NlMsgType::RTM_GETLINK);
        assert_eq!(header.nlmsg_flags & NLM_F_DUMP, NLM_F_DUMP);
        assert_eq!(msg[NLMSG_HDRLEN], libc::AF_INET as u8);
    }
}
