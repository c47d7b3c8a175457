//! Flow update streams, the replies a switch sends to flow monitor requests.
//!
//! Each reply carries a packed sequence of records. Every record starts with a
//! `length`, `event` header; its length counts the header and is a multiple of 8.
//! Nicira (OpenFlow 1.0 to 1.2) and ONF (OpenFlow 1.3) replies share the Nicira record
//! layout and event codes, while OpenFlow 1.4+ replies use the standard layout, which
//! adds initial, paused and resumed events.

use std::convert::TryFrom;
use std::io::Cursor;
use std::mem;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::flow_removed::FlowRemovedReason;
use crate::ofp_actions::{pull_actions, pull_instructions, put_actions, put_instructions, Ofpact};
use crate::ofp_buf::{OfpBuf, OfpMsgCursor};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::{OfpHeader, OfpVersion};
use crate::ofp_protocol::Protocol;
use crate::ofp_raw::{set_stats_flags, stats_flags, OfpRaw, OFPSF_REPLY_MORE};
use crate::pattern::{Pattern, TunTable, TunTableSwap};
use crate::vlog::{RateLimitConfig, RateLimiter};

static RL: RateLimiter = RateLimiter::new(RateLimitConfig::DEFAULT);

/// Kind of flow update, with the OpenFlow 1.4 codes.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowUpdateEvent {
    /// Flow present when the monitor was installed.
    Initial = 0,
    Added = 1,
    Removed = 2,
    Modified = 3,
    /// Change made by the monitoring controller itself, reported by request xid.
    Abbrev = 4,
    /// Updates stopped because the switch's buffer filled up.
    Paused = 5,
    Resumed = 6,
}

const NXFME_ADDED: u16 = 0;
const NXFME_DELETED: u16 = 1;
const NXFME_MODIFIED: u16 = 2;
const NXFME_ABBREV: u16 = 3;

impl FlowUpdateEvent {
    pub fn of_wire(code: u16) -> Result<FlowUpdateEvent> {
        match code {
            0 => Ok(FlowUpdateEvent::Initial),
            1 => Ok(FlowUpdateEvent::Added),
            2 => Ok(FlowUpdateEvent::Removed),
            3 => Ok(FlowUpdateEvent::Modified),
            4 => Ok(FlowUpdateEvent::Abbrev),
            5 => Ok(FlowUpdateEvent::Paused),
            6 => Ok(FlowUpdateEvent::Resumed),
            c => Err(OfpError::BadEvent(c)),
        }
    }

    /// Return the Nicira event code for `self`.
    ///
    /// Nicira has no initial event, so initial flows are reported as added. Paused and
    /// resumed are separate Nicira messages, not records; asking for their record code
    /// is a bug in the caller.
    pub fn to_nx(self) -> u16 {
        match self {
            FlowUpdateEvent::Initial | FlowUpdateEvent::Added => NXFME_ADDED,
            FlowUpdateEvent::Removed => NXFME_DELETED,
            FlowUpdateEvent::Modified => NXFME_MODIFIED,
            FlowUpdateEvent::Abbrev => NXFME_ABBREV,
            FlowUpdateEvent::Paused | FlowUpdateEvent::Resumed => {
                panic!("{:?} has no Nicira flow update record", self)
            }
        }
    }

    /// Map a Nicira event code to an event. Never returns initial, paused or resumed.
    pub fn from_nx(code: u16) -> Result<FlowUpdateEvent> {
        match code {
            NXFME_ADDED => Ok(FlowUpdateEvent::Added),
            NXFME_DELETED => Ok(FlowUpdateEvent::Removed),
            NXFME_MODIFIED => Ok(FlowUpdateEvent::Modified),
            NXFME_ABBREV => Ok(FlowUpdateEvent::Abbrev),
            c => Err(OfpError::BadEvent(c)),
        }
    }
}

/// An update that describes the flow in full.
///
/// `ofpacts` borrows from the buffer the caller handed to `FlowUpdate::decode_next`
/// and is only valid until the next decode into that buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowUpdateFull<'a> {
    /// One of initial, added, removed or modified.
    pub event: FlowUpdateEvent,
    /// Meaningful for removed events only.
    pub reason: FlowRemovedReason,
    pub table_id: u8,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    pub cookie: u64,
    pub priority: u16,
    pub pattern: Pattern,
    pub ofpacts: &'a [Ofpact],
}

/// One record of a flow update stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowUpdate<'a> {
    Full(FlowUpdateFull<'a>),
    /// The change made by the request with transaction id `xid`.
    Abbrev { xid: u32 },
    /// OpenFlow 1.4+ only.
    Paused,
    /// OpenFlow 1.4+ only.
    Resumed,
}

const FLOW_UPDATE_HEADER_LEN: usize = 4;
const FLOW_UPDATE_FULL_LEN: usize = 24;
const FLOW_UPDATE_ABBREV_LEN: usize = 8;
const FLOW_UPDATE_PAUSED_LEN: usize = 8;

fn reply_raw(version: OfpVersion) -> OfpRaw {
    match version {
        OfpVersion::Of10 | OfpVersion::Of11 | OfpVersion::Of12 => OfpRaw::NxstFlowMonitorReply,
        OfpVersion::Of13 => OfpRaw::Onfst13FlowMonitorReply,
        OfpVersion::Of14 | OfpVersion::Of15 => OfpRaw::Ofpst14FlowMonitorReply,
    }
}

fn bad_len(raw: OfpRaw, left: usize) -> OfpError {
    warn_rl!(RL, "{:?} has {} leftover bytes at end", raw, left);
    OfpError::BadLen
}

fn bad_event(raw: OfpRaw, err: OfpError) -> OfpError {
    warn_rl!(RL, "{:?} has bad event: {}", raw, err);
    err
}

impl<'a> FlowUpdate<'a> {
    pub fn event(&self) -> FlowUpdateEvent {
        match *self {
            FlowUpdate::Full(ref full) => full.event,
            FlowUpdate::Abbrev { .. } => FlowUpdateEvent::Abbrev,
            FlowUpdate::Paused => FlowUpdateEvent::Paused,
            FlowUpdate::Resumed => FlowUpdateEvent::Resumed,
        }
    }

    /// Decode the next record of the flow monitor reply under `cursor`.
    ///
    /// `ofpacts` is cleared, then receives the actions of a full update, which the
    /// returned update borrows. Returns `Ok(None)` once every record has been consumed.
    pub fn decode_next(cursor: &mut OfpMsgCursor,
                       ofpacts: &'a mut Vec<Ofpact>)
                       -> Result<Option<FlowUpdate<'a>>> {
        let (raw, version) = cursor.recognize()?;
        ofpacts.clear();
        let nx = match raw {
            OfpRaw::NxstFlowMonitorReply | OfpRaw::Onfst13FlowMonitorReply => true,
            OfpRaw::Ofpst14FlowMonitorReply => false,
            raw => return Err(OfpError::UnexpectedMessage(raw)),
        };

        let body = cursor.body();
        if body.is_empty() {
            return Ok(None);
        }
        let data = body.data();
        if data.len() < FLOW_UPDATE_HEADER_LEN {
            return Err(bad_len(raw, data.len()));
        }
        let length = BigEndian::read_u16(&data[0..2]) as usize;
        let code = BigEndian::read_u16(&data[2..4]);
        if length > data.len() || length % 8 != 0 {
            return Err(bad_len(raw, data.len()));
        }
        let event = if nx {
            FlowUpdateEvent::from_nx(code)
        } else {
            FlowUpdateEvent::of_wire(code)
        }
        .map_err(|e| bad_event(raw, e))?;

        let fixed_len = match event {
            FlowUpdateEvent::Abbrev => FLOW_UPDATE_ABBREV_LEN,
            FlowUpdateEvent::Paused | FlowUpdateEvent::Resumed => FLOW_UPDATE_PAUSED_LEN,
            _ => FLOW_UPDATE_FULL_LEN,
        };
        let fixed_ok = match event {
            FlowUpdateEvent::Abbrev | FlowUpdateEvent::Paused | FlowUpdateEvent::Resumed => {
                length == fixed_len
            }
            _ => length >= fixed_len,
        };
        if !fixed_ok {
            return Err(bad_len(raw, data.len()));
        }

        let mut record = OfpBuf::new(body.pull(length)?);
        let mut bytes = Cursor::new(record.pull(fixed_len)?);
        bytes.set_position(FLOW_UPDATE_HEADER_LEN as u64);
        let update = match event {
            FlowUpdateEvent::Abbrev => FlowUpdate::Abbrev { xid: bytes.read_u32::<BigEndian>()? },
            FlowUpdateEvent::Paused => FlowUpdate::Paused,
            FlowUpdateEvent::Resumed => FlowUpdate::Resumed,
            _ if nx => {
                let reason = bytes.read_u16::<BigEndian>()?;
                let priority = bytes.read_u16::<BigEndian>()?;
                let idle_timeout = bytes.read_u16::<BigEndian>()?;
                let hard_timeout = bytes.read_u16::<BigEndian>()?;
                let match_len = bytes.read_u16::<BigEndian>()? as usize;
                let table_id = bytes.read_u8()?;
                bytes.read_u8()?;
                let cookie = bytes.read_u64::<BigEndian>()?;
                if FLOW_UPDATE_FULL_LEN + match_len > length {
                    return Err(bad_len(raw, data.len()));
                }
                let reason = match u8::try_from(reason) {
                    Ok(reason) => reason,
                    Err(_) => {
                        warn_rl!(RL, "{:?} has bad reason {:#x}", raw, reason);
                        return Err(OfpError::BadLen);
                    }
                };

                let pattern = if raw == OfpRaw::Onfst13FlowMonitorReply {
                    let (pattern, _) = Pattern::pull_oxm(&mut record)?;
                    let instructions_len = record.len();
                    pull_instructions(&mut record, instructions_len, version, ofpacts)?;
                    pattern
                } else {
                    let pattern = Pattern::pull_nxm(&mut record, match_len)?;
                    let actions_len = record.len();
                    pull_actions(&mut record, actions_len, version, ofpacts)?;
                    pattern
                };
                let ofpacts: &'a [Ofpact] = ofpacts;
                FlowUpdate::Full(FlowUpdateFull {
                    event,
                    reason: FlowRemovedReason::of_wire(reason),
                    table_id,
                    idle_timeout,
                    hard_timeout,
                    cookie,
                    priority,
                    pattern,
                    ofpacts,
                })
            }
            _ => {
                let table_id = bytes.read_u8()?;
                let reason = bytes.read_u8()?;
                let idle_timeout = bytes.read_u16::<BigEndian>()?;
                let hard_timeout = bytes.read_u16::<BigEndian>()?;
                let priority = bytes.read_u16::<BigEndian>()?;
                bytes.read_u32::<BigEndian>()?;
                let cookie = bytes.read_u64::<BigEndian>()?;

                let (pattern, _) = Pattern::pull_oxm(&mut record)?;
                let instructions_len = record.len();
                pull_instructions(&mut record, instructions_len, version, ofpacts)?;
                let ofpacts: &'a [Ofpact] = ofpacts;
                FlowUpdate::Full(FlowUpdateFull {
                    event,
                    reason: FlowRemovedReason::of_wire(reason),
                    table_id,
                    idle_timeout,
                    hard_timeout,
                    cookie,
                    priority,
                    pattern,
                    ofpacts,
                })
            }
        };
        Ok(Some(update))
    }
}

/// Builds the flow monitor replies for a stream of updates.
///
/// Records go into the last reply. A reply that would exceed the 64 kB OpenFlow message
/// limit is closed with the "more" flag and the record moves into a new reply.
#[derive(Debug)]
pub struct FlowUpdateStream {
    version: OfpVersion,
    raw: OfpRaw,
    done: Vec<Vec<u8>>,
    tail: Vec<u8>,
}

impl FlowUpdateStream {
    /// Start a stream of flow monitor replies for `protocol`.
    pub fn start(protocol: Protocol) -> Result<FlowUpdateStream> {
        let version = protocol.version();
        let raw = reply_raw(version);
        Ok(FlowUpdateStream {
            version,
            raw,
            done: vec![],
            tail: raw.alloc(version, 0)?,
        })
    }

    /// Append `update` to the stream.
    ///
    /// The pattern of a full update is encoded with `tun_table` as its tunnel metadata
    /// layout; its own table is restored afterwards. On error the stream is left as it
    /// was before the call.
    ///
    /// # Panics
    ///
    /// Panics on a paused or resumed record before OpenFlow 1.4, and on a full update
    /// whose event is not initial, added, removed or modified.
    pub fn append(&mut self,
                  update: &mut FlowUpdate,
                  tun_table: Option<&Arc<TunTable>>)
                  -> Result<()> {
        let start = self.tail.len();
        let put = put_record(&mut self.tail, self.version, update, tun_table);
        if let Err(e) = put {
            self.tail.truncate(start);
            return Err(e);
        }
        let record_len = self.tail.len() - start;
        let header_len = self.raw.header_size(self.version);
        if header_len + record_len > u16::MAX as usize {
            // Too big even for a message of its own.
            self.tail.truncate(start);
            return Err(OfpError::BadLen);
        }
        BigEndian::write_u16(&mut self.tail[start..start + 2], record_len as u16);

        if self.tail.len() > u16::MAX as usize {
            let mut next = Vec::with_capacity(header_len + record_len);
            next.extend_from_slice(&self.tail[..header_len]);
            next.extend_from_slice(&self.tail[start..]);
            self.tail.truncate(start);
            let flags = stats_flags(&self.tail);
            set_stats_flags(&mut self.tail, flags | OFPSF_REPLY_MORE);
            OfpHeader::update_length(&mut self.tail);
            self.done.push(mem::replace(&mut self.tail, next));
        }
        OfpHeader::update_length(&mut self.tail);
        Ok(())
    }

    /// The replies built so far, in order.
    pub fn messages(&self) -> impl Iterator<Item = &[u8]> {
        self.done.iter().map(|m| &m[..]).chain(Some(&self.tail[..]))
    }

    pub fn into_messages(mut self) -> Vec<Vec<u8>> {
        self.done.push(self.tail);
        self.done
    }
}

/// Append one record to `out`. The record length is left for the caller to fill in.
fn put_record(out: &mut Vec<u8>,
              version: OfpVersion,
              update: &mut FlowUpdate,
              tun_table: Option<&Arc<TunTable>>)
              -> Result<()> {
    let start = out.len();
    let event = update.event();
    match *update {
        FlowUpdate::Abbrev { xid } => {
            out.resize(start + FLOW_UPDATE_HEADER_LEN, 0);
            out.write_u32::<BigEndian>(xid)?;
        }
        FlowUpdate::Paused | FlowUpdate::Resumed => {
            if version < OfpVersion::Of14 {
                panic!("{:?} record needs OpenFlow 1.4 or later", event);
            }
            out.resize(start + FLOW_UPDATE_PAUSED_LEN, 0);
        }
        FlowUpdate::Full(ref mut full) => {
            match full.event {
                FlowUpdateEvent::Initial | FlowUpdateEvent::Added | FlowUpdateEvent::Removed |
                FlowUpdateEvent::Modified => (),
                e => panic!("full flow update with {:?} event", e),
            }
            out.resize(start + FLOW_UPDATE_FULL_LEN, 0);
            let pattern = TunTableSwap::new(&mut full.pattern, tun_table.cloned());
            if version >= OfpVersion::Of14 {
                pattern.put_oxm(out)?;
                put_instructions(full.ofpacts, out, version)?;
                let fixed = &mut out[start..start + FLOW_UPDATE_FULL_LEN];
                fixed[4] = full.table_id;
                fixed[5] = full.reason.wire();
                BigEndian::write_u16(&mut fixed[6..8], full.idle_timeout);
                BigEndian::write_u16(&mut fixed[8..10], full.hard_timeout);
                BigEndian::write_u16(&mut fixed[10..12], full.priority);
                BigEndian::write_u64(&mut fixed[16..24], full.cookie);
            } else {
                let match_len = if version == OfpVersion::Of13 {
                    let match_len = pattern.put_oxm(out)?;
                    put_instructions(full.ofpacts, out, version)?;
                    match_len
                } else {
                    let match_len = pattern.put_nxm(out)?;
                    put_actions(full.ofpacts, out, version)?;
                    match_len
                };
                let fixed = &mut out[start..start + FLOW_UPDATE_FULL_LEN];
                BigEndian::write_u16(&mut fixed[4..6], full.reason.wire() as u16);
                BigEndian::write_u16(&mut fixed[6..8], full.priority);
                BigEndian::write_u16(&mut fixed[8..10], full.idle_timeout);
                BigEndian::write_u16(&mut fixed[10..12], full.hard_timeout);
                BigEndian::write_u16(&mut fixed[12..14], match_len as u16);
                fixed[14] = full.table_id;
                BigEndian::write_u64(&mut fixed[16..24], full.cookie);
            }
        }
    }

    let code = if version >= OfpVersion::Of14 {
        event as u16
    } else {
        event.to_nx()
    };
    BigEndian::write_u16(&mut out[start + 2..start + 4], code);
    Ok(())
}

/// Encode the message that tells a controller its flow updates were paused or resumed.
///
/// # Panics
///
/// Panics if `event` is neither paused nor resumed.
pub fn encode_flow_monitor_pause(event: FlowUpdateEvent, protocol: Protocol) -> Result<Vec<u8>> {
    let paused = match event {
        FlowUpdateEvent::Paused => true,
        FlowUpdateEvent::Resumed => false,
        e => panic!("{:?} is not a pause event", e),
    };
    let version = protocol.version();
    let raw = match version {
        OfpVersion::Of10 | OfpVersion::Of11 | OfpVersion::Of12 if paused => {
            OfpRaw::NxtFlowMonitorPaused
        }
        OfpVersion::Of10 | OfpVersion::Of11 | OfpVersion::Of12 => OfpRaw::NxtFlowMonitorResumed,
        OfpVersion::Of13 if paused => OfpRaw::Onft13FlowMonitorPaused,
        OfpVersion::Of13 => OfpRaw::Onft13FlowMonitorResumed,
        OfpVersion::Of14 | OfpVersion::Of15 => {
            let mut msg = OfpRaw::Ofpst14FlowMonitorReply.alloc(version, 0)?;
            msg.write_u16::<BigEndian>(FLOW_UPDATE_PAUSED_LEN as u16)?;
            msg.write_u16::<BigEndian>(event as u16)?;
            msg.write_u32::<BigEndian>(0)?;
            OfpHeader::update_length(&mut msg);
            return Ok(msg);
        }
    };
    raw.alloc(version, 0)
}

/// Decode a paused or resumed notification, in any of the forms
/// `encode_flow_monitor_pause` produces.
pub fn decode_flow_monitor_pause(msg: &[u8]) -> Result<FlowUpdateEvent> {
    let mut cursor = OfpMsgCursor::new(msg);
    let event = match cursor.recognize()?.0 {
        OfpRaw::NxtFlowMonitorPaused | OfpRaw::Onft13FlowMonitorPaused => FlowUpdateEvent::Paused,
        OfpRaw::NxtFlowMonitorResumed | OfpRaw::Onft13FlowMonitorResumed => {
            FlowUpdateEvent::Resumed
        }
        OfpRaw::Ofpst14FlowMonitorReply => {
            let mut ofpacts = vec![];
            match FlowUpdate::decode_next(&mut cursor, &mut ofpacts)? {
                Some(FlowUpdate::Paused) => FlowUpdateEvent::Paused,
                Some(FlowUpdate::Resumed) => FlowUpdateEvent::Resumed,
                Some(u) => return Err(OfpError::BadEvent(u.event() as u16)),
                None => return Err(OfpError::BadLen),
            }
        }
        raw => return Err(OfpError::UnexpectedMessage(raw)),
    };
    if !cursor.body().is_empty() {
        return Err(OfpError::BadLen);
    }
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{Ipv4Prefix, TunMetadata};

    fn full<'a>(event: FlowUpdateEvent, ofpacts: &'a [Ofpact]) -> FlowUpdate<'a> {
        FlowUpdate::Full(FlowUpdateFull {
            event,
            reason: FlowRemovedReason::IdleTimeout,
            table_id: 1,
            idle_timeout: 60,
            hard_timeout: 0,
            cookie: 0xc00c1e,
            priority: 0x8000,
            pattern: Pattern {
                dl_type: Some(0x0800),
                nw_src: Some(Ipv4Prefix::exact(0x0a00_0001)),
                ..Pattern::match_all()
            },
            ofpacts,
        })
    }

    fn output() -> Vec<Ofpact> {
        vec![Ofpact::Output {
                 port: 2,
                 max_len: 0,
             }]
    }

    fn decode_all(msg: &[u8]) -> Result<Vec<(FlowUpdateEvent, Vec<Ofpact>)>> {
        let mut cursor = OfpMsgCursor::new(msg);
        let mut ofpacts = vec![];
        let mut out = vec![];
        loop {
            match FlowUpdate::decode_next(&mut cursor, &mut ofpacts)? {
                Some(FlowUpdate::Full(f)) => out.push((f.event, f.ofpacts.to_vec())),
                Some(u) => out.push((u.event(), vec![])),
                None => return Ok(out),
            }
        }
    }

    #[test]
    fn event_translation() {
        assert_eq!(FlowUpdateEvent::Initial.to_nx(), NXFME_ADDED);
        assert_eq!(FlowUpdateEvent::Removed.to_nx(), NXFME_DELETED);
        assert_eq!(FlowUpdateEvent::from_nx(NXFME_ABBREV), Ok(FlowUpdateEvent::Abbrev));
        assert_eq!(FlowUpdateEvent::from_nx(4), Err(OfpError::BadEvent(4)));
        assert_eq!(FlowUpdateEvent::of_wire(6), Ok(FlowUpdateEvent::Resumed));
        assert_eq!(FlowUpdateEvent::of_wire(7), Err(OfpError::BadEvent(7)));
    }

    #[test]
    #[should_panic]
    fn paused_has_no_nx_code() {
        FlowUpdateEvent::Paused.to_nx();
    }

    #[test]
    fn full_update_roundtrip_every_dialect() {
        let acts = output();
        for &p in Protocol::ALL.iter() {
            let mut stream = FlowUpdateStream::start(p).unwrap();
            let mut update = full(FlowUpdateEvent::Modified, &acts);
            stream.append(&mut update, None).unwrap();
            let msgs = stream.into_messages();
            assert_eq!(msgs.len(), 1);

            let mut cursor = OfpMsgCursor::new(&msgs[0]);
            let mut ofpacts = vec![];
            let decoded = FlowUpdate::decode_next(&mut cursor, &mut ofpacts).unwrap();
            assert_eq!(decoded, Some(update), "{:?}", p);
            assert!(FlowUpdate::decode_next(&mut cursor, &mut ofpacts).unwrap().is_none());
        }
    }

    #[test]
    fn initial_becomes_added_before_of14() {
        let acts = output();
        for &(p, expect) in [(Protocol::Of13Oxm, FlowUpdateEvent::Added),
                             (Protocol::Of14Oxm, FlowUpdateEvent::Initial)]
            .iter() {
            let mut stream = FlowUpdateStream::start(p).unwrap();
            stream.append(&mut full(FlowUpdateEvent::Initial, &acts), None).unwrap();
            let msgs = stream.into_messages();
            assert_eq!(decode_all(&msgs[0]).unwrap()[0].0, expect);
        }
    }

    #[test]
    fn mixed_records() {
        let acts = output();
        let mut stream = FlowUpdateStream::start(Protocol::Of14Oxm).unwrap();
        stream.append(&mut full(FlowUpdateEvent::Added, &acts), None).unwrap();
        stream.append(&mut FlowUpdate::Abbrev { xid: 99 }, None).unwrap();
        stream.append(&mut FlowUpdate::Paused, None).unwrap();
        stream.append(&mut full(FlowUpdateEvent::Removed, &[]), None).unwrap();
        stream.append(&mut FlowUpdate::Resumed, None).unwrap();
        let msgs = stream.into_messages();
        assert_eq!(decode_all(&msgs[0]).unwrap(),
                   vec![(FlowUpdateEvent::Added, acts.clone()),
                        (FlowUpdateEvent::Abbrev, vec![]),
                        (FlowUpdateEvent::Paused, vec![]),
                        (FlowUpdateEvent::Removed, vec![]),
                        (FlowUpdateEvent::Resumed, vec![])]);
    }

    #[test]
    fn abbrev_carries_xid() {
        let mut stream = FlowUpdateStream::start(Protocol::Of10Nxm).unwrap();
        stream.append(&mut FlowUpdate::Abbrev { xid: 0x5555 }, None).unwrap();
        let msg = stream.messages().next().unwrap().to_vec();
        assert_eq!(msg.len(), 24 + FLOW_UPDATE_ABBREV_LEN);
        let mut ofpacts = vec![];
        let mut cursor = OfpMsgCursor::new(&msg);
        assert_eq!(FlowUpdate::decode_next(&mut cursor, &mut ofpacts).unwrap(),
                   Some(FlowUpdate::Abbrev { xid: 0x5555 }));
    }

    #[test]
    #[should_panic]
    fn paused_record_needs_of14() {
        let mut stream = FlowUpdateStream::start(Protocol::Of13Oxm).unwrap();
        let _ = stream.append(&mut FlowUpdate::Paused, None);
    }

    #[test]
    fn bad_record_lengths() {
        let mut stream = FlowUpdateStream::start(Protocol::Of14Oxm).unwrap();
        stream.append(&mut FlowUpdate::Abbrev { xid: 1 }, None).unwrap();
        let msg = stream.into_messages().remove(0);

        let mut odd = msg.clone();
        odd[17] = 12;
        assert_eq!(decode_all(&odd), Err(OfpError::BadLen));

        let mut long = msg.clone();
        long[17] = 16;
        assert_eq!(decode_all(&long), Err(OfpError::BadLen));

        let mut short = msg.clone();
        short.truncate(16 + 2);
        OfpHeader::update_length(&mut short);
        assert_eq!(decode_all(&short), Err(OfpError::BadLen));
    }

    #[test]
    fn bad_event_code() {
        let mut stream = FlowUpdateStream::start(Protocol::Of12Oxm).unwrap();
        stream.append(&mut FlowUpdate::Abbrev { xid: 1 }, None).unwrap();
        let mut msg = stream.into_messages().remove(0);
        msg[24 + 3] = 9;
        assert_eq!(decode_all(&msg), Err(OfpError::BadEvent(9)));
    }

    #[test]
    fn failed_append_leaves_stream_and_pattern_untouched() {
        let table = Arc::new(TunTable::new().with_option(0, 4));
        let own = Arc::new(TunTable::new().with_option(0, 8));
        let acts = output();
        let mut stream = FlowUpdateStream::start(Protocol::Of14Oxm).unwrap();
        stream.append(&mut FlowUpdate::Abbrev { xid: 1 }, None).unwrap();
        let before: Vec<Vec<u8>> = stream.messages().map(|m| m.to_vec()).collect();

        let mut update = full(FlowUpdateEvent::Added, &acts);
        if let FlowUpdate::Full(ref mut f) = update {
            f.pattern.tun_metadata = vec![TunMetadata {
                                              index: 0,
                                              value: vec![1; 8],
                                          }];
            f.pattern.tun_table = Some(own.clone());
        }
        assert!(stream.append(&mut update, Some(&table)).is_err());
        let after: Vec<Vec<u8>> = stream.messages().map(|m| m.to_vec()).collect();
        assert_eq!(before, after);
        match update {
            FlowUpdate::Full(ref f) => {
                assert!(Arc::ptr_eq(f.pattern.tun_table.as_ref().unwrap(), &own))
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn record_must_fit_one_message() {
        // 24-byte stats header, 24-byte fixed part, 8 bytes per OpenFlow 1.0 output.
        fn update(ofpacts: &[Ofpact]) -> FlowUpdate {
            FlowUpdate::Full(FlowUpdateFull {
                event: FlowUpdateEvent::Added,
                reason: FlowRemovedReason::IdleTimeout,
                table_id: 0,
                idle_timeout: 0,
                hard_timeout: 0,
                cookie: 0,
                priority: 0,
                pattern: Pattern::match_all(),
                ofpacts,
            })
        }
        let fits: Vec<Ofpact> = (0..8185).map(|_| output()[0].clone()).collect();
        let too_big: Vec<Ofpact> = (0..8186).map(|_| output()[0].clone()).collect();

        let mut stream = FlowUpdateStream::start(Protocol::Of10Nxm).unwrap();
        assert_eq!(stream.append(&mut update(&too_big), None), Err(OfpError::BadLen));
        let msgs: Vec<Vec<u8>> = stream.messages().map(|m| m.to_vec()).collect();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].len(), 24);
        assert_eq!(stats_flags(&msgs[0]) & OFPSF_REPLY_MORE, 0);

        stream.append(&mut update(&fits), None).unwrap();
        stream.append(&mut FlowUpdate::Abbrev { xid: 3 }, None).unwrap();
        let msgs = stream.into_messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].len(), 65528);
        assert_eq!(OfpHeader::parse(&msgs[0]).unwrap().length(), 65528);
        assert_eq!(decode_all(&msgs[0]).unwrap()[0].1.len(), 8185);
        assert_eq!(decode_all(&msgs[1]).unwrap(), vec![(FlowUpdateEvent::Abbrev, vec![])]);
    }

    #[test]
    fn nx_reason_wider_than_a_byte() {
        let acts = output();
        let mut stream = FlowUpdateStream::start(Protocol::Of10Nxm).unwrap();
        stream.append(&mut full(FlowUpdateEvent::Removed, &acts), None).unwrap();
        let mut msg = stream.into_messages().remove(0);
        assert_eq!(decode_all(&msg).unwrap()[0].0, FlowUpdateEvent::Removed);
        // Record starts after the 24-byte stats header; reason follows length and event.
        msg[24 + 4] = 0x01;
        msg[24 + 5] = 0x02;
        assert_eq!(decode_all(&msg), Err(OfpError::BadLen));
    }

    #[test]
    fn oversized_stream_splits() {
        let mut stream = FlowUpdateStream::start(Protocol::Of13Oxm).unwrap();
        let count = 9000u32;
        for xid in 0..count {
            stream.append(&mut FlowUpdate::Abbrev { xid }, None).unwrap();
        }
        let msgs = stream.into_messages();
        assert_eq!(msgs.len(), 2);
        assert_eq!(stats_flags(&msgs[0]) & OFPSF_REPLY_MORE, OFPSF_REPLY_MORE);
        assert_eq!(stats_flags(&msgs[1]) & OFPSF_REPLY_MORE, 0);

        let mut seen = 0;
        for msg in &msgs {
            assert!(msg.len() <= u16::MAX as usize);
            assert_eq!(OfpHeader::parse(msg).unwrap().length(), msg.len());
            let mut cursor = OfpMsgCursor::new(msg);
            let mut ofpacts = vec![];
            while let Some(u) = FlowUpdate::decode_next(&mut cursor, &mut ofpacts).unwrap() {
                assert_eq!(u, FlowUpdate::Abbrev { xid: seen });
                seen += 1;
            }
        }
        assert_eq!(seen, count);
    }

    #[test]
    fn pause_messages() {
        for &p in Protocol::ALL.iter() {
            for &e in [FlowUpdateEvent::Paused, FlowUpdateEvent::Resumed].iter() {
                let msg = encode_flow_monitor_pause(e, p).unwrap();
                assert_eq!(decode_flow_monitor_pause(&msg), Ok(e), "{:?}", p);
            }
        }
        let msg = encode_flow_monitor_pause(FlowUpdateEvent::Paused, Protocol::Of10Nxm).unwrap();
        assert_eq!(msg.len(), 16);
    }

    #[test]
    #[should_panic]
    fn pause_rejects_other_events() {
        let _ = encode_flow_monitor_pause(FlowUpdateEvent::Added, Protocol::Of14Oxm);
    }
}
