//! Flow monitor requests and cancellation.
//!
//! A flow monitor request subscribes a controller to changes in the flow tables.
//! Several requests may be packed into one message: the Nicira statistics request
//! (OpenFlow 1.0 to 1.2), the ONF statistics request (OpenFlow 1.3) or the standard
//! multipart request (OpenFlow 1.4+).

use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::bits::is_all_zeros;
use crate::ofp_buf::{OfpBuf, OfpMsgCursor};
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::{OfpHeader, OfpVersion};
use crate::ofp_port::{port_from_ofp11, port_to_ofp11, OfpPort, OFPG_ANY};
use crate::ofp_protocol::Protocol;
use crate::ofp_raw::OfpRaw;
use crate::pattern::Pattern;
use crate::vlog::{RateLimitConfig, RateLimiter};

static RL: RateLimiter = RateLimiter::new(RateLimitConfig::DEFAULT);

bitflags! {
    /// What a monitor reports, with the OpenFlow 1.4 bit values.
    pub struct MonitorFlags: u16 {
        /// Report the flows that match when the monitor is installed.
        const INITIAL = 1 << 0;
        const ADD = 1 << 1;
        const REMOVED = 1 << 2;
        const MODIFY = 1 << 3;
        /// Include actions in full updates.
        const INSTRUCTIONS = 1 << 4;
        /// Send full updates for the controller's own changes too.
        const NO_ABBREV = 1 << 5;
        /// Only report the controller's own changes.
        const ONLY_OWN = 1 << 6;
    }
}

// Nicira and ONF share one layout.
const NXFMF_INITIAL: u16 = 1 << 0;
const NXFMF_ADD: u16 = 1 << 1;
const NXFMF_DELETE: u16 = 1 << 2;
const NXFMF_MODIFY: u16 = 1 << 3;
const NXFMF_ACTIONS: u16 = 1 << 4;
const NXFMF_OWN: u16 = 1 << 5;
const NXFMF_ALL: u16 = NXFMF_INITIAL | NXFMF_ADD | NXFMF_DELETE | NXFMF_MODIFY | NXFMF_ACTIONS |
                       NXFMF_OWN;

const NX_FLAG_MAP: [(MonitorFlags, u16); 6] = [(MonitorFlags::INITIAL, NXFMF_INITIAL),
                                               (MonitorFlags::ADD, NXFMF_ADD),
                                               (MonitorFlags::REMOVED, NXFMF_DELETE),
                                               (MonitorFlags::MODIFY, NXFMF_MODIFY),
                                               (MonitorFlags::INSTRUCTIONS, NXFMF_ACTIONS),
                                               (MonitorFlags::ONLY_OWN, NXFMF_OWN)];

/// Translate canonical flags to the Nicira/ONF layout. `NO_ABBREV` has no counterpart
/// and is dropped.
pub fn nx_flags_from_canonical(flags: MonitorFlags) -> u16 {
    NX_FLAG_MAP.iter()
        .filter(|&&(canonical, _)| flags.contains(canonical))
        .fold(0, |nx, &(_, bit)| nx | bit)
}

/// Translate Nicira/ONF flags to canonical flags. Bits outside the layout are ignored.
pub fn canonical_flags_from_nx(flags: u16) -> MonitorFlags {
    NX_FLAG_MAP.iter()
        .filter(|&&(_, bit)| flags & bit != 0)
        .fold(MonitorFlags::empty(), |canonical, &(c, _)| canonical | c)
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowMonitorCommand {
    Add = 0,
    Modify = 1,
    Delete = 2,
}

impl FlowMonitorCommand {
    fn of_wire(cmd: u8) -> Result<FlowMonitorCommand> {
        match cmd {
            0 => Ok(FlowMonitorCommand::Add),
            1 => Ok(FlowMonitorCommand::Modify),
            2 => Ok(FlowMonitorCommand::Delete),
            c => Err(OfpError::BadMonitorCommand(c)),
        }
    }
}

/// Hands out monitor ids for requests built without one. Share one allocator among
/// everything that builds requests for the same connection.
#[derive(Debug, Default)]
pub struct MonitorIdAllocator {
    next: AtomicU32,
}

impl MonitorIdAllocator {
    pub const fn new() -> MonitorIdAllocator {
        MonitorIdAllocator { next: AtomicU32::new(0) }
    }

    /// Return a fresh id. Ids start at 0 and are unique until the counter wraps.
    pub fn next_id(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// One flow monitor subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMonitorRequest {
    pub id: u32,
    pub command: FlowMonitorCommand,
    pub flags: MonitorFlags,
    /// Only flows that output to this port; `OFPPNone` for any.
    pub out_port: u16,
    /// Only flows that output to this group; `OFPG_ANY` for any.
    pub out_group: u32,
    /// 255 for all tables.
    pub table_id: u8,
    pub pattern: Pattern,
}

const NX_FLOW_MONITOR_REQUEST_LEN: usize = 16;
const ONF_FLOW_MONITOR_REQUEST_LEN: usize = 16;
const OFP14_FLOW_MONITOR_REQUEST_LEN: usize = 16;
const NX_FLOW_MONITOR_CANCEL_LEN: usize = 4;

/// Flags a switch accepts in an OpenFlow 1.4 request. `NO_ABBREV` is not among them.
const OFP14_REQUEST_FLAGS: MonitorFlags = MonitorFlags::from_bits_truncate(
    MonitorFlags::INITIAL.bits() | MonitorFlags::ADD.bits() | MonitorFlags::REMOVED.bits() |
    MonitorFlags::MODIFY.bits() | MonitorFlags::INSTRUCTIONS.bits() |
    MonitorFlags::ONLY_OWN.bits());

impl FlowMonitorRequest {
    /// The request a textual monitor filter starts from: every event type, actions
    /// included, own changes only, all tables, catch-all match.
    pub fn with_defaults(ids: &MonitorIdAllocator) -> FlowMonitorRequest {
        FlowMonitorRequest {
            id: ids.next_id(),
            command: FlowMonitorCommand::Add,
            flags: MonitorFlags::INITIAL | MonitorFlags::ADD | MonitorFlags::REMOVED |
                   MonitorFlags::MODIFY | MonitorFlags::ONLY_OWN |
                   MonitorFlags::INSTRUCTIONS,
            out_port: OfpPort::OFPPNone as u16,
            out_group: OFPG_ANY,
            table_id: 0xff,
            pattern: Pattern::match_all(),
        }
    }

    /// Decode the next request in the message under `cursor`.
    ///
    /// Returns `Ok(None)` once every request has been consumed.
    pub fn decode_next(cursor: &mut OfpMsgCursor) -> Result<Option<FlowMonitorRequest>> {
        let (raw, _) = cursor.recognize()?;
        let body = cursor.body();
        if body.is_empty() {
            return Ok(None);
        }
        let rq = match raw {
            OfpRaw::NxstFlowMonitorRequest => FlowMonitorRequest::pull_nx(body)?,
            OfpRaw::Onfst13FlowMonitorRequest => FlowMonitorRequest::pull_onf(body)?,
            OfpRaw::Ofpst14FlowMonitorRequest => FlowMonitorRequest::pull_ofp14(body)?,
            raw => return Err(OfpError::UnexpectedMessage(raw)),
        };
        Ok(Some(rq))
    }

    fn pull_fixed<'a>(body: &mut OfpBuf<'a>, len: usize, name: &str) -> Result<&'a [u8]> {
        match body.try_pull(len) {
            Some(fixed) => Ok(fixed),
            None => {
                warn_rl!(RL, leftover = body.len(), "{} request has leftover bytes at end", name);
                Err(OfpError::BadLen)
            }
        }
    }

    fn check_nx_flags(flags: u16, name: &str) -> Result<MonitorFlags> {
        if flags & (NXFMF_ADD | NXFMF_DELETE | NXFMF_MODIFY) == 0 || flags & !NXFMF_ALL != 0 {
            warn_rl!(RL, "{} has bad flags {:#x}", name, flags);
            return Err(OfpError::BadFlags(flags));
        }
        Ok(canonical_flags_from_nx(flags))
    }

    fn pull_nx(body: &mut OfpBuf) -> Result<FlowMonitorRequest> {
        let fixed = FlowMonitorRequest::pull_fixed(body,
                                                   NX_FLOW_MONITOR_REQUEST_LEN,
                                                   "NXST_FLOW_MONITOR")?;
        let mut bytes = Cursor::new(fixed);
        let id = bytes.read_u32::<BigEndian>()?;
        let flags = FlowMonitorRequest::check_nx_flags(bytes.read_u16::<BigEndian>()?,
                                                       "NXST_FLOW_MONITOR")?;
        let out_port = bytes.read_u16::<BigEndian>()?;
        let match_len = bytes.read_u16::<BigEndian>()? as usize;
        let table_id = bytes.read_u8()?;
        if !is_all_zeros(&fixed[11..]) {
            return Err(OfpError::MustBeZero);
        }
        Ok(FlowMonitorRequest {
            id,
            command: FlowMonitorCommand::Add,
            flags,
            out_port,
            out_group: OFPG_ANY,
            table_id,
            pattern: Pattern::pull_nxm(body, match_len)?,
        })
    }

    fn pull_onf(body: &mut OfpBuf) -> Result<FlowMonitorRequest> {
        let fixed = FlowMonitorRequest::pull_fixed(body,
                                                   ONF_FLOW_MONITOR_REQUEST_LEN,
                                                   "ONFST_FLOW_MONITOR")?;
        let mut bytes = Cursor::new(fixed);
        let id = bytes.read_u32::<BigEndian>()?;
        let flags = FlowMonitorRequest::check_nx_flags(bytes.read_u16::<BigEndian>()?,
                                                       "ONFST_FLOW_MONITOR")?;
        let _match_len = bytes.read_u16::<BigEndian>()?;
        let out_port = bytes.read_u32::<BigEndian>()?;
        let table_id = bytes.read_u8()?;
        if !is_all_zeros(&fixed[13..]) {
            return Err(OfpError::MustBeZero);
        }
        let out_port = port_from_ofp11(out_port)?;
        let (pattern, _) = Pattern::pull_oxm(body)?;
        Ok(FlowMonitorRequest {
            id,
            command: FlowMonitorCommand::Add,
            flags,
            out_port,
            out_group: OFPG_ANY,
            table_id,
            pattern,
        })
    }

    fn pull_ofp14(body: &mut OfpBuf) -> Result<FlowMonitorRequest> {
        let fixed = FlowMonitorRequest::pull_fixed(body,
                                                   OFP14_FLOW_MONITOR_REQUEST_LEN,
                                                   "OFPST_FLOW_MONITOR")?;
        let mut bytes = Cursor::new(fixed);
        let id = bytes.read_u32::<BigEndian>()?;
        let out_port = bytes.read_u32::<BigEndian>()?;
        let out_group = bytes.read_u32::<BigEndian>()?;
        let flags = bytes.read_u16::<BigEndian>()?;
        let table_id = bytes.read_u8()?;
        let command = FlowMonitorCommand::of_wire(bytes.read_u8()?)?;

        if command == FlowMonitorCommand::Delete {
            // A delete names only the monitor; the match may be left off entirely.
            let pattern = if body.is_empty() {
                Pattern::match_all()
            } else {
                Pattern::pull_oxm(body)?.0
            };
            return Ok(FlowMonitorRequest {
                id,
                command,
                flags: MonitorFlags::empty(),
                out_port: OfpPort::OFPPNone as u16,
                out_group: OFPG_ANY,
                table_id: 0xff,
                pattern,
            });
        }

        let checked = MonitorFlags::from_bits(flags)
            .filter(|f| OFP14_REQUEST_FLAGS.contains(*f))
            .filter(|f| f.intersects(MonitorFlags::ADD | MonitorFlags::REMOVED | MonitorFlags::MODIFY));
        let flags = match checked {
            Some(f) => f,
            None => {
                warn_rl!(RL, "OFPST_FLOW_MONITOR has bad flags {:#x}", flags);
                return Err(OfpError::BadFlags(flags));
            }
        };
        let out_port = port_from_ofp11(out_port)?;
        let (pattern, _) = Pattern::pull_oxm(body)?;
        Ok(FlowMonitorRequest {
            id,
            command,
            flags,
            out_port,
            out_group,
            table_id,
            pattern,
        })
    }

    /// Append `self` to the flow monitor request message `msg` for `protocol`. An
    /// empty `msg` first gets the message header.
    ///
    /// OpenFlow 1.4+ records carry a command, written as add for anything but delete.
    /// Earlier dialects have no command field.
    pub fn append(&self, msg: &mut Vec<u8>, protocol: Protocol) -> Result<()> {
        let version = protocol.version();
        let raw = request_raw(version);
        if msg.is_empty() {
            raw.put(version, 0, msg)?;
        }

        let start = msg.len();
        match raw {
            OfpRaw::NxstFlowMonitorRequest => {
                msg.resize(start + NX_FLOW_MONITOR_REQUEST_LEN, 0);
                let match_len = self.pattern.put_nxm(msg)?;
                let fixed = &mut msg[start..start + NX_FLOW_MONITOR_REQUEST_LEN];
                BigEndian::write_u32(&mut fixed[0..4], self.id);
                BigEndian::write_u16(&mut fixed[4..6], nx_flags_from_canonical(self.flags));
                BigEndian::write_u16(&mut fixed[6..8], self.out_port);
                BigEndian::write_u16(&mut fixed[8..10], match_len as u16);
                fixed[10] = self.table_id;
            }
            OfpRaw::Onfst13FlowMonitorRequest => {
                msg.resize(start + ONF_FLOW_MONITOR_REQUEST_LEN, 0);
                let match_len = self.pattern.put_oxm(msg)?;
                let fixed = &mut msg[start..start + ONF_FLOW_MONITOR_REQUEST_LEN];
                BigEndian::write_u32(&mut fixed[0..4], self.id);
                BigEndian::write_u16(&mut fixed[4..6], nx_flags_from_canonical(self.flags));
                BigEndian::write_u16(&mut fixed[6..8], match_len as u16);
                BigEndian::write_u32(&mut fixed[8..12], port_to_ofp11(self.out_port));
                fixed[12] = self.table_id;
            }
            _ => {
                let command = match self.command {
                    FlowMonitorCommand::Delete => FlowMonitorCommand::Delete,
                    _ => FlowMonitorCommand::Add,
                };
                msg.write_u32::<BigEndian>(self.id)?;
                msg.write_u32::<BigEndian>(port_to_ofp11(self.out_port))?;
                msg.write_u32::<BigEndian>(self.out_group)?;
                msg.write_u16::<BigEndian>(self.flags.bits())?;
                msg.write_u8(self.table_id)?;
                msg.write_u8(command as u8)?;
                self.pattern.put_oxm(msg)?;
            }
        }
        OfpHeader::update_length(msg);
        Ok(())
    }
}

fn request_raw(version: OfpVersion) -> OfpRaw {
    match version {
        OfpVersion::Of10 | OfpVersion::Of11 | OfpVersion::Of12 => OfpRaw::NxstFlowMonitorRequest,
        OfpVersion::Of13 => OfpRaw::Onfst13FlowMonitorRequest,
        OfpVersion::Of14 | OfpVersion::Of15 => OfpRaw::Ofpst14FlowMonitorRequest,
    }
}

/// Encode a message that cancels monitor `id`.
///
/// Before OpenFlow 1.4 this is a Nicira or ONF cancel message holding only the id.
/// From 1.4 on it is a flow monitor request with a single delete record.
pub fn encode_flow_monitor_cancel(id: u32, protocol: Protocol) -> Result<Vec<u8>> {
    let version = protocol.version();
    let raw = match version {
        OfpVersion::Of10 | OfpVersion::Of11 | OfpVersion::Of12 => OfpRaw::NxtFlowMonitorCancel,
        OfpVersion::Of13 => OfpRaw::Onft13FlowMonitorCancel,
        OfpVersion::Of14 | OfpVersion::Of15 => {
            let mut msg = OfpRaw::Ofpst14FlowMonitorRequest.alloc(version, 0)?;
            msg.write_u32::<BigEndian>(id)?;
            msg.extend_from_slice(&[0; 11]);
            msg.write_u8(FlowMonitorCommand::Delete as u8)?;
            Pattern::match_all().put_oxm(&mut msg)?;
            OfpHeader::update_length(&mut msg);
            return Ok(msg);
        }
    };
    let mut msg = raw.alloc(version, 0)?;
    msg.write_u32::<BigEndian>(id)?;
    OfpHeader::update_length(&mut msg);
    Ok(msg)
}

/// Return the id of the monitor that the cancel message `msg` cancels.
pub fn decode_flow_monitor_cancel(msg: &[u8]) -> Result<u32> {
    let mut cursor = OfpMsgCursor::new(msg);
    match cursor.recognize()?.0 {
        OfpRaw::NxtFlowMonitorCancel | OfpRaw::Onft13FlowMonitorCancel => {
            let body = cursor.body();
            if body.len() != NX_FLOW_MONITOR_CANCEL_LEN {
                return Err(OfpError::BadLen);
            }
            Ok(BigEndian::read_u32(body.pull(NX_FLOW_MONITOR_CANCEL_LEN)?))
        }
        OfpRaw::Ofpst14FlowMonitorRequest => {
            match FlowMonitorRequest::decode_next(&mut cursor)? {
                Some(FlowMonitorRequest { id, command: FlowMonitorCommand::Delete, .. }) => Ok(id),
                Some(rq) => Err(OfpError::BadMonitorCommand(rq.command as u8)),
                None => Err(OfpError::BadLen),
            }
        }
        raw => Err(OfpError::UnexpectedMessage(raw)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::Ipv4Prefix;

    fn request(id: u32) -> FlowMonitorRequest {
        FlowMonitorRequest {
            id,
            command: FlowMonitorCommand::Add,
            flags: MonitorFlags::INITIAL | MonitorFlags::ADD | MonitorFlags::INSTRUCTIONS,
            out_port: 5,
            out_group: OFPG_ANY,
            table_id: 2,
            pattern: Pattern {
                dl_type: Some(0x0800),
                nw_dst: Some(Ipv4Prefix::new(0xc0a8_0000, 16)),
                ..Pattern::match_all()
            },
        }
    }

    fn decode_all(msg: &[u8]) -> Result<Vec<FlowMonitorRequest>> {
        let mut cursor = OfpMsgCursor::new(msg);
        let mut out = vec![];
        while let Some(rq) = FlowMonitorRequest::decode_next(&mut cursor)? {
            out.push(rq);
        }
        Ok(out)
    }

    #[test]
    fn flag_translation() {
        let all = MonitorFlags::all() - MonitorFlags::NO_ABBREV;
        assert_eq!(nx_flags_from_canonical(all), NXFMF_ALL);
        assert_eq!(canonical_flags_from_nx(NXFMF_ALL), all);
        assert_eq!(nx_flags_from_canonical(MonitorFlags::REMOVED), NXFMF_DELETE);
        assert_eq!(nx_flags_from_canonical(MonitorFlags::NO_ABBREV), 0);
        assert_eq!(canonical_flags_from_nx(NXFMF_OWN | 0x8000), MonitorFlags::ONLY_OWN);
    }

    #[test]
    fn packed_requests_roundtrip() {
        for &p in Protocol::ALL.iter() {
            let mut second = request(8);
            second.out_port = OfpPort::OFPPNone as u16;
            second.pattern = Pattern::match_all();
            let mut msg = vec![];
            request(7).append(&mut msg, p).unwrap();
            second.append(&mut msg, p).unwrap();
            assert_eq!(decode_all(&msg).unwrap(), vec![request(7), second], "{:?}", p);
        }
    }

    #[test]
    fn ofp14_keeps_out_group() {
        let mut rq = request(1);
        rq.out_group = 9;
        let mut msg = vec![];
        rq.append(&mut msg, Protocol::Of15Oxm).unwrap();
        assert_eq!(decode_all(&msg).unwrap(), vec![rq]);
    }

    #[test]
    fn ofp14_rejects_no_abbrev() {
        let mut rq = request(1);
        rq.flags |= MonitorFlags::NO_ABBREV;
        let mut msg = vec![];
        rq.append(&mut msg, Protocol::Of14Oxm).unwrap();
        let flags = rq.flags.bits();
        assert_eq!(decode_all(&msg), Err(OfpError::BadFlags(flags)));
    }

    #[test]
    fn modify_is_sent_as_add() {
        let mut rq = request(1);
        rq.command = FlowMonitorCommand::Modify;
        let mut msg = vec![];
        rq.append(&mut msg, Protocol::Of14Oxm).unwrap();
        assert_eq!(decode_all(&msg).unwrap()[0].command, FlowMonitorCommand::Add);
    }

    #[test]
    fn nx_flags_must_select_an_event() {
        let mut msg = vec![];
        request(1).append(&mut msg, Protocol::Of10Nxm).unwrap();
        // flags live at offset 4 of the record, after the 24-byte header
        BigEndian::write_u16(&mut msg[28..30], NXFMF_INITIAL);
        assert_eq!(decode_all(&msg), Err(OfpError::BadFlags(NXFMF_INITIAL)));
        BigEndian::write_u16(&mut msg[28..30], NXFMF_ADD | 0x40);
        assert_eq!(decode_all(&msg), Err(OfpError::BadFlags(NXFMF_ADD | 0x40)));
    }

    #[test]
    fn ofp14_unknown_flags() {
        let mut msg = vec![];
        request(1).append(&mut msg, Protocol::Of14Oxm).unwrap();
        BigEndian::write_u16(&mut msg[28..30], 0x0082);
        assert_eq!(decode_all(&msg), Err(OfpError::BadFlags(0x0082)));
    }

    #[test]
    fn reserved_bytes_must_be_zero() {
        let mut msg = vec![];
        request(1).append(&mut msg, Protocol::Of13Oxm).unwrap();
        msg[24 + 15] = 1;
        assert_eq!(decode_all(&msg), Err(OfpError::MustBeZero));
    }

    #[test]
    fn short_record_is_bad_len() {
        let mut msg = OfpRaw::NxstFlowMonitorRequest.alloc(OfpVersion::Of10, 0).unwrap();
        msg.extend_from_slice(&[0; 8]);
        OfpHeader::update_length(&mut msg);
        assert_eq!(decode_all(&msg), Err(OfpError::BadLen));
    }

    #[test]
    fn onf_out_port_gap() {
        let mut msg = vec![];
        request(1).append(&mut msg, Protocol::Of13Oxm).unwrap();
        BigEndian::write_u32(&mut msg[32..36], 0x0001_0000);
        assert_eq!(decode_all(&msg), Err(OfpError::BadOutPort(0x0001_0000)));
    }

    #[test]
    fn wrong_message() {
        let msg = encode_flow_monitor_cancel(1, Protocol::Of10Nxm).unwrap();
        assert_eq!(decode_all(&msg),
                   Err(OfpError::UnexpectedMessage(OfpRaw::NxtFlowMonitorCancel)));
    }

    #[test]
    fn cancel_roundtrip() {
        for &p in Protocol::ALL.iter() {
            let msg = encode_flow_monitor_cancel(0xabcd, p).unwrap();
            assert_eq!(decode_flow_monitor_cancel(&msg), Ok(0xabcd), "{:?}", p);
        }
        let msg = encode_flow_monitor_cancel(3, Protocol::Of12Oxm).unwrap();
        assert_eq!(msg.len(), 16 + NX_FLOW_MONITOR_CANCEL_LEN);
    }

    #[test]
    fn ofp14_delete_without_match() {
        let mut msg = OfpRaw::Ofpst14FlowMonitorRequest.alloc(OfpVersion::Of14, 0).unwrap();
        msg.write_u32::<BigEndian>(77).unwrap();
        msg.extend_from_slice(&[0; 11]);
        msg.write_u8(FlowMonitorCommand::Delete as u8).unwrap();
        OfpHeader::update_length(&mut msg);
        assert_eq!(decode_flow_monitor_cancel(&msg), Ok(77));
        let rq = &decode_all(&msg).unwrap()[0];
        assert_eq!(rq.pattern, Pattern::match_all());
        assert_eq!(rq.flags, MonitorFlags::empty());
    }

    #[test]
    fn ofp14_cancel_needs_delete() {
        let mut msg = vec![];
        request(1).append(&mut msg, Protocol::Of14Oxm).unwrap();
        assert_eq!(decode_flow_monitor_cancel(&msg), Err(OfpError::BadMonitorCommand(0)));

        // The command byte ends the fixed part of the first record.
        msg[16 + 15] = FlowMonitorCommand::Modify as u8;
        assert_eq!(decode_flow_monitor_cancel(&msg), Err(OfpError::BadMonitorCommand(1)));
    }

    #[test]
    fn defaults_take_fresh_ids() {
        let ids = MonitorIdAllocator::new();
        let a = FlowMonitorRequest::with_defaults(&ids);
        let b = FlowMonitorRequest::with_defaults(&ids);
        assert_eq!((a.id, b.id), (0, 1));
        assert_eq!(a.table_id, 0xff);
        assert_eq!(a.out_port, OfpPort::OFPPNone as u16);
        assert!(a.flags.contains(MonitorFlags::ONLY_OWN | MonitorFlags::INITIAL));
        assert!(!a.flags.contains(MonitorFlags::NO_ABBREV));
    }
}
