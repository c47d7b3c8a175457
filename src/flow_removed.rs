//! Flow removed notifications.
//!
//! Four wire forms carry the same record: the OpenFlow 1.0 message with its fixed
//! match, the Nicira extension with an NXM match, the OpenFlow 1.1 to 1.4 message with
//! an OXM match, and the OpenFlow 1.5 message that moves the counters into an OXS block.

use std::fmt;
use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::ofp_buf::OfpBuf;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::{OfpHeader, OfpVersion};
use crate::ofp_message::OfpMessage;
use crate::ofp_protocol::{Protocol, Protocols};
use crate::ofp_raw::OfpRaw;
use crate::ox_stat::OxsStats;
use crate::pattern::{Pattern, OFP10_MATCH_LEN};

/// Why a flow left its table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowRemovedReason {
    IdleTimeout,
    HardTimeout,
    Delete,
    GroupDelete,
    MeterDelete,
    Eviction,
    /// No reason given. Never sent by a switch.
    NoReason,
    /// A code this crate does not name, kept as received.
    Other(u8),
}

impl FlowRemovedReason {
    pub fn of_wire(code: u8) -> FlowRemovedReason {
        match code {
            0 => FlowRemovedReason::IdleTimeout,
            1 => FlowRemovedReason::HardTimeout,
            2 => FlowRemovedReason::Delete,
            3 => FlowRemovedReason::GroupDelete,
            4 => FlowRemovedReason::MeterDelete,
            5 => FlowRemovedReason::Eviction,
            255 => FlowRemovedReason::NoReason,
            c => FlowRemovedReason::Other(c),
        }
    }

    pub fn wire(self) -> u8 {
        match self {
            FlowRemovedReason::IdleTimeout => 0,
            FlowRemovedReason::HardTimeout => 1,
            FlowRemovedReason::Delete => 2,
            FlowRemovedReason::GroupDelete => 3,
            FlowRemovedReason::MeterDelete => 4,
            FlowRemovedReason::Eviction => 5,
            FlowRemovedReason::NoReason => 255,
            FlowRemovedReason::Other(c) => c,
        }
    }
}

impl fmt::Display for FlowRemovedReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FlowRemovedReason::IdleTimeout => f.write_str("idle"),
            FlowRemovedReason::HardTimeout => f.write_str("hard"),
            FlowRemovedReason::Delete => f.write_str("delete"),
            FlowRemovedReason::GroupDelete => f.write_str("group_delete"),
            FlowRemovedReason::Eviction => f.write_str("eviction"),
            FlowRemovedReason::MeterDelete => f.write_str("meter_delete"),
            r => write!(f, "{}", r.wire()),
        }
    }
}

/// A flow that has left its table, with its final counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowRemoved {
    pub pattern: Pattern,
    pub cookie: u64,
    pub priority: u16,
    pub reason: FlowRemovedReason,
    /// 255 if unknown.
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub idle_timeout: u16,
    pub hard_timeout: u16,
    /// `u64::MAX` if unknown.
    pub packet_count: u64,
    /// `u64::MAX` if unknown.
    pub byte_count: u64,
}

const NX_FLOW_REMOVED_LEN: usize = 40;
const OFP12_FLOW_REMOVED_LEN: usize = 40;
const OFP15_FLOW_REMOVED_LEN: usize = 16;
const OFP10_FLOW_REMOVED_LEN: usize = 80;

/// OpenFlow 1.0 has no "unknown" counter value.
fn unknown_to_zero(count: u64) -> u64 {
    if count == u64::MAX {
        0
    } else {
        count
    }
}

impl FlowRemoved {
    fn parse_ofp15(body: &mut OfpBuf) -> Result<FlowRemoved> {
        let mut bytes = Cursor::new(body.pull(OFP15_FLOW_REMOVED_LEN)?);
        let table_id = bytes.read_u8()?;
        let reason = FlowRemovedReason::of_wire(bytes.read_u8()?);
        let priority = bytes.read_u16::<BigEndian>()?;
        let idle_timeout = bytes.read_u16::<BigEndian>()?;
        let hard_timeout = bytes.read_u16::<BigEndian>()?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let (pattern, _) = Pattern::pull_oxm(body)?;
        let stats = OxsStats::pull(body)?;
        Ok(FlowRemoved {
            pattern,
            cookie,
            priority,
            reason,
            table_id,
            duration_sec: stats.duration_sec,
            duration_nsec: stats.duration_nsec,
            idle_timeout,
            hard_timeout,
            packet_count: stats.packet_count,
            byte_count: stats.byte_count,
        })
    }

    fn parse_ofp11(body: &mut OfpBuf) -> Result<FlowRemoved> {
        let mut bytes = Cursor::new(body.pull(OFP12_FLOW_REMOVED_LEN)?);
        let cookie = bytes.read_u64::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let reason = FlowRemovedReason::of_wire(bytes.read_u8()?);
        let table_id = bytes.read_u8()?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let duration_nsec = bytes.read_u32::<BigEndian>()?;
        let idle_timeout = bytes.read_u16::<BigEndian>()?;
        let hard_timeout = bytes.read_u16::<BigEndian>()?;
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        let (pattern, _) = Pattern::pull_oxm(body)?;
        Ok(FlowRemoved {
            pattern,
            cookie,
            priority,
            reason,
            table_id,
            duration_sec,
            duration_nsec,
            idle_timeout,
            hard_timeout,
            packet_count,
            byte_count,
        })
    }

    fn parse_ofp10(body: &mut OfpBuf) -> Result<FlowRemoved> {
        let buf = body.pull(OFP10_FLOW_REMOVED_LEN)?;
        let pattern = Pattern::parse_ofp10(&buf[..OFP10_MATCH_LEN])?;
        let mut bytes = Cursor::new(&buf[OFP10_MATCH_LEN..]);
        let cookie = bytes.read_u64::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let reason = FlowRemovedReason::of_wire(bytes.read_u8()?);
        bytes.read_u8()?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let duration_nsec = bytes.read_u32::<BigEndian>()?;
        let idle_timeout = bytes.read_u16::<BigEndian>()?;
        bytes.read_u16::<BigEndian>()?;
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        Ok(FlowRemoved {
            pattern,
            cookie,
            priority,
            reason,
            table_id: 255,
            duration_sec,
            duration_nsec,
            idle_timeout,
            hard_timeout: 0,
            packet_count,
            byte_count,
        })
    }

    fn parse_nx(body: &mut OfpBuf) -> Result<FlowRemoved> {
        let mut bytes = Cursor::new(body.pull(NX_FLOW_REMOVED_LEN)?);
        let cookie = bytes.read_u64::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let reason = FlowRemovedReason::of_wire(bytes.read_u8()?);
        let table_id = bytes.read_u8()?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let duration_nsec = bytes.read_u32::<BigEndian>()?;
        let idle_timeout = bytes.read_u16::<BigEndian>()?;
        let match_len = bytes.read_u16::<BigEndian>()? as usize;
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        let pattern = Pattern::pull_nxm(body, match_len)?;
        if !body.is_empty() {
            return Err(OfpError::BadLen);
        }
        Ok(FlowRemoved {
            pattern,
            cookie,
            priority,
            reason,
            // 0 means "not sent", otherwise the table id plus one.
            table_id: table_id.wrapping_sub(1),
            duration_sec,
            duration_nsec,
            idle_timeout,
            hard_timeout: 0,
            packet_count,
            byte_count,
        })
    }

    fn marshal_ofp15(&self, reason: u8, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u8(self.table_id)?;
        bytes.write_u8(reason)?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u16::<BigEndian>(self.idle_timeout)?;
        bytes.write_u16::<BigEndian>(self.hard_timeout)?;
        bytes.write_u64::<BigEndian>(self.cookie)?;
        self.pattern.put_oxm(bytes)?;
        OxsStats {
            duration_sec: self.duration_sec,
            duration_nsec: self.duration_nsec,
            idle_age: u32::MAX,
            flow_count: u32::MAX,
            packet_count: self.packet_count,
            byte_count: self.byte_count,
        }
        .put(bytes)
    }

    fn marshal_ofp11(&self, reason: u8, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u8(reason)?;
        bytes.write_u8(self.table_id)?;
        bytes.write_u32::<BigEndian>(self.duration_sec)?;
        bytes.write_u32::<BigEndian>(self.duration_nsec)?;
        bytes.write_u16::<BigEndian>(self.idle_timeout)?;
        bytes.write_u16::<BigEndian>(self.hard_timeout)?;
        bytes.write_u64::<BigEndian>(self.packet_count)?;
        bytes.write_u64::<BigEndian>(self.byte_count)?;
        self.pattern.put_oxm(bytes)?;
        Ok(())
    }

    fn marshal_ofp10(&self, reason: u8, bytes: &mut Vec<u8>) -> Result<()> {
        if self.packet_count == u64::MAX || self.byte_count == u64::MAX {
            debug!("unknown flow removed counters sent as zero");
        }
        self.pattern.marshal_ofp10(bytes)?;
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u8(reason)?;
        bytes.write_u8(0)?;
        bytes.write_u32::<BigEndian>(self.duration_sec)?;
        bytes.write_u32::<BigEndian>(self.duration_nsec)?;
        bytes.write_u16::<BigEndian>(self.idle_timeout)?;
        bytes.write_u16::<BigEndian>(0)?;
        bytes.write_u64::<BigEndian>(unknown_to_zero(self.packet_count))?;
        bytes.write_u64::<BigEndian>(unknown_to_zero(self.byte_count))?;
        Ok(())
    }

    fn marshal_nx(&self, reason: u8, bytes: &mut Vec<u8>) -> Result<()> {
        let start = bytes.len();
        bytes.resize(start + NX_FLOW_REMOVED_LEN, 0);
        let match_len = self.pattern.put_nxm(bytes)?;

        let fixed = &mut bytes[start..start + NX_FLOW_REMOVED_LEN];
        BigEndian::write_u64(&mut fixed[0..8], self.cookie);
        BigEndian::write_u16(&mut fixed[8..10], self.priority);
        fixed[10] = reason;
        fixed[11] = self.table_id.wrapping_add(1);
        BigEndian::write_u32(&mut fixed[12..16], self.duration_sec);
        BigEndian::write_u32(&mut fixed[16..20], self.duration_nsec);
        BigEndian::write_u16(&mut fixed[20..22], self.idle_timeout);
        BigEndian::write_u16(&mut fixed[22..24], match_len as u16);
        BigEndian::write_u64(&mut fixed[24..32], self.packet_count);
        BigEndian::write_u64(&mut fixed[32..40], self.byte_count);
        Ok(())
    }
}

impl OfpMessage for FlowRemoved {
    /// Encode for `protocol`. A meter-delete reason is sent as plain delete to dialects
    /// older than OpenFlow 1.4, which do not define it.
    fn marshal(&self, xid: u32, protocol: Protocol) -> Result<Vec<u8>> {
        let mut reason = self.reason;
        if reason == FlowRemovedReason::MeterDelete &&
           !Protocols::OF14_UP.contains(protocol.into()) {
            debug!(?protocol, "meter_delete reason sent as delete");
            reason = FlowRemovedReason::Delete;
        }
        let reason = reason.wire();
        let version = protocol.version();

        let mut bytes = match protocol {
            Protocol::Of11Std | Protocol::Of12Oxm | Protocol::Of13Oxm | Protocol::Of14Oxm => {
                let mut bytes = OfpRaw::Ofpt11FlowRemoved.alloc(version, xid)?;
                self.marshal_ofp11(reason, &mut bytes)?;
                bytes
            }
            Protocol::Of15Oxm => {
                let mut bytes = OfpRaw::Ofpt15FlowRemoved.alloc(version, xid)?;
                self.marshal_ofp15(reason, &mut bytes)?;
                bytes
            }
            Protocol::Of10Std | Protocol::Of10StdTid => {
                let mut bytes = OfpRaw::Ofpt10FlowRemoved.alloc(version, xid)?;
                self.marshal_ofp10(reason, &mut bytes)?;
                bytes
            }
            Protocol::Of10Nxm | Protocol::Of10NxmTid => {
                let mut bytes = OfpRaw::NxtFlowRemoved.alloc(version, xid)?;
                self.marshal_nx(reason, &mut bytes)?;
                bytes
            }
        };
        OfpHeader::update_length(&mut bytes);
        Ok(bytes)
    }

    fn parse(buf: &[u8]) -> Result<(u32, FlowRemoved)> {
        let (raw, header) = OfpRaw::decode(buf)?;
        let version = OfpVersion::of_wire(header.version())?;
        let mut body = OfpBuf::new(&buf[raw.header_size(version)..header.length()]);
        let fr = match raw {
            OfpRaw::Ofpt15FlowRemoved => FlowRemoved::parse_ofp15(&mut body)?,
            OfpRaw::Ofpt11FlowRemoved => FlowRemoved::parse_ofp11(&mut body)?,
            OfpRaw::Ofpt10FlowRemoved => FlowRemoved::parse_ofp10(&mut body)?,
            OfpRaw::NxtFlowRemoved => FlowRemoved::parse_nx(&mut body)?,
            raw => return Err(OfpError::UnexpectedMessage(raw)),
        };
        Ok((header.xid(), fr))
    }
}
