//! Recognition and allocation of the raw OpenFlow message types handled by this crate.
//!
//! A raw type pins down the exact header layout of a message: plain OpenFlow type,
//! Nicira/ONF vendor message, statistics (multipart) message, or vendor statistics
//! message. Decoders use it once per message to pick the record layout of the body.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};

use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::{OfpHeader, OfpVersion};

/// Nicira vendor id.
pub const NX_VENDOR_ID: u32 = 0x0000_2320;
/// Open Networking Foundation experimenter id.
pub const ONF_VENDOR_ID: u32 = 0x4f4e_4600;

const OFPT_VENDOR: u8 = 4;
const OFPT_FLOW_REMOVED: u8 = 11;
const OFPT11_GROUP_MOD: u8 = 15;
const OFPT10_STATS_REQUEST: u8 = 16;
const OFPT10_STATS_REPLY: u8 = 17;
const OFPT11_STATS_REQUEST: u8 = 18;
const OFPT11_STATS_REPLY: u8 = 19;
const OFPT13_METER_MOD: u8 = 29;
const OFPT14_REQUESTFORWARD: u8 = 32;

const OFPST_VENDOR: u16 = 0xffff;
const OFPMP14_FLOW_MONITOR: u16 = 16;

const NXT_FLOW_REMOVED: u32 = 14;
const NXT_FLOW_MONITOR_CANCEL: u32 = 21;
const NXT_FLOW_MONITOR_PAUSED: u32 = 22;
const NXT_FLOW_MONITOR_RESUMED: u32 = 23;
const NXT_REQUESTFORWARD: u32 = 132;
const NXST_FLOW_MONITOR: u32 = 2;

const ONFST_FLOW_MONITOR: u32 = 1870;
const ONFT_FLOW_MONITOR_CANCEL: u32 = 1870;
const ONFT_FLOW_MONITOR_PAUSED: u32 = 1871;
const ONFT_FLOW_MONITOR_RESUMED: u32 = 1872;
const ONFT_REQUESTFORWARD: u32 = 2350;

/// Byte offset of the `flags` field in every statistics header.
const STATS_FLAGS_OFFSET: usize = 10;
/// More replies follow this one.
pub const OFPSF_REPLY_MORE: u16 = 1 << 0;

/// Raw message types understood by the monitor codecs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum OfpRaw {
    Ofpt10FlowRemoved,
    Ofpt11FlowRemoved,
    Ofpt15FlowRemoved,
    NxtFlowRemoved,

    NxstFlowMonitorRequest,
    Onfst13FlowMonitorRequest,
    Ofpst14FlowMonitorRequest,
    NxstFlowMonitorReply,
    Onfst13FlowMonitorReply,
    Ofpst14FlowMonitorReply,

    NxtFlowMonitorCancel,
    Onft13FlowMonitorCancel,
    NxtFlowMonitorPaused,
    NxtFlowMonitorResumed,
    Onft13FlowMonitorPaused,
    Onft13FlowMonitorResumed,

    NxtRequestForward,
    Onft13RequestForward,
    Ofpt14RequestForward,

    Ofpt11GroupMod,
    Ofpt13MeterMod,
}

/// How a raw type lays out its header.
enum Layout {
    Plain(u8),
    Vendor(u32, u32),
    Stats { request: bool, typ: u16 },
    VendorStats { request: bool, vendor: u32, subtype: u32 },
}

impl OfpRaw {
    fn layout(self) -> Layout {
        match self {
            OfpRaw::Ofpt10FlowRemoved |
            OfpRaw::Ofpt11FlowRemoved |
            OfpRaw::Ofpt15FlowRemoved => Layout::Plain(OFPT_FLOW_REMOVED),
            OfpRaw::NxtFlowRemoved => Layout::Vendor(NX_VENDOR_ID, NXT_FLOW_REMOVED),
            OfpRaw::NxstFlowMonitorRequest => {
                Layout::VendorStats {
                    request: true,
                    vendor: NX_VENDOR_ID,
                    subtype: NXST_FLOW_MONITOR,
                }
            }
            OfpRaw::NxstFlowMonitorReply => {
                Layout::VendorStats {
                    request: false,
                    vendor: NX_VENDOR_ID,
                    subtype: NXST_FLOW_MONITOR,
                }
            }
            OfpRaw::Onfst13FlowMonitorRequest => {
                Layout::VendorStats {
                    request: true,
                    vendor: ONF_VENDOR_ID,
                    subtype: ONFST_FLOW_MONITOR,
                }
            }
            OfpRaw::Onfst13FlowMonitorReply => {
                Layout::VendorStats {
                    request: false,
                    vendor: ONF_VENDOR_ID,
                    subtype: ONFST_FLOW_MONITOR,
                }
            }
            OfpRaw::Ofpst14FlowMonitorRequest => {
                Layout::Stats {
                    request: true,
                    typ: OFPMP14_FLOW_MONITOR,
                }
            }
            OfpRaw::Ofpst14FlowMonitorReply => {
                Layout::Stats {
                    request: false,
                    typ: OFPMP14_FLOW_MONITOR,
                }
            }
            OfpRaw::NxtFlowMonitorCancel => Layout::Vendor(NX_VENDOR_ID, NXT_FLOW_MONITOR_CANCEL),
            OfpRaw::NxtFlowMonitorPaused => Layout::Vendor(NX_VENDOR_ID, NXT_FLOW_MONITOR_PAUSED),
            OfpRaw::NxtFlowMonitorResumed => {
                Layout::Vendor(NX_VENDOR_ID, NXT_FLOW_MONITOR_RESUMED)
            }
            OfpRaw::Onft13FlowMonitorCancel => {
                Layout::Vendor(ONF_VENDOR_ID, ONFT_FLOW_MONITOR_CANCEL)
            }
            OfpRaw::Onft13FlowMonitorPaused => {
                Layout::Vendor(ONF_VENDOR_ID, ONFT_FLOW_MONITOR_PAUSED)
            }
            OfpRaw::Onft13FlowMonitorResumed => {
                Layout::Vendor(ONF_VENDOR_ID, ONFT_FLOW_MONITOR_RESUMED)
            }
            OfpRaw::NxtRequestForward => Layout::Vendor(NX_VENDOR_ID, NXT_REQUESTFORWARD),
            OfpRaw::Onft13RequestForward => Layout::Vendor(ONF_VENDOR_ID, ONFT_REQUESTFORWARD),
            OfpRaw::Ofpt14RequestForward => Layout::Plain(OFPT14_REQUESTFORWARD),
            OfpRaw::Ofpt11GroupMod => Layout::Plain(OFPT11_GROUP_MOD),
            OfpRaw::Ofpt13MeterMod => Layout::Plain(OFPT13_METER_MOD),
        }
    }

    /// Return the byte-size of the header of a `self` message in `version`, including
    /// any vendor or statistics header that precedes the body.
    pub fn header_size(self, version: OfpVersion) -> usize {
        match self.layout() {
            Layout::Plain(_) => OfpHeader::size(),
            Layout::Vendor(_, _) => OfpHeader::size() + 8,
            Layout::Stats { .. } => {
                if version == OfpVersion::Of10 {
                    OfpHeader::size() + 4
                } else {
                    OfpHeader::size() + 8
                }
            }
            Layout::VendorStats { .. } => OfpHeader::size() + 16,
        }
    }

    /// Test whether `self` is a multipart (statistics) message.
    pub fn is_stats(self) -> bool {
        match self.layout() {
            Layout::Stats { .. } |
            Layout::VendorStats { .. } => true,
            _ => false,
        }
    }

    /// Append the header of a `self` message for `version` with transaction id `xid` to
    /// `out`. The length field is left to `OfpHeader::update_length`.
    pub fn put(self, version: OfpVersion, xid: u32, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        let stats_type = |request: bool| match (version, request) {
            (OfpVersion::Of10, true) => OFPT10_STATS_REQUEST,
            (OfpVersion::Of10, false) => OFPT10_STATS_REPLY,
            (_, true) => OFPT11_STATS_REQUEST,
            (_, false) => OFPT11_STATS_REPLY,
        };
        match self.layout() {
            Layout::Plain(typ) => OfpHeader::marshal(out, OfpHeader::new(version.wire(), typ, 0, xid))?,
            Layout::Vendor(vendor, subtype) => {
                OfpHeader::marshal(out, OfpHeader::new(version.wire(), OFPT_VENDOR, 0, xid))?;
                out.write_u32::<BigEndian>(vendor)?;
                out.write_u32::<BigEndian>(subtype)?;
            }
            Layout::Stats { request, typ } => {
                let hdr = OfpHeader::new(version.wire(), stats_type(request), 0, xid);
                OfpHeader::marshal(out, hdr)?;
                out.write_u16::<BigEndian>(typ)?;
                out.write_u16::<BigEndian>(0)?;
                if version != OfpVersion::Of10 {
                    out.write_u32::<BigEndian>(0)?;
                }
            }
            Layout::VendorStats { request, vendor, subtype } => {
                let hdr = OfpHeader::new(version.wire(), stats_type(request), 0, xid);
                OfpHeader::marshal(out, hdr)?;
                out.write_u16::<BigEndian>(OFPST_VENDOR)?;
                out.write_u16::<BigEndian>(0)?;
                if version == OfpVersion::Of10 {
                    out.write_u32::<BigEndian>(vendor)?;
                    out.write_u32::<BigEndian>(subtype)?;
                    out.write_u32::<BigEndian>(0)?;
                } else {
                    out.write_u32::<BigEndian>(0)?;
                    out.write_u32::<BigEndian>(vendor)?;
                    out.write_u32::<BigEndian>(subtype)?;
                }
            }
        }
        OfpHeader::update_length(&mut out[start..]);
        Ok(())
    }

    /// Return a new message holding only the header of a `self` message.
    pub fn alloc(self, version: OfpVersion, xid: u32) -> Result<Vec<u8>> {
        let mut msg = Vec::with_capacity(self.header_size(version));
        self.put(version, xid, &mut msg)?;
        Ok(msg)
    }

    /// Recognize the raw type of the message at the start of `msg`.
    ///
    /// The header's length must fit in `msg` and cover the whole raw header.
    pub fn decode(msg: &[u8]) -> Result<(OfpRaw, OfpHeader)> {
        let header = OfpHeader::parse(msg)?;
        let version = OfpVersion::of_wire(header.version())?;
        if header.length() < OfpHeader::size() || header.length() > msg.len() {
            return Err(OfpError::BadLen);
        }
        let msg = &msg[..header.length()];
        let bad_type = OfpError::BadType {
            version: header.version(),
            typ: header.type_code(),
        };

        let raw = match header.type_code() {
            OFPT_FLOW_REMOVED => {
                match version {
                    OfpVersion::Of10 => OfpRaw::Ofpt10FlowRemoved,
                    OfpVersion::Of15 => OfpRaw::Ofpt15FlowRemoved,
                    _ => OfpRaw::Ofpt11FlowRemoved,
                }
            }
            OFPT_VENDOR => {
                if msg.len() < 16 {
                    return Err(OfpError::BadLen);
                }
                let vendor = BigEndian::read_u32(&msg[8..12]);
                let subtype = BigEndian::read_u32(&msg[12..16]);
                OfpRaw::of_vendor(version, vendor, subtype)?
            }
            t if t == OFPT10_STATS_REQUEST && version == OfpVersion::Of10 => {
                OfpRaw::of_stats(version, true, msg)?
            }
            t if t == OFPT10_STATS_REPLY && version == OfpVersion::Of10 => {
                OfpRaw::of_stats(version, false, msg)?
            }
            t if t == OFPT11_STATS_REQUEST && version >= OfpVersion::Of11 => {
                OfpRaw::of_stats(version, true, msg)?
            }
            t if t == OFPT11_STATS_REPLY && version >= OfpVersion::Of11 => {
                OfpRaw::of_stats(version, false, msg)?
            }
            t if t == OFPT11_GROUP_MOD && version >= OfpVersion::Of11 => OfpRaw::Ofpt11GroupMod,
            t if t == OFPT13_METER_MOD && version >= OfpVersion::Of13 => OfpRaw::Ofpt13MeterMod,
            t if t == OFPT14_REQUESTFORWARD && version >= OfpVersion::Of14 => {
                OfpRaw::Ofpt14RequestForward
            }
            _ => return Err(bad_type),
        };

        if msg.len() < raw.header_size(version) {
            return Err(OfpError::BadLen);
        }
        Ok((raw, header))
    }

    fn of_vendor(version: OfpVersion, vendor: u32, subtype: u32) -> Result<OfpRaw> {
        let raw = match (vendor, subtype) {
            (NX_VENDOR_ID, NXT_FLOW_REMOVED) => Some(OfpRaw::NxtFlowRemoved),
            (NX_VENDOR_ID, NXT_FLOW_MONITOR_CANCEL) => Some(OfpRaw::NxtFlowMonitorCancel),
            (NX_VENDOR_ID, NXT_FLOW_MONITOR_PAUSED) => Some(OfpRaw::NxtFlowMonitorPaused),
            (NX_VENDOR_ID, NXT_FLOW_MONITOR_RESUMED) => Some(OfpRaw::NxtFlowMonitorResumed),
            (NX_VENDOR_ID, NXT_REQUESTFORWARD) => Some(OfpRaw::NxtRequestForward),
            (ONF_VENDOR_ID, _) if version != OfpVersion::Of13 => None,
            (ONF_VENDOR_ID, ONFT_FLOW_MONITOR_CANCEL) => Some(OfpRaw::Onft13FlowMonitorCancel),
            (ONF_VENDOR_ID, ONFT_FLOW_MONITOR_PAUSED) => Some(OfpRaw::Onft13FlowMonitorPaused),
            (ONF_VENDOR_ID, ONFT_FLOW_MONITOR_RESUMED) => Some(OfpRaw::Onft13FlowMonitorResumed),
            (ONF_VENDOR_ID, ONFT_REQUESTFORWARD) => Some(OfpRaw::Onft13RequestForward),
            _ => None,
        };
        raw.ok_or(OfpError::BadExperimenter { vendor, subtype })
    }

    fn of_stats(version: OfpVersion, request: bool, msg: &[u8]) -> Result<OfpRaw> {
        if msg.len() < 12 {
            return Err(OfpError::BadLen);
        }
        let typ = BigEndian::read_u16(&msg[8..10]);
        if typ == OFPMP14_FLOW_MONITOR && version >= OfpVersion::Of14 {
            return Ok(if request {
                OfpRaw::Ofpst14FlowMonitorRequest
            } else {
                OfpRaw::Ofpst14FlowMonitorReply
            });
        }
        if typ != OFPST_VENDOR {
            return Err(OfpError::BadType {
                version: version.wire(),
                typ: msg[1],
            });
        }
        if msg.len() < 24 {
            return Err(OfpError::BadLen);
        }
        let (vendor, subtype) = if version == OfpVersion::Of10 {
            (BigEndian::read_u32(&msg[12..16]), BigEndian::read_u32(&msg[16..20]))
        } else {
            (BigEndian::read_u32(&msg[16..20]), BigEndian::read_u32(&msg[20..24]))
        };
        match (vendor, subtype, request) {
            (NX_VENDOR_ID, NXST_FLOW_MONITOR, true) => Ok(OfpRaw::NxstFlowMonitorRequest),
            (NX_VENDOR_ID, NXST_FLOW_MONITOR, false) => Ok(OfpRaw::NxstFlowMonitorReply),
            (ONF_VENDOR_ID, ONFST_FLOW_MONITOR, true) if version == OfpVersion::Of13 => {
                Ok(OfpRaw::Onfst13FlowMonitorRequest)
            }
            (ONF_VENDOR_ID, ONFST_FLOW_MONITOR, false) if version == OfpVersion::Of13 => {
                Ok(OfpRaw::Onfst13FlowMonitorReply)
            }
            _ => Err(OfpError::BadExperimenter { vendor, subtype }),
        }
    }
}

/// Return the statistics flags of the multipart message `msg`.
pub fn stats_flags(msg: &[u8]) -> u16 {
    BigEndian::read_u16(&msg[STATS_FLAGS_OFFSET..STATS_FLAGS_OFFSET + 2])
}

/// Overwrite the statistics flags of the multipart message `msg`.
pub fn set_stats_flags(msg: &mut [u8], flags: u16) {
    BigEndian::write_u16(&mut msg[STATS_FLAGS_OFFSET..STATS_FLAGS_OFFSET + 2], flags)
}
