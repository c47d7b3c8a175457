//! Meter modification messages (OpenFlow 1.3+).

use std::io::Cursor;

use bitflags::bitflags;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::ofp_buf::OfpBuf;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::{OfpHeader, OfpVersion};
use crate::ofp_message::OfpMessage;
use crate::ofp_protocol::Protocol;
use crate::ofp_raw::OfpRaw;

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeterCommand {
    Add = 0,
    Modify = 1,
    Delete = 2,
}

bitflags! {
    pub struct MeterFlags: u16 {
        const KBPS = 1 << 0;
        const PKTPS = 1 << 1;
        const BURST = 1 << 2;
        const STATS = 1 << 3;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MeterBandKind {
    Drop,
    DscpRemark { prec_level: u8 },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MeterBand {
    pub kind: MeterBandKind,
    pub rate: u32,
    pub burst_size: u32,
}

/// A meter mod and its band list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MeterMod {
    pub command: MeterCommand,
    pub flags: MeterFlags,
    pub meter_id: u32,
    pub bands: Vec<MeterBand>,
}

const OFP13_METER_MOD_LEN: usize = 8;
const OFP13_METER_BAND_LEN: usize = 16;
const OFPMBT13_DROP: u16 = 1;
const OFPMBT13_DSCP_REMARK: u16 = 2;

impl MeterBand {
    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<()> {
        let typ = match self.kind {
            MeterBandKind::Drop => OFPMBT13_DROP,
            MeterBandKind::DscpRemark { .. } => OFPMBT13_DSCP_REMARK,
        };
        bytes.write_u16::<BigEndian>(typ)?;
        bytes.write_u16::<BigEndian>(OFP13_METER_BAND_LEN as u16)?;
        bytes.write_u32::<BigEndian>(self.rate)?;
        bytes.write_u32::<BigEndian>(self.burst_size)?;
        match self.kind {
            MeterBandKind::Drop => bytes.write_u32::<BigEndian>(0)?,
            MeterBandKind::DscpRemark { prec_level } => {
                bytes.write_u8(prec_level)?;
                bytes.extend_from_slice(&[0; 3]);
            }
        }
        Ok(())
    }

    fn parse(buf: &[u8]) -> Result<MeterBand> {
        let mut bytes = Cursor::new(buf);
        let typ = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len != OFP13_METER_BAND_LEN {
            return Err(OfpError::BadLen);
        }
        let rate = bytes.read_u32::<BigEndian>()?;
        let burst_size = bytes.read_u32::<BigEndian>()?;
        let kind = match typ {
            OFPMBT13_DROP => MeterBandKind::Drop,
            OFPMBT13_DSCP_REMARK => MeterBandKind::DscpRemark { prec_level: bytes.read_u8()? },
            t => return Err(OfpError::BadBandType(t)),
        };
        Ok(MeterBand {
            kind,
            rate,
            burst_size,
        })
    }
}

impl OfpMessage for MeterMod {
    fn marshal(&self, xid: u32, protocol: Protocol) -> Result<Vec<u8>> {
        let version = protocol.version();
        if version < OfpVersion::Of13 {
            return Err(OfpError::NotExpressible {
                what: "meter mod",
                version: version.wire(),
            });
        }
        let mut bytes = OfpRaw::Ofpt13MeterMod.alloc(version, xid)?;
        bytes.write_u16::<BigEndian>(self.command as u16)?;
        bytes.write_u16::<BigEndian>(self.flags.bits())?;
        bytes.write_u32::<BigEndian>(self.meter_id)?;
        for band in &self.bands {
            band.marshal(&mut bytes)?;
        }
        OfpHeader::update_length(&mut bytes);
        Ok(bytes)
    }

    fn parse(buf: &[u8]) -> Result<(u32, MeterMod)> {
        let (raw, header) = OfpRaw::decode(buf)?;
        if raw != OfpRaw::Ofpt13MeterMod {
            return Err(OfpError::UnexpectedMessage(raw));
        }
        let version = OfpVersion::of_wire(header.version())?;
        let mut body = OfpBuf::new(&buf[raw.header_size(version)..header.length()]);

        let mut bytes = Cursor::new(body.pull(OFP13_METER_MOD_LEN)?);
        let command = match bytes.read_u16::<BigEndian>()? {
            0 => MeterCommand::Add,
            1 => MeterCommand::Modify,
            2 => MeterCommand::Delete,
            c => return Err(OfpError::BadMeterCommand(c)),
        };
        let flags = bytes.read_u16::<BigEndian>()?;
        let flags = MeterFlags::from_bits(flags).ok_or(OfpError::BadFlags(flags))?;
        let meter_id = bytes.read_u32::<BigEndian>()?;

        if body.len() % OFP13_METER_BAND_LEN != 0 {
            return Err(OfpError::BadLen);
        }
        let mut bands = Vec::with_capacity(body.len() / OFP13_METER_BAND_LEN);
        while !body.is_empty() {
            bands.push(MeterBand::parse(body.pull(OFP13_METER_BAND_LEN)?)?);
        }
        Ok((header.xid(),
            MeterMod {
                command,
                flags,
                meter_id,
                bands,
            }))
    }
}
