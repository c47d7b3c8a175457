//! OpenFlow 1.5 extensible flow statistics (OXS).

use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::bits::{pad_len8, round_up8};
use crate::ofp_buf::OfpBuf;
use crate::ofp_error::{OfpError, Result};

const OFPXSC_OPENFLOW_BASIC: u32 = 0x8002;
const OFP_OXS_STAT_HEADER_LEN: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum OxsField {
    Duration = 0,
    IdleTime = 1,
    FlowCount = 3,
    PacketCount = 4,
    ByteCount = 5,
}

impl OxsField {
    fn of_code(code: u32) -> Option<OxsField> {
        match code {
            0 => Some(OxsField::Duration),
            1 => Some(OxsField::IdleTime),
            3 => Some(OxsField::FlowCount),
            4 => Some(OxsField::PacketCount),
            5 => Some(OxsField::ByteCount),
            _ => None,
        }
    }

    fn width(self) -> usize {
        match self {
            OxsField::FlowCount => 4,
            _ => 8,
        }
    }

    fn header(self) -> u32 {
        (OFPXSC_OPENFLOW_BASIC << 16) | ((self as u32) << 9) | self.width() as u32
    }
}

/// Flow statistics. Fields that were not present decode to all-ones.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OxsStats {
    pub duration_sec: u32,
    pub duration_nsec: u32,
    /// Seconds since the flow last matched a packet.
    pub idle_age: u32,
    pub flow_count: u32,
    pub packet_count: u64,
    pub byte_count: u64,
}

impl OxsStats {
    /// Statistics with every field unknown.
    pub fn unknown() -> OxsStats {
        OxsStats {
            duration_sec: u32::MAX,
            duration_nsec: u32::MAX,
            idle_age: u32::MAX,
            flow_count: u32::MAX,
            packet_count: u64::MAX,
            byte_count: u64::MAX,
        }
    }

    /// Pull an `ofp_oxs_stat` block, padding included, from `buf`.
    pub fn pull(buf: &mut OfpBuf) -> Result<OxsStats> {
        let data = buf.data();
        if data.len() < OFP_OXS_STAT_HEADER_LEN {
            return Err(OfpError::BadStatLen);
        }
        let length = BigEndian::read_u16(&data[2..4]) as usize;
        if length < OFP_OXS_STAT_HEADER_LEN || round_up8(length) > data.len() {
            return Err(OfpError::BadStatLen);
        }
        let block = buf.pull(round_up8(length))?;
        let mut fields = &block[OFP_OXS_STAT_HEADER_LEN..length];

        let mut stats = OxsStats::unknown();
        let mut seen = 0u32;
        while !fields.is_empty() {
            if fields.len() < 4 {
                return Err(OfpError::BadStatLen);
            }
            let header = BigEndian::read_u32(&fields[..4]);
            let class = header >> 16;
            let field = OxsField::of_code((header >> 9) & 0x7f);
            let len = (header & 0xff) as usize;
            let field = match field {
                Some(f) if class == OFPXSC_OPENFLOW_BASIC && f.width() == len => f,
                _ => return Err(OfpError::BadStatLen),
            };
            if fields.len() < 4 + len || seen & (1 << field as u32) != 0 {
                return Err(OfpError::BadStatLen);
            }
            seen |= 1 << field as u32;

            let mut value = Cursor::new(&fields[4..4 + len]);
            match field {
                OxsField::Duration => {
                    stats.duration_sec = value.read_u32::<BigEndian>()?;
                    stats.duration_nsec = value.read_u32::<BigEndian>()?;
                }
                OxsField::IdleTime => {
                    stats.idle_age = value.read_u32::<BigEndian>()?;
                }
                OxsField::FlowCount => stats.flow_count = value.read_u32::<BigEndian>()?,
                OxsField::PacketCount => stats.packet_count = value.read_u64::<BigEndian>()?,
                OxsField::ByteCount => stats.byte_count = value.read_u64::<BigEndian>()?,
            }
            fields = &fields[4 + len..];
        }
        Ok(stats)
    }

    /// Append `self` as an `ofp_oxs_stat` block padded to 8 bytes.
    ///
    /// Duration is always written; the other fields only when known.
    pub fn put(&self, out: &mut Vec<u8>) -> Result<()> {
        let start = out.len();
        out.write_u16::<BigEndian>(0)?;
        out.write_u16::<BigEndian>(0)?;

        out.write_u32::<BigEndian>(OxsField::Duration.header())?;
        out.write_u32::<BigEndian>(self.duration_sec)?;
        out.write_u32::<BigEndian>(self.duration_nsec)?;
        if self.idle_age != u32::MAX {
            out.write_u32::<BigEndian>(OxsField::IdleTime.header())?;
            out.write_u32::<BigEndian>(self.idle_age)?;
            out.write_u32::<BigEndian>(0)?;
        }
        if self.packet_count != u64::MAX {
            out.write_u32::<BigEndian>(OxsField::PacketCount.header())?;
            out.write_u64::<BigEndian>(self.packet_count)?;
        }
        if self.byte_count != u64::MAX {
            out.write_u32::<BigEndian>(OxsField::ByteCount.header())?;
            out.write_u64::<BigEndian>(self.byte_count)?;
        }
        if self.flow_count != u32::MAX {
            out.write_u32::<BigEndian>(OxsField::FlowCount.header())?;
            out.write_u32::<BigEndian>(self.flow_count)?;
        }

        let length = out.len() - start;
        BigEndian::write_u16(&mut out[start + 2..start + 4], length as u16);
        out.resize(out.len() + pad_len8(length), 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_unknown_fields() {
        let stats = OxsStats {
            duration_sec: 10,
            duration_nsec: 500,
            packet_count: 7,
            byte_count: 700,
            ..OxsStats::unknown()
        };
        let mut out = vec![];
        stats.put(&mut out).unwrap();
        // header, duration, packets, bytes
        assert_eq!(BigEndian::read_u16(&out[2..4]), 4 + 12 + 12 + 12);
        assert_eq!(out.len(), 40);
        let mut buf = OfpBuf::new(&out);
        assert_eq!(OxsStats::pull(&mut buf).unwrap(), stats);
        assert!(buf.is_empty());
    }

    #[test]
    fn duration_only() {
        let stats = OxsStats {
            duration_sec: 1,
            duration_nsec: 2,
            ..OxsStats::unknown()
        };
        let mut out = vec![];
        stats.put(&mut out).unwrap();
        assert_eq!(out.len(), 16);
        assert_eq!(OxsStats::pull(&mut OfpBuf::new(&out)).unwrap(), stats);
    }

    #[test]
    fn truncated_block() {
        let bytes = [0, 0, 0, 16, 0x80, 0x02, 0x00, 0x08];
        assert_eq!(OxsStats::pull(&mut OfpBuf::new(&bytes)), Err(OfpError::BadStatLen));
    }

    #[test]
    fn duplicate_field() {
        let mut out = vec![0, 0, 0, 20];
        for _ in 0..2 {
            out.extend_from_slice(&OxsField::FlowCount.header().to_be_bytes());
            out.extend_from_slice(&[0, 0, 0, 1]);
        }
        out.extend_from_slice(&[0; 4]);
        assert_eq!(OxsStats::pull(&mut OfpBuf::new(&out)), Err(OfpError::BadStatLen));
    }
}
