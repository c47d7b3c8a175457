use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::ofp_error::{OfpError, Result};

/// OpenFlow protocol versions understood by the monitor codecs.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OfpVersion {
    Of10 = 0x01,
    Of11 = 0x02,
    Of12 = 0x03,
    Of13 = 0x04,
    Of14 = 0x05,
    Of15 = 0x06,
}

impl OfpVersion {
    /// Map a wire version byte to an `OfpVersion`.
    pub fn of_wire(v: u8) -> Result<OfpVersion> {
        match v {
            0x01 => Ok(OfpVersion::Of10),
            0x02 => Ok(OfpVersion::Of11),
            0x03 => Ok(OfpVersion::Of12),
            0x04 => Ok(OfpVersion::Of13),
            0x05 => Ok(OfpVersion::Of14),
            0x06 => Ok(OfpVersion::Of15),
            v => Err(OfpError::UnsupportedVersion(v)),
        }
    }

    /// Return the wire version byte.
    pub fn wire(self) -> u8 {
        self as u8
    }
}

/// OpenFlow Header
///
/// The first fields of every OpenFlow message, no matter the protocol version.
/// This is parsed to determine version and length of the remaining message, so that
/// it can be properly handled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OfpHeader {
    version: u8,
    typ: u8,
    length: u16,
    xid: u32,
}

impl OfpHeader {
    /// Byte offset of the `length` field.
    pub const LENGTH_OFFSET: usize = 2;
    /// Byte offset of the `xid` field.
    pub const XID_OFFSET: usize = 4;

    /// Create an `OfpHeader` out of the arguments.
    pub fn new(version: u8, typ: u8, length: u16, xid: u32) -> OfpHeader {
        OfpHeader {
            version,
            typ,
            length,
            xid,
        }
    }

    /// Return the byte-size of an `OfpHeader`.
    pub fn size() -> usize {
        8
    }

    /// Fills a message buffer with the header fields of an `OfpHeader`.
    pub fn marshal(bytes: &mut Vec<u8>, header: OfpHeader) -> Result<()> {
        bytes.write_u8(header.version)?;
        bytes.write_u8(header.typ)?;
        bytes.write_u16::<BigEndian>(header.length)?;
        bytes.write_u32::<BigEndian>(header.xid)?;
        Ok(())
    }

    /// Takes a message buffer and returns the `OfpHeader` at its start.
    pub fn parse(buf: &[u8]) -> Result<OfpHeader> {
        let mut bytes = Cursor::new(buf);
        Ok(OfpHeader {
            version: bytes.read_u8()?,
            typ: bytes.read_u8()?,
            length: bytes.read_u16::<BigEndian>()?,
            xid: bytes.read_u32::<BigEndian>()?,
        })
    }

    /// Overwrite the `length` field of the message in `msg` with its current size.
    pub fn update_length(msg: &mut [u8]) {
        let len = msg.len();
        debug_assert!(len <= u16::MAX as usize);
        BigEndian::write_u16(&mut msg[Self::LENGTH_OFFSET..Self::LENGTH_OFFSET + 2],
                             len as u16);
    }

    /// Overwrite the `xid` field of the message in `msg`.
    pub fn set_xid(msg: &mut [u8], xid: u32) {
        BigEndian::write_u32(&mut msg[Self::XID_OFFSET..Self::XID_OFFSET + 4], xid);
    }

    /// Return the `version` field of a header.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Return the OpenFlow message type code of a header.
    pub fn type_code(&self) -> u8 {
        self.typ
    }

    /// Return the `length` field of a header. Includes the length of the header itself.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Return the `xid` field of a header, the transaction id associated with this packet.
    ///  Replies use the same id to facilitate pairing.
    pub fn xid(&self) -> u32 {
        self.xid
    }
}
