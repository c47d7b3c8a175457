//! Port and group numbers.
//!
//! Ports are carried canonically as OpenFlow 1.0 16-bit numbers. OpenFlow 1.1 and later
//! widen them to 32 bits and move the reserved ports to the top of that range.

use crate::ofp_error::{OfpError, Result};

/// Reserved OpenFlow 1.0 port numbers.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OfpPort {
    OFPPMax = 0xff00,
    OFPPInPort = 0xfff8,
    OFPPTable = 0xfff9,
    OFPPNormal = 0xfffa,
    OFPPFlood = 0xfffb,
    OFPPAll = 0xfffc,
    OFPPController = 0xfffd,
    OFPPLocal = 0xfffe,
    OFPPNone = 0xffff,
}

/// "Any group", the wildcard for group filters.
pub const OFPG_ANY: u32 = 0xffff_ffff;

/// First reserved OpenFlow 1.1 port.
const OFPP11_MAX: u32 = 0xffff_ff00;
/// Distance between a reserved 1.0 port and its 1.1 equivalent.
const OFPP11_OFFSET: u32 = 0xffff_0000;

/// Convert an OpenFlow 1.1+ port number to its 16-bit form.
///
/// Physical ports below `OFPPMax` and reserved ports at or above `OFPP11_MAX` have
/// 16-bit equivalents; anything in between is `BadOutPort`.
pub fn port_from_ofp11(port: u32) -> Result<u16> {
    if port < OfpPort::OFPPMax as u32 {
        Ok(port as u16)
    } else if port >= OFPP11_MAX {
        Ok((port - OFPP11_OFFSET) as u16)
    } else {
        Err(OfpError::BadOutPort(port))
    }
}

/// Convert a 16-bit port number to its OpenFlow 1.1+ form.
pub fn port_to_ofp11(port: u16) -> u32 {
    if port < OfpPort::OFPPMax as u16 {
        port as u32
    } else {
        port as u32 + OFPP11_OFFSET
    }
}
