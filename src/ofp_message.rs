use crate::ofp_error::Result;
use crate::ofp_protocol::Protocol;

/// OpenFlow Message
///
/// Dialect-aware API for handling standalone OpenFlow messages at the byte-buffer level.
pub trait OfpMessage: Sized {
    /// Return a marshaled buffer containing an OpenFlow header with transaction id `xid`
    /// and the message, encoded for `protocol`.
    fn marshal(&self, xid: u32, protocol: Protocol) -> Result<Vec<u8>>;
    /// Returns a pair `(u32, OfpMessage)` of the transaction id and OpenFlow message parsed
    /// from the buffer `buf`, which starts with the OpenFlow header.
    fn parse(buf: &[u8]) -> Result<(u32, Self)>;
}
