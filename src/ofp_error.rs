//! Error types for OpenFlow monitor codecs.

use std::io;

use thiserror::Error;

use crate::ofp_raw::OfpRaw;

/// Result type alias using `OfpError`.
pub type Result<T> = std::result::Result<T, OfpError>;

/// Errors reported while decoding or encoding OpenFlow messages.
///
/// Every decode failure is returned to the immediate caller; nothing is retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfpError {
    /// A length field disagrees with the bytes available, is not a multiple of 8,
    /// or bytes are left over after a fixed-size record.
    #[error("bad length")]
    BadLen,

    /// The message embedded in a request forward has an invalid length.
    #[error("embedded message has bad length")]
    MsgBadLen,

    /// Header names a message type that is not recognized for its version.
    #[error("unrecognized message type {typ} for version {version:#04x}")]
    BadType { version: u8, typ: u8 },

    /// Vendor or experimenter message with an unknown vendor id or subtype.
    #[error("unrecognized experimenter {vendor:#010x} subtype {subtype}")]
    BadExperimenter { vendor: u32, subtype: u32 },

    /// Header carries a version outside OpenFlow 1.0 through 1.5.
    #[error("unsupported OpenFlow version {0:#04x}")]
    UnsupportedVersion(u8),

    /// A cursor was handed a message of a different family than the decoder expects.
    #[error("unexpected {0:?} message")]
    UnexpectedMessage(OfpRaw),

    /// Monitor flags lack add/delete/modify, or a flags field carries bits outside the
    /// set its dialect defines.
    #[error("bad flags {0:#06x}")]
    BadFlags(u16),

    /// Flow monitor request with a command other than add, modify or delete.
    #[error("bad flow monitor command {0}")]
    BadMonitorCommand(u8),

    /// A reserved field that must be zero is not.
    #[error("reserved field is not zero")]
    MustBeZero,

    /// Flow update record with an event code the dialect does not define.
    #[error("bad flow update event {0}")]
    BadEvent(u16),

    /// Forwarded message declares a different version than the message carrying it.
    #[error("inner version {inner:#04x} does not match outer version {outer:#04x}")]
    VersionMismatch { outer: u8, inner: u8 },

    /// Forwarded message is neither a group mod nor a meter mod.
    #[error("cannot forward {0:?} message")]
    UnsupportedInner(OfpRaw),

    /// OpenFlow 1.1+ port number in the range with no 16-bit equivalent.
    #[error("bad port {0:#010x}")]
    BadOutPort(u32),

    /// `ofp_match` of a type other than OXM.
    #[error("unsupported match type {0}")]
    BadMatchType(u16),

    /// Match field that is unknown or has the wrong length.
    #[error("bad match field {0:#010x}")]
    BadMatchField(u32),

    /// Match field present more than once.
    #[error("duplicate match field {0:#010x}")]
    DupMatchField(u32),

    /// Match field mask that is not supported for the field.
    #[error("bad mask for match field {0:#010x}")]
    BadMatchMask(u32),

    /// Match field whose prerequisite fields are absent or inconsistent.
    #[error("match field {0:#010x} lacks its prerequisites")]
    BadPrereq(u32),

    /// Unknown action type.
    #[error("bad action type {0}")]
    BadActionType(u16),

    /// Action whose length is not what its type requires.
    #[error("bad action length")]
    BadActionLen,

    /// Unknown instruction type.
    #[error("bad instruction type {0}")]
    BadInstructionType(u16),

    /// Instruction present more than once.
    #[error("duplicate instruction type {0}")]
    DupInstruction(u16),

    /// Malformed extensible statistics block.
    #[error("bad statistics length")]
    BadStatLen,

    /// Unknown group mod command.
    #[error("bad group command {0}")]
    BadGroupCommand(u16),

    /// Unknown group type.
    #[error("bad group type {0}")]
    BadGroupType(u8),

    /// Unknown or malformed group bucket property.
    #[error("bad bucket property {0}")]
    BadBucketProperty(u16),

    /// Unknown meter mod command.
    #[error("bad meter command {0}")]
    BadMeterCommand(u16),

    /// Unknown meter band type.
    #[error("bad meter band type {0}")]
    BadBandType(u16),

    /// Canonical record that the requested dialect has no encoding for.
    #[error("{what} cannot be encoded for version {version:#04x}")]
    NotExpressible { what: &'static str, version: u8 },
}

impl From<io::Error> for OfpError {
    /// Reads only fail on short input, which is a length error on the wire.
    fn from(_: io::Error) -> OfpError {
        OfpError::BadLen
    }
}
