//! Requestforward notifications, which echo a group or meter modification made by one
//! controller to the other controllers attached to a switch.
//!
//! The forwarded request travels verbatim after the outer header and must share its
//! version. The transaction id lives in the inner header; the outer one carries 0.

use std::borrow::Cow;

use tracing::debug;

use crate::ofp_buf::OfpMsgCursor;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_group::GroupMod;
use crate::ofp_header::{OfpHeader, OfpVersion};
use crate::ofp_message::OfpMessage;
use crate::ofp_meter::MeterMod;
use crate::ofp_protocol::Protocol;
use crate::ofp_raw::OfpRaw;

/// Why a request was forwarded, with its OpenFlow 1.4 code.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestForwardReason {
    GroupMod = 0,
    MeterMod = 1,
}

/// The forwarded request. Borrowed when built for encoding, owned after decoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardedRequest<'a> {
    GroupMod(Cow<'a, GroupMod>),
    MeterMod(Cow<'a, MeterMod>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestForward<'a> {
    pub xid: u32,
    pub request: ForwardedRequest<'a>,
}

fn outer_raw(version: OfpVersion) -> OfpRaw {
    match version {
        OfpVersion::Of10 | OfpVersion::Of11 | OfpVersion::Of12 => OfpRaw::NxtRequestForward,
        OfpVersion::Of13 => OfpRaw::Onft13RequestForward,
        OfpVersion::Of14 | OfpVersion::Of15 => OfpRaw::Ofpt14RequestForward,
    }
}

impl<'a> RequestForward<'a> {
    pub fn group_mod(xid: u32, gm: &'a GroupMod) -> RequestForward<'a> {
        RequestForward {
            xid,
            request: ForwardedRequest::GroupMod(Cow::Borrowed(gm)),
        }
    }

    pub fn meter_mod(xid: u32, mm: &'a MeterMod) -> RequestForward<'a> {
        RequestForward {
            xid,
            request: ForwardedRequest::MeterMod(Cow::Borrowed(mm)),
        }
    }

    pub fn reason(&self) -> RequestForwardReason {
        match self.request {
            ForwardedRequest::GroupMod(_) => RequestForwardReason::GroupMod,
            ForwardedRequest::MeterMod(_) => RequestForwardReason::MeterMod,
        }
    }

    /// Encode `self` as a requestforward message for `protocol`.
    pub fn encode(&self, protocol: Protocol) -> Result<Vec<u8>> {
        let inner = match self.request {
            ForwardedRequest::GroupMod(ref gm) => gm.marshal(self.xid, protocol)?,
            ForwardedRequest::MeterMod(ref mm) => mm.marshal(self.xid, protocol)?,
        };
        let version = protocol.version();
        let mut msg = outer_raw(version).alloc(version, 0)?;
        msg.extend_from_slice(&inner);
        OfpHeader::update_length(&mut msg);
        Ok(msg)
    }

    /// Decode a requestforward message. The result owns its request.
    pub fn decode(msg: &[u8]) -> Result<RequestForward<'static>> {
        let mut cursor = OfpMsgCursor::new(msg);
        let (raw, version) = cursor.recognize()?;
        match raw {
            OfpRaw::NxtRequestForward | OfpRaw::Onft13RequestForward |
            OfpRaw::Ofpt14RequestForward => (),
            raw => return Err(OfpError::UnexpectedMessage(raw)),
        }
        let body = cursor.body().data();
        if body.len() < OfpHeader::size() {
            return Err(OfpError::MsgBadLen);
        }
        let inner_header = OfpHeader::parse(body)?;
        if inner_header.length() < OfpHeader::size() || inner_header.length() > body.len() {
            return Err(OfpError::MsgBadLen);
        }
        if inner_header.version() != version.wire() {
            return Err(OfpError::VersionMismatch {
                outer: version.wire(),
                inner: inner_header.version(),
            });
        }
        let inner = &body[..inner_header.length()];
        let xid = inner_header.xid();

        let request = match OfpRaw::decode(inner)?.0 {
            OfpRaw::Ofpt11GroupMod => {
                ForwardedRequest::GroupMod(Cow::Owned(GroupMod::parse(inner)?.1))
            }
            OfpRaw::Ofpt13MeterMod => {
                ForwardedRequest::MeterMod(Cow::Owned(MeterMod::parse(inner)?.1))
            }
            raw => {
                debug!("requestforward carries unsupported {:?}", raw);
                return Err(OfpError::UnsupportedInner(raw));
            }
        };
        Ok(RequestForward { xid, request })
    }

    /// Return a copy of `self` that owns its request.
    pub fn into_owned(self) -> RequestForward<'static> {
        let request = match self.request {
            ForwardedRequest::GroupMod(gm) => ForwardedRequest::GroupMod(Cow::Owned(gm.into_owned())),
            ForwardedRequest::MeterMod(mm) => ForwardedRequest::MeterMod(Cow::Owned(mm.into_owned())),
        };
        RequestForward {
            xid: self.xid,
            request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ofp_actions::Ofpact;
    use crate::ofp_group::{Bucket, GroupCommand, GroupType, OFPG15_BUCKET_ALL};
    use crate::ofp_meter::{MeterBand, MeterBandKind, MeterCommand, MeterFlags};

    fn group() -> GroupMod {
        GroupMod {
            command: GroupCommand::Modify,
            group_type: GroupType::All,
            group_id: 12,
            command_bucket_id: OFPG15_BUCKET_ALL,
            buckets: vec![Bucket::new(0,
                                      vec![Ofpact::Output {
                                               port: 3,
                                               max_len: 0,
                                           }])],
        }
    }

    fn meter() -> MeterMod {
        MeterMod {
            command: MeterCommand::Modify,
            flags: MeterFlags::PKTPS,
            meter_id: 4,
            bands: vec![MeterBand {
                            kind: MeterBandKind::Drop,
                            rate: 10,
                            burst_size: 0,
                        }],
        }
    }

    #[test]
    fn group_mod_every_dialect() {
        let gm = group();
        let rf = RequestForward::group_mod(0x77, &gm);
        assert_eq!(rf.reason(), RequestForwardReason::GroupMod);
        for &p in Protocol::ALL.iter() {
            if p.version() == OfpVersion::Of10 {
                assert!(rf.encode(p).is_err());
                continue;
            }
            let msg = rf.encode(p).unwrap();
            let decoded = RequestForward::decode(&msg).unwrap();
            assert_eq!(decoded, rf, "{:?}", p);
        }
    }

    #[test]
    fn xid_travels_in_inner_header() {
        let mm = meter();
        let msg = RequestForward::meter_mod(0xabcd, &mm).encode(Protocol::Of14Oxm).unwrap();
        assert_eq!(OfpHeader::parse(&msg).unwrap().xid(), 0);
        let inner = OfpHeader::parse(&msg[8..]).unwrap();
        assert_eq!(inner.xid(), 0xabcd);
        assert_eq!(inner.length(), msg.len() - 8);
        assert_eq!(msg[8 + 1], 29);
    }

    #[test]
    fn decode_takes_inner_xid() {
        let mut msg = OfpRaw::Ofpt14RequestForward.alloc(OfpVersion::Of14, 0).unwrap();
        msg.extend_from_slice(&meter().marshal(0x77, Protocol::Of14Oxm).unwrap());
        OfpHeader::update_length(&mut msg);
        let decoded = RequestForward::decode(&msg).unwrap();
        assert_eq!(decoded.xid, 0x77);
        assert_eq!(decoded.request, ForwardedRequest::MeterMod(Cow::Owned(meter())));
    }

    #[test]
    fn onf_wrapper() {
        let mm = meter();
        let rf = RequestForward::meter_mod(1, &mm);
        let msg = rf.encode(Protocol::Of13Oxm).unwrap();
        assert_eq!(msg[1], 4);
        let decoded = RequestForward::decode(&msg).unwrap();
        assert_eq!(decoded.reason(), RequestForwardReason::MeterMod);
        assert_eq!(decoded, rf);
    }

    #[test]
    fn version_mismatch() {
        let mm = meter();
        let mut msg = RequestForward::meter_mod(1, &mm).encode(Protocol::Of14Oxm).unwrap();
        msg[8] = 0x06;
        assert_eq!(RequestForward::decode(&msg),
                   Err(OfpError::VersionMismatch {
                       outer: 0x05,
                       inner: 0x06,
                   }));
    }

    #[test]
    fn inner_overruns_outer() {
        let mm = meter();
        let mut msg = RequestForward::meter_mod(1, &mm).encode(Protocol::Of14Oxm).unwrap();
        msg[8 + 3] += 8;
        assert_eq!(RequestForward::decode(&msg), Err(OfpError::MsgBadLen));

        let mut short = RequestForward::meter_mod(1, &mm).encode(Protocol::Of14Oxm).unwrap();
        short.truncate(8 + 4);
        OfpHeader::update_length(&mut short);
        assert_eq!(RequestForward::decode(&short), Err(OfpError::MsgBadLen));
    }

    #[test]
    fn unsupported_inner() {
        let mut msg = OfpRaw::Ofpt14RequestForward.alloc(OfpVersion::Of14, 5).unwrap();
        msg.extend_from_slice(&OfpRaw::Ofpt15FlowRemoved.alloc(OfpVersion::Of14, 5).unwrap());
        OfpHeader::update_length(&mut msg);
        assert_eq!(RequestForward::decode(&msg),
                   Err(OfpError::UnsupportedInner(OfpRaw::Ofpt11FlowRemoved)));
    }

    #[test]
    fn bad_inner_is_reported() {
        let mm = meter();
        let mut msg = RequestForward::meter_mod(1, &mm).encode(Protocol::Of14Oxm).unwrap();
        msg[8 + 8 + 1] = 7;
        assert_eq!(RequestForward::decode(&msg), Err(OfpError::BadMeterCommand(7)));
    }

    #[test]
    fn decoded_outlives_message() {
        let gm = group();
        let decoded = {
            let msg = RequestForward::group_mod(9, &gm).encode(Protocol::Of15Oxm).unwrap();
            RequestForward::decode(&msg).unwrap()
        };
        assert_eq!(decoded.into_owned(), RequestForward::group_mod(9, &gm));
    }
}
