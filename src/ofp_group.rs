//! Group modification messages (OpenFlow 1.1+).

use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::bits::round_up8;
use crate::ofp_actions::{actions_len, pull_actions, put_actions, Ofpact};
use crate::ofp_buf::OfpBuf;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::{OfpHeader, OfpVersion};
use crate::ofp_message::OfpMessage;
use crate::ofp_port::{port_from_ofp11, port_to_ofp11, OfpPort, OFPG_ANY};
use crate::ofp_protocol::Protocol;
use crate::ofp_raw::OfpRaw;

/// Bucket id meaning "all buckets" in an OpenFlow 1.5 group mod.
pub const OFPG15_BUCKET_ALL: u32 = 0xffff_fffc;

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupCommand {
    Add = 0,
    Modify = 1,
    Delete = 2,
    /// OpenFlow 1.5 only.
    InsertBucket = 3,
    /// OpenFlow 1.5 only.
    RemoveBucket = 5,
}

impl GroupCommand {
    fn of_wire(cmd: u16, version: OfpVersion) -> Result<GroupCommand> {
        match cmd {
            0 => Ok(GroupCommand::Add),
            1 => Ok(GroupCommand::Modify),
            2 => Ok(GroupCommand::Delete),
            3 if version >= OfpVersion::Of15 => Ok(GroupCommand::InsertBucket),
            5 if version >= OfpVersion::Of15 => Ok(GroupCommand::RemoveBucket),
            c => Err(OfpError::BadGroupCommand(c)),
        }
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupType {
    All = 0,
    Select = 1,
    Indirect = 2,
    FastFailover = 3,
}

impl GroupType {
    fn of_wire(t: u8) -> Result<GroupType> {
        match t {
            0 => Ok(GroupType::All),
            1 => Ok(GroupType::Select),
            2 => Ok(GroupType::Indirect),
            3 => Ok(GroupType::FastFailover),
            t => Err(OfpError::BadGroupType(t)),
        }
    }
}

/// One bucket of a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    /// Bucket position for OpenFlow 1.1 to 1.4, which carry no ids.
    pub bucket_id: u32,
    pub weight: u16,
    pub watch_port: u16,
    pub watch_group: u32,
    pub actions: Vec<Ofpact>,
}

impl Bucket {
    pub fn new(bucket_id: u32, actions: Vec<Ofpact>) -> Bucket {
        Bucket {
            bucket_id,
            weight: 1,
            watch_port: OfpPort::OFPPNone as u16,
            watch_group: OFPG_ANY,
            actions,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMod {
    pub command: GroupCommand,
    pub group_type: GroupType,
    pub group_id: u32,
    /// Target bucket of an OpenFlow 1.5 insert or remove.
    pub command_bucket_id: u32,
    pub buckets: Vec<Bucket>,
}

const OFP11_GROUP_MOD_LEN: usize = 8;
const OFP11_BUCKET_LEN: usize = 16;
const OFP15_GROUP_MOD_LEN: usize = 16;
const OFP15_BUCKET_LEN: usize = 8;

#[repr(u16)]
enum OfpGroupBucketProp {
    Weight = 0,
    WatchPort = 1,
    WatchGroup = 2,
}

const BUCKET_PROP_LEN: usize = 8;

impl GroupMod {
    fn marshal_ofp11(&self, version: OfpVersion, bytes: &mut Vec<u8>) -> Result<()> {
        bytes.write_u16::<BigEndian>(self.command as u16)?;
        bytes.write_u8(self.group_type as u8)?;
        bytes.write_u8(0)?;
        bytes.write_u32::<BigEndian>(self.group_id)?;
        for b in &self.buckets {
            let len = OFP11_BUCKET_LEN + actions_len(&b.actions, version);
            bytes.write_u16::<BigEndian>(len as u16)?;
            bytes.write_u16::<BigEndian>(b.weight)?;
            bytes.write_u32::<BigEndian>(port_to_ofp11(b.watch_port))?;
            bytes.write_u32::<BigEndian>(b.watch_group)?;
            bytes.write_u32::<BigEndian>(0)?;
            put_actions(&b.actions, bytes, version)?;
        }
        Ok(())
    }

    fn marshal_ofp15(&self, version: OfpVersion, bytes: &mut Vec<u8>) -> Result<()> {
        let start = bytes.len();
        bytes.write_u16::<BigEndian>(self.command as u16)?;
        bytes.write_u8(self.group_type as u8)?;
        bytes.write_u8(0)?;
        bytes.write_u32::<BigEndian>(self.group_id)?;
        bytes.write_u16::<BigEndian>(0)?;
        bytes.write_u16::<BigEndian>(0)?;
        bytes.write_u32::<BigEndian>(self.command_bucket_id)?;
        let buckets_start = bytes.len();
        for b in &self.buckets {
            let action_array_len = actions_len(&b.actions, version);
            let len = OFP15_BUCKET_LEN + action_array_len + 3 * BUCKET_PROP_LEN;
            bytes.write_u16::<BigEndian>(len as u16)?;
            bytes.write_u16::<BigEndian>(action_array_len as u16)?;
            bytes.write_u32::<BigEndian>(b.bucket_id)?;
            put_actions(&b.actions, bytes, version)?;

            bytes.write_u16::<BigEndian>(OfpGroupBucketProp::Weight as u16)?;
            bytes.write_u16::<BigEndian>(BUCKET_PROP_LEN as u16 - 2)?;
            bytes.write_u16::<BigEndian>(b.weight)?;
            bytes.write_u16::<BigEndian>(0)?;
            bytes.write_u16::<BigEndian>(OfpGroupBucketProp::WatchPort as u16)?;
            bytes.write_u16::<BigEndian>(BUCKET_PROP_LEN as u16)?;
            bytes.write_u32::<BigEndian>(port_to_ofp11(b.watch_port))?;
            bytes.write_u16::<BigEndian>(OfpGroupBucketProp::WatchGroup as u16)?;
            bytes.write_u16::<BigEndian>(BUCKET_PROP_LEN as u16)?;
            bytes.write_u32::<BigEndian>(b.watch_group)?;
        }
        let bucket_array_len = (bytes.len() - buckets_start) as u16;
        BigEndian::write_u16(&mut bytes[start + 8..start + 10], bucket_array_len);
        Ok(())
    }

    fn parse_ofp11(version: OfpVersion, body: &[u8]) -> Result<GroupMod> {
        let mut buf = OfpBuf::new(body);
        let mut bytes = Cursor::new(buf.pull(OFP11_GROUP_MOD_LEN)?);
        let command = GroupCommand::of_wire(bytes.read_u16::<BigEndian>()?, version)?;
        let group_type = GroupType::of_wire(bytes.read_u8()?)?;
        let _pad = bytes.read_u8()?;
        let group_id = bytes.read_u32::<BigEndian>()?;

        let mut buckets = vec![];
        while !buf.is_empty() {
            let data = buf.data();
            if data.len() < OFP11_BUCKET_LEN {
                return Err(OfpError::BadLen);
            }
            let len = BigEndian::read_u16(&data[0..2]) as usize;
            if len < OFP11_BUCKET_LEN || len % 8 != 0 || len > data.len() {
                return Err(OfpError::BadLen);
            }
            let mut bytes = Cursor::new(buf.pull(OFP11_BUCKET_LEN)?);
            let _len = bytes.read_u16::<BigEndian>()?;
            let weight = bytes.read_u16::<BigEndian>()?;
            let watch_port = port_from_ofp11(bytes.read_u32::<BigEndian>()?)?;
            let watch_group = bytes.read_u32::<BigEndian>()?;
            let mut actions = vec![];
            pull_actions(&mut buf, len - OFP11_BUCKET_LEN, version, &mut actions)?;
            buckets.push(Bucket {
                bucket_id: buckets.len() as u32,
                weight,
                watch_port,
                watch_group,
                actions,
            });
        }
        Ok(GroupMod {
            command,
            group_type,
            group_id,
            command_bucket_id: OFPG15_BUCKET_ALL,
            buckets,
        })
    }

    fn parse_ofp15(version: OfpVersion, body: &[u8]) -> Result<GroupMod> {
        let mut buf = OfpBuf::new(body);
        let mut bytes = Cursor::new(buf.pull(OFP15_GROUP_MOD_LEN)?);
        let command = GroupCommand::of_wire(bytes.read_u16::<BigEndian>()?, version)?;
        let group_type = GroupType::of_wire(bytes.read_u8()?)?;
        let _pad = bytes.read_u8()?;
        let group_id = bytes.read_u32::<BigEndian>()?;
        let bucket_array_len = bytes.read_u16::<BigEndian>()? as usize;
        let _pad2 = bytes.read_u16::<BigEndian>()?;
        let command_bucket_id = bytes.read_u32::<BigEndian>()?;

        let mut buckets_buf = OfpBuf::new(buf.pull(bucket_array_len)?);
        let mut buckets = vec![];
        while !buckets_buf.is_empty() {
            let data = buckets_buf.data();
            if data.len() < OFP15_BUCKET_LEN {
                return Err(OfpError::BadLen);
            }
            let len = BigEndian::read_u16(&data[0..2]) as usize;
            let action_array_len = BigEndian::read_u16(&data[2..4]) as usize;
            if len < OFP15_BUCKET_LEN + action_array_len || len % 8 != 0 || len > data.len() {
                return Err(OfpError::BadLen);
            }
            let mut bucket = OfpBuf::new(buckets_buf.pull(len)?);
            let bucket_id = BigEndian::read_u32(&bucket.pull(OFP15_BUCKET_LEN)?[4..8]);
            let mut actions = vec![];
            pull_actions(&mut bucket, action_array_len, version, &mut actions)?;

            let mut b = Bucket::new(bucket_id, actions);
            while !bucket.is_empty() {
                let prop = bucket.data();
                if prop.len() < 4 {
                    return Err(OfpError::BadLen);
                }
                let typ = BigEndian::read_u16(&prop[0..2]);
                let prop_len = BigEndian::read_u16(&prop[2..4]) as usize;
                let padded = round_up8(prop_len);
                if prop_len < 4 || padded > prop.len() {
                    return Err(OfpError::BadLen);
                }
                let prop = bucket.pull(padded)?;
                match typ {
                    t if t == OfpGroupBucketProp::Weight as u16 && prop_len == 6 => {
                        b.weight = BigEndian::read_u16(&prop[4..6]);
                    }
                    t if t == OfpGroupBucketProp::WatchPort as u16 && prop_len == 8 => {
                        b.watch_port = port_from_ofp11(BigEndian::read_u32(&prop[4..8]))?;
                    }
                    t if t == OfpGroupBucketProp::WatchGroup as u16 && prop_len == 8 => {
                        b.watch_group = BigEndian::read_u32(&prop[4..8]);
                    }
                    t => return Err(OfpError::BadBucketProperty(t)),
                }
            }
            buckets.push(b);
        }
        Ok(GroupMod {
            command,
            group_type,
            group_id,
            command_bucket_id,
            buckets,
        })
    }
}

impl OfpMessage for GroupMod {
    fn marshal(&self, xid: u32, protocol: Protocol) -> Result<Vec<u8>> {
        let version = protocol.version();
        if version == OfpVersion::Of10 {
            return Err(OfpError::NotExpressible {
                what: "group mod",
                version: version.wire(),
            });
        }
        let mut bytes = OfpRaw::Ofpt11GroupMod.alloc(version, xid)?;
        if version >= OfpVersion::Of15 {
            self.marshal_ofp15(version, &mut bytes)?;
        } else {
            self.marshal_ofp11(version, &mut bytes)?;
        }
        OfpHeader::update_length(&mut bytes);
        Ok(bytes)
    }

    fn parse(buf: &[u8]) -> Result<(u32, GroupMod)> {
        let (raw, header) = OfpRaw::decode(buf)?;
        if raw != OfpRaw::Ofpt11GroupMod {
            return Err(OfpError::UnexpectedMessage(raw));
        }
        let version = OfpVersion::of_wire(header.version())?;
        let body = &buf[raw.header_size(version)..header.length()];
        let gm = if version >= OfpVersion::Of15 {
            GroupMod::parse_ofp15(version, body)?
        } else {
            GroupMod::parse_ofp11(version, body)?
        };
        Ok((header.xid(), gm))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select_group() -> GroupMod {
        GroupMod {
            command: GroupCommand::Add,
            group_type: GroupType::Select,
            group_id: 7,
            command_bucket_id: OFPG15_BUCKET_ALL,
            buckets: vec![Bucket {
                              weight: 10,
                              ..Bucket::new(0,
                                            vec![Ofpact::Output {
                                                     port: 1,
                                                     max_len: 0,
                                                 }])
                          },
                          Bucket {
                              weight: 20,
                              ..Bucket::new(1, vec![Ofpact::PopVlan, Ofpact::Group(3)])
                          }],
        }
    }

    #[test]
    fn ofp13_roundtrip() {
        let gm = select_group();
        let msg = gm.marshal(5, Protocol::Of13Oxm).unwrap();
        assert_eq!(msg.len(), 8 + 8 + (16 + 16) + (16 + 16));
        assert_eq!(GroupMod::parse(&msg).unwrap(), (5, gm));
    }

    #[test]
    fn ofp15_roundtrip() {
        let mut gm = select_group();
        gm.command = GroupCommand::InsertBucket;
        gm.command_bucket_id = 0xffff_fffd;
        gm.buckets[0].bucket_id = 40;
        gm.buckets[1].watch_port = 3;
        let msg = gm.marshal(0, Protocol::Of15Oxm).unwrap();
        assert_eq!(GroupMod::parse(&msg).unwrap(), (0, gm));
    }

    #[test]
    fn not_in_of10() {
        assert_eq!(select_group().marshal(0, Protocol::Of10Nxm),
                   Err(OfpError::NotExpressible {
                       what: "group mod",
                       version: 1,
                   }));
    }

    #[test]
    fn insert_bucket_needs_of15() {
        let mut gm = select_group();
        gm.command = GroupCommand::InsertBucket;
        let msg = gm.marshal(0, Protocol::Of14Oxm).unwrap();
        assert_eq!(GroupMod::parse(&msg), Err(OfpError::BadGroupCommand(3)));
    }

    #[test]
    fn bad_group_type() {
        let mut msg = select_group().marshal(0, Protocol::Of12Oxm).unwrap();
        msg[10] = 9;
        assert_eq!(GroupMod::parse(&msg), Err(OfpError::BadGroupType(9)));
    }
}
