//! Actions and instructions carried by flow updates and group buckets.
//!
//! Decoded actions are flattened into one `Vec<Ofpact>`: plain actions first (the
//! contents of an apply-actions instruction), with the other instructions as their
//! own `Ofpact` variants around them.

use std::io::Cursor;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::ofp_buf::OfpBuf;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_header::OfpVersion;
use crate::ofp_port::{port_from_ofp11, port_to_ofp11};

/// One action or instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ofpact {
    Output { port: u16, max_len: u16 },
    SetQueue(u32),
    Group(u32),
    PopVlan,
    Meter(u32),
    ClearActions,
    WriteActions(Vec<Ofpact>),
    WriteMetadata { metadata: u64, mask: u64 },
    GotoTable(u8),
}

#[repr(u16)]
enum OfpActionType {
    OFPATOutput = 0,
    OFPAT10StripVlan = 3,
    OFPAT11PopVlan = 18,
    OFPAT11SetQueue = 21,
    OFPAT11Group = 22,
}

#[repr(u16)]
#[derive(Copy, Clone)]
enum OfpInstructionType {
    OFPITGotoTable = 1,
    OFPITWriteMetadata = 2,
    OFPITWriteActions = 3,
    OFPITApplyActions = 4,
    OFPITClearActions = 5,
    OFPITMeter = 6,
}

const ACTION_HEADER_LEN: usize = 4;
const INSTRUCTION_HEADER_LEN: usize = 8;

impl Ofpact {
    fn is_action(&self) -> bool {
        match *self {
            Ofpact::Output { .. } | Ofpact::SetQueue(_) | Ofpact::Group(_) | Ofpact::PopVlan => true,
            _ => false,
        }
    }

    fn not_expressible(&self, version: OfpVersion) -> OfpError {
        let what = match *self {
            Ofpact::Output { .. } => "output action",
            Ofpact::SetQueue(_) => "set_queue action",
            Ofpact::Group(_) => "group action",
            Ofpact::PopVlan => "pop_vlan action",
            Ofpact::Meter(_) => "meter instruction",
            Ofpact::ClearActions => "clear_actions instruction",
            Ofpact::WriteActions(_) => "write_actions instruction",
            Ofpact::WriteMetadata { .. } => "write_metadata instruction",
            Ofpact::GotoTable(_) => "goto_table instruction",
        };
        OfpError::NotExpressible {
            what,
            version: version.wire(),
        }
    }

    /// Byte-size of `self` as an action in `version`.
    fn size_of(&self, version: OfpVersion) -> usize {
        match (self, version) {
            (&Ofpact::Output { .. }, OfpVersion::Of10) => 8,
            (&Ofpact::Output { .. }, _) => 16,
            _ => 8,
        }
    }

    fn marshal(&self, version: OfpVersion, bytes: &mut Vec<u8>) -> Result<()> {
        let len = self.size_of(version) as u16;
        match (self, version) {
            (&Ofpact::Output { port, max_len }, OfpVersion::Of10) => {
                bytes.write_u16::<BigEndian>(OfpActionType::OFPATOutput as u16)?;
                bytes.write_u16::<BigEndian>(len)?;
                bytes.write_u16::<BigEndian>(port)?;
                bytes.write_u16::<BigEndian>(max_len)?;
            }
            (&Ofpact::Output { port, max_len }, _) => {
                bytes.write_u16::<BigEndian>(OfpActionType::OFPATOutput as u16)?;
                bytes.write_u16::<BigEndian>(len)?;
                bytes.write_u32::<BigEndian>(port_to_ofp11(port))?;
                bytes.write_u16::<BigEndian>(max_len)?;
                bytes.extend_from_slice(&[0; 6]);
            }
            (&Ofpact::PopVlan, OfpVersion::Of10) => {
                bytes.write_u16::<BigEndian>(OfpActionType::OFPAT10StripVlan as u16)?;
                bytes.write_u16::<BigEndian>(len)?;
                bytes.write_u32::<BigEndian>(0)?;
            }
            (&Ofpact::PopVlan, _) => {
                bytes.write_u16::<BigEndian>(OfpActionType::OFPAT11PopVlan as u16)?;
                bytes.write_u16::<BigEndian>(len)?;
                bytes.write_u32::<BigEndian>(0)?;
            }
            (&Ofpact::SetQueue(queue_id), v) if v != OfpVersion::Of10 => {
                bytes.write_u16::<BigEndian>(OfpActionType::OFPAT11SetQueue as u16)?;
                bytes.write_u16::<BigEndian>(len)?;
                bytes.write_u32::<BigEndian>(queue_id)?;
            }
            (&Ofpact::Group(group_id), v) if v != OfpVersion::Of10 => {
                bytes.write_u16::<BigEndian>(OfpActionType::OFPAT11Group as u16)?;
                bytes.write_u16::<BigEndian>(len)?;
                bytes.write_u32::<BigEndian>(group_id)?;
            }
            (a, v) => return Err(a.not_expressible(v)),
        }
        Ok(())
    }

    fn parse(version: OfpVersion, typ: u16, body: &[u8]) -> Result<Ofpact> {
        let mut bytes = Cursor::new(body);
        let expect_len = |n: usize| if body.len() + ACTION_HEADER_LEN == n {
            Ok(())
        } else {
            Err(OfpError::BadActionLen)
        };
        let of10 = version == OfpVersion::Of10;
        let action = match typ {
            t if t == OfpActionType::OFPATOutput as u16 && of10 => {
                expect_len(8)?;
                let port = bytes.read_u16::<BigEndian>()?;
                let max_len = bytes.read_u16::<BigEndian>()?;
                Ofpact::Output { port, max_len }
            }
            t if t == OfpActionType::OFPATOutput as u16 => {
                expect_len(16)?;
                let port = port_from_ofp11(bytes.read_u32::<BigEndian>()?)?;
                let max_len = bytes.read_u16::<BigEndian>()?;
                Ofpact::Output { port, max_len }
            }
            t if t == OfpActionType::OFPAT10StripVlan as u16 && of10 => {
                expect_len(8)?;
                Ofpact::PopVlan
            }
            t if t == OfpActionType::OFPAT11PopVlan as u16 && !of10 => {
                expect_len(8)?;
                Ofpact::PopVlan
            }
            t if t == OfpActionType::OFPAT11SetQueue as u16 && !of10 => {
                expect_len(8)?;
                Ofpact::SetQueue(bytes.read_u32::<BigEndian>()?)
            }
            t if t == OfpActionType::OFPAT11Group as u16 && !of10 => {
                expect_len(8)?;
                Ofpact::Group(bytes.read_u32::<BigEndian>()?)
            }
            t => return Err(OfpError::BadActionType(t)),
        };
        Ok(action)
    }
}

/// Pull `len` bytes of actions from `buf` and append them to `ofpacts`.
pub fn pull_actions(buf: &mut OfpBuf,
                    len: usize,
                    version: OfpVersion,
                    ofpacts: &mut Vec<Ofpact>)
                    -> Result<()> {
    if len % 8 != 0 {
        return Err(OfpError::BadLen);
    }
    let mut bytes = buf.pull(len)?;
    while !bytes.is_empty() {
        if bytes.len() < 8 {
            return Err(OfpError::BadActionLen);
        }
        let typ = BigEndian::read_u16(&bytes[0..2]);
        let action_len = BigEndian::read_u16(&bytes[2..4]) as usize;
        if action_len < 8 || action_len % 8 != 0 || action_len > bytes.len() {
            return Err(OfpError::BadActionLen);
        }
        ofpacts.push(Ofpact::parse(version, typ, &bytes[ACTION_HEADER_LEN..action_len])?);
        bytes = &bytes[action_len..];
    }
    Ok(())
}

/// Append the plain actions in `ofpacts` to `out`.
///
/// Instructions have no encoding in an action list.
pub fn put_actions(ofpacts: &[Ofpact], out: &mut Vec<u8>, version: OfpVersion) -> Result<()> {
    for a in ofpacts {
        a.marshal(version, out)?;
    }
    Ok(())
}

fn instruction_type(a: &Ofpact) -> Option<OfpInstructionType> {
    match *a {
        Ofpact::Meter(_) => Some(OfpInstructionType::OFPITMeter),
        Ofpact::ClearActions => Some(OfpInstructionType::OFPITClearActions),
        Ofpact::WriteActions(_) => Some(OfpInstructionType::OFPITWriteActions),
        Ofpact::WriteMetadata { .. } => Some(OfpInstructionType::OFPITWriteMetadata),
        Ofpact::GotoTable(_) => Some(OfpInstructionType::OFPITGotoTable),
        _ => None,
    }
}

/// Pull `len` bytes of instructions from `buf` and append their contents to `ofpacts`
/// in execution order: meter, applied actions, clear, write actions, write metadata,
/// goto table.
pub fn pull_instructions(buf: &mut OfpBuf,
                         len: usize,
                         version: OfpVersion,
                         ofpacts: &mut Vec<Ofpact>)
                         -> Result<()> {
    if version == OfpVersion::Of10 {
        return Err(OfpError::NotExpressible {
            what: "instructions",
            version: version.wire(),
        });
    }
    if len % 8 != 0 {
        return Err(OfpError::BadLen);
    }
    let bytes = buf.pull(len)?;
    let mut slots: [Option<&[u8]>; 7] = [None; 7];
    let mut rest = bytes;
    while !rest.is_empty() {
        if rest.len() < INSTRUCTION_HEADER_LEN {
            return Err(OfpError::BadLen);
        }
        let typ = BigEndian::read_u16(&rest[0..2]);
        let inst_len = BigEndian::read_u16(&rest[2..4]) as usize;
        if inst_len < INSTRUCTION_HEADER_LEN || inst_len % 8 != 0 || inst_len > rest.len() {
            return Err(OfpError::BadLen);
        }
        let known = typ >= OfpInstructionType::OFPITGotoTable as u16 &&
                    typ <= OfpInstructionType::OFPITMeter as u16;
        if !known || (typ == OfpInstructionType::OFPITMeter as u16 && version < OfpVersion::Of13) {
            return Err(OfpError::BadInstructionType(typ));
        }
        let slot = &mut slots[typ as usize];
        if slot.is_some() {
            return Err(OfpError::DupInstruction(typ));
        }
        *slot = Some(&rest[..inst_len]);
        rest = &rest[inst_len..];
    }

    let fixed = |inst: &[u8], n: usize| if inst.len() == n {
        Ok(())
    } else {
        Err(OfpError::BadLen)
    };
    if let Some(inst) = slots[OfpInstructionType::OFPITMeter as usize] {
        fixed(inst, 8)?;
        ofpacts.push(Ofpact::Meter(BigEndian::read_u32(&inst[4..8])));
    }
    if let Some(inst) = slots[OfpInstructionType::OFPITApplyActions as usize] {
        let mut actions = OfpBuf::new(&inst[INSTRUCTION_HEADER_LEN..]);
        pull_actions(&mut actions, inst.len() - INSTRUCTION_HEADER_LEN, version, ofpacts)?;
    }
    if let Some(inst) = slots[OfpInstructionType::OFPITClearActions as usize] {
        fixed(inst, 8)?;
        ofpacts.push(Ofpact::ClearActions);
    }
    if let Some(inst) = slots[OfpInstructionType::OFPITWriteActions as usize] {
        let mut actions = OfpBuf::new(&inst[INSTRUCTION_HEADER_LEN..]);
        let mut written = vec![];
        pull_actions(&mut actions, inst.len() - INSTRUCTION_HEADER_LEN, version, &mut written)?;
        ofpacts.push(Ofpact::WriteActions(written));
    }
    if let Some(inst) = slots[OfpInstructionType::OFPITWriteMetadata as usize] {
        fixed(inst, 24)?;
        let mut bytes = Cursor::new(&inst[8..]);
        let metadata = bytes.read_u64::<BigEndian>()?;
        let mask = bytes.read_u64::<BigEndian>()?;
        ofpacts.push(Ofpact::WriteMetadata { metadata, mask });
    }
    if let Some(inst) = slots[OfpInstructionType::OFPITGotoTable as usize] {
        fixed(inst, 8)?;
        ofpacts.push(Ofpact::GotoTable(inst[4]));
    }
    Ok(())
}

fn put_action_list_instruction(typ: OfpInstructionType,
                               actions: &[&Ofpact],
                               out: &mut Vec<u8>,
                               version: OfpVersion)
                               -> Result<()> {
    let start = out.len();
    out.write_u16::<BigEndian>(typ as u16)?;
    out.write_u16::<BigEndian>(0)?;
    out.write_u32::<BigEndian>(0)?;
    for a in actions {
        a.marshal(version, out)?;
    }
    let len = (out.len() - start) as u16;
    BigEndian::write_u16(&mut out[start + 2..start + 4], len);
    Ok(())
}

/// Append `ofpacts` to `out` as OpenFlow 1.1+ instructions.
///
/// Plain actions become one apply-actions instruction. Instructions are written in
/// execution order whatever their order in `ofpacts`.
pub fn put_instructions(ofpacts: &[Ofpact], out: &mut Vec<u8>, version: OfpVersion) -> Result<()> {
    if version == OfpVersion::Of10 {
        return Err(OfpError::NotExpressible {
            what: "instructions",
            version: version.wire(),
        });
    }
    let find = |typ: OfpInstructionType| {
        ofpacts.iter().find(|a| instruction_type(a).map(|t| t as u16) == Some(typ as u16))
    };
    let applied: Vec<&Ofpact> = ofpacts.iter().filter(|a| a.is_action()).collect();

    if let Some(&Ofpact::Meter(meter_id)) = find(OfpInstructionType::OFPITMeter) {
        if version < OfpVersion::Of13 {
            return Err(Ofpact::Meter(meter_id).not_expressible(version));
        }
        out.write_u16::<BigEndian>(OfpInstructionType::OFPITMeter as u16)?;
        out.write_u16::<BigEndian>(8)?;
        out.write_u32::<BigEndian>(meter_id)?;
    }
    if !applied.is_empty() {
        put_action_list_instruction(OfpInstructionType::OFPITApplyActions, &applied, out, version)?;
    }
    if find(OfpInstructionType::OFPITClearActions).is_some() {
        out.write_u16::<BigEndian>(OfpInstructionType::OFPITClearActions as u16)?;
        out.write_u16::<BigEndian>(8)?;
        out.write_u32::<BigEndian>(0)?;
    }
    if let Some(&Ofpact::WriteActions(ref written)) = find(OfpInstructionType::OFPITWriteActions) {
        let written: Vec<&Ofpact> = written.iter().collect();
        put_action_list_instruction(OfpInstructionType::OFPITWriteActions, &written, out, version)?;
    }
    if let Some(&Ofpact::WriteMetadata { metadata, mask }) =
        find(OfpInstructionType::OFPITWriteMetadata) {
        out.write_u16::<BigEndian>(OfpInstructionType::OFPITWriteMetadata as u16)?;
        out.write_u16::<BigEndian>(24)?;
        out.write_u32::<BigEndian>(0)?;
        out.write_u64::<BigEndian>(metadata)?;
        out.write_u64::<BigEndian>(mask)?;
    }
    if let Some(&Ofpact::GotoTable(table_id)) = find(OfpInstructionType::OFPITGotoTable) {
        out.write_u16::<BigEndian>(OfpInstructionType::OFPITGotoTable as u16)?;
        out.write_u16::<BigEndian>(8)?;
        out.write_u8(table_id)?;
        out.extend_from_slice(&[0; 3]);
    }
    Ok(())
}

/// Byte-size of `ofpacts` as an action list, used to size bucket headers.
pub fn actions_len(ofpacts: &[Ofpact], version: OfpVersion) -> usize {
    ofpacts.iter().map(|a| a.size_of(version)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_actions(acts: &[Ofpact], version: OfpVersion) -> Vec<u8> {
        let mut out = vec![];
        put_actions(acts, &mut out, version).unwrap();
        out
    }

    #[test]
    fn of10_output() {
        let acts = [Ofpact::Output {
                        port: 2,
                        max_len: 0,
                    },
                    Ofpact::PopVlan];
        let bytes = encode_actions(&acts, OfpVersion::Of10);
        assert_eq!(&bytes[..8], &[0, 0, 0, 8, 0, 2, 0, 0]);
        assert_eq!(bytes.len(), actions_len(&acts, OfpVersion::Of10));
        let mut out = vec![];
        pull_actions(&mut OfpBuf::new(&bytes), bytes.len(), OfpVersion::Of10, &mut out).unwrap();
        assert_eq!(out, acts);
    }

    #[test]
    fn of13_actions_roundtrip() {
        let acts = [Ofpact::Output {
                        port: 0xfffd,
                        max_len: 128,
                    },
                    Ofpact::SetQueue(7),
                    Ofpact::Group(9)];
        let bytes = encode_actions(&acts, OfpVersion::Of13);
        assert_eq!(bytes.len(), 32);
        assert_eq!(BigEndian::read_u32(&bytes[4..8]), 0xffff_fffd);
        let mut out = vec![];
        pull_actions(&mut OfpBuf::new(&bytes), bytes.len(), OfpVersion::Of13, &mut out).unwrap();
        assert_eq!(out, acts);
    }

    #[test]
    fn group_needs_of11() {
        let mut out = vec![];
        assert_eq!(put_actions(&[Ofpact::Group(1)], &mut out, OfpVersion::Of10),
                   Err(OfpError::NotExpressible {
                       what: "group action",
                       version: 1,
                   }));
    }

    #[test]
    fn bad_action_length() {
        let bytes = [0, 0, 0, 16, 0, 1, 0, 0];
        let mut out = vec![];
        assert_eq!(pull_actions(&mut OfpBuf::new(&bytes), 8, OfpVersion::Of10, &mut out),
                   Err(OfpError::BadActionLen));
        assert_eq!(pull_actions(&mut OfpBuf::new(&bytes), 4, OfpVersion::Of10, &mut out),
                   Err(OfpError::BadLen));
    }

    #[test]
    fn instructions_roundtrip_in_execution_order() {
        let acts = vec![Ofpact::Meter(5),
                        Ofpact::Output {
                            port: 1,
                            max_len: 0,
                        },
                        Ofpact::ClearActions,
                        Ofpact::WriteActions(vec![Ofpact::Group(3)]),
                        Ofpact::WriteMetadata {
                            metadata: 0xab,
                            mask: 0xff,
                        },
                        Ofpact::GotoTable(4)];
        let mut bytes = vec![];
        put_instructions(&acts, &mut bytes, OfpVersion::Of14).unwrap();
        assert_eq!(bytes.len(), 8 + 24 + 8 + 16 + 24 + 8);
        let mut out = vec![];
        pull_instructions(&mut OfpBuf::new(&bytes), bytes.len(), OfpVersion::Of14, &mut out)
            .unwrap();
        assert_eq!(out, acts);
    }

    #[test]
    fn meter_instruction_needs_of13() {
        let mut bytes = vec![];
        assert!(put_instructions(&[Ofpact::Meter(1)], &mut bytes, OfpVersion::Of12).is_err());
        let bytes = [0, 6, 0, 8, 0, 0, 0, 1];
        let mut out = vec![];
        assert_eq!(pull_instructions(&mut OfpBuf::new(&bytes), 8, OfpVersion::Of12, &mut out),
                   Err(OfpError::BadInstructionType(6)));
    }

    #[test]
    fn duplicate_instruction() {
        let bytes = [0, 5, 0, 8, 0, 0, 0, 0, 0, 5, 0, 8, 0, 0, 0, 0];
        let mut out = vec![];
        assert_eq!(pull_instructions(&mut OfpBuf::new(&bytes), 16, OfpVersion::Of13, &mut out),
                   Err(OfpError::DupInstruction(5)));
    }
}
