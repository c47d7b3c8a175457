//! Flow selectors and their wire encodings.
//!
//! A `Pattern` is the canonical match carried by flow removed messages, monitor
//! requests and flow updates. It has three encodings: Nicira extensible match (NXM),
//! the OpenFlow 1.2+ `ofp_match` with OXM fields, and the fixed 40-byte OpenFlow 1.0
//! `ofp_match` with its wildcard bitmap.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::mem;
use std::ops::Deref;
use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, ReadBytesExt, WriteBytesExt};

use crate::bits::{bit, pad_len8, round_up8, test_bit};
use crate::ofp_buf::OfpBuf;
use crate::ofp_error::{OfpError, Result};
use crate::ofp_port::{port_from_ofp11, port_to_ofp11};

const ETH_TYPE_IP: u16 = 0x0800;
const IPPROTO_TCP: u8 = 6;
const IPPROTO_UDP: u8 = 17;

/// Tunnel metadata options are numbered 0 through 63.
pub const TUN_METADATA_NUM_OPTS: u8 = 64;
/// Longest tunnel metadata option value.
pub const TUN_METADATA_MAX_LEN: u8 = 124;

/// An IPv4 address with a CIDR prefix length in `1..=32`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ipv4Prefix {
    pub addr: u32,
    pub prefix_len: u8,
}

impl Ipv4Prefix {
    /// Create a prefix, clearing the address bits outside of it.
    pub fn new(addr: u32, prefix_len: u8) -> Ipv4Prefix {
        let prefix_len = prefix_len.min(32);
        Ipv4Prefix {
            addr: addr & Ipv4Prefix::mask_of(prefix_len),
            prefix_len,
        }
    }

    /// An exact match on `addr`.
    pub fn exact(addr: u32) -> Ipv4Prefix {
        Ipv4Prefix::new(addr, 32)
    }

    pub fn mask(&self) -> u32 {
        Ipv4Prefix::mask_of(self.prefix_len)
    }

    fn mask_of(prefix_len: u8) -> u32 {
        if prefix_len == 0 {
            0
        } else {
            !0u32 << (32 - prefix_len as u32)
        }
    }

    /// Build a prefix out of a wire mask, which must be a CIDR mask.
    fn of_mask(addr: u32, mask: u32) -> Option<Option<Ipv4Prefix>> {
        let prefix_len = mask.leading_ones() as u8;
        if Ipv4Prefix::mask_of(prefix_len) != mask {
            None
        } else if prefix_len == 0 {
            Some(None)
        } else {
            Some(Some(Ipv4Prefix::new(addr, prefix_len)))
        }
    }
}

/// One tunnel metadata option value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TunMetadata {
    pub index: u8,
    pub value: Vec<u8>,
}

/// Maps tunnel metadata options to their configured lengths.
///
/// Only options present in the table are emitted when a pattern is encoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TunTable {
    lengths: BTreeMap<u8, u8>,
}

impl TunTable {
    pub fn new() -> TunTable {
        TunTable::default()
    }

    /// Map option `index` to values of `len` bytes.
    pub fn with_option(mut self, index: u8, len: u8) -> TunTable {
        assert!(index < TUN_METADATA_NUM_OPTS, "tunnel metadata option {} out of range", index);
        assert!(len > 0 && len <= TUN_METADATA_MAX_LEN,
                "tunnel metadata length {} out of range",
                len);
        self.lengths.insert(index, len);
        self
    }

    pub fn len_of(&self, index: u8) -> Option<u8> {
        self.lengths.get(&index).cloned()
    }
}

/// Fields of a flow selector. `None` means wildcarded.
#[derive(Clone, Debug, Default)]
pub struct Pattern {
    pub in_port: Option<u16>,
    pub dl_src: Option<[u8; 6]>,
    pub dl_dst: Option<[u8; 6]>,
    pub dl_type: Option<u16>,
    pub nw_proto: Option<u8>,
    pub nw_src: Option<Ipv4Prefix>,
    pub nw_dst: Option<Ipv4Prefix>,
    /// TCP or UDP source port, depending on `nw_proto`.
    pub tp_src: Option<u16>,
    pub tp_dst: Option<u16>,
    pub tun_metadata: Vec<TunMetadata>,
    /// Layout used to encode `tun_metadata`. Not part of the match itself.
    pub tun_table: Option<Arc<TunTable>>,
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Pattern) -> bool {
        self.in_port == other.in_port && self.dl_src == other.dl_src &&
        self.dl_dst == other.dl_dst && self.dl_type == other.dl_type &&
        self.nw_proto == other.nw_proto && self.nw_src == other.nw_src &&
        self.nw_dst == other.nw_dst && self.tp_src == other.tp_src &&
        self.tp_dst == other.tp_dst && self.tun_metadata == other.tun_metadata
    }
}

impl Eq for Pattern {}

/// Temporarily installs a tunnel table on a pattern. The pattern's own table is put
/// back when the guard is dropped, including on early error returns.
pub struct TunTableSwap<'a> {
    pattern: &'a mut Pattern,
    saved: Option<Arc<TunTable>>,
}

impl<'a> TunTableSwap<'a> {
    pub fn new(pattern: &'a mut Pattern, table: Option<Arc<TunTable>>) -> TunTableSwap<'a> {
        let saved = mem::replace(&mut pattern.tun_table, table);
        TunTableSwap { pattern, saved }
    }
}

impl<'a> Deref for TunTableSwap<'a> {
    type Target = Pattern;

    fn deref(&self) -> &Pattern {
        self.pattern
    }
}

impl<'a> Drop for TunTableSwap<'a> {
    fn drop(&mut self) {
        self.pattern.tun_table = self.saved.take();
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum MatchFormat {
    Nxm,
    Oxm,
}

const NXM_CLASS_OF: u16 = 0x0000;
const NXM_CLASS_NX: u16 = 0x0001;
const OXM_CLASS_OPENFLOW_BASIC: u16 = 0x8000;
const NXM_NX_TUN_METADATA0: u8 = 40;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Field {
    InPort,
    EthDst,
    EthSrc,
    EthType,
    IpProto,
    Ipv4Src,
    Ipv4Dst,
    TcpSrc,
    TcpDst,
    UdpSrc,
    UdpDst,
    TunMetadata(u8),
}

fn mf_header(class: u16, field: u8, hasmask: bool, len: usize) -> u32 {
    ((class as u32) << 16) | ((field as u32) << 9) | ((hasmask as u32) << 8) | (len as u32 & 0xff)
}

impl Field {
    fn of_header(format: MatchFormat, header: u32) -> Option<Field> {
        let class = (header >> 16) as u16;
        let field = ((header >> 9) & 0x7f) as u8;
        match (format, class, field) {
            (_, NXM_CLASS_NX, f) if f >= NXM_NX_TUN_METADATA0 &&
                                    f < NXM_NX_TUN_METADATA0 + TUN_METADATA_NUM_OPTS => {
                Some(Field::TunMetadata(f - NXM_NX_TUN_METADATA0))
            }
            (MatchFormat::Nxm, NXM_CLASS_OF, 0) => Some(Field::InPort),
            (MatchFormat::Nxm, NXM_CLASS_OF, 1) => Some(Field::EthDst),
            (MatchFormat::Nxm, NXM_CLASS_OF, 2) => Some(Field::EthSrc),
            (MatchFormat::Nxm, NXM_CLASS_OF, 3) => Some(Field::EthType),
            (MatchFormat::Nxm, NXM_CLASS_OF, 6) => Some(Field::IpProto),
            (MatchFormat::Nxm, NXM_CLASS_OF, 7) => Some(Field::Ipv4Src),
            (MatchFormat::Nxm, NXM_CLASS_OF, 8) => Some(Field::Ipv4Dst),
            (MatchFormat::Nxm, NXM_CLASS_OF, 9) => Some(Field::TcpSrc),
            (MatchFormat::Nxm, NXM_CLASS_OF, 10) => Some(Field::TcpDst),
            (MatchFormat::Nxm, NXM_CLASS_OF, 11) => Some(Field::UdpSrc),
            (MatchFormat::Nxm, NXM_CLASS_OF, 12) => Some(Field::UdpDst),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 0) => Some(Field::InPort),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 3) => Some(Field::EthDst),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 4) => Some(Field::EthSrc),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 5) => Some(Field::EthType),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 10) => Some(Field::IpProto),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 11) => Some(Field::Ipv4Src),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 12) => Some(Field::Ipv4Dst),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 13) => Some(Field::TcpSrc),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 14) => Some(Field::TcpDst),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 15) => Some(Field::UdpSrc),
            (MatchFormat::Oxm, OXM_CLASS_OPENFLOW_BASIC, 16) => Some(Field::UdpDst),
            _ => None,
        }
    }

    fn class_and_code(self, format: MatchFormat) -> (u16, u8) {
        if let Field::TunMetadata(idx) = self {
            return (NXM_CLASS_NX, NXM_NX_TUN_METADATA0 + idx);
        }
        match format {
            MatchFormat::Nxm => {
                (NXM_CLASS_OF,
                 match self {
                    Field::InPort => 0,
                    Field::EthDst => 1,
                    Field::EthSrc => 2,
                    Field::EthType => 3,
                    Field::IpProto => 6,
                    Field::Ipv4Src => 7,
                    Field::Ipv4Dst => 8,
                    Field::TcpSrc => 9,
                    Field::TcpDst => 10,
                    Field::UdpSrc => 11,
                    Field::UdpDst => 12,
                    Field::TunMetadata(_) => unreachable!(),
                })
            }
            MatchFormat::Oxm => {
                (OXM_CLASS_OPENFLOW_BASIC,
                 match self {
                    Field::InPort => 0,
                    Field::EthDst => 3,
                    Field::EthSrc => 4,
                    Field::EthType => 5,
                    Field::IpProto => 10,
                    Field::Ipv4Src => 11,
                    Field::Ipv4Dst => 12,
                    Field::TcpSrc => 13,
                    Field::TcpDst => 14,
                    Field::UdpSrc => 15,
                    Field::UdpDst => 16,
                    Field::TunMetadata(_) => unreachable!(),
                })
            }
        }
    }

    /// Width of the field's value, `None` for variable-width fields.
    fn width(self, format: MatchFormat) -> Option<usize> {
        match self {
            Field::InPort => {
                Some(match format {
                    MatchFormat::Nxm => 2,
                    MatchFormat::Oxm => 4,
                })
            }
            Field::EthDst | Field::EthSrc => Some(6),
            Field::EthType => Some(2),
            Field::IpProto => Some(1),
            Field::Ipv4Src | Field::Ipv4Dst => Some(4),
            Field::TcpSrc | Field::TcpDst | Field::UdpSrc | Field::UdpDst => Some(2),
            Field::TunMetadata(_) => None,
        }
    }

    fn maskable(self) -> bool {
        match self {
            Field::Ipv4Src | Field::Ipv4Dst => true,
            _ => false,
        }
    }
}

fn mac_of_slice(b: &[u8]) -> [u8; 6] {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&b[..6]);
    mac
}

fn set_once<T>(slot: &mut Option<T>, value: T, header: u32) -> Result<()> {
    if slot.is_some() {
        return Err(OfpError::DupMatchField(header));
    }
    *slot = Some(value);
    Ok(())
}

impl Pattern {
    /// A pattern that matches every packet.
    pub fn match_all() -> Pattern {
        Pattern::default()
    }

    /// Decode the field entries in `bytes`, which hold no padding.
    fn pull_entries(format: MatchFormat, mut bytes: &[u8]) -> Result<Pattern> {
        let mut p = Pattern::match_all();
        // Header of the first transport field seen, with the protocol it implies.
        let mut transport: Option<(u32, u8)> = None;
        let mut ip_header: Option<u32> = None;

        while !bytes.is_empty() {
            if bytes.len() < 4 {
                return Err(OfpError::BadLen);
            }
            let header = BigEndian::read_u32(&bytes[..4]);
            let len = (header & 0xff) as usize;
            if bytes.len() < 4 + len {
                return Err(OfpError::BadLen);
            }
            let payload = &bytes[4..4 + len];
            bytes = &bytes[4 + len..];

            let field = Field::of_header(format, header).ok_or(OfpError::BadMatchField(header))?;
            let hasmask = test_bit(8, header as u64);
            if hasmask && (!field.maskable() || len % 2 != 0) {
                return Err(OfpError::BadMatchMask(header));
            }
            let (value, mask) = if hasmask {
                let (v, m) = payload.split_at(len / 2);
                (v, Some(m))
            } else {
                (payload, None)
            };
            match field.width(format) {
                Some(w) if w != value.len() => return Err(OfpError::BadMatchField(header)),
                None if value.is_empty() || value.len() > TUN_METADATA_MAX_LEN as usize => {
                    return Err(OfpError::BadMatchField(header))
                }
                _ => (),
            }

            match field {
                Field::InPort => {
                    let port = match format {
                        MatchFormat::Nxm => BigEndian::read_u16(value),
                        MatchFormat::Oxm => port_from_ofp11(BigEndian::read_u32(value))?,
                    };
                    set_once(&mut p.in_port, port, header)?
                }
                Field::EthDst => set_once(&mut p.dl_dst, mac_of_slice(value), header)?,
                Field::EthSrc => set_once(&mut p.dl_src, mac_of_slice(value), header)?,
                Field::EthType => set_once(&mut p.dl_type, BigEndian::read_u16(value), header)?,
                Field::IpProto => {
                    ip_header = ip_header.or(Some(header));
                    set_once(&mut p.nw_proto, value[0], header)?
                }
                Field::Ipv4Src | Field::Ipv4Dst => {
                    ip_header = ip_header.or(Some(header));
                    let addr = BigEndian::read_u32(value);
                    let prefix = match mask {
                        Some(m) => {
                            Ipv4Prefix::of_mask(addr, BigEndian::read_u32(m))
                                .ok_or(OfpError::BadMatchMask(header))?
                        }
                        None => Some(Ipv4Prefix::exact(addr)),
                    };
                    let slot = if field == Field::Ipv4Src {
                        &mut p.nw_src
                    } else {
                        &mut p.nw_dst
                    };
                    if slot.is_some() {
                        return Err(OfpError::DupMatchField(header));
                    }
                    *slot = prefix;
                }
                Field::TcpSrc | Field::TcpDst | Field::UdpSrc | Field::UdpDst => {
                    let proto = match field {
                        Field::TcpSrc | Field::TcpDst => IPPROTO_TCP,
                        _ => IPPROTO_UDP,
                    };
                    match transport {
                        Some((_, seen)) if seen != proto => return Err(OfpError::BadPrereq(header)),
                        None => transport = Some((header, proto)),
                        _ => (),
                    }
                    let port = BigEndian::read_u16(value);
                    match field {
                        Field::TcpSrc | Field::UdpSrc => set_once(&mut p.tp_src, port, header)?,
                        _ => set_once(&mut p.tp_dst, port, header)?,
                    }
                }
                Field::TunMetadata(index) => {
                    if p.tun_metadata.iter().any(|md| md.index == index) {
                        return Err(OfpError::DupMatchField(header));
                    }
                    p.tun_metadata.push(TunMetadata {
                        index,
                        value: value.to_vec(),
                    });
                }
            }
        }

        if let Some(header) = ip_header {
            if p.dl_type != Some(ETH_TYPE_IP) {
                return Err(OfpError::BadPrereq(header));
            }
        }
        if let Some((header, proto)) = transport {
            if p.nw_proto != Some(proto) {
                return Err(OfpError::BadPrereq(header));
            }
        }
        p.tun_metadata.sort_by_key(|md| md.index);
        Ok(p)
    }

    fn put_entry(out: &mut Vec<u8>, format: MatchFormat, field: Field, value: &[u8], mask: Option<&[u8]>) -> Result<()> {
        let (class, code) = field.class_and_code(format);
        let len = value.len() + mask.map_or(0, |m| m.len());
        out.write_u32::<BigEndian>(mf_header(class, code, mask.is_some(), len))?;
        out.extend_from_slice(value);
        if let Some(m) = mask {
            out.extend_from_slice(m);
        }
        Ok(())
    }

    fn put_prefix(out: &mut Vec<u8>, format: MatchFormat, field: Field, prefix: &Ipv4Prefix) -> Result<()> {
        let mut value = [0u8; 4];
        BigEndian::write_u32(&mut value, prefix.addr);
        if prefix.prefix_len >= 32 {
            Pattern::put_entry(out, format, field, &value, None)
        } else {
            let mut mask = [0u8; 4];
            BigEndian::write_u32(&mut mask, prefix.mask());
            Pattern::put_entry(out, format, field, &value, Some(&mask))
        }
    }

    /// Append the field entries of `self`, without padding.
    fn put_entries(&self, format: MatchFormat, out: &mut Vec<u8>) -> Result<()> {
        if let Some(port) = self.in_port {
            match format {
                MatchFormat::Nxm => {
                    Pattern::put_entry(out, format, Field::InPort, &port.to_be_bytes(), None)?
                }
                MatchFormat::Oxm => {
                    let port = port_to_ofp11(port);
                    Pattern::put_entry(out, format, Field::InPort, &port.to_be_bytes(), None)?
                }
            }
        }
        if let Some(mac) = self.dl_dst {
            Pattern::put_entry(out, format, Field::EthDst, &mac, None)?;
        }
        if let Some(mac) = self.dl_src {
            Pattern::put_entry(out, format, Field::EthSrc, &mac, None)?;
        }
        if let Some(typ) = self.dl_type {
            Pattern::put_entry(out, format, Field::EthType, &typ.to_be_bytes(), None)?;
        }
        if let Some(proto) = self.nw_proto {
            Pattern::put_entry(out, format, Field::IpProto, &[proto], None)?;
        }
        if let Some(ref prefix) = self.nw_src {
            Pattern::put_prefix(out, format, Field::Ipv4Src, prefix)?;
        }
        if let Some(ref prefix) = self.nw_dst {
            Pattern::put_prefix(out, format, Field::Ipv4Dst, prefix)?;
        }
        if self.tp_src.is_some() || self.tp_dst.is_some() {
            let (src, dst) = match self.nw_proto {
                Some(IPPROTO_TCP) => (Field::TcpSrc, Field::TcpDst),
                Some(IPPROTO_UDP) => (Field::UdpSrc, Field::UdpDst),
                _ => {
                    return Err(OfpError::NotExpressible {
                        what: "transport port without TCP or UDP",
                        version: 0,
                    })
                }
            };
            if let Some(port) = self.tp_src {
                Pattern::put_entry(out, format, src, &port.to_be_bytes(), None)?;
            }
            if let Some(port) = self.tp_dst {
                Pattern::put_entry(out, format, dst, &port.to_be_bytes(), None)?;
            }
        }
        if let Some(ref table) = self.tun_table {
            for md in &self.tun_metadata {
                match table.len_of(md.index) {
                    Some(len) if len as usize == md.value.len() => {
                        Pattern::put_entry(out, format, Field::TunMetadata(md.index), &md.value, None)?
                    }
                    Some(_) => {
                        let (class, code) = Field::TunMetadata(md.index).class_and_code(format);
                        return Err(OfpError::BadMatchField(mf_header(class,
                                                                     code,
                                                                     false,
                                                                     md.value.len())));
                    }
                    None => (),
                }
            }
        }
        Ok(())
    }

    /// Pull an NXM match of `match_len` bytes, plus its padding to 8 bytes, from `buf`.
    pub fn pull_nxm(buf: &mut OfpBuf, match_len: usize) -> Result<Pattern> {
        let bytes = buf.pull(round_up8(match_len))?;
        Pattern::pull_entries(MatchFormat::Nxm, &bytes[..match_len])
    }

    /// Append `self` as an NXM match padded to 8 bytes. Returns the unpadded length.
    pub fn put_nxm(&self, out: &mut Vec<u8>) -> Result<usize> {
        let start = out.len();
        self.put_entries(MatchFormat::Nxm, out)?;
        let match_len = out.len() - start;
        out.resize(out.len() + pad_len8(match_len), 0);
        Ok(match_len)
    }

    /// Pull an `ofp_match` holding OXM fields from `buf`.
    ///
    /// Returns the pattern and the number of bytes consumed, padding included.
    pub fn pull_oxm(buf: &mut OfpBuf) -> Result<(Pattern, usize)> {
        let data = buf.data();
        if data.len() < OFP_MATCH_HEADER_LEN {
            return Err(OfpError::BadLen);
        }
        let typ = BigEndian::read_u16(&data[0..2]);
        let match_len = BigEndian::read_u16(&data[2..4]) as usize;
        if typ != OFPMT_OXM {
            return Err(OfpError::BadMatchType(typ));
        }
        if match_len < OFP_MATCH_HEADER_LEN {
            return Err(OfpError::BadLen);
        }
        let padded_len = round_up8(match_len);
        let bytes = buf.pull(padded_len)?;
        let pattern = Pattern::pull_entries(MatchFormat::Oxm, &bytes[OFP_MATCH_HEADER_LEN..match_len])?;
        Ok((pattern, padded_len))
    }

    /// Append `self` as an `ofp_match` with OXM fields, padded to 8 bytes. Returns the
    /// unpadded length, which is also the `ofp_match` length field.
    pub fn put_oxm(&self, out: &mut Vec<u8>) -> Result<usize> {
        let start = out.len();
        out.write_u16::<BigEndian>(OFPMT_OXM)?;
        out.write_u16::<BigEndian>(0)?;
        self.put_entries(MatchFormat::Oxm, out)?;
        let match_len = out.len() - start;
        BigEndian::write_u16(&mut out[start + 2..start + 4], match_len as u16);
        out.resize(out.len() + pad_len8(match_len), 0);
        Ok(match_len)
    }

    /// Parse a fixed OpenFlow 1.0 `ofp_match`.
    ///
    /// Fields the canonical pattern does not carry (VLAN, TOS) are ignored.
    pub fn parse_ofp10(buf: &[u8]) -> Result<Pattern> {
        if buf.len() < OFP10_MATCH_LEN {
            return Err(OfpError::BadLen);
        }
        let mut bytes = Cursor::new(buf);
        let w = Wildcards::parse(bytes.read_u32::<BigEndian>()?);
        let in_port = bytes.read_u16::<BigEndian>()?;
        let mut dl_src = [0u8; 6];
        let mut dl_dst = [0u8; 6];
        for b in dl_src.iter_mut() {
            *b = bytes.read_u8()?;
        }
        for b in dl_dst.iter_mut() {
            *b = bytes.read_u8()?;
        }
        let _dl_vlan = bytes.read_u16::<BigEndian>()?;
        let _dl_vlan_pcp = bytes.read_u8()?;
        let _pad = bytes.read_u8()?;
        let dl_type = bytes.read_u16::<BigEndian>()?;
        let _nw_tos = bytes.read_u8()?;
        let nw_proto = bytes.read_u8()?;
        let _pad2 = bytes.read_u16::<BigEndian>()?;
        let nw_src = bytes.read_u32::<BigEndian>()?;
        let nw_dst = bytes.read_u32::<BigEndian>()?;
        let tp_src = bytes.read_u16::<BigEndian>()?;
        let tp_dst = bytes.read_u16::<BigEndian>()?;

        let prefix = |addr: u32, wild_bits: u32| if wild_bits >= 32 {
            None
        } else {
            Some(Ipv4Prefix::new(addr, (32 - wild_bits) as u8))
        };
        Ok(Pattern {
            in_port: if w.in_port { None } else { Some(in_port) },
            dl_src: if w.dl_src { None } else { Some(dl_src) },
            dl_dst: if w.dl_dst { None } else { Some(dl_dst) },
            dl_type: if w.dl_type { None } else { Some(dl_type) },
            nw_proto: if w.nw_proto { None } else { Some(nw_proto) },
            nw_src: prefix(nw_src, w.nw_src),
            nw_dst: prefix(nw_dst, w.nw_dst),
            tp_src: if w.tp_src { None } else { Some(tp_src) },
            tp_dst: if w.tp_dst { None } else { Some(tp_dst) },
            tun_metadata: vec![],
            tun_table: None,
        })
    }

    /// Append `self` as a fixed OpenFlow 1.0 `ofp_match`. Tunnel metadata has no
    /// OpenFlow 1.0 encoding and is left out.
    pub fn marshal_ofp10(&self, out: &mut Vec<u8>) -> Result<()> {
        let wild_bits = |p: &Option<Ipv4Prefix>| match *p {
            Some(ref p) => 32 - p.prefix_len as u32,
            None => 32,
        };
        let w = Wildcards {
            in_port: self.in_port.is_none(),
            dl_vlan: true,
            dl_src: self.dl_src.is_none(),
            dl_dst: self.dl_dst.is_none(),
            dl_type: self.dl_type.is_none(),
            nw_proto: self.nw_proto.is_none(),
            tp_src: self.tp_src.is_none(),
            tp_dst: self.tp_dst.is_none(),
            nw_src: wild_bits(&self.nw_src),
            nw_dst: wild_bits(&self.nw_dst),
            dl_vlan_pcp: true,
            nw_tos: true,
        };
        out.write_u32::<BigEndian>(w.marshal())?;
        out.write_u16::<BigEndian>(self.in_port.unwrap_or(0))?;
        out.extend_from_slice(&self.dl_src.unwrap_or([0; 6]));
        out.extend_from_slice(&self.dl_dst.unwrap_or([0; 6]));
        out.write_u16::<BigEndian>(0)?;
        out.write_u8(0)?;
        out.write_u8(0)?;
        out.write_u16::<BigEndian>(self.dl_type.unwrap_or(0))?;
        out.write_u8(0)?;
        out.write_u8(self.nw_proto.unwrap_or(0))?;
        out.write_u16::<BigEndian>(0)?;
        out.write_u32::<BigEndian>(self.nw_src.map_or(0, |p| p.addr))?;
        out.write_u32::<BigEndian>(self.nw_dst.map_or(0, |p| p.addr))?;
        out.write_u16::<BigEndian>(self.tp_src.unwrap_or(0))?;
        out.write_u16::<BigEndian>(self.tp_dst.unwrap_or(0))?;
        Ok(())
    }
}

/// `ofp_match` type for OXM matches.
const OFPMT_OXM: u16 = 1;
const OFP_MATCH_HEADER_LEN: usize = 4;
/// Size of an OpenFlow 1.0 `ofp_match`.
pub const OFP10_MATCH_LEN: usize = 40;

/// OpenFlow 1.0 wildcard bitmap.
struct Wildcards {
    in_port: bool,
    dl_vlan: bool,
    dl_src: bool,
    dl_dst: bool,
    dl_type: bool,
    nw_proto: bool,
    tp_src: bool,
    tp_dst: bool,
    /// Number of wildcarded low-order address bits; 32 or more wildcards all.
    nw_src: u32,
    nw_dst: u32,
    dl_vlan_pcp: bool,
    nw_tos: bool,
}

impl Wildcards {
    fn set_nw_mask(f: u32, offset: usize, v: u32) -> u32 {
        let value = (0x3f & v.min(32)) << offset;
        f | value
    }

    fn get_nw_mask(f: u32, offset: usize) -> u32 {
        (f >> offset) & 0x3f
    }

    fn marshal(&self) -> u32 {
        let ret = 0u64;
        let ret = bit(0, ret, self.in_port);
        let ret = bit(1, ret, self.dl_vlan);
        let ret = bit(2, ret, self.dl_src);
        let ret = bit(3, ret, self.dl_dst);
        let ret = bit(4, ret, self.dl_type);
        let ret = bit(5, ret, self.nw_proto);
        let ret = bit(6, ret, self.tp_src);
        let ret = bit(7, ret, self.tp_dst);
        let ret = Wildcards::set_nw_mask(ret as u32, 8, self.nw_src);
        let ret = Wildcards::set_nw_mask(ret, 14, self.nw_dst);
        let ret = bit(20, ret as u64, self.dl_vlan_pcp);
        bit(21, ret, self.nw_tos) as u32
    }

    fn parse(bits: u32) -> Wildcards {
        Wildcards {
            in_port: test_bit(0, bits as u64),
            dl_vlan: test_bit(1, bits as u64),
            dl_src: test_bit(2, bits as u64),
            dl_dst: test_bit(3, bits as u64),
            dl_type: test_bit(4, bits as u64),
            nw_proto: test_bit(5, bits as u64),
            tp_src: test_bit(6, bits as u64),
            tp_dst: test_bit(7, bits as u64),
            nw_src: Wildcards::get_nw_mask(bits, 8),
            nw_dst: Wildcards::get_nw_mask(bits, 14),
            dl_vlan_pcp: test_bit(20, bits as u64),
            nw_tos: test_bit(21, bits as u64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tcp_pattern() -> Pattern {
        Pattern {
            in_port: Some(3),
            dl_src: Some([0, 1, 2, 3, 4, 5]),
            dl_type: Some(ETH_TYPE_IP),
            nw_proto: Some(IPPROTO_TCP),
            nw_src: Some(Ipv4Prefix::new(0x0a00_0001, 24)),
            nw_dst: Some(Ipv4Prefix::exact(0x0a00_0102)),
            tp_dst: Some(80),
            ..Pattern::match_all()
        }
    }

    #[test]
    fn prefix_masks_address() {
        let p = Ipv4Prefix::new(0x0a01_0203, 16);
        assert_eq!(p.addr, 0x0a01_0000);
        assert_eq!(p.mask(), 0xffff_0000);
        assert_eq!(Ipv4Prefix::of_mask(1, 0xff00_ff00), None);
        assert_eq!(Ipv4Prefix::of_mask(1, 0), Some(None));
    }

    #[test]
    fn catch_all_encodings() {
        let mut out = vec![];
        assert_eq!(Pattern::match_all().put_nxm(&mut out).unwrap(), 0);
        assert!(out.is_empty());

        assert_eq!(Pattern::match_all().put_oxm(&mut out).unwrap(), 4);
        assert_eq!(out, [0, 1, 0, 4, 0, 0, 0, 0]);
    }

    #[test]
    fn nxm_roundtrip() {
        let p = tcp_pattern();
        let mut out = vec![];
        let match_len = p.put_nxm(&mut out).unwrap();
        assert_eq!(out.len(), round_up8(match_len));
        let mut buf = OfpBuf::new(&out);
        assert_eq!(Pattern::pull_nxm(&mut buf, match_len).unwrap(), p);
        assert!(buf.is_empty());
    }

    #[test]
    fn oxm_roundtrip() {
        let p = Pattern {
            in_port: Some(0xfffe),
            ..tcp_pattern()
        };
        let mut out = vec![];
        let match_len = p.put_oxm(&mut out).unwrap();
        assert_eq!(BigEndian::read_u16(&out[2..4]) as usize, match_len);
        let mut buf = OfpBuf::new(&out);
        let (q, padded) = Pattern::pull_oxm(&mut buf).unwrap();
        assert_eq!(q, p);
        assert_eq!(padded, out.len());
    }

    #[test]
    fn ofp10_roundtrip() {
        let p = tcp_pattern();
        let mut out = vec![];
        p.marshal_ofp10(&mut out).unwrap();
        assert_eq!(out.len(), OFP10_MATCH_LEN);
        assert_eq!(Pattern::parse_ofp10(&out).unwrap(), p);

        out.clear();
        Pattern::match_all().marshal_ofp10(&mut out).unwrap();
        let w = BigEndian::read_u32(&out[0..4]);
        assert_eq!(w & 0x0030_00ff, 0x0030_00ff);
        assert_eq!(Wildcards::get_nw_mask(w, 8), 32);
        assert_eq!(Pattern::parse_ofp10(&out).unwrap(), Pattern::match_all());
    }

    #[test]
    fn standard_match_type_is_rejected() {
        let bytes = [0, 0, 0, 88, 0, 0, 0, 0];
        let mut buf = OfpBuf::new(&bytes);
        assert_eq!(Pattern::pull_oxm(&mut buf), Err(OfpError::BadMatchType(0)));
    }

    #[test]
    fn duplicate_field_is_rejected() {
        let mut out = vec![];
        Pattern::put_entry(&mut out, MatchFormat::Nxm, Field::EthType, &[8, 0], None).unwrap();
        Pattern::put_entry(&mut out, MatchFormat::Nxm, Field::EthType, &[8, 0], None).unwrap();
        let len = out.len();
        out.resize(round_up8(len), 0);
        let mut buf = OfpBuf::new(&out);
        match Pattern::pull_nxm(&mut buf, len) {
            Err(OfpError::DupMatchField(_)) => (),
            r => panic!("unexpected {:?}", r),
        }
    }

    #[test]
    fn transport_needs_protocol() {
        let mut out = vec![];
        Pattern::put_entry(&mut out, MatchFormat::Nxm, Field::TcpSrc, &[0, 80], None).unwrap();
        let len = out.len();
        out.resize(round_up8(len), 0);
        let mut buf = OfpBuf::new(&out);
        match Pattern::pull_nxm(&mut buf, len) {
            Err(OfpError::BadPrereq(_)) => (),
            r => panic!("unexpected {:?}", r),
        }

        let p = Pattern {
            tp_src: Some(1),
            ..Pattern::match_all()
        };
        assert!(p.put_nxm(&mut vec![]).is_err());
    }

    #[test]
    fn tun_metadata_needs_table() {
        let mut p = Pattern {
            tun_metadata: vec![TunMetadata {
                                   index: 3,
                                   value: vec![1, 2, 3, 4],
                               }],
            ..Pattern::match_all()
        };
        let mut out = vec![];
        assert_eq!(p.put_oxm(&mut out).unwrap(), 4);

        p.tun_table = Some(Arc::new(TunTable::new().with_option(3, 4)));
        out.clear();
        let match_len = p.put_oxm(&mut out).unwrap();
        assert_eq!(match_len, 4 + 4 + 4);
        let (q, _) = Pattern::pull_oxm(&mut OfpBuf::new(&out)).unwrap();
        assert_eq!(q, p);
        assert!(q.tun_table.is_none());

        p.tun_table = Some(Arc::new(TunTable::new().with_option(3, 8)));
        assert!(p.put_oxm(&mut vec![]).is_err());
    }

    #[test]
    fn swap_restores_table() {
        let own = Arc::new(TunTable::new().with_option(0, 4));
        let other = Arc::new(TunTable::new().with_option(1, 4));
        let mut p = Pattern {
            tun_table: Some(own.clone()),
            ..Pattern::match_all()
        };
        {
            let swapped = TunTableSwap::new(&mut p, Some(other.clone()));
            assert_eq!(swapped.tun_table.as_ref().unwrap().len_of(1), Some(4));
        }
        assert!(Arc::ptr_eq(p.tun_table.as_ref().unwrap(), &own));
    }
}
