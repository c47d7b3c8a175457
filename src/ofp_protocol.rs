use bitflags::bitflags;

use crate::ofp_header::OfpVersion;

/// OpenFlow dialect: a protocol version plus the flow format used with it.
///
/// The "STD" dialects use the standard OpenFlow 1.0 flow format, the "NXM" dialects
/// the Nicira Extensible Match format, and OpenFlow 1.2+ the standard OXM format.
/// "TID" variants have the Nicira table-id extension enabled.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Of10Std,
    Of10StdTid,
    Of10Nxm,
    Of10NxmTid,
    Of11Std,
    Of12Oxm,
    Of13Oxm,
    Of14Oxm,
    Of15Oxm,
}

impl Protocol {
    /// Every dialect, oldest first.
    pub const ALL: [Protocol; 9] = [Protocol::Of10Std,
                                    Protocol::Of10StdTid,
                                    Protocol::Of10Nxm,
                                    Protocol::Of10NxmTid,
                                    Protocol::Of11Std,
                                    Protocol::Of12Oxm,
                                    Protocol::Of13Oxm,
                                    Protocol::Of14Oxm,
                                    Protocol::Of15Oxm];

    /// Return the OpenFlow version that `self` runs over.
    pub fn version(self) -> OfpVersion {
        match self {
            Protocol::Of10Std | Protocol::Of10StdTid | Protocol::Of10Nxm |
            Protocol::Of10NxmTid => OfpVersion::Of10,
            Protocol::Of11Std => OfpVersion::Of11,
            Protocol::Of12Oxm => OfpVersion::Of12,
            Protocol::Of13Oxm => OfpVersion::Of13,
            Protocol::Of14Oxm => OfpVersion::Of14,
            Protocol::Of15Oxm => OfpVersion::Of15,
        }
    }

    /// Return the dialect a switch speaking `version` uses by default.
    pub fn of_version(version: OfpVersion) -> Protocol {
        match version {
            OfpVersion::Of10 => Protocol::Of10Std,
            OfpVersion::Of11 => Protocol::Of11Std,
            OfpVersion::Of12 => Protocol::Of12Oxm,
            OfpVersion::Of13 => Protocol::Of13Oxm,
            OfpVersion::Of14 => Protocol::Of14Oxm,
            OfpVersion::Of15 => Protocol::Of15Oxm,
        }
    }
}

bitflags! {
    /// A set of `Protocol`s, used for capability tests.
    pub struct Protocols: u32 {
        const OF10_STD = 1 << 0;
        const OF10_STD_TID = 1 << 1;
        const OF10_NXM = 1 << 2;
        const OF10_NXM_TID = 1 << 3;
        const OF11_STD = 1 << 4;
        const OF12_OXM = 1 << 5;
        const OF13_OXM = 1 << 6;
        const OF14_OXM = 1 << 7;
        const OF15_OXM = 1 << 8;

        const OF10_STD_ANY = Self::OF10_STD.bits | Self::OF10_STD_TID.bits;
        const OF10_NXM_ANY = Self::OF10_NXM.bits | Self::OF10_NXM_TID.bits;
        const OF10_ANY = Self::OF10_STD_ANY.bits | Self::OF10_NXM_ANY.bits;

        const OF15_UP = Self::OF15_OXM.bits;
        const OF14_UP = Self::OF15_UP.bits | Self::OF14_OXM.bits;
        const OF13_UP = Self::OF14_UP.bits | Self::OF13_OXM.bits;
        const OF12_UP = Self::OF13_UP.bits | Self::OF12_OXM.bits;
        const OF11_UP = Self::OF12_UP.bits | Self::OF11_STD.bits;
    }
}

impl From<Protocol> for Protocols {
    fn from(p: Protocol) -> Protocols {
        match p {
            Protocol::Of10Std => Protocols::OF10_STD,
            Protocol::Of10StdTid => Protocols::OF10_STD_TID,
            Protocol::Of10Nxm => Protocols::OF10_NXM,
            Protocol::Of10NxmTid => Protocols::OF10_NXM_TID,
            Protocol::Of11Std => Protocols::OF11_STD,
            Protocol::Of12Oxm => Protocols::OF12_OXM,
            Protocol::Of13Oxm => Protocols::OF13_OXM,
            Protocol::Of14Oxm => Protocols::OF14_OXM,
            Protocol::Of15Oxm => Protocols::OF15_OXM,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_of_protocols() {
        assert_eq!(Protocol::Of10NxmTid.version(), OfpVersion::Of10);
        assert_eq!(Protocol::Of13Oxm.version(), OfpVersion::Of13);
        for p in Protocol::ALL.iter() {
            assert_eq!(Protocol::of_version(p.version()).version(), p.version());
        }
    }

    #[test]
    fn up_sets() {
        assert!(Protocols::OF14_UP.contains(Protocol::Of15Oxm.into()));
        assert!(Protocols::OF14_UP.contains(Protocol::Of14Oxm.into()));
        assert!(!Protocols::OF14_UP.contains(Protocol::Of13Oxm.into()));
        assert!(Protocols::OF10_ANY.contains(Protocol::Of10NxmTid.into()));
        assert!(!Protocols::OF11_UP.intersects(Protocols::OF10_ANY));
    }
}
