//! Configuration objects ("WIDs") exchanged with firmware.

use alloc::vec::Vec;

/// Firmware identifier of a configuration object.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct Wid(pub u16);

impl Wid {
    // Char (1 byte)
    pub const CURRENT_CHANNEL: Self = Self(0x0002);
    pub const SCAN_TYPE: Self = Self(0x0007);
    pub const KEY_ID: Self = Self(0x0009);
    pub const POWER_MANAGEMENT: Self = Self(0x000B);
    pub const MODE_11I: Self = Self(0x000C);
    pub const AUTH_TYPE: Self = Self(0x000D);
    pub const DISCONNECT: Self = Self(0x0016);
    pub const START_SCAN_REQ: Self = Self(0x001E);
    pub const RSSI: Self = Self(0x001F);
    pub const LINKSPEED: Self = Self(0x0026);
    pub const ABORT_RUNNING_SCAN: Self = Self(0x003E);
    pub const TX_POWER: Self = Self(0x003F);
    pub const DEL_BEACON: Self = Self(0x00CA);
    pub const WOWLAN_TRIGGER: Self = Self(0x00CB);

    // Short (2 bytes)
    pub const SHORT_RETRY_LIMIT: Self = Self(0x1003);
    pub const LONG_RETRY_LIMIT: Self = Self(0x1004);
    pub const FRAG_THRESHOLD: Self = Self(0x1005);
    pub const RTS_THRESHOLD: Self = Self(0x1006);

    // Int (4 bytes)
    pub const FAILED_COUNT: Self = Self(0x2000);
    pub const RECEIVED_FRAGMENT_COUNT: Self = Self(0x2004);
    pub const SUCCESS_FRAME_COUNT: Self = Self(0x2007);
    pub const SET_OPERATION_MODE: Self = Self(0x2083);
    pub const GET_INACTIVE_TIME: Self = Self(0x2084);

    // Str
    pub const WEP_KEY_VALUE: Self = Self(0x3004);
    pub const MAC_ADDR: Self = Self(0x300C);
    pub const ADD_WEP_KEY: Self = Self(0x3019);
    pub const REMOVE_WEP_KEY: Self = Self(0x301A);
    pub const ADD_PTK: Self = Self(0x301B);
    pub const ADD_RX_GTK: Self = Self(0x301C);
    pub const ASSOC_RES_INFO: Self = Self(0x3020);
    pub const SET_STA_MAC_INACTIVE_TIME: Self = Self(0x3033);
    pub const SSID_PROBE_REQ: Self = Self(0x3037);
    pub const JOIN_REQ_EXTENDED: Self = Self(0x3038);
    pub const SET_DRV_HANDLER: Self = Self(0x3079);
    pub const PMKID_INFO: Self = Self(0x3082);
    pub const DEL_ALL_STA: Self = Self(0x3084);
    pub const REMAIN_ON_CHAN: Self = Self(0x3085);
    pub const REGISTER_FRAME: Self = Self(0x3086);

    // Bin
    pub const SCAN_CHANNEL_LIST: Self = Self(0x4084);
    pub const INFO_ELEMENT_PROBE: Self = Self(0x4085);
    pub const INFO_ELEMENT_ASSOCIATE: Self = Self(0x4086);
    pub const ADD_STA: Self = Self(0x4087);
    pub const REMOVE_STA: Self = Self(0x4088);
    pub const EDIT_STA: Self = Self(0x4089);
    pub const ADD_BEACON: Self = Self(0x408A);
    pub const SETUP_MULTICAST_FILTER: Self = Self(0x408B);
    pub const ANTENNA_SELECTION: Self = Self(0x4093);
}

impl core::fmt::Display for Wid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

/// Wire tag of a [`WidValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WidKind {
    Bool = 0,
    Char = 1,
    Short = 2,
    Int = 3,
    Str = 4,
    Bin = 5,
}

impl WidKind {
    /// Width of fixed-size kinds, `None` for length-prefixed ones.
    pub const fn width(self) -> Option<usize> {
        match self {
            Self::Bool | Self::Char => Some(1),
            Self::Short => Some(2),
            Self::Int => Some(4),
            Self::Str | Self::Bin => None,
        }
    }
}

impl TryFrom<u8> for WidKind {
    type Error = crate::error::CodecError;

    fn try_from(kind: u8) -> Result<Self, Self::Error> {
        Ok(match kind {
            0 => Self::Bool,
            1 => Self::Char,
            2 => Self::Short,
            3 => Self::Int,
            4 => Self::Str,
            5 => Self::Bin,
            _ => return Err(crate::error::CodecError::UnknownKind { kind }),
        })
    }
}

/// Value of a configuration object.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub enum WidValue {
    Bool(bool),
    Char(u8),
    Short(u16),
    Int(u32),
    Str(Vec<u8>),
    Bin(Vec<u8>),
}

impl WidValue {
    pub const fn kind(&self) -> WidKind {
        match self {
            Self::Bool(_) => WidKind::Bool,
            Self::Char(_) => WidKind::Char,
            Self::Short(_) => WidKind::Short,
            Self::Int(_) => WidKind::Int,
            Self::Str(_) => WidKind::Str,
            Self::Bin(_) => WidKind::Bin,
        }
    }

    /// Length of the value on the wire.
    pub fn len(&self) -> usize {
        match self {
            Self::Str(x) | Self::Bin(x) => x.len(),
            x => x.kind().width().unwrap_or_default(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_u8(&self) -> Option<u8> {
        match *self {
            Self::Char(x) => Some(x),
            Self::Bool(x) => Some(x as u8),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Self::Char(x) => Some(x.into()),
            Self::Short(x) => Some(x.into()),
            Self::Int(x) => Some(x),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Str(x) | Self::Bin(x) => Some(x),
            _ => None,
        }
    }
}

/// One typed key-value unit of a firmware request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "arbitrary", derive(arbitrary::Arbitrary))]
pub struct ConfigObject {
    pub id: Wid,
    pub value: WidValue,
}

impl ConfigObject {
    pub const fn new(id: Wid, value: WidValue) -> Self {
        Self { id, value }
    }
    pub const fn char(id: Wid, value: u8) -> Self {
        Self::new(id, WidValue::Char(value))
    }
    pub const fn short(id: Wid, value: u16) -> Self {
        Self::new(id, WidValue::Short(value))
    }
    pub const fn int(id: Wid, value: u32) -> Self {
        Self::new(id, WidValue::Int(value))
    }
    pub const fn str(id: Wid, value: Vec<u8>) -> Self {
        Self::new(id, WidValue::Str(value))
    }
    pub const fn bin(id: Wid, value: Vec<u8>) -> Self {
        Self::new(id, WidValue::Bin(value))
    }
    /// Object for a `GET` whose string/binary response may be up to `max_len` bytes.
    pub fn str_query(id: Wid, max_len: usize) -> Self {
        Self::new(id, WidValue::Str(alloc::vec![0; max_len]))
    }
}
