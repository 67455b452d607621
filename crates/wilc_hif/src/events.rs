//! Decoding of raw firmware notification buffers.
//!
//! Every notification ends with the firmware interface index as a little-endian `u32`.

use crate::{HifError, VifIdx, bss, consts::WLAN_STATUS_SUCCESS};
use alloc::vec::Vec;
use ieee80211::mac_parser::MACAddress;
use scroll::{LE, Pread};

const NETWORK_INFO_LEN_OFFSET: usize = 6;
const NETWORK_INFO_RSSI_OFFSET: usize = 8;
const NETWORK_INFO_FRAME_OFFSET: usize = 9;
const MAC_STATUS_OFFSET: usize = 7;

/// 802.11 management header length.
const MGMT_HEADER_LEN: usize = 24;
/// Timestamp, beacon interval and capability in front of the IEs of beacons and probe responses.
const BEACON_FIXED_LEN: usize = 12;

const SUBTYPE_PROBE_RESP: u8 = 5;
const SUBTYPE_BEACON: u8 = 8;

/// Capability, status code and AID in front of the association response IEs.
const ASSOC_RESP_FIXED_LEN: usize = 6;

fn malformed(_: scroll::Error) -> HifError {
    HifError::MalformedResponse
}

/// Interface a notification is addressed to.
pub fn trailing_vif(buf: &[u8]) -> Result<VifIdx, HifError> {
    let offset = buf.len().checked_sub(4).ok_or(HifError::MalformedResponse)?;
    let fw_idx: u32 = buf.pread_with(offset, LE).map_err(malformed)?;
    VifIdx::from_fw_index(fw_idx).ok_or_else(|| {
        log::warn!("notification for unknown interface: fw_idx={fw_idx}");
        HifError::NoInterface
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacStatus {
    Disconnected,
    Connected,
    Other(u8),
}

impl From<u8> for MacStatus {
    fn from(x: u8) -> Self {
        match x {
            0 => Self::Disconnected,
            1 => Self::Connected,
            x => Self::Other(x),
        }
    }
}

/// General asynchronous info, firmware's report of association state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacInfo {
    pub status: MacStatus,
    pub reason: u8,
    pub info: u8,
}

pub fn parse_mac_info(buf: &[u8]) -> Result<MacInfo, HifError> {
    let mut offset = MAC_STATUS_OFFSET;
    let offset = &mut offset;
    Ok(MacInfo {
        status: buf.gread::<u8>(offset).map_err(malformed)?.into(),
        reason: buf.gread(offset).map_err(malformed)?,
        info: buf.gread(offset).map_err(malformed)?,
    })
}

/// A beacon or probe response seen while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInfo {
    pub rssi: i8,
    pub frame: Vec<u8>,
}

pub fn parse_network_info(buf: &[u8]) -> Result<NetworkInfo, HifError> {
    let declared: u16 = buf
        .pread_with(NETWORK_INFO_LEN_OFFSET, LE)
        .map_err(malformed)?;
    // Declared length counts the RSSI byte.
    let frame_len = usize::from(declared)
        .checked_sub(1)
        .ok_or(HifError::MalformedResponse)?;
    let rssi = buf.pread::<u8>(NETWORK_INFO_RSSI_OFFSET).map_err(malformed)? as i8;
    let frame = buf
        .get(NETWORK_INFO_FRAME_OFFSET..NETWORK_INFO_FRAME_OFFSET + frame_len)
        .ok_or(HifError::MalformedResponse)?;
    Ok(NetworkInfo {
        rssi,
        frame: frame.into(),
    })
}

impl NetworkInfo {
    fn subtype(&self) -> Option<u8> {
        let fc = *self.frame.first()?;
        // Management frames only.
        if (fc >> 2) & 0b11 != 0 {
            return None;
        }
        Some(fc >> 4)
    }

    pub fn is_beacon_or_probe_resp(&self) -> bool {
        matches!(self.subtype(), Some(SUBTYPE_BEACON | SUBTYPE_PROBE_RESP))
            && self.frame.len() > MGMT_HEADER_LEN + BEACON_FIXED_LEN
    }

    pub fn bssid(&self) -> Option<MACAddress> {
        let addr: [u8; 6] = self.frame.get(16..22)?.try_into().ok()?;
        Some(MACAddress(addr))
    }

    pub fn tsf(&self) -> Option<u64> {
        self.frame.pread_with(MGMT_HEADER_LEN, LE).ok()
    }

    pub fn beacon_interval(&self) -> Option<u16> {
        self.frame.pread_with(MGMT_HEADER_LEN + 8, LE).ok()
    }

    pub fn capability(&self) -> Option<u16> {
        self.frame.pread_with(MGMT_HEADER_LEN + 10, LE).ok()
    }

    pub fn ies(&self) -> &[u8] {
        self.frame
            .get(MGMT_HEADER_LEN + BEACON_FIXED_LEN..)
            .unwrap_or_default()
    }

    /// Channel from the DS parameter set.
    pub fn channel(&self) -> Option<u8> {
        bss::elements(self.ies())
            .find(|(id, _)| *id == bss::EID_DS_PARAMS)
            .and_then(|(_, body)| body.first().copied())
    }

    /// Description usable with [`bss::JoinBssParam::from_bss`].
    pub fn description(&self) -> Option<bss::BssDescription<'_>> {
        Some(bss::BssDescription {
            bssid: self.bssid()?,
            channel: self.channel()?,
            beacon_interval: self.beacon_interval()?,
            capability: self.capability()?,
            tsf: self.tsf()?,
            ies: self.ies(),
        })
    }
}

/// Status code of an association response and its IEs when the status is success.
pub fn parse_assoc_resp_info(buf: &[u8]) -> Result<(u16, &[u8]), HifError> {
    if buf.len() < ASSOC_RESP_FIXED_LEN {
        return Err(HifError::MalformedResponse);
    }
    let status: u16 = buf.pread_with(2, LE).map_err(malformed)?;
    let ies = if status == WLAN_STATUS_SUCCESS {
        &buf[ASSOC_RESP_FIXED_LEN..]
    } else {
        &[]
    };
    Ok((status, ies))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn with_vif(mut buf: Vec<u8>, fw_idx: u32) -> Vec<u8> {
        buf.extend_from_slice(&fw_idx.to_le_bytes());
        buf
    }

    #[test]
    fn trailing_index() {
        assert_eq!(
            trailing_vif(&with_vif(vec![0; 10], 1)).unwrap(),
            VifIdx::new(0).unwrap()
        );
        assert_eq!(
            trailing_vif(&with_vif(vec![], 2)).unwrap(),
            VifIdx::new(1).unwrap()
        );
        assert!(matches!(
            trailing_vif(&with_vif(vec![], 0)),
            Err(HifError::NoInterface)
        ));
        assert!(matches!(
            trailing_vif(&with_vif(vec![], 3)),
            Err(HifError::NoInterface)
        ));
        assert!(matches!(
            trailing_vif(&[1, 0]),
            Err(HifError::MalformedResponse)
        ));
    }

    #[test]
    fn mac_info() {
        let buf = with_vif(vec![0, 0, 0, 0, 0, 0, 0, 1, 3, 9], 1);
        assert_eq!(
            parse_mac_info(&buf).unwrap(),
            MacInfo {
                status: MacStatus::Connected,
                reason: 3,
                info: 9
            }
        );
        assert!(parse_mac_info(&[0; 8]).is_err());
    }

    #[test]
    fn network_info_bounds() {
        // Declared 4 bytes (rssi + 3 frame bytes) but only 2 present.
        let buf = [0, 0, 0, 0, 0, 0, 4, 0, 0xd0, 1, 2];
        assert!(matches!(
            parse_network_info(&buf),
            Err(HifError::MalformedResponse)
        ));
        let buf = [0, 0, 0, 0, 0, 0, 4, 0, 0xd0, 1, 2, 3];
        let info = parse_network_info(&buf).unwrap();
        assert_eq!(info.rssi, -48);
        assert_eq!(info.frame, [1, 2, 3]);
        assert!(!info.is_beacon_or_probe_resp());
    }

    #[test]
    fn assoc_resp_info() {
        let ok = [0x11, 0, 0, 0, 1, 0xc0, 221, 1, 0];
        assert_eq!(parse_assoc_resp_info(&ok).unwrap(), (0, &[221, 1, 0][..]));
        let denied = [0x11, 0, 17, 0, 0, 0, 221, 1, 0];
        assert_eq!(parse_assoc_resp_info(&denied).unwrap(), (17, &[][..]));
        assert!(parse_assoc_resp_info(&[0; 5]).is_err());
    }
}
