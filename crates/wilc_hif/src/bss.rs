//! Fixed-layout BSS descriptor firmware joins with, and the IE walk that fills it.

use crate::{
    consts::{MAX_PAIRWISE_SUITES, MAX_RATES_SUPPORTED, MAX_SSID_LEN},
    macros::wire_struct,
};
use ieee80211::mac_parser::MACAddress;
use scroll::{LE, Pread, Pwrite};
use zerocopy::little_endian::{U16, U32};

pub const EID_SSID: u8 = 0;
pub const EID_SUPP_RATES: u8 = 1;
pub const EID_DS_PARAMS: u8 = 3;
pub const EID_TIM: u8 = 5;
pub const EID_HT_CAPABILITY: u8 = 45;
pub const EID_RSN: u8 = 48;
pub const EID_EXT_SUPP_RATES: u8 = 50;
pub const EID_VENDOR_SPECIFIC: u8 = 221;

const OUI_MICROSOFT: [u8; 3] = [0x00, 0x50, 0xf2];
const OUI_WFA: [u8; 3] = [0x50, 0x6f, 0x9a];
const MS_TYPE_WPA: u8 = 1;
const MS_TYPE_WMM: u8 = 2;
const WFA_TYPE_P2P: u8 = 9;
const P2P_ATTR_NOA: u8 = 12;
const P2P_OPPPS_ENABLE: u8 = 1 << 7;
const WMM_QOS_UAPSD: u8 = 1 << 7;

const BSS_TYPE_INFRA: u8 = 0;
/// Suite not in use.
const SUITE_NONE: u8 = 0xff;

/// Iterate `(id, body)` of the information elements in `ies`. Stops at the first truncated element.
pub fn elements(ies: &[u8]) -> impl Iterator<Item = (u8, &[u8])> {
    let mut rest = ies;
    core::iter::from_fn(move || {
        let (&id, tail) = rest.split_first()?;
        let (&len, tail) = tail.split_first()?;
        if tail.len() < len as usize {
            log::trace!("truncated element: id={id} len={len} remaining={}", tail.len());
            rest = &[];
            return None;
        }
        let (body, tail) = tail.split_at(len as usize);
        rest = tail;
        Some((id, body))
    })
}

/// Body after the OUI and type of the first vendor element matching them.
fn vendor_element<'a>(ies: &'a [u8], oui: [u8; 3], kind: u8) -> Option<&'a [u8]> {
    elements(ies)
        .filter(|(id, _)| *id == EID_VENDOR_SPECIFIC)
        .find_map(|(_, body)| match body {
            [a, b, c, t, rest @ ..] if [*a, *b, *c] == oui && *t == kind => Some(rest),
            _ => None,
        })
}

/// Offset of the RSN capabilities inside an RSN element body, checking both suite lists fit.
fn rsn_capability_offset(body: &[u8]) -> Option<usize> {
    // Version and group cipher.
    let mut offset = 6;
    for _ in 0..2 {
        let count: u16 = body.pread_with(offset, LE).ok()?;
        offset = offset.checked_add(2 + usize::from(count) * 4)?;
    }
    (offset + 2 <= body.len()).then_some(offset)
}

/// Network to join, from a scan result.
#[derive(Debug, Clone, Copy)]
pub struct BssDescription<'a> {
    pub bssid: MACAddress,
    pub channel: u8,
    pub beacon_interval: u16,
    pub capability: u16,
    pub tsf: u64,
    pub ies: &'a [u8],
}

/// Cipher and key management suites picked for the connection.
#[derive(Debug, Default, Clone)]
pub struct CryptoSettings {
    pub cipher_group: u32,
    pub ciphers_pairwise: heapless::Vec<u32, MAX_PAIRWISE_SUITES>,
    pub akm_suites: heapless::Vec<u32, MAX_PAIRWISE_SUITES>,
}

wire_struct! {
    /// Carried by `WID_JOIN_REQ_EXTENDED`.
    pub struct JoinBssParam {
        pub ssid: [u8; MAX_SSID_LEN],
        pub ssid_terminator: u8,
        pub bss_type: u8,
        pub ch: u8,
        pub cap_info: U16,
        pub sa: [u8; 6],
        pub bssid: [u8; 6],
        pub beacon_period: U16,
        pub dtim_period: u8,
        /// Count followed by the rates.
        pub supp_rates: [u8; MAX_RATES_SUPPORTED + 1],
        pub wmm_cap: u8,
        pub uapsd_cap: u8,
        pub ht_capable: u8,
        pub rsn_found: u8,
        pub rsn_grp_policy: u8,
        pub mode_802_11i: u8,
        pub p_suites: [u8; MAX_PAIRWISE_SUITES],
        pub akm_suites: [u8; MAX_PAIRWISE_SUITES],
        pub rsn_cap: [u8; 2],
        pub noa_enabled: u8,
        pub tsf_lo: U32,
        pub idx: u8,
        pub opp_enabled: u8,
        /// With opportunistic power save: `ct_window, count, duration le32, interval le32, start le32`,
        /// without it the same minus `ct_window`.
        pub noa: [u8; 14],
    }
}

/// First notice-of-absence descriptor of a P2P element.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoticeOfAbsence {
    pub index: u8,
    pub ctwindow_oppps: u8,
    pub count: u8,
    pub duration: u32,
    pub interval: u32,
    pub start_time: u32,
}

impl NoticeOfAbsence {
    /// Parse from the attributes of a P2P vendor element.
    pub fn from_p2p_attributes(attrs: &[u8]) -> Option<Self> {
        let offset = &mut 0;
        while *offset < attrs.len() {
            let id: u8 = attrs.gread(offset).ok()?;
            let len: u16 = attrs.gread_with(offset, LE).ok()?;
            let body: &[u8] = attrs.gread_with(offset, usize::from(len)).ok()?;
            if id != P2P_ATTR_NOA {
                continue;
            }
            let offset = &mut 0;
            return Some(Self {
                index: body.gread(offset).ok()?,
                ctwindow_oppps: body.gread(offset).ok()?,
                count: body.gread(offset).ok()?,
                duration: body.gread_with(offset, LE).ok()?,
                interval: body.gread_with(offset, LE).ok()?,
                start_time: body.gread_with(offset, LE).ok()?,
            });
        }
        None
    }
}

impl JoinBssParam {
    /// Fill from a scanned network and the connection's crypto settings.
    pub fn from_bss(bss: &BssDescription<'_>, crypto: &CryptoSettings) -> Self {
        let mut param = Self {
            bss_type: BSS_TYPE_INFRA,
            ch: bss.channel,
            cap_info: bss.capability.into(),
            bssid: bss.bssid.0,
            beacon_period: bss.beacon_interval.into(),
            p_suites: [SUITE_NONE; MAX_PAIRWISE_SUITES],
            akm_suites: [SUITE_NONE; MAX_PAIRWISE_SUITES],
            ..Default::default()
        };

        let mut rates = 0;
        let mut rsn_cap = None;
        let mut ssid_seen = false;
        for (id, body) in elements(bss.ies) {
            match id {
                // First SSID element only, an oversized one leaves the SSID empty.
                EID_SSID if !ssid_seen => {
                    ssid_seen = true;
                    if body.len() <= MAX_SSID_LEN {
                        param.ssid[..body.len()].copy_from_slice(body);
                    }
                }
                EID_SUPP_RATES | EID_EXT_SUPP_RATES => {
                    for &rate in body {
                        if rates == MAX_RATES_SUPPORTED {
                            break;
                        }
                        rates += 1;
                        param.supp_rates[rates] = rate;
                    }
                }
                EID_TIM => {
                    if let Some(&period) = body.get(1) {
                        param.dtim_period = period;
                    }
                }
                EID_HT_CAPABILITY => param.ht_capable = 1,
                EID_RSN => {
                    param.rsn_found = 1;
                    param.mode_802_11i = 2;
                    rsn_cap = rsn_capability_offset(body).map(|x| [body[x], body[x + 1]]);
                    if rsn_cap.is_none() {
                        log::warn!("rsn element inconsistent: bssid={} len={}", bss.bssid, body.len());
                    }
                }
                _ => {}
            }
        }
        param.supp_rates[0] = rates as u8;

        if let Some(wmm) = vendor_element(bss.ies, OUI_MICROSOFT, MS_TYPE_WMM) {
            // Information (0) or parameter (1) element, version 1.
            if let [0 | 1, 1, qos, ..] = *wmm {
                param.wmm_cap = 1;
                param.uapsd_cap = u8::from(qos & WMM_QOS_UAPSD != 0);
            }
        }

        if param.rsn_found == 0 && vendor_element(bss.ies, OUI_MICROSOFT, MS_TYPE_WPA).is_some() {
            param.rsn_found = 1;
            param.mode_802_11i = 1;
        }

        if let Some(noa) =
            vendor_element(bss.ies, OUI_WFA, WFA_TYPE_P2P).and_then(NoticeOfAbsence::from_p2p_attributes)
        {
            param.tsf_lo = (bss.tsf as u32).into();
            param.set_noa(&noa);
        }

        if param.rsn_found != 0 {
            param.rsn_grp_policy = crypto.cipher_group as u8;
            for (dst, suite) in param.p_suites.iter_mut().zip(&crypto.ciphers_pairwise) {
                *dst = *suite as u8;
            }
            for (dst, suite) in param.akm_suites.iter_mut().zip(&crypto.akm_suites) {
                *dst = *suite as u8;
            }
            if let Some(cap) = rsn_cap {
                param.rsn_cap = cap;
            }
        }
        param
    }

    pub fn set_noa(&mut self, noa: &NoticeOfAbsence) {
        self.noa_enabled = 1;
        self.idx = noa.index;
        let offset = &mut 0;
        let noa_bytes = self.noa.as_mut_slice();
        // Sized to the larger layout, can't fail.
        let res: Result<(), scroll::Error> = (|| {
            if noa.ctwindow_oppps & P2P_OPPPS_ENABLE != 0 {
                noa_bytes.gwrite(noa.ctwindow_oppps, offset)?;
            }
            noa_bytes.gwrite(noa.count, offset)?;
            noa_bytes.gwrite_with(noa.duration, offset, LE)?;
            noa_bytes.gwrite_with(noa.interval, offset, LE)?;
            noa_bytes.gwrite_with(noa.start_time, offset, LE)?;
            Ok(())
        })();
        common::err!(res, "noa");
        self.opp_enabled = u8::from(noa.ctwindow_oppps & P2P_OPPPS_ENABLE != 0);
    }

    pub fn ssid(&self) -> &[u8] {
        let len = self.ssid.iter().position(|x| *x == 0).unwrap_or(MAX_SSID_LEN);
        &self.ssid[..len]
    }
}
