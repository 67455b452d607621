//! Configuration operations that don't touch the state machine. They exchange objects with firmware directly
//! from the caller's task, serialized with the worker only by the dispatcher lock.

use super::{Chip, Device};
use crate::{
    HifError, VifIdx,
    consts::{
        BROADCAST_MAC, DEFAULT_LINK_SPEED, FW_MIN_FAST_PS, FW_NO_POWERSAVE, HT_CAP_LEN,
        KEY_RSC_LEN, MAX_NUM_STA, MAX_PMKID, MAX_RATES_SUPPORTED, MAX_TK_LEN, MAX_WEP_KEY_LEN,
        PMKID_LEN, RX_MIC_KEY_LEN, TCP_ACK_FILTER_LINK_SPEED_THRESH, TX_MIC_KEY_LEN, ZERO_MAC,
    },
    coordinator::{self, Role},
    dispatcher::Direction,
    macros::wire_struct,
    state::{AuthType, HifState, RfInfo},
    transport::Transport,
    wid::{ConfigObject, Wid},
};
use alloc::vec::Vec;
use core::sync::atomic::Ordering;
use ieee80211::mac_parser::MACAddress;
use zerocopy::{
    IntoBytes,
    little_endian::{U16, U32},
};

wire_struct! {
    struct WepKeyHeader {
        index: u8,
        key_len: u8,
    }
}

wire_struct! {
    struct StaKeyHeader {
        mac: [u8; 6],
        key_len: u8,
    }
}

wire_struct! {
    struct ApKeyHeader {
        mac: [u8; 6],
        index: u8,
        key_len: u8,
    }
}

wire_struct! {
    struct GtkHeader {
        mac: [u8; 6],
        rsc: [u8; KEY_RSC_LEN],
        index: u8,
        key_len: u8,
    }
}

wire_struct! {
    struct DrvHandler {
        handler: U32,
        /// Interface id in bit 0, operating mode above it.
        mode: u8,
    }
}

wire_struct! {
    struct FrameRegistration {
        reg: u8,
        reg_id: u8,
        frame_type: U16,
    }
}

wire_struct! {
    struct StationInfo {
        mac: [u8; 6],
        aid: U16,
        rates_len: u8,
        rates: [u8; MAX_RATES_SUPPORTED],
        ht_supported: u8,
        ht_cap: [u8; HT_CAP_LEN],
        flags_mask: U16,
        flags_set: U16,
    }
}

wire_struct! {
    struct BeaconHeader {
        interval: U32,
        dtim_period: U32,
        head_len: U32,
    }
}

wire_struct! {
    struct AntennaSelection {
        select: u8,
        ant1_gpio: u8,
        ant2_gpio: u8,
        switch_mode: u8,
    }
}

const FRAME_TYPE_PROBE_REQ: u16 = 0x0040;
const FRAME_TYPE_ACTION: u16 = 0x00d0;
const FW_ACTION_FRM_IDX: u8 = 0;
const FW_PROBE_REQ_IDX: u8 = 1;

fn concat(parts: &[&[u8]]) -> Result<Vec<u8>, HifError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(parts.iter().map(|x| x.len()).sum())
        .map_err(|_| HifError::OutOfMemory)?;
    for part in parts {
        buf.extend_from_slice(part);
    }
    Ok(buf)
}

/// Whether the pairwise/group key is for a station or an access point interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMode {
    Station,
    Ap,
}

/// Temporal key with its optional Michael MIC keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyMaterial<'a> {
    pub key: &'a [u8],
    pub rx_mic: Option<&'a [u8; RX_MIC_KEY_LEN]>,
    pub tx_mic: Option<&'a [u8; TX_MIC_KEY_LEN]>,
}

impl KeyMaterial<'_> {
    /// Key followed by the MIC keys present.
    fn to_bytes(self) -> Result<(u8, Vec<u8>), HifError> {
        if self.key.len() > MAX_TK_LEN {
            return Err(HifError::InvalidArgument);
        }
        let buf = concat(&[
            self.key,
            self.rx_mic.map(|x| &x[..]).unwrap_or_default(),
            self.tx_mic.map(|x| &x[..]).unwrap_or_default(),
        ])?;
        Ok((buf.len() as u8, buf))
    }
}

/// Retry limits and thresholds. Only the `Some` fields are sent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkConfig {
    pub short_retry_limit: Option<u16>,
    pub long_retry_limit: Option<u16>,
    pub frag_threshold: Option<u16>,
    pub rts_threshold: Option<u16>,
}

impl LinkConfig {
    const RETRY_LIMIT: core::ops::RangeInclusive<u16> = 1..=255;
    const FRAG_THRESHOLD: core::ops::RangeInclusive<u16> = 256..=7936;
    const RTS_THRESHOLD: core::ops::RangeInclusive<u16> = 256..=65535;

    fn objects(&self) -> Result<Vec<ConfigObject>, HifError> {
        let fields = [
            (Wid::SHORT_RETRY_LIMIT, self.short_retry_limit, Self::RETRY_LIMIT),
            (Wid::LONG_RETRY_LIMIT, self.long_retry_limit, Self::RETRY_LIMIT),
            (Wid::FRAG_THRESHOLD, self.frag_threshold, Self::FRAG_THRESHOLD),
            (Wid::RTS_THRESHOLD, self.rts_threshold, Self::RTS_THRESHOLD),
        ];
        let mut objects = Vec::new();
        for (id, value, range) in fields {
            let Some(value) = value else { continue };
            if !range.contains(&value) {
                log::warn!("{id} out of range: {value}");
                return Err(HifError::InvalidArgument);
            }
            objects.push(ConfigObject::short(id, value));
        }
        Ok(objects)
    }
}

/// Associated station of an access point interface.
#[derive(Debug, Clone, Copy)]
pub struct StationParams<'a> {
    pub mac: MACAddress,
    pub aid: u16,
    pub rates: &'a [u8],
    pub ht_cap: Option<[u8; HT_CAP_LEN]>,
    pub flags_mask: u16,
    pub flags_set: u16,
}

impl StationParams<'_> {
    fn to_bytes(self) -> Result<Vec<u8>, HifError> {
        if self.rates.len() > MAX_RATES_SUPPORTED {
            return Err(HifError::InvalidArgument);
        }
        let mut info = StationInfo {
            mac: self.mac.0,
            aid: self.aid.into(),
            rates_len: self.rates.len() as u8,
            ht_supported: self.ht_cap.is_some().into(),
            ht_cap: self.ht_cap.unwrap_or_default(),
            flags_mask: self.flags_mask.into(),
            flags_set: self.flags_set.into(),
            ..Default::default()
        };
        info.rates[..self.rates.len()].copy_from_slice(self.rates);
        concat(&[info.as_bytes()])
    }
}

/// How the antenna switch is driven.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AntennaSwitch {
    #[default]
    None = 0,
    SingleGpio = 1,
    DualGpio = 2,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AntennaConfig {
    /// Diversity or a fixed antenna.
    pub select: u8,
    pub switch: AntennaSwitch,
    pub ant1_gpio: u8,
    pub ant2_gpio: u8,
}

impl Chip {
    /// GPIOs that can drive an antenna switch.
    pub fn is_valid_antenna_gpio(self, gpio: u8) -> bool {
        match self {
            Self::Wilc1000 => matches!(gpio, 0 | 1 | 4 | 6),
            Self::Wilc3000 => matches!(gpio, 0 | 3 | 4 | 17..=20),
        }
    }
}

/// TCP-ack filtering after a link speed reading. `None` leaves it unchanged.
pub fn tcp_ack_filter_policy(link_speed: u8) -> Option<bool> {
    if link_speed == DEFAULT_LINK_SPEED {
        None
    } else {
        Some(link_speed > TCP_ACK_FILTER_LINK_SPEED_THRESH)
    }
}

impl<T: Transport> Device<T> {
    fn ensure_registered(&self, vif: VifIdx) -> Result<(), HifError> {
        if self.queue.is_registered(vif) {
            Ok(())
        } else {
            Err(HifError::NoInterface)
        }
    }

    async fn set(&self, vif: VifIdx, objects: &mut [ConfigObject]) -> Result<(), HifError> {
        self.ensure_registered(vif)?;
        Ok(self.send(vif, Direction::Set, objects).await?)
    }

    async fn get(&self, vif: VifIdx, objects: &mut [ConfigObject]) -> Result<(), HifError> {
        self.ensure_registered(vif)?;
        Ok(self.send(vif, Direction::Get, objects).await?)
    }

    async fn get_char(&self, vif: VifIdx, id: Wid) -> Result<u8, HifError> {
        let mut objects = [ConfigObject::char(id, 0)];
        self.get(vif, &mut objects).await?;
        objects[0]
            .value
            .as_u8()
            .ok_or(HifError::MalformedResponse)
    }

    pub async fn remove_wep_key(&self, vif: VifIdx, index: u8) -> Result<(), HifError> {
        self.set(vif, &mut [ConfigObject::str(Wid::REMOVE_WEP_KEY, alloc::vec![index])])
            .await
    }

    pub async fn set_wep_default_key_index(&self, vif: VifIdx, index: u8) -> Result<(), HifError> {
        self.set(vif, &mut [ConfigObject::char(Wid::KEY_ID, index)])
            .await
    }

    fn wep_key(key: &[u8], index: u8) -> Result<Vec<u8>, HifError> {
        if key.is_empty() || key.len() > MAX_WEP_KEY_LEN {
            return Err(HifError::InvalidArgument);
        }
        let header = WepKeyHeader {
            index,
            key_len: key.len() as u8,
        };
        concat(&[header.as_bytes(), key])
    }

    pub async fn add_wep_key_bss_sta(&self, vif: VifIdx, key: &[u8], index: u8) -> Result<(), HifError> {
        let value = Self::wep_key(key, index)?;
        self.set(vif, &mut [ConfigObject::str(Wid::ADD_WEP_KEY, value)])
            .await
    }

    pub async fn add_wep_key_bss_ap(
        &self,
        vif: VifIdx,
        key: &[u8],
        index: u8,
        security: u8,
        auth_type: AuthType,
    ) -> Result<(), HifError> {
        let value = Self::wep_key(key, index)?;
        self.set(
            vif,
            &mut [
                ConfigObject::char(Wid::MODE_11I, security),
                ConfigObject::char(Wid::AUTH_TYPE, auth_type as u8),
                ConfigObject::str(Wid::WEP_KEY_VALUE, value),
            ],
        )
        .await
    }

    /// Install a pairwise key for `mac`.
    pub async fn add_ptk(
        &self,
        vif: VifIdx,
        material: KeyMaterial<'_>,
        mac: MACAddress,
        mode: KeyMode,
        cipher_mode: u8,
        index: u8,
    ) -> Result<(), HifError> {
        let (key_len, key) = material.to_bytes()?;
        match mode {
            KeyMode::Ap => {
                let header = ApKeyHeader {
                    mac: mac.0,
                    index,
                    key_len,
                };
                let value = concat(&[header.as_bytes(), &key])?;
                self.set(
                    vif,
                    &mut [
                        ConfigObject::char(Wid::MODE_11I, cipher_mode),
                        ConfigObject::str(Wid::ADD_PTK, value),
                    ],
                )
                .await
            }
            KeyMode::Station => {
                let header = StaKeyHeader { mac: mac.0, key_len };
                let value = concat(&[header.as_bytes(), &key])?;
                self.set(vif, &mut [ConfigObject::str(Wid::ADD_PTK, value)])
                    .await
            }
        }
    }

    /// Install a group key. A station's key is bound to its current BSSID.
    pub async fn add_rx_gtk(
        &self,
        vif: VifIdx,
        material: KeyMaterial<'_>,
        index: u8,
        rsc: Option<&[u8]>,
        mode: KeyMode,
        cipher_mode: u8,
    ) -> Result<(), HifError> {
        let (key_len, key) = material.to_bytes()?;
        let mut header = GtkHeader {
            index,
            key_len,
            ..Default::default()
        };
        if let Some(rsc) = rsc {
            let dst = header
                .rsc
                .get_mut(..rsc.len())
                .ok_or(HifError::InvalidArgument)?;
            dst.copy_from_slice(rsc);
        }
        if mode == KeyMode::Station {
            let ifaces = self.ifaces.lock().await;
            header.mac = ifaces[vif.index()]
                .as_ref()
                .filter(|x| x.state == HifState::Connected)
                .map_or(ZERO_MAC, |x| x.assoc_bssid)
                .0;
        }
        let value = concat(&[header.as_bytes(), &key])?;
        match mode {
            KeyMode::Ap => {
                self.set(
                    vif,
                    &mut [
                        ConfigObject::char(Wid::MODE_11I, cipher_mode),
                        ConfigObject::str(Wid::ADD_RX_GTK, value),
                    ],
                )
                .await
            }
            KeyMode::Station => {
                self.set(vif, &mut [ConfigObject::str(Wid::ADD_RX_GTK, value)])
                    .await
            }
        }
    }

    /// Replace the PMKSA cache.
    pub async fn set_pmkid_info(
        &self,
        vif: VifIdx,
        entries: &[(MACAddress, [u8; PMKID_LEN])],
    ) -> Result<(), HifError> {
        if entries.len() > MAX_PMKID {
            return Err(HifError::InvalidArgument);
        }
        let mut value = Vec::new();
        value
            .try_reserve_exact(1 + entries.len() * (6 + PMKID_LEN))
            .map_err(|_| HifError::OutOfMemory)?;
        value.push(entries.len() as u8);
        for (bssid, pmkid) in entries {
            value.extend_from_slice(&bssid.0);
            value.extend_from_slice(pmkid);
        }
        self.set(vif, &mut [ConfigObject::str(Wid::PMKID_INFO, value)])
            .await
    }

    pub async fn get_mac_address(&self, vif: VifIdx) -> Result<MACAddress, HifError> {
        let mut objects = [ConfigObject::str_query(Wid::MAC_ADDR, 6)];
        self.get(vif, &mut objects).await?;
        let mac = objects[0]
            .value
            .as_bytes()
            .and_then(|x| <[u8; 6]>::try_from(x).ok())
            .ok_or(HifError::MalformedResponse)?;
        Ok(MACAddress(mac))
    }

    pub async fn set_mac_address(&self, vif: VifIdx, mac: MACAddress) -> Result<(), HifError> {
        self.set(vif, &mut [ConfigObject::str(Wid::MAC_ADDR, mac.0.to_vec())])
            .await
    }

    pub async fn set_mac_channel(&self, vif: VifIdx, channel: u8) -> Result<(), HifError> {
        self.set(vif, &mut [ConfigObject::char(Wid::CURRENT_CHANNEL, channel)])
            .await
    }

    /// Bind the interface to its firmware handler.
    pub async fn set_wfi_drv_handler(&self, vif: VifIdx, role: Role, mode: u8) -> Result<(), HifError> {
        let handler = DrvHandler {
            handler: u32::from(vif.fw_index()).into(),
            mode: role.ifc_id() | (mode << 1),
        };
        self.set(
            vif,
            &mut [ConfigObject::str(Wid::SET_DRV_HANDLER, concat(&[handler.as_bytes()])?)],
        )
        .await
    }

    pub async fn set_operation_mode(&self, vif: VifIdx, mode: u32) -> Result<(), HifError> {
        self.set(vif, &mut [ConfigObject::int(Wid::SET_OPERATION_MODE, mode)])
            .await
    }

    /// Seconds since `mac` was last heard from.
    pub async fn get_inactive_time(&self, vif: VifIdx, mac: MACAddress) -> Result<u32, HifError> {
        self.set(
            vif,
            &mut [ConfigObject::str(Wid::SET_STA_MAC_INACTIVE_TIME, mac.0.to_vec())],
        )
        .await?;
        let mut objects = [ConfigObject::int(Wid::GET_INACTIVE_TIME, 0)];
        self.get(vif, &mut objects).await?;
        objects[0]
            .value
            .as_u32()
            .ok_or(HifError::MalformedResponse)
    }

    pub async fn get_rssi(&self, vif: VifIdx) -> Result<i8, HifError> {
        Ok(self.get_char(vif, Wid::RSSI).await? as i8)
    }

    /// Read link statistics and update TCP-ack filtering from the link speed.
    pub async fn get_statistics(&self, vif: VifIdx) -> Result<RfInfo, HifError> {
        let mut objects = [
            ConfigObject::char(Wid::LINKSPEED, 0),
            ConfigObject::char(Wid::RSSI, 0),
            ConfigObject::int(Wid::SUCCESS_FRAME_COUNT, 0),
            ConfigObject::int(Wid::RECEIVED_FRAGMENT_COUNT, 0),
            ConfigObject::int(Wid::FAILED_COUNT, 0),
        ];
        self.get(vif, &mut objects).await?;
        let byte = |i: usize| objects[i].value.as_u8().ok_or(HifError::MalformedResponse);
        let int = |i: usize| objects[i].value.as_u32().ok_or(HifError::MalformedResponse);
        let stats = RfInfo {
            link_speed: byte(0)?,
            rssi: byte(1)? as i8,
            tx_count: int(2)?,
            rx_count: int(3)?,
            tx_fail_count: int(4)?,
        };
        log::debug!("statistics: vif={vif} {stats:?}");
        if let Some(enable) = tcp_ack_filter_policy(stats.link_speed) {
            if self.tcp_ack_filter.swap(enable, Ordering::AcqRel) != enable {
                log::info!("tcp ack filter: enabled={enable} link_speed={}", stats.link_speed);
            }
        }
        Ok(stats)
    }

    pub async fn hif_set_cfg(&self, vif: VifIdx, config: LinkConfig) -> Result<(), HifError> {
        let mut objects = config.objects()?;
        if objects.is_empty() {
            return Ok(());
        }
        self.set(vif, &mut objects).await
    }

    /// Ask firmware to forward (or stop forwarding) probe requests or action frames.
    pub async fn frame_register(&self, vif: VifIdx, frame_type: u16, reg: bool) -> Result<(), HifError> {
        let reg_id = match frame_type {
            FRAME_TYPE_ACTION => FW_ACTION_FRM_IDX,
            FRAME_TYPE_PROBE_REQ => FW_PROBE_REQ_IDX,
            _ => {
                log::warn!("unsupported frame registration: type={frame_type:#06x}");
                return Err(HifError::InvalidArgument);
            }
        };
        let registration = FrameRegistration {
            reg: reg.into(),
            reg_id,
            frame_type: frame_type.into(),
        };
        self.set(
            vif,
            &mut [ConfigObject::str(
                Wid::REGISTER_FRAME,
                concat(&[registration.as_bytes()])?,
            )],
        )
        .await
    }

    pub async fn add_beacon(
        &self,
        vif: VifIdx,
        interval: u32,
        dtim_period: u32,
        head: &[u8],
        tail: &[u8],
    ) -> Result<(), HifError> {
        let header = BeaconHeader {
            interval: interval.into(),
            dtim_period: dtim_period.into(),
            head_len: (head.len() as u32).into(),
        };
        let tail_len = U32::new(tail.len() as u32);
        let value = concat(&[header.as_bytes(), head, tail_len.as_bytes(), tail])?;
        self.set(vif, &mut [ConfigObject::bin(Wid::ADD_BEACON, value)])
            .await
    }

    pub async fn del_beacon(&self, vif: VifIdx) -> Result<(), HifError> {
        self.set(vif, &mut [ConfigObject::char(Wid::DEL_BEACON, 0)])
            .await
    }

    pub async fn add_station(&self, vif: VifIdx, station: StationParams<'_>) -> Result<(), HifError> {
        let value = station.to_bytes()?;
        self.set(vif, &mut [ConfigObject::bin(Wid::ADD_STA, value)])
            .await
    }

    pub async fn edit_station(&self, vif: VifIdx, station: StationParams<'_>) -> Result<(), HifError> {
        let value = station.to_bytes()?;
        self.set(vif, &mut [ConfigObject::bin(Wid::EDIT_STA, value)])
            .await
    }

    /// Remove one station, or all of them when `mac` is `None`.
    pub async fn del_station(&self, vif: VifIdx, mac: Option<MACAddress>) -> Result<(), HifError> {
        let mac = mac.unwrap_or(BROADCAST_MAC);
        self.set(vif, &mut [ConfigObject::bin(Wid::REMOVE_STA, mac.0.to_vec())])
            .await
    }

    /// Remove the listed stations in one request. Zero addresses are skipped.
    pub async fn del_all_stations(&self, vif: VifIdx, macs: &[MACAddress]) -> Result<(), HifError> {
        if macs.len() > MAX_NUM_STA {
            return Err(HifError::InvalidArgument);
        }
        let mut value = alloc::vec![0];
        for mac in macs.iter().filter(|x| **x != ZERO_MAC) {
            value.extend_from_slice(&mac.0);
            value[0] += 1;
        }
        if value[0] == 0 {
            return Ok(());
        }
        self.set(vif, &mut [ConfigObject::str(Wid::DEL_ALL_STA, value)])
            .await
    }

    pub async fn set_power_mgmt(&self, vif: VifIdx, enabled: bool) -> Result<(), HifError> {
        self.ensure_registered(vif)?;
        let connected = coordinator::connected_count(&*self.ifaces.lock().await);
        self.apply_power_mgmt(vif, enabled, connected).await
    }

    /// Power save is kept off while both interfaces are associated.
    pub(super) async fn apply_power_mgmt(
        &self,
        vif: VifIdx,
        enabled: bool,
        connected: usize,
    ) -> Result<(), HifError> {
        if enabled && connected == crate::consts::NUM_CONCURRENT_IFC {
            log::debug!("power save skipped, all interfaces connected: vif={vif}");
            return Ok(());
        }
        let mode = if enabled { FW_MIN_FAST_PS } else { FW_NO_POWERSAVE };
        self.send(
            vif,
            Direction::Set,
            &mut [ConfigObject::char(Wid::POWER_MANAGEMENT, mode)],
        )
        .await?;
        self.power_save[vif.index()].store(enabled, Ordering::Release);
        log::debug!("power save: vif={vif} enabled={enabled}");
        Ok(())
    }

    pub async fn set_tx_power(&self, vif: VifIdx, power: u8) -> Result<(), HifError> {
        self.set(vif, &mut [ConfigObject::char(Wid::TX_POWER, power)])
            .await
    }

    pub async fn get_tx_power(&self, vif: VifIdx) -> Result<u8, HifError> {
        self.get_char(vif, Wid::TX_POWER).await
    }

    pub async fn set_antenna(&self, vif: VifIdx, config: AntennaConfig) -> Result<(), HifError> {
        let valid = |gpio| self.chip.is_valid_antenna_gpio(gpio);
        let ok = match config.switch {
            AntennaSwitch::None => true,
            AntennaSwitch::SingleGpio => valid(config.ant1_gpio),
            AntennaSwitch::DualGpio => {
                valid(config.ant1_gpio)
                    && valid(config.ant2_gpio)
                    && config.ant1_gpio != config.ant2_gpio
            }
        };
        if !ok {
            log::warn!("invalid antenna gpio for {:?}: {config:?}", self.chip);
            return Err(HifError::InvalidArgument);
        }
        let selection = AntennaSelection {
            select: config.select,
            ant1_gpio: config.ant1_gpio,
            ant2_gpio: config.ant2_gpio,
            switch_mode: config.switch as u8,
        };
        self.set(
            vif,
            &mut [ConfigObject::bin(
                Wid::ANTENNA_SELECTION,
                concat(&[selection.as_bytes()])?,
            )],
        )
        .await
    }

    pub async fn set_wowlan_trigger(&self, vif: VifIdx, enabled: bool) -> Result<(), HifError> {
        self.set(vif, &mut [ConfigObject::char(Wid::WOWLAN_TRIGGER, enabled.into())])
            .await
    }
}
