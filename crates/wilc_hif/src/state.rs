//! Per-interface host driver state and the callbacks it hands results to.

use crate::{
    VifIdx,
    bss::JoinBssParam,
    consts::{MAX_SCAN_SSIDS, MAX_SSID_LEN, ZERO_MAC},
    coordinator::Role,
    events::{MacStatus, NetworkInfo},
};
use alloc::{boxed::Box, vec::Vec};
use ieee80211::mac_parser::MACAddress;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HifState {
    #[default]
    Idle,
    Scanning,
    Connecting,
    WaitingConnectResponse,
    Connected,
    P2pListen,
}

impl HifState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Connecting => "connecting",
            Self::WaitingConnectResponse => "waiting-connect-response",
            Self::Connected => "connected",
            Self::P2pListen => "p2p-listen",
        }
    }
    /// `Idle` and `Connected` are left only by an operation, the rest resolve on a timer or firmware event.
    pub const fn is_steady(self) -> bool {
        matches!(self, Self::Idle | Self::Connected)
    }
}

impl core::fmt::Display for HifState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivery state of a callback that gets exactly one terminal event.
#[derive(Default)]
pub enum Pending<F> {
    #[default]
    None,
    Pending(F),
    Delivered,
}

impl<F> Pending<F> {
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
    /// Borrow for a non-terminal event.
    pub fn get_mut(&mut self) -> Option<&mut F> {
        match self {
            Self::Pending(f) => Some(f),
            _ => None,
        }
    }
    /// Take the callback for its terminal event. Later calls return `None`.
    pub fn deliver(&mut self) -> Option<F> {
        match core::mem::replace(self, Self::Delivered) {
            Self::Pending(f) => Some(f),
            Self::None => {
                *self = Self::None;
                None
            }
            Self::Delivered => None,
        }
    }
}

impl<F> core::fmt::Debug for Pending<F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::None => "None",
            Self::Pending(_) => "Pending",
            Self::Delivered => "Delivered",
        })
    }
}

pub type Ssid = heapless::Vec<u8, MAX_SSID_LEN>;

#[derive(Debug)]
pub enum ScanEvent<'a> {
    NetworkFound(&'a NetworkInfo),
    Done,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOutcome {
    Done,
    Aborted,
}

impl From<ScanOutcome> for ScanEvent<'_> {
    fn from(outcome: ScanOutcome) -> Self {
        match outcome {
            ScanOutcome::Done => Self::Done,
            ScanOutcome::Aborted => Self::Aborted,
        }
    }
}

pub type ScanCallback = Box<dyn FnMut(ScanEvent<'_>) + Send>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ScanType {
    Passive = 0,
    #[default]
    Active = 1,
}

/// Source of a scan request as reported to firmware.
pub mod scan_source {
    pub const USER: u8 = 0x01;
    pub const OBSS_PERIODIC: u8 = 0x02;
    pub const OBSS_ONETIME: u8 = 0x04;
}

pub struct ScanParams {
    pub source: u8,
    pub scan_type: ScanType,
    pub ssids: heapless::Vec<Ssid, MAX_SCAN_SSIDS>,
    /// Channel numbers. Empty scans every channel.
    pub channels: Vec<u8>,
    /// Extra IEs for the probe requests.
    pub ies: Vec<u8>,
    pub callback: ScanCallback,
}

#[derive(Debug, Default)]
pub struct ScanRequest {
    pub ssids: heapless::Vec<Ssid, MAX_SCAN_SSIDS>,
    pub channels: Vec<u8>,
    pub callback: Pending<ScanCallback>,
}

/// 802.11i mode bits sent with `WID_11I_MODE`.
pub mod security {
    pub const NO_ENCRYPT: u8 = 0;
    pub const ENCRYPT_ENABLED: u8 = 1 << 0;
    pub const WEP: u8 = 1 << 1;
    pub const WEP_EXTENDED: u8 = 1 << 2;
    pub const WPA: u8 = 1 << 3;
    pub const WPA2: u8 = 1 << 4;
    pub const AES: u8 = 1 << 5;
    pub const TKIP: u8 = 1 << 6;
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthType {
    #[default]
    OpenSystem = 1,
    SharedKey = 2,
    Ieee8021x = 5,
}

#[derive(Debug)]
pub struct ConnectResponse<'a> {
    pub mac_status: MacStatus,
    /// 802.11 association status code.
    pub status: u16,
    pub bssid: MACAddress,
    pub req_ies: &'a [u8],
    pub resp_ies: &'a [u8],
}

#[derive(Debug)]
pub enum ConnectEvent<'a> {
    Response(ConnectResponse<'a>),
    Disconnected { reason: u16 },
}

pub type ConnectCallback = Box<dyn FnMut(ConnectEvent<'_>) + Send>;

pub struct ConnectParams {
    pub bssid: MACAddress,
    pub bss: JoinBssParam,
    /// IEs for the association request.
    pub ies: Vec<u8>,
    /// [`security`] bits.
    pub security: u8,
    pub auth_type: AuthType,
    pub callback: ConnectCallback,
}

#[derive(Default)]
pub struct ConnectionInfo {
    pub bssid: MACAddress,
    pub security: u8,
    pub auth_type: AuthType,
    pub req_ies: Option<Vec<u8>>,
    pub resp_ies: Option<Vec<u8>>,
    pub status: u16,
    pub callback: Option<ConnectCallback>,
}

impl ConnectionInfo {
    pub fn release_ies(&mut self) {
        self.req_ies = None;
        self.resp_ies = None;
    }
}

impl core::fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("bssid", &self.bssid)
            .field("security", &self.security)
            .field("auth_type", &self.auth_type)
            .field("req_ies", &self.req_ies.as_ref().map(Vec::len))
            .field("resp_ies", &self.resp_ies.as_ref().map(Vec::len))
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Called with the session cookie when a remain-on-channel session ends.
pub type ExpiryCallback = Box<dyn FnOnce(u64) + Send>;

pub struct RemainOnChannelParams {
    pub channel: u8,
    pub duration_ms: u32,
    pub cookie: u64,
    pub expired: ExpiryCallback,
}

#[derive(Debug)]
pub struct RemainOnChannel {
    pub channel: u8,
    pub duration_ms: u32,
    pub cookie: u64,
    pub expired: Pending<ExpiryCallback>,
}

/// Link statistics read from firmware.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RfInfo {
    pub link_speed: u8,
    pub rssi: i8,
    pub tx_count: u32,
    pub rx_count: u32,
    pub tx_fail_count: u32,
}

pub type StatsCallback = Box<dyn FnMut(VifIdx, &RfInfo) + Send>;

pub struct InterfaceConfig {
    pub role: Role,
    pub mac: MACAddress,
    /// Receives the periodic link statistics while connected.
    pub on_statistics: Option<StatsCallback>,
}

/// State of one virtual interface. Only mutated by the device's worker.
pub struct HostInterface {
    pub idx: VifIdx,
    pub role: Role,
    pub state: HifState,
    pub mac: MACAddress,
    /// BSSID of the current association, zero when not associated.
    pub assoc_bssid: MACAddress,
    pub scan: ScanRequest,
    pub conn: ConnectionInfo,
    pub remain_on_channel: Option<RemainOnChannel>,
    pub stats: RfInfo,
    pub on_statistics: Option<StatsCallback>,
}

impl HostInterface {
    pub fn new(idx: VifIdx, config: InterfaceConfig) -> Self {
        Self {
            idx,
            role: config.role,
            state: HifState::Idle,
            mac: config.mac,
            assoc_bssid: ZERO_MAC,
            scan: Default::default(),
            conn: Default::default(),
            remain_on_channel: None,
            stats: Default::default(),
            on_statistics: config.on_statistics,
        }
    }

    pub fn is_associated(&self) -> bool {
        self.assoc_bssid != ZERO_MAC
    }

    /// State to return to once a transient operation ends.
    pub fn steady_state(&self) -> HifState {
        if self.is_associated() {
            HifState::Connected
        } else {
            HifState::Idle
        }
    }

    pub fn set_state(&mut self, state: HifState) {
        if self.state != state {
            log::info!("state: vif={} {} -> {}", self.idx, self.state, state);
        }
        self.state = state;
    }

    pub fn snapshot(&self) -> InterfaceSnapshot {
        InterfaceSnapshot {
            role: self.role,
            state: self.state,
            assoc_bssid: self.assoc_bssid,
            scan_pending: self.scan.callback.is_pending(),
            req_ies_held: self.conn.req_ies.is_some(),
            resp_ies_held: self.conn.resp_ies.is_some(),
            listen_cookie: self.remain_on_channel.as_ref().map(|x| x.cookie),
            stats: self.stats,
        }
    }
}

/// Read-only copy of [`HostInterface`] for collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceSnapshot {
    pub role: Role,
    pub state: HifState,
    pub assoc_bssid: MACAddress,
    pub scan_pending: bool,
    pub req_ies_held: bool,
    pub resp_ies_held: bool,
    pub listen_cookie: Option<u64>,
    pub stats: RfInfo,
}
