use embassy_time::Duration;
use ieee80211::mac_parser::MACAddress;

include!(concat!(env!("OUT_DIR"), "/const_gen.rs"));

/// Virtual interfaces sharing one radio (station + P2P).
pub const NUM_CONCURRENT_IFC: usize = 2;

pub const SCAN_TIMEOUT: Duration = Duration::from_millis(SCAN_TIMEOUT_MS);
pub const CONNECT_TIMEOUT: Duration = Duration::from_millis(CONNECT_TIMEOUT_MS);
pub const STATS_POLL_PERIOD: Duration = Duration::from_millis(STATS_POLL_MS);
pub const DISPATCH_TIMEOUT: Duration = Duration::from_millis(DISPATCH_TIMEOUT_MS);

/// Largest association response firmware hands back for `WID_ASSOC_RES_INFO`.
pub const MAX_ASSOC_RESP_FRAME_SIZE: usize = 256;
/// Largest configuration frame exchanged with firmware in either direction.
pub const MAX_CFG_FRAME_SIZE: usize = 2048;

/// Channel number firmware understands as "leave remain-on-channel".
pub const FALSE_FRMWR_CHANNEL: u8 = 100;

/// Link speed (Mbps) above which TCP-ack filtering pays off.
pub const TCP_ACK_FILTER_LINK_SPEED_THRESH: u8 = 54;
/// Link speed firmware reports before it has measured anything.
pub const DEFAULT_LINK_SPEED: u8 = 72;

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_RATES_SUPPORTED: usize = 12;
/// Max SSIDs in one probe request.
pub const MAX_SCAN_SSIDS: usize = 10;
pub const MAX_NUM_STA: usize = 9;
pub const MAX_PAIRWISE_SUITES: usize = 3;
pub const MAX_PMKID: usize = 16;
pub const PMKID_LEN: usize = 16;
pub const RX_MIC_KEY_LEN: usize = 8;
pub const TX_MIC_KEY_LEN: usize = 8;
pub const HT_CAP_LEN: usize = 26;

/// 802.11 status code for a successful association.
pub const WLAN_STATUS_SUCCESS: u16 = 0;

pub const ZERO_MAC: MACAddress = MACAddress([0; 6]);
pub const BROADCAST_MAC: MACAddress = MACAddress([0xff; 6]);

/// Firmware's catch-all failure status, used when no association response could be read.
pub const WLAN_STATUS_UNSPECIFIED_FAILURE: u16 = 1;

pub const MULTICAST_TABLE_SIZE: usize = 8;
/// WEP-104.
pub const MAX_WEP_KEY_LEN: usize = 13;
/// Longest pairwise/group temporal key without MICs.
pub const MAX_TK_LEN: usize = 32;
pub const KEY_RSC_LEN: usize = 8;

/// `WID_POWER_MANAGEMENT` values.
pub const FW_NO_POWERSAVE: u8 = 0;
pub const FW_MIN_FAST_PS: u8 = 1;
