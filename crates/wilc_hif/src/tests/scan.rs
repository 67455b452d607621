use super::*;
use crate::{
    HifError, HifState,
    consts::SCAN_TIMEOUT,
    state::{ScanEvent, ScanParams, ScanType, scan_source},
    wid::{Wid, WidValue},
};
use std::vec;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Found(MACAddress, i8),
    Done,
    Aborted,
}

fn scan_params(channels: &[u8], ssids: &[&[u8]], seen: &Recorder<Seen>) -> ScanParams {
    let seen = seen.clone();
    ScanParams {
        source: scan_source::USER,
        scan_type: ScanType::Active,
        ssids: ssids
            .iter()
            .map(|x| heapless::Vec::from_slice(x).unwrap())
            .collect(),
        channels: channels.to_vec(),
        ies: vec![0xdd, 1, 0],
        callback: Box::new(move |event: ScanEvent<'_>| {
            seen.push(match event {
                ScanEvent::NetworkFound(info) => Seen::Found(info.bssid().unwrap(), info.rssi),
                ScanEvent::Done => Seen::Done,
                ScanEvent::Aborted => Seen::Aborted,
            })
        }),
    }
}

fn scan_complete(vif: VifIdx) -> Vec<u8> {
    notification(&[b'S', 0, 0, 0, 0, 0, 0], vif)
}

#[test]
#[serial_test::serial]
fn scan_reports_networks_then_done_once() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let seen = Recorder::default();

    h.block_on(device.scan(vif(0), scan_params(&[1, 6, 11], &[b"test"], &seen)))
        .unwrap();
    assert_eq!(h.block_on(device.state(vif(0))), Some(HifState::Scanning));

    let requests = h.fw.requests();
    let scan = requests
        .iter()
        .find(|x| x.find(Wid::START_SCAN_REQ).is_some())
        .unwrap();
    assert_eq!(scan.vif, 1);
    assert_eq!(
        scan.find(Wid::SCAN_CHANNEL_LIST),
        Some(&WidValue::Bin(vec![0, 5, 10]))
    );
    assert_eq!(
        scan.find(Wid::SSID_PROBE_REQ),
        Some(&WidValue::Str(vec![1, 4, b't', b'e', b's', b't']))
    );
    assert_eq!(scan.find(Wid::INFO_ELEMENT_PROBE), Some(&WidValue::Bin(vec![0xdd, 1, 0])));
    assert_eq!(scan.find(Wid::SCAN_TYPE), Some(&WidValue::Char(1)));
    assert_eq!(scan.find(Wid::START_SCAN_REQ), Some(&WidValue::Char(scan_source::USER)));

    h.block_on(device.network_info_received(&network_info(&beacon(AP_BSSID, 6), -40, vif(0))));
    h.block_on(device.scan_complete_received(&scan_complete(vif(0))));
    assert_eq!(seen.take(), [Seen::Found(AP_BSSID, -40), Seen::Done]);
    assert_eq!(h.block_on(device.state(vif(0))), Some(HifState::Idle));

    // Late completion and results for a finished scan are dropped.
    h.block_on(device.scan_complete_received(&scan_complete(vif(0))));
    h.block_on(device.network_info_received(&network_info(&beacon(AP_BSSID, 6), -40, vif(0))));
    assert_eq!(seen.len(), 0);
    assert!(h.fw.log.lock().sets(Wid::ABORT_RUNNING_SCAN).is_empty());
}

#[test]
#[serial_test::serial]
fn scan_without_ssids_skips_probe_list() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let seen = Recorder::default();

    h.block_on(device.scan(vif(0), scan_params(&[], &[], &seen)))
        .unwrap();
    let log = h.fw.log.lock();
    assert!(log.sets(Wid::SSID_PROBE_REQ).is_empty());
    assert_eq!(log.sets(Wid::SCAN_CHANNEL_LIST), [&WidValue::Bin(vec![])]);
}

#[test]
#[serial_test::serial]
fn scan_timeout_aborts_once() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let seen = Recorder::default();

    h.block_on(device.scan(vif(0), scan_params(&[1], &[], &seen)))
        .unwrap();
    h.advance(SCAN_TIMEOUT - Duration::from_millis(100));
    assert_eq!(seen.len(), 0);

    h.advance(Duration::from_millis(200));
    assert_eq!(seen.take(), [Seen::Aborted]);
    assert_eq!(
        h.fw.log.lock().sets(Wid::ABORT_RUNNING_SCAN),
        [&WidValue::Char(1)]
    );
    assert_eq!(h.block_on(device.state(vif(0))), Some(HifState::Idle));

    h.block_on(device.scan_complete_received(&scan_complete(vif(0))));
    h.advance(SCAN_TIMEOUT);
    assert_eq!(seen.len(), 0);
}

#[test]
#[serial_test::serial]
fn scan_busy_while_sibling_scans() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let seen = Recorder::default();

    h.block_on(device.scan(vif(0), scan_params(&[1], &[], &seen)))
        .unwrap();
    h.fw.clear();
    let res = h.block_on(device.scan(vif(1), scan_params(&[1], &[], &seen)));
    assert!(matches!(res, Err(HifError::Busy)));
    assert!(h.fw.requests().is_empty());
    assert_eq!(h.block_on(device.state(vif(1))), Some(HifState::Idle));
}

#[test]
#[serial_test::serial]
fn scan_transport_failure_leaves_idle() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let seen = Recorder::default();

    h.fw.fail_next(1);
    let res = h.block_on(device.scan(vif(0), scan_params(&[1], &[], &seen)));
    assert!(matches!(res, Err(HifError::TransportFailure)));
    assert_eq!(h.block_on(device.state(vif(0))), Some(HifState::Idle));
    h.advance(SCAN_TIMEOUT);
    assert_eq!(seen.len(), 0);
}

#[test]
#[serial_test::serial]
fn non_beacon_network_info_ignored() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let seen = Recorder::default();

    h.block_on(device.scan(vif(0), scan_params(&[1], &[], &seen)))
        .unwrap();
    let mut probe_req = beacon(AP_BSSID, 1);
    probe_req[0] = 0x40;
    h.block_on(device.network_info_received(&network_info(&probe_req, -50, vif(0))));
    // Truncated notification.
    h.block_on(device.network_info_received(&[0, 1]));
    assert_eq!(seen.len(), 0);
}
