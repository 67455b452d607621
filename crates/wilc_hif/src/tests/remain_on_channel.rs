use super::*;
use crate::{
    HifError, HifState,
    consts::FALSE_FRMWR_CHANNEL,
    state::{RemainOnChannelParams, ScanParams, ScanType, scan_source},
    wid::{Wid, WidValue},
};
use std::vec;

fn listen(channel: u8, duration_ms: u32, cookie: u64, expired: &Recorder<u64>) -> RemainOnChannelParams {
    let expired = expired.clone();
    RemainOnChannelParams {
        channel,
        duration_ms,
        cookie,
        expired: Box::new(move |cookie| expired.push(cookie)),
    }
}

#[test]
#[serial_test::serial]
fn listen_ends_on_timer() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let expired = Recorder::default();

    h.block_on(device.remain_on_channel(vif(1), listen(6, 500, 42, &expired)))
        .unwrap();
    let snapshot = h.block_on(device.snapshot(vif(1))).unwrap();
    assert_eq!(snapshot.state, HifState::P2pListen);
    assert_eq!(snapshot.listen_cookie, Some(42));

    h.advance(Duration::from_millis(400));
    assert_eq!(expired.len(), 0);
    h.advance(Duration::from_millis(200));
    assert_eq!(expired.take(), [42]);
    assert_eq!(
        h.fw.log.lock().sets(Wid::REMAIN_ON_CHAN),
        [
            &WidValue::Str(vec![1, 6]),
            &WidValue::Str(vec![0, FALSE_FRMWR_CHANNEL])
        ]
    );
    let snapshot = h.block_on(device.snapshot(vif(1))).unwrap();
    assert_eq!(snapshot.state, HifState::Idle);
    assert_eq!(snapshot.listen_cookie, None);
}

#[test]
#[serial_test::serial]
fn host_expiry_needs_matching_cookie() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let expired = Recorder::default();

    h.block_on(device.remain_on_channel(vif(1), listen(1, 1000, 42, &expired)))
        .unwrap();
    device.listen_state_expired(vif(1), 7).unwrap();
    h.settle();
    assert_eq!(expired.len(), 0);
    assert_eq!(h.block_on(device.state(vif(1))), Some(HifState::P2pListen));

    // The mismatched expiry left the session's timer running.
    h.advance(Duration::from_millis(1500));
    assert_eq!(expired.take(), [42]);
    assert_eq!(h.block_on(device.state(vif(1))), Some(HifState::Idle));

    h.block_on(device.remain_on_channel(vif(1), listen(1, 1000, 43, &expired)))
        .unwrap();
    device.listen_state_expired(vif(1), 43).unwrap();
    h.settle();
    assert_eq!(expired.take(), [43]);
    assert_eq!(h.block_on(device.state(vif(1))), Some(HifState::Idle));

    // Host expiry stopped the timer.
    h.advance(Duration::from_millis(1500));
    assert_eq!(expired.len(), 0);
    assert_eq!(h.fw.log.lock().sets(Wid::REMAIN_ON_CHAN).len(), 4);
}

#[test]
#[serial_test::serial]
fn listen_ends_when_firmware_fails_to_stop() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let expired = Recorder::default();

    h.block_on(device.remain_on_channel(vif(1), listen(11, 300, 5, &expired)))
        .unwrap();
    h.fw.fail_next(1);
    h.advance(Duration::from_millis(400));
    assert_eq!(expired.take(), [5]);
    let snapshot = h.block_on(device.snapshot(vif(1))).unwrap();
    assert_eq!(snapshot.state, HifState::Idle);
    assert_eq!(snapshot.listen_cookie, None);

    // Nothing left over: the radio is free for the next listen.
    h.block_on(device.remain_on_channel(vif(1), listen(11, 300, 6, &expired)))
        .unwrap();
    h.advance(Duration::from_millis(400));
    assert_eq!(expired.take(), [6]);
}

#[test]
#[serial_test::serial]
fn expiry_after_disconnect_is_noop() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let expired = Recorder::default();

    h.block_on(device.remain_on_channel(vif(1), listen(1, 500, 9, &expired)))
        .unwrap();
    h.block_on(device.disconnect(vif(1))).unwrap();
    assert_eq!(h.block_on(device.state(vif(1))), Some(HifState::Idle));

    h.advance(Duration::from_millis(600));
    assert_eq!(expired.len(), 0);
    assert_eq!(h.fw.log.lock().sets(Wid::REMAIN_ON_CHAN).len(), 1);
}

#[test]
#[serial_test::serial]
fn listen_busy_while_sibling_scans() {
    let mut h = Harness::with_interfaces();
    let device = h.device;
    let expired = Recorder::default();

    let scan = ScanParams {
        source: scan_source::USER,
        scan_type: ScanType::Passive,
        ssids: Default::default(),
        channels: vec![1],
        ies: vec![],
        callback: Box::new(|_: crate::state::ScanEvent<'_>| {}),
    };
    h.block_on(device.scan(vif(0), scan)).unwrap();
    let res = h.block_on(device.remain_on_channel(vif(1), listen(1, 500, 1, &expired)));
    assert!(matches!(res, Err(HifError::Busy)));

    let res = h.block_on(device.remain_on_channel(vif(1), listen(1, 0, 1, &expired)));
    assert!(matches!(res, Err(HifError::InvalidArgument)));
}
