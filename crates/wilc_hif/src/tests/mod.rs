//! Device scenarios against simulated firmware.

mod remain_on_channel;
mod scan;

use crate::{
    Device, VifIdx,
    coordinator::Role,
    device::Chip,
    state::InterfaceConfig,
    transport::imp::MockFirmware,
};
use core::{
    future::Future,
    pin::{Pin, pin},
    task::{Context, Poll, Waker},
};
use embassy_time::{Duration, MockDriver};
use ieee80211::mac_parser::MACAddress;
use parking_lot::Mutex;
use std::{boxed::Box, sync::Arc, vec::Vec};

/// Setup test.
fn setup() {
    let _ = env_logger::Builder::from_default_env()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    MockDriver::get().reset();
}

fn vif(idx: usize) -> VifIdx {
    VifIdx::new(idx).unwrap()
}

const STA_MAC: MACAddress = MACAddress([0x02, 0, 0, 0, 0, 1]);
const P2P_MAC: MACAddress = MACAddress([0x02, 0, 0, 0, 0, 2]);
const AP_BSSID: MACAddress = MACAddress([0x02, 0xaa, 0, 0, 0, 1]);

/// Events seen by callbacks, shared with the test body.
#[derive(Debug, Clone)]
struct Recorder<T>(Arc<Mutex<Vec<T>>>);

impl<T> Default for Recorder<T> {
    fn default() -> Self {
        Self(Default::default())
    }
}

impl<T: Clone + Send + 'static> Recorder<T> {
    fn push(&self, x: T) {
        self.0.lock().push(x);
    }
    fn take(&self) -> Vec<T> {
        core::mem::take(&mut *self.0.lock())
    }
    fn len(&self) -> usize {
        self.0.lock().len()
    }
}

/// Device driven by hand: the runner is polled between steps and time only moves on [`Harness::advance`].
struct Harness {
    fw: MockFirmware,
    device: &'static Device<MockFirmware>,
    runner: Pin<Box<dyn Future<Output = ()>>>,
    waker: Waker,
}

impl Harness {
    fn new() -> Self {
        setup();
        let fw = MockFirmware::new();
        let device: &'static _ = Box::leak(Box::new(Device::new(fw.clone(), Chip::Wilc1000)));
        Self {
            fw,
            device,
            runner: Box::pin(async move {
                device.run().await;
            }),
            waker: futures_test::task::noop_waker(),
        }
    }

    /// Harness with a station interface on vif 0 and a P2P interface on vif 1.
    fn with_interfaces() -> Self {
        let mut h = Self::new();
        let device = h.device;
        for (idx, role, mac) in [(0, Role::Station, STA_MAC), (1, Role::P2p, P2P_MAC)] {
            h.block_on(device.add_interface(
                vif(idx),
                InterfaceConfig {
                    role,
                    mac,
                    on_statistics: None,
                },
            ))
            .unwrap();
        }
        h
    }

    /// Poll the device until the worker and timers have nothing left to do now.
    fn settle(&mut self) {
        let mut cx = Context::from_waker(&self.waker);
        for _ in 0..64 {
            assert!(self.runner.as_mut().poll(&mut cx).is_pending());
        }
    }

    /// Run `fut` to completion while driving the device.
    fn block_on<F: Future>(&mut self, fut: F) -> F::Output {
        let mut fut = pin!(fut);
        for _ in 0..1000 {
            if let Poll::Ready(x) = fut
                .as_mut()
                .poll(&mut Context::from_waker(&self.waker))
            {
                self.settle();
                return x;
            }
            self.settle();
        }
        panic!("future never completed")
    }

    fn advance(&mut self, dt: Duration) {
        // Step in small increments so periodic timers fire once per period.
        let step = Duration::from_millis(100);
        let mut elapsed = Duration::from_ticks(0);
        while elapsed < dt {
            let dt = step.min(dt - elapsed);
            MockDriver::get().advance(dt);
            elapsed += dt;
            self.settle();
        }
    }
}

/// `len` field plus trailing interface index around `body`, as firmware frames its notifications.
fn notification(body: &[u8], vif: VifIdx) -> Vec<u8> {
    let mut buf = body.to_vec();
    buf.extend_from_slice(&u32::from(vif.fw_index()).to_le_bytes());
    buf
}

/// Association state change.
fn mac_status(status: u8, reason: u8, vif: VifIdx) -> Vec<u8> {
    notification(&[b'I', 0, 0, 0, 0, 0, 0, status, reason, 0], vif)
}

fn beacon(bssid: MACAddress, channel: u8) -> Vec<u8> {
    let mut frame = Vec::new();
    frame.extend_from_slice(&[0x80, 0, 0, 0]);
    frame.extend_from_slice(&[0xff; 6]);
    frame.extend_from_slice(&bssid.0);
    frame.extend_from_slice(&bssid.0);
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(&[0; 8]);
    frame.extend_from_slice(&100u16.to_le_bytes());
    frame.extend_from_slice(&0x0401u16.to_le_bytes());
    frame.extend_from_slice(&[0, 4, b't', b'e', b's', b't']);
    frame.extend_from_slice(&[3, 1, channel]);
    frame
}

/// Network-info notification carrying `frame`.
fn network_info(frame: &[u8], rssi: i8, vif: VifIdx) -> Vec<u8> {
    let mut body = std::vec![b'N', 0, 0, 0, 0, 0];
    body.extend_from_slice(&(frame.len() as u16 + 1).to_le_bytes());
    body.push(rssi as u8);
    body.extend_from_slice(frame);
    notification(&body, vif)
}
