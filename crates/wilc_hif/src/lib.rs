//! Control-plane core of a WILC-style WiFi host interface.
//!
//! High level operations (scan, connect, disconnect, keys, remain-on-channel, AP station management) are
//! turned into batches of configuration objects sent to firmware through a [`transport::Transport`].
//! Asynchronous firmware notifications are decoded and queued as work items. A single worker, driven by
//! [`Device::run`], executes them in order so interface state has exactly one writer.
#![no_std]

#[cfg(any(test, feature = "std"))]
#[macro_use]
#[allow(unused_imports)]
extern crate std;

extern crate alloc;

pub mod bss;
pub mod codec;
pub mod consts;
pub mod coordinator;
pub mod device;
pub mod dispatcher;
pub mod error;
pub mod events;
pub(crate) mod macros;
pub mod queue;
pub mod state;
pub mod timer;
pub mod transport;
pub mod wid;

#[cfg(test)]
mod tests;

pub use device::Device;
pub use error::{CodecError, DispatchError, HifError, QueueError};
pub use state::HifState;
pub use wid::{ConfigObject, Wid, WidValue};

use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel as ChannelRaw,
    signal::Signal as SignalRaw,
};

pub type Channel<T, const N: usize> = ChannelRaw<CriticalSectionRawMutex, T, N>;
pub type AsyncMutex<T> = embassy_sync::mutex::Mutex<CriticalSectionRawMutex, T>;
pub type Signal<T> = SignalRaw<CriticalSectionRawMutex, T>;

/// Index of a virtual interface on its device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VifIdx(u8);

impl VifIdx {
    pub const fn new(idx: usize) -> Option<Self> {
        if idx < consts::NUM_CONCURRENT_IFC {
            Some(Self(idx as u8))
        } else {
            None
        }
    }
    pub const fn index(self) -> usize {
        self.0 as usize
    }
    /// Index firmware uses for this interface. Firmware counts from 1.
    pub const fn fw_index(self) -> u8 {
        self.0 + 1
    }
    pub fn from_fw_index(idx: u32) -> Option<Self> {
        Self::new(usize::try_from(idx.checked_sub(1)?).ok()?)
    }
    pub fn all() -> impl Iterator<Item = Self> {
        (0..consts::NUM_CONCURRENT_IFC).filter_map(Self::new)
    }
}

impl core::fmt::Display for VifIdx {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}
