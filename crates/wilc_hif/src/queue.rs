//! Serialized work queue. Every interface state mutation runs as a [`Work`] item on the device's worker.

use crate::{
    Channel, HifError, QueueError, Signal, VifIdx,
    consts::{NUM_CONCURRENT_IFC, WORK_QUEUE_DEPTH},
    events::{MacInfo, NetworkInfo},
    state::{ConnectParams, RemainOnChannelParams, ScanParams},
    timer::Ticket,
};
use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::sync::atomic::{AtomicBool, Ordering};
use ieee80211::mac_parser::MACAddress;

/// Hands a buffered frame to the host stack: `(frame, packet offset)`.
pub type DeliverFrame = Box<dyn FnOnce(&[u8], usize) + Send>;

pub struct BufferedEap {
    pub frame: Vec<u8>,
    pub pkt_offset: usize,
    pub deliver: DeliverFrame,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastFilter {
    pub enabled: bool,
    pub macs: Vec<MACAddress>,
}

/// Payload of a work item, one variant per operation.
pub enum Work {
    Scan(ScanParams),
    ScanComplete,
    ScanTimeout(Ticket),
    Connect(ConnectParams),
    ConnectTimeout(Ticket),
    MacStatus(MacInfo),
    NetworkInfo(NetworkInfo),
    Disconnect,
    ResolveAberration,
    RemainOnChannel(RemainOnChannelParams),
    /// From the host (`ticket: None`) or the remain-on-channel timer.
    ListenExpired {
        cookie: u64,
        ticket: Option<Ticket>,
    },
    PollStatistics,
    GetStatistics,
    SetMulticastFilter(MulticastFilter),
    BufferedEap(BufferedEap),
    PowerSaveRecover,
}

impl Work {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Scan(_) => "scan",
            Self::ScanComplete => "scan-complete",
            Self::ScanTimeout(_) => "scan-timeout",
            Self::Connect(_) => "connect",
            Self::ConnectTimeout(_) => "connect-timeout",
            Self::MacStatus(_) => "mac-status",
            Self::NetworkInfo(_) => "network-info",
            Self::Disconnect => "disconnect",
            Self::ResolveAberration => "resolve-aberration",
            Self::RemainOnChannel(_) => "remain-on-channel",
            Self::ListenExpired { .. } => "listen-expired",
            Self::PollStatistics => "poll-statistics",
            Self::GetStatistics => "get-statistics",
            Self::SetMulticastFilter(_) => "multicast-filter",
            Self::BufferedEap(_) => "buffered-eap",
            Self::PowerSaveRecover => "power-save-recover",
        }
    }
}

type CompletionSignal = Signal<Result<(), HifError>>;

/// Caller side of a synchronous work item.
pub struct Completion(Arc<CompletionSignal>);

impl Completion {
    pub async fn wait(self) -> Result<(), HifError> {
        self.0.wait().await
    }
}

/// Worker side of a synchronous work item. Signals the caller when dropped, whichever way the handler exits.
pub struct CompletionGuard {
    signal: Option<Arc<CompletionSignal>>,
    result: Result<(), HifError>,
}

impl CompletionGuard {
    fn new(signal: Option<Arc<CompletionSignal>>) -> Self {
        Self {
            signal,
            // Item dropped without running, e.g. its interface was removed.
            result: Err(HifError::NoInterface),
        }
    }
    pub fn is_sync(&self) -> bool {
        self.signal.is_some()
    }
    pub fn finish(mut self, result: Result<(), HifError>) {
        self.result = result;
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(signal) = self.signal.take() {
            signal.signal(core::mem::replace(&mut self.result, Ok(())));
        }
    }
}

pub struct WorkItem {
    pub vif: VifIdx,
    pub work: Work,
    pub completion: CompletionGuard,
}

impl WorkItem {
    /// Fire-and-forget item.
    pub fn new(vif: VifIdx, work: Work) -> Self {
        Self {
            vif,
            work,
            completion: CompletionGuard::new(None),
        }
    }

    /// Item whose submitter waits on the returned [`Completion`].
    pub fn sync(vif: VifIdx, work: Work) -> (Self, Completion) {
        let signal = Arc::new(CompletionSignal::new());
        (
            Self {
                vif,
                work,
                completion: CompletionGuard::new(Some(signal.clone())),
            },
            Completion(signal),
        )
    }
}

/// Multi-producer queue drained by a single worker in submission order.
pub struct WorkQueue {
    channel: Channel<WorkItem, WORK_QUEUE_DEPTH>,
    closed: AtomicBool,
    registered: [AtomicBool; NUM_CONCURRENT_IFC],
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            closed: AtomicBool::new(false),
            registered: [const { AtomicBool::new(false) }; NUM_CONCURRENT_IFC],
        }
    }

    /// Never blocks, so it can be used from timer and event contexts.
    pub fn enqueue(&self, item: WorkItem) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::QueueClosed);
        }
        if !self.is_registered(item.vif) {
            log::warn!("no handler: vif={} work={}", item.vif, item.work.name());
            return Err(QueueError::InvalidItem);
        }
        log::debug!("enqueue: vif={} work={}", item.vif, item.work.name());
        self.channel
            .try_send(item)
            .map_err(|_| QueueError::QueueFull)
    }

    pub(crate) async fn next(&self) -> WorkItem {
        self.channel.receive().await
    }

    /// Refuse new items. Items already queued still run.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn set_registered(&self, vif: VifIdx, registered: bool) {
        self.registered[vif.index()].store(registered, Ordering::Release);
    }

    pub fn is_registered(&self, vif: VifIdx) -> bool {
        self.registered[vif.index()].load(Ordering::Acquire)
    }
}
