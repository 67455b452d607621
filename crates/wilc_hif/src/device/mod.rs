//! One physical radio: its interfaces, the work-queue worker, the timers and the firmware event entry points.

mod config_ops;
mod handlers;

pub use config_ops::{
    AntennaConfig, AntennaSwitch, KeyMaterial, KeyMode, LinkConfig, StationParams,
    tcp_ack_filter_policy,
};

use crate::{
    AsyncMutex, HifError, VifIdx,
    consts::{NUM_CONCURRENT_IFC, STATS_POLL_PERIOD},
    coordinator::Interfaces,
    dispatcher::{Direction, Dispatcher},
    error::DispatchError,
    events,
    queue::{BufferedEap, MulticastFilter, Work, WorkItem, WorkQueue},
    state::{
        ConnectParams, HifState, HostInterface, InterfaceConfig, InterfaceSnapshot,
        RemainOnChannelParams, ScanEvent, ScanParams,
    },
    timer::{TimerKind, TimerSlot},
    transport::Transport,
    wid::ConfigObject,
};
use common::err;
use core::sync::atomic::{AtomicBool, Ordering};
use embassy_futures::join::{join, join_array};

const TIMER_TASKS: usize = NUM_CONCURRENT_IFC * TimerKind::COUNT;

/// Chip revision, decides which GPIOs can drive an antenna switch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Chip {
    #[default]
    Wilc1000,
    Wilc3000,
}

/// Device context shared by every operation on one radio.
pub struct Device<T> {
    dispatcher: AsyncMutex<Dispatcher<T>>,
    ifaces: AsyncMutex<Interfaces>,
    timers: [[TimerSlot; TimerKind::COUNT]; NUM_CONCURRENT_IFC],
    queue: WorkQueue,
    /// Held while an interface is removed and while a firmware notification is routed.
    teardown: AsyncMutex<()>,
    tcp_ack_filter: AtomicBool,
    /// Last power-save mode applied per interface, restored by [`Device::powersave_state_recover`].
    power_save: [AtomicBool; NUM_CONCURRENT_IFC],
    chip: Chip,
}

impl<T: Transport> Device<T> {
    pub fn new(transport: T, chip: Chip) -> Self {
        Self {
            dispatcher: AsyncMutex::new(Dispatcher::new(transport)),
            ifaces: AsyncMutex::new([const { None }; NUM_CONCURRENT_IFC]),
            timers: [const { [const { TimerSlot::new() }; TimerKind::COUNT] }; NUM_CONCURRENT_IFC],
            queue: WorkQueue::new(),
            teardown: AsyncMutex::new(()),
            tcp_ack_filter: AtomicBool::new(false),
            power_save: [const { AtomicBool::new(false) }; NUM_CONCURRENT_IFC],
            chip,
        }
    }

    pub fn chip(&self) -> Chip {
        self.chip
    }

    /// Run the worker and every timer. Must be polled for any operation to complete.
    pub async fn run(&self) -> ! {
        let timers = join_array(core::array::from_fn::<_, TIMER_TASKS, _>(|i| {
            self.timer_task(i)
        }));
        join(self.worker(), timers).await;
        unreachable!("worker exited")
    }

    async fn worker(&self) {
        loop {
            let WorkItem {
                vif,
                work,
                completion,
            } = self.queue.next().await;
            let name = work.name();
            let res = self.execute(vif, work).await;
            match &res {
                Err(e) if !completion.is_sync() => {
                    log::error!("work failed: vif={vif} work={name} {e:?}")
                }
                Err(e) => log::debug!("work failed: vif={vif} work={name} {e:?}"),
                Ok(()) => {}
            }
            completion.finish(res);
        }
    }

    /// Turns expiries of one timer into work items.
    async fn timer_task(&self, i: usize) {
        let Some(vif) = VifIdx::new(i / TimerKind::COUNT) else {
            return;
        };
        let kind = TimerKind::ALL[i % TimerKind::COUNT];
        let slot = self.timer(vif, kind);
        loop {
            let ticket = slot.expired().await;
            log::debug!("timer expired: vif={vif} timer={kind:?}");
            let work = match kind {
                TimerKind::Scan => Work::ScanTimeout(ticket),
                TimerKind::Connect => Work::ConnectTimeout(ticket),
                TimerKind::RemainOnChannel => Work::ListenExpired {
                    cookie: ticket.tag,
                    ticket: Some(ticket),
                },
                TimerKind::StatsPoll => {
                    slot.arm(STATS_POLL_PERIOD, 0);
                    Work::PollStatistics
                }
            };
            err!(
                self.queue.enqueue(WorkItem::new(vif, work)),
                "timer expiry dropped"
            );
        }
    }

    pub(crate) fn timer(&self, vif: VifIdx, kind: TimerKind) -> &TimerSlot {
        &self.timers[vif.index()][kind.index()]
    }

    pub(crate) async fn send(
        &self,
        vif: VifIdx,
        direction: Direction,
        objects: &mut [ConfigObject],
    ) -> Result<(), DispatchError> {
        self.dispatcher
            .lock()
            .await
            .send(vif.fw_index(), direction, objects)
            .await
    }

    /// Queue `work` and wait for its handler.
    async fn submit(&self, vif: VifIdx, work: Work) -> Result<(), HifError> {
        let (item, completion) = WorkItem::sync(vif, work);
        self.queue.enqueue(item)?;
        completion.wait().await
    }

    fn post(&self, vif: VifIdx, work: Work) -> Result<(), HifError> {
        Ok(self.queue.enqueue(WorkItem::new(vif, work))?)
    }

    pub async fn add_interface(&self, vif: VifIdx, config: InterfaceConfig) -> Result<(), HifError> {
        let mut ifaces = self.ifaces.lock().await;
        let slot = &mut ifaces[vif.index()];
        if slot.is_some() {
            log::warn!("interface already added: vif={vif}");
            return Err(HifError::InvalidArgument);
        }
        log::info!(
            "interface added: vif={vif} role={:?} mac={}",
            config.role,
            config.mac
        );
        *slot = Some(HostInterface::new(vif, config));
        self.queue.set_registered(vif, true);
        self.timer(vif, TimerKind::StatsPoll)
            .arm(STATS_POLL_PERIOD, 0);
        Ok(())
    }

    /// Stop every timer, abort a pending scan and drop the interface's state.
    pub async fn remove_interface(&self, vif: VifIdx) -> Result<(), HifError> {
        let _teardown = self.teardown.lock().await;
        self.queue.set_registered(vif, false);
        for kind in TimerKind::ALL {
            self.timer(vif, kind).cancel();
        }
        let mut hif = self.ifaces.lock().await[vif.index()]
            .take()
            .ok_or(HifError::NoInterface)?;
        if let Some(mut callback) = hif.scan.callback.deliver() {
            callback(ScanEvent::Aborted);
        }
        hif.conn.release_ies();
        hif.set_state(HifState::Idle);
        log::info!("interface removed: vif={vif}");
        Ok(())
    }

    /// Refuse further work, e.g. before the device is dropped.
    pub fn close(&self) {
        log::info!("work queue closed");
        self.queue.close();
    }

    pub async fn state(&self, vif: VifIdx) -> Option<HifState> {
        self.ifaces.lock().await[vif.index()]
            .as_ref()
            .map(|x| x.state)
    }

    pub async fn snapshot(&self, vif: VifIdx) -> Option<InterfaceSnapshot> {
        self.ifaces.lock().await[vif.index()]
            .as_ref()
            .map(HostInterface::snapshot)
    }

    /// Whether link statistics last asked for TCP-ack filtering.
    pub fn tcp_ack_filter(&self) -> bool {
        self.tcp_ack_filter.load(Ordering::Acquire)
    }

    pub async fn scan(&self, vif: VifIdx, params: ScanParams) -> Result<(), HifError> {
        self.submit(vif, Work::Scan(params)).await
    }

    pub async fn connect(&self, vif: VifIdx, params: ConnectParams) -> Result<(), HifError> {
        self.submit(vif, Work::Connect(params)).await
    }

    pub async fn disconnect(&self, vif: VifIdx) -> Result<(), HifError> {
        self.submit(vif, Work::Disconnect).await
    }

    pub async fn remain_on_channel(
        &self,
        vif: VifIdx,
        params: RemainOnChannelParams,
    ) -> Result<(), HifError> {
        if params.duration_ms == 0 {
            return Err(HifError::InvalidArgument);
        }
        self.submit(vif, Work::RemainOnChannel(params)).await
    }

    /// End the remain-on-channel session `cookie` before its timer does.
    pub fn listen_state_expired(&self, vif: VifIdx, cookie: u64) -> Result<(), HifError> {
        self.post(
            vif,
            Work::ListenExpired {
                cookie,
                ticket: None,
            },
        )
    }

    /// Disconnect if the interface is stuck mid-connect.
    pub fn resolve_disconnect_aberration(&self, vif: VifIdx) -> Result<(), HifError> {
        self.post(vif, Work::ResolveAberration)
    }

    pub fn setup_multicast_filter(
        &self,
        vif: VifIdx,
        filter: MulticastFilter,
    ) -> Result<(), HifError> {
        if filter.macs.len() > crate::consts::MULTICAST_TABLE_SIZE {
            return Err(HifError::InvalidArgument);
        }
        self.post(vif, Work::SetMulticastFilter(filter))
    }

    /// Hand a buffered EAP frame to the host stack from the worker.
    pub fn send_buffered_eap(&self, vif: VifIdx, eap: BufferedEap) -> Result<(), HifError> {
        self.post(vif, Work::BufferedEap(eap))
    }

    /// Re-apply the last power-save mode, e.g. after firmware woke up.
    pub fn powersave_state_recover(&self, vif: VifIdx) -> Result<(), HifError> {
        self.post(vif, Work::PowerSaveRecover)
    }

    /// Refresh the stored link statistics from the worker.
    pub fn get_statistics_async(&self, vif: VifIdx) -> Result<(), HifError> {
        self.post(vif, Work::GetStatistics)
    }

    fn ingest(
        &self,
        buf: &[u8],
        parse: impl FnOnce(&[u8]) -> Result<Work, HifError>,
    ) -> Result<(), HifError> {
        let vif = events::trailing_vif(buf)?;
        let work = parse(buf)?;
        self.post(vif, work)
    }

    /// Firmware saw a network while scanning.
    pub async fn network_info_received(&self, buf: &[u8]) {
        let _teardown = self.teardown.lock().await;
        err!(
            self.ingest(buf, |buf| Ok(Work::NetworkInfo(events::parse_network_info(buf)?))),
            "network info dropped"
        );
    }

    /// Firmware reported a change of association state.
    pub async fn async_info_received(&self, buf: &[u8]) {
        let _teardown = self.teardown.lock().await;
        err!(
            self.ingest(buf, |buf| Ok(Work::MacStatus(events::parse_mac_info(buf)?))),
            "async info dropped"
        );
    }

    pub async fn scan_complete_received(&self, buf: &[u8]) {
        let _teardown = self.teardown.lock().await;
        err!(
            self.ingest(buf, |_| Ok(Work::ScanComplete)),
            "scan complete dropped"
        );
    }
}
