//! Work item handlers. Only the worker runs these, with the interface table locked.

use super::Device;
use crate::{
    HifError, VifIdx,
    consts::{
        FALSE_FRMWR_CHANNEL, MAX_ASSOC_RESP_FRAME_SIZE, WLAN_STATUS_SUCCESS,
        WLAN_STATUS_UNSPECIFIED_FAILURE, ZERO_MAC,
    },
    coordinator::{self, Interfaces, Operation},
    dispatcher::Direction,
    events::{self, MacInfo, MacStatus, NetworkInfo},
    queue::{MulticastFilter, Work},
    state::{
        ConnectEvent, ConnectParams, ConnectResponse, ConnectionInfo, HifState, HostInterface,
        Pending, RemainOnChannel, RemainOnChannelParams, ScanEvent, ScanOutcome, ScanParams,
    },
    timer::{Ticket, TimerKind},
    transport::Transport,
    wid::{ConfigObject, Wid},
};
use alloc::vec::Vec;
use common::err;
use embassy_time::Duration;

fn hif_mut(ifaces: &mut Interfaces, vif: VifIdx) -> Result<&mut HostInterface, HifError> {
    ifaces[vif.index()]
        .as_mut()
        .ok_or(HifError::NoInterface)
}

fn copy_bytes(src: &[u8]) -> Result<Vec<u8>, HifError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(src.len())
        .map_err(|_| HifError::OutOfMemory)?;
    buf.extend_from_slice(src);
    Ok(buf)
}

/// `SSID_PROBE_REQ` payload: SSID count, then each SSID prefixed with its length.
fn probe_ssids(params: &ScanParams) -> Result<Vec<u8>, HifError> {
    let len = 1 + params.ssids.iter().map(|x| 1 + x.len()).sum::<usize>();
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)
        .map_err(|_| HifError::OutOfMemory)?;
    buf.push(params.ssids.len() as u8);
    for ssid in &params.ssids {
        buf.push(ssid.len() as u8);
        buf.extend_from_slice(ssid);
    }
    Ok(buf)
}

/// Firmware numbers channels from zero.
fn fw_channels(channels: &[u8]) -> Vec<u8> {
    channels
        .iter()
        .map(|&ch| if ch > 0 { ch - 1 } else { ch })
        .collect()
}

fn connect_response(conn: &mut ConnectionInfo, mac_status: MacStatus) {
    let ConnectionInfo {
        bssid,
        req_ies,
        resp_ies,
        status,
        callback,
        ..
    } = conn;
    match callback {
        Some(callback) => callback(ConnectEvent::Response(ConnectResponse {
            mac_status,
            status: *status,
            bssid: *bssid,
            req_ies: req_ies.as_deref().unwrap_or_default(),
            resp_ies: resp_ies.as_deref().unwrap_or_default(),
        })),
        None => log::warn!("connect response without callback"),
    }
}

impl<T: Transport> Device<T> {
    pub(super) async fn execute(&self, vif: VifIdx, work: Work) -> Result<(), HifError> {
        log::debug!("execute: vif={vif} work={}", work.name());
        let mut ifaces = self.ifaces.lock().await;
        let ifaces = &mut *ifaces;
        if ifaces[vif.index()].is_none() {
            log::warn!("interface gone: vif={vif} work={}", work.name());
            return Err(HifError::NoInterface);
        }

        match work {
            Work::Scan(params) => self.handle_scan(ifaces, vif, params).await,
            Work::ScanComplete => {
                self.scan_done(hif_mut(ifaces, vif)?, ScanOutcome::Done)
                    .await;
                Ok(())
            }
            Work::ScanTimeout(ticket) => {
                if self.take_ticket(vif, TimerKind::Scan, ticket) {
                    log::warn!("scan timeout: vif={vif}");
                    self.scan_done(hif_mut(ifaces, vif)?, ScanOutcome::Aborted)
                        .await;
                }
                Ok(())
            }
            Work::Connect(params) => self.handle_connect(ifaces, vif, params).await,
            Work::ConnectTimeout(ticket) => {
                if self.take_ticket(vif, TimerKind::Connect, ticket) {
                    self.handle_connect_timeout(hif_mut(ifaces, vif)?).await;
                }
                Ok(())
            }
            Work::MacStatus(info) => {
                self.handle_mac_status(hif_mut(ifaces, vif)?, info)
                    .await;
                Ok(())
            }
            Work::NetworkInfo(info) => {
                handle_network_info(hif_mut(ifaces, vif)?, &info);
                Ok(())
            }
            Work::Disconnect => self.handle_disconnect(ifaces, vif).await,
            Work::ResolveAberration => {
                let state = hif_mut(ifaces, vif)?.state;
                if matches!(
                    state,
                    HifState::Connecting | HifState::WaitingConnectResponse
                ) {
                    log::warn!("resolving stuck connect: vif={vif} state={state}");
                    self.handle_disconnect(ifaces, vif).await
                } else {
                    Ok(())
                }
            }
            Work::RemainOnChannel(params) => {
                self.handle_remain_on_channel(ifaces, vif, params)
                    .await
            }
            Work::ListenExpired { cookie, ticket } => {
                self.handle_listen_expired(hif_mut(ifaces, vif)?, cookie, ticket)
                    .await
            }
            Work::PollStatistics => {
                let hif = hif_mut(ifaces, vif)?;
                if hif.state != HifState::Connected {
                    return Ok(());
                }
                self.refresh_statistics(hif).await
            }
            Work::GetStatistics => self.refresh_statistics(hif_mut(ifaces, vif)?).await,
            Work::SetMulticastFilter(filter) => self.handle_multicast_filter(vif, &filter).await,
            Work::BufferedEap(eap) => {
                log::debug!("buffered eap: vif={vif} len={}", eap.frame.len());
                (eap.deliver)(&eap.frame, eap.pkt_offset);
                Ok(())
            }
            Work::PowerSaveRecover => {
                let enabled = self.power_save[vif.index()].load(core::sync::atomic::Ordering::Acquire);
                self.apply_power_mgmt(vif, enabled, coordinator::connected_count(ifaces))
                    .await
            }
        }
    }

    /// Whether a timer-fired item still belongs to the live arming. Stops the timer if so.
    fn take_ticket(&self, vif: VifIdx, kind: TimerKind, ticket: Ticket) -> bool {
        let slot = self.timer(vif, kind);
        if !slot.is_current(ticket) {
            log::debug!("stale timer item: vif={vif} timer={kind:?}");
            return false;
        }
        slot.cancel();
        true
    }

    async fn handle_scan(
        &self,
        ifaces: &mut Interfaces,
        vif: VifIdx,
        params: ScanParams,
    ) -> Result<(), HifError> {
        coordinator::check_busy(ifaces, vif, Operation::Scan)?;

        let mut objects = Vec::with_capacity(5);
        if !params.ssids.is_empty() {
            objects.push(ConfigObject::str(Wid::SSID_PROBE_REQ, probe_ssids(&params)?));
        }
        objects.push(ConfigObject::bin(Wid::INFO_ELEMENT_PROBE, copy_bytes(&params.ies)?));
        objects.push(ConfigObject::char(Wid::SCAN_TYPE, params.scan_type as u8));
        objects.push(ConfigObject::bin(
            Wid::SCAN_CHANNEL_LIST,
            fw_channels(&params.channels),
        ));
        objects.push(ConfigObject::char(Wid::START_SCAN_REQ, params.source));

        self.send(vif, Direction::Set, &mut objects).await?;

        let hif = hif_mut(ifaces, vif)?;
        log::info!(
            "scan started: vif={vif} ssids={} channels={}",
            params.ssids.len(),
            params.channels.len()
        );
        hif.scan.ssids = params.ssids;
        hif.scan.channels = params.channels;
        hif.scan.callback = Pending::Pending(params.callback);
        hif.set_state(HifState::Scanning);
        self.timer(vif, TimerKind::Scan)
            .arm(crate::consts::SCAN_TIMEOUT, 0);
        Ok(())
    }

    /// Finish the pending scan. A second completion for the same scan is dropped.
    async fn scan_done(&self, hif: &mut HostInterface, outcome: ScanOutcome) {
        let vif = hif.idx;
        let Some(mut callback) = hif.scan.callback.deliver() else {
            log::warn!("scan {outcome:?} without pending scan: vif={vif}");
            return;
        };
        self.timer(vif, TimerKind::Scan).cancel();
        if outcome == ScanOutcome::Aborted {
            let mut objects = [ConfigObject::char(Wid::ABORT_RUNNING_SCAN, 1)];
            err!(
                self.send(vif, Direction::Set, &mut objects).await,
                "abort running scan"
            );
        }
        hif.set_state(hif.steady_state());
        log::info!("scan finished: vif={vif} outcome={outcome:?}");
        callback(outcome.into());
    }

    async fn handle_connect(
        &self,
        ifaces: &mut Interfaces,
        vif: VifIdx,
        params: ConnectParams,
    ) -> Result<(), HifError> {
        coordinator::check_busy(ifaces, vif, Operation::Connect)?;
        let mut objects = [
            ConfigObject::bin(Wid::INFO_ELEMENT_ASSOCIATE, copy_bytes(&params.ies)?),
            ConfigObject::char(Wid::MODE_11I, params.security),
            ConfigObject::char(Wid::AUTH_TYPE, params.auth_type as u8),
            ConfigObject::str(
                Wid::JOIN_REQ_EXTENDED,
                copy_bytes(zerocopy::IntoBytes::as_bytes(&params.bss))?,
            ),
        ];
        let req_ies = copy_bytes(&params.ies)?;

        let hif = hif_mut(ifaces, vif)?;
        let prev_state = hif.state;
        hif.conn = ConnectionInfo {
            bssid: params.bssid,
            security: params.security,
            auth_type: params.auth_type,
            req_ies: Some(req_ies),
            resp_ies: None,
            status: WLAN_STATUS_UNSPECIFIED_FAILURE,
            callback: Some(params.callback),
        };
        hif.set_state(HifState::Connecting);

        if let Err(e) = self.send(vif, Direction::Set, &mut objects).await {
            log::error!("connect request failed: vif={vif} bssid={} {e:?}", params.bssid);
            hif.set_state(prev_state);
            hif.conn.release_ies();
            hif.conn.callback = None;
            return Err(e.into());
        }

        log::info!("connecting: vif={vif} bssid={}", params.bssid);
        hif.set_state(HifState::WaitingConnectResponse);
        self.timer(vif, TimerKind::Connect)
            .arm(crate::consts::CONNECT_TIMEOUT, 0);
        Ok(())
    }

    async fn handle_connect_timeout(&self, hif: &mut HostInterface) {
        let vif = hif.idx;
        log::warn!("connect timeout: vif={vif} bssid={}", hif.conn.bssid);
        hif.set_state(HifState::Idle);
        hif.conn.status = WLAN_STATUS_UNSPECIFIED_FAILURE;
        connect_response(&mut hif.conn, MacStatus::Disconnected);

        let mut objects = [ConfigObject::char(Wid::DISCONNECT, 0)];
        err!(
            self.send(vif, Direction::Set, &mut objects).await,
            "disconnect after connect timeout"
        );
        hif.conn.release_ies();
    }

    async fn handle_mac_status(&self, hif: &mut HostInterface, info: MacInfo) {
        let vif = hif.idx;
        if hif.conn.callback.is_none() {
            log::warn!("mac status without connect request: vif={vif} {info:?}");
            return;
        }
        log::debug!("mac status: vif={vif} state={} {info:?}", hif.state);
        match (hif.state, info.status) {
            (HifState::WaitingConnectResponse, _) => self.handle_connect_result(hif, info).await,
            (HifState::Connected, MacStatus::Disconnected) => {
                self.handle_fw_disconnect(hif, info).await
            }
            (HifState::Scanning, MacStatus::Disconnected) if hif.is_associated() => {
                self.handle_fw_disconnect(hif, info).await
            }
            (_, MacStatus::Disconnected) if hif.scan.callback.is_pending() => {
                self.scan_done(hif, ScanOutcome::Aborted).await
            }
            (state, status) => {
                log::warn!("unexpected mac status: vif={vif} state={state} status={status:?}")
            }
        }
    }

    async fn handle_connect_result(&self, hif: &mut HostInterface, info: MacInfo) {
        let vif = hif.idx;
        self.timer(vif, TimerKind::Connect).cancel();
        hif.conn.status = WLAN_STATUS_UNSPECIFIED_FAILURE;

        if info.status == MacStatus::Connected {
            let mut objects = [ConfigObject::str_query(
                Wid::ASSOC_RES_INFO,
                MAX_ASSOC_RESP_FRAME_SIZE,
            )];
            match self.send(vif, Direction::Get, &mut objects).await {
                Ok(()) => {
                    let buf = objects[0].value.as_bytes().unwrap_or_default();
                    match events::parse_assoc_resp_info(buf) {
                        Ok((status, ies)) => {
                            hif.conn.status = status;
                            hif.conn.resp_ies = copy_bytes(ies).ok();
                        }
                        Err(e) => log::error!("bad association response: vif={vif} {e:?}"),
                    }
                }
                Err(e) => log::error!("association response unavailable: vif={vif} {e:?}"),
            }
        }

        let success = info.status == MacStatus::Connected && hif.conn.status == WLAN_STATUS_SUCCESS;
        if info.status == MacStatus::Connected && !success {
            log::warn!(
                "associated with failure status: vif={vif} status={}",
                hif.conn.status
            );
        }
        connect_response(&mut hif.conn, info.status);
        if success {
            hif.assoc_bssid = hif.conn.bssid;
            hif.set_state(HifState::Connected);
        } else {
            hif.assoc_bssid = ZERO_MAC;
            hif.set_state(HifState::Idle);
        }
        hif.conn.release_ies();
    }

    /// Firmware lost the association on its own.
    async fn handle_fw_disconnect(&self, hif: &mut HostInterface, info: MacInfo) {
        log::info!(
            "disconnected by firmware: vif={} bssid={} reason={}",
            hif.idx,
            hif.assoc_bssid,
            info.reason
        );
        if hif.scan.callback.is_pending() {
            self.scan_done(hif, ScanOutcome::Aborted).await;
        }
        if let Some(callback) = hif.conn.callback.as_mut() {
            callback(ConnectEvent::Disconnected {
                reason: info.reason.into(),
            });
        }
        hif.assoc_bssid = ZERO_MAC;
        hif.conn.release_ies();
        hif.set_state(HifState::Idle);
    }

    async fn handle_disconnect(&self, ifaces: &mut Interfaces, vif: VifIdx) -> Result<(), HifError> {
        // Scans run radio-wide, so a disconnect ends them on every interface.
        for hif in ifaces.iter_mut().flatten() {
            if hif.scan.callback.is_pending() {
                self.scan_done(hif, ScanOutcome::Aborted).await;
            }
        }

        let mut objects = [ConfigObject::char(Wid::DISCONNECT, 0)];
        self.send(vif, Direction::Set, &mut objects).await?;

        let hif = hif_mut(ifaces, vif)?;
        log::info!("disconnected: vif={vif} state={}", hif.state);
        match hif.state {
            HifState::Connecting | HifState::WaitingConnectResponse => {
                self.timer(vif, TimerKind::Connect).cancel();
                hif.conn.status = WLAN_STATUS_UNSPECIFIED_FAILURE;
                connect_response(&mut hif.conn, MacStatus::Disconnected);
            }
            HifState::Connected => {
                if let Some(callback) = hif.conn.callback.as_mut() {
                    callback(ConnectEvent::Disconnected { reason: 0 });
                }
            }
            _ => {}
        }
        hif.set_state(HifState::Idle);
        hif.assoc_bssid = ZERO_MAC;
        hif.conn.release_ies();
        Ok(())
    }

    async fn handle_remain_on_channel(
        &self,
        ifaces: &mut Interfaces,
        vif: VifIdx,
        params: RemainOnChannelParams,
    ) -> Result<(), HifError> {
        coordinator::check_busy(ifaces, vif, Operation::RemainOnChannel)?;

        let mut objects = [ConfigObject::str(
            Wid::REMAIN_ON_CHAN,
            alloc::vec![1, params.channel],
        )];
        self.send(vif, Direction::Set, &mut objects).await?;

        let hif = hif_mut(ifaces, vif)?;
        log::info!(
            "remain on channel: vif={vif} channel={} duration_ms={} cookie={}",
            params.channel,
            params.duration_ms,
            params.cookie
        );
        hif.remain_on_channel = Some(RemainOnChannel {
            channel: params.channel,
            duration_ms: params.duration_ms,
            cookie: params.cookie,
            expired: Pending::Pending(params.expired),
        });
        hif.set_state(HifState::P2pListen);
        self.timer(vif, TimerKind::RemainOnChannel).arm(
            Duration::from_millis(params.duration_ms.into()),
            params.cookie,
        );
        Ok(())
    }

    async fn handle_listen_expired(
        &self,
        hif: &mut HostInterface,
        cookie: u64,
        ticket: Option<Ticket>,
    ) -> Result<(), HifError> {
        let vif = hif.idx;
        let slot = self.timer(vif, TimerKind::RemainOnChannel);
        if let Some(ticket) = ticket {
            if !slot.is_current(ticket) {
                log::debug!("stale listen expiry: vif={vif} cookie={cookie}");
                return Ok(());
            }
        }

        if hif.state != HifState::P2pListen {
            log::debug!("listen expired while {}: vif={vif}", hif.state);
            return Ok(());
        }
        let session_cookie = hif.remain_on_channel.as_ref().map(|x| x.cookie);
        if session_cookie != Some(cookie) {
            log::warn!("listen expiry cookie mismatch: vif={vif} got={cookie} session={session_cookie:?}");
            return Ok(());
        }
        slot.cancel();

        let mut objects = [ConfigObject::str(
            Wid::REMAIN_ON_CHAN,
            alloc::vec![0, FALSE_FRMWR_CHANNEL],
        )];
        // The host session ends even when firmware misses the request.
        let res = self.send(vif, Direction::Set, &mut objects).await;

        if let Some(mut session) = hif.remain_on_channel.take() {
            if let Some(expired) = session.expired.deliver() {
                expired(cookie);
            }
        }
        hif.set_state(hif.steady_state());
        log::info!("listen ended: vif={vif} cookie={cookie}");
        res.map_err(HifError::from)
    }

    async fn refresh_statistics(&self, hif: &mut HostInterface) -> Result<(), HifError> {
        let vif = hif.idx;
        let stats = self.get_statistics(vif).await?;
        hif.stats = stats;
        if let Some(callback) = hif.on_statistics.as_mut() {
            callback(vif, &stats);
        }
        Ok(())
    }

    async fn handle_multicast_filter(
        &self,
        vif: VifIdx,
        filter: &MulticastFilter,
    ) -> Result<(), HifError> {
        let mut buf = Vec::new();
        buf.try_reserve_exact(8 + filter.macs.len() * 6)
            .map_err(|_| HifError::OutOfMemory)?;
        buf.extend_from_slice(&u32::from(filter.enabled).to_le_bytes());
        buf.extend_from_slice(&(filter.macs.len() as u32).to_le_bytes());
        for mac in &filter.macs {
            buf.extend_from_slice(&mac.0);
        }
        let mut objects = [ConfigObject::bin(Wid::SETUP_MULTICAST_FILTER, buf)];
        self.send(vif, Direction::Set, &mut objects).await?;
        log::debug!(
            "multicast filter: vif={vif} enabled={} entries={}",
            filter.enabled,
            filter.macs.len()
        );
        Ok(())
    }
}

fn handle_network_info(hif: &mut HostInterface, info: &NetworkInfo) {
    if !info.is_beacon_or_probe_resp() {
        log::trace!("ignoring non-beacon frame: vif={}", hif.idx);
        return;
    }
    match hif.scan.callback.get_mut() {
        Some(callback) => callback(ScanEvent::NetworkFound(info)),
        None => log::debug!("network info without pending scan: vif={}", hif.idx),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_numbers_shift_down() {
        assert_eq!(fw_channels(&[1, 6, 11, 0]), [0, 5, 10, 0]);
    }

    #[test]
    fn probe_ssid_payload() {
        let mut ssids = heapless::Vec::new();
        ssids.push(heapless::Vec::from_slice(b"ab").unwrap()).unwrap();
        ssids.push(heapless::Vec::from_slice(b"xyz").unwrap()).unwrap();
        let params = ScanParams {
            source: crate::state::scan_source::USER,
            scan_type: Default::default(),
            ssids,
            channels: Vec::new(),
            ies: Vec::new(),
            callback: alloc::boxed::Box::new(|_| {}),
        };
        assert_eq!(probe_ssids(&params).unwrap(), b"\x02\x02ab\x03xyz");
    }
}
