//! Busy rules between interfaces sharing one radio.

use crate::{
    HifError, VifIdx,
    state::{HifState, HostInterface},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Station,
    P2p,
}

impl Role {
    /// Interface id firmware uses in `WID_SET_DRV_HANDLER`.
    pub const fn ifc_id(self) -> u8 {
        match self {
            Self::Station => 0,
            Self::P2p => 1,
        }
    }
    pub const fn other(self) -> Self {
        match self {
            Self::Station => Self::P2p,
            Self::P2p => Self::Station,
        }
    }
}

/// Operations that reserve the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Scan,
    Connect,
    RemainOnChannel,
}

pub type Interfaces = [Option<HostInterface>; crate::consts::NUM_CONCURRENT_IFC];

/// First registered interface with `role`.
pub fn lookup_role(ifaces: &Interfaces, role: Role) -> Option<&HostInterface> {
    ifaces.iter().flatten().find(|x| x.role == role)
}

/// Interface sharing the radio with `me` in the other role.
pub fn lookup_sibling(ifaces: &Interfaces, me: VifIdx) -> Option<&HostInterface> {
    let role = ifaces.get(me.index())?.as_ref()?.role;
    ifaces
        .iter()
        .flatten()
        .find(|x| x.idx != me && x.role == role.other())
}

fn busy(me: VifIdx, op: Operation, other: &HostInterface) -> HifError {
    log::warn!(
        "busy: vif={me} op={op:?} blocked by vif={} state={}",
        other.idx,
        other.state
    );
    HifError::Busy
}

/// Fail fast with [`HifError::Busy`] when `op` on `me` would conflict with this interface or its sibling.
///
/// - Scan and remain-on-channel need both interfaces idle or connected.
/// - Connect needs neither interface scanning, and the sibling not connecting itself.
pub fn check_busy(ifaces: &Interfaces, me: VifIdx, op: Operation) -> Result<(), HifError> {
    let this = ifaces
        .get(me.index())
        .and_then(Option::as_ref)
        .ok_or(HifError::NoInterface)?;
    let sibling = lookup_sibling(ifaces, me);

    match op {
        Operation::Scan | Operation::RemainOnChannel => {
            for x in core::iter::once(this).chain(sibling) {
                if !x.state.is_steady() {
                    return Err(busy(me, op, x));
                }
            }
        }
        Operation::Connect => {
            if this.state == HifState::Scanning {
                return Err(busy(me, op, this));
            }
            if let Some(x) = sibling.filter(|x| {
                matches!(
                    x.state,
                    HifState::Scanning | HifState::Connecting | HifState::WaitingConnectResponse
                )
            }) {
                return Err(busy(me, op, x));
            }
        }
    }
    Ok(())
}

/// Interfaces currently associated.
pub fn connected_count(ifaces: &Interfaces) -> usize {
    ifaces
        .iter()
        .flatten()
        .filter(|x| x.state == HifState::Connected)
        .count()
}
