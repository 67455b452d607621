//! One-shot and periodic timers that hand expiry to the work queue.
//!
//! A [`TimerSlot`] never touches interface state. When its deadline passes the device's timer task turns the
//! [`Ticket`] into a work item. Every arm and cancel bumps the slot's epoch so a handler can tell whether the
//! item it is running still belongs to the live timer.

use crate::Signal;
use core::cell::RefCell;
use critical_section::Mutex;
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Instant, Timer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    Scan,
    Connect,
    RemainOnChannel,
    StatsPoll,
}

impl TimerKind {
    pub const COUNT: usize = 4;
    pub const ALL: [Self; Self::COUNT] = [
        Self::Scan,
        Self::Connect,
        Self::RemainOnChannel,
        Self::StatsPoll,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }
}

/// Identifies one arming of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u32,
    /// Caller data carried to the work item, e.g. a remain-on-channel cookie.
    pub tag: u64,
}

#[derive(Debug, Default)]
struct SlotState {
    deadline: Option<Instant>,
    epoch: u32,
    tag: u64,
}

pub struct TimerSlot {
    state: Mutex<RefCell<SlotState>>,
    wake: Signal<()>,
}

impl Default for TimerSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerSlot {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(SlotState {
                deadline: None,
                epoch: 0,
                tag: 0,
            })),
            wake: Signal::new(),
        }
    }

    /// (Re)start the timer to expire `after` from now.
    pub fn arm(&self, after: Duration, tag: u64) -> Ticket {
        let ticket = critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.epoch = state.epoch.wrapping_add(1);
            state.deadline = Some(Instant::now() + after);
            state.tag = tag;
            Ticket {
                epoch: state.epoch,
                tag,
            }
        });
        self.wake.signal(());
        ticket
    }

    /// Stop the timer. A ticket it already handed out is stale afterwards, so an expiry queued before the
    /// cancel is never acted on.
    pub fn cancel(&self) {
        critical_section::with(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            state.epoch = state.epoch.wrapping_add(1);
            state.deadline = None;
        });
        self.wake.signal(());
    }

    /// `ticket` comes from the latest arming and the timer wasn't cancelled since.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).epoch == ticket.epoch)
    }

    pub fn is_armed(&self) -> bool {
        critical_section::with(|cs| self.state.borrow_ref(cs).deadline.is_some())
    }

    /// Wait for the next expiry.
    pub async fn expired(&self) -> Ticket {
        loop {
            let armed = critical_section::with(|cs| {
                let state = self.state.borrow_ref(cs);
                state.deadline.map(|deadline| (deadline, state.epoch))
            });
            let Some((deadline, epoch)) = armed else {
                self.wake.wait().await;
                continue;
            };
            if let Either::First(()) = select(Timer::at(deadline), self.wake.wait()).await {
                let fired = critical_section::with(|cs| {
                    let mut state = self.state.borrow_ref_mut(cs);
                    // Re-armed or cancelled while waking up.
                    if state.epoch != epoch || state.deadline.is_none() {
                        return None;
                    }
                    state.deadline = None;
                    Some(Ticket {
                        epoch,
                        tag: state.tag,
                    })
                });
                if let Some(ticket) = fired {
                    return ticket;
                }
            }
        }
    }
}
