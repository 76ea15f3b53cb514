//! Thread Control Block.
//!
//! One fixed-layout record per thread, allocated from a static arena sized
//! at kernel construction. A TCB's identity is its arena index; it never
//! moves and is never freed, only recycled through the `Halted` state.
//!
//! ## Thread lifecycle
//!
//! ```text
//!           create
//!   Halted ────────► Ready ◄──────── activate ── Wait*
//!     ▲                │
//!     │ reap           │ exit
//!     └──── Zombie ◄───┘
//! ```
//!
//! All `Wait*` states are owned by the subsystem holding the matching
//! resource; only that subsystem moves the thread back to `Ready`.

use crate::abi::{Utcb, Word};
use crate::context::TrapContext;

/// Dense thread id; also the TCB's index in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tid(pub usize);

impl Tid {
    /// The id as seen across the trap boundary.
    #[inline]
    pub fn as_word(self) -> Word {
        self.0 as Word
    }
}

impl core::fmt::Display for Tid {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread lifecycle and wait states.
///
/// There is no separate "running" state: the current thread of a core is
/// `Ready` but dequeued from the ready structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// On the free list; the state of a slot that holds no thread.
    Halted,

    /// Eligible to run (possibly running right now).
    Ready,

    /// Parked on a peer's send queue waiting for it to receive.
    WaitIpcSend,

    /// Waiting for a message, from a specific peer or from anyone.
    WaitIpcRecv,

    /// Send phase of a call: parked on the callee's send queue, but already
    /// committed to receiving the reply.
    WaitIpcCall,

    /// Asleep on a futex tag.
    WaitFutex,

    /// Asleep until the registered interrupt fires.
    WaitInterrupt,

    /// Waiting for another thread to exit.
    WaitJoin,

    /// Exited, waiting to be reaped by a joiner.
    Zombie,
}

/// Thread Control Block.
///
/// The link fields are shared by every queue a thread can be on (free list,
/// ready queue, a peer's send queue, a futex chain) because a TCB is on at
/// most one of them at any instant; `state` says which.
#[derive(Debug)]
pub struct Tcb {
    /// Identity; equal to the arena index, stable for the kernel's lifetime.
    pub(crate) tid: Tid,

    /// Saved register state.
    pub(crate) context: TrapContext,

    /// The per-thread page shared with user space.
    pub(crate) utcb: Utcb,

    pub(crate) state: ThreadState,

    /// Scheduling priority; higher number wins.
    pub(crate) priority: u8,

    /// Intrusive queue links. `next` alone is used on futex chains; both on
    /// the circular free list, ready queues and send queues.
    pub(crate) next: Option<Tid>,
    pub(crate) prev: Option<Tid>,

    /// Receive filter while in `WaitIpcRecv` (`None` = any); the blocked-on
    /// peer while in `WaitIpcSend`/`WaitIpcCall`.
    pub(crate) ipc_waiting_for: Option<Tid>,

    /// Head of the circular queue of senders blocked on this thread.
    pub(crate) ipc_send_head: Option<Tid>,

    /// The single thread joining on us, if any.
    pub(crate) joiner: Option<Tid>,

    /// Tag being awaited while in `WaitFutex`.
    pub(crate) futex_tag: Word,

    /// The one IRQ this thread handles, if registered. Kept in lock-step
    /// with the interrupt handler table.
    pub(crate) registered_interrupt: Option<Word>,
}

impl Tcb {
    pub(crate) fn new(tid: Tid) -> Self {
        Self {
            tid,
            context: TrapContext::new(),
            utcb: Utcb::new(),
            state: ThreadState::Halted,
            priority: 0,
            next: None,
            prev: None,
            ipc_waiting_for: None,
            ipc_send_head: None,
            joiner: None,
            futex_tag: 0,
            registered_interrupt: None,
        }
    }

    #[inline]
    pub fn tid(&self) -> Tid {
        self.tid
    }

    #[inline]
    pub fn state(&self) -> ThreadState {
        self.state
    }

    #[inline]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    #[inline]
    pub fn utcb(&self) -> &Utcb {
        &self.utcb
    }

    #[inline]
    pub fn utcb_mut(&mut self) -> &mut Utcb {
        &mut self.utcb
    }

    /// Saved system-call result register.
    #[inline]
    pub fn retval(&self) -> Word {
        self.context.r0
    }

    /// True for every state except `Halted`.
    #[inline]
    pub fn is_alive(&self) -> bool {
        self.state != ThreadState::Halted
    }

    /// Scrub all subsystem state so the next allocation of this slot sees a
    /// clean record. Called on every transition into `Halted`.
    pub(crate) fn scrub(&mut self) {
        let tid = self.tid;
        *self = Tcb::new(tid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_tcb_is_halted_and_clean() {
        let tcb = Tcb::new(Tid(3));
        assert_eq!(tcb.tid(), Tid(3));
        assert_eq!(tcb.state(), ThreadState::Halted);
        assert!(!tcb.is_alive());
        assert_eq!(tcb.registered_interrupt, None);
        assert_eq!(tcb.ipc_send_head, None);
    }

    #[test]
    fn scrub_clears_subsystem_state() {
        let mut tcb = Tcb::new(Tid(7));
        tcb.state = ThreadState::Zombie;
        tcb.priority = 9;
        tcb.futex_tag = 0xdead_beef;
        tcb.registered_interrupt = Some(4);
        tcb.joiner = Some(Tid(1));

        tcb.scrub();

        assert_eq!(tcb.tid(), Tid(7));
        assert_eq!(tcb.state(), ThreadState::Halted);
        assert_eq!(tcb.priority(), 0);
        assert_eq!(tcb.futex_tag, 0);
        assert_eq!(tcb.registered_interrupt, None);
        assert_eq!(tcb.joiner, None);
    }
}
