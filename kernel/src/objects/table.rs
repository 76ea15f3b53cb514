//! TCB arena and free-list management.
//!
//! All TCBs live in one boxed slab from boot to shutdown. Slots
//! `0..max_tcbs` form the dense user-visible tid space; one trailing slot
//! per core holds that core's idle thread, unreachable from any system-call
//! argument. Halted slots form a circular doubly-linked free list through
//! the TCBs' own link fields: creation pops the head, reaping pushes it.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::abi::Word;
use crate::config::Config;

use super::{Tcb, ThreadState, Tid};

pub struct TcbTable {
    slots: Box<[Tcb]>,

    /// First free TCB, or `None` when the table is exhausted.
    free_head: Option<Tid>,

    /// Number of user-allocatable slots (`max_tcbs`).
    user_slots: usize,
}

impl TcbTable {
    pub(crate) fn new(cfg: &Config) -> Self {
        let total = cfg.max_tcbs + cfg.num_execution_units;
        let slots: Box<[Tcb]> = (0..total).map(|i| Tcb::new(Tid(i))).collect::<Vec<_>>().into();

        let mut table = Self {
            slots,
            free_head: None,
            user_slots: cfg.max_tcbs,
        };
        for i in (0..cfg.max_tcbs).rev() {
            table.push_free(Tid(i));
        }
        table
    }

    #[inline]
    pub fn tcb(&self, tid: Tid) -> &Tcb {
        &self.slots[tid.0]
    }

    #[inline]
    pub fn tcb_mut(&mut self, tid: Tid) -> &mut Tcb {
        &mut self.slots[tid.0]
    }

    /// Bounds-check a user-supplied thread id. The only lookup on the fast
    /// path; idle slots are out of range.
    #[inline]
    pub fn lookup(&self, raw: Word) -> Option<Tid> {
        if raw < self.user_slots {
            Some(Tid(raw))
        } else {
            None
        }
    }

    #[inline]
    pub fn user_slots(&self) -> usize {
        self.user_slots
    }

    /// The idle TCB of the given core.
    #[inline]
    pub fn idle_tid(&self, core: usize) -> Tid {
        Tid(self.user_slots + core)
    }

    /// Pop the first free TCB, or `None` when the free list is empty.
    pub fn allocate(&mut self) -> Option<Tid> {
        let head = self.free_head?;

        let next = self.tcb(head).next.expect("free list links broken");
        if next == head {
            // Last TCB on the list.
            self.free_head = None;
        } else {
            let prev = self.tcb(head).prev.expect("free list links broken");
            self.free_head = Some(next);
            self.tcb_mut(next).prev = Some(prev);
            self.tcb_mut(prev).next = Some(next);
        }
        let tcb = self.tcb_mut(head);
        tcb.next = None;
        tcb.prev = None;

        debug_assert_eq!(tcb.state, ThreadState::Halted);
        Some(head)
    }

    /// Return a reaped TCB to the free list. The slot is scrubbed so the
    /// next allocation sees a clean record.
    pub fn free(&mut self, tid: Tid) {
        debug_assert_eq!(self.tcb(tid).state, ThreadState::Zombie);
        self.tcb_mut(tid).scrub();
        self.push_free(tid);
    }

    fn push_free(&mut self, tid: Tid) {
        debug_assert_eq!(self.tcb(tid).state, ThreadState::Halted);
        match self.free_head {
            None => {
                self.tcb_mut(tid).next = Some(tid);
                self.tcb_mut(tid).prev = Some(tid);
            }
            Some(head) => {
                let prev = self.tcb(head).prev.expect("free list links broken");
                self.tcb_mut(prev).next = Some(tid);
                self.tcb_mut(head).prev = Some(tid);
                let tcb = self.tcb_mut(tid);
                tcb.next = Some(head);
                tcb.prev = Some(prev);
            }
        }
        self.free_head = Some(tid);
    }

    /// Walk the free list, for invariant checks.
    #[cfg(test)]
    fn free_list(&self) -> Vec<Tid> {
        let mut out = Vec::new();
        let Some(head) = self.free_head else {
            return out;
        };
        let mut cur = head;
        loop {
            out.push(cur);
            cur = self.tcb(cur).next.expect("free list links broken");
            if cur == head {
                break;
            }
        }
        out
    }
}
