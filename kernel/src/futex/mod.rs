//! Fast user-space synchronisation objects.
//!
//! Threads rendezvous on 32-bit tags: `futex_wait(tag)` sleeps until some
//! `futex_signal(tag)` wakes exactly one waiter, preferring the
//! highest-priority one (FIFO within a priority class). Waiters hang off a
//! hash table of priority-sorted chains; a signal that finds no waiter is
//! remembered in a bounded pending buffer and consumed by the next matching
//! wait. Tag zero is reserved.

use alloc::boxed::Box;
use alloc::vec;

use log::trace;

use crate::abi::{ErrorKind, Word};
use crate::config::Config;
use crate::context::Switch;
use crate::kernel::Kernel;
use crate::objects::{TcbTable, ThreadState, Tid};

pub(crate) struct FutexTable {
    /// Chain heads, indexed by tag hash. Chains are sorted by descending
    /// priority; insertion keeps equal priorities in arrival order.
    buckets: Box<[Option<Tid>]>,

    /// Signals delivered with no waiter present, newest last. Capacity is
    /// `max_tcbs`: one outstanding wake per possible thread covers the
    /// steady state, and the cap keeps a signal storm from growing the
    /// kernel image's memory story.
    pending: Box<[Word]>,
    num_pending: usize,

    slots: usize,
    slots_lg2: u32,
}

impl FutexTable {
    pub(crate) fn new(cfg: &Config) -> Self {
        let slots = cfg.futex_hash_slots();
        Self {
            buckets: vec![None; slots].into(),
            pending: vec![0; cfg.max_tcbs].into(),
            num_pending: 0,
            slots,
            slots_lg2: cfg.futex_hash_slots_lg2(),
        }
    }

    /// Mix a tag into a bucket index. Folding the tag by multiples of the
    /// table's log2 keeps nearby tags from clustering in one bucket.
    pub(crate) fn hash_tag(&self, tag: Word) -> usize {
        let h1 = (tag >> 2)
            .wrapping_add(tag >> self.slots_lg2)
            .wrapping_add(tag >> (2 * self.slots_lg2).min(Word::BITS - 1));
        h1 & (self.slots - 1)
    }

    /// Chain `thread` into its tag's bucket, before the first waiter of
    /// strictly lower priority. Walking from the head on signal therefore
    /// finds the highest-priority matching waiter first.
    pub(crate) fn enqueue(&mut self, tcbs: &mut TcbTable, thread: Tid, tag: Word) {
        let bucket = self.hash_tag(tag);
        let priority = tcbs.tcb(thread).priority();

        let mut prev: Option<Tid> = None;
        let mut curr = self.buckets[bucket];
        while let Some(c) = curr {
            if priority > tcbs.tcb(c).priority() {
                break;
            }
            prev = Some(c);
            curr = tcbs.tcb(c).next;
        }

        tcbs.tcb_mut(thread).next = curr;
        match prev {
            None => self.buckets[bucket] = Some(thread),
            Some(p) => tcbs.tcb_mut(p).next = Some(thread),
        }
    }

    /// Find and unchain one waiter for `tag`: the first match from the
    /// head, which the insertion order makes the highest-priority, oldest
    /// one.
    pub(crate) fn signal_dequeue(&mut self, tcbs: &mut TcbTable, tag: Word) -> Option<Tid> {
        let bucket = self.hash_tag(tag);

        let mut prev: Option<Tid> = None;
        let mut curr = self.buckets[bucket];
        while let Some(c) = curr {
            if tcbs.tcb(c).futex_tag == tag {
                let after = tcbs.tcb(c).next;
                match prev {
                    None => self.buckets[bucket] = after,
                    Some(p) => tcbs.tcb_mut(p).next = after,
                }
                tcbs.tcb_mut(c).next = None;
                return Some(c);
            }
            prev = Some(c);
            curr = tcbs.tcb(c).next;
        }
        None
    }

    /// Consume the most recent pending signal for `tag`, if any.
    pub(crate) fn take_pending(&mut self, tag: Word) -> bool {
        for i in (0..self.num_pending).rev() {
            if self.pending[i] == tag {
                self.pending[i] = self.pending[self.num_pending - 1];
                self.num_pending -= 1;
                return true;
            }
        }
        false
    }

    /// Record a signal nobody was waiting for.
    pub(crate) fn push_pending(&mut self, tag: Word) -> Result<(), ErrorKind> {
        if self.num_pending >= self.pending.len() {
            return Err(ErrorKind::NoMemory);
        }
        self.pending[self.num_pending] = tag;
        self.num_pending += 1;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn num_pending(&self) -> usize {
        self.num_pending
    }
}

impl Kernel {
    /// `futex_wait` system call.
    pub fn sys_futex_wait(&mut self, tag: Word) {
        self.kernel_entry();
        let sw = self.futex_wait_inner(tag);
        self.complete(sw);
    }

    /// `futex_signal` system call.
    pub fn sys_futex_signal(&mut self, tag: Word) {
        self.kernel_entry();
        let sw = self.futex_signal_inner(tag);
        self.complete(sw);
    }

    fn futex_wait_inner(&mut self, tag: Word) -> Switch {
        // The zero tag is reserved for system use.
        if tag == 0 {
            return self.syscall_return_error(1, ErrorKind::Invalid);
        }

        // A signal may already be parked for us.
        if self.futexes.take_pending(tag) {
            trace!("[futex] wait: tag {:#x} satisfied by pending signal", tag);
            return self.syscall_return_success(0);
        }

        let me = self.current();
        trace!("[futex] wait: tid {} sleeps on tag {:#x}", me, tag);
        self.return_success(me, 0);
        let next = self.deactivate_self_schedule(ThreadState::WaitFutex);

        self.tcbs.tcb_mut(me).futex_tag = tag;
        let Kernel { tcbs, futexes, .. } = self;
        futexes.enqueue(tcbs, me, tag);

        self.switch_to(next)
    }

    fn futex_signal_inner(&mut self, tag: Word) -> Switch {
        if tag == 0 {
            return self.syscall_return_error(1, ErrorKind::Invalid);
        }

        let woken = {
            let Kernel { tcbs, futexes, .. } = self;
            futexes.signal_dequeue(tcbs, tag)
        };

        if let Some(thread) = woken {
            trace!("[futex] signal: tag {:#x} wakes tid {}", tag, thread);
            self.tcbs.tcb_mut(thread).futex_tag = 0;
            let me = self.current();
            self.return_success(me, 0);
            let next = self.activate_schedule(thread);
            return self.switch_to(next);
        }

        // Nobody is waiting: park the signal for a later wait.
        match self.futexes.push_pending(tag) {
            Ok(()) => {
                trace!("[futex] signal: tag {:#x} parked as pending", tag);
                self.syscall_return_success(0)
            }
            Err(err) => self.syscall_return_error(1, err),
        }
    }
}
