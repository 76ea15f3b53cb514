//! Ready-queue structure.
//!
//! Per core: one intrusive FIFO per priority level plus a bitmap of
//! non-empty priorities, so picking the next thread is O(1) over priority
//! classes. Queues thread through the TCBs' own link fields; a thread is
//! enqueued at the tail when it becomes ready and popped from the head when
//! it is chosen to run, which makes ties within a priority strictly FIFO.

use alloc::boxed::Box;
use alloc::vec;

use crate::objects::{TcbTable, ThreadState, Tid};

pub(crate) struct ReadyQueues {
    heads: Box<[Option<Tid>]>,
    tails: Box<[Option<Tid>]>,

    /// Bit `p` set iff the queue at priority `p` is non-empty.
    bitmap: Box<[u64]>,
}

impl ReadyQueues {
    pub(crate) fn new(num_priorities: usize) -> Self {
        let chunks = num_priorities.div_ceil(64);
        Self {
            heads: vec![None; num_priorities].into(),
            tails: vec![None; num_priorities].into(),
            bitmap: vec![0u64; chunks].into(),
        }
    }

    /// Append a ready thread to the tail of its priority queue.
    pub(crate) fn enqueue(&mut self, tcbs: &mut TcbTable, tid: Tid) {
        debug_assert_eq!(tcbs.tcb(tid).state(), ThreadState::Ready);
        debug_assert!(tcbs.tcb(tid).next.is_none());

        let prio = tcbs.tcb(tid).priority() as usize;
        tcbs.tcb_mut(tid).next = None;
        match self.tails[prio] {
            None => {
                self.heads[prio] = Some(tid);
                self.set_bit(prio);
            }
            Some(tail) => {
                tcbs.tcb_mut(tail).next = Some(tid);
            }
        }
        self.tails[prio] = Some(tid);
    }

    /// Pop the head of the queue at `prio`.
    pub(crate) fn dequeue_head(&mut self, tcbs: &mut TcbTable, prio: usize) -> Option<Tid> {
        let head = self.heads[prio]?;
        let next = tcbs.tcb_mut(head).next.take();
        self.heads[prio] = next;
        if next.is_none() {
            self.tails[prio] = None;
            self.clear_bit(prio);
        }
        Some(head)
    }

    /// Highest non-empty priority, or `None` when every queue is empty.
    pub(crate) fn highest(&self) -> Option<usize> {
        for (chunk_idx, &chunk) in self.bitmap.iter().enumerate().rev() {
            if chunk != 0 {
                let bit = 63 - chunk.leading_zeros() as usize;
                return Some(chunk_idx * 64 + bit);
            }
        }
        None
    }

    pub(crate) fn is_empty(&self, prio: usize) -> bool {
        self.heads[prio].is_none()
    }

    fn set_bit(&mut self, prio: usize) {
        self.bitmap[prio / 64] |= 1u64 << (prio % 64);
    }

    fn clear_bit(&mut self, prio: usize) {
        self.bitmap[prio / 64] &= !(1u64 << (prio % 64));
    }
}
