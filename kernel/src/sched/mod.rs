//! Scheduler.
//!
//! Fixed-priority preemptive scheduling, per core: an array of FIFO ready
//! queues indexed by priority and a bitmap for O(1) selection. Higher
//! priority number wins; ties are served strictly FIFO. The current thread
//! of a core is not on any ready queue: `schedule()` pops its result, and
//! preemption pushes the displaced thread back at the tail of its own
//! priority.
//!
//! Preemption policy: activating a thread of *strictly* higher priority than
//! the current one switches before the kernel returns to user space. Equal
//! priority never preempts; the timer tick rotates equal-priority threads
//! instead (see `timer`).

use log::trace;

use crate::context::Switch;
use crate::kernel::Kernel;
use crate::objects::{ThreadState, Tid};

mod types;
pub mod timer;

pub(crate) use types::ReadyQueues;

/// Per-core scheduler state.
pub(crate) struct Core {
    /// Thread currently executing on this core.
    pub(crate) current: Tid,

    /// This core's idle thread: always `Ready`, never enqueued, runs only
    /// when every ready queue is empty.
    pub(crate) idle: Tid,

    pub(crate) ready: ReadyQueues,
}

impl Kernel {
    /// Thread currently running on the executing core.
    #[inline]
    pub fn current(&self) -> Tid {
        self.cores[self.current_core].current
    }

    /// Idle thread of the executing core.
    #[inline]
    pub(crate) fn idle(&self) -> Tid {
        self.cores[self.current_core].idle
    }

    /// Move a thread out of a wait state and append it to the tail of its
    /// priority queue on the executing core.
    pub(crate) fn activate(&mut self, tid: Tid) {
        debug_assert_ne!(tid, self.idle());
        debug_assert_ne!(self.tcbs.tcb(tid).state(), ThreadState::Ready);

        trace!(
            "[sched] activate: tid {} prio {}",
            tid,
            self.tcbs.tcb(tid).priority()
        );
        self.tcbs.tcb_mut(tid).state = ThreadState::Ready;
        self.requeue(tid);
    }

    /// Activate `tid`, then choose who runs: `tid` if it strictly out-ranks
    /// the current thread (or the core was idle), the current thread
    /// otherwise.
    pub(crate) fn activate_schedule(&mut self, tid: Tid) -> Tid {
        self.activate(tid);

        let cur = self.current();
        if cur != self.idle()
            && self.tcbs.tcb(tid).priority() <= self.tcbs.tcb(cur).priority()
        {
            return cur;
        }
        // Preempted: the displaced thread goes to the tail of its priority.
        if cur != self.idle() {
            self.requeue(cur);
        }
        self.schedule()
    }

    /// Take the current thread off the CPU into `new_state`. Does not yet
    /// pick a successor.
    pub(crate) fn deactivate_self(&mut self, new_state: ThreadState) {
        let cur = self.current();
        debug_assert_ne!(cur, self.idle());
        trace!("[sched] deactivate: tid {} -> {:?}", cur, new_state);
        self.tcbs.tcb_mut(cur).state = new_state;
    }

    /// Deactivate the current thread and pick the next one to run.
    pub(crate) fn deactivate_self_schedule(&mut self, new_state: ThreadState) -> Tid {
        self.deactivate_self(new_state);
        self.schedule()
    }

    /// Pop the head of the highest-priority non-empty ready queue, or fall
    /// back to this core's idle thread.
    pub(crate) fn schedule(&mut self) -> Tid {
        let Kernel { tcbs, cores, current_core, .. } = self;
        let core = &mut cores[*current_core];
        match core.ready.highest() {
            Some(prio) => {
                let tid = core
                    .ready
                    .dequeue_head(tcbs, prio)
                    .expect("priority bitmap out of sync with ready queues");
                trace!("[sched] schedule: tid {} at prio {}", tid, prio);
                tid
            }
            None => {
                trace!("[sched] schedule: no ready threads, core {} idles", current_core);
                core.idle
            }
        }
    }

    /// Put a `Ready` thread (back) on its priority queue without touching
    /// its state. Used for activation, preemption and the yield path.
    pub(crate) fn requeue(&mut self, tid: Tid) {
        debug_assert_eq!(self.tcbs.tcb(tid).state(), ThreadState::Ready);
        let Kernel { tcbs, cores, current_core, .. } = self;
        cores[*current_core].ready.enqueue(tcbs, tid);
    }

    /// Hand the core to `next`. The returned token is the *only* way a
    /// kernel path terminates; applying it at the trap boundary is what
    /// "resumes" the thread in the host model. On hardware this is where
    /// `full_context_saved` selects the partial or full register restore;
    /// the host model restores nothing either way.
    pub(crate) fn switch_to(&mut self, next: Tid) -> Switch {
        let full = self.tcbs.tcb(next).context.full_context_saved;
        trace!(
            "[sched] switch_to: tid {} ({} restore)",
            next,
            if full { "full" } else { "partial" }
        );
        Switch { to: next }
    }

    /// Keep running the current thread.
    pub(crate) fn resume_current(&mut self) -> Switch {
        Switch { to: self.current() }
    }

    /// `yield` system call: go to the back of our own priority queue and
    /// reschedule. With no same-priority competition this is a no-op.
    pub fn sys_yield(&mut self) {
        self.kernel_entry();
        let cur = self.current();
        self.return_success(cur, 0);
        self.requeue(cur);
        let next = self.schedule();
        let sw = self.switch_to(next);
        self.complete(sw);
    }
}
