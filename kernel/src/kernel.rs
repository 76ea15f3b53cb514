//! The kernel aggregate.
//!
//! One `Kernel` value is one kernel image: the TCB arena, the per-core
//! scheduler state, the futex hash, the interrupt tables and the platform
//! models, all sized by a [`Config`] fixed at construction. Every trap
//! entry, whether a system-call method or [`Kernel::raise_irq`], runs to
//! completion under exclusive access and ends by applying the switch it
//! decided on; mutual exclusion between cores is supplied at the trap
//! boundary (see `boot` for the process-global cell).

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::abi::{ErrorKind, Utcb, Word};
use crate::config::Config;
use crate::context::Switch;
use crate::futex::FutexTable;
use crate::interrupt::IrqTable;
use crate::objects::{Tcb, TcbTable, ThreadState, Tid};
use crate::platform::{CycleCounter, IrqChip, TRAP_COST};
use crate::sched::{Core, ReadyQueues};

pub struct Kernel {
    pub(crate) cfg: Config,
    pub(crate) tcbs: TcbTable,
    pub(crate) cores: Box<[Core]>,
    pub(crate) futexes: FutexTable,
    pub(crate) irqs: IrqTable,
    pub(crate) chip: IrqChip,
    pub(crate) cycles: CycleCounter,

    /// Core on which the kernel is currently entered. The host model drives
    /// one core at a time; a hardware port reads its core id instead.
    pub(crate) current_core: usize,
}

impl Kernel {
    /// Build a kernel image. Panics on a nonsensical configuration; a bad
    /// config is a build defect, not a runtime condition.
    pub fn new(cfg: Config) -> Self {
        cfg.validate();

        let mut tcbs = TcbTable::new(&cfg);
        let cores: Box<[Core]> = (0..cfg.num_execution_units)
            .map(|core| {
                let idle = tcbs.idle_tid(core);
                // Idle is permanently Ready at priority 0 but never queued:
                // it runs only when schedule() finds every queue empty.
                let tcb = tcbs.tcb_mut(idle);
                tcb.state = ThreadState::Ready;
                tcb.priority = 0;
                Core {
                    current: idle,
                    idle,
                    ready: ReadyQueues::new(cfg.num_priorities),
                }
            })
            .collect::<Vec<_>>()
            .into();

        Self {
            tcbs,
            cores,
            futexes: FutexTable::new(&cfg),
            irqs: IrqTable::new(&cfg),
            chip: IrqChip::new(cfg.num_interrupts),
            cycles: CycleCounter::new(),
            current_core: 0,
            cfg,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    #[inline]
    pub fn tcb(&self, tid: Tid) -> &Tcb {
        self.tcbs.tcb(tid)
    }

    #[inline]
    pub fn thread_state(&self, tid: Tid) -> ThreadState {
        self.tcbs.tcb(tid).state()
    }

    #[inline]
    pub fn is_alive(&self, tid: Tid) -> bool {
        self.tcbs.tcb(tid).is_alive()
    }

    #[inline]
    pub fn utcb(&self, tid: Tid) -> &Utcb {
        self.tcbs.tcb(tid).utcb()
    }

    #[inline]
    pub fn utcb_mut(&mut self, tid: Tid) -> &mut Utcb {
        self.tcbs.tcb_mut(tid).utcb_mut()
    }

    /// The idle thread of a core.
    #[inline]
    pub fn idle_thread(&self, core: usize) -> Tid {
        self.cores[core].idle
    }

    /// Saved system-call result register of `tid`.
    #[inline]
    pub fn retval(&self, tid: Tid) -> Word {
        self.tcbs.tcb(tid).retval()
    }

    /// Error kind of `tid`'s last system call, if it failed.
    #[inline]
    pub fn last_error(&self, tid: Tid) -> Option<ErrorKind> {
        self.tcbs.tcb(tid).utcb().last_error()
    }

    /// Common prologue of every kernel entry.
    pub(crate) fn kernel_entry(&mut self) {
        self.cycles.advance(TRAP_COST);
    }

    /// Apply a switch decision: from here on, `to` is what the core runs.
    /// This is the host-model rendition of resetting the kernel stack and
    /// restoring the chosen thread's context.
    pub(crate) fn complete(&mut self, sw: Switch) {
        self.cores[self.current_core].current = sw.to;
    }

    /// Record a successful outcome in `tid`'s saved result register. Takes
    /// effect whenever `tid` next runs.
    pub(crate) fn return_success(&mut self, tid: Tid, val: Word) {
        let tcb = self.tcbs.tcb_mut(tid);
        tcb.context.r0 = val;
        tcb.utcb.error_code = 0;
    }

    /// Record a failed outcome: error indicator in the result register,
    /// kind in the UTCB.
    pub(crate) fn return_error(&mut self, tid: Tid, val: Word, err: ErrorKind) {
        let tcb = self.tcbs.tcb_mut(tid);
        tcb.context.r0 = val;
        tcb.utcb.error_code = err.code();
    }

    /// Succeed the current system call and keep running the caller.
    pub(crate) fn syscall_return_success(&mut self, val: Word) -> Switch {
        let cur = self.current();
        self.return_success(cur, val);
        self.resume_current()
    }

    /// Fail the current system call and keep running the caller.
    pub(crate) fn syscall_return_error(&mut self, val: Word, err: ErrorKind) -> Switch {
        let cur = self.current();
        self.return_error(cur, val, err);
        self.resume_current()
    }
}
