//! Timer integration.
//!
//! The core does not program a hardware timer itself; the platform (or the
//! test harness standing in for it) calls [`Kernel::timer_tick`] on every
//! tick. A tick is a reschedule *hint* at the current priority: it rotates
//! equal-priority threads round-robin and otherwise changes nothing, since
//! strict priority order is already enforced at every activation.

use crate::kernel::Kernel;

impl Kernel {
    /// Periodic timer tick.
    ///
    /// Not a system call: nothing is written to the interrupted thread's
    /// result register.
    pub fn timer_tick(&mut self) {
        self.kernel_entry();

        let cur = self.current();
        let sw = if cur == self.idle() {
            let next = self.schedule();
            self.switch_to(next)
        } else {
            let cc = self.current_core;
            match self.cores[cc].ready.highest() {
                Some(prio) if prio >= self.tcbs.tcb(cur).priority() as usize => {
                    self.requeue(cur);
                    let next = self.schedule();
                    self.switch_to(next)
                }
                _ => self.resume_current(),
            }
        };
        self.complete(sw);
    }

    /// `get_cycles` system call: read the free-running cycle counter.
    pub fn sys_get_cycles(&mut self) {
        self.kernel_entry();
        let now = self.cycles.now();
        let sw = self.syscall_return_success(now);
        self.complete(sw);
    }
}
