//! Thread lifecycle.
//!
//! Creation pops a halted TCB off the free list and activates it; exit
//! turns the caller into a zombie, cancels everything blocked on it and
//! wakes its joiner; join reaps a zombie back onto the free list. Reaping
//! is the only path into `Halted`, and it scrubs the record so the next
//! creation starts clean.

use log::debug;

use crate::abi::{ErrorKind, Word};
use crate::context::Switch;
use crate::kernel::Kernel;
use crate::objects::{ThreadState, Tid};

impl Kernel {
    /// `thread_create` system call.
    pub fn sys_thread_create(&mut self, pc: Word, sp: Word, arg: Word, priority: Word) {
        self.kernel_entry();
        let sw = self.thread_create_inner(pc, sp, arg, priority);
        self.complete(sw);
    }

    /// `thread_exit` system call. The caller never runs again.
    pub fn sys_thread_exit(&mut self) {
        self.kernel_entry();
        let sw = self.thread_exit_inner();
        self.complete(sw);
    }

    /// `thread_join` system call: wait for `tid` to exit and reap it.
    pub fn sys_thread_join(&mut self, tid: Word) {
        self.kernel_entry();
        let sw = self.thread_join_inner(tid);
        self.complete(sw);
    }

    /// `thread_myself` system call: our own tid. Never fails.
    pub fn sys_thread_myself(&mut self) {
        self.kernel_entry();
        let me = self.current();
        let sw = self.syscall_return_success(me.as_word());
        self.complete(sw);
    }

    /// Install a thread from boot context, before any thread runs. Used by
    /// the embedder to start the root task; regular creation goes through
    /// `sys_thread_create`.
    pub fn spawn_initial(
        &mut self,
        pc: Word,
        sp: Word,
        arg: Word,
        priority: Word,
    ) -> Result<Tid, ErrorKind> {
        if priority > self.cfg.max_priority() as Word {
            return Err(ErrorKind::Invalid);
        }
        let Some(tid) = self.tcbs.allocate() else {
            return Err(ErrorKind::NoMemory);
        };
        self.install_thread(tid, pc, sp, arg, priority as u8);
        self.activate(tid);

        // Boot hand-off: if the core is idling, start running the thread.
        if self.current() == self.idle() {
            let next = self.schedule();
            let sw = self.switch_to(next);
            self.complete(sw);
        }
        Ok(tid)
    }

    fn thread_create_inner(&mut self, pc: Word, sp: Word, arg: Word, priority: Word) -> Switch {
        if priority > self.cfg.max_priority() as Word {
            return self.syscall_return_error(!0, ErrorKind::Invalid);
        }
        let Some(tid) = self.tcbs.allocate() else {
            return self.syscall_return_error(!0, ErrorKind::NoMemory);
        };

        self.install_thread(tid, pc, sp, arg, priority as u8);
        debug!("[thread] create: tid {} prio {}", tid, priority);

        // Run the child now if it out-ranks us; either way the creator's
        // result register carries the new tid.
        let next = self.activate_schedule(tid);
        let me = self.current();
        self.return_success(me, tid.as_word());
        self.switch_to(next)
    }

    fn install_thread(&mut self, tid: Tid, pc: Word, sp: Word, arg: Word, priority: u8) {
        let tcb = self.tcbs.tcb_mut(tid);
        tcb.context.pc = pc;
        tcb.context.sp = sp;
        tcb.context.r0 = arg;
        tcb.context.full_context_saved = true;
        tcb.priority = priority;
    }

    fn thread_exit_inner(&mut self) -> Switch {
        let me = self.current();
        debug!("[thread] exit: tid {}", me);

        // Subsystem cleanup while we are still the owner of our bindings.
        self.interrupt_cleanup(me);
        self.deactivate_self(ThreadState::Zombie);
        self.ipc_cancel_waiters(me);

        // If someone already joined us, reap immediately and wake them.
        if let Some(joiner) = self.tcbs.tcb(me).joiner {
            self.thread_reap(me);
            self.activate(joiner);
        }

        let next = self.schedule();
        self.switch_to(next)
    }

    fn thread_join_inner(&mut self, tid: Word) -> Switch {
        let Some(dest) = self.tcbs.lookup(tid) else {
            return self.syscall_return_error(1, ErrorKind::Invalid);
        };
        let me = self.current();
        // Joining yourself would park this core forever.
        if dest == me {
            return self.syscall_return_error(1, ErrorKind::Invalid);
        }

        match self.tcbs.tcb(dest).state() {
            ThreadState::Halted => {
                return self.syscall_return_error(1, ErrorKind::Invalid);
            }
            ThreadState::Zombie => {
                // Already dead: reap and return straight away.
                self.thread_reap(dest);
                return self.syscall_return_success(0);
            }
            _ => {}
        }

        // Only one thread may join another.
        if self.tcbs.tcb(dest).joiner.is_some() {
            return self.syscall_return_error(1, ErrorKind::Busy);
        }

        self.return_success(me, 0);
        let next = self.deactivate_self_schedule(ThreadState::WaitJoin);
        self.tcbs.tcb_mut(dest).joiner = Some(me);
        self.switch_to(next)
    }

    /// Move a zombie to `Halted` and return its slot to the free list.
    /// The thread subsystem owns both states, so the scheduler is not
    /// involved.
    fn thread_reap(&mut self, tid: Tid) {
        debug_assert_eq!(self.tcbs.tcb(tid).state(), ThreadState::Zombie);
        debug!("[thread] reap: tid {}", tid);
        self.tcbs.free(tid);
    }
}
