//! Interrupt delivery.
//!
//! A thread may own at most one IRQ, and an IRQ at most one thread; the
//! handler table and the TCB's `registered_interrupt` are kept in
//! lock-step. Delivery relies on the controller's auto-mask in place of a
//! lock: an IRQ is only ever unmasked while its handler is parked in
//! `WaitInterrupt`, so a taken interrupt always finds its handler ready.
//! `interrupt_wait` unmasks as its *last* action for exactly that reason.
//!
//! On multi-core configurations a per-priority mask word records which IRQs
//! a core running at a given priority may accept: an IRQ is acceptable only
//! at priorities up to its handler's, so a handler never interrupts
//! something that out-ranks it.

use alloc::boxed::Box;
use alloc::vec;

use log::{debug, trace, warn};

use crate::abi::{ErrorKind, Word};
use crate::config::Config;
use crate::context::Switch;
use crate::kernel::Kernel;
use crate::objects::{ThreadState, Tid};

pub(crate) struct IrqTable {
    /// Registered handler for each interrupt.
    handlers: Box<[Option<Tid>]>,

    /// Per priority level, the set of IRQs *masked* at that level.
    /// Readers take no lock, so writers keep every intermediate state
    /// consistent. Maintained only when more than one core exists.
    priority_mask: Box<[Word]>,

    /// All platform IRQs, as a bitmask.
    all_irqs: Word,
}

impl IrqTable {
    pub(crate) fn new(cfg: &Config) -> Self {
        let all_irqs = if cfg.num_interrupts == Word::BITS as usize {
            !0
        } else {
            (1 << cfg.num_interrupts) - 1
        };
        Self {
            // No handlers yet: everything is masked at every level.
            handlers: vec![None; cfg.num_interrupts].into(),
            priority_mask: vec![all_irqs; cfg.num_priorities].into(),
            all_irqs,
        }
    }

    #[inline]
    pub(crate) fn handler(&self, irq: Word) -> Option<Tid> {
        self.handlers[irq]
    }

    /// IRQs a core running at `priority` may accept.
    #[inline]
    pub(crate) fn acceptable_at(&self, priority: u8) -> Word {
        !self.priority_mask[priority as usize] & self.all_irqs
    }
}

impl Kernel {
    /// `interrupt_register` system call: claim `irq` for the current
    /// thread, exclusively, and unmask it.
    pub fn sys_interrupt_register(&mut self, irq: Word) {
        self.kernel_entry();
        let sw = self.interrupt_register_inner(irq);
        self.complete(sw);
    }

    /// `interrupt_deregister` system call: release an IRQ we own.
    pub fn sys_interrupt_deregister(&mut self, irq: Word) {
        self.kernel_entry();
        let sw = self.interrupt_deregister_inner(irq);
        self.complete(sw);
    }

    /// `interrupt_wait` system call: sleep until our IRQ fires.
    pub fn sys_interrupt_wait(&mut self) {
        self.kernel_entry();
        let sw = self.interrupt_wait_inner();
        self.complete(sw);
    }

    /// Hardware interrupt entry: IRQ `irq` was raised. Masked raises are
    /// latched by the controller model and replayed at unmask.
    pub fn raise_irq(&mut self, irq: Word) {
        self.kernel_entry();

        if irq >= self.cfg.num_interrupts {
            warn!("[irq] spurious raise of irq {} (out of range)", irq);
            return;
        }
        if self.chip.is_masked(irq) {
            trace!("[irq] irq {} raised while masked, latched", irq);
            self.chip.latch(irq);
            return;
        }

        if let Some(handler) = self.deliver_irq(irq) {
            let next = self.activate_schedule(handler);
            let sw = self.switch_to(next);
            self.complete(sw);
        }
    }

    fn interrupt_register_inner(&mut self, irq: Word) -> Switch {
        let me = self.current();

        if irq >= self.cfg.num_interrupts {
            return self.syscall_return_error(1, ErrorKind::Invalid);
        }
        // The binding is exclusive in both directions.
        if self.irqs.handlers[irq].is_some() {
            return self.syscall_return_error(1, ErrorKind::Busy);
        }
        if self.tcbs.tcb(me).registered_interrupt.is_some() {
            return self.syscall_return_error(1, ErrorKind::Busy);
        }

        if self.cfg.num_execution_units > 1 {
            // Accept this IRQ at our priority and below; keep it masked
            // strictly above, where it must not preempt.
            let priority = self.tcbs.tcb(me).priority() as usize;
            for level in (priority + 1)..self.cfg.num_priorities {
                self.irqs.priority_mask[level] |= 1 << irq;
            }
            for level in (0..=priority).rev() {
                self.irqs.priority_mask[level] &= !(1 << irq);
            }
        }

        self.irqs.handlers[irq] = Some(me);
        self.tcbs.tcb_mut(me).registered_interrupt = Some(irq);
        self.chip.unmask(irq);
        debug!("[irq] tid {} registered for irq {}", me, irq);

        self.syscall_return_success(0)
    }

    fn interrupt_deregister_inner(&mut self, irq: Word) -> Switch {
        let me = self.current();

        if irq >= self.cfg.num_interrupts {
            return self.syscall_return_error(1, ErrorKind::Invalid);
        }
        // Only the owner may release a binding.
        if self.irqs.handlers[irq] != Some(me) {
            return self.syscall_return_error(1, ErrorKind::Invalid);
        }

        self.release_irq(me, irq);
        debug!("[irq] tid {} deregistered irq {}", me, irq);

        self.syscall_return_success(0)
    }

    fn interrupt_wait_inner(&mut self) -> Switch {
        let me = self.current();

        let Some(irq) = self.tcbs.tcb(me).registered_interrupt else {
            return self.syscall_return_error(!0, ErrorKind::Invalid);
        };

        trace!("[irq] tid {} waits for irq {}", me, irq);
        self.return_success(me, 0);
        self.deactivate_self(ThreadState::WaitInterrupt);

        // Unmask only now that we are committed to sleeping, so the
        // hardware cannot fire while we are still runnable. A raise that
        // arrived in the meantime sits in the latch and fires here.
        self.chip.unmask(irq);
        if self.chip.take_pending(irq) {
            if let Some(handler) = self.deliver_irq(irq) {
                debug_assert_eq!(handler, me);
                self.activate(handler);
            }
        }

        let next = self.schedule();
        self.switch_to(next)
    }

    /// Accept IRQ `irq`: mask it, note it in the handler's UTCB and wake
    /// the handler. Returns the handler to schedule, if delivery happened.
    fn deliver_irq(&mut self, irq: Word) -> Option<Tid> {
        self.chip.mask(irq);

        let Some(handler) = self.irqs.handlers[irq] else {
            debug!("[irq] irq {} has no handler, dropped", irq);
            return None;
        };
        if self.tcbs.tcb(handler).state() != ThreadState::WaitInterrupt {
            // Handler still busy with the previous interrupt; replay the
            // raise when it next waits.
            self.chip.latch(irq);
            return None;
        }

        let tcb = self.tcbs.tcb_mut(handler);
        tcb.utcb.irq_pending = irq;
        tcb.context.full_context_saved = true;
        self.return_success(handler, 0);
        debug!("[irq] irq {} delivered to tid {}", irq, handler);
        Some(handler)
    }

    /// Tear down an IRQ binding: mask the line, drop any latched raise and
    /// relax the priority masks. Shared by deregistration and thread exit.
    pub(crate) fn release_irq(&mut self, owner: Tid, irq: Word) {
        if self.cfg.num_execution_units > 1 {
            // No core need accept this IRQ any longer.
            for level in (0..self.cfg.num_priorities).rev() {
                self.irqs.priority_mask[level] |= 1 << irq;
            }
        }

        self.chip.mask(irq);
        self.chip.clear_pending(irq);
        self.tcbs.tcb_mut(owner).registered_interrupt = None;
        self.irqs.handlers[irq] = None;
    }

    /// Exit-time cleanup: a dying thread releases its IRQ, if any.
    pub(crate) fn interrupt_cleanup(&mut self, tid: Tid) {
        if let Some(irq) = self.tcbs.tcb(tid).registered_interrupt {
            debug!("[irq] tid {} exits, releasing irq {}", tid, irq);
            self.release_irq(tid, irq);
        }
    }

    /// IRQs deliverable to a core running at `priority` (multi-core
    /// configurations; on a single core the controller mask alone decides).
    pub fn irqs_acceptable_at(&self, priority: u8) -> Word {
        self.irqs.acceptable_at(priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn smp_kernel() -> Kernel {
        Kernel::new(Config {
            num_execution_units: 2,
            num_interrupts: 8,
            num_priorities: 8,
            ..Config::new(8)
        })
    }

    #[test]
    fn masks_start_fully_closed() {
        let k = smp_kernel();
        for level in 0..8 {
            assert_eq!(k.irqs_acceptable_at(level), 0);
        }
    }

    #[test]
    fn registration_opens_irq_up_to_handler_priority() {
        let mut k = smp_kernel();
        let t = k.spawn_initial(0x1000, 0x2000, 0, 3).unwrap();
        assert_eq!(k.current(), t);

        k.sys_interrupt_register(5);
        assert_eq!(k.retval(t), 0);

        for level in 0..=3u8 {
            assert_eq!(k.irqs_acceptable_at(level), 1 << 5, "level {level}");
        }
        for level in 4..8u8 {
            assert_eq!(k.irqs_acceptable_at(level), 0, "level {level}");
        }
    }

    #[test]
    fn deregistration_closes_the_irq_everywhere() {
        let mut k = smp_kernel();
        k.spawn_initial(0x1000, 0x2000, 0, 3).unwrap();

        k.sys_interrupt_register(5);
        k.sys_interrupt_deregister(5);
        for level in 0..8u8 {
            assert_eq!(k.irqs_acceptable_at(level), 0);
        }
    }

    #[test]
    fn handler_table_and_tcb_stay_in_lock_step() {
        let mut k = smp_kernel();
        let t = k.spawn_initial(0x1000, 0x2000, 0, 3).unwrap();

        k.sys_interrupt_register(2);
        assert_eq!(k.irqs.handler(2), Some(t));
        assert_eq!(k.tcb(t).registered_interrupt, Some(2));

        k.sys_interrupt_deregister(2);
        assert_eq!(k.irqs.handler(2), None);
        assert_eq!(k.tcb(t).registered_interrupt, None);
    }
}
