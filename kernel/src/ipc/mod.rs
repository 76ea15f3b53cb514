//! Synchronous IPC.
//!
//! Rendezvous message passing over the seven UTCB message registers. A
//! sender delivers only to a receiver already waiting for it (or for
//! anyone); otherwise it parks on the receiver's send queue. Arrival order
//! at a single receiver is strictly FIFO: priority decides who *runs*, not
//! who is *served*.
//!
//! `call` is send-then-receive made atomic against competing senders: after
//! the payload is copied the caller is left in `WaitIpcRecv` bound to its
//! callee, never re-queued, so the reply cannot race.

use log::trace;

use crate::abi::{ErrorKind, IpcFlags, IPC_ERROR, TID_ANY};
use crate::context::Switch;
use crate::kernel::Kernel;
use crate::objects::{ThreadState, Tid};

mod queue;

pub(crate) use queue::{dequeue_send, enqueue_send, on_send_queue};

impl Kernel {
    /// `ipc_send` system call. The payload is the caller's UTCB message
    /// registers; `op` may carry `NON_BLOCKING` and (via `ipc_call`) `CALL`.
    pub fn sys_ipc_send(&mut self, dest: crate::abi::Word, op: IpcFlags) {
        self.kernel_entry();
        let sw = self.ipc_send_inner(dest, op);
        self.complete(sw);
    }

    /// `ipc_call` system call: send, then receive from the same peer.
    pub fn sys_ipc_call(&mut self, dest: crate::abi::Word, op: IpcFlags) {
        self.kernel_entry();
        let sw = self.ipc_send_inner(dest, op | IpcFlags::CALL);
        self.complete(sw);
    }

    /// Reply to a thread blocked in a call on us: a send that refuses to
    /// park. Fails `WouldBlock` if `dest` is not waiting for us.
    pub fn sys_ipc_reply(&mut self, dest: crate::abi::Word) {
        self.kernel_entry();
        let sw = self.ipc_send_inner(dest, IpcFlags::NON_BLOCKING);
        self.complete(sw);
    }

    /// `ipc_recv` system call. `src` names a peer or `TID_ANY`.
    pub fn sys_ipc_recv(&mut self, src: crate::abi::Word, op: IpcFlags) {
        self.kernel_entry();
        let sw = self.ipc_recv_inner(src, op);
        self.complete(sw);
    }

    fn ipc_send_inner(&mut self, dest: crate::abi::Word, op: IpcFlags) -> Switch {
        let Some(dest) = self.tcbs.lookup(dest) else {
            return self.syscall_return_error(IPC_ERROR, ErrorKind::Invalid);
        };
        if !self.tcbs.tcb(dest).is_alive() {
            return self.syscall_return_error(IPC_ERROR, ErrorKind::Invalid);
        }
        self.do_send(
            dest,
            op.contains(IpcFlags::CALL),
            op.contains(IpcFlags::NON_BLOCKING),
        )
    }

    /// Deliver to `dest`, park on its send queue, or bail out, and say who
    /// runs next.
    fn do_send(&mut self, dest: Tid, is_call: bool, is_non_blocking: bool) -> Switch {
        let me = self.current();

        if !self.is_ready_to_receive(me, dest) {
            if is_non_blocking {
                return self.syscall_return_error(IPC_ERROR, ErrorKind::WouldBlock);
            }
            // Go to sleep on the receiver's queue.
            enqueue_send(&mut self.tcbs, dest, me);
            self.tcbs.tcb_mut(me).ipc_waiting_for = Some(dest);
            let state = if is_call {
                ThreadState::WaitIpcCall
            } else {
                ThreadState::WaitIpcSend
            };
            let next = self.deactivate_self_schedule(state);
            return self.switch_to(next);
        }

        // Receiver is ready: copy our message across and complete its recv.
        self.copy_message(me, dest);
        self.tcbs.tcb_mut(dest).ipc_waiting_for = None;
        self.return_success(dest, me.as_word());
        trace!("[ipc] send: {} -> {}", me, dest);

        if !is_call {
            self.return_success(me, 0);
            let next = self.activate_schedule(dest);
            return self.switch_to(next);
        }

        // Call: wake the callee and commit to receiving its reply. The
        // caller stays off every queue so the reply cannot race other
        // senders.
        self.tcbs.tcb_mut(me).ipc_waiting_for = Some(dest);
        self.activate(dest);
        self.deactivate_self(ThreadState::WaitIpcRecv);
        let next = self.schedule();
        self.switch_to(next)
    }

    fn ipc_recv_inner(&mut self, src: crate::abi::Word, op: IpcFlags) -> Switch {
        let me = self.current();

        // Decode the source filter: a specific live peer, or anyone.
        let filter = if src == TID_ANY {
            None
        } else {
            let Some(peer) = self.tcbs.lookup(src) else {
                return self.syscall_return_error(IPC_ERROR, ErrorKind::Invalid);
            };
            if !self.tcbs.tcb(peer).is_alive() {
                return self.syscall_return_error(IPC_ERROR, ErrorKind::Invalid);
            }
            Some(peer)
        };

        let sender = match filter {
            None => self.tcbs.tcb(me).ipc_send_head,
            Some(peer) => {
                if on_send_queue(&self.tcbs, me, peer) {
                    Some(peer)
                } else {
                    None
                }
            }
        };

        let Some(sender) = sender else {
            if op.contains(IpcFlags::NON_BLOCKING) {
                return self.syscall_return_error(IPC_ERROR, ErrorKind::WouldBlock);
            }
            // No eligible sender: wait for one.
            self.tcbs.tcb_mut(me).ipc_waiting_for = filter;
            let next = self.deactivate_self_schedule(ThreadState::WaitIpcRecv);
            return self.switch_to(next);
        };

        // Serve the sender without leaving the CPU.
        dequeue_send(&mut self.tcbs, me, sender);
        self.copy_message(sender, me);
        trace!("[ipc] recv: {} <- {}", me, sender);

        if self.tcbs.tcb(sender).state() == ThreadState::WaitIpcCall {
            // The sender is mid-call: move it to its receive phase so the
            // reply can find it, but do not wake it.
            debug_assert_eq!(self.tcbs.tcb(sender).ipc_waiting_for, Some(me));
            self.tcbs.tcb_mut(sender).state = ThreadState::WaitIpcRecv;
            return self.syscall_return_success(sender.as_word());
        }

        // Plain send: wake the sender up.
        self.tcbs.tcb_mut(sender).ipc_waiting_for = None;
        self.return_success(sender, 0);
        self.return_success(me, sender.as_word());
        let next = self.activate_schedule(sender);
        self.switch_to(next)
    }

    /// Is `dest` able to receive from `src` right now?
    fn is_ready_to_receive(&self, src: Tid, dest: Tid) -> bool {
        let tcb = self.tcbs.tcb(dest);
        if tcb.state() != ThreadState::WaitIpcRecv {
            return false;
        }
        match tcb.ipc_waiting_for {
            None => true,
            Some(peer) => peer == src,
        }
    }

    /// Copy the message registers from `src`'s UTCB into `dest`'s.
    fn copy_message(&mut self, src: Tid, dest: Tid) {
        let payload = self.tcbs.tcb(src).utcb().mr;
        let tcb = self.tcbs.tcb_mut(dest);
        tcb.utcb.mr = payload;
        // The destination gets registers written while asleep; it must do a
        // full restore when it next runs.
        tcb.context.full_context_saved = true;
    }

    /// Fail every IPC operation blocked on `me`. Runs during `thread_exit`,
    /// after `me` stopped being able to receive or reply.
    pub(crate) fn ipc_cancel_waiters(&mut self, me: Tid) {
        // Senders parked on our queue.
        while let Some(sender) = self.tcbs.tcb(me).ipc_send_head {
            dequeue_send(&mut self.tcbs, me, sender);
            self.tcbs.tcb_mut(sender).ipc_waiting_for = None;
            self.return_error(sender, IPC_ERROR, ErrorKind::Cancelled);
            trace!("[ipc] cancel: sender {} lost peer {}", sender, me);
            self.activate(sender);
        }

        // Receivers waiting specifically on us: targeted recv, or a caller
        // whose reply will now never come.
        for idx in 0..self.tcbs.user_slots() {
            let tid = Tid(idx);
            let tcb = self.tcbs.tcb(tid);
            if tcb.state() == ThreadState::WaitIpcRecv && tcb.ipc_waiting_for == Some(me) {
                self.tcbs.tcb_mut(tid).ipc_waiting_for = None;
                self.return_error(tid, IPC_ERROR, ErrorKind::Cancelled);
                trace!("[ipc] cancel: receiver {} lost peer {}", tid, me);
                self.activate(tid);
            }
        }
    }
}
