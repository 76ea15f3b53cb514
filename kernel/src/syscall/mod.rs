//! System call dispatch.
//!
//! Decodes a trapped thread's register file (syscall number plus up to
//! nine argument words) and routes it to the typed kernel entry points.
//! The seven-word IPC payload travels in the argument registers and is
//! marshalled into the caller's UTCB message registers here, mirroring the
//! user-side binding that loads them on the way in.
//!
//! Register conventions per call:
//!
//! | call                  | args                                  |
//! |-----------------------|---------------------------------------|
//! | `thread_create`       | pc, sp, arg0, priority                |
//! | `thread_join`         | tid                                   |
//! | `ipc_send`/`ipc_call` | mr0..mr6, dest, op                    |
//! | `ipc_recv`            | src, op                               |
//! | `futex_wait`/`signal` | tag                                   |
//! | `interrupt_*`         | irq (register/deregister)             |

use log::warn;

use crate::abi::{self, ErrorKind, IpcFlags, Word, MSG_REGS};
use crate::kernel::Kernel;

/// Number of argument registers a trap carries besides the syscall number.
pub const NUM_SYSCALL_ARGS: usize = MSG_REGS + 2;

/// Dispatch one trapped system call on behalf of the current thread.
pub fn dispatch(k: &mut Kernel, nr: Word, args: &[Word; NUM_SYSCALL_ARGS]) {
    match nr {
        abi::nr::THREAD_CREATE => k.sys_thread_create(args[0], args[1], args[2], args[3]),
        abi::nr::THREAD_EXIT => k.sys_thread_exit(),
        abi::nr::THREAD_JOIN => k.sys_thread_join(args[0]),
        abi::nr::THREAD_MYSELF => k.sys_thread_myself(),
        abi::nr::YIELD => k.sys_yield(),

        abi::nr::IPC_SEND => {
            load_payload(k, args);
            k.sys_ipc_send(args[MSG_REGS], flags(args[MSG_REGS + 1]));
        }
        abi::nr::IPC_CALL => {
            load_payload(k, args);
            k.sys_ipc_call(args[MSG_REGS], flags(args[MSG_REGS + 1]));
        }
        abi::nr::IPC_RECV => k.sys_ipc_recv(args[0], flags(args[1])),

        abi::nr::FUTEX_WAIT => k.sys_futex_wait(args[0]),
        abi::nr::FUTEX_SIGNAL => k.sys_futex_signal(args[0]),

        abi::nr::INTERRUPT_REGISTER => k.sys_interrupt_register(args[0]),
        abi::nr::INTERRUPT_DEREGISTER => k.sys_interrupt_deregister(args[0]),
        abi::nr::INTERRUPT_WAIT => k.sys_interrupt_wait(),

        abi::nr::GET_CYCLES => k.sys_get_cycles(),

        _ => k.unknown_syscall(nr),
    }
}

/// Copy the payload words out of the trap arguments into the caller's
/// message registers.
fn load_payload(k: &mut Kernel, args: &[Word; NUM_SYSCALL_ARGS]) {
    let me = k.current();
    k.utcb_mut(me).mr.copy_from_slice(&args[..MSG_REGS]);
}

/// Undefined operation bits are ignored.
fn flags(op: Word) -> IpcFlags {
    IpcFlags::from_bits_truncate(op)
}

impl Kernel {
    pub(crate) fn unknown_syscall(&mut self, nr: Word) {
        self.kernel_entry();
        warn!("[syscall] unknown syscall number {}", nr);
        let sw = self.syscall_return_error(!0, ErrorKind::Invalid);
        self.complete(sw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn booted() -> (Kernel, crate::objects::Tid) {
        let mut k = Kernel::new(Config::new(8));
        let root = k.spawn_initial(0x1000, 0x2000, 0, 1).unwrap();
        (k, root)
    }

    #[test]
    fn myself_via_dispatch() {
        let (mut k, root) = booted();
        dispatch(&mut k, abi::nr::THREAD_MYSELF, &[0; NUM_SYSCALL_ARGS]);
        assert_eq!(k.retval(root), root.as_word());
    }

    #[test]
    fn unknown_number_is_invalid() {
        let (mut k, root) = booted();
        dispatch(&mut k, 999, &[0; NUM_SYSCALL_ARGS]);
        assert_eq!(k.retval(root), !0);
        assert_eq!(k.last_error(root), Some(ErrorKind::Invalid));
    }

    #[test]
    fn send_marshals_payload_into_message_registers() {
        let (mut k, root) = booted();
        // Send to a non-existent thread: the call fails, but the payload
        // must have been staged in our UTCB first.
        let args = [11, 22, 33, 44, 55, 66, 77, 999, 0];
        dispatch(&mut k, abi::nr::IPC_SEND, &args);
        assert_eq!(k.utcb(root).mr, [11, 22, 33, 44, 55, 66, 77]);
        assert_eq!(k.last_error(root), Some(ErrorKind::Invalid));
    }

    #[test]
    fn futex_round_trip_via_dispatch() {
        let (mut k, root) = booted();
        let mut args = [0; NUM_SYSCALL_ARGS];
        args[0] = 0x5151;
        dispatch(&mut k, abi::nr::FUTEX_SIGNAL, &args);
        assert_eq!(k.retval(root), 0);
        dispatch(&mut k, abi::nr::FUTEX_WAIT, &args);
        assert_eq!(k.retval(root), 0);
        assert_eq!(k.current(), root);
    }

    #[test]
    fn cycle_counter_advances_per_trap() {
        let (mut k, root) = booted();
        dispatch(&mut k, abi::nr::GET_CYCLES, &[0; NUM_SYSCALL_ARGS]);
        let first = k.retval(root);
        dispatch(&mut k, abi::nr::GET_CYCLES, &[0; NUM_SYSCALL_ARGS]);
        let second = k.retval(root);
        assert!(second > first);
    }
}
