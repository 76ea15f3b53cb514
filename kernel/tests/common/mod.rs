//! Shared harness for the kernel integration tests.
//!
//! The tests play the CPU: they construct a kernel image, install a root
//! thread, and then issue each thread's next system call whenever it is the
//! current thread, asserting the scheduling decisions along the way. The
//! kernel is deterministic, so every interleaving below is the *only* one.

#![allow(dead_code)]

use nanok_kernel::abi::{IpcFlags, Word, MSG_REGS};
use nanok_kernel::{Config, Kernel, Tid};

/// Arbitrary user-space addresses for thread creation; the host model
/// never dereferences them.
pub const PC: Word = 0x8000;
pub const SP: Word = 0x0001_0000;

/// Boot a kernel with a root thread at the given priority.
pub fn boot(max_tcbs: usize, root_priority: Word) -> (Kernel, Tid) {
    boot_with(Config::new(max_tcbs), root_priority)
}

pub fn boot_with(cfg: Config, root_priority: Word) -> (Kernel, Tid) {
    let mut k = Kernel::new(cfg);
    let root = k
        .spawn_initial(PC, SP, 0, root_priority)
        .expect("root thread must fit");
    assert_eq!(k.current(), root);
    (k, root)
}

/// Create a thread from the current one and return its tid, asserting the
/// creation succeeded.
pub fn spawn(k: &mut Kernel, priority: Word) -> Tid {
    let creator = k.current();
    k.sys_thread_create(PC, SP, 0, priority);
    let tid = k.retval(creator);
    assert_ne!(tid, !0, "thread_create failed: {:?}", k.last_error(creator));
    Tid(tid)
}

/// Write the current thread's message registers and send.
pub fn send_payload(k: &mut Kernel, dest: Tid, mr: [Word; MSG_REGS], op: IpcFlags) {
    let me = k.current();
    k.utcb_mut(me).mr = mr;
    k.sys_ipc_send(dest.as_word(), op);
}

/// A recognizable 7-word payload derived from one seed word.
pub fn payload(seed: Word) -> [Word; MSG_REGS] {
    [seed, 0, 0, 0, 0, 0, 0]
}

/// Assert the last system call of `tid` succeeded with `val`.
pub fn expect_ok(k: &Kernel, tid: Tid, val: Word) {
    assert_eq!(k.last_error(tid), None, "tid {tid} reported an error");
    assert_eq!(k.retval(tid), val, "tid {tid} returned the wrong value");
}

/// Assert the last system call of `tid` failed with `err`.
pub fn expect_err(k: &Kernel, tid: Tid, err: nanok_kernel::abi::ErrorKind) {
    assert_eq!(k.last_error(tid), Some(err), "tid {tid} error kind");
}
