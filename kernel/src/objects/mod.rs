//! Kernel objects.
//!
//! The only first-class object in the nanokernel is the thread: everything
//! else (futex chains, send queues, interrupt bindings) is state threaded
//! through the TCB arena.

mod table;
mod tcb;

pub use table::TcbTable;
pub use tcb::{Tcb, ThreadState, Tid};
