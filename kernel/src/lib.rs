//! nanok nanokernel core
//!
//! A small, statically-configured L4-family nanokernel: a fixed universe of
//! threads multiplexed over one or more cores, isolated behind a synchronous
//! IPC primitive, futex-style blocking, and device-interrupt delivery.
//!
//! # Architecture
//!
//! The kernel is organized into the following modules:
//! - `objects`: thread control blocks and the TCB arena
//! - `sched`: per-core priority scheduler and the timer hint
//! - `ipc`: the synchronous send/recv/call/reply engine
//! - `futex`: hashed wait-queues with coalesced pending signals
//! - `interrupt`: per-IRQ handler registration and delivery
//! - `platform`: the hardware seam (interrupt controller, cycle counter)
//! - `syscall`: the trap dispatcher
//! - `boot`: process-global kernel cell for embedders
//!
//! # Host model
//!
//! The whole core is a deterministic state machine behind [`Kernel`]. The
//! embedder plays the CPU running user code and enters the kernel exactly
//! where hardware would: system-call traps ([`Kernel`] methods, or
//! [`syscall::dispatch`] from a raw register file) and interrupt raises
//! ([`Kernel::raise_irq`]). Context switching never unwinds a kernel stack;
//! every kernel path ends by producing a [`context::Switch`] that the trap
//! boundary applies.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod boot;
pub mod config;
pub mod context;
pub mod futex;
pub mod interrupt;
pub mod ipc;
mod kernel;
pub mod objects;
pub mod platform;
pub mod sched;
pub mod syscall;
pub mod thread;

pub use config::Config;
pub use kernel::Kernel;
pub use nanok_abi as abi;
pub use objects::{ThreadState, Tid};
