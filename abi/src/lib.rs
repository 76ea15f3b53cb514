//! Kernel ABI definitions, shared between the kernel and applications.
//!
//! Everything user code needs to talk to the kernel lives here: system call
//! numbers, the IPC operation flags, the error kinds a failed call reports
//! through the UTCB, and the UTCB layout itself. The kernel crate depends on
//! this one so the two sides can never drift apart.
//!
//! All values exchanged across the trap boundary are machine words. Thread
//! ids are dense integers in `[0, max_tcbs)`; the all-ones word is reserved
//! as the "any thread" / "no value" sentinel throughout.

#![no_std]

use bitflags::bitflags;
use static_assertions::const_assert;

/// Machine word, as passed in registers across the trap boundary.
pub type Word = usize;

/// Number of IPC message registers (MR0..MR6).
pub const MSG_REGS: usize = 7;

/// "Any thread" wildcard for `ipc_recv`.
pub const TID_ANY: Word = !0;

/// Value returned in the result register by a failed IPC operation.
pub const IPC_ERROR: Word = !0;

/// "No interrupt pending" sentinel for [`Utcb::irq_pending`].
///
/// The kernel stores the delivered IRQ number over this value when an
/// interrupt wakes the thread; the thread acknowledges by storing it back.
pub const IRQ_NONE: Word = !0;

const_assert!(TID_ANY == IPC_ERROR);

/// System call numbers. Each subsystem owns a decade.
pub mod nr {
    use super::Word;

    pub const THREAD_CREATE: Word = 1;
    pub const THREAD_EXIT: Word = 2;
    pub const THREAD_JOIN: Word = 3;
    pub const THREAD_MYSELF: Word = 4;
    pub const YIELD: Word = 5;

    pub const IPC_SEND: Word = 10;
    pub const IPC_RECV: Word = 11;
    pub const IPC_CALL: Word = 12;

    pub const FUTEX_WAIT: Word = 20;
    pub const FUTEX_SIGNAL: Word = 21;

    pub const INTERRUPT_REGISTER: Word = 30;
    pub const INTERRUPT_DEREGISTER: Word = 31;
    pub const INTERRUPT_WAIT: Word = 32;

    pub const GET_CYCLES: Word = 40;
}

bitflags! {
    /// IPC operation word.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IpcFlags: Word {
        /// Fail with `WouldBlock` instead of suspending.
        const NON_BLOCKING = 1 << 0;

        /// Send-then-receive from the same peer. Set by the kernel when the
        /// operation entered through `ipc_call`.
        const CALL = 1 << 1;
    }
}

/// Error kinds a failed system call reports via [`Utcb::error_code`].
///
/// Errors are kinds, not payloads: the failing call returns the error
/// indicator in its result register and stores one of these codes. Code 0
/// means the last call succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    /// Malformed argument: tid or IRQ out of range, reserved futex tag.
    #[error("invalid argument")]
    Invalid,

    /// Resource already owned: double interrupt registration, second joiner.
    #[error("resource busy")]
    Busy,

    /// TCB free list empty, or the futex pending buffer is full.
    #[error("out of kernel memory")]
    NoMemory,

    /// A non-blocking operation would have suspended.
    #[error("operation would block")]
    WouldBlock,

    /// The peer exited while we were blocked on it.
    #[error("peer cancelled")]
    Cancelled,

    /// Reserved for the capability layer; the core never raises it.
    #[error("not permitted")]
    NotPermitted,
}

impl ErrorKind {
    /// Wire encoding stored into [`Utcb::error_code`].
    pub const fn code(self) -> Word {
        match self {
            ErrorKind::Invalid => 1,
            ErrorKind::Busy => 2,
            ErrorKind::NoMemory => 3,
            ErrorKind::WouldBlock => 4,
            ErrorKind::Cancelled => 5,
            ErrorKind::NotPermitted => 6,
        }
    }

    /// Decode a wire value. Zero (success) and unknown codes map to `None`.
    pub const fn from_code(code: Word) -> Option<Self> {
        match code {
            1 => Some(ErrorKind::Invalid),
            2 => Some(ErrorKind::Busy),
            3 => Some(ErrorKind::NoMemory),
            4 => Some(ErrorKind::WouldBlock),
            5 => Some(ErrorKind::Cancelled),
            6 => Some(ErrorKind::NotPermitted),
            _ => None,
        }
    }
}

/// User Thread Control Block: the per-thread page shared between the kernel
/// and the owning thread.
///
/// Peers never read each other's UTCBs; the IPC engine is the sole mediator.
#[derive(Debug, Clone)]
#[repr(C)]
pub struct Utcb {
    /// IPC message registers MR0..MR6.
    pub mr: [Word; MSG_REGS],

    /// Currently pending IRQ number, or [`IRQ_NONE`].
    ///
    /// Written by the kernel at interrupt delivery; the thread acknowledges
    /// by writing the sentinel back once it has serviced the device.
    pub irq_pending: Word,

    /// Error kind of the last failed system call; 0 after a success.
    pub error_code: Word,
}

impl Utcb {
    pub const fn new() -> Self {
        Self {
            mr: [0; MSG_REGS],
            irq_pending: IRQ_NONE,
            error_code: 0,
        }
    }

    /// Reset to the state a freshly created thread observes.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Error kind of the last system call, if it failed.
    pub fn last_error(&self) -> Option<ErrorKind> {
        ErrorKind::from_code(self.error_code)
    }
}

impl Default for Utcb {
    fn default() -> Self {
        Self::new()
    }
}
