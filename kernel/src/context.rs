//! Saved thread context and the switch token.
//!
//! The kernel never returns from a trap up a call stack. Every kernel path
//! ends by choosing the thread that runs next and handing a [`Switch`] back
//! to the trap boundary, which discards the in-progress kernel frames and
//! resumes the chosen thread from its saved context. Nothing above the trap
//! boundary ever observes a return from a context switch; `#[must_use]` on
//! the token keeps any kernel path from dropping its scheduling decision on
//! the floor.

use crate::abi::Word;

/// Register state captured on the last entry to the kernel.
///
/// `r0` doubles as the first-argument slot at thread creation and the
/// system-call result slot thereafter: poking a sleeping thread's `r0` is
/// how the outcome of its pending operation reaches it when it next runs.
#[derive(Debug, Clone, Copy)]
pub struct TrapContext {
    /// Program counter to resume at.
    pub pc: Word,

    /// User stack pointer.
    pub sp: Word,

    /// First argument / system-call result register.
    pub r0: Word,

    /// Whether the last kernel entry saved the full register file.
    ///
    /// A fast path that touched only caller-saved state leaves this false
    /// and skips the restore. Anything that writes a thread's registers
    /// while it sleeps (IPC payload delivery) must set it back to true.
    pub full_context_saved: bool,
}

impl TrapContext {
    pub const fn new() -> Self {
        Self {
            pc: 0,
            sp: 0,
            r0: 0,
            full_context_saved: true,
        }
    }
}

impl Default for TrapContext {
    fn default() -> Self {
        Self::new()
    }
}

/// The scheduling decision produced at the end of every kernel path.
///
/// Holds the thread the core resumes. Constructed only by the scheduler's
/// `switch_to`/`resume_current` and consumed only by the trap boundary.
#[must_use = "a kernel path that drops its Switch loses the context switch"]
#[derive(Debug)]
pub(crate) struct Switch {
    pub(crate) to: crate::objects::Tid,
}
