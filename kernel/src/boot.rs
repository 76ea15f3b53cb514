//! Process-global kernel cell.
//!
//! Library users that want a single kernel image behind one coarse lock
//! (the trap-boundary mutual exclusion the core assumes) initialize it
//! here once during boot and take the lock on every entry. Tests construct
//! their own [`Kernel`] values instead and never touch this.

use spin::{Mutex, Once};

use crate::config::Config;
use crate::kernel::Kernel;

static KERNEL: Once<Mutex<Kernel>> = Once::new();

/// Initialize the global kernel image. The first caller's configuration
/// wins; later calls return the existing cell.
pub fn init(cfg: Config) -> &'static Mutex<Kernel> {
    KERNEL.call_once(|| Mutex::new(Kernel::new(cfg)))
}

/// The global kernel image.
///
/// # Panics
///
/// Panics if [`init`] has not been called.
pub fn kernel() -> &'static Mutex<Kernel> {
    KERNEL.get().expect("boot::init has not been called")
}

/// The global kernel image, if booted.
pub fn try_kernel() -> Option<&'static Mutex<Kernel>> {
    KERNEL.get()
}
