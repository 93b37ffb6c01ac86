//! The critical section serializing every write to a backing file.

use parking_lot::{Mutex, MutexGuard};

/// Guard returned by [`CriticalSection::enter`]. The section is left on drop.
pub type CriticalSectionGuard<'a> = MutexGuard<'a, ()>;

/// Exclusive, non re-entrant lock shared by every store of one process.
///
/// Stores receive it at construction; sharing one instance between several
/// stores makes their writes queue behind each other.
#[derive(Debug, Default)]
pub struct CriticalSection {
    inner: Mutex<()>,
}

impl CriticalSection {
    /// Creates an unlocked critical section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the section is free and enters it.
    pub fn enter(&self) -> CriticalSectionGuard<'_> {
        self.inner.lock()
    }

    /// Enters the section if it is free.
    pub fn try_enter(&self) -> Option<CriticalSectionGuard<'_>> {
        self.inner.try_lock()
    }
}
