//! The process-wide scan section and its capability token.

use parking_lot::{FairMutex, FairMutexGuard};
use tokio_util::sync::CancellationToken;

use crate::models::ExecutionId;

/// Mutual-exclusion section guarding every engine session.
///
/// The lock hands off to waiters in arrival order, so executions that reach
/// the section are served first come, first served.
#[derive(Debug, Default)]
pub struct ScanSection {
    lock: FairMutex<()>,
}

impl ScanSection {
    /// Creates an unlocked section.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the section is free and returns the permit proving it is
    /// held. Dropping the permit releases the section.
    pub(crate) fn acquire(
        &self,
        execution_id: ExecutionId,
        cancel: CancellationToken,
    ) -> ScanPermit<'_> {
        ScanPermit {
            _guard: self.lock.lock(),
            execution_id,
            cancel,
        }
    }

    /// Whether some execution currently holds the section.
    pub fn is_held(&self) -> bool {
        self.lock.is_locked()
    }
}

/// Proof that the holder owns the scan section.
///
/// Only the executor can mint one, so an engine session cannot be created or
/// run outside the section.
#[derive(Debug)]
pub struct ScanPermit<'a> {
    _guard: FairMutexGuard<'a, ()>,
    execution_id: ExecutionId,
    cancel: CancellationToken,
}

impl ScanPermit<'_> {
    /// Execution this permit was issued to.
    pub const fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Whether the caller has stopped waiting for this execution.
    ///
    /// Engines may poll this to stop a run early; nothing forces them to.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permit_holds_section_until_dropped() {
        let section = ScanSection::new();
        assert!(!section.is_held());

        let permit = section.acquire(ExecutionId::new(), CancellationToken::new());
        assert!(section.is_held());

        drop(permit);
        assert!(!section.is_held());
    }

    #[test]
    fn test_permit_reports_cancellation() {
        let section = ScanSection::new();
        let cancel = CancellationToken::new();
        let id = ExecutionId::new();
        let permit = section.acquire(id, cancel.clone());

        assert_eq!(permit.execution_id(), id);
        assert!(!permit.is_cancelled());
        cancel.cancel();
        assert!(permit.is_cancelled());
    }
}
