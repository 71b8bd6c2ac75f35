use tracing::info;

use super::domain::ResidencyCode;
use super::engine::AllocationResult;
use super::repository::{AllocationStore, StoreError};

/// Replaces the persisted allocation for a residency.
pub struct AllocationWriter<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> AllocationWriter<'a, S>
where
    S: AllocationStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Deletes every row whose job sits in the residency's pool. Returns rows removed.
    pub fn clear(&self, residency: ResidencyCode) -> Result<usize, StoreError> {
        let removed = self.store.delete_allocations(residency.pool_codes())?;
        info!(%residency, removed, "cleared prior allocation");
        Ok(removed)
    }

    /// Writes one row per pair. Stops at the first failing insert.
    pub fn persist(&self, result: &AllocationResult) -> Result<usize, StoreError> {
        let pairs = result.pairs();
        for pair in &pairs {
            self.store
                .insert_allocation(pair.student_number, pair.job_id)?;
        }
        Ok(pairs.len())
    }
}
