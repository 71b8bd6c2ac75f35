use tracing::debug;

use super::domain::{EligibilityReport, ResidencyCode, StudentNumber, YearGroup};
use super::repository::{AllocationStore, StoreError};

/// Precondition check: every student in the cohort has ranked at least one pool job.
pub struct EligibilityGate<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> EligibilityGate<'a, S>
where
    S: AllocationStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn all_preferences_submitted(
        &self,
        year: YearGroup,
        residency: ResidencyCode,
    ) -> Result<bool, StoreError> {
        Ok(self.missing_students(year, residency)?.is_empty())
    }

    pub fn report(
        &self,
        year: YearGroup,
        residency: ResidencyCode,
    ) -> Result<EligibilityReport, StoreError> {
        let missing = self.missing_students(year, residency)?;
        Ok(EligibilityReport {
            residency,
            year,
            all_preferences_submitted: missing.is_empty(),
            missing,
        })
    }

    fn missing_students(
        &self,
        year: YearGroup,
        residency: ResidencyCode,
    ) -> Result<Vec<StudentNumber>, StoreError> {
        let mut missing = self
            .store
            .students_without_preferences(year, residency.pool_codes())?;
        missing.sort_unstable();
        missing.dedup();
        debug!(%residency, %year, missing = missing.len(), "eligibility checked");
        Ok(missing)
    }
}
