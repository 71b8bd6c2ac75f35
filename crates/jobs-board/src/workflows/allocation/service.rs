use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{info, warn};

use super::domain::{
    AllocationRun, AllocationSummary, AllocationView, CohortMember, EligibilityReport, JobFill,
    JobId, PreferenceEntry, RankableJob, ResidencyCode, StudentFill, StudentNumber, YearGroup,
};
use super::eligibility::EligibilityGate;
use super::engine;
use super::pool::CandidatePoolLoader;
use super::query::AllocationQueries;
use super::repository::{AllocationStore, StoreError};
use super::writer::AllocationWriter;

/// Orchestrates clear, eligibility, load, allocate and persist for a residency.
pub struct InterviewAllocationService<S> {
    store: Arc<S>,
    in_flight: Mutex<HashSet<ResidencyCode>>,
}

/// Holds a residency in the in-flight set until dropped.
pub(super) struct RunGuard<'a> {
    in_flight: &'a Mutex<HashSet<ResidencyCode>>,
    residency: ResidencyCode,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.in_flight.lock() {
            guard.remove(&self.residency);
        }
    }
}

impl<S> InterviewAllocationService<S>
where
    S: AllocationStore + 'static,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Read-only eligibility check. Does not touch any stored allocation.
    pub fn check_eligibility(
        &self,
        residency: ResidencyCode,
    ) -> Result<EligibilityReport, AllocationServiceError> {
        let residency = allocation_target(residency)?;
        let report =
            EligibilityGate::new(self.store.as_ref()).report(residency.cohort_year(), residency)?;
        Ok(report)
    }

    /// Replaces the stored allocation for `residency`.
    ///
    /// The prior allocation is cleared before eligibility is checked, so a rejected run
    /// still leaves the residency with a clean slate.
    pub fn run_allocation(
        &self,
        residency: ResidencyCode,
    ) -> Result<AllocationRun, AllocationServiceError> {
        let residency = allocation_target(residency)?;
        let _guard = self.begin_run(residency)?;
        let year = residency.cohort_year();
        let store = self.store.as_ref();

        info!(%residency, %year, "allocation run started");

        let writer = AllocationWriter::new(store);
        let cleared_rows = writer.clear(residency)?;

        let gate = EligibilityGate::new(store);
        if !gate.all_preferences_submitted(year, residency)? {
            let report = gate.report(year, residency)?;
            info!(
                %residency,
                missing = report.missing.len(),
                "allocation rejected: preferences outstanding"
            );
            return Ok(AllocationRun::Rejected(report));
        }

        let pool = CandidatePoolLoader::new(store).load(year, residency)?;
        let jobs_considered = pool.jobs.len();
        let students_considered = pool.students.len();

        let result = engine::allocate(pool);
        let interviews_allocated = writer.persist(&result)?;

        let summary = AllocationSummary {
            residency,
            year,
            cleared_rows,
            jobs_considered,
            students_considered,
            interviews_allocated,
            students_without_interviews: result.students_without_interviews(),
            completed_at: Utc::now(),
        };

        info!(
            %residency,
            jobs = jobs_considered,
            students = students_considered,
            interviews = interviews_allocated,
            "allocation run completed"
        );

        Ok(AllocationRun::Completed(summary))
    }

    pub fn fetch_allocations(
        &self,
        residency: ResidencyCode,
    ) -> Result<Vec<AllocationView>, AllocationServiceError> {
        let residency = allocation_target(residency)?;
        Ok(AllocationQueries::new(self.store.as_ref()).allocations(residency)?)
    }

    pub fn job_fill(
        &self,
        residency: ResidencyCode,
    ) -> Result<Vec<JobFill>, AllocationServiceError> {
        let residency = allocation_target(residency)?;
        Ok(AllocationQueries::new(self.store.as_ref()).job_fill(residency)?)
    }

    pub fn student_fill(
        &self,
        residency: ResidencyCode,
    ) -> Result<Vec<StudentFill>, AllocationServiceError> {
        let residency = allocation_target(residency)?;
        Ok(AllocationQueries::new(self.store.as_ref()).student_fill(residency)?)
    }

    /// Approved jobs a student may rank for `residency`.
    pub fn jobs_to_rank(
        &self,
        residency: ResidencyCode,
    ) -> Result<Vec<RankableJob>, AllocationServiceError> {
        let residency = allocation_target(residency)?;
        Ok(self.store.rankable_jobs(residency.pool_codes())?)
    }

    pub fn cohort_status(
        &self,
        year: YearGroup,
    ) -> Result<Vec<CohortMember>, AllocationServiceError> {
        Ok(self.store.cohort(year)?)
    }

    /// Validates the whole submission against the student's year group, then upserts it.
    pub fn submit_preferences(
        &self,
        student: StudentNumber,
        entries: &[PreferenceEntry],
    ) -> Result<usize, AllocationServiceError> {
        let year = self
            .store
            .student_year(student)?
            .ok_or(AllocationServiceError::UnknownStudent(student))?;

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in entries {
            if !seen.insert(entry.job_id) {
                return Err(AllocationServiceError::DuplicatePreference(entry.job_id));
            }
            let residency = self
                .store
                .job_residency(entry.job_id)?
                .ok_or(AllocationServiceError::UnknownJob(entry.job_id))?;
            if !year.may_rank(residency) {
                return Err(AllocationServiceError::PreferenceOutsideResidency {
                    job: entry.job_id,
                    residency,
                    year,
                });
            }
        }

        for entry in entries {
            self.store
                .upsert_preference(student, entry.job_id, entry.preference)?;
        }

        info!(%student, count = entries.len(), "preferences recorded");
        Ok(entries.len())
    }

    pub(super) fn begin_run(
        &self,
        residency: ResidencyCode,
    ) -> Result<RunGuard<'_>, AllocationServiceError> {
        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| StoreError::Unavailable("allocation guard poisoned".to_string()))?;
        if !in_flight.insert(residency) {
            warn!(%residency, "allocation already running");
            return Err(AllocationServiceError::AllocationInProgress(residency));
        }
        Ok(RunGuard {
            in_flight: &self.in_flight,
            residency,
        })
    }
}

fn allocation_target(residency: ResidencyCode) -> Result<ResidencyCode, AllocationServiceError> {
    if residency.is_allocation_target() {
        Ok(residency)
    } else {
        Err(AllocationServiceError::UnsupportedResidency(residency))
    }
}

/// Error raised by the allocation service.
#[derive(Debug, thiserror::Error)]
pub enum AllocationServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("residency {0} is a job tag, not an allocation target")]
    UnsupportedResidency(ResidencyCode),
    #[error("an allocation run for {0} is already in progress")]
    AllocationInProgress(ResidencyCode),
    #[error("student {0} not found")]
    UnknownStudent(StudentNumber),
    #[error("job {0} not found")]
    UnknownJob(JobId),
    #[error("job {0} listed more than once")]
    DuplicatePreference(JobId),
    #[error("job {job} belongs to residency {residency}, which {year} students cannot rank")]
    PreferenceOutsideResidency {
        job: JobId,
        residency: ResidencyCode,
        year: YearGroup,
    },
}

impl AllocationServiceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            Self::AllocationInProgress(_) => true,
            _ => false,
        }
    }
}
