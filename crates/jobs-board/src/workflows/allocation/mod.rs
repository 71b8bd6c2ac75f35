//! Interview allocation: eligibility, candidate pool loading, the greedy rank-ordered
//! assignment pass, persistence and read-only projections.

pub mod domain;
pub(crate) mod eligibility;
pub mod engine;
pub(crate) mod pool;
pub mod query;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;
pub(crate) mod writer;

#[cfg(test)]
mod tests;

pub use domain::{
    AllocationRun, AllocationSummary, AllocationView, CohortMember, CompanyId, EligibilityReport,
    InterviewPair, Job, JobFill, JobId, JobRecord, PreferenceEntry, RankableJob, ResidencyCode,
    Student, StudentFill, StudentNumber, StudentRecord, YearGroup, INTERVIEWS_PER_POSITION,
    MAX_INTERVIEWS_PER_STUDENT,
};
pub use engine::{allocate, AllocationResult};
pub use pool::CandidatePool;
pub use query::write_allocations_csv;
pub use repository::{AllocationStore, StoreError};
pub use router::allocation_router;
pub use service::{AllocationServiceError, InterviewAllocationService};
pub use sqlite::{Approval, NewJob, NewStudent, SqliteAllocationStore};
