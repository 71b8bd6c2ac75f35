use super::domain::{
    AllocationView, CohortMember, JobId, JobRecord, RankableJob, ResidencyCode, StudentNumber,
    StudentRecord, YearGroup,
};

/// Storage capability injected into every allocation component.
///
/// Implementations own their connections. Callers never acquire a connection per query.
pub trait AllocationStore: Send + Sync {
    /// Approved jobs tagged with exactly `residency`.
    fn approved_jobs(&self, residency: ResidencyCode) -> Result<Vec<JobRecord>, StoreError>;

    /// Students of `year` in retrieval order.
    fn students_in_year(&self, year: YearGroup) -> Result<Vec<StudentRecord>, StoreError>;

    /// Job ids a student ranked, most preferred first.
    fn preferences(&self, student: StudentNumber) -> Result<Vec<JobId>, StoreError>;

    /// Students of `year` with no preference for any job tagged with one of `residencies`.
    fn students_without_preferences(
        &self,
        year: YearGroup,
        residencies: &[ResidencyCode],
    ) -> Result<Vec<StudentNumber>, StoreError>;

    /// Removes allocation rows whose job is tagged with one of `residencies`.
    fn delete_allocations(&self, residencies: &[ResidencyCode]) -> Result<usize, StoreError>;

    fn insert_allocation(&self, student: StudentNumber, job: JobId) -> Result<(), StoreError>;

    fn allocations(
        &self,
        year: YearGroup,
        residencies: &[ResidencyCode],
    ) -> Result<Vec<AllocationView>, StoreError>;

    fn student_year(&self, student: StudentNumber) -> Result<Option<YearGroup>, StoreError>;

    fn job_residency(&self, job: JobId) -> Result<Option<ResidencyCode>, StoreError>;

    /// Inserts the preference or replaces the rank of an existing one.
    fn upsert_preference(
        &self,
        student: StudentNumber,
        job: JobId,
        preference: u32,
    ) -> Result<(), StoreError>;

    fn rankable_jobs(&self, residencies: &[ResidencyCode]) -> Result<Vec<RankableJob>, StoreError>;

    fn cohort(&self, year: YearGroup) -> Result<Vec<CohortMember>, StoreError>;
}

/// Storage-layer fault. Every variant is scoped to one run and safe to retry.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Query(_))
    }
}
