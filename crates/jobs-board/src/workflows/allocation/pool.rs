use std::collections::BTreeMap;

use tracing::debug;

use super::domain::{Job, JobId, ResidencyCode, Student, YearGroup};
use super::repository::{AllocationStore, StoreError};

/// In-memory snapshot consumed by a single allocation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePool {
    pub residency: ResidencyCode,
    pub year: YearGroup,
    pub jobs: BTreeMap<JobId, Job>,
    /// Ascending class rank; ties keep retrieval order.
    pub students: Vec<Student>,
}

pub struct CandidatePoolLoader<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> CandidatePoolLoader<'a, S>
where
    S: AllocationStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn load(
        &self,
        year: YearGroup,
        residency: ResidencyCode,
    ) -> Result<CandidatePool, StoreError> {
        let jobs = self.load_jobs(residency)?;
        let students = self.load_students(year, &jobs)?;
        Ok(CandidatePool {
            residency,
            year,
            jobs,
            students,
        })
    }

    /// Approved jobs for every tag in the residency's pool, keyed by id.
    pub fn load_jobs(&self, residency: ResidencyCode) -> Result<BTreeMap<JobId, Job>, StoreError> {
        let mut jobs = BTreeMap::new();
        for code in residency.pool_codes() {
            for record in self.store.approved_jobs(*code)? {
                jobs.insert(record.job_id, Job::from(record));
            }
        }
        Ok(jobs)
    }

    /// Students of `year`, each with preferences resolved against `jobs`.
    pub fn load_students(
        &self,
        year: YearGroup,
        jobs: &BTreeMap<JobId, Job>,
    ) -> Result<Vec<Student>, StoreError> {
        let records = self.store.students_in_year(year)?;
        let mut students = Vec::with_capacity(records.len());

        for record in records {
            let stored = self.store.preferences(record.student_number)?;
            let stored_len = stored.len();
            let preferences: Vec<JobId> = stored
                .into_iter()
                .filter(|job_id| jobs.contains_key(job_id))
                .collect();

            if preferences.len() < stored_len {
                debug!(
                    student = %record.student_number,
                    dropped = stored_len - preferences.len(),
                    "ignoring preferences outside the job pool"
                );
            }

            students.push(Student::new(
                record.student_number,
                record.class_rank,
                preferences,
            ));
        }

        students.sort_by_key(|student| student.class_rank);
        Ok(students)
    }
}
