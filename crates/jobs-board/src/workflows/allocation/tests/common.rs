use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use serde_json::Value;

use crate::workflows::allocation::domain::{
    AllocationView, CohortMember, CompanyId, InterviewPair, Job, JobId, JobRecord, RankableJob,
    ResidencyCode, Student, StudentNumber, StudentRecord, YearGroup,
};
use crate::workflows::allocation::pool::CandidatePool;
use crate::workflows::allocation::repository::{AllocationStore, StoreError};
use crate::workflows::allocation::service::InterviewAllocationService;

#[derive(Clone)]
pub(super) struct StoredJob {
    pub(super) record: JobRecord,
    pub(super) residency: ResidencyCode,
    pub(super) approved: bool,
}

#[derive(Clone)]
pub(super) struct StoredStudent {
    pub(super) record: StudentRecord,
    pub(super) year: YearGroup,
}

#[derive(Default)]
pub(super) struct Tables {
    pub(super) jobs: Vec<StoredJob>,
    pub(super) students: Vec<StoredStudent>,
    pub(super) preferences: Vec<(StudentNumber, JobId, u32)>,
    pub(super) allocations: Vec<InterviewPair>,
    /// Inserts beyond this many fail with `Unavailable`.
    pub(super) insert_budget: Option<usize>,
}

#[derive(Default)]
pub(super) struct MemoryStore {
    pub(super) tables: Mutex<Tables>,
}

impl MemoryStore {
    pub(super) fn job(
        self,
        id: i64,
        company: i64,
        positions: u32,
        residency: ResidencyCode,
    ) -> Self {
        self.tables
            .lock()
            .expect("store mutex poisoned")
            .jobs
            .push(StoredJob {
                record: JobRecord {
                    job_id: JobId(id),
                    company_id: CompanyId(company),
                    position_count: positions,
                    title: format!("Job {id}"),
                },
                residency,
                approved: true,
            });
        self
    }

    pub(super) fn unapproved_job(self, id: i64, company: i64, residency: ResidencyCode) -> Self {
        let store = self.job(id, company, 1, residency);
        if let Some(job) = store
            .tables
            .lock()
            .expect("store mutex poisoned")
            .jobs
            .last_mut()
        {
            job.approved = false;
        }
        store
    }

    pub(super) fn student(self, number: i64, year: YearGroup, rank: i64, prefs: &[i64]) -> Self {
        {
            let mut tables = self.tables.lock().expect("store mutex poisoned");
            tables.students.push(StoredStudent {
                record: StudentRecord {
                    student_number: StudentNumber(number),
                    class_rank: rank,
                },
                year,
            });
            for (index, job) in prefs.iter().enumerate() {
                tables
                    .preferences
                    .push((StudentNumber(number), JobId(*job), index as u32 + 1));
            }
        }
        self
    }

    pub(super) fn with_insert_budget(self, budget: usize) -> Self {
        self.tables.lock().expect("store mutex poisoned").insert_budget = Some(budget);
        self
    }

    pub(super) fn pairs(&self) -> Vec<(i64, i64)> {
        let mut pairs: Vec<(i64, i64)> = self
            .tables
            .lock()
            .expect("store mutex poisoned")
            .allocations
            .iter()
            .map(|pair| (pair.student_number.0, pair.job_id.0))
            .collect();
        pairs.sort_unstable();
        pairs
    }

    fn residency_of(tables: &Tables, job: JobId) -> Option<ResidencyCode> {
        tables
            .jobs
            .iter()
            .find(|stored| stored.record.job_id == job)
            .map(|stored| stored.residency)
    }
}

impl AllocationStore for MemoryStore {
    fn approved_jobs(&self, residency: ResidencyCode) -> Result<Vec<JobRecord>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .jobs
            .iter()
            .filter(|stored| stored.approved && stored.residency == residency)
            .map(|stored| stored.record.clone())
            .collect())
    }

    fn students_in_year(&self, year: YearGroup) -> Result<Vec<StudentRecord>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .students
            .iter()
            .filter(|stored| stored.year == year)
            .map(|stored| stored.record)
            .collect())
    }

    fn preferences(&self, student: StudentNumber) -> Result<Vec<JobId>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        let mut rows: Vec<(u32, JobId)> = tables
            .preferences
            .iter()
            .filter(|(owner, _, _)| *owner == student)
            .map(|(_, job, rank)| (*rank, *job))
            .collect();
        rows.sort();
        Ok(rows.into_iter().map(|(_, job)| job).collect())
    }

    fn students_without_preferences(
        &self,
        year: YearGroup,
        residencies: &[ResidencyCode],
    ) -> Result<Vec<StudentNumber>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .students
            .iter()
            .filter(|stored| stored.year == year)
            .map(|stored| stored.record.student_number)
            .filter(|number| {
                !tables.preferences.iter().any(|(owner, job, _)| {
                    owner == number
                        && Self::residency_of(&tables, *job)
                            .map(|code| residencies.contains(&code))
                            .unwrap_or(false)
                })
            })
            .collect())
    }

    fn delete_allocations(&self, residencies: &[ResidencyCode]) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let before = tables.allocations.len();
        let kept: Vec<InterviewPair> = tables
            .allocations
            .iter()
            .copied()
            .filter(|pair| {
                !Self::residency_of(&tables, pair.job_id)
                    .map(|code| residencies.contains(&code))
                    .unwrap_or(false)
            })
            .collect();
        tables.allocations = kept;
        Ok(before - tables.allocations.len())
    }

    fn insert_allocation(&self, student: StudentNumber, job: JobId) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        if let Some(budget) = tables.insert_budget {
            if budget == 0 {
                return Err(StoreError::Unavailable("connection reset".to_string()));
            }
            tables.insert_budget = Some(budget - 1);
        }
        tables.allocations.push(InterviewPair {
            student_number: student,
            job_id: job,
        });
        Ok(())
    }

    fn allocations(
        &self,
        year: YearGroup,
        residencies: &[ResidencyCode],
    ) -> Result<Vec<AllocationView>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .allocations
            .iter()
            .filter(|pair| {
                tables.students.iter().any(|stored| {
                    stored.record.student_number == pair.student_number && stored.year == year
                })
            })
            .filter_map(|pair| {
                let job = tables.jobs.iter().find(|stored| {
                    stored.record.job_id == pair.job_id && residencies.contains(&stored.residency)
                })?;
                Some(AllocationView {
                    student_number: pair.student_number,
                    first_name: "Test".to_string(),
                    last_name: format!("Student {}", pair.student_number),
                    job_id: pair.job_id,
                    job_title: job.record.title.clone(),
                })
            })
            .collect())
    }

    fn student_year(&self, student: StudentNumber) -> Result<Option<YearGroup>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .students
            .iter()
            .find(|stored| stored.record.student_number == student)
            .map(|stored| stored.year))
    }

    fn job_residency(&self, job: JobId) -> Result<Option<ResidencyCode>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(Self::residency_of(&tables, job))
    }

    fn upsert_preference(
        &self,
        student: StudentNumber,
        job: JobId,
        preference: u32,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store mutex poisoned");
        let existing = tables
            .preferences
            .iter()
            .position(|(owner, existing, _)| *owner == student && *existing == job);
        match existing {
            Some(index) => tables.preferences[index].2 = preference,
            None => tables.preferences.push((student, job, preference)),
        }
        Ok(())
    }

    fn rankable_jobs(&self, residencies: &[ResidencyCode]) -> Result<Vec<RankableJob>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .jobs
            .iter()
            .filter(|stored| stored.approved && residencies.contains(&stored.residency))
            .map(|stored| RankableJob {
                job_id: stored.record.job_id,
                title: stored.record.title.clone(),
                company_name: format!("Company {}", stored.record.company_id.0),
            })
            .collect())
    }

    fn cohort(&self, year: YearGroup) -> Result<Vec<CohortMember>, StoreError> {
        let tables = self.tables.lock().expect("store mutex poisoned");
        Ok(tables
            .students
            .iter()
            .filter(|stored| stored.year == year)
            .map(|stored| CohortMember {
                student_number: stored.record.student_number,
                first_name: "Test".to_string(),
                last_name: format!("Student {}", stored.record.student_number),
                class_rank: stored.record.class_rank,
                has_preferences: tables
                    .preferences
                    .iter()
                    .any(|(owner, _, _)| *owner == stored.record.student_number),
            })
            .collect())
    }
}

pub(super) struct UnavailableStore;

impl UnavailableStore {
    fn offline<T>() -> Result<T, StoreError> {
        Err(StoreError::Unavailable("database offline".to_string()))
    }
}

impl AllocationStore for UnavailableStore {
    fn approved_jobs(&self, _residency: ResidencyCode) -> Result<Vec<JobRecord>, StoreError> {
        Self::offline()
    }

    fn students_in_year(&self, _year: YearGroup) -> Result<Vec<StudentRecord>, StoreError> {
        Self::offline()
    }

    fn preferences(&self, _student: StudentNumber) -> Result<Vec<JobId>, StoreError> {
        Self::offline()
    }

    fn students_without_preferences(
        &self,
        _year: YearGroup,
        _residencies: &[ResidencyCode],
    ) -> Result<Vec<StudentNumber>, StoreError> {
        Self::offline()
    }

    fn delete_allocations(&self, _residencies: &[ResidencyCode]) -> Result<usize, StoreError> {
        Self::offline()
    }

    fn insert_allocation(&self, _student: StudentNumber, _job: JobId) -> Result<(), StoreError> {
        Self::offline()
    }

    fn allocations(
        &self,
        _year: YearGroup,
        _residencies: &[ResidencyCode],
    ) -> Result<Vec<AllocationView>, StoreError> {
        Self::offline()
    }

    fn student_year(&self, _student: StudentNumber) -> Result<Option<YearGroup>, StoreError> {
        Self::offline()
    }

    fn job_residency(&self, _job: JobId) -> Result<Option<ResidencyCode>, StoreError> {
        Self::offline()
    }

    fn upsert_preference(
        &self,
        _student: StudentNumber,
        _job: JobId,
        _preference: u32,
    ) -> Result<(), StoreError> {
        Self::offline()
    }

    fn rankable_jobs(
        &self,
        _residencies: &[ResidencyCode],
    ) -> Result<Vec<RankableJob>, StoreError> {
        Self::offline()
    }

    fn cohort(&self, _year: YearGroup) -> Result<Vec<CohortMember>, StoreError> {
        Self::offline()
    }
}

/// Builds a pool directly, bypassing the loader. `jobs` is `(id, company, positions)`.
pub(super) fn pool(
    jobs: &[(i64, i64, u32)],
    students: Vec<(i64, i64, Vec<i64>)>,
) -> CandidatePool {
    let jobs: BTreeMap<JobId, Job> = jobs
        .iter()
        .map(|(id, company, positions)| {
            (
                JobId(*id),
                Job::from(JobRecord {
                    job_id: JobId(*id),
                    company_id: CompanyId(*company),
                    position_count: *positions,
                    title: format!("Job {id}"),
                }),
            )
        })
        .collect();
    let mut students: Vec<Student> = students
        .into_iter()
        .map(|(number, rank, prefs)| {
            Student::new(
                StudentNumber(number),
                rank,
                prefs.into_iter().map(JobId).collect(),
            )
        })
        .collect();
    students.sort_by_key(|student| student.class_rank);

    CandidatePool {
        residency: ResidencyCode::R3,
        year: YearGroup::Second,
        jobs,
        students,
    }
}

pub(super) fn interviews_of(students: &[Student], number: i64) -> Vec<i64> {
    students
        .iter()
        .find(|student| student.student_number == StudentNumber(number))
        .map(|student| student.interviews.iter().map(|job| job.0).collect())
        .unwrap_or_default()
}

pub(super) fn service(
    store: MemoryStore,
) -> (InterviewAllocationService<MemoryStore>, Arc<MemoryStore>) {
    let store = Arc::new(store);
    (InterviewAllocationService::new(store.clone()), store)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
