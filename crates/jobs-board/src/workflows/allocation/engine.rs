use std::collections::BTreeMap;

use tracing::debug;

use super::domain::{InterviewPair, Job, JobId, ResidencyCode, Student, YearGroup};
use super::pool::CandidatePool;

/// Final state of one allocation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationResult {
    pub residency: ResidencyCode,
    pub year: YearGroup,
    pub jobs: BTreeMap<JobId, Job>,
    pub students: Vec<Student>,
}

impl AllocationResult {
    /// Pairs in student rank order, then the order each interview was granted.
    pub fn pairs(&self) -> Vec<InterviewPair> {
        self.students
            .iter()
            .flat_map(|student| {
                student.interviews.iter().map(move |job_id| InterviewPair {
                    student_number: student.student_number,
                    job_id: *job_id,
                })
            })
            .collect()
    }

    pub fn interview_count(&self) -> usize {
        self.students.iter().map(|student| student.interviews.len()).sum()
    }

    pub fn students_without_interviews(&self) -> usize {
        self.students
            .iter()
            .filter(|student| student.interviews.is_empty())
            .count()
    }
}

/// Greedy single pass in rank order. Higher-ranked students claim slots first and
/// nothing granted is ever revoked.
pub fn allocate(pool: CandidatePool) -> AllocationResult {
    let CandidatePool {
        residency,
        year,
        mut jobs,
        mut students,
    } = pool;

    for student in &mut students {
        for job_id in student.job_preferences.iter().copied() {
            if student.is_saturated() {
                break;
            }
            if student.interviews.contains(&job_id) {
                continue;
            }
            let Some(job) = jobs.get(&job_id) else {
                continue;
            };
            if !job.has_open_slot() {
                debug!(student = %student.student_number, job = %job_id, "job is full");
                continue;
            }
            let company_id = job.company_id;
            let same_company = student
                .interviews
                .iter()
                .filter_map(|held| jobs.get(held))
                .any(|held| held.company_id == company_id);
            if same_company {
                debug!(student = %student.student_number, job = %job_id, "company already held");
                continue;
            }

            if let Some(job) = jobs.get_mut(&job_id) {
                job.interviews.push(student.student_number);
                student.interviews.push(job_id);
            }
        }
    }

    AllocationResult {
        residency,
        year,
        jobs,
        students,
    }
}
