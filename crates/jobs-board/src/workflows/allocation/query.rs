use std::collections::HashMap;
use std::io::Write;

use super::domain::{AllocationView, JobFill, JobId, ResidencyCode, StudentFill, StudentNumber};
use super::pool::CandidatePoolLoader;
use super::repository::{AllocationStore, StoreError};

/// Read-only projections over the persisted allocation.
pub struct AllocationQueries<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S> AllocationQueries<'a, S>
where
    S: AllocationStore + ?Sized,
{
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn allocations(&self, residency: ResidencyCode) -> Result<Vec<AllocationView>, StoreError> {
        let mut views = self
            .store
            .allocations(residency.cohort_year(), residency.pool_codes())?;
        views.sort_by_key(|view| (view.student_number, view.job_id));
        Ok(views)
    }

    pub fn job_fill(&self, residency: ResidencyCode) -> Result<Vec<JobFill>, StoreError> {
        let jobs = CandidatePoolLoader::new(self.store).load_jobs(residency)?;
        let mut filled: HashMap<JobId, usize> = HashMap::new();
        for view in self.allocations(residency)? {
            *filled.entry(view.job_id).or_default() += 1;
        }

        Ok(jobs
            .into_values()
            .map(|job| {
                let interview_capacity = job.interview_capacity();
                let filled = filled.get(&job.job_id).copied().unwrap_or(0);
                JobFill {
                    job_id: job.job_id,
                    title: job.title,
                    company_id: job.company_id,
                    interview_capacity,
                    filled,
                    is_full: filled >= interview_capacity,
                }
            })
            .collect())
    }

    pub fn student_fill(&self, residency: ResidencyCode) -> Result<Vec<StudentFill>, StoreError> {
        let mut counts: HashMap<StudentNumber, usize> = HashMap::new();
        for view in self.allocations(residency)? {
            *counts.entry(view.student_number).or_default() += 1;
        }

        let mut students = self.store.students_in_year(residency.cohort_year())?;
        students.sort_by_key(|student| student.class_rank);

        Ok(students
            .into_iter()
            .map(|student| StudentFill {
                student_number: student.student_number,
                class_rank: student.class_rank,
                interviews: counts.get(&student.student_number).copied().unwrap_or(0),
            })
            .collect())
    }
}

/// Writes allocation views as CSV with a header row.
pub fn write_allocations_csv<W: Write>(
    views: &[AllocationView],
    writer: W,
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for view in views {
        csv_writer.serialize(view)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_export_includes_header_and_rows() {
        let views = vec![AllocationView {
            student_number: StudentNumber(21001),
            first_name: "Aoife".to_string(),
            last_name: "Byrne".to_string(),
            job_id: JobId(7),
            job_title: "Platform Intern".to_string(),
        }];

        let mut buffer = Vec::new();
        write_allocations_csv(&views, &mut buffer).expect("csv written");
        let text = String::from_utf8(buffer).expect("utf8");

        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("student_number,first_name,last_name,job_id,job_title")
        );
        assert_eq!(lines.next(), Some("21001,Aoife,Byrne,7,Platform Intern"));
    }
}
