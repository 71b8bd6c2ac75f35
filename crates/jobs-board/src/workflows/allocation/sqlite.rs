//! SQLite-backed [`AllocationStore`].
//!
//! Uses a single connection guarded by a mutex. Every statement is parameterized.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};

use super::domain::{
    AllocationView, CohortMember, CompanyId, JobId, JobRecord, RankableJob, ResidencyCode,
    StudentNumber, StudentRecord, YearGroup,
};
use super::repository::{AllocationStore, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS company (
    company_id INTEGER PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS student (
    student_number INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(user_id),
    year INTEGER NOT NULL CHECK (year BETWEEN 1 AND 4),
    class_rank INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS job (
    job_id INTEGER PRIMARY KEY,
    company_id INTEGER NOT NULL REFERENCES company(company_id),
    job_title TEXT NOT NULL,
    position_count INTEGER NOT NULL CHECK (position_count >= 0),
    residency TEXT NOT NULL,
    approval TEXT NOT NULL DEFAULT 'pending'
        CHECK (approval IN ('approved', 'pending', 'rejected'))
);
CREATE TABLE IF NOT EXISTS student_preference (
    student_number INTEGER NOT NULL REFERENCES student(student_number),
    job_id INTEGER NOT NULL REFERENCES job(job_id),
    preference INTEGER NOT NULL,
    PRIMARY KEY (student_number, job_id)
);
CREATE TABLE IF NOT EXISTS interview_allocation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    student_number INTEGER NOT NULL REFERENCES student(student_number),
    job_id INTEGER NOT NULL REFERENCES job(job_id),
    UNIQUE (job_id, student_number)
);
";

impl ToSql for ResidencyCode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ResidencyCode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|e: String| {
            FromSqlError::Other(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                e,
            )))
        })
    }
}

impl ToSql for YearGroup {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.number())))
    }
}

impl FromSql for YearGroup {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_i64()?;
        let narrowed = u8::try_from(raw).map_err(|_| FromSqlError::OutOfRange(raw))?;
        YearGroup::try_from(narrowed).map_err(|_| FromSqlError::OutOfRange(raw))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        match &value {
            rusqlite::Error::SqliteFailure(failure, _)
                if matches!(
                    failure.code,
                    rusqlite::ErrorCode::CannotOpen
                        | rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                StoreError::Unavailable(value.to_string())
            }
            _ => StoreError::Query(value.to_string()),
        }
    }
}

/// Job approval state as stored in the `job` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    Approved,
    Pending,
    Rejected,
}

impl Approval {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Pending => "pending",
            Self::Rejected => "rejected",
        }
    }
}

/// Seed row for a student and their user identity.
#[derive(Debug, Clone)]
pub struct NewStudent {
    pub student_number: StudentNumber,
    pub first_name: String,
    pub last_name: String,
    pub year: YearGroup,
    pub class_rank: i64,
}

/// Seed row for a job posting.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_id: JobId,
    pub company_id: CompanyId,
    pub title: String,
    pub position_count: u32,
    pub residency: ResidencyCode,
    pub approval: Approval,
}

pub struct SqliteAllocationStore {
    connection: Mutex<Connection>,
}

impl SqliteAllocationStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let connection = Connection::open(path)?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self, StoreError> {
        connection.execute_batch("PRAGMA foreign_keys = ON;")?;
        connection.execute_batch(SCHEMA)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.connection
            .lock()
            .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))
    }

    pub fn insert_company(&self, company_id: CompanyId, name: &str) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO company (company_id, name) VALUES (?1, ?2)",
            params![company_id.0, name],
        )?;
        Ok(())
    }

    /// Inserts the user row and the student row that owns it.
    pub fn insert_student(&self, student: &NewStudent) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO users (first_name, last_name, email) VALUES (?1, ?2, ?3)",
            params![
                student.first_name,
                student.last_name,
                format!("{}@students.jobs-board.test", student.student_number)
            ],
        )?;
        let user_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO student (student_number, user_id, year, class_rank)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                student.student_number.0,
                user_id,
                student.year,
                student.class_rank
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn insert_job(&self, job: &NewJob) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO job (job_id, company_id, job_title, position_count, residency, approval)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                job.job_id.0,
                job.company_id.0,
                job.title,
                job.position_count,
                job.residency,
                job.approval.as_str()
            ],
        )?;
        Ok(())
    }

    pub fn set_approval(&self, job_id: JobId, approval: Approval) -> Result<(), StoreError> {
        self.conn()?.execute(
            "UPDATE job SET approval = ?1 WHERE job_id = ?2",
            params![approval.as_str(), job_id.0],
        )?;
        Ok(())
    }
}

/// `?{start}, ?{start + 1}, ...` for an `IN (...)` list.
fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|index| format!("?{index}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl AllocationStore for SqliteAllocationStore {
    fn approved_jobs(&self, residency: ResidencyCode) -> Result<Vec<JobRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT job_id, company_id, position_count, job_title
             FROM job
             WHERE residency = ?1 AND approval = 'approved'
             ORDER BY job_id",
        )?;
        let rows = stmt.query_map(params![residency], |row| {
            Ok(JobRecord {
                job_id: JobId(row.get(0)?),
                company_id: CompanyId(row.get(1)?),
                position_count: row.get(2)?,
                title: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn students_in_year(&self, year: YearGroup) -> Result<Vec<StudentRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT student_number, class_rank
             FROM student
             WHERE year = ?1
             ORDER BY student_number",
        )?;
        let rows = stmt.query_map(params![year], |row| {
            Ok(StudentRecord {
                student_number: StudentNumber(row.get(0)?),
                class_rank: row.get(1)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn preferences(&self, student: StudentNumber) -> Result<Vec<JobId>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT job_id
             FROM student_preference
             WHERE student_number = ?1
             ORDER BY preference ASC, job_id ASC",
        )?;
        let rows = stmt.query_map(params![student.0], |row| Ok(JobId(row.get(0)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn students_without_preferences(
        &self,
        year: YearGroup,
        residencies: &[ResidencyCode],
    ) -> Result<Vec<StudentNumber>, StoreError> {
        let sql = format!(
            "SELECT s.student_number
             FROM student s
             WHERE s.year = ?1
             AND NOT EXISTS (
                 SELECT 1
                 FROM student_preference sp
                 JOIN job j ON sp.job_id = j.job_id
                 WHERE sp.student_number = s.student_number
                 AND j.residency IN ({})
             )
             ORDER BY s.student_number",
            placeholders(2, residencies.len())
        );
        let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(residencies.len() + 1);
        bound.push(&year);
        bound.extend(residencies.iter().map(|code| code as &dyn ToSql));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(bound.as_slice(), |row| Ok(StudentNumber(row.get(0)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn delete_allocations(&self, residencies: &[ResidencyCode]) -> Result<usize, StoreError> {
        let sql = format!(
            "DELETE FROM interview_allocation
             WHERE job_id IN (SELECT job_id FROM job WHERE residency IN ({}))",
            placeholders(1, residencies.len())
        );
        let bound: Vec<&dyn ToSql> = residencies.iter().map(|code| code as &dyn ToSql).collect();
        Ok(self.conn()?.execute(&sql, bound.as_slice())?)
    }

    fn insert_allocation(&self, student: StudentNumber, job: JobId) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO interview_allocation (student_number, job_id) VALUES (?1, ?2)",
            params![student.0, job.0],
        )?;
        Ok(())
    }

    fn allocations(
        &self,
        year: YearGroup,
        residencies: &[ResidencyCode],
    ) -> Result<Vec<AllocationView>, StoreError> {
        let sql = format!(
            "SELECT s.student_number, u.first_name, u.last_name, j.job_id, j.job_title
             FROM interview_allocation ia
             JOIN student s ON ia.student_number = s.student_number
             JOIN users u ON s.user_id = u.user_id
             JOIN job j ON ia.job_id = j.job_id
             WHERE s.year = ?1 AND j.residency IN ({})
             ORDER BY s.student_number, j.job_id",
            placeholders(2, residencies.len())
        );
        let mut bound: Vec<&dyn ToSql> = Vec::with_capacity(residencies.len() + 1);
        bound.push(&year);
        bound.extend(residencies.iter().map(|code| code as &dyn ToSql));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(bound.as_slice(), |row| {
            Ok(AllocationView {
                student_number: StudentNumber(row.get(0)?),
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                job_id: JobId(row.get(3)?),
                job_title: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn student_year(&self, student: StudentNumber) -> Result<Option<YearGroup>, StoreError> {
        let year = self
            .conn()?
            .query_row(
                "SELECT year FROM student WHERE student_number = ?1",
                params![student.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(year)
    }

    fn job_residency(&self, job: JobId) -> Result<Option<ResidencyCode>, StoreError> {
        let residency = self
            .conn()?
            .query_row(
                "SELECT residency FROM job WHERE job_id = ?1",
                params![job.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(residency)
    }

    fn upsert_preference(
        &self,
        student: StudentNumber,
        job: JobId,
        preference: u32,
    ) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO student_preference (student_number, job_id, preference)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (student_number, job_id) DO UPDATE SET preference = excluded.preference",
            params![student.0, job.0, preference],
        )?;
        Ok(())
    }

    fn rankable_jobs(&self, residencies: &[ResidencyCode]) -> Result<Vec<RankableJob>, StoreError> {
        let sql = format!(
            "SELECT j.job_id, j.job_title, c.name
             FROM job j
             JOIN company c ON j.company_id = c.company_id
             WHERE j.approval = 'approved' AND j.residency IN ({})
             ORDER BY j.job_id",
            placeholders(1, residencies.len())
        );
        let bound: Vec<&dyn ToSql> = residencies.iter().map(|code| code as &dyn ToSql).collect();

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(bound.as_slice(), |row| {
            Ok(RankableJob {
                job_id: JobId(row.get(0)?),
                title: row.get(1)?,
                company_name: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn cohort(&self, year: YearGroup) -> Result<Vec<CohortMember>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.student_number, u.first_name, u.last_name, s.class_rank,
                    EXISTS (
                        SELECT 1 FROM student_preference sp
                        WHERE sp.student_number = s.student_number
                    ) AS has_preferences
             FROM student s
             JOIN users u ON s.user_id = u.user_id
             WHERE s.year = ?1
             ORDER BY s.class_rank, s.student_number",
        )?;
        let rows = stmt.query_map(params![year], |row| {
            Ok(CohortMember {
                student_number: StudentNumber(row.get(0)?),
                first_name: row.get(1)?,
                last_name: row.get(2)?,
                class_rank: row.get(3)?,
                has_preferences: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
