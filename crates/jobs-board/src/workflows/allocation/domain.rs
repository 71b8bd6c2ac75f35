use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Each open position offers interview capacity for this many candidates.
pub const INTERVIEWS_PER_POSITION: u32 = 3;

/// Ceiling on interviews handed to a single student in one run.
pub const MAX_INTERVIEWS_PER_STUDENT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompanyId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentNumber(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for StudentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Academic year of a student cohort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum YearGroup {
    First,
    Second,
    Third,
    Fourth,
}

impl YearGroup {
    pub const fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
            Self::Third => 3,
            Self::Fourth => 4,
        }
    }

    /// Residency codes whose jobs a student of this year may rank.
    pub const fn residencies(self) -> &'static [ResidencyCode] {
        match self {
            Self::First => &[ResidencyCode::R1, ResidencyCode::R2, ResidencyCode::R1R2],
            Self::Second => &[ResidencyCode::R3],
            Self::Third => &[ResidencyCode::R4],
            Self::Fourth => &[ResidencyCode::R5],
        }
    }

    pub fn may_rank(self, residency: ResidencyCode) -> bool {
        self.residencies().contains(&residency)
    }
}

impl TryFrom<u8> for YearGroup {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            3 => Ok(Self::Third),
            4 => Ok(Self::Fourth),
            other => Err(format!("unknown year group: {other}")),
        }
    }
}

impl From<YearGroup> for u8 {
    fn from(value: YearGroup) -> Self {
        value.number()
    }
}

impl fmt::Display for YearGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "year {}", self.number())
    }
}

/// Work-placement track a job is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResidencyCode {
    R1,
    R2,
    #[serde(rename = "r1+r2", alias = "r1 r2")]
    R1R2,
    R3,
    R4,
    R5,
}

impl ResidencyCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::R1 => "r1",
            Self::R2 => "r2",
            Self::R1R2 => "r1+r2",
            Self::R3 => "r3",
            Self::R4 => "r4",
            Self::R5 => "r5",
        }
    }

    /// Year whose students are allocated against this residency.
    pub const fn cohort_year(self) -> YearGroup {
        match self {
            Self::R1 | Self::R2 | Self::R1R2 => YearGroup::First,
            Self::R3 => YearGroup::Second,
            Self::R4 => YearGroup::Third,
            Self::R5 => YearGroup::Fourth,
        }
    }

    /// The combined code only tags jobs; it never drives its own run.
    pub const fn is_allocation_target(self) -> bool {
        !matches!(self, Self::R1R2)
    }

    /// Job tags that make up the pool for this residency.
    pub const fn pool_codes(self) -> &'static [ResidencyCode] {
        match self {
            Self::R1 => &[Self::R1, Self::R1R2],
            Self::R2 => &[Self::R2],
            Self::R1R2 => &[Self::R1R2],
            Self::R3 => &[Self::R3],
            Self::R4 => &[Self::R4],
            Self::R5 => &[Self::R5],
        }
    }
}

impl FromStr for ResidencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r1" => Ok(Self::R1),
            "r2" => Ok(Self::R2),
            // `+` arrives as a space when the code was form-encoded.
            "r1+r2" | "r1 r2" => Ok(Self::R1R2),
            "r3" => Ok(Self::R3),
            "r4" => Ok(Self::R4),
            "r5" => Ok(Self::R5),
            other => Err(format!("unknown residency code: {other}")),
        }
    }
}

impl fmt::Display for ResidencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Approved job row as read from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub company_id: CompanyId,
    pub position_count: u32,
    pub title: String,
}

/// Cohort member row as read from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_number: StudentNumber,
    pub class_rank: i64,
}

/// Job as it takes part in an allocation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub job_id: JobId,
    pub company_id: CompanyId,
    pub position_count: u32,
    pub title: String,
    pub interviews: Vec<StudentNumber>,
}

impl Job {
    pub fn interview_capacity(&self) -> usize {
        (self.position_count as usize).saturating_mul(INTERVIEWS_PER_POSITION as usize)
    }

    pub fn has_open_slot(&self) -> bool {
        self.interviews.len() < self.interview_capacity()
    }
}

impl From<JobRecord> for Job {
    fn from(record: JobRecord) -> Self {
        Self {
            job_id: record.job_id,
            company_id: record.company_id,
            position_count: record.position_count,
            title: record.title,
            interviews: Vec::new(),
        }
    }
}

/// Student as they take part in an allocation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Student {
    pub student_number: StudentNumber,
    pub class_rank: i64,
    pub job_preferences: Vec<JobId>,
    pub interviews: Vec<JobId>,
}

impl Student {
    pub fn new(
        student_number: StudentNumber,
        class_rank: i64,
        job_preferences: Vec<JobId>,
    ) -> Self {
        Self {
            student_number,
            class_rank,
            job_preferences,
            interviews: Vec::new(),
        }
    }

    pub fn is_saturated(&self) -> bool {
        self.interviews.len() >= MAX_INTERVIEWS_PER_STUDENT
    }
}

/// One persisted (student, job) allocation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterviewPair {
    pub student_number: StudentNumber,
    pub job_id: JobId,
}

/// Allocation row joined with student and job identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationView {
    pub student_number: StudentNumber,
    pub first_name: String,
    pub last_name: String,
    pub job_id: JobId,
    pub job_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFill {
    pub job_id: JobId,
    pub title: String,
    pub company_id: CompanyId,
    pub interview_capacity: usize,
    pub filled: usize,
    pub is_full: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StudentFill {
    pub student_number: StudentNumber,
    pub class_rank: i64,
    pub interviews: usize,
}

/// Job offered to a student when submitting preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankableJob {
    pub job_id: JobId,
    pub title: String,
    pub company_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortMember {
    pub student_number: StudentNumber,
    pub first_name: String,
    pub last_name: String,
    pub class_rank: i64,
    pub has_preferences: bool,
}

/// A single ranked entry in a preference submission. Lower `preference` is preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceEntry {
    pub job_id: JobId,
    pub preference: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EligibilityReport {
    pub residency: ResidencyCode,
    pub year: YearGroup,
    pub all_preferences_submitted: bool,
    pub missing: Vec<StudentNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationSummary {
    pub residency: ResidencyCode,
    pub year: YearGroup,
    pub cleared_rows: usize,
    pub jobs_considered: usize,
    pub students_considered: usize,
    pub interviews_allocated: usize,
    pub students_without_interviews: usize,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of an allocation request that did not fault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AllocationRun {
    Completed(AllocationSummary),
    Rejected(EligibilityReport),
}
