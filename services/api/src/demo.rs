use crate::infra::open_store;
use clap::Args;
use jobs_board::config::AppConfig;
use jobs_board::error::AppError;
use jobs_board::telemetry;
use jobs_board::workflows::allocation::{
    write_allocations_csv, AllocationRun, AllocationSummary, Approval, CompanyId,
    EligibilityReport, InterviewAllocationService, JobFill, JobId, NewJob, NewStudent,
    PreferenceEntry, ResidencyCode, SqliteAllocationStore, StudentFill, StudentNumber, YearGroup,
};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AllocateArgs {
    /// Residency to allocate (r1, r2, r3, r4 or r5)
    #[arg(long)]
    pub(crate) residency: ResidencyCode,
}

#[derive(Args, Debug)]
pub(crate) struct AllocationsArgs {
    /// Residency whose stored allocation should be listed
    #[arg(long)]
    pub(crate) residency: ResidencyCode,
    /// Emit CSV on stdout instead of a table
    #[arg(long)]
    pub(crate) csv: bool,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Residency to allocate for the synthetic cohort
    #[arg(long, default_value = "r3")]
    pub(crate) residency: ResidencyCode,
}

const DEMO_COMPANIES: [(i64, &str); 5] = [
    (1, "Harbour Analytics"),
    (2, "Lough Systems"),
    (3, "Shannon Robotics"),
    (4, "Burren Health"),
    (5, "Liffey Payments"),
];

const DEMO_FIRST_NAMES: [&str; 8] = [
    "Aoife", "Cian", "Eimear", "Fionn", "Grainne", "Oisin", "Saoirse", "Tadhg",
];

const DEMO_LAST_NAMES: [&str; 8] = [
    "Byrne", "Doyle", "Flynn", "Hayes", "Kane", "Lynch", "Moran", "Walsh",
];

/// Jobs per residency tag: `(tag, titles)`.
const DEMO_JOBS: [(ResidencyCode, &[&str]); 6] = [
    (ResidencyCode::R1, &["Support Intern", "QA Intern", "Web Intern"]),
    (ResidencyCode::R1R2, &["Graduate Rotation"]),
    (ResidencyCode::R2, &["Design Intern", "Ops Intern"]),
    (ResidencyCode::R3, &["Platform Intern", "Data Intern", "Firmware Intern", "Mobile Intern"]),
    (ResidencyCode::R4, &["Backend Engineer", "ML Engineer", "Security Analyst"]),
    (ResidencyCode::R5, &["Embedded Engineer", "Cloud Engineer", "Product Analyst"]),
];

const STUDENTS_PER_YEAR: i64 = 8;
const PREFERENCES_PER_STUDENT: usize = 5;

fn open_configured_service(
) -> Result<InterviewAllocationService<SqliteAllocationStore>, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let store = open_store(&config.database)?;
    Ok(InterviewAllocationService::new(Arc::new(store)))
}

pub(crate) fn run_allocate(args: AllocateArgs) -> Result<(), AppError> {
    let service = open_configured_service()?;
    let run = service.run_allocation(args.residency)?;
    render_run(&run);
    Ok(())
}

pub(crate) fn run_allocations(args: AllocationsArgs) -> Result<(), AppError> {
    let service = open_configured_service()?;
    let views = service.fetch_allocations(args.residency)?;

    if args.csv {
        write_allocations_csv(&views, std::io::stdout().lock())?;
        return Ok(());
    }

    println!("Allocations for {} ({} rows)", args.residency, views.len());
    for view in &views {
        println!(
            "- {} {} {} -> job {} {}",
            view.student_number, view.first_name, view.last_name, view.job_id, view.job_title
        );
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let store = SqliteAllocationStore::open_in_memory()?;
    let service = InterviewAllocationService::new(Arc::new(store));
    seed_demo_cohort(&service)?;

    println!("Interview allocation demo");
    let run = service.run_allocation(args.residency)?;
    render_run(&run);

    if let AllocationRun::Completed(_) = run {
        render_job_fill(&service.job_fill(args.residency)?);
        render_student_fill(&service.student_fill(args.residency)?);
    }
    Ok(())
}

/// Seeds companies, jobs for every residency tag and a ranked cohort for every year.
pub(crate) fn seed_demo_cohort(
    service: &InterviewAllocationService<SqliteAllocationStore>,
) -> Result<(), AppError> {
    let store = service.store();
    for (id, name) in DEMO_COMPANIES {
        store.insert_company(CompanyId(id), name)?;
    }

    let mut job_id: i64 = 100;
    for (residency, titles) in DEMO_JOBS {
        for title in titles {
            job_id += 1;
            let company = DEMO_COMPANIES[job_id as usize % DEMO_COMPANIES.len()].0;
            store.insert_job(&NewJob {
                job_id: JobId(job_id),
                company_id: CompanyId(company),
                title: (*title).to_string(),
                position_count: 1 + (job_id % 2) as u32,
                residency,
                approval: Approval::Approved,
            })?;
        }
    }

    for year in [
        YearGroup::First,
        YearGroup::Second,
        YearGroup::Third,
        YearGroup::Fourth,
    ] {
        let rankable = service.jobs_to_rank(year_target(year))?;
        let mut ranked: Vec<JobId> = rankable.iter().map(|job| job.job_id).collect();
        if year == YearGroup::First {
            ranked.extend(
                service
                    .jobs_to_rank(ResidencyCode::R2)?
                    .iter()
                    .map(|job| job.job_id),
            );
        }

        for index in 0..STUDENTS_PER_YEAR {
            let number = StudentNumber(i64::from(year.number()) * 1000 + index + 1);
            let name = index as usize % DEMO_FIRST_NAMES.len();
            store.insert_student(&NewStudent {
                student_number: number,
                first_name: DEMO_FIRST_NAMES[name].to_string(),
                last_name: DEMO_LAST_NAMES[(name + year.number() as usize) % DEMO_LAST_NAMES.len()]
                    .to_string(),
                year,
                class_rank: (index * 3) % STUDENTS_PER_YEAR + 1,
            })?;

            let entries: Vec<PreferenceEntry> = ranked
                .iter()
                .cycle()
                .skip(index as usize % ranked.len().max(1))
                .take(PREFERENCES_PER_STUDENT.min(ranked.len()))
                .enumerate()
                .map(|(position, job_id)| PreferenceEntry {
                    job_id: *job_id,
                    preference: position as u32 + 1,
                })
                .collect();
            service.submit_preferences(number, &entries)?;
        }
    }

    Ok(())
}

/// Residency whose pool offers the jobs a year ranks first.
fn year_target(year: YearGroup) -> ResidencyCode {
    match year {
        YearGroup::First => ResidencyCode::R1,
        YearGroup::Second => ResidencyCode::R3,
        YearGroup::Third => ResidencyCode::R4,
        YearGroup::Fourth => ResidencyCode::R5,
    }
}

fn render_run(run: &AllocationRun) {
    match run {
        AllocationRun::Completed(summary) => render_summary(summary),
        AllocationRun::Rejected(report) => render_rejection(report),
    }
}

fn render_summary(summary: &AllocationSummary) {
    println!(
        "Allocation for {} ({}) completed at {}",
        summary.residency,
        summary.year,
        summary.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("- {} prior rows cleared", summary.cleared_rows);
    println!(
        "- {} jobs | {} students considered",
        summary.jobs_considered, summary.students_considered
    );
    println!(
        "- {} interviews allocated | {} students without an interview",
        summary.interviews_allocated, summary.students_without_interviews
    );
}

fn render_rejection(report: &EligibilityReport) {
    println!(
        "Allocation for {} rejected: {} {} students have not ranked any job",
        report.residency,
        report.missing.len(),
        report.year
    );
    for student in &report.missing {
        println!("  - student {}", student);
    }
}

fn render_job_fill(jobs: &[JobFill]) {
    println!("\nJob fill");
    for job in jobs {
        println!(
            "- job {} {} (company {}): {}/{}{}",
            job.job_id,
            job.title,
            job.company_id.0,
            job.filled,
            job.interview_capacity,
            if job.is_full { " full" } else { "" }
        );
    }
}

fn render_student_fill(students: &[StudentFill]) {
    println!("\nStudent fill (by class rank)");
    for student in students {
        println!(
            "- #{} student {}: {} interviews",
            student.class_rank, student.student_number, student.interviews
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_cohort_allocates_every_residency() {
        let store = SqliteAllocationStore::open_in_memory().expect("store opens");
        let service = InterviewAllocationService::new(Arc::new(store));
        seed_demo_cohort(&service).expect("cohort seeded");

        for residency in [
            ResidencyCode::R1,
            ResidencyCode::R2,
            ResidencyCode::R3,
            ResidencyCode::R4,
            ResidencyCode::R5,
        ] {
            let run = service.run_allocation(residency).expect("run succeeds");
            let AllocationRun::Completed(summary) = run else {
                panic!("demo cohort for {residency} should be eligible");
            };
            assert_eq!(summary.students_considered, STUDENTS_PER_YEAR as usize);
            assert!(summary.interviews_allocated > 0);
        }
    }
}
