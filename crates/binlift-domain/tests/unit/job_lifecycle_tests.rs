//! State-machine tests for the job entity.

use binlift_domain::entities::{FileRef, Job, JobSpec, JobStatus};
use binlift_domain::value_objects::JobId;

fn spec(owner: &str) -> JobSpec {
    JobSpec {
        owner: owner.to_owned(),
        file_ref: FileRef::Sha256("cd".repeat(32)),
        translation: None,
        priority: 0,
        idempotency_key: None,
    }
}

#[test]
fn new_jobs_are_queued_and_immediately_visible() {
    let job = Job::new(JobId::new(), &spec("u1"), "cd".repeat(32), 500);
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.visible_at, 500);
    assert_eq!(job.progress, 0.0);
    assert!(job.worker_id.is_none());
    assert!(!job.result_present);
}

#[test]
fn queued_jobs_cannot_complete_directly() {
    let job = Job::new(JobId::new(), &spec("u1"), "cd".repeat(32), 500);
    assert!(!job.can_transition_to(JobStatus::Completed));
    assert!(!job.can_transition_to(JobStatus::Failed));
    assert!(job.can_transition_to(JobStatus::Running));
    assert!(job.can_transition_to(JobStatus::Cancelled));
}

#[test]
fn every_terminal_state_is_frozen() {
    for terminal in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
        let mut job = Job::new(JobId::new(), &spec("u1"), "cd".repeat(32), 500);
        job.status = terminal;
        assert!(terminal.is_terminal());
        for next in [
            JobStatus::Queued,
            JobStatus::Running,
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
        ] {
            assert!(!job.can_transition_to(next), "{terminal} -> {next} must be illegal");
        }
    }
}

#[test]
fn status_column_values_round_trip() {
    for status in [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ] {
        assert_eq!(JobStatus::parse(status.as_str()).unwrap(), status);
    }
    assert!(JobStatus::parse("paused").is_err());
}
