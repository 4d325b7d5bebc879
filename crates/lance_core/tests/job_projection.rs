use std::sync::Once;

use lance_core::{
    decode_frame, Deliverable, Job, JobProjection, JobStatus, JobTimeline, MeshEvent, Subtask, SubtaskStatus,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(lance_logging::initialize_for_tests);
}

fn event(frame: &str) -> MeshEvent {
    decode_frame(frame).expect("test frame decodes")
}

fn job_with(status: JobStatus, subtasks: Vec<Subtask>) -> Job {
    Job {
        id: "job-1".to_string(),
        title: "Launch kit".to_string(),
        status,
        subtasks,
        ..Job::default()
    }
}

fn subtask(id: &str, title: &str, skill: &str, status: SubtaskStatus) -> Subtask {
    Subtask {
        id: id.to_string(),
        title: title.to_string(),
        required_skill: skill.to_string(),
        status,
        assigned_agent_id: None,
    }
}

#[test]
fn terminal_status_is_sticky_under_later_events() {
    init_logging();
    let mut timeline = JobTimeline::new("job-1");
    timeline.append(event(r#"{"type":"job_decomposed","data":{"subtask_count":1}}"#));
    timeline.append(event(r#"{"type":"job_failed","data":{"error":"boom"}}"#));
    assert_eq!(timeline.project_job().status, JobStatus::Failed);

    timeline.append(event(r#"{"type":"subtask_started","data":{"title":"Late"}}"#));
    timeline.append(event(r#"{"type":"job_decomposed"}"#));
    timeline.append(event(r#"{"type":"job_completed"}"#));

    assert_eq!(timeline.project_job().status, JobStatus::Failed);
}

#[test]
fn stale_fetch_cannot_undo_a_terminal_status() {
    init_logging();
    let mut timeline = JobTimeline::new("job-1");
    let refresh = timeline.append(event(r#"{"type":"job_completed","data":{"deliverables_count":2}}"#));
    assert!(refresh);

    let seq = timeline.next_request();
    timeline.apply_job(seq, job_with(JobStatus::InProgress, Vec::new()));

    assert_eq!(timeline.project_job().status, JobStatus::Completed);
    assert_eq!(timeline.log().len(), 1);
}

#[test]
fn refresh_is_requested_for_completion_events_only() {
    let mut timeline = JobTimeline::new("job-1");
    let frames = [
        (r#"{"type":"job_created"}"#, false),
        (r#"{"type":"subtask_started","data":{"title":"A"}}"#, false),
        (r#"{"type":"subtask_completed","data":{"title":"A"}}"#, true),
        (r#"{"type":"handoff"}"#, false),
        (r#"{"type":"job_failed"}"#, true),
    ];
    for (frame, expected) in frames {
        assert_eq!(timeline.append(event(frame)), expected, "frame {frame}");
    }
}

#[test]
fn decomposition_seeds_subtasks_that_events_then_advance() {
    let mut timeline = JobTimeline::new("job-1");
    timeline.append(event(
        r#"{"type":"job_decomposed","data":{"subtask_count":2,"subtasks":[
            {"title":"Script","skill":"writing"},{"title":"Voiceover","skill":"voice"}]}}"#,
    ));
    timeline.append(event(
        r#"{"type":"subtask_assigned","subtask_id":"st-2","data":{"skill":"voice","agent_name":"Echo"}}"#,
    ));
    timeline.append(event(
        r#"{"type":"subtask_started","subtask_id":"st-2","data":{"title":"Voiceover"}}"#,
    ));
    timeline.append(event(
        r#"{"type":"subtask_completed","data":{"title":"Script","deliverable_type":"text"}}"#,
    ));

    let projection = timeline.project_job();
    assert_eq!(projection.status, JobStatus::InProgress);
    assert_eq!(projection.subtasks.len(), 2);

    let script = &projection.subtasks[0];
    assert_eq!(script.status, SubtaskStatus::Completed);
    assert_eq!(script.agent_name, None);

    let voice = &projection.subtasks[1];
    assert_eq!(voice.id.as_deref(), Some("st-2"));
    assert_eq!(voice.agent_name.as_deref(), Some("Echo"));
    assert_eq!(voice.status, SubtaskStatus::InProgress);
}

#[test]
fn fetched_job_is_advanced_by_the_full_log() {
    init_logging();
    let mut timeline = JobTimeline::new("job-1");
    timeline.append(event(
        r#"{"type":"subtask_completed","subtask_id":"st-1","data":{"title":"Script"}}"#,
    ));
    let seq = timeline.next_request();
    timeline.apply_job(
        seq,
        job_with(
            JobStatus::InProgress,
            vec![
                subtask("st-1", "Script", "writing", SubtaskStatus::InProgress),
                subtask("st-2", "Logo", "image", SubtaskStatus::Pending),
            ],
        ),
    );

    let projection = timeline.project_job();
    assert_eq!(projection.subtasks[0].status, SubtaskStatus::Completed);
    assert_eq!(projection.subtasks[1].status, SubtaskStatus::Pending);
    assert_eq!(timeline.job().map(|j| j.title.as_str()), Some("Launch kit"));
}

#[test]
fn subtask_status_never_moves_backwards() {
    let base = job_with(
        JobStatus::InProgress,
        vec![subtask("st-1", "Script", "writing", SubtaskStatus::Completed)],
    );
    let events = [event(
        r#"{"type":"subtask_started","subtask_id":"st-1","data":{"title":"Script"}}"#,
    )];

    let projection = JobProjection::fold(Some(&base), events.iter());

    assert_eq!(projection.subtasks[0].status, SubtaskStatus::Completed);
}

#[test]
fn unknown_subtask_events_append_entries() {
    let events = [event(
        r#"{"type":"subtask_failed","subtask_id":"st-9","data":{"title":"Jingle","error":"timeout"}}"#,
    )];

    let projection = JobProjection::fold(None, events.iter());

    assert_eq!(projection.status, JobStatus::Pending);
    assert_eq!(projection.subtasks.len(), 1);
    assert_eq!(projection.subtasks[0].title, "Jingle");
    assert_eq!(projection.subtasks[0].status, SubtaskStatus::Failed);
}

fn deliverable(id: &str) -> Deliverable {
    Deliverable {
        id: id.to_string(),
        kind: "text".to_string(),
        ..Deliverable::default()
    }
}

#[test]
fn older_fetch_arriving_late_is_ignored() {
    init_logging();
    let mut timeline = JobTimeline::new("job-1");
    timeline.append(event(r#"{"type":"subtask_completed","data":{"title":"Script"}}"#));
    let first = timeline.next_request();
    timeline.append(event(r#"{"type":"job_completed","data":{"deliverables_count":2}}"#));
    let second = timeline.next_request();

    let mut fresh = job_with(JobStatus::Completed, Vec::new());
    fresh.deliverables = vec![deliverable("d1"), deliverable("d2")];
    let mut stale = job_with(JobStatus::InProgress, Vec::new());
    stale.deliverables = vec![deliverable("d1")];

    assert!(timeline.apply_job(second, fresh));
    assert!(!timeline.apply_job(first, stale));

    let job = timeline.job().unwrap();
    assert_eq!(job.deliverables.len(), 2);
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(timeline.project_job().status, JobStatus::Completed);
}
