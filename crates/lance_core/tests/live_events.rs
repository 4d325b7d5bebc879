use std::sync::Once;

use lance_core::{
    decode_frame, DecodeError, EventKind, EventLog, MeshFeed, NodeStatus, PulseKind,
    FEED_DISPLAY_LIMIT,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(lance_logging::initialize_for_tests);
}

fn decode_into(log: &mut EventLog, frames: &[&str]) {
    for frame in frames {
        if let Ok(event) = decode_frame(frame) {
            log.append(event);
        }
    }
}

#[test]
fn log_length_counts_only_decoded_frames() {
    init_logging();
    let frames = [
        r#"{"type":"job_created","timestamp":"2024-05-01T10:00:00Z","data":{"title":"Launch kit"}}"#,
        "ping",
        r#"{"data":{"title":"no type"}}"#,
        r#"{"type":"","data":{}}"#,
        r#"{"type":"handoff","data":{"source_name":"Ada","target_name":"Bo"}}"#,
        r#"{"type":"mystery","timestamp":"2024-05-01T10:00:02Z"}"#,
    ];
    let mut log = EventLog::new();
    decode_into(&mut log, &frames);

    assert_eq!(log.len(), 3);
    let tags: Vec<&str> = log.entries().iter().map(|e| e.kind.tag()).collect();
    assert_eq!(tags, vec!["job_created", "handoff", "mystery"]);
}

#[test]
fn decode_failure_keeps_prior_entries() {
    init_logging();
    let mut log = EventLog::new();
    decode_into(
        &mut log,
        &[r#"{"type":"subtask_started","timestamp":"T1","data":{"title":"Draft copy"}}"#],
    );
    let before = log.entries().to_vec();

    decode_into(&mut log, &["{not json", r#"[1,2,3]"#]);

    assert_eq!(log.entries(), before.as_slice());
}

#[test]
fn decode_errors_are_classified() {
    assert!(matches!(decode_frame("{"), Err(DecodeError::Malformed(_))));
    assert!(matches!(
        decode_frame(r#"{"type":""}"#),
        Err(DecodeError::EmptyType)
    ));
}

#[test]
fn envelope_fields_are_kept() {
    let event = decode_frame(
        r#"{"id":"ev-1","type":"agent_status_changed","timestamp":"2024-05-01T10:00:00Z",
            "agent_id":"agent-7","data":{"status":"busy"}}"#,
    )
    .unwrap();

    assert_eq!(event.id.as_deref(), Some("ev-1"));
    assert_eq!(event.agent_id.as_deref(), Some("agent-7"));
    assert_eq!(event.timestamp, "2024-05-01T10:00:00Z");
    assert_eq!(
        event.kind,
        EventKind::AgentStatusChanged {
            status: Some(NodeStatus::Busy)
        }
    );
}

#[test]
fn timeline_labels_match_event_payloads() {
    let cases = [
        (
            r#"{"type":"job_created","data":{"title":"Launch kit"}}"#,
            "Job created: Launch kit",
        ),
        (
            r#"{"type":"job_decomposed","data":{"subtask_count":3}}"#,
            "Decomposed into 3 subtasks",
        ),
        (
            r#"{"type":"job_decomposed","data":{"subtasks":[{"title":"A","skill":"writing"}]}}"#,
            "Decomposed into 1 subtasks",
        ),
        (
            r#"{"type":"subtask_assigned","data":{"skill":"voice","agent_name":"Echo"}}"#,
            "Echo assigned: voice",
        ),
        (
            r#"{"type":"subtask_completed","data":{"title":"Script","deliverable_type":"text"}}"#,
            "Script completed (text)",
        ),
        (
            r#"{"type":"subtask_failed","data":{"title":"Logo"}}"#,
            "Logo failed: unknown",
        ),
        (
            r#"{"type":"job_completed","data":{"deliverables_count":4}}"#,
            "Job completed! 4 deliverables",
        ),
        (
            r#"{"type":"job_failed","data":{"failed_subtasks":["Logo","Jingle"]}}"#,
            r#"Job failed: ["Logo","Jingle"]"#,
        ),
        (
            r#"{"type":"job_failed","data":{"error":"budget exceeded"}}"#,
            "Job failed: budget exceeded",
        ),
        (r#"{"type":"quota_warning"}"#, "quota_warning"),
    ];

    for (frame, expected) in cases {
        let event = decode_frame(frame).unwrap();
        assert_eq!(event.kind.timeline_label(), expected, "frame {frame}");
    }
}

#[test]
fn mesh_feed_shows_started_then_handoff_with_one_pulse_each() {
    init_logging();
    let mut feed = MeshFeed::new();
    let mut pulses = Vec::new();

    feed.append(
        decode_frame(
            r#"{"type":"subtask_started","timestamp":"T1","agent_id":"a1","data":{"title":"Voiceover"}}"#,
        )
        .unwrap(),
    );
    pulses.extend(feed.take_pulse());
    feed.append(
        decode_frame(
            r#"{"type":"handoff","timestamp":"T2","source_agent_id":"a1","target_agent_id":"a2",
                "data":{"source_name":"A","target_name":"B"}}"#,
        )
        .unwrap(),
    );
    pulses.extend(feed.take_pulse());
    pulses.extend(feed.take_pulse());

    let in_order: Vec<String> = feed
        .log()
        .entries()
        .iter()
        .map(|e| e.kind.timeline_label())
        .collect();
    assert_eq!(in_order, vec!["Voiceover started", "Handoff: A → B"]);

    let kinds: Vec<PulseKind> = pulses.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![PulseKind::SubtaskStarted, PulseKind::Handoff]);
    assert_eq!(pulses[0].source_agent_id.as_deref(), Some("a1"));
    assert_eq!(pulses[1].target_agent_id.as_deref(), Some("a2"));
    assert_eq!(pulses[1].sequence, 1);
}

#[test]
fn only_the_latest_pulse_survives_between_takes() {
    let mut feed = MeshFeed::new();
    for title in ["one", "two"] {
        feed.append(
            decode_frame(&format!(
                r#"{{"type":"subtask_started","data":{{"title":"{title}"}}}}"#
            ))
            .unwrap(),
        );
    }
    feed.append(decode_frame(r#"{"type":"job_created"}"#).unwrap());

    let pulse = feed.take_pulse().unwrap();
    assert_eq!(pulse.sequence, 1);
    assert!(feed.take_pulse().is_none());
}

#[test]
fn feed_window_is_newest_first_and_capped() {
    let mut feed = MeshFeed::new();
    for i in 0..(FEED_DISPLAY_LIMIT + 20) {
        feed.append(
            decode_frame(&format!(r#"{{"type":"job_created","timestamp":"t{i}"}}"#)).unwrap(),
        );
    }

    let recent: Vec<&str> = feed.recent().map(|e| e.timestamp.as_str()).collect();
    assert_eq!(recent.len(), FEED_DISPLAY_LIMIT);
    assert_eq!(recent[0], format!("t{}", FEED_DISPLAY_LIMIT + 19));
    assert_eq!(feed.log().len(), FEED_DISPLAY_LIMIT + 20);
    assert_eq!(feed.log().entries()[0].kind.feed_label(), "job created");
}
