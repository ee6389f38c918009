use discuss_pilot::config::NotificationConfig;
use discuss_pilot::notification::{DiscussionEvent, EventType, Notifier};

#[test]
fn test_event_type_as_str() {
    assert_eq!(EventType::ThreadResolved.as_str(), "thread.resolved");
    assert_eq!(EventType::ThreadConflict.as_str(), "thread.conflict");
    assert_eq!(EventType::ConsensusSuggested.as_str(), "consensus.suggested");
    assert_eq!(EventType::ConsensusConfirmed.as_str(), "consensus.confirmed");
    assert_eq!(
        EventType::ConnectivityDegraded.as_str(),
        "connectivity.degraded"
    );
    assert_eq!(EventType::SessionTimedOut.as_str(), "session.timed_out");
    assert_eq!(EventType::SessionCancelled.as_str(), "session.cancelled");
    assert_eq!(EventType::ReportDelivered.as_str(), "report.delivered");
}

#[test]
fn test_event_type_is_error() {
    assert!(EventType::ThreadConflict.is_error());
    assert!(EventType::ConnectivityDegraded.is_error());

    assert!(!EventType::ConsensusConfirmed.is_error());
    assert!(!EventType::SessionTimedOut.is_error());
}

#[test]
fn test_routine_events_skip_desktop() {
    assert!(!EventType::ThreadResolved.is_desktop_worthy());
    assert!(!EventType::ReportDelivered.is_desktop_worthy());
    assert!(EventType::ConsensusConfirmed.is_desktop_worthy());
}

#[test]
fn test_event_creation() {
    let event = DiscussionEvent::new(EventType::ThreadResolved, Some(7));

    assert_eq!(event.event_type, EventType::ThreadResolved);
    assert_eq!(event.thread_id, Some(7));
    assert!(event.message.is_none());
    assert_eq!(event.log_name(), "thread-7");
}

#[test]
fn test_event_title_and_body() {
    let event = DiscussionEvent::new(EventType::ConsensusConfirmed, Some(12))
        .with_message("Refactor the query cache layer");

    assert!(event.title().contains("discuss-pilot"));
    assert!(event.title().contains("consensus.confirmed"));
    assert_eq!(event.body(), "Thread: #12\nRefactor the query cache layer");
}

#[test]
fn test_threadless_event_logs_to_session() {
    let event = DiscussionEvent::new(EventType::ConnectivityDegraded, None);
    assert_eq!(event.log_name(), "session");
    assert_eq!(event.body(), "");
}

#[test]
fn test_event_serialization() {
    let event = DiscussionEvent::new(EventType::SessionCancelled, Some(3));
    let json = serde_json::to_string(&event).unwrap();

    assert!(json.contains("\"event_type\":\"session_cancelled\""));
    assert!(!json.contains("message"));
}

fn log_only() -> NotificationConfig {
    NotificationConfig {
        enabled: true,
        desktop: false,
        event_log: true,
        hook_command: None,
    }
}

#[tokio::test]
async fn test_event_log_appends_per_thread() {
    let dir = tempfile::TempDir::new().unwrap();
    let logs = dir.path().join("logs");
    let notifier = Notifier::new(log_only(), Some(logs.clone()));

    notifier
        .notify(&DiscussionEvent::new(EventType::ThreadResolved, Some(4)).with_message("Created #4"))
        .await;
    notifier
        .notify(&DiscussionEvent::new(EventType::ConsensusSuggested, Some(4)))
        .await;

    let content = std::fs::read_to_string(logs.join("thread-4.log")).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with("thread.resolved: Created #4"));
    assert!(lines[1].contains("consensus.suggested"));
}

#[tokio::test]
async fn test_disabled_notifier_writes_nothing() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = NotificationConfig {
        enabled: false,
        ..log_only()
    };
    let notifier = Notifier::new(config, Some(dir.path().to_path_buf()));

    notifier
        .notify(&DiscussionEvent::new(EventType::SessionTimedOut, Some(1)))
        .await;

    assert!(!dir.path().join("thread-1.log").exists());
}

#[tokio::test]
async fn test_hook_receives_event_environment() {
    let dir = tempfile::TempDir::new().unwrap();
    let out = dir.path().join("hook.out");
    let config = NotificationConfig {
        enabled: true,
        desktop: false,
        event_log: false,
        hook_command: Some(format!(
            "echo \"$DISCUSS_EVENT $DISCUSS_EVENT_THREAD\" > {}",
            out.display()
        )),
    };

    Notifier::new(config, None)
        .notify(&DiscussionEvent::new(EventType::ThreadConflict, Some(9)))
        .await;

    let content = std::fs::read_to_string(&out).unwrap();
    assert_eq!(content.trim(), "thread.conflict 9");
}
