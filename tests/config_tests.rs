use discuss_pilot::config::{DISCUSS_DIR, DiscussConfig, ExhaustedPolicy, ProjectPaths};

#[test]
fn test_default_config() {
    let config = DiscussConfig::default();

    assert_eq!(config.polling.interval_secs, 60);
    assert_eq!(config.polling.per_call_timeout_secs, 20);

    assert_eq!(config.retry.base_delay_secs, 30);
    assert_eq!(config.retry.max_delay_secs, 300);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.on_exhausted, ExhaustedPolicy::Persist);

    assert_eq!(config.session.max_monitoring_secs, 7200);
    assert!(!config.session.respond_to_self);
    assert!(config.session.checkpoint);

    assert_eq!(config.consensus.min_distinct_authors, 2);
    assert!(config.consensus.phrases.iter().any(|p| p == "I agree with"));

    assert_eq!(config.thread.title_prefix, "[discuss]");
    assert!((config.thread.match_threshold - 0.5).abs() < f64::EPSILON);
    assert!(config.thread.label.is_none());

    assert!(config.responder.command.is_none());
    assert!(config.report.json);

    // Notification config defaults
    assert!(config.notification.enabled);
    assert!(config.notification.desktop);
    assert!(config.notification.event_log);
    assert!(config.notification.hook_command.is_none());
}

#[test]
fn test_toml_sections_override_defaults() {
    let config: DiscussConfig = toml::from_str(
        r#"
        [session]
        max_monitoring_secs = 900
        respond_to_self = true

        [consensus]
        phrases = ["LGTM", "ship it"]
        min_distinct_authors = 3

        [responder]
        command = "./scripts/reply.sh"
        timeout_secs = 120
        "#,
    )
    .unwrap();

    assert_eq!(config.session.max_monitoring_secs, 900);
    assert!(config.session.respond_to_self);
    assert_eq!(config.consensus.phrases, vec!["LGTM", "ship it"]);
    assert_eq!(config.consensus.min_distinct_authors, 3);
    assert_eq!(config.responder.command.as_deref(), Some("./scripts/reply.sh"));
    assert_eq!(config.responder.timeout_secs, Some(120));
    // Untouched sections keep their defaults.
    assert_eq!(config.polling.interval_secs, 60);
    assert!(config.validate().is_ok());
}

#[test]
fn test_validation_collects_every_problem() {
    let mut config = DiscussConfig::default();
    config.polling.interval_secs = 0;
    config.thread.match_threshold = 1.5;
    config.responder.command = Some("   ".into());

    let err = config.validate().unwrap_err().to_string();
    assert!(err.contains("polling.interval_secs"));
    assert!(err.contains("thread.match_threshold"));
    assert!(err.contains("responder.command"));
}

#[test]
fn test_project_paths_layout() {
    let root = std::path::PathBuf::from("/work/widgets");
    let paths = ProjectPaths::new(root.clone(), &DiscussConfig::default());

    assert_eq!(paths.discuss_dir, root.join(DISCUSS_DIR));
    assert_eq!(paths.sessions_dir, root.join(DISCUSS_DIR).join("sessions"));
    assert_eq!(paths.reports_dir, root.join(DISCUSS_DIR).join("reports"));
    assert_eq!(paths.logs_dir, root.join(DISCUSS_DIR).join("logs"));
}

#[test]
fn test_absolute_report_dir_is_kept() {
    let mut config = DiscussConfig::default();
    config.report.dir = "/var/reports".into();
    let paths = ProjectPaths::new("/work/widgets".into(), &config);

    assert_eq!(paths.reports_dir, std::path::PathBuf::from("/var/reports"));
}

#[tokio::test]
async fn test_load_without_file_uses_defaults() {
    let dir = tempfile::TempDir::new().unwrap();
    let config = DiscussConfig::load(dir.path()).await.unwrap();
    assert_eq!(config.polling.interval_secs, 60);
}

#[tokio::test]
async fn test_load_rejects_invalid_file() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[consensus]\nmin_distinct_authors = 1\n",
    )
    .unwrap();

    assert!(DiscussConfig::load(dir.path()).await.is_err());
}
