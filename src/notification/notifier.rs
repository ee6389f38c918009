use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{DiscussionEvent, EventType};
use crate::config::NotificationConfig;
use crate::discussion::{Report, ReportSink};
use crate::error::Result;

#[derive(Clone)]
pub struct Notifier {
    config: NotificationConfig,
    logs_dir: Option<PathBuf>,
}

impl Notifier {
    pub fn new(config: NotificationConfig, logs_dir: Option<PathBuf>) -> Self {
        Self { config, logs_dir }
    }

    pub fn disabled() -> Self {
        Self::new(
            NotificationConfig {
                enabled: false,
                ..Default::default()
            },
            None,
        )
    }

    pub async fn notify(&self, event: &DiscussionEvent) {
        if !self.config.enabled {
            return;
        }

        if self.config.desktop && event.event_type.is_desktop_worthy() {
            self.send_desktop_notification(event).await;
        }

        if self.config.event_log {
            self.write_event_log(event).await;
        }

        if let Some(hook) = &self.config.hook_command {
            self.run_hook(hook, event).await;
        }
    }

    async fn send_desktop_notification(&self, event: &DiscussionEvent) {
        let title = event.title();
        let body = event.body();

        #[cfg(target_os = "macos")]
        {
            let script = format!(
                r#"display notification "{}" with title "{}""#,
                body.replace('"', r#"\""#).replace('\n', " "),
                title.replace('"', r#"\""#)
            );

            if let Err(e) = Command::new("osascript").args(["-e", &script]).output().await {
                debug!(error = %e, "Failed to send desktop notification");
            }
        }

        #[cfg(target_os = "linux")]
        {
            if let Err(e) = Command::new("notify-send").args([&title, &body]).output().await {
                debug!(error = %e, "Failed to send desktop notification");
            }
        }

        #[cfg(not(any(target_os = "macos", target_os = "linux")))]
        {
            debug!(title = %title, body = %body, "Desktop notifications unsupported on this platform");
        }
    }

    async fn write_event_log(&self, event: &DiscussionEvent) {
        let Some(logs_dir) = &self.logs_dir else {
            return;
        };

        let log_path = logs_dir.join(format!("{}.log", event.log_name()));
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let log_line = format!(
            "[{}] {}: {}\n",
            timestamp,
            event.event_type.as_str(),
            event.message.as_deref().unwrap_or("")
        );

        if let Err(e) = tokio::fs::create_dir_all(logs_dir).await {
            warn!(error = %e, "Failed to create logs directory");
            return;
        }

        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .await;

        match result {
            Ok(mut file) => {
                if let Err(e) = file.write_all(log_line.as_bytes()).await {
                    warn!(error = %e, "Failed to write event log");
                }
            }
            Err(e) => {
                warn!(error = %e, path = %log_path.display(), "Failed to open event log");
            }
        }
    }

    async fn run_hook(&self, hook_cmd: &str, event: &DiscussionEvent) {
        let Ok(json) = serde_json::to_string(event) else {
            return;
        };

        let result = Command::new("sh")
            .args(["-c", hook_cmd])
            .env("DISCUSS_EVENT", event.event_type.as_str())
            .env(
                "DISCUSS_EVENT_THREAD",
                event.thread_id.map(|id| id.to_string()).unwrap_or_default(),
            )
            .env("DISCUSS_EVENT_JSON", &json)
            .output()
            .await;

        if let Err(e) = result {
            debug!(error = %e, hook = %hook_cmd, "Failed to run hook");
        }
    }
}

#[async_trait]
impl ReportSink for Notifier {
    fn name(&self) -> &str {
        "notification"
    }

    async fn deliver(&self, report: &Report) -> Result<()> {
        let event = DiscussionEvent::new(EventType::ReportDelivered, Some(report.thread.id))
            .with_message(format!(
                "{}: {} ({} contributions)",
                report.topic,
                report.termination.describe(),
                report.contribution_count()
            ));
        self.notify(&event).await;
        Ok(())
    }
}
