//! Session driver: resolve the thread, open, monitor, report.
//!
//! ```text
//! Init -> ResolvingThread -> PostingInitial -> Monitoring -> Reporting -> Done
//! ```
//!
//! Monitoring ends on confirmed consensus, on the monitoring time limit, on
//! cancellation, or on an error that halts the session. Reporting runs in every case
//! once a thread is known.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior, interval, sleep_until};
use tracing::{debug, info, warn};

use super::checkpoint::{CursorStore, SessionCheckpoint};
use super::composer::ResponseComposer;
use super::consensus::{ConsensusDetector, ConsensusState};
use super::cursor::{Cursor, CursorTracker};
use super::investigator::ContextInvestigator;
use super::mentions::Mention;
use super::parser::{CommentBatchParser, ParsedComment};
use super::report::{Report, ReportGenerator, ReportSink, TerminationReason};
use super::responder::{Phase, ResponseRequest, Responder, SilentResponder};
use crate::config::DiscussConfig;
use crate::error::{DiscussError, Result};
use crate::identity::AgentIdentity;
use crate::notification::{DiscussionEvent, EventType, Notifier};
use crate::retry::{DegradedHook, RetryError, RetryPolicy};
use crate::signal::SignalHandler;
use crate::thread::{
    Comment, CommentPoller, ResolveOutcome, ThreadHandle, ThreadId, ThreadLocator, ThreadPoster,
    ThreadService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Init,
    ResolvingThread,
    PostingInitial,
    Monitoring,
    Reporting,
    Done,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Init => "init",
            Self::ResolvingThread => "resolving_thread",
            Self::PostingInitial => "posting_initial",
            Self::Monitoring => "monitoring",
            Self::Reporting => "reporting",
            Self::Done => "done",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub topic: String,
    pub thread: Option<ThreadId>,
    /// Used verbatim as the opening message instead of asking the responder.
    pub opening_message: Option<String>,
}

impl SessionRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            thread: None,
            opening_message: None,
        }
    }

    pub fn with_thread(mut self, thread: Option<ThreadId>) -> Self {
        self.thread = thread;
        self
    }

    pub fn with_opening_message(mut self, message: Option<String>) -> Self {
        self.opening_message = message;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub thread: ThreadHandle,
    pub resolution: ResolveOutcome,
    pub consensus: ConsensusState,
    pub termination: TerminationReason,
    pub report: Report,
    pub comments_seen: usize,
    pub messages_posted: usize,
    pub resumed: bool,
}

impl SessionOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self.termination, TerminationReason::Failed(_))
    }
}

pub struct DiscussionSession {
    identity: AgentIdentity,
    config: DiscussConfig,
    service: Arc<dyn ThreadService>,
    retry: RetryPolicy,
    investigator: Option<ContextInvestigator>,
    responder: Arc<dyn Responder>,
    sinks: Vec<Arc<dyn ReportSink>>,
    store: Option<CursorStore>,
    notifier: Notifier,
    signal: SignalHandler,
    phase: SessionPhase,
}

impl DiscussionSession {
    pub fn new(
        identity: AgentIdentity,
        config: DiscussConfig,
        service: Arc<dyn ThreadService>,
        signal: SignalHandler,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        Self {
            identity,
            config,
            service,
            retry,
            investigator: None,
            responder: Arc::new(SilentResponder),
            sinks: Vec::new(),
            store: None,
            notifier: Notifier::disabled(),
            signal,
            phase: SessionPhase::Init,
        }
    }

    /// Replace the retry policy; the session's signal and degraded hook are applied on top.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_investigator(mut self, investigator: ContextInvestigator) -> Self {
        self.investigator = Some(investigator);
        self
    }

    pub fn with_responder(mut self, responder: Arc<dyn Responder>) -> Self {
        self.responder = responder;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_store(mut self, store: CursorStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    fn enter(&mut self, phase: SessionPhase) {
        debug!(from = %self.phase, to = %phase, "Session phase");
        self.phase = phase;
    }

    fn session_retry(&self) -> RetryPolicy {
        let notifier = self.notifier.clone();
        let hook: DegradedHook = Arc::new(move |notice| {
            let notifier = notifier.clone();
            let event = DiscussionEvent::new(EventType::ConnectivityDegraded, None).with_message(
                format!(
                    "{} failed {} times in a row ({}); retrying every {}s",
                    notice.operation,
                    notice.attempts,
                    notice.last_error,
                    notice.next_delay.as_secs()
                ),
            );
            tokio::spawn(async move { notifier.notify(&event).await });
        });
        self.retry
            .clone()
            .with_signal(self.signal.clone())
            .with_degraded_hook(hook)
    }

    pub async fn run(&mut self, request: SessionRequest) -> Result<SessionOutcome> {
        let retry = self.session_retry();

        self.enter(SessionPhase::ResolvingThread);
        let locator = ThreadLocator::new(
            Arc::clone(&self.service),
            retry.clone(),
            self.config.thread.clone(),
        );
        let resolution = locator
            .resolve(&request.topic, request.thread, &self.identity)
            .await?;
        let handle = resolution.handle.clone();
        self.announce_resolution(&handle, &resolution.outcome).await;

        let checkpoint = self.load_checkpoint(handle.id).await;
        let resumed = checkpoint.is_some();
        let mut cursor = checkpoint
            .as_ref()
            .map(|c| c.cursor.clone())
            .unwrap_or_default();
        let mut detector = ConsensusDetector::new(&self.config.consensus);
        if let Some(c) = &checkpoint {
            detector = detector.with_state(c.consensus_state);
            info!(thread = handle.id, consensus = %c.consensus_state, "Resuming from checkpoint");
        }

        let parser = CommentBatchParser::new(self.identity.clone(), &self.config.mentions);
        let mut poster = ThreadPoster::new(Arc::clone(&self.service), retry.clone());
        let mut poller = CommentPoller::new(Arc::clone(&self.service), retry);
        let mut latest: Vec<Comment> = Vec::new();
        let mut comments_seen = 0usize;
        let mut messages_posted = 0usize;

        let mut opening_failure = None;
        if !resumed {
            self.enter(SessionPhase::PostingInitial);
            let opening = self.opening_message(&request, &handle, &detector).await;
            let body = ResponseComposer::compose(&opening, &self.identity, Utc::now());
            match poster.post(&handle, &body).await {
                Ok(_) => messages_posted += 1,
                Err(e) => opening_failure = Some(halt_reason(e)),
            }
        }

        let termination = match opening_failure {
            Some(reason) => reason,
            None if detector.state().is_confirmed() => {
                info!(thread = handle.id, "Consensus already confirmed, not monitoring again");
                match poller.poll(&handle).await {
                    Ok(all) => latest = all,
                    Err(e) => {
                        let err = DiscussError::from(e);
                        warn!(thread = handle.id, error = %err, "Could not fetch comments for the report");
                    }
                }
                TerminationReason::ConsensusConfirmed
            }
            None => {
                self.enter(SessionPhase::Monitoring);
                self.monitor(
                    &request.topic,
                    &handle,
                    &parser,
                    &mut detector,
                    &mut cursor,
                    &mut poller,
                    &mut poster,
                    &mut latest,
                    &mut comments_seen,
                    &mut messages_posted,
                )
                .await
            }
        };

        self.enter(SessionPhase::Reporting);
        self.save_checkpoint(&handle, &request.topic, &cursor, detector.state())
            .await;
        self.announce_termination(&handle, &termination).await;

        let all = parser.parse_batch(&latest);
        let report = ReportGenerator::new(&self.config.consensus).generate(
            &all,
            detector.state(),
            detector.signals(),
            &self.identity,
            &handle,
            &request.topic,
            termination.clone(),
        );
        for sink in &self.sinks {
            if let Err(e) = sink.deliver(&report).await {
                warn!(sink = sink.name(), error = %e, "Report delivery failed");
            }
        }

        self.enter(SessionPhase::Done);
        Ok(SessionOutcome {
            thread: handle,
            resolution: resolution.outcome,
            consensus: detector.state(),
            termination,
            report,
            comments_seen,
            messages_posted,
            resumed,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn monitor(
        &self,
        topic: &str,
        handle: &ThreadHandle,
        parser: &CommentBatchParser,
        detector: &mut ConsensusDetector,
        cursor: &mut Cursor,
        poller: &mut CommentPoller,
        poster: &mut ThreadPoster,
        latest: &mut Vec<Comment>,
        comments_seen: &mut usize,
        messages_posted: &mut usize,
    ) -> TerminationReason {
        let deadline = Instant::now() + self.config.session.max_monitoring();
        let mut ticker = interval(self.config.polling.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            thread = handle.id,
            interval_secs = self.config.polling.interval_secs,
            limit_secs = self.config.session.max_monitoring_secs,
            "Monitoring thread"
        );

        loop {
            tokio::select! {
                biased;
                _ = self.signal.cancelled() => return TerminationReason::Cancelled,
                _ = sleep_until(deadline) => return TerminationReason::TimedOut,
                _ = ticker.tick() => {}
            }

            // A read may be abandoned at the deadline; posts are never raced.
            let polled = tokio::select! {
                polled = poller.poll(handle) => polled,
                _ = sleep_until(deadline) => return TerminationReason::TimedOut,
            };
            let all = match polled {
                Ok(all) => all,
                Err(e) => return halt_reason(e),
            };

            let batch = CursorTracker::batch(&all, cursor);
            *latest = all;
            if batch.is_empty() {
                debug!(thread = handle.id, "No new comments");
                continue;
            }

            let parsed = parser.parse_batch(&batch.comments);
            *comments_seen += batch.comments.len();
            info!(
                thread = handle.id,
                new = batch.comments.len(),
                from_others = parsed.iter().filter(|p| !p.is_self).count(),
                "New comments"
            );

            if let Some(transition) = detector.observe(&parsed) {
                self.announce_consensus(handle, transition.to).await;
            }

            let mut halted = None;
            if !detector.state().is_confirmed()
                && let Some(body) = self.reply(topic, handle, &parsed, detector.state()).await
            {
                match poster.post(handle, &body).await {
                    Ok(_) => *messages_posted += 1,
                    Err(e) => halted = Some(halt_reason(e)),
                }
            }

            // The batch has been handled (a failed reply is not retried on the next poll).
            cursor.advance(&batch.cursor);
            self.save_checkpoint(handle, topic, cursor, detector.state())
                .await;

            if let Some(reason) = halted {
                return reason;
            }
            if detector.state().is_confirmed() {
                return TerminationReason::ConsensusConfirmed;
            }
        }
    }

    /// Ask the responder for a reply to the other participants' comments. Returns the signed body.
    async fn reply(
        &self,
        topic: &str,
        handle: &ThreadHandle,
        parsed: &[ParsedComment],
        consensus: ConsensusState,
    ) -> Option<String> {
        let respond_to_self = self.config.session.respond_to_self;
        let relevant: Vec<ParsedComment> = parsed
            .iter()
            .filter(|p| respond_to_self || !p.is_self)
            .cloned()
            .collect();
        if relevant.is_empty() {
            return None;
        }

        let contexts = match &self.investigator {
            Some(investigator) => {
                let mentions: Vec<&Mention> =
                    relevant.iter().flat_map(|p| p.mentions.iter()).collect();
                investigator.investigate_all(mentions).await
            }
            None => Vec::new(),
        };

        let request = ResponseRequest {
            phase: Phase::Reply,
            thread_id: handle.id,
            topic: topic.to_string(),
            comments: relevant,
            contexts,
            consensus,
        };

        match self.responder.respond(&request).await {
            Ok(Some(body)) => Some(ResponseComposer::compose(&body, &self.identity, Utc::now())),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Responder failed; not replying to this batch");
                None
            }
        }
    }

    async fn opening_message(
        &self,
        request: &SessionRequest,
        handle: &ThreadHandle,
        detector: &ConsensusDetector,
    ) -> String {
        if let Some(message) = request.opening_message.as_deref().map(str::trim)
            && !message.is_empty()
        {
            return message.to_string();
        }

        let ask = ResponseRequest {
            phase: Phase::Opening,
            thread_id: handle.id,
            topic: request.topic.clone(),
            comments: Vec::new(),
            contexts: Vec::new(),
            consensus: detector.state(),
        };
        match self.responder.respond(&ask).await {
            Ok(Some(body)) => body,
            Ok(None) => self.introduction(&request.topic),
            Err(e) => {
                warn!(error = %e, "Responder failed on opening; using generated introduction");
                self.introduction(&request.topic)
            }
        }
    }

    fn introduction(&self, topic: &str) -> String {
        format!(
            "Joining the discussion on **{}** from `{}` (branch `{}`). \
             I will follow this thread and look into any files or functions mentioned here.",
            topic.trim(),
            self.identity.hostname,
            self.identity.branch
        )
    }

    async fn load_checkpoint(&self, thread_id: ThreadId) -> Option<SessionCheckpoint> {
        let store = self.store.as_ref().filter(|_| self.config.session.checkpoint)?;
        if let Err(e) = store.init().await {
            warn!(error = %e, "Checkpoint directory unavailable");
            return None;
        }
        match store.load(thread_id).await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                warn!(thread = thread_id, error = %e, "Unreadable checkpoint, starting fresh");
                None
            }
        }
    }

    async fn save_checkpoint(
        &self,
        handle: &ThreadHandle,
        topic: &str,
        cursor: &Cursor,
        consensus: ConsensusState,
    ) {
        let Some(store) = self.store.as_ref().filter(|_| self.config.session.checkpoint) else {
            return;
        };
        let checkpoint = SessionCheckpoint::new(handle.id, topic, cursor.clone(), consensus);
        if let Err(e) = store.save(&checkpoint).await {
            warn!(thread = handle.id, error = %e, "Failed to persist checkpoint");
        }
    }

    async fn announce_resolution(&self, handle: &ThreadHandle, outcome: &ResolveOutcome) {
        let message = match outcome {
            ResolveOutcome::Explicit => format!("Joined #{} {}", handle.id, handle.title),
            ResolveOutcome::Matched { similarity_pct } => {
                format!("Joined matching #{} {} ({}% match)", handle.id, handle.title, similarity_pct)
            }
            ResolveOutcome::Created => format!("Created #{} {}", handle.id, handle.title),
            ResolveOutcome::Reconciled { closed } => {
                let event = DiscussionEvent::new(EventType::ThreadConflict, Some(handle.id))
                    .with_message(format!("Closed duplicate #{} in favour of #{}", closed, handle.id));
                self.notifier.notify(&event).await;
                format!("Joined #{} {} after closing duplicate #{}", handle.id, handle.title, closed)
            }
        };
        let event =
            DiscussionEvent::new(EventType::ThreadResolved, Some(handle.id)).with_message(message);
        self.notifier.notify(&event).await;
    }

    async fn announce_consensus(&self, handle: &ThreadHandle, state: ConsensusState) {
        let event_type = match state {
            ConsensusState::ConsensusSuggested => EventType::ConsensusSuggested,
            ConsensusState::ConsensusConfirmed => EventType::ConsensusConfirmed,
            ConsensusState::Discussing => return,
        };
        self.notifier
            .notify(&DiscussionEvent::new(event_type, Some(handle.id)).with_message(handle.title.clone()))
            .await;
    }

    async fn announce_termination(&self, handle: &ThreadHandle, reason: &TerminationReason) {
        let event_type = match reason {
            TerminationReason::TimedOut => EventType::SessionTimedOut,
            TerminationReason::Cancelled => EventType::SessionCancelled,
            TerminationReason::ConsensusConfirmed | TerminationReason::Failed(_) => return,
        };
        self.notifier
            .notify(&DiscussionEvent::new(event_type, Some(handle.id)).with_message(reason.describe()))
            .await;
    }
}

fn halt_reason(err: RetryError) -> TerminationReason {
    match err {
        RetryError::Cancelled { .. } => TerminationReason::Cancelled,
        other => {
            let err = DiscussError::from(other);
            warn!(error = %err, "Session halted");
            TerminationReason::Failed(err.to_string())
        }
    }
}
