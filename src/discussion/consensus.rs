//! Forward-only consensus state machine over parsed comments.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::parser::ParsedComment;
use crate::config::ConsensusConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusState {
    #[default]
    Discussing,
    ConsensusSuggested,
    ConsensusConfirmed,
}

impl ConsensusState {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::ConsensusConfirmed)
    }
}

impl fmt::Display for ConsensusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discussing => "discussing",
            Self::ConsensusSuggested => "consensus suggested",
            Self::ConsensusConfirmed => "consensus confirmed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusSignal {
    /// Speaker key: signature hostname, else account login.
    pub author: String,
    pub comment_id: String,
    pub phrase: String,
    pub is_self: bool,
}

/// State change produced by a single `observe` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ConsensusState,
    pub to: ConsensusState,
}

pub struct ConsensusDetector {
    phrases: Vec<String>,
    min_distinct_authors: usize,
    state: ConsensusState,
    signals: Vec<ConsensusSignal>,
}

impl ConsensusDetector {
    pub fn new(config: &ConsensusConfig) -> Self {
        Self {
            phrases: config.phrases.iter().map(|p| p.to_lowercase()).collect(),
            min_distinct_authors: config.min_distinct_authors.max(2),
            state: ConsensusState::Discussing,
            signals: Vec::new(),
        }
    }

    /// Resume from a checkpoint. The state never regresses, but signals are not persisted,
    /// so a resumed `ConsensusSuggested` session needs fresh agreement to confirm.
    pub fn with_state(mut self, state: ConsensusState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> ConsensusState {
        self.state
    }

    pub fn signals(&self) -> &[ConsensusSignal] {
        &self.signals
    }

    /// Distinct speakers among other participants' signals. Our own agreement never counts
    /// toward the quorum.
    pub fn distinct_authors(&self) -> BTreeSet<&str> {
        self.signals
            .iter()
            .filter(|s| !s.is_self)
            .map(|s| s.author.as_str())
            .collect()
    }

    /// First configured phrase found in `text`, case-insensitively.
    pub fn match_phrase(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        self.phrases
            .iter()
            .find(|p| !p.is_empty() && lower.contains(p.as_str()))
            .map(String::as_str)
    }

    /// Scan a batch, record at most one signal per comment and advance the state.
    pub fn observe(&mut self, batch: &[ParsedComment]) -> Option<Transition> {
        let from = self.state;

        for parsed in batch {
            if self.signals.iter().any(|s| s.comment_id == parsed.comment.id) {
                continue;
            }
            let Some(phrase) = self.match_phrase(parsed.text()).map(str::to_string) else {
                continue;
            };
            debug!(
                author = parsed.speaker(),
                comment = %parsed.comment.id,
                phrase = %phrase,
                "Consensus signal"
            );
            self.signals.push(ConsensusSignal {
                author: parsed.speaker().to_string(),
                comment_id: parsed.comment.id.clone(),
                phrase,
                is_self: parsed.is_self,
            });
        }

        let authors = self.distinct_authors().len();
        let next = if authors >= self.min_distinct_authors {
            ConsensusState::ConsensusConfirmed
        } else if authors > 0 {
            ConsensusState::ConsensusSuggested
        } else {
            ConsensusState::Discussing
        };

        if next > self.state {
            self.state = next;
            info!(from = %from, to = %next, authors, "Consensus advanced");
        }

        (self.state != from).then_some(Transition {
            from,
            to: self.state,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::discussion::mentions::Signature;
    use crate::thread::Comment;

    fn parsed(id: &str, author: &str, host: Option<&str>, is_self: bool, body: &str) -> ParsedComment {
        let ts = Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap() + Duration::seconds(id.len() as i64);
        ParsedComment {
            comment: Comment::new(id, author, body, ts),
            is_self,
            mentions: Vec::new(),
            signature: host.map(|h| Signature {
                hostname: h.to_string(),
                branch: Some("main".into()),
                timestamp: None,
            }),
        }
    }

    fn detector() -> ConsensusDetector {
        ConsensusDetector::new(&ConsensusConfig::default())
    }

    #[test]
    fn test_single_author_never_confirms() {
        let mut d = detector();
        d.observe(&[parsed("1", "bob", None, false, "I agree with the plan")]);
        d.observe(&[parsed("2", "bob", None, false, "The plan is to ship")]);
        assert_eq!(d.state(), ConsensusState::ConsensusSuggested);
    }

    #[test]
    fn test_self_only_signals_stay_discussing() {
        let mut d = detector();
        let t = d.observe(&[parsed("1", "bot", Some("node-a"), true, "The plan is X")]);
        assert!(t.is_none());
        assert_eq!(d.state(), ConsensusState::Discussing);
    }

    #[test]
    fn test_own_agreement_does_not_complete_quorum() {
        let mut d = detector();
        d.observe(&[
            parsed("1", "alice", None, false, "The plan is to refactor X"),
            parsed("22", "bot", Some("node-a"), true, "I agree with the refactor"),
        ]);
        assert_eq!(d.state(), ConsensusState::ConsensusSuggested);
        assert_eq!(d.signals().len(), 2);
        assert_eq!(d.distinct_authors().len(), 1);
    }

    #[test]
    fn test_confirmed_after_two_distinct_speakers() {
        let mut d = detector();
        let t = d.observe(&[parsed("1", "alice", None, false, "The plan is to refactor X")]);
        assert_eq!(t.map(|t| t.to), Some(ConsensusState::ConsensusSuggested));

        let t = d.observe(&[parsed("22", "bot", Some("node-a"), true, "I AGREE WITH alice")]);
        assert!(t.is_none());

        let t = d.observe(&[parsed("333", "bot", Some("node-b"), false, "I agree with alice")]);
        assert_eq!(t.map(|t| t.to), Some(ConsensusState::ConsensusConfirmed));
        assert_eq!(d.distinct_authors().len(), 2);
    }

    #[test]
    fn test_shared_account_distinguished_by_signature() {
        let mut d = detector();
        d.observe(&[
            parsed("1", "bot", Some("node-a"), false, "The plan is X"),
            parsed("2", "bot", Some("node-b"), false, "I agree with node-a"),
        ]);
        assert!(d.state().is_confirmed());
    }

    #[test]
    fn test_one_signal_per_comment_and_forward_only() {
        let mut d = detector().with_state(ConsensusState::ConsensusConfirmed);
        let batch = [parsed("1", "alice", None, false, "The plan is X. Next steps are Y.")];
        assert!(d.observe(&batch).is_none());
        assert!(d.observe(&batch).is_none());
        assert_eq!(d.signals().len(), 1);
        assert_eq!(d.state(), ConsensusState::ConsensusConfirmed);
    }

    #[test]
    fn test_phrase_in_signature_footer_ignored() {
        let mut d = detector();
        let body = "Nothing yet\n\n---\n**Agent**: `the-plan-is` | **Branch**: `main`";
        d.observe(&[parsed("1", "bot", Some("the-plan-is"), false, body)]);
        assert_eq!(d.state(), ConsensusState::Discussing);
    }
}
