//! Pattern matcher for structured references in comment bodies.
//!
//! Recognised forms:
//! - file: a backticked token ending in a configured extension, optionally `:line`
//!   (`` `src/analysis.py` ``, `` `lib.rs:42` ``)
//! - function: a backticked identifier followed by `(` (`` `run_query(` ``, `` `Cache::get()` ``)
//! - signature: the agent footer `**Agent**: `host` | **Branch**: `branch` | **Timestamp**: `ts``

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::MentionConfig;

static BACKTICK_PATTERN: OnceLock<Regex> = OnceLock::new();
static FUNCTION_PATTERN: OnceLock<Regex> = OnceLock::new();
static SIGNATURE_PATTERN: OnceLock<Regex> = OnceLock::new();

fn backtick_pattern() -> &'static Regex {
    BACKTICK_PATTERN.get_or_init(|| Regex::new(r"`([^`\n]+)`").unwrap())
}

fn function_pattern() -> &'static Regex {
    FUNCTION_PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*(?:(?:::|\.)[A-Za-z_][A-Za-z0-9_]*)*)\s*\(").unwrap()
    })
}

pub(crate) fn signature_pattern() -> &'static Regex {
    SIGNATURE_PATTERN.get_or_init(|| {
        Regex::new(
            r"\*\*Agent\*\*:\s*`([^`\n]+)`(?:\s*\|\s*\*\*Branch\*\*:\s*`([^`\n]+)`)?(?:\s*\|\s*\*\*Timestamp\*\*:\s*`([^`\n]+)`)?",
        )
        .unwrap()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionKind {
    File,
    Function,
    Signature,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mention {
    pub kind: MentionKind,
    pub value: String,
}

impl Mention {
    pub fn file(value: impl Into<String>) -> Self {
        Self {
            kind: MentionKind::File,
            value: value.into(),
        }
    }

    pub fn function(value: impl Into<String>) -> Self {
        Self {
            kind: MentionKind::Function,
            value: value.into(),
        }
    }
}

/// Identity fields recovered from an agent footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub hostname: String,
    pub branch: Option<String>,
    pub timestamp: Option<String>,
}

pub struct MentionExtractor {
    file_pattern: Regex,
}

impl MentionExtractor {
    pub fn new(config: &MentionConfig) -> Self {
        let exts: Vec<String> = config
            .file_patterns
            .iter()
            .map(|e| regex::escape(e.trim_start_matches('.')))
            .filter(|e| !e.is_empty())
            .collect();

        // An empty alternation would match nothing useful; fall back to a pattern that never matches.
        let pattern = if exts.is_empty() {
            r"[^\s\S]".to_string()
        } else {
            format!(r"(?i)^([\w./-]*[\w-]\.(?:{}))(?::\d+)?$", exts.join("|"))
        };

        Self {
            file_pattern: Regex::new(&pattern).unwrap_or_else(|_| {
                Regex::new(r"[^\s\S]").expect("constant regex is valid")
            }),
        }
    }

    /// All signatures in the body, in order of appearance.
    pub fn signatures(&self, body: &str) -> Vec<Signature> {
        signature_pattern()
            .captures_iter(body)
            .map(|caps| Signature {
                hostname: caps[1].trim().to_string(),
                branch: caps.get(2).map(|m| m.as_str().trim().to_string()),
                timestamp: caps.get(3).map(|m| m.as_str().trim().to_string()),
            })
            .collect()
    }

    /// File, function and signature mentions, deduplicated in first-seen order.
    /// Backticked fields inside signatures are not reported as files or functions.
    pub fn extract(&self, body: &str) -> Vec<Mention> {
        let mut seen = HashSet::new();
        let mut mentions = Vec::new();

        let prose = signature_pattern().replace_all(body, "");
        for caps in backtick_pattern().captures_iter(&prose) {
            let token = caps[1].trim();
            let mention = if let Some(file) = self.file_pattern.captures(token) {
                Mention::file(&file[1])
            } else if let Some(func) = function_pattern().captures(token) {
                Mention::function(&func[1])
            } else {
                continue;
            };
            if seen.insert(mention.clone()) {
                mentions.push(mention);
            }
        }

        for sig in self.signatures(body) {
            let mention = Mention {
                kind: MentionKind::Signature,
                value: sig.hostname,
            };
            if seen.insert(mention.clone()) {
                mentions.push(mention);
            }
        }

        mentions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> MentionExtractor {
        MentionExtractor::new(&MentionConfig::default())
    }

    #[test]
    fn test_file_and_function_extraction() {
        let mentions = extractor().extract("Check `analysis.py` and `run_query(` please");
        assert_eq!(
            mentions,
            vec![Mention::file("analysis.py"), Mention::function("run_query")]
        );
    }

    #[test]
    fn test_paths_line_numbers_and_qualified_calls() {
        let mentions = extractor()
            .extract("See `src/db/pool.rs:88`, `Pool::acquire()` and `self.flush()`.");
        assert_eq!(
            mentions,
            vec![
                Mention::file("src/db/pool.rs"),
                Mention::function("Pool::acquire"),
                Mention::function("self.flush"),
            ]
        );
    }

    #[test]
    fn test_plain_words_and_unknown_extensions_ignored() {
        let mentions = extractor().extract("`main` `data.bin` `x + y` and untagged analysis.py");
        assert!(mentions.is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let mentions = extractor().extract("`a.py` then `a.py` then `f(` and `f()`");
        assert_eq!(mentions, vec![Mention::file("a.py"), Mention::function("f")]);
    }

    #[test]
    fn test_signature_fields_are_not_files() {
        let body = "Done.\n\n---\n**Agent**: `build.sh` | **Branch**: `main` | **Timestamp**: `2026-01-01T00:00:00Z`";
        let mentions = extractor().extract(body);
        assert_eq!(
            mentions,
            vec![Mention {
                kind: MentionKind::Signature,
                value: "build.sh".into()
            }]
        );
    }

    #[test]
    fn test_agent_only_signature() {
        let sigs = extractor().signatures("**Agent**: `node-c`");
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].hostname, "node-c");
        assert!(sigs[0].branch.is_none());
    }

    #[test]
    fn test_custom_extensions() {
        let config = MentionConfig {
            file_patterns: vec!["proto".into()],
        };
        let mentions = MentionExtractor::new(&config).extract("`api.proto` `analysis.py`");
        assert_eq!(mentions, vec![Mention::file("api.proto")]);
    }
}
