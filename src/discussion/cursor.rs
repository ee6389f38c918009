use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::thread::{Comment, compare_ids};

/// Watermark of the newest processed comment. Never moves backwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub last_seen_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_id: Option<String>,
}

impl Cursor {
    pub fn at(comment: &Comment) -> Self {
        Self {
            last_seen_timestamp: Some(comment.created_at),
            last_seen_id: Some(comment.id.clone()),
        }
    }

    /// True when `comment` sorts strictly after this watermark.
    pub fn is_before(&self, comment: &Comment) -> bool {
        let Some(ts) = self.last_seen_timestamp else {
            return true;
        };
        match comment.created_at.cmp(&ts) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => match &self.last_seen_id {
                Some(id) => compare_ids(&comment.id, id) == Ordering::Greater,
                None => false,
            },
        }
    }

    fn cmp_position(&self, other: &Self) -> Ordering {
        self.last_seen_timestamp
            .cmp(&other.last_seen_timestamp)
            .then_with(|| match (&self.last_seen_id, &other.last_seen_id) {
                (Some(a), Some(b)) => compare_ids(a, b),
                (a, b) => a.is_some().cmp(&b.is_some()),
            })
    }

    /// Move to `next` only if it is ahead; returns whether the cursor moved.
    pub fn advance(&mut self, next: &Cursor) -> bool {
        if next.cmp_position(self) == Ordering::Greater {
            *self = next.clone();
            true
        } else {
            false
        }
    }
}

/// Comments newer than a cursor, plus the cursor to commit once they are processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub comments: Vec<Comment>,
    pub cursor: Cursor,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }
}

pub struct CursorTracker;

impl CursorTracker {
    /// Every comment after `cursor`, ascending. Returns the whole set, not just the newest:
    /// several participants may post between two polls.
    pub fn batch(all: &[Comment], cursor: &Cursor) -> Batch {
        let mut comments: Vec<Comment> = all
            .iter()
            .filter(|c| cursor.is_before(c))
            .cloned()
            .collect();
        comments.sort_by(Comment::order);

        let next = comments.last().map_or_else(|| cursor.clone(), Cursor::at);
        Batch {
            comments,
            cursor: next,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(minute: i64, id: &str, author: &str) -> Comment {
        let base = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();
        Comment::new(id, author, format!("comment {id}"), base + Duration::minutes(minute))
    }

    #[test]
    fn test_empty_cursor_returns_everything_sorted() {
        let all = vec![at(3, "3", "b"), at(1, "1", "a"), at(2, "2", "c")];
        let batch = CursorTracker::batch(&all, &Cursor::default());
        let ids: Vec<_> = batch.comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(batch.cursor, Cursor::at(&all[0]));
    }

    #[test]
    fn test_all_interleaved_comments_are_returned() {
        let mut all = vec![at(0, "1", "agent-a")];
        let first = CursorTracker::batch(&all, &Cursor::default());

        all.extend([at(5, "2", "human"), at(6, "3", "agent-b"), at(7, "4", "agent-a")]);
        let second = CursorTracker::batch(&all, &first.cursor);
        let ids: Vec<_> = second.comments.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "3", "4"]);
    }

    #[test]
    fn test_unchanged_list_re_emits_nothing() {
        let all = vec![at(1, "1", "a"), at(2, "2", "b")];
        let first = CursorTracker::batch(&all, &Cursor::default());
        let again = CursorTracker::batch(&all, &first.cursor);
        assert!(again.is_empty());
        assert_eq!(again.cursor, first.cursor);
    }

    #[test]
    fn test_same_timestamp_tie_broken_by_id() {
        let all = vec![at(1, "10", "a"), at(1, "9", "b")];
        let cursor = Cursor::at(&all[1]);
        let batch = CursorTracker::batch(&all, &cursor);
        assert_eq!(batch.comments.len(), 1);
        assert_eq!(batch.comments[0].id, "10");
    }

    #[test]
    fn test_cursor_is_monotonic_across_polls() {
        let mut cursor = Cursor::default();
        let mut all = Vec::new();
        let mut history = Vec::new();

        for round in 0..5 {
            all.push(at(round * 2, &format!("{}", round * 2), "x"));
            all.push(at(round * 2 + 1, &format!("{}", round * 2 + 1), "y"));
            let batch = CursorTracker::batch(&all, &cursor);
            assert_eq!(batch.comments.len(), 2);
            cursor.advance(&batch.cursor);
            history.push(cursor.clone());
        }

        for pair in history.windows(2) {
            assert!(pair[0].last_seen_timestamp <= pair[1].last_seen_timestamp);
        }
    }

    #[test]
    fn test_advance_never_moves_backwards() {
        let newer = Cursor::at(&at(10, "10", "a"));
        let older = Cursor::at(&at(5, "5", "a"));
        let mut cursor = newer.clone();
        assert!(!cursor.advance(&older));
        assert_eq!(cursor, newer);
        assert!(!cursor.advance(&Cursor::default()));
    }
}
