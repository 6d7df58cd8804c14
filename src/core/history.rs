use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::message::Message;

/// An immutable snapshot of the conversation log at one mutation point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatVersion {
    pub id: Uuid,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl ChatVersion {
    fn capture(messages: &[Message]) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            messages: messages.to_vec(),
        }
    }
}

/// A linear undo log over conversation snapshots.
///
/// `current_index` points at the snapshot matching the live log; `-1` means
/// no snapshot exists yet. Stepping back moves the pointer without deleting
/// anything, so repeated restores keep walking. The forward branch is
/// discarded only when a new snapshot lands after a restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionHistory {
    pub versions: Vec<ChatVersion>,
    pub current_index: i64,
}

impl Default for VersionHistory {
    fn default() -> Self {
        Self {
            versions: Vec::new(),
            current_index: -1,
        }
    }
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a new snapshot of `log`. Any versions past the current
    /// pointer (a redo branch left behind by restores) are dropped first.
    pub fn snapshot(&mut self, log: &[Message]) {
        let keep = (self.current_index + 1) as usize;
        self.versions.truncate(keep);
        self.versions.push(ChatVersion::capture(log));
        self.current_index = self.versions.len() as i64 - 1;
    }

    pub fn can_step_back(&self) -> bool {
        self.current_index > 0
    }

    /// Moves the pointer one snapshot back and returns the messages to
    /// restore, or `None` when there is nothing earlier to return to.
    pub fn step_back(&mut self) -> Option<&[Message]> {
        if !self.can_step_back() {
            return None;
        }
        self.current_index -= 1;
        self.versions
            .get(self.current_index as usize)
            .map(|v| v.messages.as_slice())
    }

    pub fn current(&self) -> Option<&ChatVersion> {
        if self.current_index < 0 {
            return None;
        }
        self.versions.get(self.current_index as usize)
    }

    pub fn clear(&mut self) {
        self.versions.clear();
        self.current_index = -1;
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Whether the persisted pointer still lands inside `versions`. State
    /// failing this check is discarded on load rather than trusted.
    pub fn is_consistent(&self) -> bool {
        self.current_index >= -1 && self.current_index < self.versions.len() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(turns: &[(&str, &str)]) -> Vec<Message> {
        turns
            .iter()
            .flat_map(|(user, assistant)| {
                [Message::user(*user), Message::assistant(*assistant)]
            })
            .collect()
    }

    #[test]
    fn first_snapshot_tracks_the_live_log() {
        let mut history = VersionHistory::new();
        let messages = log(&[("hello", "hi there")]);

        history.snapshot(&messages);

        assert_eq!(history.versions.len(), 1);
        assert_eq!(history.current_index, 0);
        assert_eq!(history.current().unwrap().messages, messages);
    }

    #[test]
    fn one_snapshot_per_mutation_grows_linearly() {
        let mut history = VersionHistory::new();
        let mut messages = Vec::new();
        for i in 0..5 {
            messages.push(Message::user(format!("q{i}")));
            messages.push(Message::assistant(format!("a{i}")));
            history.snapshot(&messages);
        }
        assert_eq!(history.versions.len(), 5);
        assert_eq!(history.current_index, 4);
    }

    #[test]
    fn stepping_back_walks_without_deleting() {
        let mut history = VersionHistory::new();
        let first = log(&[("one", "1")]);
        let second = log(&[("one", "1"), ("two", "2")]);
        history.snapshot(&first);
        history.snapshot(&second);

        assert_eq!(history.step_back().unwrap(), first.as_slice());
        assert_eq!(history.versions.len(), 2);
        assert_eq!(history.current_index, 0);

        // Already at the oldest snapshot; nothing further back.
        assert!(history.step_back().is_none());
        assert_eq!(history.current_index, 0);
    }

    #[test]
    fn snapshot_after_restore_discards_the_forward_branch() {
        let mut history = VersionHistory::new();
        let first = log(&[("one", "1")]);
        let second = log(&[("one", "1"), ("two", "2")]);
        let diverged = log(&[("one", "1"), ("three", "3")]);
        history.snapshot(&first);
        history.snapshot(&second);

        history.step_back();
        history.snapshot(&diverged);

        assert_eq!(history.versions.len(), 2);
        assert_eq!(history.current_index, 1);
        assert_eq!(history.current().unwrap().messages, diverged);
        assert_eq!(history.versions[0].messages, first);
    }

    #[test]
    fn clear_resets_to_the_empty_sentinel() {
        let mut history = VersionHistory::new();
        history.snapshot(&log(&[("x", "y")]));

        history.clear();
        history.clear();

        assert!(history.is_empty());
        assert_eq!(history.current_index, -1);
        assert!(history.current().is_none());
    }

    #[test]
    fn persisted_shape_matches_the_original() {
        let mut history = VersionHistory::new();
        history.snapshot(&log(&[("hello", "hi")]));

        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["currentIndex"], 0);
        assert!(json["versions"][0]["timestamp"].is_i64());
        assert!(json["versions"][0]["id"].is_string());

        let empty = serde_json::to_value(VersionHistory::new()).unwrap();
        assert_eq!(empty["currentIndex"], -1);
    }

    #[test]
    fn inconsistent_pointers_are_detected() {
        let mut history = VersionHistory::new();
        history.snapshot(&log(&[("a", "b")]));
        assert!(history.is_consistent());

        history.current_index = 5;
        assert!(!history.is_consistent());
        history.current_index = -2;
        assert!(!history.is_consistent());
    }
}
