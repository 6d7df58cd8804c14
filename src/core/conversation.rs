use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::api::{ApiError, ProviderGateway};
use crate::core::constants::{CLEAR_NOTICE_TTL, CONTEXT_WINDOW, SAVE_NOTICE_TTL};
use crate::core::history::VersionHistory;
use crate::core::message::Message;
use crate::core::settings::{ApiSettings, SettingsError};
use crate::storage::{KeyValueStore, KEY_HISTORY, KEY_MESSAGES};

/// A short-lived acknowledgement ("cleared", "saved", "uploaded"). Expires
/// on its own; callers check [`TransientNotice::is_expired`] before showing.
#[derive(Debug, Clone)]
pub struct TransientNotice {
    text: String,
    set_at: Instant,
    ttl: Duration,
}

impl TransientNotice {
    fn new(text: impl Into<String>, ttl: Duration) -> Self {
        Self {
            text: text.into(),
            set_at: Instant::now(),
            ttl,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_expired(&self) -> bool {
        self.set_at.elapsed() >= self.ttl
    }
}

/// What a call to [`ChatController::send_message`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The assistant reply was appended.
    Replied,
    /// A classified failure message was appended in the assistant's place.
    Failed,
    /// A precondition failed (busy, or nothing to send); the log is untouched.
    Ignored,
}

/// Single authority over the conversation log and its lifecycle.
///
/// All mutation flows through here: optimistic user append, gateway
/// dispatch, error classification into assistant turns, snapshotting, and
/// persistence at every mutation point. The store and gateway are injected
/// capabilities; nothing else in the crate touches the log.
pub struct ChatController<S: KeyValueStore, G: ProviderGateway> {
    store: S,
    gateway: G,
    settings: ApiSettings,
    log: Vec<Message>,
    history: VersionHistory,
    busy: bool,
    last_error: Option<String>,
    online: bool,
    notice: Option<TransientNotice>,
}

impl<S: KeyValueStore, G: ProviderGateway> ChatController<S, G> {
    pub fn new(store: S, gateway: G) -> Self {
        let settings = ApiSettings::load(&store);
        let log = load_log(&store);
        let history = load_history(&store);

        let mut controller = Self {
            store,
            gateway,
            settings,
            log,
            history,
            busy: false,
            last_error: None,
            online: true,
            notice: None,
        };

        if controller.log.is_empty() && controller.settings.api_key.trim().is_empty() {
            controller
                .log
                .push(Message::assistant("请先设置 API 密钥才能开始对话。"));
        }

        controller
    }

    pub fn log(&self) -> &[Message] {
        &self.log
    }

    pub fn history(&self) -> &VersionHistory {
        &self.history
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ApiSettings {
        &mut self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Connectivity is pushed from the environment and sampled at the start
    /// of each send; a mid-flight transition is not observed.
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn notice(&self) -> Option<&TransientNotice> {
        self.notice.as_ref().filter(|n| !n.is_expired())
    }

    pub fn set_notice(&mut self, text: impl Into<String>, ttl: Duration) {
        self.notice = Some(TransientNotice::new(text, ttl));
    }

    /// Appends the user's message, asks the configured provider for a reply,
    /// and appends either the reply or a classified failure message. Exactly
    /// one history snapshot and one persistence pass happen per call.
    pub async fn send_message(&mut self, content: &str) -> SendOutcome {
        if self.busy {
            debug!("send ignored: a request is already in flight");
            return SendOutcome::Ignored;
        }
        let content = content.trim();
        if content.is_empty() {
            return SendOutcome::Ignored;
        }

        self.busy = true;
        self.log.push(Message::user(content));

        let result = if self.online {
            let start = self.log.len().saturating_sub(CONTEXT_WINDOW);
            self.gateway
                .generate_reply(&self.log[start..], &self.settings)
                .await
        } else {
            Err(ApiError::Offline)
        };

        let outcome = match result {
            Ok(reply) => {
                self.log.push(Message::assistant(reply));
                self.last_error = None;
                SendOutcome::Replied
            }
            Err(err) => {
                debug!("gateway failure: {err:?}");
                let text = err.to_string();
                self.log.push(Message::assistant(text.clone()));
                self.last_error = Some(text);
                SendOutcome::Failed
            }
        };

        self.history.snapshot(&self.log);
        self.persist_log();
        self.persist_history();
        self.busy = false;
        outcome
    }

    /// Drops the newest log entry (assumed to be the failed assistant turn —
    /// the removal is unconditional), then re-sends the newest user message
    /// found scanning backward.
    pub async fn retry_last(&mut self) -> SendOutcome {
        if self.busy || self.log.is_empty() {
            return SendOutcome::Ignored;
        }

        self.log.pop();
        self.last_error = None;
        self.persist_log();

        let content = self
            .log
            .iter()
            .rev()
            .find(|message| message.is_user())
            .map(|message| message.content.clone());

        match content {
            Some(content) => self.send_message(&content).await,
            None => SendOutcome::Ignored,
        }
    }

    /// Empties the log and the whole version history, removes both persisted
    /// copies, and raises a self-expiring acknowledgement. Idempotent.
    pub fn clear_all(&mut self) {
        self.log.clear();
        self.history.clear();
        self.last_error = None;

        if let Err(err) = self.store.remove(KEY_MESSAGES) {
            warn!("failed to remove persisted log: {err}");
        }
        if let Err(err) = self.store.remove(KEY_HISTORY) {
            warn!("failed to remove persisted history: {err}");
        }

        self.notice = Some(TransientNotice::new("对话已清空！", CLEAR_NOTICE_TTL));
    }

    /// Replaces the live log with the previous snapshot and moves the
    /// history pointer back one step. Forward versions survive until the
    /// next send diverges. Returns whether a restore happened.
    pub fn restore_previous(&mut self) -> bool {
        let Some(messages) = self.history.step_back().map(<[Message]>::to_vec) else {
            return false;
        };
        self.log = messages;
        self.persist_log();
        self.persist_history();
        true
    }

    /// Persists the current settings after validation and raises the saved
    /// acknowledgement. Validation failures block persistence.
    pub fn save_settings(&mut self) -> Result<(), SettingsError> {
        self.settings.save(&mut self.store)?;
        self.notice = Some(TransientNotice::new("设置已保存！", SAVE_NOTICE_TTL));
        Ok(())
    }

    fn persist_log(&mut self) {
        match serde_json::to_string(&self.log) {
            Ok(json) => {
                if let Err(err) = self.store.set(KEY_MESSAGES, &json) {
                    warn!("failed to persist log: {err}");
                }
            }
            Err(err) => warn!("failed to encode log: {err}"),
        }
    }

    fn persist_history(&mut self) {
        match serde_json::to_string(&self.history) {
            Ok(json) => {
                if let Err(err) = self.store.set(KEY_HISTORY, &json) {
                    warn!("failed to persist history: {err}");
                }
            }
            Err(err) => warn!("failed to encode history: {err}"),
        }
    }

    #[cfg(test)]
    fn force_busy(&mut self) {
        self.busy = true;
    }
}

fn load_log<S: KeyValueStore>(store: &S) -> Vec<Message> {
    match store.get(KEY_MESSAGES) {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(log) => log,
            Err(err) => {
                warn!("stored log is unreadable, starting empty: {err}");
                Vec::new()
            }
        },
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!("could not read stored log, starting empty: {err}");
            Vec::new()
        }
    }
}

fn load_history<S: KeyValueStore>(store: &S) -> VersionHistory {
    let history: VersionHistory = match store.get(KEY_HISTORY) {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(history) => history,
            Err(err) => {
                warn!("stored history is unreadable, starting empty: {err}");
                VersionHistory::new()
            }
        },
        Ok(None) => VersionHistory::new(),
        Err(err) => {
            warn!("could not read stored history, starting empty: {err}");
            VersionHistory::new()
        }
    };

    if history.is_consistent() {
        history
    } else {
        warn!("stored history pointer is out of range, starting empty");
        VersionHistory::new()
    }
}
