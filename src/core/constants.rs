//! Shared constants used across the application

use std::time::Duration;

/// Number of trailing log entries sent upstream as conversation context.
/// Bounds the request payload regardless of how long the session has run.
pub const CONTEXT_WINDOW: usize = 10;

/// How long the "conversation cleared" acknowledgement stays visible.
pub const CLEAR_NOTICE_TTL: Duration = Duration::from_secs(2);

/// How long the settings-saved acknowledgement stays visible.
pub const SAVE_NOTICE_TTL: Duration = Duration::from_secs(1);

/// Upload ceiling for attached files.
pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Inclusive bounds accepted for the generation token budget.
pub const MIN_MAX_TOKENS: u32 = 1;
pub const MAX_MAX_TOKENS: u32 = 8192;
