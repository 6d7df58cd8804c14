//! Slash-command parsing for the chat loop.

use std::path::PathBuf;

/// A recognized slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/retry` — drop the last turn and resend the newest user message.
    Retry,
    /// `/clear` — wipe the conversation and its history.
    Clear,
    /// `/undo` — restore the previous conversation version.
    Undo,
    /// `/settings` — show the current settings.
    Settings,
    /// `/upload <path>` — validate and store a file.
    Upload(PathBuf),
    /// `/online` and `/offline` — flip the cached connectivity flag.
    SetOnline(bool),
    /// `/help`
    Help,
    /// `/quit`
    Quit,
    /// A slash command nobody recognizes; carries the offending word.
    Unknown(String),
}

pub enum CommandResult {
    Dispatch(Command),
    /// Not a command, send as a chat message.
    ProcessAsMessage(String),
}

pub fn process_input(input: &str) -> CommandResult {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return CommandResult::ProcessAsMessage(input.to_string());
    }

    let mut parts = trimmed.split_whitespace();
    let head = parts.next().unwrap_or_default();
    let rest = parts.collect::<Vec<_>>();

    let command = match head {
        "/retry" => Command::Retry,
        "/clear" => Command::Clear,
        "/undo" => Command::Undo,
        "/settings" => Command::Settings,
        "/upload" => match rest.first() {
            Some(path) => Command::Upload(PathBuf::from(path)),
            None => Command::Unknown("/upload".to_string()),
        },
        "/online" => Command::SetOnline(true),
        "/offline" => Command::SetOnline(false),
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    };

    CommandResult::Dispatch(command)
}

pub const HELP_TEXT: &str = "\
/retry      重新发送上一条消息
/undo       恢复到上一个对话版本
/clear      清空对话
/settings   查看当前设置
/upload <文件路径>  上传文件
/offline, /online   切换网络状态
/quit       退出";

#[cfg(test)]
mod tests {
    use super::*;

    fn dispatch(input: &str) -> Command {
        match process_input(input) {
            CommandResult::Dispatch(command) => command,
            CommandResult::ProcessAsMessage(_) => panic!("expected a command for {input:?}"),
        }
    }

    #[test]
    fn plain_text_passes_through_as_a_message() {
        match process_input("你好，喵哥") {
            CommandResult::ProcessAsMessage(text) => assert_eq!(text, "你好，喵哥"),
            CommandResult::Dispatch(_) => panic!("chat input misread as a command"),
        }
    }

    #[test]
    fn known_commands_parse() {
        assert_eq!(dispatch("/retry"), Command::Retry);
        assert_eq!(dispatch("  /clear  "), Command::Clear);
        assert_eq!(dispatch("/undo"), Command::Undo);
        assert_eq!(dispatch("/offline"), Command::SetOnline(false));
        assert_eq!(dispatch("/exit"), Command::Quit);
    }

    #[test]
    fn upload_requires_a_path() {
        assert_eq!(
            dispatch("/upload notes.txt"),
            Command::Upload(PathBuf::from("notes.txt"))
        );
        assert_eq!(dispatch("/upload"), Command::Unknown("/upload".to_string()));
    }

    #[test]
    fn unknown_slash_words_are_reported() {
        assert_eq!(dispatch("/frobnicate"), Command::Unknown("/frobnicate".to_string()));
    }
}
