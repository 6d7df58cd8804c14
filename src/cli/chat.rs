//! The interactive chat loop: stdin lines in, transcript lines out.

use std::error::Error;
use std::io::Write;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::ProviderRouter;
use crate::commands::{process_input, Command, CommandResult, HELP_TEXT};
use crate::core::constants::SAVE_NOTICE_TTL;
use crate::core::conversation::{ChatController, SendOutcome};
use crate::core::files::{self, FileError, FileLibrary, UploadedFile};
use crate::core::message::Message;
use crate::storage::{JsonFileStore, KeyValueStore};

const ASSISTANT_NAME: &str = "喵哥";

pub async fn run_chat() -> Result<(), Box<dyn Error>> {
    let store = JsonFileStore::new()?;
    // The file library persists independently of the conversation state.
    let mut file_store = JsonFileStore::new()?;
    let mut library = FileLibrary::load(&file_store);

    let gateway = ProviderRouter::new(reqwest::Client::new());
    let mut controller = ChatController::new(store, gateway);

    if controller.log().is_empty() {
        println!("你好！我是{ASSISTANT_NAME}");
        println!("让我们开始对话吧！（/help 查看命令）");
    } else {
        print_transcript(controller.log());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match process_input(&line) {
            CommandResult::ProcessAsMessage(text) => {
                match controller.send_message(&text).await {
                    SendOutcome::Replied | SendOutcome::Failed => print_reply(&controller),
                    SendOutcome::Ignored => {}
                }
            }
            CommandResult::Dispatch(command) => match command {
                Command::Retry => match controller.retry_last().await {
                    SendOutcome::Replied | SendOutcome::Failed => print_reply(&controller),
                    SendOutcome::Ignored => println!("没有可重试的消息。"),
                },
                Command::Clear => {
                    controller.clear_all();
                    print_notice(&controller);
                }
                Command::Undo => {
                    if controller.restore_previous() {
                        print_transcript(controller.log());
                    } else {
                        println!("没有更早的对话版本。");
                    }
                }
                Command::Settings => super::print_settings(controller.settings()),
                Command::Upload(path) => {
                    upload(&path, &mut library, &mut file_store, &mut controller);
                }
                Command::SetOnline(online) => {
                    controller.set_online(online);
                    println!("网络状态：{}", if online { "在线" } else { "离线" });
                }
                Command::Help => println!("{HELP_TEXT}"),
                Command::Quit => break,
                Command::Unknown(word) => {
                    println!("未知命令：{word}（输入 /help 查看命令）");
                }
            },
        }
    }

    Ok(())
}

fn print_transcript(log: &[Message]) {
    for message in log {
        if message.is_user() {
            println!("你: {}", message.content);
        } else {
            println!("{ASSISTANT_NAME}: {}", message.content);
        }
    }
}

fn print_reply<S, G>(controller: &ChatController<S, G>)
where
    S: KeyValueStore,
    G: crate::api::ProviderGateway,
{
    if let Some(message) = controller.log().last() {
        if message.is_assistant() {
            println!("{ASSISTANT_NAME}: {}", message.content);
        }
    }
}

fn print_notice<S, G>(controller: &ChatController<S, G>)
where
    S: KeyValueStore,
    G: crate::api::ProviderGateway,
{
    if let Some(notice) = controller.notice() {
        println!("{}", notice.text());
    }
}

fn upload<S, G>(
    path: &Path,
    library: &mut FileLibrary,
    file_store: &mut JsonFileStore,
    controller: &mut ChatController<S, G>,
) where
    S: KeyValueStore,
    G: crate::api::ProviderGateway,
{
    let Some(mime_type) = files::mime_type_for_path(path) else {
        println!("{}", FileError::UnsupportedType);
        return;
    };

    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(_) => {
            println!("上传文件时发生错误，请重试。");
            return;
        }
    };

    match UploadedFile::from_bytes(name, mime_type, &bytes) {
        Ok(file) => {
            library.add(file_store, file);
            controller.set_notice("上传成功！", SAVE_NOTICE_TTL);
            print_notice(controller);
        }
        Err(err) => println!("{err}"),
    }
}
