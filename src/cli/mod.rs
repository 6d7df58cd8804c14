//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and routes to the chat loop or
//! the one-shot settings commands.

pub mod chat;

use std::error::Error;

use clap::{Parser, Subcommand};

use crate::core::settings::{ApiSettings, Provider};
use crate::storage::JsonFileStore;

#[derive(Parser)]
#[command(name = "miaoge")]
#[command(about = "A terminal chat client for the Fireworks and Gemini APIs")]
#[command(
    long_about = "Miaoge is a terminal chat client that talks to the Fireworks and Gemini \
chat APIs and keeps the conversation, an undo-capable version history, and \
your settings on disk between sessions.\n\n\
Chat commands:\n\
  /retry            Resend the last user message after a failure\n\
  /undo             Restore the previous conversation version\n\
  /clear            Wipe the conversation and its history\n\
  /settings         Show the current settings\n\
  /upload <path>    Validate and store a file\n\
  /quit             Leave the chat\n\n\
Settings keys for `miaoge set`:\n\
  provider          fireworks | gemini\n\
  model             A model id from the selected provider's catalog\n\
  api-key           Your credential for the selected provider\n\
  temperature       0 to 1\n\
  max-tokens        1 to 8192"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive chat loop (default)
    Chat,
    /// Print the current settings
    Settings,
    /// Update one settings value (validated before saving)
    Set {
        /// provider, model, api-key, temperature, or max-tokens
        key: String,
        /// Value to store for the key
        value: String,
    },
    /// Restore the defaults for the currently selected provider
    Reset,
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => chat::run_chat().await,
        Commands::Settings => {
            let store = JsonFileStore::new()?;
            print_settings(&ApiSettings::load(&store));
            Ok(())
        }
        Commands::Set { key, value } => set_value(&key, &value),
        Commands::Reset => {
            let mut store = JsonFileStore::new()?;
            let mut settings = ApiSettings::load(&store);
            settings.reset();
            if let Err(err) = settings.save(&mut store) {
                eprintln!("❌ {err}");
                std::process::exit(1);
            }
            println!("✅ 已恢复 {} 的默认设置", settings.provider);
            Ok(())
        }
    }
}

pub(crate) fn print_settings(settings: &ApiSettings) {
    let key_label = if settings.is_default_key {
        "（使用默认密钥）"
    } else {
        ""
    };
    println!("provider:    {}", settings.provider.as_str());
    println!("model:       {}", settings.model);
    println!("api-key:     {}{key_label}", settings.api_key);
    println!("temperature: {}", settings.temperature);
    println!("max-tokens:  {}", settings.max_tokens);
}

fn set_value(key: &str, value: &str) -> Result<(), Box<dyn Error>> {
    let mut store = JsonFileStore::new()?;
    let mut settings = ApiSettings::load(&store);

    match key {
        "provider" => match Provider::try_from(value) {
            Ok(provider) => settings.change_provider(provider),
            Err(_) => {
                eprintln!("❌ 未知提供商：{value}（可选：fireworks、gemini）");
                std::process::exit(1);
            }
        },
        "model" => {
            if settings.provider.find_model(value).is_none() {
                eprintln!("❌ {} 没有模型 {value}。可选模型：", settings.provider);
                for model in settings.provider.models() {
                    eprintln!("  • {}  ({})", model.id, model.display_name);
                }
                std::process::exit(1);
            }
            settings.model = value.to_string();
        }
        "api-key" => settings.set_api_key(value),
        "temperature" => match value.parse::<f64>() {
            Ok(temperature) => settings.temperature = temperature,
            Err(_) => {
                eprintln!("❌ 温度值必须是数字");
                std::process::exit(1);
            }
        },
        "max-tokens" => match value.parse::<u32>() {
            Ok(max_tokens) => settings.max_tokens = max_tokens,
            Err(_) => {
                eprintln!("❌ 最大令牌数必须是整数");
                std::process::exit(1);
            }
        },
        _ => {
            eprintln!("❌ 未知设置项：{key}");
            eprintln!("可用设置项：provider、model、api-key、temperature、max-tokens");
            std::process::exit(1);
        }
    }

    match settings.save(&mut store) {
        Ok(()) => {
            println!("✅ 设置已保存！");
            Ok(())
        }
        Err(err) => {
            eprintln!("❌ {err}");
            std::process::exit(1);
        }
    }
}
