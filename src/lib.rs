//! Miaoge is a terminal chat client for the Fireworks and Gemini chat APIs.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the conversation log, its undo-capable version history,
//!   the validated API settings, uploaded files, and the controller that
//!   orchestrates send/retry/clear/restore with persistence at every
//!   mutation point.
//! - [`api`] defines the provider gateway capability and its two remote
//!   implementations (Fireworks chat-completions and Gemini
//!   `generateContent`), including the classified error taxonomy.
//! - [`storage`] is the injected key-value persistence capability: a
//!   file-backed store for real sessions and an in-memory fake for tests.
//! - [`commands`] parses the chat loop's slash commands.
//! - [`cli`] parses command-line arguments and runs the interactive loop.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod commands;
pub mod core;
pub mod storage;
pub mod utils;
