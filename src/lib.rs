pub mod client;
pub mod commands;
pub mod data;
pub mod handlers;
pub mod logging;
pub mod responses;
pub mod rules;
pub mod schedule;

pub const BOT_NAME: &str = "chatwarden";
pub const COMMAND_TARGET: &str = "chatwarden::command";
pub const MODERATION_TARGET: &str = "chatwarden::moderation";
pub const ERROR_TARGET: &str = "chatwarden::error";
pub const EVENT_TARGET: &str = "chatwarden::handlers";
pub const SCHEDULER_TARGET: &str = "chatwarden::schedule";
pub const CONSOLE_TARGET: &str = "chatwarden";

pub use client::{ChatApi, ChatEvent};
pub use data::Data;
pub type Error = Box<dyn std::error::Error + Send + Sync>;
