//! Telegram transport: Bot API client, screen renderer, and update poller.

pub mod client;
pub mod poller;
pub mod render;
pub mod types;

pub use client::TelegramMessenger;
pub use poller::Poller;
