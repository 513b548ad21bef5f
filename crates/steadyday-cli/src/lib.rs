//! Command-line front end and Telegram transport for steadyday.

pub mod commands;
pub mod common;
pub mod telegram;
