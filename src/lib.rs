//! ATLAS chat bot: bridges Telegram long polling to a hosted LLM
//! completion API, with optional speech and document generation.

pub mod bot;
pub mod config;
pub mod health;
pub mod llm;
pub mod media;
pub mod session;
pub mod telegram;
pub mod utils;
