//! Bot core: command parsing, dispatch and the polling loop.

pub mod commands;
pub mod dispatcher;
pub mod poller;

pub use dispatcher::{BotProfile, Dispatcher, Inbound};
pub use poller::Poller;
