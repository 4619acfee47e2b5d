//! Configuration, application wiring and the chat service.

pub mod bootstrap;
pub mod chat;
pub mod config;
pub mod error;

pub use bootstrap::App;
pub use chat::{ChatService, ChatSettings};
pub use config::Config;
pub use error::ChatError;
