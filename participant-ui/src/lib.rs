pub mod api;
pub mod channel;
pub mod chat;
pub mod config;
pub mod document;
pub mod screens;
pub mod session;
pub mod sketch;

pub use channel::*;
pub use chat::*;
pub use document::*;
pub use screens::*;
pub use session::*;
pub use sketch::*;
