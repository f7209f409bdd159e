pub mod agent;
pub mod chat;
pub mod config;
pub mod dispatch;
pub mod evidence;
pub mod prompt;
pub mod render;
pub mod types;

pub use types::*;
