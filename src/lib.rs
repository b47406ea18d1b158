pub mod client;
pub mod codec;
pub mod command;
pub mod config;
pub mod connection;
pub mod frame;
pub mod render;
pub mod response;
pub mod session;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Result<T> = std::result::Result<T, Error>;
