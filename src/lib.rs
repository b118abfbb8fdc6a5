pub mod config;
pub mod error;
pub mod feed_server;
pub mod handler;
pub mod ipc;
pub mod shell;
pub mod updater;

pub use error::{Error, Result};
pub use handler::{IpcResult, RequestHandler};
