//! Line-based IPC transport.
//!
//! Every frame is one line, `<type>\t<name>\t<payload>\n`:
//!
//! ```text
//! -> request   ping:1             ""
//! <- response  ping:1             {"success":true,"value":"pong"}
//! -> request   open-folder        "/home/me/Downloads"
//! <- response  open-folder        {"success":true,"value":null}
//! <- event     download-progress  {"percent":40,"total":1048576,"transferred":419430}
//! ```
//!
//! Request names are methods, optionally suffixed with `:<id>`; the reply
//! echoes the full name so concurrent calls can be told apart. Handler
//! failures travel inside `response` frames; `error` frames are reserved for
//! protocol problems such as unknown methods or malformed lines.

mod dispatch;
mod protocol;
mod server;

pub use dispatch::{Method, dispatch, split_name};
pub use protocol::{Frame, FrameKind};
pub use server::serve;
