//! HTTP API module.
//!
//! Transport around the dispatcher: routing, CORS, query envelopes and
//! the log stream.

pub mod logs;
pub mod query;
pub mod server;
pub mod types;

pub use server::{router, start_server};
pub use types::*;
pub use logs::*;
