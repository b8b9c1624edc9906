//! Upstream transport and SSE framing (spec.md C8/C9)

mod client;
mod error;
mod framer;

pub use client::Transport;
pub use error::{Error, Result};
pub use framer::SseFramer;
