//! Bidirectional protocol transformation between client dialects and the
//! upstream wire format (spec.md C10/C11).
//!
//! [`upstream`] defines the shared upstream shape both dialects translate
//! into and out of. [`openai`] and [`anthropic`] each own request parsing,
//! unary response synthesis, and a stateful stream accumulator that re-chunks
//! upstream events into that dialect's incremental wire format.

pub mod anthropic;
mod error;
mod image;
pub mod models;
pub mod openai;
pub mod schema;
pub mod upstream;

pub use error::{Error, Result};
