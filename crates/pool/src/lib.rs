//! Project discovery, quota tracking, and account selection (spec.md C3/C4/C5)
//!
//! Cooldown state (C6) lives on [`credentials::Account`] itself and is
//! mutated through [`credentials::AccountStore`]; this crate only reads it
//! via `ready_accounts`/`pick`, keeping the dependency one-way: selection
//! and quota tracking depend on the credential store, never the reverse.

mod error;
mod project;
mod quota;
mod selector;

pub use error::{Error, Result};
pub use project::ProjectResolver;
pub use quota::{ModelQuotaView, QuotaStatus, QuotaTracker};
pub use selector::Selector;
