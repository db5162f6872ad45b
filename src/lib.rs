#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::return_self_not_must_use
)]

pub mod actions;
pub mod bsky;
pub mod candidates;
pub mod config;
pub mod error;
pub mod fetch;
pub mod filter;
pub mod follow;
pub mod run;
pub mod state;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod uri;
pub mod util;

pub use config::Config;
pub use error::{PromoError, Result};
