//! Daily app-open counter: HTTP tracking endpoint, read-only views and a
//! Telegram relay for the same figures.

pub mod api;
pub mod bot;
pub mod config;
pub mod core;
pub mod error;
pub mod state;
pub mod static_files;

pub use error::{Error, Result};
