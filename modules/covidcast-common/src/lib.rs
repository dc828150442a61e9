//! Shared data model for covidcast signals.
//!
//! A [`SignalTable`] pairs observations with the [`Metadata`] describing them.
//! Nothing here talks to the network: tables are built directly or parsed
//! from response bodies someone else fetched.

pub mod config;
pub mod error;
pub mod load;
pub mod metadata;
pub mod revision;
pub mod types;

pub use config::{Config, OutputFormat};
pub use error::{CovidcastError, Result};
pub use metadata::{MetaRow, Metadata};
pub use revision::latest_issues;
pub use types::*;
