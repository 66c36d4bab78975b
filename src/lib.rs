//! Application layer for the terminal configuration store.
//!
//! The storage engine lives in [`session_store`]; this crate resolves where
//! things are stored (conf file and environment), sets up logging, and
//! supplies terminal versions of the store's collaborators.
//!
//! # Public API Overview
//! - Resolve configuration with [`AppConfig`], [`EnvConfig`] and [`PathConfig`].
//! - Open a store with [`AppConfig::open_store`].
//! - Talk to the user through [`ConsoleReporter`] and [`PromptConfirm`].

pub mod config;
pub mod console;
pub mod logging;

pub use session_store;

pub use crate::config::{AppConfig, EnvConfig, PathConfig};
pub use crate::console::{ConsoleReporter, PromptConfirm};
