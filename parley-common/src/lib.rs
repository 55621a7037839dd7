//! Parley Common - shared error taxonomy and logging bootstrap.
//!
//! This crate provides:
//! - Error types and handling utilities for the engine and its callers
//! - Logging setup with noisy-module suppression

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod error;
pub mod logging;

pub use error::{Error, Result, ResultExt};
pub use logging::init_logging;
