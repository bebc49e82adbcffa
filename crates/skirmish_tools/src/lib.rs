//! # Skirmish Development Tools
//!
//! Command-line helpers around the simulation core:
//! - Data validation for rule tables and scenarios
//! - Headless scenario runs with a JSON summary
//! - Replay verification

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod error;
pub mod run;
pub mod validate;

pub use error::{ToolError, ToolResult};
