//! # Skirmish Development Tools
//!
//! Command-line tools for development:
//! - Rule library and scenario validation
//! - Weapon keyword lookup
//! - Seeded scenario resolution

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod scenario;
pub mod validate;
