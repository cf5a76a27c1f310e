//! # dynattr_error - Unified Error Handling
//!
//! This crate provides a unified error system for the dynattr toolkit:
//! - Consistent error types across all crates
//! - Fine-grained kind enums for programmatic handling
//! - Contextual information (operation names, slot indices, block ids)
//! - Conversion from standard library errors
//!
//! ## Module Organization
//!
//! - [`types`] - Main error type and Result type alias
//! - [`kinds`] - Error kind enums for fine-grained categorization

pub use kinds::*;
pub use types::*;

pub mod kinds;
pub mod types;
