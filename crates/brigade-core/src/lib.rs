//! Core types and error definitions for the Brigade kitchen simulator.
//!
//! This crate provides the foundational types shared across all Brigade crates:
//! the error taxonomy used by every subsystem and the [`Event`] record that
//! agents append to their memory.
//!
//! # Main types
//!
//! - [`BrigadeError`]: Unified error enum for all Brigade subsystems.
//! - [`BrigadeResult`]: Convenience alias for `Result<T, BrigadeError>`.
//! - [`BackendError`]: Recoverable failures reported by an LLM backend.
//! - [`Event`]: An immutable record of something an agent observed or did.
//! - [`EventKind`]: The type tag of an [`Event`].

/// Error taxonomy.
pub mod error;
/// Agent events.
pub mod event;

pub use error::{BackendError, BrigadeError, BrigadeResult};
pub use event::{Event, EventKind};
