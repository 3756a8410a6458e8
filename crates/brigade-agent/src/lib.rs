//! LLM backend plumbing for Brigade agents.
//!
//! Agents reach a language model only through [`LlmBackend::complete`].
//! This crate provides the trait, deterministic backends for simulation and
//! tests, and a [`FailoverBackend`] that retries across backends.
//!
//! # Main types
//!
//! - [`LlmBackend`]: `complete(prompt, role_context) -> text`.
//! - [`RoleContext`]: Who is asking and for which task.
//! - [`ScriptedBackend`]: Replays canned responses; counts calls.
//! - [`SimulatedBackend`]: Deterministic pseudo-model with latency and failure cadence.
//! - [`FailoverBackend`] / [`RetryPolicy`]: Retries with exponential backoff.
//! - [`ModelConfig`]: Serializable model selection.

/// Backend trait and implementations.
pub mod backends;
/// Model configuration.
pub mod config;
/// Retry and failover across backends.
pub mod failover;

pub use backends::scripted::ScriptedBackend;
pub use backends::simulated::SimulatedBackend;
pub use backends::{create_backend, LlmBackend, RoleContext};
pub use config::{ModelConfig, ModelProvider};
pub use failover::{FailoverBackend, RetryPolicy};
