//! Turn orchestration, prompt assembly, and configuration for simarena.
//!
//! This crate owns the run of a single simulation: round after round, each
//! agent takes a turn produced by a language model, the turn is persisted,
//! and every step is handed to an observer callback.
//!
//! # Modules
//!
//! - [`completion`] -- [`CompletionClient`] trait and chat message types.
//! - [`config`] -- Configuration loading from `simarena.yaml` plus
//!   environment overrides.
//! - [`context`] -- [`ContextBuilder`]: prompt rendering and history
//!   windowing.
//! - [`engine`] -- [`Engine`]: the round/turn state machine, and the
//!   [`StepCallback`] and [`RunLauncher`] seams.
//!
//! [`CompletionClient`]: completion::CompletionClient
//! [`ContextBuilder`]: context::ContextBuilder
//! [`Engine`]: engine::Engine
//! [`StepCallback`]: engine::StepCallback
//! [`RunLauncher`]: engine::RunLauncher

pub mod completion;
pub mod config;
pub mod context;
pub mod engine;
