//! `OpenAI`-compatible completion client for simarena.
//!
//! Talks to any server exposing `POST {base_url}/chat/completions` (`OpenAI`,
//! `vLLM`, LM Studio, Ollama). Implements
//! [`CompletionClient`](simarena_core::completion::CompletionClient) so the
//! engine never sees HTTP.
//!
//! # Modules
//!
//! - [`client`] -- [`OpenAiClient`]: streaming and blocking completions
//! - [`retry`] -- [`RetryPolicy`]: fixed-backoff retry shared by both calls
//! - [`sse`] -- Line buffering for server-sent event bodies

pub mod client;
pub mod retry;
pub mod sse;

pub use client::OpenAiClient;
pub use retry::RetryPolicy;
