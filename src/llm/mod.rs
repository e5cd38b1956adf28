//! Generation provider clients and abstractions.
//!
//! [`client`] defines the [`client::GenerationProvider`] trait,
//! [`client::GenerationOptions`], and the [`client::GenProvider`] factory
//! enum. Backends: [`openai`] (hosted API) and [`ollama`] (local
//! inference), each behind its feature flag. [`retry`] implements the
//! bounded exponential backoff used for transient provider failures.

pub mod client;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
pub mod retry;

pub use client::{GenProvider, GenerationOptions, GenerationProvider};
pub use retry::RetryPolicy;
