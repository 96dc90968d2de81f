//! Cryptographically secure random engines.
//!
//! A [`RandomFacility`] builds engines described by a [`Configuration`]:
//! an AES-128-CTR dual generator with forward secure reseeding, a 4-lane
//! ChaCha20 generator, the legacy SNOW 2.0 stream cipher, an all-zero engine
//! and a passthrough to the operating system. Any of them can be moved to a
//! background thread feeding a ring buffer.

pub mod buffer_agent;
pub mod config;
pub mod engine;
pub mod entropy;
mod error;
pub mod facility;
pub mod factory;

pub use buffer_agent::RandomBufferAgent;
pub use config::{BufferMode, Configuration, CoreEngineKind};
pub use engine::{EngineHandle, RandomEngine};
pub use error::CryptoRandomError;
pub use facility::RandomFacility;
pub use factory::RandomEngineFactory;
