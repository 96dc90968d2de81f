use crate::CryptoRandomError;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, str::FromStr};

/// Size of the ring used by [`BufferMode::Thread`] when nothing else is
/// configured.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// The generator behind an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CoreEngineKind {
    /// Produces only zero bytes. For benchmarking the surrounding protocol.
    Null,
    /// Reads the operating system pseudorandom source on every request.
    #[serde(rename = "OPENSSL", alias = "OS")]
    OsPassthrough,
    /// Legacy SNOW 2.0 stream cipher.
    Snow2,
    /// 4-lane ChaCha20 block generator.
    #[serde(rename = "CHACHA20")]
    ChaCha20,
    /// AES-128-CTR dual generator with forward secure reseeding.
    Aes,
}

impl CoreEngineKind {
    pub const ALL: [CoreEngineKind; 5] = [
        CoreEngineKind::Null,
        CoreEngineKind::OsPassthrough,
        CoreEngineKind::Snow2,
        CoreEngineKind::ChaCha20,
        CoreEngineKind::Aes,
    ];

    /// Number of seed bytes the engine consumes.
    ///
    /// Longer seeds are accepted and the extra bytes ignored.
    #[must_use]
    pub const fn seed_size(self) -> usize {
        match self {
            CoreEngineKind::Null | CoreEngineKind::OsPassthrough => 0,
            CoreEngineKind::Snow2 => crate::engine::SNOW2_SEED_LENGTH,
            CoreEngineKind::ChaCha20 => crate::engine::chacha20::SEED_LENGTH,
            CoreEngineKind::Aes => crate::engine::aes::SEED_LENGTH,
        }
    }

    /// Whether a caller supplied seed is meaningful for this kind
    #[must_use]
    pub const fn accepts_seed(self) -> bool {
        !matches!(self, CoreEngineKind::Null | CoreEngineKind::OsPassthrough)
    }

    /// Whether this build can construct the kind
    #[must_use]
    pub const fn is_supported(self) -> bool {
        match self {
            CoreEngineKind::Snow2 => cfg!(feature = "snow2"),
            _ => true,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            CoreEngineKind::Null => "NULL",
            CoreEngineKind::OsPassthrough => "OPENSSL",
            CoreEngineKind::Snow2 => "SNOW2",
            CoreEngineKind::ChaCha20 => "CHACHA20",
            CoreEngineKind::Aes => "AES",
        }
    }
}

impl Display for CoreEngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CoreEngineKind {
    type Err = CryptoRandomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NULL" => Ok(CoreEngineKind::Null),
            "OPENSSL" | "OS" => Ok(CoreEngineKind::OsPassthrough),
            "SNOW2" => Ok(CoreEngineKind::Snow2),
            "CHACHA20" => Ok(CoreEngineKind::ChaCha20),
            "AES" => Ok(CoreEngineKind::Aes),
            other => Err(CryptoRandomError::ConversionError(format!(
                "unknown random engine: {other}"
            ))),
        }
    }
}

/// Whether the core engine is fed through a background producer thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BufferMode {
    None,
    Thread,
}

impl Display for BufferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferMode::None => f.write_str("NONE"),
            BufferMode::Thread => f.write_str("THREAD"),
        }
    }
}

impl FromStr for BufferMode {
    type Err = CryptoRandomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NONE" => Ok(BufferMode::None),
            "THREAD" => Ok(BufferMode::Thread),
            other => Err(CryptoRandomError::ConversionError(format!(
                "unknown buffer mode: {other}"
            ))),
        }
    }
}

/// Describes which engine to build and how to buffer it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub core_engine: CoreEngineKind,
    pub buffer_mode: BufferMode,
    /// Ring size in bytes, only used with [`BufferMode::Thread`]
    pub buffer_size: usize,
}

impl Configuration {
    #[must_use]
    pub const fn new(
        core_engine: CoreEngineKind,
        buffer_mode: BufferMode,
        buffer_size: usize,
    ) -> Self {
        Self {
            core_engine,
            buffer_mode,
            buffer_size,
        }
    }

    /// Unbuffered configuration for the given kind
    #[must_use]
    pub const fn unbuffered(core_engine: CoreEngineKind) -> Self {
        Self::new(core_engine, BufferMode::None, DEFAULT_BUFFER_SIZE)
    }

    #[must_use]
    pub const fn seed_size(&self) -> usize {
        self.core_engine.seed_size()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::unbuffered(CoreEngineKind::Aes)
    }
}
