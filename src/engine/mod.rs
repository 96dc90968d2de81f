//! Random engines and the byte-stream contract they share.

use crate::{buffer_agent::RandomBufferAgent, config::CoreEngineKind};
use zeroize::Zeroize;

pub mod aes;
pub mod chacha20;
pub mod null;
pub mod passthrough;
#[cfg(feature = "snow2")]
pub mod snow2;

pub use self::aes::AesEngine;
pub use chacha20::ChaCha20Engine;
pub use null::{NullEngine, NULL_ENGINE};
pub use passthrough::PassthroughEngine;
#[cfg(feature = "snow2")]
pub use snow2::{Snow2Engine, Snow2Variant};

/// Seed bytes consumed by the SNOW 2.0 engine: a 256-bit key followed by
/// four little-endian IV words.
pub const SNOW2_SEED_LENGTH: usize = 48;

/// A source of cryptographically secure pseudorandom bytes.
///
/// Filling is infallible: a failure after construction means the underlying
/// primitive can no longer be trusted and the process is aborted.
pub trait RandomEngine: Send {
    /// Fill `dest` with the next `dest.len()` bytes of the stream.
    ///
    /// The stream does not depend on how requests are chunked.
    fn fill_bytes(&mut self, dest: &mut [u8]);

    /// Generate a vector of random bytes
    fn random_bytes(&mut self, len: usize) -> Vec<u8> {
        let mut bytes = vec![0_u8; len];
        self.fill_bytes(&mut bytes);
        bytes
    }

    fn random_u32(&mut self) -> u32 {
        let mut bytes = [0_u8; 4];
        self.fill_bytes(&mut bytes);
        u32::from_le_bytes(bytes)
    }

    fn random_u64(&mut self) -> u64 {
        let mut bytes = [0_u8; 8];
        self.fill_bytes(&mut bytes);
        u64::from_le_bytes(bytes)
    }
}

impl<E: RandomEngine + ?Sized> RandomEngine for Box<E> {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        (**self).fill_bytes(dest);
    }
}

/// Keystream cache shared by the block based engines.
///
/// Bytes `[cursor, N)` of `block` are generated but not yet handed out.
pub(crate) struct BlockCache<const N: usize> {
    block: [u8; N],
    cursor: usize,
}

impl<const N: usize> BlockCache<N> {
    /// An empty cache: the first request triggers a generation.
    pub(crate) const fn new() -> Self {
        Self {
            block: [0_u8; N],
            cursor: N,
        }
    }

    /// Serve `dest` from the cache, calling `generate` each time a fresh
    /// block of `N` bytes is needed.
    pub(crate) fn fill(&mut self, dest: &mut [u8], mut generate: impl FnMut(&mut [u8; N])) {
        let cached = (N - self.cursor).min(dest.len());
        let (head, tail) = dest.split_at_mut(cached);
        head.copy_from_slice(&self.block[self.cursor..self.cursor + cached]);
        self.cursor += cached;

        let mut chunks = tail.chunks_exact_mut(N);
        for chunk in &mut chunks {
            generate(&mut self.block);
            chunk.copy_from_slice(&self.block);
            self.cursor = N;
        }
        let remainder = chunks.into_remainder();
        if !remainder.is_empty() {
            generate(&mut self.block);
            remainder.copy_from_slice(&self.block[..remainder.len()]);
            self.cursor = remainder.len();
        }
    }
}

impl<const N: usize> Drop for BlockCache<N> {
    fn drop(&mut self) {
        self.block.zeroize();
    }
}

/// Implements `RngCore` and `CryptoRng` on top of `RandomEngine`
macro_rules! impl_rng_core {
    ($($engine:ty),+ $(,)?) => {
        $(
            impl rand_core::RngCore for $engine {
                fn next_u32(&mut self) -> u32 {
                    $crate::engine::RandomEngine::random_u32(self)
                }

                fn next_u64(&mut self) -> u64 {
                    $crate::engine::RandomEngine::random_u64(self)
                }

                fn fill_bytes(&mut self, dest: &mut [u8]) {
                    $crate::engine::RandomEngine::fill_bytes(self, dest);
                }

                fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
                    $crate::engine::RandomEngine::fill_bytes(self, dest);
                    Ok(())
                }
            }

            impl rand_core::CryptoRng for $engine {}
        )+
    };
}

impl_rng_core!(AesEngine, ChaCha20Engine, PassthroughEngine, EngineHandle);
#[cfg(feature = "snow2")]
impl_rng_core!(Snow2Engine);

/// An unbuffered engine of any kind.
pub enum CoreEngine {
    Null(&'static NullEngine),
    OsPassthrough(PassthroughEngine),
    #[cfg(feature = "snow2")]
    Snow2(Box<Snow2Engine>),
    ChaCha20(Box<ChaCha20Engine>),
    Aes(Box<AesEngine>),
}

impl CoreEngine {
    #[must_use]
    pub fn kind(&self) -> CoreEngineKind {
        match self {
            CoreEngine::Null(_) => CoreEngineKind::Null,
            CoreEngine::OsPassthrough(_) => CoreEngineKind::OsPassthrough,
            #[cfg(feature = "snow2")]
            CoreEngine::Snow2(_) => CoreEngineKind::Snow2,
            CoreEngine::ChaCha20(_) => CoreEngineKind::ChaCha20,
            CoreEngine::Aes(_) => CoreEngineKind::Aes,
        }
    }
}

impl RandomEngine for CoreEngine {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self {
            CoreEngine::Null(engine) => engine.fill(dest),
            CoreEngine::OsPassthrough(engine) => engine.fill_bytes(dest),
            #[cfg(feature = "snow2")]
            CoreEngine::Snow2(engine) => engine.fill_bytes(dest),
            CoreEngine::ChaCha20(engine) => engine.fill_bytes(dest),
            CoreEngine::Aes(engine) => engine.fill_bytes(dest),
        }
    }
}

impl std::fmt::Debug for CoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CoreEngine({})", self.kind())
    }
}

/// The engine handed out by the factory: a core engine, possibly fed
/// through a background producer thread.
pub enum EngineHandle {
    Direct(CoreEngine),
    Buffered {
        kind: CoreEngineKind,
        agent: RandomBufferAgent,
    },
}

impl EngineHandle {
    #[must_use]
    pub fn kind(&self) -> CoreEngineKind {
        match self {
            EngineHandle::Direct(engine) => engine.kind(),
            EngineHandle::Buffered { kind, .. } => *kind,
        }
    }

    #[must_use]
    pub fn is_buffered(&self) -> bool {
        matches!(self, EngineHandle::Buffered { .. })
    }

    /// The buffering agent, which can serve several threads through `&self`
    #[must_use]
    pub fn as_buffered(&self) -> Option<&RandomBufferAgent> {
        match self {
            EngineHandle::Direct(_) => None,
            EngineHandle::Buffered { agent, .. } => Some(agent),
        }
    }

    /// Take the buffering agent out of the handle, for sharing behind an `Arc`
    pub fn into_buffered(self) -> Result<RandomBufferAgent, Self> {
        match self {
            EngineHandle::Buffered { agent, .. } => Ok(agent),
            direct @ EngineHandle::Direct(_) => Err(direct),
        }
    }
}

impl RandomEngine for EngineHandle {
    fn fill_bytes(&mut self, dest: &mut [u8]) {
        match self {
            EngineHandle::Direct(engine) => engine.fill_bytes(dest),
            EngineHandle::Buffered { agent, .. } => RandomBufferAgent::fill_bytes(agent, dest),
        }
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("kind", &self.kind())
            .field("buffered", &self.is_buffered())
            .finish()
    }
}
